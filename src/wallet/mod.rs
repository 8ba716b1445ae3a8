pub mod provider;
pub mod session;

pub use provider::{HttpWallet, WalletProvider};
pub use session::WalletSession;
