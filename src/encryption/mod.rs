pub mod sdk;
pub mod session;

pub use sdk::{EncryptionSdk, RelayerSdk, SdkNetworkConfig};
pub use session::{normalize_share, EncryptionSession};
