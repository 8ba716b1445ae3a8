pub mod cache;
pub mod decode;
pub mod gateway;
pub mod types;
pub mod view;

pub use cache::SnapshotCache;
pub use gateway::{ContractGateway, ContractReader, GatewaySettings, PendingPosition};
pub use types::{EncryptedShare, MarketSnapshot, Side, TxInclusion, UserPosition};
