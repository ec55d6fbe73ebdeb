//! Just enough TLS 1.2 cryptography for the probe to finish a real handshake.

pub mod key_exchange;
pub mod prf;
pub mod record_protection;

pub use key_exchange::KeyExchangeOutput;
pub use prf::Sender;
pub use record_protection::{DirectionKeys, KeyBlock, RecordProtection};
