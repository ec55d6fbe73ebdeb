//! Everything between the conversation and the socket.

pub mod buffering;
pub mod connection;
pub mod record_stream;

pub use buffering::FragmentBuffer;
pub use record_stream::{Inbound, RecordReader};
