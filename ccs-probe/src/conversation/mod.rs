//! Conversations: what the client sends, what it expects back, and in which
//! order.

mod expectations;
mod generators;
pub mod graph;
pub mod scenarios;

pub use expectations::Expectation;
pub use generators::{ClientHelloParams, Generator};
pub use graph::{Command, Conversation, ConversationBuilder, Node, NodeId, Step};
