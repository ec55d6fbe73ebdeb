pub mod campaign;
pub mod cli;
pub mod codec;
pub mod config;
pub mod conversation;
pub mod crypto;
pub mod error;
pub mod iana;
pub mod prefixed_list;
pub mod protocol;
pub mod runner;
pub mod session;
pub mod transport;

#[cfg(test)]
pub mod testing;
