use thiserror::Error;

/// Failures that end a single conversation.
///
/// The `Display` text is what an expected failure substring (`-X`) is matched
/// against, so the wording of these messages is part of the command line
/// surface.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("expected {expected}, received {observed}")]
    Mismatch { expected: String, observed: String },

    #[error("connection closed while waiting for {expected}")]
    ConnectionClosed { expected: String },

    #[error("timed out waiting for {expected}")]
    Timeout { expected: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message from peer: {0}")]
    Decode(#[source] std::io::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("invalid session state: {0}")]
    State(String),
}

/// Problems with the command line or the conversation set, reported before
/// anything connects to the server.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("-x has to be specified before -X")]
    OrphanExpectedMessage,

    #[error("unknown cipher suite: {0}")]
    UnknownCipher(String),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("unknown signature algorithm: {0}")]
    UnknownSignatureAlgorithm(String),

    #[error("invalid number for {flag}: {value}")]
    InvalidNumber { flag: &'static str, value: String },

    #[error("invalid conversation graph: {0}")]
    InvalidGraph(String),

    #[error("there is no conversation named {0}")]
    MissingConversation(&'static str),

    #[error("more than one conversation is named {0:?}")]
    DuplicateConversation(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("openssl: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("malformed {0}")]
    Malformed(&'static str),

    #[error("record failed authentication (bad_record_mac)")]
    BadRecordMac,

    #[error("aws-lc rejected the {0}")]
    AwsLc(&'static str),
}
