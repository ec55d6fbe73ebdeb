//! Immutable run configuration, built once at startup.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    time::Duration,
};

use crate::iana::{self, constants};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 4433;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the conversations are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub host: String,
    pub port: u16,
    /// cipher suites offered in every ClientHello, in preference order
    pub ciphers: Vec<iana::Cipher>,
    pub groups: Vec<iana::Group>,
    /// sent as both `signature_algorithms` and `signature_algorithms_cert`
    pub signature_schemes: Vec<iana::SignatureScheme>,
    pub extended_master_secret: bool,
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            ciphers: Self::default_ciphers(),
            groups: Self::default_groups(),
            signature_schemes: Self::default_signature_schemes(),
            extended_master_secret: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ProbeSettings {
    pub fn default_ciphers() -> Vec<iana::Cipher> {
        vec![
            constants::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
            constants::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
            constants::TLS_DHE_RSA_WITH_AES_128_CBC_SHA,
        ]
    }

    pub fn default_groups() -> Vec<iana::Group> {
        vec![constants::secp256r1, constants::ffdhe2048]
    }

    /// sha512/384/256 with RSA, then with ECDSA, then the two EdDSA schemes
    pub fn default_signature_schemes() -> Vec<iana::SignatureScheme> {
        vec![
            constants::rsa_pkcs1_sha512,
            constants::rsa_pkcs1_sha384,
            constants::rsa_pkcs1_sha256,
            constants::ecdsa_secp521r1_sha512,
            constants::ecdsa_secp384r1_sha384,
            constants::ecdsa_secp256r1_sha256,
            constants::ed25519,
            constants::ed448,
        ]
    }

    /// The server only sends a ServerKeyExchange when the suite it picks is
    /// ephemeral. Predicted from the first offered cipher.
    pub fn expects_server_key_exchange(&self) -> bool {
        self.ciphers.first().is_some_and(|cipher| cipher.is_ephemeral())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum ExpectedFailure {
    /// any error counts
    Any,
    /// only an error whose text contains this
    Containing(String),
}

impl ExpectedFailure {
    pub fn matches(&self, error: &str) -> bool {
        match self {
            ExpectedFailure::Any => true,
            ExpectedFailure::Containing(message) => error.contains(message.as_str()),
        }
    }
}

/// Conversations that are expected to fail, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedFailureTable(BTreeMap<String, ExpectedFailure>);

impl ExpectedFailureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as expected to fail. Replaces any message set before.
    pub fn expect_failure(&mut self, name: impl Into<String>) {
        self.0.insert(name.into(), ExpectedFailure::Any);
    }

    pub fn expect_message(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.0
            .insert(name.into(), ExpectedFailure::Containing(message.into()));
    }

    pub fn get(&self, name: &str) -> Option<&ExpectedFailure> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which conversations run and how their outcomes are judged.
#[derive(Debug, Clone, Default)]
pub struct CampaignConfig {
    /// positional probe names, `None` runs everything not excluded
    pub run_only: Option<BTreeSet<String>>,
    pub exclude: BTreeSet<String>,
    /// `None` runs every eligible conversation
    pub limit: Option<usize>,
    pub expected_failures: ExpectedFailureTable,
    pub report_json: Option<PathBuf>,
}
