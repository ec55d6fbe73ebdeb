// NOTE: This file is also pulled into `build.rs` with `include!`.
//
// The build script turns the tables below into named constants, so this file
// can only depend on std and on crates that are also build-dependencies. A
// module level doc comment would break the include, so this is a plain comment.

use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

/// A TLS cipher suite from the IANA "TLS Cipher Suites" registry.
#[derive(
    PartialEq,
    Eq,
    Hash,
    Copy,
    Clone,
    serde_with::DeserializeFromStr,
    serde_with::SerializeDisplay,
    PartialOrd,
    Ord,
)]
pub struct Cipher {
    pub value: [u8; 2],
    pub description: &'static str,
}

/// Cipher suites the probe knows how to name.
///
/// This is the TLS 1.2 AES and ChaCha20 subset that a modern server negotiates,
/// the TLS 1.3 suites (so they decode when a server echoes them) and the two
/// signalling values.
const IANA_CIPHERS: &[Cipher] = &[
    Cipher { value: [0x00, 0x2F], description: "TLS_RSA_WITH_AES_128_CBC_SHA" },
    Cipher { value: [0x00, 0x33], description: "TLS_DHE_RSA_WITH_AES_128_CBC_SHA" },
    Cipher { value: [0x00, 0x35], description: "TLS_RSA_WITH_AES_256_CBC_SHA" },
    Cipher { value: [0x00, 0x39], description: "TLS_DHE_RSA_WITH_AES_256_CBC_SHA" },
    Cipher { value: [0x00, 0x3C], description: "TLS_RSA_WITH_AES_128_CBC_SHA256" },
    Cipher { value: [0x00, 0x3D], description: "TLS_RSA_WITH_AES_256_CBC_SHA256" },
    Cipher { value: [0x00, 0x67], description: "TLS_DHE_RSA_WITH_AES_128_CBC_SHA256" },
    Cipher { value: [0x00, 0x6B], description: "TLS_DHE_RSA_WITH_AES_256_CBC_SHA256" },
    Cipher { value: [0x00, 0x9C], description: "TLS_RSA_WITH_AES_128_GCM_SHA256" },
    Cipher { value: [0x00, 0x9D], description: "TLS_RSA_WITH_AES_256_GCM_SHA384" },
    Cipher { value: [0x00, 0x9E], description: "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256" },
    Cipher { value: [0x00, 0x9F], description: "TLS_DHE_RSA_WITH_AES_256_GCM_SHA384" },
    Cipher { value: [0x00, 0xFF], description: "TLS_EMPTY_RENEGOTIATION_INFO_SCSV" },
    Cipher { value: [0x13, 0x01], description: "TLS_AES_128_GCM_SHA256" },
    Cipher { value: [0x13, 0x02], description: "TLS_AES_256_GCM_SHA384" },
    Cipher { value: [0x13, 0x03], description: "TLS_CHACHA20_POLY1305_SHA256" },
    Cipher { value: [0x56, 0x00], description: "TLS_FALLBACK_SCSV" },
    Cipher { value: [0xC0, 0x09], description: "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA" },
    Cipher { value: [0xC0, 0x0A], description: "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA" },
    Cipher { value: [0xC0, 0x13], description: "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA" },
    Cipher { value: [0xC0, 0x14], description: "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA" },
    Cipher { value: [0xC0, 0x23], description: "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256" },
    Cipher { value: [0xC0, 0x24], description: "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384" },
    Cipher { value: [0xC0, 0x27], description: "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256" },
    Cipher { value: [0xC0, 0x28], description: "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384" },
    Cipher { value: [0xC0, 0x2B], description: "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256" },
    Cipher { value: [0xC0, 0x2C], description: "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384" },
    Cipher { value: [0xC0, 0x2F], description: "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256" },
    Cipher { value: [0xC0, 0x30], description: "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384" },
    Cipher { value: [0xCC, 0xA8], description: "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256" },
    Cipher { value: [0xCC, 0xA9], description: "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256" },
    Cipher { value: [0xCC, 0xAA], description: "TLS_DHE_RSA_WITH_CHACHA20_POLY1305_SHA256" },
];

impl Cipher {
    pub fn all_ciphers() -> Vec<Cipher> {
        // SCSVs signal behavior, they are not something a server can select
        IANA_CIPHERS
            .iter()
            .filter(|c| !c.is_signalling())
            .copied()
            .collect()
    }

    pub fn from_value(value: [u8; 2]) -> Option<Cipher> {
        IANA_CIPHERS.iter().find(|cipher| cipher.value == value).copied()
    }

    pub fn from_description(description: &str) -> Option<Cipher> {
        IANA_CIPHERS
            .iter()
            .find(|cipher| cipher.description == description)
            .copied()
    }

    /// The two byte code point as a single number, e.g. `0xC013`.
    pub fn code(&self) -> u16 {
        u16::from_be_bytes(self.value)
    }

    /// TLS 1.2 suites are spelled `<kx>_<auth>_WITH_<cipher>`, TLS 1.3 suites
    /// only name the AEAD and hash.
    pub fn supports_tls13(&self) -> bool {
        !self.description.contains("_WITH_") && !self.description.ends_with("_SCSV")
    }

    pub fn is_signalling(&self) -> bool {
        self.description.ends_with("_SCSV")
    }
}

impl Display for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for Cipher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cipher::from_description(s).ok_or_else(|| format!("unknown cipher suite {s}"))
    }
}

/// A named group from the IANA "TLS Supported Groups" registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Group {
    pub value: u16,
    pub description: &'static str,
}

const IANA_GROUPS: &[Group] = &[
    Group { value: 23, description: "secp256r1" },
    Group { value: 24, description: "secp384r1" },
    Group { value: 25, description: "secp521r1" },
    Group { value: 29, description: "x25519" },
    Group { value: 30, description: "x448" },
    Group { value: 256, description: "ffdhe2048" },
    Group { value: 257, description: "ffdhe3072" },
    Group { value: 258, description: "ffdhe4096" },
    Group { value: 259, description: "ffdhe6144" },
    Group { value: 260, description: "ffdhe8192" },
];

impl Group {
    pub fn from_value(value: u16) -> Option<Group> {
        IANA_GROUPS.iter().find(|group| group.value == value).copied()
    }

    pub fn from_description(description: &str) -> Option<Group> {
        IANA_GROUPS
            .iter()
            .find(|group| group.description == description)
            .copied()
    }

    /// Finite field groups negotiate DHE, everything else is an elliptic curve.
    pub fn is_ffdhe(&self) -> bool {
        self.description.starts_with("ffdhe")
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// An entry in the IANA "TLS SignatureScheme" registry.
///
/// TLS 1.2 peers send these as a `(hash, signature)` byte pair, which lines up
/// with the scheme code points for the pre TLS 1.3 algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureScheme {
    pub value: u16,
    pub description: &'static str,
}

const IANA_SIGNATURE_SCHEMES: &[SignatureScheme] = &[
    SignatureScheme { value: 0x0201, description: "rsa_pkcs1_sha1" },
    SignatureScheme { value: 0x0203, description: "ecdsa_sha1" },
    SignatureScheme { value: 0x0401, description: "rsa_pkcs1_sha256" },
    SignatureScheme { value: 0x0403, description: "ecdsa_secp256r1_sha256" },
    SignatureScheme { value: 0x0501, description: "rsa_pkcs1_sha384" },
    SignatureScheme { value: 0x0503, description: "ecdsa_secp384r1_sha384" },
    SignatureScheme { value: 0x0601, description: "rsa_pkcs1_sha512" },
    SignatureScheme { value: 0x0603, description: "ecdsa_secp521r1_sha512" },
    SignatureScheme { value: 0x0804, description: "rsa_pss_rsae_sha256" },
    SignatureScheme { value: 0x0805, description: "rsa_pss_rsae_sha384" },
    SignatureScheme { value: 0x0806, description: "rsa_pss_rsae_sha512" },
    SignatureScheme { value: 0x0807, description: "ed25519" },
    SignatureScheme { value: 0x0808, description: "ed448" },
    SignatureScheme { value: 0x0809, description: "rsa_pss_pss_sha256" },
    SignatureScheme { value: 0x080A, description: "rsa_pss_pss_sha384" },
    SignatureScheme { value: 0x080B, description: "rsa_pss_pss_sha512" },
];

impl SignatureScheme {
    pub fn from_value(value: u16) -> Option<SignatureScheme> {
        IANA_SIGNATURE_SCHEMES
            .iter()
            .find(|scheme| scheme.value == value)
            .copied()
    }

    pub fn from_description(description: &str) -> Option<SignatureScheme> {
        IANA_SIGNATURE_SCHEMES
            .iter()
            .find(|scheme| scheme.description == description)
            .copied()
    }
}

impl Display for SignatureScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

#[cfg(test)]
mod cipher_tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn cipher_without_iana_value() {
        assert_eq!(Cipher::from_description("CUSTOM_NOT_IANA"), None);
    }

    #[test]
    fn get_round_trip() {
        const DESCRIPTION: &str = "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA";
        const VALUE: [u8; 2] = [0xC0, 0x13];

        let cipher = Cipher::from_description(DESCRIPTION).unwrap();
        assert_eq!(cipher.value, VALUE);
        assert_eq!(cipher.code(), 0xC013);
        assert_eq!(Cipher::from_value(VALUE), Some(cipher));
    }

    #[test]
    fn scsv_is_not_selectable() {
        assert!(Cipher::all_ciphers().iter().all(|c| !c.is_signalling()));
        assert!(Cipher::from_description("TLS_EMPTY_RENEGOTIATION_INFO_SCSV")
            .unwrap()
            .is_signalling());
    }

    /// The tables are hand maintained, so guard against copy-paste collisions.
    #[test]
    fn registry_uniqueness() {
        let values: HashSet<[u8; 2]> = IANA_CIPHERS.iter().map(|c| c.value).collect();
        let names: HashSet<&str> = IANA_CIPHERS.iter().map(|c| c.description).collect();
        assert_eq!(values.len(), IANA_CIPHERS.len());
        assert_eq!(names.len(), IANA_CIPHERS.len());

        let groups: HashSet<u16> = IANA_GROUPS.iter().map(|g| g.value).collect();
        assert_eq!(groups.len(), IANA_GROUPS.len());

        let schemes: HashSet<u16> = IANA_SIGNATURE_SCHEMES.iter().map(|s| s.value).collect();
        assert_eq!(schemes.len(), IANA_SIGNATURE_SCHEMES.len());
    }
}
