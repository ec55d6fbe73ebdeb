pub mod constants;
mod definitions;

use crate::codec::{DecodeByteSource, DecodeValue, EncodeValue};
use byteorder::{BigEndian, ReadBytesExt};
pub use definitions::*;
use ccs_probe_macros::{ByteValue, DecodeEnum, EncodeEnum};
use std::io::{self, ErrorKind, Read};

impl DecodeValue for SignatureScheme {
    fn decode_from(mut buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        let value = buffer.read_u16::<BigEndian>()?;
        match SignatureScheme::from_value(value) {
            Some(signature) => Ok((signature, buffer)),
            None => Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("unrecognized signature scheme {value:#06x}"),
            )),
        }
    }
}

impl DecodeValue for Group {
    fn decode_from(mut buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        let value = buffer.read_u16::<BigEndian>()?;
        match Group::from_value(value) {
            Some(group) => Ok((group, buffer)),
            None => Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("unrecognized group value {value}"),
            )),
        }
    }
}

impl DecodeValue for Cipher {
    fn decode_from(mut buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        let mut value = [0; 2];
        buffer.read_exact(&mut value)?;
        match Cipher::from_value(value) {
            Some(cipher) => Ok((cipher, buffer)),
            None => {
                tracing::warn!("unrecognized cipher {:?}", value);
                Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("unrecognized cipher value {}", hex::encode(value)),
                ))
            }
        }
    }
}

impl EncodeValue for SignatureScheme {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
        self.value.encode_to(buffer)
    }
}

impl EncodeValue for Group {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
        self.value.encode_to(buffer)
    }
}

impl EncodeValue for Cipher {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
        self.value.encode_to(buffer)
    }
}

impl SignatureScheme {
    /// Look up the scheme whose code point is the TLS 1.2 `(hash, signature)`
    /// byte pair, e.g. `sha256` + `rsa` is `rsa_pkcs1_sha256`.
    pub fn from_hash_and_signature(
        hash: HashAlgorithm,
        signature: SignatureAlgorithm,
    ) -> Option<SignatureScheme> {
        let value = u16::from_be_bytes([hash.byte_value(), signature.byte_value()]);
        SignatureScheme::from_value(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, ByteValue, DecodeEnum, EncodeEnum)]
#[repr(u16)]
pub enum Protocol {
    SSLv3 = 0x0300,
    TLSv1_0 = 0x0301,
    TLSv1_1 = 0x0302,
    TLSv1_2 = 0x0303,
    TLSv1_3 = 0x0304,
}

/// Defined in https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.1.4.1
///
/// `Intrinsic` is the RFC 8422 marker used by the EdDSA pairs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, ByteValue, EncodeEnum, DecodeEnum,
)]
#[repr(u8)]
pub enum HashAlgorithm {
    None = 0,
    Md5 = 1,
    Sha1 = 2,
    Sha224 = 3,
    Sha256 = 4,
    Sha384 = 5,
    Sha512 = 6,
    Intrinsic = 8,
}

impl HashAlgorithm {
    /// Parse the short names used on the command line (`sha256`, `md5`, ...).
    pub fn from_name(name: &str) -> Option<HashAlgorithm> {
        use strum::IntoEnumIterator;
        HashAlgorithm::iter().find(|h| format!("{h:?}").eq_ignore_ascii_case(name))
    }
}

/// Defined in https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.1.4.1,
/// with the EdDSA values from RFC 8422.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, ByteValue, EncodeEnum, DecodeEnum,
)]
#[repr(u8)]
pub enum SignatureAlgorithm {
    Anonymous = 0,
    Rsa = 1,
    Dsa = 2,
    Ecdsa = 3,
    Ed25519 = 7,
    Ed448 = 8,
}

impl SignatureAlgorithm {
    pub fn from_name(name: &str) -> Option<SignatureAlgorithm> {
        use strum::IntoEnumIterator;
        SignatureAlgorithm::iter().find(|s| format!("{s:?}").eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchange {
    Rsa,
    Dhe,
    Ecdhe,
}

/// The record protection half of a TLS 1.2 cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkCipher {
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl BulkCipher {
    pub fn key_len(&self) -> usize {
        match self {
            BulkCipher::Aes128Cbc | BulkCipher::Aes128Gcm => 16,
            BulkCipher::Aes256Cbc | BulkCipher::Aes256Gcm | BulkCipher::ChaCha20Poly1305 => 32,
        }
    }

    /// Bytes of IV taken from the key block.
    ///
    /// TLS 1.2 CBC records carry an explicit IV, GCM takes a 4 byte salt and
    /// ChaCha20 a full 12 byte nonce mask (RFC 7905).
    pub fn fixed_iv_len(&self) -> usize {
        match self {
            BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc => 0,
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm => 4,
            BulkCipher::ChaCha20Poly1305 => 12,
        }
    }

    pub fn is_aead(&self) -> bool {
        !matches!(self, BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc)
    }
}

/// MAC of a MAC-then-encrypt suite. AEAD suites have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAlgorithm {
    HmacSha1,
    HmacSha256,
    HmacSha384,
}

impl MacAlgorithm {
    pub fn mac_len(&self) -> usize {
        match self {
            MacAlgorithm::HmacSha1 => 20,
            MacAlgorithm::HmacSha256 => 32,
            MacAlgorithm::HmacSha384 => 48,
        }
    }
}

impl Cipher {
    /// Return the key exchange used for the cipher.
    ///
    /// This will be None for TLS 1.3 suites and SCSVs.
    pub fn key_exchange(&self) -> Option<KeyExchange> {
        let description = self.description;
        if description.starts_with("TLS_DHE_") {
            Some(KeyExchange::Dhe)
        } else if description.starts_with("TLS_ECDHE_") {
            Some(KeyExchange::Ecdhe)
        } else if description.starts_with("TLS_RSA_") {
            Some(KeyExchange::Rsa)
        } else {
            None
        }
    }

    /// `true` when the server must send a ServerKeyExchange for this suite.
    pub fn is_ephemeral(&self) -> bool {
        matches!(
            self.key_exchange(),
            Some(KeyExchange::Dhe) | Some(KeyExchange::Ecdhe)
        )
    }

    pub fn bulk_cipher(&self) -> Option<BulkCipher> {
        let (_, cipher) = self.description.split_once("_WITH_")?;
        if cipher.starts_with("AES_128_CBC") {
            Some(BulkCipher::Aes128Cbc)
        } else if cipher.starts_with("AES_256_CBC") {
            Some(BulkCipher::Aes256Cbc)
        } else if cipher.starts_with("AES_128_GCM") {
            Some(BulkCipher::Aes128Gcm)
        } else if cipher.starts_with("AES_256_GCM") {
            Some(BulkCipher::Aes256Gcm)
        } else if cipher.starts_with("CHACHA20_POLY1305") {
            Some(BulkCipher::ChaCha20Poly1305)
        } else {
            None
        }
    }

    /// None for AEAD suites.
    pub fn mac(&self) -> Option<MacAlgorithm> {
        if self.bulk_cipher()?.is_aead() {
            return None;
        }
        if self.description.ends_with("_SHA384") {
            Some(MacAlgorithm::HmacSha384)
        } else if self.description.ends_with("_SHA256") {
            Some(MacAlgorithm::HmacSha256)
        } else if self.description.ends_with("_SHA") {
            Some(MacAlgorithm::HmacSha1)
        } else {
            None
        }
    }

    /// The hash behind the TLS 1.2 PRF and the handshake transcript.
    ///
    /// Suites that name SHA or SHA256 use SHA-256, SHA384 suites use SHA-384.
    pub fn prf_hash(&self) -> HashAlgorithm {
        if self.description.ends_with("SHA384") {
            HashAlgorithm::Sha384
        } else {
            HashAlgorithm::Sha256
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sanity check that the generated constants have the expected values.
    #[test]
    fn constants_match() {
        assert_eq!(
            constants::TLS_DHE_RSA_WITH_AES_128_CBC_SHA.description,
            "TLS_DHE_RSA_WITH_AES_128_CBC_SHA"
        );
        assert_eq!(constants::TLS_DHE_RSA_WITH_AES_128_CBC_SHA.value, [0x00, 0x33]);
        assert_eq!(constants::ffdhe2048.value, 256);
        assert_eq!(constants::ed448.value, 0x0808);
    }

    #[test]
    fn cipher_parameters() {
        let cipher = constants::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA;
        assert_eq!(cipher.key_exchange(), Some(KeyExchange::Ecdhe));
        assert_eq!(cipher.bulk_cipher(), Some(BulkCipher::Aes128Cbc));
        assert_eq!(cipher.mac(), Some(MacAlgorithm::HmacSha1));
        assert_eq!(cipher.prf_hash(), HashAlgorithm::Sha256);

        let cipher = constants::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384;
        assert_eq!(cipher.bulk_cipher(), Some(BulkCipher::Aes256Gcm));
        assert_eq!(cipher.mac(), None);
        assert_eq!(cipher.prf_hash(), HashAlgorithm::Sha384);

        let cipher = constants::TLS_RSA_WITH_AES_256_CBC_SHA256;
        assert_eq!(cipher.key_exchange(), Some(KeyExchange::Rsa));
        assert!(!cipher.is_ephemeral());
        assert_eq!(cipher.mac(), Some(MacAlgorithm::HmacSha256));

        assert_eq!(constants::TLS_AES_128_GCM_SHA256.key_exchange(), None);
        assert_eq!(constants::TLS_EMPTY_RENEGOTIATION_INFO_SCSV.bulk_cipher(), None);
    }

    /// Every suite a TLS 1.2 server can select must be fully described.
    #[test]
    fn tls12_suites_are_complete() {
        for cipher in Cipher::all_ciphers().iter().filter(|c| !c.supports_tls13()) {
            assert!(cipher.key_exchange().is_some(), "{cipher}");
            let bulk = cipher.bulk_cipher().unwrap();
            assert_eq!(bulk.is_aead(), cipher.mac().is_none(), "{cipher}");
        }
    }

    #[test]
    fn hash_and_signature_pairs() {
        let scheme =
            SignatureScheme::from_hash_and_signature(HashAlgorithm::Sha256, SignatureAlgorithm::Rsa);
        assert_eq!(scheme, Some(constants::rsa_pkcs1_sha256));
        let scheme = SignatureScheme::from_hash_and_signature(
            HashAlgorithm::Intrinsic,
            SignatureAlgorithm::Ed25519,
        );
        assert_eq!(scheme, Some(constants::ed25519));
        assert_eq!(HashAlgorithm::from_name("SHA384"), Some(HashAlgorithm::Sha384));
        assert_eq!(SignatureAlgorithm::from_name("ecdsa"), Some(SignatureAlgorithm::Ecdsa));
        assert_eq!(SignatureAlgorithm::from_name("rsapss"), None);
    }

    #[test]
    fn unknown_protocol_is_an_error() {
        let bytes = [0x03u8, 0x09];
        let err = Protocol::decode_from(&bytes).unwrap_err();
        assert!(err.to_string().contains("not a valid Protocol"));
        let (tls12, _): (Protocol, &[u8]) = [0x03u8, 0x03].as_slice().decode_value().unwrap();
        assert_eq!(tls12, Protocol::TLSv1_2);
    }
}
