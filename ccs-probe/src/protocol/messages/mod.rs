//! Handshake and record level message definitions for TLS 1.2.

mod members;

pub use members::server_key_exchange;

use crate::{
    codec::{
        DecodeByteSource, DecodeValue, DecodeValueWithContext, EncodeBytesSink, EncodeValue, U24,
    },
    iana::{self, HashAlgorithm, KeyExchange, Protocol, SignatureAlgorithm},
    prefixed_list::{PrefixedBlob, PrefixedList},
    protocol::{
        extensions::{ClientHelloExtension, Extension, ExtensionType},
        AlertDescription, AlertLevel, ContentType, HandshakeType,
    },
};
use ccs_probe_macros::{ByteValue, DecodeEnum, DecodeStruct, EncodeEnum, EncodeStruct};
use std::io::ErrorKind;

#[derive(Clone, Debug, PartialEq, Eq, EncodeStruct, DecodeStruct)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub protocol_version: Protocol,
    pub record_length: u16,
}

impl RecordHeader {
    pub const LENGTH: usize = 5;
}

#[derive(Clone, Debug, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct HandshakeMessageHeader {
    pub handshake_type: HandshakeType,
    pub handshake_message_length: U24,
}

impl HandshakeMessageHeader {
    pub const LENGTH: usize = 4;
}

/// Defined in https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.1.2
#[derive(Clone, Debug, PartialEq, Eq, EncodeStruct)]
pub struct ClientHello {
    pub protocol_version: Protocol,
    pub random: [u8; 32],
    pub session_id: PrefixedBlob<u8>,
    pub offered_ciphers: PrefixedList<iana::Cipher, u16>,
    pub compression_methods: PrefixedBlob<u8>,
    /// Extensions are optional, and were not present in SSLv3 and TLS 1.0
    pub extensions: Option<PrefixedList<ClientHelloExtension, u16>>,
}

impl ClientHello {
    /// Return the list of groups that the client supports
    pub fn supported_groups(&self) -> Option<Vec<iana::Group>> {
        for e in self.extensions.as_ref()?.list() {
            if let ClientHelloExtension::SupportedGroups(groups) = e {
                return Some(groups.named_curve_list.list().to_vec());
            }
        }
        None
    }

    pub fn offers_extended_master_secret(&self) -> bool {
        self.extensions.as_ref().is_some_and(|extensions| {
            extensions
                .list()
                .iter()
                .any(|e| matches!(e, ClientHelloExtension::ExtendedMasterSecret(_)))
        })
    }
}

impl DecodeValue for ClientHello {
    fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        let (protocol_version, buffer) = buffer.decode_value()?;
        let (random, buffer) = buffer.decode_value()?;
        let (session_id, buffer) = buffer.decode_value()?;
        let (offered_ciphers, buffer) = buffer.decode_value()?;
        let (compression_methods, buffer) = buffer.decode_value()?;

        // a hello without extensions simply ends after the compression methods
        let (extensions, buffer) = if buffer.is_empty() {
            (None, buffer)
        } else {
            let (extensions, buffer) = buffer.decode_value()?;
            (Some(extensions), buffer)
        };

        let value = Self {
            protocol_version,
            random,
            session_id,
            offered_ciphers,
            compression_methods,
            extensions,
        };
        Ok((value, buffer))
    }
}

/// Defined in https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.1.3
#[derive(Debug, Clone, PartialEq, Eq, EncodeStruct)]
pub struct ServerHello {
    pub protocol_version: Protocol,
    pub random: [u8; 32],
    pub session_id_echo: PrefixedBlob<u8>,
    /// the cipher suite selected by the server
    pub cipher_suite: iana::Cipher,
    pub compression_method: u8,
    pub extensions: Option<PrefixedList<Extension, u16>>,
}

impl ServerHello {
    pub fn has_extension(&self, extension_type: ExtensionType) -> bool {
        self.extensions.as_ref().is_some_and(|extensions| {
            extensions
                .list()
                .iter()
                .any(|e| e.extension_type == extension_type.byte_value())
        })
    }
}

impl DecodeValue for ServerHello {
    fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        let (protocol_version, buffer) = buffer.decode_value()?;
        let (random, buffer) = buffer.decode_value()?;
        let (session_id_echo, buffer) = buffer.decode_value()?;
        let (cipher_suite, buffer) = buffer.decode_value()?;
        let (compression_method, buffer) = buffer.decode_value()?;
        let (extensions, buffer) = if buffer.is_empty() {
            (None, buffer)
        } else {
            let (extensions, buffer) = buffer.decode_value()?;
            (Some(extensions), buffer)
        };

        let value = Self {
            protocol_version,
            random,
            session_id_echo,
            cipher_suite,
            compression_method,
            extensions,
        };
        Ok((value, buffer))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EncodeStruct, DecodeStruct)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumIter, ByteValue, EncodeEnum, DecodeEnum)]
#[repr(u8)]
pub enum ChangeCipherSpec {
    ChangeCipherSpec = 1,
}

#[derive(Clone, Debug, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

/// The algorithm field of a TLS 1.2 `DigitallySigned`.
///
/// Older pairs decode as `(hash, signature)`, anything that doesn't fit that
/// shape (e.g. RSA-PSS) is looked up as a TLS 1.3 style scheme instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigHashOrScheme {
    SignatureScheme(iana::SignatureScheme),
    SignatureHash(SignatureAndHashAlgorithm),
}

impl DecodeValue for SigHashOrScheme {
    fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        if let Ok((value, buffer)) = buffer.decode_value() {
            Ok((Self::SignatureHash(value), buffer))
        } else {
            let (value, buffer) = buffer.decode_value()?;
            Ok((Self::SignatureScheme(value), buffer))
        }
    }
}

impl EncodeValue for SigHashOrScheme {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
        match self {
            SigHashOrScheme::SignatureScheme(value) => value.encode_to(buffer)?,
            SigHashOrScheme::SignatureHash(value) => value.encode_to(buffer)?,
        }
        Ok(())
    }
}

///   struct {
///      SignatureAndHashAlgorithm algorithm;
///      opaque signature<0..2^16-1>;
///   } DigitallySigned;
/// https://datatracker.ietf.org/doc/html/rfc5246#section-4.7
#[derive(Debug, Clone, PartialEq, Eq, EncodeStruct, DecodeStruct)]
pub struct DigitallySignedElement {
    pub algorithm: SigHashOrScheme,
    pub signature: PrefixedBlob<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct Asn1Cert {
    pub cert_data: PrefixedBlob<U24>,
}

/// Defined in https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.2
#[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct CertificateTls12 {
    pub certificate_list: PrefixedList<Asn1Cert, U24>,
}

impl CertificateTls12 {
    /// DER of the end entity certificate.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.certificate_list
            .list()
            .first()
            .map(|cert| cert.cert_data.blob())
    }
}

/// This message is used in TLS 1.2 to convey the server's ephemeral key
/// material, and is omitted for RSA key transport suites.
///
/// The layout isn't self describing: it depends on the key exchange of the
/// cipher suite the server picked in its ServerHello, so decoding needs that
/// cipher as context.
///
/// Defined in https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.3
/// Extended in https://datatracker.ietf.org/doc/html/rfc4492#section-5.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKeyExchange {
    Ecdhe {
        params: server_key_exchange::ServerEcdhParams,
        signature: DigitallySignedElement,
    },
    Dhe {
        params: server_key_exchange::ServerDhParams,
        signature: DigitallySignedElement,
    },
}

impl DecodeValueWithContext for ServerKeyExchange {
    type Context = iana::Cipher;

    fn decode_from_with_context(
        buffer: &[u8],
        context: Self::Context,
    ) -> std::io::Result<(Self, &[u8])> {
        match context.key_exchange() {
            Some(KeyExchange::Dhe) => {
                let (params, buffer) = buffer.decode_value()?;
                let (signature, buffer) = buffer.decode_value()?;
                Ok((Self::Dhe { params, signature }, buffer))
            }
            Some(KeyExchange::Ecdhe) => {
                let (params, buffer) = buffer.decode_value()?;
                let (signature, buffer) = buffer.decode_value()?;
                Ok((Self::Ecdhe { params, signature }, buffer))
            }
            Some(KeyExchange::Rsa) | None => Err(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("{context} does not use a server key exchange"),
            )),
        }
    }
}

/// Defined in https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.5
#[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct ServerHelloDone {}

/// Defined in https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.7
///
/// The body has no length of its own at the outer level, the variant is
/// decided by the negotiated key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKeyExchange {
    /// RSA encrypted premaster secret
    Rsa(PrefixedBlob<u16>),
    /// client DH public value `dh_Yc`
    Dhe(PrefixedBlob<u16>),
    /// client EC point
    Ecdhe(PrefixedBlob<u8>),
}

impl EncodeValue for ClientKeyExchange {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
        match self {
            ClientKeyExchange::Rsa(blob) | ClientKeyExchange::Dhe(blob) => {
                buffer.encode_value(blob)
            }
            ClientKeyExchange::Ecdhe(blob) => buffer.encode_value(blob),
        }
    }
}

impl DecodeValueWithContext for ClientKeyExchange {
    type Context = KeyExchange;

    fn decode_from_with_context(
        buffer: &[u8],
        context: Self::Context,
    ) -> std::io::Result<(Self, &[u8])> {
        match context {
            KeyExchange::Rsa => {
                let (blob, buffer) = buffer.decode_value()?;
                Ok((Self::Rsa(blob), buffer))
            }
            KeyExchange::Dhe => {
                let (blob, buffer) = buffer.decode_value()?;
                Ok((Self::Dhe(blob), buffer))
            }
            KeyExchange::Ecdhe => {
                let (blob, buffer) = buffer.decode_value()?;
                Ok((Self::Ecdhe(blob), buffer))
            }
        }
    }
}

/// Defined in https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.9
///
/// `verify_data` fills the whole handshake body, 12 bytes for every TLS 1.2
/// suite this crate negotiates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

impl Finished {
    pub const VERIFY_DATA_LENGTH: usize = 12;
}

impl DecodeValue for Finished {
    fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        let value = Self {
            verify_data: buffer.to_vec(),
        };
        Ok((value, &[]))
    }
}

impl EncodeValue for Finished {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
        buffer.extend_from_slice(&self.verify_data);
        Ok(())
    }
}

/// Prefix `body` with a handshake message header.
pub fn handshake_message(handshake_type: HandshakeType, body: &[u8]) -> std::io::Result<Vec<u8>> {
    let header = HandshakeMessageHeader {
        handshake_type,
        handshake_message_length: body.len().try_into()?,
    };
    let mut message = header.encode_to_vec()?;
    message.extend_from_slice(body);
    Ok(message)
}
