//! TLS extensions sent in the ClientHello, and the raw form used for
//! everything a server echoes back.

use crate::{
    codec::{DecodeByteSource, DecodeValue, EncodeBytesSink, EncodeValue},
    iana,
    prefixed_list::{PrefixedBlob, PrefixedList},
};
use ccs_probe_macros::{ByteValue, DecodeEnum, DecodeStruct, EncodeEnum, EncodeStruct};
use strum::IntoEnumIterator;

/// The "basic" extension shape, any extension can be parsed into it.
///
/// The type stays a plain `u16` so unknown code points survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct Extension {
    pub extension_type: u16,
    pub extension_data: PrefixedBlob<u16>,
}

impl Extension {
    pub fn known_type(&self) -> Option<ExtensionType> {
        ExtensionType::iter().find(|t| t.byte_value() == self.extension_type)
    }
}

// https://www.iana.org/assignments/tls-extensiontype-values/tls-extensiontype-values.xhtml#tls-extensiontype-values-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, ByteValue)]
#[repr(u16)]
pub enum ExtensionType {
    ServerName = 0,
    StatusRequest = 5,
    /// Indicates the curves/groups that the client is willing to use for key
    /// exchange. Called "supported curves" before RFC 7919.
    SupportedGroups = 10,
    EcPointFormats = 11,
    SignatureAlgorithms = 13,
    ApplicationLayerProtocolNegotiation = 16,
    EncryptThenMac = 22,
    ExtendedMasterSecret = 23,
    SessionTicket = 35,
    SupportedVersions = 43,
    SignatureAlgorithmsCert = 50,
    KeyShare = 51,
    RenegotiationInfo = 65281,
}

/// https://www.rfc-editor.org/rfc/rfc8422.html#section-5.1.1
#[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct SupportedGroups {
    pub named_curve_list: PrefixedList<iana::Group, u16>,
}

/// Defined in https://datatracker.ietf.org/doc/html/rfc4492#section-5.1.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, ByteValue, DecodeEnum, EncodeEnum)]
#[repr(u8)]
pub enum EcPointFormat {
    Uncompressed = 0,
    AnsiX962CompressedPrime = 1,
    AnsiX962CompressedChar2 = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct EcPointFormatList {
    pub ec_point_format_list: PrefixedList<EcPointFormat, u8>,
}

/// Defined in https://www.ietf.org/rfc/rfc7627.html#section-5.1
#[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct ExtendedMasterSecret {}

/// Defined in https://datatracker.ietf.org/doc/html/rfc5746#section-3.2
#[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct RenegotiationInfo {
    pub renegotiated_connection: PrefixedBlob<u8>,
}

/// Used by both `signature_algorithms` and `signature_algorithms_cert`.
#[derive(Debug, Clone, PartialEq, Eq, DecodeStruct, EncodeStruct)]
pub struct SignatureSchemeList {
    pub supported_signature_algorithms: PrefixedList<iana::SignatureScheme, u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientHelloExtension {
    SupportedGroups(SupportedGroups),
    EcPointFormats(EcPointFormatList),
    SignatureAlgorithms(SignatureSchemeList),
    SignatureAlgorithmsCert(SignatureSchemeList),
    ExtendedMasterSecret(ExtendedMasterSecret),
    RenegotiationInfo(RenegotiationInfo),
    /// anything else is carried verbatim
    Unknown(Extension),
}

impl ClientHelloExtension {
    pub fn extension_type(&self) -> u16 {
        let known = match self {
            ClientHelloExtension::SupportedGroups(_) => ExtensionType::SupportedGroups,
            ClientHelloExtension::EcPointFormats(_) => ExtensionType::EcPointFormats,
            ClientHelloExtension::SignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            ClientHelloExtension::SignatureAlgorithmsCert(_) => {
                ExtensionType::SignatureAlgorithmsCert
            }
            ClientHelloExtension::ExtendedMasterSecret(_) => ExtensionType::ExtendedMasterSecret,
            ClientHelloExtension::RenegotiationInfo(_) => ExtensionType::RenegotiationInfo,
            ClientHelloExtension::Unknown(raw) => return raw.extension_type,
        };
        known.byte_value()
    }
}

impl DecodeValue for ClientHelloExtension {
    fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        let (extension, buffer) = Extension::decode_from(buffer)?;
        let data = extension.extension_data.blob();
        let value = match extension.known_type() {
            Some(ExtensionType::SupportedGroups) => {
                ClientHelloExtension::SupportedGroups(data.decode_value_exact()?)
            }
            Some(ExtensionType::EcPointFormats) => {
                ClientHelloExtension::EcPointFormats(data.decode_value_exact()?)
            }
            Some(ExtensionType::SignatureAlgorithms) => {
                ClientHelloExtension::SignatureAlgorithms(data.decode_value_exact()?)
            }
            Some(ExtensionType::SignatureAlgorithmsCert) => {
                ClientHelloExtension::SignatureAlgorithmsCert(data.decode_value_exact()?)
            }
            Some(ExtensionType::ExtendedMasterSecret) => {
                ClientHelloExtension::ExtendedMasterSecret(data.decode_value_exact()?)
            }
            Some(ExtensionType::RenegotiationInfo) => {
                ClientHelloExtension::RenegotiationInfo(data.decode_value_exact()?)
            }
            _ => ClientHelloExtension::Unknown(extension),
        };
        Ok((value, buffer))
    }
}

impl EncodeValue for ClientHelloExtension {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
        let extension_data = match self {
            ClientHelloExtension::SupportedGroups(e) => e.encode_to_vec(),
            ClientHelloExtension::EcPointFormats(e) => e.encode_to_vec(),
            ClientHelloExtension::SignatureAlgorithms(e) => e.encode_to_vec(),
            ClientHelloExtension::SignatureAlgorithmsCert(e) => e.encode_to_vec(),
            ClientHelloExtension::ExtendedMasterSecret(e) => e.encode_to_vec(),
            ClientHelloExtension::RenegotiationInfo(e) => e.encode_to_vec(),
            ClientHelloExtension::Unknown(raw) => return buffer.encode_value(raw),
        }?;
        let raw = Extension {
            extension_type: self.extension_type(),
            extension_data: PrefixedBlob::new(extension_data)?,
        };
        buffer.encode_value(&raw)
    }
}
