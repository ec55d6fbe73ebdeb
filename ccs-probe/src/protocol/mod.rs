pub mod content_value;
pub mod extensions;
pub mod messages;

use crate::codec::{DecodeByteSource, DecodeValue, EncodeValue};
use ccs_probe_macros::{ByteValue, DecodeEnum, EncodeEnum};
pub use content_value::{ContentValue, HandshakeMessageValue};
pub use messages::*;

/// ContentType is a field on TLS records indicating the kind of data that the
/// record holds.
///
/// - [RFC reference](https://www.rfc-editor.org/rfc/rfc5246#section-6.2.1)
/// - [IANA reference](https://www.iana.org/assignments/tls-parameters/tls-parameters.xhtml#tls-parameters-5)
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    strum::EnumIter,
    strum::Display,
    ByteValue,
    EncodeEnum,
    DecodeEnum,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

/// The message contained in Handshake content.
///
/// https://www.iana.org/assignments/tls-parameters/tls-parameters.xhtml#tls-parameters-7
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    strum::EnumIter,
    strum::Display,
    ByteValue,
    EncodeEnum,
    DecodeEnum,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
    CertificateStatus = 22,
}

/// [RFC reference](https://www.rfc-editor.org/rfc/rfc5246#section-7.2)
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    strum::EnumIter,
    strum::Display,
    ByteValue,
    EncodeEnum,
    DecodeEnum,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// [RFC reference](https://www.rfc-editor.org/rfc/rfc5246#section-7.2)
/// [IANA](https://www.iana.org/assignments/tls-parameters/tls-parameters.xhtml#tls-parameters-6)
///
/// Displays as the RFC spelling, e.g. `unexpected_message`.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    strum::EnumIter,
    strum::Display,
    ByteValue,
    EncodeEnum,
    DecodeEnum,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    DecryptionFailed = 21,
    RecordOverflow = 22,
    DecompressionFailure = 30,
    HandshakeFailure = 40,
    NoCertificate = 41,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateRevoked = 44,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    #[strum(serialize = "unknown_ca")]
    UnknownCA = 48,
    AccessDenied = 49,
    DecodeError = 50,
    DecryptError = 51,
    ExportRestriction = 60,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    InappropriateFallback = 86,
    UserCanceled = 90,
    NoRenegotiation = 100,
    MissingExtension = 109,
    UnsupportedExtension = 110,
    UnrecognizedName = 112,
    BadCertificateStatusResponse = 113,
    #[strum(serialize = "unknown_psk_identity")]
    UnknownPSKIdentity = 115,
    CertificateRequired = 116,
    NoApplicationProtocol = 120,
}
