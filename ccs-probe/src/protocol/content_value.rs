use std::{fmt::Display, io::ErrorKind};

use crate::{
    codec::{DecodeByteSource, DecodeValue, DecodeValueWithContext, U24},
    iana,
    protocol::{
        Alert, CertificateTls12, ChangeCipherSpec, ClientHello, ContentType, Finished,
        HandshakeType, ServerHello, ServerHelloDone, ServerKeyExchange,
    },
};

/// A fully framed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentValue {
    Alert(Alert),
    ApplicationData(Vec<u8>),
    Handshake(HandshakeMessageValue),
    ChangeCipherSpec(ChangeCipherSpec),
}

impl ContentValue {
    pub fn content_type(&self) -> ContentType {
        match self {
            ContentValue::Alert(_) => ContentType::Alert,
            ContentValue::ApplicationData(_) => ContentType::ApplicationData,
            ContentValue::Handshake(_) => ContentType::Handshake,
            ContentValue::ChangeCipherSpec(_) => ContentType::ChangeCipherSpec,
        }
    }

    #[cfg(test)]
    pub fn as_handshake(&self) -> &HandshakeMessageValue {
        if let ContentValue::Handshake(hm) = self {
            hm
        } else {
            panic!("content type was {:?}, not handshake", self.content_type());
        }
    }
}

/// Short form used in mismatch errors, e.g. `alert(fatal, unexpected_message)`.
impl Display for ContentValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentValue::Alert(alert) => {
                write!(f, "alert({}, {})", alert.level, alert.description)
            }
            ContentValue::ApplicationData(data) => {
                write!(f, "application_data({} bytes)", data.len())
            }
            ContentValue::Handshake(message) => write!(f, "handshake({message})"),
            ContentValue::ChangeCipherSpec(_) => write!(f, "change_cipher_spec"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessageValue {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    Certificate(CertificateTls12),
    ServerKeyExchange(ServerKeyExchange),
    ServerHelloDone(ServerHelloDone),
    Finished(Finished),
    /// Messages the probe never needs to look inside, e.g. CertificateRequest
    /// or a NewSessionTicket, and code points it doesn't know at all.
    Other { handshake_type: u8, body: Vec<u8> },
}

impl HandshakeMessageValue {
    pub fn handshake_type(&self) -> Option<HandshakeType> {
        match self {
            HandshakeMessageValue::ClientHello(_) => Some(HandshakeType::ClientHello),
            HandshakeMessageValue::ServerHello(_) => Some(HandshakeType::ServerHello),
            HandshakeMessageValue::Certificate(_) => Some(HandshakeType::Certificate),
            HandshakeMessageValue::ServerKeyExchange(_) => Some(HandshakeType::ServerKeyExchange),
            HandshakeMessageValue::ServerHelloDone(_) => Some(HandshakeType::ServerHelloDone),
            HandshakeMessageValue::Finished(_) => Some(HandshakeType::Finished),
            HandshakeMessageValue::Other { handshake_type, .. } => {
                HandshakeType::decode_from(&[*handshake_type])
                    .ok()
                    .map(|(t, _)| t)
            }
        }
    }

    // `cipher` is None until a ServerHello has been accepted
    fn base_decode(
        buffer: &[u8],
        cipher: Option<iana::Cipher>,
    ) -> std::io::Result<(Self, &[u8])> {
        let (raw_type, buffer): (u8, &[u8]) = buffer.decode_value()?;
        let (length, buffer): (U24, &[u8]) = buffer.decode_value()?;
        let length = usize::from(length);
        if buffer.len() < length {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "handshake message of {length} bytes with {} available",
                    buffer.len()
                ),
            ));
        }
        let (body, remaining) = buffer.split_at(length);

        let handshake_type = HandshakeType::decode_from(&[raw_type]).ok().map(|(t, _)| t);
        tracing::trace!(?handshake_type, length, "handshake message header");

        let value = match handshake_type {
            Some(HandshakeType::ClientHello) => {
                HandshakeMessageValue::ClientHello(body.decode_value_exact()?)
            }
            Some(HandshakeType::ServerHello) => {
                HandshakeMessageValue::ServerHello(body.decode_value_exact()?)
            }
            Some(HandshakeType::Certificate) => {
                HandshakeMessageValue::Certificate(body.decode_value_exact()?)
            }
            Some(HandshakeType::ServerKeyExchange) => {
                let cipher = needs_cipher(HandshakeType::ServerKeyExchange, cipher)?;
                let (message, rest) = ServerKeyExchange::decode_from_with_context(body, cipher)?;
                if !rest.is_empty() {
                    return Err(std::io::Error::new(
                        ErrorKind::InvalidData,
                        format!("{} trailing bytes after ServerKeyExchange", rest.len()),
                    ));
                }
                HandshakeMessageValue::ServerKeyExchange(message)
            }
            Some(HandshakeType::ServerHelloDone) => {
                HandshakeMessageValue::ServerHelloDone(body.decode_value_exact()?)
            }
            Some(HandshakeType::Finished) => {
                HandshakeMessageValue::Finished(body.decode_value_exact()?)
            }
            _ => HandshakeMessageValue::Other {
                handshake_type: raw_type,
                body: body.to_vec(),
            },
        };

        Ok((value, remaining))
    }
}

impl Display for HandshakeMessageValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self, self.handshake_type()) {
            (_, Some(handshake_type)) => write!(f, "{handshake_type}"),
            (HandshakeMessageValue::Other { handshake_type, .. }, None) => {
                write!(f, "unknown handshake type {handshake_type}")
            }
            (_, None) => write!(f, "unknown handshake type"),
        }
    }
}

fn needs_cipher(
    handshake_type: HandshakeType,
    cipher_context: Option<iana::Cipher>,
) -> std::io::Result<iana::Cipher> {
    if let Some(cipher) = cipher_context {
        Ok(cipher)
    } else {
        Err(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("decoding {handshake_type} requires a cipher to be selected"),
        ))
    }
}

impl DecodeValue for HandshakeMessageValue {
    fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        Self::base_decode(buffer, None)
    }
}

impl DecodeValueWithContext for HandshakeMessageValue {
    type Context = Option<iana::Cipher>;

    fn decode_from_with_context(
        buffer: &[u8],
        context: Self::Context,
    ) -> std::io::Result<(Self, &[u8])> {
        Self::base_decode(buffer, context)
    }
}
