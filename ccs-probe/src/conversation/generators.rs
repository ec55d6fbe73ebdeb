use std::{
    fmt::Display,
    io::{Read, Write},
};

use crate::{
    codec::EncodeValue,
    crypto::Sender,
    error::ConversationError,
    iana::{self, KeyExchange, Protocol},
    prefixed_list::{PrefixedBlob, PrefixedList},
    protocol::{
        extensions::{
            ClientHelloExtension, ExtendedMasterSecret, SignatureSchemeList, SupportedGroups,
        },
        handshake_message, Alert, AlertDescription, AlertLevel, ClientHello, ClientKeyExchange,
        ContentType, Finished, HandshakeType,
    },
    session::Session,
};

/// Parameters of a ClientHello. The session id is always empty and the only
/// compression method is `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHelloParams {
    pub ciphers: Vec<iana::Cipher>,
    pub groups: Vec<iana::Group>,
    /// offered in both `signature_algorithms` and `signature_algorithms_cert`
    pub signature_schemes: Vec<iana::SignatureScheme>,
    pub extended_master_secret: bool,
}

impl ClientHelloParams {
    /// The ClientHello body for `random`, without the handshake header.
    pub fn client_hello(&self, random: [u8; 32]) -> std::io::Result<ClientHello> {
        let mut extensions = Vec::new();
        if self.extended_master_secret {
            extensions.push(ClientHelloExtension::ExtendedMasterSecret(
                ExtendedMasterSecret {},
            ));
        }
        extensions.push(ClientHelloExtension::SupportedGroups(SupportedGroups {
            named_curve_list: PrefixedList::new(self.groups.clone())?,
        }));
        extensions.push(ClientHelloExtension::SignatureAlgorithms(
            SignatureSchemeList {
                supported_signature_algorithms: PrefixedList::new(
                    self.signature_schemes.clone(),
                )?,
            },
        ));
        extensions.push(ClientHelloExtension::SignatureAlgorithmsCert(
            SignatureSchemeList {
                supported_signature_algorithms: PrefixedList::new(
                    self.signature_schemes.clone(),
                )?,
            },
        ));

        Ok(ClientHello {
            protocol_version: Protocol::TLSv1_2,
            random,
            session_id: PrefixedBlob::new(Vec::new())?,
            offered_ciphers: PrefixedList::new(self.ciphers.clone())?,
            compression_methods: PrefixedBlob::new(vec![0])?,
            extensions: Some(PrefixedList::new(extensions)?),
        })
    }
}

/// Something the client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generator {
    ClientHello(ClientHelloParams),
    /// key exchange for whatever suite the server picked
    ClientKeyExchange,
    /// A fake ChangeCipherSpec is injected out of band. It leaves the keys
    /// alone and never touches the transcript.
    ChangeCipherSpec { fake: bool },
    Finished,
    ApplicationData(Vec<u8>),
    Alert {
        level: AlertLevel,
        description: AlertDescription,
    },
    /// Build `inner` and cut its handshake bytes into records of
    /// `fragment_size` bytes. The first is sent now, the rest are parked in
    /// `queue` for `PopFragment`.
    SplitMessage {
        inner: Box<Generator>,
        fragment_size: usize,
        queue: String,
    },
    PopFragment { queue: String },
}

impl Display for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Generator::ClientHello(_) => write!(f, "client_hello"),
            Generator::ClientKeyExchange => write!(f, "client_key_exchange"),
            Generator::ChangeCipherSpec { fake: true } => write!(f, "fake change_cipher_spec"),
            Generator::ChangeCipherSpec { fake: false } => write!(f, "change_cipher_spec"),
            Generator::Finished => write!(f, "finished"),
            Generator::ApplicationData(data) => write!(f, "application_data({} bytes)", data.len()),
            Generator::Alert { level, description } => write!(f, "alert({level}, {description})"),
            Generator::SplitMessage {
                inner,
                fragment_size,
                queue,
            } => write!(f, "{inner} in {fragment_size} byte fragments, rest to {queue}"),
            Generator::PopFragment { queue } => write!(f, "next fragment from {queue}"),
        }
    }
}

/// A handshake message, plus the premaster secret if building it ran a key
/// exchange.
struct HandshakeOutput {
    message: Vec<u8>,
    premaster_secret: Option<Vec<u8>>,
}

impl Generator {
    pub fn generate<S: Read + Write>(
        &self,
        session: &mut Session<S>,
    ) -> Result<(), ConversationError> {
        match self {
            Generator::ClientHello(_) | Generator::ClientKeyExchange | Generator::Finished => {
                let output = self.build_handshake(session)?;
                session.send_handshake(&output.message)?;
                if let Some(premaster_secret) = output.premaster_secret {
                    session.derive_keys(&premaster_secret)?;
                }
            }
            Generator::ChangeCipherSpec { fake: true } => {
                session.inject_record(ContentType::ChangeCipherSpec, &[1])?;
            }
            Generator::ChangeCipherSpec { fake: false } => {
                session.send_record(ContentType::ChangeCipherSpec, &[1])?;
                session.activate_write_keys()?;
            }
            Generator::ApplicationData(data) => {
                session.send_record(ContentType::ApplicationData, data)?;
            }
            Generator::Alert { level, description } => {
                let alert = Alert {
                    level: *level,
                    description: *description,
                };
                session.send_record(ContentType::Alert, &alert.encode_to_vec()?)?;
            }
            Generator::SplitMessage {
                inner,
                fragment_size,
                queue,
            } => {
                if *fragment_size == 0 {
                    return Err(ConversationError::State(
                        "fragment size must be at least one byte".to_owned(),
                    ));
                }
                let output = inner.build_handshake(session)?;
                // the peer reassembles the fragments, so the transcript holds
                // the message once
                session.append_transcript(&output.message);

                let mut fragments = output
                    .message
                    .chunks(*fragment_size)
                    .map(<[u8]>::to_vec);
                if let Some(first) = fragments.next() {
                    session.send_record(ContentType::Handshake, &first)?;
                }
                let fragments: Vec<Vec<u8>> = fragments.collect();
                tracing::debug!(%queue, parked = fragments.len(), "split message");
                session.park_fragments(queue, fragments);

                if let Some(premaster_secret) = output.premaster_secret {
                    session.derive_keys(&premaster_secret)?;
                }
            }
            Generator::PopFragment { queue } => {
                let fragment = session.pop_fragment(queue).ok_or_else(|| {
                    ConversationError::State(format!("no fragments left in queue {queue}"))
                })?;
                session.send_record(ContentType::Handshake, &fragment)?;
            }
        }
        Ok(())
    }

    fn build_handshake<S: Read + Write>(
        &self,
        session: &mut Session<S>,
    ) -> Result<HandshakeOutput, ConversationError> {
        match self {
            Generator::ClientHello(params) => {
                let random: [u8; 32] = rand::random();
                let hello = params.client_hello(random)?;
                session.set_client_hello(random, hello.offers_extended_master_secret());
                Ok(HandshakeOutput {
                    message: handshake_message(HandshakeType::ClientHello, &hello.encode_to_vec()?)?,
                    premaster_secret: None,
                })
            }
            Generator::ClientKeyExchange => {
                let (kx, output) = session.client_key_exchange()?;
                let body = match kx {
                    KeyExchange::Rsa => {
                        ClientKeyExchange::Rsa(PrefixedBlob::new(output.client_public)?)
                    }
                    KeyExchange::Dhe => {
                        ClientKeyExchange::Dhe(PrefixedBlob::new(output.client_public)?)
                    }
                    KeyExchange::Ecdhe => {
                        ClientKeyExchange::Ecdhe(PrefixedBlob::new(output.client_public)?)
                    }
                };
                Ok(HandshakeOutput {
                    message: handshake_message(
                        HandshakeType::ClientKeyExchange,
                        &body.encode_to_vec()?,
                    )?,
                    premaster_secret: Some(output.premaster_secret),
                })
            }
            Generator::Finished => {
                // computed over everything before this message
                let finished = Finished {
                    verify_data: session.verify_data(Sender::Client)?,
                };
                Ok(HandshakeOutput {
                    message: handshake_message(HandshakeType::Finished, &finished.encode_to_vec()?)?,
                    premaster_secret: None,
                })
            }
            other => Err(ConversationError::State(format!(
                "{other:?} does not produce a handshake message"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::DecodeValue,
        iana::constants,
        protocol::{HandshakeMessageValue, RecordHeader},
        testing::ScriptedStream,
    };

    fn params() -> ClientHelloParams {
        ClientHelloParams {
            ciphers: vec![constants::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA],
            groups: vec![constants::secp256r1],
            signature_schemes: vec![constants::rsa_pkcs1_sha256],
            extended_master_secret: true,
        }
    }

    /// Split a byte stream into (content type, payload) records.
    fn records(mut wire: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut records = Vec::new();
        while !wire.is_empty() {
            let (header, rest) = RecordHeader::decode_from(wire).unwrap();
            let length = header.record_length as usize;
            records.push((header.content_type.byte_value(), rest[..length].to_vec()));
            wire = &rest[length..];
        }
        records
    }

    #[test]
    fn client_hello_extension_order() -> std::io::Result<()> {
        let hello = params().client_hello([0; 32])?;
        let order: Vec<u16> = hello
            .extensions
            .as_ref()
            .unwrap()
            .list()
            .iter()
            .map(|e| e.extension_type())
            .collect();
        assert_eq!(order, vec![23, 10, 13, 50]);
        assert!(hello.session_id.blob().is_empty());
        assert_eq!(hello.compression_methods.blob(), &[0]);
        Ok(())
    }

    #[test]
    fn client_hello_goes_into_the_transcript() -> Result<(), ConversationError> {
        let mut session = Session::new(ScriptedStream::new(Vec::new()));
        Generator::ClientHello(params()).generate(&mut session)?;

        let outbound = session.transport().get_ref().outbound.clone();
        let records = records(&outbound);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, 22);
        assert_eq!(session.transcript(), records[0].1.as_slice());

        let message = HandshakeMessageValue::decode_from_exact(session.transcript())?;
        let HandshakeMessageValue::ClientHello(hello) = message else {
            panic!("not a client hello: {message:?}");
        };
        assert_eq!(&hello.random, session.client_random());
        Ok(())
    }

    #[test]
    fn split_message_parks_the_tail() -> Result<(), ConversationError> {
        let mut session = Session::new(ScriptedStream::new(Vec::new()));
        let split = Generator::SplitMessage {
            inner: Box::new(Generator::ClientHello(params())),
            fragment_size: 2,
            queue: "hello".into(),
        };
        split.generate(&mut session)?;
        let first = records(&session.transport().get_ref().outbound.clone());
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].1, vec![1, 0]);

        let mut reassembled = first[0].1.clone();
        while let Some(fragment) = session.pop_fragment("hello") {
            assert!(fragment.len() <= 2);
            reassembled.extend_from_slice(&fragment);
        }
        // the whole logical message, once
        assert_eq!(session.transcript(), reassembled.as_slice());
        Ok(())
    }

    #[test]
    fn fake_change_cipher_spec_is_injected_between_held_fragments() -> Result<(), ConversationError>
    {
        let mut session = Session::new(ScriptedStream::new(Vec::new()));
        session.transport().enable();
        Generator::SplitMessage {
            inner: Box::new(Generator::ClientHello(params())),
            fragment_size: 2,
            queue: "q".into(),
        }
        .generate(&mut session)?;
        Generator::ChangeCipherSpec { fake: true }.generate(&mut session)?;
        Generator::PopFragment { queue: "q".into() }.generate(&mut session)?;
        assert_eq!(session.transport().held(), 3);
        let transcript_length = session.transcript().len();

        session.transport().disable();
        session.transport().flush()?;
        let records = records(&session.transport().get_ref().outbound.clone());
        let types: Vec<u8> = records.iter().map(|(t, _)| *t).collect();
        assert_eq!(types, vec![22, 20, 22]);
        assert_eq!(records[1].1, vec![1]);
        assert_eq!(records[2].1.len(), 2);
        // the fake record is not part of the handshake
        assert_eq!(session.transcript().len(), transcript_length);
        assert!(!session.is_write_protected());
        Ok(())
    }

    #[test]
    fn popping_an_empty_queue_fails() {
        let mut session = Session::new(ScriptedStream::new(Vec::new()));
        let err = Generator::PopFragment { queue: "none".into() }
            .generate(&mut session)
            .unwrap_err();
        assert!(err.to_string().contains("no fragments left in queue none"));
    }

    #[test]
    fn only_handshake_messages_split() {
        let mut session = Session::new(ScriptedStream::new(Vec::new()));
        let split = Generator::SplitMessage {
            inner: Box::new(Generator::ApplicationData(b"hi".to_vec())),
            fragment_size: 1,
            queue: "q".into(),
        };
        assert!(matches!(
            split.generate(&mut session),
            Err(ConversationError::State(_))
        ));

        let zero = Generator::SplitMessage {
            inner: Box::new(Generator::ClientHello(params())),
            fragment_size: 0,
            queue: "q".into(),
        };
        assert!(zero.generate(&mut session).is_err());
        assert!(session.transport().get_ref().outbound.is_empty());
    }

    #[test]
    fn real_change_cipher_spec_needs_keys() {
        let mut session = Session::new(ScriptedStream::new(Vec::new()));
        let err = Generator::ChangeCipherSpec { fake: false }
            .generate(&mut session)
            .unwrap_err();
        assert!(err.to_string().contains("before keys were derived"));
    }

    #[test]
    fn alert_layout() -> Result<(), ConversationError> {
        let mut session = Session::new(ScriptedStream::new(Vec::new()));
        Generator::Alert {
            level: AlertLevel::Warning,
            description: AlertDescription::CloseNotify,
        }
        .generate(&mut session)?;
        assert_eq!(
            session.transport().get_ref().outbound,
            vec![21, 3, 3, 0, 2, 1, 0]
        );
        Ok(())
    }
}
