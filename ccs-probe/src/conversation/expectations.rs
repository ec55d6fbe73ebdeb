use std::{
    fmt::Display,
    io::{Read, Write},
};

use crate::{
    crypto::Sender,
    error::ConversationError,
    protocol::{
        AlertDescription, AlertLevel, ContentValue, HandshakeMessageValue, HandshakeType,
    },
    session::Session,
    transport::Inbound,
};

/// Something the client waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    ServerHello,
    Certificate,
    ServerKeyExchange,
    ServerHelloDone,
    ChangeCipherSpec,
    /// the server Finished, `verify_data` is checked
    Finished,
    ApplicationData,
    /// `None` accepts any value for that field
    Alert {
        level: Option<AlertLevel>,
        description: Option<AlertDescription>,
    },
    /// EOF or a reset
    Close,
}

impl Expectation {
    pub fn alert(level: Option<AlertLevel>, description: Option<AlertDescription>) -> Self {
        Expectation::Alert { level, description }
    }

    fn mismatch(&self, observed: impl ToString) -> ConversationError {
        ConversationError::Mismatch {
            expected: self.to_string(),
            observed: observed.to_string(),
        }
    }

    /// Check `event` against this expectation and, if it matches, update the
    /// session with it. Nothing is changed when it doesn't match, so an
    /// alternate can be tried against the same event.
    pub fn accept<S: Read + Write>(
        &self,
        session: &mut Session<S>,
        event: &Inbound,
    ) -> Result<(), ConversationError> {
        let (content, raw) = match (self, event) {
            (Expectation::Close, Inbound::Closed) => return Ok(()),
            (Expectation::Close, Inbound::Message { content, .. }) => {
                return Err(self.mismatch(content))
            }
            (_, Inbound::Closed) => {
                return Err(ConversationError::ConnectionClosed {
                    expected: self.to_string(),
                })
            }
            (_, Inbound::Message { content, raw }) => (content, raw),
        };

        match (self, content) {
            (
                Expectation::ServerHello,
                ContentValue::Handshake(HandshakeMessageValue::ServerHello(hello)),
            ) => {
                session.accept_server_hello(hello)?;
                session.append_transcript(raw);
            }
            (
                Expectation::Certificate,
                ContentValue::Handshake(HandshakeMessageValue::Certificate(certificate)),
            ) => {
                if let Some(leaf) = certificate.leaf() {
                    session.set_leaf_certificate(leaf.to_vec());
                }
                session.append_transcript(raw);
            }
            (
                Expectation::ServerKeyExchange,
                ContentValue::Handshake(HandshakeMessageValue::ServerKeyExchange(key_exchange)),
            ) => {
                session.set_server_key_exchange(key_exchange.clone());
                session.append_transcript(raw);
            }
            (
                Expectation::ServerHelloDone,
                ContentValue::Handshake(HandshakeMessageValue::ServerHelloDone(_)),
            ) => session.append_transcript(raw),
            (Expectation::ChangeCipherSpec, ContentValue::ChangeCipherSpec(_)) => {
                session.activate_read_keys()?;
            }
            (
                Expectation::Finished,
                ContentValue::Handshake(HandshakeMessageValue::Finished(finished)),
            ) => {
                let expected = session.verify_data(Sender::Server)?;
                if finished.verify_data != expected {
                    return Err(ConversationError::Mismatch {
                        expected: format!("{self} with verify_data {}", hex::encode(expected)),
                        observed: format!(
                            "{content} with verify_data {}",
                            hex::encode(&finished.verify_data)
                        ),
                    });
                }
                session.append_transcript(raw);
            }
            (Expectation::ApplicationData, ContentValue::ApplicationData(data)) => {
                tracing::debug!(length = data.len(), "received application data");
            }
            (Expectation::Alert { level, description }, ContentValue::Alert(alert))
                if level.map_or(true, |l| l == alert.level)
                    && description.map_or(true, |d| d == alert.description) => {}
            (_, content) => return Err(self.mismatch(content)),
        }
        Ok(())
    }
}

/// Written the way the matching `ContentValue` displays, so a mismatch reads
/// as e.g. `expected alert(fatal, unexpected_message), received handshake(server_hello)`.
impl Display for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handshake_type = match self {
            Expectation::ServerHello => Some(HandshakeType::ServerHello),
            Expectation::Certificate => Some(HandshakeType::Certificate),
            Expectation::ServerKeyExchange => Some(HandshakeType::ServerKeyExchange),
            Expectation::ServerHelloDone => Some(HandshakeType::ServerHelloDone),
            Expectation::Finished => Some(HandshakeType::Finished),
            _ => None,
        };
        if let Some(handshake_type) = handshake_type {
            return write!(f, "handshake({handshake_type})");
        }
        match self {
            Expectation::ChangeCipherSpec => write!(f, "change_cipher_spec"),
            Expectation::ApplicationData => write!(f, "application_data"),
            Expectation::Alert {
                level: None,
                description: None,
            } => write!(f, "alert"),
            Expectation::Alert { level, description } => {
                let level = level.map_or_else(|| "any".to_owned(), |l| l.to_string());
                let description = description.map_or_else(|| "any".to_owned(), |d| d.to_string());
                write!(f, "alert({level}, {description})")
            }
            Expectation::Close => write!(f, "connection close"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{protocol::Alert, testing::ScriptedStream};

    fn session() -> Session<ScriptedStream> {
        Session::new(ScriptedStream::new(Vec::new()))
    }

    fn alert(level: AlertLevel, description: AlertDescription) -> Inbound {
        Inbound::Message {
            content: ContentValue::Alert(Alert { level, description }),
            raw: vec![level.byte_value(), description.byte_value()],
        }
    }

    #[test]
    fn display() {
        assert_eq!(Expectation::ServerHello.to_string(), "handshake(server_hello)");
        assert_eq!(
            Expectation::alert(Some(AlertLevel::Fatal), Some(AlertDescription::UnexpectedMessage))
                .to_string(),
            "alert(fatal, unexpected_message)"
        );
        assert_eq!(
            Expectation::alert(None, Some(AlertDescription::CloseNotify)).to_string(),
            "alert(any, close_notify)"
        );
        assert_eq!(Expectation::alert(None, None).to_string(), "alert");
        assert_eq!(Expectation::Close.to_string(), "connection close");
    }

    #[test]
    fn alert_fields_are_optional() -> Result<(), ConversationError> {
        let mut session = session();
        let event = alert(AlertLevel::Warning, AlertDescription::CloseNotify);
        Expectation::alert(None, None).accept(&mut session, &event)?;
        Expectation::alert(Some(AlertLevel::Warning), None).accept(&mut session, &event)?;

        let err = Expectation::alert(Some(AlertLevel::Fatal), None)
            .accept(&mut session, &event)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected alert(fatal, any), received alert(warning, close_notify)"
        );
        Ok(())
    }

    #[test]
    fn close_while_waiting_for_a_message() {
        let err = Expectation::alert(Some(AlertLevel::Fatal), Some(AlertDescription::UnexpectedMessage))
            .accept(&mut session(), &Inbound::Closed)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "connection closed while waiting for alert(fatal, unexpected_message)"
        );
    }

    #[test]
    fn message_while_waiting_for_close() {
        let event = alert(AlertLevel::Fatal, AlertDescription::UnexpectedMessage);
        let err = Expectation::Close.accept(&mut session(), &event).unwrap_err();
        assert!(matches!(err, ConversationError::Mismatch { .. }));
        assert!(Expectation::Close.accept(&mut session(), &Inbound::Closed).is_ok());
    }

    #[test]
    fn handshake_mismatch_leaves_the_transcript_alone() {
        let mut session = session();
        let event = Inbound::Message {
            content: ContentValue::Handshake(HandshakeMessageValue::ServerHelloDone(
                crate::protocol::ServerHelloDone {},
            )),
            raw: vec![14, 0, 0, 0],
        };
        let err = Expectation::ServerHello.accept(&mut session, &event).unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected handshake(server_hello), received handshake(server_hello_done)"
        );
        assert!(session.transcript().is_empty());

        Expectation::ServerHelloDone.accept(&mut session, &event).unwrap();
        assert_eq!(session.transcript(), &[14, 0, 0, 0]);
    }

    #[test]
    fn change_cipher_spec_without_keys() {
        let event = Inbound::Message {
            content: ContentValue::ChangeCipherSpec(crate::protocol::ChangeCipherSpec::ChangeCipherSpec),
            raw: vec![1],
        };
        let err = Expectation::ChangeCipherSpec
            .accept(&mut session(), &event)
            .unwrap_err();
        assert!(matches!(err, ConversationError::State(_)));
    }
}
