use std::{
    collections::VecDeque,
    io::{ErrorKind, Read},
};

use crate::{
    codec::{DecodeValue, DecodeValueWithContext, U24},
    crypto::RecordProtection,
    error::ConversationError,
    iana,
    protocol::{
        Alert, ChangeCipherSpec, ContentType, ContentValue, HandshakeMessageHeader,
        HandshakeMessageValue, RecordHeader,
    },
};

/// RFC 5246 section 6.2.3, the largest TLSCiphertext fragment.
const MAX_CIPHERTEXT_LENGTH: usize = (1 << 14) + 2048;

const READ_CHUNK: usize = 4096;

/// One observation of the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `raw` is the exact plaintext the message was decoded from, with the
    /// handshake header for handshake messages.
    Message { content: ContentValue, raw: Vec<u8> },
    /// EOF or a reset from the peer.
    Closed,
}

/// Turns the inbound byte stream into messages.
///
/// ```text
/// messages ->   |------m1------|--------m2------|--------m3-------|
/// records  ->   |----r1----|-------r2---|-----r3------|----r4-----|
/// packets  ->   |--p1--|---p2---|---p3--|---p4--|--p5----|---p6---|
/// ```
///
/// Reads are buffered in `byte_buffer` until a full record is available. A
/// record is only deprotected when the messages before it have been handed
/// out, so a ChangeCipherSpec can switch the read keys before the record after
/// it is opened. Deprotected payloads collect in `plaintext_stream` until they
/// hold a whole message, and that stream only ever holds a single content type.
#[derive(Debug, Default)]
pub struct RecordReader {
    byte_buffer: Vec<u8>,
    plaintext_stream: VecDeque<u8>,
    plaintext_content_type: Option<ContentType>,
    peer_closed: bool,
}

impl RecordReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bytes received from the peer.
    pub fn feed_bytes(&mut self, data: &[u8]) {
        tracing::trace!(
            length = data.len(),
            buffered = self.byte_buffer.len(),
            "feeding bytes"
        );
        self.byte_buffer.extend_from_slice(data);
    }

    /// Return the next message, reading from `source` as needed.
    ///
    /// `cipher` is the cipher from the ServerHello, once one was accepted.
    pub fn next_message<R: Read>(
        &mut self,
        source: &mut R,
        mut protection: Option<&mut RecordProtection>,
        cipher: Option<iana::Cipher>,
    ) -> Result<Inbound, ConversationError> {
        loop {
            if let Some(inbound) = self.stream_message(cipher)? {
                return Ok(inbound);
            }

            let (header, fragment) = match self.next_record()? {
                Some(record) => record,
                None if self.peer_closed => return self.closed(),
                None => {
                    self.read_from(source)?;
                    continue;
                }
            };

            let payload = match (header.content_type, protection.as_deref_mut()) {
                // ChangeCipherSpec is never protected, it is what turns protection on
                (ContentType::ChangeCipherSpec, _) | (_, None) => fragment,
                (content_type, Some(protection)) => protection.open(content_type, &fragment)?,
            };
            self.push_plaintext(header.content_type, payload)?;
        }
    }

    fn read_from<R: Read>(&mut self, source: &mut R) -> Result<(), ConversationError> {
        let mut chunk = [0u8; READ_CHUNK];
        match source.read(&mut chunk) {
            Ok(0) => {
                tracing::debug!("peer closed the connection");
                self.peer_closed = true;
            }
            Ok(read) => self.feed_bytes(&chunk[..read]),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                ) =>
            {
                tracing::debug!("peer reset the connection: {e}");
                self.peer_closed = true;
            }
            Err(e) => return Err(ConversationError::Io(e)),
        }
        Ok(())
    }

    /// A close in the middle of a record or message is still a close, the
    /// partial data is dropped.
    fn closed(&mut self) -> Result<Inbound, ConversationError> {
        if !self.byte_buffer.is_empty() || !self.plaintext_stream.is_empty() {
            tracing::debug!(
                bytes = self.byte_buffer.len(),
                plaintext = self.plaintext_stream.len(),
                "discarding partial data after close"
            );
            self.byte_buffer.clear();
            self.plaintext_stream.clear();
        }
        Ok(Inbound::Closed)
    }

    /// Pop a complete record off the front of `byte_buffer`.
    fn next_record(&mut self) -> Result<Option<(RecordHeader, Vec<u8>)>, ConversationError> {
        let (header, remaining) = match RecordHeader::decode_from(&self.byte_buffer) {
            Ok(decoded) => decoded,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(ConversationError::Decode(e)),
        };

        let length = header.record_length as usize;
        if length > MAX_CIPHERTEXT_LENGTH {
            return Err(ConversationError::Decode(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("record of {length} bytes exceeds the maximum record size"),
            )));
        }
        if remaining.len() < length {
            return Ok(None);
        }

        let fragment = remaining[..length].to_vec();
        self.byte_buffer.drain(..RecordHeader::LENGTH + length);
        tracing::trace!(?header, "received record");
        Ok(Some((header, fragment)))
    }

    fn push_plaintext(
        &mut self,
        content_type: ContentType,
        payload: Vec<u8>,
    ) -> Result<(), ConversationError> {
        // Switching content types is only allowed once the previous message
        // has been completely parsed.
        match self.plaintext_content_type {
            Some(current) if !self.plaintext_stream.is_empty() && current != content_type => {
                return Err(ConversationError::Decode(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("{content_type} record interleaved with a partial {current} message"),
                )));
            }
            _ => self.plaintext_content_type = Some(content_type),
        }
        self.plaintext_stream.extend(payload);
        Ok(())
    }

    /// Parse a message from the plaintext stream, if a whole one is there.
    fn stream_message(
        &mut self,
        cipher: Option<iana::Cipher>,
    ) -> Result<Option<Inbound>, ConversationError> {
        let content_type = match self.plaintext_content_type {
            Some(content_type) => content_type,
            None => return Ok(None),
        };
        let buffer = self.plaintext_stream.make_contiguous();
        if buffer.is_empty() {
            return Ok(None);
        }

        let length = match content_type {
            ContentType::ChangeCipherSpec => 1,
            ContentType::Alert => 2,
            ContentType::ApplicationData => buffer.len(),
            ContentType::Handshake => {
                if buffer.len() < HandshakeMessageHeader::LENGTH {
                    return Ok(None);
                }
                // unknown handshake types are opaque, only the length matters
                let (length, _) =
                    U24::decode_from(&buffer[1..]).map_err(ConversationError::Decode)?;
                HandshakeMessageHeader::LENGTH + usize::from(length)
            }
        };
        if buffer.len() < length {
            return Ok(None);
        }

        let raw: Vec<u8> = self.plaintext_stream.drain(..length).collect();
        let content = match content_type {
            ContentType::ChangeCipherSpec => ContentValue::ChangeCipherSpec(
                ChangeCipherSpec::decode_from_exact(&raw).map_err(ConversationError::Decode)?,
            ),
            ContentType::Alert => ContentValue::Alert(
                Alert::decode_from_exact(&raw).map_err(ConversationError::Decode)?,
            ),
            ContentType::ApplicationData => ContentValue::ApplicationData(raw.clone()),
            ContentType::Handshake => {
                let (message, rest) = HandshakeMessageValue::decode_from_with_context(&raw, cipher)
                    .map_err(ConversationError::Decode)?;
                debug_assert!(rest.is_empty());
                ContentValue::Handshake(message)
            }
        };
        tracing::trace!(%content, "received message");
        Ok(Some(Inbound::Message { content, raw }))
    }
}
