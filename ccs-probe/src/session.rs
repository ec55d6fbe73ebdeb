//! Per-connection TLS 1.2 client state.
//!
//! A `Session` is created for a single conversation and dropped with it. It
//! owns the transport, the handshake transcript and the record protection for
//! both directions. Generators and expectations drive it, it never decides on
//! its own what to send next.

use std::{
    collections::{HashMap, VecDeque},
    io::{Read, Write},
};

use crate::{
    codec::EncodeValue,
    crypto::{key_exchange, prf, KeyBlock, KeyExchangeOutput, RecordProtection, Sender},
    error::ConversationError,
    iana::{self, KeyExchange, Protocol},
    protocol::{
        extensions::ExtensionType, ContentType, RecordHeader, ServerHello, ServerKeyExchange,
    },
    transport::{FragmentBuffer, Inbound, RecordReader},
};

/// Largest TLSPlaintext fragment, longer payloads are split across records.
const MAX_PLAINTEXT_LENGTH: usize = 1 << 14;

#[derive(Debug)]
pub struct Session<S> {
    transport: FragmentBuffer<S>,
    reader: RecordReader,

    client_random: [u8; 32],
    offered_extended_master_secret: bool,
    server_random: Option<[u8; 32]>,
    cipher: Option<iana::Cipher>,
    extended_master_secret: bool,
    leaf_certificate: Option<Vec<u8>>,
    server_key_exchange: Option<ServerKeyExchange>,

    /// every handshake message sent or accepted, as it appeared on the wire
    transcript: Vec<u8>,
    master_secret: Option<Vec<u8>>,

    pending_write: Option<RecordProtection>,
    pending_read: Option<RecordProtection>,
    write_protection: Option<RecordProtection>,
    read_protection: Option<RecordProtection>,

    /// message fragments parked by a split, popped one at a time
    fragment_queues: HashMap<String, VecDeque<Vec<u8>>>,
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S) -> Self {
        Self {
            transport: FragmentBuffer::new(stream),
            reader: RecordReader::new(),
            client_random: [0; 32],
            offered_extended_master_secret: false,
            server_random: None,
            cipher: None,
            extended_master_secret: false,
            leaf_certificate: None,
            server_key_exchange: None,
            transcript: Vec::new(),
            master_secret: None,
            pending_write: None,
            pending_read: None,
            write_protection: None,
            read_protection: None,
            fragment_queues: HashMap::new(),
        }
    }

    pub fn transport(&mut self) -> &mut FragmentBuffer<S> {
        &mut self.transport
    }

    pub fn cipher(&self) -> Option<iana::Cipher> {
        self.cipher
    }

    pub fn client_random(&self) -> &[u8; 32] {
        &self.client_random
    }

    pub fn uses_extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    pub fn is_write_protected(&self) -> bool {
        self.write_protection.is_some()
    }

    fn record(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<Vec<u8>, ConversationError> {
        let fragment = match (&mut self.write_protection, content_type) {
            (Some(protection), content_type) if content_type != ContentType::ChangeCipherSpec => {
                protection.seal(content_type, payload)?
            }
            _ => payload.to_vec(),
        };
        let header = RecordHeader {
            content_type,
            protocol_version: Protocol::TLSv1_2,
            record_length: fragment.len() as u16,
        };
        let mut record = header.encode_to_vec()?;
        record.extend_from_slice(&fragment);
        Ok(record)
    }

    /// Send `payload` as one or more records of `content_type`, protected when
    /// write keys are active.
    pub fn send_record(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<(), ConversationError> {
        // an empty payload still makes an (empty) record
        let mut chunks: Vec<&[u8]> = payload.chunks(MAX_PLAINTEXT_LENGTH).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }
        for chunk in chunks {
            let record = self.record(content_type, chunk)?;
            self.transport.write_record(record)?;
        }
        Ok(())
    }

    /// Send a record that isn't part of the conversation's message sequence.
    ///
    /// It is framed like any other record but goes through the buffer's
    /// injection point.
    pub fn inject_record(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<(), ConversationError> {
        let record = self.record(content_type, payload)?;
        self.transport.inject(record)?;
        Ok(())
    }

    /// Record a handshake message in the transcript and send it.
    pub fn send_handshake(&mut self, message: &[u8]) -> Result<(), ConversationError> {
        self.append_transcript(message);
        self.send_record(ContentType::Handshake, message)
    }

    pub fn append_transcript(&mut self, message: &[u8]) {
        self.transcript.extend_from_slice(message);
    }

    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }

    fn negotiated_cipher(&self) -> Result<iana::Cipher, ConversationError> {
        self.cipher
            .ok_or_else(|| ConversationError::State("no cipher suite negotiated yet".to_owned()))
    }

    pub fn transcript_hash(&self) -> Result<Vec<u8>, ConversationError> {
        let cipher = self.negotiated_cipher()?;
        Ok(prf::transcript_hash(cipher.prf_hash(), &self.transcript)?)
    }

    /// Remember what the ClientHello committed to.
    pub fn set_client_hello(&mut self, random: [u8; 32], offers_extended_master_secret: bool) {
        self.client_random = random;
        self.offered_extended_master_secret = offers_extended_master_secret;
    }

    pub fn accept_server_hello(&mut self, hello: &ServerHello) -> Result<(), ConversationError> {
        let cipher = hello.cipher_suite;
        if cipher.bulk_cipher().is_none() || cipher.key_exchange().is_none() {
            return Err(ConversationError::State(format!(
                "server selected {cipher}, which is not a TLS 1.2 cipher suite"
            )));
        }
        self.server_random = Some(hello.random);
        self.cipher = Some(cipher);
        self.extended_master_secret = self.offered_extended_master_secret
            && hello.has_extension(ExtensionType::ExtendedMasterSecret);
        tracing::debug!(
            %cipher,
            extended_master_secret = self.extended_master_secret,
            "accepted server hello"
        );
        Ok(())
    }

    pub fn set_leaf_certificate(&mut self, der: Vec<u8>) {
        self.leaf_certificate = Some(der);
    }

    pub fn set_server_key_exchange(&mut self, key_exchange: ServerKeyExchange) {
        self.server_key_exchange = Some(key_exchange);
    }

    /// Run the client half of the negotiated key exchange.
    pub fn client_key_exchange(&self) -> Result<(KeyExchange, KeyExchangeOutput), ConversationError> {
        let cipher = self.negotiated_cipher()?;
        let kx = cipher
            .key_exchange()
            .ok_or_else(|| ConversationError::State(format!("{cipher} has no key exchange")))?;

        let output = match (kx, &self.server_key_exchange) {
            (KeyExchange::Ecdhe, Some(ServerKeyExchange::Ecdhe { params, .. })) => {
                key_exchange::ecdhe(params.curve_params.named_curve, params.public.blob())?
            }
            (KeyExchange::Dhe, Some(ServerKeyExchange::Dhe { params, .. })) => key_exchange::dhe(
                params.dh_p.blob(),
                params.dh_g.blob(),
                params.dh_ys.blob(),
            )?,
            (KeyExchange::Rsa, _) => {
                let leaf = self.leaf_certificate.as_deref().ok_or_else(|| {
                    ConversationError::State("no server certificate for RSA key exchange".into())
                })?;
                key_exchange::rsa(leaf)?
            }
            (kx, _) => {
                return Err(ConversationError::State(format!(
                    "no server parameters for {kx:?} key exchange"
                )))
            }
        };
        Ok((kx, output))
    }

    /// Compute the master secret and the pending keys for both directions.
    ///
    /// Must be called after the ClientKeyExchange is in the transcript, the
    /// extended master secret hashes everything up to and including it.
    pub fn derive_keys(&mut self, premaster_secret: &[u8]) -> Result<(), ConversationError> {
        let cipher = self.negotiated_cipher()?;
        let server_random = self
            .server_random
            .ok_or_else(|| ConversationError::State("no server random".to_owned()))?;
        let hash = cipher.prf_hash();

        let master_secret = if self.extended_master_secret {
            prf::extended_master_secret(hash, premaster_secret, &self.transcript_hash()?)?
        } else {
            prf::master_secret(hash, premaster_secret, &self.client_random, &server_random)?
        };
        let keys = KeyBlock::derive(cipher, &master_secret, &self.client_random, &server_random)?;

        self.pending_write = Some(RecordProtection::new(cipher, keys.client)?);
        self.pending_read = Some(RecordProtection::new(cipher, keys.server)?);
        self.master_secret = Some(master_secret);
        tracing::debug!("derived pending keys");
        Ok(())
    }

    /// Sending ChangeCipherSpec: everything after it is protected.
    pub fn activate_write_keys(&mut self) -> Result<(), ConversationError> {
        self.write_protection = Some(self.pending_write.take().ok_or_else(|| {
            ConversationError::State("ChangeCipherSpec sent before keys were derived".into())
        })?);
        Ok(())
    }

    /// Receiving ChangeCipherSpec.
    pub fn activate_read_keys(&mut self) -> Result<(), ConversationError> {
        self.read_protection = Some(self.pending_read.take().ok_or_else(|| {
            ConversationError::State("ChangeCipherSpec received before keys were derived".into())
        })?);
        Ok(())
    }

    /// Finished `verify_data` over the transcript as it stands.
    pub fn verify_data(&self, sender: Sender) -> Result<Vec<u8>, ConversationError> {
        let cipher = self.negotiated_cipher()?;
        let master_secret = self
            .master_secret
            .as_deref()
            .ok_or_else(|| ConversationError::State("no master secret".to_owned()))?;
        let hash = self.transcript_hash()?;
        Ok(prf::verify_data(cipher.prf_hash(), master_secret, sender, &hash)?)
    }

    pub fn park_fragments(&mut self, queue: &str, fragments: impl IntoIterator<Item = Vec<u8>>) {
        self.fragment_queues
            .entry(queue.to_owned())
            .or_default()
            .extend(fragments);
    }

    pub fn pop_fragment(&mut self, queue: &str) -> Option<Vec<u8>> {
        self.fragment_queues.get_mut(queue)?.pop_front()
    }

    /// Block until the next message from the peer, or its close.
    pub fn receive(&mut self) -> Result<Inbound, ConversationError> {
        let Self {
            transport,
            reader,
            read_protection,
            cipher,
            ..
        } = self;
        reader.next_message(transport.get_mut(), read_protection.as_mut(), *cipher)
    }
}
