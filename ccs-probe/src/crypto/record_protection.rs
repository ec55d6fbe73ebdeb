//! TLS 1.2 record protection, RFC 5246 section 6.2.3.
//!
//! A `RecordProtection` covers one direction of one connection. It only deals
//! with the `fragment` of a record, the caller owns the record header.

use std::fmt::Debug;

use aws_lc_rs::{aead, hmac};
use openssl::symm::{Cipher as SymmCipher, Crypter, Mode};
use rand::RngCore;

use crate::{
    crypto::prf,
    error::CryptoError,
    iana::{self, BulkCipher, MacAlgorithm},
    protocol::ContentType,
};

const CBC_BLOCK_LENGTH: usize = 16;
const GCM_EXPLICIT_NONCE_LENGTH: usize = 8;
const AEAD_TAG_LENGTH: usize = 16;

/// Keys for a single direction, sliced out of the key block.
#[derive(Clone, PartialEq, Eq)]
pub struct DirectionKeys {
    pub mac_key: Vec<u8>,
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl Debug for DirectionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectionKeys")
            .field("mac_key", &self.mac_key.len())
            .field("key", &self.key.len())
            .field("iv", &self.iv.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlock {
    pub client: DirectionKeys,
    pub server: DirectionKeys,
}

impl KeyBlock {
    /// The key block is partitioned as
    ///
    /// ```text
    /// client_write_MAC_key[SecurityParameters.mac_key_length]
    /// server_write_MAC_key[SecurityParameters.mac_key_length]
    /// client_write_key[SecurityParameters.enc_key_length]
    /// server_write_key[SecurityParameters.enc_key_length]
    /// client_write_IV[SecurityParameters.fixed_iv_length]
    /// server_write_IV[SecurityParameters.fixed_iv_length]
    /// ```
    pub fn derive(
        cipher: iana::Cipher,
        master_secret: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<Self, CryptoError> {
        let bulk = bulk_cipher(cipher)?;
        let mac_length = cipher.mac().map(|mac| mac.mac_len()).unwrap_or(0);
        let key_length = bulk.key_len();
        let iv_length = bulk.fixed_iv_len();

        let total = 2 * (mac_length + key_length + iv_length);
        let block = prf::key_block(
            cipher.prf_hash(),
            master_secret,
            client_random,
            server_random,
            total,
        )?;

        let mut remaining = block.as_slice();
        let mut take = |length: usize| {
            let (head, tail) = remaining.split_at(length);
            remaining = tail;
            head.to_vec()
        };
        let client_mac = take(mac_length);
        let server_mac = take(mac_length);
        let client_key = take(key_length);
        let server_key = take(key_length);
        let client_iv = take(iv_length);
        let server_iv = take(iv_length);

        Ok(Self {
            client: DirectionKeys {
                mac_key: client_mac,
                key: client_key,
                iv: client_iv,
            },
            server: DirectionKeys {
                mac_key: server_mac,
                key: server_key,
                iv: server_iv,
            },
        })
    }
}

fn bulk_cipher(cipher: iana::Cipher) -> Result<BulkCipher, CryptoError> {
    cipher
        .bulk_cipher()
        .ok_or_else(|| CryptoError::Unsupported(format!("record protection for {cipher}")))
}

enum Protection {
    Cbc {
        cipher: SymmCipher,
        key: Vec<u8>,
        mac: hmac::Key,
        mac_length: usize,
    },
    Aead {
        key: aead::LessSafeKey,
        iv: Vec<u8>,
        /// GCM sends the low 8 bytes of the nonce with every record, ChaCha20
        /// derives them from the sequence number.
        explicit_nonce: bool,
    },
}

pub struct RecordProtection {
    bulk: BulkCipher,
    protection: Protection,
    sequence_number: u64,
}

impl Debug for RecordProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordProtection")
            .field("bulk", &self.bulk)
            .field("sequence_number", &self.sequence_number)
            .finish()
    }
}

impl RecordProtection {
    pub fn new(cipher: iana::Cipher, keys: DirectionKeys) -> Result<Self, CryptoError> {
        let bulk = bulk_cipher(cipher)?;
        let protection = match bulk {
            BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc => {
                let mac = cipher
                    .mac()
                    .ok_or_else(|| CryptoError::Unsupported(format!("MAC of {cipher}")))?;
                let algorithm = match mac {
                    MacAlgorithm::HmacSha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
                    MacAlgorithm::HmacSha256 => hmac::HMAC_SHA256,
                    MacAlgorithm::HmacSha384 => hmac::HMAC_SHA384,
                };
                let symm = if bulk == BulkCipher::Aes128Cbc {
                    SymmCipher::aes_128_cbc()
                } else {
                    SymmCipher::aes_256_cbc()
                };
                Protection::Cbc {
                    cipher: symm,
                    key: keys.key,
                    mac: hmac::Key::new(algorithm, &keys.mac_key),
                    mac_length: mac.mac_len(),
                }
            }
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm | BulkCipher::ChaCha20Poly1305 => {
                let algorithm = match bulk {
                    BulkCipher::Aes128Gcm => &aead::AES_128_GCM,
                    BulkCipher::Aes256Gcm => &aead::AES_256_GCM,
                    _ => &aead::CHACHA20_POLY1305,
                };
                let unbound = aead::UnboundKey::new(algorithm, &keys.key)
                    .map_err(|_| CryptoError::AwsLc("AEAD key"))?;
                Protection::Aead {
                    key: aead::LessSafeKey::new(unbound),
                    iv: keys.iv,
                    explicit_nonce: bulk != BulkCipher::ChaCha20Poly1305,
                }
            }
        };

        Ok(Self {
            bulk,
            protection,
            sequence_number: 0,
        })
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// `seq_num + TLSCompressed.type + TLSCompressed.version + length`, the
    /// MAC header for CBC suites and the additional data for AEAD suites.
    fn additional_data(&self, content_type: ContentType, length: usize) -> [u8; 13] {
        let mut data = [0u8; 13];
        data[..8].copy_from_slice(&self.sequence_number.to_be_bytes());
        data[8] = content_type.byte_value();
        data[9..11].copy_from_slice(&[0x03, 0x03]);
        data[11..].copy_from_slice(&(length as u16).to_be_bytes());
        data
    }

    fn aead_nonce(&self, iv: &[u8], explicit: Option<&[u8]>) -> Result<aead::Nonce, CryptoError> {
        let nonce = match explicit {
            // RFC 5288 section 3: salt || nonce_explicit
            Some(explicit) => [iv, explicit].concat(),
            // RFC 7905 section 2: padded sequence number XOR the IV
            None => {
                let sequence = self.sequence_number.to_be_bytes();
                let offset = iv.len() - sequence.len();
                let mut nonce = iv.to_vec();
                for (i, byte) in sequence.iter().enumerate() {
                    nonce[offset + i] ^= byte;
                }
                nonce
            }
        };
        aead::Nonce::try_assume_unique_for_key(&nonce).map_err(|_| CryptoError::AwsLc("nonce"))
    }

    /// Protect `plaintext`, returning the record fragment.
    pub fn seal(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let additional_data = self.additional_data(content_type, plaintext.len());
        let fragment = match &self.protection {
            Protection::Cbc {
                cipher, key, mac, ..
            } => {
                let mut context = hmac::Context::with_key(mac);
                context.update(&additional_data);
                context.update(plaintext);
                let tag = context.sign();

                let mut data = plaintext.to_vec();
                data.extend_from_slice(tag.as_ref());
                let padding = (CBC_BLOCK_LENGTH - (data.len() + 1) % CBC_BLOCK_LENGTH)
                    % CBC_BLOCK_LENGTH;
                data.extend(std::iter::repeat(padding as u8).take(padding + 1));

                let mut iv = [0u8; CBC_BLOCK_LENGTH];
                rand::thread_rng().fill_bytes(&mut iv);
                let mut fragment = iv.to_vec();
                fragment.extend_from_slice(&cbc(*cipher, Mode::Encrypt, key, &iv, &data)?);
                fragment
            }
            Protection::Aead {
                key,
                iv,
                explicit_nonce,
            } => {
                let explicit = self.sequence_number.to_be_bytes();
                let nonce = self.aead_nonce(iv, explicit_nonce.then_some(explicit.as_slice()))?;
                let mut in_out = plaintext.to_vec();
                key.seal_in_place_append_tag(nonce, aead::Aad::from(additional_data), &mut in_out)
                    .map_err(|_| CryptoError::AwsLc("record to seal"))?;
                if *explicit_nonce {
                    [explicit.as_slice(), &in_out].concat()
                } else {
                    in_out
                }
            }
        };

        tracing::trace!(
            sequence_number = self.sequence_number,
            plaintext = plaintext.len(),
            fragment = fragment.len(),
            "sealed record"
        );
        self.sequence_number += 1;
        Ok(fragment)
    }

    /// Authenticate and decrypt a record fragment.
    ///
    /// Every failure to authenticate maps to `BadRecordMac`, the probe has no
    /// use for telling padding errors apart.
    pub fn open(
        &mut self,
        content_type: ContentType,
        fragment: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let plaintext = match &self.protection {
            Protection::Cbc {
                cipher,
                key,
                mac,
                mac_length,
            } => {
                if fragment.len() < 2 * CBC_BLOCK_LENGTH || fragment.len() % CBC_BLOCK_LENGTH != 0
                {
                    return Err(CryptoError::BadRecordMac);
                }
                let (iv, ciphertext) = fragment.split_at(CBC_BLOCK_LENGTH);
                let decrypted = cbc(*cipher, Mode::Decrypt, key, iv, ciphertext)?;

                let padding = *decrypted.last().ok_or(CryptoError::BadRecordMac)? as usize;
                if padding + 1 + mac_length > decrypted.len() {
                    return Err(CryptoError::BadRecordMac);
                }
                let unpadded = decrypted.len() - padding - 1;
                if decrypted[unpadded..].iter().any(|b| *b as usize != padding) {
                    return Err(CryptoError::BadRecordMac);
                }
                let (content, tag) = decrypted[..unpadded].split_at(unpadded - mac_length);

                let additional_data = self.additional_data(content_type, content.len());
                hmac::verify(mac, &[additional_data.as_slice(), content].concat(), tag)
                    .map_err(|_| CryptoError::BadRecordMac)?;
                content.to_vec()
            }
            Protection::Aead {
                key,
                iv,
                explicit_nonce,
            } => {
                let (explicit, sealed) = if *explicit_nonce {
                    if fragment.len() < GCM_EXPLICIT_NONCE_LENGTH {
                        return Err(CryptoError::BadRecordMac);
                    }
                    let (explicit, sealed) = fragment.split_at(GCM_EXPLICIT_NONCE_LENGTH);
                    (Some(explicit), sealed)
                } else {
                    (None, fragment)
                };
                if sealed.len() < AEAD_TAG_LENGTH {
                    return Err(CryptoError::BadRecordMac);
                }

                let nonce = self.aead_nonce(iv, explicit)?;
                let additional_data =
                    self.additional_data(content_type, sealed.len() - AEAD_TAG_LENGTH);
                let mut in_out = sealed.to_vec();
                key.open_in_place(nonce, aead::Aad::from(additional_data), &mut in_out)
                    .map_err(|_| CryptoError::BadRecordMac)?
                    .to_vec()
            }
        };

        tracing::trace!(
            sequence_number = self.sequence_number,
            plaintext = plaintext.len(),
            "opened record"
        );
        self.sequence_number += 1;
        Ok(plaintext)
    }
}

/// Raw AES-CBC, TLS does its own padding.
fn cbc(
    cipher: SymmCipher,
    mode: Mode,
    key: &[u8],
    iv: &[u8],
    input: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut crypter = Crypter::new(cipher, mode, key, Some(iv))?;
    crypter.pad(false);
    let mut output = vec![0u8; input.len() + cipher.block_size()];
    let mut count = crypter.update(input, &mut output)?;
    count += crypter.finalize(&mut output[count..])?;
    output.truncate(count);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iana::constants;

    fn keys(cipher: iana::Cipher) -> DirectionKeys {
        let bulk = cipher.bulk_cipher().unwrap();
        DirectionKeys {
            mac_key: vec![0x11; cipher.mac().map(|m| m.mac_len()).unwrap_or(0)],
            key: (0..bulk.key_len() as u8).collect(),
            iv: vec![0x22; bulk.fixed_iv_len()],
        }
    }

    #[test]
    fn key_block_partitioning() -> Result<(), CryptoError> {
        let master = [3u8; 48];
        let cbc = KeyBlock::derive(
            constants::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
            &master,
            &[1; 32],
            &[2; 32],
        )?;
        assert_eq!(cbc.client.mac_key.len(), 20);
        assert_eq!(cbc.client.key.len(), 16);
        assert!(cbc.client.iv.is_empty());
        assert_ne!(cbc.client, cbc.server);

        // the client MAC key is the head of the key block
        let block = prf::key_block(
            constants::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA.prf_hash(),
            &master,
            &[1; 32],
            &[2; 32],
            2 * (20 + 16),
        )?;
        assert_eq!(cbc.client.mac_key, block[..20]);
        assert_eq!(cbc.server.key, block[56..72]);

        let gcm = KeyBlock::derive(
            constants::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            &master,
            &[1; 32],
            &[2; 32],
        )?;
        assert!(gcm.server.mac_key.is_empty());
        assert_eq!(gcm.server.key.len(), 32);
        assert_eq!(gcm.server.iv.len(), 4);
        Ok(())
    }

    #[test]
    fn cbc_record_layout() -> Result<(), CryptoError> {
        let cipher = constants::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA;
        let mut writer = RecordProtection::new(cipher, keys(cipher))?;
        let mut reader = RecordProtection::new(cipher, keys(cipher))?;

        // 5 bytes of data and 20 of MAC pad up to 32, after a 16 byte IV
        let fragment = writer.seal(ContentType::ApplicationData, b"hello")?;
        assert_eq!(fragment.len(), 48);
        assert_eq!(reader.open(ContentType::ApplicationData, &fragment)?, b"hello");

        // 11 bytes of data fill 32 exactly once the MAC and the pad length
        // byte are added, so no padding
        let fragment = writer.seal(ContentType::Handshake, &[0u8; 11])?;
        assert_eq!(fragment.len(), 16 + 32);
        assert_eq!(reader.open(ContentType::Handshake, &fragment)?, vec![0u8; 11]);

        // data and MAC ending on a block boundary still get a full pad block
        let fragment = writer.seal(ContentType::Handshake, &[0u8; 12])?;
        assert_eq!(fragment.len(), 16 + 48);
        assert_eq!(reader.open(ContentType::Handshake, &fragment)?, vec![0u8; 12]);
        assert_eq!(reader.sequence_number(), 3);
        Ok(())
    }

    #[test]
    fn cbc_tampering_is_bad_record_mac() -> Result<(), CryptoError> {
        let cipher = constants::TLS_DHE_RSA_WITH_AES_256_CBC_SHA256;
        let mut writer = RecordProtection::new(cipher, keys(cipher))?;
        let mut fragment = writer.seal(ContentType::Handshake, b"finished")?;
        fragment[20] ^= 0x01;

        let mut reader = RecordProtection::new(cipher, keys(cipher))?;
        let err = reader.open(ContentType::Handshake, &fragment).unwrap_err();
        assert!(matches!(err, CryptoError::BadRecordMac));
        Ok(())
    }

    #[test]
    fn content_type_is_authenticated() -> Result<(), CryptoError> {
        let cipher = constants::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256;
        let mut writer = RecordProtection::new(cipher, keys(cipher))?;
        let fragment = writer.seal(ContentType::Handshake, b"finished")?;

        let mut reader = RecordProtection::new(cipher, keys(cipher))?;
        let err = reader.open(ContentType::Alert, &fragment).unwrap_err();
        assert!(matches!(err, CryptoError::BadRecordMac));
        Ok(())
    }

    #[test]
    fn gcm_known_answer() -> Result<(), CryptoError> {
        let keys = DirectionKeys {
            mac_key: Vec::new(),
            key: (0..16).collect(),
            iv: vec![1, 2, 3, 4],
        };
        let cipher = constants::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256;
        let mut writer = RecordProtection::new(cipher, keys.clone())?;
        let fragment = writer.seal(ContentType::ApplicationData, b"hello")?;
        assert_eq!(
            hex::encode(&fragment),
            "0000000000000000558d9b7021a838efe8c5fbd1e2b6ac423dc5b499f7"
        );

        let mut reader = RecordProtection::new(cipher, keys)?;
        assert_eq!(reader.open(ContentType::ApplicationData, &fragment)?, b"hello");
        Ok(())
    }

    #[test]
    fn chacha_nonce_follows_sequence_number() -> Result<(), CryptoError> {
        let keys = DirectionKeys {
            mac_key: Vec::new(),
            key: (0..32).collect(),
            iv: (100..112).collect(),
        };
        let cipher = constants::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256;
        let mut writer = RecordProtection::new(cipher, keys.clone())?;
        writer.seal(ContentType::ApplicationData, b"first")?;
        let second = writer.seal(ContentType::ApplicationData, b"hello")?;
        assert_eq!(hex::encode(&second), "d3fde0c7ec7b669618fba4bb84d664079177bf9886");

        // a reader that missed the first record is out of step
        let mut reader = RecordProtection::new(cipher, keys)?;
        let err = reader.open(ContentType::ApplicationData, &second).unwrap_err();
        assert!(matches!(err, CryptoError::BadRecordMac));
        Ok(())
    }

    #[test]
    fn signalling_suites_have_no_protection() {
        let err = RecordProtection::new(
            constants::TLS_EMPTY_RENEGOTIATION_INFO_SCSV,
            DirectionKeys {
                mac_key: Vec::new(),
                key: Vec::new(),
                iv: Vec::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, CryptoError::Unsupported(_)));
    }
}
