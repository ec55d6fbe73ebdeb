//! The TLS 1.2 key schedule, RFC 5246 section 5 and 8.1.

use aws_lc_rs::{digest, hmac};

use crate::{error::CryptoError, iana::HashAlgorithm};

pub const MASTER_SECRET_LENGTH: usize = 48;

fn hmac_algorithm(hash: HashAlgorithm) -> Result<hmac::Algorithm, CryptoError> {
    match hash {
        HashAlgorithm::Sha256 => Ok(hmac::HMAC_SHA256),
        HashAlgorithm::Sha384 => Ok(hmac::HMAC_SHA384),
        other => Err(CryptoError::Unsupported(format!("{other:?} PRF"))),
    }
}

/// Hash of the handshake transcript with the PRF hash of the cipher suite.
pub fn transcript_hash(hash: HashAlgorithm, transcript: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let algorithm = match hash {
        HashAlgorithm::Sha256 => &digest::SHA256,
        HashAlgorithm::Sha384 => &digest::SHA384,
        other => return Err(CryptoError::Unsupported(format!("{other:?} transcript hash"))),
    };
    Ok(digest::digest(algorithm, transcript).as_ref().to_vec())
}

///   P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) +
///                          HMAC_hash(secret, A(2) + seed) + ...
///   A(0) = seed
///   A(i) = HMAC_hash(secret, A(i-1))
fn p_hash(algorithm: hmac::Algorithm, secret: &[u8], seed: &[u8], length: usize) -> Vec<u8> {
    let key = hmac::Key::new(algorithm, secret);
    let mut output = Vec::with_capacity(length);
    let mut a = hmac::sign(&key, seed);
    while output.len() < length {
        let mut context = hmac::Context::with_key(&key);
        context.update(a.as_ref());
        context.update(seed);
        output.extend_from_slice(context.sign().as_ref());
        a = hmac::sign(&key, a.as_ref());
    }
    output.truncate(length);
    output
}

/// PRF(secret, label, seed) = P_<hash>(secret, label + seed)
pub fn prf(
    hash: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    length: usize,
) -> Result<Vec<u8>, CryptoError> {
    let mut label_and_seed = Vec::with_capacity(label.len() + seed.len());
    label_and_seed.extend_from_slice(label);
    label_and_seed.extend_from_slice(seed);
    Ok(p_hash(hmac_algorithm(hash)?, secret, &label_and_seed, length))
}

pub fn master_secret(
    hash: HashAlgorithm,
    premaster_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Vec<u8>, CryptoError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(hash, premaster_secret, b"master secret", &seed, MASTER_SECRET_LENGTH)
}

/// RFC 7627: the randoms are replaced by the hash of the transcript up to and
/// including the ClientKeyExchange.
pub fn extended_master_secret(
    hash: HashAlgorithm,
    premaster_secret: &[u8],
    session_hash: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    prf(
        hash,
        premaster_secret,
        b"extended master secret",
        session_hash,
        MASTER_SECRET_LENGTH,
    )
}

/// Note the seed order is server random first, unlike the master secret.
pub fn key_block(
    hash: HashAlgorithm,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    length: usize,
) -> Result<Vec<u8>, CryptoError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);
    prf(hash, master_secret, b"key expansion", &seed, length)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Client,
    Server,
}

pub fn verify_data(
    hash: HashAlgorithm,
    master_secret: &[u8],
    sender: Sender,
    handshake_hash: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let label: &[u8] = match sender {
        Sender::Client => b"client finished",
        Sender::Server => b"server finished",
    };
    prf(hash, master_secret, label, handshake_hash, 12)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Vectors published on the IETF TLS list for the TLS 1.2 PRF.
    #[test]
    fn prf_sha256_vector() -> Result<(), CryptoError> {
        let secret = hex::decode("9bbe436ba940f017b17652849a71db35").unwrap();
        let seed = hex::decode("a0ba9f936cda311827a6f796ffd5198c").unwrap();
        let expected = hex::decode(concat!(
            "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a",
            "6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab",
            "4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701",
            "87347b66"
        ))
        .unwrap();

        let output = prf(HashAlgorithm::Sha256, &secret, b"test label", &seed, 100)?;
        assert_eq!(output, expected);
        Ok(())
    }

    #[test]
    fn prf_sha384_vector() -> Result<(), CryptoError> {
        let secret = hex::decode("b80b733d6ceefcdc71566ea48e5567df").unwrap();
        let seed = hex::decode("cd665cf6a8447dd6ff8b27555edb7465").unwrap();
        let expected = hex::decode(concat!(
            "7b0c18e9ced410ed1804f2cfa34a336a1c14dffb4900bb5fd7942107e81c83cd",
            "e9ca0faa60be9fe34f82b1233c9146a0e534cb400fed2700884f9dc236f80edd",
            "8bfa961144c9e8d792eca722a7b32fc3d416d473ebc2c5fd4abfdad05d918425",
            "9b5bf8cd4d90fa0d31e2dec479e4f1a26066f2eea9a69236a3e52655c9e9aee6",
            "91c8f3a26854308d5eaa3be85e0990703d73e56f"
        ))
        .unwrap();

        let output = prf(HashAlgorithm::Sha384, &secret, b"test label", &seed, 148)?;
        assert_eq!(output, expected);
        Ok(())
    }

    #[test]
    fn output_is_truncated_to_length() -> Result<(), CryptoError> {
        let long = prf(HashAlgorithm::Sha256, b"secret", b"label", b"seed", 64)?;
        let short = prf(HashAlgorithm::Sha256, b"secret", b"label", b"seed", 12)?;
        assert_eq!(short, long[..12]);
        Ok(())
    }

    #[test]
    fn sha1_prf_is_unsupported() {
        let err = prf(HashAlgorithm::Sha1, b"s", b"l", b"s", 12).unwrap_err();
        assert!(matches!(err, CryptoError::Unsupported(_)));
    }

    #[test]
    fn finished_labels_differ() -> Result<(), CryptoError> {
        let master = [7u8; MASTER_SECRET_LENGTH];
        let hash = transcript_hash(HashAlgorithm::Sha256, b"handshake")?;
        let client = verify_data(HashAlgorithm::Sha256, &master, Sender::Client, &hash)?;
        let server = verify_data(HashAlgorithm::Sha256, &master, Sender::Server, &hash)?;
        assert_eq!(client.len(), 12);
        assert_ne!(client, server);
        Ok(())
    }
}
