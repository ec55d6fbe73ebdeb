//! Client side of the TLS 1.2 key exchanges.
//!
//! Every function returns the premaster secret together with the value the
//! client puts in its ClientKeyExchange. The server's parameters are used as
//! sent, signatures over them are not checked.

use openssl::{
    bn::{BigNum, BigNumContext},
    derive::Deriver,
    dh::Dh,
    ec::{EcGroup, EcKey, EcPoint, PointConversionForm},
    nid::Nid,
    pkey::{Id, PKey},
    rsa::Padding,
    x509::X509,
};
use rand::RngCore;

use crate::{error::CryptoError, iana};

#[derive(Debug)]
pub struct KeyExchangeOutput {
    pub premaster_secret: Vec<u8>,
    /// EC point, `dh_Yc` or the RSA encrypted premaster secret
    pub client_public: Vec<u8>,
}

/// ECDHE over a named curve, RFC 8422 section 5.10.
pub fn ecdhe(group: iana::Group, server_public: &[u8]) -> Result<KeyExchangeOutput, CryptoError> {
    let nid = match group.description {
        "secp256r1" => Nid::X9_62_PRIME256V1,
        "secp384r1" => Nid::SECP384R1,
        "secp521r1" => Nid::SECP521R1,
        "x25519" => return montgomery(Id::X25519, server_public),
        "x448" => return montgomery(Id::X448, server_public),
        other => return Err(CryptoError::Unsupported(format!("ECDHE group {other}"))),
    };

    let ec_group = EcGroup::from_curve_name(nid)?;
    let mut ctx = BigNumContext::new()?;
    let peer_point = EcPoint::from_bytes(&ec_group, server_public, &mut ctx)?;
    let peer = PKey::from_ec_key(EcKey::from_public_key(&ec_group, &peer_point)?)?;

    let ours = EcKey::generate(&ec_group)?;
    let client_public =
        ours.public_key()
            .to_bytes(&ec_group, PointConversionForm::UNCOMPRESSED, &mut ctx)?;
    let ours = PKey::from_ec_key(ours)?;

    let mut deriver = Deriver::new(&ours)?;
    deriver.set_peer(&peer)?;
    let premaster_secret = deriver.derive_to_vec()?;

    Ok(KeyExchangeOutput {
        premaster_secret,
        client_public,
    })
}

/// X25519 and X448 points are raw little endian strings rather than SEC1.
fn montgomery(id: Id, server_public: &[u8]) -> Result<KeyExchangeOutput, CryptoError> {
    let peer = PKey::public_key_from_raw_bytes(server_public, id)?;
    let ours = if id == Id::X25519 {
        PKey::generate_x25519()?
    } else {
        PKey::generate_x448()?
    };
    let client_public = ours.raw_public_key()?;

    let mut deriver = Deriver::new(&ours)?;
    deriver.set_peer(&peer)?;
    let premaster_secret = deriver.derive_to_vec()?;

    Ok(KeyExchangeOutput {
        premaster_secret,
        client_public,
    })
}

/// Finite field DHE with the group the server sent.
///
/// OpenSSL returns the shared secret with leading zero bytes removed, which is
/// the premaster secret encoding RFC 5246 section 8.1.2 requires.
pub fn dhe(p: &[u8], g: &[u8], server_public: &[u8]) -> Result<KeyExchangeOutput, CryptoError> {
    if p.is_empty() || g.is_empty() || server_public.is_empty() {
        return Err(CryptoError::Malformed("DHE parameters"));
    }
    let p = BigNum::from_slice(p)?;
    let g = BigNum::from_slice(g)?;
    let dh = Dh::from_pqg(p, None, g)?.generate_key()?;
    let client_public = dh.public_key().to_vec();

    let peer = BigNum::from_slice(server_public)?;
    let premaster_secret = dh.compute_key(&peer)?;

    Ok(KeyExchangeOutput {
        premaster_secret,
        client_public,
    })
}

/// RSA key transport to the public key of the leaf certificate.
pub fn rsa(leaf_certificate: &[u8]) -> Result<KeyExchangeOutput, CryptoError> {
    let certificate = X509::from_der(leaf_certificate)?;
    let rsa = certificate.public_key()?.rsa()?;

    // client_version followed by 46 random bytes
    let mut premaster_secret = vec![0u8; 48];
    premaster_secret[..2].copy_from_slice(&[0x03, 0x03]);
    rand::thread_rng().fill_bytes(&mut premaster_secret[2..]);

    let mut encrypted = vec![0u8; rsa.size() as usize];
    let length = rsa.public_encrypt(&premaster_secret, &mut encrypted, Padding::PKCS1)?;
    encrypted.truncate(length);

    Ok(KeyExchangeOutput {
        premaster_secret,
        client_public: encrypted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iana::constants;
    use openssl::{
        asn1::Asn1Time, bn::MsbOption, hash::MessageDigest, rsa::Rsa, x509::X509Builder,
    };

    /// Play the server side of the exchange and check both ends agree.
    #[test]
    fn ecdhe_secp256r1_agrees() -> Result<(), CryptoError> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        let server = EcKey::generate(&group)?;
        let mut ctx = BigNumContext::new()?;
        let server_public =
            server
                .public_key()
                .to_bytes(&group, PointConversionForm::UNCOMPRESSED, &mut ctx)?;

        let output = ecdhe(constants::secp256r1, &server_public)?;
        assert_eq!(output.client_public.len(), 65);
        assert_eq!(output.client_public[0], 0x04);

        let client_point = EcPoint::from_bytes(&group, &output.client_public, &mut ctx)?;
        let client = PKey::from_ec_key(EcKey::from_public_key(&group, &client_point)?)?;
        let server = PKey::from_ec_key(server)?;
        let mut deriver = Deriver::new(&server)?;
        deriver.set_peer(&client)?;
        assert_eq!(deriver.derive_to_vec()?, output.premaster_secret);
        Ok(())
    }

    #[test]
    fn ecdhe_x25519_agrees() -> Result<(), CryptoError> {
        let server = PKey::generate_x25519()?;
        let output = ecdhe(constants::x25519, &server.raw_public_key()?)?;
        assert_eq!(output.client_public.len(), 32);

        let client = PKey::public_key_from_raw_bytes(&output.client_public, Id::X25519)?;
        let mut deriver = Deriver::new(&server)?;
        deriver.set_peer(&client)?;
        assert_eq!(deriver.derive_to_vec()?, output.premaster_secret);
        Ok(())
    }

    #[test]
    fn ecdhe_rejects_ffdhe_groups() {
        let err = ecdhe(constants::ffdhe2048, &[4, 1, 2]).unwrap_err();
        assert!(matches!(err, CryptoError::Unsupported(_)));
    }

    #[test]
    fn dhe_agrees() -> Result<(), CryptoError> {
        let server = Dh::get_2048_256()?.generate_key()?;
        let p = server.prime_p().to_vec();
        let g = server.generator().to_vec();

        let output = dhe(&p, &g, &server.public_key().to_vec())?;
        let client_public = BigNum::from_slice(&output.client_public)?;
        assert_eq!(server.compute_key(&client_public)?, output.premaster_secret);
        Ok(())
    }

    #[test]
    fn rsa_premaster_decrypts() -> Result<(), CryptoError> {
        let rsa_key = Rsa::generate(2048)?;
        let key = PKey::from_rsa(rsa_key.clone())?;
        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        let mut serial = BigNum::new()?;
        serial.rand(64, MsbOption::MAYBE_ZERO, false)?;
        builder.set_serial_number(serial.to_asn1_integer()?.as_ref())?;
        builder.set_pubkey(&key)?;
        builder.set_not_before(Asn1Time::days_from_now(0)?.as_ref())?;
        builder.set_not_after(Asn1Time::days_from_now(1)?.as_ref())?;
        builder.sign(&key, MessageDigest::sha256())?;
        let der = builder.build().to_der()?;

        let output = rsa(&der)?;
        assert_eq!(output.premaster_secret.len(), 48);
        assert_eq!(&output.premaster_secret[..2], &[3, 3]);

        let mut decrypted = vec![0u8; rsa_key.size() as usize];
        let length =
            rsa_key.private_decrypt(&output.client_public, &mut decrypted, Padding::PKCS1)?;
        assert_eq!(&decrypted[..length], output.premaster_secret.as_slice());
        Ok(())
    }
}
