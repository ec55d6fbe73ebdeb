//! The conversations the probe knows how to run.
//!
//! `sanity` is a complete, well behaved handshake with one request and a clean
//! close. The interleaving conversations cut the ClientHello into 2 byte
//! records, hold them back, inject fake ChangeCipherSpec records between them
//! and release everything at once. A patched server answers with a fatal
//! `unexpected_message` alert and closes.

use crate::{
    config::ProbeSettings,
    conversation::{
        ClientHelloParams, Command, Conversation, ConversationBuilder, Expectation, Generator,
    },
    error::ConfigError,
    iana::constants,
    protocol::{AlertDescription, AlertLevel},
};

pub const SANITY: &str = "sanity";
pub const SINGLE_INTERLEAVED: &str = "Single interleaved ClientHello fragment";
pub const MULTIPLE_INTERLEAVED: &str = "Multiple interleaved ClientHello fragment";

/// Handshake bytes per ClientHello record in the interleaving conversations.
pub const FRAGMENT_SIZE: usize = 2;

const CLIENT_HELLO_QUEUE: &str = "client_hello";

const REQUEST: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

fn hello_params(settings: &ProbeSettings) -> ClientHelloParams {
    ClientHelloParams {
        ciphers: settings.ciphers.clone(),
        groups: settings.groups.clone(),
        signature_schemes: settings.signature_schemes.clone(),
        extended_master_secret: settings.extended_master_secret,
    }
}

/// Size of the interleaved ClientHello handshake message, header included.
///
/// 63 fixed bytes, 2 per cipher suite, 2 per group, 4 per signature scheme
/// (it is listed in two extensions) and 4 for an empty
/// `extended_master_secret`.
pub fn client_hello_bytes(settings: &ProbeSettings) -> usize {
    63 + 2 * settings.ciphers.len()
        + 4 * settings.signature_schemes.len()
        + 2 * settings.groups.len()
        + if settings.extended_master_secret { 4 } else { 0 }
}

/// Number of records the interleaved ClientHello is cut into.
pub fn client_hello_fragments(settings: &ProbeSettings) -> usize {
    client_hello_bytes(settings).div_ceil(FRAGMENT_SIZE)
}

pub fn sanity(settings: &ProbeSettings) -> Result<Conversation, ConfigError> {
    let mut hello = hello_params(settings);
    hello
        .ciphers
        .push(constants::TLS_EMPTY_RENEGOTIATION_INFO_SCSV);

    let mut builder = ConversationBuilder::new(SANITY, &settings.host, settings.port)
        .then(Generator::ClientHello(hello))
        .then(Expectation::ServerHello)
        .then(Expectation::Certificate);
    if settings.expects_server_key_exchange() {
        builder = builder.then(Expectation::ServerKeyExchange);
    }
    builder
        .then(Expectation::ServerHelloDone)
        .then(Generator::ClientKeyExchange)
        .then(Generator::ChangeCipherSpec { fake: false })
        .then(Generator::Finished)
        .then(Expectation::ChangeCipherSpec)
        .then(Expectation::Finished)
        .then(Generator::ApplicationData(REQUEST.to_vec()))
        .then(Expectation::ApplicationData)
        .then(Generator::Alert {
            level: AlertLevel::Warning,
            description: AlertDescription::CloseNotify,
        })
        .then(Expectation::alert(None, None))
        .or(Expectation::Close)
        .build()
}

/// Held ClientHello: the first fragment, then `fake_records` rounds of a
/// fake ChangeCipherSpec followed by the next fragment.
fn interleaved(
    name: &str,
    settings: &ProbeSettings,
    fake_records: usize,
) -> Result<Conversation, ConfigError> {
    let mut builder = ConversationBuilder::new(name, &settings.host, settings.port)
        .then(Command::BufferingEnable)
        .then(Generator::SplitMessage {
            inner: Box::new(Generator::ClientHello(hello_params(settings))),
            fragment_size: FRAGMENT_SIZE,
            queue: CLIENT_HELLO_QUEUE.to_owned(),
        });
    for _ in 0..fake_records {
        builder = builder
            .then(Generator::ChangeCipherSpec { fake: true })
            .then(Generator::PopFragment {
                queue: CLIENT_HELLO_QUEUE.to_owned(),
            });
    }
    builder
        .then(Command::BufferingDisable)
        .then(Command::BufferingFlush)
        .then(Expectation::alert(
            Some(AlertLevel::Fatal),
            Some(AlertDescription::UnexpectedMessage),
        ))
        .then(Expectation::Close)
        .build()
}

/// Two ClientHello fragments with one fake ChangeCipherSpec between them.
pub fn single_interleaved(settings: &ProbeSettings) -> Result<Conversation, ConfigError> {
    interleaved(SINGLE_INTERLEAVED, settings, 1)
}

/// The whole ClientHello, with a fake ChangeCipherSpec before every fragment
/// after the first.
pub fn multiple_interleaved(settings: &ProbeSettings) -> Result<Conversation, ConfigError> {
    let fragments = client_hello_fragments(settings);
    interleaved(MULTIPLE_INTERLEAVED, settings, fragments.saturating_sub(1))
}

pub fn all(settings: &ProbeSettings) -> Result<Vec<Conversation>, ConfigError> {
    Ok(vec![
        sanity(settings)?,
        single_interleaved(settings)?,
        multiple_interleaved(settings)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::EncodeValue, conversation::Step};

    fn encoded_length(settings: &ProbeSettings) -> usize {
        let body = hello_params(settings)
            .client_hello([0; 32])
            .unwrap()
            .encode_to_vec()
            .unwrap();
        body.len() + 4
    }

    fn count(conversation: &Conversation, wanted: &Step) -> usize {
        conversation
            .primary_path()
            .filter(|step| *step == wanted)
            .count()
    }

    #[test]
    fn default_client_hello_size() {
        let settings = ProbeSettings::default();
        assert_eq!(client_hello_bytes(&settings), 105);
        assert_eq!(client_hello_fragments(&settings), 53);
        assert_eq!(encoded_length(&settings), 105);
    }

    #[test]
    fn size_formula_matches_the_encoding() {
        let variants = [
            ProbeSettings {
                extended_master_secret: true,
                ..Default::default()
            },
            ProbeSettings {
                ciphers: vec![constants::TLS_RSA_WITH_AES_128_CBC_SHA],
                groups: vec![constants::x25519],
                signature_schemes: vec![constants::rsa_pss_rsae_sha256],
                extended_master_secret: false,
                ..Default::default()
            },
            ProbeSettings {
                groups: vec![
                    constants::secp256r1,
                    constants::secp384r1,
                    constants::ffdhe2048,
                    constants::ffdhe3072,
                ],
                extended_master_secret: true,
                ..Default::default()
            },
        ];
        for settings in variants {
            assert_eq!(client_hello_bytes(&settings), encoded_length(&settings));
        }
        // an odd size leaves a 1 byte fragment at the end
        let odd = &ProbeSettings {
            ciphers: vec![constants::TLS_RSA_WITH_AES_128_CBC_SHA],
            groups: vec![constants::x25519],
            signature_schemes: vec![constants::rsa_pss_rsae_sha256],
            ..Default::default()
        };
        assert_eq!(client_hello_bytes(odd), 71);
        assert_eq!(client_hello_fragments(odd), 36);
    }

    #[test]
    fn interleaving_shapes() -> Result<(), ConfigError> {
        let settings = ProbeSettings::default();
        let fake = Step::Generate(Generator::ChangeCipherSpec { fake: true });

        let single = single_interleaved(&settings)?;
        assert_eq!(single.name(), SINGLE_INTERLEAVED);
        assert_eq!(count(&single, &fake), 1);

        let multiple = multiple_interleaved(&settings)?;
        assert_eq!(count(&multiple, &fake), 52);
        let steps: Vec<&Step> = multiple.primary_path().collect();
        assert_eq!(steps[0], &Step::Command(Command::BufferingEnable));
        assert_eq!(
            &steps[steps.len() - 2..],
            &[
                &Step::Expect(Expectation::alert(
                    Some(AlertLevel::Fatal),
                    Some(AlertDescription::UnexpectedMessage)
                )),
                &Step::Expect(Expectation::Close),
            ]
        );
        Ok(())
    }

    #[test]
    fn sanity_key_exchange_follows_the_first_cipher() -> Result<(), ConfigError> {
        let ske = Step::Expect(Expectation::ServerKeyExchange);
        assert_eq!(count(&sanity(&ProbeSettings::default())?, &ske), 1);

        let rsa = ProbeSettings {
            ciphers: vec![constants::TLS_RSA_WITH_AES_128_CBC_SHA],
            ..Default::default()
        };
        assert_eq!(count(&sanity(&rsa)?, &ske), 0);
        Ok(())
    }

    #[test]
    fn sanity_offers_the_renegotiation_scsv() -> Result<(), ConfigError> {
        let conversation = sanity(&ProbeSettings::default())?;
        let Some(Step::Generate(Generator::ClientHello(hello))) =
            conversation.primary_path().next()
        else {
            panic!("sanity does not start with a ClientHello");
        };
        assert_eq!(
            hello.ciphers.last(),
            Some(&constants::TLS_EMPTY_RENEGOTIATION_INFO_SCSV)
        );
        Ok(())
    }

    #[test]
    fn names_are_unique() -> Result<(), ConfigError> {
        let conversations = all(&ProbeSettings::default())?;
        let names: std::collections::BTreeSet<&str> =
            conversations.iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(SANITY));
        Ok(())
    }
}
