//! Conversations run over real sockets against local servers.

use std::time::Duration;

use crate::{
    campaign::Campaign,
    config::{CampaignConfig, ExpectedFailureTable, ProbeSettings},
    conversation::scenarios,
    error::ConversationError,
    iana::{constants, Cipher},
    runner::Runner,
    testing::servers::{AcceptingServer, OpenSslServer},
};

const TIMEOUT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn local_settings(port: u16) -> ProbeSettings {
    ProbeSettings {
        host: "127.0.0.1".to_owned(),
        port,
        timeout: TIMEOUT,
        ..Default::default()
    }
}

/// Run sanity once against a fresh OpenSSL server.
fn sanity_with(configure: impl FnOnce(&mut ProbeSettings)) -> anyhow::Result<()> {
    init_tracing();
    let server = OpenSslServer::spawn(1)?;
    let mut settings = local_settings(server.port());
    configure(&mut settings);

    let conversation = scenarios::sanity(&settings)?;
    Runner::new(&conversation, TIMEOUT).run()?;
    assert_eq!(server.join()?, vec![true]);
    Ok(())
}

fn only(cipher: Cipher) -> impl FnOnce(&mut ProbeSettings) {
    move |settings| settings.ciphers = vec![cipher]
}

#[test]
fn sanity_default_settings() -> anyhow::Result<()> {
    sanity_with(|_| {})
}

#[test]
fn sanity_extended_master_secret() -> anyhow::Result<()> {
    sanity_with(|settings| settings.extended_master_secret = true)
}

#[test]
fn sanity_finite_field_dhe() -> anyhow::Result<()> {
    sanity_with(only(constants::TLS_DHE_RSA_WITH_AES_128_CBC_SHA))
}

#[test]
fn sanity_rsa_key_transport() -> anyhow::Result<()> {
    sanity_with(only(constants::TLS_RSA_WITH_AES_128_CBC_SHA))
}

#[test]
fn sanity_x25519() -> anyhow::Result<()> {
    sanity_with(|settings| settings.groups = vec![constants::x25519])
}

#[test]
fn sanity_aead_suites() -> anyhow::Result<()> {
    for cipher in [
        constants::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        constants::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        constants::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
    ] {
        tracing::info!(%cipher, "sanity");
        sanity_with(only(cipher))?;
    }
    Ok(())
}

#[test]
fn openssl_rejects_single_interleaved_record() -> anyhow::Result<()> {
    init_tracing();
    let server = OpenSslServer::spawn(1)?;
    let conversation = scenarios::single_interleaved(&local_settings(server.port()))?;

    Runner::new(&conversation, TIMEOUT).run()?;
    assert_eq!(server.join()?, vec![false]);
    Ok(())
}

#[test]
fn openssl_rejects_multiple_interleaved_records() -> anyhow::Result<()> {
    init_tracing();
    let server = OpenSslServer::spawn(1)?;
    let settings = ProbeSettings {
        extended_master_secret: true,
        ..local_settings(server.port())
    };
    let conversation = scenarios::multiple_interleaved(&settings)?;

    Runner::new(&conversation, TIMEOUT).run()?;
    assert_eq!(server.join()?, vec![false]);
    Ok(())
}

/// A server that carries on after the fake records is what the probe exists
/// to catch.
#[test]
fn accepting_server_is_flagged() -> anyhow::Result<()> {
    init_tracing();
    let server = AcceptingServer::spawn()?;
    let conversation = scenarios::single_interleaved(&local_settings(server.port()))?;

    let error = Runner::new(&conversation, TIMEOUT)
        .run()
        .expect_err("the server never sent an alert");
    assert!(
        matches!(error, ConversationError::Mismatch { .. }),
        "{error}"
    );
    assert!(error.to_string().contains("server_hello_done"), "{error}");
    server.join()?;
    Ok(())
}

#[test]
fn campaign_against_openssl() -> anyhow::Result<()> {
    init_tracing();
    // sanity twice around the two interleaving conversations
    let server = OpenSslServer::spawn(4)?;
    let settings = local_settings(server.port());
    let campaign = Campaign::new(
        scenarios::all(&settings)?,
        CampaignConfig::default(),
        TIMEOUT,
    )?;

    let mut transcript = Vec::new();
    let report = campaign.run(&mut rand::thread_rng(), &mut transcript)?;
    let transcript = String::from_utf8(transcript)?;

    assert_eq!(report.pass, 4, "{transcript}");
    assert_eq!(report.fail, 0, "{transcript}");
    assert!(report.is_success());
    assert!(transcript.starts_with("sanity ...\nOK\n\n"));
    assert_eq!(server.join()?, vec![true, false, false, true]);
    Ok(())
}

#[test]
fn campaign_reports_unexpected_pass() -> anyhow::Result<()> {
    init_tracing();
    let server = OpenSslServer::spawn(3)?;
    let settings = local_settings(server.port());
    let mut expected_failures = ExpectedFailureTable::new();
    expected_failures.expect_failure(scenarios::SINGLE_INTERLEAVED);
    let config = CampaignConfig {
        run_only: Some([scenarios::SINGLE_INTERLEAVED.to_owned()].into()),
        expected_failures,
        ..Default::default()
    };
    let campaign = Campaign::new(scenarios::all(&settings)?, config, TIMEOUT)?;

    let mut transcript = Vec::new();
    let report = campaign.run(&mut rand::thread_rng(), &mut transcript)?;

    assert_eq!(report.xpass, 1);
    assert_eq!(report.xpassed, vec![scenarios::SINGLE_INTERLEAVED]);
    assert!(!report.is_success());
    assert!(String::from_utf8(transcript)?.contains("XPASS-expected failure but test passed"));
    server.join()?;
    Ok(())
}
