//! Command line surface.
//!
//! `-h` is the target host, so help is only available as `--help`. `-X`
//! attaches an expected error message to the closest `-x` before it, which is
//! why the two are matched up by their position on the command line.

use std::{path::PathBuf, time::Duration};

use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};

use crate::{
    config::{CampaignConfig, ExpectedFailureTable, ProbeSettings, DEFAULT_HOST, DEFAULT_PORT},
    error::ConfigError,
    iana::{self, HashAlgorithm, SignatureAlgorithm},
};

const AFTER_HELP: &str = "\
Probe names run only the named conversations, e.g. \"sanity\". The sanity
conversation always runs first and last.

-X message attaches to the closest -x before it: [-x probe-name] [-X message].";

pub fn command() -> Command {
    Command::new("ccs-probe")
        .version(crate_version!())
        .about(
            "Checks a TLS 1.2 server for CVE-2004-0079 by interleaving ChangeCipherSpec \
             records with a fragmented ClientHello",
        )
        .after_help(AFTER_HELP)
        .disable_help_flag(true)
        .arg(
            Arg::new("help")
                .long("help")
                .action(ArgAction::Help)
                .help("Print help"),
        )
        .arg(
            Arg::new("host")
                .short('h')
                .value_name("HOSTNAME")
                .default_value(DEFAULT_HOST)
                .help("Host to run the conversations against"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .value_name("PORT")
                .help(format!("Port to connect to [default: {DEFAULT_PORT}]")),
        )
        .arg(
            Arg::new("probes")
                .value_name("PROBE")
                .num_args(0..)
                .action(ArgAction::Append)
                .help("Run only these conversations"),
        )
        .arg(
            Arg::new("exclude")
                .short('e')
                .value_name("PROBE")
                .action(ArgAction::Append)
                .help("Don't run this conversation, may be repeated"),
        )
        .arg(
            Arg::new("expect-failure")
                .short('x')
                .value_name("PROBE")
                .action(ArgAction::Append)
                .help("Expect this conversation to fail, may be repeated"),
        )
        .arg(
            Arg::new("expected-message")
                .short('X')
                .value_name("MESSAGE")
                .action(ArgAction::Append)
                .help("Substring the error of the preceding -x conversation must contain"),
        )
        .arg(
            Arg::new("sigalgs")
                .short('S')
                .value_name("SIGALGS")
                .help(
                    "Whitespace separated signature schemes (rsa_pss_rsae_sha256) or \
                     hash+signature pairs (sha256+rsa)",
                ),
        )
        .arg(
            Arg::new("limit")
                .short('n')
                .value_name("NUM")
                .help("Run NUM of the conversations, or all of them if 0 [default: all]"),
        )
        .arg(
            Arg::new("cipher")
                .short('C')
                .value_name("CIPHER")
                .help("Offer only this cipher suite, by IANA name or number (0xc013)"),
        )
        .arg(
            Arg::new("groups")
                .short('g')
                .value_name("GROUPS")
                .help("Colon separated groups to offer [default: secp256r1:ffdhe2048]"),
        )
        .arg(
            Arg::new("ems")
                .short('M')
                .long("ems")
                .action(ArgAction::SetTrue)
                .help("Offer the extended master secret extension"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Connect and read timeout [default: 5]"),
        )
        .arg(
            Arg::new("report-json")
                .long("report-json")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Also write the report as JSON"),
        )
}

/// Validated command line.
#[derive(Debug)]
pub struct Cli {
    pub settings: ProbeSettings,
    pub campaign: CampaignConfig,
}

impl Cli {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ConfigError> {
        let mut settings = ProbeSettings::default();
        if let Some(host) = matches.get_one::<String>("host") {
            settings.host = host.clone();
        }
        if let Some(port) = matches.get_one::<String>("port") {
            settings.port = parse_number("-p", port)?;
        }
        if let Some(cipher) = matches.get_one::<String>("cipher") {
            settings.ciphers = vec![parse_cipher(cipher)?];
        }
        if let Some(groups) = matches.get_one::<String>("groups") {
            settings.groups = parse_groups(groups)?;
        }
        if let Some(sigalgs) = matches.get_one::<String>("sigalgs") {
            settings.signature_schemes = parse_signature_schemes(sigalgs)?;
        }
        settings.extended_master_secret = matches.get_flag("ems");
        if let Some(timeout) = matches.get_one::<String>("timeout") {
            settings.timeout = Duration::from_secs(parse_number("--timeout", timeout)?);
        }

        let limit = match matches.get_one::<String>("limit") {
            Some(limit) => match parse_number::<usize>("-n", limit)? {
                0 => None,
                limit => Some(limit),
            },
            None => None,
        };
        let campaign = CampaignConfig {
            run_only: matches
                .get_many::<String>("probes")
                .map(|probes| probes.cloned().collect()),
            exclude: matches
                .get_many::<String>("exclude")
                .map(|names| names.cloned().collect())
                .unwrap_or_default(),
            limit,
            expected_failures: expected_failures(matches)?,
            report_json: matches.get_one::<PathBuf>("report-json").cloned(),
        };
        Ok(Self { settings, campaign })
    }
}

/// Replay `-x` and `-X` in command line order.
fn expected_failures(matches: &ArgMatches) -> Result<ExpectedFailureTable, ConfigError> {
    enum Flag<'a> {
        Probe(&'a str),
        Message(&'a str),
    }

    let mut flags: Vec<(usize, Flag)> = Vec::new();
    if let (Some(indices), Some(values)) = (
        matches.indices_of("expect-failure"),
        matches.get_many::<String>("expect-failure"),
    ) {
        flags.extend(indices.zip(values.map(|v| Flag::Probe(v))));
    }
    if let (Some(indices), Some(values)) = (
        matches.indices_of("expected-message"),
        matches.get_many::<String>("expected-message"),
    ) {
        flags.extend(indices.zip(values.map(|v| Flag::Message(v))));
    }
    flags.sort_by_key(|(index, _)| *index);

    let mut table = ExpectedFailureTable::new();
    let mut last_probe = None;
    for (_, flag) in flags {
        match flag {
            Flag::Probe(name) => {
                table.expect_failure(name);
                last_probe = Some(name);
            }
            Flag::Message(message) => {
                let name = last_probe.ok_or(ConfigError::OrphanExpectedMessage)?;
                table.expect_message(name, message);
            }
        }
    }
    Ok(table)
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        flag,
        value: value.to_owned(),
    })
}

/// An IANA name, a hex code point (`0xc013`) or a decimal one (`49171`).
pub fn parse_cipher(value: &str) -> Result<iana::Cipher, ConfigError> {
    let unknown = || ConfigError::UnknownCipher(value.to_owned());
    if let Some(cipher) = iana::Cipher::from_description(value) {
        return Ok(cipher);
    }
    let code = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    }
    .map_err(|_| unknown())?;
    iana::Cipher::from_value(code.to_be_bytes()).ok_or_else(unknown)
}

pub fn parse_groups(value: &str) -> Result<Vec<iana::Group>, ConfigError> {
    value
        .split(':')
        .map(|name| {
            iana::Group::from_description(name)
                .ok_or_else(|| ConfigError::UnknownGroup(name.to_owned()))
        })
        .collect()
}

/// Whitespace separated entries, each a scheme name or a `hash+signature`
/// pair.
pub fn parse_signature_schemes(value: &str) -> Result<Vec<iana::SignatureScheme>, ConfigError> {
    value
        .split_whitespace()
        .map(|entry| {
            let scheme = match entry.split_once('+') {
                Some((hash, signature)) => HashAlgorithm::from_name(hash)
                    .zip(SignatureAlgorithm::from_name(signature))
                    .and_then(|(hash, signature)| {
                        iana::SignatureScheme::from_hash_and_signature(hash, signature)
                    }),
                None => iana::SignatureScheme::from_description(entry),
            };
            scheme.ok_or_else(|| ConfigError::UnknownSignatureAlgorithm(entry.to_owned()))
        })
        .collect()
}
