//! Registry entries as `const` items, e.g. `constants::secp256r1` or
//! `constants::TLS_DHE_RSA_WITH_AES_128_CBC_SHA`. Generated by `build.rs`.

include!(concat!(env!("OUT_DIR"), "/iana_constants.rs"));
