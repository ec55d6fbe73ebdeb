#![no_main]

use ccs_probe::{
    codec::DecodeValueWithContext,
    iana::constants,
    protocol::HandshakeMessageValue,
};
use libfuzzer_sys::fuzz_target;

// The first byte picks the negotiated suite, the rest is a run of handshake
// messages as a server would send them.
fuzz_target!(|data: &[u8]| {
    let Some((selector, mut rest)) = data.split_first() else {
        return;
    };
    let cipher = match selector % 4 {
        0 => None,
        1 => Some(constants::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA),
        2 => Some(constants::TLS_DHE_RSA_WITH_AES_128_CBC_SHA),
        _ => Some(constants::TLS_RSA_WITH_AES_128_CBC_SHA),
    };
    while !rest.is_empty() {
        match HandshakeMessageValue::decode_from_with_context(rest, cipher) {
            Ok((_, remaining)) if remaining.len() < rest.len() => rest = remaining,
            _ => return,
        }
    }
});
