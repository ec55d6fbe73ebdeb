#![no_main]

use ccs_probe::{codec::DecodeValue, protocol::ClientHello};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = ClientHello::decode_from(data);
});
