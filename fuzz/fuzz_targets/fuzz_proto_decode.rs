//! Fuzz target: protobuf response decoding.
//!
//! Response payloads come off the wire unvalidated. Every typed decoder
//! must reject or zero-fill garbage without panicking.
//!
//! cargo fuzz run fuzz_proto_decode

#![no_main]

use buttonhub::rpc::messages;
use buttonhub::rpc::proto;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = proto::decode_message(data, |_field, _value| {});

    let _ = messages::decode_version(data);
    let _ = messages::decode_shelves(data);
    let _ = messages::decode_locations(data);
    let _ = messages::decode_shortcuts(data);
    let _ = messages::decode_start_command(data);
});
