//! Fuzz target: `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder and
//! asserts that it never panics and never yields a payload larger than
//! the advertised maximum.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use buttonhub::rpc::frame::FrameDecoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();

    if let Some(payload) = decoder.feed(data) {
        assert!(payload.len() <= 16 * 1024, "payload exceeds the frame cap");
    }

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    let _ = decoder.feed(data);
});
