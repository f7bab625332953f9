//! gRPC message frame codec.
//!
//! Wire format:
//! ```text
//! ┌──────────────┬───────────────┬──────────────────────────┐
//! │ Compressed(1)│ Length (4B BE)│ protobuf payload (N B)   │
//! │ always 0     │ u32           │                          │
//! └──────────────┴───────────────┴──────────────────────────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields complete message
//! payloads. This handles partial reads gracefully: one transport read
//! may deliver part of the header, part of the payload, or several
//! messages back to back.

/// Maximum message payload size (protects against memory exhaustion).
const MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Frame header: 1 compression byte + 4-byte big-endian length.
pub const HEADER_SIZE: usize = 5;

enum DecoderState {
    ReadingHeader { collected: usize },
    ReadingPayload { expected: usize },
    /// Discarding the payload of a compressed or oversized frame so the
    /// next header starts on a frame boundary.
    Skipping { remaining: usize },
}

/// Streaming message decoder.
pub struct FrameDecoder {
    state: DecoderState,
    header_buf: [u8; HEADER_SIZE],
    payload_buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingHeader { collected: 0 },
            header_buf: [0; HEADER_SIZE],
            payload_buf: Vec::new(),
        }
    }

    /// Feed bytes into the decoder.
    ///
    /// Returns `Some(payload)` when a complete message is available. The
    /// returned slice is valid until the next call to `feed`. A compressed
    /// or oversized frame is discarded whole, payload included, so the
    /// bytes after it still parse as frames.
    pub fn feed(&mut self, data: &[u8]) -> Option<&[u8]> {
        let mut offset = 0;

        loop {
            match &mut self.state {
                DecoderState::ReadingHeader { collected } => {
                    if offset == data.len() {
                        return None;
                    }
                    let to_copy = (HEADER_SIZE - *collected).min(data.len() - offset);
                    self.header_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == HEADER_SIZE {
                        let compressed = self.header_buf[0];
                        let expected = u32::from_be_bytes(
                            self.header_buf[1..].try_into().unwrap_or([0; 4]),
                        ) as usize;

                        if compressed != 0 || expected > MAX_MESSAGE_SIZE {
                            self.state = DecoderState::Skipping { remaining: expected };
                        } else {
                            self.payload_buf.clear();
                            self.state = DecoderState::ReadingPayload { expected };
                        }
                    }
                }

                // Checked on entry as well as after consuming input, so a
                // zero-length frame yields even when none of `data` is left.
                DecoderState::ReadingPayload { expected } => {
                    let to_copy = (*expected - self.payload_buf.len()).min(data.len() - offset);
                    self.payload_buf.extend_from_slice(&data[offset..offset + to_copy]);
                    offset += to_copy;

                    if self.payload_buf.len() == *expected {
                        self.state = DecoderState::ReadingHeader { collected: 0 };
                        return Some(&self.payload_buf);
                    }
                    return None;
                }

                DecoderState::Skipping { remaining } => {
                    let to_skip = (*remaining).min(data.len() - offset);
                    *remaining -= to_skip;
                    offset += to_skip;
                    if *remaining > 0 {
                        return None;
                    }
                    self.state = DecoderState::ReadingHeader { collected: 0 };
                }
            }
        }
    }

    /// Reset decoder state (after a stream reset).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader { collected: 0 };
        self.payload_buf.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame a protobuf payload: `[0][BE-u32 length][payload]` into `out_buf`.
///
/// Returns the total number of bytes written, or `None` when the target
/// buffer is too small.
pub fn encode_frame(payload: &[u8], out_buf: &mut [u8]) -> Option<usize> {
    let total = HEADER_SIZE + payload.len();
    if total > out_buf.len() || payload.len() > MAX_MESSAGE_SIZE {
        return None;
    }

    out_buf[0] = 0; // no compression
    out_buf[1..HEADER_SIZE].copy_from_slice(&(payload.len() as u32).to_be_bytes());
    out_buf[HEADER_SIZE..total].copy_from_slice(payload);
    Some(total)
}
