//! Minimal HTTP/2 client session, just enough to carry one gRPC call.
//!
//! One connection, one stream (id 1), one request, one response. The
//! session sends the client preface and an empty SETTINGS frame, then a
//! HEADERS frame (HPACK static-table indexing only, no dynamic table)
//! and a DATA frame with END_STREAM, and drives the read loop until the
//! peer ends or resets the stream.
//!
//! Intentionally unsupported: CONTINUATION (our header block always fits
//! one frame), server push, flow-control window growth (messages are
//! capped well under the default 64 KiB window).

use std::time::Instant;

use log::{debug, warn};

use super::transport::{Transport, TransportError};

const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

const FRAME_DATA: u8 = 0x0;
const FRAME_HEADERS: u8 = 0x1;
const FRAME_RST_STREAM: u8 = 0x3;
const FRAME_SETTINGS: u8 = 0x4;
const FRAME_PING: u8 = 0x6;
const FRAME_GOAWAY: u8 = 0x7;

const FLAG_END_STREAM: u8 = 0x1;
const FLAG_END_HEADERS: u8 = 0x4;
const FLAG_ACK: u8 = 0x1;

const STREAM_ID: u32 = 1;

/// Largest frame payload we accept before treating the peer as broken.
const MAX_FRAME_PAYLOAD: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H2Error {
    Transport(TransportError),
    StreamReset,
    GoAway,
    Protocol,
    DeadlineExceeded,
}

impl From<TransportError> for H2Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

/// The outcome of one request: every DATA byte the peer sent on our
/// stream. gRPC frame parsing happens a layer up.
pub struct ResponseBody {
    pub data: Vec<u8>,
}

/// Issue a POST and collect the response body until END_STREAM.
///
/// `deadline` is a hard self-termination bound for the read loop; the
/// caller usually stops waiting earlier, and this keeps an abandoned
/// worker from spinning forever against a silent peer.
pub fn post(
    transport: &mut impl Transport,
    authority: &str,
    path: &str,
    body: &[u8],
    deadline: Instant,
) -> Result<ResponseBody, H2Error> {
    let mut request = Vec::with_capacity(PREFACE.len() + 64 + body.len());
    request.extend_from_slice(PREFACE);
    write_frame(&mut request, FRAME_SETTINGS, 0, 0, &[]);

    let headers = encode_headers(authority, path, body.len());
    write_frame(&mut request, FRAME_HEADERS, FLAG_END_HEADERS, STREAM_ID, &headers);
    write_frame(&mut request, FRAME_DATA, FLAG_END_STREAM, STREAM_ID, body);
    transport.write_all(&request)?;

    let mut reader = FrameReader::new();
    let mut response = Vec::new();
    let mut read_buf = [0u8; 1024];

    loop {
        if Instant::now() >= deadline {
            return Err(H2Error::DeadlineExceeded);
        }
        let n = transport.read(&mut read_buf)?;
        reader.push(&read_buf[..n]);

        while let Some(frame) = reader.next_frame()? {
            match frame.kind {
                FRAME_DATA if frame.stream_id == STREAM_ID => {
                    response.extend_from_slice(&frame.payload);
                    if frame.flags & FLAG_END_STREAM != 0 {
                        return Ok(ResponseBody { data: response });
                    }
                }
                FRAME_HEADERS if frame.stream_id == STREAM_ID => {
                    debug!("h2: headers ({} bytes)", frame.payload.len());
                    // Trailers-only responses end the stream with no DATA.
                    if frame.flags & FLAG_END_STREAM != 0 {
                        return Ok(ResponseBody { data: response });
                    }
                }
                FRAME_SETTINGS if frame.flags & FLAG_ACK == 0 => {
                    let mut ack = Vec::with_capacity(9);
                    write_frame(&mut ack, FRAME_SETTINGS, FLAG_ACK, 0, &[]);
                    transport.write_all(&ack)?;
                }
                FRAME_PING if frame.flags & FLAG_ACK == 0 => {
                    let mut pong = Vec::with_capacity(9 + frame.payload.len());
                    write_frame(&mut pong, FRAME_PING, FLAG_ACK, 0, &frame.payload);
                    transport.write_all(&pong)?;
                }
                FRAME_RST_STREAM if frame.stream_id == STREAM_ID => {
                    warn!("h2: stream reset by peer");
                    return Err(H2Error::StreamReset);
                }
                FRAME_GOAWAY => {
                    warn!("h2: goaway from peer");
                    return Err(H2Error::GoAway);
                }
                _ => {} // WINDOW_UPDATE, settings acks, other streams
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Frame layer
// ---------------------------------------------------------------------------

struct Frame {
    kind: u8,
    flags: u8,
    stream_id: u32,
    payload: Vec<u8>,
}

fn write_frame(out: &mut Vec<u8>, kind: u8, flags: u8, stream_id: u32, payload: &[u8]) {
    let len = payload.len() as u32;
    out.extend_from_slice(&len.to_be_bytes()[1..]); // 24-bit length
    out.push(kind);
    out.push(flags);
    out.extend_from_slice(&(stream_id & 0x7fff_ffff).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Accumulates raw bytes and yields complete frames.
struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, H2Error> {
        if self.buf.len() < 9 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([0, self.buf[0], self.buf[1], self.buf[2]]) as usize;
        if len > MAX_FRAME_PAYLOAD {
            return Err(H2Error::Protocol);
        }
        if self.buf.len() < 9 + len {
            return Ok(None);
        }
        let kind = self.buf[3];
        let flags = self.buf[4];
        let stream_id = u32::from_be_bytes([
            self.buf[5] & 0x7f,
            self.buf[6],
            self.buf[7],
            self.buf[8],
        ]);
        let payload = self.buf[9..9 + len].to_vec();
        self.buf.drain(..9 + len);
        Ok(Some(Frame { kind, flags, stream_id, payload }))
    }
}

// ---------------------------------------------------------------------------
// HPACK (encode only, static table only)
// ---------------------------------------------------------------------------

// Static-table indices from RFC 7541 appendix A.
const IDX_AUTHORITY: u8 = 1;
const IDX_METHOD_POST: u8 = 3;
const IDX_PATH: u8 = 4;
const IDX_SCHEME_HTTPS: u8 = 7;
const IDX_CONTENT_LENGTH: u8 = 28;
const IDX_CONTENT_TYPE: u8 = 31;

fn encode_headers(authority: &str, path: &str, content_length: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + path.len() + authority.len());
    indexed(&mut out, IDX_METHOD_POST);
    indexed(&mut out, IDX_SCHEME_HTTPS);
    literal_indexed_name(&mut out, IDX_AUTHORITY, authority);
    literal_indexed_name(&mut out, IDX_PATH, path);
    literal_new_name(&mut out, "te", "trailers");
    literal_indexed_name(&mut out, IDX_CONTENT_TYPE, "application/grpc");
    literal_indexed_name(&mut out, IDX_CONTENT_LENGTH, &content_length.to_string());
    out
}

/// Fully indexed header field (`1xxxxxxx`).
fn indexed(out: &mut Vec<u8>, index: u8) {
    out.push(0x80 | index);
}

/// Literal without indexing, name from the static table (`0000xxxx`).
fn literal_indexed_name(out: &mut Vec<u8>, name_index: u8, value: &str) {
    hpack_int(out, 0x00, 4, u64::from(name_index));
    hpack_str(out, value);
}

/// Literal without indexing, new name (`00000000`).
fn literal_new_name(out: &mut Vec<u8>, name: &str, value: &str) {
    out.push(0x00);
    hpack_str(out, name);
    hpack_str(out, value);
}

/// HPACK integer with an n-bit prefix (RFC 7541 §5.1).
fn hpack_int(out: &mut Vec<u8>, base: u8, prefix_bits: u8, mut value: u64) {
    let max_prefix = (1u64 << prefix_bits) - 1;
    if value < max_prefix {
        out.push(base | value as u8);
        return;
    }
    out.push(base | max_prefix as u8);
    value -= max_prefix;
    while value >= 0x80 {
        out.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Huffman-free string literal (RFC 7541 §5.2).
fn hpack_str(out: &mut Vec<u8>, s: &str) {
    hpack_int(out, 0x00, 7, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Scripted transport: returns canned inbound bytes chunk by chunk
    /// and records everything written.
    struct ScriptedTransport {
        inbound: VecDeque<Vec<u8>>,
        outbound: Vec<u8>,
    }

    impl ScriptedTransport {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self { inbound: chunks.into(), outbound: Vec::new() }
        }
    }

    impl Transport for ScriptedTransport {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            match self.inbound.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(TransportError::Closed),
            }
        }

        fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
            self.outbound.extend_from_slice(data);
            Ok(())
        }
    }

    fn frame(kind: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_frame(&mut out, kind, flags, stream_id, payload);
        out
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn request_starts_with_preface() {
        let mut transport = ScriptedTransport::new(vec![frame(
            FRAME_DATA,
            FLAG_END_STREAM,
            STREAM_ID,
            b"resp",
        )]);
        let out = post(&mut transport, "10.0.0.9:26400", "/svc/Method", b"req", soon());
        assert_eq!(out.unwrap().data, b"resp");
        assert!(transport.outbound.starts_with(PREFACE));
    }

    #[test]
    fn body_split_across_data_frames() {
        let mut chunks = frame(FRAME_HEADERS, FLAG_END_HEADERS, STREAM_ID, &[]);
        chunks.extend(frame(FRAME_DATA, 0, STREAM_ID, b"par"));
        chunks.extend(frame(FRAME_DATA, FLAG_END_STREAM, STREAM_ID, b"tial"));
        let mut transport = ScriptedTransport::new(vec![chunks]);
        let out = post(&mut transport, "h", "/p", b"", soon()).unwrap();
        assert_eq!(out.data, b"partial");
    }

    #[test]
    fn settings_gets_acked_and_ping_answered() {
        let mut chunks = frame(FRAME_SETTINGS, 0, 0, &[]);
        chunks.extend(frame(FRAME_PING, 0, 0, &[7; 8]));
        chunks.extend(frame(FRAME_DATA, FLAG_END_STREAM, STREAM_ID, b"ok"));
        let mut transport = ScriptedTransport::new(vec![chunks]);
        post(&mut transport, "h", "/p", b"", soon()).unwrap();

        // outbound holds our request plus a SETTINGS ack and a PING ack
        let ack = frame(FRAME_SETTINGS, FLAG_ACK, 0, &[]);
        let pong = frame(FRAME_PING, FLAG_ACK, 0, &[7; 8]);
        let out = transport.outbound;
        assert!(out.windows(ack.len()).any(|w| w == ack));
        assert!(out.windows(pong.len()).any(|w| w == pong));
    }

    #[test]
    fn rst_stream_fails_the_call() {
        let mut transport = ScriptedTransport::new(vec![frame(
            FRAME_RST_STREAM,
            0,
            STREAM_ID,
            &8u32.to_be_bytes(),
        )]);
        assert_eq!(
            post(&mut transport, "h", "/p", b"", soon()).err(),
            Some(H2Error::StreamReset)
        );
    }

    #[test]
    fn goaway_fails_the_call() {
        let mut transport =
            ScriptedTransport::new(vec![frame(FRAME_GOAWAY, 0, 0, &[0; 8])]);
        assert_eq!(
            post(&mut transport, "h", "/p", b"", soon()).err(),
            Some(H2Error::GoAway)
        );
    }

    #[test]
    fn trailers_only_response_is_empty_ok() {
        let mut transport = ScriptedTransport::new(vec![frame(
            FRAME_HEADERS,
            FLAG_END_HEADERS | FLAG_END_STREAM,
            STREAM_ID,
            &[],
        )]);
        let out = post(&mut transport, "h", "/p", b"", soon()).unwrap();
        assert!(out.data.is_empty());
    }

    #[test]
    fn peer_close_is_a_transport_error() {
        let mut transport = ScriptedTransport::new(vec![]);
        assert_eq!(
            post(&mut transport, "h", "/p", b"", soon()).err(),
            Some(H2Error::Transport(TransportError::Closed))
        );
    }

    #[test]
    fn hpack_int_prefix_overflow() {
        // RFC 7541 C.1.2 encodes 1337 with a 5-bit prefix
        let mut out = Vec::new();
        hpack_int(&mut out, 0x00, 5, 1337);
        assert_eq!(out, [0x1f, 0x9a, 0x0a]);

        // 4-bit prefix: 1337 - 15 = 1322 = 0x2a + (10 << 7)
        let mut out = Vec::new();
        hpack_int(&mut out, 0x00, 4, 1337);
        assert_eq!(out, [0x0f, 0xaa, 0x0a]);
    }

    #[test]
    fn frame_reader_handles_partial_headers() {
        let mut reader = FrameReader::new();
        let data = frame(FRAME_DATA, 0, 1, b"abc");
        reader.push(&data[..5]);
        assert!(reader.next_frame().unwrap().is_none());
        reader.push(&data[5..]);
        let f = reader.next_frame().unwrap().unwrap();
        assert_eq!(f.payload, b"abc");
    }
}
