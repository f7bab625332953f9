//! Minimal Protocol-Buffers wire codec.
//!
//! No schema compiler, no reflection. The writer streams proto3 fields
//! into a bounded buffer; the reader walks a message and hands each field
//! to a callback, which is how the typed message layer in
//! [`messages`](super::messages) builds values incrementally. Unknown
//! fields are skipped, per proto3 rules.
//!
//! proto3 default elision applies on encode: zero varints, empty strings
//! and 0.0 doubles are not written.

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

pub const WIRE_VARINT: u32 = 0;
pub const WIRE_FIXED64: u32 = 1;
pub const WIRE_LEN: u32 = 2;
pub const WIRE_FIXED32: u32 = 5;

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Streaming field writer with a hard size cap.
///
/// All writes after an overflow are no-ops; the caller checks
/// [`ProtoWriter::overflowed`] once at the end instead of after every
/// field, mirroring how the send path reports a single encode failure.
pub struct ProtoWriter {
    buf: Vec<u8>,
    limit: usize,
    overflow: bool,
}

impl ProtoWriter {
    pub fn new(limit: usize) -> Self {
        Self { buf: Vec::new(), limit, overflow: false }
    }

    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        if self.overflow { None } else { Some(self.buf) }
    }

    fn push(&mut self, byte: u8) {
        if self.buf.len() >= self.limit {
            self.overflow = true;
            return;
        }
        self.buf.push(byte);
    }

    fn push_slice(&mut self, data: &[u8]) {
        if self.buf.len() + data.len() > self.limit {
            self.overflow = true;
            return;
        }
        self.buf.extend_from_slice(data);
    }

    fn varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.push(byte);
                return;
            }
            self.push(byte | 0x80);
        }
    }

    fn tag(&mut self, field: u32, wire: u32) {
        self.varint(u64::from(field << 3 | wire));
    }

    /// uint32/uint64/bool/enum field; elided when zero.
    pub fn uint(&mut self, field: u32, value: u64) {
        if value == 0 {
            return;
        }
        self.tag(field, WIRE_VARINT);
        self.varint(value);
    }

    pub fn bool(&mut self, field: u32, value: bool) {
        self.uint(field, u64::from(value));
    }

    /// UTF-8 string field; elided when empty.
    pub fn string(&mut self, field: u32, value: &str) {
        if value.is_empty() {
            return;
        }
        self.tag(field, WIRE_LEN);
        self.varint(value.len() as u64);
        self.push_slice(value.as_bytes());
    }

    /// double field; elided when exactly zero.
    pub fn double(&mut self, field: u32, value: f64) {
        if value == 0.0 {
            return;
        }
        self.tag(field, WIRE_FIXED64);
        self.push_slice(&value.to_le_bytes());
    }

    /// Nested message, written through a sub-writer so the length prefix
    /// can be computed before splicing. Oneof/submessage presence is
    /// explicit: an empty nested message is still written (zero length),
    /// which is how parameterless commands mark their variant.
    pub fn message(&mut self, field: u32, fill: impl FnOnce(&mut ProtoWriter)) {
        let mut nested = ProtoWriter::new(self.limit.saturating_sub(self.buf.len()));
        fill(&mut nested);
        if nested.overflow {
            self.overflow = true;
            return;
        }
        self.tag(field, WIRE_LEN);
        self.varint(nested.buf.len() as u64);
        self.push_slice(&nested.buf);
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// One decoded field, handed to the visitor callback.
pub enum Field<'a> {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    Bytes(&'a [u8]),
}

impl Field<'_> {
    pub fn as_u64(&self) -> u64 {
        match self {
            Field::Varint(v) | Field::Fixed64(v) => *v,
            Field::Fixed32(v) => u64::from(*v),
            Field::Bytes(_) => 0,
        }
    }

    pub fn as_bool(&self) -> bool {
        self.as_u64() != 0
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Field::Fixed64(v) => f64::from_bits(*v),
            Field::Fixed32(v) => f64::from(f32::from_bits(*v)),
            _ => 0.0,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Field::Bytes(b) => core::str::from_utf8(b).unwrap_or(""),
            _ => "",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Field::Bytes(b) => b,
            _ => &[],
        }
    }
}

/// Walk a message, invoking `visit(field_number, field)` for each field.
/// Returns `false` on malformed wire data; fields already visited stay
/// applied (decode is best-effort by design).
pub fn decode_message<'a>(
    data: &'a [u8],
    mut visit: impl FnMut(u32, Field<'a>),
) -> bool {
    let mut pos = 0usize;
    while pos < data.len() {
        let Some(key) = read_varint(data, &mut pos) else { return false };
        let field = (key >> 3) as u32;
        let wire = (key & 0x7) as u32;
        if field == 0 {
            return false;
        }
        match wire {
            WIRE_VARINT => {
                let Some(v) = read_varint(data, &mut pos) else { return false };
                visit(field, Field::Varint(v));
            }
            WIRE_FIXED64 => {
                let Some(bytes) = take(data, &mut pos, 8) else { return false };
                let v = u64::from_le_bytes(bytes.try_into().unwrap_or([0; 8]));
                visit(field, Field::Fixed64(v));
            }
            WIRE_LEN => {
                let Some(len) = read_varint(data, &mut pos) else { return false };
                let Ok(len) = usize::try_from(len) else { return false };
                let Some(bytes) = take(data, &mut pos, len) else { return false };
                visit(field, Field::Bytes(bytes));
            }
            WIRE_FIXED32 => {
                let Some(bytes) = take(data, &mut pos, 4) else { return false };
                let v = u32::from_le_bytes(bytes.try_into().unwrap_or([0; 4]));
                visit(field, Field::Fixed32(v));
            }
            _ => return false, // groups and reserved wire types
        }
    }
    true
}

fn read_varint(data: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let byte = *data.get(*pos)?;
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None // more than 10 bytes
}

fn take<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> Option<&'a [u8]> {
    let end = pos.checked_add(len)?;
    let slice = data.get(*pos..end)?;
    *pos = end;
    Some(slice)
}
