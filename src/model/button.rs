//! Physical button identity.
//!
//! A [`KButton`] names one physical input: a BLE proximity beacon, one of
//! the on-device keys, or an external GPIO key. It is the primary key of
//! every map in the command table, so it is `Copy`, totally ordered and
//! hashed by value. Ordering is per-variant with variant-tag ordering
//! across kinds (the derive gives exactly that).
//!
//! The string codecs here pin the export wire format: addresses are 17
//! characters of lowercase colon-hex, UUIDs 36 characters of lowercase
//! hyphenated hex. Parsers reject anything that is not byte-for-byte in
//! that shape; the config server round-trips these strings verbatim.

use core::fmt;

/// BLE proximity beacon identity (iBeacon frame contents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppleIBeacon {
    /// Advertiser hardware address.
    pub address: [u8; 6],
    /// Proximity UUID.
    pub uuid: [u8; 16],
    pub major: u16,
    pub minor: u16,
}

/// One physical input source.
///
/// Field order inside [`AppleIBeacon`] matters: the derived `Ord` compares
/// address, then UUID, then major, then minor. That is the order used by the
/// export format and by clients sorting button lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KButton {
    /// Transient radio discovery; the name lifecycle follows the binding.
    AppleIBeacon(AppleIBeacon),
    /// Fixed on-device key (1, 2, 3).
    M5Button { id: u8 },
    /// Fixed external GPIO key.
    GpioButton { id: u8 },
}

impl KButton {
    /// Beacon-class buttons lose their display name when their binding is
    /// deleted; fixed-position buttons keep it (stable hardware slot).
    pub fn is_beacon(&self) -> bool {
        matches!(self, Self::AppleIBeacon(_))
    }
}

impl fmt::Display for KButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppleIBeacon(b) => {
                write!(f, "beacon {} {}", format_address(&b.address), b.major)
            }
            Self::M5Button { id } => write!(f, "m5 key {id}"),
            Self::GpioButton { id } => write!(f, "gpio key {id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Address codec: "aa:bb:cc:dd:ee:ff", exactly 17 chars
// ---------------------------------------------------------------------------

/// Format a 6-byte hardware address as lowercase colon-hex.
pub fn format_address(address: &[u8; 6]) -> String {
    let mut out = String::with_capacity(17);
    for (i, b) in address.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        push_hex_byte(&mut out, *b);
    }
    out
}

/// Parse a colon-hex address. Rejects any input that is not exactly
/// 17 characters with colons at positions 2, 5, 8, 11 and 14.
pub fn parse_address(s: &str) -> Option<[u8; 6]> {
    let bytes = s.as_bytes();
    if bytes.len() != 17 {
        return None;
    }
    let mut out = [0u8; 6];
    for (i, chunk) in bytes.chunks(3).enumerate() {
        if i < 5 && chunk[2] != b':' {
            return None;
        }
        out[i] = (hex_val(chunk[0])? << 4) | hex_val(chunk[1])?;
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// UUID codec: "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx", exactly 36 chars
// ---------------------------------------------------------------------------

/// Hyphen positions inside the canonical UUID text form.
const UUID_HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// Format a 16-byte UUID as lowercase hyphenated hex.
pub fn format_uuid(uuid: &[u8; 16]) -> String {
    let mut out = String::with_capacity(36);
    for (i, b) in uuid.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        push_hex_byte(&mut out, *b);
    }
    out
}

/// Parse a hyphenated UUID. Rejects any input that is not exactly
/// 36 characters with hyphens at positions 8, 13, 18 and 23.
pub fn parse_uuid(s: &str) -> Option<[u8; 16]> {
    let bytes = s.as_bytes();
    if bytes.len() != 36 {
        return None;
    }
    let mut out = [0u8; 16];
    let mut nibbles = 0usize;
    for (i, b) in bytes.iter().enumerate() {
        if UUID_HYPHENS.contains(&i) {
            if *b != b'-' {
                return None;
            }
            continue;
        }
        let v = hex_val(*b)?;
        out[nibbles / 2] = (out[nibbles / 2] << 4) | v;
        nibbles += 1;
    }
    debug_assert_eq!(nibbles, 32);
    Some(out)
}

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

fn push_hex_byte(out: &mut String, b: u8) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    out.push(HEX[(b >> 4) as usize] as char);
    out.push(HEX[(b & 0x0f) as usize] as char);
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
