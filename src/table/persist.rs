//! Versioned on-flash encoding of the command table.
//!
//! File layout (all integers little-endian, matching the flash host CPU):
//!
//! ```text
//! int32  version           (current = 7; mismatch discards the file)
//! int32  buttons_blob_len  + that many bytes of UTF-8 JSON
//! int32  commands_blob_len + that many bytes of UTF-8 JSON
//! ```
//!
//! Commit is write-temp, remove-canonical, rename-temp. A crash between the
//! remove and the rename loses the table; the device then boots empty. A
//! torn canonical file can never be observed.

use log::warn;

use crate::adapters::storage::FileStore;
use crate::error::StoreError;

pub const FILE_VERSION: i32 = 7;
pub const TABLE_FILE: &str = "command_table.dat";
pub const TABLE_TMP_FILE: &str = "command_table.tmp";

pub struct TableBlobs {
    pub buttons_json: String,
    pub commands_json: String,
}

pub fn encode(blobs: &TableBlobs) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        12 + blobs.buttons_json.len() + blobs.commands_json.len(),
    );
    out.extend_from_slice(&FILE_VERSION.to_le_bytes());
    write_blob(&mut out, &blobs.buttons_json);
    write_blob(&mut out, &blobs.commands_json);
    out
}

pub fn decode(data: &[u8]) -> Result<TableBlobs, StoreError> {
    let mut cursor = 0usize;
    let version = read_i32(data, &mut cursor)?;
    if version != FILE_VERSION {
        warn!("command table: file version {version} != {FILE_VERSION}, discarding");
        return Err(StoreError::BadFormat);
    }
    let buttons_json = read_blob(data, &mut cursor)?;
    let commands_json = read_blob(data, &mut cursor)?;
    Ok(TableBlobs { buttons_json, commands_json })
}

/// Write the encoded table with atomic-replace semantics.
pub fn commit(store: &mut impl FileStore, data: &[u8]) -> Result<(), StoreError> {
    store.write(TABLE_TMP_FILE, data)?;
    store.remove(TABLE_FILE)?;
    store.rename(TABLE_TMP_FILE, TABLE_FILE)
}

fn write_blob(out: &mut Vec<u8>, text: &str) {
    out.extend_from_slice(&(text.len() as i32).to_le_bytes());
    out.extend_from_slice(text.as_bytes());
}

fn read_i32(data: &[u8], cursor: &mut usize) -> Result<i32, StoreError> {
    let end = cursor.checked_add(4).ok_or(StoreError::BadFormat)?;
    let bytes = data.get(*cursor..end).ok_or(StoreError::BadFormat)?;
    *cursor = end;
    Ok(i32::from_le_bytes(bytes.try_into().map_err(|_| StoreError::BadFormat)?))
}

fn read_blob(data: &[u8], cursor: &mut usize) -> Result<String, StoreError> {
    let len = read_i32(data, cursor)?;
    let len = usize::try_from(len).map_err(|_| StoreError::BadFormat)?;
    let end = cursor.checked_add(len).ok_or(StoreError::BadFormat)?;
    let bytes = data.get(*cursor..end).ok_or(StoreError::BadFormat)?;
    *cursor = end;
    String::from_utf8(bytes.to_vec()).map_err(|_| StoreError::BadFormat)
}
