//! Flash file storage adapter.
//!
//! The command table persists as whole files with a write-temp /
//! remove-canonical / rename commit sequence, so the port is file-shaped
//! rather than key-value. On ESP32 the files live on a SPIFFS partition
//! mounted at `/flash`; the simulation backend uses a per-process scratch
//! directory so host tests never collide.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use log::{info, warn};

use crate::error::StoreError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Whole-file persistent storage.
///
/// `rename` must be atomic with respect to power loss: after a crash the
/// name refers to either the old content, the new content, or nothing,
/// never a torn file.
pub trait FileStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StoreError>;
    /// Removing a missing file is not an error.
    fn remove(&mut self, name: &str) -> Result<(), StoreError>;
    fn rename(&mut self, from: &str, to: &str) -> Result<(), StoreError>;
    fn exists(&self, name: &str) -> bool;
}

const MOUNT_POINT: &str = "/flash";

pub struct FlashStore {
    base: PathBuf,
}

impl FlashStore {
    /// Mount flash storage and return a handle rooted at the mount point.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, StoreError> {
        let conf = esp_vfs_spiffs_conf_t {
            base_path: c"/flash".as_ptr(),
            partition_label: core::ptr::null(),
            max_files: 8,
            format_if_mount_failed: true,
        };
        // SAFETY: called from the main task before any file access.
        let ret = unsafe { esp_vfs_spiffs_register(&conf) };
        // INVALID_STATE means a previous handle already mounted it.
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            warn!("FlashStore: SPIFFS mount failed ({ret})");
            return Err(StoreError::NotMounted);
        }
        info!("FlashStore: SPIFFS mounted at {MOUNT_POINT}");
        Ok(Self { base: PathBuf::from(MOUNT_POINT) })
    }

    /// Simulation backend rooted at a fresh scratch directory.
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, StoreError> {
        let dir = std::env::temp_dir().join(format!(
            "buttonhub-flash-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        fs::create_dir_all(&dir).map_err(|_| StoreError::NotMounted)?;
        info!("FlashStore: simulation backend at {}", dir.display());
        Ok(Self { base: dir })
    }

    /// Simulation backend rooted at an explicit directory (tests).
    #[cfg(not(target_os = "espidf"))]
    pub fn new_in(dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir).map_err(|_| StoreError::NotMounted)?;
        Ok(Self { base: dir })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }
}

impl FileStore for FlashStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.path(name)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => {
                warn!("FlashStore: read {name} failed: {e}");
                Err(StoreError::IoError)
            }
        }
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.path(name);
        let mut f = fs::File::create(&path).map_err(|e| {
            warn!("FlashStore: create {name} failed: {e}");
            StoreError::IoError
        })?;
        f.write_all(data).map_err(|_| StoreError::IoError)?;
        // fsync before the rename step can make the write durable
        f.sync_all().map_err(|_| StoreError::IoError)?;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("FlashStore: remove {name} failed: {e}");
                Err(StoreError::IoError)
            }
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        fs::rename(self.path(from), self.path(to)).map_err(|e| {
            warn!("FlashStore: rename {from} -> {to} failed: {e}");
            StoreError::IoError
        })
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

/// In-memory store for unit tests of persistence logic.
#[cfg(any(test, not(target_os = "espidf")))]
pub struct MemStore {
    files: std::collections::HashMap<String, Vec<u8>>,
    /// When set, the next write fails. Lets tests exercise crash paths.
    pub fail_next_write: bool,
}

#[cfg(any(test, not(target_os = "espidf")))]
impl MemStore {
    pub fn new() -> Self {
        Self { files: std::collections::HashMap::new(), fail_next_write: false }
    }
}

#[cfg(any(test, not(target_os = "espidf")))]
impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, not(target_os = "espidf")))]
impl FileStore for MemStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.files.get(name).cloned().ok_or(StoreError::NotFound)
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(StoreError::IoError);
        }
        self.files.insert(name.to_owned(), data.to_vec());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StoreError> {
        self.files.remove(name);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        match self.files.remove(from) {
            Some(data) => {
                self.files.insert(to.to_owned(), data);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_store_round_trip() {
        let mut store = FlashStore::new().unwrap();
        store.write("a.bin", b"hello").unwrap();
        assert!(store.exists("a.bin"));
        assert_eq!(store.read("a.bin").unwrap(), b"hello");

        store.rename("a.bin", "b.bin").unwrap();
        assert!(!store.exists("a.bin"));
        assert_eq!(store.read("b.bin").unwrap(), b"hello");

        store.remove("b.bin").unwrap();
        assert!(matches!(store.read("b.bin"), Err(StoreError::NotFound)));
    }

    #[test]
    fn remove_missing_is_ok() {
        let mut store = FlashStore::new().unwrap();
        store.remove("never-existed.bin").unwrap();
    }

    #[test]
    fn mem_store_rename_missing_fails() {
        let mut store = MemStore::new();
        assert!(matches!(store.rename("x", "y"), Err(StoreError::NotFound)));
    }

    #[test]
    fn mem_store_fail_next_write_fires_once() {
        let mut store = MemStore::new();
        store.fail_next_write = true;
        assert!(store.write("f", b"1").is_err());
        assert!(store.write("f", b"2").is_ok());
        assert_eq!(store.read("f").unwrap(), b"2");
    }
}
