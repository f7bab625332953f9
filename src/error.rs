#![allow(dead_code)] // Some variants reserved for the espidf-only code paths

//! Unified error types for the button hub firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level control loop's error handling uniform. Recoverable conditions
//! (RPC failures, decode errors, missing files) are data, not panics; the
//! only unrecoverable condition is the storage layer being used before it
//! is mounted, which restarts the device.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An RPC against the robot failed.
    Rpc(RpcError),
    /// The command-table persistence layer failed.
    Store(StoreError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Peripheral or filesystem initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e) => write!(f, "rpc: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcError {
    /// Request did not fit the send buffer or a field encoder failed.
    EncodeFailed,
    /// The HTTP/2 connection to the robot could not be established.
    NotConnected,
    /// No completion signal arrived within the call deadline.
    Timeout,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeFailed => write!(f, "encode failed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e)
    }
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Requested file does not exist.
    NotFound,
    /// File open/read/write failed.
    IoError,
    /// Stored data failed the version or format check.
    BadFormat,
    /// The filesystem was used before being mounted.
    NotMounted,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::IoError => write!(f, "I/O error"),
            Self::BadFormat => write!(f, "bad format"),
            Self::NotMounted => write!(f, "filesystem not mounted"),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    WifiDisconnected,
    BleInitFailed,
    HttpRequestFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::WifiDisconnected => write!(f, "WiFi disconnected"),
            Self::BleInitFailed => write!(f, "BLE init failed"),
            Self::HttpRequestFailed => write!(f, "HTTP request failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
