//! Platform adapters behind the port traits.
//!
//! Every adapter compiles two backends: the real ESP-IDF implementation
//! under `target_os = "espidf"` and a simulation backend for host tests.

pub mod http;
pub mod storage;
pub mod time;
