//! Per-call byte transport under the HTTP/2 session.
//!
//! Every RPC opens a fresh connection and tears it down when the call
//! resolves; there is no connection pooling on a device this small.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: TCP + esp-tls (mbedTLS) session. The
//!   robot presents a self-signed certificate, so peer verification is
//!   skipped, matching the pairing model (same-LAN, serial-number bound).
//! - **all other targets**: plaintext `std::net::TcpStream` so host tests
//!   can stand in a local socket for the peer.

use core::fmt;
use std::time::Duration;

/// Byte-oriented connection used by one RPC call.
///
/// `read` blocks up to the transport's read timeout; `Ok(0)` means the
/// timeout elapsed with no data, and `Err(Closed)` means the peer went
/// away.
pub trait Transport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    ConnectFailed,
    Closed,
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::Closed => write!(f, "connection closed by peer"),
            Self::Io => write!(f, "socket I/O error"),
        }
    }
}

/// Poll interval for the response loop; keeps the worker from starving
/// other tasks on a shared core.
pub const READ_TIMEOUT: Duration = Duration::from_millis(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// ESP-IDF backend (TCP + esp-tls)
// ---------------------------------------------------------------------------

#[cfg(target_os = "espidf")]
pub struct TlsTransport {
    tls: *mut esp_idf_svc::sys::esp_tls_t,
}

#[cfg(target_os = "espidf")]
impl TlsTransport {
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        use esp_idf_svc::sys::*;

        let mut cfg: esp_tls_cfg_t = unsafe { core::mem::zeroed() };
        // Self-signed peer: no CA bundle, skip name check.
        cfg.set_skip_common_name(true);
        cfg.timeout_ms = CONNECT_TIMEOUT.as_millis() as i32;

        // SAFETY: tls handle is owned by this struct and destroyed in Drop.
        unsafe {
            let tls = esp_tls_init();
            if tls.is_null() {
                return Err(TransportError::ConnectFailed);
            }
            let ret = esp_tls_conn_new_sync(
                host.as_ptr() as *const _,
                host.len() as i32,
                i32::from(port),
                &cfg,
                tls,
            );
            if ret != 1 {
                esp_tls_conn_destroy(tls);
                return Err(TransportError::ConnectFailed);
            }
            Ok(Self { tls })
        }
    }
}

#[cfg(target_os = "espidf")]
impl Transport for TlsTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        use esp_idf_svc::sys::*;
        // SAFETY: buf outlives the call; tls is valid until Drop.
        let n = unsafe {
            esp_tls_conn_read(self.tls, buf.as_mut_ptr() as *mut _, buf.len())
        };
        match n {
            0 => Err(TransportError::Closed),
            n if n > 0 => Ok(n as usize),
            n if n == ESP_TLS_ERR_SSL_WANT_READ as isize
                || n == ESP_TLS_ERR_SSL_WANT_WRITE as isize =>
            {
                std::thread::sleep(READ_TIMEOUT);
                Ok(0)
            }
            _ => Err(TransportError::Io),
        }
    }

    fn write_all(&mut self, mut data: &[u8]) -> Result<(), TransportError> {
        use esp_idf_svc::sys::*;
        while !data.is_empty() {
            // SAFETY: data outlives the call; tls is valid until Drop.
            let n = unsafe {
                esp_tls_conn_write(self.tls, data.as_ptr() as *const _, data.len())
            };
            if n < 0 {
                return Err(TransportError::Io);
            }
            data = &data[n as usize..];
        }
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl Drop for TlsTransport {
    fn drop(&mut self) {
        // SAFETY: handle was created by esp_tls_init and not yet destroyed.
        unsafe {
            esp_idf_svc::sys::esp_tls_conn_destroy(self.tls);
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation backend (plaintext TCP)
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "espidf"))]
pub struct TcpTransport {
    stream: std::net::TcpStream,
}

#[cfg(not(target_os = "espidf"))]
impl TcpTransport {
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        use std::net::{TcpStream, ToSocketAddrs};

        let mut addrs = (host, port)
            .to_socket_addrs()
            .map_err(|_| TransportError::ConnectFailed)?;
        let addr = addrs.next().ok_or(TransportError::ConnectFailed)?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|_| TransportError::ConnectFailed)?;
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|_| TransportError::Io)?;
        stream.set_nodelay(true).ok();
        Ok(Self { stream })
    }
}

#[cfg(not(target_os = "espidf"))]
impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        use std::io::Read;
        match self.stream.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(0)
            }
            Err(_) => Err(TransportError::Io),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        use std::io::Write;
        self.stream.write_all(data).map_err(|_| TransportError::Io)
    }
}

/// Open the platform connection for one call.
#[cfg(target_os = "espidf")]
pub fn connect(host: &str, port: u16) -> Result<impl Transport, TransportError> {
    TlsTransport::connect(host, port)
}

/// Open the platform connection for one call.
#[cfg(not(target_os = "espidf"))]
pub fn connect(host: &str, port: u16) -> Result<impl Transport, TransportError> {
    TcpTransport::connect(host, port)
}
