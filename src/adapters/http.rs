//! Outbound HTTP adapter for webhook-style button commands.
//!
//! Button bindings can target arbitrary HTTP endpoints (home automation
//! bridges, doorbells). Only the success of the request matters to the
//! dispatcher, so the port returns a bare status check.

use log::{info, warn};

use crate::error::{CommsError, Result};

/// Fire an HTTP request and report whether it got a 2xx response.
pub trait HttpPort {
    fn get(&mut self, url: &str) -> Result<()>;
    fn post(&mut self, url: &str, body: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ESP-IDF backend (esp_http_client)
// ---------------------------------------------------------------------------

#[cfg(target_os = "espidf")]
pub struct EspHttp;

#[cfg(target_os = "espidf")]
impl EspHttp {
    pub fn new() -> Self {
        Self
    }

    fn perform(url: &str, body: Option<&str>) -> Result<()> {
        use esp_idf_svc::sys::*;

        let url_c = std::ffi::CString::new(url)
            .map_err(|_| crate::error::Error::Comms(CommsError::HttpRequestFailed))?;

        let mut config: esp_http_client_config_t = unsafe { core::mem::zeroed() };
        config.url = url_c.as_ptr();
        config.timeout_ms = 10_000;
        config.method = if body.is_some() {
            esp_http_client_method_t_HTTP_METHOD_POST
        } else {
            esp_http_client_method_t_HTTP_METHOD_GET
        };

        // SAFETY: handle is used only within this function and always cleaned up.
        unsafe {
            let client = esp_http_client_init(&config);
            if client.is_null() {
                return Err(crate::error::Error::Comms(CommsError::HttpRequestFailed));
            }
            if let Some(body) = body {
                esp_http_client_set_post_field(client, body.as_ptr() as *const _, body.len() as i32);
                esp_http_client_set_header(
                    client,
                    c"Content-Type".as_ptr(),
                    c"application/json".as_ptr(),
                );
            }
            let ret = esp_http_client_perform(client);
            let status = esp_http_client_get_status_code(client);
            esp_http_client_cleanup(client);

            if ret != ESP_OK || !(200..300).contains(&status) {
                warn!("http: request to {url} failed (ret={ret}, status={status})");
                return Err(crate::error::Error::Comms(CommsError::HttpRequestFailed));
            }
        }
        info!("http: {url} ok");
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl HttpPort for EspHttp {
    fn get(&mut self, url: &str) -> Result<()> {
        Self::perform(url, None)
    }

    fn post(&mut self, url: &str, body: &str) -> Result<()> {
        Self::perform(url, Some(body))
    }
}

// ---------------------------------------------------------------------------
// Simulation backend (plain HTTP/1.1 over TCP, for host tests)
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "espidf"))]
pub struct SimHttp;

#[cfg(not(target_os = "espidf"))]
impl SimHttp {
    pub fn new() -> Self {
        Self
    }

    fn perform(url: &str, body: Option<&str>) -> Result<()> {
        use std::io::{Read, Write};

        let (host_port, path) = split_url(url)
            .ok_or(crate::error::Error::Comms(CommsError::HttpRequestFailed))?;
        let mut stream = std::net::TcpStream::connect(&host_port)
            .map_err(|_| crate::error::Error::Comms(CommsError::HttpRequestFailed))?;
        stream
            .set_read_timeout(Some(std::time::Duration::from_secs(10)))
            .ok();

        let host = host_port.rsplit_once(':').map_or(host_port.as_str(), |(h, _)| h);
        let request = match body {
            Some(body) => format!(
                "POST {path} HTTP/1.1\r\nHost: {host}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            ),
            None => format!(
                "GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n"
            ),
        };
        stream
            .write_all(request.as_bytes())
            .map_err(|_| crate::error::Error::Comms(CommsError::HttpRequestFailed))?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response).ok();
        let status = parse_status(&response)
            .ok_or(crate::error::Error::Comms(CommsError::HttpRequestFailed))?;
        if !(200..300).contains(&status) {
            warn!("http: {url} returned {status}");
            return Err(crate::error::Error::Comms(CommsError::HttpRequestFailed));
        }
        info!("http: {url} ok");
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpPort for SimHttp {
    fn get(&mut self, url: &str) -> Result<()> {
        Self::perform(url, None)
    }

    fn post(&mut self, url: &str, body: &str) -> Result<()> {
        Self::perform(url, Some(body))
    }
}

/// Split an `http://host[:port]/path` URL into ("host:port", "/path").
#[cfg(not(target_os = "espidf"))]
fn split_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("http://")?;
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        return None;
    }
    let host_port = if authority.contains(':') {
        authority.to_owned()
    } else {
        format!("{authority}:80")
    };
    Some((host_port, path.to_owned()))
}

#[cfg(not(target_os = "espidf"))]
fn parse_status(response: &[u8]) -> Option<u16> {
    // "HTTP/1.1 200 OK"
    let line = response.split(|b| *b == b'\r').next()?;
    let text = core::str::from_utf8(line).ok()?;
    text.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn splits_urls() {
        assert_eq!(
            split_url("http://bridge.local/api/press"),
            Some(("bridge.local:80".into(), "/api/press".into()))
        );
        assert_eq!(
            split_url("http://10.0.0.5:8123/webhook"),
            Some(("10.0.0.5:8123".into(), "/webhook".into()))
        );
        assert_eq!(
            split_url("http://host"),
            Some(("host:80".into(), "/".into()))
        );
        assert_eq!(split_url("https://host/"), None);
        assert_eq!(split_url("ftp://host/"), None);
        assert_eq!(split_url("http://"), None);
    }

    #[test]
    fn parses_status_lines() {
        assert_eq!(parse_status(b"HTTP/1.1 200 OK\r\n\r\n"), Some(200));
        assert_eq!(parse_status(b"HTTP/1.1 404 Not Found\r\n"), Some(404));
        assert_eq!(parse_status(b"garbage"), None);
        assert_eq!(parse_status(b""), None);
    }

    /// One-shot server on a loopback port; returns the port and a handle
    /// yielding the raw request bytes.
    fn serve_once(status_line: &'static str) -> (u16, std::thread::JoinHandle<Vec<u8>>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // The client writes the whole request before reading, so a
            // short read timeout is enough to know it is done sending.
            stream
                .set_read_timeout(Some(std::time::Duration::from_millis(200)))
                .unwrap();
            while let Ok(n) = stream.read(&mut buf) {
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(format!("{status_line}\r\nContent-Length: 0\r\n\r\n").as_bytes())
                .unwrap();
            request
        });
        (port, handle)
    }

    #[test]
    fn get_succeeds_on_2xx() {
        let (port, handle) = serve_once("HTTP/1.1 200 OK");
        let mut http = SimHttp::new();
        assert!(http.get(&format!("http://127.0.0.1:{port}/api/press")).is_ok());
        let request = handle.join().unwrap();
        assert!(request.starts_with(b"GET /api/press HTTP/1.1\r\n"));
    }

    #[test]
    fn post_sends_body_and_fails_on_5xx() {
        let (port, handle) = serve_once("HTTP/1.1 503 Service Unavailable");
        let mut http = SimHttp::new();
        assert!(http
            .post(&format!("http://127.0.0.1:{port}/webhook"), r#"{"k":1}"#)
            .is_err());
        let request = handle.join().unwrap();
        assert!(request.starts_with(b"POST /webhook HTTP/1.1\r\n"));
        assert!(request.windows(7).any(|w| w == br#"{"k":1}"#.as_slice()));
    }
}
