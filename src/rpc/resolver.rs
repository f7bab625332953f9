//! Just-in-time robot address resolution.
//!
//! The configured host may be a raw serial number (pairing UI lets users
//! type it straight off the label), an mDNS hostname, or an IP literal.
//! Serial numbers are rewritten to the robot's `robot-<sn>.local` mDNS
//! name before lookup. On lookup failure the last successful resolution
//! for the same hostname is reused, so a robot that drops off mDNS stays
//! reachable at its old address until DHCP moves it.

use std::net::{IpAddr, ToSocketAddrs};
use std::sync::{Mutex, PoisonError};

use log::info;

/// Name-to-address lookup, injectable for tests.
pub trait HostLookup {
    fn lookup(&self, host: &str) -> Option<IpAddr>;
}

/// System resolver (lwIP on device, libc on the host).
pub struct DnsLookup;

impl HostLookup for DnsLookup {
    fn lookup(&self, host: &str) -> Option<IpAddr> {
        // Port is irrelevant for the lookup itself.
        (host, 0).to_socket_addrs().ok()?.next().map(|a| a.ip())
    }
}

/// Robot serial numbers: `BKxxxxxxx`, ten digits, or a bare 3-digit
/// development unit number.
fn is_robot_serial_number(name: &str) -> bool {
    let bytes = name.as_bytes();
    (bytes.len() == 9
        && bytes[0].eq_ignore_ascii_case(&b'b')
        && bytes[1].eq_ignore_ascii_case(&b'k'))
        || (bytes.len() == 10 && bytes.iter().all(u8::is_ascii_digit))
        || (bytes.len() == 3 && bytes.iter().all(u8::is_ascii_digit))
}

pub struct Resolver<L: HostLookup> {
    lookup: L,
    /// Last successful `(hostname, address)` pair.
    cache: Mutex<Option<(String, String)>>,
}

impl Resolver<DnsLookup> {
    pub fn new() -> Self {
        Self::with_lookup(DnsLookup)
    }
}

impl Default for Resolver<DnsLookup> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: HostLookup> Resolver<L> {
    pub fn with_lookup(lookup: L) -> Self {
        Self { lookup, cache: Mutex::new(None) }
    }

    /// Resolve `hostname` to an address string, falling back to the cached
    /// address for the same hostname, then to the (possibly rewritten)
    /// name itself.
    pub fn resolve(&self, hostname: &str) -> String {
        let query = if is_robot_serial_number(hostname) {
            format!("robot-{hostname}.local")
        } else {
            hostname.to_owned()
        };

        if let Some(ip) = self.lookup.lookup(&query) {
            let address = ip.to_string();
            info!("resolver: {query} -> {address}");
            *self.lock() = Some((hostname.to_owned(), address.clone()));
            return address;
        }

        if let Some((cached_host, cached_address)) = self.lock().as_ref() {
            if cached_host == hostname {
                info!("resolver: using cached {cached_address} for {hostname}");
                return cached_address.clone();
            }
        }

        info!("resolver: passing {query} through unresolved");
        query
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(String, String)>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
