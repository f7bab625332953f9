//! Hub configuration parameters
//!
//! All tunable parameters for the button hub, plus the small persisted
//! settings blob that survives reboots (robot target, press feedback).

use log::warn;
use serde::{Deserialize, Serialize};

use crate::adapters::storage::FileStore;
use crate::error::StoreError;

/// Flash file holding the postcard settings blob.
const SETTINGS_FILE: &str = "hub_settings.dat";

/// Core hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    // --- Robot link ---
    /// gRPC port on the robot
    pub robot_port: u16,
    /// Per-call RPC deadline (seconds)
    pub rpc_timeout_secs: u32,
    /// Delay between a move command and its lock-shim follow-up (ms)
    pub lock_shim_delay_ms: u32,

    // --- Robot state ---
    /// Minimum spacing between robot-info refreshes (seconds)
    pub robot_info_interval_secs: u32,

    // --- Input ---
    /// Debounce window for GPIO keys (milliseconds)
    pub gpio_debounce_ms: u32,
    /// Beacon observations older than this are droppable (seconds)
    pub observation_ttl_secs: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            // Robot link
            robot_port: 26400,
            rpc_timeout_secs: 30,
            lock_shim_delay_ms: 100,

            // Robot state
            robot_info_interval_secs: 30,

            // Input
            gpio_debounce_ms: 30,
            observation_ttl_secs: 300,

            // Timing
            control_loop_interval_ms: 50,
        }
    }
}

/// Persisted hub settings. Stored as a postcard blob in flash; defaults
/// apply on first boot or after a wipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubSettings {
    /// Hostname or serial number of the target robot; empty until paired.
    pub robot_host: String,
    /// Spoken acknowledgement on button press.
    pub beep_on_press: bool,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            robot_host: String::new(),
            beep_on_press: true,
        }
    }
}

impl HubSettings {
    /// Load from flash; a missing or unreadable blob yields defaults.
    pub fn load(store: &mut impl FileStore) -> Self {
        match store.read(SETTINGS_FILE) {
            Ok(bytes) => postcard::from_bytes(&bytes).unwrap_or_else(|e| {
                warn!("settings blob unreadable ({e}), using defaults");
                Self::default()
            }),
            Err(StoreError::NotFound) => Self::default(),
            Err(e) => {
                warn!("settings load failed ({e}), using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &mut impl FileStore) {
        match postcard::to_allocvec(self) {
            Ok(bytes) => {
                if let Err(e) = store.write(SETTINGS_FILE, &bytes) {
                    warn!("settings save failed: {e}");
                }
            }
            Err(e) => warn!("settings encode failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = HubConfig::default();
        assert!(c.robot_port > 1024);
        assert!(c.rpc_timeout_secs > 0);
        assert!(c.lock_shim_delay_ms > 0);
        assert!(c.gpio_debounce_ms > 0);
        assert!(c.control_loop_interval_ms > 0);
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = HubConfig::default();
        assert!(
            u64::from(c.lock_shim_delay_ms) < u64::from(c.rpc_timeout_secs) * 1000,
            "shim delay must fit well inside the RPC deadline"
        );
        assert!(
            c.control_loop_interval_ms > c.gpio_debounce_ms / 2,
            "control loop should not outpace debounce sampling"
        );
    }

    #[test]
    fn serde_roundtrip() {
        let c = HubConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: HubConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.robot_port, c2.robot_port);
        assert_eq!(c.rpc_timeout_secs, c2.rpc_timeout_secs);
    }

    #[test]
    fn settings_postcard_roundtrip() {
        let s = HubSettings {
            robot_host: "BK2300017".into(),
            beep_on_press: false,
        };
        let bytes = postcard::to_allocvec(&s).unwrap();
        let s2: HubSettings = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(s, s2);
    }

    #[test]
    fn settings_survive_store_roundtrip() {
        use crate::adapters::storage::MemStore;
        let mut store = MemStore::new();
        let s = HubSettings {
            robot_host: "robot-BK2300017.local".into(),
            beep_on_press: true,
        };
        s.save(&mut store);
        assert_eq!(HubSettings::load(&mut store), s);
    }

    #[test]
    fn missing_settings_file_yields_defaults() {
        use crate::adapters::storage::MemStore;
        let mut store = MemStore::new();
        assert_eq!(HubSettings::load(&mut store), HubSettings::default());
    }

    #[test]
    fn settings_default_is_unpaired() {
        let s = HubSettings::default();
        assert!(s.robot_host.is_empty());
        assert!(s.beep_on_press);
    }
}
