//! Cached robot state: version, shelves, locations, shortcuts.
//!
//! The robot is queried piece by piece; each piece that arrives is kept
//! even when a later fetch in the same round fails, so the cache fills
//! incrementally across refresh rounds. `None` means "never fetched",
//! an empty list is a valid answer from the robot.

use std::sync::{Mutex, PoisonError};

use log::{debug, info};

use crate::rpc::{Location, ResultCode, RobotApiPort, Shelf, Shortcut};
use crate::version::RobotVersion;

#[derive(Debug, Clone, Default)]
pub struct RobotInfo {
    pub version: Option<RobotVersion>,
    pub shelves: Option<Vec<Shelf>>,
    pub locations: Option<Vec<Location>>,
    pub shortcuts: Option<Vec<Shortcut>>,
}

impl RobotInfo {
    pub fn is_complete(&self) -> bool {
        self.version.is_some()
            && self.shelves.is_some()
            && self.locations.is_some()
            && self.shortcuts.is_some()
    }
}

/// Shared holder; the fetch loop writes, dispatch reads.
pub struct RobotInfoHolder {
    info: Mutex<RobotInfo>,
}

impl RobotInfoHolder {
    pub fn new() -> Self {
        Self {
            info: Mutex::new(RobotInfo::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RobotInfo> {
        self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch every piece that is still missing. Returns `true` once the
    /// cache is complete. Pieces that fail stay missing and are retried
    /// on the next round.
    pub fn refresh(&self, api: &impl RobotApiPort) -> bool {
        if self.lock().version.is_none() {
            let (code, raw) = api.get_robot_version();
            if code == ResultCode::Ok {
                let version = RobotVersion::parse(&raw);
                info!("robot version: {version}");
                self.lock().version = Some(version);
            } else {
                debug!("version fetch: {}", code.as_str());
            }
        }
        if self.lock().shelves.is_none() {
            let (code, shelves) = api.get_shelves();
            if code == ResultCode::Ok {
                info!("fetched {} shelves", shelves.len());
                self.lock().shelves = Some(shelves);
            }
        }
        if self.lock().locations.is_none() {
            let (code, locations) = api.get_locations();
            if code == ResultCode::Ok {
                info!("fetched {} locations", locations.len());
                self.lock().locations = Some(locations);
            }
        }
        if self.lock().shortcuts.is_none() {
            let (code, shortcuts) = api.get_shortcuts();
            if code == ResultCode::Ok {
                info!("fetched {} shortcuts", shortcuts.len());
                self.lock().shortcuts = Some(shortcuts);
            }
        }
        self.lock().is_complete()
    }

    /// Drop everything; used when the paired robot changes.
    pub fn invalidate(&self) {
        *self.lock() = RobotInfo::default();
    }

    pub fn version(&self) -> Option<RobotVersion> {
        self.lock().version.clone()
    }

    pub fn shelf_name(&self, shelf_id: &str) -> Option<String> {
        self.lock().shelves.as_ref().and_then(|shelves| {
            shelves
                .iter()
                .find(|s| s.id == shelf_id)
                .map(|s| s.name.clone())
        })
    }

    pub fn location_name(&self, location_id: &str) -> Option<String> {
        self.lock().locations.as_ref().and_then(|locations| {
            locations
                .iter()
                .find(|l| l.id == location_id)
                .map(|l| l.name.clone())
        })
    }

    pub fn shortcut_name(&self, shortcut_id: &str) -> Option<String> {
        self.lock().shortcuts.as_ref().and_then(|shortcuts| {
            shortcuts
                .iter()
                .find(|s| s.id == shortcut_id)
                .map(|s| s.name.clone())
        })
    }

    pub fn snapshot(&self) -> RobotInfo {
        self.lock().clone()
    }
}

impl Default for RobotInfoHolder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{StartCommandRequest, StartCommandResponse};
    use std::cell::RefCell;

    /// Scripted peer: each fetch answers from a queue of result codes.
    struct ScriptedApi {
        version_codes: RefCell<Vec<ResultCode>>,
        other_code: ResultCode,
    }

    impl ScriptedApi {
        fn ok() -> Self {
            Self {
                version_codes: RefCell::new(vec![ResultCode::Ok]),
                other_code: ResultCode::Ok,
            }
        }
    }

    impl RobotApiPort for ScriptedApi {
        fn get_robot_version(&self) -> (ResultCode, String) {
            let code = self
                .version_codes
                .borrow_mut()
                .pop()
                .unwrap_or(ResultCode::Ok);
            (code, "3.1.0".into())
        }
        fn get_shelves(&self) -> (ResultCode, Vec<Shelf>) {
            (self.other_code, vec![Shelf {
                id: "S01".into(),
                name: "Tray".into(),
            }])
        }
        fn get_locations(&self) -> (ResultCode, Vec<Location>) {
            (self.other_code, Vec::new())
        }
        fn get_shortcuts(&self) -> (ResultCode, Vec<Shortcut>) {
            (self.other_code, Vec::new())
        }
        fn start_command(
            &self,
            _request: &StartCommandRequest,
        ) -> (ResultCode, StartCommandResponse) {
            (ResultCode::Ok, StartCommandResponse::default())
        }
        fn proceed(&self) -> ResultCode {
            ResultCode::Ok
        }
        fn cancel_command(&self) -> ResultCode {
            ResultCode::Ok
        }
    }

    #[test]
    fn refresh_fills_everything_on_success() {
        let holder = RobotInfoHolder::new();
        assert!(holder.refresh(&ScriptedApi::ok()));
        assert!(holder.snapshot().is_complete());
        assert_eq!(holder.shelf_name("S01").as_deref(), Some("Tray"));
        assert_eq!(holder.shelf_name("S99"), None);
    }

    #[test]
    fn failed_piece_is_retried_while_fetched_pieces_are_kept() {
        let holder = RobotInfoHolder::new();
        let api = ScriptedApi {
            version_codes: RefCell::new(vec![ResultCode::Ok, ResultCode::Timeout]),
            other_code: ResultCode::Ok,
        };
        // First round: version times out, the rest lands.
        assert!(!holder.refresh(&api));
        let partial = holder.snapshot();
        assert!(partial.version.is_none());
        assert!(partial.shelves.is_some());
        // Second round only re-fetches the missing piece.
        assert!(holder.refresh(&api));
        assert_eq!(
            holder.version(),
            Some(RobotVersion::Release {
                major: 3,
                minor: 1,
                patch: 0
            })
        );
    }

    #[test]
    fn empty_list_counts_as_fetched() {
        let holder = RobotInfoHolder::new();
        holder.refresh(&ScriptedApi::ok());
        assert_eq!(holder.snapshot().locations, Some(Vec::new()));
    }

    #[test]
    fn invalidate_forces_a_full_refetch() {
        let holder = RobotInfoHolder::new();
        holder.refresh(&ScriptedApi::ok());
        holder.invalidate();
        assert!(!holder.snapshot().is_complete());
    }
}
