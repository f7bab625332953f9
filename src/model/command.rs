//! Command bound to a button.
//!
//! A [`Command`] pairs an action with cross-cutting flags: cancel running
//! commands first, speak on success, defer behind a running command, and
//! hold the shelf lock after the move finishes.

/// Stable numeric type tags. These are the persisted on-disk contract and
/// the config-server wire contract; never renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandType {
    MoveShelf = 1,
    ReturnShelf = 2,
    UndockShelf = 5,
    MoveToLocation = 7,
    ReturnHome = 8,
    Speak = 12,
    Proceed = 1000,
    CancelCommand = 1001,
    Shortcut = 1002,
    HttpGet = 2000,
    HttpPost = 2001,
}

impl CommandType {
    pub fn from_i32(v: i32) -> Option<Self> {
        Some(match v {
            1 => Self::MoveShelf,
            2 => Self::ReturnShelf,
            5 => Self::UndockShelf,
            7 => Self::MoveToLocation,
            8 => Self::ReturnHome,
            12 => Self::Speak,
            1000 => Self::Proceed,
            1001 => Self::CancelCommand,
            1002 => Self::Shortcut,
            2000 => Self::HttpGet,
            2001 => Self::HttpPost,
            _ => return None,
        })
    }
}

/// What pressing the button asks the robot (or the network) to do.
///
/// The sentinel target id `""` on [`MoveShelf`](Self::MoveShelf) means
/// "the shelf the robot is currently carrying".
#[derive(Debug, Clone, PartialEq)]
pub enum CommandAction {
    MoveShelf { shelf_id: String, location_id: String },
    ReturnShelf { shelf_id: String },
    UndockShelf,
    MoveToLocation { location_id: String },
    ReturnHome,
    Speak { text: String },
    Proceed,
    CancelCommand,
    Shortcut { shortcut_id: String },
    HttpGet { url: String },
    HttpPost { url: String, body: String },
}

impl CommandAction {
    pub fn type_id(&self) -> CommandType {
        match self {
            Self::MoveShelf { .. } => CommandType::MoveShelf,
            Self::ReturnShelf { .. } => CommandType::ReturnShelf,
            Self::UndockShelf => CommandType::UndockShelf,
            Self::MoveToLocation { .. } => CommandType::MoveToLocation,
            Self::ReturnHome => CommandType::ReturnHome,
            Self::Speak { .. } => CommandType::Speak,
            Self::Proceed => CommandType::Proceed,
            Self::CancelCommand => CommandType::CancelCommand,
            Self::Shortcut { .. } => CommandType::Shortcut,
            Self::HttpGet { .. } => CommandType::HttpGet,
            Self::HttpPost { .. } => CommandType::HttpPost,
        }
    }
}

/// Full button binding payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: CommandAction,
    /// Cancel any running command before issuing this one.
    pub cancel_all: bool,
    /// Spoken on successful completion; empty string means silent.
    pub tts_on_success: String,
    /// Queue behind a running command instead of failing.
    pub deferrable: bool,
    /// Keep the shelf locked for this many seconds after a move completes.
    /// Values within 1e-3 of zero are treated as "no lock".
    pub lock_duration_sec: f64,
}

impl Command {
    /// Lock durations are compared against a small epsilon because the
    /// value round-trips through JSON floating point.
    pub fn wants_lock(&self) -> bool {
        self.lock_duration_sec.abs() >= 1e-3
    }
}

impl Default for Command {
    fn default() -> Self {
        Self {
            action: CommandAction::Proceed,
            cancel_all: false,
            tts_on_success: String::new(),
            deferrable: false,
            lock_duration_sec: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ids_are_stable() {
        assert_eq!(
            CommandAction::MoveShelf {
                shelf_id: "S01".into(),
                location_id: "L01".into()
            }
            .type_id() as i32,
            1
        );
        assert_eq!(CommandAction::ReturnHome.type_id() as i32, 8);
        assert_eq!(
            CommandAction::Shortcut { shortcut_id: "x".into() }.type_id() as i32,
            1002
        );
        assert_eq!(
            CommandAction::HttpPost { url: "u".into(), body: "b".into() }.type_id() as i32,
            2001
        );
    }

    #[test]
    fn type_id_round_trip() {
        for v in [1, 2, 5, 7, 8, 12, 1000, 1001, 1002, 2000, 2001] {
            assert_eq!(CommandType::from_i32(v).map(|t| t as i32), Some(v));
        }
        assert_eq!(CommandType::from_i32(0), None);
        assert_eq!(CommandType::from_i32(3), None);
        assert_eq!(CommandType::from_i32(999), None);
    }

    #[test]
    fn lock_epsilon() {
        let mut cmd = Command::default();
        assert!(!cmd.wants_lock());
        cmd.lock_duration_sec = 0.0005;
        assert!(!cmd.wants_lock());
        cmd.lock_duration_sec = 10.0;
        assert!(cmd.wants_lock());
        cmd.lock_duration_sec = -5.0;
        assert!(cmd.wants_lock());
    }
}
