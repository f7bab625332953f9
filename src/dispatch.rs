//! Turns a stored button command into robot RPC calls.
//!
//! Besides the straight mapping there are two wrinkles: human-readable
//! titles are resolved against the cached robot state so the robot's UI
//! shows "Move Tray to Kitchen" instead of raw ids, and the shelf-lock
//! option is version gated. Robots at 3.1.0 and later accept the hold
//! duration inline with the command; older releases need a separate
//! follow-up Lock command after the primary one is accepted.

use std::time::Duration;

use log::{info, warn};

use crate::adapters::http::HttpPort;
use crate::model::{Command, CommandAction};
use crate::robot_info::RobotInfoHolder;
use crate::rpc::{ResultCode, RobotApiPort, RobotCommand, StartCommandRequest};
use crate::version::RobotVersion;

/// Shelf id used by the robot for "whatever shelf I am carrying".
const CARRIED_SHELF_ID: &str = "__THIS__";

/// Gap between the primary command and the compatibility Lock command.
pub const DEFAULT_SHIM_DELAY: Duration = Duration::from_millis(100);

pub struct Dispatcher<'a, A, H> {
    api: &'a A,
    http: &'a mut H,
    info: &'a RobotInfoHolder,
    shim_delay: Duration,
}

impl<'a, A: RobotApiPort, H: HttpPort> Dispatcher<'a, A, H> {
    pub fn new(api: &'a A, http: &'a mut H, info: &'a RobotInfoHolder) -> Self {
        Self {
            api,
            http,
            info,
            shim_delay: DEFAULT_SHIM_DELAY,
        }
    }

    pub fn with_shim_delay(mut self, delay: Duration) -> Self {
        self.shim_delay = delay;
        self
    }

    /// Execute one command end to end. Returns `true` when every call it
    /// required came back OK.
    pub fn dispatch(&mut self, command: &Command) -> bool {
        match &command.action {
            CommandAction::Proceed => self.api.proceed() == ResultCode::Ok,
            CommandAction::CancelCommand => self.api.cancel_command() == ResultCode::Ok,
            CommandAction::HttpGet { url } => match self.http.get(url) {
                Ok(()) => true,
                Err(e) => {
                    warn!("http get failed: {e}");
                    false
                }
            },
            CommandAction::HttpPost { url, body } => match self.http.post(url, body) {
                Ok(()) => true,
                Err(e) => {
                    warn!("http post failed: {e}");
                    false
                }
            },
            action => self.start_robot_command(command, action),
        }
    }

    fn start_robot_command(&self, command: &Command, action: &CommandAction) -> bool {
        let Some(robot_command) = to_robot_command(action) else {
            return false;
        };
        let title = self.generate_title(action);
        let use_shim = command.wants_lock() && needs_lock_shim(self.info.version().as_ref());

        let request = StartCommandRequest {
            command: robot_command,
            cancel_all: command.cancel_all,
            tts_on_success: command.tts_on_success.clone(),
            title,
            deferrable: command.deferrable,
            lock_duration_sec: if use_shim || !command.wants_lock() {
                0.0
            } else {
                command.lock_duration_sec
            },
        };
        let (code, response) = self.api.start_command(&request);
        if code != ResultCode::Ok {
            warn!("command rejected: {}", code.as_str());
            return false;
        }
        info!("command accepted: id={}", response.command_id);

        if use_shim {
            // Give the robot a moment to queue the primary command first.
            std::thread::sleep(self.shim_delay);
            return self.send_lock_command(command.lock_duration_sec);
        }
        true
    }

    fn send_lock_command(&self, duration_sec: f64) -> bool {
        let request = StartCommandRequest {
            command: RobotCommand::Lock { duration_sec },
            cancel_all: false,
            tts_on_success: String::new(),
            title: format!("Hold for {} seconds", duration_sec.round() as i64),
            deferrable: false,
            lock_duration_sec: 0.0,
        };
        let (code, _) = self.api.start_command(&request);
        if code != ResultCode::Ok {
            warn!("lock command rejected: {}", code.as_str());
        }
        code == ResultCode::Ok
    }

    // ── Title resolution ───────────────────────────────────────────────

    fn resolve_shelf_name(&self, shelf_id: &str) -> String {
        if shelf_id.is_empty() || shelf_id == CARRIED_SHELF_ID {
            return "the carried shelf".into();
        }
        self.info
            .shelf_name(shelf_id)
            .unwrap_or_else(|| shelf_id.to_string())
    }

    fn resolve_location_name(&self, location_id: &str) -> String {
        self.info
            .location_name(location_id)
            .unwrap_or_else(|| location_id.to_string())
    }

    fn generate_title(&self, action: &CommandAction) -> String {
        match action {
            CommandAction::MoveShelf {
                shelf_id,
                location_id,
            } => format!(
                "Move {} to {}",
                self.resolve_shelf_name(shelf_id),
                self.resolve_location_name(location_id)
            ),
            CommandAction::ReturnShelf { shelf_id } => {
                format!("Return {}", self.resolve_shelf_name(shelf_id))
            }
            CommandAction::UndockShelf => "Undock the carried shelf".into(),
            CommandAction::MoveToLocation { location_id } => {
                format!("Go to {}", self.resolve_location_name(location_id))
            }
            CommandAction::ReturnHome => "Return home".into(),
            CommandAction::Speak { text } => format!("Say \"{text}\""),
            CommandAction::Shortcut { shortcut_id } => self
                .info
                .shortcut_name(shortcut_id)
                .unwrap_or_else(|| "Run shortcut".into()),
            _ => String::new(),
        }
    }
}

/// Old releases take the hold duration as a separate follow-up command.
/// An unknown version is assumed current; development builds always are.
pub fn needs_lock_shim(version: Option<&RobotVersion>) -> bool {
    match version {
        Some(v) => v.is_release() && *v < RobotVersion::NATIVE_LOCK,
        None => false,
    }
}

fn to_robot_command(action: &CommandAction) -> Option<RobotCommand> {
    Some(match action {
        CommandAction::MoveShelf {
            shelf_id,
            location_id,
        } => RobotCommand::MoveShelf {
            shelf_id: shelf_id.clone(),
            location_id: location_id.clone(),
        },
        CommandAction::ReturnShelf { shelf_id } => RobotCommand::ReturnShelf {
            shelf_id: shelf_id.clone(),
        },
        CommandAction::UndockShelf => RobotCommand::UndockShelf,
        CommandAction::MoveToLocation { location_id } => RobotCommand::MoveToLocation {
            location_id: location_id.clone(),
        },
        CommandAction::ReturnHome => RobotCommand::ReturnHome,
        CommandAction::Speak { text } => RobotCommand::Speak { text: text.clone() },
        CommandAction::Shortcut { shortcut_id } => RobotCommand::Shortcut {
            shortcut_id: shortcut_id.clone(),
        },
        _ => return None,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────
