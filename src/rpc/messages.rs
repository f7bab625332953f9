//! Typed request/response messages for the robot API.
//!
//! Field numbers are the robot service's fixed wire contract:
//!
//! ```text
//! GetRequest            { Metadata metadata = 1 }        Metadata { uint64 cursor = 1 }
//! GetRobotVersionResponse { metadata = 1; string version = 2 }
//! Shelf / Location / Shortcut { string id = 1; string name = 2 }  (Location: int32 type = 3)
//! Get*Response          { metadata = 1; repeated item = 2 }
//! StartCommandRequest   { RobotCommand command = 1; bool cancel_all = 2;
//!                         string tts_on_success = 3; string title = 4;
//!                         bool deferrable = 5; double lock_duration_sec = 6 }
//! RobotCommand oneof    { move_shelf = 1; return_shelf = 2; undock_shelf = 5;
//!                         move_to_location = 7; return_home = 8; speak = 12;
//!                         shortcut = 13; lock = 15 }
//! CommandResult         { bool success = 1; int32 error_code = 2 }
//! StartCommandResponse  { metadata = 1; CommandResult result = 2; string command_id = 3 }
//! EmptyRequest          { }
//! ```

use log::warn;

use super::proto::{ProtoWriter, decode_message};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Snapshot fetch; `cursor = 0` asks for the latest state.
#[derive(Debug, Default)]
pub struct GetRequest {
    pub cursor: u64,
}

impl GetRequest {
    pub fn encode(&self, w: &mut ProtoWriter) {
        if self.cursor != 0 {
            w.message(1, |m| m.uint(1, self.cursor));
        }
    }
}

#[derive(Debug, Default)]
pub struct EmptyRequest;

impl EmptyRequest {
    pub fn encode(&self, _w: &mut ProtoWriter) {}
}

/// The oneof payload of a `StartCommand` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    MoveShelf { shelf_id: String, location_id: String },
    ReturnShelf { shelf_id: String },
    UndockShelf,
    MoveToLocation { location_id: String },
    ReturnHome,
    Speak { text: String },
    Shortcut { shortcut_id: String },
    Lock { duration_sec: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartCommandRequest {
    pub command: RobotCommand,
    pub cancel_all: bool,
    pub tts_on_success: String,
    pub title: String,
    pub deferrable: bool,
    /// Native lock-on-completion; 0.0 leaves it off the wire.
    pub lock_duration_sec: f64,
}

impl StartCommandRequest {
    pub fn encode(&self, w: &mut ProtoWriter) {
        // The variant submessage is written even when empty; presence of
        // the oneof field is what selects the command.
        w.message(1, |cmd| match &self.command {
            RobotCommand::MoveShelf { shelf_id, location_id } => cmd.message(1, |m| {
                m.string(1, shelf_id);
                m.string(2, location_id);
            }),
            RobotCommand::ReturnShelf { shelf_id } => {
                cmd.message(2, |m| m.string(1, shelf_id));
            }
            RobotCommand::UndockShelf => cmd.message(5, |_| {}),
            RobotCommand::MoveToLocation { location_id } => {
                cmd.message(7, |m| m.string(1, location_id));
            }
            RobotCommand::ReturnHome => cmd.message(8, |_| {}),
            RobotCommand::Speak { text } => cmd.message(12, |m| m.string(1, text)),
            RobotCommand::Shortcut { shortcut_id } => {
                cmd.message(13, |m| m.string(1, shortcut_id));
            }
            RobotCommand::Lock { duration_sec } => {
                cmd.message(15, |m| m.double(1, *duration_sec));
            }
        });
        w.bool(2, self.cancel_all);
        w.string(3, &self.tts_on_success);
        w.string(4, &self.title);
        w.bool(5, self.deferrable);
        w.double(6, self.lock_duration_sec);
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Shelf {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub kind: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shortcut {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandResult {
    pub success: bool,
    pub error_code: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartCommandResponse {
    pub result: CommandResult,
    pub command_id: String,
}

/// Decode failures are logged and yield `None`; the caller substitutes a
/// zero value because framing completion, not payload validity, decides
/// the call result.
pub fn decode_version(payload: &[u8]) -> Option<String> {
    let mut version = String::new();
    if !decode_message(payload, |field, value| {
        if field == 2 {
            version = value.as_str().to_owned();
        }
    }) {
        warn!("rpc: GetRobotVersionResponse decode failed");
        return None;
    }
    Some(version)
}

pub fn decode_shelves(payload: &[u8]) -> Option<Vec<Shelf>> {
    let mut shelves = Vec::new();
    let mut ok = true;
    if !decode_message(payload, |field, value| {
        if field == 2 {
            let mut shelf = Shelf { id: String::new(), name: String::new() };
            ok &= decode_message(value.as_bytes(), |f, v| match f {
                1 => shelf.id = v.as_str().to_owned(),
                2 => shelf.name = v.as_str().to_owned(),
                _ => {}
            });
            shelves.push(shelf);
        }
    }) || !ok
    {
        warn!("rpc: GetShelvesResponse decode failed");
        return None;
    }
    Some(shelves)
}

pub fn decode_locations(payload: &[u8]) -> Option<Vec<Location>> {
    let mut locations = Vec::new();
    let mut ok = true;
    if !decode_message(payload, |field, value| {
        if field == 2 {
            let mut location = Location { id: String::new(), name: String::new(), kind: 0 };
            ok &= decode_message(value.as_bytes(), |f, v| match f {
                1 => location.id = v.as_str().to_owned(),
                2 => location.name = v.as_str().to_owned(),
                3 => location.kind = v.as_u64() as i32,
                _ => {}
            });
            locations.push(location);
        }
    }) || !ok
    {
        warn!("rpc: GetLocationsResponse decode failed");
        return None;
    }
    Some(locations)
}

pub fn decode_shortcuts(payload: &[u8]) -> Option<Vec<Shortcut>> {
    let mut shortcuts = Vec::new();
    let mut ok = true;
    if !decode_message(payload, |field, value| {
        if field == 2 {
            let mut shortcut = Shortcut { id: String::new(), name: String::new() };
            ok &= decode_message(value.as_bytes(), |f, v| match f {
                1 => shortcut.id = v.as_str().to_owned(),
                2 => shortcut.name = v.as_str().to_owned(),
                _ => {}
            });
            shortcuts.push(shortcut);
        }
    }) || !ok
    {
        warn!("rpc: GetShortcutsResponse decode failed");
        return None;
    }
    Some(shortcuts)
}

pub fn decode_start_command(payload: &[u8]) -> Option<StartCommandResponse> {
    let mut response = StartCommandResponse::default();
    let mut ok = true;
    if !decode_message(payload, |field, value| match field {
        2 => {
            ok &= decode_message(value.as_bytes(), |f, v| match f {
                1 => response.result.success = v.as_bool(),
                2 => response.result.error_code = v.as_u64() as i32,
                _ => {}
            });
        }
        3 => response.command_id = value.as_str().to_owned(),
        _ => {}
    }) || !ok
    {
        warn!("rpc: StartCommandResponse decode failed");
        return None;
    }
    Some(response)
}
