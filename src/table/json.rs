//! JSON codec for the command table boundary.
//!
//! The same schema feeds the persisted blobs and the config-server API:
//!
//! ```json
//! {
//!   "button": {"apple_i_beacon": {"address": "...", "uuid": "...", "major": 1, "minor": 2}},
//!   "command": {"type": 1, "move_shelf": {"shelf_id": "S", "location_id": "L"},
//!               "cancel_all": true, "tts_on_success": "done", "deferrable": false,
//!               "lock_duration_sec": 10.0}
//! }
//! ```
//!
//! `tts_on_success` is omitted when empty and `lock_duration_sec` when it is
//! within epsilon of zero, so re-exports stay byte-stable across round trips.

use serde_json::{Map, Value, json};

use crate::model::button::{format_address, format_uuid, parse_address, parse_uuid};
use crate::model::{AppleIBeacon, Command, CommandAction, CommandType, KButton};

use super::ObservedButton;

// ---------------------------------------------------------------------------
// Buttons
// ---------------------------------------------------------------------------

pub fn button_to_json(button: &KButton) -> Value {
    match button {
        KButton::AppleIBeacon(b) => json!({
            "apple_i_beacon": {
                "address": format_address(&b.address),
                "uuid": format_uuid(&b.uuid),
                "major": b.major,
                "minor": b.minor,
            }
        }),
        KButton::M5Button { id } => json!({ "m5_button": { "id": id } }),
        KButton::GpioButton { id } => json!({ "gpio_button": { "id": id } }),
    }
}

pub fn button_from_json(value: &Value) -> Option<KButton> {
    if let Some(beacon) = value.get("apple_i_beacon") {
        let address = parse_address(beacon.get("address")?.as_str()?)?;
        let uuid = parse_uuid(beacon.get("uuid")?.as_str()?)?;
        let major = u16::try_from(beacon.get("major")?.as_u64()?).ok()?;
        let minor = u16::try_from(beacon.get("minor")?.as_u64()?).ok()?;
        return Some(KButton::AppleIBeacon(AppleIBeacon { address, uuid, major, minor }));
    }
    if let Some(m5) = value.get("m5_button") {
        let id = u8::try_from(m5.get("id")?.as_u64()?).ok()?;
        return Some(KButton::M5Button { id });
    }
    if let Some(gpio) = value.get("gpio_button") {
        let id = u8::try_from(gpio.get("id")?.as_u64()?).ok()?;
        return Some(KButton::GpioButton { id });
    }
    None
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn command_to_json(command: &Command) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), json!(command.action.type_id() as i32));
    out.insert("cancel_all".into(), json!(command.cancel_all));
    if !command.tts_on_success.is_empty() {
        out.insert("tts_on_success".into(), json!(command.tts_on_success));
    }
    out.insert("deferrable".into(), json!(command.deferrable));
    if command.wants_lock() {
        out.insert("lock_duration_sec".into(), json!(command.lock_duration_sec));
    }
    match &command.action {
        CommandAction::MoveShelf { shelf_id, location_id } => {
            out.insert(
                "move_shelf".into(),
                json!({ "shelf_id": shelf_id, "location_id": location_id }),
            );
        }
        CommandAction::ReturnShelf { shelf_id } => {
            out.insert("return_shelf".into(), json!({ "shelf_id": shelf_id }));
        }
        CommandAction::MoveToLocation { location_id } => {
            out.insert("move_to_location".into(), json!({ "location_id": location_id }));
        }
        CommandAction::Speak { text } => {
            out.insert("speak".into(), json!({ "text": text }));
        }
        CommandAction::Shortcut { shortcut_id } => {
            out.insert("shortcut".into(), json!({ "shortcut_id": shortcut_id }));
        }
        CommandAction::HttpGet { url } => {
            out.insert("http_get".into(), json!({ "url": url }));
        }
        CommandAction::HttpPost { url, body } => {
            out.insert("http_post".into(), json!({ "url": url, "body": body }));
        }
        CommandAction::UndockShelf
        | CommandAction::ReturnHome
        | CommandAction::Proceed
        | CommandAction::CancelCommand => {}
    }
    Value::Object(out)
}

pub fn command_from_json(value: &Value) -> Option<Command> {
    let type_id = CommandType::from_i32(i32::try_from(value.get("type")?.as_i64()?).ok()?)?;

    let action = match type_id {
        CommandType::MoveShelf => {
            let v = value.get("move_shelf")?;
            CommandAction::MoveShelf {
                shelf_id: v.get("shelf_id")?.as_str()?.to_owned(),
                location_id: v.get("location_id")?.as_str()?.to_owned(),
            }
        }
        CommandType::ReturnShelf => {
            let v = value.get("return_shelf")?;
            CommandAction::ReturnShelf { shelf_id: v.get("shelf_id")?.as_str()?.to_owned() }
        }
        CommandType::UndockShelf => CommandAction::UndockShelf,
        CommandType::MoveToLocation => {
            let v = value.get("move_to_location")?;
            CommandAction::MoveToLocation {
                location_id: v.get("location_id")?.as_str()?.to_owned(),
            }
        }
        CommandType::ReturnHome => CommandAction::ReturnHome,
        CommandType::Speak => {
            let v = value.get("speak")?;
            CommandAction::Speak { text: v.get("text")?.as_str()?.to_owned() }
        }
        // Administrative actions carry no flags of their own.
        CommandType::Proceed => return Some(Command {
            action: CommandAction::Proceed,
            ..Command::default()
        }),
        CommandType::CancelCommand => return Some(Command {
            action: CommandAction::CancelCommand,
            ..Command::default()
        }),
        CommandType::Shortcut => {
            let v = value.get("shortcut")?;
            CommandAction::Shortcut { shortcut_id: v.get("shortcut_id")?.as_str()?.to_owned() }
        }
        CommandType::HttpGet => {
            let v = value.get("http_get")?;
            CommandAction::HttpGet { url: v.get("url")?.as_str()?.to_owned() }
        }
        CommandType::HttpPost => {
            let v = value.get("http_post")?;
            CommandAction::HttpPost {
                url: v.get("url")?.as_str()?.to_owned(),
                body: v.get("body")?.as_str()?.to_owned(),
            }
        }
    };

    Some(Command {
        action,
        cancel_all: value.get("cancel_all").and_then(Value::as_bool).unwrap_or(false),
        tts_on_success: value
            .get("tts_on_success")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_owned(),
        deferrable: value.get("deferrable").and_then(Value::as_bool).unwrap_or(false),
        lock_duration_sec: value
            .get("lock_duration_sec")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
    })
}

// ---------------------------------------------------------------------------
// Binding entries and documents
// ---------------------------------------------------------------------------

pub fn binding_to_json(button: &KButton, command: &Command) -> Value {
    json!({ "button": button_to_json(button), "command": command_to_json(command) })
}

pub fn binding_from_json(value: &Value) -> Option<(KButton, Command)> {
    let button = button_from_json(value.get("button")?)?;
    let command = command_from_json(value.get("command")?)?;
    Some((button, command))
}

/// `{"type": "commands", "commands": [...], "timestamp": now}`
pub fn commands_doc(commands: &[(KButton, Command)], now: u64) -> String {
    let entries: Vec<Value> =
        commands.iter().map(|(b, c)| binding_to_json(b, c)).collect();
    json!({ "type": "commands", "commands": entries, "timestamp": now }).to_string()
}

/// `{"type": "observed_buttons", "buttons": [...], "timestamp_now": now}`
///
/// Recently observed buttons come first, newest first, carrying a
/// `timestamp` field; named-but-unobserved buttons follow with only their
/// name. Entries with no name are still exported for observed buttons so
/// the config UI can offer them for registration.
pub fn buttons_doc(
    observed: &[ObservedButton],
    names: &std::collections::BTreeMap<KButton, String>,
    now: u64,
) -> String {
    let mut remaining = names.clone();
    let mut entries = Vec::new();

    for obs in observed {
        let mut item = Map::new();
        item.insert("timestamp".into(), json!(obs.timestamp));
        if obs.estimated_distance >= 0.0 {
            item.insert("estimated_distance".into(), json!(obs.estimated_distance));
        }
        if let Some(name) = remaining.remove(&obs.button) {
            item.insert("name".into(), json!(name));
        }
        merge_button(&mut item, &obs.button);
        entries.push(Value::Object(item));
    }

    for (button, name) in remaining {
        let mut item = Map::new();
        item.insert("name".into(), json!(name));
        merge_button(&mut item, &button);
        entries.push(Value::Object(item));
    }

    json!({ "type": "observed_buttons", "buttons": entries, "timestamp_now": now }).to_string()
}

fn merge_button(item: &mut Map<String, Value>, button: &KButton) {
    if let Value::Object(fields) = button_to_json(button) {
        item.extend(fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon() -> KButton {
        KButton::AppleIBeacon(AppleIBeacon {
            address: [0x00, 0x1b, 0xdc, 0xf2, 0x1c, 0x2d],
            uuid: [0xab; 16],
            major: 100,
            minor: 7,
        })
    }

    #[test]
    fn button_round_trip() {
        for button in [beacon(), KButton::M5Button { id: 2 }, KButton::GpioButton { id: 1 }] {
            let value = button_to_json(&button);
            assert_eq!(button_from_json(&value), Some(button));
        }
    }

    #[test]
    fn button_rejects_bad_address() {
        let value = json!({
            "apple_i_beacon": {
                "address": "not-an-address",
                "uuid": format_uuid(&[0; 16]),
                "major": 1,
                "minor": 2,
            }
        });
        assert_eq!(button_from_json(&value), None);
    }

    #[test]
    fn command_round_trip() {
        let cmd = Command {
            action: CommandAction::MoveShelf {
                shelf_id: "S01".into(),
                location_id: "L02".into(),
            },
            cancel_all: true,
            tts_on_success: "arrived".into(),
            deferrable: false,
            lock_duration_sec: 10.0,
        };
        let value = command_to_json(&cmd);
        assert_eq!(command_from_json(&value), Some(cmd));
    }

    #[test]
    fn empty_tts_and_zero_lock_are_omitted() {
        let cmd = Command { action: CommandAction::ReturnHome, ..Command::default() };
        let value = command_to_json(&cmd);
        assert!(value.get("tts_on_success").is_none());
        assert!(value.get("lock_duration_sec").is_none());
        assert_eq!(command_from_json(&value), Some(cmd));
    }

    #[test]
    fn admin_commands_ignore_flags_on_import() {
        let value = json!({ "type": 1000, "cancel_all": true, "lock_duration_sec": 9.0 });
        let cmd = command_from_json(&value).unwrap();
        assert_eq!(cmd.action, CommandAction::Proceed);
        assert!(!cmd.cancel_all);
        assert_eq!(cmd.lock_duration_sec, 0.0);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert_eq!(command_from_json(&json!({ "type": 42 })), None);
        assert_eq!(command_from_json(&json!({ "type": "speak" })), None);
    }

    #[test]
    fn missing_variant_payload_is_rejected() {
        // type says move_shelf but the payload object is absent
        assert_eq!(command_from_json(&json!({ "type": 1, "cancel_all": false })), None);
    }

    #[test]
    fn buttons_doc_merges_observed_and_named() {
        let mut names = std::collections::BTreeMap::new();
        names.insert(KButton::M5Button { id: 1 }, "Front desk".to_owned());
        names.insert(beacon(), "Kitchen".to_owned());

        let observed = vec![ObservedButton {
            timestamp: 1000,
            estimated_distance: 1.5,
            button: beacon(),
        }];
        let doc: Value = serde_json::from_str(&buttons_doc(&observed, &names, 1010)).unwrap();
        let buttons = doc["buttons"].as_array().unwrap();
        assert_eq!(buttons.len(), 2);
        // observed entry first, with timestamp and its name folded in
        assert_eq!(buttons[0]["timestamp"], 1000);
        assert_eq!(buttons[0]["name"], "Kitchen");
        assert!(buttons[0].get("apple_i_beacon").is_some());
        // named-only entry has no timestamp
        assert_eq!(buttons[1]["name"], "Front desk");
        assert!(buttons[1].get("timestamp").is_none());
        assert_eq!(doc["timestamp_now"], 1010);
    }

    #[test]
    fn negative_distance_is_omitted() {
        let observed = vec![ObservedButton {
            timestamp: 5,
            estimated_distance: -1.0,
            button: KButton::GpioButton { id: 3 },
        }];
        let doc: Value =
            serde_json::from_str(&buttons_doc(&observed, &Default::default(), 6)).unwrap();
        assert!(doc["buttons"][0].get("estimated_distance").is_none());
    }
}
