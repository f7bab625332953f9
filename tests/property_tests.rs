//! Property tests for the codecs and the recency log.

#![cfg(not(target_os = "espidf"))]

use proptest::prelude::*;

use buttonhub::adapters::storage::MemStore;
use buttonhub::model::button::{
    format_address, format_uuid, parse_address, parse_uuid,
};
use buttonhub::model::{AppleIBeacon, Command, CommandAction, KButton};
use buttonhub::table::CommandTable;

proptest! {
    #[test]
    fn address_codec_round_trips(address in any::<[u8; 6]>()) {
        let text = format_address(&address);
        prop_assert_eq!(text.len(), 17);
        prop_assert!(text.bytes().all(|b| !b.is_ascii_uppercase()));
        prop_assert_eq!(parse_address(&text), Some(address));
    }

    #[test]
    fn uuid_codec_round_trips(uuid in any::<[u8; 16]>()) {
        let text = format_uuid(&uuid);
        prop_assert_eq!(text.len(), 36);
        for i in [8usize, 13, 18, 23] {
            prop_assert_eq!(text.as_bytes()[i], b'-');
        }
        prop_assert_eq!(parse_uuid(&text), Some(uuid));
    }

    #[test]
    fn address_parser_rejects_wrong_shapes(s in "\\PC{0,24}") {
        // anything that is not exactly the canonical 17-char shape
        if s.len() != 17 || !s.as_bytes().iter().enumerate().all(|(i, b)| {
            if i % 3 == 2 { *b == b':' } else { b.is_ascii_hexdigit() }
        }) {
            prop_assert_eq!(parse_address(&s), None);
        }
    }

    #[test]
    fn uuid_parser_rejects_wrong_shapes(s in "\\PC{0,40}") {
        if s.len() != 36 || !s.as_bytes().iter().enumerate().all(|(i, b)| {
            if matches!(i, 8 | 13 | 18 | 23) { *b == b'-' } else { b.is_ascii_hexdigit() }
        }) {
            prop_assert_eq!(parse_uuid(&s), None);
        }
    }

    #[test]
    fn recency_log_never_duplicates_or_overflows(
        cap in 1usize..6,
        ids in proptest::collection::vec(0u8..10, 0..40),
    ) {
        let table = CommandTable::new(MemStore::new(), cap);
        for id in &ids {
            table.notify_observed_button(KButton::M5Button { id: *id }, f64::from(*id));
        }
        let observed = table.observed_buttons();
        prop_assert!(observed.len() <= cap);
        let mut seen = std::collections::BTreeSet::new();
        for entry in &observed {
            prop_assert!(seen.insert(entry.button), "duplicate in log");
        }
        if let Some(last) = ids.last() {
            prop_assert_eq!(observed[0].button, KButton::M5Button { id: *last });
        }
    }

    #[test]
    fn bindings_stay_unique_under_arbitrary_ops(
        ops in proptest::collection::vec((0u8..6, any::<bool>()), 0..60),
    ) {
        let table = CommandTable::new(MemStore::new(), 4);
        for (id, set) in ops {
            let button = KButton::GpioButton { id };
            if set {
                table.set_command(button, Command {
                    action: CommandAction::ReturnHome,
                    ..Command::default()
                });
            } else {
                table.delete_command(button);
            }
        }
        let commands = table.commands();
        let mut seen = std::collections::BTreeSet::new();
        for (button, _) in &commands {
            prop_assert!(seen.insert(*button), "duplicate binding");
        }
    }

    #[test]
    fn command_json_round_trips_through_the_document(
        shelf in "[A-Za-z0-9]{1,8}",
        location in "[A-Za-z0-9]{1,8}",
        cancel_all in any::<bool>(),
        deferrable in any::<bool>(),
        lock_sec in prop_oneof![Just(0.0f64), 1.0f64..120.0],
    ) {
        let beacon = KButton::AppleIBeacon(AppleIBeacon {
            address: [1, 2, 3, 4, 5, 6],
            uuid: [9; 16],
            major: 1,
            minor: 2,
        });
        let command = Command {
            action: CommandAction::MoveShelf {
                shelf_id: shelf,
                location_id: location,
            },
            cancel_all,
            tts_on_success: String::new(),
            deferrable,
            lock_duration_sec: lock_sec,
        };
        let table = CommandTable::new(MemStore::new(), 4);
        table.set_command(beacon, command.clone());

        let doc = serde_json::json!({
            "commands": [buttonhub::table::json::binding_to_json(&beacon, &command)]
        })
        .to_string();

        let restored = CommandTable::new(MemStore::new(), 4);
        prop_assert!(restored.import_commands(&doc));
        prop_assert_eq!(restored.commands(), table.commands());
    }
}
