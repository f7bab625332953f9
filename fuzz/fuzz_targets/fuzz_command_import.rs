//! Fuzz target: command-document JSON import.
//!
//! The import path takes attacker-controlled JSON from the config
//! server; it must never panic, and whatever it accepts must survive a
//! re-export and re-import unchanged.
//!
//! cargo fuzz run fuzz_command_import

#![no_main]

use buttonhub::adapters::storage::MemStore;
use buttonhub::table::{CommandTable, json};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    let table = CommandTable::new(MemStore::new(), 4);
    let _ = table.import_commands(text);
    let _ = table.import_button_names(text);
    let _ = table.import_command(text);

    // accepted bindings re-import losslessly
    let commands = table.commands();
    if !commands.is_empty() {
        let doc = json::commands_doc(&commands, 0);
        let again = CommandTable::new(MemStore::new(), 4);
        assert!(again.import_commands(&doc));
        assert_eq!(again.commands(), commands);
    }
});
