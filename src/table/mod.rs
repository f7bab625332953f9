//! Concurrent persistent store of button bindings.
//!
//! One mutex serializes every accessor. Methods never call other public
//! methods while holding the lock; shared logic lives in `*_locked`
//! functions on the inner state so a method can never self-deadlock.
//!
//! Persistence is explicit: collaborators call [`CommandTable::save`] after
//! every externally visible mutation. Mutations themselves never touch
//! flash, so the lock hold time stays bounded by in-memory work plus one
//! file write on save.

pub mod json;
pub mod persist;

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};

use crate::adapters::storage::FileStore;
use crate::error::StoreError;
use crate::model::{Command, KButton};

/// One entry of the recency log, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedButton {
    /// Unix seconds at observation time.
    pub timestamp: u64,
    /// Estimated distance in meters; negative when unknown.
    pub estimated_distance: f64,
    pub button: KButton,
}

const BUTTON_SEQ_FILE: &str = "button_seq.dat";

struct Inner<S> {
    store: S,
    max_observed: usize,
    observed: VecDeque<ObservedButton>,
    commands: Vec<(KButton, Command)>,
    names: BTreeMap<KButton, String>,
}

pub struct CommandTable<S: FileStore> {
    inner: Mutex<Inner<S>>,
}

impl<S: FileStore> CommandTable<S> {
    pub fn new(store: S, max_observed: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store,
                max_observed,
                observed: VecDeque::new(),
                commands: Vec::new(),
                names: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        // A poisoned lock means a panic elsewhere; the table state itself
        // is still consistent (mutations are single-step).
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Recency log ─────────────────────────────────────────────────

    /// Record an input observation. A repeat observation of the same
    /// button moves it to the front instead of duplicating it; the oldest
    /// entry is evicted past capacity.
    pub fn notify_observed_button(&self, button: KButton, estimated_distance: f64) {
        let mut inner = self.lock();
        inner.observed.retain(|o| o.button != button);
        inner.observed.push_front(ObservedButton {
            timestamp: now_secs(),
            estimated_distance,
            button,
        });
        if inner.observed.len() > inner.max_observed {
            inner.observed.pop_back();
        }
    }

    pub fn observed_buttons(&self) -> Vec<ObservedButton> {
        self.lock().observed.iter().cloned().collect()
    }

    /// Drop observations older than `ttl_secs`. Bindings and names are
    /// untouched; only the recency log ages out.
    pub fn prune_observed(&self, ttl_secs: u64) {
        let cutoff = now_secs().saturating_sub(ttl_secs);
        self.lock().observed.retain(|o| o.timestamp >= cutoff);
    }

    // ── Bindings ────────────────────────────────────────────────────

    pub fn set_command(&self, button: KButton, command: Command) {
        self.lock().set_command_locked(button, command);
    }

    /// Remove the binding. Beacon-class buttons also lose their name;
    /// fixed-position buttons keep it.
    pub fn delete_command(&self, button: KButton) {
        let mut inner = self.lock();
        inner.delete_command_locked(&button);
        if button.is_beacon() {
            inner.names.remove(&button);
        }
    }

    /// Snapshot of the ordered binding sequence.
    pub fn commands(&self) -> Vec<(KButton, Command)> {
        self.lock().commands.clone()
    }

    pub fn command_for(&self, button: &KButton) -> Option<Command> {
        let inner = self.lock();
        inner
            .commands
            .iter()
            .find(|(b, _)| b == button)
            .map(|(_, c)| c.clone())
    }

    // ── Names ───────────────────────────────────────────────────────

    pub fn set_button_name(&self, button: KButton, name: String) {
        self.lock().names.insert(button, name);
    }

    pub fn delete_button_name(&self, button: &KButton) {
        self.lock().names.remove(button);
    }

    pub fn button_names(&self) -> BTreeMap<KButton, String> {
        self.lock().names.clone()
    }

    // ── Bulk clears (config-server boundary) ────────────────────────

    pub fn delete_all_commands(&self) {
        self.lock().commands.clear();
    }

    pub fn delete_all_button_names(&self) {
        self.lock().names.clear();
    }

    // ── JSON import (config-server boundary) ────────────────────────

    /// Import a single `{"button": ..., "command": ...}` entry.
    pub fn import_command(&self, json: &str) -> bool {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(json) else {
            warn!("command table: import is not valid JSON");
            return false;
        };
        let Some((button, command)) = json::binding_from_json(&value) else {
            warn!("command table: import entry rejected");
            return false;
        };
        self.lock().set_command_locked(button, command);
        true
    }

    /// Replace all bindings from a `{"commands": [...]}` document.
    /// Best-effort: invalid entries are skipped, valid entries still land.
    /// Returns `false` if anything was skipped.
    pub fn import_commands(&self, json: &str) -> bool {
        self.lock().import_commands_locked(json)
    }

    /// Replace all names from a `{"buttons": [...]}` document. Entries
    /// without a name are skipped silently (observation records).
    pub fn import_button_names(&self, json: &str) -> bool {
        self.lock().import_names_locked(json)
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Persist the table with atomic-replace semantics. On failure the
    /// previous file stays authoritative.
    pub fn save(&self) {
        let mut inner = self.lock();
        // Reborrow so field borrows split (make_contiguous needs &mut
        // observed while names is read alongside).
        let inner = &mut *inner;
        let now = now_secs();
        let blobs = persist::TableBlobs {
            buttons_json: json::buttons_doc(
                inner.observed.make_contiguous(),
                &inner.names,
                now,
            ),
            commands_json: json::commands_doc(&inner.commands, now),
        };
        let data = persist::encode(&blobs);
        match persist::commit(&mut inner.store, &data) {
            Ok(()) => info!(
                "command table: saved {} buttons, {} commands",
                inner.names.len(),
                inner.commands.len()
            ),
            Err(e) => warn!("command table: save failed: {e}"),
        }
    }

    /// Load the table from flash. A missing file or version mismatch
    /// leaves the in-memory state untouched.
    pub fn load(&self) {
        let mut inner = self.lock();
        let data = match inner.store.read(persist::TABLE_FILE) {
            Ok(data) => data,
            Err(StoreError::NotFound) => {
                info!("command table: no saved table");
                return;
            }
            Err(e) => {
                warn!("command table: load failed: {e}");
                return;
            }
        };
        let blobs = match persist::decode(&data) {
            Ok(blobs) => blobs,
            Err(e) => {
                warn!("command table: stored table unusable: {e}");
                return;
            }
        };
        if !inner.import_names_locked(&blobs.buttons_json) {
            warn!("command table: failed to load button names");
        }
        if !inner.import_commands_locked(&blobs.commands_json) {
            warn!("command table: failed to load commands");
        }
        info!(
            "command table: loaded {} buttons, {} commands",
            inner.names.len(),
            inner.commands.len()
        );
    }

    /// Clear everything and delete the backing file.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.observed.clear();
        inner.commands.clear();
        inner.names.clear();
        if let Err(e) = inner.store.remove(persist::TABLE_FILE) {
            warn!("command table: reset could not remove file: {e}");
        }
    }
}

impl<S: FileStore> Inner<S> {
    /// Upsert. A replaced binding moves to the end of the sequence.
    fn set_command_locked(&mut self, button: KButton, command: Command) {
        if !self.names.contains_key(&button) {
            let name = format!("Button {}", self.take_next_button_id());
            self.names.insert(button, name);
        }
        self.delete_command_locked(&button);
        self.commands.push((button, command));
    }

    fn delete_command_locked(&mut self, button: &KButton) {
        self.commands.retain(|(b, _)| b != button);
    }

    fn import_commands_locked(&mut self, json: &str) -> bool {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(json) else {
            warn!("command table: commands document is not valid JSON");
            return false;
        };
        let Some(entries) = value.get("commands").and_then(|v| v.as_array()) else {
            warn!("command table: commands document has no command list");
            return false;
        };
        self.commands.clear();
        let mut ok = true;
        for entry in entries {
            match json::binding_from_json(entry) {
                Some((button, command)) => self.set_command_locked(button, command),
                None => {
                    warn!("command table: skipping invalid command entry");
                    ok = false;
                }
            }
        }
        ok
    }

    /// Entries lacking a `"name"` field or with an unparseable identity
    /// are skipped; they are observation records, not names.
    fn import_names_locked(&mut self, json: &str) -> bool {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(json) else {
            warn!("command table: buttons document is not valid JSON");
            return false;
        };
        let Some(entries) = value.get("buttons").and_then(|v| v.as_array()) else {
            warn!("command table: buttons document has no button list");
            return false;
        };
        self.names.clear();
        for entry in entries {
            let Some(name) = entry.get("name").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(button) = json::button_from_json(entry) else {
                continue;
            };
            self.names.insert(button, name.to_owned());
        }
        true
    }

    /// Monotonic counter behind generated names, persisted in its own
    /// file so it survives table resets.
    fn take_next_button_id(&mut self) -> u32 {
        let next = match self.store.read(BUTTON_SEQ_FILE) {
            Ok(data) if data.len() == 4 => {
                u32::from_le_bytes([data[0], data[1], data[2], data[3]])
            }
            Ok(_) | Err(StoreError::NotFound) => 1,
            Err(e) => {
                warn!("command table: button counter unreadable: {e}");
                1
            }
        };
        if let Err(e) = self.store.write(BUTTON_SEQ_FILE, &(next + 1).to_le_bytes()) {
            warn!("command table: button counter not persisted: {e}");
        }
        next
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemStore;
    use crate::model::CommandAction;

    fn m5(id: u8) -> KButton {
        KButton::M5Button { id }
    }

    fn speak(text: &str) -> Command {
        Command {
            action: CommandAction::Speak { text: text.into() },
            ..Command::default()
        }
    }

    #[test]
    fn set_command_assigns_generated_names() {
        let table = CommandTable::new(MemStore::new(), 8);
        table.set_command(m5(1), speak("a"));
        table.set_command(m5(2), speak("b"));
        let names = table.button_names();
        assert_eq!(names[&m5(1)], "Button 1");
        assert_eq!(names[&m5(2)], "Button 2");

        // counter is not reused after a reset
        table.reset();
        table.set_command(m5(3), speak("c"));
        assert_eq!(table.button_names()[&m5(3)], "Button 3");
    }

    #[test]
    fn replace_moves_binding_to_end() {
        let table = CommandTable::new(MemStore::new(), 8);
        table.set_command(m5(1), speak("a"));
        table.set_command(m5(2), speak("b"));
        table.set_command(m5(1), speak("c"));
        let commands = table.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].0, m5(2));
        assert_eq!(commands[1].0, m5(1));
        assert_eq!(commands[1].1, speak("c"));
    }

    #[test]
    fn no_duplicate_buttons_ever() {
        let table = CommandTable::new(MemStore::new(), 8);
        for _ in 0..5 {
            table.set_command(m5(1), speak("x"));
        }
        table.delete_command(m5(1));
        table.set_command(m5(1), speak("y"));
        assert_eq!(table.commands().len(), 1);
    }

    #[test]
    fn prune_keeps_fresh_observations() {
        let table = CommandTable::new(MemStore::new(), 8);
        table.notify_observed_button(m5(1), 1.5);
        table.prune_observed(300);
        assert_eq!(table.observed_buttons().len(), 1);
        // zero TTL ages everything out except entries stamped this second
        table.prune_observed(0);
        assert!(table.observed_buttons().len() <= 1);
    }

    #[test]
    fn bulk_clears_are_independent() {
        let table = CommandTable::new(MemStore::new(), 8);
        table.set_command(m5(1), speak("a"));
        table.delete_all_commands();
        assert!(table.commands().is_empty());
        assert!(!table.button_names().is_empty());
        table.delete_all_button_names();
        assert!(table.button_names().is_empty());
    }

    #[test]
    fn existing_name_is_not_overwritten() {
        let table = CommandTable::new(MemStore::new(), 8);
        table.set_button_name(m5(1), "Lobby".into());
        table.set_command(m5(1), speak("a"));
        assert_eq!(table.button_names()[&m5(1)], "Lobby");
    }
}
