//! Domain data model: button identities and bound commands.

pub mod button;
pub mod command;

pub use button::{AppleIBeacon, KButton};
pub use command::{Command, CommandAction, CommandType};
