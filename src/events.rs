//! Button input channel.
//!
//! All input sources (BLE beacon sightings, fixed GPIO keys) push into
//! one bounded `embassy-sync` MPMC channel; the control loop drains it.
//! The channel is static so driver callbacks and the loop share it
//! without heap allocation or lifetime plumbing.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::model::KButton;

/// One sighting or press of a button.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub button: KButton,
    /// Estimated distance to the sender in meters; negative when the
    /// source cannot estimate it (GPIO keys, some beacons).
    pub estimated_distance: f64,
}

impl InputEvent {
    pub fn press(button: KButton) -> Self {
        Self {
            button,
            estimated_distance: -1.0,
        }
    }

    pub fn sighting(button: KButton, estimated_distance: f64) -> Self {
        Self {
            button,
            estimated_distance,
        }
    }
}

/// Channel depth; events arriving while the channel is full are dropped.
const EVENT_DEPTH: usize = 8;

/// Input event channel from the drivers to the control loop.
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, InputEvent, EVENT_DEPTH> =
    Channel::new();

/// Non-blocking send; a full channel drops the event (a lost sighting is
/// re-observed on the next advertisement anyway).
pub fn publish(event: InputEvent) {
    let _ = EVENT_CHANNEL.try_send(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_events_carry_no_distance() {
        let event = InputEvent::press(KButton::GpioButton { id: 1 });
        assert!(event.estimated_distance < 0.0);
    }
}
