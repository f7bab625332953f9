//! Debounced driver for fixed wall keys wired to GPIOs.
//!
//! Active-low momentary switch with a pull-up. The driver is polled
//! from the control loop at tick rate; a level change only registers
//! once it has held steady for the debounce window. Each accepted
//! press publishes one [`InputEvent`] for the key's button id.

use embedded_hal::digital::InputPin;
use log::debug;

use crate::events::{self, InputEvent};
use crate::model::KButton;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Released,
    /// Low seen; waiting out the debounce window.
    Settling { since_ms: u32 },
    Pressed,
}

pub struct GpioButton<P> {
    pin: P,
    button_id: u8,
    debounce_ms: u32,
    state: DebounceState,
}

impl<P: InputPin> GpioButton<P> {
    pub fn new(pin: P, button_id: u8, debounce_ms: u32) -> Self {
        Self {
            pin,
            button_id,
            debounce_ms,
            state: DebounceState::Released,
        }
    }

    pub fn button(&self) -> KButton {
        KButton::GpioButton { id: self.button_id }
    }

    /// Poll once; returns the button on the tick its press is accepted.
    /// A pin read error is treated as "released" for that tick.
    pub fn tick(&mut self, now_ms: u32) -> Option<KButton> {
        let pressed_now = self.pin.is_low().unwrap_or(false);

        match self.state {
            DebounceState::Released => {
                if pressed_now {
                    self.state = DebounceState::Settling { since_ms: now_ms };
                }
                None
            }
            DebounceState::Settling { since_ms } => {
                if !pressed_now {
                    // Bounce; start over.
                    self.state = DebounceState::Released;
                    None
                } else if now_ms.wrapping_sub(since_ms) >= self.debounce_ms {
                    self.state = DebounceState::Pressed;
                    debug!("gpio key {} pressed", self.button_id);
                    Some(self.button())
                } else {
                    None
                }
            }
            DebounceState::Pressed => {
                if !pressed_now {
                    self.state = DebounceState::Released;
                }
                None
            }
        }
    }

    /// Poll and publish to the event channel in one step.
    pub fn poll(&mut self, now_ms: u32) {
        if let Some(button) = self.tick(now_ms) {
            events::publish(InputEvent::press(button));
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
