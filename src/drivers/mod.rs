//! Input hardware drivers.

pub mod gpio_button;
