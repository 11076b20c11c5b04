//! Valve relays via GPIO, one per plot. The `gpio` feature gates the real
//! rppal driver; without it, a mock implementation tracks state and logs
//! changes.

use anyhow::Result;

#[cfg(feature = "gpio")]
use anyhow::Context;
#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};

// ---------------------------------------------------------------------------
// Real GPIO valve board (production, requires rppal + Raspberry Pi hardware)
// ---------------------------------------------------------------------------
#[cfg(feature = "gpio")]
pub(crate) struct ValveBoard {
    pins: Vec<OutputPin>, // index = plot - 1
    active_low: bool,     // reverse relay logic: LOW opens the valve
}

#[cfg(feature = "gpio")]
impl ValveBoard {
    pub(crate) fn new(relay_gpio: &[u8], active_low: bool) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut pins = Vec::with_capacity(relay_gpio.len());

        for (i, &pin_num) in relay_gpio.iter().enumerate() {
            let mut pin = gpio
                .get(pin_num)
                .with_context(|| format!("relay gpio {pin_num} for plot {}", i + 1))?
                .into_output();

            // Fail-safe: closed at startup
            if active_low {
                pin.set_high();
            } else {
                pin.set_low();
            }

            pins.push(pin);
        }

        Ok(Self { pins, active_low })
    }

    pub(crate) fn set(&mut self, plot: usize, open: bool) {
        let Some(pin) = plot.checked_sub(1).and_then(|i| self.pins.get_mut(i)) else {
            tracing::error!(plot, "unknown plot");
            return;
        };
        // Line level that opens the valve: LOW for reverse-logic boards.
        if open != self.active_low {
            pin.set_high();
        } else {
            pin.set_low();
        }
        tracing::debug!(plot, "valve {}", if open { "OPEN" } else { "CLOSED" });
    }

    pub(crate) fn close_all(&mut self) {
        for plot in 1..=self.pins.len() {
            self.set(plot, false);
        }
    }
}

// ---------------------------------------------------------------------------
// Mock valve board (development, no hardware, logs state)
// ---------------------------------------------------------------------------
#[cfg(not(feature = "gpio"))]
pub(crate) struct ValveBoard {
    pub(super) open: Vec<bool>, // index = plot - 1
}

#[cfg(not(feature = "gpio"))]
impl ValveBoard {
    pub(crate) fn new(relay_gpio: &[u8], _active_low: bool) -> Result<Self> {
        for (i, pin_num) in relay_gpio.iter().enumerate() {
            tracing::info!("[mock-gpio] registered plot={} (gpio {pin_num}, not wired)", i + 1);
        }
        Ok(Self {
            open: vec![false; relay_gpio.len()],
        })
    }

    pub(crate) fn set(&mut self, plot: usize, open: bool) {
        if let Some(state) = plot.checked_sub(1).and_then(|i| self.open.get_mut(i)) {
            *state = open;
            tracing::debug!(plot, "[mock-gpio] valve {}", if open { "OPEN" } else { "CLOSED" });
        } else {
            tracing::error!(plot, "[mock-gpio] unknown plot");
        }
    }

    pub(crate) fn close_all(&mut self) {
        for plot in 1..=self.open.len() {
            self.set(plot, false);
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
