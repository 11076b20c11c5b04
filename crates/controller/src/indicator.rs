//! Two-colour status indicator: green = nominal, red = sensor fault.
//!
//! The colour follows the most recent probe check only.  Within a cycle each
//! plot's check overwrites the previous one; nothing is latched.

use anyhow::Result;

use crate::hal::Board;
use crate::moisture::SensorReading;

#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Nominal,
    Fault,
}

/// Light the indicator for one probe check and return the colour shown.
pub(crate) fn signal<B: Board>(board: &mut B, reading: &SensorReading) -> Status {
    let status = if reading.valid {
        Status::Nominal
    } else {
        tracing::warn!(
            plot = reading.plot,
            vwc = format!("{:.3}", reading.vwc),
            raw = reading.raw,
            "sensor out of range"
        );
        Status::Fault
    };
    board.set_status(status);
    status
}

// ---------------------------------------------------------------------------
// Real LEDs (production, requires rppal + Raspberry Pi hardware)
// ---------------------------------------------------------------------------
#[cfg(feature = "gpio")]
pub(crate) struct StatusLed {
    green: OutputPin,
    red: OutputPin,
}

#[cfg(feature = "gpio")]
impl StatusLed {
    pub(crate) fn new(green_gpio: u8, red_gpio: u8) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut green = gpio.get(green_gpio)?.into_output();
        let mut red = gpio.get(red_gpio)?.into_output();
        green.set_low();
        red.set_low();
        Ok(Self { green, red })
    }

    pub(crate) fn set(&mut self, status: Status) {
        match status {
            Status::Nominal => {
                self.red.set_low();
                self.green.set_high();
            }
            Status::Fault => {
                self.green.set_low();
                self.red.set_high();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Mock LEDs (development, no hardware, remembers the colour)
// ---------------------------------------------------------------------------
#[cfg(not(feature = "gpio"))]
pub(crate) struct StatusLed {
    pub(super) status: Option<Status>,
}

#[cfg(not(feature = "gpio"))]
impl StatusLed {
    pub(crate) fn new(green_gpio: u8, red_gpio: u8) -> Result<Self> {
        tracing::debug!(green_gpio, red_gpio, "[mock-gpio] status led (not wired)");
        Ok(Self { status: None })
    }

    pub(crate) fn set(&mut self, status: Status) {
        if self.status != Some(status) {
            tracing::debug!(?status, "[mock-gpio] status led");
        }
        self.status = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moisture::Calibration;
    use crate::testing::FakeBoard;

    #[test]
    fn valid_reading_shows_nominal() {
        let mut board = FakeBoard::new();
        let r = Calibration::default().read(1, 150);
        assert_eq!(signal(&mut board, &r), Status::Nominal);
        assert_eq!(board.status(), Some(Status::Nominal));
    }

    #[test]
    fn invalid_reading_shows_fault() {
        let mut board = FakeBoard::new();
        let r = Calibration::default().read(1, 0);
        assert_eq!(signal(&mut board, &r), Status::Fault);
        assert_eq!(board.status(), Some(Status::Fault));
    }

    #[test]
    fn fault_is_overwritten_by_next_check() {
        let mut board = FakeBoard::new();
        let cal = Calibration::default();
        signal(&mut board, &cal.read(1, 0));
        signal(&mut board, &cal.read(2, 150));
        assert_eq!(board.status(), Some(Status::Nominal));
    }

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn mock_led_remembers_colour() {
        let mut led = StatusLed::new(20, 21).unwrap();
        assert_eq!(led.status, None);
        led.set(Status::Fault);
        assert_eq!(led.status, Some(Status::Fault));
        led.set(Status::Nominal);
        assert_eq!(led.status, Some(Status::Nominal));
    }
}
