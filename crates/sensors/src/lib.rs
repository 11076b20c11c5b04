//! Raw sampling primitives for the irrigation controller.
//!
//! Everything here talks to (or imitates) a physical device and returns
//! plain numbers: ADC codes for the soil probes, degrees and percent for the
//! air sensor. Calibration and decisions live in the controller crate.

pub mod adc;
pub mod dht;
#[cfg(feature = "sim")]
pub mod sim;
