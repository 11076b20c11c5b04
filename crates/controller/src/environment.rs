//! Air temperature / humidity sample and the vapour-pressure metrics derived
//! from it.

use crate::hal::Timestamp;

/// One environment reading with derived metrics (kPa).  NaN inputs are kept
/// and propagate into every derived value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EnvironmentSample {
    pub timestamp: Timestamp,
    /// °C
    pub temperature: f32,
    /// %RH
    pub humidity: f32,
    pub e_sat: f32,
    pub e: f32,
    pub vpd: f32,
}

impl EnvironmentSample {
    pub fn derive(timestamp: Timestamp, temperature: f32, humidity: f32) -> Self {
        let e_sat = saturation_vapor_pressure(temperature);
        let e = e_sat * humidity / 100.0;
        Self {
            timestamp,
            temperature,
            humidity,
            e_sat,
            e,
            vpd: e_sat - e,
        }
    }

    pub fn is_valid(&self) -> bool {
        !(self.temperature.is_nan() || self.humidity.is_nan())
    }
}

/// Tetens/Magnus form: e_sat = 0.6112 · exp(17.67·T / (T + 243.5)), T in °C.
pub(crate) fn saturation_vapor_pressure(temperature: f32) -> f32 {
    0.6112 * ((17.67 * temperature) / (temperature + 243.5)).exp()
}
