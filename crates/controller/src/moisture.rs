//! Raw probe code → volumetric water content (VWC, m3/m3).

use serde::Deserialize;

/// Substrate calibration for a linear voltage-output probe (Decagon 10HS and
/// similar).  The default slope/intercept are for a peat:perlite mix.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Calibration {
    /// ADC reference voltage (V).
    pub vref: f32,
    /// Largest code the converter produces.
    pub adc_max: u16,
    pub slope: f32,
    pub intercept: f32,
    /// Plausible VWC range; readings outside it light the fault indicator.
    pub valid_min: f32,
    pub valid_max: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            vref: 5.0,
            adc_max: 1023,
            slope: 1.1785,
            intercept: -0.4938,
            valid_min: 0.0,
            valid_max: 0.8,
        }
    }
}

impl Calibration {
    /// VWC = raw × (Vref / ADCmax) × slope + intercept.
    pub fn to_vwc(&self, raw: u16) -> f32 {
        raw as f32 * (self.vref / self.adc_max as f32) * self.slope + self.intercept
    }

    /// Inverse of [`to_vwc`](Self::to_vwc), used to seed the simulator.
    pub fn raw_for(&self, vwc: f32) -> f32 {
        (vwc - self.intercept) / (self.slope * self.vref / self.adc_max as f32)
    }

    /// Inclusive range check.  NaN is never valid.
    pub fn is_valid(&self, vwc: f32) -> bool {
        (self.valid_min..=self.valid_max).contains(&vwc)
    }

    pub fn read(&self, plot: usize, raw: u16) -> SensorReading {
        let vwc = self.to_vwc(raw);
        SensorReading {
            plot,
            raw,
            vwc,
            valid: self.is_valid(vwc),
        }
    }
}

/// One probe sample.  An invalid reading is still passed on unchanged to the
/// decision step and the log; only the indicator reacts to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SensorReading {
    /// 1-based plot number.
    pub plot: usize,
    pub raw: u16,
    pub vwc: f32,
    pub valid: bool,
}
