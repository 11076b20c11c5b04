//! Temperature / relative humidity from a DHT11, DHT22 or AM2302 bound to
//! the Linux `dht11` IIO driver (`dtoverlay=dht11,gpiopin=4`).
//!
//! The kernel handles the single-wire protocol and exposes two sysfs files:
//! `in_temp_input` (milli-°C) and `in_humidityrelative_input` (milli-%RH).
//! The sensor is slow and the driver returns `EIO` when a transfer is
//! garbled, so each read is retried a few times.  A read that never
//! succeeds reports NaN; callers decide what a missing value means.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default IIO device directory for the first bound sensor.
pub const DEFAULT_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";

const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

const READ_ATTEMPTS: usize = 3;

pub struct IioHumiditySensor {
    dir: PathBuf,
}

impl IioHumiditySensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Whether the device directory exposes both channels.
    pub fn is_present(&self) -> bool {
        self.dir.join(TEMPERATURE_FILE).exists() && self.dir.join(HUMIDITY_FILE).exists()
    }

    /// Air temperature in °C, or NaN.
    pub fn read_temperature(&self) -> f32 {
        self.read_channel(TEMPERATURE_FILE)
    }

    /// Relative humidity in %, or NaN.
    pub fn read_humidity(&self) -> f32 {
        self.read_channel(HUMIDITY_FILE)
    }

    fn read_channel(&self, file: &str) -> f32 {
        let path = self.dir.join(file);
        let mut last_err = None;
        for _ in 0..READ_ATTEMPTS {
            match read_milli(&path) {
                Ok(v) => return v,
                Err(e) => last_err = Some(e),
            }
        }
        if let Some(e) = last_err {
            tracing::debug!(path = %path.display(), "dht read failed: {e:#}");
        }
        f32::NAN
    }
}

/// Parse a sysfs file holding a single integer in thousandths.
fn read_milli(path: &Path) -> Result<f32> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let milli: i32 = text
        .trim()
        .parse()
        .with_context(|| format!("not an integer in {}: {:?}", path.display(), text.trim()))?;
    Ok(milli as f32 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_device(name: &str, temp: Option<&str>, rh: Option<&str>) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("iio-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        if let Some(t) = temp {
            fs::write(dir.join(TEMPERATURE_FILE), t).unwrap();
        }
        if let Some(h) = rh {
            fs::write(dir.join(HUMIDITY_FILE), h).unwrap();
        }
        dir
    }

    #[test]
    fn reads_millidegrees_and_millipercent() {
        let dir = fake_device("ok", Some("23400\n"), Some("61250\n"));
        let sensor = IioHumiditySensor::new(&dir);
        assert!(sensor.is_present());
        assert!((sensor.read_temperature() - 23.4).abs() < 1e-4);
        assert!((sensor.read_humidity() - 61.25).abs() < 1e-4);
    }

    #[test]
    fn negative_temperature() {
        let dir = fake_device("neg", Some("-2500"), Some("90000"));
        let sensor = IioHumiditySensor::new(&dir);
        assert!((sensor.read_temperature() + 2.5).abs() < 1e-4);
    }

    #[test]
    fn missing_device_reads_nan() {
        let sensor = IioHumiditySensor::new("/nonexistent/iio:device9");
        assert!(!sensor.is_present());
        assert!(sensor.read_temperature().is_nan());
        assert!(sensor.read_humidity().is_nan());
    }

    #[test]
    fn garbage_contents_read_nan() {
        let dir = fake_device("garbage", Some("hot"), None);
        let sensor = IioHumiditySensor::new(&dir);
        assert!(!sensor.is_present());
        assert!(sensor.read_temperature().is_nan());
    }
}
