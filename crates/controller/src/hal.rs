//! Hardware seams.  The control loop only ever talks to these traits, so the
//! whole cycle runs offline against fakes.

use anyhow::Result;
use time::PrimitiveDateTime;

use crate::indicator::Status;

/// Wall-clock time as the real-time clock reports it (no zone).
pub(crate) type Timestamp = PrimitiveDateTime;

/// Probes, relays, indicator and air sensor of one controller.
pub(crate) trait Board {
    /// Raw converter code for a soil probe channel.
    fn read_channel(&mut self, channel: u8) -> Result<u16>;

    /// Open or close the valve of a 1-based plot.  Line polarity is the
    /// board's business.
    fn set_relay(&mut self, plot: usize, open: bool);

    fn set_status(&mut self, status: Status);

    /// Relative humidity (%), NaN when the sensor could not be read.
    fn read_humidity(&mut self) -> f32;

    /// Air temperature (°C), NaN when the sensor could not be read.
    fn read_temperature(&mut self) -> f32;

    /// Drive every relay closed.
    fn close_all(&mut self);
}

pub(crate) trait ClockSource {
    /// Whether the clock holds a plausible time.
    fn is_running(&self) -> bool;

    fn adjust(&mut self, ts: Timestamp);

    fn now(&self) -> Timestamp;
}

/// Append-only text storage for the cycle log.
pub(crate) trait LogStorage {
    /// Probe the medium.  Called once at boot.
    fn begin(&mut self) -> Result<()>;

    /// True when the medium held no records when it was probed.
    fn is_fresh(&self) -> bool;

    fn append_line(&mut self, line: &str) -> Result<()>;
}
