//! Wall clock with a one-time seed from build time when the clock is unset
//! at boot (Pi without an RTC module, dead coin cell).

use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::{info, warn};

use crate::hal::{ClockSource, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClockStatus {
    Running,
    SeededFromBuild(Timestamp),
}

/// Build time embedded by `build.rs`, as UTC.
pub(crate) fn build_time() -> OffsetDateTime {
    option_env!("BUILD_UNIX_TS")
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Build time as a wall-clock reading at `offset`.
pub(crate) fn build_timestamp(offset: UtcOffset) -> Timestamp {
    let t = build_time().to_offset(offset);
    PrimitiveDateTime::new(t.date(), t.time())
}

/// Boot check: a clock that is not running is seeded once from build time.
/// Later cycles treat the clock as healthy.
pub(crate) fn ensure_running<C: ClockSource>(clock: &mut C, build: Timestamp) -> ClockStatus {
    if clock.is_running() {
        info!(now = %clock.now(), "real time clock initialized");
        ClockStatus::Running
    } else {
        warn!(seed = %build, "RTC is NOT running, seeding from build time");
        clock.adjust(build);
        ClockStatus::SeededFromBuild(build)
    }
}

/// Operating-system clock.  "Running" means it reads no earlier than the
/// moment this binary was built.
pub(crate) struct SystemClock {
    local: UtcOffset,
    skew: time::Duration,
}

impl SystemClock {
    /// The local offset is resolved once, before worker threads exist.
    pub fn new() -> Self {
        Self {
            local: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
            skew: time::Duration::ZERO,
        }
    }

    pub fn offset(&self) -> UtcOffset {
        self.local
    }

    fn wall(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + self.skew
    }
}

impl ClockSource for SystemClock {
    fn is_running(&self) -> bool {
        self.wall() >= build_time()
    }

    fn adjust(&mut self, ts: Timestamp) {
        self.skew = ts.assume_offset(self.local) - OffsetDateTime::now_utc();
    }

    fn now(&self) -> Timestamp {
        let t = self.wall().to_offset(self.local);
        PrimitiveDateTime::new(t.date(), t.time())
    }
}
