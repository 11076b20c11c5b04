//! Per-plot irrigation decision and valve actuation.
//!
//! Every plot costs exactly one IrrigTime hold whether or not it is watered,
//! so the decision phase always lasts N × IrrigTime.  Plots are handled one
//! after another; two valves are never open at once.

use std::time::Duration;

use tracing::info;

use crate::hal::Board;
use crate::timer::Timer;

/// Per-plot state owned by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Plot {
    /// 1-based plot number.
    pub id: usize,
    pub channel: u8,
    threshold: f32,
    counter: u32,
}

impl Plot {
    pub fn new(id: usize, channel: u8, threshold: f32) -> Self {
        Self {
            id,
            channel,
            threshold,
            counter: 0,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Irrigation events since boot.
    pub fn counter(&self) -> u32 {
        self.counter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Irrigated,
    Skipped,
}

/// Water when VWC is strictly below the threshold.  Out-of-range readings
/// are acted on like any other; a NaN reading never waters.
pub(crate) fn needs_irrigation(vwc: f32, threshold: f32) -> bool {
    vwc < threshold
}

/// An open relay.  Dropping the guard closes it, so the valve shuts on every
/// exit path, including the cycle future being dropped mid-hold.
pub(crate) struct RelayGuard<'a, B: Board> {
    board: &'a mut B,
    plot: usize,
}

impl<'a, B: Board> RelayGuard<'a, B> {
    pub fn open(board: &'a mut B, plot: usize) -> Self {
        board.set_relay(plot, true);
        Self { board, plot }
    }
}

impl<B: Board> Drop for RelayGuard<'_, B> {
    fn drop(&mut self) {
        self.board.set_relay(self.plot, false);
    }
}

/// Decide and act for one plot: open for `irrig_time` and count, or just
/// wait `irrig_time`.
pub(crate) async fn decide<B: Board, T: Timer>(
    board: &mut B,
    timer: &mut T,
    plot: &mut Plot,
    vwc: f32,
    irrig_time: Duration,
) -> Decision {
    if needs_irrigation(vwc, plot.threshold) {
        info!(
            plot = plot.id,
            vwc = format!("{vwc:.3}"),
            threshold = format!("{:.3}", plot.threshold),
            "plot {} irrigation started",
            plot.id
        );
        {
            let _valve = RelayGuard::open(board, plot.id);
            timer.hold(irrig_time).await;
        }
        plot.counter += 1;
        info!(plot = plot.id, count = plot.counter, "irrigation finished");
        Decision::Irrigated
    } else {
        // Same wait without water keeps the cycle length fixed.
        timer.hold(irrig_time).await;
        info!(plot = plot.id, "plot {} does not need irrigation", plot.id);
        Decision::Skipped
    }
}
