use std::time::Duration;

/// Blocks the control task for a fixed duration.  Both the valve actuation
/// window and the no-irrigation wait go through here.
pub(crate) trait Timer {
    async fn hold(&mut self, duration: Duration);
}

/// Real waits on the tokio clock.  Under `tokio::time::pause` this becomes a
/// virtual clock, which is how the timing tests run.
pub(crate) struct TokioTimer;

impl Timer for TokioTimer {
    async fn hold(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
