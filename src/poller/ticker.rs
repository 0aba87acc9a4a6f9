//! Tick sources for the poll loop.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// Source of poll ticks.
pub trait Ticker: Send {
    /// Wait for the next tick. `false` means the source is exhausted.
    fn tick(&mut self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Wall-clock ticker on a fixed cadence. Missed ticks are skipped.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Ticker firing every `period`, first tick immediately.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    fn tick(&mut self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            self.interval.tick().await;
            true
        })
    }
}

/// Ticker driven by messages, for tests and manual triggering.
pub struct ChannelTicker {
    rx: mpsc::Receiver<()>,
}

impl ChannelTicker {
    /// Ticker plus the sender that drives it.
    #[must_use]
    pub fn new(buffer: usize) -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }
}

impl Ticker for ChannelTicker {
    fn tick(&mut self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.rx.recv().await.is_some() })
    }
}
