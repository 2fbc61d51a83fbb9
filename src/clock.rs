//! Elapsed-time clock for the active session.
//!
//! The counter is derived from `now - armed_at` on every read, so delayed or
//! coalesced ticks never make it drift. The ticker task only publishes the
//! derived value to subscribers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

#[derive(Default)]
struct ClockInner {
    armed_at: Option<Instant>,
    frozen: u64,
    ticker: Option<JoinHandle<()>>,
}

pub struct ElapsedClock {
    tick: Duration,
    inner: Mutex<ClockInner>,
    tx: Arc<watch::Sender<u64>>,
}

impl Default for ElapsedClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl ElapsedClock {
    pub fn new(tick: Duration) -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            tick: tick.max(Duration::from_millis(1)),
            inner: Mutex::new(ClockInner::default()),
            tx: Arc::new(tx),
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Reset to zero and start counting. Re-arming replaces the previous ticker.
    pub fn arm(&self) {
        let mut inner = self.lock();
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        let armed_at = Instant::now();
        inner.armed_at = Some(armed_at);
        inner.frozen = 0;
        inner.ticker = spawn_ticker(armed_at, self.tick, Arc::clone(&self.tx));
        self.tx.send_replace(0);
    }

    /// Stop counting and freeze the last value.
    pub fn disarm(&self) -> u64 {
        let mut inner = self.lock();
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        if let Some(armed_at) = inner.armed_at.take() {
            inner.frozen = units_since(armed_at, Instant::now(), self.tick);
        }
        self.tx.send_replace(inner.frozen);
        inner.frozen
    }

    pub fn read(&self) -> u64 {
        let inner = self.lock();
        match inner.armed_at {
            Some(armed_at) => units_since(armed_at, Instant::now(), self.tick),
            None => inner.frozen,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed_at.is_some()
    }

    /// Receives the counter on every tick, arm and disarm.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ClockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ElapsedClock {
    fn drop(&mut self) {
        if let Some(ticker) = self.lock().ticker.take() {
            ticker.abort();
        }
    }
}

fn units_since(armed_at: Instant, now: Instant, tick: Duration) -> u64 {
    let elapsed = now.saturating_duration_since(armed_at).as_nanos();
    (elapsed / tick.as_nanos()) as u64
}

// Without a runtime there is nothing to publish to, reads still work.
fn spawn_ticker(
    armed_at: Instant,
    tick: Duration,
    tx: Arc<watch::Sender<u64>>,
) -> Option<JoinHandle<()>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    Some(handle.spawn(async move {
        let mut interval = tokio::time::interval_at(armed_at + tick, tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            tx.send_replace(units_since(armed_at, Instant::now(), tick));
        }
    }))
}

/// Render seconds as `HH:MM:SS`. Hours are not wrapped.
pub fn format_elapsed(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
