//! Hashrate metering for local mining

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Interval between moving-average ticks
const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// One-minute EWMA decay per tick
fn one_minute_alpha() -> f64 {
    1.0 - (-TICK_INTERVAL.as_secs_f64() / 60.0).exp()
}

/// Event meter with a one-minute exponentially weighted rate.
///
/// Ticks are applied lazily on every read or mark, so no background
/// thread is needed.
#[derive(Debug)]
pub struct Meter {
    /// Total events ever marked
    count: AtomicU64,
    state: Mutex<EwmaState>,
}

#[derive(Debug)]
struct EwmaState {
    uncounted: u64,
    rate: f64,
    initialized: bool,
    last_tick: Instant,
}

impl EwmaState {
    fn catch_up(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        let ticks = elapsed.as_nanos() / TICK_INTERVAL.as_nanos();
        if ticks == 0 {
            return;
        }

        let alpha = one_minute_alpha();
        let instant_rate = self.uncounted as f64 / TICK_INTERVAL.as_secs_f64();
        self.uncounted = 0;
        if self.initialized {
            self.rate += alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }

        // Remaining ticks saw no events: pure decay.
        let idle = i32::try_from(ticks - 1).unwrap_or(i32::MAX);
        self.rate *= (1.0 - alpha).powi(idle);

        let advance = u32::try_from(ticks).unwrap_or(u32::MAX);
        self.last_tick += TICK_INTERVAL * advance;
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter {
    /// Create new meter starting its first tick window now
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(start: Instant) -> Self {
        Self {
            count: AtomicU64::new(0),
            state: Mutex::new(EwmaState {
                uncounted: 0,
                rate: 0.0,
                initialized: false,
                last_tick: start,
            }),
        }
    }

    /// Record `n` events
    pub fn mark(&self, n: u64) {
        self.mark_at(n, Instant::now());
    }

    /// One-minute moving average rate in events per second
    pub fn rate1(&self) -> f64 {
        self.rate1_at(Instant::now())
    }

    /// Total events ever marked
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn mark_at(&self, n: u64, now: Instant) {
        self.count.fetch_add(n, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.catch_up(now);
        state.uncounted += n;
    }

    fn rate1_at(&self, now: Instant) -> f64 {
        let mut state = self.state.lock();
        state.catch_up(now);
        state.rate
    }
}
