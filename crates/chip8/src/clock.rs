use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Rate at which the delay and sound timers count down.
pub const TIMER_HZ: u32 = 60;

/// Fastest supported CPU step rate.
pub const MAX_STEPS_PER_SECOND: u32 = 1000;

/// CPU step rate used when none is given.
pub const DEFAULT_STEPS_PER_SECOND: u32 = 500;

/// Debt is kept as `nanoseconds * rate`, one period is worth this much.
const PERIOD: u128 = 1_000_000_000;

/// A source of elapsed time, measured from when the source was created.
pub trait TimeSource: Send {
    /// Time elapsed since the source started. Must never go backwards.
    fn elapsed(&self) -> Duration;
}

/// Wall-clock time, backed by [`Instant`].
pub struct MonotonicTime(Instant);

impl MonotonicTime {
    pub fn new() -> Self {
        Self(Instant::now())
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Time that only moves when told to.
///
/// Clones share the same counter, so a host can keep one clone and hand the
/// other to a [`Clock`].
#[derive(Clone, Default)]
pub struct ManualTime(Arc<AtomicU64>);

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let nanos = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        self.0.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.0.load(Ordering::SeqCst))
    }
}

fn default_time_source() -> Box<dyn TimeSource> {
    Box::new(MonotonicTime::new())
}

/// Converts elapsed time into whole CPU steps and timer ticks.
///
/// Both domains carry their leftover time between calls, so the number of
/// steps and ticks only depends on how much time has passed, never on how
/// often [`Clock::advance`] is called. Also owns the delay and sound timers,
/// which are decremented by `1` at a rate of `60Hz`.
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct Clock {
    pub delay_timer: u8,
    pub sound_timer: u8,
    steps_per_second: u32,
    cpu_debt: u128,
    timer_debt: u128,
    #[cfg_attr(feature = "persistence", serde(skip, default = "default_time_source"))]
    source: Box<dyn TimeSource>,
    #[cfg_attr(feature = "persistence", serde(skip))]
    last_elapsed: Duration,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS_PER_SECOND)
    }
}

impl Clock {
    /// Create a new [`Clock`] running on wall-clock time.
    ///
    /// `steps_per_second` is clamped to `1..=MAX_STEPS_PER_SECOND`.
    pub fn new(steps_per_second: u32) -> Self {
        Self::with_time_source(steps_per_second, default_time_source())
    }

    /// Create a new [`Clock`] driven by the given time source.
    pub fn with_time_source(steps_per_second: u32, source: Box<dyn TimeSource>) -> Self {
        let last_elapsed = source.elapsed();
        Self {
            delay_timer: 0,
            sound_timer: 0,
            steps_per_second: steps_per_second.clamp(1, MAX_STEPS_PER_SECOND),
            cpu_debt: 0,
            timer_debt: 0,
            source,
            last_elapsed,
        }
    }

    /// The CPU step rate after clamping.
    pub fn steps_per_second(&self) -> u32 {
        self.steps_per_second
    }

    /// Replace the time source. Time starts counting from the new source's
    /// current reading.
    pub fn set_time_source(&mut self, source: Box<dyn TimeSource>) {
        self.last_elapsed = source.elapsed();
        self.source = source;
    }

    /// Zero the timers, drop any carried time and restart counting from now.
    pub fn reset(&mut self) {
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.cpu_debt = 0;
        self.timer_debt = 0;
        self.last_elapsed = self.source.elapsed();
    }

    /// Account for the time elapsed since the last call. Due timer ticks are
    /// applied right away, the number of CPU steps due is returned for the
    /// caller to run.
    pub fn advance(&mut self) -> usize {
        let elapsed = self.source.elapsed();
        let delta = elapsed.saturating_sub(self.last_elapsed).as_nanos();
        self.last_elapsed = elapsed;

        self.timer_debt += delta * u128::from(TIMER_HZ);
        let ticks = self.timer_debt / PERIOD;
        self.timer_debt %= PERIOD;
        // timers floor at zero, anything past 255 ticks is the same as 255
        self.tick(u8::try_from(ticks).unwrap_or(u8::MAX));

        self.cpu_debt += delta * u128::from(self.steps_per_second);
        let steps = self.cpu_debt / PERIOD;
        self.cpu_debt %= PERIOD;
        usize::try_from(steps).unwrap_or(usize::MAX)
    }

    /// Count both timers down by `ticks`, stopping at zero.
    pub fn tick(&mut self, ticks: u8) {
        self.delay_timer = self.delay_timer.saturating_sub(ticks);
        self.sound_timer = self.sound_timer.saturating_sub(ticks);
    }
}
