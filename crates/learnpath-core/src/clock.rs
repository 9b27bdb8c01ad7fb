//! Tick source and cooperative scheduler.
//!
//! Nothing here spawns threads. A [`Clock`] reports how many whole ticks have
//! passed since it was last asked, and a [`Scheduler`] turns those ticks into
//! callback invocations. Production code uses [`SystemClock`]; tests drive a
//! [`ManualClock`] or call [`Scheduler::advance`] directly.
//!
//! ```ignore
//! let mut scheduler = Scheduler::new();
//! let handle = scheduler.schedule(10, |n: &mut u32| *n += 1)?;
//! scheduler.advance(25, &mut counter); // fires at ticks 10 and 20
//! scheduler.cancel(handle);
//! ```

use std::time::{Duration, Instant};

use crate::error::{Result, ValidationError};

/// Source of elapsed ticks.
pub trait Clock {
    /// Whole ticks elapsed since the previous call.
    fn elapsed_ticks(&mut self) -> u64;
}

/// Wall-clock ticks of a fixed length. Sub-tick remainders carry over.
#[derive(Debug, Clone)]
pub struct SystemClock {
    tick: Duration,
    last: Instant,
}

impl SystemClock {
    /// # Errors
    /// Returns a validation error for a zero tick length.
    pub fn from_millis(tick_ms: u64) -> Result<Self> {
        if tick_ms == 0 {
            return Err(ValidationError::InvalidValue {
                field: "tick_ms".into(),
                message: "must be greater than zero".into(),
            }
            .into());
        }
        Ok(Self {
            tick: Duration::from_millis(tick_ms),
            last: Instant::now(),
        })
    }

    pub fn tick_length(&self) -> Duration {
        self.tick
    }
}

impl Clock for SystemClock {
    fn elapsed_ticks(&mut self) -> u64 {
        let elapsed = self.last.elapsed();
        let ticks = (elapsed.as_millis() / self.tick.as_millis().max(1)) as u64;
        if ticks > 0 {
            self.last += self.tick * ticks as u32;
        }
        ticks
    }
}

/// Clock advanced by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    pending: u64,
    total: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, ticks: u64) {
        self.pending += ticks;
        self.total += ticks;
    }

    pub fn total_ticks(&self) -> u64 {
        self.total
    }
}

impl Clock for ManualClock {
    fn elapsed_ticks(&mut self) -> u64 {
        std::mem::take(&mut self.pending)
    }
}

/// Cancels one scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

struct Timer<T> {
    handle: TimerHandle,
    every: u64,
    countdown: u64,
    callback: Box<dyn FnMut(&mut T)>,
}

/// Fires periodic callbacks against a caller-owned target.
///
/// Callbacks due on the same tick run in registration order.
pub struct Scheduler<T> {
    timers: Vec<Timer<T>>,
    next_id: u64,
    ticks: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 0,
            ticks: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` every `interval_ticks` ticks, starting `interval_ticks`
    /// from now.
    ///
    /// # Errors
    /// Returns a validation error when `interval_ticks` is zero.
    pub fn schedule<F>(&mut self, interval_ticks: u64, callback: F) -> Result<TimerHandle>
    where
        F: FnMut(&mut T) + 'static,
    {
        if interval_ticks == 0 {
            return Err(ValidationError::InvalidValue {
                field: "interval_ticks".into(),
                message: "must be greater than zero".into(),
            }
            .into());
        }
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            handle,
            every: interval_ticks,
            countdown: interval_ticks,
            callback: Box::new(callback),
        });
        Ok(handle)
    }

    /// Returns false if the handle was already cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Total ticks this scheduler has processed.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Step `ticks` ticks, firing every due callback. Returns the number of
    /// callback invocations.
    pub fn advance(&mut self, ticks: u64, target: &mut T) -> u64 {
        let mut fired = 0;
        for _ in 0..ticks {
            self.ticks += 1;
            for timer in &mut self.timers {
                timer.countdown -= 1;
                if timer.countdown == 0 {
                    timer.countdown = timer.every;
                    (timer.callback)(target);
                    fired += 1;
                }
            }
        }
        fired
    }

    /// Advance by however many ticks `clock` reports.
    pub fn run_pending(&mut self, clock: &mut dyn Clock, target: &mut T) -> u64 {
        let ticks = clock.elapsed_ticks();
        self.advance(ticks, target)
    }
}

impl<T> std::fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("timers", &self.timers.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}
