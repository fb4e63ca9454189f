use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Time source used by a gate to measure its counting window and to wait out
/// the remainder of a window when the burst threshold has been reached.
///
/// Implementations must provide monotonic time that never goes backwards.
/// The time is measured in seconds as floating-point values.
pub trait Clock {
    /// Returns the current time in seconds since an arbitrary epoch.
    ///
    /// The returned value must be monotonic (never decrease) and should
    /// have sufficient precision for window bookkeeping.
    fn now(&self) -> f64;

    /// Blocks the calling thread for `duration`.
    ///
    /// Only the blocking [`RateGate`](crate::RateGate) calls this. The async gate
    /// always waits on the tokio timer instead.
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Standard clock implementation using [`std::time::Instant`].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use portcullis::{GateLimit, RateGate, StdClock};
///
/// let limit = GateLimit::new(Duration::from_secs(1), 10, 4);
/// let gate = RateGate::with_clock(limit, StdClock::default());
/// assert_eq!(4, gate.execute(|x: u32| x * 2, 2));
/// ```
#[derive(Clone)]
pub struct StdClock {
    origin: std::time::Instant,
}

impl Default for StdClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// High-precision clock implementation using the `quanta` crate.
///
/// Requires the "quanta" feature to be enabled.
#[cfg(feature = "quanta")]
#[derive(Clone)]
pub struct QuantaClock {
    origin: quanta::Instant,
}

#[cfg(feature = "quanta")]
impl Default for QuantaClock {
    fn default() -> Self {
        Self::new(quanta::Clock::new())
    }
}

#[cfg(feature = "quanta")]
impl QuantaClock {
    /// Creates a new `QuantaClock` from a `quanta::Clock` instance.
    pub fn new(clock: quanta::Clock) -> Self {
        let origin = clock.now();
        Self { origin }
    }
}

#[cfg(feature = "quanta")]
impl Clock for QuantaClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Coarse clock reading quanta's recent time.
///
/// Reading the time is cheaper than [`StdClock`], at a precision bounded by how
/// often quanta's upkeep thread runs. Window edges observed through this clock
/// can lag by up to one upkeep interval.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "quanta")]
/// # {
/// use std::time::Duration;
///
/// use portcullis::{FastClock, GateLimit, RateGate};
///
/// let limit = GateLimit::new(Duration::from_millis(100), 1_000, 8);
/// let gate = RateGate::with_clock(limit, FastClock::default());
/// # }
/// ```
#[cfg(feature = "quanta")]
#[derive(Clone)]
pub struct FastClock {
    clock: quanta::Clock,
    origin: quanta::Instant,
}

#[cfg(feature = "quanta")]
impl Default for FastClock {
    fn default() -> Self {
        Self::new(quanta::Clock::new())
    }
}

#[cfg(feature = "quanta")]
impl FastClock {
    /// Creates a new `FastClock` from a `quanta::Clock` instance.
    ///
    /// **Important**: Ensure the clock's upkeep thread is running, otherwise
    /// the gate never observes its window expiring.
    pub fn new(clock: quanta::Clock) -> Self {
        let origin = clock.recent();
        Self { clock, origin }
    }
}

#[cfg(feature = "quanta")]
impl Clock for FastClock {
    fn now(&self) -> f64 {
        (self.clock.recent() - self.origin).as_secs_f64()
    }
}

/// Tokio-compatible clock implementation using [`tokio::time::Instant`].
///
/// Follows tokio's paused time in tests. This is the default clock of
/// [`AsyncRateGate`](crate::futures::AsyncRateGate).
///
/// Pair it with the async gate only. [`RateGate`](crate::RateGate) waits with
/// [`Clock::sleep`], which blocks the thread and does not move tokio's time:
/// under paused time its window never rolls over and every delayed call sleeps
/// again. Blocking gates should use [`StdClock`].
#[cfg(feature = "tokio")]
#[derive(Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

#[cfg(feature = "tokio")]
impl Default for TokioClock {
    fn default() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

#[cfg(feature = "tokio")]
impl Clock for TokioClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manual clock implementation for testing and simulation.
///
/// Time only moves when told to. Sleeping on a `ManualClock` does not block,
/// it advances the clock by the requested duration, which makes the delay a
/// gate imposes observable as a jump in [`now`](Clock::now).
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use portcullis::{Clock, GateLimit, ManualClock, RateGate};
///
/// let clock = Arc::new(ManualClock::new(0.0));
/// let limit = GateLimit::new(Duration::from_secs(1), 1, 1);
/// let gate = RateGate::with_clock(limit, Arc::clone(&clock));
///
/// gate.execute(|_| (), ());
/// assert_eq!(0.0, clock.now());
/// // the second call waits for the window to roll over
/// gate.execute(|_| (), ());
/// assert_eq!(1.0, clock.now());
/// ```
pub struct ManualClock {
    now: Mutex<f64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl ManualClock {
    /// Creates a new manual clock starting at `now` seconds.
    pub fn new(now: f64) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Sets the current time to `now` seconds.
    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }

    /// Advances the current time by `delta` seconds.
    pub fn advance(&self, delta: f64) {
        *self.now.lock() += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration.as_secs_f64());
    }
}
