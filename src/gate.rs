use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::GateError;
use crate::pool::{Permit, TokenPool};
use crate::window::{Admission, Window};
use crate::{Clock, GateLimit, StdClock};

/// A call gate bounding both how many calls start per window and how many run
/// at the same time.
///
/// Each call to [`execute`](Self::execute) first passes the window check: the
/// first `burst_threshold` calls of a window go through immediately, a call
/// beyond that sleeps until the window ends. The admitted call then takes a
/// token from a pool of `max_concurrent` tokens, runs the task on the calling
/// thread and puts the token back.
///
/// The window lock is held while a call sleeps out the end of its window, so
/// callers past the threshold are released one at a time. The task itself runs
/// outside the lock.
///
/// # Type Parameters
///
/// - `C`: Clock implementation (default: [`StdClock`])
///
/// # Examples
///
/// ```rust
/// use std::time::{Duration, Instant};
///
/// use portcullis::RateGate;
///
/// let gate = RateGate::new(Duration::ZERO, Duration::from_millis(200), 2, 1);
/// let started = Instant::now();
/// assert_eq!(1, gate.execute(|x| x, 1));
/// assert_eq!(2, gate.execute(|x| x, 2));
/// // third call within the window waits for it to end
/// assert_eq!(3, gate.execute(|x| x, 3));
/// assert!(started.elapsed() >= Duration::from_millis(190));
/// ```
pub struct RateGate<C = StdClock> {
    window: Mutex<Window>,
    tokens: TokenPool,
    clock: C,
    limit: GateLimit,
}

impl RateGate<StdClock> {
    /// Creates a gate using the standard clock.
    ///
    /// # Arguments
    ///
    /// * `limit` - Rate-limit duration, stored but never used for admission
    /// * `window` - Length of the counting window
    /// * `burst_threshold` - Calls per window admitted without delay
    /// * `max_concurrent` - Number of calls allowed to run at the same time
    pub fn new(
        limit: Duration,
        window: Duration,
        burst_threshold: usize,
        max_concurrent: usize,
    ) -> Self {
        let limit = GateLimit::new(window, burst_threshold, max_concurrent).with_limit(limit);
        Self::from_limit(limit)
    }

    /// Creates a gate from a [`GateLimit`] using the standard clock.
    pub fn from_limit(limit: GateLimit) -> Self {
        Self::with_clock(limit, StdClock::default())
    }
}

impl<C: Clock> RateGate<C> {
    /// Creates a gate with a custom clock.
    ///
    /// The first window starts at the clock's current time.
    pub fn with_clock(limit: GateLimit, clock: C) -> Self {
        Self {
            window: Mutex::new(Window::new(clock.now())),
            tokens: TokenPool::new(limit.max_concurrent),
            clock,
            limit,
        }
    }

    /// Admits `task`, runs it with `arg` on the calling thread and returns its
    /// result.
    ///
    /// Blocks while the window is over its burst threshold and while no token
    /// is free. Neither wait has a timeout. A panic in `task` propagates to the
    /// caller after its token has been returned to the pool.
    pub fn execute<I, O, F>(&self, task: F, arg: I) -> O
    where
        F: FnOnce(I) -> O,
    {
        self.admit();
        let _permit = self.acquire_token();
        task(arg)
    }

    /// Runs `task` with `arg` only if the gate can admit it without waiting.
    ///
    /// Returns [`GateError::RateLimited`] when the window is over its burst
    /// threshold and [`GateError::Saturated`] when no token is free. A refused
    /// call is not counted against the window.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use portcullis::{GateError, RateGate};
    ///
    /// let gate = RateGate::new(Duration::ZERO, Duration::from_secs(60), 1, 1);
    /// assert_eq!(Ok(2), gate.try_execute(|x: u32| x + 1, 1));
    /// match gate.try_execute(|x: u32| x + 1, 2) {
    ///     Err(GateError::RateLimited { retry_after }) => {
    ///         assert!(retry_after <= Duration::from_secs(60));
    ///     }
    ///     other => panic!("unexpected {other:?}"),
    /// }
    /// ```
    pub fn try_execute<I, O, F>(&self, task: F, arg: I) -> Result<O, GateError>
    where
        F: FnOnce(I) -> O,
    {
        let _permit = {
            let mut window = self.window.lock();
            let now = self.clock.now();
            match window.check(now, self.limit.window, self.limit.burst_threshold) {
                Admission::Delayed(retry_after) if !retry_after.is_zero() => {
                    return Err(GateError::RateLimited { retry_after });
                }
                admission => {
                    let permit = self.tokens.try_acquire().ok_or(GateError::Saturated {
                        max_concurrent: self.limit.max_concurrent,
                    })?;
                    if admission == Admission::Immediate {
                        window.record();
                    }
                    permit
                }
            }
        };
        Ok(task(arg))
    }

    /// Returns the gate configuration.
    pub fn limit(&self) -> &GateLimit {
        &self.limit
    }

    /// Returns the number of tokens not held by running calls.
    pub fn available_tokens(&self) -> usize {
        self.tokens.available()
    }

    /// Returns how many calls the current window admitted without delay.
    ///
    /// An expired window is only reset by the next call, until then this still
    /// reports the old count.
    pub fn admitted_in_window(&self) -> usize {
        self.window.lock().admitted()
    }

    /// Window check and admission decision. Holds the window lock for the
    /// whole delay.
    fn admit(&self) {
        let mut window = self.window.lock();
        let now = self.clock.now();
        match window.admit(now, self.limit.window, self.limit.burst_threshold) {
            Admission::Immediate => {
                trace!(admitted = window.admitted(), "admitted immediately");
            }
            Admission::Delayed(nap) if !nap.is_zero() => {
                debug!(
                    ?nap,
                    window_start = window.start(),
                    burst_threshold = self.limit.burst_threshold,
                    "burst threshold reached, waiting for the window to end"
                );
                self.clock.sleep(nap);
            }
            Admission::Delayed(_) => {}
        }
    }

    fn acquire_token(&self) -> Permit<'_> {
        if let Some(permit) = self.tokens.try_acquire() {
            return permit;
        }
        trace!(
            max_concurrent = self.limit.max_concurrent,
            "waiting for a free token"
        );
        self.tokens.acquire()
    }
}

impl<C> std::fmt::Debug for RateGate<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("limit", &self.limit)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
