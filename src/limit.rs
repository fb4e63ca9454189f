use std::time::Duration;

/// Configuration of a gate: how many calls a window admits without delay and
/// how many admitted calls may run at the same time.
///
/// Values are taken as-is. A zero burst threshold sends every call down the
/// delay path and a zero `max_concurrent` makes the blocking `execute` wait
/// forever.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use portcullis::GateLimit;
///
/// // 20 calls per second without delay, at most 4 running at once
/// let limit = GateLimit::new(Duration::from_secs(1), 20, 4);
/// assert_eq!(20, limit.burst_threshold());
///
/// let limit = limit.with_window(Duration::from_millis(500)).with_max_concurrent(8);
/// assert_eq!(Duration::from_millis(500), limit.window());
/// assert_eq!(8, limit.max_concurrent());
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct GateLimit {
    pub(crate) window: Duration,
    pub(crate) burst_threshold: usize,
    pub(crate) max_concurrent: usize,
    pub(crate) limit: Duration,
}

impl std::fmt::Debug for GateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GateLimit(window={:?}, burst={}, max_concurrent={})",
            self.window, self.burst_threshold, self.max_concurrent
        )
    }
}

impl GateLimit {
    /// Creates a gate configuration.
    ///
    /// # Arguments
    ///
    /// * `window` - Length of the counting window
    /// * `burst_threshold` - Calls per window admitted without delay
    /// * `max_concurrent` - Size of the token pool
    pub const fn new(window: Duration, burst_threshold: usize, max_concurrent: usize) -> Self {
        Self {
            window,
            burst_threshold,
            max_concurrent,
            limit: Duration::ZERO,
        }
    }

    /// Sets the rate-limit duration.
    ///
    /// The value is kept for callers that configure it, admission never
    /// consults it.
    pub const fn with_limit(mut self, limit: Duration) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the length of the counting window.
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets how many calls per window are admitted without delay.
    pub const fn with_burst_threshold(mut self, burst_threshold: usize) -> Self {
        self.burst_threshold = burst_threshold;
        self
    }

    /// Sets how many admitted calls may run concurrently.
    pub const fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Returns the length of the counting window.
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Returns the number of calls per window admitted without delay.
    pub const fn burst_threshold(&self) -> usize {
        self.burst_threshold
    }

    /// Returns the size of the token pool.
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Returns the configured rate-limit duration.
    pub const fn limit(&self) -> Duration {
        self.limit
    }
}
