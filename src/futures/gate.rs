use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::{debug, trace};

use crate::error::GateError;
use crate::window::{Admission, Window};
use crate::{Clock, GateLimit, TokioClock};

/// Async counterpart of [`RateGate`](crate::RateGate).
///
/// The window lock is a tokio mutex held across the wait for the window to
/// end, so only one task at a time sleeps out a window edge. Tokens come from
/// a tokio [`Semaphore`] with `max_concurrent` permits.
///
/// Dropping a pending `execute` future gives back whatever it holds: the
/// window lock while it is waiting, its token while the task runs.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use portcullis::futures::AsyncRateGate;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gate = AsyncRateGate::new(Duration::ZERO, Duration::from_millis(100), 5, 2);
/// let doubled = gate.execute(|x: u32| async move { x * 2 }, 21).await;
/// assert_eq!(42, doubled);
/// # }
/// ```
pub struct AsyncRateGate<C = TokioClock> {
    window: Mutex<Window>,
    tokens: Semaphore,
    clock: C,
    limit: GateLimit,
}

impl AsyncRateGate<TokioClock> {
    /// Creates a gate using the tokio clock.
    ///
    /// With tokio's time paused, create the gate inside the runtime so the
    /// first window starts on the paused clock.
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

    /// Creates a gate from a [`GateLimit`] using the tokio clock.
    pub fn from_limit(limit: GateLimit) -> Self {
        Self::with_clock(limit, TokioClock::default())
    }
}

impl<C: Clock> AsyncRateGate<C> {
    /// Creates a gate with a custom clock.
    ///
    /// `max_concurrent` is capped at [`Semaphore::MAX_PERMITS`].
    pub fn with_clock(limit: GateLimit, clock: C) -> Self {
        Self {
            window: Mutex::new(Window::new(clock.now())),
            tokens: Semaphore::new(limit.max_concurrent.min(Semaphore::MAX_PERMITS)),
            clock,
            limit,
        }
    }

    /// Admits `task`, awaits the future it returns for `arg` and yields its
    /// output.
    ///
    /// Waits while the window is over its burst threshold and while no token
    /// is free, without timeouts.
    pub async fn execute<I, O, F, Fut>(&self, task: F, arg: I) -> O
    where
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = O>,
    {
        self.admit().await;
        let _permit = self.acquire_token().await;
        task(arg).await
    }

    /// Runs `task` with `arg` only if the gate can admit it without waiting.
    ///
    /// Waiting for the window lock itself is not considered waiting; the lock
    /// is only held long by a caller sleeping out a window edge, and in that
    /// case the window is over its threshold anyway.
    pub async fn try_execute<I, O, F, Fut>(&self, task: F, arg: I) -> Result<O, GateError>
    where
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = O>,
    {
        let _permit = {
            let mut window = self.window.lock().await;
            let now = self.clock.now();
            match window.check(now, self.limit.window, self.limit.burst_threshold) {
                Admission::Delayed(retry_after) if !retry_after.is_zero() => {
                    return Err(GateError::RateLimited { retry_after });
                }
                admission => {
                    let permit = self.tokens.try_acquire().map_err(|_| GateError::Saturated {
                        max_concurrent: self.limit.max_concurrent,
                    })?;
                    if admission == Admission::Immediate {
                        window.record();
                    }
                    permit
                }
            }
        };
        Ok(task(arg).await)
    }

    /// Returns the gate configuration.
    pub fn limit(&self) -> &GateLimit {
        &self.limit
    }

    /// Returns the number of tokens not held by running calls.
    pub fn available_tokens(&self) -> usize {
        self.tokens.available_permits()
    }

    /// Returns how many calls the current window admitted without delay.
    pub async fn admitted_in_window(&self) -> usize {
        self.window.lock().await.admitted()
    }

    async fn admit(&self) {
        let mut window = self.window.lock().await;
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
                tokio::time::sleep(nap).await;
            }
            Admission::Delayed(_) => {}
        }
    }

    async fn acquire_token(&self) -> SemaphorePermit<'_> {
        if let Ok(permit) = self.tokens.try_acquire() {
            return permit;
        }
        trace!(
            max_concurrent = self.limit.max_concurrent,
            "waiting for a free token"
        );
        self.tokens
            .acquire()
            .await
            .expect("token semaphore is never closed")
    }
}

impl<C> std::fmt::Debug for AsyncRateGate<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncRateGate")
            .field("limit", &self.limit)
            .field("available_tokens", &self.tokens.available_permits())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::task::JoinSet;
    use tokio::time::Instant;

    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn third_call_waits_for_window_edge() {
        let gate = AsyncRateGate::new(Duration::ZERO, SECOND, 2, 1);
        let started = Instant::now();
        assert_eq!(1, gate.execute(|x| async move { x }, 1).await);
        assert_eq!(2, gate.execute(|x| async move { x }, 2).await);
        assert_eq!(Duration::ZERO, started.elapsed());
        assert_eq!(3, gate.execute(|x| async move { x }, 3).await);
        let elapsed = started.elapsed();
        assert!(elapsed >= SECOND, "elapsed {elapsed:?}");
        assert!(elapsed < SECOND + Duration::from_millis(10), "elapsed {elapsed:?}");
        assert_eq!(2, gate.admitted_in_window().await);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_idle_period() {
        let gate = AsyncRateGate::new(Duration::ZERO, SECOND, 1, 1);
        gate.execute(|_| async {}, ()).await;
        tokio::time::sleep(3 * SECOND).await;
        let started = Instant::now();
        gate.execute(|_| async {}, ()).await;
        assert_eq!(Duration::ZERO, started.elapsed());
        assert_eq!(1, gate.admitted_in_window().await);
    }

    #[tokio::test(start_paused = true)]
    async fn try_execute_refuses() {
        let gate = AsyncRateGate::new(Duration::ZERO, SECOND, 1, 1);
        assert_eq!(Ok(1), gate.try_execute(|x| async move { x }, 1).await);
        match gate.try_execute(|x| async move { x }, 2).await {
            Err(GateError::RateLimited { retry_after }) => assert!(retry_after <= SECOND),
            other => panic!("unexpected {other:?}"),
        }

        let gate = AsyncRateGate::new(Duration::ZERO, SECOND, 1, 0);
        assert_eq!(
            Err(GateError::Saturated { max_concurrent: 0 }),
            gate.try_execute(|x| async move { x }, 1).await
        );
        assert_eq!(0, gate.admitted_in_window().await);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_capped() {
        const MAX_CONCURRENT: usize = 2;
        let gate = Arc::new(AsyncRateGate::new(
            Duration::ZERO,
            SECOND,
            100,
            MAX_CONCURRENT,
        ));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();
        for i in 0..8usize {
            let gate = Arc::clone(&gate);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tasks.spawn(async move {
                gate.execute(
                    |x| async move {
                        let now_running = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now_running, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        x
                    },
                    i,
                )
                .await
            });
        }
        let mut outputs = Vec::new();
        while let Some(out) = tasks.join_next().await {
            outputs.push(out.unwrap());
        }
        outputs.sort_unstable();
        assert_eq!((0..8).collect::<Vec<_>>(), outputs);
        assert_eq!(MAX_CONCURRENT, peak.load(Ordering::SeqCst));
        assert_eq!(MAX_CONCURRENT, gate.available_tokens());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_call_releases_token() {
        let gate = AsyncRateGate::new(Duration::ZERO, SECOND, 10, 1);
        let pending = gate.execute(|_| std::future::pending::<()>(), ());
        // the task never finishes, give up on it after a while
        let timed_out = tokio::time::timeout(Duration::from_millis(50), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(1, gate.available_tokens());
        assert_eq!(5, gate.execute(|x| async move { x }, 5).await);
    }
}
