use std::time::Duration;

use likely_stable::likely;
use tracing::debug;

/// Outcome of an admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// The call fits under the burst threshold of the current window.
    Immediate,
    /// The threshold is reached. The call may proceed once the window edge is
    /// reached, which is the carried duration from now. Only a zero-sized
    /// window carries a zero delay.
    Delayed(Duration),
}

/// Counting window of a gate.
///
/// `start` is the time (in clock seconds) the current window began and
/// `admitted` the number of calls it let through without delay. Both are
/// only ever reset together. All operations take the current time explicitly
/// so the caller decides how it is read and under which lock.
#[derive(Debug, Clone)]
pub(crate) struct Window {
    start: f64,
    admitted: usize,
}

impl Window {
    pub fn new(start: f64) -> Self {
        Self { start, admitted: 0 }
    }

    /// Rolls the window if it expired, decides the admission of a call at
    /// `now` and counts it when it is immediate. A delayed call is not counted.
    pub fn admit(&mut self, now: f64, size: Duration, burst_threshold: usize) -> Admission {
        let admission = self.check(now, size, burst_threshold);
        if admission == Admission::Immediate {
            self.record();
        }
        admission
    }

    /// Same as [`admit`](Self::admit) without counting the call. The caller
    /// [`record`](Self::record)s it once the call is actually let through.
    pub fn check(&mut self, now: f64, size: Duration, burst_threshold: usize) -> Admission {
        self.roll(now, size);
        self.decide(now, size, burst_threshold)
    }

    /// Counts one call admitted without delay.
    pub fn record(&mut self) {
        self.admitted += 1;
    }

    pub fn admitted(&self) -> usize {
        self.admitted
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    /// Starts a new window at `now` once nothing of the current one remains.
    fn roll(&mut self, now: f64, size: Duration) -> bool {
        if !self.remaining(now, size).is_zero() {
            return false;
        }
        debug!(window_start = now, "counting window reset");
        self.start = now;
        self.admitted = 0;
        true
    }

    fn decide(&self, now: f64, size: Duration, burst_threshold: usize) -> Admission {
        if likely(self.admitted < burst_threshold) {
            Admission::Immediate
        } else {
            Admission::Delayed(self.remaining(now, size))
        }
    }

    /// Time left in the current window at `now`.
    ///
    /// Rolling and delaying both go through here, so a window that is not
    /// rolled over always has a non-zero remainder.
    fn remaining(&self, now: f64, size: Duration) -> Duration {
        let elapsed = now - self.start;
        if elapsed.is_nan() || elapsed <= 0.0 {
            return size;
        }
        let secs = elapsed.trunc();
        if secs >= u64::MAX as f64 {
            // longer ago than any window
            return Duration::ZERO;
        }
        // rounded to the nanosecond so float noise cannot keep an elapsed
        // window open
        let nanos = ((elapsed - secs) * 1e9).round() as u64;
        let elapsed = Duration::from_secs(secs as u64)
            .saturating_add(Duration::from_nanos(nanos));
        size.saturating_sub(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn admits_up_to_threshold() {
        let mut window = Window::new(0.0);
        assert_eq!(Admission::Immediate, window.admit(0.0, SECOND, 2));
        assert_eq!(Admission::Immediate, window.admit(0.25, SECOND, 2));
        assert_eq!(2, window.admitted());
        assert_eq!(
            Admission::Delayed(Duration::from_millis(500)),
            window.admit(0.5, SECOND, 2)
        );
        // delayed calls are not counted
        assert_eq!(2, window.admitted());
        assert_eq!(0.0, window.start());
    }

    #[test]
    fn resets_once_expired() {
        let mut window = Window::new(0.0);
        window.admit(0.0, SECOND, 1);
        assert!(!window.roll(0.5, SECOND));
        // expired long ago still resets to the current time
        assert_eq!(Admission::Immediate, window.admit(7.5, SECOND, 1));
        assert_eq!(7.5, window.start());
        assert_eq!(1, window.admitted());
    }

    #[test]
    fn reset_on_exact_edge() {
        let mut window = Window::new(0.0);
        window.admit(0.0, SECOND, 1);
        assert!(window.roll(1.0, SECOND));
        assert_eq!(0, window.admitted());
    }

    #[test]
    fn reset_when_float_edge_falls_short() {
        let window_size = Duration::from_millis(200);
        let mut window = Window::new(0.1);
        assert_eq!(Admission::Immediate, window.admit(0.1, window_size, 1));
        // 0.3 - 0.1 is a hair under 0.2 in f64, still the edge of the window
        assert_eq!(Admission::Immediate, window.admit(0.3, window_size, 1));
        assert_eq!(0.3, window.start());
        assert_eq!(
            Admission::Delayed(window_size),
            window.admit(0.3, window_size, 1)
        );
    }

    #[test]
    fn check_does_not_record() {
        let mut window = Window::new(0.0);
        assert_eq!(Admission::Immediate, window.check(0.0, SECOND, 1));
        assert_eq!(0, window.admitted());
        window.record();
        assert_eq!(
            Admission::Delayed(Duration::from_millis(250)),
            window.check(0.75, SECOND, 1)
        );
    }

    #[test]
    fn zero_threshold_always_delays() {
        let mut window = Window::new(0.0);
        assert_eq!(Admission::Delayed(SECOND), window.admit(0.0, SECOND, 0));
        assert_eq!(
            Admission::Delayed(Duration::from_millis(250)),
            window.admit(0.75, SECOND, 0)
        );
        assert_eq!(0, window.admitted());
    }

    #[test]
    fn zero_window_never_waits() {
        let mut window = Window::new(0.0);
        assert_eq!(
            Admission::Delayed(Duration::ZERO),
            window.admit(0.0, Duration::ZERO, 0)
        );
        assert_eq!(Admission::Immediate, window.admit(0.0, Duration::ZERO, 1));
        // every call lands in a fresh window
        assert_eq!(Admission::Immediate, window.admit(0.0, Duration::ZERO, 1));
    }

    #[test]
    fn unbounded_window() {
        let mut window = Window::new(0.0);
        assert_eq!(Admission::Immediate, window.admit(0.0, Duration::MAX, 1));
        assert_eq!(
            Admission::Delayed(Duration::MAX - Duration::from_secs(5)),
            window.admit(5.0, Duration::MAX, 1)
        );
        // further out than a Duration can hold
        assert!(window.roll(1e30, Duration::MAX));
    }

    #[test]
    fn clock_behind_start_waits_full_window() {
        let mut window = Window::new(10.0);
        assert_eq!(Admission::Delayed(SECOND), window.admit(9.0, SECOND, 0));
    }
}
