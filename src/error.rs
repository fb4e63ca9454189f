use std::time::Duration;

/// Why a non-blocking `try_execute` refused to run a call.
///
/// The blocking `execute` never fails. It waits out the same conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The burst threshold of the current window is reached.
    #[error("rate limited; window rolls over in {retry_after:?}")]
    RateLimited {
        /// Time left until the current window ends.
        retry_after: Duration,
    },
    /// All tokens are held by running calls.
    #[error("no free token; {max_concurrent} calls already running")]
    Saturated { max_concurrent: usize },
}

impl GateError {
    /// The suggested duration to wait before retrying, if the gate knows it.
    ///
    /// A saturated gate frees up whenever a running call finishes, so there is
    /// no estimate for it.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GateError::RateLimited { retry_after } => Some(*retry_after),
            GateError::Saturated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_rate_limited() {
        let err = GateError::RateLimited {
            retry_after: Duration::from_millis(750),
        };
        assert_eq!("rate limited; window rolls over in 750ms", err.to_string());
        assert_eq!(Some(Duration::from_millis(750)), err.retry_after());
    }

    #[test]
    fn display_saturated() {
        let err = GateError::Saturated { max_concurrent: 4 };
        assert_eq!("no free token; 4 calls already running", err.to_string());
        assert_eq!(None, err.retry_after());
    }
}
