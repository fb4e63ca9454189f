//! Gating for async callers.
//!
//! [`AsyncRateGate`] has the same admission rules as [`RateGate`](crate::RateGate)
//! but waits on the tokio timer and a tokio semaphore instead of blocking the
//! thread.
mod gate;

pub use gate::AsyncRateGate;
