#![doc = include_str!("../README.md")]
//!
//! # Core Components
//!
//! - [`RateGate`] - Blocking call gate with window throttling and a token pool
//! - [`GateLimit`] - Window size, burst threshold and concurrency configuration
//! - [`TokenPool`] - Bounded pool of tokens handed out as drop-guarded permits
//! - [`Clock`] trait and implementations for time sources
//! - `futures::AsyncRateGate` - The same gate for async callers (feature `async`)
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use portcullis::{GateLimit, RateGate};
//!
//! // 10 calls per second without delay, at most 2 running at the same time
//! let gate = RateGate::from_limit(GateLimit::new(Duration::from_secs(1), 10, 2));
//!
//! let len = gate.execute(|s: &str| s.len(), "downstream request");
//! assert_eq!(18, len);
//! assert_eq!(2, gate.available_tokens());
//! ```

mod clock;
mod error;
#[cfg(feature = "async")]
pub mod futures;
mod gate;
mod limit;
mod pool;
mod window;

#[cfg(feature = "tokio")]
pub use clock::TokioClock;
pub use clock::{Clock, ManualClock, StdClock};
#[cfg(feature = "quanta")]
pub use clock::{FastClock, QuantaClock};
pub use error::GateError;
pub use gate::RateGate;
pub use limit::GateLimit;
pub use pool::{Permit, TokenPool};
