use std::fmt::{Debug, Formatter};

use parking_lot::{Condvar, Mutex};

/// A bounded pool of interchangeable tokens, initially full.
///
/// Acquiring a token returns a [`Permit`] which puts the token back into the
/// pool when dropped, including while unwinding from a panic. The number of
/// tokens out of the pool therefore never exceeds the capacity and every
/// token comes back once its permit is gone.
///
/// # Examples
///
/// ```rust
/// use portcullis::TokenPool;
///
/// let pool = TokenPool::new(2);
/// let first = pool.acquire();
/// let _second = pool.acquire();
/// assert!(pool.try_acquire().is_none());
/// drop(first);
/// assert_eq!(1, pool.available());
/// ```
pub struct TokenPool {
    available: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

/// A token taken out of a [`TokenPool`]. Returned to the pool on drop.
#[must_use = "the token goes back to the pool as soon as the permit is dropped"]
pub struct Permit<'a> {
    pool: &'a TokenPool,
}

impl TokenPool {
    /// Creates a pool holding `capacity` tokens.
    pub fn new(capacity: usize) -> Self {
        Self {
            available: Mutex::new(capacity),
            released: Condvar::new(),
            capacity,
        }
    }

    /// Takes a token, blocking the calling thread until one is available.
    ///
    /// There is no timeout. A pool with zero capacity blocks forever.
    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self.available.lock();
        while *available == 0 {
            self.released.wait(&mut available);
        }
        *available -= 1;
        Permit { pool: self }
    }

    /// Takes a token if one is available right now.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut available = self.available.lock();
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(Permit { pool: self })
    }

    /// Returns the number of tokens currently in the pool.
    pub fn available(&self) -> usize {
        *self.available.lock()
    }

    /// Returns the total number of tokens.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self) {
        let mut available = self.available.lock();
        *available += 1;
        debug_assert!(*available <= self.capacity);
        drop(available);
        self.released.notify_one();
    }
}

impl Debug for TokenPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPool")
            .field("available", &self.available())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}

impl Debug for Permit<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Permit")
    }
}
