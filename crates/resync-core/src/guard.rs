//! Single-flight latch.
//!
//! A [`SingleFlight`] lets at most one caller into a section at a time;
//! everyone else gets `None` back immediately instead of waiting. The
//! returned [`FlightGuard`] reopens the latch when dropped, including on
//! early return or panic unwinding.

use std::sync::atomic::{AtomicBool, Ordering};

/// Non-blocking mutual exclusion for long-running async work.
#[derive(Debug, Default)]
pub struct SingleFlight {
    active: AtomicBool,
}

impl SingleFlight {
    /// Create an open latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the latch, or return `None` if it is already closed.
    ///
    /// # Example
    ///
    /// ```
    /// use resync_core::guard::SingleFlight;
    ///
    /// let latch = SingleFlight::new();
    /// let guard = latch.try_begin().unwrap();
    /// assert!(latch.try_begin().is_none());
    /// drop(guard);
    /// assert!(latch.try_begin().is_some());
    /// ```
    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { latch: self })
    }

    /// Whether a flight is in progress.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Reopens its [`SingleFlight`] on drop.
#[must_use = "the latch reopens as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FlightGuard<'a> {
    latch: &'a SingleFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.latch.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_entry_rejected() {
        let latch = SingleFlight::new();
        let _guard = latch.try_begin().unwrap();
        assert!(latch.is_active());
        assert!(latch.try_begin().is_none());
    }

    #[test]
    fn test_reopens_after_panic() {
        let latch = SingleFlight::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = latch.try_begin().unwrap();
            panic!("executor blew up");
        }));
        assert!(result.is_err());
        assert!(!latch.is_active());
    }
}
