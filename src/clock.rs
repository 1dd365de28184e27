/*!
The [`Clock`] collaborator.

Everything in the crate that needs the current time reads it through this
trait, which keeps encoder output and file rotation reproducible in tests.
*/

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::UNIX_EPOCH;

/**
A source of the current time in nanoseconds since the Unix epoch.
*/
pub trait Clock {
    fn now_ns(&self) -> i64;
}

impl<'a, T: Clock + ?Sized> Clock for &'a T {
    fn now_ns(&self) -> i64 {
        (**self).now_ns()
    }
}

impl<T: Clock + ?Sized> Clock for Box<T> {
    fn now_ns(&self) -> i64 {
        (**self).now_ns()
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now_ns(&self) -> i64 {
        (**self).now_ns()
    }
}

/**
A [`Clock`] based on the standard library's [`std::time::SystemTime`].
*/
#[derive(Default, Debug, Clone, Copy)]
pub struct SystemClock {}

impl SystemClock {
    pub const fn new() -> Self {
        SystemClock {}
    }
}

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        UNIX_EPOCH
            .elapsed()
            .map(|dur| dur.as_nanos().min(i64::MAX as u128) as i64)
            .unwrap_or_default()
    }
}

/**
A [`Clock`] that only moves when told to.
*/
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub const fn new(now_ns: i64) -> Self {
        ManualClock(AtomicI64::new(now_ns))
    }

    pub fn set(&self, now_ns: i64) {
        self.0.store(now_ns, Ordering::Relaxed);
    }

    pub fn advance(&self, by_ns: i64) {
        self.0.fetch_add(by_ns, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(100);

        assert_eq!(clock.now_ns(), 100);

        clock.advance(50);
        assert_eq!(clock.now_ns(), 150);

        clock.set(7);
        assert_eq!(clock.now_ns(), 7);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock::new();

        let a = clock.now_ns();
        let b = clock.now_ns();

        assert!(a > 0);
        assert!(b >= a);
    }
}
