/*!
The [`Rng`] collaborator.

Span ids are the only consumer of randomness in the crate. The trait is
object safe so sinks and loggers can hold any source behind a box.
*/

use std::sync::atomic::{AtomicI64, Ordering};

use rand::Rng as _;

/**
A non-cryptographic source of randomness.
*/
pub trait Rng {
    /**
    Get a uniformly random non-negative 63-bit value.
    */
    fn next_i63(&self) -> i64;
}

impl<'a, T: Rng + ?Sized> Rng for &'a T {
    fn next_i63(&self) -> i64 {
        (**self).next_i63()
    }
}

impl<T: Rng + ?Sized> Rng for Box<T> {
    fn next_i63(&self) -> i64 {
        (**self).next_i63()
    }
}

impl<T: Rng + ?Sized> Rng for std::sync::Arc<T> {
    fn next_i63(&self) -> i64 {
        (**self).next_i63()
    }
}

/**
An [`Rng`] based on the [`rand`] library's per-thread generator.
*/
#[derive(Default, Debug, Clone, Copy)]
pub struct RandRng {}

impl RandRng {
    pub const fn new() -> Self {
        RandRng {}
    }
}

impl Rng for RandRng {
    fn next_i63(&self) -> i64 {
        (rand::thread_rng().gen::<u64>() >> 1) as i64
    }
}

/**
A deterministic counting [`Rng`] for tests and reproducible traces.
*/
#[derive(Debug, Default)]
pub struct SeqRng(AtomicI64);

impl SeqRng {
    /**
    A sequence whose first draw is `start`.
    */
    pub const fn new(start: i64) -> Self {
        SeqRng(AtomicI64::new(start))
    }
}

impl Rng for SeqRng {
    fn next_i63(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed) & i64::MAX
    }
}
