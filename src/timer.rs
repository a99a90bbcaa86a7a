//! Monotonic Tick Timer
//!
//! The free-running 10 kHz counter every delay, timeout and elapsed-time
//! computation is built on. Hardware backings live in [`crate::hal`]; tests
//! provide a manual counter.

/// A free-running tick counter
///
/// Methods take `&self` so a single timer can be shared by every rail,
/// reset and task on the board.
pub trait TickSource {
    /// Current tick count (wraps at an implementation-defined modulus)
    fn count(&self) -> u32;

    /// Busy-wait for `ticks` ticks
    fn sleep(&self, ticks: u32);

    /// Restart counting from zero
    ///
    /// Called by the scheduler when the count passes its wrap ceiling.
    fn restart(&self);
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn count(&self) -> u32 {
        (**self).count()
    }

    fn sleep(&self, ticks: u32) {
        (**self).sleep(ticks);
    }

    fn restart(&self) {
        (**self).restart();
    }
}

/// Ticks elapsed from `start` to `now`, tolerant of a single wraparound
#[must_use]
pub const fn elapsed(start: u32, now: u32) -> u32 {
    now.wrapping_sub(start)
}

/// True if `now` is at or past `target`
///
/// Uses the signed distance between the two counts, so it stays correct
/// across a wrap as long as they are less than half the counter range apart.
#[must_use]
pub const fn has_reached(now: u32, target: u32) -> bool {
    now.wrapping_sub(target) < 0x8000_0000
}

/// Format a tick delta as whole milliseconds and tenths
#[must_use]
pub const fn ticks_to_ms_tenths(ticks: u32) -> (u32, u32) {
    (ticks / 10, ticks % 10)
}
