//! System tick source
//!
//! A 10 kHz view of the embassy time driver.

use core::cell::Cell;

use embassy_time::{block_for, Duration, Instant};

use crate::config::TICK_HZ;
use crate::timer::TickSource;

const MICROS_PER_TICK: u64 = 1_000_000 / TICK_HZ as u64;

/// Tick counter backed by the embassy time driver
///
/// Counts ticks since an origin instant. Restarting moves the origin forward
/// by whole ticks so no partial tick is lost.
pub struct SystemTicks {
    origin: Cell<Instant>,
}

impl SystemTicks {
    /// Start counting from now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Cell::new(Instant::now()),
        }
    }

    fn ticks_since_origin(&self) -> u64 {
        Instant::now().duration_since(self.origin.get()).as_micros() / MICROS_PER_TICK
    }
}

impl Default for SystemTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SystemTicks {
    #[allow(clippy::cast_possible_truncation)]
    fn count(&self) -> u32 {
        self.ticks_since_origin() as u32
    }

    fn sleep(&self, ticks: u32) {
        block_for(Duration::from_micros(u64::from(ticks) * MICROS_PER_TICK));
    }

    fn restart(&self) {
        let whole = Duration::from_micros(self.ticks_since_origin() * MICROS_PER_TICK);
        self.origin.set(self.origin.get() + whole);
    }
}

impl defmt::Format for SystemTicks {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "SystemTicks({})", self.count());
    }
}
