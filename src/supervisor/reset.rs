//! Reset line descriptors
//!
//! A reset output of either polarity, plus how readiness of the block behind
//! it is judged once released: not at all, by a settle timer started on
//! release, or by a "done" input of either polarity.

use embedded_hal::digital::{InputPin, OutputPin};

use super::rail::{Polarity, Unused};
use crate::timer::{elapsed, TickSource};

/// Supervisor view of a reset line
pub trait Reset {
    /// Human readable name for logging
    fn name(&self) -> &'static str;

    /// Hold the block in reset
    ///
    /// Idempotent, and safe to call while the block is unpowered.
    fn assert(&mut self);

    /// Release the block from reset
    fn deassert(&mut self);

    /// True if the block behind this reset is up
    fn is_ready(&mut self) -> bool {
        true
    }
}

/// How readiness is determined
pub enum Readiness<'t, D, T> {
    /// Ready as soon as it is asked
    Immediate,
    /// Ready once `delay_ticks` have strictly passed since release
    Delay {
        /// Shared tick source
        timer: &'t T,
        /// Settle time after release
        delay_ticks: u16,
        /// Tick of the most recent release, if released
        released_at: Option<u32>,
        /// Latched once the delay has passed
        done: bool,
    },
    /// Ready while a "done" input is asserted
    DonePin {
        /// The done input
        pin: D,
        /// Done polarity
        polarity: Polarity,
    },
}

/// A reset with no readiness feedback
pub type SimpleReset<'t, R> = ResetDescriptor<'t, R, Unused, Unused>;

/// A reset that is ready a fixed time after release
pub type DelayedReset<'t, R, T> = ResetDescriptor<'t, R, Unused, T>;

/// A reset with a done input
pub type DoneReset<'t, R, D> = ResetDescriptor<'t, R, D, Unused>;

impl TickSource for Unused {
    fn count(&self) -> u32 {
        match *self {}
    }

    fn sleep(&self, _ticks: u32) {
        match *self {}
    }

    fn restart(&self) {
        match *self {}
    }
}

/// A reset line bound to its pins
pub struct ResetDescriptor<'t, R, D, T> {
    name: &'static str,
    pin: R,
    polarity: Polarity,
    readiness: Readiness<'t, D, T>,
    asserted: bool,
}

impl<'t, R: OutputPin> ResetDescriptor<'t, R, Unused, Unused> {
    /// Reset with no readiness feedback
    pub fn new(name: &'static str, pin: R, polarity: Polarity) -> Self {
        Self::build(name, pin, polarity, Readiness::Immediate)
    }
}

impl<'t, R: OutputPin, T: TickSource> ResetDescriptor<'t, R, Unused, T> {
    /// Reset considered ready `delay_ticks` after release
    pub fn with_delay(name: &'static str, pin: R, polarity: Polarity, timer: &'t T, delay_ticks: u16) -> Self {
        let readiness = Readiness::Delay {
            timer,
            delay_ticks,
            released_at: None,
            done: false,
        };
        Self::build(name, pin, polarity, readiness)
    }
}

impl<'t, R: OutputPin, D: InputPin> ResetDescriptor<'t, R, D, Unused> {
    /// Reset with a done input of the given polarity
    pub fn with_done(name: &'static str, pin: R, polarity: Polarity, done: D, done_polarity: Polarity) -> Self {
        let readiness = Readiness::DonePin {
            pin: done,
            polarity: done_polarity,
        };
        Self::build(name, pin, polarity, readiness)
    }
}

impl<'t, R: OutputPin, D: InputPin, T: TickSource> ResetDescriptor<'t, R, D, T> {
    /// Reset from explicit parts
    ///
    /// The line is driven to its asserted level without logging, since this
    /// may run before the log is up.
    pub fn build(name: &'static str, pin: R, polarity: Polarity, readiness: Readiness<'t, D, T>) -> Self {
        let mut reset = Self {
            name,
            pin,
            polarity,
            readiness,
            asserted: true,
        };
        // A failed write shows up on the first assert or deassert
        let _ = reset.polarity.drive(&mut reset.pin, true);
        reset
    }

    /// True if the line is currently driven to its asserted level
    #[must_use]
    pub const fn is_asserted(&self) -> bool {
        self.asserted
    }
}

impl<R: OutputPin, D: InputPin, T: TickSource> Reset for ResetDescriptor<'_, R, D, T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn assert(&mut self) {
        debug!("Asserting {} reset", self.name);
        if self.polarity.drive(&mut self.pin, true).is_err() {
            warn!("Reset {} pin error while asserting", self.name);
        }
        self.asserted = true;
        if let Readiness::Delay {
            released_at, done, ..
        } = &mut self.readiness
        {
            *released_at = None;
            *done = false;
        }
    }

    fn deassert(&mut self) {
        debug!("Releasing {} reset", self.name);
        if self.polarity.drive(&mut self.pin, false).is_err() {
            warn!("Reset {} pin error while releasing", self.name);
        }
        self.asserted = false;
        if let Readiness::Delay {
            timer,
            released_at,
            done,
            ..
        } = &mut self.readiness
        {
            *released_at = Some(timer.count());
            *done = false;
        }
    }

    fn is_ready(&mut self) -> bool {
        match &mut self.readiness {
            Readiness::Immediate => true,
            Readiness::Delay {
                timer,
                delay_ticks,
                released_at,
                done,
            } => {
                if let Some(start) = *released_at {
                    if elapsed(start, timer.count()) > u32::from(*delay_ticks) {
                        *done = true;
                    }
                }
                *done
            }
            Readiness::DonePin { pin, polarity } => polarity.sense(pin),
        }
    }
}
