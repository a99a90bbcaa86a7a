//! Power rail descriptors
//!
//! One controllable supply output: an enable pin plus optional feedback.
//! The set of hardware variants is closed and chosen at construction time:
//!
//! - enable only, with a fixed settle delay
//! - enable + PGOOD pin, polled until good or a timeout
//! - enable + voltage sense (ADC), polled until inside a window or a timeout
//!
//! The supervisor only sees the [`Rail`] trait.

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use thiserror::Error;

use crate::timer::TickSource;

/// Rail bring-up failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RailError {
    /// Feedback never reported good within the timeout
    #[error("rail failed to come up")]
    NotGood,
    /// The enable pin could not be driven
    #[error("rail enable pin error")]
    Pin,
}

/// Supervisor view of a power rail
pub trait Rail {
    /// Human readable rail name for logging
    fn name(&self) -> &'static str;

    /// Turn the rail on, blocking until it is up or has failed
    ///
    /// # Errors
    ///
    /// [`RailError`] if the rail did not come up.
    fn turn_on(&mut self) -> Result<(), RailError>;

    /// Turn the rail off
    fn turn_off(&mut self);

    /// True if the rail is on and within tolerance
    fn is_power_good(&mut self) -> bool {
        true
    }

    /// Losing this rail is unsafe and triggers a panic shutdown
    fn is_critical(&self) -> bool {
        true
    }

    /// This rail is the board's input supply; losing it triggers an orderly power-off
    fn is_input_supply(&self) -> bool {
        false
    }
}

/// Signal polarity of a control or feedback pin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Asserted when the pin is high
    #[default]
    ActiveHigh,
    /// Asserted when the pin is low
    ActiveLow,
}

impl Polarity {
    /// Drive `pin` to the asserted (`true`) or idle (`false`) level
    pub fn drive<P: OutputPin>(self, pin: &mut P, asserted: bool) -> Result<(), P::Error> {
        if asserted == (self == Self::ActiveHigh) {
            pin.set_high()
        } else {
            pin.set_low()
        }
    }

    /// Read whether `pin` is at its asserted level (read errors count as deasserted)
    pub fn sense<P: InputPin>(self, pin: &mut P) -> bool {
        match self {
            Self::ActiveHigh => pin.is_high().unwrap_or(false),
            Self::ActiveLow => pin.is_low().unwrap_or(false),
        }
    }
}

/// A voltage measurement source, such as an averaged and scaled ADC channel
pub trait VoltageSensor {
    /// Current rail voltage in millivolts
    fn read_millivolts(&mut self) -> u32;
}

/// Acceptable voltage range for a sensed rail (inclusive)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoltageWindow {
    /// Minimum acceptable voltage in millivolts
    pub min_mv: u32,
    /// Maximum acceptable voltage in millivolts
    pub max_mv: u32,
}

impl VoltageWindow {
    /// Window of `nominal_mv` ± `tolerance_pct` percent
    #[must_use]
    pub const fn around(nominal_mv: u32, tolerance_pct: u32) -> Self {
        let delta = nominal_mv * tolerance_pct / 100;
        Self {
            min_mv: nominal_mv - delta,
            max_mv: nominal_mv + delta,
        }
    }

    /// Check whether a measurement is in range
    #[must_use]
    pub const fn contains(&self, mv: u32) -> bool {
        mv >= self.min_mv && mv <= self.max_mv
    }
}

/// Placeholder for feedback a rail variant does not have
///
/// Uninhabited, so it can never be constructed.
#[derive(Debug)]
pub enum Unused {}

impl ErrorType for Unused {
    type Error = core::convert::Infallible;
}

impl InputPin for Unused {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        match *self {}
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        match *self {}
    }
}

impl VoltageSensor for Unused {
    fn read_millivolts(&mut self) -> u32 {
        match *self {}
    }
}

/// Feedback available on a rail
pub enum RailFeedback<P, S> {
    /// No feedback; wait a fixed delay after enabling
    None {
        /// Delay in ticks after enabling
        settle_ticks: u16,
    },
    /// PGOOD pin
    PowerGood {
        /// The PGOOD input
        pin: P,
        /// PGOOD polarity
        polarity: Polarity,
        /// Ticks to wait for PGOOD after enabling
        timeout_ticks: u16,
    },
    /// Measured voltage
    Sensed {
        /// The voltage source
        sensor: S,
        /// Acceptable range
        window: VoltageWindow,
        /// Ticks to wait for the voltage after enabling
        timeout_ticks: u16,
    },
}

/// A rail with an enable pin and no feedback
pub type EnableRail<'t, E, T> = RailDescriptor<'t, E, Unused, Unused, T>;

/// A rail with an enable pin and a PGOOD pin
pub type PowerGoodRail<'t, E, P, T> = RailDescriptor<'t, E, P, Unused, T>;

/// A rail with an enable pin and a voltage sensor
pub type SensedRail<'t, E, S, T> = RailDescriptor<'t, E, Unused, S, T>;

/// A controllable power rail bound to its pins
pub struct RailDescriptor<'t, E, P, S, T> {
    name: &'static str,
    enable: E,
    enable_polarity: Polarity,
    feedback: RailFeedback<P, S>,
    timer: &'t T,
    critical: bool,
    input_supply: bool,
}

impl<'t, E: OutputPin, T: TickSource> RailDescriptor<'t, E, Unused, Unused, T> {
    /// Rail with an active-high enable and a fixed settle delay
    pub fn with_enable(name: &'static str, enable: E, timer: &'t T, settle_ticks: u16) -> Self {
        Self::build(name, enable, Polarity::ActiveHigh, RailFeedback::None { settle_ticks }, timer)
    }
}

impl<'t, E: OutputPin, P: InputPin, T: TickSource> RailDescriptor<'t, E, P, Unused, T> {
    /// Rail with an active-high enable and an active-high PGOOD
    pub fn with_power_good(
        name: &'static str,
        enable: E,
        pgood: P,
        timer: &'t T,
        timeout_ticks: u16,
    ) -> Self {
        let feedback = RailFeedback::PowerGood {
            pin: pgood,
            polarity: Polarity::ActiveHigh,
            timeout_ticks,
        };
        Self::build(name, enable, Polarity::ActiveHigh, feedback, timer)
    }

    /// Rail with an active-low enable and an active-high PGOOD
    pub fn with_active_low_enable(
        name: &'static str,
        enable: E,
        pgood: P,
        timer: &'t T,
        timeout_ticks: u16,
    ) -> Self {
        let feedback = RailFeedback::PowerGood {
            pin: pgood,
            polarity: Polarity::ActiveHigh,
            timeout_ticks,
        };
        Self::build(name, enable, Polarity::ActiveLow, feedback, timer)
    }
}

impl<'t, E: OutputPin, S: VoltageSensor, T: TickSource> RailDescriptor<'t, E, Unused, S, T> {
    /// Rail with an active-high enable whose output is measured
    pub fn with_sensor(
        name: &'static str,
        enable: E,
        sensor: S,
        window: VoltageWindow,
        timer: &'t T,
        timeout_ticks: u16,
    ) -> Self {
        let feedback = RailFeedback::Sensed {
            sensor,
            window,
            timeout_ticks,
        };
        Self::build(name, enable, Polarity::ActiveHigh, feedback, timer)
    }
}

impl<'t, E: OutputPin, P: InputPin, S: VoltageSensor, T: TickSource> RailDescriptor<'t, E, P, S, T> {
    /// Rail from explicit parts; the enable is driven to "off" immediately
    pub fn build(
        name: &'static str,
        enable: E,
        enable_polarity: Polarity,
        feedback: RailFeedback<P, S>,
        timer: &'t T,
    ) -> Self {
        let mut rail = Self {
            name,
            enable,
            enable_polarity,
            feedback,
            timer,
            critical: true,
            input_supply: false,
        };
        rail.drive_enable(false);
        rail
    }

    /// Use an active-low PGOOD (no effect on rails without a PGOOD pin)
    #[must_use]
    pub fn active_low_power_good(mut self) -> Self {
        if let RailFeedback::PowerGood { polarity, .. } = &mut self.feedback {
            *polarity = Polarity::ActiveLow;
        }
        self
    }

    /// Mark the rail as non-critical: losing it does not shut the board down
    #[must_use]
    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    /// Mark the rail as the board's input supply
    ///
    /// Input supply loss is handled by an orderly power-off rather than a
    /// panic, so this also clears the critical flag.
    #[must_use]
    pub fn input_supply(mut self) -> Self {
        self.input_supply = true;
        self.critical = false;
        self
    }

    /// Last measured voltage, for sensed rails
    pub fn voltage_mv(&mut self) -> Option<u32> {
        match &mut self.feedback {
            RailFeedback::Sensed { sensor, .. } => Some(sensor.read_millivolts()),
            _ => None,
        }
    }

    fn drive_enable(&mut self, on: bool) -> bool {
        self.enable_polarity.drive(&mut self.enable, on).is_ok()
    }

    fn sense_good(&mut self) -> bool {
        match &mut self.feedback {
            RailFeedback::None { .. } => true,
            RailFeedback::PowerGood { pin, polarity, .. } => polarity.sense(pin),
            RailFeedback::Sensed { sensor, window, .. } => window.contains(sensor.read_millivolts()),
        }
    }

    fn wait_good(&mut self, timeout_ticks: u16) -> Result<(), RailError> {
        for _ in 0..timeout_ticks {
            if self.sense_good() {
                return Ok(());
            }
            self.timer.sleep(1);
        }
        if self.sense_good() {
            return Ok(());
        }

        match &mut self.feedback {
            RailFeedback::Sensed { sensor, window, .. } => {
                error!(
                    "Rail {} failed to come up (measured {} mV, valid range [{}, {}])",
                    self.name,
                    sensor.read_millivolts(),
                    window.min_mv,
                    window.max_mv
                );
            }
            _ => error!("Rail {} failed to come up", self.name),
        }
        Err(RailError::NotGood)
    }
}

impl<E: OutputPin, P: InputPin, S: VoltageSensor, T: TickSource> Rail for RailDescriptor<'_, E, P, S, T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn turn_on(&mut self) -> Result<(), RailError> {
        info!("Turning on {}", self.name);
        if !self.drive_enable(true) {
            error!("Rail {} enable pin error", self.name);
            return Err(RailError::Pin);
        }

        match self.feedback {
            RailFeedback::None { settle_ticks } => {
                self.timer.sleep(u32::from(settle_ticks));
                Ok(())
            }
            RailFeedback::PowerGood { timeout_ticks, .. }
            | RailFeedback::Sensed { timeout_ticks, .. } => self.wait_good(timeout_ticks),
        }
    }

    fn turn_off(&mut self) {
        if !self.drive_enable(false) {
            warn!("Rail {} enable pin error while turning off", self.name);
        }
    }

    fn is_power_good(&mut self) -> bool {
        self.sense_good()
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn is_input_supply(&self) -> bool {
        self.input_supply
    }
}
