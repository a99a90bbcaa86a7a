//! ADC rail sensing
//!
//! Measures a rail through a resistor divider on an ADC1 input.

use embassy_stm32::adc::{Adc, AdcChannel, SampleTime};
use embassy_stm32::peripherals::ADC1;

use crate::supervisor::VoltageSensor;

/// ADC reference voltage in millivolts
const VREF_MV: u32 = 3300;

/// Full scale 12-bit reading
const FULL_SCALE: u32 = 4095;

/// Samples averaged per measurement
const OVERSAMPLE: u32 = 8;

/// Resistor divider between the rail and the ADC pin
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Divider {
    /// Top resistor (rail side)
    pub top_ohms: u32,
    /// Bottom resistor (ground side)
    pub bottom_ohms: u32,
}

impl Divider {
    /// Pin wired straight to the rail
    pub const NONE: Self = Self {
        top_ohms: 0,
        bottom_ohms: 1,
    };

    /// Rail voltage for a voltage measured at the pin
    #[must_use]
    pub const fn rail_mv(self, pin_mv: u32) -> u32 {
        pin_mv * (self.top_ohms + self.bottom_ohms) / self.bottom_ohms
    }
}

/// One rail measured on one ADC1 channel
pub struct AdcRailSensor<'d, C: AdcChannel<ADC1>> {
    adc: Adc<'d, ADC1>,
    channel: C,
    divider: Divider,
}

impl<'d, C: AdcChannel<ADC1>> AdcRailSensor<'d, C> {
    /// Take ownership of ADC1 and configure it for slow, accurate reads
    #[must_use]
    pub fn new(adc: ADC1, channel: C, divider: Divider) -> Self {
        let mut adc = Adc::new(adc);
        adc.set_sample_time(SampleTime::CYCLES247_5);
        Self { adc, channel, divider }
    }

    /// Averaged raw 12-bit reading
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_raw(&mut self) -> u16 {
        let sum: u32 = (0..OVERSAMPLE)
            .map(|_| u32::from(self.adc.blocking_read(&mut self.channel)))
            .sum();
        (sum / OVERSAMPLE) as u16
    }
}

impl<C: AdcChannel<ADC1>> VoltageSensor for AdcRailSensor<'_, C> {
    fn read_millivolts(&mut self) -> u32 {
        let pin_mv = u32::from(self.read_raw()) * VREF_MV / FULL_SCALE;
        self.divider.rail_mv(pin_mv)
    }
}
