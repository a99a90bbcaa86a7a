//! Board Supervisor Application
//!
//! Entry point for the STM32G474 power/reset supervisor. Brings up the FPGA
//! board's rails and resets, then runs the cooperative main loop forever.
//! Pin assignments follow [`embedded_platform::config::pins`].

#![no_std]
#![no_main]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use embedded_platform::hal::adc::{AdcRailSensor, Divider};
use embedded_platform::hal::timer::SystemTicks;
use embedded_platform::prelude::*;
use embedded_platform::supervisor::{RailError, SupervisorHooks, VoltageWindow};

static TICKS: StaticCell<SystemTicks> = StaticCell::new();

/// 12V input from the intermediate bus converter
///
/// Not switchable from here; only its PGOOD is visible.
struct InputSupply<'d> {
    pgood: Input<'d>,
}

impl Rail for InputSupply<'_> {
    fn name(&self) -> &'static str {
        "12V0"
    }

    fn turn_on(&mut self) -> Result<(), RailError> {
        if self.pgood.is_high() {
            Ok(())
        } else {
            Err(RailError::NotGood)
        }
    }

    fn turn_off(&mut self) {}

    fn is_power_good(&mut self) -> bool {
        self.pgood.is_high()
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn is_input_supply(&self) -> bool {
        true
    }
}

struct BoardHooks;

impl SupervisorHooks for BoardHooks {
    fn on_power_on(&mut self) {
        info!("All rails up");
    }

    fn on_reset_done(&mut self) {
        info!("Board is up");
    }

    fn on_power_lost(&mut self) {
        warn!("Input supply lost, board is off");
    }

    fn on_rail_degraded(&mut self, rail: &'static str) {
        warn!("Rail {} degraded", rail);
    }
}

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Board supervisor v{}", env!("CARGO_PKG_VERSION"));

    let p = embassy_stm32::init(embassy_stm32::Config::default());
    let ticks: &'static SystemTicks = TICKS.init(SystemTicks::new());

    // Heartbeat
    let mut led = Output::new(p.PA5, Level::Low, Speed::Low);
    let mut heartbeat = TimerTask::new(ticks, HEARTBEAT_PERIOD_TICKS, HEARTBEAT_PERIOD_TICKS, move || led.toggle());

    // Rails, in power-on order
    let mut vin = InputSupply {
        pgood: Input::new(p.PB0, Pull::None),
    };
    let mut rail_3v3 = RailDescriptor::with_power_good(
        "3V3",
        Output::new(p.PB1, Level::Low, Speed::Low),
        Input::new(p.PB2, Pull::None),
        ticks,
        RAIL_PGOOD_TIMEOUT_TICKS,
    );
    let mut rail_1v0 = RailDescriptor::with_active_low_enable(
        "1V0",
        Output::new(p.PB10, Level::High, Speed::Low),
        Input::new(p.PB11, Pull::None),
        ticks,
        RAIL_PGOOD_TIMEOUT_TICKS,
    );
    let mut rail_1v8 = RailDescriptor::with_sensor(
        "1V8",
        Output::new(p.PB12, Level::Low, Speed::Low),
        AdcRailSensor::new(p.ADC1, p.PA0, Divider::NONE),
        VoltageWindow::around(AUX_1V8_NOMINAL_MV, SENSED_RAIL_TOLERANCE_PCT),
        ticks,
        RAIL_PGOOD_TIMEOUT_TICKS,
    )
    .non_critical();

    // Resets, in release order
    let mut fpga_reset = ResetDescriptor::with_done(
        "FPGA",
        Output::new(p.PC0, Level::Low, Speed::Low),
        Polarity::ActiveLow,
        Input::new(p.PC1, Pull::Down),
        Polarity::ActiveHigh,
    );
    let mut mcu_reset = ResetDescriptor::with_delay(
        "MCU",
        Output::new(p.PC2, Level::Low, Speed::Low),
        Polarity::ActiveLow,
        ticks,
        RESET_SETTLE_TICKS,
    );

    info!("Waiting for input supply");
    while !vin.is_power_good() {
        ticks.sleep(TICKS_PER_MS);
    }

    let mut rails: [&mut dyn Rail; 4] = [&mut vin, &mut rail_3v3, &mut rail_1v0, &mut rail_1v8];
    let mut resets: [&mut dyn Reset; 2] = [&mut fpga_reset, &mut mcu_reset];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, ticks, BoardHooks);
    supervisor.power_on();

    let mut scheduler: Scheduler<'_, SystemTicks> = Scheduler::new(ticks);
    if scheduler.register_task(&mut supervisor).is_err() {
        error!("Task table full, supervisor not scheduled");
    }
    if scheduler.register_timer(&mut heartbeat).is_err() {
        error!("Timer task table full, heartbeat not scheduled");
    }

    info!("Entering main loop");
    scheduler.run(|| {});
}
