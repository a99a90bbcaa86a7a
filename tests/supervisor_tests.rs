//! Power/Reset Supervisor Tests
//!
//! Tests for rail power sequencing, the reset chain and rail monitoring.
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test supervisor_tests

mod common;

use common::{event_log, events, CountingHooks, EventLog, ManualTimer, MockPin, TestRail, TestReset};
use embedded_platform::config::RAIL_OFF_SETTLE_TICKS;
use embedded_platform::scheduler::{Scheduler, Task};
use embedded_platform::supervisor::{Polarity, PowerResetSupervisor, Rail, Reset, ResetDescriptor};

fn take(log: &EventLog) -> Vec<String> {
    let out = events(log);
    log.borrow_mut().clear();
    out
}

// =============================================================================
// Power Sequence Tests
// =============================================================================

#[test]
fn power_on_turns_rails_on_in_order() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut b = TestRail::new("B", &log);
    let mut c = TestRail::new("C", &log);
    let mut r0 = TestReset::new("R0", &log);
    let mut r1 = TestReset::new("R1", &log);

    let mut rails: [&mut dyn Rail; 3] = [&mut a, &mut b, &mut c];
    let mut resets: [&mut dyn Reset; 2] = [&mut r0, &mut r1];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();

    assert_eq!(events(&log), ["on:A", "on:B", "on:C", "deassert:R0"]);
    assert!(supervisor.is_power_on());
    assert!(!supervisor.is_resets_done());
    assert_eq!(supervisor.state().reset_sequence_index, 0);
    assert_eq!(supervisor.hooks().power_on, 1);
}

#[test]
fn failing_rail_aborts_with_panic_shutdown() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut b = TestRail::failing("B", &log);
    let mut c = TestRail::new("C", &log);
    let mut r0 = TestReset::new("R0", &log);
    let mut r1 = TestReset::new("R1", &log);

    let mut rails: [&mut dyn Rail; 3] = [&mut a, &mut b, &mut c];
    let mut resets: [&mut dyn Reset; 2] = [&mut r0, &mut r1];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();

    // C is never started; everything is torn down without delays
    assert_eq!(
        events(&log),
        ["on:A", "on:B", "off:C", "off:B", "off:A", "assert:R0", "assert:R1"]
    );
    assert_eq!(timer.slept(), 0);
    assert!(!supervisor.is_power_on());
    assert_eq!(supervisor.hooks().faults, 1);
    assert_eq!(supervisor.hooks().power_on, 0);
}

#[test]
fn power_off_is_reverse_order_with_settle_delays() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut b = TestRail::new("B", &log);
    let mut r0 = TestReset::new("R0", &log);
    let mut r1 = TestReset::new("R1", &log);

    let mut rails: [&mut dyn Rail; 2] = [&mut a, &mut b];
    let mut resets: [&mut dyn Reset; 2] = [&mut r0, &mut r1];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    take(&log);
    supervisor.power_off();

    assert_eq!(events(&log), ["assert:R1", "assert:R0", "off:B", "off:A"]);
    assert_eq!(timer.slept(), 2 * RAIL_OFF_SETTLE_TICKS);
    assert!(!supervisor.is_power_on());
    assert_eq!(supervisor.hooks().power_off, 1);
}

#[test]
fn iteration_is_idle_while_powered_off() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut r0 = TestReset::new("R0", &log);
    a.good.set(false);

    let mut rails: [&mut dyn Rail; 1] = [&mut a];
    let mut resets: [&mut dyn Reset; 1] = [&mut r0];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    for _ in 0..5 {
        supervisor.iteration();
    }
    assert!(events(&log).is_empty());
    assert_eq!(supervisor.hooks().faults, 0);
}

// =============================================================================
// Reset Sequence Tests
// =============================================================================

#[test]
fn resets_release_one_stage_per_iteration() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut r0 = TestReset::new("R0", &log);
    let mut r1 = TestReset::new("R1", &log);
    let mut r2 = TestReset::new("R2", &log);

    let mut rails: [&mut dyn Rail; 1] = [&mut a];
    let mut resets: [&mut dyn Reset; 3] = [&mut r0, &mut r1, &mut r2];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    take(&log);

    supervisor.iteration();
    assert_eq!(take(&log), ["deassert:R1"]);
    supervisor.iteration();
    assert_eq!(take(&log), ["deassert:R2"]);
    assert!(!supervisor.is_resets_done());

    supervisor.iteration();
    assert!(take(&log).is_empty());
    assert!(supervisor.is_resets_done());
    assert_eq!(supervisor.state().reset_sequence_index, 3);
    assert_eq!(supervisor.hooks().reset_done, 1);

    // Stays done
    supervisor.iteration();
    assert_eq!(supervisor.hooks().reset_done, 1);
}

#[test]
fn reset_chain_waits_for_readiness() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut r0 = TestReset::new("R0", &log);
    let mut r1 = TestReset::new("R1", &log);
    let r0_ready = r0.ready.clone();
    r0_ready.set(false);

    let mut rails: [&mut dyn Rail; 1] = [&mut a];
    let mut resets: [&mut dyn Reset; 2] = [&mut r0, &mut r1];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    take(&log);
    for _ in 0..10 {
        supervisor.iteration();
    }
    assert!(take(&log).is_empty());
    assert_eq!(supervisor.state().reset_sequence_index, 0);

    r0_ready.set(true);
    supervisor.iteration();
    assert_eq!(take(&log), ["deassert:R1"]);
}

#[test]
fn empty_reset_list_is_done_immediately() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);

    let mut rails: [&mut dyn Rail; 1] = [&mut a];
    let mut resets: [&mut dyn Reset; 0] = [];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    assert!(supervisor.is_resets_done());
    assert_eq!(supervisor.hooks().reset_done, 1);
    supervisor.iteration();
    assert_eq!(events(&log), ["on:A"]);
}

#[test]
fn dropped_reset_rolls_chain_back_to_that_stage() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut r0 = TestReset::new("R0", &log);
    let mut r1 = TestReset::new("R1", &log);
    let mut r2 = TestReset::new("R2", &log);
    let mut r3 = TestReset::new("R3", &log);
    let r1_ready = r1.ready.clone();

    let mut rails: [&mut dyn Rail; 1] = [&mut a];
    let mut resets: [&mut dyn Reset; 4] = [&mut r0, &mut r1, &mut r2, &mut r3];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    for _ in 0..4 {
        supervisor.iteration();
    }
    assert!(supervisor.is_resets_done());
    take(&log);

    r1_ready.set(false);
    supervisor.iteration();

    // Everything after R1 is re-asserted, R1 itself is not touched
    assert_eq!(take(&log), ["assert:R3", "assert:R2"]);
    assert_eq!(supervisor.state().reset_sequence_index, 1);
    assert!(!supervisor.is_resets_done());

    // Chain resumes once R1 is back
    supervisor.iteration();
    assert!(take(&log).is_empty());
    r1_ready.set(true);
    supervisor.iteration();
    assert_eq!(take(&log), ["deassert:R2"]);
    supervisor.iteration();
    assert_eq!(take(&log), ["deassert:R3"]);
    supervisor.iteration();
    assert!(supervisor.is_resets_done());
    assert_eq!(supervisor.hooks().reset_done, 2);
}

#[test]
fn rollback_picks_earliest_dropped_stage() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut r0 = TestReset::new("R0", &log);
    let mut r1 = TestReset::new("R1", &log);
    let mut r2 = TestReset::new("R2", &log);
    let r0_ready = r0.ready.clone();
    let r1_ready = r1.ready.clone();

    let mut rails: [&mut dyn Rail; 1] = [&mut a];
    let mut resets: [&mut dyn Reset; 3] = [&mut r0, &mut r1, &mut r2];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    for _ in 0..3 {
        supervisor.iteration();
    }
    take(&log);

    r0_ready.set(false);
    r1_ready.set(false);
    supervisor.iteration();
    assert_eq!(take(&log), ["assert:R2", "assert:R1"]);
    assert_eq!(supervisor.state().reset_sequence_index, 0);

    // R1 is held until R0 is back, then released again
    r0_ready.set(true);
    r1_ready.set(true);
    supervisor.iteration();
    assert_eq!(take(&log), ["deassert:R1"]);
}

#[test]
fn dropped_done_pin_does_not_pulse_its_reset_line() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let prog_n = MockPin::new(false);
    let done = MockPin::new(false);
    let mut fpga =
        ResetDescriptor::with_done("FPGA", prog_n.clone(), Polarity::ActiveLow, done.clone(), Polarity::ActiveHigh);
    let mut mcu = TestReset::new("MCU", &log);

    let mut rails: [&mut dyn Rail; 1] = [&mut a];
    let mut resets: [&mut dyn Reset; 2] = [&mut fpga, &mut mcu];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    assert!(prog_n.is_set_high());
    done.drive(true);
    supervisor.iteration();
    supervisor.iteration();
    assert!(supervisor.is_resets_done());
    let writes = prog_n.writes();
    take(&log);

    // FPGA loses DONE: only downstream resets are held
    done.drive(false);
    supervisor.iteration();
    assert_eq!(take(&log), ["assert:MCU"]);
    assert_eq!(prog_n.writes(), writes);
    assert!(prog_n.is_set_high());

    done.drive(true);
    supervisor.iteration();
    assert_eq!(take(&log), ["deassert:MCU"]);
    assert_eq!(prog_n.writes(), writes);
}

// =============================================================================
// Rail Monitoring Tests
// =============================================================================

#[test]
fn critical_rail_loss_panics() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut b = TestRail::new("B", &log);
    let b_good = b.good.clone();
    let mut r0 = TestReset::new("R0", &log);

    let mut rails: [&mut dyn Rail; 2] = [&mut a, &mut b];
    let mut resets: [&mut dyn Reset; 1] = [&mut r0];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    supervisor.iteration();
    supervisor.iteration();
    take(&log);

    b_good.set(false);
    // One rail per pass: A is checked first, then B
    supervisor.iteration();
    assert!(take(&log).is_empty());
    supervisor.iteration();
    assert_eq!(take(&log), ["off:B", "off:A", "assert:R0"]);
    assert!(!supervisor.is_power_on());
    assert_eq!(supervisor.hooks().faults, 1);
}

#[test]
fn monitoring_visits_rails_round_robin() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut b = TestRail::new("B", &log);
    let mut c = TestRail::new("C", &log);
    let mut r0 = TestReset::new("R0", &log);

    let mut rails: [&mut dyn Rail; 3] = [&mut a, &mut b, &mut c];
    let mut resets: [&mut dyn Reset; 1] = [&mut r0];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    let mut seen = Vec::new();
    for _ in 0..6 {
        seen.push(supervisor.state().monitor_rail_index);
        supervisor.monitor_rails();
    }
    assert_eq!(seen, [0, 1, 2, 0, 1, 2]);
}

#[test]
fn input_supply_loss_powers_off_gracefully() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut vin = TestRail::new("VIN", &log).input_supply();
    let vin_good = vin.good.clone();
    let mut a = TestRail::new("A", &log);
    let mut r0 = TestReset::new("R0", &log);

    let mut rails: [&mut dyn Rail; 2] = [&mut vin, &mut a];
    let mut resets: [&mut dyn Reset; 1] = [&mut r0];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    take(&log);

    vin_good.set(false);
    supervisor.iteration();

    assert_eq!(take(&log), ["assert:R0", "off:A", "off:VIN"]);
    assert!(!supervisor.is_power_on());
    assert_eq!(supervisor.hooks().power_off, 1);
    assert_eq!(supervisor.hooks().power_lost, 1);
    assert_eq!(supervisor.hooks().faults, 0);

    // Still alive, and can be powered back on
    vin_good.set(true);
    supervisor.power_on();
    assert!(supervisor.is_power_on());
    assert_eq!(take(&log), ["on:VIN", "on:A", "deassert:R0"]);
}

#[test]
fn non_critical_rail_loss_is_reported_only() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut aux = TestRail::new("AUX", &log).non_critical();
    let aux_good = aux.good.clone();
    let mut r0 = TestReset::new("R0", &log);

    let mut rails: [&mut dyn Rail; 1] = [&mut aux];
    let mut resets: [&mut dyn Reset; 1] = [&mut r0];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());

    supervisor.power_on();
    take(&log);

    aux_good.set(false);
    supervisor.iteration();
    supervisor.iteration();

    assert!(take(&log).is_empty());
    assert!(supervisor.is_power_on());
    assert_eq!(supervisor.hooks().degraded, ["AUX", "AUX"]);
}

#[test]
fn supervisor_runs_as_scheduler_task() {
    let log = event_log();
    let timer = ManualTimer::new();
    let mut a = TestRail::new("A", &log);
    let mut r0 = TestReset::new("R0", &log);
    let mut r1 = TestReset::new("R1", &log);

    let mut rails: [&mut dyn Rail; 1] = [&mut a];
    let mut resets: [&mut dyn Reset; 2] = [&mut r0, &mut r1];
    let mut supervisor = PowerResetSupervisor::with_hooks(&mut rails, &mut resets, &timer, CountingHooks::default());
    supervisor.power_on();

    {
        let mut scheduler: Scheduler<'_, ManualTimer> = Scheduler::new(&timer);
        scheduler.register_task(&mut supervisor).unwrap();
        for _ in 0..3 {
            scheduler.iterate(|| {});
        }
    }

    assert!(supervisor.is_resets_done());
    Task::iteration(&mut supervisor);
    assert_eq!(events(&log), ["on:A", "deassert:R0", "deassert:R1"]);
}
