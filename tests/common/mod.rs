//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};
use embedded_platform::bitstream::FlashDevice;
use embedded_platform::boot::{ObjectStore, StoreError};
use embedded_platform::supervisor::{Rail, RailError, Reset, SupervisorHooks, VoltageSensor};
use embedded_platform::timer::TickSource;

/// Tick source advanced by hand; `sleep` advances it too
#[derive(Default)]
pub struct ManualTimer {
    now: Cell<u32>,
    restarts: Cell<u32>,
    slept: Cell<u32>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: u32) -> Self {
        let timer = Self::default();
        timer.now.set(now);
        timer
    }

    pub fn advance(&self, ticks: u32) {
        self.now.set(self.now.get().wrapping_add(ticks));
    }

    pub fn set(&self, now: u32) {
        self.now.set(now);
    }

    pub fn restarts(&self) -> u32 {
        self.restarts.get()
    }

    /// Total ticks spent in `sleep`
    pub fn slept(&self) -> u32 {
        self.slept.get()
    }
}

impl TickSource for ManualTimer {
    fn count(&self) -> u32 {
        self.now.get()
    }

    fn sleep(&self, ticks: u32) {
        self.slept.set(self.slept.get() + ticks);
        self.advance(ticks);
    }

    fn restart(&self) {
        self.restarts.set(self.restarts.get() + 1);
        self.now.set(0);
    }
}

/// GPIO line shared between the code under test and the test
#[derive(Clone, Default)]
pub struct MockPin {
    level: Rc<Cell<bool>>,
    writes: Rc<Cell<u32>>,
}

impl MockPin {
    pub fn new(high: bool) -> Self {
        let pin = Self::default();
        pin.level.set(high);
        pin
    }

    pub fn is_set_high(&self) -> bool {
        self.level.get()
    }

    pub fn drive(&self, high: bool) {
        self.level.set(high);
    }

    pub fn writes(&self) -> u32 {
        self.writes.get()
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.writes.set(self.writes.get() + 1);
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.writes.set(self.writes.get() + 1);
        self.level.set(true);
        Ok(())
    }
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}

/// Output whose writes always fail
#[derive(Clone, Default)]
pub struct BrokenPin {
    attempts: Rc<Cell<u32>>,
}

impl BrokenPin {
    pub fn attempts(&self) -> u32 {
        self.attempts.get()
    }
}

impl ErrorType for BrokenPin {
    type Error = ErrorKind;
}

impl OutputPin for BrokenPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.attempts.set(self.attempts.get() + 1);
        Err(ErrorKind::Other)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.attempts.set(self.attempts.get() + 1);
        Err(ErrorKind::Other)
    }
}

/// PGOOD input that goes high once `delay` reads have been made while an
/// enable pin is asserted (active high)
#[derive(Clone)]
pub struct DelayedPowerGood {
    enable: MockPin,
    delay: u32,
    reads: Rc<Cell<u32>>,
}

impl DelayedPowerGood {
    pub fn new(enable: &MockPin, delay: u32) -> Self {
        Self {
            enable: enable.clone(),
            delay,
            reads: Rc::new(Cell::new(0)),
        }
    }
}

impl ErrorType for DelayedPowerGood {
    type Error = Infallible;
}

impl InputPin for DelayedPowerGood {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        if !self.enable.is_set_high() {
            self.reads.set(0);
            return Ok(false);
        }
        self.reads.set(self.reads.get() + 1);
        Ok(self.reads.get() > self.delay)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// Voltage source with a settable reading
#[derive(Clone, Default)]
pub struct MockSensor {
    mv: Rc<Cell<u32>>,
}

impl MockSensor {
    pub fn new(mv: u32) -> Self {
        let sensor = Self::default();
        sensor.mv.set(mv);
        sensor
    }

    pub fn set(&self, mv: u32) {
        self.mv.set(mv);
    }
}

impl VoltageSensor for MockSensor {
    fn read_millivolts(&mut self) -> u32 {
        self.mv.get()
    }
}

/// Ordered record of rail and reset operations
pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.borrow().clone()
}

/// Rail that records every operation
pub struct TestRail {
    name: &'static str,
    log: EventLog,
    pub good: Rc<Cell<bool>>,
    pub fail_on: bool,
    pub critical: bool,
    pub input_supply: bool,
}

impl TestRail {
    pub fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            good: Rc::new(Cell::new(true)),
            fail_on: false,
            critical: true,
            input_supply: false,
        }
    }

    pub fn failing(name: &'static str, log: &EventLog) -> Self {
        Self {
            fail_on: true,
            ..Self::new(name, log)
        }
    }

    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    pub fn input_supply(mut self) -> Self {
        self.critical = false;
        self.input_supply = true;
        self
    }
}

impl Rail for TestRail {
    fn name(&self) -> &'static str {
        self.name
    }

    fn turn_on(&mut self) -> Result<(), RailError> {
        self.log.borrow_mut().push(format!("on:{}", self.name));
        if self.fail_on {
            Err(RailError::NotGood)
        } else {
            Ok(())
        }
    }

    fn turn_off(&mut self) {
        self.log.borrow_mut().push(format!("off:{}", self.name));
    }

    fn is_power_good(&mut self) -> bool {
        self.good.get()
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn is_input_supply(&self) -> bool {
        self.input_supply
    }
}

/// Reset that records every operation
pub struct TestReset {
    name: &'static str,
    log: EventLog,
    pub ready: Rc<Cell<bool>>,
}

impl TestReset {
    pub fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            ready: Rc::new(Cell::new(true)),
        }
    }
}

impl Reset for TestReset {
    fn name(&self) -> &'static str {
        self.name
    }

    fn assert(&mut self) {
        self.log.borrow_mut().push(format!("assert:{}", self.name));
    }

    fn deassert(&mut self) {
        self.log.borrow_mut().push(format!("deassert:{}", self.name));
    }

    fn is_ready(&mut self) -> bool {
        self.ready.get()
    }
}

/// Supervisor hooks that count calls and never halt
#[derive(Default)]
pub struct CountingHooks {
    pub power_on: u32,
    pub power_off: u32,
    pub reset_done: u32,
    pub power_lost: u32,
    pub faults: u32,
    pub degraded: Vec<&'static str>,
}

impl SupervisorHooks for CountingHooks {
    fn on_power_on(&mut self) {
        self.power_on += 1;
    }

    fn on_power_off(&mut self) {
        self.power_off += 1;
    }

    fn on_reset_done(&mut self) {
        self.reset_done += 1;
    }

    fn on_power_lost(&mut self) {
        self.power_lost += 1;
    }

    fn on_rail_degraded(&mut self, rail: &'static str) {
        self.degraded.push(rail);
    }

    fn on_fault(&mut self) {
        self.faults += 1;
    }
}

/// NOR flash in memory
///
/// Erase sets a sector to 0xFF. `stuck` bytes keep their value through
/// erases, `flip_on_write` corrupts one address whenever it is programmed.
pub struct MemFlash {
    pub data: Vec<u8>,
    pub sector: u32,
    pub page: u32,
    pub erases: u32,
    pub writes: u32,
    pub stuck: Option<(u32, u8)>,
    pub flip_on_write: Option<u32>,
    pub fail_erase_at: Option<u32>,
}

impl MemFlash {
    pub fn new(size: usize, sector: u32, page: u32) -> Self {
        Self {
            data: vec![0x00; size],
            sector,
            page,
            erases: 0,
            writes: 0,
            stuck: None,
            flip_on_write: None,
            fail_erase_at: None,
        }
    }
}

impl FlashDevice for MemFlash {
    fn erase_block_size(&self) -> u32 {
        self.sector
    }

    fn erase_sector(&mut self, addr: u32) -> bool {
        if self.fail_erase_at == Some(addr) {
            return false;
        }
        self.erases += 1;
        let start = addr as usize;
        let end = (start + self.sector as usize).min(self.data.len());
        self.data[start..end].fill(0xff);
        if let Some((stuck_addr, value)) = self.stuck {
            if (start..end).contains(&(stuck_addr as usize)) {
                self.data[stuck_addr as usize] = value;
            }
        }
        true
    }

    fn read_data(&mut self, addr: u32, buf: &mut [u8]) {
        let start = addr as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
    }

    fn write_data(&mut self, addr: u32, data: &[u8]) -> bool {
        assert!(data.len() <= self.page as usize, "write larger than a page");
        self.writes += 1;
        let start = addr as usize;
        self.data[start..start + data.len()].copy_from_slice(data);
        if let Some(flip) = self.flip_on_write {
            if (start..start + data.len()).contains(&(flip as usize)) {
                self.data[flip as usize] ^= 0x01;
            }
        }
        true
    }

    fn max_write_block_size(&self) -> u32 {
        self.page
    }
}

/// Object store backed by a map
#[derive(Default)]
pub struct MapStore {
    pub objects: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
    pub stores: u32,
}

impl MapStore {
    pub fn with(mut self, key: &str, value: &[u8]) -> Self {
        self.objects.insert(key.to_string(), value.to_vec());
        self
    }
}

impl ObjectStore for MapStore {
    fn find_object(&self, key: &str) -> Option<&[u8]> {
        self.objects.get(key).map(Vec::as_slice)
    }

    fn store_object(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::WriteFailed);
        }
        self.stores += 1;
        self.objects.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
