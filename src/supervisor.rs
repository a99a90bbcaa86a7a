//! Power/Reset Supervisor
//!
//! Brings the board's rails up in list order, then walks the reset list,
//! releasing each reset once the one before it reports ready. While powered
//! it keeps re-checking both: a reset that drops out rolls the reset chain
//! back to that stage, and a rail that drops out shuts the board down.
//!
//! ```text
//!  power_on()          update_resets()                 monitor_rails()
//!  rail0..railN  ──►  reset0 ─► reset1 ─► … ─► done   one rail per pass
//!      │ fail               ▲  not ready  │             critical → panic
//!      ▼                    └─────────────┘             input    → power off
//!  panic_shutdown()         (cursor snaps back)
//! ```

pub mod rail;
pub mod reset;

pub use rail::{Polarity, Rail, RailDescriptor, RailError, RailFeedback, VoltageSensor, VoltageWindow};
pub use reset::{Readiness, Reset, ResetDescriptor};

use crate::config::RAIL_OFF_SETTLE_TICKS;
use crate::scheduler::Task;
use crate::timer::TickSource;

/// Extension points called by the supervisor
///
/// Every method defaults to a no-op except [`SupervisorHooks::on_fault`],
/// which halts forever.
pub trait SupervisorHooks {
    /// End of a successful power-on sequence (resets are still being released)
    fn on_power_on(&mut self) {}

    /// End of an orderly power-off
    fn on_power_off(&mut self) {}

    /// Every reset in the sequence reported ready
    fn on_reset_done(&mut self) {}

    /// The input supply was lost and the board was powered off in order
    fn on_power_lost(&mut self) {}

    /// A non-critical, non-supply rail reported bad
    fn on_rail_degraded(&mut self, _rail: &'static str) {}

    /// Called at the end of a panic shutdown
    ///
    /// The default never returns: supervisory logic must not keep running
    /// after a rail fault.
    fn on_fault(&mut self) {
        loop {
            core::hint::spin_loop();
        }
    }
}

/// Hooks with every default left in place
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHooks;

impl SupervisorHooks for DefaultHooks {}

/// Snapshot of the sequencer state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SupervisorState {
    /// Every rail is up
    pub power_on: bool,
    /// Every reset is released and ready
    pub resets_done: bool,
    /// Current position in the reset sequence
    pub reset_sequence_index: usize,
    /// Next rail to health-check
    pub monitor_rail_index: usize,
}

/// Power and reset sequencer
///
/// Holds non-owning ordered views of the application's rail and reset lists.
pub struct PowerResetSupervisor<'a, 'r, T: TickSource, H: SupervisorHooks = DefaultHooks> {
    rails: &'a mut [&'r mut dyn Rail],
    resets: &'a mut [&'r mut dyn Reset],
    timer: &'a T,
    hooks: H,
    state: SupervisorState,
}

impl<'a, 'r, T: TickSource> PowerResetSupervisor<'a, 'r, T, DefaultHooks> {
    /// Create a supervisor with the default hooks
    pub fn new(rails: &'a mut [&'r mut dyn Rail], resets: &'a mut [&'r mut dyn Reset], timer: &'a T) -> Self {
        Self::with_hooks(rails, resets, timer, DefaultHooks)
    }
}

impl<'a, 'r, T: TickSource, H: SupervisorHooks> PowerResetSupervisor<'a, 'r, T, H> {
    /// Create a supervisor with application hooks
    pub fn with_hooks(
        rails: &'a mut [&'r mut dyn Rail],
        resets: &'a mut [&'r mut dyn Reset],
        timer: &'a T,
        hooks: H,
    ) -> Self {
        Self {
            rails,
            resets,
            timer,
            hooks,
            state: SupervisorState::default(),
        }
    }

    /// True if power is all the way on
    #[must_use]
    pub const fn is_power_on(&self) -> bool {
        self.state.power_on
    }

    /// True if all resets are currently released and ready
    #[must_use]
    pub const fn is_resets_done(&self) -> bool {
        self.state.resets_done
    }

    /// Current sequencer state
    #[must_use]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    /// Access the application hooks
    pub const fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Mutable access to the application hooks
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Turn on every rail in order, blocking until power is fully up
    ///
    /// The first rail that fails aborts the sequence with a panic shutdown;
    /// later rails are never started. On success the reset sequence is
    /// started by releasing the first reset.
    pub fn power_on(&mut self) {
        info!("Turning power on");

        for i in 0..self.rails.len() {
            if self.rails[i].turn_on().is_err() {
                self.panic_shutdown();
                return;
            }
        }

        info!("Releasing resets");
        self.state.power_on = true;
        self.state.resets_done = false;
        self.state.reset_sequence_index = 0;
        self.state.monitor_rail_index = 0;
        match self.resets.first_mut() {
            Some(first) => first.deassert(),
            None => self.finish_resets(),
        }

        self.hooks.on_power_on();
    }

    /// Orderly power-off
    ///
    /// Asserts every reset from last to first, then turns rails off from last
    /// to first with a settle delay after each.
    pub fn power_off(&mut self) {
        info!("Turning power off");

        // Marked down first so nothing monitors a half torn-down board
        self.clear_state();

        for reset in self.resets.iter_mut().rev() {
            reset.assert();
        }

        for rail in self.rails.iter_mut().rev() {
            rail.turn_off();
            self.timer.sleep(RAIL_OFF_SETTLE_TICKS);
        }

        self.hooks.on_power_off();
    }

    /// Emergency shutdown: every rail off in reverse order with no delays
    ///
    /// Resets are asserted afterwards, in list order, as the board is already
    /// unpowered. Ends in [`SupervisorHooks::on_fault`].
    pub fn panic_shutdown(&mut self) {
        for rail in self.rails.iter_mut().rev() {
            rail.turn_off();
        }

        for reset in self.resets.iter_mut() {
            reset.assert();
        }

        self.clear_state();

        error!("Panic shutdown completed");

        self.hooks.on_fault();
    }

    /// Advance or roll back the reset state machine
    pub fn update_resets(&mut self) {
        let len = self.resets.len();
        let index = self.state.reset_sequence_index;

        if !self.state.resets_done && index < len && self.resets[index].is_ready() {
            let next = index + 1;
            self.state.reset_sequence_index = next;
            if next >= len {
                self.finish_resets();
            } else {
                self.resets[next].deassert();
            }
        }

        // Any earlier stage that went down invalidates everything built on it
        let cursor = self.state.reset_sequence_index;
        for i in 0..cursor {
            if !self.resets[i].is_ready() {
                warn!(
                    "{} is no longer ready, restarting reset sequence from that point",
                    self.resets[i].name()
                );
                self.rollback_to(i);
                break;
            }
        }
    }

    /// Check the health of one rail, advancing round-robin
    pub fn monitor_rails(&mut self) {
        let len = self.rails.len();
        if len == 0 {
            return;
        }

        let index = self.state.monitor_rail_index % len;
        self.state.monitor_rail_index = (index + 1) % len;

        let rail = &mut self.rails[index];
        if rail.is_power_good() {
            return;
        }

        let name = rail.name();
        if rail.is_critical() {
            error!("Rail {} power failure - panic shutdown", name);
            self.panic_shutdown();
        } else if rail.is_input_supply() {
            warn!("Input supply {} lost - powering off", name);
            self.power_off();
            self.hooks.on_power_lost();
        } else {
            warn!("Rail {} is not power good", name);
            self.hooks.on_rail_degraded(name);
        }
    }

    /// One supervisor pass: resets first, then one rail health check
    pub fn iteration(&mut self) {
        if self.state.power_on {
            self.update_resets();
            self.monitor_rails();
        }
    }

    fn finish_resets(&mut self) {
        info!("Reset sequence complete");
        self.state.resets_done = true;
        self.state.reset_sequence_index = self.resets.len();
        self.hooks.on_reset_done();
    }

    /// Hold every reset downstream of `index` and wait for `index` again
    ///
    /// The dropped stage itself is left as it is.
    fn rollback_to(&mut self, index: usize) {
        self.state.reset_sequence_index = index;
        self.state.resets_done = false;

        for reset in self.resets[index + 1..].iter_mut().rev() {
            reset.assert();
        }
    }

    fn clear_state(&mut self) {
        self.state.power_on = false;
        self.state.resets_done = false;
        self.state.reset_sequence_index = 0;
    }
}

impl<T: TickSource, H: SupervisorHooks> Task for PowerResetSupervisor<'_, '_, T, H> {
    fn iteration(&mut self) {
        PowerResetSupervisor::iteration(self);
    }
}
