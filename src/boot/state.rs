//! Battery-backed boot record
//!
//! Two words that survive a warm reset: what the firmware was doing, and if
//! it crashed, which fault handler caught it.

/// What the previous run was doing when it reset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
#[repr(u32)]
pub enum BootState {
    /// Cold power-on (or an unrecognised record)
    #[default]
    Por = 0,
    /// The application was running
    App = 1,
    /// The application asked for firmware-update mode
    Dfu = 2,
    /// The application crashed
    Crash = 3,
}

impl BootState {
    /// Decode a raw state word; unknown values count as a cold boot
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::App,
            2 => Self::Dfu,
            3 => Self::Crash,
            _ => Self::Por,
        }
    }
}

/// Fault handler that recorded a crash
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
#[repr(u32)]
pub enum CrashReason {
    /// An interrupt without a handler fired
    UnusedIsr = 0,
    /// Non-maskable interrupt
    Nmi = 1,
    /// Hard fault
    HardFault = 2,
    /// Bus fault
    BusFault = 3,
    /// Usage fault
    UsageFault = 4,
    /// Memory management fault
    MmuFault = 5,
}

impl CrashReason {
    /// Decode a raw crash reason word
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::UnusedIsr),
            1 => Some(Self::Nmi),
            2 => Some(Self::HardFault),
            3 => Some(Self::BusFault),
            4 => Some(Self::UsageFault),
            5 => Some(Self::MmuFault),
            _ => None,
        }
    }

    /// Human readable fault name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnusedIsr => "Unused ISR called",
            Self::Nmi => "NMI",
            Self::HardFault => "Hard fault",
            Self::BusFault => "Bus fault",
            Self::UsageFault => "Usage fault",
            Self::MmuFault => "MMU fault",
        }
    }
}

/// Decoded contents of the battery-backed boot record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BootRecord {
    /// State at the last reset
    pub state: BootState,
    /// Raw crash reason word, meaningful when `state` is `Crash`
    pub crash_reason: u32,
}

impl BootRecord {
    /// Record from the two raw backup words
    #[must_use]
    pub const fn from_raw(state: u32, crash_reason: u32) -> Self {
        Self {
            state: BootState::from_raw(state),
            crash_reason,
        }
    }

    /// Record for a crash caught by `reason`
    #[must_use]
    pub const fn crashed(reason: CrashReason) -> Self {
        Self {
            state: BootState::Crash,
            crash_reason: reason as u32,
        }
    }

    /// The two raw backup words
    #[must_use]
    pub const fn to_raw(self) -> (u32, u32) {
        (self.state as u32, self.crash_reason)
    }

    /// Decoded crash reason, if the word holds a known value
    #[must_use]
    pub const fn crash(self) -> Option<CrashReason> {
        CrashReason::from_raw(self.crash_reason)
    }
}
