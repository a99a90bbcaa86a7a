//! Embedded Platform Core
//!
//! Board-independent building blocks for STM32-class management controllers
//! that sit next to an FPGA: sequencing the board's power rails and resets,
//! running polled work from a cooperative main loop, reprogramming the FPGA's
//! configuration flash, and deciding what to boot after a reset.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      APPLICATION                             │
//! │   supervisor binary  │  bootloader  │  update transports     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                        CORE                                  │
//! │  PowerResetSupervisor │ FpgaFirmwareUpdater │ Bootloader     │
//! │        Rail / Reset   │   FlashDevice       │ ObjectStore    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 SCHEDULER / TIMEBASE                         │
//! │     Scheduler  │  TimerTask  │  TickSource (10 kHz)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                        HAL                                   │
//! │    embassy-stm32 GPIO / ADC  │  embassy-time                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything above the HAL is plain `no_std` code over `embedded-hal` and
//! crate-local traits, and is tested on the host with the `std` feature.

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;

/// Hardware Abstraction Layer
///
/// Tick source and ADC glue for the STM32G474.
#[cfg(feature = "embedded")]
pub mod hal;

/// Monotonic tick timer contract and tick arithmetic
pub mod timer;

/// Cooperative task scheduler and timer tasks
pub mod scheduler;

/// Power rail and reset sequencing
pub mod supervisor;

/// FPGA bitstream firmware updater
pub mod bitstream;

/// Bootloader boot-decision flow
pub mod boot;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::scheduler::{Scheduler, Task, TaskHandle, TimerTask};
    pub use crate::supervisor::{Polarity, PowerResetSupervisor, Rail, RailDescriptor, Reset, ResetDescriptor};
    pub use crate::timer::TickSource;

    // Common traits
    pub use embedded_hal::digital::{InputPin, OutputPin};
}
