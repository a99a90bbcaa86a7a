//! Hardware Abstraction Layer
//!
//! Binds the board-independent seams ([`crate::timer::TickSource`],
//! [`crate::supervisor::VoltageSensor`]) to STM32G474 peripherals through
//! embassy. GPIO needs no glue: embassy pins implement `embedded-hal`
//! directly.

pub mod adc;
pub mod timer;
