//! Bootloader Boot-Decision Flow
//!
//! Decides, once per reset, whether to jump to the application or stay in
//! firmware-update mode. Inputs are the battery-backed boot record left by
//! the previous run, the application partition itself, and the last known
//! image version and checksum in the object store.
//!
//! ```text
//!  DFU requested ───────────────────────────────► FirmwareUpdate
//!  CRASH ── image changed? ── yes ─► validate ─┬► BootApplication
//!                 └─ no ─────────────────────┐ └► FirmwareUpdate
//!  POR / APP ─► validate ─┬► BootApplication │
//!                         └► FirmwareUpdate ◄┘
//! ```

pub mod flow;
pub mod state;
pub mod store;

pub use flow::{image_version, BootDecision, Bootloader};
pub use state::{BootRecord, BootState, CrashReason};
pub use store::{ObjectStore, StoreError};
