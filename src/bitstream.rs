//! FPGA Bitstream Firmware Updater
//!
//! Writes a vendor `.bit` file into the FPGA's configuration flash as it
//! streams in. The file is parsed just far enough to validate it and to know
//! where it ends:
//!
//! ```text
//!  READ_BITHDR ─► READ_BITHDR_RECORDS ─('e')─► erase + blank check ─► SYNC_WAIT
//!                          │ wrong device                                  │ AA995566
//!                          ▼                                               ▼
//!                       FAILED ◄── bad packet / readback ──  BITSTREAM ◄─► BIG_WRITE
//!                                                                │ DESYNC
//!                                                                ▼
//!                                                               DONE
//! ```
//!
//! Everything from the first byte after the `e` record up to and including
//! the DESYNC packet is programmed verbatim, page by page, with each page
//! read back and compared as soon as it is written.

pub mod flash;
pub mod packet;
pub mod ring;
pub mod updater;

pub use flash::FlashDevice;
pub use packet::{Opcode, PacketHeader};
pub use ring::RingBuffer;
pub use updater::{FpgaFirmwareUpdater, UpdateError, UpdateState};
