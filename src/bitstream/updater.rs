//! Streaming `.bit` file parser and flash programmer

use thiserror::Error;

use super::flash::FlashDevice;
use super::packet::{
    command_name, read_be_word, register_name, Opcode, PacketHeader, BIT_FILE_MAGIC, CMD_DESYNC, RECORD_BITSTREAM,
    REG_CMD, SYNC_WORD,
};
use super::ring::RingBuffer;
use crate::config::{
    BIT_RX_BUFFER_SIZE, BLANK_CHECK_BLOCK, DEFAULT_FPGA_IMAGE_OFFSET, DEFAULT_FPGA_IMAGE_SIZE, FPGA_DEVICE_NAME,
    MAX_READBACK_BLOCK, PROGRESS_LOG_INTERVAL,
};
use crate::timer::{elapsed, ticks_to_ms_tenths, TickSource};

/// Reasons a bitstream update is abandoned
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum UpdateError {
    /// The file does not start with the `.bit` magic
    #[error("bad bitstream magic")]
    BadMagic,
    /// The header names a different FPGA part
    #[error("bitstream is for the wrong device")]
    WrongDevice,
    /// The declared bitstream length exceeds the partition
    #[error("bitstream does not fit in the image partition")]
    ImageTooLarge,
    /// A sector erase reported failure
    #[error("erase failed at {addr:#x}")]
    EraseFailed {
        /// Sector address
        addr: u32,
    },
    /// A byte in the erased partition was not 0xFF
    #[error("blank check failed at {addr:#x} (read {value:#x})")]
    BlankCheckFailed {
        /// Address of the first non-blank byte
        addr: u32,
        /// Value read there
        value: u8,
    },
    /// A page program reported failure
    #[error("write of {len} bytes failed at {addr:#x}")]
    WriteFailed {
        /// Page address
        addr: u32,
        /// Page length
        len: u32,
    },
    /// Data read back after programming differs from what was written
    #[error("readback mismatch at {addr:#x} (wrote {expected:#x}, read {actual:#x})")]
    ReadbackMismatch {
        /// Address of the first differing byte
        addr: u32,
        /// Byte written
        expected: u8,
        /// Byte read back
        actual: u8,
    },
    /// The flash page size is zero or larger than the readback buffer
    #[error("flash write block size is unsupported")]
    ReadbackBlockTooLarge,
    /// A packet header with a type other than 1 or 2
    #[error("invalid packet type {0}")]
    InvalidPacketType(u8),
    /// A packet or header record that can never fit in the buffers
    #[error("packet too large")]
    PacketTooLarge,
    /// A write would land past the end of the partition
    #[error("write out of bounds at {addr:#x}")]
    WriteOutOfBounds {
        /// Page address
        addr: u32,
    },
    /// Received data could not be buffered
    #[error("receive buffer overflow")]
    RxOverflow,
}

/// Parser state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum UpdateState {
    /// Waiting for the 13 byte file magic
    ReadBitHeader,
    /// Parsing `.bit` header records
    ReadHeaderRecords,
    /// Copying preamble bytes until the sync word
    SyncWait,
    /// Parsing configuration packet headers
    Bitstream,
    /// Copying a type 2 bulk payload
    BigWrite,
    /// DESYNC seen; further input is ignored
    Done,
    /// Fatal error; further input is ignored
    Failed,
}

impl UpdateState {
    /// Upper-case state name for logging
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReadBitHeader => "READ_BITHDR",
            Self::ReadHeaderRecords => "READ_BITHDR_RECORDS",
            Self::SyncWait => "SYNC_WAIT",
            Self::Bitstream => "BITSTREAM",
            Self::BigWrite => "BIG_WRITE",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    /// True for `Done` and `Failed`
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// FPGA bitstream updater
///
/// Fed by a transport (USB DFU, TFTP, a shell command...) through the three
/// session callbacks. Input may arrive in chunks of any size; each state only
/// advances once enough bytes are buffered to make progress.
pub struct FpgaFirmwareUpdater<'t, F: FlashDevice, T: TickSource> {
    flash: F,
    timer: &'t T,
    device_name: &'static str,
    image_offset: u32,
    image_size: u32,
    state: UpdateState,
    last_error: Option<UpdateError>,
    rx: RingBuffer<BIT_RX_BUFFER_SIZE>,
    pending: RingBuffer<BIT_RX_BUFFER_SIZE>,
    big_words_left: u32,
    write_ptr: u32,
}

impl<'t, F: FlashDevice, T: TickSource> FpgaFirmwareUpdater<'t, F, T> {
    /// Updater for the default image partition and FPGA part
    pub fn new(flash: F, timer: &'t T) -> Self {
        Self::with_partition(flash, timer, DEFAULT_FPGA_IMAGE_OFFSET, DEFAULT_FPGA_IMAGE_SIZE)
    }

    /// Updater for an explicit image partition
    pub fn with_partition(flash: F, timer: &'t T, image_offset: u32, image_size: u32) -> Self {
        Self {
            flash,
            timer,
            device_name: FPGA_DEVICE_NAME,
            image_offset,
            image_size,
            state: UpdateState::ReadBitHeader,
            last_error: None,
            rx: RingBuffer::new(),
            pending: RingBuffer::new(),
            big_words_left: 0,
            write_ptr: image_offset,
        }
    }

    /// Expect bitstreams built for `name` instead of the default part
    #[must_use]
    pub fn with_device(mut self, name: &'static str) -> Self {
        self.device_name = name;
        self
    }

    /// Current parser state
    #[must_use]
    pub const fn state(&self) -> UpdateState {
        self.state
    }

    /// The error that moved the updater to `Failed`, if any
    #[must_use]
    pub const fn last_error(&self) -> Option<UpdateError> {
        self.last_error
    }

    /// Bytes programmed into the partition so far in this session
    #[must_use]
    pub const fn bytes_written(&self) -> u32 {
        self.write_ptr - self.image_offset
    }

    /// Access the flash device
    pub const fn flash(&self) -> &F {
        &self.flash
    }

    /// Mutable access to the flash device
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Give the flash device back
    pub fn release(self) -> F {
        self.flash
    }

    /// Start a new session
    pub fn on_device_opened(&mut self) {
        info!("Bitstream session opened");
        self.rx.reset();
        self.pending.reset();
        self.state = UpdateState::ReadBitHeader;
        self.last_error = None;
        self.big_words_left = 0;
        self.write_ptr = self.image_offset;
    }

    /// Consume a chunk of the incoming file
    ///
    /// Chunks larger than the free receive space are buffered in pieces with
    /// parsing in between. Input is dropped once the session is `Done` or
    /// `Failed`.
    pub fn on_rx_data(&mut self, mut data: &[u8]) {
        while !data.is_empty() && !self.state.is_terminal() {
            let n = data.len().min(self.rx.free());
            if n == 0 || !self.rx.push(&data[..n]) {
                error!("Bitstream receive buffer full in state {}", self.state.name());
                self.fail(UpdateError::RxOverflow);
                return;
            }
            data = &data[n..];

            if let Err(err) = self.process() {
                self.fail(err);
            }
        }
    }

    /// End the session, flushing and verifying the last partial page
    pub fn on_device_closed(&mut self) {
        if self.state == UpdateState::Failed {
            warn!("Bitstream session closed after failure");
            return;
        }
        if self.state != UpdateState::Done {
            warn!("Bitstream session closed in state {}", self.state.name());
        }

        let flushed = self.flush_full_pages().and_then(|()| {
            let remaining = self.pending.len();
            if remaining > 0 {
                self.write_block(remaining)
            } else {
                Ok(())
            }
        });

        match flushed {
            Ok(()) => info!("Bitstream session closed, {} bytes written", self.bytes_written()),
            Err(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: UpdateError) {
        error!("Bitstream update failed in state {}: {}", self.state.name(), err);
        self.state = UpdateState::Failed;
        self.last_error = Some(err);
    }

    /// Step the parser until it stops making progress, flushing after each step
    fn process(&mut self) -> Result<(), UpdateError> {
        loop {
            let progress = self.step()?;
            self.flush_full_pages()?;
            if !progress || self.state.is_terminal() {
                return Ok(());
            }
        }
    }

    fn step(&mut self) -> Result<bool, UpdateError> {
        match self.state {
            UpdateState::ReadBitHeader => self.read_bit_header(),
            UpdateState::ReadHeaderRecords => self.read_header_record(),
            UpdateState::SyncWait => Ok(self.sync_wait()),
            UpdateState::Bitstream => self.read_packet(),
            UpdateState::BigWrite => Ok(self.big_write()),
            UpdateState::Done | UpdateState::Failed => Ok(false),
        }
    }

    fn read_bit_header(&mut self) -> Result<bool, UpdateError> {
        let buf = self.rx.peek();
        if buf.len() < BIT_FILE_MAGIC.len() {
            return Ok(false);
        }
        if buf[..BIT_FILE_MAGIC.len()] != BIT_FILE_MAGIC {
            error!("Bad bitstream magic");
            return Err(UpdateError::BadMagic);
        }

        self.rx.pop(BIT_FILE_MAGIC.len());
        self.state = UpdateState::ReadHeaderRecords;
        Ok(true)
    }

    fn read_header_record(&mut self) -> Result<bool, UpdateError> {
        let capacity = self.rx.capacity();
        let buf = self.rx.peek();
        let Some(&kind) = buf.first() else {
            return Ok(false);
        };

        // 'e' carries a 32-bit length and no payload of its own
        if kind == RECORD_BITSTREAM {
            if buf.len() < 5 {
                return Ok(false);
            }
            let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
            self.rx.pop(5);

            info!("Bitstream is {} bytes", len);
            if len > self.image_size {
                error!("Bitstream of {} bytes does not fit in {} byte partition", len, self.image_size);
                return Err(UpdateError::ImageTooLarge);
            }

            self.erase_partition()?;
            self.state = UpdateState::SyncWait;
            return Ok(true);
        }

        if buf.len() < 3 {
            return Ok(false);
        }
        let total = 3 + usize::from(u16::from_be_bytes([buf[1], buf[2]]));
        if total > capacity {
            error!("Bitstream header record {:#x} is {} bytes", kind, total);
            return Err(UpdateError::PacketTooLarge);
        }
        if buf.len() < total {
            return Ok(false);
        }

        let text = record_text(&buf[3..total]);
        match kind {
            b'a' => info!("Design: {}", text),
            b'b' => {
                if text != self.device_name {
                    error!("Bitstream is for {}, expected {}", text, self.device_name);
                    return Err(UpdateError::WrongDevice);
                }
                info!("Device: {}", text);
            }
            b'c' => info!("Build date: {}", text),
            b'd' => info!("Build time: {}", text),
            other => warn!("Skipping unknown bitstream header record {:#x}", other),
        }

        self.rx.pop(total);
        Ok(true)
    }

    /// Copy bytes to the write buffer until the sync word has been copied
    fn sync_wait(&mut self) -> bool {
        let mut progress = false;
        loop {
            let buf = self.rx.peek();
            if buf.len() < SYNC_WORD.len() || self.pending.free() < SYNC_WORD.len() {
                return progress;
            }

            if buf[..SYNC_WORD.len()] == SYNC_WORD {
                self.rx.transfer_to(&mut self.pending, SYNC_WORD.len());
                debug!("Found sync word");
                self.state = UpdateState::Bitstream;
                return true;
            }

            self.rx.transfer_to(&mut self.pending, 1);
            progress = true;
        }
    }

    fn read_packet(&mut self) -> Result<bool, UpdateError> {
        let page = self.page_size()?;
        let buf = self.rx.peek();
        let Some(word) = read_be_word(buf, 0) else {
            return Ok(false);
        };

        match PacketHeader::decode(word) {
            PacketHeader::Type1 {
                opcode,
                register,
                words,
            } => {
                let size = 4 * (usize::from(words) + 1);
                if size > self.pending.capacity() - page {
                    error!("Type 1 packet of {} words does not fit in the write buffer", words);
                    return Err(UpdateError::PacketTooLarge);
                }
                if buf.len() < size || self.pending.free() < size {
                    return Ok(false);
                }

                let mut desync = false;
                if register == REG_CMD && words == 1 {
                    let command = read_be_word(buf, 1).unwrap_or(0);
                    trace!("CMD {}", command_name(command));
                    desync = opcode == Opcode::Write && command & 0x1f == CMD_DESYNC;
                } else if words > 0 {
                    trace!("{} {} words {}", register_name(register), opcode.name(), words);
                } else {
                    trace!("{}", opcode.name());
                }

                self.rx.transfer_to(&mut self.pending, size);
                if desync {
                    info!("End of bitstream");
                    self.state = UpdateState::Done;
                }
                Ok(true)
            }
            PacketHeader::Type2 { opcode, words } => {
                if self.pending.free() < 4 {
                    return Ok(false);
                }
                trace!("Type 2 {} of {} words", opcode.name(), words);
                self.rx.transfer_to(&mut self.pending, 4);
                self.big_words_left = words;
                if words > 0 {
                    self.state = UpdateState::BigWrite;
                }
                Ok(true)
            }
            PacketHeader::Unknown(kind) => {
                error!("Invalid packet type {} (header {:#x})", kind, word);
                Err(UpdateError::InvalidPacketType(kind))
            }
        }
    }

    /// Copy as many whole payload words as both buffers allow
    fn big_write(&mut self) -> bool {
        let left = usize::try_from(self.big_words_left).unwrap_or(usize::MAX);
        let words = (self.rx.len() / 4).min(left).min(self.pending.free() / 4);
        if words == 0 {
            return false;
        }

        self.rx.transfer_to(&mut self.pending, words * 4);
        // words <= big_words_left, so this fits
        self.big_words_left -= words as u32;
        if self.big_words_left == 0 {
            debug!("Bulk write complete");
            self.state = UpdateState::Bitstream;
        }
        true
    }

    fn erase_partition(&mut self) -> Result<(), UpdateError> {
        let sector = self.flash.erase_block_size();
        if sector == 0 {
            error!("Flash reports a zero erase block size");
            return Err(UpdateError::EraseFailed {
                addr: self.image_offset,
            });
        }
        let sectors = self.image_size.div_ceil(sector);
        let start = self.timer.count();

        info!(
            "Erasing {} sectors of {} bytes at {:#x}",
            sectors, sector, self.image_offset
        );
        for i in 0..sectors {
            let addr = self.image_offset + i * sector;
            if addr % PROGRESS_LOG_INTERVAL == 0 {
                debug!("Erasing {:#x}", addr);
            }
            if !self.flash.erase_sector(addr) {
                error!("Erase failed at {:#x}", addr);
                return Err(UpdateError::EraseFailed { addr });
            }
        }

        let end = self.partition_end();
        let mut block = [0u8; BLANK_CHECK_BLOCK];
        let mut addr = self.image_offset;
        while addr < end {
            let len = BLANK_CHECK_BLOCK.min((end - addr) as usize);
            if addr % PROGRESS_LOG_INTERVAL == 0 {
                debug!("Blank checking {:#x}", addr);
            }
            self.flash.read_data(addr, &mut block[..len]);
            if let Some(pos) = block[..len].iter().position(|&b| b != 0xff) {
                let bad = addr + pos as u32;
                error!("Blank check failed at {:#x} (read {:#x})", bad, block[pos]);
                return Err(UpdateError::BlankCheckFailed {
                    addr: bad,
                    value: block[pos],
                });
            }
            addr += len as u32;
        }

        let (ms, tenths) = ticks_to_ms_tenths(elapsed(start, self.timer.count()));
        info!("Erase complete ({}.{} ms)", ms, tenths);
        Ok(())
    }

    fn page_size(&self) -> Result<usize, UpdateError> {
        let page = self.flash.max_write_block_size() as usize;
        if page == 0 || page > MAX_READBACK_BLOCK {
            error!("Flash write block of {} bytes is unsupported (max {})", page, MAX_READBACK_BLOCK);
            return Err(UpdateError::ReadbackBlockTooLarge);
        }
        Ok(page)
    }

    fn partition_end(&self) -> u32 {
        self.image_offset.saturating_add(self.image_size)
    }

    fn flush_full_pages(&mut self) -> Result<(), UpdateError> {
        let page = self.page_size()?;
        while self.pending.len() >= page {
            self.write_block(page)?;
        }
        Ok(())
    }

    /// Program the oldest `len` pending bytes at the write cursor and verify them
    fn write_block(&mut self, len: usize) -> Result<(), UpdateError> {
        let addr = self.write_ptr;
        if u64::from(addr) + len as u64 > u64::from(self.partition_end()) {
            error!("Write of {} bytes at {:#x} is past the end of the partition", len, addr);
            return Err(UpdateError::WriteOutOfBounds { addr });
        }
        if addr % PROGRESS_LOG_INTERVAL == 0 {
            info!("Writing {:#x}", addr);
        }

        let data = &self.pending.peek()[..len];
        if !self.flash.write_data(addr, data) {
            error!("Write of {} bytes failed at {:#x}", len, addr);
            return Err(UpdateError::WriteFailed {
                addr,
                len: len as u32,
            });
        }

        let mut readback = [0u8; MAX_READBACK_BLOCK];
        self.flash.read_data(addr, &mut readback[..len]);
        if let Some(pos) = data.iter().zip(&readback[..len]).position(|(a, b)| a != b) {
            let bad = addr + pos as u32;
            error!(
                "Readback mismatch at {:#x} (wrote {:#x}, read {:#x})",
                bad, data[pos], readback[pos]
            );
            return Err(UpdateError::ReadbackMismatch {
                addr: bad,
                expected: data[pos],
                actual: readback[pos],
            });
        }

        self.pending.pop(len);
        self.write_ptr += len as u32;
        Ok(())
    }
}

/// Header record payload as text, up to the NUL terminator
fn record_text(payload: &[u8]) -> &str {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    core::str::from_utf8(&payload[..end]).unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_text_stops_at_nul() {
        assert_eq!(record_text(b"7a100tfgg484\0"), "7a100tfgg484");
        assert_eq!(record_text(b"no terminator"), "no terminator");
        assert_eq!(record_text(&[0xff, 0xfe, 0]), "?");
    }

    #[test]
    fn terminal_states() {
        assert!(UpdateState::Done.is_terminal());
        assert!(UpdateState::Failed.is_terminal());
        assert!(!UpdateState::BigWrite.is_terminal());
        assert_eq!(UpdateState::SyncWait.name(), "SYNC_WAIT");
    }
}
