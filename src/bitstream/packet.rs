//! Configuration packet headers
//!
//! After the sync word a bitstream is a series of big-endian 32-bit packet
//! headers, each optionally followed by payload words.
//!
//! ```text
//!  type 1:  [31:29]=001  [28:27]=opcode  [26:13]=register  [10:0]=word count
//!  type 2:  [31:29]=010  [28:27]=opcode  [26:0]=word count (payload for the
//!           register addressed by the preceding type 1 packet)
//! ```

/// Synchronization word that precedes the first packet
pub const SYNC_WORD: [u8; 4] = [0xaa, 0x99, 0x55, 0x66];

/// Fixed prefix of a `.bit` file
pub const BIT_FILE_MAGIC: [u8; 13] = [
    0x00, 0x09, 0x0f, 0xf0, 0x0f, 0xf0, 0x0f, 0xf0, 0x0f, 0xf0, 0x00, 0x00, 0x01,
];

/// Header record that marks the start of the raw bitstream
pub const RECORD_BITSTREAM: u8 = b'e';

/// Command register address
pub const REG_CMD: u16 = 0x04;

/// Command that ends the configuration stream
pub const CMD_DESYNC: u32 = 0x0d;

/// Packet opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// No operation
    Nop,
    /// Register read
    Read,
    /// Register write
    Write,
    /// Reserved encoding
    Reserved,
}

impl Opcode {
    const fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::Nop,
            1 => Self::Read,
            2 => Self::Write,
            _ => Self::Reserved,
        }
    }

    /// Lowercase mnemonic
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Read => "read",
            Self::Write => "write",
            Self::Reserved => "reserved",
        }
    }
}

/// Decoded packet header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketHeader {
    /// Register access with up to 2047 inline payload words
    Type1 {
        /// Operation
        opcode: Opcode,
        /// Register address
        register: u16,
        /// Payload words following the header
        words: u16,
    },
    /// Bulk payload for the previously addressed register
    Type2 {
        /// Operation
        opcode: Opcode,
        /// Payload words following the header
        words: u32,
    },
    /// Any other packet type
    Unknown(u8),
}

impl PacketHeader {
    /// Decode a header word
    #[must_use]
    pub const fn decode(word: u32) -> Self {
        let opcode = Opcode::from_bits(word >> 27);
        match word >> 29 {
            1 => Self::Type1 {
                opcode,
                register: ((word >> 13) & 0x3fff) as u16,
                words: (word & 0x7ff) as u16,
            },
            2 => Self::Type2 {
                opcode,
                words: word & 0x07ff_ffff,
            },
            other => Self::Unknown(other as u8),
        }
    }

    /// Decode the first four bytes of `bytes` as a big-endian header
    ///
    /// Returns `None` if fewer than four bytes are given.
    #[must_use]
    pub fn from_be_bytes(bytes: &[u8]) -> Option<Self> {
        read_be_word(bytes, 0).map(Self::decode)
    }

    /// Encode back into a header word
    #[must_use]
    pub const fn encode(self) -> u32 {
        match self {
            Self::Type1 {
                opcode,
                register,
                words,
            } => (1 << 29) | ((opcode as u32) << 27) | (((register as u32) & 0x3fff) << 13) | ((words as u32) & 0x7ff),
            Self::Type2 { opcode, words } => (2 << 29) | ((opcode as u32) << 27) | (words & 0x07ff_ffff),
            Self::Unknown(kind) => ((kind as u32) & 7) << 29,
        }
    }
}

/// Read the big-endian word at word index `index`
#[must_use]
pub fn read_be_word(bytes: &[u8], index: usize) -> Option<u32> {
    let start = index * 4;
    let word = bytes.get(start..start + 4)?;
    Some(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

const REGISTER_NAMES: [&str; 32] = [
    "CRC", "FAR", "FDRI", "FDRO", "CMD", "CTL0", "MASK", "STAT", "LOUT", "COR0", "MFWR", "CBC", "IDCODE", "AXSS",
    "COR1", "RSVD_0f", "WBSTAR", "TIMER", "RSVD_12", "RSVD_13", "RSVD_14", "RSVD_15", "BOOTSTS", "RSVD_17", "CTL1",
    "RSVD_19", "RSVD_1a", "RSVD_1b", "RSVD_1c", "RSVD_1d", "RSVD_1e", "BSPI",
];

const COMMAND_NAMES: [&str; 32] = [
    "NULL", "WCFG", "MFW", "DHIGH/LFRM", "RCFG", "START", "RCAP", "RCRC", "AGHIGH", "SWITCH", "GRESTORE", "SHUTDOWN",
    "GCAPTURE", "DESYNC", "RSVD_0e", "IPROG", "CRCC", "LTIMER", "BSPI_READ", "FALL_EDGE", "RSVD_14", "RSVD_15",
    "RSVD_16", "RSVD_17", "RSVD_18", "RSVD_19", "RSVD_1a", "RSVD_1b", "RSVD_1c", "RSVD_1d", "RSVD_1e", "RSVD_1f",
];

/// Name of a configuration register
#[must_use]
pub fn register_name(register: u16) -> &'static str {
    REGISTER_NAMES.get(usize::from(register)).copied().unwrap_or("?")
}

/// Name of a command register value
#[must_use]
pub fn command_name(command: u32) -> &'static str {
    COMMAND_NAMES[(command & 0x1f) as usize]
}
