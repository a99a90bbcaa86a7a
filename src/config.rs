//! System configuration and hardware constants
//!
//! Compile-time constants for the scheduler, supervisor, bitstream updater and
//! bootloader. All pin mappings and sizing parameters are centralized here.

/// Tick timer resolution (10 kHz, 100 µs per tick)
pub const TICK_HZ: u32 = 10_000;

/// Ticks per millisecond
pub const TICKS_PER_MS: u32 = TICK_HZ / 1000;

/// Tick count at which the scheduler restarts the timer and rebases timer tasks (6 s)
pub const TIMER_WRAP_CEILING: u32 = 60_000;

/// Maximum number of polled tasks
pub const MAX_TASKS: usize = 16;

/// Maximum number of timer tasks (strict subset of all tasks)
pub const MAX_TIMER_TASKS: usize = 8;

/// Settle delay between rails during an orderly power-off (1 ms)
pub const RAIL_OFF_SETTLE_TICKS: u32 = 10;

/// Capacity of the bitstream receive and write-staging buffers
pub const BIT_RX_BUFFER_SIZE: usize = 4096;

/// Largest flash program page the updater can read back for verification
pub const MAX_READBACK_BLOCK: usize = 512;

/// Block size used when blank-checking an erased partition
pub const BLANK_CHECK_BLOCK: usize = 256;

/// Flash offsets at multiples of this are logged during erase and write (1 MiB)
pub const PROGRESS_LOG_INTERVAL: u32 = 0x0010_0000;

/// Default offset of the FPGA image within its flash
pub const DEFAULT_FPGA_IMAGE_OFFSET: u32 = 0x0000_0000;

/// Default size of the FPGA image partition (4 MiB)
pub const DEFAULT_FPGA_IMAGE_SIZE: u32 = 0x0040_0000;

/// Expected FPGA part name in the bitstream header
pub const FPGA_DEVICE_NAME: &str = "7a100tfgg484";

/// Object store key for the last booted application version string
pub const IMAGE_VERSION_KEY: &str = "firmware.imageVersion";

/// Object store key for the last known application CRC
pub const IMAGE_CRC_KEY: &str = "firmware.crc";

/// Maximum length of the application version string, excluding the terminator
pub const APP_VERSION_MAX_LEN: usize = 32;

/// Offset of the version string within the application image
/// (vector table size rounded up to 32-byte alignment)
pub const APP_VERSION_OFFSET: usize = 0x400;

/// Heartbeat LED toggle period (500 ms)
pub const HEARTBEAT_PERIOD_TICKS: u32 = 5_000;

/// Timeout for a PGOOD-monitored rail to come up (50 ms)
pub const RAIL_PGOOD_TIMEOUT_TICKS: u16 = 500;

/// Settle delay after enabling a rail with no feedback (5 ms)
pub const RAIL_SETTLE_TICKS: u16 = 50;

/// Nominal 1V8 auxiliary rail voltage
pub const AUX_1V8_NOMINAL_MV: u32 = 1800;

/// Tolerance on sensed rails, in percent
pub const SENSED_RAIL_TOLERANCE_PCT: u32 = 5;

/// Time after releasing a delayed reset before it counts as ready (10 ms)
pub const RESET_SETTLE_TICKS: u16 = 100;

/// Pin assignments for GPIO
pub mod pins {
    //! GPIO pin assignments matching the supervisor board schematic

    /// Status LED
    pub const LED_STATUS: &str = "PA5";

    /// 12V input supply PGOOD (from the intermediate bus converter)
    pub const VIN_PGOOD: &str = "PB0";

    /// 3V3 rail enable
    pub const EN_3V3: &str = "PB1";

    /// 3V3 rail PGOOD
    pub const PGOOD_3V3: &str = "PB2";

    /// 1V0 FPGA core rail enable (active low)
    pub const EN_1V0_N: &str = "PB10";

    /// 1V0 FPGA core rail PGOOD
    pub const PGOOD_1V0: &str = "PB11";

    /// 1V8 auxiliary rail enable
    pub const EN_1V8: &str = "PB12";

    /// 1V8 auxiliary rail sense (ADC1_IN1, 1:1)
    pub const SENSE_1V8: &str = "PA0";

    /// FPGA PROG_B reset (active low)
    pub const FPGA_PROG_N: &str = "PC0";

    /// FPGA DONE (active high)
    pub const FPGA_DONE: &str = "PC1";

    /// Management MCU reset (active low)
    pub const MCU_RST_N: &str = "PC2";
}
