//! Flash device seam
//!
//! The updater only needs sector erase, page program and read. Whether that
//! is a SPI NOR behind a quad controller or a `Vec<u8>` in a test is up to
//! the implementation.

/// A flash chip holding the FPGA image partition
pub trait FlashDevice {
    /// Size of one erasable sector in bytes
    fn erase_block_size(&self) -> u32;

    /// Erase the sector starting at `addr`; false on failure
    fn erase_sector(&mut self, addr: u32) -> bool;

    /// Read `buf.len()` bytes starting at `addr`
    fn read_data(&mut self, addr: u32, buf: &mut [u8]);

    /// Program `data` starting at `addr`; false on failure
    fn write_data(&mut self, addr: u32, data: &[u8]) -> bool;

    /// Largest number of bytes a single [`FlashDevice::write_data`] can program
    fn max_write_block_size(&self) -> u32;
}

impl<F: FlashDevice + ?Sized> FlashDevice for &mut F {
    fn erase_block_size(&self) -> u32 {
        (**self).erase_block_size()
    }

    fn erase_sector(&mut self, addr: u32) -> bool {
        (**self).erase_sector(addr)
    }

    fn read_data(&mut self, addr: u32, buf: &mut [u8]) {
        (**self).read_data(addr, buf);
    }

    fn write_data(&mut self, addr: u32, data: &[u8]) -> bool {
        (**self).write_data(addr, data)
    }

    fn max_write_block_size(&self) -> u32 {
        (**self).max_write_block_size()
    }
}
