/// Raw sector-erase/page-program flash controller.
///
/// This is the capability the writer engine is built on. Implementations own
/// everything device-specific: bus-mode switching, write unlock/relock,
/// wake-up and busy polling. The engine only relies on the NOR contract:
/// erase sets every bit in a sector to 1, program can only clear bits.
pub trait FlashDevice {
    type Error;

    /// Total addressable size of the device in bytes.
    fn capacity(&self) -> usize;

    /// Reads `buf.len()` bytes starting at `address` into `buf`.
    ///
    /// `address` must be aligned to [`READ_ALIGN`](crate::READ_ALIGN) bytes.
    /// Returns the number of bytes actually read; a short count signals a
    /// failed transfer.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Programs `data` at `address`, which must lie in previously erased
    /// (0xFF) memory. Returns the number of bytes actually programmed.
    fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, Self::Error>;

    /// Erases the [`SECTOR_SIZE`](crate::SECTOR_SIZE)-byte sector starting at
    /// `address` (sector-aligned) to all 1s (0xFF per byte). Returns the
    /// number of bytes erased.
    fn erase_sector(&mut self, address: u32) -> Result<usize, Self::Error>;
}

/// Async twin of [`FlashDevice`].
pub trait AsyncFlashDevice {
    type Error;

    /// Total addressable size of the device in bytes.
    fn capacity(&self) -> usize;

    /// Reads `buf.len()` bytes starting at `address` into `buf`.
    ///
    /// `address` must be aligned to [`READ_ALIGN`](crate::READ_ALIGN) bytes.
    /// Returns the number of bytes actually read.
    async fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Programs `data` at `address` in previously erased memory. Returns the
    /// number of bytes actually programmed.
    async fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, Self::Error>;

    /// Erases the sector starting at `address` (sector-aligned). Returns the
    /// number of bytes erased.
    async fn erase_sector(&mut self, address: u32) -> Result<usize, Self::Error>;
}
