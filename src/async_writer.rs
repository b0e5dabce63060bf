use embedded_storage_async::nor_flash::{NorFlash, ReadNorFlash};
use embedded_storage::nor_flash::ErrorType;

use crate::error::Error;
use crate::traits::AsyncFlashDevice;
use crate::writer::{alloc_buffer, sector_overlap};
use crate::{ERASED_BYTE, PAGE_SIZE, READ_ALIGN, SECTOR_SIZE};

/// Async twin of [`SectorWriter`](crate::SectorWriter).
///
/// Identical sector walk and buffering; the raw device calls are awaited
/// instead of blocking.
pub struct AsyncSectorWriter<D: AsyncFlashDevice> {
    device: D,
}

impl<D: AsyncFlashDevice> AsyncSectorWriter<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    /// Total addressable size of the underlying device in bytes.
    pub fn capacity(&self) -> usize {
        self.device.capacity()
    }

    /// Consumes the writer and returns the raw device.
    pub fn release(self) -> D {
        self.device
    }

    /// Reads `out.len()` bytes starting at `address`, which may be
    /// arbitrarily unaligned.
    pub async fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), Error<D::Error>> {
        if out.is_empty() {
            return Ok(());
        }
        self.check_bounds(address, out.len())?;

        let offset = (address % READ_ALIGN) as usize;
        if offset == 0 {
            return self.read_exact(address, out).await;
        }

        let mut staging = alloc_buffer(out.len() + offset)?;
        self.read_exact(address - offset as u32, &mut staging)
            .await?;
        out.copy_from_slice(&staging[offset..]);
        Ok(())
    }

    /// Writes `data` at `address`; the range may be unaligned and span
    /// multiple sectors. Bytes outside the range within touched sectors are
    /// preserved. Not atomic across sectors.
    pub async fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error<D::Error>> {
        self.rewrite_span(address, data.len(), Some(data)).await
    }

    /// Resets `length` bytes starting at `address` to [`ERASED_BYTE`],
    /// preserving the rest of every touched sector.
    pub async fn erase(&mut self, address: u32, length: usize) -> Result<(), Error<D::Error>> {
        self.rewrite_span(address, length, None).await
    }

    async fn rewrite_span(
        &mut self,
        address: u32,
        length: usize,
        data: Option<&[u8]>,
    ) -> Result<(), Error<D::Error>> {
        if length == 0 {
            return Err(Error::InvalidLength);
        }
        self.check_bounds(address, length)?;

        let end = address + (length - 1) as u32;
        let start_sector = address / SECTOR_SIZE;
        let end_sector = end / SECTOR_SIZE;

        let mut page = alloc_buffer(PAGE_SIZE as usize)?;
        for sector in start_sector..=end_sector {
            let base = sector * SECTOR_SIZE;

            self.read_exact(base, &mut page).await?;

            // Cannot miss for sectors inside the span; skipped defensively.
            let Some(overlap) = sector_overlap(base, address, end) else {
                continue;
            };
            match data {
                Some(data) => page[overlap.buffer].copy_from_slice(&data[overlap.data]),
                None => page[overlap.buffer].fill(ERASED_BYTE),
            }

            trace!("rewriting sector {} at {:#x}", sector, base);
            self.erase_one(base).await?;
            self.program_exact(base, &page).await?;
        }

        Ok(())
    }

    async fn read_exact(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error<D::Error>> {
        let got = self
            .device
            .read(address, buf)
            .await
            .map_err(Error::Device)?;
        if got != buf.len() {
            warn!("short read at {:#x}: {} of {}", address, got, buf.len());
            return Err(Error::ShortTransfer);
        }
        Ok(())
    }

    async fn program_exact(&mut self, address: u32, data: &[u8]) -> Result<(), Error<D::Error>> {
        let got = self
            .device
            .program(address, data)
            .await
            .map_err(Error::Device)?;
        if got != data.len() {
            warn!("short program at {:#x}: {} of {}", address, got, data.len());
            return Err(Error::ShortTransfer);
        }
        Ok(())
    }

    async fn erase_one(&mut self, address: u32) -> Result<(), Error<D::Error>> {
        let got = self
            .device
            .erase_sector(address)
            .await
            .map_err(Error::Device)?;
        if got != SECTOR_SIZE as usize {
            warn!("short erase at {:#x}: {} of {}", address, got, SECTOR_SIZE);
            return Err(Error::ShortTransfer);
        }
        Ok(())
    }

    fn check_bounds(&self, address: u32, length: usize) -> Result<(), Error<D::Error>> {
        let end = u64::from(address) + length as u64;
        if end > self.device.capacity() as u64 {
            return Err(Error::OutOfBounds);
        }
        Ok(())
    }
}

impl<D: AsyncFlashDevice> ErrorType for AsyncSectorWriter<D>
where
    D::Error: core::fmt::Debug,
{
    type Error = Error<D::Error>;
}

impl<D: AsyncFlashDevice> ReadNorFlash for AsyncSectorWriter<D>
where
    D::Error: core::fmt::Debug,
{
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        AsyncSectorWriter::read(self, offset, bytes).await
    }

    fn capacity(&self) -> usize {
        self.device.capacity()
    }
}

/// Byte-granular [`NorFlash`]: unaligned writes and erases are widened to
/// whole sectors via read-modify-write instead of being rejected.
impl<D: AsyncFlashDevice> NorFlash for AsyncSectorWriter<D>
where
    D::Error: core::fmt::Debug,
{
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = SECTOR_SIZE as usize;

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        AsyncSectorWriter::write(self, offset, bytes).await
    }

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if to < from {
            return Err(Error::OutOfBounds);
        }
        if from == to {
            return Ok(());
        }
        AsyncSectorWriter::erase(self, from, (to - from) as usize).await
    }
}
