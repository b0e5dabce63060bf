use alloc::vec::Vec;
use core::ops::Range;

use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

use crate::error::Error;
use crate::traits::FlashDevice;
use crate::{ERASED_BYTE, PAGE_SIZE, READ_ALIGN, SECTOR_SIZE};

/// Allocates a zeroed transient buffer, reporting allocation failure as an
/// error instead of aborting.
pub(crate) fn alloc_buffer<E>(len: usize) -> Result<Vec<u8>, Error<E>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailed)?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Overlap of a request with one sector.
pub(crate) struct SectorOverlap {
    /// Byte range within the page buffer to replace.
    pub buffer: Range<usize>,
    /// Corresponding byte range within the caller's data.
    pub data: Range<usize>,
}

/// Computes the overlap between the sector starting at `sector_base` and the
/// inclusive request range [`start`, `end`]. `None` if they do not intersect.
pub(crate) fn sector_overlap(sector_base: u32, start: u32, end: u32) -> Option<SectorOverlap> {
    let sector_base = u64::from(sector_base);
    let sector_end = sector_base + u64::from(SECTOR_SIZE) - 1;
    let (start, end) = (u64::from(start), u64::from(end));

    if sector_end < start || sector_base > end {
        return None;
    }

    let from = start.max(sector_base);
    let to = end.min(sector_end);
    Some(SectorOverlap {
        buffer: (from - sector_base) as usize..(to - sector_base + 1) as usize,
        data: (from - start) as usize..(to - start + 1) as usize,
    })
}

/// Blocking sector-aligned flash writer.
///
/// Owns the raw device exclusively; `&mut self` on every operation makes a
/// single instance race-free by construction. Wrap it in
/// [`SharedFlash`](crate::SharedFlash) to share one device between tasks.
pub struct SectorWriter<D: FlashDevice> {
    device: D,
}

impl<D: FlashDevice> SectorWriter<D> {
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

    /// Reads `out.len()` bytes starting at `address`.
    ///
    /// `address` may be arbitrarily unaligned; if it is not a multiple of
    /// [`READ_ALIGN`] the engine over-reads from the aligned-down address
    /// into a transient buffer and copies out exactly the requested bytes.
    pub fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), Error<D::Error>> {
        if out.is_empty() {
            return Ok(());
        }
        self.check_bounds(address, out.len())?;

        let offset = (address % READ_ALIGN) as usize;
        if offset == 0 {
            return self.read_exact(address, out);
        }

        let mut staging = alloc_buffer(out.len() + offset)?;
        self.read_exact(address - offset as u32, &mut staging)?;
        out.copy_from_slice(&staging[offset..]);
        Ok(())
    }

    /// Writes `data` at `address`, which may begin and end at arbitrary
    /// offsets and span multiple sectors.
    ///
    /// Every touched sector is read back, erased and reprogrammed, so bytes
    /// outside the requested range keep their previous value. The first
    /// failing sector aborts the operation; sectors already rewritten are
    /// not rolled back.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error<D::Error>> {
        self.rewrite_span(address, data.len(), Some(data))
    }

    /// Resets `length` bytes starting at `address` to [`ERASED_BYTE`].
    ///
    /// Same sector walk as [`write`](Self::write), with the overlapping
    /// range filled with 0xFF instead of caller data. Bytes outside the
    /// range within touched sectors are preserved.
    pub fn erase(&mut self, address: u32, length: usize) -> Result<(), Error<D::Error>> {
        self.rewrite_span(address, length, None)
    }

    /// Read-modify-write walk over every sector intersecting the span.
    fn rewrite_span(
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

            self.read_exact(base, &mut page)?;

            // Cannot miss for sectors inside the span; skipped defensively.
            let Some(overlap) = sector_overlap(base, address, end) else {
                continue;
            };
            match data {
                Some(data) => page[overlap.buffer].copy_from_slice(&data[overlap.data]),
                None => page[overlap.buffer].fill(ERASED_BYTE),
            }

            trace!("rewriting sector {} at {:#x}", sector, base);
            self.erase_one(base)?;
            self.program_exact(base, &page)?;
        }

        Ok(())
    }

    fn read_exact(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error<D::Error>> {
        let got = self.device.read(address, buf).map_err(Error::Device)?;
        if got != buf.len() {
            warn!("short read at {:#x}: {} of {}", address, got, buf.len());
            return Err(Error::ShortTransfer);
        }
        Ok(())
    }

    fn program_exact(&mut self, address: u32, data: &[u8]) -> Result<(), Error<D::Error>> {
        let got = self.device.program(address, data).map_err(Error::Device)?;
        if got != data.len() {
            warn!("short program at {:#x}: {} of {}", address, got, data.len());
            return Err(Error::ShortTransfer);
        }
        Ok(())
    }

    fn erase_one(&mut self, address: u32) -> Result<(), Error<D::Error>> {
        let got = self.device.erase_sector(address).map_err(Error::Device)?;
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

impl<D: FlashDevice> ErrorType for SectorWriter<D>
where
    D::Error: core::fmt::Debug,
{
    type Error = Error<D::Error>;
}

impl<D: FlashDevice> ReadNorFlash for SectorWriter<D>
where
    D::Error: core::fmt::Debug,
{
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        SectorWriter::read(self, offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.device.capacity()
    }
}

/// Byte-granular [`NorFlash`]: unaligned writes and erases are widened to
/// whole sectors via read-modify-write instead of being rejected.
impl<D: FlashDevice> NorFlash for SectorWriter<D>
where
    D::Error: core::fmt::Debug,
{
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = SECTOR_SIZE as usize;

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        SectorWriter::write(self, offset, bytes)
    }

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if to < from {
            return Err(Error::OutOfBounds);
        }
        if from == to {
            return Ok(());
        }
        SectorWriter::erase(self, from, (to - from) as usize)
    }
}
