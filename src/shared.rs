use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;

use crate::async_writer::AsyncSectorWriter;
use crate::error::Error;
use crate::traits::{AsyncFlashDevice, FlashDevice};
use crate::writer::SectorWriter;

/// One flash device shared between tasks.
///
/// Owns the [`SectorWriter`] behind a single mutex; every operation runs for
/// its full duration inside one lock scope, so a multi-sector write blocks
/// all other flash users until it returns. The lock is released on every
/// path, success or failure. There is no timeout: lock acquisition waits as
/// long as it takes.
pub struct SharedFlash<R: RawMutex, D: FlashDevice> {
    inner: BlockingMutex<R, RefCell<SectorWriter<D>>>,
}

impl<R: RawMutex, D: FlashDevice> SharedFlash<R, D> {
    pub fn new(device: D) -> Self {
        Self {
            inner: BlockingMutex::new(RefCell::new(SectorWriter::new(device))),
        }
    }

    /// Opens a session on the device.
    ///
    /// Every read/write/erase goes through a session, so a closed (dropped)
    /// session cannot be used by construction. Opening does not hold the
    /// lock; individual operations do.
    pub fn open(&self) -> FlashSession<'_, R, D> {
        debug!("flash session opened");
        FlashSession { flash: self }
    }
}

/// Open session on a [`SharedFlash`].
pub struct FlashSession<'a, R: RawMutex, D: FlashDevice> {
    flash: &'a SharedFlash<R, D>,
}

impl<R: RawMutex, D: FlashDevice> FlashSession<'_, R, D> {
    /// Total addressable size of the device in bytes.
    pub fn capacity(&self) -> usize {
        self.flash.inner.lock(|w| w.borrow().capacity())
    }

    /// See [`SectorWriter::read`].
    pub fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), Error<D::Error>> {
        self.flash.inner.lock(|w| w.borrow_mut().read(address, out))
    }

    /// See [`SectorWriter::write`].
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error<D::Error>> {
        self.flash
            .inner
            .lock(|w| w.borrow_mut().write(address, data))
    }

    /// See [`SectorWriter::erase`].
    pub fn erase(&mut self, address: u32, length: usize) -> Result<(), Error<D::Error>> {
        self.flash
            .inner
            .lock(|w| w.borrow_mut().erase(address, length))
    }

    /// Closes the session. Dropping it has the same effect.
    pub fn close(self) {
        debug!("flash session closed");
    }
}

/// Async twin of [`SharedFlash`], built on the async mutex so waiting
/// callers yield instead of spinning.
pub struct SharedAsyncFlash<R: RawMutex, D: AsyncFlashDevice> {
    inner: AsyncMutex<R, AsyncSectorWriter<D>>,
}

impl<R: RawMutex, D: AsyncFlashDevice> SharedAsyncFlash<R, D> {
    pub fn new(device: D) -> Self {
        Self {
            inner: AsyncMutex::new(AsyncSectorWriter::new(device)),
        }
    }

    /// Opens a session on the device.
    pub fn open(&self) -> AsyncFlashSession<'_, R, D> {
        debug!("flash session opened");
        AsyncFlashSession { flash: self }
    }
}

/// Open session on a [`SharedAsyncFlash`].
pub struct AsyncFlashSession<'a, R: RawMutex, D: AsyncFlashDevice> {
    flash: &'a SharedAsyncFlash<R, D>,
}

impl<R: RawMutex, D: AsyncFlashDevice> AsyncFlashSession<'_, R, D> {
    /// Total addressable size of the device in bytes.
    pub async fn capacity(&self) -> usize {
        self.flash.inner.lock().await.capacity()
    }

    /// See [`AsyncSectorWriter::read`].
    pub async fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), Error<D::Error>> {
        self.flash.inner.lock().await.read(address, out).await
    }

    /// See [`AsyncSectorWriter::write`].
    pub async fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error<D::Error>> {
        self.flash.inner.lock().await.write(address, data).await
    }

    /// See [`AsyncSectorWriter::erase`].
    pub async fn erase(&mut self, address: u32, length: usize) -> Result<(), Error<D::Error>> {
        self.flash.inner.lock().await.erase(address, length).await
    }

    /// Closes the session. Dropping it has the same effect.
    pub fn close(self) {
        debug!("flash session closed");
    }
}
