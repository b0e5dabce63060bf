//! Byte-granular read, write and erase over sector-erase NOR flash.
//!
//! NOR flash can only be erased a whole sector at a time, and programming can
//! only clear bits. This crate implements the read-modify-write pattern on
//! top of a raw driver: for every sector touched by a request, the full
//! sector is read into a transient page buffer, the requested bytes are
//! spliced in (or filled with 0xFF for an erase), the sector is erased and
//! the buffer is programmed back. Bytes outside the requested range keep
//! their previous value; the caller never needs to care about sector
//! boundaries or read alignment.
//!
//! The raw driver is abstracted behind [`FlashDevice`] (and
//! [`AsyncFlashDevice`] for the async mirror), so the engine can be exercised
//! against a RAM-backed fake without hardware. [`SectorWriter`] is the
//! single-owner engine; [`SharedFlash`] wraps it in an
//! [`embassy_sync`] mutex and hands out open sessions for use from multiple
//! tasks.
//!
//! Page and alignment buffers are allocated per call, so an allocator is
//! required (`alloc`). Multi-sector operations are not atomic: the first
//! failing sector aborts the loop and earlier sectors keep their new
//! content.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// Must come first so the macros are visible to the other modules.
mod fmt;

mod async_writer;
mod error;
mod shared;
mod traits;
mod writer;

pub use async_writer::AsyncSectorWriter;
pub use error::Error;
pub use shared::{AsyncFlashSession, FlashSession, SharedAsyncFlash, SharedFlash};
pub use traits::{AsyncFlashDevice, FlashDevice};
pub use writer::SectorWriter;

/// Smallest region the device can erase, in bytes.
pub const SECTOR_SIZE: u32 = 4096;

/// Smallest region the device can program in one operation. Equal to the
/// sector size on this class of device.
pub const PAGE_SIZE: u32 = SECTOR_SIZE;

/// Minimum address alignment of the raw read primitive, in bytes.
pub const READ_ALIGN: u32 = 4;

/// Value of every byte in an erased sector.
pub const ERASED_BYTE: u8 = 0xFF;
