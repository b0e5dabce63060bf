use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// The error type used by this library.
///
/// Wraps the raw driver's error and adds the writer engine's own failure
/// causes on top of that, so callers can tell a device fault apart from an
/// allocation failure or a short transfer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error<E> {
    /// The raw flash driver reported an error.
    Device(E),
    /// The raw driver transferred fewer bytes than requested.
    ShortTransfer,
    /// A transient page or alignment buffer could not be allocated.
    AllocationFailed,
    /// The requested range extends past the device capacity.
    OutOfBounds,
    /// Write and erase require a non-empty range.
    InvalidLength,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Device(e)
    }
}

impl<E: core::fmt::Debug> NorFlashError for Error<E> {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            _ => NorFlashErrorKind::Other,
        }
    }
}
