//! Hardware abstraction layer traits.
//!
//! The driver never touches a bus directly. Whoever owns the board supplies
//! an [`Spi`] implementation, whether that is a Linux spidev node, an FPGA
//! soft core, or a simulated chip in tests.

use async_trait::async_trait;

use crate::error::Result;

#[cfg(test)]
pub(crate) mod mock;

/// Full-duplex SPI transport with an owned connection.
///
/// One call to [`Spi::write_and_read`] is one chip-select-framed
/// transaction: the bytes in `buf` are shifted out and the bytes shifted in
/// during the same clocks overwrite `buf` in place.
///
/// Implementations must also release the connection when dropped without
/// [`Spi::close`]. The driver's futures can be cancelled at any `.await`
/// (a timeout around bring-up, for example), and `Drop` is the only cleanup
/// that runs on that path.
#[async_trait]
pub trait Spi: Send {
    /// Connection parameters (device node, clock rate, mode, ...)
    type Params: Send + Sync;

    /// Open the connection.
    async fn open(params: &Self::Params) -> Result<Self>
    where
        Self: Sized;

    /// Run one transaction over `buf`.
    async fn write_and_read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Release the connection, reporting any error.
    async fn close(&mut self) -> Result<()>;
}
