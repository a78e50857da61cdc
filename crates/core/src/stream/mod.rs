//! The stream engine: host<->target token transport over either DMA
//! regime, dispatched by stream index.
//!
//! A *pull* stream moves tokens target-to-host (FPGA-to-CPU); a *push*
//! stream moves tokens host-to-target (CPU-to-FPGA). Both CPU-managed and
//! FPGA-managed transports implement the same two traits, so the engine
//! and every [`crate::widget::BridgeDriver`] that streams never need to
//! know which DMA regime backs a given stream.

pub mod cpu_managed;
pub mod engine;
pub mod fpga_managed;

pub use engine::StreamEngine;

use crate::common::error::DriverError;
use crate::hostio::HostIo;

/// A target-to-host stream.
pub trait PullStream {
    /// One-time setup, e.g. telling the target where the host ring buffer
    /// lives.
    fn init(&mut self, io: &mut dyn HostIo);

    /// Copies up to `dest.len()` bytes from the stream into `dest`.
    ///
    /// Returns the number of bytes actually copied. Per the all-or-nothing
    /// pull contract, this is either `0` (fewer than `required_bytes` are
    /// available) or a multiple of the stream's beat width, never a partial
    /// beat.
    ///
    /// # Errors
    /// Returns [`DriverError::ShortTransfer`] if the backend moved fewer
    /// bytes than it had already committed to, which is a protocol
    /// violation rather than a recoverable "not enough data yet" state.
    fn pull(
        &mut self,
        io: &mut dyn HostIo,
        dest: &mut [u8],
        required_bytes: usize,
    ) -> Result<usize, DriverError>;

    /// Requests the stream flush any buffered tokens out to the host.
    ///
    /// # Errors
    /// Returns [`DriverError::FlushDeadlock`] if the backend does not
    /// report completion within its retry budget.
    fn flush(&mut self, io: &mut dyn HostIo) -> Result<(), DriverError>;
}

/// A host-to-target stream.
pub trait PushStream {
    /// Copies up to `src.len()` bytes from `src` into the stream.
    ///
    /// Returns the number of bytes actually copied, with the same
    /// all-or-nothing contract as [`PullStream::pull`].
    ///
    /// # Errors
    /// Returns [`DriverError::ShortTransfer`] under the same conditions as
    /// [`PullStream::pull`].
    fn push(
        &mut self,
        io: &mut dyn HostIo,
        src: &[u8],
        required_bytes: usize,
    ) -> Result<usize, DriverError>;

    /// Requests the stream flush any buffered tokens out to the target.
    ///
    /// # Errors
    /// Returns [`DriverError::FlushDeadlock`] if the backend does not
    /// report completion within its retry budget.
    fn flush(&mut self, io: &mut dyn HostIo) -> Result<(), DriverError>;
}
