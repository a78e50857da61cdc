//! Fatal error taxonomy (§7.1, §7.2 of the driver's error handling design).
//!
//! Recoverable conditions (zero-progress MMIO, a pull/push short of its
//! threshold) are not errors at all: they are returned as `0`-byte transfers
//! or `false`, and the caller retries later. Only conditions that leave the
//! driver unable to make further progress are represented here.

use thiserror::Error;

/// Errors that abort the driver process or terminate the target.
#[derive(Debug, Error)]
pub enum DriverError {
    /// A DMA transfer moved fewer bytes than the backend guaranteed.
    #[error("short DMA transfer on {direction}: requested {requested} bytes, moved {actual}")]
    ShortTransfer {
        /// Which DMA channel the short transfer occurred on.
        direction: &'static str,
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes actually moved.
        actual: usize,
    },

    /// More than one widget of a singleton kind was registered.
    #[error("duplicate singleton widget of kind {kind}")]
    DuplicateSingleton {
        /// Name of the widget kind, for diagnostics.
        kind: String,
    },

    /// `get_widget` was asked for a kind with zero registered instances.
    #[error("no widget of kind {kind} is registered")]
    MissingSingleton {
        /// Name of the widget kind, for diagnostics.
        kind: String,
    },

    /// A stream index passed to the engine was out of range.
    #[error("stream index {index} out of range (have {count})")]
    StreamIndexOutOfRange {
        /// Index that was requested.
        index: usize,
        /// Number of streams registered in that direction.
        count: usize,
    },

    /// An FPGA-managed stream flush did not complete within the retry cap.
    #[error("stream flush deadlock: {stream_name} did not complete after {attempts} attempts")]
    FlushDeadlock {
        /// Name of the stream that failed to flush.
        stream_name: String,
        /// Number of poll attempts made before giving up.
        attempts: u32,
    },

    /// A hex loadmem file could not be read or was malformed.
    #[error("failed to load memory image {path}: {reason}")]
    LoadMemFailed {
        /// Path of the file that failed to load.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// A beat-aligned transfer was requested with a non-beat-aligned size.
    #[error("transfer size {size} is not a multiple of the beat width {beat_bytes}")]
    UnalignedTransfer {
        /// Size requested, in bytes.
        size: usize,
        /// Beat width, in bytes.
        beat_bytes: usize,
    },
}
