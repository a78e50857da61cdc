//! Dispatches pull/push/flush calls to the stream registered at a given
//! index, with bounds checking in place of the unchecked index arithmetic
//! a hand-rolled C array would need.

use super::{PullStream, PushStream};
use crate::common::error::DriverError;
use crate::hostio::HostIo;

/// Owns every streaming bridge's pull and push halves and routes calls to
/// them by index.
#[derive(Default)]
pub struct StreamEngine {
    pulls: Vec<Box<dyn PullStream>>,
    pushes: Vec<Box<dyn PushStream>>,
}

impl StreamEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pull (target-to-host) stream, returning its index.
    pub fn add_pull(&mut self, stream: Box<dyn PullStream>) -> usize {
        self.pulls.push(stream);
        self.pulls.len() - 1
    }

    /// Registers a push (host-to-target) stream, returning its index.
    pub fn add_push(&mut self, stream: Box<dyn PushStream>) -> usize {
        self.pushes.push(stream);
        self.pushes.len() - 1
    }

    /// Runs [`PullStream::init`] on every registered pull stream.
    pub fn init_all(&mut self, io: &mut dyn HostIo) {
        for pull in &mut self.pulls {
            pull.init(io);
        }
    }

    /// Pulls from the stream at `index`.
    ///
    /// # Errors
    /// Returns [`DriverError::StreamIndexOutOfRange`] if `index` is not a
    /// registered pull stream.
    pub fn pull(
        &mut self,
        io: &mut dyn HostIo,
        index: usize,
        dest: &mut [u8],
        required_bytes: usize,
    ) -> Result<usize, DriverError> {
        let stream = self
            .pulls
            .get_mut(index)
            .ok_or(DriverError::StreamIndexOutOfRange {
                index,
                count: self.pulls.len(),
            })?;
        stream.pull(io, dest, required_bytes)
    }

    /// Pushes to the stream at `index`.
    ///
    /// # Errors
    /// Returns [`DriverError::StreamIndexOutOfRange`] if `index` is not a
    /// registered push stream.
    pub fn push(
        &mut self,
        io: &mut dyn HostIo,
        index: usize,
        src: &[u8],
        required_bytes: usize,
    ) -> Result<usize, DriverError> {
        let stream = self
            .pushes
            .get_mut(index)
            .ok_or(DriverError::StreamIndexOutOfRange {
                index,
                count: self.pushes.len(),
            })?;
        stream.push(io, src, required_bytes)
    }

    /// Flushes the pull stream at `index`.
    ///
    /// # Errors
    /// Returns [`DriverError::StreamIndexOutOfRange`] if `index` is out of
    /// range, or [`DriverError::FlushDeadlock`] if the stream's backend
    /// never reports completion.
    pub fn pull_flush(&mut self, io: &mut dyn HostIo, index: usize) -> Result<(), DriverError> {
        let stream = self
            .pulls
            .get_mut(index)
            .ok_or(DriverError::StreamIndexOutOfRange {
                index,
                count: self.pulls.len(),
            })?;
        stream.flush(io)
    }

    /// Flushes the push stream at `index`.
    ///
    /// # Errors
    /// Returns [`DriverError::StreamIndexOutOfRange`] if `index` is out of
    /// range, or [`DriverError::FlushDeadlock`] if the stream's backend
    /// never reports completion.
    pub fn push_flush(&mut self, io: &mut dyn HostIo, index: usize) -> Result<(), DriverError> {
        let stream = self
            .pushes
            .get_mut(index)
            .ok_or(DriverError::StreamIndexOutOfRange {
                index,
                count: self.pushes.len(),
            })?;
        stream.flush(io)
    }
}
