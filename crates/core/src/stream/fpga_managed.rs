//! FPGA-managed DMA streams: the target writes tokens directly into a
//! preallocated host ring buffer, and the driver reads them out through a
//! bytes-available / bytes-consumed handshake instead of issuing a DMA
//! transfer per pull.

use super::PullStream;
use crate::common::error::DriverError;
use crate::hostio::HostIo;

/// Number of times [`FpgaManagedPull::flush`] polls for completion before
/// giving up and reporting a deadlock.
const FLUSH_RETRY_LIMIT: u32 = 256;

/// MMIO layout and sizing for one FPGA-managed stream.
#[derive(Debug, Clone)]
pub struct FpgaManagedParams {
    /// Name used in error messages.
    pub stream_name: String,
    /// Size of the host-side ring buffer, in bytes.
    pub buffer_capacity: usize,
    /// MMIO address for the high half of the ring buffer's host physical
    /// address.
    pub to_host_phys_addr_high: u32,
    /// MMIO address for the low half of the ring buffer's host physical
    /// address.
    pub to_host_phys_addr_low: u32,
    /// MMIO address reporting how many bytes the target has written since
    /// the last consume.
    pub bytes_available_addr: u32,
    /// MMIO address the driver writes to report how many bytes it just
    /// consumed.
    pub bytes_consumed_addr: u32,
    /// MMIO address the driver writes `1` to in order to request a flush.
    pub flush_addr: u32,
    /// MMIO address that reads nonzero once a requested flush has
    /// completed.
    pub flush_done_addr: u32,
}

/// A target-managed ring buffer read by the driver.
#[derive(Debug)]
pub struct FpgaManagedPull {
    params: FpgaManagedParams,
    buffer: Vec<u8>,
    buffer_offset: usize,
}

impl FpgaManagedPull {
    /// Creates a pull stream backed by a freshly allocated ring buffer of
    /// `params.buffer_capacity` bytes.
    #[must_use]
    pub fn new(params: FpgaManagedParams) -> Self {
        let capacity = params.buffer_capacity;
        Self {
            params,
            buffer: vec![0u8; capacity],
            buffer_offset: 0,
        }
    }
}

impl PullStream for FpgaManagedPull {
    fn init(&mut self, io: &mut dyn HostIo) {
        let base = self.buffer.as_ptr() as u64;
        io.mmio_write(self.params.to_host_phys_addr_low, base as u32);
        io.mmio_write(self.params.to_host_phys_addr_high, (base >> 32) as u32);
    }

    fn pull(
        &mut self,
        io: &mut dyn HostIo,
        dest: &mut [u8],
        required_bytes: usize,
    ) -> Result<usize, DriverError> {
        let available = io.mmio_read(self.params.bytes_available_addr) as usize;
        if available < required_bytes {
            return Ok(0);
        }
        let capacity = self.params.buffer_capacity;
        let want = available.min(dest.len());

        let tail = capacity - self.buffer_offset;
        if want <= tail {
            dest[..want].copy_from_slice(&self.buffer[self.buffer_offset..self.buffer_offset + want]);
        } else {
            let (first, second) = (tail, want - tail);
            dest[..first].copy_from_slice(&self.buffer[self.buffer_offset..capacity]);
            dest[first..first + second].copy_from_slice(&self.buffer[..second]);
        }

        self.buffer_offset = (self.buffer_offset + want) % capacity;
        io.mmio_write(self.params.bytes_consumed_addr, want as u32);
        Ok(want)
    }

    fn flush(&mut self, io: &mut dyn HostIo) -> Result<(), DriverError> {
        io.mmio_write(self.params.flush_addr, 1);
        for _ in 0..FLUSH_RETRY_LIMIT {
            if io.mmio_read(self.params.flush_done_addr) != 0 {
                return Ok(());
            }
        }
        Err(DriverError::FlushDeadlock {
            stream_name: self.params.stream_name.clone(),
            attempts: FLUSH_RETRY_LIMIT,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeIo {
        available: u32,
        consumed: u32,
        flush_done: bool,
    }
    impl HostIo for FakeIo {
        fn mmio_read(&mut self, addr: u32) -> u32 {
            if addr == 0xA {
                self.available
            } else if addr == 0xC {
                u32::from(self.flush_done)
            } else {
                0
            }
        }
        fn mmio_write(&mut self, addr: u32, value: u32) {
            if addr == 0xB {
                self.consumed = value;
            }
        }
    }

    fn params() -> FpgaManagedParams {
        FpgaManagedParams {
            stream_name: "from_target".to_string(),
            buffer_capacity: 16,
            to_host_phys_addr_high: 0x1,
            to_host_phys_addr_low: 0x2,
            bytes_available_addr: 0xA,
            bytes_consumed_addr: 0xB,
            flush_addr: 0xD,
            flush_done_addr: 0xC,
        }
    }

    #[test]
    fn wraparound_copy_splits_into_tail_and_head() {
        let mut stream = FpgaManagedPull::new(params());
        stream.buffer_offset = 12;
        for (i, b) in stream.buffer.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut io = FakeIo {
            available: 8,
            ..FakeIo::default()
        };
        let mut dest = vec![0u8; 8];
        let n = stream.pull(&mut io, &mut dest, 1).unwrap();
        assert_eq!(n, 8);
        assert_eq!(dest, vec![12, 13, 14, 15, 0, 1, 2, 3]);
        assert_eq!(stream.buffer_offset, 4);
        assert_eq!(io.consumed, 8);
    }

    #[test]
    fn flush_deadlocks_after_retry_limit() {
        let mut stream = FpgaManagedPull::new(params());
        let mut io = FakeIo::default();
        let err = stream.flush(&mut io).unwrap_err();
        assert!(matches!(err, DriverError::FlushDeadlock { attempts, .. } if attempts == FLUSH_RETRY_LIMIT));
    }
}
