//! CPU-managed DMA streams: the host directly initiates bulk AXI4 reads and
//! writes against the target's stream port, with no intermediate ring
//! buffer. Throughput is gated by a count register the target publishes.

use super::{PullStream, PushStream};
use crate::common::error::DriverError;
use crate::hostio::HostIo;

/// Shared configuration for one CPU-managed stream.
#[derive(Debug, Clone)]
pub struct CpuManagedParams {
    /// Name used in error messages.
    pub stream_name: String,
    /// DMA target address for bulk transfers.
    pub dma_addr: u32,
    /// MMIO address of the register reporting bytes currently
    /// available (pull) or free (push).
    pub count_addr: u32,
    /// Size of the target-side FIFO backing this stream, in bytes.
    pub fpga_buffer_size: usize,
    /// Transfer granularity; transfers are rounded down to a multiple of
    /// this many bytes.
    pub beat_bytes: usize,
}

fn beat_aligned_amount(available: usize, want: usize, beat_bytes: usize) -> usize {
    let capped = available.min(want);
    capped - (capped % beat_bytes)
}

/// A CPU-managed target-to-host stream.
#[derive(Debug)]
pub struct CpuManagedPull {
    params: CpuManagedParams,
}

impl CpuManagedPull {
    /// Creates a pull stream over `params`.
    #[must_use]
    pub const fn new(params: CpuManagedParams) -> Self {
        Self { params }
    }
}

impl PullStream for CpuManagedPull {
    fn init(&mut self, _io: &mut dyn HostIo) {}

    fn pull(
        &mut self,
        io: &mut dyn HostIo,
        dest: &mut [u8],
        required_bytes: usize,
    ) -> Result<usize, DriverError> {
        let available = io.mmio_read(self.params.count_addr) as usize;
        if available < required_bytes {
            return Ok(0);
        }
        let want = beat_aligned_amount(available, dest.len(), self.params.beat_bytes);
        if want == 0 {
            return Ok(0);
        }
        let moved = io.cpu_managed_axi4_read(self.params.dma_addr, &mut dest[..want]);
        if moved != want {
            return Err(DriverError::ShortTransfer {
                direction: "pull",
                requested: want,
                actual: moved,
            });
        }
        Ok(moved)
    }

    fn flush(&mut self, _io: &mut dyn HostIo) -> Result<(), DriverError> {
        // CPU-managed streams have no target-side buffer to drain.
        Ok(())
    }
}

/// A CPU-managed host-to-target stream.
#[derive(Debug)]
pub struct CpuManagedPush {
    params: CpuManagedParams,
}

impl CpuManagedPush {
    /// Creates a push stream over `params`.
    #[must_use]
    pub const fn new(params: CpuManagedParams) -> Self {
        Self { params }
    }
}

impl PushStream for CpuManagedPush {
    fn push(
        &mut self,
        io: &mut dyn HostIo,
        src: &[u8],
        required_bytes: usize,
    ) -> Result<usize, DriverError> {
        let free_space = io.mmio_read(self.params.count_addr) as usize;
        if free_space < required_bytes {
            return Ok(0);
        }
        let want = beat_aligned_amount(free_space, src.len(), self.params.beat_bytes);
        if want == 0 {
            return Ok(0);
        }
        let moved = io.cpu_managed_axi4_write(self.params.dma_addr, &src[..want]);
        if moved != want {
            return Err(DriverError::ShortTransfer {
                direction: "push",
                requested: want,
                actual: moved,
            });
        }
        Ok(moved)
    }

    fn flush(&mut self, _io: &mut dyn HostIo) -> Result<(), DriverError> {
        // CPU-managed streams have no target-side buffer to drain.
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeIo {
        count: u32,
        moved: usize,
    }
    impl HostIo for FakeIo {
        fn mmio_read(&mut self, _addr: u32) -> u32 {
            self.count
        }
        fn mmio_write(&mut self, _addr: u32, _value: u32) {}
        fn cpu_managed_axi4_read(&mut self, _dma_addr: u32, buf: &mut [u8]) -> usize {
            self.moved = buf.len();
            buf.len()
        }
    }

    fn params() -> CpuManagedParams {
        CpuManagedParams {
            stream_name: "to_host".to_string(),
            dma_addr: 0,
            count_addr: 0,
            fpga_buffer_size: 4096,
            beat_bytes: 64,
        }
    }

    #[test]
    fn below_threshold_returns_zero_without_transfer() {
        let mut stream = CpuManagedPull::new(params());
        let mut io = FakeIo { count: 32, moved: 0 };
        let mut dest = vec![0u8; 128];
        let n = stream.pull(&mut io, &mut dest, 64).unwrap();
        assert_eq!(n, 0);
        assert_eq!(io.moved, 0);
    }

    #[test]
    fn rounds_down_to_beat_multiple() {
        let mut stream = CpuManagedPull::new(params());
        let mut io = FakeIo { count: 200, moved: 0 };
        let mut dest = vec![0u8; 200];
        let n = stream.pull(&mut io, &mut dest, 64).unwrap();
        assert_eq!(n, 192);
    }
}
