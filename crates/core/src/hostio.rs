//! Abstract host-to-target transport.
//!
//! Every bridge talks to the target through this trait rather than a
//! concrete transport, so the same driver code runs against a metasimulated
//! target, a real FPGA, or a test double. Only MMIO is mandatory; the two
//! DMA regimes are opt-in, matching that a given target may expose neither,
//! one, or both.

/// Host-side access to a single target instance's control and memory buses.
///
/// FPGA-managed streams need no transport hook of their own: the ring
/// buffer they read is a plain host-memory allocation the driver owns
/// directly, and the target is given its address over MMIO like any other
/// configuration register.
pub trait HostIo {
    /// Reads one 32-bit control register.
    fn mmio_read(&mut self, addr: u32) -> u32;

    /// Writes one 32-bit control register.
    fn mmio_write(&mut self, addr: u32, value: u32);

    /// Bulk-writes `data` to a CPU-managed DMA stream, returning the number
    /// of bytes actually accepted.
    ///
    /// The default implementation reports zero bytes moved, the behavior of
    /// a target with no CPU-managed streams.
    fn cpu_managed_axi4_write(&mut self, _dma_addr: u32, _data: &[u8]) -> usize {
        0
    }

    /// Bulk-reads up to `buf.len()` bytes from a CPU-managed DMA stream,
    /// returning the number of bytes actually filled.
    fn cpu_managed_axi4_read(&mut self, _dma_addr: u32, _buf: &mut [u8]) -> usize {
        0
    }

    /// Writes one beat (`chunks.len()` 32-bit words, least-significant
    /// chunk first) directly into the host memory backing the target's DRAM
    /// model, bypassing the MMIO loadmem register protocol entirely.
    ///
    /// This is the `+fastloadmem` fast path: a pure optimization that must
    /// leave target memory in the same state the MMIO path would. Returns
    /// `false` if this backend has no such directly addressable memory, in
    /// which case the caller falls back to the MMIO path.
    fn write_beat_direct(&mut self, _addr: u64, _chunks: &[u32]) -> bool {
        false
    }
}
