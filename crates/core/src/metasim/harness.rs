//! A metasimulation [`HostIo`] backend: every MMIO access fuzzes host-to-
//! target latency by running the rendezvous forward a random number of
//! ticks before the access lands, so driver code is exercised against the
//! same timing jitter a real PCIe round trip would introduce.
//!
//! Synthesizing the target's own RTL is out of scope here; the paired
//! [`HarnessClockSource`] only advances a free-running cycle counter, which
//! is enough to drive the rendezvous and let bridge drivers built on
//! [`HostIo`] be exercised without a real target.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::queue::{MagicMemory, RegisterFile};
use super::rendezvous::Rendezvous;
use crate::bridges::loadmem::regs as loadmem_regs;
use crate::hostio::HostIo;

/// Register address the paired [`HarnessClockSource`] writes its
/// free-running cycle counter to, for tests that need to observe progress.
pub const CYCLE_COUNTER_ADDR: u32 = 0xFF0;

/// Span of the loadmem register block, wide enough to cover every offset in
/// [`loadmem_regs`].
const LOADMEM_REG_SPAN: u32 = 0x28;

/// Tracks the loadmem bridge's register-level streaming protocol so its
/// register writes/reads land directly on the harness's [`MagicMemory`],
/// the same memory a `+fastloadmem` direct write or a peek/poke would see.
struct LoadMemCursor {
    base_addr: u32,
    chunks_per_beat: u32,
    w_addr: u64,
    w_chunks: Vec<u32>,
    r_addr: u64,
    r_chunks: VecDeque<u32>,
}

/// Host-delay fuzzing state, parsed from `+fuzz-host-timing=` /
/// `+fuzz-seed=`.
#[derive(Debug, Clone, Copy)]
pub struct FuzzConfig {
    /// Upper bound (exclusive) on extra rendezvous ticks per access. `1`
    /// disables fuzzing: every access advances by exactly one tick.
    pub max_host_delay: u32,
    /// PRNG seed, for reproducible fuzzing runs.
    pub seed: u64,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            max_host_delay: 1,
            seed: 0,
        }
    }
}

/// A [`HostIo`] implementation backed by the two-thread rendezvous instead
/// of a real target.
pub struct MetasimHarness {
    rendezvous: Arc<Rendezvous>,
    registers: Arc<Mutex<RegisterFile>>,
    mem: Arc<Mutex<MagicMemory>>,
    rng: StdRng,
    max_host_delay: u32,
    loadmem: Option<LoadMemCursor>,
    /// Bytes a CPU-managed pull stream drains from on `cpu_managed_axi4_read`.
    cpu_read_fifo: Arc<Mutex<VecDeque<u8>>>,
    /// Bytes a CPU-managed push stream deposits via `cpu_managed_axi4_write`.
    cpu_write_fifo: Arc<Mutex<VecDeque<u8>>>,
}

impl MetasimHarness {
    /// Creates a harness and the [`HarnessClockSource`] that drives its
    /// rendezvous from the RTL-simulator side.
    #[must_use]
    pub fn new(fuzz: FuzzConfig, mem_size: usize) -> (Self, HarnessClockSource) {
        let rendezvous = Arc::new(Rendezvous::new());
        let registers = Arc::new(Mutex::new(RegisterFile::new()));
        let mem = Arc::new(Mutex::new(MagicMemory::new(mem_size)));
        let harness = Self {
            rendezvous: rendezvous.clone(),
            registers: registers.clone(),
            mem: mem.clone(),
            rng: StdRng::seed_from_u64(fuzz.seed),
            max_host_delay: fuzz.max_host_delay.max(1),
            loadmem: None,
            cpu_read_fifo: Arc::new(Mutex::new(VecDeque::new())),
            cpu_write_fifo: Arc::new(Mutex::new(VecDeque::new())),
        };
        let clock_source = HarnessClockSource {
            rendezvous,
            registers,
            cycle: Arc::new(AtomicU64::new(0)),
            stop: Arc::new(AtomicBool::new(false)),
        };
        (harness, clock_source)
    }

    /// Direct access to the backing memory, for tests that poke DRAM
    /// contents without going through a loadmem bridge.
    #[must_use]
    pub fn memory(&self) -> Arc<Mutex<MagicMemory>> {
        self.mem.clone()
    }

    /// Routes the loadmem bridge at `base_addr` (whose beats are
    /// `chunks_per_beat` 32-bit words wide) straight onto this harness's
    /// [`MagicMemory`], so its register-level MMIO protocol actually moves
    /// bytes instead of landing in the plain register file.
    pub fn wire_loadmem(&mut self, base_addr: u32, chunks_per_beat: u32) {
        self.loadmem = Some(LoadMemCursor {
            base_addr,
            chunks_per_beat,
            w_addr: 0,
            w_chunks: Vec::new(),
            r_addr: 0,
            r_chunks: VecDeque::new(),
        });
    }

    /// Appends `data` to the FIFO a CPU-managed pull stream drains from.
    pub fn queue_cpu_managed_read_data(&self, data: &[u8]) {
        self.cpu_read_fifo
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend(data.iter().copied());
    }

    /// Drains and returns every byte a CPU-managed push stream has
    /// deposited so far.
    #[must_use]
    pub fn take_cpu_managed_writes(&self) -> Vec<u8> {
        self.cpu_write_fifo
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    fn advance_target(&mut self) {
        let delay = 1 + self.rng.gen_range(0..self.max_host_delay);
        for _ in 0..delay {
            self.rendezvous.do_tick();
        }
    }

    fn loadmem_offset(&self, addr: u32) -> Option<u32> {
        let cursor = self.loadmem.as_ref()?;
        let offset = addr.checked_sub(cursor.base_addr)?;
        (offset < LOADMEM_REG_SPAN).then_some(offset)
    }

    fn loadmem_write(&mut self, offset: u32, value: u32) {
        let mem = self.mem.clone();
        let Some(cursor) = self.loadmem.as_mut() else {
            return;
        };
        match offset {
            loadmem_regs::W_ADDRESS_LOW => {
                cursor.w_addr = (cursor.w_addr & !0xFFFF_FFFF) | u64::from(value);
            }
            loadmem_regs::W_ADDRESS_HIGH => {
                cursor.w_addr = (cursor.w_addr & 0xFFFF_FFFF) | (u64::from(value) << 32);
            }
            loadmem_regs::W_DATA => {
                cursor.w_chunks.push(value);
                if cursor.w_chunks.len() == cursor.chunks_per_beat as usize {
                    let mut mem = mem.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    let mut addr = cursor.w_addr;
                    for chunk in cursor.w_chunks.drain(..) {
                        mem.write(addr, &chunk.to_le_bytes());
                        addr += 4;
                    }
                }
            }
            loadmem_regs::R_ADDRESS_LOW => {
                cursor.r_addr = (cursor.r_addr & !0xFFFF_FFFF) | u64::from(value);
            }
            loadmem_regs::R_ADDRESS_HIGH => {
                cursor.r_addr = (cursor.r_addr & 0xFFFF_FFFF) | (u64::from(value) << 32);
            }
            loadmem_regs::R_LENGTH => {
                let mut bytes = vec![0u8; cursor.chunks_per_beat as usize * 4];
                mem.lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .read(cursor.r_addr, &mut bytes);
                cursor.r_chunks = bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .rev()
                    .collect();
            }
            loadmem_regs::ZERO_OUT_DRAM => {
                mem.lock().unwrap_or_else(std::sync::PoisonError::into_inner).zero();
            }
            _ => {}
        }
    }

    fn loadmem_read(&mut self, offset: u32) -> u32 {
        match offset {
            loadmem_regs::R_DATA => self
                .loadmem
                .as_mut()
                .and_then(|cursor| cursor.r_chunks.pop_front())
                .unwrap_or(0),
            loadmem_regs::ZERO_FINISHED => 1,
            _ => 0,
        }
    }
}

impl HostIo for MetasimHarness {
    fn mmio_read(&mut self, addr: u32) -> u32 {
        self.advance_target();
        if let Some(offset) = self.loadmem_offset(addr) {
            return self.loadmem_read(offset);
        }
        self.registers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).read(addr)
    }

    fn mmio_write(&mut self, addr: u32, value: u32) {
        self.advance_target();
        if let Some(offset) = self.loadmem_offset(addr) {
            self.loadmem_write(offset, value);
            return;
        }
        self.registers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .write(addr, value);
    }

    fn cpu_managed_axi4_write(&mut self, _dma_addr: u32, data: &[u8]) -> usize {
        self.advance_target();
        self.cpu_write_fifo
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend(data.iter().copied());
        data.len()
    }

    fn cpu_managed_axi4_read(&mut self, _dma_addr: u32, buf: &mut [u8]) -> usize {
        self.advance_target();
        let mut fifo = self.cpu_read_fifo.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let n = buf.len().min(fifo.len());
        for slot in &mut buf[..n] {
            *slot = fifo.pop_front().unwrap_or(0);
        }
        n
    }

    fn write_beat_direct(&mut self, addr: u64, chunks: &[u32]) -> bool {
        let mut mem = self.mem.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut cursor = addr;
        for chunk in chunks {
            mem.write(cursor, &chunk.to_le_bytes());
            cursor += 4;
        }
        true
    }
}

/// Runs on the thread that stands in for the RTL simulator: repeatedly
/// yields to the driver thread via [`Rendezvous::to_sim`] and advances a
/// free-running cycle counter each time it regains control.
pub struct HarnessClockSource {
    rendezvous: Arc<Rendezvous>,
    registers: Arc<Mutex<RegisterFile>>,
    cycle: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
}

impl HarnessClockSource {
    /// Runs the clock-source loop until [`HarnessClockSource::request_stop`]
    /// is called.
    pub fn run(&self) {
        while !self.stop.load(Ordering::Acquire) {
            let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
            self.registers
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .write(CYCLE_COUNTER_ADDR, cycle as u32);
            self.rendezvous.to_sim();
        }
    }

    /// Signals [`HarnessClockSource::run`] to exit after its current tick,
    /// and unblocks it if it is waiting in the rendezvous.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.rendezvous.end();
    }

    /// Current free-running cycle count.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn mmio_access_advances_the_clock_source() {
        let (mut harness, clock) = MetasimHarness::new(FuzzConfig::default(), 1024);
        let clock = Arc::new(clock);
        let runner_handle = clock.clone();
        let runner = thread::spawn(move || runner_handle.run());

        for _ in 0..10 {
            harness.mmio_write(0x0, 1);
        }
        let value = harness.mmio_read(CYCLE_COUNTER_ADDR);
        assert!(value >= 10, "expected at least 10 ticks, got {value}");

        clock.request_stop();
        runner.join().unwrap();
    }

    #[test]
    fn fuzzing_never_advances_by_zero_ticks() {
        let (mut harness, clock) = MetasimHarness::new(
            FuzzConfig {
                max_host_delay: 5,
                seed: 42,
            },
            16,
        );
        let clock = Arc::new(clock);
        let runner_handle = clock.clone();
        let runner = thread::spawn(move || runner_handle.run());
        harness.mmio_write(0x0, 1);
        assert!(harness.mmio_read(CYCLE_COUNTER_ADDR) >= 1);
        clock.request_stop();
        runner.join().unwrap();
    }

    #[test]
    fn cpu_managed_read_drains_the_queued_fifo() {
        let (mut harness, clock) = MetasimHarness::new(FuzzConfig::default(), 16);
        let clock = Arc::new(clock);
        let runner_handle = clock.clone();
        let runner = thread::spawn(move || runner_handle.run());

        harness.queue_cpu_managed_read_data(&[1, 2, 3, 4]);
        let mut buf = [0u8; 4];
        let n = harness.cpu_managed_axi4_read(0, &mut buf);
        assert_eq!(n, 4);
        assert_eq!(buf, [1, 2, 3, 4]);

        clock.request_stop();
        runner.join().unwrap();
    }

    #[test]
    fn cpu_managed_write_is_observable_afterward() {
        let (mut harness, clock) = MetasimHarness::new(FuzzConfig::default(), 16);
        let clock = Arc::new(clock);
        let runner_handle = clock.clone();
        let runner = thread::spawn(move || runner_handle.run());

        let n = harness.cpu_managed_axi4_write(0, &[9, 8, 7]);
        assert_eq!(n, 3);
        assert_eq!(harness.take_cpu_managed_writes(), vec![9, 8, 7]);

        clock.request_stop();
        runner.join().unwrap();
    }

    #[test]
    fn write_beat_direct_lands_in_magic_memory() {
        let (mut harness, clock) = MetasimHarness::new(FuzzConfig::default(), 16);
        let clock = Arc::new(clock);
        let runner_handle = clock.clone();
        let runner = thread::spawn(move || runner_handle.run());

        assert!(harness.write_beat_direct(4, &[0xDEAD_BEEF, 0xCAFE_BABE]));
        let mut out = [0u8; 8];
        harness
            .memory()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .read(4, &mut out);
        assert_eq!(out, 0xCAFE_BABE_DEAD_BEEFu64.to_le_bytes());

        clock.request_stop();
        runner.join().unwrap();
    }

    #[test]
    fn loadmem_register_protocol_round_trips_through_magic_memory() {
        let (mut harness, clock) = MetasimHarness::new(FuzzConfig::default(), 256);
        let clock = Arc::new(clock);
        let runner_handle = clock.clone();
        let runner = thread::spawn(move || runner_handle.run());

        harness.wire_loadmem(0x2000, 2);
        let bridge = crate::bridges::loadmem::LoadMem::new(0x2000, 2);
        let value = crate::common::wide::WideValue::from_hex_be("deadbeefcafebabe").unwrap();
        bridge.write_mem(&mut harness, 0x10, &value);
        let readback = bridge.read_mem(&mut harness, 0x10);
        assert_eq!(readback.chunks(), value.chunks());

        harness.mmio_write(0x2000 + loadmem_regs::ZERO_OUT_DRAM, 1);
        assert_eq!(harness.mmio_read(0x2000 + loadmem_regs::ZERO_FINISHED), 1);
        let mut out = [0xAAu8; 8];
        harness
            .memory()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .read(0x10, &mut out);
        assert_eq!(out, [0u8; 8]);

        clock.request_stop();
        runner.join().unwrap();
    }
}
