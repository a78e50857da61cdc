//! DRAM loading: parses a hex memory image and streams it into target
//! memory over the loadmem MMIO register file, and reads it back the same
//! way for debugging.

use crate::common::error::DriverError;
use crate::common::wide::WideValue;
use crate::hostio::HostIo;
use crate::widget::{Widget, WidgetKind};
use std::any::Any;
use std::fmt::Write as _;

pub(crate) mod regs {
    pub const W_ADDRESS_LOW: u32 = 0x00;
    pub const W_ADDRESS_HIGH: u32 = 0x04;
    pub const W_LENGTH: u32 = 0x08;
    pub const W_DATA: u32 = 0x0c;
    pub const R_ADDRESS_LOW: u32 = 0x10;
    pub const R_ADDRESS_HIGH: u32 = 0x14;
    pub const R_LENGTH: u32 = 0x18;
    pub const R_DATA: u32 = 0x1c;
    pub const ZERO_OUT_DRAM: u32 = 0x20;
    pub const ZERO_FINISHED: u32 = 0x24;
}

/// Streams memory images into and out of target DRAM.
#[derive(Debug)]
pub struct LoadMem {
    base_addr: u32,
    /// Number of 32-bit chunks per beat, i.e. `mem.data_bits / 32`.
    chunks_per_beat: u32,
}

impl LoadMem {
    /// Creates a loadmem bridge at `base_addr` for a bus whose beats are
    /// `chunks_per_beat` 32-bit words wide.
    #[must_use]
    pub const fn new(base_addr: u32, chunks_per_beat: u32) -> Self {
        Self {
            base_addr,
            chunks_per_beat,
        }
    }

    /// Writes one beat's worth of chunks to `addr`, least-significant chunk
    /// first.
    pub fn write_mem(&self, io: &mut dyn HostIo, addr: u64, value: &WideValue) {
        io.mmio_write(self.base_addr + regs::W_ADDRESS_LOW, addr as u32);
        io.mmio_write(self.base_addr + regs::W_ADDRESS_HIGH, (addr >> 32) as u32);
        io.mmio_write(self.base_addr + regs::W_LENGTH, self.chunks_per_beat * 4);
        let padded = value.resized(self.chunks_per_beat as usize);
        for chunk in padded.chunks() {
            io.mmio_write(self.base_addr + regs::W_DATA, *chunk);
        }
    }

    /// Reads one beat's worth of chunks back from `addr`.
    ///
    /// The chunks are assembled most-significant-chunk-first: the first
    /// word read off the register becomes the high-order chunk of the
    /// returned value, the mirror image of how [`LoadMem::write_mem`]
    /// streams a value out least-significant-first.
    pub fn read_mem(&self, io: &mut dyn HostIo, addr: u64) -> WideValue {
        io.mmio_write(self.base_addr + regs::R_ADDRESS_LOW, addr as u32);
        io.mmio_write(self.base_addr + regs::R_ADDRESS_HIGH, (addr >> 32) as u32);
        io.mmio_write(self.base_addr + regs::R_LENGTH, self.chunks_per_beat * 4);
        let mut chunks = vec![0u32; self.chunks_per_beat as usize];
        for slot in chunks.iter_mut() {
            *slot = io.mmio_read(self.base_addr + regs::R_DATA);
        }
        chunks.reverse();
        WideValue::from_chunks_lsw_first(chunks)
    }

    /// Zeroes all of target DRAM and blocks until the target reports it
    /// finished.
    pub fn zero_out_dram(&self, io: &mut dyn HostIo) {
        io.mmio_write(self.base_addr + regs::ZERO_OUT_DRAM, 1);
        while io.mmio_read(self.base_addr + regs::ZERO_FINISHED) == 0 {}
    }

    /// Parses `contents` as a loadmem hex image (one beat of hex digits per
    /// line, most-significant nibble first) and writes each line to
    /// sequential beat addresses starting at `base`.
    ///
    /// # Errors
    /// Returns [`DriverError::LoadMemFailed`] if a line's length is not a
    /// multiple of 8 hex digits or contains non-hex characters.
    pub fn load_from_text(
        &self,
        io: &mut dyn HostIo,
        contents: &str,
        base: u64,
    ) -> Result<(), DriverError> {
        let beat_bytes = u64::from(self.chunks_per_beat) * 4;
        for (i, line) in contents.lines().filter(|l| !l.is_empty()).enumerate() {
            let value = WideValue::from_hex_be(line.trim()).ok_or_else(|| DriverError::LoadMemFailed {
                path: "<in-memory>".to_string(),
                reason: format!("line {i} is not a multiple of 8 hex digits: {line:?}"),
            })?;
            self.write_mem(io, base + i as u64 * beat_bytes, &value);
        }
        Ok(())
    }

    /// Like [`LoadMem::load_from_text`], but asks `io` to write each beat
    /// directly into the host memory backing target DRAM before falling
    /// back to the MMIO register path.
    ///
    /// This is the `+fastloadmem` path: a pure optimization over
    /// [`LoadMem::load_from_text`] that must leave target memory
    /// byte-identical to it.
    ///
    /// # Errors
    /// Returns [`DriverError::LoadMemFailed`] under the same conditions as
    /// [`LoadMem::load_from_text`].
    pub fn load_from_text_direct(
        &self,
        io: &mut dyn HostIo,
        contents: &str,
        base: u64,
    ) -> Result<(), DriverError> {
        let beat_bytes = u64::from(self.chunks_per_beat) * 4;
        for (i, line) in contents.lines().filter(|l| !l.is_empty()).enumerate() {
            let value = WideValue::from_hex_be(line.trim()).ok_or_else(|| DriverError::LoadMemFailed {
                path: "<in-memory>".to_string(),
                reason: format!("line {i} is not a multiple of 8 hex digits: {line:?}"),
            })?;
            let addr = base + i as u64 * beat_bytes;
            let padded = value.resized(self.chunks_per_beat as usize);
            if !io.write_beat_direct(addr, padded.chunks()) {
                self.write_mem(io, addr, &value);
            }
        }
        Ok(())
    }

    /// Reads `beat_count` beats starting at `base` and renders them as a
    /// loadmem-format hex image, one beat per line, most-significant nibble
    /// first — the inverse of [`LoadMem::load_from_text`].
    pub fn dump_to_text(&self, io: &mut dyn HostIo, base: u64, beat_count: u64) -> String {
        let beat_bytes = u64::from(self.chunks_per_beat) * 4;
        let mut out = String::new();
        for i in 0..beat_count {
            let value = self.read_mem(io, base + i * beat_bytes);
            for chunk in value.chunks() {
                let _ = write!(out, "{chunk:08x}");
            }
            out.push('\n');
        }
        out
    }
}

impl Widget for LoadMem {
    fn kind(&self) -> WidgetKind {
        WidgetKind::LoadMem
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeIo {
        last_write_data: Vec<u32>,
        read_cursor: usize,
        to_read: Vec<u32>,
    }

    impl HostIo for FakeIo {
        fn mmio_read(&mut self, _addr: u32) -> u32 {
            let v = self.to_read.get(self.read_cursor).copied().unwrap_or(0);
            self.read_cursor += 1;
            v
        }
        fn mmio_write(&mut self, addr: u32, value: u32) {
            if addr == regs::W_DATA {
                self.last_write_data.push(value);
            }
        }
    }

    #[test]
    fn write_then_fed_back_read_reproduces_worked_example() {
        let bridge = LoadMem::new(0, 2);
        let mut io = FakeIo::default();
        let value = WideValue::from_hex_be("deadbeefcafebabe").unwrap();
        bridge.write_mem(&mut io, 0, &value);
        assert_eq!(io.last_write_data, vec![0xcafe_babe, 0xdead_beef]);

        let mut read_io = FakeIo {
            to_read: io.last_write_data.clone(),
            ..FakeIo::default()
        };
        let readback = bridge.read_mem(&mut read_io, 0);
        assert_eq!(readback.chunks(), &[0xdead_beef, 0xcafe_babe]);
    }

    #[derive(Default)]
    struct DirectCapableIo {
        direct_writes: Vec<(u64, Vec<u32>)>,
        mmio: FakeIo,
    }

    impl HostIo for DirectCapableIo {
        fn mmio_read(&mut self, addr: u32) -> u32 {
            self.mmio.mmio_read(addr)
        }
        fn mmio_write(&mut self, addr: u32, value: u32) {
            self.mmio.mmio_write(addr, value);
        }
        fn write_beat_direct(&mut self, addr: u64, chunks: &[u32]) -> bool {
            self.direct_writes.push((addr, chunks.to_vec()));
            true
        }
    }

    #[test]
    fn load_from_text_direct_prefers_the_direct_path_when_supported() {
        let bridge = LoadMem::new(0, 2);
        let mut io = DirectCapableIo::default();
        bridge.load_from_text_direct(&mut io, "deadbeefcafebabe\n", 0x100).unwrap();
        assert_eq!(io.direct_writes, vec![(0x100, vec![0xcafe_babe, 0xdead_beef])]);
        assert!(io.mmio.last_write_data.is_empty());
    }

    #[test]
    fn load_from_text_direct_falls_back_to_mmio_when_unsupported() {
        let bridge = LoadMem::new(0, 2);
        let mut io = FakeIo::default();
        bridge.load_from_text_direct(&mut io, "deadbeefcafebabe\n", 0).unwrap();
        assert_eq!(io.last_write_data, vec![0xcafe_babe, 0xdead_beef]);
    }
}
