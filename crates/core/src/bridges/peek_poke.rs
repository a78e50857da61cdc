//! Direct peek/poke of named target ports, with the blocking handshake a
//! synchronous testbench needs: a poke only takes effect on the next step,
//! and a peek must wait for that step to finish (and, for combinational
//! ports, settle) before it is valid.
//!
//! Stepping and completion are the simulation master's job, not this
//! bridge's: [`PeekPoke::step`] and [`PeekPoke::is_done`] just forward to a
//! [`Master`], so there is exactly one STEP/DONE handshake in the driver.

use crate::bridges::master::Master;
use crate::common::wide::WideValue;
use crate::hostio::HostIo;
use crate::widget::{Widget, WidgetKind};
use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};

mod regs {
    /// Nonzero once this widget has synced with the target's most recent
    /// step, i.e. a poke issued before this reads true is safe to read back.
    pub const READY: u32 = 0x00;
    /// Nonzero if peeks are guaranteed stable without the settle wait.
    pub const PRECISE_PEEKABLE: u32 = 0x04;
}

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const SETTLE_WAIT: Duration = Duration::from_millis(100);

/// A single named target port: its register address and width in 32-bit
/// chunks.
#[derive(Debug, Clone, Copy)]
pub struct Port {
    /// Address of the port's first (least-significant) chunk.
    pub address: u32,
    /// Number of 32-bit chunks the port spans.
    pub chunks: u32,
}

/// Reads and writes named target ports directly, bypassing any bridge
/// protocol of the port's own.
#[derive(Debug)]
pub struct PeekPoke {
    base_addr: u32,
    ports: HashMap<String, Port>,
    /// Set once a peek had to fall back to the settle wait, so callers can
    /// flag the run as having observed an unstable combinational peek.
    req_unstable: bool,
    /// Set once a blocking poke/peek gave up waiting on [`regs::READY`].
    req_timeout: bool,
}

impl PeekPoke {
    /// Creates a peek/poke bridge over `ports`.
    #[must_use]
    pub fn new(base_addr: u32, ports: HashMap<String, Port>) -> Self {
        Self {
            base_addr,
            ports,
            req_unstable: false,
            req_timeout: false,
        }
    }

    /// Whether any peek so far needed the settle-wait fallback.
    #[must_use]
    pub const fn unstable(&self) -> bool {
        self.req_unstable
    }

    /// Whether any blocking poke/peek so far gave up waiting on readiness.
    #[must_use]
    pub const fn timeout(&self) -> bool {
        self.req_timeout
    }

    fn wait_ready(&mut self, io: &mut dyn HostIo) -> bool {
        let deadline = Instant::now() + READY_TIMEOUT;
        while io.mmio_read(self.base_addr + regs::READY) == 0 {
            if Instant::now() >= deadline {
                self.req_timeout = true;
                return false;
            }
        }
        true
    }

    /// Steps the target `cycles` cycles via `master`. If `blocking`, spins
    /// until the master reports the step done.
    pub fn step(&self, io: &mut dyn HostIo, master: &Master, cycles: u32, blocking: bool) {
        master.step(io, cycles, blocking);
    }

    /// Polls whether the target's most recently issued step has completed,
    /// via `master`.
    pub fn is_done(&self, io: &mut dyn HostIo, master: &Master) -> bool {
        master.is_done(io)
    }

    /// Writes `value` to `port`. Silently a no-op if `port` is unknown.
    ///
    /// If `blocking`, waits (up to a timeout) for the widget to signal it
    /// has synced with the target's most recent step before returning.
    pub fn poke(&mut self, io: &mut dyn HostIo, port: &str, value: u32, blocking: bool) {
        let Some(p) = self.ports.get(port).copied() else {
            return;
        };
        io.mmio_write(p.address, value);
        if blocking {
            let _ = self.wait_ready(io);
        }
    }

    /// Reads `port`. Returns `None` if `port` is unknown.
    ///
    /// If `blocking`, waits (up to a timeout) for the widget to signal
    /// readiness first. If the target reports peeks are not precisely
    /// peekable, this also waits [`SETTLE_WAIT`] (a shorter timeout) to let
    /// a combinational readout settle, and marks [`PeekPoke::unstable`].
    pub fn peek(&mut self, io: &mut dyn HostIo, port: &str, blocking: bool) -> Option<u32> {
        let p = *self.ports.get(port)?;
        if blocking {
            let _ = self.wait_ready(io);
        }
        if io.mmio_read(self.base_addr + regs::PRECISE_PEEKABLE) == 0 {
            self.req_unstable = true;
            std::thread::sleep(SETTLE_WAIT);
        }
        Some(io.mmio_read(p.address))
    }

    /// Wide-value variant of [`PeekPoke::poke`], for ports wider than 32 bits.
    pub fn poke_wide(&mut self, io: &mut dyn HostIo, port: &str, value: &WideValue, blocking: bool) {
        let Some(p) = self.ports.get(port).copied() else {
            return;
        };
        let padded = value.resized(p.chunks as usize);
        for (i, chunk) in padded.chunks().iter().enumerate() {
            io.mmio_write(p.address + 4 * i as u32, *chunk);
        }
        if blocking {
            let _ = self.wait_ready(io);
        }
    }

    /// Wide-value variant of [`PeekPoke::peek`], for ports wider than 32 bits.
    pub fn peek_wide(&mut self, io: &mut dyn HostIo, port: &str, blocking: bool) -> Option<WideValue> {
        let p = *self.ports.get(port)?;
        if blocking {
            let _ = self.wait_ready(io);
        }
        if io.mmio_read(self.base_addr + regs::PRECISE_PEEKABLE) == 0 {
            self.req_unstable = true;
            std::thread::sleep(SETTLE_WAIT);
        }
        let mut chunks = Vec::with_capacity(p.chunks as usize);
        for i in 0..p.chunks {
            chunks.push(io.mmio_read(p.address + 4 * i));
        }
        Some(WideValue::from_chunks_lsw_first(chunks))
    }
}

impl Widget for PeekPoke {
    fn kind(&self) -> WidgetKind {
        WidgetKind::PeekPoke
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
    use std::collections::HashMap as Map;

    #[derive(Default)]
    struct FakeIo {
        regs: Map<u32, u32>,
    }
    impl HostIo for FakeIo {
        fn mmio_read(&mut self, addr: u32) -> u32 {
            *self.regs.get(&addr).unwrap_or(&0)
        }
        fn mmio_write(&mut self, addr: u32, value: u32) {
            self.regs.insert(addr, value);
        }
    }

    fn bridge_with_port(name: &str, address: u32) -> PeekPoke {
        let mut ports = HashMap::new();
        ports.insert(name.to_string(), Port { address, chunks: 1 });
        PeekPoke::new(0, ports)
    }

    #[test]
    fn poke_writes_the_port_register() {
        let mut bridge = bridge_with_port("in", 0x100);
        let mut io = FakeIo::default();
        io.regs.insert(regs::READY, 1);
        bridge.poke(&mut io, "in", 42, true);
        assert_eq!(io.regs.get(&0x100), Some(&42));
    }

    #[test]
    fn unknown_port_peek_returns_none() {
        let mut bridge = bridge_with_port("in", 0x100);
        let mut io = FakeIo::default();
        assert_eq!(bridge.peek(&mut io, "missing", false), None);
    }

    #[test]
    fn imprecise_peek_marks_unstable() {
        let mut bridge = bridge_with_port("out", 0x200);
        let mut io = FakeIo::default();
        io.regs.insert(0x200, 7);
        assert_eq!(bridge.peek(&mut io, "out", false), Some(7));
        assert!(bridge.unstable());
    }

    #[test]
    fn step_and_is_done_defer_to_master() {
        let bridge = bridge_with_port("x", 0x100);
        let master = Master::new(0x10);
        let mut io = FakeIo::default();
        bridge.step(&mut io, &master, 1, false);
        assert_eq!(io.regs.get(&0x10), Some(&1));
        io.regs.insert(0x14, 1);
        assert!(bridge.is_done(&mut io, &master));
    }
}
