//! A debug-module-interface bridge: a small representative streaming
//! bridge, included to show a target-specific driver built on the same
//! tick/terminate/finish contract as the built-in bridges.
//!
//! The register protocol and the per-tick control flow mirror a DTM
//! request/response handshake: each tick harvests a pending response, then
//! (if the target's ready to accept one) issues the next queued request.

use crate::hostio::HostIo;
use crate::widget::{BridgeDriver, Widget, WidgetKind};
use std::any::Any;
use std::collections::VecDeque;

mod regs {
    pub const IN_BITS_ADDR: u32 = 0x00;
    pub const IN_BITS_DATA: u32 = 0x04;
    pub const IN_BITS_OP: u32 = 0x08;
    pub const IN_VALID: u32 = 0x0C;
    pub const IN_READY: u32 = 0x10;
    pub const OUT_BITS_DATA: u32 = 0x14;
    pub const OUT_BITS_RESP: u32 = 0x18;
    pub const OUT_VALID: u32 = 0x1C;
    pub const OUT_READY: u32 = 0x20;
    pub const DONE: u32 = 0x24;
    pub const START: u32 = 0x28;
}

/// One outstanding debug-module request: a target-register address, the
/// data word to write (ignored for reads), and the DTM opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmiRequest {
    /// Target-side debug register address.
    pub addr: u32,
    /// Write data, meaningful only when `op` is a write.
    pub data: u32,
    /// DTM operation code (0 = nop, 1 = read, 2 = write).
    pub op: u32,
}

/// A harvested debug-module response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmiResponse {
    /// Data word returned by the target.
    pub data: u32,
    /// DTM response code.
    pub resp: u32,
}

/// Drives a target's debug transport interface: feeds a queue of
/// [`DmiRequest`]s across the IN channel and harvests [`DmiResponse`]s off
/// the OUT channel, one in-flight request at a time.
#[derive(Debug)]
pub struct DmiBridge {
    base_addr: u32,
    has_mem: bool,
    done: bool,
    pending: VecDeque<DmiRequest>,
    inflight: bool,
    responses: Vec<DmiResponse>,
}

impl DmiBridge {
    /// Creates a DMI bridge at `base_addr` that issues `requests` in order.
    ///
    /// # Note
    // TODO: support loadmem over DMI; until then this always disables the
    // memory-mapped path regardless of what the caller asks for.
    #[must_use]
    pub fn new(base_addr: u32, _has_mem: bool, requests: Vec<DmiRequest>) -> Self {
        Self {
            base_addr,
            has_mem: false,
            done: false,
            pending: VecDeque::from(requests),
            inflight: false,
            responses: Vec::new(),
        }
    }

    /// Whether this bridge's memory-mapped path is active.
    #[must_use]
    pub const fn has_mem(&self) -> bool {
        self.has_mem
    }

    /// Base MMIO address this bridge was configured with.
    #[must_use]
    pub const fn base_addr(&self) -> u32 {
        self.base_addr
    }

    /// Responses harvested so far, in the order they arrived.
    #[must_use]
    pub fn responses(&self) -> &[DmiResponse] {
        &self.responses
    }

    /// Whether every queued request has been issued and acknowledged.
    #[must_use]
    pub fn requests_drained(&self) -> bool {
        self.pending.is_empty() && !self.inflight
    }
}

impl Widget for DmiBridge {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Custom("dmi")
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl BridgeDriver for DmiBridge {
    fn init(&mut self, _io: &mut dyn HostIo) {}

    fn tick(&mut self, io: &mut dyn HostIo) {
        if io.mmio_read(self.base_addr + regs::DONE) != 0 {
            self.done = true;
            return;
        }

        if io.mmio_read(self.base_addr + regs::OUT_VALID) != 0 {
            let data = io.mmio_read(self.base_addr + regs::OUT_BITS_DATA);
            let resp = io.mmio_read(self.base_addr + regs::OUT_BITS_RESP);
            self.responses.push(DmiResponse { data, resp });
            io.mmio_write(self.base_addr + regs::OUT_READY, 1);
            self.inflight = false;
        }

        if !self.inflight && io.mmio_read(self.base_addr + regs::IN_READY) != 0 {
            if let Some(req) = self.pending.pop_front() {
                io.mmio_write(self.base_addr + regs::IN_BITS_ADDR, req.addr);
                io.mmio_write(self.base_addr + regs::IN_BITS_DATA, req.data);
                io.mmio_write(self.base_addr + regs::IN_BITS_OP, req.op);
                io.mmio_write(self.base_addr + regs::IN_VALID, 1);
                self.inflight = true;
            }
        }

        io.mmio_write(self.base_addr + regs::START, 1);
    }

    fn terminate(&mut self) -> bool {
        self.done
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeIo {
        regs: HashMap<u32, u32>,
    }
    impl HostIo for FakeIo {
        fn mmio_read(&mut self, addr: u32) -> u32 {
            *self.regs.get(&addr).unwrap_or(&0)
        }
        fn mmio_write(&mut self, addr: u32, value: u32) {
            self.regs.insert(addr, value);
        }
    }

    #[test]
    fn has_mem_is_always_false_regardless_of_constructor_argument() {
        assert!(!DmiBridge::new(0, true, Vec::new()).has_mem());
        assert!(!DmiBridge::new(0, false, Vec::new()).has_mem());
    }

    #[test]
    fn issues_queued_request_once_target_is_ready() {
        let mut io = FakeIo::default();
        io.mmio_write(regs::IN_READY, 1);
        let mut bridge = DmiBridge::new(0, false, vec![DmiRequest { addr: 4, data: 0xAB, op: 2 }]);
        bridge.tick(&mut io);
        assert_eq!(io.mmio_read(regs::IN_BITS_ADDR), 4);
        assert_eq!(io.mmio_read(regs::IN_BITS_DATA), 0xAB);
        assert_eq!(io.mmio_read(regs::IN_VALID), 1);
        assert!(!bridge.requests_drained());
    }

    #[test]
    fn harvests_response_and_acks_it() {
        let mut io = FakeIo::default();
        io.mmio_write(regs::OUT_VALID, 1);
        io.mmio_write(regs::OUT_BITS_DATA, 0x55);
        io.mmio_write(regs::OUT_BITS_RESP, 0);
        let mut bridge = DmiBridge::new(0, false, Vec::new());
        bridge.tick(&mut io);
        assert_eq!(bridge.responses(), &[DmiResponse { data: 0x55, resp: 0 }]);
        assert_eq!(io.mmio_read(regs::OUT_READY), 1);
    }

    #[test]
    fn done_register_terminates_the_bridge() {
        let mut io = FakeIo::default();
        io.mmio_write(regs::DONE, 1);
        let mut bridge = DmiBridge::new(0, false, Vec::new());
        bridge.tick(&mut io);
        assert!(bridge.terminate());
    }
}
