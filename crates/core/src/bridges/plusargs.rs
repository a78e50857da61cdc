//! Plusargs: pushes `+key=value` command-line overrides (or each port's
//! compiled-in default) into the target before it leaves reset.
//!
//! A plusarg port may be wider than 32 bits, so its value is streamed
//! across a run of slice registers the same way loadmem streams a DRAM
//! beat.

use crate::common::wide::WideValue;
use crate::config::PlusArgs as ParsedPlusArgs;
use crate::hostio::HostIo;
use crate::widget::{BridgeDriver, Widget, WidgetKind};
use std::any::Any;

mod regs {
    /// Reads as nonzero once the target has latched every port's value.
    pub const INIT_DONE: u32 = 0x00;
}

/// One target-declared plusarg port.
#[derive(Debug, Clone)]
pub struct PlusArgPort {
    /// The `+name=value` key this port is bound to.
    pub name: String,
    /// Value used when the command line does not override this port.
    pub default_value: WideValue,
    /// Width of the port in bits.
    pub bit_width: u32,
    /// One MMIO slice address per 32-bit chunk of the port.
    pub slice_addrs: Vec<u32>,
    overridden: bool,
}

impl PlusArgPort {
    /// Declares a plusarg port.
    #[must_use]
    pub fn new(name: impl Into<String>, default_value: WideValue, bit_width: u32, slice_addrs: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            default_value,
            bit_width,
            slice_addrs,
            overridden: false,
        }
    }

    /// Whether the most recent [`PlusArgsBridge::init`] found a command-line
    /// override for this port.
    #[must_use]
    pub const fn get_overridden(&self) -> bool {
        self.overridden
    }
}

fn parse_numeric(text: &str) -> Option<u64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

/// Pushes plusarg values into the target's plusargs register file.
///
/// The parsed command line is captured at construction time, since the
/// actual MMIO writes only happen once, from [`BridgeDriver::init`], driven
/// by the same tick-loop protocol as every other bridge.
#[derive(Debug)]
pub struct PlusArgsBridge {
    base_addr: u32,
    ports: Vec<PlusArgPort>,
    parsed: ParsedPlusArgs,
}

impl PlusArgsBridge {
    /// Creates a plusargs bridge over `ports`, bound to the already-parsed
    /// command-line overrides.
    #[must_use]
    pub const fn new(base_addr: u32, ports: Vec<PlusArgPort>, parsed: ParsedPlusArgs) -> Self {
        Self {
            base_addr,
            ports,
            parsed,
        }
    }

    /// Polls whether the target has latched every port's value.
    pub fn is_init_done(&self, io: &mut dyn HostIo) -> bool {
        io.mmio_read(self.base_addr + regs::INIT_DONE) != 0
    }

    /// Iterates the declared ports, to report which were overridden.
    pub fn ports(&self) -> &[PlusArgPort] {
        &self.ports
    }
}

impl Widget for PlusArgsBridge {
    fn kind(&self) -> WidgetKind {
        WidgetKind::PlusArgs
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl BridgeDriver for PlusArgsBridge {
    /// Writes each port's effective value (command-line override, or its
    /// default) into its slice registers.
    fn init(&mut self, io: &mut dyn HostIo) {
        let parsed = self.parsed.clone();
        for port in &mut self.ports {
            let value = match parsed.get_str(&port.name).and_then(parse_numeric) {
                Some(n) => {
                    port.overridden = true;
                    WideValue::from_u64(n, port.slice_addrs.len())
                }
                None => {
                    port.overridden = false;
                    port.default_value.resized(port.slice_addrs.len())
                }
            };
            for (addr, chunk) in port.slice_addrs.iter().zip(value.chunks()) {
                io.mmio_write(*addr, *chunk);
            }
        }
    }

    fn tick(&mut self, _io: &mut dyn HostIo) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeIo {
        writes: Vec<(u32, u32)>,
    }
    impl HostIo for FakeIo {
        fn mmio_read(&mut self, _addr: u32) -> u32 {
            1
        }
        fn mmio_write(&mut self, addr: u32, value: u32) {
            self.writes.push((addr, value));
        }
    }

    #[test]
    fn override_takes_precedence_over_default() {
        let port = PlusArgPort::new("max-cycles", WideValue::from_u64(0, 1), 32, vec![0x10]);
        let parsed = ParsedPlusArgs::parse(["+max-cycles=42"]);
        let mut bridge = PlusArgsBridge::new(0, vec![port], parsed);
        let mut io = FakeIo::default();
        bridge.init(&mut io);
        assert_eq!(io.writes, vec![(0x10, 42)]);
        assert!(bridge.ports()[0].get_overridden());
    }

    #[test]
    fn falls_back_to_default_when_absent() {
        let port = PlusArgPort::new("seed", WideValue::from_u64(7, 1), 32, vec![0x20]);
        let parsed = ParsedPlusArgs::parse(Vec::<&str>::new());
        let mut bridge = PlusArgsBridge::new(0, vec![port], parsed);
        let mut io = FakeIo::default();
        bridge.init(&mut io);
        assert_eq!(io.writes, vec![(0x20, 7)]);
        assert!(!bridge.ports()[0].get_overridden());
    }
}
