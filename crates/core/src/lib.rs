//! Host-side co-simulation driver runtime.
//!
//! This crate implements the core of a FireSim-style simulation driver: the
//! part of the system that advances an FPGA-resident (or metasimulated) RTL
//! target through a discrete token-exchange protocol. It provides:
//! 1. **Master/stepper:** target-cycle advancement and the termination protocol.
//! 2. **Widgets:** a kind-indexed registry and the bridge-driver tick loop.
//! 3. **Streams:** host-managed and target-managed DMA-ring token transport.
//! 4. **Metasimulation:** a two-thread rendezvous against an RTL-simulator
//!    stand-in, with host-delay fuzzing (feature `metasim`).
//!
//! Out of scope: bit-exact bridge behavior beyond the contracts in
//! [`widget::BridgeDriver`], the FPGA image build pipeline, and real
//! hardware backends (BAR-mapped MMIO, XDMA character devices).

/// Common types shared across the driver: errors, wall-clock timing, and the
/// chunked wide-value encoding used by MMIO-streamed arbitrary-width ports.
pub mod common;
/// Target and AXI4 configuration, plus `+`-prefixed command-line argument parsing.
pub mod config;
/// Bridge drivers: master, clock, loadmem, peek-poke, plusargs, and a
/// representative streaming bridge.
pub mod bridges;
/// Abstract host-to-target transport (MMIO + the two DMA regimes).
pub mod hostio;
/// Metasimulation harness: driver/RTL-simulator thread rendezvous and the
/// in-process AXI4 queue objects it exchanges.
#[cfg(feature = "metasim")]
pub mod metasim;
/// Simulation orchestrator, performance summary, and the systematic scheduler.
pub mod sim;
/// Stream engine and the CPU-managed / FPGA-managed stream driver variants.
pub mod stream;
/// Widget trait, kind tokens, and the widget registry.
pub mod widget;

pub use common::error::DriverError;
pub use config::{AXI4Config, TargetConfig};
pub use hostio::HostIo;
pub use sim::simulation::Simulation;
pub use widget::registry::WidgetRegistry;
