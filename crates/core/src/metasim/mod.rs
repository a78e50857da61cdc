//! Metasimulation: a host-process stand-in for a real FPGA, built on a
//! two-thread rendezvous with host-delay fuzzing, for developing and
//! testing driver code without hardware.

pub mod harness;
pub mod queue;
pub mod rendezvous;

pub use harness::{FuzzConfig, HarnessClockSource, MetasimHarness};
pub use rendezvous::Rendezvous;
