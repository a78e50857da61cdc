//! Built-in bridge drivers.
//!
//! These are the widgets nearly every target carries regardless of its
//! user-visible I/O: the simulation master, the host/target clock bridge,
//! DRAM loading, direct peek/poke of target ports, and plusargs. [`dmi`]
//! is a smaller representative bridge included to show the shape of a
//! target-specific driver built on the same [`crate::widget::BridgeDriver`]
//! contract.

pub mod clock;
pub mod dmi;
pub mod loadmem;
pub mod master;
pub mod peek_poke;
pub mod plusargs;
