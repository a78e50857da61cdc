//! Widget kinds, the base widget trait, and the bridge-driver lifecycle.
//!
//! Every addressable piece of target logic the driver talks to — the
//! simulation master, the clock bridge, loadmem, peek/poke, plusargs, and
//! any streaming bridge — is a *widget*. Widgets are dispatched by a
//! [`WidgetKind`] token rather than a downcast chain, so the registry never
//! needs run-time type information to answer "give me the clock bridge."

pub mod registry;

use std::any::Any;
use std::fmt;

use crate::hostio::HostIo;

/// Identifies which concrete widget a trait object is, without relying on
/// `dyn Any` downcasting for routine lookups.
///
/// This mirrors the pointer-identity "kind token" used by the widget this
/// registry is modeled on: comparing two `WidgetKind`s is a cheap equality
/// check, and the registry buckets widgets by this key instead of walking a
/// type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    /// The simulation master / stepper bridge.
    Master,
    /// The host-cycle / target-cycle clock bridge.
    Clock,
    /// The DRAM-loading bridge.
    LoadMem,
    /// The peek/poke (direct target I/O) bridge.
    PeekPoke,
    /// The plusargs bridge.
    PlusArgs,
    /// A streaming bridge driver, identified by its stream name.
    Stream(&'static str),
    /// A widget kind not covered by the built-in set, identified by name.
    Custom(&'static str),
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Clock => write!(f, "clock"),
            Self::LoadMem => write!(f, "loadmem"),
            Self::PeekPoke => write!(f, "peek_poke"),
            Self::PlusArgs => write!(f, "plusargs"),
            Self::Stream(name) | Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Common behavior of every widget registered with the driver.
///
/// `as_any` exists solely so callers that already know a widget's concrete
/// type (via its [`WidgetKind`]) can downcast to it; routine dispatch should
/// go through the kind token, not through `Any`.
pub trait Widget: Any {
    /// Which kind this widget is, for registry bucketing and diagnostics.
    fn kind(&self) -> WidgetKind;

    /// Casts to `&dyn Any` for callers that need to downcast to a concrete
    /// widget type after a kind-keyed lookup.
    fn as_any(&self) -> &dyn Any;

    /// Casts to `&mut dyn Any`, the mutable counterpart of [`Widget::as_any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The tick-driven lifecycle every bridge driver implements.
///
/// `tick` is called once per scheduler pass while the bridge reports work
/// remaining; `terminate` lets a bridge end the simulation early (e.g. a
/// target-side `assert` or `$finish`); `finish` runs once after the run
/// loop exits, regardless of how it ended, to flush buffered I/O.
pub trait BridgeDriver: Widget {
    /// One-time setup after the target has come out of reset. Bridges that
    /// need to seed registers or prime a stream may freely use `io` here.
    fn init(&mut self, io: &mut dyn HostIo);

    /// Advances the bridge by one scheduler quantum, exchanging MMIO (and,
    /// for streaming bridges, DMA) with the target through `io`.
    fn tick(&mut self, io: &mut dyn HostIo);

    /// Returns `true` if this bridge has requested the simulation stop.
    fn terminate(&mut self) -> bool {
        false
    }

    /// The process exit code this bridge wants to contribute, if it
    /// terminated the run. `0` means "no opinion" / success.
    fn exit_code(&self) -> i32 {
        0
    }

    /// Runs once after the simulation loop exits, win or lose.
    fn finish(&mut self) {}
}
