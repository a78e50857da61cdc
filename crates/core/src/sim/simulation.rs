//! Ties the master/stepper, the widget registry, the stream engine, and the
//! scheduler together into one run: bring the target out of reset, load its
//! memory image, step it to completion (or timeout), and report a
//! performance summary.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{info, warn};

use super::scheduler::Scheduler;
use crate::bridges::clock::Clock;
use crate::bridges::loadmem::LoadMem;
use crate::bridges::master::Master;
use crate::common::error::DriverError;
use crate::common::time::Timestamp;
use crate::config::PlusArgs;
use crate::hostio::HostIo;
use crate::stream::StreamEngine;
use crate::widget::{registry::WidgetRegistry, WidgetKind};

/// The outcome of a completed run, used to build the performance summary
/// and decide the process exit code.
#[derive(Debug, Clone, Copy)]
struct RunOutcome {
    timed_out: bool,
    exit_code: i32,
}

/// Drives one target instance from reset to completion.
pub struct Simulation {
    target_name: String,
    io: Box<dyn HostIo>,
    registry: WidgetRegistry,
    master: Rc<RefCell<Master>>,
    clock: Option<Rc<RefCell<Clock>>>,
    scheduler: Scheduler,
    stream_engine: StreamEngine,
}

impl Simulation {
    /// Creates a simulation around an already-constructed master bridge and
    /// scheduler.
    #[must_use]
    pub fn new(
        target_name: impl Into<String>,
        io: Box<dyn HostIo>,
        master: Rc<RefCell<Master>>,
        scheduler: Scheduler,
    ) -> Self {
        let mut registry = WidgetRegistry::new();
        registry
            .add_existing_widget(master.clone())
            .unwrap_or_else(|e| unreachable!("a fresh registry can't already hold a master: {e}"));
        Self {
            target_name: target_name.into(),
            io,
            registry,
            master,
            clock: None,
            scheduler,
            stream_engine: StreamEngine::new(),
        }
    }

    /// The widget registry, for callers wiring up bridges before the run
    /// starts.
    pub fn registry_mut(&mut self) -> &mut WidgetRegistry {
        &mut self.registry
    }

    /// The stream engine, for callers registering pull/push streams.
    pub fn stream_engine_mut(&mut self) -> &mut StreamEngine {
        &mut self.stream_engine
    }

    /// Direct host I/O access, for setup steps run before [`Simulation::run`].
    pub fn io_mut(&mut self) -> &mut dyn HostIo {
        self.io.as_mut()
    }

    /// Registers the clock bridge, enabling the host-frequency and FMR
    /// lines of the performance summary.
    pub fn set_clock(&mut self, clock: Rc<RefCell<Clock>>) {
        self.clock = Some(clock);
    }

    /// Brings the target out of reset, optionally zeroing DRAM and loading
    /// a memory image, then steps it until a bridge terminates the run or
    /// the `+max-cycles=` bound is reached, and prints the performance
    /// summary.
    ///
    /// # Errors
    /// Returns [`DriverError::LoadMemFailed`] if `+loadmem=` names a file
    /// that cannot be read or parsed.
    pub fn run(&mut self, plusargs: &PlusArgs) -> Result<i32, DriverError> {
        while !self.master.borrow().is_init_done(self.io.as_mut()) {}
        self.stream_engine.init_all(self.io.as_mut());

        for bridge in self.registry.bridges() {
            bridge.borrow_mut().init(self.io.as_mut());
        }

        if plusargs.has_flag("zero-out-dram") {
            if let Ok(widget) = self.registry.get_singleton(WidgetKind::LoadMem) {
                let widget = widget.borrow();
                let Some(loadmem) = widget.as_any().downcast_ref::<LoadMem>() else {
                    unreachable!("widget registered under WidgetKind::LoadMem is always a LoadMem");
                };
                loadmem.zero_out_dram(self.io.as_mut());
            }
        }

        if let Some(path) = plusargs.get_str("loadmem") {
            let contents = std::fs::read_to_string(path).map_err(|e| DriverError::LoadMemFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
            let widget = self.registry.get_singleton(WidgetKind::LoadMem)?;
            let widget = widget.borrow();
            let Some(loadmem) = widget.as_any().downcast_ref::<LoadMem>() else {
                unreachable!("widget registered under WidgetKind::LoadMem is always a LoadMem");
            };
            if plusargs.has_flag("fastloadmem") {
                loadmem.load_from_text_direct(self.io.as_mut(), &contents, 0)?;
            } else {
                loadmem.load_from_text(self.io.as_mut(), &contents, 0)?;
            }
        }

        let start = Timestamp::now();
        let start_hcycle = self.clock.as_ref().map(|c| c.borrow().hcycle(self.io.as_mut()));
        let start_tcycle = self.clock.as_ref().map(|c| c.borrow().tcycle(self.io.as_mut()));

        let outcome = self.run_loop();

        let end = Timestamp::now();
        let end_hcycle = self.clock.as_ref().map(|c| c.borrow().hcycle(self.io.as_mut()));
        let end_tcycle = self
            .clock
            .as_ref()
            .map(|c| c.borrow().tcycle(self.io.as_mut()))
            .unwrap_or_else(|| self.scheduler.current_tcycle());

        for bridge in self.registry.bridges() {
            bridge.borrow_mut().finish();
        }

        let tcycles_emulated = end_tcycle.saturating_sub(start_tcycle.unwrap_or(0));
        self.print_result(outcome, tcycles_emulated);
        self.print_performance_summary(start, end, start_hcycle, end_hcycle, tcycles_emulated);

        Ok(if outcome.timed_out { 1 } else { outcome.exit_code })
    }

    fn run_loop(&mut self) -> RunOutcome {
        loop {
            if self.scheduler.reached_max_cycles() {
                return RunOutcome {
                    timed_out: true,
                    exit_code: 1,
                };
            }

            let step = self.scheduler.get_largest_stepsize();
            self.master.borrow().step(self.io.as_mut(), step as u32, true);
            self.scheduler.advance(step);
            let _due = self.scheduler.run_scheduled_tasks();

            for bridge in self.registry.bridges() {
                bridge.borrow_mut().tick(self.io.as_mut());
            }

            for bridge in self.registry.bridges() {
                let mut bridge = bridge.borrow_mut();
                if bridge.terminate() {
                    return RunOutcome {
                        timed_out: false,
                        exit_code: bridge.exit_code(),
                    };
                }
            }
        }
    }

    fn print_result(&self, outcome: RunOutcome, tcycle: u64) {
        if outcome.timed_out {
            warn!(target_name = %self.target_name, tcycle, "*** FAILED *** (timeout) after {tcycle} cycles");
        } else if outcome.exit_code == 0 {
            info!(target_name = %self.target_name, tcycle, "*** PASSED *** after {tcycle} cycles");
        } else {
            warn!(
                target_name = %self.target_name,
                tcycle,
                exit_code = outcome.exit_code,
                "*** FAILED *** after {tcycle} cycles"
            );
        }
    }

    fn print_performance_summary(
        &self,
        start: Timestamp,
        end: Timestamp,
        start_hcycle: Option<u64>,
        end_hcycle: Option<u64>,
        tcycles: u64,
    ) {
        let wall_secs = end.diff_secs(start);
        info!("Wallclock Time Elapsed: {wall_secs:.1} s");

        if let (Some(start_h), Some(end_h)) = (start_hcycle, end_hcycle) {
            let hcycles = end_h.saturating_sub(start_h);
            let host_mhz = hcycles as f64 / 1e6 / wall_secs.max(f64::EPSILON);
            let target_mhz = tcycles as f64 / 1e6 / wall_secs.max(f64::EPSILON);
            let fmr = if tcycles == 0 {
                f64::INFINITY
            } else {
                hcycles as f64 / tcycles as f64
            };
            info!("Host Frequency: {host_mhz:.3} MHz");
            info!("Target Cycles Emulated: {tcycles}");
            info!("Effective Target Frequency: {target_mhz:.3} MHz");
            info!("FMR: {fmr:.3}");
        } else {
            info!("Target Cycles Emulated: {tcycles}");
        }
    }
}
