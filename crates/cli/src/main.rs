//! Host-side driver CLI for a FireSim-style co-simulation target.
//!
//! Real FPGA backends (BAR-mapped MMIO, an XDMA character device) are out of
//! scope for this binary; it always drives the target through the
//! metasimulation harness. It parses a target configuration and a run's
//! `+key=value` / `+flag` plus-args, wires up the cross-target bridges every
//! target carries (master, clock, loadmem, peek/poke, plusargs), and runs
//! the target to completion.

use std::cell::RefCell;
use std::collections::HashMap;
use std::process;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use clap::Parser;

use firesim_driver_core::bridges::clock::Clock;
use firesim_driver_core::bridges::dmi::DmiBridge;
use firesim_driver_core::bridges::loadmem::LoadMem;
use firesim_driver_core::bridges::master::Master;
use firesim_driver_core::bridges::peek_poke::PeekPoke;
use firesim_driver_core::bridges::plusargs::PlusArgsBridge;
use firesim_driver_core::config::{PlusArgs, TargetConfig};
use firesim_driver_core::metasim::{FuzzConfig, MetasimHarness};
use firesim_driver_core::sim::Scheduler;
use firesim_driver_core::Simulation;

/// Conventional MMIO base addresses for the built-in bridges. A real target
/// publishes these in its generated header; metasimulation just fixes them.
mod base_addr {
    pub const MASTER: u32 = 0x00;
    pub const CLOCK: u32 = 0x40;
    pub const LOADMEM: u32 = 0x80;
    pub const PEEK_POKE: u32 = 0x100;
    pub const PLUSARGS: u32 = 0x140;
    pub const DMI: u32 = 0x180;
}

#[derive(Parser, Debug)]
#[command(
    name = "firesim-driver",
    author,
    version,
    about = "Host-side co-simulation driver",
    long_about = "Brings a target out of reset, optionally loads a memory image, steps it to completion, and reports a performance summary.\n\nTarget-specific configuration is passed as `+key=value` / `+flag` plus-args, in the target's own convention. This driver additionally recognizes:\n  +max-cycles=N         abort with a timeout after N target cycles\n  +loadmem=path          hex memory image to load before the run starts\n  +zero-out-dram         zero target DRAM before loading the image\n  +fastloadmem           load the memory image via the direct host-memory path instead of MMIO, on backends that support it\n  +fuzz-host-delay=N     max extra rendezvous ticks per MMIO access (metasim only)\n  +fuzz-seed=N           seed for host-delay fuzzing\n\nExamples:\n  firesim-driver --target-config target.json +loadmem=image.hex\n  firesim-driver --target-config target.json +max-cycles=1000000 +fastloadmem"
)]
struct Cli {
    /// Path to the target's JSON configuration (bus widths, DMA regimes, name).
    #[arg(long)]
    target_config: String,

    /// Default scheduler step size, in target cycles, when no task or
    /// `+max-cycles=` forces a smaller one.
    #[arg(long, default_value_t = 1_000_000)]
    default_step: u64,

    /// Size of the metasimulated DRAM backing, in bytes.
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    mem_size: usize,

    /// Plus-arg tokens (`+key=value` or `+flag`).
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    plusargs: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let plusargs = PlusArgs::parse(&cli.plusargs);

    let config_text = std::fs::read_to_string(&cli.target_config).unwrap_or_else(|e| {
        eprintln!("error reading target config {}: {e}", cli.target_config);
        process::exit(1);
    });
    let target_config = TargetConfig::from_json(&config_text).unwrap_or_else(|e| {
        eprintln!("error parsing target config {}: {e}", cli.target_config);
        process::exit(1);
    });

    let scheduler = Scheduler::new(cli.default_step, plusargs.get_u64("max-cycles"));

    let fuzz = FuzzConfig {
        max_host_delay: plusargs.get_u32("fuzz-host-delay").unwrap_or(1),
        seed: plusargs.get_u64("fuzz-seed").unwrap_or(0),
    };
    let (mut harness, clock_source) = MetasimHarness::new(fuzz, cli.mem_size);
    let chunks_per_beat = (target_config.mem.beat_bytes() / 4).max(1);
    harness.wire_loadmem(base_addr::LOADMEM, chunks_per_beat);
    let clock_source = Arc::new(clock_source);
    let runner = {
        let clock_source = clock_source.clone();
        thread::spawn(move || clock_source.run())
    };

    let master = Rc::new(RefCell::new(Master::new(base_addr::MASTER)));
    let mut sim = Simulation::new(
        target_config.target_name.clone(),
        Box::new(harness),
        master,
        scheduler,
    );

    let clock = sim
        .registry_mut()
        .add_widget(Clock::new(base_addr::CLOCK))
        .unwrap_or_else(|e| {
            eprintln!("error registering clock widget: {e}");
            process::exit(1);
        });
    sim.set_clock(clock);

    // LoadMem and PeekPoke are driven directly by this CLI rather than
    // ticked every cycle, so they're plain widgets, not bridge drivers.
    if let Err(e) = sim.registry_mut().add_widget(LoadMem::new(base_addr::LOADMEM, chunks_per_beat)) {
        eprintln!("error registering loadmem widget: {e}");
        process::exit(1);
    }
    if let Err(e) = sim
        .registry_mut()
        .add_widget(PeekPoke::new(base_addr::PEEK_POKE, HashMap::new()))
    {
        eprintln!("error registering peek/poke widget: {e}");
        process::exit(1);
    }

    if let Err(e) = sim
        .registry_mut()
        .add_bridge(PlusArgsBridge::new(base_addr::PLUSARGS, Vec::new(), plusargs.clone()))
    {
        eprintln!("error registering plusargs bridge: {e}");
        process::exit(1);
    }
    if let Err(e) = sim
        .registry_mut()
        .add_bridge(DmiBridge::new(base_addr::DMI, false, Vec::new()))
    {
        eprintln!("error registering dmi bridge: {e}");
        process::exit(1);
    }

    let exit_code = sim.run(&plusargs).unwrap_or_else(|e| {
        eprintln!("driver error: {e}");
        1
    });

    clock_source.request_stop();
    if runner.join().is_err() {
        eprintln!("warning: metasimulation clock thread panicked");
    }

    process::exit(exit_code);
}
