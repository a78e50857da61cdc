//! Target and AXI4 configuration, and `+`-prefixed plus-arg parsing.
//!
//! `TargetConfig` is produced once per run (from a JSON file or a CLI flag)
//! and handed to every widget and bridge that needs to know the shape of the
//! target: its control bus, its memory bus, and which DMA regimes (if any)
//! its streams use.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// AXI4 bus geometry: ID width, address width, and data width, all in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AXI4Config {
    /// Width of the AXI4 transaction ID field, in bits.
    pub id_bits: u32,
    /// Width of the address field, in bits.
    pub addr_bits: u32,
    /// Width of the data field, in bits.
    pub data_bits: u32,
}

impl AXI4Config {
    /// Number of bytes carried by one beat of this bus.
    #[must_use]
    pub const fn beat_bytes(&self) -> u32 {
        self.data_bits / 8
    }

    /// Number of write-strobe bits, one per byte lane.
    #[must_use]
    pub const fn strb_bits(&self) -> u32 {
        self.data_bits / 8
    }

    /// The AXI4 `size` encoding (`log2` of bytes per beat) for this bus.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.beat_bytes().trailing_zeros()
    }
}

/// Static description of the target a driver instance talks to: its buses,
/// memory channel count, and which DMA regimes its streams use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Control (MMIO) bus geometry.
    pub ctrl: AXI4Config,
    /// Main memory bus geometry.
    pub mem: AXI4Config,
    /// Number of parallel memory channels the target exposes.
    pub mem_num_channels: u32,
    /// Bus geometry for CPU-managed DMA streams, if the target has any.
    pub cpu_managed: Option<AXI4Config>,
    /// Bus geometry for FPGA-managed DMA streams, if the target has any.
    pub fpga_managed: Option<AXI4Config>,
    /// Human-readable target name, used in log output and the performance
    /// summary header.
    pub target_name: String,
}

impl TargetConfig {
    /// Parses a target configuration from JSON text.
    ///
    /// # Errors
    /// Returns an error if `json` is not valid JSON or does not match the
    /// shape of [`TargetConfig`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A parsed set of `+key=value` / `+flag` command-line tokens.
///
/// Targets are traditionally configured with Verilog-style plus-args rather
/// than conventional `--flag value` options; this type parses that
/// convention once and hands out typed lookups to bridges and the driver
/// binary alike.
#[derive(Debug, Clone, Default)]
pub struct PlusArgs {
    values: HashMap<String, String>,
    flags: std::collections::HashSet<String>,
}

impl PlusArgs {
    /// Parses plus-args out of a full argument list, ignoring tokens that
    /// don't start with `+`.
    #[must_use]
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = HashMap::new();
        let mut flags = std::collections::HashSet::new();
        for arg in args {
            let arg = arg.as_ref();
            let Some(rest) = arg.strip_prefix('+') else {
                continue;
            };
            if let Some((key, value)) = rest.split_once('=') {
                values.insert(key.to_string(), value.to_string());
            } else {
                flags.insert(rest.to_string());
            }
        }
        Self { values, flags }
    }

    /// Returns the raw string value for `+key=...`, if present.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Parses `+key=...` as a `u64`.
    #[must_use]
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_str(key)?.parse().ok()
    }

    /// Parses `+key=...` as a `u32`.
    #[must_use]
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get_str(key)?.parse().ok()
    }

    /// Returns `true` if the bare flag `+key` was present, with no `=value`.
    #[must_use]
    pub fn has_flag(&self, key: &str) -> bool {
        self.flags.contains(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> AXI4Config {
        AXI4Config {
            id_bits: 4,
            addr_bits: 32,
            data_bits: 64,
        }
    }

    #[test]
    fn beat_bytes_and_size_match_data_width() {
        let cfg = sample();
        assert_eq!(cfg.beat_bytes(), 8);
        assert_eq!(cfg.strb_bits(), 8);
        assert_eq!(cfg.size(), 3);
    }

    #[test]
    fn plusargs_distinguish_flags_and_values() {
        let args = PlusArgs::parse(["+max-cycles=1000", "+fastloadmem", "binary.elf"]);
        assert_eq!(args.get_u64("max-cycles"), Some(1000));
        assert!(args.has_flag("fastloadmem"));
        assert_eq!(args.get_str("loadmem"), None);
    }

    #[test]
    fn target_config_round_trips_through_json() {
        let cfg = TargetConfig {
            ctrl: sample(),
            mem: sample(),
            mem_num_channels: 1,
            cpu_managed: None,
            fpga_managed: Some(sample()),
            target_name: "rocket".to_string(),
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed = TargetConfig::from_json(&json).unwrap();
        assert_eq!(cfg, parsed);
    }
}
