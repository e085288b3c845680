use serde::{Deserialize, Serialize};

use meshbits::util::{CraftConfig, ExecutorConfig};

/// Configuration of a `brick` run
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct BrickConfig {
    /// Manufacturing constants of the bits
    pub craft: CraftConfig,
    /// Worker pool executing the per-layer tasks
    pub executor: ExecutorConfig,
    /// Horizontal and vertical gap between two bits of the brick pattern, in mm
    pub bits_offset: f64,
    /// Runs the optimization of the strategy after paving
    pub optimize: bool,
    /// Assigns a production order to the bits before exporting
    pub schedule: bool,
}

impl Default for BrickConfig {
    fn default() -> Self {
        Self {
            craft: CraftConfig::default(),
            executor: ExecutorConfig::default(),
            bits_offset: 3.0,
            optimize: false,
            schedule: true,
        }
    }
}
