use serde::{Deserialize, Serialize};

/// Manufacturing constants shared by every bit, layer and pavement of a mesh.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct CraftConfig {
    ///Thickness of a bit, also the height of a layer
    pub bit_thickness: f64,
    ///Nominal width of a full bit
    pub bit_width: f64,
    ///Nominal length of a full bit
    pub bit_length: f64,
    ///Diameter of the disk the gripper needs to pick up a piece
    pub gripper_diameter: f64,
    ///Position of the slicing plane inside a layer, in percent of the bit thickness measured from the bottom
    pub first_slice_height_percent: f64,
    ///Vertical gap between two consecutive layers
    pub layers_offset: f64,
    ///Number of decimals taken into account when comparing or rounding coordinates
    pub error_accepted: u32,
    ///Minimum clearance between neighboring bits. If undefined, pavements are reclipped without clearance
    pub bit_margin: Option<f64>,
}

impl CraftConfig {
    /// Absolute tolerance derived from [`CraftConfig::error_accepted`].
    pub fn epsilon(&self) -> f64 {
        10f64.powi(-(self.error_accepted as i32))
    }

    /// Rounds `value` to [`CraftConfig::error_accepted`] decimals.
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.error_accepted as i32);
        // adding 0.0 turns -0.0 into 0.0
        (value * factor).round() / factor + 0.0
    }

    /// Radius of the disk the gripper needs.
    pub fn gripper_radius(&self) -> f64 {
        self.gripper_diameter / 2.0
    }

    /// The longest side of a full bit.
    pub fn max_bit_side(&self) -> f64 {
        f64::max(self.bit_length, self.bit_width)
    }

    /// Lower and upper altitude of the band occupied by a layer sliced at `altitude`.
    pub fn altitude_band(&self, altitude: f64) -> (f64, f64) {
        let lower = altitude - self.first_slice_height_percent / 100.0 * self.bit_thickness;
        (lower, lower + self.bit_thickness)
    }
}

impl Default for CraftConfig {
    fn default() -> Self {
        Self {
            bit_thickness: 8.0,
            bit_width: 24.0,
            bit_length: 120.0,
            gripper_diameter: 10.0,
            first_slice_height_percent: 50.0,
            layers_offset: 1.0,
            error_accepted: 5,
            bit_margin: None,
        }
    }
}

///Configuration of the worker pool that executes per-layer tasks
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ExecutorConfig {
    ///Number of worker threads
    pub n_workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { n_workers: 5 }
    }
}
