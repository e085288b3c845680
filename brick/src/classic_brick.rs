use anyhow::Result;
use itertools::Itertools;
use log::debug;

use meshbits::entities::{Bit, Layer, Pavement};
use meshbits::geometry::Region;
use meshbits::geometry::primitives::Point;
use meshbits::pipeline::Mesh;
use meshbits::strategy::{OptimizeOutcome, PatternStrategy};
use meshbits::util::CraftConfig;

/// Simplest pattern possible: a grid of full bits, rotated by 90° on every other layer.
///
/// There is no optimization for this pattern.
#[derive(Clone, Debug)]
pub struct ClassicBrick {
    /// Horizontal and vertical gap between two bits
    pub bits_offset: f64,
    /// Radius of the disk containing every layer, known once the strategy is ready
    skirt_radius: Option<f64>,
}

impl ClassicBrick {
    pub const NAME: &'static str = "Classic Brick Pattern";

    pub fn new(bits_offset: f64) -> Self {
        Self {
            bits_offset,
            skirt_radius: None,
        }
    }

    /// Rotation of the whole pavement of the layer at `index`
    pub fn rotation(index: usize) -> Point {
        match index % 2 {
            0 => Point(0.0, 1.0),
            _ => Point(1.0, 0.0),
        }
    }

    /// Origins of the grid, column by column, before the rotation of the layer.
    /// The grid spans `[-(skirt + max side), skirt + max side]` in both directions.
    pub fn grid(&self, skirt_radius: f64, config: &CraftConfig) -> Vec<Point> {
        let bound = skirt_radius + config.max_bit_side();
        let x_step = config.bit_length + self.bits_offset;
        let y_step = config.bit_width + self.bits_offset;
        let n_columns = (2.0 * bound / x_step).floor() as usize + 1;
        let n_rows = (2.0 * bound / y_step).floor() as usize + 1;

        (0..n_columns)
            .cartesian_product(0..n_rows)
            .map(|(i, j)| Point(-bound + i as f64 * x_step, -bound + j as f64 * y_step))
            .collect_vec()
    }

    fn grid_pavement(&self, layer: &Layer) -> Result<Pavement> {
        let config = *layer.config();
        // a layer paved on its own falls back to its own extent
        let skirt_radius = self
            .skirt_radius
            .unwrap_or_else(|| layer.slice().max_radius());
        let bits = self
            .grid(skirt_radius, &config)
            .into_iter()
            .map(|origin| Bit::new(origin, Point(1.0, 0.0), config))
            .collect::<Result<Vec<_>>>()?;
        Pavement::from_bits(bits, ClassicBrick::rotation(layer.index()), config)
    }
}

impl Default for ClassicBrick {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl PatternStrategy for ClassicBrick {
    fn ready(&mut self, mesh: &Mesh) -> Result<()> {
        self.skirt_radius = Some(mesh.skirt_radius());
        Ok(())
    }

    fn pave(&mut self, layer: &Layer) -> Result<Pavement> {
        self.grid_pavement(layer)
    }

    fn pave_region(&mut self, layer: &Layer, region: &Region) -> Result<Pavement> {
        let config = *layer.config();
        let grid = self.grid_pavement(layer)?;
        let n_grid = grid.len();
        let kept = grid
            .into_bits()
            .filter(|bit| !bit.full_region().intersect(region).is_empty())
            .collect_vec();
        debug!(
            "[BRICK] layer {}: {} of {n_grid} bits meet the region",
            layer.index(),
            kept.len()
        );
        Pavement::from_bits(kept, Point(1.0, 0.0), config)
    }

    fn optimize(&mut self, _layer: &mut Layer) -> OptimizeOutcome {
        OptimizeOutcome::Unavailable
    }

    fn is_interdependent(&self) -> bool {
        false
    }

    fn clone_box(&self) -> Box<dyn PatternStrategy> {
        Box::new(self.clone())
    }

    fn common_name(&self) -> &str {
        ClassicBrick::NAME
    }
}
