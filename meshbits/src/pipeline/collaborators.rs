use anyhow::Result;

use crate::entities::{BitAssignment, BitKey, LayerSnapshot, Model, Slice};
use crate::io::export::MeshExport;
use crate::util::CraftConfig;

/// Loads the triangulated model of a mesh
pub trait ModelLoader {
    fn load(&self) -> Result<Model>;
}

/// Cuts a model into horizontal sections, one per layer, ordered by altitude
pub trait Slicer {
    fn slice(&self, model: &Model, config: &CraftConfig) -> Result<Vec<Slice>>;
}

/// Assignment of one bit, as computed by a [`Scheduler`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledBit {
    pub layer: usize,
    pub key: BitKey,
    pub assignment: BitAssignment,
}

/// Decides the production order of the bits of a paved mesh
pub trait Scheduler: Send + Sync {
    fn schedule(&self, layers: &[LayerSnapshot]) -> Result<Vec<ScheduledBit>>;
}

/// Turns the read-only views of a mesh into manufacturing instructions
pub trait Exporter: Send + Sync {
    fn export(&self, export: &MeshExport) -> Result<()>;
}
