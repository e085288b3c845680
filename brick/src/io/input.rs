use anyhow::{Result, ensure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use meshbits::entities::{Model, Slice};
use meshbits::pipeline::{ModelLoader, Slicer};
use meshbits::util::CraftConfig;

/// A model that was already cut into slices by an external slicer.
///
/// It acts both as the loader and the slicer of a mesh: loading yields an empty model named after
/// the input, slicing hands out the stored slices ordered by altitude.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PreSliced {
    #[serde(default)]
    pub name: String,
    pub slices: Vec<Slice>,
}

impl ModelLoader for PreSliced {
    fn load(&self) -> Result<Model> {
        ensure!(!self.slices.is_empty(), "pre-sliced model {:?} has no slice", self.name);
        Ok(Model {
            name: self.name.clone(),
            triangles: vec![],
        })
    }
}

impl Slicer for PreSliced {
    fn slice(&self, _model: &Model, _config: &CraftConfig) -> Result<Vec<Slice>> {
        ensure!(
            self.slices.iter().all(|s| s.altitude.is_finite()),
            "pre-sliced model {:?} has a slice without altitude",
            self.name
        );
        let slices = self
            .slices
            .iter()
            .sorted_by(|a, b| a.altitude.total_cmp(&b.altitude))
            .cloned()
            .collect_vec();
        Ok(slices)
    }
}
