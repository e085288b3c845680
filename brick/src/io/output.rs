use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use meshbits::io::export::MeshExport;
use meshbits::pipeline::Exporter;

use crate::config::BrickConfig;
use crate::io;

/// Content of a solution file
#[derive(Serialize, Clone)]
pub struct BrickOutput<'a> {
    #[serde(flatten)]
    pub export: &'a MeshExport,
    /// Summary of the optimization, if the mesh was optimized
    pub summary: Option<String>,
    pub n_bits: usize,
    pub n_irregular: usize,
    pub config: BrickConfig,
    pub timestamp: String,
}

/// Writes the export of a mesh as a JSON solution file
#[derive(Clone, Debug)]
pub struct JsonExporter {
    pub path: PathBuf,
    pub config: BrickConfig,
}

impl JsonExporter {
    pub fn new(path: PathBuf, config: BrickConfig) -> Self {
        Self { path, config }
    }
}

impl Exporter for JsonExporter {
    fn export(&self, export: &MeshExport) -> Result<()> {
        let output = BrickOutput {
            export,
            summary: export.optimization.as_ref().map(|r| r.summary()),
            n_bits: export.bits.len(),
            n_irregular: export.mesh.layers.iter().map(|l| l.irregular_keys.len()).sum(),
            config: self.config,
            timestamp: jiff::Timestamp::now().to_string(),
        };
        io::write_json(&output, &self.path)
    }
}
