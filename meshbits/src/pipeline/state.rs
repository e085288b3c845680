use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a [`Mesh`](crate::pipeline::Mesh).
///
/// Stable stages are reached after an operation completes, *working* stages last while it runs.
/// Every transition is published on the mesh's [`EventBus`](crate::pipeline::EventBus).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeshState {
    Ready,
    Opened,
    OpenFailed,
    Saved,
    SaveFailed,
    ImportFailed,
    Importing,
    Imported,
    SliceFailed,
    Slicing,
    Sliced,
    PaveFailed,
    PavingMesh,
    PavedMesh,
    PavingLayer,
    PavedLayer,
    OptimizingLayer,
    OptimizedLayer,
    OptimizingMesh,
    OptimizedMesh,
    Gluing,
    Glued,
    ScheduleFailed,
    Scheduling,
    Scheduled,
    ExportFailed,
    Exporting,
    Exported,
}

impl MeshState {
    pub fn code(&self) -> u32 {
        match self {
            MeshState::Ready => 0,
            MeshState::Opened => 1,
            MeshState::OpenFailed => 2,
            MeshState::Saved => 50,
            MeshState::SaveFailed => 51,
            MeshState::ImportFailed => 99,
            MeshState::Importing => 100,
            MeshState::Imported => 101,
            MeshState::SliceFailed => 199,
            MeshState::Slicing => 200,
            MeshState::Sliced => 201,
            MeshState::PaveFailed => 299,
            MeshState::PavingMesh => 300,
            MeshState::PavedMesh => 301,
            MeshState::PavingLayer => 350,
            MeshState::PavedLayer => 351,
            MeshState::OptimizingLayer => 400,
            MeshState::OptimizedLayer => 401,
            MeshState::OptimizingMesh => 500,
            MeshState::OptimizedMesh => 501,
            MeshState::Gluing => 600,
            MeshState::Glued => 601,
            MeshState::ScheduleFailed => 699,
            MeshState::Scheduling => 700,
            MeshState::Scheduled => 701,
            MeshState::ExportFailed => 899,
            MeshState::Exporting => 900,
            MeshState::Exported => 901,
        }
    }

    /// True while an operation is running on the mesh
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            MeshState::Importing
                | MeshState::Slicing
                | MeshState::PavingMesh
                | MeshState::PavingLayer
                | MeshState::OptimizingLayer
                | MeshState::OptimizingMesh
                | MeshState::Gluing
                | MeshState::Scheduling
                | MeshState::Exporting
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MeshState::OpenFailed
                | MeshState::SaveFailed
                | MeshState::ImportFailed
                | MeshState::SliceFailed
                | MeshState::PaveFailed
                | MeshState::ScheduleFailed
                | MeshState::ExportFailed
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            MeshState::Ready => "READY",
            MeshState::Opened => "OPENED",
            MeshState::OpenFailed => "OPEN_FAILED",
            MeshState::Saved => "SAVED",
            MeshState::SaveFailed => "SAVE_FAILED",
            MeshState::ImportFailed => "IMPORT_FAILED",
            MeshState::Importing => "IMPORTING",
            MeshState::Imported => "IMPORTED",
            MeshState::SliceFailed => "SLICE_FAILED",
            MeshState::Slicing => "SLICING",
            MeshState::Sliced => "SLICED",
            MeshState::PaveFailed => "PAVE_FAILED",
            MeshState::PavingMesh => "PAVING_MESH",
            MeshState::PavedMesh => "PAVED_MESH",
            MeshState::PavingLayer => "PAVING_LAYER",
            MeshState::PavedLayer => "PAVED_LAYER",
            MeshState::OptimizingLayer => "OPTIMIZING_LAYER",
            MeshState::OptimizedLayer => "OPTIMIZED_LAYER",
            MeshState::OptimizingMesh => "OPTIMIZING_MESH",
            MeshState::OptimizedMesh => "OPTIMIZED_MESH",
            MeshState::Gluing => "GLUING",
            MeshState::Glued => "GLUED",
            MeshState::ScheduleFailed => "SCHEDULE_FAILED",
            MeshState::Scheduling => "SCHEDULING",
            MeshState::Scheduled => "SCHEDULED",
            MeshState::ExportFailed => "EXPORT_FAILED",
            MeshState::Exporting => "EXPORTING",
            MeshState::Exported => "EXPORTED",
        }
    }
}

impl Display for MeshState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
