mod collaborators;
mod error;
mod events;
mod mesh;
mod report;
mod state;
mod tracker;

#[doc(inline)]
pub use collaborators::{Exporter, ModelLoader, ScheduledBit, Scheduler, Slicer};

#[doc(inline)]
pub use error::MeshError;

#[doc(inline)]
pub use events::{EventBus, EventCallback, EventPayload, MeshMessage};

#[doc(inline)]
pub use mesh::Mesh;

#[doc(inline)]
pub use report::OptimizationReport;

#[doc(inline)]
pub use state::MeshState;

#[doc(inline)]
pub use tracker::CompletionTracker;
