use thiserror::Error;

use crate::pipeline::MeshState;

/// Errors surfaced by the operations of a [`Mesh`](crate::pipeline::Mesh).
///
/// Geometry level failures never show up here: rejected bits are reported as "no key" by the layer.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh is busy: an operation is running ({state})")]
    Busy { state: MeshState },
    #[error("mesh has to be {required} first, it is {current}")]
    MissingPrerequisite {
        required: MeshState,
        current: MeshState,
    },
    #[error("layer {index} out of range, mesh has {n_layers} layers")]
    LayerOutOfRange { index: usize, n_layers: usize },
    #[error("worker pool could not be built: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}
