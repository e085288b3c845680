//! Layer pavement and bit resolution engine.
//!
//! A sliced model is turned into a stack of [`Layer`](entities::Layer)s, each covered by rectangular
//! [`Bit`](entities::Bit)s proposed by a [`PatternStrategy`](strategy::PatternStrategy).
//! Bits are clipped to their layer and split into pieces that can be gripped and lifted on their own.

/// Bits, pieces, pavements and layers
pub mod entities;

/// Geometric primitives, region algebra and the algorithms resolving bit pieces
pub mod geometry;

/// Importing persisted meshes and exposing read-only views to exporters
pub mod io;

/// Mesh orchestration: stages, worker pool and events
pub mod pipeline;

/// Contract of the pluggable placement strategies
pub mod strategy;

/// Helper functions which do not belong to any specific module
pub mod util;
