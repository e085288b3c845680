//! Pluggable placement strategies

use std::fmt::{Display, Formatter};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::entities::{Layer, Pavement};
use crate::geometry::Region;
use crate::pipeline::Mesh;

/// Trait for placement strategies that can be plugged into a [`Mesh`].
///
/// A strategy proposes the bits of a layer and may repair the irregular bits it left behind.
/// Its pavements do not need to be gapless: the layer clips them to its region and keeps track of
/// the irregular bits.
pub trait PatternStrategy: Send + Sync {
    /// One-time preparation before the layers of `mesh` are paved
    fn ready(&mut self, mesh: &Mesh) -> Result<()>;

    /// Proposes a pavement covering the whole region of `layer`
    fn pave(&mut self, layer: &Layer) -> Result<Pavement>;

    /// Proposes a pavement covering `region` only
    fn pave_region(&mut self, layer: &Layer, region: &Region) -> Result<Pavement>;

    /// Tries to repair the irregular bits of `layer` in place.
    /// Calling it again on a repaired layer must not change it.
    fn optimize(&mut self, layer: &mut Layer) -> OptimizeOutcome;

    /// Interdependent strategies carry state from one layer to the next, so layers are paved in order
    fn is_interdependent(&self) -> bool;

    /// Independent copy of the strategy, one is handed to every layer paved in parallel
    fn clone_box(&self) -> Box<dyn PatternStrategy>;

    /// Name of the strategy, used in logs
    fn common_name(&self) -> &str;
}

impl Clone for Box<dyn PatternStrategy> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Result of [`PatternStrategy::optimize`] on one layer
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizeOutcome {
    /// No irregular bit left
    Resolved,
    /// Some irregular bits are left
    Remaining(usize),
    /// The strategy tried and failed
    Failed,
    /// The strategy has no optimization algorithm
    Unavailable,
}

impl OptimizeOutcome {
    pub fn code(&self) -> i64 {
        match self {
            OptimizeOutcome::Resolved => 0,
            OptimizeOutcome::Remaining(n) => *n as i64,
            OptimizeOutcome::Failed => -1,
            OptimizeOutcome::Unavailable => -2,
        }
    }

    /// Inverse of [`OptimizeOutcome::code`]. Unknown negative codes are treated as failures.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => OptimizeOutcome::Resolved,
            -2 => OptimizeOutcome::Unavailable,
            n if n > 0 => OptimizeOutcome::Remaining(n as usize),
            _ => OptimizeOutcome::Failed,
        }
    }

    /// Outcome for a layer that has `n` irregular bits after optimization
    pub fn from_remaining(n: usize) -> Self {
        match n {
            0 => OptimizeOutcome::Resolved,
            n => OptimizeOutcome::Remaining(n),
        }
    }
}

impl Display for OptimizeOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizeOutcome::Resolved => write!(f, "resolved"),
            OptimizeOutcome::Remaining(n) => write!(f, "{n} remaining"),
            OptimizeOutcome::Failed => write!(f, "failed"),
            OptimizeOutcome::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(OptimizeOutcome::Resolved, 0)]
    #[test_case(OptimizeOutcome::Remaining(7), 7)]
    #[test_case(OptimizeOutcome::Failed, -1)]
    #[test_case(OptimizeOutcome::Unavailable, -2)]
    fn outcome_codes(outcome: OptimizeOutcome, code: i64) {
        assert_eq!(outcome.code(), code);
        assert_eq!(OptimizeOutcome::from_code(code), outcome);
    }

    #[test]
    fn unknown_codes_are_failures() {
        assert_eq!(OptimizeOutcome::from_code(-9), OptimizeOutcome::Failed);
        assert_eq!(OptimizeOutcome::from_remaining(0), OptimizeOutcome::Resolved);
    }
}
