use itertools::Itertools;
use serde::Serialize;

use crate::strategy::OptimizeOutcome;

/// Aggregated outcome of optimizing every layer of a mesh.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct OptimizationReport {
    /// Outcome per layer index, sorted by index
    pub outcomes: Vec<(usize, OptimizeOutcome)>,
    /// Irregular bits left over all partially repaired layers
    pub remaining: usize,
    /// Layers without irregular bits
    pub clean: Vec<usize>,
    /// Layers with irregular bits left
    pub partially_unclean: Vec<usize>,
    /// Layers the strategy failed on or could not optimize
    pub unsolved: Vec<usize>,
}

impl OptimizationReport {
    pub fn new(outcomes: impl IntoIterator<Item = (usize, OptimizeOutcome)>) -> Self {
        let outcomes = outcomes
            .into_iter()
            .sorted_by_key(|(index, _)| *index)
            .collect_vec();
        let mut report = Self {
            outcomes,
            ..Default::default()
        };
        for (index, outcome) in &report.outcomes {
            match outcome {
                OptimizeOutcome::Resolved => report.clean.push(*index),
                OptimizeOutcome::Remaining(n) => {
                    report.remaining += n;
                    report.partially_unclean.push(*index);
                }
                OptimizeOutcome::Failed | OptimizeOutcome::Unavailable => {
                    report.unsolved.push(*index)
                }
            }
        }
        report
    }

    /// Human readable summary
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Auto-optimization complete. Still has {} not solved yet.",
            self.remaining
        );
        if !self.unsolved.is_empty() {
            summary.push_str(&format!(
                "\nLayers which can not be solved: {}",
                self.unsolved.iter().join(" ")
            ));
        }
        summary
    }
}
