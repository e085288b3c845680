use anyhow::Result;
use itertools::Itertools;
use log::debug;
use ordered_float::OrderedFloat;

use meshbits::entities::{BitAssignment, LayerSnapshot};
use meshbits::pipeline::{ScheduledBit, Scheduler};

/// Schedules bits layer by layer, bottom up.
/// Inside a layer, bits are ordered by the grip point of their first piece, x first.
/// Bits without any grippable piece cannot be handled and are left unscheduled.
#[derive(Clone, Copy, Debug)]
pub struct SequentialScheduler {
    /// Number of bits cut from one plate
    pub bits_per_plate: usize,
}

impl Default for SequentialScheduler {
    fn default() -> Self {
        Self { bits_per_plate: 8 }
    }
}

impl Scheduler for SequentialScheduler {
    fn schedule(&self, layers: &[LayerSnapshot]) -> Result<Vec<ScheduledBit>> {
        let bits_per_plate = self.bits_per_plate.max(1);
        let scheduled = layers
            .iter()
            .sorted_by_key(|l| l.index)
            .flat_map(|l| {
                let n_skipped = l
                    .bits3d
                    .values()
                    .filter(|b| b.first_grip_point().is_none())
                    .count();
                if n_skipped > 0 {
                    debug!("[SCHED] layer {}: {n_skipped} bits cannot be gripped", l.index);
                }
                l.bits3d
                    .values()
                    .filter_map(|b| b.first_grip_point().map(|p| (b.key(), p)))
                    .sorted_by_key(|(key, p)| (OrderedFloat(p.0), OrderedFloat(p.1), *key))
                    .map(move |(key, _)| (l.index, key))
            })
            .enumerate()
            .map(|(rank, (layer, key))| ScheduledBit {
                layer,
                key,
                assignment: BitAssignment {
                    index: rank,
                    plate: rank / bits_per_plate,
                    batch: layer,
                },
            })
            .collect_vec();
        Ok(scheduled)
    }
}
