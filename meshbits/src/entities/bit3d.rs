use serde::{Deserialize, Serialize};

use crate::entities::{Bit, BitKey};
use crate::geometry::primitives::Point;

/// Position of a bit in the manufacturing schedule, set by a [`Scheduler`](crate::pipeline::Scheduler).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitAssignment {
    /// Rank of the bit in the production order
    pub index: usize,
    /// Plate the bit is cut from
    pub plate: usize,
    /// Batch the bit belongs to
    pub batch: usize,
}

/// A [`Bit`] extruded over the altitude band of its layer.
#[derive(Clone, Debug)]
pub struct Bit3D {
    key: BitKey,
    bit: Bit,
    lower_altitude: f64,
    upper_altitude: f64,
    assignment: Option<BitAssignment>,
}

impl Bit3D {
    pub fn new(key: BitKey, bit: Bit, (lower_altitude, upper_altitude): (f64, f64)) -> Self {
        Self {
            key,
            bit,
            lower_altitude,
            upper_altitude,
            assignment: None,
        }
    }

    pub fn key(&self) -> BitKey {
        self.key
    }

    pub fn bit(&self) -> &Bit {
        &self.bit
    }

    pub fn lower_altitude(&self) -> f64 {
        self.lower_altitude
    }

    pub fn upper_altitude(&self) -> f64 {
        self.upper_altitude
    }

    pub fn assignment(&self) -> Option<BitAssignment> {
        self.assignment
    }

    pub fn set_assignment(&mut self, assignment: Option<BitAssignment>) {
        self.assignment = assignment;
    }

    /// Irregular bits have at least one piece that cannot be gripped
    pub fn is_irregular(&self) -> bool {
        self.bit.is_irregular()
    }

    /// Grip points of the retained pieces, in the layer's frame
    pub fn grip_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.bit.grip_points()
    }

    /// First grip point in piece order, used to sort bits in a layer
    pub fn first_grip_point(&self) -> Option<Point> {
        self.bit
            .sub_bits()
            .iter()
            .filter(|sb| !sb.is_removed())
            .find_map(|sb| sb.grip_point_world())
    }
}
