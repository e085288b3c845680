use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use anyhow::Result;
use itertools::Itertools;
use log::{debug, warn};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::entities::Bit;
use crate::geometry::Region;
use crate::geometry::Transformation;
use crate::geometry::primitives::Point;
use crate::util::{CraftConfig, assertions};

/// Identifier of a bit inside a [`Pavement`]: its rounded origin.
///
/// Keys are ordered by x, then by y.
/// Two keys whose coordinates differ by less than the configured epsilon (sum of absolute differences)
/// designate the same bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitKey(OrderedFloat<f64>, OrderedFloat<f64>);

impl BitKey {
    pub fn new(x: f64, y: f64) -> Self {
        BitKey(OrderedFloat(x), OrderedFloat(y))
    }

    /// Key of a bit with origin `origin`
    pub fn from_point(origin: Point, config: &CraftConfig) -> Self {
        BitKey::new(config.round(origin.0), config.round(origin.1))
    }

    pub fn point(&self) -> Point {
        Point(self.0.0, self.1.0)
    }

    pub fn almost_eq(&self, other: &BitKey, eps: f64) -> bool {
        self.point().almost_eq(&other.point(), eps)
    }
}

impl Display for BitKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

impl From<BitKey> for (f64, f64) {
    fn from(key: BitKey) -> Self {
        (key.0.0, key.1.0)
    }
}

/// A flat set of bits keyed by their origin, covering (part of) a layer.
#[derive(Clone, Debug)]
pub struct Pavement {
    bits: BTreeMap<BitKey, Bit>,
    available: Option<Region>,
    config: CraftConfig,
}

impl Pavement {
    pub fn new(config: CraftConfig) -> Self {
        Self {
            bits: BTreeMap::new(),
            available: None,
            config,
        }
    }

    /// Builds a pavement from `bits`, each rotated by the angle of `rotation` around the pavement's origin.
    pub fn from_bits(
        bits: impl IntoIterator<Item = Bit>,
        rotation: Point,
        config: CraftConfig,
    ) -> Result<Self> {
        let t = Transformation::from_orientation(&rotation)?;
        let mut pavement = Pavement::new(config);
        for bit in bits {
            let bit = match t.is_empty() {
                true => bit,
                false => bit.create_transformed_bit(&t)?,
            };
            pavement.add_bit(bit);
        }
        Ok(pavement)
    }

    /// Adds `bit` under the key of its rounded origin.
    /// A bit already stored under an (almost) equal key is replaced.
    pub fn add_bit(&mut self, bit: Bit) -> BitKey {
        self.insert_bit(bit).0
    }

    /// Same as [`Pavement::add_bit`], also returns the replaced bit and its key, if any.
    pub fn insert_bit(&mut self, bit: Bit) -> (BitKey, Option<(BitKey, Bit)>) {
        let key = BitKey::from_point(bit.origin(), &self.config);
        let replaced = self
            .find_key(&key)
            .and_then(|existing| self.bits.remove_entry(&existing));
        if let Some((existing, _)) = &replaced {
            warn!("[PAVE] bit at {key} replaces the bit at {existing}");
        }
        self.bits.insert(key, bit);
        self.available = None;
        debug_assert!(assertions::pavement_keys_are_distinct(self));
        (key, replaced)
    }

    /// Key stored in the pavement which is (almost) equal to `key`
    pub fn find_key(&self, key: &BitKey) -> Option<BitKey> {
        let eps = self.config.epsilon();
        if self.bits.contains_key(key) {
            return Some(*key);
        }
        let lower = BitKey::new(key.0.0 - eps, f64::NEG_INFINITY);
        let upper = BitKey::new(key.0.0 + eps, f64::INFINITY);
        self.bits
            .range(lower..=upper)
            .map(|(k, _)| *k)
            .find(|k| k.almost_eq(key, eps))
    }

    pub fn remove_bit(&mut self, key: &BitKey) -> Option<Bit> {
        let key = self.find_key(key)?;
        self.available = None;
        self.bits.remove(&key)
    }

    pub fn get(&self, key: &BitKey) -> Option<&Bit> {
        self.find_key(key).and_then(|k| self.bits.get(&k))
    }

    /// Mutable access to a bit. The cached available region is dropped, as the bit may change.
    pub fn get_mut(&mut self, key: &BitKey) -> Option<&mut Bit> {
        let key = self.find_key(key)?;
        self.available = None;
        self.bits.get_mut(&key)
    }

    /// Moves the bit at `key` by `distance` along `direction` (expressed in the bit's own frame).
    /// Returns the key of the moved bit, or `None` if there is no bit at `key`, the direction is zero
    /// or another bit already sits at the destination.
    pub fn move_bit(&mut self, key: &BitKey, direction: Point, distance: f64) -> Option<BitKey> {
        let key = self.find_key(key)?;
        let moved = match self.bits.get(&key)?.moved(direction, distance) {
            Ok(moved) => moved,
            Err(e) => {
                warn!("[PAVE] bit at {key} not moved: {e}");
                return None;
            }
        };
        let target = BitKey::from_point(moved.origin(), &self.config);
        if self.find_key(&target).is_some_and(|k| k != key) {
            warn!("[PAVE] bit at {key} not moved: {target} is occupied");
            return None;
        }
        self.remove_bit(&key);
        Some(self.add_bit(moved))
    }

    /// Reclips every bit to `available`. Bits left without any area are dropped.
    pub fn compute_bits(&mut self, available: &Region) {
        let emptied = self
            .bits
            .par_iter_mut()
            .filter_map(|(key, bit)| {
                let clipped = bit.full_region().intersect(available);
                match clipped.is_empty() {
                    true => Some(*key),
                    false => {
                        bit.update_boundaries(&clipped);
                        None
                    }
                }
            })
            .collect::<Vec<_>>();
        self.drop_bits(&emptied);

        let occupied = self.occupied_region(0.0);
        self.available = Some(available.subtract(&occupied));
    }

    /// Reclips every bit to `available` while keeping a clearance of `margin` between neighbors.
    ///
    /// Bits are processed in ascending key order.
    /// Every bit is clipped to what is left of `available` after removing the margin-expanded area of the bits before it.
    pub fn compute_bits_with_margin(&mut self, available: &Region, margin: f64) {
        let mut remaining = available.clone();
        let mut emptied = vec![];
        for (key, bit) in self.bits.iter_mut() {
            let clipped = bit.full_region().intersect(&remaining);
            match clipped.is_empty() {
                true => emptied.push(*key),
                false => {
                    bit.update_boundaries(&clipped);
                    remaining = remaining.subtract(&bit.area().expand(margin));
                }
            }
        }
        self.drop_bits(&emptied);
        self.available = Some(remaining);
    }

    /// Union of the retained areas of all bits, each expanded by `margin`
    pub fn occupied_region(&self, margin: f64) -> Region {
        self.bits
            .values()
            .map(|bit| match margin > 0.0 {
                true => bit.area().expand(margin),
                false => bit.area(),
            })
            .fold(Region::empty(), |acc, r| acc.union(&r))
    }

    /// Part of the layer left uncovered by the last reclipping.
    /// `None` if the pavement was never reclipped or has been edited since.
    pub fn available_region(&self) -> Option<&Region> {
        self.available.as_ref()
    }

    pub fn keys(&self) -> impl Iterator<Item = BitKey> + '_ {
        self.bits.keys().copied()
    }

    pub fn bits(&self) -> impl Iterator<Item = (&BitKey, &Bit)> {
        self.bits.iter()
    }

    pub fn into_bits(self) -> impl Iterator<Item = Bit> {
        self.bits.into_values()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn config(&self) -> &CraftConfig {
        &self.config
    }

    fn drop_bits(&mut self, keys: &[BitKey]) {
        for key in keys {
            self.bits.remove(key);
        }
        if !keys.is_empty() {
            debug!(
                "[PAVE] dropped {} bits outside of the available region: {}",
                keys.len(),
                keys.iter().join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives::Rect;
    use float_cmp::approx_eq;
    use test_case::test_case;

    fn config() -> CraftConfig {
        CraftConfig {
            bit_length: 20.0,
            bit_width: 10.0,
            gripper_diameter: 4.0,
            ..CraftConfig::default()
        }
    }

    fn bit_at(x: f64, y: f64) -> Bit {
        Bit::new(Point(x, y), Point(1.0, 0.0), config()).unwrap()
    }

    #[test]
    fn near_equal_key_replaces_bit() {
        let mut pavement = Pavement::new(config());
        let first = pavement.add_bit(bit_at(10.0, 10.0));
        let (second, replaced) = pavement.insert_bit(bit_at(10.000001, 10.0));

        assert_eq!(pavement.len(), 1);
        assert_eq!(first, second);
        assert_eq!(replaced.map(|(k, _)| k), Some(first));
        assert!(pavement.get(&BitKey::new(10.000002, 9.999999)).is_some());
    }

    #[test]
    fn keys_are_ordered_by_x_then_y() {
        let mut pavement = Pavement::new(config());
        for (x, y) in [(30.0, 0.0), (10.0, 20.0), (10.0, -20.0)] {
            pavement.add_bit(bit_at(x, y));
        }
        let keys = pavement.keys().map(|k| k.point()).collect_vec();
        assert_eq!(
            keys,
            vec![Point(10.0, -20.0), Point(10.0, 20.0), Point(30.0, 0.0)]
        );
    }

    #[test_case(Point(1.0, 0.0), 10.0, Point(10.0, 0.0); "along length")]
    #[test_case(Point(0.0, -1.0), 5.0, Point(0.0, -5.0); "along width")]
    fn move_bit(direction: Point, distance: f64, expected: Point) {
        let mut pavement = Pavement::new(config());
        let key = pavement.add_bit(bit_at(0.0, 0.0));
        let moved = pavement.move_bit(&key, direction, distance).unwrap();
        assert!(moved.point().almost_eq(&expected, 1e-9));
        assert_eq!(pavement.len(), 1);
        assert!(pavement.get(&key).is_none());
    }

    #[test]
    fn move_onto_occupied_key_is_refused() {
        let mut pavement = Pavement::new(config());
        let a = pavement.add_bit(bit_at(0.0, 0.0));
        let b = pavement.add_bit(bit_at(10.0, 0.0));

        assert_eq!(pavement.move_bit(&a, Point(1.0, 0.0), 10.0), None);
        assert_eq!(pavement.len(), 2);
        assert!(pavement.get(&a).is_some());
        assert!(pavement.get(&b).is_some());
        // moving away from the neighbor is fine
        let moved = pavement.move_bit(&a, Point(-1.0, 0.0), 10.0).unwrap();
        assert_eq!(moved.point(), Point(-10.0, 0.0));
        assert_eq!(pavement.len(), 2);
    }

    #[test]
    fn edits_drop_available_region() {
        let mut pavement = Pavement::new(config());
        let key = pavement.add_bit(bit_at(10.0, 5.0));
        let square = Region::from_rect(Rect::try_new(0.0, 0.0, 100.0, 100.0).unwrap());
        pavement.compute_bits(&square);
        assert!(pavement.available_region().is_some());

        pavement.remove_bit(&key);
        assert!(pavement.available_region().is_none());
        pavement.compute_bits(&square);
        let available = pavement.available_region().unwrap();
        assert!(approx_eq!(f64, available.area(), 10000.0, epsilon = 1e-6));

        pavement.add_bit(bit_at(10.0, 5.0));
        assert!(pavement.available_region().is_none());
    }

    #[test]
    fn compute_bits_drops_bits_outside() {
        let mut pavement = Pavement::new(config());
        pavement.add_bit(bit_at(10.0, 5.0));
        pavement.add_bit(bit_at(200.0, 5.0));
        let square = Region::from_rect(Rect::try_new(0.0, 0.0, 100.0, 100.0).unwrap());

        pavement.compute_bits(&square);
        assert_eq!(pavement.len(), 1);
        let available = pavement.available_region().unwrap();
        assert!(approx_eq!(f64, available.area(), 10000.0 - 200.0, epsilon = 1e-6));
    }

    #[test]
    fn margin_keeps_neighbors_apart() {
        let mut pavement = Pavement::new(config());
        // two overlapping bits, the first in key order keeps its full area
        pavement.add_bit(bit_at(10.0, 5.0));
        pavement.add_bit(bit_at(25.0, 5.0));
        let square = Region::from_rect(Rect::try_new(0.0, 0.0, 100.0, 100.0).unwrap());

        pavement.compute_bits_with_margin(&square, 1.0);
        let areas = pavement.bits().map(|(_, b)| b.area()).collect_vec();
        assert_eq!(areas.len(), 2);
        assert!(approx_eq!(f64, areas[0].area(), 200.0, epsilon = 1e-6));
        assert!(areas[0].expand(0.9).intersect(&areas[1]).is_empty());
        // second bit spans x in [15, 35], minus [0, 21] => [21, 35]
        assert!(approx_eq!(f64, areas[1].area(), 140.0, epsilon = 1e-3));
    }

    #[test]
    fn rotated_pavement() {
        let bits = vec![bit_at(10.0, 0.0), bit_at(30.0, 0.0)];
        let pavement = Pavement::from_bits(bits, Point(0.0, 1.0), config()).unwrap();
        let keys = pavement.keys().map(|k| k.point()).collect_vec();
        assert_eq!(keys, vec![Point(0.0, 10.0), Point(0.0, 30.0)]);
        assert!(
            pavement
                .bits()
                .all(|(_, b)| b.orientation() == Point(0.0, 1.0))
        );
    }
}
