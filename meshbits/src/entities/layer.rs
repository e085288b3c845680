use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use itertools::Itertools;
use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::entities::{Bit, Bit3D, BitKey, Pavement, Slice};
use crate::geometry::Region;
use crate::geometry::primitives::Point;
use crate::strategy::PatternStrategy;
use crate::util::{CraftConfig, assertions};

/// One altitude band of a mesh: a horizontal section, the region it encloses and the bits covering it.
///
/// A layer starts unpaved. It becomes paved once a [`Pavement`] is installed by a strategy or by adding a bit.
#[derive(Clone, Debug)]
pub struct Layer {
    index: usize,
    slice: Slice,
    region: Region,
    lower_altitude: f64,
    upper_altitude: f64,
    pavement: Option<Pavement>,
    bits3d: BTreeMap<BitKey, Bit3D>,
    irregular_keys: BTreeSet<BitKey>,
    config: CraftConfig,
}

impl Layer {
    pub fn new(index: usize, slice: Slice, config: CraftConfig) -> Self {
        let region = slice.to_region();
        let (lower_altitude, upper_altitude) = config.altitude_band(slice.altitude);
        Self {
            index,
            slice,
            region,
            lower_altitude,
            upper_altitude,
            pavement: None,
            bits3d: BTreeMap::new(),
            irregular_keys: BTreeSet::new(),
            config,
        }
    }

    /// Recreates a layer around a stored pavement. The bits are extruded as they are, without reclipping.
    pub(crate) fn from_parts(
        index: usize,
        slice: Slice,
        pavement: Option<Pavement>,
        config: CraftConfig,
    ) -> Self {
        let mut layer = Layer::new(index, slice, config);
        layer.pavement = pavement;
        layer.extrude();
        layer
    }

    /// Lets `strategy` pave the whole layer, then installs the result and rebuilds.
    pub fn start_paver(&mut self, strategy: &mut dyn PatternStrategy) -> Result<()> {
        let pavement = strategy.pave(self)?;
        debug!(
            "[LAYER] {} paved by {} with {} bits",
            self.index,
            strategy.common_name(),
            pavement.len()
        );
        self.pavement = Some(pavement);
        self.rebuild();
        Ok(())
    }

    /// Lets `strategy` pave `region` only.
    /// The proposed bits are added to the existing pavement, if there is one.
    pub fn pave_region(&mut self, region: &Region, strategy: &mut dyn PatternStrategy) -> Result<()> {
        let proposed = strategy.pave_region(self, region)?;
        match self.pavement.as_mut() {
            None => self.pavement = Some(proposed),
            Some(pavement) => {
                for bit in proposed.into_bits() {
                    pavement.add_bit(bit);
                }
            }
        }
        self.rebuild();
        Ok(())
    }

    /// Reclips the whole pavement against the layer's region, then extrudes every bit and
    /// recomputes the irregular bits.
    pub fn rebuild(&mut self) {
        let Some(pavement) = self.pavement.as_mut() else {
            self.bits3d.clear();
            self.irregular_keys.clear();
            return;
        };
        match self.config.bit_margin {
            Some(margin) if margin > 0.0 => pavement.compute_bits_with_margin(&self.region, margin),
            _ => pavement.compute_bits(&self.region),
        }
        self.extrude();
        debug_assert!(assertions::bits_inside_region(self));
        info!(
            "[LAYER] {} rebuilt: {} bits, {} irregular",
            self.index,
            self.bits3d.len(),
            self.irregular_keys.len()
        );
    }

    /// Adds `bit` after clipping it to the layer's region.
    /// Returns `None` if the bit does not meet the region.
    pub fn add_bit(&mut self, mut bit: Bit) -> Option<BitKey> {
        let clipped = bit.full_region().intersect(&self.region);
        if clipped.is_empty() {
            debug!(
                "[LAYER] {} rejected bit at {:?}: outside of the layer",
                self.index,
                bit.origin()
            );
            return None;
        }
        bit.update_boundaries(&clipped);

        let config = self.config;
        let pavement = self.pavement.get_or_insert_with(|| Pavement::new(config));
        let (key, replaced) = pavement.insert_bit(bit);
        self.sync_keys(replaced.map(|(k, _)| k).into_iter().chain([key]));
        Some(key)
    }

    pub fn remove_bit(&mut self, key: &BitKey) -> Option<Bit> {
        let pavement = self.pavement.as_mut()?;
        let key = pavement.find_key(key)?;
        let removed = pavement.remove_bit(&key);
        self.sync_keys([key]);
        removed
    }

    /// Removes every bit of `keys`, returns how many were found
    pub fn remove_bits<'a>(&mut self, keys: impl IntoIterator<Item = &'a BitKey>) -> usize {
        keys.into_iter()
            .filter(|key| self.remove_bit(key).is_some())
            .count()
    }

    /// Marks piece `index` of the bit at `key` as removed
    pub fn remove_sub_bit(&mut self, key: &BitKey, index: usize) -> bool {
        self.update_sub_bit(key, |bit| bit.remove_sub_bit(index))
    }

    pub fn restore_sub_bit(&mut self, key: &BitKey, index: usize) -> bool {
        self.update_sub_bit(key, |bit| bit.restore_sub_bit(index))
    }

    fn update_sub_bit(&mut self, key: &BitKey, f: impl FnOnce(&mut Bit) -> bool) -> bool {
        let Some(pavement) = self.pavement.as_mut() else {
            return false;
        };
        let Some(key) = pavement.find_key(key) else {
            return false;
        };
        let updated = pavement.get_mut(&key).is_some_and(f);
        if updated {
            self.sync_keys([key]);
        }
        updated
    }

    /// Moves the bit at `key` by half a nominal side along `direction`, given in the bit's own frame.
    ///
    /// Only axis-aligned directions are supported: a move along x covers half a length,
    /// a move along y half a width.
    /// A move onto the key of another bit is refused and leaves both bits in place.
    /// Returns the key of the moved bit, `None` if the bit was not moved or left the layer.
    pub fn move_bit(&mut self, key: &BitKey, direction: Point) -> Option<BitKey> {
        self.move_bits([key], direction).into_iter().next()
    }

    /// Moves every bit of `keys` as one group, see [`Layer::move_bit`].
    ///
    /// A bit may take the place of another selected bit, as long as that one moves too.
    /// Returns the keys of the moved bits still in the layer.
    pub fn move_bits<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a BitKey>,
        direction: Point,
    ) -> Vec<BitKey> {
        let distance = match (direction.0 == 0.0, direction.1 == 0.0) {
            (true, false) => self.config.bit_width / 2.0,
            (false, true) => self.config.bit_length / 2.0,
            _ => {
                warn!("[LAYER] unsupported move direction: {direction:?}");
                return vec![];
            }
        };
        let Some(pavement) = self.pavement.as_ref() else {
            return vec![];
        };
        let eps = self.config.epsilon();

        let selected: BTreeSet<BitKey> = keys
            .into_iter()
            .filter_map(|key| pavement.find_key(key))
            .collect();
        let mut moves = selected
            .iter()
            .filter_map(|key| {
                let moved = pavement
                    .get(key)?
                    .moved(direction, distance)
                    .inspect_err(|e| warn!("[LAYER] bit at {key} not moved: {e}"))
                    .ok()?;
                let target = BitKey::from_point(moved.origin(), &self.config);
                Some((*key, target, moved))
            })
            .collect_vec();

        // a refused move keeps its bit in place, which can block other moves in turn
        loop {
            let moving: BTreeSet<BitKey> = moves.iter().map(|(key, _, _)| *key).collect();
            let mut claimed: Vec<BitKey> = vec![];
            let n_moves = moves.len();
            moves.retain(|(key, target, _)| {
                let occupied = pavement
                    .find_key(target)
                    .is_some_and(|k| !moving.contains(&k));
                let taken = claimed.iter().any(|t| t.almost_eq(target, eps));
                match occupied || taken {
                    true => {
                        warn!("[LAYER] bit at {key} not moved: {target} is occupied");
                        false
                    }
                    false => {
                        claimed.push(*target);
                        true
                    }
                }
            });
            if moves.len() == n_moves {
                break;
            }
        }

        for (key, _, _) in &moves {
            self.remove_bit(key);
        }
        moves
            .into_iter()
            .filter_map(|(_, _, moved)| self.add_bit(moved))
            .collect_vec()
    }

    /// Replaces the bit at `key` by a resized copy.
    /// A percentage of 0 removes the bit without replacement.
    pub fn scale_bit(&mut self, key: &BitKey, pct_length: f64, pct_width: f64) -> Option<BitKey> {
        let mut bit = self.remove_bit(key)?;
        if pct_length == 0.0 || pct_width == 0.0 {
            return None;
        }
        match bit.resize(pct_length, pct_width) {
            Ok(()) => self.add_bit(bit),
            Err(e) => {
                warn!("[LAYER] bit at {key} not scaled: {e}");
                None
            }
        }
    }

    pub fn bit3d(&self, key: &BitKey) -> Option<&Bit3D> {
        let key = self.pavement.as_ref()?.find_key(key)?;
        self.bits3d.get(&key)
    }

    pub fn bits3d(&self) -> impl Iterator<Item = &Bit3D> {
        self.bits3d.values()
    }

    pub(crate) fn bit3d_mut(&mut self, key: &BitKey) -> Option<&mut Bit3D> {
        let key = self.pavement.as_ref()?.find_key(key)?;
        self.bits3d.get_mut(&key)
    }

    pub fn irregular_keys(&self) -> &BTreeSet<BitKey> {
        &self.irregular_keys
    }

    pub fn count_irregularities(&self) -> usize {
        self.irregular_keys.len()
    }

    /// Keys ordered by the world grip point of their first piece (x, then y).
    /// Bits without grip point come last.
    pub fn sorted_bit_keys(&self) -> Vec<BitKey> {
        self.bits3d
            .values()
            .sorted_by_key(|b| {
                let grip = b
                    .first_grip_point()
                    .map(|p| (OrderedFloat(p.0), OrderedFloat(p.1)));
                (grip.is_none(), grip, b.key())
            })
            .map(|b| b.key())
            .collect_vec()
    }

    pub fn is_paved(&self) -> bool {
        self.pavement.is_some()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn slice(&self) -> &Slice {
        &self.slice
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn altitude(&self) -> f64 {
        self.slice.altitude
    }

    pub fn lower_altitude(&self) -> f64 {
        self.lower_altitude
    }

    pub fn upper_altitude(&self) -> f64 {
        self.upper_altitude
    }

    pub fn pavement(&self) -> Option<&Pavement> {
        self.pavement.as_ref()
    }

    pub fn config(&self) -> &CraftConfig {
        &self.config
    }

    /// Creates a snapshot of the current state of the layer
    pub fn save(&self) -> LayerSnapshot {
        LayerSnapshot {
            index: self.index,
            altitude: self.slice.altitude,
            pavement: self.pavement.clone(),
            bits3d: self.bits3d.clone(),
            irregular_keys: self.irregular_keys.clone(),
        }
    }

    /// Restores the layer to a previous state using a snapshot
    pub fn restore(&mut self, snapshot: &LayerSnapshot) {
        assert_eq!(self.index, snapshot.index);
        self.pavement = snapshot.pavement.clone();
        self.bits3d = snapshot.bits3d.clone();
        self.irregular_keys = snapshot.irregular_keys.clone();
        debug_assert!(assertions::layer_is_consistent(self));
    }

    /// Extrudes every bit of the pavement and recomputes the irregular keys
    fn extrude(&mut self) {
        let band = (self.lower_altitude, self.upper_altitude);
        let bits = self
            .pavement
            .iter()
            .flat_map(|p| p.bits())
            .collect_vec();
        let extruded = bits
            .into_par_iter()
            .map(|(key, bit)| Bit3D::new(*key, bit.clone(), band))
            .collect::<Vec<_>>();

        self.bits3d.clear();
        for bit3d in extruded {
            self.bits3d.entry(bit3d.key()).or_insert(bit3d);
        }
        self.irregular_keys = self
            .bits3d
            .values()
            .filter(|b| b.is_irregular())
            .map(|b| b.key())
            .collect();
        debug_assert!(assertions::layer_is_consistent(self));
    }

    /// Brings the extruded bits of `keys` in line with the pavement
    fn sync_keys(&mut self, keys: impl IntoIterator<Item = BitKey>) {
        let band = (self.lower_altitude, self.upper_altitude);
        for key in keys {
            match self.pavement.as_ref().and_then(|p| p.get(&key)) {
                Some(bit) => {
                    let bit3d = Bit3D::new(key, bit.clone(), band);
                    match bit3d.is_irregular() {
                        true => self.irregular_keys.insert(key),
                        false => self.irregular_keys.remove(&key),
                    };
                    self.bits3d.insert(key, bit3d);
                }
                None => {
                    self.bits3d.remove(&key);
                    self.irregular_keys.remove(&key);
                }
            }
        }
        debug_assert!(assertions::layer_is_consistent(self));
    }
}

/// Immutable copy of the mutable state of a [`Layer`], handed across task and event boundaries.
#[derive(Clone, Debug)]
pub struct LayerSnapshot {
    pub index: usize,
    pub altitude: f64,
    pub pavement: Option<Pavement>,
    pub bits3d: BTreeMap<BitKey, Bit3D>,
    pub irregular_keys: BTreeSet<BitKey>,
}

impl LayerSnapshot {
    pub fn is_paved(&self) -> bool {
        self.pavement.is_some()
    }

    pub fn count_irregularities(&self) -> usize {
        self.irregular_keys.len()
    }
}
