use anyhow::{Result, bail, ensure};
use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::entities::SubBit;
use crate::geometry::Region;
use crate::geometry::Transformation;
use crate::geometry::cut_path::CutPath;
use crate::geometry::primitives::{Point, Rect};
use crate::util::CraftConfig;

/// A rectangular blank placed in a layer.
///
/// In its local frame a full bit spans `[-L/2, L/2] x [-W/2, W/2]`, with `L` and `W` the nominal
/// length and width of the [`CraftConfig`]. A reduced bit stays anchored at the top-right corner `(L/2, W/2)`.
/// The local frame is mapped to the pavement by a rotation (`orientation`) followed by a translation (`origin`).
///
/// After clipping, the occupied footprint is held as one [`SubBit`] per connected piece.
#[derive(Clone, Debug)]
pub struct Bit {
    origin: Point,
    orientation: Point,
    length: f64,
    width: f64,
    config: CraftConfig,
    transformation: Transformation,
    inv_transformation: Transformation,
    sub_bits: Vec<SubBit>,
}

impl Bit {
    /// Creates a full-size bit.
    pub fn new(origin: Point, orientation: Point, config: CraftConfig) -> Result<Self> {
        Bit::with_size(
            origin,
            orientation,
            config.bit_length,
            config.bit_width,
            config,
        )
    }

    /// Creates an unclipped bit of the given dimensions.
    /// Fails on a degenerate orientation or on dimensions outside of `(0, nominal]`.
    pub fn with_size(
        origin: Point,
        orientation: Point,
        length: f64,
        width: f64,
        config: CraftConfig,
    ) -> Result<Self> {
        let eps = config.epsilon();
        ensure!(
            length > eps && length <= config.bit_length + eps,
            "invalid bit length {length}, nominal length is {}",
            config.bit_length
        );
        ensure!(
            width > eps && width <= config.bit_width + eps,
            "invalid bit width {width}, nominal width is {}",
            config.bit_width
        );
        let transformation =
            Transformation::from_orientation(&orientation)?.translate(origin.into());
        let inv_transformation = transformation.try_inverse()?;
        let orientation = orientation.normalize().unwrap_or(Point(1.0, 0.0));

        let mut bit = Self {
            origin,
            orientation,
            length: f64::min(length, config.bit_length),
            width: f64::min(width, config.bit_width),
            config,
            transformation,
            inv_transformation,
            sub_bits: vec![],
        };
        bit.reset_boundaries();
        Ok(bit)
    }

    /// Recreates a bit from pieces given in its local frame, without clipping them.
    pub(crate) fn from_local_pieces(
        origin: Point,
        orientation: Point,
        length: f64,
        width: f64,
        config: CraftConfig,
        pieces: Vec<(Region, bool)>,
    ) -> Result<Self> {
        let mut bit = Bit::with_size(origin, orientation, length, width, config)?;
        let nominal = bit.nominal_rect();
        bit.sub_bits = pieces
            .into_iter()
            .flat_map(|(region, removed)| {
                region
                    .decompose()
                    .into_iter()
                    .map(move |piece| (piece, removed))
            })
            .map(|(piece, removed)| {
                let mut sb = SubBit::new(piece, &nominal, &bit.transformation, &config);
                sb.set_removed(removed);
                sb
            })
            .collect_vec();
        bit.sort_sub_bits();
        Ok(bit)
    }

    /// Local rectangle of a full-size bit
    pub fn nominal_rect(&self) -> Rect {
        let (l, w) = (self.config.bit_length, self.config.bit_width);
        Rect {
            x_min: -l / 2.0,
            y_min: -w / 2.0,
            x_max: l / 2.0,
            y_max: w / 2.0,
        }
    }

    /// Local rectangle of this bit before clipping, anchored at the top-right corner
    pub fn footprint_rect(&self) -> Rect {
        let (l, w) = (self.config.bit_length, self.config.bit_width);
        Rect {
            x_min: l / 2.0 - self.length,
            y_min: w / 2.0 - self.width,
            x_max: l / 2.0,
            y_max: w / 2.0,
        }
    }

    /// Unclipped footprint in the pavement's frame
    pub fn full_region(&self) -> Region {
        Region::from_rect(self.footprint_rect()).transformed(&self.transformation)
    }

    /// Occupied footprint in the pavement's frame: the union of all pieces that are not removed
    pub fn area(&self) -> Region {
        self.sub_bits
            .iter()
            .filter(|sb| !sb.is_removed())
            .fold(Region::empty(), |acc, sb| acc.union(sb.region()))
            .transformed(&self.transformation)
    }

    /// Reclips the bit to `world_region` (given in the pavement's frame).
    ///
    /// Previous pieces, including their removed flags, are discarded.
    pub fn update_boundaries(&mut self, world_region: &Region) {
        let local = world_region
            .transformed(&self.inv_transformation)
            .intersect(&Region::from_rect(self.footprint_rect()));
        let nominal = self.nominal_rect();
        self.sub_bits = local
            .decompose()
            .into_iter()
            .map(|piece| SubBit::new(piece, &nominal, &self.transformation, &self.config))
            .collect_vec();
        self.sort_sub_bits();
    }

    /// Scales the current length and width by the given percentages.
    /// The bit stays anchored at its top-right corner and loses its previous clipping.
    pub fn resize(&mut self, pct_length: f64, pct_width: f64) -> Result<()> {
        let valid = |pct: f64| pct > 0.0 && pct <= 100.0;
        if !valid(pct_length) || !valid(pct_width) {
            bail!("invalid resize percentages: {pct_length}% x {pct_width}%");
        }
        self.length *= pct_length / 100.0;
        self.width *= pct_width / 100.0;
        self.reset_boundaries();
        Ok(())
    }

    /// Creates a copy of this bit moved by a conservative transformation (rotation and translation only).
    /// Origin and orientation of the copy are rounded, its occupied area is carried over.
    pub fn create_transformed_bit(&self, t: &Transformation) -> Result<Bit> {
        ensure!(
            t.is_conservative(self.config.epsilon()),
            "only rotations and translations can be applied to bits: {t:?}"
        );
        let round = |p: Point| Point(self.config.round(p.0), self.config.round(p.1));
        let origin = round(t.apply(&self.origin));
        let orientation = round(t.apply_vector(&self.orientation));

        let mut bit = Bit::with_size(origin, orientation, self.length, self.width, self.config)?;
        bit.update_boundaries(&self.area().transformed(t));
        Ok(bit)
    }

    /// Same-size bit displaced by `distance` along `direction`, expressed in this bit's own frame.
    pub fn moved(&self, direction: Point, distance: f64) -> Result<Bit> {
        let Some(unit) = direction.rotate_by(&self.orientation).normalize() else {
            bail!("cannot move a bit along a zero direction");
        };
        let origin = self.origin + unit * distance;
        Bit::with_size(
            origin,
            self.orientation,
            self.length,
            self.width,
            self.config,
        )
    }

    /// Marks the piece at `index` as removed, returns false if there is no such piece
    pub fn remove_sub_bit(&mut self, index: usize) -> bool {
        self.set_sub_bit_removed(index, true)
    }

    /// Reverts [`Bit::remove_sub_bit`], returns false if there is no such piece
    pub fn restore_sub_bit(&mut self, index: usize) -> bool {
        self.set_sub_bit_removed(index, false)
    }

    fn set_sub_bit_removed(&mut self, index: usize, removed: bool) -> bool {
        match self.sub_bits.get_mut(index) {
            Some(sb) => {
                sb.set_removed(removed);
                true
            }
            None => false,
        }
    }

    /// Point the bit is stored under: the center of its (possibly reduced) footprint, in the pavement's frame
    pub fn center(&self) -> Point {
        let (l, w) = (self.config.bit_length, self.config.bit_width);
        let local = Point((l - self.length) / 2.0, (w - self.width) / 2.0);
        self.transformation.apply(&local)
    }

    pub fn sub_bits(&self) -> &[SubBit] {
        &self.sub_bits
    }

    /// Local pieces of the bit, removed ones included
    pub fn raw_regions(&self) -> impl Iterator<Item = &Region> {
        self.sub_bits.iter().map(|sb| sb.region())
    }

    /// Cut paths of all pieces that are not removed, in the local frame
    pub fn cut_paths(&self) -> impl Iterator<Item = &CutPath> {
        self.sub_bits
            .iter()
            .filter(|sb| !sb.is_removed())
            .flat_map(|sb| sb.cut_paths().iter())
    }

    /// Grip points of all pieces that are not removed, in the pavement's frame
    pub fn grip_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.sub_bits
            .iter()
            .filter(|sb| !sb.is_removed())
            .filter_map(|sb| sb.grip_point_world())
    }

    /// True if the bit has its nominal dimensions
    pub fn is_full_size(&self) -> bool {
        let eps = self.config.epsilon();
        (self.length - self.config.bit_length).abs() < eps
            && (self.width - self.config.bit_width).abs() < eps
    }

    /// True if any piece that is not removed has no grip point
    pub fn is_irregular(&self) -> bool {
        self.sub_bits
            .iter()
            .any(|sb| !sb.is_removed() && !sb.is_valid())
    }

    /// True if at least one piece can be gripped
    pub fn is_cuttable(&self) -> bool {
        self.sub_bits.iter().any(|sb| sb.is_valid())
    }

    /// Alias of [`Bit::is_cuttable`]
    pub fn is_valid(&self) -> bool {
        self.is_cuttable()
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn orientation(&self) -> Point {
        self.orientation
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn config(&self) -> &CraftConfig {
        &self.config
    }

    /// Local to pavement transformation
    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    fn reset_boundaries(&mut self) {
        let nominal = self.nominal_rect();
        let piece = Region::from_rect(self.footprint_rect());
        self.sub_bits = vec![SubBit::new(
            piece,
            &nominal,
            &self.transformation,
            &self.config,
        )];
    }

    /// Pieces without grip point first, then by grip point (y, then x)
    fn sort_sub_bits(&mut self) {
        self.sub_bits.sort_by_cached_key(|sb| {
            let grip = sb
                .grip_point()
                .map(|g| (OrderedFloat(g.1), OrderedFloat(g.0)));
            let corner = sb
                .region()
                .bbox()
                .map(|bb| (OrderedFloat(bb.y_min), OrderedFloat(bb.x_min)));
            (grip.is_some(), grip, corner)
        });
    }
}
