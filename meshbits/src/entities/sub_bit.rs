use crate::geometry::Region;
use crate::geometry::Transformation;
use crate::geometry::cut_path::{CutPath, compute_cut_paths};
use crate::geometry::distant_points::compute_distant_points;
use crate::geometry::grip::compute_grip_point;
use crate::geometry::primitives::{Point, Rect};
use crate::util::CraftConfig;
use itertools::Itertools;

/// One connected piece of a clipped [`Bit`](crate::entities::Bit), liftable on its own.
///
/// All geometry is stored in the local frame of the owning bit. World-frame copies of the
/// grip point, distant points and cut paths are computed once at construction.
/// A piece without a grip point is *invalid* and makes its bit irregular.
#[derive(Clone, Debug)]
pub struct SubBit {
    region: Region,
    grip_point: Option<Point>,
    grip_point_world: Option<Point>,
    distant_points: Option<[Point; 2]>,
    distant_points_world: Option<[Point; 2]>,
    cut_paths: Vec<CutPath>,
    cut_paths_world: Vec<CutPath>,
    removed: bool,
}

impl SubBit {
    /// Resolves a piece from its local `region`.
    /// `nominal` is the local rectangle of a full bit, `transformation` maps the local frame to the world.
    pub fn new(
        region: Region,
        nominal: &Rect,
        transformation: &Transformation,
        config: &CraftConfig,
    ) -> Self {
        let radius = config.gripper_radius();
        let grip_point = compute_grip_point(&region, radius);
        let distant_points = grip_point
            .as_ref()
            .and_then(|g| compute_distant_points(&region, g, radius));
        let cut_paths = compute_cut_paths(&region, nominal, config.epsilon());

        Self {
            grip_point_world: grip_point.map(|g| transformation.apply(&g)),
            distant_points_world: distant_points
                .map(|pair| pair.map(|p| transformation.apply(&p))),
            cut_paths_world: cut_paths
                .iter()
                .map(|cp| cp.transformed(transformation))
                .collect_vec(),
            region,
            grip_point,
            distant_points,
            cut_paths,
            removed: false,
        }
    }

    /// The piece in the local frame of its bit
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn grip_point(&self) -> Option<Point> {
        self.grip_point
    }

    pub fn grip_point_world(&self) -> Option<Point> {
        self.grip_point_world
    }

    pub fn distant_points(&self) -> Option<[Point; 2]> {
        self.distant_points
    }

    pub fn distant_points_world(&self) -> Option<[Point; 2]> {
        self.distant_points_world
    }

    pub fn cut_paths(&self) -> &[CutPath] {
        &self.cut_paths
    }

    pub fn cut_paths_world(&self) -> &[CutPath] {
        &self.cut_paths_world
    }

    /// A piece is valid if it can be gripped
    pub fn is_valid(&self) -> bool {
        self.grip_point.is_some()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub(crate) fn set_removed(&mut self, removed: bool) {
        self.removed = removed;
    }

    /// True if both pieces have the same geometry within `eps`
    pub fn approx_eq(&self, other: &SubBit, eps: f64) -> bool {
        let same_point = |a: Option<Point>, b: Option<Point>| match (a, b) {
            (Some(a), Some(b)) => a.almost_eq(&b, eps),
            (None, None) => true,
            _ => false,
        };
        let same_pair = |a: Option<[Point; 2]>, b: Option<[Point; 2]>| match (a, b) {
            (Some([a1, a2]), Some([b1, b2])) => a1.almost_eq(&b1, eps) && a2.almost_eq(&b2, eps),
            (None, None) => true,
            _ => false,
        };
        let same_paths = self.cut_paths.len() == other.cut_paths.len()
            && self
                .cut_paths
                .iter()
                .zip_eq(other.cut_paths.iter())
                .all(|(a, b)| (a.length() - b.length()).abs() < eps * 10.0);

        self.region.approx_eq(&other.region, eps)
            && same_point(self.grip_point, other.grip_point)
            && same_pair(self.distant_points, other.distant_points)
            && same_paths
            && self.removed == other.removed
    }
}
