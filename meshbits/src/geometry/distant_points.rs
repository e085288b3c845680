use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::geometry::geo_traits::DistanceTo;
use crate::geometry::primitives::Point;
use crate::geometry::region::Region;

/// Finds the two boundary vertices of `region` that lie furthest apart,
/// among those at least `min_separation` away from the grip point.
///
/// The pair is sorted by x, then y. Returns `None` if fewer than two vertices qualify.
pub fn compute_distant_points(
    region: &Region,
    grip_point: &Point,
    min_separation: f64,
) -> Option<[Point; 2]> {
    let candidates = region
        .vertices()
        .filter(|v| v.distance_to(grip_point) >= min_separation)
        .collect_vec();

    let (a, b) = candidates
        .iter()
        .tuple_combinations()
        .max_by_key(|(a, b)| OrderedFloat(a.sq_distance_to(*b)))?;

    let mut pair = [*a, *b];
    pair.sort_by_key(|p| (OrderedFloat(p.0), OrderedFloat(p.1)));
    Some(pair)
}
