use std::collections::VecDeque;

use itertools::Itertools;

use crate::geometry::geo_traits::DistanceTo;
use crate::geometry::primitives::{Circle, Edge, Rect};
use crate::geometry::primitives::Point;
use crate::geometry::region::Region;
use crate::util::FPA;

/// Computes the point at which a gripper of radius `radius` can hold `region`.
///
/// The centroid is preferred when the gripper disk fits around it.
/// Otherwise the center of the largest inscribed disk is used, provided that disk is at least as large as the gripper.
/// Returns `None` if the gripper does not fit anywhere inside `region`.
pub fn compute_grip_point(region: &Region, radius: f64) -> Option<Point> {
    let centroid = region.centroid()?;
    if FPA(region.clearance(&centroid)) >= FPA(radius) {
        return Some(centroid);
    }
    let pole = compute_pole(region)?;
    match FPA(pole.radius) >= FPA(radius) {
        true => Some(pole.center),
        false => None,
    }
}

/// Computes the *pole* of a region - the largest circle that fits entirely inside of it.
/// Closely related to [Pole of Inaccessibility (PoI)](https://en.wikipedia.org/wiki/Pole_of_inaccessibility),
/// and inspired by Mapbox's [`polylabel`](https://github.com/mapbox/polylabel) algorithm.
pub fn compute_pole(region: &Region) -> Option<Circle> {
    let square_bbox = region.bbox()?.inflate_to_square();
    let edges = region.edges().collect_vec();
    let root = POINode::new(square_bbox, MAX_POI_TREE_DEPTH, region, &edges);
    let mut queue = VecDeque::from([root]);
    let mut best: Option<Circle> = None;
    let distance = |circle: &Option<Circle>| circle.as_ref().map_or(0.0, |c| c.radius);

    while let Some(node) = queue.pop_front() {
        //check if better than current best
        if node.distance > distance(&best) {
            best = Circle::try_new(node.bbox.centroid(), node.distance).ok();
        }

        //see if worth it to split
        if node.distance_upperbound() > distance(&best)
            && let Some(children) = node.split(region, &edges)
        {
            queue.extend(children);
        }
    }
    best
}

const MAX_POI_TREE_DEPTH: usize = 10;

struct POINode {
    pub level: usize,
    pub bbox: Rect,
    pub radius: f64,
    pub distance: f64,
}

impl POINode {
    fn new(bbox: Rect, level: usize, region: &Region, edges: &[Edge]) -> Self {
        let radius = bbox.diameter() / 2.0;
        let centroid = bbox.centroid();

        let distance = {
            let distance_to_border = edges
                .iter()
                .map(|e| e.distance_to(&centroid))
                .fold(f64::MAX, f64::min);

            //if the centroid is outside, distance is counted negative
            match region.contains(&centroid) {
                true => distance_to_border,
                false => -distance_to_border,
            }
        };

        Self {
            bbox,
            level,
            radius,
            distance,
        }
    }

    fn split(&self, region: &Region, edges: &[Edge]) -> Option<[POINode; 4]> {
        match self.level {
            0 => None,
            _ => Some(
                self.bbox
                    .quadrants()
                    .map(|qd| POINode::new(qd, self.level - 1, region, edges)),
            ),
        }
    }

    fn distance_upperbound(&self) -> f64 {
        self.radius + self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn rect(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Region {
        Region::from_rect(Rect::try_new(x_min, y_min, x_max, y_max).unwrap())
    }

    #[test]
    fn grip_point_of_rectangle_is_centroid() {
        let region = rect(-10.0, -5.0, 10.0, 5.0);
        let grip = compute_grip_point(&region, 5.0).unwrap();
        assert!(grip.almost_eq(&Point(0.0, 0.0), 1e-9));
    }

    #[test]
    fn narrow_region_has_no_grip_point() {
        let region = rect(0.0, 0.0, 6.0, 10.0);
        assert!(compute_grip_point(&region, 5.0).is_none());
        assert!(compute_grip_point(&region, 2.5).is_some());
    }

    #[test]
    fn pole_is_used_when_centroid_is_unfit() {
        // L-shape: the centroid lies close to the inner corner
        let region = rect(0.0, 0.0, 40.0, 12.0).union(&rect(0.0, 0.0, 12.0, 40.0));
        let grip = compute_grip_point(&region, 5.5).unwrap();
        assert!(region.clearance(&grip) >= 5.5 - 1e-5);

        let pole = compute_pole(&region).unwrap();
        assert!(pole.radius > 5.9);
        assert!(approx_eq!(f64, pole.radius, region.clearance(&pole.center), epsilon = 1e-6));
    }
}
