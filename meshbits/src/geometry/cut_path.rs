use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::geometry::Transformation;
use crate::geometry::primitives::{Edge, Point, Rect};
use crate::geometry::region::Region;

/// Instruction of a cutting path, as consumed by exporters
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "type", content = "point")]
#[serde(rename_all = "snake_case")]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
}

/// Polyline along which a bit has to be trimmed.
#[derive(Clone, Debug, PartialEq)]
pub struct CutPath {
    pub points: Vec<Point>,
}

impl CutPath {
    /// True if the path ends where it starts
    pub fn is_closed(&self) -> bool {
        self.points.len() > 2 && self.points.first() == self.points.last()
    }

    /// The path as a sequence of move/line instructions
    pub fn segments(&self) -> Vec<PathSegment> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| match i {
                0 => PathSegment::MoveTo(*p),
                _ => PathSegment::LineTo(*p),
            })
            .collect_vec()
    }

    pub fn transformed(&self, t: &Transformation) -> CutPath {
        CutPath {
            points: self.points.iter().map(|p| t.apply(p)).collect_vec(),
        }
    }

    pub fn length(&self) -> f64 {
        self.points
            .iter()
            .tuple_windows()
            .map(|(a, b)| Edge { start: *a, end: *b }.length())
            .sum()
    }
}

/// Computes the cut paths of `region` with respect to the rectangle of a full bit.
///
/// Every ring edge that does not lie on one of the sides of `nominal` has to be cut.
/// Consecutive cut edges are chained into one polyline; a ring consisting only of cut edges yields a closed polyline.
/// A piece may therefore get several polylines, one per run of cut edges of each of its rings.
pub fn compute_cut_paths(region: &Region, nominal: &Rect, eps: f64) -> Vec<CutPath> {
    region
        .rings()
        .iter()
        .flat_map(|ring| ring_cut_paths(ring, nominal, eps))
        .collect_vec()
}

fn ring_cut_paths(ring: &[Point], nominal: &Rect, eps: f64) -> Vec<CutPath> {
    let edges = ring
        .iter()
        .circular_tuple_windows()
        .map(|(a, b)| Edge { start: *a, end: *b })
        .collect_vec();
    let is_cut = edges
        .iter()
        .map(|e| !nominal.edge_on_side(e, eps))
        .collect_vec();

    //start right after an edge lying on the nominal rectangle, so no polyline wraps around
    let Some(start) = is_cut.iter().position(|cut| !cut) else {
        //all edges are cut edges
        let mut points = ring.to_vec();
        points.extend(ring.first().copied());
        return vec![CutPath { points }];
    };

    let n = edges.len();
    let mut paths = vec![];
    let mut current: Vec<Point> = vec![];
    for i in (1..=n).map(|k| (start + k) % n) {
        match is_cut[i] {
            true => {
                if current.is_empty() {
                    current.push(edges[i].start);
                }
                current.push(edges[i].end);
            }
            false => {
                if !current.is_empty() {
                    paths.push(CutPath {
                        points: std::mem::take(&mut current),
                    });
                }
            }
        }
    }
    if !current.is_empty() {
        paths.push(CutPath { points: current });
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> Rect {
        Rect::try_new(-10.0, -5.0, 10.0, 5.0).unwrap()
    }

    #[test]
    fn full_rectangle_has_no_cut_path() {
        let region = Region::from_rect(nominal());
        assert!(compute_cut_paths(&region, &nominal(), 1e-5).is_empty());
    }

    #[test]
    fn trimmed_length_cuts_left_edge() {
        let region = Region::from_rect(Rect::try_new(4.0, -5.0, 10.0, 5.0).unwrap());
        let paths = compute_cut_paths(&region, &nominal(), 1e-5);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].points.len(), 2);
        assert!(paths[0].points.iter().all(|p| (p.0 - 4.0).abs() < 1e-9));
        assert!((paths[0].length() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn trimmed_corner_cuts_two_edges() {
        let region = Region::from_rect(Rect::try_new(0.0, 0.0, 10.0, 5.0).unwrap());
        let paths = compute_cut_paths(&region, &nominal(), 1e-5);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].points.len(), 3);
        assert!(paths[0].points.contains(&Point(0.0, 0.0)));
        assert_eq!(
            paths[0].segments()[0],
            PathSegment::MoveTo(paths[0].points[0])
        );
    }

    #[test]
    fn strip_across_the_bit_cuts_both_sides() {
        let region = Region::from_rect(Rect::try_new(-4.0, -5.0, 4.0, 5.0).unwrap());
        let paths = compute_cut_paths(&region, &nominal(), 1e-5);
        assert_eq!(paths.len(), 2);
        let mut sides = paths
            .iter()
            .map(|p| {
                assert_eq!(p.points.len(), 2);
                assert!((p.length() - 10.0).abs() < 1e-9);
                p.points[0].0
            })
            .collect_vec();
        sides.sort_by(f64::total_cmp);
        assert!((sides[0] + 4.0).abs() < 1e-9);
        assert!((sides[1] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn piece_with_hole_gets_a_closed_path_for_the_hole() {
        let hole = Region::from_rect(Rect::try_new(-2.0, -2.0, 2.0, 2.0).unwrap());
        let region = Region::from_rect(nominal()).subtract(&hole);
        let paths = compute_cut_paths(&region, &nominal(), 1e-5);
        assert_eq!(paths.len(), 1);
        assert!(paths[0].is_closed());
        assert!((paths[0].length() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn inner_piece_is_closed() {
        let region = Region::from_rect(Rect::try_new(-2.0, -2.0, 2.0, 2.0).unwrap());
        let paths = compute_cut_paths(&region, &nominal(), 1e-5);
        assert_eq!(paths.len(), 1);
        assert!(paths[0].is_closed());
        assert_eq!(paths[0].points.len(), 5);
    }
}
