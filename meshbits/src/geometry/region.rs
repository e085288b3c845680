use std::iter;

use geo::{Area, BooleanOps, BoundingRect, Centroid, Contains, MapCoords};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::geometry::Transformation;
use crate::geometry::geo_traits::{DistanceTo, Transformable};
use crate::geometry::primitives::{Edge, Point, Rect};
use crate::util::EPSILON;

/// Rule deciding which points lie inside an area described by a set of rings.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Winding {
    /// Inside if a ray from the point crosses the rings an odd number of times
    EvenOdd,
    /// Counterclockwise rings add area, clockwise rings remove it
    NonZero,
}

/// A 2D area, possibly disconnected and possibly with holes.
///
/// A [`Region`] is an immutable value: every operation returns a new one.
/// Results of boolean operations are sanitized, so that near-duplicate vertices,
/// collinear vertices and slivers thinner than [`EPSILON`] do not accumulate.
#[derive(Clone, Debug)]
pub struct Region {
    polygons: MultiPolygon<f64>,
}

impl Region {
    pub fn empty() -> Self {
        Self {
            polygons: MultiPolygon::new(vec![]),
        }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self {
            polygons: MultiPolygon::new(vec![polygon_from(&rect.corners())]),
        }
    }

    /// Region enclosed by a single ring of vertices. Self-intersections are resolved.
    pub fn from_polygon(vertices: &[Point]) -> Self {
        match vertices.len() < 3 {
            true => Region::empty(),
            false => Region::normalized(MultiPolygon::new(vec![polygon_from(vertices)])),
        }
    }

    /// Region described by a set of rings, interpreted according to `winding`.
    pub fn from_rings(rings: &[Vec<Point>], winding: Winding) -> Self {
        let raw = |r: &Vec<Point>| Region {
            polygons: MultiPolygon::new(vec![polygon_from(r)]),
        };
        let rings = rings.iter().filter(|r| r.len() >= 3);
        match winding {
            Winding::EvenOdd => rings.fold(Region::empty(), |acc, r| acc.xor(&raw(r))),
            Winding::NonZero => {
                let (positive, negative): (Vec<_>, Vec<_>) =
                    rings.partition(|r| signed_area(r) >= 0.0);
                let added = positive
                    .into_iter()
                    .fold(Region::empty(), |acc, r| acc.union(&raw(r)));
                let removed = negative
                    .into_iter()
                    .fold(Region::empty(), |acc, r| acc.union(&raw(r)));
                added.subtract(&removed)
            }
        }
    }

    pub fn union(&self, other: &Region) -> Region {
        match (self.polygons.0.is_empty(), other.polygons.0.is_empty()) {
            (_, true) => self.clone(),
            (true, false) => other.clone(),
            (false, false) => Region::sanitized(self.polygons.union(&other.polygons)),
        }
    }

    pub fn intersect(&self, other: &Region) -> Region {
        if self.polygons.0.is_empty() || other.polygons.0.is_empty() {
            return Region::empty();
        }
        if let (Some(a), Some(b)) = (self.bbox(), other.bbox())
            && Rect::intersection(a, b).is_none()
        {
            return Region::empty();
        }
        Region::sanitized(self.polygons.intersection(&other.polygons))
    }

    pub fn subtract(&self, other: &Region) -> Region {
        if self.polygons.0.is_empty() || other.polygons.0.is_empty() {
            return self.clone();
        }
        Region::sanitized(self.polygons.difference(&other.polygons))
    }

    pub fn xor(&self, other: &Region) -> Region {
        match (self.polygons.0.is_empty(), other.polygons.0.is_empty()) {
            (_, true) => self.clone(),
            (true, false) => other.clone(),
            (false, false) => Region::sanitized(self.polygons.xor(&other.polygons)),
        }
    }

    /// Region grown outwards by `margin`. Non-positive margins return a copy.
    pub fn expand(&self, margin: f64) -> Region {
        if margin <= 0.0 || self.is_empty() {
            return self.clone();
        }
        Region::normalized(geo_buffer::buffer_multi_polygon(&self.polygons, margin))
    }

    /// Boundary-inclusive containment test, with [`EPSILON`] tolerance on the boundary.
    pub fn contains(&self, point: &Point) -> bool {
        self.polygons
            .contains(&geo_types::Point::new(point.0, point.1))
            || self.distance_to_boundary(point) <= EPSILON
    }

    /// Distance from `point` to the nearest edge of any ring.
    pub fn distance_to_boundary(&self, point: &Point) -> f64 {
        self.edges()
            .map(|e| e.distance_to(point))
            .fold(f64::INFINITY, f64::min)
    }

    /// Radius of the largest disk centered at `point` that fits inside the region.
    /// Zero for points outside.
    pub fn clearance(&self, point: &Point) -> f64 {
        match self.contains(point) {
            true => self.distance_to_boundary(point),
            false => 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty() || self.area() < EPSILON.powi(2)
    }

    /// Splits the region into its maximal connected pieces.
    /// Pieces are ordered by the bottom-left corner of their bounding box (y first, then x).
    pub fn decompose(&self) -> Vec<Region> {
        self.polygons
            .iter()
            .map(|p| Region {
                polygons: MultiPolygon::new(vec![p.clone()]),
            })
            .sorted_by_key(|r| {
                r.bbox()
                    .map(|bb| (OrderedFloat(bb.y_min), OrderedFloat(bb.x_min)))
            })
            .collect_vec()
    }

    /// Number of connected pieces
    pub fn n_pieces(&self) -> usize {
        self.polygons.0.len()
    }

    pub fn area(&self) -> f64 {
        self.polygons.unsigned_area()
    }

    /// Total length of all rings
    pub fn perimeter(&self) -> f64 {
        self.edges().map(|e| e.length()).sum()
    }

    pub fn bbox(&self) -> Option<Rect> {
        let bb = self.polygons.bounding_rect()?;
        Rect::try_new(bb.min().x, bb.min().y, bb.max().x, bb.max().y).ok()
    }

    /// Area-weighted centroid
    pub fn centroid(&self) -> Option<Point> {
        self.polygons.centroid().map(|c| Point(c.x(), c.y()))
    }

    /// All edges of all rings (exteriors and holes)
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.polygons
            .iter()
            .flat_map(|p| iter::once(p.exterior()).chain(p.interiors().iter()))
            .flat_map(|ls| {
                ls.lines().map(|l| Edge {
                    start: l.start.into(),
                    end: l.end.into(),
                })
            })
    }

    /// All rings without their closing vertex.
    /// Exteriors are counterclockwise, holes are clockwise, each exterior is followed by its holes.
    pub fn rings(&self) -> Vec<Vec<Point>> {
        self.polygons
            .iter()
            .flat_map(|p| {
                iter::once(oriented_ring(p.exterior(), true))
                    .chain(p.interiors().iter().map(|r| oriented_ring(r, false)))
            })
            .collect_vec()
    }

    /// All vertices of all rings, without closing vertices
    pub fn vertices(&self) -> impl Iterator<Item = Point> + '_ {
        self.polygons
            .iter()
            .flat_map(|p| iter::once(p.exterior()).chain(p.interiors().iter()))
            .flat_map(|ls| ring_points(ls).into_iter())
    }

    /// True if both regions cover the same area, up to a band of width `eps` along their boundaries.
    pub fn approx_eq(&self, other: &Region, eps: f64) -> bool {
        let tolerance = eps * f64::max(1.0, self.perimeter() + other.perimeter());
        self.xor(other).area() <= tolerance
    }

    /// True if no part of `self` wider than `eps` lies outside of `other`.
    pub fn is_subset_of(&self, other: &Region, eps: f64) -> bool {
        let tolerance = eps * f64::max(1.0, self.perimeter());
        self.subtract(other).area() <= tolerance
    }

    /// Image of `self` under `t`.
    pub fn transformed(&self, t: &Transformation) -> Region {
        self.transform_clone(t)
    }

    /// Resolves overlaps and self-intersections, then sanitizes.
    fn normalized(polygons: MultiPolygon<f64>) -> Region {
        Region::sanitized(polygons.union(&MultiPolygon::new(vec![])))
    }

    fn sanitized(polygons: MultiPolygon<f64>) -> Region {
        let polygons = polygons
            .into_iter()
            .filter_map(|p| {
                let (exterior, interiors) = p.into_inner();
                let exterior = clean_ring(&exterior)?;
                let interiors = interiors.iter().filter_map(clean_ring).collect_vec();
                let polygon = Polygon::new(exterior, interiors);
                let bb = polygon.bounding_rect()?;
                //slivers are dropped
                (bb.width() >= EPSILON && bb.height() >= EPSILON).then_some(polygon)
            })
            .collect_vec();
        Region {
            polygons: MultiPolygon::new(polygons),
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::empty()
    }
}

impl Transformable for Region {
    fn transform(&mut self, t: &Transformation) -> &mut Self {
        self.polygons = self
            .polygons
            .map_coords(|c| t.apply(&Point::from(c)).into());
        self
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Region::from_rect(rect)
    }
}

/// Signed area of a ring, positive if counterclockwise
pub fn signed_area(ring: &[Point]) -> f64 {
    ring.iter()
        .circular_tuple_windows()
        .map(|(a, b)| a.cross(b))
        .sum::<f64>()
        / 2.0
}

fn polygon_from(ring: &[Point]) -> Polygon<f64> {
    let coords = ring.iter().map(|p| Coord::from(*p)).collect_vec();
    Polygon::new(LineString::from(coords), vec![])
}

fn ring_points(ls: &LineString<f64>) -> Vec<Point> {
    let mut points = ls.coords().map(|c| Point(c.x, c.y)).collect_vec();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn oriented_ring(ls: &LineString<f64>, counterclockwise: bool) -> Vec<Point> {
    let mut points = ring_points(ls);
    if (signed_area(&points) > 0.0) != counterclockwise {
        points.reverse();
    }
    points
}

/// Removes near-duplicate and collinear vertices, `None` if nothing of substance remains
fn clean_ring(ls: &LineString<f64>) -> Option<LineString<f64>> {
    let mut points = ring_points(ls);
    points.dedup_by(|a, b| a.almost_eq(b, EPSILON));
    while points.len() > 1 && points[0].almost_eq(&points[points.len() - 1], EPSILON) {
        points.pop();
    }
    loop {
        let n = points.len();
        if n < 3 {
            return None;
        }
        let collinear = (0..n).find(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            match prev.almost_eq(&next, EPSILON) {
                true => false,
                false => Edge {
                    start: prev,
                    end: next,
                }
                .distance_to(&points[i])
                    <= EPSILON,
            }
        });
        match collinear {
            Some(i) => {
                points.remove(i);
            }
            None => break,
        }
    }
    if signed_area(&points).abs() < EPSILON.powi(2) {
        return None;
    }
    Some(LineString::from(
        points.into_iter().map(Coord::from).collect_vec(),
    ))
}
