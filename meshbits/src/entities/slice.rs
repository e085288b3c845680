use serde::{Deserialize, Serialize};

use crate::geometry::primitives::Point;
use crate::geometry::{Region, Winding};

/// Horizontal cross-section of a model at a given altitude.
///
/// Polygons are closed rings (without repeated closing point), holes are encoded by the even-odd rule.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Slice {
    pub altitude: f64,
    pub polygons: Vec<Vec<Point>>,
}

impl Slice {
    pub fn new(altitude: f64, polygons: Vec<Vec<Point>>) -> Self {
        Self { altitude, polygons }
    }

    /// The area enclosed by the slice
    pub fn to_region(&self) -> Region {
        Region::from_rings(&self.polygons, Winding::EvenOdd)
    }

    /// Largest distance between the origin and a vertex of the slice
    pub fn max_radius(&self) -> f64 {
        self.polygons
            .iter()
            .flatten()
            .map(|p| p.norm())
            .fold(0.0, f64::max)
    }
}

/// Radius of the disk centered at the origin that contains every slice
pub fn skirt_radius(slices: &[Slice]) -> f64 {
    slices.iter().map(Slice::max_radius).fold(0.0, f64::max)
}

/// Triangle of a model, vertices in counterclockwise order seen from outside
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Triangle(pub [[f64; 3]; 3]);

/// Imported 3D model, as handed to a [`Slicer`](crate::pipeline::Slicer).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Model {
    pub name: String,
    pub triangles: Vec<Triangle>,
}

impl Model {
    /// Lowest and highest altitude reached by the model, `None` if it has no triangles
    pub fn z_range(&self) -> Option<(f64, f64)> {
        self.triangles
            .iter()
            .flat_map(|t| t.0.iter().map(|v| v[2]))
            .fold(None, |acc, z| match acc {
                None => Some((z, z)),
                Some((lo, hi)) => Some((f64::min(lo, z), f64::max(hi, z))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn slice_with_hole() {
        let outer = vec![
            Point(-10.0, -10.0),
            Point(10.0, -10.0),
            Point(10.0, 10.0),
            Point(-10.0, 10.0),
        ];
        let hole = vec![
            Point(-5.0, -5.0),
            Point(5.0, -5.0),
            Point(5.0, 5.0),
            Point(-5.0, 5.0),
        ];
        let slice = Slice::new(4.0, vec![outer, hole]);
        assert!(approx_eq!(f64, slice.to_region().area(), 300.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, skirt_radius(&[slice]), 200f64.sqrt(), epsilon = 1e-9));
    }

    #[test]
    fn model_z_range() {
        let model = Model {
            name: "tetra".into(),
            triangles: vec![
                Triangle([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
                Triangle([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 3.0]]),
            ],
        };
        assert_eq!(model.z_range(), Some((0.0, 3.0)));
        assert_eq!(Model::default().z_range(), None);
    }
}
