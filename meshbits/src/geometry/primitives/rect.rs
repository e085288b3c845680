use crate::geometry::primitives::{Edge, Point};
use crate::util::FPA;
use anyhow::Result;
use anyhow::ensure;

///Axis-aligned rectangle
#[derive(Clone, Debug, PartialEq, Copy)]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    pub fn try_new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
        ensure!(
            x_min < x_max && y_min < y_max,
            "invalid rectangle, x_min: {x_min}, x_max: {x_max}, y_min: {y_min}, y_max: {y_max}"
        );
        Ok(Rect {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Returns a new rectangle with the same centroid but inflated
    /// to be the minimum square that contains `self`.
    pub fn inflate_to_square(&self) -> Rect {
        let width = self.x_max - self.x_min;
        let height = self.y_max - self.y_min;
        let mut dx = 0.0;
        let mut dy = 0.0;
        if height < width {
            dy = (width - height) / 2.0;
        } else if width < height {
            dx = (height - width) / 2.0;
        }
        Rect {
            x_min: self.x_min - dx,
            y_min: self.y_min - dy,
            x_max: self.x_max + dx,
            y_max: self.y_max + dy,
        }
    }

    /// Returns the 4 quadrants of `self`.
    /// Ordered in the same way as quadrants in a cartesian plane:
    /// <https://en.wikipedia.org/wiki/Quadrant_(plane_geometry)>
    pub fn quadrants(&self) -> [Self; 4] {
        let Point(x_mid, y_mid) = self.centroid();
        [
            Rect {
                x_min: x_mid,
                y_min: y_mid,
                x_max: self.x_max,
                y_max: self.y_max,
            },
            Rect {
                x_min: self.x_min,
                y_min: y_mid,
                x_max: x_mid,
                y_max: self.y_max,
            },
            Rect {
                x_min: self.x_min,
                y_min: self.y_min,
                x_max: x_mid,
                y_max: y_mid,
            },
            Rect {
                x_min: x_mid,
                y_min: self.y_min,
                x_max: self.x_max,
                y_max: y_mid,
            },
        ]
    }

    /// Returns the four corners of `self`, in the same order as [Rect::quadrants].
    pub fn corners(&self) -> [Point; 4] {
        [
            Point(self.x_max, self.y_max),
            Point(self.x_min, self.y_max),
            Point(self.x_min, self.y_min),
            Point(self.x_max, self.y_min),
        ]
    }

    /// Returns the four edges that make up `self`, in the same order as [Rect::quadrants].
    pub fn edges(&self) -> [Edge; 4] {
        let c = self.corners();
        [
            Edge {
                start: c[0],
                end: c[1],
            },
            Edge {
                start: c[1],
                end: c[2],
            },
            Edge {
                start: c[2],
                end: c[3],
            },
            Edge {
                start: c[3],
                end: c[0],
            },
        ]
    }

    /// True if `edge` lies (within `eps`) on one of the four sides of `self`.
    pub fn edge_on_side(&self, edge: &Edge, eps: f64) -> bool {
        let on = |a: f64, b: f64| (a - b).abs() < eps;
        let (s, e) = (edge.start, edge.end);
        (on(s.0, self.x_min) && on(e.0, self.x_min))
            || (on(s.0, self.x_max) && on(e.0, self.x_max))
            || (on(s.1, self.y_min) && on(e.1, self.y_min))
            || (on(s.1, self.y_max) && on(e.1, self.y_max))
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Returns the largest rectangle that is contained in both `a` and `b`.
    pub fn intersection(a: Rect, b: Rect) -> Option<Rect> {
        let x_min = f64::max(a.x_min, b.x_min);
        let y_min = f64::max(a.y_min, b.y_min);
        let x_max = f64::min(a.x_max, b.x_max);
        let y_max = f64::min(a.y_max, b.y_max);
        Rect::try_new(x_min, y_min, x_max, y_max).ok()
    }

    pub fn centroid(&self) -> Point {
        Point(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn area(&self) -> f64 {
        (self.x_max - self.x_min) * (self.y_max - self.y_min)
    }

    pub fn diameter(&self) -> f64 {
        let dx = self.x_max - self.x_min;
        let dy = self.y_max - self.y_min;
        (dx.powi(2) + dy.powi(2)).sqrt()
    }

    /// True if both rectangles have the same bounds within [`FPA`] tolerance.
    pub fn almost_eq(&self, other: &Rect) -> bool {
        FPA(self.x_min) == FPA(other.x_min)
            && FPA(self.y_min) == FPA(other.y_min)
            && FPA(self.x_max) == FPA(other.x_max)
            && FPA(self.y_max) == FPA(other.y_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrants_cover_rect() {
        let rect = Rect::try_new(0.0, 0.0, 4.0, 2.0).unwrap();
        let total: f64 = rect.quadrants().iter().map(|q| q.area()).sum();
        assert_eq!(total, rect.area());
        assert_eq!(rect.quadrants()[0].corners()[0], Point(4.0, 2.0));
    }

    #[test]
    fn side_detection() {
        let rect = Rect::try_new(-10.0, -5.0, 10.0, 5.0).unwrap();
        let on_left = Edge {
            start: Point(-10.0, 0.0),
            end: Point(-10.0 + 1e-7, 3.0),
        };
        let inside = Edge {
            start: Point(-4.0, -5.0),
            end: Point(-4.0, 5.0),
        };
        assert!(rect.edge_on_side(&on_left, 1e-5));
        assert!(!rect.edge_on_side(&inside, 1e-5));
    }

    #[test]
    fn invalid_rect_is_rejected() {
        assert!(Rect::try_new(1.0, 0.0, 1.0, 2.0).is_err());
        assert!(Rect::intersection(
            Rect::try_new(0.0, 0.0, 1.0, 1.0).unwrap(),
            Rect::try_new(2.0, 2.0, 3.0, 3.0).unwrap()
        )
        .is_none());
    }
}
