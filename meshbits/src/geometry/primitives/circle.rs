use crate::geometry::primitives::Point;
use anyhow::Result;
use anyhow::ensure;

/// Disk inscribed in a region, as found by the pole search
#[derive(Clone, Debug, PartialEq, Copy)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

impl Circle {
    pub fn try_new(center: Point, radius: f64) -> Result<Self> {
        ensure!(
            radius.is_finite() && radius >= 0.0,
            "invalid circle radius: {radius}",
        );
        ensure!(
            center.0.is_finite() && center.1.is_finite(),
            "invalid circle center: {center:?}",
        );

        Ok(Self { center, radius })
    }
}
