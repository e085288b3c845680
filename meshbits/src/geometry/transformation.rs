use std::ops::{Add, Div, Mul, Sub};

use anyhow::{Result, anyhow, ensure};
use ordered_float::NotNan;

use crate::geometry::geo_traits::Transformable;
use crate::geometry::primitives::Point;

//See https://pages.mtu.edu/~shene/COURSES/cs3621/NOTES/geometry/geo-tran.html#:~:text=A%20rotation%20matrix%20and%20a,rotations%20followed%20by%20a%20translation.

#[derive(Clone, Debug, PartialEq)]
///Affine transformation in matrix form.
///Bits only accept conservative ones (rotation and translation), see [`Transformation::is_conservative`].
pub struct Transformation {
    matrix: [[NotNan<f64>; 3]; 3],
}

impl Transformation {
    pub fn from_rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            matrix: rot_m(cos, sin),
        }
    }

    /// Rotation that maps the x-axis onto `orientation`.
    /// Fails if `orientation` is (almost) the zero vector.
    pub fn from_orientation(orientation: &Point) -> Result<Self> {
        let Point(cos, sin) = orientation
            .normalize()
            .ok_or_else(|| anyhow!("degenerate orientation: {orientation:?}"))?;
        Ok(Self {
            matrix: rot_m(cos, sin),
        })
    }

    pub fn from_scale((sx, sy): (f64, f64)) -> Self {
        let sx = NotNan::new(sx).expect("sx is NaN");
        let sy = NotNan::new(sy).expect("sy is NaN");
        Self {
            matrix: [[sx, _0, _0], [_0, sy, _0], [_0, _0, _1]],
        }
    }

    pub fn translate(mut self, (tx, ty): (f64, f64)) -> Self {
        self.matrix = dot_prod(&transl_m((tx, ty)), &self.matrix);
        self
    }

    /// Inverse transformation.
    /// Fails if the matrix is singular, which indicates a configuration error upstream.
    pub fn try_inverse(&self) -> Result<Self> {
        let m = self.matrix.map(|row| row.map(|v| v.into_inner()));
        let det = determinant(&m);
        ensure!(
            det.is_finite() && det.abs() > f64::EPSILON,
            "transformation is not invertible (det = {det}): {self:?}"
        );
        let inv = inverse(&m, det);
        let mut matrix = EMPTY_MATRIX;
        for (i, row) in inv.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                matrix[i][j] =
                    NotNan::new(*v).map_err(|_| anyhow!("inverse of {self:?} contains NaN"))?;
            }
        }
        Ok(Self { matrix })
    }

    /// True if the transformation only rotates and translates (no scaling, shearing or mirroring).
    pub fn is_conservative(&self, eps: f64) -> bool {
        let m = self.matrix.map(|row| row.map(|v| v.into_inner()));
        let col_x = Point(m[0][0], m[1][0]);
        let col_y = Point(m[0][1], m[1][1]);
        (col_x.norm() - 1.0).abs() < eps
            && (col_y.norm() - 1.0).abs() < eps
            && col_x.dot(&col_y).abs() < eps
            && (col_x.cross(&col_y) - 1.0).abs() < eps
            && m[2][0] == 0.0
            && m[2][1] == 0.0
    }

    pub fn is_empty(&self) -> bool {
        self.matrix == EMPTY_MATRIX
    }

    pub fn matrix(&self) -> &[[NotNan<f64>; 3]; 3] {
        &self.matrix
    }

    /// Image of `point` under `self`.
    pub fn apply(&self, point: &Point) -> Point {
        point.transform_clone(self)
    }

    /// Image of the direction `vector` under the linear part of `self` (translation ignored).
    pub fn apply_vector(&self, vector: &Point) -> Point {
        let m = self.matrix();
        Point(
            m[0][0].into_inner() * vector.0 + m[0][1].into_inner() * vector.1,
            m[1][0].into_inner() * vector.0 + m[1][1].into_inner() * vector.1,
        )
    }
}

const _0: NotNan<f64> = unsafe { NotNan::new_unchecked(0.0) };
const _1: NotNan<f64> = unsafe { NotNan::new_unchecked(1.0) };

const EMPTY_MATRIX: [[NotNan<f64>; 3]; 3] = [[_1, _0, _0], [_0, _1, _0], [_0, _0, _1]];

fn rot_m(cos: f64, sin: f64) -> [[NotNan<f64>; 3]; 3] {
    let cos = NotNan::new(cos).expect("cos is NaN");
    let sin = NotNan::new(sin).expect("sin is NaN");

    [[cos, -sin, _0], [sin, cos, _0], [_0, _0, _1]]
}

fn transl_m((tx, ty): (f64, f64)) -> [[NotNan<f64>; 3]; 3] {
    let h = NotNan::new(tx).expect("tx is NaN");
    let k = NotNan::new(ty).expect("ty is NaN");

    [[_1, _0, h], [_0, _1, k], [_0, _0, _1]]
}

#[inline(always)]
fn dot_prod<T>(l: &[[T; 3]; 3], r: &[[T; 3]; 3]) -> [[T; 3]; 3]
where
    T: Add<Output = T> + Mul<Output = T> + Copy,
{
    let cell = |i: usize, j: usize| l[i][0] * r[0][j] + l[i][1] * r[1][j] + l[i][2] * r[2][j];
    [
        [cell(0, 0), cell(0, 1), cell(0, 2)],
        [cell(1, 0), cell(1, 1), cell(1, 2)],
        [cell(2, 0), cell(2, 1), cell(2, 2)],
    ]
}

#[inline(always)]
fn determinant<T>(m: &[[T; 3]; 3]) -> T
where
    T: Add<Output = T> + Mul<Output = T> + Sub<Output = T> + Copy,
{
    m[0][0] * m[1][1] * m[2][2] + m[0][1] * m[1][2] * m[2][0] + m[0][2] * m[1][0] * m[2][1]
        - m[0][2] * m[1][1] * m[2][0]
        - m[0][1] * m[1][0] * m[2][2]
        - m[0][0] * m[1][2] * m[2][1]
}

#[inline(always)]
fn inverse<T>(m: &[[T; 3]; 3], det: T) -> [[T; 3]; 3]
where
    T: Add<Output = T> + Mul<Output = T> + Sub<Output = T> + Div<Output = T> + Copy,
{
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
        ],
    ]
}
