//! Column-major 4x4 affine matrix.
//!
//! Only the subset the puppet pipeline needs is provided: identity, 2D translation/scale/rotation,
//! multiplication, point mapping and conversion to/from [`kurbo::Affine`] at the drawing-context
//! boundary.

use std::ops::Mul;

use crate::foundation::core::{Affine, Point};

/// A column-major 4x4 affine transform.
///
/// Cell `(row, col)` lives at `cells[col * 4 + row]`, matching the layout GPU APIs expect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix44 {
    cells: [f64; 16],
}

impl Default for Matrix44 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix44 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        cells: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Build from 16 column-major cells.
    pub const fn from_cells(cells: [f64; 16]) -> Self {
        Self { cells }
    }

    /// Column-major cells.
    pub fn cells(&self) -> &[f64; 16] {
        &self.cells
    }

    /// Cell at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.cells[col * 4 + row]
    }

    /// 2D translation.
    pub const fn from_translation(x: f64, y: f64) -> Self {
        let mut m = Self::IDENTITY;
        m.cells[12] = x;
        m.cells[13] = y;
        m
    }

    /// 2D non-uniform scale.
    pub const fn from_scale(sx: f64, sy: f64) -> Self {
        let mut m = Self::IDENTITY;
        m.cells[0] = sx;
        m.cells[5] = sy;
        m
    }

    /// Rotation around the Z axis, counter-clockwise for a y-up space.
    pub fn from_rotation_z(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        let mut m = Self::IDENTITY;
        m.cells[0] = c;
        m.cells[1] = s;
        m.cells[4] = -s;
        m.cells[5] = c;
        m
    }

    /// `self × rhs`, with `self` as the left operand.
    pub fn multiply(&self, rhs: &Self) -> Self {
        let a = &self.cells;
        let b = &rhs.cells;
        let mut out = [0.0; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut acc = 0.0;
                for k in 0..4 {
                    acc += a[k * 4 + row] * b[col * 4 + k];
                }
                out[col * 4 + row] = acc;
            }
        }
        Self { cells: out }
    }

    /// X scale component.
    pub fn scale_x(&self) -> f64 {
        self.cells[0]
    }

    /// Y scale component.
    pub fn scale_y(&self) -> f64 {
        self.cells[5]
    }

    /// X translation component.
    pub fn translate_x(&self) -> f64 {
        self.cells[12]
    }

    /// Y translation component.
    pub fn translate_y(&self) -> f64 {
        self.cells[13]
    }

    /// Map a point through the 2D part of the matrix.
    pub fn transform_point(&self, p: Point) -> Point {
        let m = &self.cells;
        Point::new(
            m[0] * p.x + m[4] * p.y + m[12],
            m[1] * p.x + m[5] * p.y + m[13],
        )
    }

    /// The 2D part as a [`kurbo::Affine`].
    pub fn to_affine(&self) -> Affine {
        let m = &self.cells;
        Affine::new([m[0], m[1], m[4], m[5], m[12], m[13]])
    }

    /// Embed a [`kurbo::Affine`] into a 4x4 matrix.
    pub fn from_affine(a: Affine) -> Self {
        let [a0, b0, c0, d0, e0, f0] = a.as_coeffs();
        let mut m = Self::IDENTITY;
        m.cells[0] = a0;
        m.cells[1] = b0;
        m.cells[4] = c0;
        m.cells[5] = d0;
        m.cells[12] = e0;
        m.cells[13] = f0;
        m
    }

    /// Inverse of the 2D part, or `None` when it is singular.
    pub fn inverse_2d(&self) -> Option<Self> {
        let a = self.to_affine();
        let det = a.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Self::from_affine(a.inverse()))
    }

    /// Return `true` when all cells are finite.
    pub fn is_finite(&self) -> bool {
        self.cells.iter().all(|c| c.is_finite())
    }
}

impl Mul for Matrix44 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.multiply(&rhs)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/matrix.rs"]
mod tests;
