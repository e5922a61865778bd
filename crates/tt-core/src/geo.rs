//! 3-D point type and the voxel → world affine.
//!
//! `Point3` uses `f32` like the tracking buffer it lives in: streamline
//! coordinates are in voxel units, where single precision is ample and the
//! batch footprint halves.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A point (or displacement) in 3-D space.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const ZERO: Point3 = Point3 { x: 0.0, y: 0.0, z: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(self, other: Point3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn distance(self, other: Point3) -> f32 {
        (other - self).norm()
    }

    /// Rescale to length `len`.  A zero vector stays zero.
    #[inline]
    pub fn scaled_to(self, len: f32) -> Point3 {
        let n = self.norm();
        if n > f32::EPSILON { self * (len / n) } else { Point3::ZERO }
    }

    /// Angle between two displacements in degrees, in `[0, 180]`.
    ///
    /// Returns `0.0` if either vector is zero (no defined turn).
    pub fn angle_deg(self, other: Point3) -> f32 {
        let denom = self.norm() * other.norm();
        if denom <= f32::EPSILON {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(-1.0, 1.0).acos().to_degrees()
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Point3 {
    #[inline]
    fn from([x, y, z]: [f32; 3]) -> Self {
        Point3 { x, y, z }
    }
}

impl Add for Point3 {
    type Output = Point3;
    #[inline]
    fn add(self, rhs: Point3) -> Point3 {
        Point3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Point3 {
    #[inline]
    fn add_assign(&mut self, rhs: Point3) {
        *self = *self + rhs;
    }
}

impl Sub for Point3 {
    type Output = Point3;
    #[inline]
    fn sub(self, rhs: Point3) -> Point3 {
        Point3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Point3 {
    type Output = Point3;
    #[inline]
    fn mul(self, rhs: f32) -> Point3 {
        Point3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Point3 {
    type Output = Point3;
    #[inline]
    fn neg(self) -> Point3 {
        Point3::new(-self.x, -self.y, -self.z)
    }
}

impl std::fmt::Display for Point3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

// ── Affine ────────────────────────────────────────────────────────────────────

/// A 3×4 affine transform (the top three rows of a homogeneous 4×4 matrix).
///
/// Maps voxel coordinates to world (RAS mm) coordinates on export.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Affine {
    pub rows: [[f32; 4]; 3],
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    /// Isotropic voxel size plus a translation, the common case for
    /// axis-aligned volumes.
    pub fn scale_translate(voxel_size: f32, origin: Point3) -> Self {
        Affine {
            rows: [
                [voxel_size, 0.0, 0.0, origin.x],
                [0.0, voxel_size, 0.0, origin.y],
                [0.0, 0.0, voxel_size, origin.z],
            ],
        }
    }

    #[inline]
    pub fn apply(&self, p: Point3) -> Point3 {
        let r = &self.rows;
        Point3::new(
            r[0][0] * p.x + r[0][1] * p.y + r[0][2] * p.z + r[0][3],
            r[1][0] * p.x + r[1][1] * p.y + r[1][2] * p.z + r[1][3],
            r[2][0] * p.x + r[2][1] * p.y + r[2][2] * p.z + r[2][3],
        )
    }
}

impl Default for Affine {
    fn default() -> Self {
        Affine::IDENTITY
    }
}
