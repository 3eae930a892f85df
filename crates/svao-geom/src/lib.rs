//! Minimal extent/vector/matrix types for the AO crates (no GPU API dependency).
#![forbid(unsafe_code)]

use core::num::NonZeroU32;
use core::ops::{Div, Mul, Sub};

/// 2D pixel extent. Valid resolutions are at least 1x1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either axis is zero.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Per-axis ceiling division, so the result always covers the source.
    #[inline]
    pub const fn div_ceil(self, divisor: NonZeroU32) -> Self {
        let d = divisor.get();
        Self {
            width: self.width.div_ceil(d),
            height: self.height.div_ceil(d),
        }
    }

    /// Grows both axes by `border` texels on each side; `None` on overflow.
    #[inline]
    pub const fn checked_expand(self, border: u32) -> Option<Self> {
        let Some(grow) = border.checked_mul(2) else {
            return None;
        };
        match (self.width.checked_add(grow), self.height.checked_add(grow)) {
            (Some(width), Some(height)) => Some(Self { width, height }),
            _ => None,
        }
    }

    /// Rounds each axis up to the next multiple of `multiple`; `None` when
    /// the rounded extent does not fit in `u32`.
    #[inline]
    pub const fn checked_round_up(self, multiple: NonZeroU32) -> Option<Self> {
        let m = multiple.get();
        match (
            self.width.div_ceil(m).checked_mul(m),
            self.height.div_ceil(m).checked_mul(m),
        ) {
            (Some(width), Some(height)) => Some(Self { width, height }),
            _ => None,
        }
    }

    #[inline]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[inline]
    pub fn as_float2(self) -> Float2 {
        Float2::new(self.width as f32, self.height as f32)
    }
}

impl core::fmt::Display for Resolution {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Float2 {
    pub x: f32,
    pub y: f32,
}

impl Float2 {
    pub const ZERO: Float2 = Float2 { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Component-wise reciprocal; zero components stay zero.
    #[inline]
    pub fn recip(self) -> Float2 {
        let r = |v: f32| if v != 0.0 { 1.0 / v } else { 0.0 };
        Float2::new(r(self.x), r(self.y))
    }

    #[inline]
    pub fn to_array(self) -> [f32; 2] {
        [self.x, self.y]
    }
}

impl Div<f32> for Float2 {
    type Output = Float2;
    #[inline]
    fn div(self, rhs: f32) -> Float2 {
        Float2::new(self.x / rhs, self.y / rhs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const UP: Vec3 = Vec3 {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(self, rhs: Vec3) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline]
    pub fn cross(self, rhs: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len > 0.0 { self / len } else { self }
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn div(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// Column-major 4x4 matrix, right-handed, depth range [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4 {
    pub cols: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let f = (target - eye).normalized();
        let s = f.cross(up).normalized();
        let u = s.cross(f);
        Mat4 {
            cols: [
                [s.x, u.x, -f.x, 0.0],
                [s.y, u.y, -f.y, 0.0],
                [s.z, u.z, -f.z, 0.0],
                [-s.dot(eye), -u.dot(eye), f.dot(eye), 1.0],
            ],
        }
    }

    pub fn perspective_rh(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let h = 1.0 / (0.5 * fov_y_radians).tan();
        let w = h / aspect;
        let r = far / (near - far);
        Mat4 {
            cols: [
                [w, 0.0, 0.0, 0.0],
                [0.0, h, 0.0, 0.0],
                [0.0, 0.0, r, -1.0],
                [0.0, 0.0, r * near, 0.0],
            ],
        }
    }

    /// Inverse of a rotation + translation matrix (view matrices).
    /// The upper 3x3 must be orthonormal; scale and projection are not handled.
    pub fn inverse_rigid(&self) -> Mat4 {
        let m = &self.cols;
        let t = [m[3][0], m[3][1], m[3][2]];
        let mut out = Mat4::IDENTITY;
        for c in 0..3 {
            for r in 0..3 {
                out.cols[c][r] = m[r][c];
            }
        }
        for i in 0..3 {
            out.cols[3][i] = -(m[i][0] * t[0] + m[i][1] * t[1] + m[i][2] * t[2]);
        }
        out
    }

    #[inline]
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        let m = &self.cols;
        Vec3::new(
            m[0][0] * p.x + m[1][0] * p.y + m[2][0] * p.z + m[3][0],
            m[0][1] * p.x + m[1][1] * p.y + m[2][1] * p.z + m[3][1],
            m[0][2] * p.x + m[1][2] * p.y + m[2][2] * p.z + m[3][2],
        )
    }
}

impl Mul for Mat4 {
    type Output = Mat4;
    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [[0.0f32; 4]; 4];
        for (c, col) in out.iter_mut().enumerate() {
            for (r, v) in col.iter_mut().enumerate() {
                *v = (0..4).map(|k| self.cols[k][r] * rhs.cols[c][k]).sum();
            }
        }
        Mat4 { cols: out }
    }
}
