// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::FuzzyZero;

/// A 2D affine transform.
///
/// Maps a point as `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Transform {
    /// Constructs a new transform.
    #[inline]
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Transform { a, b, c, d, e, f }
    }

    /// Constructs a new translate transform.
    #[inline]
    pub fn new_translate(x: f32, y: f32) -> Self {
        Transform::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    /// Constructs a new scale transform.
    #[inline]
    pub fn new_scale(sx: f32, sy: f32) -> Self {
        Transform::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Constructs a new rotate transform, with the angle in degrees.
    #[inline]
    pub fn new_rotate(angle: f32) -> Self {
        let v = angle.to_radians();
        let a = v.cos();
        let b = v.sin();
        let c = -b;
        let d = a;
        Transform::new(a, b, c, d, 0.0, 0.0)
    }

    /// Appends transform to the current transform.
    #[inline]
    pub fn append(&mut self, other: &Transform) {
        let ts = multiply(self, other);
        self.a = ts.a;
        self.b = ts.b;
        self.c = ts.c;
        self.d = ts.d;
        self.e = ts.e;
        self.f = ts.f;
    }

    /// Applies transform to selected coordinates.
    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let new_x = self.a * x + self.c * y + self.e;
        let new_y = self.b * x + self.d * y + self.f;
        (new_x, new_y)
    }

    /// Returns an inverted transform.
    ///
    /// Returns `None` when the determinant is zero.
    pub fn invert(&self) -> Option<Transform> {
        let det = self.a * self.d - self.b * self.c;
        if det.is_fuzzy_zero() || !det.is_finite() {
            return None;
        }

        let inv_det = 1.0 / det;
        Some(Transform::new(
            self.d * inv_det,
            -self.b * inv_det,
            -self.c * inv_det,
            self.a * inv_det,
            (self.c * self.f - self.d * self.e) * inv_det,
            (self.b * self.e - self.a * self.f) * inv_det,
        ))
    }
}

#[inline(never)]
fn multiply(ts1: &Transform, ts2: &Transform) -> Transform {
    Transform {
        a: ts1.a * ts2.a + ts1.c * ts2.b,
        b: ts1.b * ts2.a + ts1.d * ts2.b,
        c: ts1.a * ts2.c + ts1.c * ts2.d,
        d: ts1.b * ts2.c + ts1.d * ts2.d,
        e: ts1.a * ts2.e + ts1.c * ts2.f + ts1.e,
        f: ts1.b * ts2.e + ts1.d * ts2.f + ts1.f,
    }
}

impl Default for Transform {
    #[inline]
    fn default() -> Transform {
        Transform::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }
}

/// Line representation.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct Line {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Line {
    /// Creates a new line.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Line {
        Line { x1, y1, x2, y2 }
    }

    /// Calculates the line length.
    pub fn length(&self) -> f32 {
        let x = self.x2 - self.x1;
        let y = self.y2 - self.y1;
        (x * x + y * y).sqrt()
    }

    /// Sets the line length, keeping the direction.
    pub fn set_length(&mut self, len: f32) {
        let x = self.x2 - self.x1;
        let y = self.y2 - self.y1;
        let len2 = (x * x + y * y).sqrt();
        self.x2 = self.x1 + x / len2 * len;
        self.y2 = self.y1 + y / len2 * len;
    }
}


pub(crate) trait IsValidLength {
    fn is_valid_length(&self) -> bool;
}

impl IsValidLength for f32 {
    #[inline]
    fn is_valid_length(&self) -> bool {
        *self > 0.0 && self.is_finite()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_translate() {
        let ts = Transform::new_translate(10.0, 20.0).invert().unwrap();
        assert_eq!(ts.apply(10.0, 20.0), (0.0, 0.0));
    }

    #[test]
    fn invert_scale() {
        let ts = Transform::new_scale(2.0, 4.0).invert().unwrap();
        assert_eq!(ts.apply(2.0, 4.0), (1.0, 1.0));
    }

    #[test]
    fn invert_degenerate() {
        assert!(Transform::new_scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn invert_round_trip() {
        let mut ts = Transform::new_translate(3.0, -7.0);
        ts.append(&Transform::new_rotate(30.0));
        ts.append(&Transform::new_scale(1.5, 0.5));
        let inv = ts.invert().unwrap();

        let (x, y) = ts.apply(11.0, 17.0);
        let (x, y) = inv.apply(x, y);
        assert!((x - 11.0).abs() < 1e-4);
        assert!((y - 17.0).abs() < 1e-4);
    }

    #[test]
    fn line_set_length() {
        let mut line = Line::new(1.0, 1.0, 4.0, 5.0);
        assert_eq!(line.length(), 5.0);

        line.set_length(2.5);
        assert_eq!(line.length(), 2.5);
        assert_eq!((line.x2, line.y2), (2.5, 3.0));
    }
}
