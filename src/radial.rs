// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::cache::{PixelFormat, Raster, RasterCache};
use crate::geom::{IsValidLength, Line, Transform};
use crate::gradient::{RadialGradient, SpreadMethod};
use crate::lut::ColorLut;
use crate::{Error, FuzzyEq};

/// How far inside the circle an outside focal point is pulled back,
/// as a fraction of the radius.
const SCALEBACK: f32 = 0.97;

/// A radial gradient fill.
///
/// The gradient position of a pixel is its distance from the focal point,
/// as a fraction of the distance from the focal point to the circle along
/// the same ray. With the focal point in the center this reduces to plain
/// normalized distance, which a faster concentric path handles.
///
/// Immutable once constructed, so a single fill can paint independent
/// regions from multiple threads.
#[derive(Debug)]
pub struct RadialGradientFill {
    lut: ColorLut,
    cache: Arc<RasterCache>,

    /// Device space to user space.
    ts: Transform,

    cx: f32,
    cy: f32,
    fx: f32,
    fy: f32,
    radius: f32,
    radius_sq: f32,

    /// Half-chord length at the focal x coordinate, the intersection
    /// solution for rays with an undefined slope.
    trivial: f32,

    /// Use the concentric path. Decided once, at construction.
    fast: bool,
}

impl RadialGradientFill {
    /// Creates a radial gradient fill.
    ///
    /// `ts` is the user space to device space transform.
    ///
    /// A focal point outside the circle is pulled onto a point just inside
    /// it along the center-focus direction, as the SVG spec requires.
    ///
    /// Returns an error when the stops are unusable, when the radius is not
    /// a positive finite number or when `ts` is not invertible.
    pub fn new(
        gradient: &RadialGradient,
        ts: Transform,
        cache: Arc<RasterCache>,
    ) -> Result<Self, Error> {
        let lut = ColorLut::new(&gradient.base)?;

        if !gradient.r.is_valid_length() {
            return Err(Error::InvalidGeometry);
        }

        let ts = ts.invert().ok_or(Error::NonInvertibleTransform)?;

        let cx = gradient.cx;
        let cy = gradient.cy;
        let radius = gradient.r;
        let mut fx = gradient.fx;
        let mut fy = gradient.fy;

        // An outside focal point would degenerate the ray intersection
        // near the rim, so it is not allowed to reach it.
        let mut line = Line::new(cx, cy, fx, fy);
        if line.length() > radius {
            log::warn!("Focal point is outside of the gradient circle. Clamped.");
            line.set_length(radius * SCALEBACK);
            fx = line.x2;
            fy = line.y2;
        }

        let radius_sq = radius * radius;
        let dx = fx - cx;
        // max() soaks up rounding when the focal point sits near the rim.
        let trivial = (radius_sq - dx * dx).max(0.0).sqrt();

        let fast = fx.fuzzy_eq(&cx)
            && fy.fuzzy_eq(&cy)
            && lut.spread_method() == SpreadMethod::Pad
            && lut.single_table().is_some();

        Ok(RadialGradientFill {
            lut,
            cache,
            ts,
            cx,
            cy,
            fx,
            fy,
            radius,
            radius_sq,
            trivial,
            fast,
        })
    }

    /// Fills a `width`x`height` device-space region anchored at `(x, y)`.
    pub fn fill(&self, x: i32, y: i32, width: u32, height: u32) -> Raster {
        let mut raster = Raster::acquire(&self.cache, self.lut.pixel_format(), width, height);
        if self.fast {
            self.fill_concentric(x, y, width, height, raster.pixels_mut());
        } else {
            self.fill_focal(x, y, width, height, raster.pixels_mut());
        }

        raster
    }

    /// Returns the pixel format rasters produced by this fill will have.
    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.lut.pixel_format()
    }

    /// The focal point matches the center and the spread is `Pad`, so the
    /// table index is just the scaled distance from the center, clamped to
    /// the table. The squared distance is maintained incrementally:
    /// along a row it is a quadratic in the column, so consecutive pixels
    /// differ by a linearly growing delta.
    fn fill_concentric(&self, x: i32, y: i32, width: u32, height: u32, pixels: &mut [u32]) {
        let table = match self.lut.single_table() {
            Some(table) => table,
            None => return self.fill_focal(x, y, width, height, pixels),
        };
        let last = table.len() - 1;

        let a = self.ts.a as f64;
        let b = self.ts.b as f64;
        let c = self.ts.c as f64;
        let d = self.ts.d as f64;

        // Distances are prescaled so that `radius` lands on the last
        // table entry.
        let index_factor = last as f64 / self.radius as f64;
        let const_x = a * x as f64 + c * y as f64 + (self.ts.e - self.cx) as f64;
        let const_y = b * x as f64 + d * y as f64 + (self.ts.f - self.cy) as f64;
        let delta_x = index_factor * a;
        let delta_y = index_factor * b;
        let temp = delta_x * delta_x + delta_y * delta_y;
        let second_diff = 2.0 * temp;
        let max_sq = (last * last) as f64;

        let mut offset = 0;
        for row in 0..height {
            let dx = index_factor * (c * row as f64 + const_x);
            let dy = index_factor * (d * row as f64 + const_y);

            let mut dist_sq = dx * dx + dy * dy;
            let mut delta = 2.0 * (delta_x * dx + delta_y * dy) + temp;

            for _ in 0..width {
                let index = if dist_sq >= max_sq {
                    last
                } else if dist_sq < 0.0 {
                    0
                } else {
                    dist_sq.sqrt() as usize
                };

                pixels[offset] = table[index];
                offset += 1;

                dist_sq += delta;
                delta += second_diff;
            }
        }
    }

    /// The general path: intersect the ray from the focal point through
    /// the pixel with the gradient circle, substituting the ray equation
    /// into the circle equation and solving with the quadratic formula.
    fn fill_focal(&self, x: i32, y: i32, width: u32, height: u32, pixels: &mut [u32]) {
        let a00 = self.ts.a as f64;
        let a10 = self.ts.b as f64;
        let a01 = self.ts.c as f64;
        let a11 = self.ts.d as f64;

        let cx = self.cx as f64;
        let cy = self.cy as f64;
        let fx = self.fx as f64;
        let fy = self.fy as f64;
        let trivial = self.trivial as f64;

        // Constant parts of the quadratic coefficients.
        let const_c = -(self.radius_sq as f64) + cx * cx + cy * cy;
        let precalc2 = 2.0 * cy;
        let precalc3 = -2.0 * cx;

        let const_x = a00 * x as f64 + a01 * y as f64 + self.ts.e as f64;
        let const_y = a10 * x as f64 + a11 * y as f64 + self.ts.f as f64;

        let mut offset = 0;
        for row in 0..height {
            let mut px = a01 * row as f64 + const_x;
            let mut py = a11 * row as f64 + const_y;

            for _ in 0..width {
                let (sx, sy) = if px == fx {
                    // The ray is vertical; the intersection is a chord
                    // endpoint computed at construction.
                    let sy = if py > fy { cy + trivial } else { cy - trivial };
                    (fx, sy)
                } else {
                    let slope = (py - fy) / (px - fx);
                    let yint = py - slope * px;

                    let a = slope * slope + 1.0;
                    let b = precalc3 - 2.0 * slope * (cy - yint);
                    let c = const_c + yint * (yint - precalc2);

                    // Rounding can push the discriminant slightly below
                    // zero when the ray grazes the rim. Clamp, not error.
                    let det = (b * b - 4.0 * a * c).max(0.0).sqrt();

                    // Pick the root on the pixel's side of the focal point.
                    let mut sx = -b;
                    sx += if px < fx { -det } else { det };
                    sx /= 2.0 * a;

                    (sx, slope * sx + yint)
                };

                // Square distances, so only one square root is needed
                // after the division.
                let dx = px - fx;
                let dy = py - fy;
                let current_sq = dx * dx + dy * dy;

                let dx = sx - fx;
                let dy = sy - fy;
                let intersect_sq = dx * dx + dy * dy;

                let g = (current_sq / intersect_sq).sqrt();
                pixels[offset] = self.lut.packed_at(g as f32);
                offset += 1;

                px += a00;
                py += a10;
            }
        }
    }
}
