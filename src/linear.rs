// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::cache::{PixelFormat, Raster, RasterCache};
use crate::geom::{IsValidLength, Transform};
use crate::gradient::LinearGradient;
use crate::lut::ColorLut;
use crate::Error;

/// A linear gradient fill.
///
/// Immutable once constructed, so a single fill can paint independent
/// regions from multiple threads.
#[derive(Debug)]
pub struct LinearGradientFill {
    lut: ColorLut,
    cache: Arc<RasterCache>,

    // The gradient position is a linear form of the device coordinates:
    // g(x, y) = dgdx*x + dgdy*y + gc.
    dgdx: f32,
    dgdy: f32,
    gc: f32,
}

impl LinearGradientFill {
    /// Creates a linear gradient fill.
    ///
    /// `ts` is the user space to device space transform.
    ///
    /// Returns an error when the stops are unusable, when the gradient
    /// axis has a zero length or when `ts` is not invertible.
    pub fn new(
        gradient: &LinearGradient,
        ts: Transform,
        cache: Arc<RasterCache>,
    ) -> Result<Self, Error> {
        let lut = ColorLut::new(&gradient.base)?;

        let dx = gradient.x2 - gradient.x1;
        let dy = gradient.y2 - gradient.y1;
        let axis_len_sq = dx * dx + dy * dy;
        if !axis_len_sq.is_valid_length() {
            return Err(Error::InvalidGeometry);
        }

        let ts = ts.invert().ok_or(Error::NonInvertibleTransform)?;

        // Project the device-to-user mapping onto the gradient axis,
        // normalized by the squared axis length, so that `start` maps
        // to 0 and `end` to 1.
        let const_x = dx / axis_len_sq;
        let const_y = dy / axis_len_sq;

        Ok(LinearGradientFill {
            dgdx: ts.a * const_x + ts.b * const_y,
            dgdy: ts.c * const_x + ts.d * const_y,
            gc: (ts.e - gradient.x1) * const_x + (ts.f - gradient.y1) * const_y,
            lut,
            cache,
        })
    }

    /// Fills a `width`x`height` device-space region anchored at `(x, y)`.
    pub fn fill(&self, x: i32, y: i32, width: u32, height: u32) -> Raster {
        let mut raster = Raster::acquire(&self.cache, self.lut.pixel_format(), width, height);
        let pixels = raster.pixels_mut();

        let row_start = self.dgdx * x as f32 + self.gc;

        let mut offset = 0;
        for row in 0..height {
            let mut g = row_start + self.dgdy * (y as f32 + row as f32);
            for _ in 0..width {
                pixels[offset] = self.lut.packed_at(g);
                offset += 1;
                g += self.dgdx;
            }
        }

        raster
    }

    /// Returns the pixel format rasters produced by this fill will have.
    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.lut.pixel_format()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::{BaseGradient, ColorInterpolation, SpreadMethod, Stop};
    use rgb::RGBA8;

    const BLACK: RGBA8 = RGBA8 { r: 0, g: 0, b: 0, a: 255 };
    const WHITE: RGBA8 = RGBA8 { r: 255, g: 255, b: 255, a: 255 };

    fn axis_gradient(x1: f32, y1: f32, x2: f32, y2: f32, spread_method: SpreadMethod)
        -> LinearGradient
    {
        LinearGradient {
            x1, y1, x2, y2,
            base: BaseGradient {
                spread_method,
                color_interpolation: ColorInterpolation::SRGB,
                stops: vec![Stop::new(0.0, BLACK), Stop::new(1.0, WHITE)],
            },
        }
    }

    fn new_fill(gradient: &LinearGradient, ts: Transform) -> LinearGradientFill {
        LinearGradientFill::new(gradient, ts, Arc::new(RasterCache::new())).unwrap()
    }

    #[test]
    fn horizontal_axis() {
        let gradient = axis_gradient(0.0, 0.0, 10.0, 0.0, SpreadMethod::Pad);
        let fill = new_fill(&gradient, Transform::default());

        // One row crossing the whole axis, from before the start
        // to past the end.
        let raster = fill.fill(-5, 0, 25, 1);
        let pixels = raster.pixels();

        // Before the axis start: the first stop color.
        assert_eq!(pixels[0], 0xFF000000);
        // The middle of the axis: mid-gray.
        let mid = pixels[10] & 0xFF;
        assert!((mid as i32 - 128).abs() <= 2, "mid={}", mid);
        // Past the axis end: the last stop color.
        assert_eq!(pixels[20], 0xFFFFFFFF);
        assert_eq!(pixels[24], 0xFFFFFFFF);
    }

    #[test]
    fn monotonic_along_axis() {
        let gradient = axis_gradient(0.0, 0.0, 16.0, 0.0, SpreadMethod::Pad);
        let fill = new_fill(&gradient, Transform::default());

        let raster = fill.fill(0, 0, 16, 1);
        let pixels = raster.pixels();
        for i in 1..16 {
            assert!((pixels[i] & 0xFF) >= (pixels[i - 1] & 0xFF));
        }
    }

    #[test]
    fn invariant_across_axis() {
        let gradient = axis_gradient(0.0, 0.0, 16.0, 0.0, SpreadMethod::Pad);
        let fill = new_fill(&gradient, Transform::default());

        let raster = fill.fill(0, -3, 7, 7);
        let pixels = raster.pixels();
        for row in 1..7 {
            for column in 0..7 {
                assert_eq!(pixels[row * 7 + column], pixels[column]);
            }
        }
    }

    #[test]
    fn diagonal_axis() {
        let gradient = axis_gradient(0.0, 0.0, 10.0, 10.0, SpreadMethod::Pad);
        let fill = new_fill(&gradient, Transform::default());

        // (5, 5) projects onto the middle of the axis.
        let raster = fill.fill(5, 5, 1, 1);
        let mid = raster.pixels()[0] & 0xFF;
        assert!((mid as i32 - 128).abs() <= 2);

        // (10, 0) also projects onto the middle.
        let raster = fill.fill(10, 0, 1, 1);
        assert_eq!(raster.pixels()[0] & 0xFF, mid);
    }

    #[test]
    fn respects_transform() {
        let gradient = axis_gradient(0.0, 0.0, 10.0, 0.0, SpreadMethod::Pad);
        // User space is scaled 2x on the device, so the axis covers
        // 20 device pixels.
        let fill = new_fill(&gradient, Transform::new_scale(2.0, 2.0));

        let raster = fill.fill(10, 0, 1, 1);
        let mid = raster.pixels()[0] & 0xFF;
        assert!((mid as i32 - 128).abs() <= 2);

        let raster = fill.fill(20, 0, 1, 1);
        assert_eq!(raster.pixels()[0], 0xFFFFFFFF);
    }

    #[test]
    fn repeat_wraps_past_the_axis() {
        let gradient = axis_gradient(0.0, 0.0, 10.0, 0.0, SpreadMethod::Repeat);
        let fill = new_fill(&gradient, Transform::default());

        let raster = fill.fill(2, 0, 1, 1);
        let first = raster.pixels()[0];
        let raster = fill.fill(12, 0, 1, 1);
        assert_eq!(raster.pixels()[0], first);
    }

    #[test]
    fn zero_length_axis_is_an_error() {
        let gradient = axis_gradient(3.0, 4.0, 3.0, 4.0, SpreadMethod::Pad);
        let result = LinearGradientFill::new(
            &gradient,
            Transform::default(),
            Arc::new(RasterCache::new()),
        );
        assert_eq!(result.unwrap_err(), Error::InvalidGeometry);
    }

    #[test]
    fn degenerate_transform_is_an_error() {
        let gradient = axis_gradient(0.0, 0.0, 10.0, 0.0, SpreadMethod::Pad);
        let result = LinearGradientFill::new(
            &gradient,
            Transform::new_scale(0.0, 0.0),
            Arc::new(RasterCache::new()),
        );
        assert_eq!(result.unwrap_err(), Error::NonInvertibleTransform);
    }

    #[test]
    fn produced_raster_has_requested_size() {
        let gradient = axis_gradient(0.0, 0.0, 10.0, 0.0, SpreadMethod::Pad);
        let fill = new_fill(&gradient, Transform::default());

        let raster = fill.fill(-7, 11, 13, 5);
        assert_eq!(raster.width(), 13);
        assert_eq!(raster.height(), 5);
        assert_eq!(raster.pixels().len(), 65);
    }
}
