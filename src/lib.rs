// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
`svggradients` provides low-level
[SVG gradients](https://www.w3.org/TR/SVG11/pservers.html) rasterization.

`svggradients` doesn't implement the whole paint-servers workflow, just the
per-pixel filling of rectangular raster regions. Gradient element resolving
(`xlink:href`, units, stop parsing), shape clipping, compositing and
transcoding should be implemented by the caller.

## Implemented

- [linearGradient](https://www.w3.org/TR/SVG11/pservers.html#LinearGradients)
  via an axis-projection fill.
- [radialGradient](https://www.w3.org/TR/SVG11/pservers.html#RadialGradients)
  with an optional focal point, via a focus-to-circumference intersection fill.
  A faster concentric path is used when the focal point matches the center.
- All three spread methods: `pad`, `repeat` and `reflect`.
- Color interpolation in sRGB and linearRGB color spaces.

## Unimplemented

- [Patterns](https://www.w3.org/TR/SVG11/pservers.html#Patterns),
  because they are just repeated compositing of an already rendered layer.
- Elliptical radial gradients. Like in the SVG spec, the gradient circle
  is a true circle; scale it with the gradient transform instead.

## Performance

Fills are allocation free in the common case: produced rasters borrow their
pixel storage from a caller-owned [`RasterCache`] and hand it back on drop.
All color-space math happens once, at lookup-table construction.
*/

#![doc(html_root_url = "https://docs.rs/svggradients/0.1.0")]

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::many_single_char_names)]

use std::sync::Arc;

use float_cmp::ApproxEqUlps;
pub use rgb::RGBA8;

mod cache;
mod geom;
mod gradient;
mod linear;
mod lut;
mod radial;

pub use cache::{PixelFormat, Raster, RasterCache};
pub use geom::Transform;
pub use gradient::{BaseGradient, ColorInterpolation, Gradient, LinearGradient, RadialGradient,
                   SpreadMethod, Stop};
pub use linear::LinearGradientFill;
pub use lut::ColorLut;
pub use radial::RadialGradientFill;


/// List of all errors.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Error {
    /// Gradient stops are unusable.
    ///
    /// Occurs when there are fewer than two stops, or when stop offsets
    /// are outside the 0..=1 range or are not non-decreasing.
    InvalidStops,

    /// Gradient geometry is degenerate.
    ///
    /// Occurs when a linear gradient axis has a zero length
    /// or when a radial gradient radius is not a positive, finite number.
    InvalidGeometry,

    /// The provided transform cannot be inverted.
    NonInvertibleTransform,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Error::InvalidStops => {
                write!(f, "gradient stops are fewer than two or out of order")
            }
            Error::InvalidGeometry => {
                write!(f, "gradient geometry is degenerate")
            }
            Error::NonInvertibleTransform => {
                write!(f, "transform is not invertible")
            }
        }
    }
}

impl std::error::Error for Error {}


/// A gradient fill, with the strategy selected at construction time.
///
/// This is a thin dispatch over [`LinearGradientFill`] and
/// [`RadialGradientFill`] for callers that hold a generic [`Gradient`].
#[allow(missing_docs)]
#[derive(Debug)]
pub enum GradientFill {
    Linear(LinearGradientFill),
    Radial(RadialGradientFill),
}

impl GradientFill {
    /// Creates a fill for the provided gradient.
    ///
    /// `ts` is the user space to device space transform.
    pub fn new(
        gradient: &Gradient,
        ts: Transform,
        cache: Arc<RasterCache>,
    ) -> Result<Self, Error> {
        match gradient {
            Gradient::Linear(g) => LinearGradientFill::new(g, ts, cache).map(GradientFill::Linear),
            Gradient::Radial(g) => RadialGradientFill::new(g, ts, cache).map(GradientFill::Radial),
        }
    }

    /// Fills a `width`x`height` device-space region anchored at `(x, y)`.
    pub fn fill(&self, x: i32, y: i32, width: u32, height: u32) -> Raster {
        match self {
            GradientFill::Linear(f) => f.fill(x, y, width, height),
            GradientFill::Radial(f) => f.fill(x, y, width, height),
        }
    }

    /// Returns the pixel format rasters produced by this fill will have.
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            GradientFill::Linear(f) => f.pixel_format(),
            GradientFill::Radial(f) => f.pixel_format(),
        }
    }
}


trait FuzzyEq<Rhs: ?Sized = Self> {
    fn fuzzy_eq(&self, other: &Rhs) -> bool;

    #[inline]
    fn fuzzy_ne(&self, other: &Rhs) -> bool {
        !self.fuzzy_eq(other)
    }
}

trait FuzzyZero: FuzzyEq {
    fn is_fuzzy_zero(&self) -> bool;
}

impl FuzzyEq for f32 {
    #[inline]
    fn fuzzy_eq(&self, other: &f32) -> bool {
        self.approx_eq_ulps(other, 4)
    }
}

impl FuzzyZero for f32 {
    #[inline]
    fn is_fuzzy_zero(&self) -> bool {
        self.fuzzy_eq(&0.0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn red_blue() -> BaseGradient {
        BaseGradient {
            spread_method: SpreadMethod::Pad,
            color_interpolation: ColorInterpolation::SRGB,
            stops: vec![
                Stop::new(0.0, RGBA8::new(255, 0, 0, 255)),
                Stop::new(1.0, RGBA8::new(0, 0, 255, 255)),
            ],
        }
    }

    fn linear() -> Gradient {
        Gradient::Linear(LinearGradient {
            x1: 0.0, y1: 0.0, x2: 10.0, y2: 0.0,
            base: red_blue(),
        })
    }

    fn radial() -> Gradient {
        Gradient::Radial(RadialGradient {
            cx: 0.0, cy: 0.0, r: 10.0, fx: 0.0, fy: 0.0,
            base: red_blue(),
        })
    }

    #[test]
    fn dispatches_by_geometry() {
        let cache = Arc::new(RasterCache::new());

        let fill = GradientFill::new(&linear(), Transform::default(), cache.clone()).unwrap();
        assert!(matches!(fill, GradientFill::Linear(_)));
        assert_eq!(fill.pixel_format(), PixelFormat::Rgb);

        let fill = GradientFill::new(&radial(), Transform::default(), cache).unwrap();
        assert!(matches!(fill, GradientFill::Radial(_)));
    }

    #[test]
    fn fills_are_shareable_across_threads() {
        let cache = Arc::new(RasterCache::new());
        let fill = Arc::new(GradientFill::new(&linear(), Transform::default(), cache).unwrap());

        let mut threads = Vec::new();
        for i in 0..4 {
            let fill = fill.clone();
            threads.push(std::thread::spawn(move || {
                let raster = fill.fill(i * 8, i, 8, 8);
                raster.pixels().to_vec()
            }));
        }

        for thread in threads {
            assert_eq!(thread.join().unwrap().len(), 64);
        }
    }

    #[test]
    fn cache_is_shared_between_fills() {
        let cache = Arc::new(RasterCache::new());
        let linear_fill = GradientFill::new(&linear(), Transform::default(), cache.clone()).unwrap();
        let radial_fill = GradientFill::new(&radial(), Transform::default(), cache).unwrap();

        let raster = linear_fill.fill(0, 0, 8, 8);
        let ptr = raster.pixels().as_ptr();
        drop(raster);

        // Both fills produce the same pixel format here, so the radial one
        // picks the buffer the linear one released.
        let raster = radial_fill.fill(0, 0, 8, 8);
        assert_eq!(raster.pixels().as_ptr(), ptr);
    }
}
