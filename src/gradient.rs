// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rgb::RGBA8;

/// A spread method.
///
/// `spreadMethod` attribute in the SVG.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SpreadMethod {
    Pad,
    Reflect,
    Repeat,
}

impl Default for SpreadMethod {
    #[inline]
    fn default() -> Self {
        SpreadMethod::Pad
    }
}


/// A color interpolation space.
///
/// `color-interpolation` property in the SVG.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ColorInterpolation {
    SRGB,
    LinearRGB,
}

impl Default for ColorInterpolation {
    #[inline]
    fn default() -> Self {
        ColorInterpolation::SRGB
    }
}


/// Gradient's stop element.
///
/// `stop` element in the SVG. `stop-opacity` is expected to be premerged
/// into the color's alpha channel by the caller.
#[derive(Clone, Copy, Debug)]
pub struct Stop {
    /// Gradient stop offset.
    ///
    /// `offset` in SVG.
    pub offset: f32,

    /// Gradient stop color.
    ///
    /// `stop-color` in SVG.
    pub color: RGBA8,
}

impl Stop {
    /// Creates a new stop.
    #[inline]
    pub fn new(offset: f32, color: RGBA8) -> Self {
        Stop { offset, color }
    }
}


/// A generic gradient.
#[derive(Clone, Debug)]
pub struct BaseGradient {
    /// Gradient spreading method.
    ///
    /// `spreadMethod` in SVG.
    pub spread_method: SpreadMethod,

    /// Color space used for stop interpolation.
    ///
    /// `color-interpolation` in SVG.
    pub color_interpolation: ColorInterpolation,

    /// A list of `stop` elements.
    ///
    /// Offsets must be in the 0..=1 range and non-decreasing.
    pub stops: Vec<Stop>,
}


/// A linear gradient.
///
/// `linearGradient` element in SVG.
#[allow(missing_docs)]
#[derive(Clone, Debug)]
pub struct LinearGradient {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,

    /// Base gradient data.
    pub base: BaseGradient,
}

impl std::ops::Deref for LinearGradient {
    type Target = BaseGradient;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}


/// A radial gradient.
///
/// `radialGradient` element in SVG.
#[allow(missing_docs)]
#[derive(Clone, Debug)]
pub struct RadialGradient {
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
    pub fx: f32,
    pub fy: f32,

    /// Base gradient data.
    pub base: BaseGradient,
}

impl std::ops::Deref for RadialGradient {
    type Target = BaseGradient;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}


/// A gradient of any kind.
#[allow(missing_docs)]
#[derive(Clone, Debug)]
pub enum Gradient {
    Linear(LinearGradient),
    Radial(RadialGradient),
}
