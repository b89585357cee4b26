// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rgb::RGBA8;

use crate::cache::PixelFormat;
use crate::gradient::{BaseGradient, ColorInterpolation, SpreadMethod, Stop};
use crate::Error;

/// Entries per interval table. The maximum number of unique in-between
/// colors in a 24-bit color system is 255, plus the interval start.
const GRADIENT_SIZE: usize = 256;

/// Maximum length of the single flat table. When a disproportionately small
/// interval would balloon the flat table beyond this, one fixed-size table
/// per interval is used instead and the containing interval is located at
/// lookup time.
const MAX_SINGLE_ARRAY_SIZE: usize = 5000;

enum Lookup {
    /// One flat array, each interval owning a share of entries proportional
    /// to its size. Lookup is a single scaled index.
    Single(Vec<u32>),

    /// A fixed-size array per interval. Saves memory, but lookup has to
    /// locate the containing interval first.
    PerInterval(Vec<[u32; GRADIENT_SIZE]>),
}

/// An immutable table mapping a gradient position to a color.
///
/// Built once from gradient stops. Stops are normalized first: when the
/// first stop offset is not 0 or the last one is not 1, a boundary stop
/// replicating the edge color is synthesized. Out-of-range positions are
/// folded into 0..=1 by the gradient's [`SpreadMethod`] on every lookup.
///
/// When the gradient interpolates in
/// [`LinearRGB`](crate::ColorInterpolation::LinearRGB), all color-space
/// conversion happens here, at build time; lookups never convert.
pub struct ColorLut {
    lookup: Lookup,
    /// Stop offsets, with the synthesized boundary stops.
    offsets: Vec<f32>,
    /// Interval lengths, normalized so they sum to 1.
    intervals: Vec<f32>,
    spread_method: SpreadMethod,
    format: PixelFormat,
}

impl ColorLut {
    /// Builds a lookup table for the provided gradient stops.
    ///
    /// Returns [`Error::InvalidStops`] when there are fewer than two stops
    /// or when stop offsets are outside 0..=1 or are not non-decreasing.
    pub fn new(base: &BaseGradient) -> Result<ColorLut, Error> {
        if base.stops.len() < 2 {
            return Err(Error::InvalidStops);
        }

        let mut prev_offset = 0.0;
        for stop in &base.stops {
            // A NaN offset fails both checks.
            if !(stop.offset >= prev_offset && stop.offset <= 1.0) {
                return Err(Error::InvalidStops);
            }
            prev_offset = stop.offset;
        }

        // The economical pixel format is decided by the original stops.
        let all_opaque = base.stops.iter().all(|stop| stop.color.a == 0xFF);
        let format = if all_opaque { PixelFormat::Rgb } else { PixelFormat::Argb };

        // Pin the gradient to the 0..=1 range by replicating edge colors.
        let mut stops = Vec::with_capacity(base.stops.len() + 2);
        if base.stops[0].offset != 0.0 {
            stops.push(Stop::new(0.0, base.stops[0].color));
        }
        stops.extend_from_slice(&base.stops);
        if stops[stops.len() - 1].offset != 1.0 {
            let color = stops[stops.len() - 1].color;
            stops.push(Stop::new(1.0, color));
        }

        let offsets: Vec<f32> = stops.iter().map(|stop| stop.offset).collect();
        let mut intervals: Vec<f32> = offsets.windows(2).map(|w| w[1] - w[0]).collect();

        // The offsets span exactly 0..=1 now, so the intervals sum
        // telescopes to 1. Normalize anyway to absorb rounding drift.
        let sum: f32 = intervals.iter().sum();
        for v in &mut intervals {
            *v /= sum;
        }

        let mut colors: Vec<RGBA8> = stops.iter().map(|stop| stop.color).collect();
        if base.color_interpolation == ColorInterpolation::LinearRGB {
            for color in &mut colors {
                color.r = SRGB_TO_LINEAR_RGB_TABLE[color.r as usize];
                color.g = SRGB_TO_LINEAR_RGB_TABLE[color.g as usize];
                color.b = SRGB_TO_LINEAR_RGB_TABLE[color.b as usize];
            }
        }

        let mut smallest = 1.0;
        for &v in &intervals {
            if v < smallest {
                smallest = v;
            }
        }

        // Estimate the flat table size: the smallest interval gets 255
        // entries and every other interval gets a proportional share.
        let estimated = if smallest == 0.0 {
            f64::INFINITY
        } else {
            intervals
                .iter()
                .map(|&v| ((v / smallest) as f64 * 255.0))
                .sum()
        };

        let mut lookup = if estimated > MAX_SINGLE_ARRAY_SIZE as f64 {
            build_per_interval(&colors)
        } else {
            build_single(&colors, &intervals, smallest)
        };

        if base.color_interpolation == ColorInterpolation::LinearRGB {
            match lookup {
                Lookup::Single(ref mut table) => {
                    for entry in table.iter_mut() {
                        *entry = linear_rgb_entry_to_srgb(*entry);
                    }
                }
                Lookup::PerInterval(ref mut tables) => {
                    for table in tables.iter_mut() {
                        for entry in table.iter_mut() {
                            *entry = linear_rgb_entry_to_srgb(*entry);
                        }
                    }
                }
            }
        }

        Ok(ColorLut {
            lookup,
            offsets,
            intervals,
            spread_method: base.spread_method,
            format,
        })
    }

    /// Returns the pixel format implied by the gradient stops.
    ///
    /// [`PixelFormat::Rgb`] when every stop is fully opaque.
    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the color at an arbitrary gradient position.
    ///
    /// The position is folded into 0..=1 by the gradient's spread method
    /// first, so any value is acceptable.
    pub fn color_at(&self, pos: f32) -> RGBA8 {
        unpack(self.packed_at(pos))
    }

    pub(crate) fn packed_at(&self, pos: f32) -> u32 {
        let pos = self.fold(pos);

        match self.lookup {
            Lookup::Single(ref table) => table[(pos * (table.len() - 1) as f32) as usize],
            Lookup::PerInterval(ref tables) => {
                for i in 0..tables.len() {
                    if pos < self.offsets[i + 1] {
                        let delta = pos - self.offsets[i];
                        let index =
                            ((delta / self.intervals[i]) * (GRADIENT_SIZE - 1) as f32) as usize;
                        // The index can overshoot by one entry when the
                        // normalized interval is fractionally shorter than
                        // the offsets imply.
                        return tables[i][index.min(GRADIENT_SIZE - 1)];
                    }
                }

                tables[tables.len() - 1][GRADIENT_SIZE - 1]
            }
        }
    }

    /// Folds a position into the 0..=1 range.
    fn fold(&self, pos: f32) -> f32 {
        match self.spread_method {
            SpreadMethod::Pad => {
                // Note: NaN ends up as 0.
                if !(pos > 0.0) {
                    0.0
                } else if pos > 1.0 {
                    1.0
                } else {
                    pos
                }
            }
            SpreadMethod::Repeat => pos - pos.floor(),
            SpreadMethod::Reflect => {
                let pos = pos.abs();
                let part = pos.trunc();
                let frac = pos - part;
                if (part as i64) & 1 == 1 {
                    1.0 - frac
                } else {
                    frac
                }
            }
        }
    }

    pub(crate) fn spread_method(&self) -> SpreadMethod {
        self.spread_method
    }

    /// Returns the flat table when the single-array layout is in use.
    pub(crate) fn single_table(&self) -> Option<&[u32]> {
        match self.lookup {
            Lookup::Single(ref table) => Some(table),
            Lookup::PerInterval(_) => None,
        }
    }
}

impl std::fmt::Debug for ColorLut {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ColorLut {{ intervals: {} }}", self.intervals.len())
    }
}

fn build_single(colors: &[RGBA8], intervals: &[f32], smallest: f32) -> Lookup {
    let sizes: Vec<usize> = intervals
        .iter()
        .map(|&v| ((v / smallest) * 255.0) as usize)
        .collect();

    // The extra entry holds the exact last stop color, so a lookup at
    // position 1 is not a victim of interpolation rounding.
    let total: usize = sizes.iter().sum::<usize>() + 1;
    let mut table = vec![0; total];

    let mut offset = 0;
    for (i, &size) in sizes.iter().enumerate() {
        interpolate(colors[i], colors[i + 1], &mut table[offset..offset + size]);
        offset += size;
    }
    table[total - 1] = pack(colors[colors.len() - 1]);

    Lookup::Single(table)
}

fn build_per_interval(colors: &[RGBA8]) -> Lookup {
    let mut tables = Vec::with_capacity(colors.len() - 1);
    for i in 0..colors.len() - 1 {
        let mut table = [0; GRADIENT_SIZE];
        interpolate(colors[i], colors[i + 1], &mut table);
        tables.push(table);
    }

    Lookup::PerInterval(tables)
}

/// Fills `out` with colors interpolated from `c1` (inclusive) towards `c2`
/// (exclusive; the next interval starts with it).
fn interpolate(c1: RGBA8, c2: RGBA8, out: &mut [u32]) {
    if out.is_empty() {
        return;
    }

    let step = 1.0 / out.len() as f32;

    let a1 = c1.a as f32;
    let r1 = c1.r as f32;
    let g1 = c1.g as f32;
    let b1 = c1.b as f32;

    let da = c2.a as f32 - a1;
    let dr = c2.r as f32 - r1;
    let dg = c2.g as f32 - g1;
    let db = c2.b as f32 - b1;

    // 0.5 is added to prevent truncation round-off error.
    for (i, entry) in out.iter_mut().enumerate() {
        let t = i as f32 * step;
        *entry = ((a1 + da * t + 0.5) as u32) << 24
            | ((r1 + dr * t + 0.5) as u32) << 16
            | ((g1 + dg * t + 0.5) as u32) << 8
            | ((b1 + db * t + 0.5) as u32);
    }
}

#[inline]
fn pack(c: RGBA8) -> u32 {
    (c.a as u32) << 24 | (c.r as u32) << 16 | (c.g as u32) << 8 | c.b as u32
}

#[inline]
fn unpack(entry: u32) -> RGBA8 {
    RGBA8::new(
        (entry >> 16) as u8,
        (entry >> 8) as u8,
        entry as u8,
        (entry >> 24) as u8,
    )
}

/// Converts the RGB channels of a packed entry from linear RGB back into
/// sRGB, keeping alpha.
fn linear_rgb_entry_to_srgb(entry: u32) -> u32 {
    let r = LINEAR_RGB_TO_SRGB_TABLE[((entry >> 16) & 0xFF) as usize];
    let g = LINEAR_RGB_TO_SRGB_TABLE[((entry >> 8) & 0xFF) as usize];
    let b = LINEAR_RGB_TO_SRGB_TABLE[(entry & 0xFF) as usize];
    entry & 0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Precomputed sRGB to LinearRGB table.
///
/// Since we are storing the result in `u8`, there is no need to compute those
/// values each time. Mainly because it's very expensive.
///
/// ```text
/// if (C_srgb <= 0.04045)
///     C_lin = C_srgb / 12.92;
///  else
///     C_lin = pow((C_srgb + 0.055) / 1.055, 2.4);
/// ```
///
/// Thanks to librsvg for the idea.
const SRGB_TO_LINEAR_RGB_TABLE: &[u8; 256] = &[
    0,   0,   0,   0,   0,   0,  0,    1,   1,   1,   1,   1,   1,   1,   1,   1,
    1,   1,   2,   2,   2,   2,  2,    2,   2,   2,   3,   3,   3,   3,   3,   3,
    4,   4,   4,   4,   4,   5,  5,    5,   5,   6,   6,   6,   6,   7,   7,   7,
    8,   8,   8,   8,   9,   9,  9,   10,  10,  10,  11,  11,  12,  12,  12,  13,
    13,  13,  14,  14,  15,  15,  16,  16,  17,  17,  17,  18,  18,  19,  19,  20,
    20,  21,  22,  22,  23,  23,  24,  24,  25,  25,  26,  27,  27,  28,  29,  29,
    30,  30,  31,  32,  32,  33,  34,  35,  35,  36,  37,  37,  38,  39,  40,  41,
    41,  42,  43,  44,  45,  45,  46,  47,  48,  49,  50,  51,  51,  52,  53,  54,
    55,  56,  57,  58,  59,  60,  61,  62,  63,  64,  65,  66,  67,  68,  69,  70,
    71,  72,  73,  74,  76,  77,  78,  79,  80,  81,  82,  84,  85,  86,  87,  88,
    90,  91,  92,  93,  95,  96,  97,  99, 100, 101, 103, 104, 105, 107, 108, 109,
    111, 112, 114, 115, 116, 118, 119, 121, 122, 124, 125, 127, 128, 130, 131, 133,
    134, 136, 138, 139, 141, 142, 144, 146, 147, 149, 151, 152, 154, 156, 157, 159,
    161, 163, 164, 166, 168, 170, 171, 173, 175, 177, 179, 181, 183, 184, 186, 188,
    190, 192, 194, 196, 198, 200, 202, 204, 206, 208, 210, 212, 214, 216, 218, 220,
    222, 224, 226, 229, 231, 233, 235, 237, 239, 242, 244, 246, 248, 250, 253, 255,
];

/// Precomputed LinearRGB to sRGB table.
///
/// Since we are storing the result in `u8`, there is no need to compute those
/// values each time. Mainly because it's very expensive.
///
/// ```text
/// if (C_lin <= 0.0031308)
///     C_srgb = C_lin * 12.92;
/// else
///     C_srgb = 1.055 * pow(C_lin, 1.0 / 2.4) - 0.055;
/// ```
///
/// Thanks to librsvg for the idea.
const LINEAR_RGB_TO_SRGB_TABLE: &[u8; 256] = &[
    0,  13,  22,  28,  34,  38,  42,  46,  50,  53,  56,  59,  61,  64,  66,  69,
    71,  73,  75,  77,  79,  81,  83,  85,  86,  88,  90,  92,  93,  95,  96,  98,
    99, 101, 102, 104, 105, 106, 108, 109, 110, 112, 113, 114, 115, 117, 118, 119,
    120, 121, 122, 124, 125, 126, 127, 128, 129, 130, 131, 132, 133, 134, 135, 136,
    137, 138, 139, 140, 141, 142, 143, 144, 145, 146, 147, 148, 148, 149, 150, 151,
    152, 153, 154, 155, 155, 156, 157, 158, 159, 159, 160, 161, 162, 163, 163, 164,
    165, 166, 167, 167, 168, 169, 170, 170, 171, 172, 173, 173, 174, 175, 175, 176,
    177, 178, 178, 179, 180, 180, 181, 182, 182, 183, 184, 185, 185, 186, 187, 187,
    188, 189, 189, 190, 190, 191, 192, 192, 193, 194, 194, 195, 196, 196, 197, 197,
    198, 199, 199, 200, 200, 201, 202, 202, 203, 203, 204, 205, 205, 206, 206, 207,
    208, 208, 209, 209, 210, 210, 211, 212, 212, 213, 213, 214, 214, 215, 215, 216,
    216, 217, 218, 218, 219, 219, 220, 220, 221, 221, 222, 222, 223, 223, 224, 224,
    225, 226, 226, 227, 227, 228, 228, 229, 229, 230, 230, 231, 231, 232, 232, 233,
    233, 234, 234, 235, 235, 236, 236, 237, 237, 238, 238, 238, 239, 239, 240, 240,
    241, 241, 242, 242, 243, 243, 244, 244, 245, 245, 246, 246, 246, 247, 247, 248,
    248, 249, 249, 250, 250, 251, 251, 251, 252, 252, 253, 253, 254, 254, 255, 255,
];
