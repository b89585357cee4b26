// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::{Arc, Mutex, MutexGuard};

/// A produced raster pixel format.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PixelFormat {
    /// Packed `0xAARRGGBB` pixels.
    Argb,

    /// Packed `0x__RRGGBB` pixels.
    ///
    /// Used when every gradient stop is fully opaque. The alpha byte is
    /// still written as `0xFF`, but the consumer may ignore it and treat
    /// the buffer as 24-bit RGB.
    Rgb,
}

struct CachedRaster {
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u32>,
}

/// A reusable pixel-storage slot shared by gradient fills.
///
/// Holds at most one released buffer at a time. A fill acquires the buffer
/// when it covers the requested area and has the same pixel format,
/// otherwise a new one is allocated. Dropping a [`Raster`] returns its
/// buffer here.
///
/// The cache never grows beyond a single buffer. Call [`RasterCache::clear`]
/// to drop the retained buffer when memory is tight.
#[derive(Default)]
pub struct RasterCache {
    slot: Mutex<Option<CachedRaster>>,
}

impl std::fmt::Debug for RasterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "RasterCache {{ occupied: {} }}", self.lock().is_some())
    }
}

impl RasterCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        RasterCache {
            slot: Mutex::new(None),
        }
    }

    /// Drops the retained buffer, if any.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    // The slot content is a plain `Option`, so a poisoned lock is still
    // in a valid state and can be reclaimed.
    fn lock(&self) -> MutexGuard<Option<CachedRaster>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn take_if_covers(&self, format: PixelFormat, width: u32, height: u32) -> Option<CachedRaster> {
        let mut slot = self.lock();
        let covers = match *slot {
            Some(ref c) => c.format == format && c.width >= width && c.height >= height,
            None => false,
        };

        if covers {
            slot.take()
        } else {
            None
        }
    }

    fn release(&self, raster: CachedRaster) {
        let mut slot = self.lock();
        if let Some(ref existing) = *slot {
            let existing_area = existing.width as u64 * existing.height as u64;
            let offered_area = raster.width as u64 * raster.height as u64;
            if existing.format == raster.format && existing_area >= offered_area {
                return;
            }
        }

        *slot = Some(raster);
    }
}


/// A filled raster region.
///
/// Pixels are stored row-major, exactly `width * height` of them,
/// packed according to [`Raster::pixel_format`].
///
/// The pixel storage is borrowed from a [`RasterCache`] and is handed
/// back on drop.
pub struct Raster {
    cache: Arc<RasterCache>,
    format: PixelFormat,
    width: u32,
    height: u32,
    // Dimensions the underlying allocation was originally sized for.
    // They never shrink, so a reused buffer keeps serving large requests.
    alloc_width: u32,
    alloc_height: u32,
    data: Vec<u32>,
}

impl Raster {
    pub(crate) fn acquire(
        cache: &Arc<RasterCache>,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Raster {
        let n = width as usize * height as usize;
        match cache.take_if_covers(format, width, height) {
            Some(mut cached) => {
                cached.data.resize(n, 0);
                Raster {
                    cache: cache.clone(),
                    format,
                    width,
                    height,
                    alloc_width: cached.width,
                    alloc_height: cached.height,
                    data: cached.data,
                }
            }
            None => Raster {
                cache: cache.clone(),
                format,
                width,
                height,
                alloc_width: width,
                alloc_height: height,
                data: vec![0; n],
            },
        }
    }

    /// Returns the raster width. Matches the requested fill width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the raster height. Matches the requested fill height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the raster pixel format.
    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the packed pixels, row-major.
    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.data
    }

    #[inline]
    pub(crate) fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }
}

impl Drop for Raster {
    fn drop(&mut self) {
        self.cache.release(CachedRaster {
            format: self.format,
            width: self.alloc_width,
            height: self.alloc_height,
            data: std::mem::take(&mut self.data),
        });
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_released_buffer() {
        let cache = Arc::new(RasterCache::new());

        let raster = Raster::acquire(&cache, PixelFormat::Argb, 4, 4);
        let ptr = raster.pixels().as_ptr();
        drop(raster);

        let raster = Raster::acquire(&cache, PixelFormat::Argb, 4, 4);
        assert_eq!(raster.pixels().as_ptr(), ptr);
    }

    #[test]
    fn reuses_larger_buffer_for_smaller_request() {
        let cache = Arc::new(RasterCache::new());

        let raster = Raster::acquire(&cache, PixelFormat::Argb, 10, 10);
        let ptr = raster.pixels().as_ptr();
        drop(raster);

        let raster = Raster::acquire(&cache, PixelFormat::Argb, 3, 7);
        assert_eq!(raster.pixels().as_ptr(), ptr);
        assert_eq!(raster.pixels().len(), 21);
        drop(raster);

        // The allocation keeps its original dimensions.
        let raster = Raster::acquire(&cache, PixelFormat::Argb, 10, 10);
        assert_eq!(raster.pixels().as_ptr(), ptr);
    }

    #[test]
    fn allocates_fresh_for_larger_request() {
        let cache = Arc::new(RasterCache::new());

        let raster = Raster::acquire(&cache, PixelFormat::Argb, 2, 2);
        let ptr = raster.pixels().as_ptr();
        drop(raster);

        let raster = Raster::acquire(&cache, PixelFormat::Argb, 8, 8);
        assert_ne!(raster.pixels().as_ptr(), ptr);
    }

    #[test]
    fn allocates_fresh_for_other_format() {
        let cache = Arc::new(RasterCache::new());

        let raster = Raster::acquire(&cache, PixelFormat::Rgb, 4, 4);
        let ptr = raster.pixels().as_ptr();
        drop(raster);

        let raster = Raster::acquire(&cache, PixelFormat::Argb, 4, 4);
        assert_ne!(raster.pixels().as_ptr(), ptr);
    }

    #[test]
    fn release_keeps_larger_buffer() {
        let cache = Arc::new(RasterCache::new());

        let big = Raster::acquire(&cache, PixelFormat::Argb, 10, 10);
        let big_ptr = big.pixels().as_ptr();
        let small = Raster::acquire(&cache, PixelFormat::Argb, 2, 2);
        drop(big);
        drop(small); // discarded: the slot already holds a larger buffer

        let raster = Raster::acquire(&cache, PixelFormat::Argb, 8, 8);
        assert_eq!(raster.pixels().as_ptr(), big_ptr);
    }

    #[test]
    fn clear_drops_retained_buffer() {
        let cache = Arc::new(RasterCache::new());

        let mut raster = Raster::acquire(&cache, PixelFormat::Argb, 4, 4);
        raster.pixels_mut()[0] = 0xDEADBEEF;
        drop(raster);
        cache.clear();

        // A freshly allocated buffer is zeroed; a reused one would have
        // kept the sentinel.
        let raster = Raster::acquire(&cache, PixelFormat::Argb, 4, 4);
        assert_eq!(raster.pixels()[0], 0);
    }
}
