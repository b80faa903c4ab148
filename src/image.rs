// image.rs — Interleaved 8-bit raster container.
//
// Filters operate on a flat `[u8]` holding `width * height * channels`
// samples, row-major, channels interleaved:
//
//   index:   0  1  2  3 | 4  5  6  7 | 8  9 10 11 | ...
//   sample:  R  G  B  A | R  G  B  A | R  G  B  A | ...
//   pixel:   (0,0)      | (1,0)      | (2,0)      | ...
//
// There is no row padding: the stride of row y is `width * channels`
// samples. GPU kernels receive exactly this layout (the Gaussian path packs
// each RGBA pixel into one u32, which is the same bytes reinterpreted).
//
// `ImageLayout` is the shape only; it validates caller-provided slices
// before any device work happens. `Image` owns a buffer of that shape and is
// what the CPU reference filters, the tests and the CLI pass around.

use std::fmt;

use crate::error::{GpuError, Result};

// ---------------------------------------------------------------------------
// ImageLayout
// ---------------------------------------------------------------------------

/// Dimensions of an interleaved image: width, height and samples per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageLayout {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl ImageLayout {
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        ImageLayout { width, height, channels }
    }

    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of samples (bytes) in a tightly packed buffer of this shape.
    pub fn sample_count(&self) -> usize {
        self.pixel_count() * self.channels as usize
    }

    /// True when there is nothing to filter.
    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    /// Flat index of channel `c` of pixel `(x, y)`.
    #[inline]
    pub fn index(&self, x: u32, y: u32, c: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels as usize + c as usize
    }

    /// Flat index with coordinates clamped into the image (clamp-to-edge).
    ///
    /// The image must not be empty.
    #[inline]
    pub fn index_clamped(&self, x: i64, y: i64, c: u32) -> usize {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.index(cx, cy, c)
    }

    /// Check that `len` matches this layout.
    pub fn validate(&self, len: usize) -> Result<()> {
        let expected = self.sample_count();
        if len != expected {
            return Err(GpuError::InvalidImageLength {
                width: self.width,
                height: self.height,
                channels: self.channels,
                expected,
                actual: len,
            });
        }
        Ok(())
    }
}

impl fmt::Display for ImageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// An owned interleaved 8-bit image.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    layout: ImageLayout,
    data: Vec<u8>,
}

impl Image {
    /// Zero-filled image.
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        let layout = ImageLayout::new(width, height, channels);
        Image { layout, data: vec![0; layout.sample_count()] }
    }

    /// Wrap an existing buffer.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height * channels`.
    pub fn from_vec(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Self {
        let layout = ImageLayout::new(width, height, channels);
        assert_eq!(
            data.len(),
            layout.sample_count(),
            "data length {} does not match {layout}",
            data.len()
        );
        Image { layout, data }
    }

    /// Like `from_vec`, but reports a length mismatch as an error.
    pub fn try_from_vec(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Result<Self> {
        let layout = ImageLayout::new(width, height, channels);
        layout.validate(data.len())?;
        Ok(Image { layout, data })
    }

    /// Build an image by evaluating `f(x, y, c)` for every sample.
    pub fn from_fn(
        width: u32,
        height: u32,
        channels: u32,
        mut f: impl FnMut(u32, u32, u32) -> u8,
    ) -> Self {
        let layout = ImageLayout::new(width, height, channels);
        let mut data = Vec::with_capacity(layout.sample_count());
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    data.push(f(x, y, c));
                }
            }
        }
        Image { layout, data }
    }

    // --- Accessors ---

    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn channels(&self) -> u32 {
        self.layout.channels
    }

    /// Sample `c` of pixel `(x, y)`.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32, c: u32) -> u8 {
        assert!(
            x < self.layout.width && y < self.layout.height && c < self.layout.channels,
            "sample ({x}, {y}, {c}) out of bounds for {}",
            self.layout
        );
        self.data[self.layout.index(x, y, c)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, c: u32, value: u8) {
        assert!(
            x < self.layout.width && y < self.layout.height && c < self.layout.channels,
            "sample ({x}, {y}, {c}) out of bounds for {}",
            self.layout
        );
        let i = self.layout.index(x, y, c);
        self.data[i] = value;
    }

    /// Sample with clamp-to-edge addressing for out-of-range coordinates.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64, c: u32) -> u8 {
        self.data[self.layout.index_clamped(x, y, c)]
    }

    /// All channels of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = self.layout.index(x, y, 0);
        &self.data[start..start + self.layout.channels as usize]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.layout)
    }
}
