//! Contains the pixel buffer types shared across the crate.

use crate::MAX_COLORS;
use palette::Srgba;
use std::{
    error::Error,
    fmt::{Debug, Display},
};

/// An error type for pixel buffers or palettes that do not describe a valid image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The number of bytes per pixel was not `1` or `4`.
    BadBytesPerPixel(usize),
    /// The stride is smaller than the number of bytes in a row of pixels.
    StrideTooSmall {
        /// The given stride.
        stride: usize,
        /// The number of bytes in a row of pixels.
        row_len: usize,
    },
    /// The pixel data does not cover every row of the image.
    TooShort {
        /// The minimum number of bytes needed.
        expected: usize,
        /// The number of bytes given.
        actual: usize,
    },
    /// The palette has more entries than a `u8` index can address.
    PaletteTooLarge(usize),
    /// A pixel refers to a palette entry that does not exist.
    IndexOutOfRange {
        /// The offending index.
        index: u8,
        /// The number of palette entries.
        palette_len: usize,
    },
}

impl Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            BufferError::BadBytesPerPixel(bpp) => {
                write!(f, "unsupported number of bytes per pixel: {bpp}")
            }
            BufferError::StrideTooSmall { stride, row_len } => {
                write!(f, "stride of {stride} is smaller than the row length of {row_len}")
            }
            BufferError::TooShort { expected, actual } => {
                write!(f, "expected at least {expected} bytes of pixel data, got {actual}")
            }
            BufferError::PaletteTooLarge(len) => {
                write!(f, "palette has {len} colors, above the maximum of {MAX_COLORS}")
            }
            BufferError::IndexOutOfRange { index, palette_len } => {
                write!(f, "index {index} is out of range for a palette of {palette_len} colors")
            }
        }
    }
}

impl Error for BufferError {}

/// The step size that pixel values are snapped to.
///
/// This is a simple new type wrapper around `u8`, since channel values never move
/// by more than `255`.
/// A threshold of `0` ([`QuantizationThreshold::LOSSLESS`]) leaves images unchanged,
/// while larger values trade more visible noise for smaller PNG files.
///
/// # Examples
/// ```
/// # use lossypng::QuantizationThreshold;
/// let threshold = QuantizationThreshold::from(10);
/// assert!(!threshold.is_lossless());
/// assert!(QuantizationThreshold::default().is_lossless());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct QuantizationThreshold(u8);

impl QuantizationThreshold {
    /// The threshold that disables quantization.
    pub const LOSSLESS: Self = Self(0);

    /// Creates a new [`QuantizationThreshold`].
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Gets the inner `u8` value.
    #[must_use]
    pub const fn into_inner(self) -> u8 {
        self.0
    }

    /// Returns whether this threshold leaves images unchanged.
    #[must_use]
    pub const fn is_lossless(self) -> bool {
        self.0 == 0
    }
}

impl From<u8> for QuantizationThreshold {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<QuantizationThreshold> for u8 {
    fn from(val: QuantizationThreshold) -> Self {
        val.into_inner()
    }
}

impl Display for QuantizationThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rectangular image stored as a flat slice of bytes.
///
/// Each pixel takes `bytes_per_pixel` bytes (`1` for gray, alpha or palette indices
/// and `4` for RGBA), and each row starts `stride` bytes after the previous one.
/// Any bytes between the end of a row and the start of the next one are padding
/// and are never read or written by the optimizers.
///
/// # Examples
/// ```
/// # use lossypng::{PixelBuffer, BufferError};
/// # fn main() -> Result<(), BufferError> {
/// let mut gray = PixelBuffer::new(2, 2, 1, vec![10, 20, 30, 40])?;
/// gray.set(1, 0, 0, 25);
/// assert_eq!(gray.get(1, 0, 0), 25);
///
/// // two bytes of padding after each row
/// let padded = PixelBuffer::with_stride(2, 2, 1, 4, vec![10, 20, 0, 0, 30, 40])?;
/// assert_eq!(padded.row(1), &[30, 40]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// The raw pixel bytes.
    data: Vec<u8>,
    /// The width of the image in pixels.
    width: u32,
    /// The height of the image in pixels.
    height: u32,
    /// The number of bytes from the start of one row to the start of the next.
    stride: usize,
    /// The number of bytes (channels) in each pixel.
    bytes_per_pixel: usize,
}

impl PixelBuffer {
    /// Creates a new tightly packed [`PixelBuffer`] (the stride is `width * bytes_per_pixel`).
    ///
    /// # Errors
    /// Returns an error if `bytes_per_pixel` is not `1` or `4`
    /// or if `data` is too short for the given dimensions.
    pub fn new(
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
        data: Vec<u8>,
    ) -> Result<Self, BufferError> {
        Self::with_stride(width, height, bytes_per_pixel, width as usize * bytes_per_pixel, data)
    }

    /// Creates a new [`PixelBuffer`] whose rows start `stride` bytes apart.
    ///
    /// The last row does not need to be padded.
    ///
    /// # Errors
    /// Returns an error if `bytes_per_pixel` is not `1` or `4`,
    /// if `stride` is smaller than a row of pixels,
    /// or if `data` is too short for the given dimensions.
    pub fn with_stride(
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self, BufferError> {
        if bytes_per_pixel != 1 && bytes_per_pixel != 4 {
            return Err(BufferError::BadBytesPerPixel(bytes_per_pixel));
        }

        let row_len = width as usize * bytes_per_pixel;
        if stride < row_len {
            return Err(BufferError::StrideTooSmall { stride, row_len });
        }

        let expected = match height as usize {
            0 => 0,
            h => stride * (h - 1) + row_len,
        };

        if data.len() < expected {
            return Err(BufferError::TooShort { expected, actual: data.len() });
        }

        Ok(Self { data, width, height, stride, bytes_per_pixel })
    }

    /// Creates a tightly packed [`PixelBuffer`] without validating its length.
    pub(crate) fn new_unchecked(
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
        data: Vec<u8>,
    ) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * bytes_per_pixel);
        let stride = width as usize * bytes_per_pixel;
        Self { data, width, height, stride, bytes_per_pixel }
    }

    /// Returns the width of the image in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the image in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns the width and height of the image.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns the number of bytes between the starts of two consecutive rows.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the number of bytes in each pixel.
    #[must_use]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// Returns the number of pixel bytes in a row, excluding padding.
    #[must_use]
    pub const fn row_len(&self) -> usize {
        self.width as usize * self.bytes_per_pixel
    }

    /// The offset of channel `c` of the pixel at (`x`, `y`).
    fn offset(&self, x: u32, y: u32, c: usize) -> usize {
        debug_assert!(x < self.width && y < self.height && c < self.bytes_per_pixel);
        y as usize * self.stride + x as usize * self.bytes_per_pixel + c
    }

    /// Returns channel `c` of the pixel at (`x`, `y`).
    ///
    /// # Panics
    /// Panics if the coordinates are outside of the image.
    #[must_use]
    pub fn get(&self, x: u32, y: u32, c: usize) -> u8 {
        self.data[self.offset(x, y, c)]
    }

    /// Sets channel `c` of the pixel at (`x`, `y`).
    ///
    /// # Panics
    /// Panics if the coordinates are outside of the image.
    pub fn set(&mut self, x: u32, y: u32, c: usize, value: u8) {
        let offset = self.offset(x, y, c);
        self.data[offset] = value;
    }

    /// Returns the pixel bytes of row `y`, excluding padding.
    ///
    /// # Panics
    /// Panics if `y` is not less than the height of the image.
    #[must_use]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..(start + self.row_len())]
    }

    /// Returns an iterator over the rows of the image, excluding padding.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.height).map(|y| self.row(y))
    }

    /// Returns the row above row `y` (if there is one) alongside a mutable row `y`.
    pub(crate) fn rows_mut(&mut self, y: usize) -> (Option<&[u8]>, &mut [u8]) {
        let row_len = self.row_len();
        let stride = self.stride;
        let (above, rest) = self.data.split_at_mut(y * stride);
        let up = y
            .checked_sub(1)
            .map(|prev| &above[(prev * stride)..(prev * stride + row_len)]);

        (up, &mut rest[..row_len])
    }

    /// Returns the raw bytes of the image, including any padding.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer and returns the raw bytes, including any padding.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Returns the pixel bytes with any row padding removed.
    #[must_use]
    pub fn to_packed(&self) -> Vec<u8> {
        if self.stride == self.row_len() {
            let len = self.row_len() * self.height as usize;
            self.data[..len].to_vec()
        } else {
            self.rows().flatten().copied().collect()
        }
    }
}

/// A palette-indexed image: one byte per pixel, each an index into `palette`.
///
/// # Examples
/// ```
/// # use lossypng::{PalettedImage, PixelBuffer};
/// # use palette::Srgba;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let palette = vec![Srgba::new(0, 0, 0, 255), Srgba::new(255, 255, 255, 255)];
/// let indices = PixelBuffer::new(2, 1, 1, vec![0, 1])?;
/// let image = PalettedImage::new(indices, palette)?;
/// assert_eq!(image.color(1, 0), Srgba::new(255, 255, 255, 255));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PalettedImage {
    /// The palette index of each pixel.
    pub(crate) indices: PixelBuffer,
    /// The colors that the indices refer to.
    pub(crate) palette: Vec<Srgba<u8>>,
}

impl PalettedImage {
    /// Creates a new [`PalettedImage`].
    ///
    /// # Errors
    /// Returns an error if `indices` does not have one byte per pixel,
    /// if `palette` has more than [`MAX_COLORS`] colors,
    /// or if any pixel refers to a color outside of `palette`.
    pub fn new(indices: PixelBuffer, palette: Vec<Srgba<u8>>) -> Result<Self, BufferError> {
        if indices.bytes_per_pixel() != 1 {
            return Err(BufferError::BadBytesPerPixel(indices.bytes_per_pixel()));
        }

        if palette.len() > usize::from(MAX_COLORS) {
            return Err(BufferError::PaletteTooLarge(palette.len()));
        }

        if let Some(&index) = indices
            .rows()
            .flatten()
            .find(|&&i| usize::from(i) >= palette.len())
        {
            return Err(BufferError::IndexOutOfRange { index, palette_len: palette.len() });
        }

        Ok(Self { indices, palette })
    }

    /// Returns the palette indices.
    #[must_use]
    pub fn indices(&self) -> &PixelBuffer {
        &self.indices
    }

    /// Returns the palette.
    #[must_use]
    pub fn palette(&self) -> &[Srgba<u8>] {
        &self.palette
    }

    /// Returns the width and height of the image.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.indices.dimensions()
    }

    /// Returns the color of the pixel at (`x`, `y`).
    ///
    /// # Panics
    /// Panics if the coordinates are outside of the image.
    #[must_use]
    pub fn color(&self, x: u32, y: u32) -> Srgba<u8> {
        self.palette[usize::from(self.indices.get(x, y, 0))]
    }

    /// Consumes the image and returns the indices and palette.
    #[must_use]
    pub fn into_parts(self) -> (PixelBuffer, Vec<Srgba<u8>>) {
        (self.indices, self.palette)
    }
}
