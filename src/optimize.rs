//! Contains the top level entry point that picks an optimizer for each pixel layout.

use crate::{
    optimize_for_average_filter, optimize_for_paeth_filter, Image, PixelBuffer,
    QuantizationThreshold,
};
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// The pixel layout to convert an image to before optimizing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorConversion {
    /// Keep the decoded layout where possible.
    ///
    /// Alpha, gray, RGBA, and paletted images are optimized as is,
    /// 16-bit alpha and gray images are narrowed to 8 bits,
    /// and any other layout is converted to RGBA.
    #[default]
    None,
    /// Convert the image to 8-bit grayscale.
    Grayscale,
    /// Convert the image to 8-bit non-premultiplied RGBA.
    Rgba,
}

/// A builder struct to specify how to optimize images.
///
/// # Examples
/// ```
/// # use lossypng::{ColorConversion, Image, Optimizer, PixelBuffer};
/// # fn main() -> Result<(), lossypng::BufferError> {
/// let image = Image::Gray(PixelBuffer::new(4, 1, 1, vec![100, 103, 97, 255])?);
///
/// let optimized = Optimizer::new()
///     .threshold(8)
///     .conversion(ColorConversion::Rgba)
///     .optimize(image);
///
/// assert!(matches!(optimized, Image::Rgba(_)));
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Debug, Clone, Copy)]
pub struct Optimizer {
    /// The layout to convert images to.
    conversion: ColorConversion,
    /// The quantization step size.
    threshold: QuantizationThreshold,
}

impl Optimizer {
    /// The threshold used by [`Optimizer::new`].
    pub const DEFAULT_THRESHOLD: QuantizationThreshold = QuantizationThreshold::new(10);

    /// Creates a new [`Optimizer`] that keeps the decoded layout and uses
    /// [`Optimizer::DEFAULT_THRESHOLD`].
    pub const fn new() -> Self {
        Self {
            conversion: ColorConversion::None,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }

    /// Sets the pixel layout to convert images to.
    ///
    /// The default is [`ColorConversion::None`].
    pub fn conversion(mut self, conversion: ColorConversion) -> Self {
        self.conversion = conversion;
        self
    }

    /// Sets the quantization threshold. Zero keeps pixel values unchanged.
    pub fn threshold(mut self, threshold: impl Into<QuantizationThreshold>) -> Self {
        self.threshold = threshold.into();
        self
    }

    /// Optimizes `image`, converting it first if needed.
    ///
    /// Buffers that need no conversion are modified in place and returned.
    #[must_use]
    pub fn optimize(&self, image: Image) -> Image {
        let Self { conversion, threshold } = *self;

        tracing::debug!(
            layout = image.layout(),
            ?conversion,
            %threshold,
            "optimizing image"
        );

        match conversion {
            ColorConversion::Grayscale => Image::Gray(average(image.into_gray(), threshold)),
            ColorConversion::Rgba => Image::Rgba(average(image.into_rgba(), threshold)),
            ColorConversion::None => match image.into_narrowed() {
                Image::Alpha(buf) => Image::Alpha(average(buf, threshold)),
                Image::Gray(buf) => Image::Gray(average(buf, threshold)),
                Image::Rgba(buf) => Image::Rgba(average(buf, threshold)),
                Image::Paletted(mut paletted) => {
                    optimize_for_paeth_filter(&mut paletted.indices, threshold, &paletted.palette);
                    Image::Paletted(paletted)
                }
                image => {
                    tracing::debug!(layout = image.layout(), "converting to rgba");
                    Image::Rgba(average(image.into_rgba(), threshold))
                }
            },
        }
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "threads")]
impl Optimizer {
    /// Optimizes each image in parallel.
    ///
    /// Each image is still optimized on a single thread,
    /// since every row depends on the error diffused from the rows above it.
    #[must_use]
    pub fn optimize_par(&self, images: Vec<Image>) -> Vec<Image> {
        images.into_par_iter().map(|image| self.optimize(image)).collect()
    }
}

/// Runs the average filter optimizer on `pixels` and returns them.
fn average(mut pixels: PixelBuffer, threshold: QuantizationThreshold) -> PixelBuffer {
    optimize_for_average_filter(&mut pixels, threshold);
    pixels
}

/// Optimizes `image` with the given color conversion and quantization threshold.
///
/// This is shorthand for
/// `Optimizer::new().conversion(conversion).threshold(threshold).optimize(image)`.
///
/// # Examples
/// ```no_run
/// # use lossypng::{optimize, ColorConversion, Image};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let image = Image::from(image::open("some image")?);
/// let optimized = optimize(image, ColorConversion::None, 10.into());
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn optimize(
    image: Image,
    conversion: ColorConversion,
    threshold: QuantizationThreshold,
) -> Image {
    Optimizer { conversion, threshold }.optimize(image)
}
