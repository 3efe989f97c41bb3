//! Contains the [`Image`] enum over the pixel layouts understood by the optimizers,
//! and the conversions between them.
//!
//! Conversions that need actual color math (luma weights, 16-bit narrowing)
//! are delegated to the [`image`] crate.

use crate::{PalettedImage, PixelBuffer};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, LumaA, Pixel, Rgb, RgbaImage};
use palette::cast;

/// A single channel image with 16-bit samples.
pub type Luma16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// A decoded image, tagged by its pixel layout.
///
/// The 8-bit variants hold a [`PixelBuffer`] with the noted number of bytes per pixel.
/// Use `From<DynamicImage>` to wrap an image decoded by the [`image`] crate.
///
/// # Examples
/// ```
/// # use lossypng::{Image, PixelBuffer};
/// # fn main() -> Result<(), lossypng::BufferError> {
/// let gray = Image::Gray(PixelBuffer::new(2, 1, 1, vec![0, 128])?);
/// let rgba = gray.into_rgba();
/// assert_eq!(rgba.row(0), &[0, 0, 0, 255, 128, 128, 128, 255]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Image {
    /// An alpha mask, one byte per pixel.
    Alpha(PixelBuffer),
    /// A grayscale image, one byte per pixel.
    Gray(PixelBuffer),
    /// A non-premultiplied RGBA image, four bytes per pixel.
    Rgba(PixelBuffer),
    /// A palette-indexed image.
    Paletted(PalettedImage),
    /// An alpha mask with 16-bit samples.
    Alpha16(Luma16Image),
    /// A grayscale image with 16-bit samples.
    Gray16(Luma16Image),
    /// Any other layout, e.g., RGB, gray with alpha, or 16-bit and floating point color.
    Other(DynamicImage),
}

impl Image {
    /// Returns the width and height of the image.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Image::Alpha(buf) | Image::Gray(buf) | Image::Rgba(buf) => buf.dimensions(),
            Image::Paletted(paletted) => paletted.dimensions(),
            Image::Alpha16(buf) | Image::Gray16(buf) => buf.dimensions(),
            Image::Other(image) => (image.width(), image.height()),
        }
    }

    /// A short name for the pixel layout.
    pub(crate) fn layout(&self) -> &'static str {
        match self {
            Image::Alpha(_) => "alpha",
            Image::Gray(_) => "gray",
            Image::Rgba(_) => "rgba",
            Image::Paletted(_) => "paletted",
            Image::Alpha16(_) => "alpha16",
            Image::Gray16(_) => "gray16",
            Image::Other(_) => "other",
        }
    }

    /// Converts 16-bit alpha and gray images to their 8-bit counterparts.
    ///
    /// Other layouts are returned as is.
    #[must_use]
    pub fn into_narrowed(self) -> Self {
        match self {
            Image::Alpha16(buf) => Image::Alpha(narrow(buf)),
            Image::Gray16(buf) => Image::Gray(narrow(buf)),
            image => image,
        }
    }

    /// Converts the image to a tightly packed, one byte per pixel grayscale buffer.
    ///
    /// Translucent colors are composited over black before taking their luma.
    /// Alpha masks are treated as white over black, so their values carry over unchanged.
    #[must_use]
    pub fn into_gray(self) -> PixelBuffer {
        match self {
            Image::Alpha(buf) | Image::Gray(buf) => buf,
            Image::Alpha16(buf) | Image::Gray16(buf) => narrow(buf),
            image => {
                let rgba = image.into_rgba();
                let (width, height) = rgba.dimensions();
                let rgb = rgba
                    .rows()
                    .flat_map(|row| row.chunks_exact(4))
                    .flat_map(|p| [p[0], p[1], p[2]].map(|c| premultiply(c, p[3])))
                    .collect();

                let rgb = image_buffer::<Rgb<u8>>(width, height, rgb);
                from_gray_image(DynamicImage::ImageRgb8(rgb).to_luma8())
            }
        }
    }

    /// Converts the image to a tightly packed, four bytes per pixel RGBA buffer.
    ///
    /// Alpha masks become white with the mask as alpha,
    /// except that fully transparent pixels become transparent black.
    #[must_use]
    pub fn into_rgba(self) -> PixelBuffer {
        match self.into_narrowed() {
            Image::Rgba(buf) => buf,
            Image::Gray(buf) => map_pixels(&buf, |g| [g, g, g, u8::MAX]),
            Image::Alpha(buf) => map_pixels(&buf, |a| match a {
                0 => [0; 4],
                a => [u8::MAX, u8::MAX, u8::MAX, a],
            }),
            Image::Paletted(paletted) => {
                let palette = paletted.palette();
                map_pixels(paletted.indices(), |i| cast::into_array(palette[usize::from(i)]))
            }
            image => from_rgba_image(DynamicImage::from(image).to_rgba8()),
        }
    }
}

/// Builds a new RGBA buffer by mapping each byte of a single channel buffer to a pixel.
fn map_pixels(buf: &PixelBuffer, f: impl Fn(u8) -> [u8; 4]) -> PixelBuffer {
    let (width, height) = buf.dimensions();
    let data = buf.rows().flatten().flat_map(|&v| f(v)).collect();
    PixelBuffer::new_unchecked(width, height, 4, data)
}

/// Scales `channel` by `alpha`, rounding to nearest.
#[allow(clippy::cast_possible_truncation)]
fn premultiply(channel: u8, alpha: u8) -> u8 {
    // at most 255 * 255 + 127, so the quotient fits in a u8
    ((u16::from(channel) * u16::from(alpha) + 127) / 255) as u8
}

/// Narrows a 16-bit image to 8 bits.
fn narrow(buf: Luma16Image) -> PixelBuffer {
    from_gray_image(DynamicImage::ImageLuma16(buf).to_luma8())
}

/// Wraps the samples of a [`GrayImage`] in a [`PixelBuffer`].
fn from_gray_image(image: GrayImage) -> PixelBuffer {
    let (width, height) = image.dimensions();
    PixelBuffer::new_unchecked(width, height, 1, image.into_raw())
}

/// Wraps the samples of an [`RgbaImage`] in a [`PixelBuffer`].
fn from_rgba_image(image: RgbaImage) -> PixelBuffer {
    let (width, height) = image.dimensions();
    PixelBuffer::new_unchecked(width, height, 4, image.into_raw())
}

/// Creates an [`ImageBuffer`] from exactly `width * height` pixels worth of samples.
fn image_buffer<P: Pixel>(
    width: u32,
    height: u32,
    samples: Vec<P::Subpixel>,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    #[allow(clippy::expect_used)]
    {
        // callers build samples from a buffer with the same dimensions,
        // so it will always be large enough
        ImageBuffer::from_raw(width, height, samples).expect("large enough buffer")
    }
}

impl From<DynamicImage> for Image {
    fn from(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Image::Gray(from_gray_image(gray)),
            DynamicImage::ImageRgba8(rgba) => Image::Rgba(from_rgba_image(rgba)),
            DynamicImage::ImageLuma16(gray) => Image::Gray16(gray),
            image => Image::Other(image),
        }
    }
}

impl From<Image> for DynamicImage {
    fn from(image: Image) -> Self {
        match image {
            Image::Gray(buf) => {
                let (width, height) = buf.dimensions();
                DynamicImage::ImageLuma8(image_buffer(width, height, buf.to_packed()))
            }
            Image::Alpha(buf) => {
                let (width, height) = buf.dimensions();
                let samples = buf.rows().flatten().flat_map(|&a| [u8::MAX, a]).collect();
                DynamicImage::ImageLumaA8(image_buffer::<LumaA<u8>>(width, height, samples))
            }
            Image::Rgba(buf) => {
                let (width, height) = buf.dimensions();
                DynamicImage::ImageRgba8(image_buffer(width, height, buf.to_packed()))
            }
            image @ Image::Paletted(_) => {
                let (width, height) = image.dimensions();
                let rgba = image.into_rgba();
                DynamicImage::ImageRgba8(image_buffer(width, height, rgba.into_raw()))
            }
            Image::Gray16(buf) => DynamicImage::ImageLuma16(buf),
            Image::Alpha16(buf) => {
                let (width, height) = buf.dimensions();
                let samples = buf.into_raw().into_iter().flat_map(|a| [u16::MAX, a]).collect();
                DynamicImage::ImageLumaA16(image_buffer::<LumaA<u16>>(width, height, samples))
            }
            Image::Other(image) => image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use palette::Srgba;

    fn gray16(data: Vec<u16>) -> Luma16Image {
        ImageBuffer::from_raw(2, 2, data).unwrap()
    }

    #[test]
    fn dynamic_image_layouts() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_raw(2, 1, vec![1, 2]).unwrap());
        assert_eq!(
            Image::from(gray),
            Image::Gray(PixelBuffer::new(2, 1, 1, vec![1, 2]).unwrap())
        );

        let rgba = RgbaImage::from_raw(1, 1, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(
            Image::from(DynamicImage::ImageRgba8(rgba)),
            Image::Rgba(PixelBuffer::new(1, 1, 4, vec![1, 2, 3, 4]).unwrap())
        );

        let wide = gray16(vec![0, 1, 2, 3]);
        assert_eq!(
            Image::from(DynamicImage::ImageLuma16(wide.clone())),
            Image::Gray16(wide)
        );

        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([9, 8, 7])));
        assert!(matches!(Image::from(rgb), Image::Other(_)));
    }

    #[test]
    fn narrowing_keeps_extremes() {
        let wide = gray16(vec![0, 0x8080, 0xffff, 0x0101]);

        let Image::Gray(gray) = Image::Gray16(wide.clone()).into_narrowed() else {
            panic!("expected gray");
        };
        assert_eq!(gray.as_raw(), &[0, 0x80, 0xff, 0x01]);

        let Image::Alpha(alpha) = Image::Alpha16(wide).into_narrowed() else {
            panic!("expected alpha");
        };
        assert_eq!(alpha.as_raw(), &[0, 0x80, 0xff, 0x01]);
    }

    #[test]
    fn rgba_conversions() {
        let alpha = Image::Alpha(PixelBuffer::new(2, 1, 1, vec![0, 77]).unwrap());
        assert_eq!(alpha.into_rgba().as_raw(), &[0, 0, 0, 0, 255, 255, 255, 77]);

        let indices = PixelBuffer::new(3, 1, 1, vec![1, 0, 1]).unwrap();
        let palette = vec![Srgba::new(1, 2, 3, 4), Srgba::new(5, 6, 7, 8)];
        let paletted = Image::Paletted(PalettedImage::new(indices, palette).unwrap());
        assert_eq!(
            paletted.into_rgba().as_raw(),
            &[5, 6, 7, 8, 1, 2, 3, 4, 5, 6, 7, 8]
        );

        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 2, Rgb([9, 8, 7])));
        assert_eq!(
            Image::Other(rgb).into_rgba().as_raw(),
            &[9, 8, 7, 255, 9, 8, 7, 255]
        );
    }

    #[test]
    fn gray_conversions() {
        let alpha = PixelBuffer::new(2, 1, 1, vec![3, 250]).unwrap();
        assert_eq!(Image::Alpha(alpha.clone()).into_gray(), alpha);

        let rgba = PixelBuffer::new(2, 1, 4, vec![0, 0, 0, 255, 255, 255, 255, 255]).unwrap();
        assert_eq!(Image::Rgba(rgba).into_gray().as_raw(), &[0, 255]);
    }

    #[test]
    fn translucent_colors_darken_in_gray() {
        let translucent = PixelBuffer::new(1, 1, 4, vec![255, 255, 255, 128]).unwrap();
        let opaque = PixelBuffer::new(1, 1, 4, vec![128, 128, 128, 255]).unwrap();
        assert_eq!(Image::Rgba(translucent).into_gray(), Image::Rgba(opaque).into_gray());

        let indices = PixelBuffer::new(2, 1, 1, vec![0, 1]).unwrap();
        let palette = vec![Srgba::new(255, 255, 255, 0), Srgba::new(0, 0, 0, 255)];
        let paletted = Image::Paletted(PalettedImage::new(indices, palette).unwrap());
        assert_eq!(paletted.into_gray().as_raw(), &[0, 0]);
    }

    #[test]
    fn premultiply_rounds() {
        assert_eq!(premultiply(255, 128), 128);
        assert_eq!(premultiply(255, 0), 0);
        assert_eq!(premultiply(255, 255), 255);
        assert_eq!(premultiply(1, 127), 0);
        assert_eq!(premultiply(1, 128), 1);
    }

    #[test]
    fn padded_buffers_convert_to_packed_images() {
        let padded = PixelBuffer::with_stride(2, 2, 1, 3, vec![1, 2, 99, 3, 4]).unwrap();

        let DynamicImage::ImageLuma8(gray) = DynamicImage::from(Image::Gray(padded.clone())) else {
            panic!("expected luma8");
        };
        assert_eq!(gray.into_raw(), vec![1, 2, 3, 4]);

        assert_eq!(
            Image::Gray(padded).into_rgba().as_raw(),
            &[1, 1, 1, 255, 2, 2, 2, 255, 3, 3, 3, 255, 4, 4, 4, 255]
        );
    }

    #[test]
    fn alpha_round_trips_through_luma_alpha() {
        let alpha = PixelBuffer::new(2, 1, 1, vec![0, 200]).unwrap();
        let DynamicImage::ImageLumaA8(image) = DynamicImage::from(Image::Alpha(alpha)) else {
            panic!("expected luma alpha");
        };
        assert_eq!(image.into_raw(), vec![255, 0, 255, 200]);
    }
}
