//! Quantization against the PNG "average" filter.
//!
//! The average filter predicts each byte as the floored mean of the same channel
//! in the pixel to the left and the pixel above. Snapping the difference from that
//! prediction to a multiple of the quantization threshold leaves the encoder with
//! only a few distinct residuals, which deflate compresses much better.
//! The rounding error is carried to later pixels through [`ErrorRows`].

use crate::{diffusion::ErrorRows, ColorDelta, PixelBuffer, QuantizationThreshold};

/// Quantizes a gray, alpha, or RGBA buffer in place for the PNG average filter.
///
/// Channel values of exactly `0` or `255` are never changed,
/// and a channel is left as is if its quantized value would fall outside `0..=255`.
/// A threshold of `0` leaves the buffer unchanged.
///
/// # Examples
/// ```
/// # use lossypng::{optimize_for_average_filter, PixelBuffer};
/// # fn main() -> Result<(), lossypng::BufferError> {
/// let mut gray = PixelBuffer::new(4, 1, 1, vec![100, 103, 97, 255])?;
/// optimize_for_average_filter(&mut gray, 8.into());
/// assert_eq!(gray.row(0), &[104, 100, 98, 255]);
/// # Ok(())
/// # }
/// ```
pub fn optimize_for_average_filter(pixels: &mut PixelBuffer, threshold: QuantizationThreshold) {
    if threshold.is_lossless() {
        return;
    }

    let step = i32::from(threshold.into_inner());
    let half_step = step / 2;
    let width = pixels.width() as usize;
    let height = pixels.height() as usize;
    let bpp = pixels.bytes_per_pixel();

    tracing::trace!(width, height, bpp, step, "optimizing for the average filter");

    let mut errors = ErrorRows::new(width);

    for y in 0..height {
        let (up_row, row) = pixels.rows_mut(y);

        for x in 0..width {
            let diffusion = errors.diffuse(x);
            let mut residual = ColorDelta::ZERO;

            for c in 0..bpp {
                let i = x * bpp + c;
                let here = i32::from(row[i]);
                if here == 0 || here == 255 {
                    continue;
                }

                let up = up_row.map_or(0, |up_row| i32::from(up_row[i]));
                let left = if x > 0 { i32::from(row[i - bpp]) } else { 0 };
                let average = (up + left) / 2;

                let mut value = diffusion[c] + here - average + half_step;
                value -= value % step;
                value += average;

                if let Ok(quantized) = u8::try_from(value) {
                    row[i] = quantized;
                    residual[c] = here - value;
                }
            }

            errors.set(x, residual);
        }

        errors.next_row();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    fn gray(width: u32, height: u32, data: &[u8]) -> PixelBuffer {
        PixelBuffer::new(width, height, 1, data.to_vec()).unwrap()
    }

    #[test]
    fn lossless_is_identity() {
        let original = noisy_gradient(37, 23, 4, 1);
        let mut pixels = original.clone();
        optimize_for_average_filter(&mut pixels, QuantizationThreshold::LOSSLESS);
        assert_eq!(pixels, original);
    }

    #[test]
    fn empty_image() {
        let mut pixels = PixelBuffer::new(0, 0, 4, Vec::new()).unwrap();
        optimize_for_average_filter(&mut pixels, 8.into());
        assert_eq!(pixels.as_raw(), &[] as &[u8]);

        let mut pixels = PixelBuffer::new(0, 3, 1, Vec::new()).unwrap();
        optimize_for_average_filter(&mut pixels, 8.into());
        assert_eq!(pixels.height(), 3);
    }

    #[test]
    fn known_gray_output() {
        #[rustfmt::skip]
        let mut pixels = gray(4, 3, &[
            100, 103, 97, 120,
            90, 140, 141, 60,
            12, 200, 254, 255,
        ]);

        optimize_for_average_filter(&mut pixels, 8.into());

        #[rustfmt::skip]
        let expected = [
            104, 100, 98, 121,
            92, 136, 141, 67,
            22, 199, 250, 255,
        ];

        assert_eq!(pixels.as_raw(), &expected);
    }

    #[test]
    fn known_rgba_output() {
        #[rustfmt::skip]
        let data = [
            10, 20, 30, 255, 128, 64, 32, 200, 250, 5, 77, 0,
            40, 50, 60, 255, 99, 99, 99, 99, 1, 2, 3, 4,
        ];
        let mut pixels = PixelBuffer::new(3, 2, 4, data.to_vec()).unwrap();

        optimize_for_average_filter(&mut pixels, 16.into());

        #[rustfmt::skip]
        let expected = [
            16, 16, 32, 255, 120, 72, 32, 207, 252, 20, 80, 0,
            40, 56, 64, 255, 96, 96, 96, 119, 14, 10, 24, 11,
        ];

        assert_eq!(pixels.as_raw(), &expected);
    }

    #[test]
    fn single_pixel_rounds_to_threshold() {
        // no neighbors and no diffused error
        let mut pixels = gray(1, 1, &[77]);
        optimize_for_average_filter(&mut pixels, 10.into());
        // (77 + 5) - (82 % 10) = 80
        assert_eq!(pixels.get(0, 0, 0), 80);
    }

    #[test]
    fn extremes_are_preserved() {
        let mut original = noisy_gradient(31, 17, 4, 7);
        let (width, height) = original.dimensions();
        for y in 0..height {
            for x in 0..width {
                if (x + y) % 5 == 0 {
                    original.set(x, y, (x % 4) as usize, 0);
                } else if (x * y) % 7 == 3 {
                    original.set(x, y, (y % 4) as usize, 255);
                }
            }
        }

        for threshold in [1, 2, 5, 8, 16, 37, 64, 255] {
            let mut pixels = original.clone();
            optimize_for_average_filter(&mut pixels, QuantizationThreshold::new(threshold));

            for (a, b) in original.as_raw().iter().zip(pixels.as_raw()) {
                if *a == 0 || *a == 255 {
                    assert_eq!(a, b);
                }
            }
        }
    }

    #[test]
    fn padding_is_untouched() {
        let packed = noisy_gradient(9, 6, 1, 3);
        let stride = 13;

        let mut data = vec![0xAA; stride * 6];
        for (y, row) in packed.rows().enumerate() {
            data[(y * stride)..(y * stride + 9)].copy_from_slice(row);
        }

        let mut padded = PixelBuffer::with_stride(9, 6, 1, stride, data).unwrap();
        let mut packed = packed;

        optimize_for_average_filter(&mut padded, 12.into());
        optimize_for_average_filter(&mut packed, 12.into());

        assert_eq!(padded.to_packed(), packed.into_raw());
        for y in 0..6 {
            let padding = &padded.as_raw()[(y * stride + 9)..((y + 1) * stride)];
            assert!(padding.iter().all(|&b| b == 0xAA));
        }
    }

    #[test]
    fn not_idempotent() {
        // Diffusion state starts from zero on every call, so optimizing the output again
        // can move pixels whose quantized difference was negative.
        #[rustfmt::skip]
        let mut pixels = gray(4, 3, &[
            100, 103, 97, 120,
            90, 140, 141, 60,
            12, 200, 254, 255,
        ]);

        optimize_for_average_filter(&mut pixels, 8.into());
        let once = pixels.clone();
        optimize_for_average_filter(&mut pixels, 8.into());

        assert_ne!(pixels, once);

        #[rustfmt::skip]
        let expected = [
            104, 100, 98, 121,
            92, 136, 141, 75,
            30, 195, 248, 255,
        ];

        assert_eq!(pixels.as_raw(), &expected);
    }
}
