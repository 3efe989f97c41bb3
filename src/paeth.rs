//! Quantization of palette indices against the PNG "Paeth" filter.
//!
//! For each pixel, the index predicted by the Paeth filter is used whenever its color
//! is close enough to the original color (after accounting for diffused error).
//! Otherwise, the closest palette color is chosen. The color error (not the index
//! difference) is diffused to later pixels.

use crate::{
    color::{delta, Unpremultiplied},
    diffusion::ErrorRows,
    ColorDelta, PixelBuffer, QuantizationThreshold, MAX_PALETTE_LEN,
};
use palette::Srgba;

/// The PNG Paeth predictor.
///
/// Returns whichever of `left`, `up`, and `diagonal` (upper left) is closest to
/// `left + up - diagonal`, breaking ties in the order `left`, `up`, `diagonal`.
///
/// # Examples
/// ```
/// # use lossypng::paeth_predictor;
/// assert_eq!(paeth_predictor(1, 2, 3), 1);
/// assert_eq!(paeth_predictor(2, 4, 1), 4);
/// ```
#[must_use]
pub fn paeth_predictor(left: u8, up: u8, diagonal: u8) -> u8 {
    let (a, b, c) = (i16::from(left), i16::from(up), i16::from(diagonal));

    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        diagonal
    }
}

/// Quantizes palette indices in place for the PNG Paeth filter.
///
/// `indices` must have one byte per pixel. Only the first [`MAX_COLORS`](crate::MAX_COLORS)
/// palette entries are considered as replacements.
/// An empty palette, a threshold of `0`, or a buffer with more than one byte per pixel
/// leaves the indices unchanged.
///
/// # Panics
/// Panics if an index refers to a color outside of `palette`.
/// [`PalettedImage`](crate::PalettedImage) guarantees that this does not happen.
pub fn optimize_for_paeth_filter(
    indices: &mut PixelBuffer,
    threshold: QuantizationThreshold,
    palette: &[Srgba<u8>],
) {
    if palette.is_empty() || threshold.is_lossless() {
        return;
    }

    if indices.bytes_per_pixel() != 1 {
        tracing::warn!(
            bytes_per_pixel = indices.bytes_per_pixel(),
            "palette indices must have one byte per pixel"
        );
        return;
    }

    let width = indices.width() as usize;
    let height = indices.height() as usize;
    let max_magnitude = u64::from(threshold.into_inner()).pow(2);

    let colors = palette
        .iter()
        .take(MAX_PALETTE_LEN)
        .map(|&c| Unpremultiplied::from(c))
        .collect::<Vec<_>>();

    tracing::trace!(width, height, colors = colors.len(), "optimizing for the Paeth filter");

    let mut errors = ErrorRows::new(width);

    for y in 0..height {
        let (up_row, row) = indices.rows_mut(y);

        for x in 0..width {
            let diffusion = errors.diffuse(x);
            let here = colors[usize::from(row[x])];

            let left = if x > 0 { row[x - 1] } else { 0 };
            let (up, diagonal) = match up_row {
                Some(up_row) => (up_row[x], if x > 0 { up_row[x - 1] } else { 0 }),
                None => (0, 0),
            };

            let paeth = paeth_predictor(left, up, diagonal);
            let paeth_delta = delta(here, colors[usize::from(paeth)]);

            // the 16-bit squared distance is scaled down to be comparable with threshold^2
            let total = paeth_delta + diffusion;
            let (best, best_delta) = if (total.magnitude() >> 16) < max_magnitude {
                (paeth, paeth_delta)
            } else {
                nearest(here, &colors, diffusion)
            };

            row[x] = best;
            errors.set(x, best_delta);
        }

        errors.next_row();
    }
}

/// Finds the palette color that, combined with `diffusion`, is closest to `here`.
///
/// Ties are resolved in favor of the lowest index.
#[allow(clippy::cast_possible_truncation)]
fn nearest(
    here: Unpremultiplied,
    colors: &[Unpremultiplied],
    diffusion: ColorDelta,
) -> (u8, ColorDelta) {
    let mut best = 0;
    let mut best_delta = delta(here, colors[0]);
    let mut best_magnitude = (best_delta + diffusion).magnitude();

    for (i, &candidate) in colors.iter().enumerate().skip(1) {
        let delta = delta(here, candidate);
        let magnitude = (delta + diffusion).magnitude();
        if magnitude < best_magnitude {
            best = i;
            best_delta = delta;
            best_magnitude = magnitude;
        }
    }

    // colors has at most MAX_PALETTE_LEN entries
    (best as u8, best_delta)
}
