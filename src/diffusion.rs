//! Contains the error diffusion buffer shared by the filter optimizers.

use crate::ColorDelta;

/// The number of columns the kernel reaches on either side of a pixel.
const CENTER: usize = 2;

/// The taps of the diffusion kernel as (rows back, column offset, weight).
///
/// This is a variant of Sierra dithering. The weights sum to `32`.
const KERNEL: [(usize, isize, i32); 10] = [
    (2, -1, 2),
    (2, 0, 3),
    (2, 1, 2),
    (1, -2, 2),
    (1, -1, 4),
    (1, 0, 5),
    (1, 1, 4),
    (1, 2, 2),
    (0, -2, 3),
    (0, -1, 5),
];

/// Holds the quantization error of the current row and the two rows above it.
///
/// Each row is padded with [`CENTER`] zeroed entries on both sides,
/// so the kernel never needs bounds checks at the image edges.
pub(crate) struct ErrorRows {
    /// The current row followed by the row above and the row above that.
    rows: [Vec<ColorDelta>; 3],
}

impl ErrorRows {
    /// Creates zeroed error rows for an image `width` pixels wide.
    pub(crate) fn new(width: usize) -> Self {
        let row = vec![ColorDelta::ZERO; width + 2 * CENTER];
        Self { rows: [row.clone(), row.clone(), row] }
    }

    /// Returns the error diffused onto the pixel in column `x` of the current row.
    ///
    /// Only the already visited entries of the current row (`x - 2` and `x - 1`) are read.
    pub(crate) fn diffuse(&self, x: usize) -> ColorDelta {
        let x = x + CENTER;
        let mut sum = ColorDelta::ZERO;
        for &(back, dx, weight) in &KERNEL {
            let err = self.rows[back][x.wrapping_add_signed(dx)];
            for (s, e) in sum.0.iter_mut().zip(err.0) {
                *s += weight * e;
            }
        }

        ColorDelta(sum.0.map(|s| (if s < 0 { s - 16 } else { s + 16 }) / 32))
    }

    /// Records the error of the pixel in column `x` of the current row.
    pub(crate) fn set(&mut self, x: usize, err: ColorDelta) {
        self.rows[0][x + CENTER] = err;
    }

    /// Shifts the rows down so that the current row becomes the row above.
    ///
    /// The oldest row is reused as the new current row. Its stale entries are
    /// overwritten before the kernel reads them and its padding is never written.
    pub(crate) fn next_row(&mut self) {
        self.rows.rotate_right(1);
    }
}
