//! Contains the perceptual color distance used to compare palette entries.

use palette::Srgba;
use std::ops::{Add, AddAssign, Index, IndexMut, Neg};

/// The number of components in a [`ColorDelta`].
pub const DELTA_COMPONENTS: usize = 4;

/// The maximum value of a color channel once expanded to 16 bits.
const FULL: u32 = 0xffff;

/// [`FULL`] as a signed value for the weighted components.
#[allow(clippy::cast_possible_wrap)]
const FULL_SIGNED: i32 = FULL as i32;

/// A signed difference between two colors, or an accumulated diffusion error.
///
/// The first three components are weighted red, green, and blue differences
/// (or the raw channel residuals for the average filter optimizer),
/// and the last component is the alpha difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorDelta(pub [i32; DELTA_COMPONENTS]);

impl ColorDelta {
    /// A delta of zero in every component.
    pub const ZERO: Self = Self([0; DELTA_COMPONENTS]);

    /// Returns the squared euclidean length of the delta.
    #[must_use]
    pub fn magnitude(&self) -> u64 {
        self.0
            .iter()
            .map(|&d| i64::from(d).unsigned_abs().pow(2))
            .sum()
    }
}

impl Add for ColorDelta {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for ColorDelta {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

impl Neg for ColorDelta {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0.map(Neg::neg))
    }
}

impl Index<usize> for ColorDelta {
    type Output = i32;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for ColorDelta {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

/// A color with 16-bit channels and red, green, and blue divided by alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unpremultiplied {
    /// Red, green, and blue, `0` if the color is fully transparent.
    rgb: [i32; 3],
    /// The 16-bit alpha channel.
    alpha: i32,
}

impl From<Srgba<u8>> for Unpremultiplied {
    #[allow(clippy::cast_possible_wrap)]
    fn from(color: Srgba<u8>) -> Self {
        let (red, green, blue, alpha) = color.into_components();

        // widen to 16 bits and premultiply the same way an 8-bit RGBA color reports 16-bit channels
        let alpha8 = u32::from(alpha);
        let alpha = alpha8 * 0x101;
        let rgb = [red, green, blue].map(|c| {
            let premultiplied = u32::from(c) * 0x101 * alpha8 / 0xff;
            if alpha > 0 {
                (premultiplied * FULL / alpha) as i32
            } else {
                0
            }
        });

        Self { rgb, alpha: alpha as i32 }
    }
}

/// Computes the weighted difference between two expanded colors.
pub(crate) fn delta(a: Unpremultiplied, b: Unpremultiplied) -> ColorDelta {
    let [dr, dg, db] = [0, 1, 2].map(|i| a.rgb[i] - b.rgb[i]);

    // redmean, see https://www.compuphase.com/cmetric.htm
    let red_mean = (a.rgb[0] + b.rgb[0]) / 2;

    // The red and blue products overflow 32 bits for large differences and wrap.
    // Palette choices are tuned to these wrapped values, so they are kept as is.
    ColorDelta([
        (2 * FULL_SIGNED + red_mean).wrapping_mul(dr) / (3 * FULL_SIGNED),
        4 * dg / 3,
        (3 * FULL_SIGNED - red_mean).wrapping_mul(db) / (3 * FULL_SIGNED),
        a.alpha - b.alpha,
    ])
}

/// Computes a perceptual difference between two colors.
///
/// Red, green, and blue are compared after dividing out alpha and are weighted by the
/// "redmean" approximation, while the last component is the raw 16-bit alpha difference.
/// The red and blue weighting is done in wrapping 32-bit arithmetic,
/// so large red or blue differences come out much smaller than the true weighted value.
///
/// The result is antisymmetric: `color_distance(a, b) == -color_distance(b, a)`.
///
/// # Examples
/// ```
/// # use lossypng::{color_distance, ColorDelta};
/// # use palette::Srgba;
/// let white = Srgba::new(255, 255, 255, 255);
/// let black = Srgba::new(0, 0, 0, 255);
/// assert_eq!(color_distance(white, white), ColorDelta::ZERO);
/// assert_eq!(color_distance(white, black), -color_distance(black, white));
/// ```
#[must_use]
pub fn color_distance(a: Srgba<u8>, b: Srgba<u8>) -> ColorDelta {
    delta(a.into(), b.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn known_distances() {
        let white = Srgba::new(255, 255, 255, 255);
        let black = Srgba::new(0, 0, 0, 255);
        let orange = Srgba::new(0xff, 0x66, 0x00, 0xff);
        let clear_white = Srgba::new(255, 255, 255, 0);

        assert_eq!(color_distance(white, black), ColorDelta([10920, 87380, 10921, 0]));
        assert_eq!(color_distance(black, white), ColorDelta([-10920, -87380, -10921, 0]));
        assert_eq!(color_distance(white, orange), ColorDelta([0, 52428, -1, 0]));
        assert_eq!(
            color_distance(white, clear_white),
            ColorDelta([10920, 87380, 10921, 65535])
        );
    }

    #[test]
    fn large_red_and_blue_differences_wrap() {
        let white = Srgba::new(255, 255, 255, 255);
        let half_red = Srgba::new(255, 0, 0, 128);
        let black = Srgba::new(0, 0, 0, 255);

        // unwrapped, the blue component would be 43690
        assert_eq!(color_distance(white, half_red), ColorDelta([0, 87380, -1, 32639]));
        // unwrapped, the red component would be 54612
        assert_eq!(color_distance(black, half_red), ColorDelta([-10920, 0, 0, 32639]));
    }

    #[test]
    fn transparent_colors_ignore_rgb() {
        let a = Srgba::new(10, 20, 30, 0);
        let b = Srgba::new(200, 100, 50, 0);
        assert_eq!(color_distance(a, b), ColorDelta::ZERO);
    }

    #[test]
    fn identical_colors_have_zero_distance() {
        for color in test_palette_256() {
            assert_eq!(color_distance(color, color), ColorDelta::ZERO);
        }
    }

    #[test]
    fn distance_is_antisymmetric() {
        let colors = test_palette_256();
        for (&a, &b) in colors.iter().zip(colors.iter().rev()) {
            let ab = color_distance(a, b);
            let ba = color_distance(b, a);
            assert_eq!(ab, -ba);
            assert_eq!(ab.magnitude(), ba.magnitude());
        }
    }

    #[test]
    fn delta_arithmetic() {
        let a = ColorDelta([1, -2, 3, -4]);
        let b = ColorDelta([10, 20, -30, 40]);
        assert_eq!(a + b, ColorDelta([11, 18, -27, 36]));
        assert_eq!(-a, ColorDelta([-1, 2, -3, 4]));
        assert_eq!(a.magnitude(), 30);
        assert_eq!(ColorDelta::ZERO.magnitude(), 0);
    }
}
