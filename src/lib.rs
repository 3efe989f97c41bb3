//! A library for lossy PNG optimization.
//!
//! `lossypng` nudges pixel values so that the filters of a PNG encoder leave behind
//! fewer distinct residuals, which deflate then compresses into a much smaller file.
//! Every change is bounded by a quantization threshold, and the rounding error is
//! diffused to neighboring pixels so that the image keeps its overall tone.
//!
//! Two optimizers are provided:
//! - [`optimize_for_average_filter`] for gray, alpha, and RGBA buffers,
//!   quantizing against the PNG "average" filter.
//! - [`optimize_for_paeth_filter`] for palette-indexed buffers,
//!   choosing indices that the PNG "Paeth" filter predicts well
//!   while staying close in color (see [`color_distance`]).
//!
//! # Features
//! - `threads`: exposes [`Optimizer::optimize_par`] to optimize many images in parallel
//!   via [`rayon`].
//! - `cli`: builds the `lossypng` command line tool.
//!
//! # High-Level API
//! Wrap a decoded image in an [`Image`] and pass it to [`optimize`] or an [`Optimizer`]:
//! ```no_run
//! # use lossypng::{ColorConversion, Image, Optimizer};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = Image::from(image::open("some image")?);
//!
//! let optimized = Optimizer::new()
//!     .threshold(10) // snap pixel values to steps of 10
//!     .conversion(ColorConversion::Rgba) // always produce 32-bit color
//!     .optimize(image);
//!
//! image::DynamicImage::from(optimized).save("some image-lossy.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! The optimizers never encode anything themselves. Encode the result with any PNG
//! encoder; the savings are largest when it is allowed to pick the average or Paeth filter.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod average;
mod color;
mod diffusion;
mod layout;
mod optimize;
mod paeth;
mod types;

pub use average::optimize_for_average_filter;
pub use color::{color_distance, ColorDelta, DELTA_COMPONENTS};
pub use layout::{Image, Luma16Image};
pub use optimize::{optimize, ColorConversion, Optimizer};
pub use paeth::{optimize_for_paeth_filter, paeth_predictor};
pub use types::*;

/// The maximum supported number of palette colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;

/// `MAX_COLORS` as a `usize` for array and `Vec` lengths.
pub(crate) const MAX_PALETTE_LEN: usize = MAX_COLORS as usize;
