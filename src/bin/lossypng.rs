#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice
)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::Parser;
use image::{
    codecs::png::{CompressionType, FilterType, PngEncoder},
    DynamicImage,
};
use lossypng::{ColorConversion, Image, Optimizer, PalettedImage, PixelBuffer};
use palette::Srgba;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Lossy PNG optimizer.
///
/// Writes each optimized image next to its input, replacing the input's extension.
#[derive(Parser)]
#[command(version, about)]
struct Options {
    /// Convert images to 32-bit color.
    #[arg(short = 'c', long)]
    rgba: bool,

    /// Convert images to grayscale.
    #[arg(short, long)]
    grayscale: bool,

    /// Quantization threshold, zero is lossless.
    #[arg(short, long, default_value_t = Optimizer::DEFAULT_THRESHOLD.into_inner())]
    strength: u8,

    /// Filename extension of output files.
    #[arg(short, long, default_value = "-lossy.png")]
    extension: String,

    /// Log the time taken by each step.
    #[arg(short, long)]
    verbose: bool,

    /// Images to optimize.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

macro_rules! timed {
    ($name: literal, $val: expr) => {{
        let time = std::time::Instant::now();
        let value = $val;
        tracing::debug!("{} took {}ms", $name, time.elapsed().as_millis());
        value
    }};
}

fn main() -> anyhow::Result<()> {
    let Options { rgba, grayscale, strength, extension, verbose, inputs } = Options::parse();

    let default_filter = if verbose { "lossypng=debug" } else { "lossypng=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    // asking for both conversions is the same as asking for neither
    let conversion = match (rgba, grayscale) {
        (true, false) => ColorConversion::Rgba,
        (false, true) => ColorConversion::Grayscale,
        _ => ColorConversion::None,
    };

    let optimizer = Optimizer::new().conversion(conversion).threshold(strength);

    let mut failed = 0;
    for input in &inputs {
        match process(input, &optimizer, &extension) {
            Ok(info) => println!("{info}"),
            Err(err) => {
                tracing::error!("{err:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("failed to optimize {failed} of {} images", inputs.len());
    }

    Ok(())
}

/// Optimizes the image at `input` and returns a summary of the size change.
fn process(input: &Path, optimizer: &Optimizer, extension: &str) -> anyhow::Result<String> {
    let bytes = timed!("read image", fs::read(input))
        .with_context(|| format!("couldn't open {}", input.display()))?;

    let image = timed!("decode image", decode(&bytes))
        .with_context(|| format!("couldn't decode {}", input.display()))?;

    let optimized = timed!("optimization", optimizer.optimize(image));

    let encoded = timed!("encode image", encode(optimized))
        .with_context(|| format!("couldn't encode {}", input.display()))?;

    let output = path_with_suffix(input, extension);
    timed!("write image", fs::write(&output, &encoded))
        .with_context(|| format!("couldn't create {}", output.display()))?;

    Ok(compression_info(input, &output, bytes.len() as u64, encoded.len() as u64))
}

/// Decodes 8-bit indexed PNGs as [`Image::Paletted`] and anything else through `image`.
fn decode(bytes: &[u8]) -> anyhow::Result<Image> {
    if let Some(paletted) = decode_paletted(bytes)? {
        return Ok(Image::Paletted(paletted));
    }

    Ok(Image::from(image::load_from_memory(bytes)?))
}

/// The eight byte signature at the start of every PNG file.
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Returns `None` if `bytes` is not an 8-bit indexed PNG.
fn decode_paletted(bytes: &[u8]) -> anyhow::Result<Option<PalettedImage>> {
    if !bytes.starts_with(&PNG_SIGNATURE) {
        return Ok(None);
    }

    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info()?;

    if reader.output_color_type() != (png::ColorType::Indexed, png::BitDepth::Eight) {
        return Ok(None);
    }

    let info = reader.info();
    let (width, height) = (info.width, info.height);
    let trns = info.trns.as_deref().unwrap_or_default();
    let palette = info
        .palette
        .as_deref()
        .context("indexed PNG without a palette")?
        .chunks_exact(3)
        .enumerate()
        .map(|(i, rgb)| {
            let alpha = trns.get(i).copied().unwrap_or(u8::MAX);
            Srgba::new(rgb[0], rgb[1], rgb[2], alpha)
        })
        .collect::<Vec<_>>();

    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf)?;
    buf.truncate(frame.buffer_size());

    let indices = PixelBuffer::with_stride(width, height, 1, frame.line_size, buf)?;
    Ok(Some(PalettedImage::new(indices, palette)?))
}

/// Encodes `image` as a PNG, keeping paletted images indexed.
fn encode(image: Image) -> anyhow::Result<Vec<u8>> {
    let mut encoded = Vec::new();

    match image {
        Image::Paletted(paletted) => encode_paletted(&mut encoded, &paletted)?,
        image => {
            let encoder = PngEncoder::new_with_quality(
                &mut encoded,
                CompressionType::Best,
                FilterType::Adaptive,
            );
            DynamicImage::from(image).write_with_encoder(encoder)?;
        }
    }

    Ok(encoded)
}

/// Writes an 8-bit indexed PNG using the Paeth filter for every row.
fn encode_paletted(out: &mut Vec<u8>, image: &PalettedImage) -> anyhow::Result<()> {
    let (width, height) = image.dimensions();
    let palette = image.palette();

    let mut encoder = png::Encoder::new(out, width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Best);
    encoder.set_filter(png::FilterType::Paeth);
    encoder.set_adaptive_filter(png::AdaptiveFilterType::NonAdaptive);
    encoder.set_palette(
        palette
            .iter()
            .flat_map(|c| [c.red, c.green, c.blue])
            .collect::<Vec<_>>(),
    );

    if palette.iter().any(|c| c.alpha < u8::MAX) {
        encoder.set_trns(palette.iter().map(|c| c.alpha).collect::<Vec<_>>());
    }

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.indices().to_packed())?;
    writer.finish()?;

    Ok(())
}

fn compression_info(input: &Path, output: &Path, in_size: u64, out_size: u64) -> String {
    let percentage = (out_size * 100 + in_size / 2) / in_size.max(1);

    format!(
        "compressed {} ({}) to {} ({}, {percentage}%)",
        input.file_name().unwrap_or_default().to_string_lossy(),
        size_desc(in_size),
        output.file_name().unwrap_or_default().to_string_lossy(),
        size_desc(out_size),
    )
}

/// Replaces the last extension of `path` with `suffix`.
fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_stem().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Formats a byte count with at most four significant digits before a unit step.
fn size_desc(mut size: u64) -> String {
    const SUFFIXES: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];

    let mut i = 0;
    while i + 1 < SUFFIXES.len() && size >= 10000 {
        size = (size + 500) / 1000;
        i += 1;
    }

    format!("{size}{}", SUFFIXES[i])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_replace_last_extension() {
        for (path, suffix, expected) in [
            ("foo", "bar", "foobar"),
            ("foo.bar", "baz", "foobaz"),
            ("foo.bar.baz", "qux", "foo.barqux"),
            ("dir/image.png", "-lossy.png", "dir/image-lossy.png"),
        ] {
            assert_eq!(path_with_suffix(Path::new(path), suffix), PathBuf::from(expected));
        }
    }

    #[test]
    fn size_descriptions() {
        for (size, expected) in [
            (1, "1B"),
            (5, "5B"),
            (10, "10B"),
            (15, "15B"),
            (100, "100B"),
            (105, "105B"),
            (1000, "1000B"),
            (1005, "1005B"),
            (10000, "10kB"),
            (10005, "10kB"),
            (100000, "100kB"),
            (100005, "100kB"),
            (1000000, "1000kB"),
            (1000005, "1000kB"),
            (10000000, "10MB"),
            (10000005, "10MB"),
            (100000000, "100MB"),
            (100000005, "100MB"),
            (1000000000, "1000MB"),
            (1000000005, "1000MB"),
            (10000000000, "10GB"),
            (10000000005, "10GB"),
            (100000000000, "100GB"),
            (100000000005, "100GB"),
            (1000000000000, "1000GB"),
            (1000000000005, "1000GB"),
            (10000000000000, "10TB"),
            (10000000000005, "10TB"),
            (100000000000000, "100TB"),
        ] {
            assert_eq!(size_desc(size), expected, "size {size}");
        }
    }

    #[test]
    fn summary_line() {
        assert_eq!(
            compression_info(Path::new("dir/a.png"), Path::new("dir/a-lossy.png"), 20000, 5000),
            "compressed a.png (20kB) to a-lossy.png (5000B, 25%)"
        );

        assert_eq!(
            compression_info(Path::new("b.gif"), Path::new("b-lossy.png"), 3, 2),
            "compressed b.gif (3B) to b-lossy.png (2B, 67%)"
        );
    }

    #[test]
    fn paletted_png_stays_indexed() {
        let palette = vec![
            Srgba::new(0, 0, 0, 255),
            Srgba::new(200, 10, 10, 128),
            Srgba::new(255, 255, 255, 0),
        ];
        let indices = PixelBuffer::new(3, 2, 1, vec![0, 1, 2, 2, 1, 0]).unwrap();
        let paletted = PalettedImage::new(indices, palette).unwrap();

        let encoded = encode(Image::Paletted(paletted.clone())).unwrap();
        assert_eq!(decode(&encoded).unwrap(), Image::Paletted(paletted));
    }

    #[test]
    fn opaque_palette_has_no_transparency() {
        let palette = vec![Srgba::new(1, 2, 3, 255), Srgba::new(4, 5, 6, 255)];
        let indices = PixelBuffer::new(2, 1, 1, vec![1, 0]).unwrap();
        let paletted = PalettedImage::new(indices, palette).unwrap();

        let encoded = encode(Image::Paletted(paletted)).unwrap();
        let reader = png::Decoder::new(encoded.as_slice()).read_info().unwrap();
        assert!(reader.info().trns.is_none());
    }

    #[test]
    fn other_pngs_go_through_image() {
        let gray = PixelBuffer::new(2, 2, 1, vec![0, 64, 128, 255]).unwrap();
        let encoded = encode(Image::Gray(gray.clone())).unwrap();
        assert_eq!(decode(&encoded).unwrap(), Image::Gray(gray));

        assert!(decode(b"not an image").is_err());
    }
}
