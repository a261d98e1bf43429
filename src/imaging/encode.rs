//! Output encoding, dispatched on the output path's extension.
//!
//! | Extension | Encoder | Options |
//! |---|---|---|
//! | `.gif` | `gif` + `color_quant` | source palette size if the source was indexed, else 256 colors |
//! | `.png` | `image::codecs::png` | best compression, adaptive filtering |
//! | `.tif`, `.tiff` | `tiff` | deflate, horizontal predictor |
//! | `.bmp` | `image::codecs::bmp` | uncompressed |
//! | anything else | `image::codecs::jpeg` | caller quality |
//!
//! Each encoder gets the buffer converted to a layout it accepts: JPEG has
//! no alpha, BMP and GIF are 8-bit only.

use super::backend::BackendError;
use super::params::{EncodeOptions, OutputFormat};
use color_quant::NeuQuant;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, RgbaImage};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tiff::encoder::{Compression, TiffEncoder, colortype};
use tiff::tags::Predictor;

/// Max palette entries in a GIF color table.
const GIF_MAX_COLORS: usize = 256;

/// NeuQuant sampling factor: 1 is slowest/best, 30 fastest.
const NEUQUANT_SAMPLE: i32 = 10;

/// Encode `image` to `path`, choosing the container from the extension.
///
/// The file is flushed and synced before returning; any failure along the
/// way is an error.
pub fn encode(image: &DynamicImage, path: &Path, options: &EncodeOptions) -> Result<(), BackendError> {
    let format = OutputFormat::from_path(path);
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Gif => encode_gif(image, &mut writer, options.palette_size)?,
        OutputFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut writer, CompressionType::Best, PngFilter::Adaptive);
            png_compatible(image)
                .write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {e}")))?;
        }
        OutputFormat::Tiff => encode_tiff(image, &mut writer)?,
        OutputFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            let img = bmp_compatible(image);
            encoder
                .encode(img.as_bytes(), img.width(), img.height(), img.color().into())
                .map_err(|e| BackendError::ProcessingFailed(format!("BMP encode failed: {e}")))?;
        }
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut writer, options.quality.value());
            jpeg_compatible(image)
                .write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))?;
        }
    }

    let file = writer.into_inner().map_err(|e| BackendError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

fn png_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            Cow::Owned(DynamicImage::ImageRgba16(image.to_rgba16()))
        }
        _ => Cow::Borrowed(image),
    }
}

fn jpeg_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => Cow::Borrowed(image),
        _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}

fn bmp_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
        _ if image.color().has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}

// ---------------------------------------------------------------------------
// TIFF: deflate + horizontal predictor
// ---------------------------------------------------------------------------

fn encode_tiff<W: Write + Seek>(image: &DynamicImage, writer: W) -> Result<(), BackendError> {
    let (w, h) = (image.width(), image.height());
    let mut encoder = TiffEncoder::new(writer)
        .map_err(tiff_error)?
        .with_compression(Compression::Deflate(Default::default()))
        .with_predictor(Predictor::Horizontal);

    let result = match image {
        DynamicImage::ImageLuma8(buf) => encoder.write_image::<colortype::Gray8>(w, h, buf.as_raw()),
        DynamicImage::ImageLuma16(buf) => encoder.write_image::<colortype::Gray16>(w, h, buf.as_raw()),
        DynamicImage::ImageRgb8(buf) => encoder.write_image::<colortype::RGB8>(w, h, buf.as_raw()),
        DynamicImage::ImageRgb16(buf) => encoder.write_image::<colortype::RGB16>(w, h, buf.as_raw()),
        DynamicImage::ImageRgba16(buf) => encoder.write_image::<colortype::RGBA16>(w, h, buf.as_raw()),
        other if other.color().has_alpha() => {
            encoder.write_image::<colortype::RGBA8>(w, h, other.to_rgba8().as_raw())
        }
        other => encoder.write_image::<colortype::RGB8>(w, h, other.to_rgb8().as_raw()),
    };
    result.map_err(tiff_error)
}

fn tiff_error(e: tiff::TiffError) -> BackendError {
    BackendError::ProcessingFailed(format!("TIFF encode failed: {e}"))
}

// ---------------------------------------------------------------------------
// GIF: palette quantization
// ---------------------------------------------------------------------------

/// An indexed frame ready for the GIF encoder.
struct Indexed {
    /// RGB triplets, one per palette entry.
    palette: Vec<u8>,
    indices: Vec<u8>,
    transparent: Option<u8>,
}

fn encode_gif<W: Write>(
    image: &DynamicImage,
    writer: W,
    palette_size: Option<usize>,
) -> Result<(), BackendError> {
    let too_large = |_| BackendError::ProcessingFailed("GIF dimensions exceed 65535".into());
    let width = u16::try_from(image.width()).map_err(too_large)?;
    let height = u16::try_from(image.height()).map_err(too_large)?;
    let colors = palette_size.unwrap_or(GIF_MAX_COLORS).clamp(1, GIF_MAX_COLORS);

    let indexed = quantize(&image.to_rgba8(), colors);

    // Color tables hold a power-of-two number of entries
    let entries = (indexed.palette.len() / 3).max(2).next_power_of_two();
    let mut palette = indexed.palette;
    palette.resize(entries * 3, 0);

    let gif_error = |e: gif::EncodingError| BackendError::ProcessingFailed(format!("GIF encode failed: {e}"));
    let mut encoder = gif::Encoder::new(writer, width, height, &palette).map_err(gif_error)?;
    let frame = gif::Frame::from_palette_pixels(width, height, indexed.indices, palette, indexed.transparent);
    encoder.write_frame(&frame).map_err(gif_error)
}

/// Reduce an RGBA buffer to at most `colors` palette entries.
///
/// GIF transparency is 1-bit: alpha below half becomes the transparent
/// entry, anything else is treated as opaque. Buffers that already fit in
/// the palette keep their exact colors; larger ones go through NeuQuant.
fn quantize(rgba: &RgbaImage, colors: usize) -> Indexed {
    let pixels: Vec<[u8; 4]> = rgba
        .pixels()
        .map(|p| {
            let [r, g, b, a] = p.0;
            if a < 128 { [0, 0, 0, 0] } else { [r, g, b, 255] }
        })
        .collect();

    if let Some(indexed) = exact_palette(&pixels, colors) {
        return indexed;
    }

    let flat: Vec<u8> = pixels.iter().flatten().copied().collect();
    let nq = NeuQuant::new(NEUQUANT_SAMPLE, colors, &flat);
    let indices: Vec<u8> = pixels.iter().map(|p| nq.index_of(p) as u8).collect();
    let transparent = pixels
        .iter()
        .any(|p| p[3] == 0)
        .then(|| nq.index_of(&[0, 0, 0, 0]) as u8);

    Indexed {
        palette: nq.color_map_rgb(),
        indices,
        transparent,
    }
}

fn exact_palette(pixels: &[[u8; 4]], colors: usize) -> Option<Indexed> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
    let mut palette = Vec::new();
    let mut transparent = None;
    let mut indices = Vec::with_capacity(pixels.len());

    for p in pixels {
        let index = match lookup.get(p) {
            Some(&i) => i,
            None => {
                if lookup.len() == colors {
                    return None;
                }
                let i = lookup.len() as u8;
                lookup.insert(*p, i);
                palette.extend_from_slice(&p[..3]);
                if p[3] == 0 {
                    transparent = Some(i);
                }
                i
            }
        };
        indices.push(index);
    }

    Some(Indexed {
        palette,
        indices,
        transparent,
    })
}

/// Number of distinct colors in an indexed source, capped at 256.
///
/// Decoders expand palettes to RGBA, so the palette size is recovered by
/// counting colors in the decoded frame.
pub fn palette_size_of(image: &DynamicImage) -> usize {
    let mut seen = std::collections::HashSet::new();
    for p in image.to_rgba8().pixels() {
        seen.insert(p.0);
        if seen.len() == GIF_MAX_COLORS {
            break;
        }
    }
    seen.len().max(1)
}
