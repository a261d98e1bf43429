//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Header probe | `image::ImageReader::with_guessed_format` (magic bytes) + `into_dimensions` |
//! | Decode (GIF, PNG, JPEG, TIFF, BMP) | `image` crate (pure Rust decoders) |
//! | Resize | [`resample`](super::resample): `fast_image_resize` Lanczos3 or `imageops` Catmull-Rom |
//! | Flatten | [`composite`](super::composite) |
//! | Crop / rotate | `DynamicImage::crop_imm`, `rotate90` / `rotate180` / `rotate270` |
//! | Encode | [`encode`](super::encode) |
//!
//! The input side lives in [`Source`]: the file is opened once, its header
//! probed, then read in full (bounded) through a [`TeeReader`] so the
//! orientation task sees the same bytes without a second read.

use super::backend::{BackendError, ImageBackend};
use super::calculations::Dimensions;
use super::orientation::TeeReader;
use super::params::{EncodeOptions, Rotation};
use super::{composite, encode, resample};
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::sync::mpsc::Sender;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn crop(
        &self,
        image: &DynamicImage,
        x: u32,
        y: u32,
        size: Dimensions,
    ) -> Result<DynamicImage, BackendError> {
        let fits = size.width > 0
            && size.height > 0
            && x as u64 + size.width as u64 <= image.width() as u64
            && y as u64 + size.height as u64 <= image.height() as u64;
        if !fits {
            return Err(BackendError::ProcessingFailed(format!(
                "crop region {size} at ({x}, {y}) is outside a {}x{} image",
                image.width(),
                image.height()
            )));
        }
        Ok(image.crop_imm(x, y, size.width, size.height))
    }

    fn resize(&self, image: &DynamicImage, size: Dimensions) -> Result<DynamicImage, BackendError> {
        resample::resize(image, size)
    }

    fn flatten(&self, image: &DynamicImage) -> Result<DynamicImage, BackendError> {
        Ok(composite::flatten(image))
    }

    fn rotate(&self, image: &DynamicImage, rotation: Rotation) -> Result<DynamicImage, BackendError> {
        // image's rotate* helpers turn clockwise
        Ok(match rotation {
            Rotation::None => image.clone(),
            Rotation::Ccw90 => image.rotate270(),
            Rotation::Ccw180 => image.rotate180(),
            Rotation::Ccw270 => image.rotate90(),
        })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        path: &Path,
        options: &EncodeOptions,
    ) -> Result<(), BackendError> {
        encode::encode(image, path, options)
    }
}

/// An opened input file whose header has been probed.
///
/// Holds the file positioned at its start, ready for [`Source::decode`].
pub struct Source {
    reader: BufReader<File>,
    format: ImageFormat,
    size: Dimensions,
}

impl Source {
    /// Open `path` and read just enough to learn its container and size.
    ///
    /// The container is detected from content, not from the extension.
    pub fn open(path: &Path) -> Result<Self, BackendError> {
        let mut reader = BufReader::new(File::open(path)?);

        let probe = ImageReader::new(&mut reader).with_guessed_format()?;
        let format = probe.format().ok_or_else(|| {
            BackendError::ProcessingFailed("unrecognized image format".into())
        })?;
        let (width, height) = probe.into_dimensions().map_err(|e| {
            BackendError::ProcessingFailed(format!("failed to read header: {e}"))
        })?;

        reader.rewind()?;
        Ok(Self {
            reader,
            format,
            size: Dimensions::new(width, height),
        })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Native size from the header.
    pub fn size(&self) -> Dimensions {
        self.size
    }

    /// Containers whose orientation metadata the extractor understands.
    pub fn supports_orientation(&self) -> bool {
        self.format == ImageFormat::Jpeg
    }

    /// Containers that store indexed color.
    pub fn is_paletted(&self) -> bool {
        self.format == ImageFormat::Gif
    }

    /// Read the whole file (at most `max_bytes`) and decode it.
    ///
    /// Every chunk read is also sent to `tap` when one is given. The tap is
    /// dropped as soon as the read finishes, before the pixel decode starts.
    pub fn decode(
        self,
        max_bytes: u64,
        tap: Option<Sender<Vec<u8>>>,
    ) -> Result<DynamicImage, BackendError> {
        let bytes = read_bounded(TeeReader::new(self.reader, tap), max_bytes)?;

        ImageReader::with_format(Cursor::new(bytes), self.format)
            .decode()
            .map_err(|e| match e {
                ImageError::Limits(limit) => {
                    BackendError::LimitExceeded(format!("decoder limit: {limit}"))
                }
                other => BackendError::ProcessingFailed(format!("decode failed: {other}")),
            })
    }
}

/// Read `reader` to the end, failing once more than `max_bytes` arrive.
fn read_bounded<R: Read>(reader: R, max_bytes: u64) -> Result<Vec<u8>, BackendError> {
    let mut bytes = Vec::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut bytes)?;
    if bytes.len() as u64 > max_bytes {
        return Err(BackendError::LimitExceeded(format!(
            "input is larger than {max_bytes} bytes"
        )));
    }
    Ok(bytes)
}
