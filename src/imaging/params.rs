//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`pipeline`](crate::pipeline) (which decides what
//! happens to an image) and the [`backend`](super::backend) (which does the
//! actual pixel work).
//!
//! ## Types
//!
//! - [`Quality`] — JPEG quality (1–100). Out-of-range requests fall back to a default.
//! - [`Rotation`] / [`OrientationDirective`] — correction derived from the EXIF orientation tag.
//! - [`OutputFormat`] — output container, chosen from the output path's extension.
//! - [`EncodeOptions`] — per-job encoder knobs (quality, palette size for GIF).

use std::path::Path;

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    /// Accept a requested quality only if it lies in 1..=100.
    pub fn new(value: i64) -> Option<Self> {
        (1..=100).contains(&value).then_some(Self(value as u8))
    }

    /// Requested quality, or `fallback` when the request is out of range.
    pub fn or_fallback(value: i64, fallback: Quality) -> Self {
        Self::new(value).unwrap_or(fallback)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Counter-clockwise rotation applied to the final buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Ccw90 => 90,
            Rotation::Ccw180 => 180,
            Rotation::Ccw270 => 270,
        }
    }
}

/// Rotation plus dimension-swap instruction derived from capture metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationDirective {
    pub rotation: Rotation,
    /// Target width/height must be exchanged before resolving.
    pub swap_dimensions: bool,
}

impl OrientationDirective {
    /// Map an EXIF `Orientation` value to a directive.
    ///
    /// Only the pure rotations are corrected; mirrored variants (2, 4, 5, 7),
    /// the identity (1) and unknown values yield `None`.
    pub fn from_exif_orientation(tag: u32) -> Option<Self> {
        match tag {
            3 => Some(Self {
                rotation: Rotation::Ccw180,
                swap_dimensions: false,
            }),
            6 => Some(Self {
                rotation: Rotation::Ccw270,
                swap_dimensions: true,
            }),
            8 => Some(Self {
                rotation: Rotation::Ccw90,
                swap_dimensions: true,
            }),
            _ => None,
        }
    }
}

/// Output container, selected solely by the output path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Gif,
    Png,
    Tiff,
    Bmp,
    Jpeg,
}

impl OutputFormat {
    /// Case-insensitive extension lookup; anything unrecognised is JPEG.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "gif" => OutputFormat::Gif,
            "png" => OutputFormat::Png,
            "tiff" | "tif" => OutputFormat::Tiff,
            "bmp" => OutputFormat::Bmp,
            _ => OutputFormat::Jpeg,
        }
    }

    /// Whether the container keeps full alpha losslessly, so flattening
    /// onto white is unnecessary.
    pub fn preserves_transparency(self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

/// Encoder options for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOptions {
    pub quality: Quality,
    /// Palette size of the source when it was already indexed (1–256).
    pub palette_size: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_accepts_valid_range() {
        assert_eq!(Quality::new(1).map(Quality::value), Some(1));
        assert_eq!(Quality::new(100).map(Quality::value), Some(100));
    }

    #[test]
    fn quality_out_of_range_falls_back() {
        let fallback = Quality::default();
        assert_eq!(Quality::or_fallback(0, fallback).value(), 75);
        assert_eq!(Quality::or_fallback(101, fallback).value(), 75);
        assert_eq!(Quality::or_fallback(-5, fallback).value(), 75);
        assert_eq!(Quality::or_fallback(90, fallback).value(), 90);
    }

    #[test]
    fn orientation_tag_mapping() {
        let three = OrientationDirective::from_exif_orientation(3).unwrap();
        assert_eq!(three.rotation, Rotation::Ccw180);
        assert!(!three.swap_dimensions);

        let six = OrientationDirective::from_exif_orientation(6).unwrap();
        assert_eq!(six.rotation.degrees(), 270);
        assert!(six.swap_dimensions);

        let eight = OrientationDirective::from_exif_orientation(8).unwrap();
        assert_eq!(eight.rotation.degrees(), 90);
        assert!(eight.swap_dimensions);
    }

    #[test]
    fn orientation_other_tags_yield_nothing() {
        for tag in [0, 1, 2, 4, 5, 7, 9, 255] {
            assert_eq!(OrientationDirective::from_exif_orientation(tag), None);
        }
    }

    #[test]
    fn output_format_by_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a.gif")), OutputFormat::Gif);
        assert_eq!(OutputFormat::from_path(Path::new("a.PNG")), OutputFormat::Png);
        assert_eq!(OutputFormat::from_path(Path::new("a.tif")), OutputFormat::Tiff);
        assert_eq!(OutputFormat::from_path(Path::new("a.TIFF")), OutputFormat::Tiff);
        assert_eq!(OutputFormat::from_path(Path::new("a.bmp")), OutputFormat::Bmp);
        assert_eq!(OutputFormat::from_path(Path::new("a.jpg")), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_path(Path::new("a.webp")), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_path(Path::new("noext")), OutputFormat::Jpeg);
    }

    #[test]
    fn only_png_preserves_transparency() {
        assert!(OutputFormat::Png.preserves_transparency());
        for format in [
            OutputFormat::Gif,
            OutputFormat::Tiff,
            OutputFormat::Bmp,
            OutputFormat::Jpeg,
        ] {
            assert!(!format.preserves_transparency());
        }
    }
}
