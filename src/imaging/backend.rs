//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers every stage that produces a new pixel
//! buffer or writes one out: crop, resize, flatten, rotate, and encode. The
//! pipeline decides *whether* each stage runs; the backend decides *how*.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! recording `MockBackend` below to assert which stages ran.

use super::calculations::Dimensions;
use super::params::{EncodeOptions, Rotation};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
}

/// Trait for image processing backends.
///
/// Every operation reads its input buffer and returns a fresh one; no
/// operation mutates a buffer the caller still holds.
pub trait ImageBackend: Sync {
    /// Extract the `size` sub-region whose top-left corner is at `(x, y)`.
    fn crop(
        &self,
        image: &DynamicImage,
        x: u32,
        y: u32,
        size: Dimensions,
    ) -> Result<DynamicImage, BackendError>;

    /// Resample to exactly `size`.
    fn resize(&self, image: &DynamicImage, size: Dimensions) -> Result<DynamicImage, BackendError>;

    /// Composite over opaque white.
    fn flatten(&self, image: &DynamicImage) -> Result<DynamicImage, BackendError>;

    /// Rotate counter-clockwise.
    fn rotate(&self, image: &DynamicImage, rotation: Rotation) -> Result<DynamicImage, BackendError>;

    /// Write the buffer to `path`, container chosen by extension.
    fn encode(
        &self,
        image: &DynamicImage,
        path: &Path,
        options: &EncodeOptions,
    ) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use image::imageops::FilterType;
    use std::sync::Mutex;

    /// Mock backend that records operations and does only cheap pixel work.
    ///
    /// Resize is nearest-neighbour and encode writes nothing, so the
    /// pipeline's geometry can be asserted from the recorded ops without
    /// touching the real resampler or codecs.
    /// Uses Mutex (not RefCell) so it is Sync.
    #[derive(Default)]
    pub struct MockBackend {
        pub operations: Mutex<Vec<RecordedOp>>,
        /// When set, `encode` fails with this message.
        pub fail_encode: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Crop {
            x: u32,
            y: u32,
            width: u32,
            height: u32,
        },
        Resize {
            from: Dimensions,
            to: Dimensions,
        },
        Flatten,
        Rotate(Rotation),
        Encode {
            output: String,
            width: u32,
            height: u32,
            quality: u8,
            palette_size: Option<usize>,
            has_alpha: bool,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_encode(message: &str) -> Self {
            Self {
                fail_encode: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }
    }

    fn dims(image: &DynamicImage) -> Dimensions {
        Dimensions::new(image.width(), image.height())
    }

    impl ImageBackend for MockBackend {
        fn crop(
            &self,
            image: &DynamicImage,
            x: u32,
            y: u32,
            size: Dimensions,
        ) -> Result<DynamicImage, BackendError> {
            self.record(RecordedOp::Crop {
                x,
                y,
                width: size.width,
                height: size.height,
            });
            Ok(image.crop_imm(x, y, size.width, size.height))
        }

        fn resize(
            &self,
            image: &DynamicImage,
            size: Dimensions,
        ) -> Result<DynamicImage, BackendError> {
            self.record(RecordedOp::Resize {
                from: dims(image),
                to: size,
            });
            Ok(image.resize_exact(size.width, size.height, FilterType::Nearest))
        }

        fn flatten(&self, image: &DynamicImage) -> Result<DynamicImage, BackendError> {
            self.record(RecordedOp::Flatten);
            Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
        }

        fn rotate(
            &self,
            image: &DynamicImage,
            rotation: Rotation,
        ) -> Result<DynamicImage, BackendError> {
            self.record(RecordedOp::Rotate(rotation));
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
            self.record(RecordedOp::Encode {
                output: path.to_string_lossy().to_string(),
                width: image.width(),
                height: image.height(),
                quality: options.quality.value(),
                palette_size: options.palette_size,
                has_alpha: image.color().has_alpha(),
            });
            match &self.fail_encode {
                Some(message) => Err(BackendError::ProcessingFailed(message.clone())),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn mock_records_resize_and_returns_target_size() {
        let backend = MockBackend::new();
        let src = DynamicImage::new_rgb8(400, 300);

        let out = backend.resize(&src, Dimensions::new(80, 60)).unwrap();
        assert_eq!((out.width(), out.height()), (80, 60));

        let ops = backend.get_operations();
        assert_eq!(
            ops,
            vec![RecordedOp::Resize {
                from: Dimensions::new(400, 300),
                to: Dimensions::new(80, 60),
            }]
        );
    }

    #[test]
    fn mock_rotation_swaps_axes_for_quarter_turns() {
        let backend = MockBackend::new();
        let src = DynamicImage::new_rgb8(40, 10);

        let quarter = backend.rotate(&src, Rotation::Ccw90).unwrap();
        let half = backend.rotate(&src, Rotation::Ccw180).unwrap();
        assert_eq!((quarter.width(), quarter.height()), (10, 40));
        assert_eq!((half.width(), half.height()), (40, 10));
    }

    #[test]
    fn mock_records_encode() {
        let backend = MockBackend::new();
        let options = EncodeOptions {
            quality: Quality::new(90).unwrap(),
            palette_size: None,
        };

        backend
            .encode(&DynamicImage::new_rgba8(8, 4), Path::new("/out.png"), &options)
            .unwrap();

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Encode {
                width: 8,
                height: 4,
                quality: 90,
                has_alpha: true,
                ..
            }
        ));
    }

    #[test]
    fn mock_encode_failure() {
        let backend = MockBackend::failing_encode("disk full");
        let result = backend.encode(
            &DynamicImage::new_rgb8(1, 1),
            Path::new("/out.jpg"),
            &EncodeOptions::default(),
        );
        assert!(matches!(result, Err(BackendError::ProcessingFailed(m)) if m == "disk full"));
    }
}
