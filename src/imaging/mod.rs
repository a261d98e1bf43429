//! Image processing — pure Rust, no system libraries.
//!
//! | Stage | Module | Crate / function |
//! |---|---|---|
//! | **Resolve size** | [`calculations`] | pure integer math |
//! | **Orientation** | [`orientation`] | JPEG marker walk + `kamadak-exif` |
//! | **Resize** | [`resample`] | `fast_image_resize` Lanczos3, `imageops` Catmull-Rom |
//! | **Flatten** | [`composite`] | `imageops::overlay` onto white |
//! | **Encode** | [`encode`] | `image` codecs, `gif` + `color_quant`, `tiff` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Stages**: the resampler, compositor, encoder and metadata task the
//!   backend and pipeline are built from

pub mod backend;
pub mod calculations;
pub mod composite;
pub mod encode;
pub mod orientation;
mod params;
pub mod resample;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{Constraints, Dimensions, Limits, ResolveError, center_square, resolve};
pub use orientation::{ExifExtractor, MetadataTask, OrientationExtractor};
pub use params::{EncodeOptions, OrientationDirective, OutputFormat, Quality, Rotation};
pub use rust_backend::{RustBackend, Source};
