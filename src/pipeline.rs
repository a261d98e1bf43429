//! One resize job, from input path to encoded output.
//!
//! ```text
//!  validate constraints
//!        │
//!  open + probe header ──► resolve (1)
//!        │
//!  bounded read ──tee──► MetadataTask (JPEG only)
//!        │
//!  decode ──► poll task once ──► swap? resolve (2)
//!        │
//!  square? crop ──► resolve (3)
//!        │
//!  max-bounded and target >= current? ── yes ──┐
//!        │ no                                  │
//!  resize                                      │
//!        ├─────────────────────────────────────┘
//!  flatten (non-PNG output, transparent, fill enabled)
//!        │
//!  rotate (orientation directive)
//!        │
//!  encode
//! ```
//!
//! Every stage that changes pixels goes through an [`ImageBackend`], so tests
//! can swap in a recording backend and assert which stages ran. Errors are
//! never retried; the first one ends the job.

use crate::config::{ConfigError, ResizeConfig};
use crate::imaging::composite::is_opaque;
use crate::imaging::encode::palette_size_of;
use crate::imaging::{
    BackendError, Constraints, Dimensions, EncodeOptions, ExifExtractor, ImageBackend, Limits,
    MetadataTask, OrientationDirective, OrientationExtractor, OutputFormat, Quality, ResolveError,
    Rotation, RustBackend, Source, center_square, resolve,
};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Job failures, one variant per class of cause.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Constraint(String),
    #[error("{0}")]
    ResourceLimit(String),
    #[error("cannot read input: {0}")]
    Input(String),
    #[error("cannot crop: {0}")]
    Crop(String),
    #[error("cannot write output: {0}")]
    Output(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Constraint(msg) => Error::Constraint(msg),
            ResolveError::ResourceLimit(msg) => Error::ResourceLimit(msg),
        }
    }
}

/// One unit of work, as requested on the command line. Zero means "not set"
/// for the four size fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub max_width: u32,
    pub max_height: u32,
    /// Requested JPEG quality; `None` or out of range uses the configured default.
    pub quality: Option<i64>,
    /// Center-crop to a square before resizing.
    pub square: bool,
    /// Keep transparency even when the output container can't represent it.
    pub nofill: bool,
}

impl Job {
    fn constraints(&self, limits: &Limits) -> Result<Constraints, ResolveError> {
        Constraints::new(
            self.width,
            self.height,
            self.max_width,
            self.max_height,
            limits,
        )
    }
}

/// What a finished job did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Size from the input header.
    pub native: Dimensions,
    /// Size of the encoded image.
    pub output: Dimensions,
    pub resized: bool,
    pub flattened: bool,
    pub rotation: Rotation,
}

/// Run `job` with the production backend and EXIF extractor.
pub fn run(job: &Job, config: &ResizeConfig) -> Result<Outcome, Error> {
    run_with(job, config, &RustBackend::new(), Arc::new(ExifExtractor))
}

/// Run `job` with an explicit backend and orientation extractor.
pub fn run_with<B: ImageBackend>(
    job: &Job,
    config: &ResizeConfig,
    backend: &B,
    extractor: Arc<dyn OrientationExtractor>,
) -> Result<Outcome, Error> {
    let limits = config.limits();
    let constraints = job.constraints(&limits)?;

    let source = Source::open(&job.input).map_err(|e| input_error(&job.input, e))?;
    let native = source.size();
    if native.area() > limits.pixel_limit {
        return Err(Error::ResourceLimit(format!(
            "source size {native} exceeds limit of {} pixels",
            limits.pixel_limit
        )));
    }
    let target = resolve(&constraints, native, &limits)?;
    debug!(
        input = %job.input.display(),
        format = ?source.format(),
        %native,
        %constraints,
        %target,
        "probed input"
    );

    let (task, tap) = if config.metadata.orientation && source.supports_orientation() {
        match MetadataTask::spawn(extractor) {
            Ok((task, tap)) => (Some(task), Some(tap)),
            Err(err) => {
                debug!(%err, "could not start orientation task");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let paletted = source.is_paletted();
    let image = source
        .decode(limits.max_file_size, tap)
        .map_err(|e| input_error(&job.input, e))?;

    let palette_size = (paletted && OutputFormat::from_path(&job.output) == OutputFormat::Gif)
        .then(|| palette_size_of(&image));
    let directive = task.and_then(MetadataTask::poll);

    let decoded = Decoded {
        image,
        native,
        palette_size,
    };
    finish(job, config, backend, decoded, constraints, target, directive)
}

/// A decoded input and what was learned about it before decoding.
struct Decoded {
    image: DynamicImage,
    native: Dimensions,
    palette_size: Option<usize>,
}

/// Steps after decode: re-resolve, crop, resize, flatten, rotate, encode.
fn finish<B: ImageBackend>(
    job: &Job,
    config: &ResizeConfig,
    backend: &B,
    decoded: Decoded,
    mut constraints: Constraints,
    mut target: Dimensions,
    directive: Option<OrientationDirective>,
) -> Result<Outcome, Error> {
    let limits = config.limits();
    let Decoded {
        mut image,
        native,
        palette_size,
    } = decoded;

    if directive.is_some_and(|d| d.swap_dimensions) {
        constraints = constraints.swapped();
        target = resolve(&constraints, native, &limits)?;
        debug!(%constraints, %target, "constraints swapped for orientation");
    }

    let mut current = native;
    if job.square {
        let (x, y, side) = center_square(native);
        if side == 0 {
            return Err(Error::Crop(format!("{native} image has no square region")));
        }
        let square = Dimensions::new(side, side);
        image = backend
            .crop(&image, x, y, square)
            .map_err(|e| Error::Crop(e.to_string()))?;
        current = square;
        target = resolve(&constraints, current, &limits)?;
        debug!(%current, %target, "cropped to center square");
    }

    // Max-bounded jobs never upscale; exact sizes always resample
    let upscale_skip = constraints.is_max_bounded()
        && target.width >= current.width
        && target.height >= current.height;
    let resized = if upscale_skip {
        debug!(%current, %target, "already within bounds, skipping resize");
        false
    } else {
        image = backend
            .resize(&image, target)
            .map_err(|e| stage_error("resize", e))?;
        debug!(from = %current, to = %target, "resized");
        true
    };

    let format = OutputFormat::from_path(&job.output);
    let flattened = !format.preserves_transparency() && !job.nofill && !is_opaque(&image);
    if flattened {
        image = backend
            .flatten(&image)
            .map_err(|e| stage_error("flatten", e))?;
        debug!(?format, "flattened transparency onto white");
    }

    // Rotate the final-size buffer; the target was already swapped above
    let rotation = directive.map_or(Rotation::None, |d| d.rotation);
    if rotation != Rotation::None {
        image = backend
            .rotate(&image, rotation)
            .map_err(|e| stage_error("rotate", e))?;
        debug!(degrees = rotation.degrees(), "rotated");
    }

    let options = EncodeOptions {
        quality: quality_for(job.quality, config.default_quality()),
        palette_size,
    };
    backend
        .encode(&image, &job.output, &options)
        .map_err(|e| Error::Output(format!("{}: {e}", job.output.display())))?;

    let output = Dimensions::new(image.width(), image.height());
    debug!(output = %job.output.display(), ?format, size = %output, "encoded");

    Ok(Outcome {
        native,
        output,
        resized,
        flattened,
        rotation,
    })
}

fn quality_for(requested: Option<i64>, fallback: Quality) -> Quality {
    match requested {
        None => fallback,
        Some(q) => {
            let quality = Quality::or_fallback(q, fallback);
            if quality.value() as i64 != q {
                warn!(requested = q, used = quality.value(), "quality out of range 1-100");
            }
            quality
        }
    }
}

fn input_error(path: &Path, err: BackendError) -> Error {
    match err {
        BackendError::LimitExceeded(msg) => Error::ResourceLimit(format!("{}: {msg}", path.display())),
        other => Error::Input(format!("{}: {other}", path.display())),
    }
}

/// Failures of intermediate transforms are reported against the output,
/// since no destination can be produced.
fn stage_error(stage: &str, err: BackendError) -> Error {
    Error::Output(format!("{stage} failed: {err}"))
}
