//! Pure dimension math: constraint set + native size → target size.
//!
//! All functions here are pure and testable without any I/O or images. The
//! pipeline calls [`resolve`] up to three times per job (initial, after an
//! orientation swap, after a square crop); each call depends only on its
//! arguments.
//!
//! ## Modes
//!
//! | Fields set | Mode | Aspect ratio | Upscales |
//! |---|---|---|---|
//! | `max_width` and/or `max_height` | max-bounded | preserved | never |
//! | `width` and `height` | exact | free (may distort) | yes |
//! | `width` or `height` | exact | preserved | yes |
//!
//! Max-bounded wins whenever either max field is non-zero, even if exact
//! fields are also set.

use thiserror::Error;

/// Errors from constraint validation and size resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{0}")]
    Constraint(String),
    #[error("{0}")]
    ResourceLimit(String),
}

/// Width and height of an image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count, computed in 64 bits so it cannot overflow.
    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Resource ceilings shared by every stage of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Max width*height for both the source and the destination.
    pub pixel_limit: u64,
    /// Max number of input bytes fed to the decoder.
    pub max_file_size: u64,
    /// Max resolved size on either axis.
    pub max_dimension: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            pixel_limit: 50 * 1_000_000,
            max_file_size: 50 << 20,
            max_dimension: (1 << 16) - 1,
        }
    }
}

/// Caller-requested size constraints. Zero means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constraints {
    pub width: u32,
    pub height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Constraints {
    /// Build a constraint set, rejecting empty or over-limit requests.
    pub fn new(
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
        limits: &Limits,
    ) -> Result<Self, ResolveError> {
        let constraints = Self {
            width,
            height,
            max_width,
            max_height,
        };
        constraints.validate(limits)?;
        Ok(constraints)
    }

    pub fn validate(&self, limits: &Limits) -> Result<(), ResolveError> {
        if self.width == 0 && self.height == 0 && self.max_width == 0 && self.max_height == 0 {
            return Err(ResolveError::Constraint(
                "no valid dimensions specified".into(),
            ));
        }
        let over = |v: u64| v > limits.pixel_limit;
        if over(self.width as u64 * self.height as u64)
            || over(self.width as u64)
            || over(self.height as u64)
            || over(self.max_width as u64)
            || over(self.max_height as u64)
        {
            return Err(ResolveError::Constraint(
                "destination size exceeds limit".into(),
            ));
        }
        Ok(())
    }

    /// True when either max field is set; this mode takes precedence.
    pub fn is_max_bounded(&self) -> bool {
        self.max_width > 0 || self.max_height > 0
    }

    /// Width/height and max width/max height exchanged pairwise.
    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
            max_width: self.max_height,
            max_height: self.max_width,
        }
    }
}

impl std::fmt::Display for Constraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "width={} height={} maxwidth={} maxheight={}",
            self.width, self.height, self.max_width, self.max_height
        )
    }
}

/// Compute the target size for an image of `native` size.
///
/// Floor integer division is used wherever one side is derived from the
/// other through the source aspect ratio.
///
/// # Examples
/// ```
/// # use image_resize::imaging::{Constraints, Dimensions, Limits, resolve};
/// let limits = Limits::default();
/// let box800 = Constraints::new(0, 0, 800, 800, &limits).unwrap();
/// let target = resolve(&box800, Dimensions::new(4000, 3000), &limits).unwrap();
/// assert_eq!(target, Dimensions::new(800, 600));
/// ```
pub fn resolve(
    constraints: &Constraints,
    native: Dimensions,
    limits: &Limits,
) -> Result<Dimensions, ResolveError> {
    constraints.validate(limits)?;
    if native.width == 0 || native.height == 0 {
        return Err(ResolveError::Constraint(
            "invalid source dimensions".into(),
        ));
    }

    let (orig_w, orig_h) = (native.width as u64, native.height as u64);
    let (w, h) = if constraints.is_max_bounded() {
        let (mut w, mut h) = (constraints.max_width as u64, constraints.max_height as u64);
        // One bound given: derive the other from the source aspect ratio
        if w == 0 {
            w = orig_w * h / orig_h;
        }
        if h == 0 {
            h = orig_h * w / orig_w;
        }
        if orig_w <= w && orig_h <= h {
            // Already fits; never upscale in this mode
            return check_limits(native.width as u64, native.height as u64, limits);
        }
        if constraints.max_width > 0 && constraints.max_height > 0 {
            // Free-aspect box: shrink the slack side so the source aspect
            // ratio is kept. orig_w/orig_h > w/h, cross-multiplied.
            if orig_w * h > w * orig_h {
                h = orig_h * w / orig_w;
            } else {
                w = orig_w * h / orig_h;
            }
        }
        (w, h)
    } else if constraints.width > 0 || constraints.height > 0 {
        let (mut w, mut h) = (constraints.width as u64, constraints.height as u64);
        if w == 0 {
            w = orig_w * h / orig_h;
        }
        if h == 0 {
            h = orig_h * w / orig_w;
        }
        (w, h)
    } else {
        return Err(ResolveError::Constraint(format!(
            "invalid transform {constraints}"
        )));
    };

    check_limits(w, h, limits)
}

/// Centered square sub-region of an image: `(x, y, side)`.
///
/// The side is the shorter axis; the longer axis is trimmed evenly, with
/// the odd pixel (if any) dropped from the far edge.
pub fn center_square(native: Dimensions) -> (u32, u32, u32) {
    let side = native.width.min(native.height);
    ((native.width - side) / 2, (native.height - side) / 2, side)
}

fn check_limits(w: u64, h: u64, limits: &Limits) -> Result<Dimensions, ResolveError> {
    if w == 0 || h == 0 {
        return Err(ResolveError::Constraint(format!(
            "destination size {w}x{h} has an empty side"
        )));
    }
    if w * h > limits.pixel_limit
        || w > limits.max_dimension as u64
        || h > limits.max_dimension as u64
    {
        return Err(ResolveError::ResourceLimit(
            "destination size exceeds limit".into(),
        ));
    }
    Ok(Dimensions::new(w as u32, h as u32))
}
