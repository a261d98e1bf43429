//! # image-resize
//!
//! Resize a single raster image to an exact size or into a bounding box,
//! with optional EXIF orientation correction, center square cropping, and
//! transparency flattening.
//!
//! # Architecture: One Linear Job
//!
//! A job moves through a fixed sequence of stages. Only two points loop back
//! to the size resolver: after an orientation swap and after a square crop.
//!
//! ```text
//! constraints ─► probe ─► resolve ─► decode ─► (swap ─► resolve)
//!     ─► (crop ─► resolve) ─► resize? ─► flatten? ─► rotate? ─► encode
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Sequences one job: [`pipeline::Job`] in, encoded file out |
//! | [`imaging`] | Size resolution, orientation task, resampling, compositing, encoding |
//! | [`config`] | Optional TOML config: resource limits, default quality, logging |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Max Bounds Win
//!
//! If `maxwidth` or `maxheight` is set, the box mode is used even when
//! `width`/`height` are also given. Box mode preserves aspect ratio and never
//! upscales; exact mode may do both.
//!
//! ## Orientation Is Best Effort
//!
//! EXIF orientation is read on a background thread from a copy of the bytes
//! the decoder consumes. The pipeline checks for a result exactly once, after
//! decoding, and never waits: a slow or broken tag costs the rotation, never
//! the job.
//!
//! ## Hard Resource Ceilings
//!
//! Input bytes, source pixel count, output pixel count and output axis length
//! are all capped (see [`imaging::Limits`]). Exceeding any of them fails the
//! job with [`pipeline::Error::ResourceLimit`].

pub mod config;
pub mod imaging;
pub mod logging;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;
