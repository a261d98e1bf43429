//! Best-effort EXIF orientation extraction, racing the main decode.
//!
//! The input file is read once. A [`TeeReader`] sits between the file and the
//! decoder's buffer and forwards a copy of every chunk to a background thread
//! (the [`MetadataTask`]), which walks the JPEG markers up to the `Exif` APP1
//! segment and hands the TIFF structure to `kamadak-exif`.
//!
//! ```text
//!  file ──► TeeReader ──► decode buffer ──► decoder
//!              │
//!              └─ chunks ──► StreamReader ──► OrientationExtractor ──► outcome slot (1)
//! ```
//!
//! The pipeline never waits on the task: after decoding it calls
//! [`MetadataTask::poll`] once. A missing, failed or late result all mean
//! "no orientation directive". The worker keeps draining its stream after
//! posting, so the tee side never holds chunks for a reader that went away.

use super::params::OrientationDirective;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};
use std::thread;
use thiserror::Error;
use tracing::{debug, warn};

/// Failures inside the metadata task. Never surfaced to the caller.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("not a JPEG stream")]
    NotJpeg,
    #[error("malformed JPEG marker stream: {0}")]
    Malformed(String),
    #[error("EXIF parse error: {0}")]
    Exif(#[from] exif::Error),
    #[error("extractor panicked")]
    Panicked,
}

/// Raw EXIF `Orientation` value, if the stream carried one.
pub type ExtractOutcome = Result<Option<u32>, MetadataError>;

/// Reads an orientation tag from a forward-only byte stream.
///
/// Implementations may stop reading early; the task drains the rest.
pub trait OrientationExtractor: Send + Sync {
    fn extract(&self, stream: &mut dyn Read) -> ExtractOutcome;
}

/// Production extractor: JPEG APP1 `Exif` segment parsed by `kamadak-exif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifExtractor;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const EXIF_HEADER: &[u8] = b"Exif\0\0";

impl OrientationExtractor for ExifExtractor {
    fn extract(&self, stream: &mut dyn Read) -> ExtractOutcome {
        let Some(tiff) = find_exif_payload(stream)? else {
            return Ok(None);
        };
        let exif = exif::Reader::new().read_raw(tiff)?;
        Ok(exif
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0)))
    }
}

/// Walk JPEG markers until the first APP1 segment with an `Exif` header.
///
/// Stops at start-of-scan: metadata segments always precede entropy-coded
/// data, so nothing past SOS needs to be looked at.
fn find_exif_payload(stream: &mut dyn Read) -> Result<Option<Vec<u8>>, MetadataError> {
    let mut soi = [0u8; 2];
    stream.read_exact(&mut soi)?;
    if soi != SOI {
        return Err(MetadataError::NotJpeg);
    }

    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte)?;
        if byte[0] != 0xFF {
            return Err(MetadataError::Malformed(format!(
                "expected marker, found 0x{:02X}",
                byte[0]
            )));
        }
        // Any number of 0xFF fill bytes may precede the marker code
        let mut marker = 0xFF;
        while marker == 0xFF {
            stream.read_exact(&mut byte)?;
            marker = byte[0];
        }

        match marker {
            SOS | EOI => return Ok(None),
            // Standalone markers carry no length field
            0x01 | 0xD0..=0xD7 => continue,
            _ => {}
        }

        let mut len = [0u8; 2];
        stream.read_exact(&mut len)?;
        let len = u16::from_be_bytes(len) as usize;
        if len < 2 {
            return Err(MetadataError::Malformed(format!(
                "segment 0x{marker:02X} declares length {len}"
            )));
        }
        let payload_len = len - 2;

        if marker == APP1 {
            let mut payload = vec![0u8; payload_len];
            stream.read_exact(&mut payload)?;
            if payload.starts_with(EXIF_HEADER) {
                return Ok(Some(payload.split_off(EXIF_HEADER.len())));
            }
            // XMP and friends share APP1; keep looking
        } else {
            let skipped = io::copy(&mut (&mut *stream).take(payload_len as u64), &mut io::sink())?;
            if skipped != payload_len as u64 {
                return Err(MetadataError::Malformed(format!(
                    "segment 0x{marker:02X} truncated"
                )));
            }
        }
    }
}

/// Reader that forwards a copy of everything it reads to a tap.
///
/// A closed tap (the worker is gone) is dropped silently; reads continue.
pub struct TeeReader<R> {
    inner: R,
    tap: Option<Sender<Vec<u8>>>,
}

impl<R: Read> TeeReader<R> {
    pub fn new(inner: R, tap: Option<Sender<Vec<u8>>>) -> Self {
        Self { inner, tap }
    }
}

impl<R: Read> Read for TeeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            let closed = self
                .tap
                .as_ref()
                .is_some_and(|tap| tap.send(buf[..n].to_vec()).is_err());
            if closed {
                self.tap = None;
            }
        }
        Ok(n)
    }
}

/// Forward-only reader over the chunks sent by a [`TeeReader`].
///
/// Reports end-of-stream once every sender has hung up.
pub struct StreamReader {
    chunks: Receiver<Vec<u8>>,
    current: Vec<u8>,
    pos: usize,
}

impl StreamReader {
    pub fn new(chunks: Receiver<Vec<u8>>) -> Self {
        Self {
            chunks,
            current: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.current.len() {
            match self.chunks.recv() {
                Ok(chunk) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = (self.current.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Background orientation extraction for one job.
pub struct MetadataTask {
    outcome: Receiver<ExtractOutcome>,
    #[cfg(test)]
    worker: thread::JoinHandle<()>,
}

impl MetadataTask {
    /// Start the worker. Returns the task and the tap to hand to a [`TeeReader`].
    ///
    /// The worker posts exactly one outcome, then drains the stream until the
    /// tap is dropped.
    pub fn spawn(
        extractor: Arc<dyn OrientationExtractor>,
    ) -> io::Result<(Self, Sender<Vec<u8>>)> {
        let (tap, chunks) = mpsc::channel::<Vec<u8>>();
        let (outcome_tx, outcome) = mpsc::sync_channel::<ExtractOutcome>(1);

        let worker = thread::Builder::new()
            .name("orientation".into())
            .spawn(move || run_worker(extractor.as_ref(), StreamReader::new(chunks), outcome_tx))?;

        // Outside tests the handle is dropped and the worker runs detached
        #[cfg(not(test))]
        drop(worker);

        Ok((
            Self {
                outcome,
                #[cfg(test)]
                worker,
            },
            tap,
        ))
    }

    /// Single non-blocking check of the outcome slot.
    ///
    /// Consumes the task: the result is read at most once. If the worker has
    /// not posted yet, orientation correction is skipped for this job.
    pub fn poll(self) -> Option<OrientationDirective> {
        directive_from(self.outcome.try_recv())
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

fn run_worker(
    extractor: &dyn OrientationExtractor,
    mut stream: StreamReader,
    outcome_tx: SyncSender<ExtractOutcome>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(&mut stream)))
        .unwrap_or(Err(MetadataError::Panicked));
    // The slot is empty and read at most once, so this never blocks
    let _ = outcome_tx.try_send(outcome);
    let _ = io::copy(&mut stream, &mut io::sink());
}

fn directive_from(
    received: Result<ExtractOutcome, TryRecvError>,
) -> Option<OrientationDirective> {
    match received {
        Ok(Ok(Some(tag))) => {
            let directive = OrientationDirective::from_exif_orientation(tag);
            debug!(tag, ?directive, "orientation tag read");
            directive
        }
        Ok(Ok(None)) => {
            debug!("no orientation tag");
            None
        }
        Ok(Err(err)) => {
            debug!(%err, "orientation metadata unavailable");
            None
        }
        Err(TryRecvError::Empty) => {
            warn!("orientation metadata not ready after decode; skipping rotation");
            None
        }
        Err(TryRecvError::Disconnected) => {
            debug!("orientation task exited without a result");
            None
        }
    }
}
