//! Upload controller: sends a PDF to the conversion service and tracks an
//! estimated progress value while the request is outstanding.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::slides::{ConversionResponse, Slide};

/// Interval between simulated progress steps.
pub const PROGRESS_TICK: Duration = Duration::from_millis(300);
/// How long the 100% state stays on screen before the deck appears.
pub const COMPLETION_DELAY: Duration = Duration::from_millis(500);
/// The estimate never passes this value before the response arrives.
pub const ESTIMATE_CAP: f32 = 90.0;

const MIN_STEP: f32 = 2.0;
const MAX_STEP: f32 = 10.0;

/// Estimated upload progress.
///
/// The conversion service does not stream progress, so this value is
/// cosmetic: it climbs in bounded random steps and stays at or below
/// [`ESTIMATE_CAP`] until [`ProgressEstimator::finish`] is called. It says
/// nothing about how much data has actually been transferred.
#[derive(Debug)]
pub struct ProgressEstimator {
    percent: f32,
    rng: StdRng,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self { percent: 0.0, rng }
    }

    pub fn percent(&self) -> f32 {
        self.percent
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }

    pub fn tick(&mut self) {
        if self.is_complete() {
            return;
        }
        let step = self.rng.gen_range(MIN_STEP..=MAX_STEP);
        self.percent = (self.percent + step).min(ESTIMATE_CAP);
    }

    pub fn finish(&mut self) {
        self.percent = 100.0;
    }
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = std::fs::read(path).map_err(|source| UploadError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.pdf".to_string());
        Ok(Self { name, bytes })
    }

    /// Resolve a path typed into the upload field. Blank input means no file.
    pub fn from_input(input: &str) -> Result<Self, UploadError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(UploadError::NoFileSelected);
        }
        Self::from_path(&PathBuf::from(trimmed))
    }
}

/// Anything that can turn a PDF into slides. Implemented by the HTTP client
/// for the conversion service; tests substitute canned responses.
pub trait Converter: Send + Sync {
    /// Send the file and return the service's JSON body exactly as received.
    /// Only transport problems are errors here; `success: false` is a normal
    /// response.
    fn parse_pdf_raw(&self, file: &SelectedFile) -> Result<serde_json::Value, UploadError>;

    /// Like [`Converter::parse_pdf_raw`], read into the typed response.
    fn parse_pdf(&self, file: &SelectedFile) -> Result<ConversionResponse, UploadError> {
        ConversionResponse::from_raw(self.parse_pdf_raw(file)?)
    }
}

/// Convert one file into a slide list.
pub fn submit(
    converter: &dyn Converter,
    file: Option<SelectedFile>,
) -> Result<Vec<Slide>, UploadError> {
    let file = file.ok_or(UploadError::NoFileSelected)?;
    info!(file = %file.name, bytes = file.bytes.len(), "submitting PDF for conversion");
    let slides = converter.parse_pdf(&file)?.into_slides()?;
    info!(file = %file.name, slides = slides.len(), "conversion finished");
    Ok(slides)
}

/// What an [`UploadSession`] looks like after a poll.
#[derive(Debug)]
pub enum UploadPoll {
    Pending,
    Ready(Vec<Slide>),
    Failed(UploadError),
}

enum Phase {
    Converting,
    Completed { at: Instant, slides: Vec<Slide> },
}

/// One outstanding conversion request as seen by the viewer.
pub struct UploadSession {
    file_name: String,
    progress: ProgressEstimator,
    last_tick: Instant,
    rx: Receiver<Result<Vec<Slide>, UploadError>>,
    phase: Phase,
}

impl UploadSession {
    /// Run [`submit`] on a background thread.
    pub fn spawn(converter: Arc<dyn Converter>, file: SelectedFile, now: Instant) -> Self {
        let (tx, rx) = mpsc::channel();
        let file_name = file.name.clone();
        std::thread::spawn(move || {
            let result = submit(converter.as_ref(), Some(file));
            // The receiver is gone if the viewer closed mid-upload.
            let _ = tx.send(result);
        });
        Self::new(file_name, rx, ProgressEstimator::new(), now)
    }

    pub fn new(
        file_name: String,
        rx: Receiver<Result<Vec<Slide>, UploadError>>,
        progress: ProgressEstimator,
        now: Instant,
    ) -> Self {
        Self {
            file_name,
            progress,
            last_tick: now,
            rx,
            phase: Phase::Converting,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn progress_percent(&self) -> f32 {
        self.progress.percent()
    }

    /// Advance the estimate and check for the real response.
    pub fn poll(&mut self, now: Instant) -> UploadPoll {
        if let Phase::Completed { at, .. } = &self.phase {
            if now.saturating_duration_since(*at) < COMPLETION_DELAY {
                return UploadPoll::Pending;
            }
            if let Phase::Completed { slides, .. } =
                std::mem::replace(&mut self.phase, Phase::Converting)
            {
                return UploadPoll::Ready(slides);
            }
        }

        match self.rx.try_recv() {
            Ok(Ok(slides)) => {
                debug!(slides = slides.len(), "conversion response received");
                self.progress.finish();
                self.phase = Phase::Completed { at: now, slides };
                UploadPoll::Pending
            }
            Ok(Err(e)) => {
                warn!("upload failed: {e}");
                UploadPoll::Failed(e)
            }
            Err(TryRecvError::Disconnected) => {
                UploadPoll::Failed(UploadError::Transport("conversion worker stopped".into()))
            }
            Err(TryRecvError::Empty) => {
                while now.saturating_duration_since(self.last_tick) >= PROGRESS_TICK {
                    self.progress.tick();
                    self.last_tick += PROGRESS_TICK;
                }
                UploadPoll::Pending
            }
        }
    }
}
