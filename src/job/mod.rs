//! Synthesis orchestration
//!
//! A [`SynthesisJob`] turns every segment of a [`TextUnit`] into one
//! [`AudioSegment`]. Segments are handed out to a bounded pool of worker
//! threads; each worker owns its engines, and results are put back in
//! segment order before they are returned. A segment that still fails after
//! its retries aborts the whole job: the result is either every segment, in
//! order, or an error.

use crate::audio::{AudioFormat, AudioSegment};
use crate::platform::default_workers;
use crate::speech::{EngineConfig, EngineFactory, EngineKind, Synth};
use crate::text::TextUnit;
use crate::{DocvoxError, Result};
use crossbeam_channel::unbounded;
use log::{debug, info, warn};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Output file of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub format: AudioFormat,
}

impl OutputTarget {
    pub fn new(path: impl Into<PathBuf>, format: AudioFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

/// Lifecycle of a job
///
/// `Completed` and `Aborted` are terminal; retrying means a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Aborted,
}

/// Text, engine configuration and output of one conversion
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub text: TextUnit,
    pub engine: EngineConfig,
    pub output: OutputTarget,
    state: JobState,
}

impl SynthesisJob {
    pub fn new(text: TextUnit, engine: EngineConfig, output: OutputTarget) -> Self {
        Self {
            text,
            engine,
            output,
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Effective engine configuration of every segment
    fn segment_configs(&self) -> Vec<EngineConfig> {
        self.text
            .segments()
            .iter()
            .map(|s| self.engine.with_override(s.voice.as_ref()))
            .collect()
    }
}

/// Cooperative cancellation flag, checked before each segment starts
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Worker pool and retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Concurrent engine invocations
    pub workers: usize,

    /// Attempts per segment, including the first
    pub attempts: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            attempts: 2,
        }
    }
}

type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Runs synthesis jobs against engines from a factory
pub struct Orchestrator<'a> {
    factory: &'a dyn EngineFactory,
    options: RunOptions,
    cancel: CancelToken,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(factory: &'a dyn EngineFactory, options: RunOptions) -> Self {
        Self {
            factory,
            options,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called with `(completed, total)` as segments finish, on the calling
    /// thread
    pub fn on_progress(mut self, callback: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Synthesize every segment of a pending job
    ///
    /// Returns exactly one audio segment per text segment, in order. Any
    /// failure is reported as `JobAborted` carrying the reason and, where
    /// there is one, the failing segment index.
    pub fn run(&mut self, job: &mut SynthesisJob) -> Result<Vec<AudioSegment>> {
        if job.state != JobState::Pending {
            return Err(DocvoxError::Other(format!(
                "job is {:?}; create a new job to run again",
                job.state
            )));
        }

        job.state = JobState::Running;
        info!(
            "Starting synthesis of {} segments with {}",
            job.text.len(),
            job.engine.engine
        );

        match self.run_segments(job) {
            Ok(segments) => {
                job.state = JobState::Completed;
                info!("Synthesis completed: {} segments", segments.len());
                Ok(segments)
            }
            Err(e) => {
                job.state = JobState::Aborted;
                let segment = e.segment();
                warn!("Synthesis aborted: {}", e);
                Err(DocvoxError::aborted(segment, e))
            }
        }
    }

    fn report(&mut self, completed: usize, total: usize) {
        if let Some(callback) = self.progress.as_mut() {
            callback(completed, total);
        }
    }

    /// Create and validate an engine for every distinct configuration
    ///
    /// Runs before any segment is synthesized, so a missing engine or an
    /// unknown voice costs no synthesis at all.
    fn preflight(&self, configs: &[EngineConfig]) -> Result<()> {
        let mut engines: HashMap<EngineKind, Box<dyn Synth>> = HashMap::new();
        let distinct: HashSet<&EngineConfig> = configs.iter().collect();

        for config in distinct {
            let engine = engine_for(self.factory, &mut engines, config.engine)?;
            engine.validate(config)?;
            debug!(
                "Validated {} voice '{}'",
                config.engine,
                config.voice_or_default()
            );
        }
        Ok(())
    }

    fn run_segments(&mut self, job: &SynthesisJob) -> Result<Vec<AudioSegment>> {
        let total = job.text.len();
        if total == 0 {
            self.report(0, 0);
            return Ok(Vec::new());
        }

        let configs = job.segment_configs();
        self.preflight(&configs)?;
        self.report(0, total);

        let workers = self.options.workers.clamp(1, total);
        let attempts = self.options.attempts.max(1);
        let segments = job.text.segments();
        let factory = self.factory;
        let cancel = &self.cancel;

        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let (tx, rx) = unbounded::<(usize, Result<AudioSegment>)>();

        let mut slots: Vec<Option<AudioSegment>> = (0..total).map(|_| None).collect();
        let mut first_error: Option<(usize, DocvoxError)> = None;
        let mut completed = 0;

        debug!("Running {} segments on {} workers", total, workers);

        thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let (next, failed, configs) = (&next, &failed, &configs);

                scope.spawn(move || {
                    // Engines are owned by this worker only
                    let mut engines: HashMap<EngineKind, Box<dyn Synth>> = HashMap::new();

                    loop {
                        if cancel.is_cancelled() || failed.load(Ordering::SeqCst) {
                            break;
                        }
                        let idx = next.fetch_add(1, Ordering::SeqCst);
                        if idx >= total {
                            break;
                        }

                        let result = synthesize_segment(
                            factory,
                            &mut engines,
                            &segments[idx].text,
                            &configs[idx],
                            attempts,
                        )
                        .map_err(|e| e.at_segment(idx));

                        if result.is_err() {
                            failed.store(true, Ordering::SeqCst);
                        }
                        if tx.send((idx, result)).is_err() {
                            break;
                        }
                    }
                    debug!("Worker {} finished", worker);
                });
            }
            drop(tx);

            for (idx, result) in rx.iter() {
                match result {
                    Ok(audio) => {
                        slots[idx] = Some(audio);
                        completed += 1;
                        if let Some(callback) = self.progress.as_mut() {
                            callback(completed, total);
                        }
                    }
                    Err(e) => {
                        warn!("Segment {} failed: {}", idx, e);
                        if first_error.as_ref().map_or(true, |(i, _)| idx < *i) {
                            first_error = Some((idx, e));
                        }
                    }
                }
            }
        });

        if let Some((_, e)) = first_error {
            // Engines share the terminal's process group, so an interrupt
            // also kills them; report the cancellation, not their failure
            if self.cancel.is_cancelled() {
                return Err(DocvoxError::Cancelled);
            }
            return Err(e);
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(DocvoxError::Cancelled)
    }
}

fn engine_for<'e>(
    factory: &dyn EngineFactory,
    engines: &'e mut HashMap<EngineKind, Box<dyn Synth>>,
    kind: EngineKind,
) -> Result<&'e mut Box<dyn Synth>> {
    match engines.entry(kind) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            let engine = factory.create(kind)?;
            if engine.kind() != kind {
                return Err(DocvoxError::EngineUnavailable(format!(
                    "asked for a {} engine, got {}",
                    kind,
                    engine.kind()
                )));
            }
            Ok(entry.insert(engine))
        }
    }
}

/// One segment with bounded retries
///
/// Only retryable errors are tried again; nothing carries over between
/// attempts. A segment with nothing to speak (for instance one the user
/// emptied in the editor) becomes zero-length audio without an engine call.
fn synthesize_segment(
    factory: &dyn EngineFactory,
    engines: &mut HashMap<EngineKind, Box<dyn Synth>>,
    text: &str,
    config: &EngineConfig,
    attempts: u32,
) -> Result<AudioSegment> {
    if !text.chars().any(char::is_alphanumeric) {
        debug!("Nothing to speak in {:?}; empty audio", text);
        return Ok(AudioSegment::new(Vec::new(), config.sample_rate, config.channels));
    }

    let engine = engine_for(factory, engines, config.engine)?;

    let mut attempt = 1;
    loop {
        match engine.synthesize(text, config) {
            Ok(audio) => return Ok(audio),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!("Attempt {}/{} failed: {}; retrying", attempt, attempts, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
