//! Remix orchestration
//!
//! Validates the request, resolves every reference, fans decode and
//! per-clip edits out to a bounded pool of scoped worker threads, then
//! conforms, composes and encodes on the calling thread.

use crate::compositor::{AttenuatedBackground, TimelineCompositor, DEFAULT_BACKGROUND_GAIN_DB};
use crate::error::{RemixError, SourceRole, TransformStage};
use crate::request::{ClipEdit, RemixRequest};
use crate::resolver::{ResolveError, SourceResolver};
use crate::transform::{ClipTransform, DEFAULT_MAX_CLIP_SECS};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use remix_audio::{AudioBuffer, TimeStretchParams};
use remix_codec::{CodecGateway, ExportFormat, ExportSettings, MP3_MAX_CHANNELS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Orchestrator configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemixOptions {
    pub export: ExportSettings,
    /// Gain applied to the background track, in dB
    pub background_gain_db: f32,
    /// Upper bound on decode/transform worker threads
    pub max_workers: usize,
    /// Wall-clock budget for one remix, `None` for unbounded
    pub deadline: Option<Duration>,
    /// Longest a single clip may run once trimmed and speed-changed
    pub max_clip_secs: f64,
    pub stretch: TimeStretchParams,
}

impl Default for RemixOptions {
    fn default() -> Self {
        Self {
            export: ExportSettings::default(),
            background_gain_db: DEFAULT_BACKGROUND_GAIN_DB,
            max_workers: 4,
            deadline: None,
            max_clip_secs: DEFAULT_MAX_CLIP_SECS,
            stretch: TimeStretchParams::default(),
        }
    }
}

/// Encoded mix ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct RemixResult {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f64,
}

impl RemixResult {
    /// Suggested download name, `remix.<ext>`
    pub fn file_name(&self) -> String {
        format!("remix.{}", self.format.extension())
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Unit of work handed to a pool thread
enum Job<'r> {
    Clip {
        index: usize,
        edit: &'r ClipEdit,
        bytes: Vec<u8>,
    },
    Background {
        reference: &'r str,
        bytes: Vec<u8>,
    },
}

enum Outcome {
    Clip(usize, Result<AudioBuffer, RemixError>),
    Background(Result<AttenuatedBackground, RemixError>),
}

/// Decoded and edited inputs, in request order
struct Prepared {
    clips: Vec<AudioBuffer>,
    background: Option<AttenuatedBackground>,
}

/// Runs remix requests against a reference resolver
pub struct Remixer<R: SourceResolver> {
    resolver: R,
    codec: CodecGateway,
    compositor: TimelineCompositor,
    options: RemixOptions,
}

impl<R: SourceResolver> Remixer<R> {
    pub fn new(resolver: R, options: RemixOptions) -> Self {
        Self {
            resolver,
            codec: CodecGateway::new(options.export).with_stretch_params(options.stretch),
            compositor: TimelineCompositor::new(options.background_gain_db),
            options,
        }
    }

    pub fn options(&self) -> &RemixOptions {
        &self.options
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Produce one encoded mix from `request`.
    ///
    /// Nothing is decoded until every reference has resolved, so a missing
    /// file fails the request without partial work.
    pub fn remix(&self, request: &RemixRequest) -> Result<RemixResult, RemixError> {
        let started = Instant::now();
        let deadline = self.options.deadline.map(|budget| started + budget);

        request.validate()?;

        let mut jobs = Vec::with_capacity(request.clips.len() + 1);
        for (index, edit) in request.clips.iter().enumerate() {
            let bytes = self.fetch(SourceRole::Clip(index), &edit.source)?;
            jobs.push(Job::Clip { index, edit, bytes });
        }
        if let Some(reference) = request.background.as_deref() {
            let bytes = self.fetch(SourceRole::Background, reference)?;
            jobs.push(Job::Background { reference, bytes });
        }
        self.check_deadline(deadline)?;

        let prepared = self.run_jobs(jobs, request.clips.len(), deadline)?;
        let prepared = self.conform(request, prepared)?;
        self.check_deadline(deadline)?;

        let mix = self.compositor.compose(prepared.clips, prepared.background)?;
        let bytes = self.codec.encode(&mix)?;

        info!(
            clips = request.clips.len(),
            background = request.background.is_some(),
            duration_secs = mix.duration_secs(),
            format = %self.options.export.format,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Remix complete"
        );

        Ok(RemixResult {
            bytes,
            format: self.options.export.format,
            sample_rate: mix.sample_rate(),
            channels: mix.channels(),
            duration_secs: mix.duration_secs(),
        })
    }

    fn fetch(&self, role: SourceRole, reference: &str) -> Result<Vec<u8>, RemixError> {
        match self.resolver.resolve(reference) {
            Ok(bytes) => Ok(bytes),
            Err(ResolveError::NotFound(_)) => Err(RemixError::NotFound {
                role,
                reference: reference.to_string(),
            }),
            Err(ResolveError::InvalidReference(_)) => Err(RemixError::Validation(format!(
                "{} has an invalid reference: {}",
                role, reference
            ))),
            Err(err @ ResolveError::Io { .. }) => {
                warn!(%role, reference, error = %err, "Failed to read source");
                Err(RemixError::NotFound {
                    role,
                    reference: reference.to_string(),
                })
            }
        }
    }

    fn check_deadline(&self, deadline: Option<Instant>) -> Result<(), RemixError> {
        match (deadline, self.options.deadline) {
            (Some(at), Some(budget)) if Instant::now() >= at => {
                Err(RemixError::DeadlineExceeded(budget))
            }
            _ => Ok(()),
        }
    }

    /// Decode and edit every input on the worker pool, reassembled in request order
    fn run_jobs(
        &self,
        jobs: Vec<Job<'_>>,
        clip_count: usize,
        deadline: Option<Instant>,
    ) -> Result<Prepared, RemixError> {
        let total = jobs.len();
        let thread_count = self.options.max_workers.min(total).max(1);
        let cancel = AtomicBool::new(false);

        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        for job in jobs {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        debug!(jobs = total, threads = thread_count, "Starting workers");

        thread::scope(|scope| {
            for _ in 0..thread_count {
                let job_rx = job_rx.clone();
                let out_tx = out_tx.clone();
                let cancel = &cancel;
                scope.spawn(move || self.work(job_rx, out_tx, cancel));
            }
            drop(out_tx);

            let result = self.collect(&out_rx, clip_count, deadline);
            if result.is_err() {
                cancel.store(true, Ordering::Relaxed);
            }
            result
        })
    }

    fn work(&self, jobs: Receiver<Job<'_>>, outcomes: Sender<Outcome>, cancel: &AtomicBool) {
        let transform =
            ClipTransform::new(&self.codec).with_max_clip_secs(self.options.max_clip_secs);

        for job in jobs.iter() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }

            let outcome = match job {
                Job::Clip { index, edit, bytes } => {
                    Outcome::Clip(index, transform.process(SourceRole::Clip(index), edit, bytes))
                }
                Job::Background { reference, bytes } => Outcome::Background(
                    self.codec
                        .decode(bytes)
                        .map(|bed| self.compositor.attenuate(bed))
                        .map_err(|source| RemixError::Decode {
                            role: SourceRole::Background,
                            reference: reference.to_string(),
                            source,
                        }),
                ),
            };

            let failed = matches!(
                &outcome,
                Outcome::Clip(_, Err(_)) | Outcome::Background(Err(_))
            );
            let _ = outcomes.send(outcome);
            if failed {
                cancel.store(true, Ordering::Relaxed);
            }
        }
    }

    fn collect(
        &self,
        outcomes: &Receiver<Outcome>,
        clip_count: usize,
        deadline: Option<Instant>,
    ) -> Result<Prepared, RemixError> {
        let mut clips: Vec<Option<AudioBuffer>> = vec![None; clip_count];
        let mut background = None;
        // Keep the error of the earliest input so repeated runs report the same failure
        let mut failure: Option<(usize, RemixError)> = None;

        loop {
            let received = match deadline {
                Some(at) => outcomes.recv_deadline(at),
                None => outcomes.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            let outcome = match received {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    let budget = self.options.deadline.unwrap_or_default();
                    warn!(?budget, "Remix deadline reached, cancelling workers");
                    return Err(RemixError::DeadlineExceeded(budget));
                }
            };

            let (order, result) = match outcome {
                Outcome::Clip(index, result) => (index, result.map(|buf| clips[index] = Some(buf))),
                Outcome::Background(result) => {
                    (clip_count, result.map(|bed| background = Some(bed)))
                }
            };

            if let Err(err) = result {
                if failure.as_ref().map_or(true, |(first, _)| order < *first) {
                    failure = Some((order, err));
                }
            }
        }

        if let Some((_, err)) = failure {
            return Err(err);
        }

        let clips = clips
            .into_iter()
            .enumerate()
            .map(|(index, clip)| {
                clip.ok_or_else(|| {
                    RemixError::Composition(format!("{} was never processed", SourceRole::Clip(index)))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Prepared { clips, background })
    }

    /// Bring every buffer to the first clip's sample rate and channel count.
    ///
    /// MP3 export caps the layout at stereo.
    fn conform(&self, request: &RemixRequest, prepared: Prepared) -> Result<Prepared, RemixError> {
        let Some(first) = prepared.clips.first() else {
            return Ok(prepared);
        };
        let rate = first.sample_rate();
        let channels = match self.options.export.format {
            ExportFormat::Mp3 => first.channels().min(MP3_MAX_CHANNELS),
            ExportFormat::Wav => first.channels(),
        };

        let clips = prepared
            .clips
            .into_iter()
            .zip(&request.clips)
            .enumerate()
            .map(|(index, (clip, edit))| {
                if clip.sample_rate() != rate || clip.channels() != channels {
                    debug!(
                        clip = index + 1,
                        from_rate = clip.sample_rate(),
                        from_channels = clip.channels(),
                        rate,
                        channels,
                        "Conforming clip"
                    );
                }
                self.codec.conform(clip, rate, channels).map_err(|e| {
                    RemixError::transform(
                        SourceRole::Clip(index),
                        &edit.source,
                        TransformStage::Conform,
                        e,
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let background = match (prepared.background, request.background.as_deref()) {
            (Some(bed), Some(reference)) => Some(
                bed.try_map(|buf| self.codec.conform(buf, rate, channels))
                    .map_err(|e| {
                        RemixError::transform(
                            SourceRole::Background,
                            reference,
                            TransformStage::Conform,
                            e,
                        )
                    })?,
            ),
            (bed, _) => bed,
        };

        Ok(Prepared { clips, background })
    }
}
