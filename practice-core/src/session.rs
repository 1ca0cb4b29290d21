//! # Practice Session
//!
//! Owns one practice run: the input source, the worker thread that runs the
//! pipeline, and the published status.
//!
//! ## Threads
//! - **Audio callback** (platform thread): slices audio into frames and
//!   pushes them into the drop-oldest queue. Never blocks.
//! - **Worker** (one per `start()`): opens the input, then processes frames
//!   strictly in arrival order. It owns the stream, the estimator and the
//!   sequencer, so no engine state is shared with other threads.
//! - **Owner** (usually the UI thread): calls `start()`/`stop()` and reads
//!   [`PracticeStatus`] snapshots.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::audio::{frame_queue, CaptureRequest, InputSource, OpenedInput};
use crate::config::PracticeConfig;
use crate::error::{CaptureError, ConfigError};
use crate::exercise::TargetSequence;
use crate::feedback::{FeedbackPresenter, FeedbackSink};
use crate::pipeline::{FrameReport, PracticePipeline};
use crate::tuning::NotePitch;

/// Snapshot of a session for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PracticeStatus {
    pub active: bool,
    pub sample_rate: Option<u32>,
    /// Index of the expected note in the target sequence
    pub cursor: usize,
    pub expected: Option<NotePitch>,
    pub last_note: Option<NotePitch>,
    pub last_frequency: Option<f32>,
    pub last_cents: Option<f32>,
    pub confidence: f32,
    pub frames_processed: u64,
    pub frames_dropped: u64,
}

/// Cloneable stop trigger that is safe to use from any thread, including a
/// feedback sink running on the worker itself.
///
/// It only signals; the owning [`PracticeSession`] joins the worker on its
/// next `stop()`, `start()` or drop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    active: Arc<AtomicBool>,
    shutdown: Sender<()>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
        let _ = self.shutdown.try_send(());
    }
}

/// Worker thread management structure.
#[derive(Debug)]
struct Worker {
    stop: StopHandle,
    thread_handle: JoinHandle<Box<dyn InputSource>>,
}

pub struct PracticeSession {
    config: PracticeConfig,
    sequence: TargetSequence,
    /// Parked here between runs; lent to the worker while capturing
    source: Option<Box<dyn InputSource>>,
    presenter: FeedbackPresenter,
    active: Arc<AtomicBool>,
    status: Arc<Mutex<PracticeStatus>>,
    worker: Option<Worker>,
}

impl std::fmt::Debug for PracticeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PracticeSession")
            .field("sequence", &self.sequence)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl PracticeSession {
    pub fn new(
        config: PracticeConfig,
        source: impl InputSource + 'static,
        sink: Arc<dyn FeedbackSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let sequence = config.target_sequence()?;
        Ok(Self {
            config,
            sequence,
            source: Some(Box::new(source)),
            presenter: FeedbackPresenter::new(sink),
            active: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(PracticeStatus::default())),
            worker: None,
        })
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    pub fn sequence(&self) -> &TargetSequence {
        &self.sequence
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PracticeStatus {
        self.status.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replaces the target sequence. Takes effect on the next `start()`.
    pub fn set_sequence(&mut self, sequence: TargetSequence) {
        self.config.target = sequence.notes().to_vec();
        self.sequence = sequence;
    }

    /// A stop trigger for the current run, `None` when idle.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.worker.as_ref().map(|w| w.stop.clone())
    }

    /// Acquires the input and starts practising from the first note.
    ///
    /// Blocks until the input is open (or has failed). On failure the error
    /// is also published once as feedback, and nothing stays acquired.
    ///
    /// A run that ended on its own (lost device, closed input) is collected
    /// here, so no `stop()` is needed before starting again.
    ///
    /// # Returns
    /// * `Ok(())` - the worker is listening for the first note
    /// * `Err(CaptureError::AlreadyActive)` - a run is still in progress
    /// * `Err(_)` - any error raised while opening the input
    pub fn start(&mut self) -> Result<(), CaptureError> {
        let finished = self
            .worker
            .as_ref()
            .is_some_and(|w| w.thread_handle.is_finished());
        if self.is_active() && !finished {
            return Err(CaptureError::AlreadyActive);
        }
        self.reap_worker();

        let mut source = self.source.take().ok_or(CaptureError::WorkerUnavailable)?;
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let stop = StopHandle {
            active: self.active.clone(),
            shutdown: shutdown_tx,
        };

        let request = CaptureRequest {
            sample_rate: self.config.detector.sample_rate,
            hop_size: self.config.detector.hop_size,
            device_name: self.config.input_device.clone(),
        };
        let context = WorkerContext {
            config: self.config.clone(),
            sequence: self.sequence.clone(),
            presenter: self.presenter.clone(),
            active: self.active.clone(),
            status: self.status.clone(),
            shutdown: shutdown_rx,
        };

        // Frames are only evaluated while the flag is up.
        self.active.store(true, Ordering::Release);
        info!("Starting practice: {}", self.sequence);

        let thread_handle = thread::Builder::new()
            .name("practice-worker".into())
            .spawn(move || {
                context.run(source.as_mut(), &request, ready_tx);
                source
            });
        let thread_handle = match thread_handle {
            Ok(handle) => handle,
            Err(e) => {
                // The closure (and the source with it) is gone.
                self.active.store(false, Ordering::Release);
                error!("Failed to spawn practice worker: {}", e);
                let err = CaptureError::WorkerUnavailable;
                self.presenter.capture_failed(&err);
                return Err(err);
            }
        };

        let outcome = ready_rx.recv().unwrap_or(Err(CaptureError::WorkerUnavailable));
        match outcome {
            Ok(()) => {
                self.worker = Some(Worker {
                    stop,
                    thread_handle,
                });
                Ok(())
            }
            Err(err) => {
                self.active.store(false, Ordering::Release);
                match thread_handle.join() {
                    Ok(source) => self.source = Some(source),
                    Err(_) => error!("Practice worker panicked during startup"),
                }
                error!("Failed to start practice: {}", err);
                self.presenter.capture_failed(&err);
                Err(err)
            }
        }
    }

    /// Stops capturing and releases the input. No frame is evaluated after
    /// this returns. Calling it while idle does nothing.
    pub fn stop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop.stop();
        }
        self.reap_worker();
    }

    fn reap_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // Also covers runs ended through a StopHandle.
        worker.stop.stop();
        if worker.thread_handle.thread().id() == thread::current().id() {
            // Called from a sink on the worker; joining here would deadlock.
            self.worker = Some(worker);
            return;
        }
        match worker.thread_handle.join() {
            Ok(source) => self.source = Some(source),
            Err(_) => error!("Practice worker panicked"),
        }
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        *status = PracticeStatus::default();
        debug!("Practice worker joined");
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the worker thread owns for one run.
struct WorkerContext {
    config: PracticeConfig,
    sequence: TargetSequence,
    presenter: FeedbackPresenter,
    active: Arc<AtomicBool>,
    status: Arc<Mutex<PracticeStatus>>,
    shutdown: Receiver<()>,
}

impl WorkerContext {
    fn run(
        self,
        source: &mut dyn InputSource,
        request: &CaptureRequest,
        ready: Sender<Result<(), CaptureError>>,
    ) {
        let (frame_tx, frame_rx) = frame_queue();
        let dropped = frame_tx.dropped_counter();
        let (error_tx, error_rx) = crossbeam_channel::bounded(4);
        // Keeps the error channel connected even if the input drops its end.
        let _error_tx = error_tx.clone();

        let OpenedInput {
            stream,
            sample_rate,
        } = match source.open(request, frame_tx, error_tx) {
            Ok(opened) => opened,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        let mut pipeline = match PracticePipeline::new(&self.config, sample_rate) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!("Cannot analyse at {} Hz: {}", sample_rate, e);
                let _ = stream.pause();
                drop(stream);
                let _ = ready.send(Err(CaptureError::NoSupportedConfig(sample_rate)));
                return;
            }
        };

        let listening = pipeline.begin(self.sequence.clone());
        self.presenter.present(&listening);
        self.publish_start(sample_rate, &pipeline);
        let _ = ready.send(Ok(()));
        info!("Practice worker listening at {} Hz", sample_rate);

        let mut failure = None;
        loop {
            crossbeam_channel::select! {
                recv(frame_rx) -> msg => match msg {
                    Ok(frame) => {
                        if !self.active.load(Ordering::Acquire) {
                            break;
                        }
                        let report = pipeline.process(&frame);
                        if let Some(event) = &report.event {
                            debug!("frame {}: {:?}", frame.index(), event);
                            self.presenter.present(event);
                        }
                        self.publish_frame(&report, &pipeline, dropped.load(Ordering::Relaxed));
                    }
                    Err(_) => {
                        warn!("Audio frame channel closed");
                        break;
                    }
                },
                recv(error_rx) -> msg => {
                    if let Ok(err) = msg {
                        if err.is_fatal() {
                            error!("Audio input lost: {}", err);
                            failure = Some(err);
                            break;
                        }
                        self.presenter.stream_failed(&err);
                    }
                },
                recv(self.shutdown) -> _ => {
                    debug!("Practice worker received shutdown signal");
                    break;
                },
            }
        }

        // Frame loop is down; now release the device.
        if let Err(e) = stream.pause() {
            warn!("Error pausing stream: {}", e);
        }
        drop(stream);
        pipeline.reset();
        self.status.lock().unwrap_or_else(|e| e.into_inner()).active = false;
        self.active.store(false, Ordering::Release);
        match failure {
            Some(err) => self.presenter.stream_failed(&err),
            None => self.presenter.stopped(),
        }
        info!("Practice stopped");
    }

    fn publish_start(&self, sample_rate: u32, pipeline: &PracticePipeline) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        *status = PracticeStatus {
            active: true,
            sample_rate: Some(sample_rate),
            cursor: pipeline.sequencer().cursor(),
            expected: pipeline.sequencer().expected(),
            ..PracticeStatus::default()
        };
    }

    fn publish_frame(&self, report: &FrameReport, pipeline: &PracticePipeline, dropped: u64) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        status.cursor = pipeline.sequencer().cursor();
        status.expected = pipeline.sequencer().expected();
        status.last_note = report.note;
        status.last_frequency = report.estimate.frequency_hz;
        status.last_cents = report.cents;
        status.confidence = report.estimate.confidence;
        status.frames_processed += 1;
        status.frames_dropped = dropped;
    }
}
