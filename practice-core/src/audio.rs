//! # Audio Capture Module
//!
//! Real-time microphone capture with CPAL (Cross-Platform Audio Library) and
//! the plumbing that hands captured audio to the practice pipeline.
//!
//! ## Features
//! - Input device selection (host default or by name)
//! - f32 stream configuration close to the requested sample rate
//! - Downmix to mono and slicing into fixed hop-sized frames
//! - Bounded, drop-oldest frame hand-off that never blocks the audio callback
//!
//! The platform side sits behind the [`InputSource`] trait so the session
//! lifecycle can run without hardware.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, error, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::CaptureError;

/// One hop of mono audio. Immutable once captured.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Arc<[f32]>,
    index: u64,
}

impl AudioFrame {
    pub fn new(samples: impl Into<Arc<[f32]>>, index: u64) -> Self {
        Self {
            samples: samples.into(),
            index,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Position in the capture order, starting at 0.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Accumulates callback buffers and slices them into hop-sized mono frames.
#[derive(Debug)]
pub struct FrameAssembler {
    hop_size: usize,
    channels: usize,
    pending: Vec<f32>,
    next_index: u64,
}

impl FrameAssembler {
    pub fn new(hop_size: usize, channels: usize) -> Self {
        Self {
            hop_size,
            channels: channels.max(1),
            pending: Vec::with_capacity(hop_size * 2),
            next_index: 0,
        }
    }

    /// Appends interleaved samples and emits every complete frame, in order.
    pub fn push(&mut self, interleaved: &[f32], mut emit: impl FnMut(AudioFrame)) {
        if self.channels == 1 {
            self.pending.extend_from_slice(interleaved);
        } else {
            let scale = 1.0 / self.channels as f32;
            self.pending.extend(
                interleaved
                    .chunks_exact(self.channels)
                    .map(|frame| frame.iter().sum::<f32>() * scale),
            );
        }

        // While we have enough data for a full frame, send it.
        while self.pending.len() >= self.hop_size {
            let frame: Arc<[f32]> = self.pending.drain(..self.hop_size).collect();
            emit(AudioFrame::new(frame, self.next_index));
            self.next_index += 1;
        }
    }
}

/// Creates the capture → pipeline hand-off.
///
/// The queue holds a single frame. A producer that finds it full evicts the
/// stale frame and stores the new one, so a slow consumer sees bounded
/// staleness instead of a growing backlog, and the producer never waits.
pub fn frame_queue() -> (FrameSender, Receiver<AudioFrame>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let sender = FrameSender {
        tx,
        evict: rx.clone(),
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

/// Producer side of [`frame_queue`].
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: Sender<AudioFrame>,
    evict: Receiver<AudioFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// Queues `frame`, discarding an older unconsumed frame if necessary.
    pub fn push(&self, mut frame: AudioFrame) {
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(stale) = self.evict.try_recv() {
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!("consumer behind, dropped frame {} ({} total)", stale.index(), total);
                    }
                    frame = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Frames discarded so far because the consumer was behind.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }
}

/// What the session asks of an input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub sample_rate: u32,
    pub hop_size: usize,
    pub device_name: Option<String>,
}

/// A running input stream. Dropping it releases the device.
pub trait InputStream {
    /// Stops callbacks ahead of the drop.
    fn pause(&self) -> Result<(), CaptureError>;
}

/// An opened input: the live stream plus the rate it actually runs at.
pub struct OpenedInput {
    pub stream: Box<dyn InputStream>,
    pub sample_rate: u32,
}

/// Something that can open a microphone stream.
///
/// `open` runs on the session's worker thread and must deliver hop-sized
/// mono frames to `frames`. Runtime stream failures go to `errors`. On
/// failure nothing may stay acquired.
pub trait InputSource: Send {
    fn open(
        &mut self,
        request: &CaptureRequest,
        frames: FrameSender,
        errors: Sender<CaptureError>,
    ) -> Result<OpenedInput, CaptureError>;
}

/// Microphone input through the default CPAL host.
#[derive(Debug, Default, Clone)]
pub struct CpalInput;

impl CpalInput {
    pub fn new() -> Self {
        Self
    }
}

impl InputStream for cpal::Stream {
    fn pause(&self) -> Result<(), CaptureError> {
        StreamTrait::pause(self).map_err(|e| CaptureError::Stream(e.to_string()))
    }
}

impl InputSource for CpalInput {
    fn open(
        &mut self,
        request: &CaptureRequest,
        frames: FrameSender,
        errors: Sender<CaptureError>,
    ) -> Result<OpenedInput, CaptureError> {
        let host = cpal::default_host();
        let device = match &request.device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| CaptureError::Device(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or(CaptureError::NoInputDevice)?,
            None => host.default_input_device().ok_or(CaptureError::NoInputDevice)?,
        };

        info!(
            "Using audio input device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        let configs = device
            .supported_input_configs()
            .map_err(|e| CaptureError::Device(e.to_string()))?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, request.sample_rate)
            .ok_or(CaptureError::NoSupportedConfig(request.sample_rate))?;

        let rate = request.sample_rate.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
        let channels = config.channels() as usize;
        let sample_rate = config.sample_rate().0;
        let config: cpal::StreamConfig = config.into();

        info!("Selected sample rate: {} Hz, {} channel(s)", sample_rate, channels);

        let err_fn = move |err: cpal::StreamError| {
            error!("An error occurred on the audio stream: {}", err);
            let err = match err {
                cpal::StreamError::DeviceNotAvailable => CaptureError::NoInputDevice,
                other => CaptureError::Stream(other.to_string()),
            };
            let _ = errors.try_send(err);
        };

        let mut assembler = FrameAssembler::new(request.hop_size, channels);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    assembler.push(data, |frame| frames.push(frame));
                },
                err_fn,
                None,
            )
            .map_err(map_build_error)?;

        // On failure `stream` drops here and releases the device.
        stream
            .play()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        Ok(OpenedInput {
            stream: Box::new(stream),
            sample_rate,
        })
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoInputDevice,
        cpal::BuildStreamError::BackendSpecific { err } => {
            let description = err.to_string();
            let lower = description.to_lowercase();
            if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
                CaptureError::PermissionDenied(description)
            } else {
                CaptureError::Stream(description)
            }
        }
        other => CaptureError::Stream(other.to_string()),
    }
}

/// Picks the f32 input configuration best suited to `target_rate`.
///
/// Configurations whose range covers the target win, then mono over
/// multi-channel, then the smallest distance to the target.
///
/// # Arguments
/// * `configs` - Ranges reported by the device
/// * `target_rate` - Preferred sample rate in Hz
///
/// # Returns
/// * The best f32 range, or `None` if the device offers no f32 input
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32 && c.channels() > 0)
        .min_by_key(|c| {
            let (min, max) = (c.min_sample_rate().0, c.max_sample_rate().0);
            let distance = if target_rate < min {
                min - target_rate
            } else {
                target_rate.saturating_sub(max)
            };
            (distance, c.channels() != 1, c.channels())
        })
}
