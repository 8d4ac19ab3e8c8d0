//! # Audio Capture Module
//!
//! This module handles real-time microphone capture using CPAL (Cross-Platform Audio Library)
//! and cuts the incoming stream into fixed-size analysis frames.
//!
//! ## Design
//! - The cpal callback only assembles frames and hands them over a bounded channel;
//!   it never blocks and never runs the estimator.
//! - The stream lives on a dedicated capture thread (cpal streams are not `Send`
//!   on every platform) that waits for a shutdown signal.
//! - [`CpalSource`] is the owning handle for that thread. Dropping it always
//!   stops the stream and releases the device.
//! - [`CaptureBackend`] and [`FrameSource`] are the seams the [`Tuner`](crate::Tuner)
//!   is written against, so the controller can be driven without hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::TunerConfig;

/// Audio buffer size for processing frames.
///
/// Larger buffers reach lower pitches but add latency.
/// 2048 samples is ~46ms at 44.1kHz.
pub const BUFFER_SIZE: usize = 2048;

/// Sample rate requested from the input device unless configured otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Frames the capture thread may queue ahead of the analysis tick.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Why a capture session could not be opened or closed cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The microphone grant was refused or revoked.
    #[error("microphone access was denied")]
    PermissionDenied,
    #[error("no audio input device available")]
    NoInputDevice,
    #[error("no supported f32 input format found")]
    UnsupportedFormat,
    #[error("audio device error: {0}")]
    Device(String),
    /// The capture thread exited or panicked behind our back.
    #[error("audio capture thread stopped unexpectedly")]
    WorkerGone,
}

// cpal reports a refused or revoked microphone grant as an unavailable device.
impl From<cpal::BuildStreamError> for CaptureError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::PermissionDenied,
            cpal::BuildStreamError::StreamConfigNotSupported => CaptureError::UnsupportedFormat,
            other => CaptureError::Device(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(err: cpal::PlayStreamError) -> Self {
        match err {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::PermissionDenied,
            other => CaptureError::Device(other.to_string()),
        }
    }
}

impl From<cpal::SupportedStreamConfigsError> for CaptureError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        match err {
            cpal::SupportedStreamConfigsError::DeviceNotAvailable => CaptureError::PermissionDenied,
            other => CaptureError::Device(other.to_string()),
        }
    }
}

/// A live supply of analysis frames.
///
/// Teardown is split into two steps so the caller can run both even when
/// the first one fails.
pub trait FrameSource {
    /// Sample rate of every frame this source yields, in Hz.
    fn sample_rate(&self) -> u32;

    /// The next pending frame, oldest first. Never blocks.
    fn next_frame(&mut self) -> Option<Vec<f32>>;

    /// Stops frame delivery and detaches from the audio graph.
    fn disconnect(&mut self) -> Result<(), CaptureError>;

    /// Releases the underlying hardware stream.
    fn release(&mut self) -> Result<(), CaptureError>;
}

/// Opens capture sessions. One session is open at a time per tuner.
pub trait CaptureBackend {
    type Source: FrameSource;

    /// Acquires the input device. May wait on the platform's permission prompt.
    fn open(&mut self, config: &TunerConfig) -> Result<Self::Source, CaptureError>;
}

/// Cuts an interleaved sample stream into mono frames of a fixed size.
///
/// Multi-channel input is down-mixed by averaging each sample frame.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    frame_size: usize,
    channels: usize,
    pending: Vec<f32>,
}

impl FrameAssembler {
    pub fn new(frame_size: usize, channels: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            channels: channels.max(1),
            pending: Vec::with_capacity(frame_size * 2),
        }
    }

    /// Appends callback data and emits every frame that is now complete.
    pub fn push<F: FnMut(Vec<f32>)>(&mut self, interleaved: &[f32], mut emit: F) {
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

        while self.pending.len() >= self.frame_size {
            let frame: Vec<f32> = self.pending.drain(..self.frame_size).collect();
            emit(frame);
        }
    }

    /// Samples waiting for the next frame to fill up.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Opens the system's default input device through cpal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CaptureBackend for CpalBackend {
    type Source = CpalSource;

    fn open(&mut self, config: &TunerConfig) -> Result<CpalSource, CaptureError> {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(config.channel_capacity.max(1));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let dropped = Arc::new(AtomicUsize::new(0));

        let request = StreamRequest {
            frame_size: config.frame_size,
            preferred_sample_rate: config.preferred_sample_rate,
            dropped: Arc::clone(&dropped),
        };

        let worker = thread::Builder::new()
            .name("choir-tuner-capture".into())
            .spawn(move || run_capture_worker(request, frame_tx, ready_tx, shutdown_rx))
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        // The only suspension point on start: wait for the device (and any
        // permission prompt) to answer.
        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(CpalSource {
                sample_rate,
                frames: Some(frame_rx),
                shutdown: Some(shutdown_tx),
                worker: Some(worker),
                dropped,
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(CaptureError::WorkerGone)
            }
        }
    }
}

/// Handle to a running cpal capture session.
#[derive(Debug)]
pub struct CpalSource {
    sample_rate: u32,
    frames: Option<Receiver<Vec<f32>>>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    dropped: Arc<AtomicUsize>,
}

impl CpalSource {
    /// Frames thrown away because the analysis side fell behind.
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FrameSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self) -> Option<Vec<f32>> {
        self.frames.as_ref()?.try_recv().ok()
    }

    fn disconnect(&mut self) -> Result<(), CaptureError> {
        self.frames = None;
        let Some(shutdown) = self.shutdown.take() else {
            return Ok(());
        };
        debug!(
            "[CAPTURE] Disconnecting source ({} frames dropped)",
            self.dropped_frames()
        );
        shutdown.send(()).map_err(|_| CaptureError::WorkerGone)
    }

    fn release(&mut self) -> Result<(), CaptureError> {
        // Make sure the worker is not left waiting for a signal.
        drop(self.shutdown.take());
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.join().map_err(|_| CaptureError::WorkerGone)?;
        info!("[CAPTURE] Input stream released");
        Ok(())
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!("[CAPTURE] Disconnect during drop failed: {e}");
        }
        if let Err(e) = self.release() {
            warn!("[CAPTURE] Release during drop failed: {e}");
        }
    }
}

struct StreamRequest {
    frame_size: usize,
    preferred_sample_rate: u32,
    dropped: Arc<AtomicUsize>,
}

/// Body of the capture thread: open the stream, report back, then hold the
/// stream until told to stop.
fn run_capture_worker(
    request: StreamRequest,
    frames: Sender<Vec<f32>>,
    ready: Sender<Result<u32, CaptureError>>,
    shutdown: Receiver<()>,
) {
    let stream = match start_audio_capture(request, frames) {
        Ok((stream, sample_rate)) => {
            let _ = ready.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            error!("[CAPTURE] Could not start audio capture: {e}");
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Returns on an explicit signal or once the source handle is gone.
    let _ = shutdown.recv();

    info!("[CAPTURE] Stopping input stream");
    if let Err(e) = stream.pause() {
        warn!("[CAPTURE] Error pausing stream: {e}");
    }
    drop(stream);
}

/// Starts audio capture from the default input device.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and its sample rate
/// * `Err(e)` - No device, no usable format, or the device refused to open
fn start_audio_capture(
    request: StreamRequest,
    sender: Sender<Vec<f32>>,
) -> Result<(cpal::Stream, u32), CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::NoInputDevice)?;

    match device.name() {
        Ok(name) => info!("[CAPTURE] Using audio input device: {name}"),
        Err(e) => warn!("[CAPTURE] Input device has no readable name: {e}"),
    }

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, request.preferred_sample_rate)
        .ok_or(CaptureError::UnsupportedFormat)?;

    let sample_rate = request.preferred_sample_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    info!("[CAPTURE] Selected {sample_rate} Hz, {channels} channel(s)");

    let mut assembler = FrameAssembler::new(request.frame_size, channels);
    let dropped = request.dropped;

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            assembler.push(data, |frame| {
                // Never block the audio thread; a full queue means the
                // analysis side is behind and this frame is stale anyway.
                if sender.try_send(frame).is_err() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            });
        },
        |err| error!("[CAPTURE] An error occurred on the audio stream: {err}"),
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Fewer channels win (mono needs no
/// down-mix), then the range closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() > 0 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| (c.channels(), rate_distance(c, target_rate)))
}

fn rate_distance(config: &SupportedStreamConfigRange, target_rate: u32) -> u32 {
    let min = config.min_sample_rate().0;
    let max = config.max_sample_rate().0;
    if (min..=max).contains(&target_rate) {
        0
    } else {
        min.abs_diff(target_rate).min(max.abs_diff(target_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::{SampleFormat, SampleRate, SupportedBufferSize};

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn assembles_fixed_size_frames_in_order() {
        let mut assembler = FrameAssembler::new(4, 1);
        let mut frames = Vec::new();

        assembler.push(&[1.0, 2.0, 3.0], |f| frames.push(f));
        assert!(frames.is_empty());
        assert_eq!(assembler.pending(), 3);

        assembler.push(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0], |f| frames.push(f));
        assert_eq!(frames, vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]);
        assert_eq!(assembler.pending(), 1);
    }

    #[test]
    fn downmixes_interleaved_stereo() {
        let mut assembler = FrameAssembler::new(2, 2);
        let mut frames = Vec::new();
        assembler.push(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], |f| frames.push(f));
        assert_eq!(frames, vec![vec![0.5, 0.5]]);
        assert_eq!(assembler.pending(), 1);
    }

    #[test]
    fn prefers_mono_float_near_target_rate() {
        let configs = vec![
            range(2, 44_100, 48_000, SampleFormat::F32),
            range(1, 8_000, 16_000, SampleFormat::F32),
            range(1, 44_100, 96_000, SampleFormat::I16),
            range(1, 32_000, 48_000, SampleFormat::F32),
        ];
        let chosen = find_supported_config(configs, 44_100).unwrap();
        assert_eq!(chosen.channels(), 1);
        assert_eq!(chosen.min_sample_rate(), SampleRate(32_000));
    }

    #[test]
    fn falls_back_to_multichannel_float() {
        let configs = vec![
            range(1, 44_100, 44_100, SampleFormat::I16),
            range(2, 48_000, 48_000, SampleFormat::F32),
        ];
        let chosen = find_supported_config(configs, 44_100).unwrap();
        assert_eq!(chosen.channels(), 2);

        let none = find_supported_config(vec![range(1, 44_100, 44_100, SampleFormat::U8)], 44_100);
        assert!(none.is_none());
    }

    #[test]
    fn cpal_errors_map_onto_capture_errors() {
        assert_eq!(
            CaptureError::from(cpal::BuildStreamError::DeviceNotAvailable),
            CaptureError::PermissionDenied
        );
        assert_eq!(
            CaptureError::from(cpal::BuildStreamError::StreamConfigNotSupported),
            CaptureError::UnsupportedFormat
        );
        assert!(matches!(
            CaptureError::from(cpal::BuildStreamError::InvalidArgument),
            CaptureError::Device(_)
        ));
    }
}
