//! Microphone capture via `cpal`.
//!
//! `cpal::Stream` is not `Send`, so [`CpalAudioSource`] parks the stream on
//! a dedicated OS thread and hands back a [`CaptureHandle`] that is.  The
//! thread reports whether the device could be acquired before `start`
//! returns, then forwards [`CaptureEvent`]s until the handle is stopped.
//!
//! ```text
//! start() ──spawn──▶ capture thread: open device, build + play stream
//!    ◀── ready(Ok | Err) ──┘
//!                          cpal callback ──Chunk──▶ handle.events
//!                          stream error  ──Failed─▶ handle.events
//! handle.stop() ──drop stop_tx──▶ thread drops the stream and exits
//! ```

use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk / CaptureEvent
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

/// What the capture thread reports while a recording is running.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Chunk(AudioChunk),
    /// The device failed mid-recording; no further chunks will arrive.
    Failed(String),
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring or running the audio input.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio device failed while recording: {0}")]
    DeviceLost(String),

    #[error("audio capture unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// AudioSource trait
// ---------------------------------------------------------------------------

/// Something that can start a recording.
pub trait AudioSource: Send + Sync {
    /// Acquire the input device and start delivering [`CaptureEvent`]s.
    fn start(&self) -> Result<CaptureHandle, CaptureError>;
}

// Compile-time assertion: Box<dyn AudioSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioSource>) {}
};

// ---------------------------------------------------------------------------
// CaptureHandle
// ---------------------------------------------------------------------------

/// Owning handle of a running recording.
///
/// Dropping the handle also ends the recording: the capture thread notices
/// the stop channel closing and releases the device on its own.  Dropping
/// never waits for the thread; only [`stop`](Self::stop) does.
pub struct CaptureHandle {
    events: mpsc::Receiver<CaptureEvent>,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Wrap an event channel fed by something other than cpal.
    pub fn from_channel(events: mpsc::Receiver<CaptureEvent>) -> Self {
        Self {
            events,
            stop_tx: None,
            worker: None,
        }
    }

    /// Everything delivered since the last call, without blocking.
    pub fn drain(&self) -> Vec<CaptureEvent> {
        self.events.try_iter().collect()
    }

    /// Stop the device and return the events that were still queued.
    ///
    /// Blocks until the capture thread has exited, so async callers run it
    /// on a blocking thread.
    pub fn stop(mut self) -> Vec<CaptureEvent> {
        self.stop_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("audio: capture thread panicked");
            }
        }
        self.drain()
    }
}

// ---------------------------------------------------------------------------
// CpalAudioSource
// ---------------------------------------------------------------------------

/// The system default microphone.
///
/// # Example
///
/// ```rust,no_run
/// use loan_chat_client::audio::{AudioSource, CpalAudioSource};
///
/// let source = CpalAudioSource::new();
/// let handle = source.start().unwrap();
/// // ... speak ...
/// let events = handle.stop();
/// println!("{} events", events.len());
/// ```
#[derive(Debug, Default)]
pub struct CpalAudioSource;

impl CpalAudioSource {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&self) -> Result<CaptureHandle, CaptureError> {
        let (event_tx, event_rx) = mpsc::channel::<CaptureEvent>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();

        let worker = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || run_capture(event_tx, stop_rx, ready_tx))
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CaptureHandle {
                events: event_rx,
                stop_tx: Some(stop_tx),
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(CaptureError::Unavailable(
                    "capture thread exited before the device was ready".into(),
                ))
            }
        }
    }
}

/// Body of the capture thread.
fn run_capture(
    event_tx: mpsc::Sender<CaptureEvent>,
    stop_rx: mpsc::Receiver<()>,
    ready_tx: mpsc::Sender<Result<(), CaptureError>>,
) {
    let stream = match open_stream(event_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    // Blocks until the handle sends a stop signal or is dropped.
    let _ = stop_rx.recv();
    drop(stream);
    log::debug!("audio: capture stream closed");
}

fn open_stream(event_tx: mpsc::Sender<CaptureEvent>) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

    let supported = device.default_input_config()?;
    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    log::info!("audio: recording at {sample_rate} Hz, {channels} channel(s)");

    let error_tx = event_tx.clone();
    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let chunk = AudioChunk {
                samples: data.to_vec(),
                sample_rate,
                channels,
            };
            // Receiver gone means the recording was stopped.
            let _ = event_tx.send(CaptureEvent::Chunk(chunk));
        },
        move |err: cpal::StreamError| {
            log::error!("audio: stream error: {err}");
            let _ = error_tx.send(CaptureEvent::Failed(err.to_string()));
        },
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn handle_and_events_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CaptureHandle>();
        assert_send::<CaptureEvent>();
        assert_send::<CaptureError>();
    }

    #[test]
    fn channel_handle_drains_and_stops() {
        let (tx, rx) = mpsc::channel();
        let handle = CaptureHandle::from_channel(rx);

        tx.send(CaptureEvent::Chunk(AudioChunk {
            samples: vec![0.1; 4],
            sample_rate: 16_000,
            channels: 1,
        }))
        .unwrap();
        assert_eq!(handle.drain().len(), 1);
        assert!(handle.drain().is_empty());

        tx.send(CaptureEvent::Failed("unplugged".into())).unwrap();
        let rest = handle.stop();
        assert!(matches!(rest.as_slice(), [CaptureEvent::Failed(msg)] if msg == "unplugged"));
    }

    #[test]
    fn dropping_the_handle_does_not_wait_for_the_worker() {
        let (_event_tx, events) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            let _ = stop_rx.recv();
            // Slow device teardown.
            let _ = done_rx.recv_timeout(Duration::from_secs(5));
        });
        let handle = CaptureHandle {
            events,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        };

        let started = Instant::now();
        drop(handle);
        assert!(started.elapsed() < Duration::from_secs(1));
        let _ = done_tx.send(());
    }

    #[test]
    fn stop_waits_for_the_worker_and_collects_its_last_events() {
        let (event_tx, events) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            let _ = stop_rx.recv();
            std::thread::sleep(Duration::from_millis(20));
            let _ = event_tx.send(CaptureEvent::Chunk(AudioChunk {
                samples: vec![0.2; 8],
                sample_rate: 16_000,
                channels: 1,
            }));
        });
        let handle = CaptureHandle {
            events,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        };

        let tail = handle.stop();
        assert!(matches!(tail.as_slice(), [CaptureEvent::Chunk(c)] if c.samples.len() == 8));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            CaptureError::NoDevice.to_string(),
            "no input device found on the default audio host"
        );
        assert_eq!(
            CaptureError::DeviceLost("gone".into()).to_string(),
            "audio device failed while recording: gone"
        );
    }
}
