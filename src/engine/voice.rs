//! Voice capture coordinator.
//!
//! ```text
//! Idle ──start──▶ Recording ──stop──▶ Stopping ──payload ready──▶ Sent
//!   ▲                │                                              │
//!   └─cancel / device failure / too short──┘      exchange settled ─┘
//! ```
//!
//! The coordinator only owns the device and the buffered audio.  Handing
//! the payload to the request serializer is the engine's job.

use std::sync::Arc;

use thiserror::Error;

use crate::audio::{
    encode_wav, AudioSource, CaptureError, CaptureEvent, CaptureHandle, RecordingBuffer,
    WAV_CONTENT_TYPE,
};
use crate::config::AudioConfig;
use crate::orchestrator::AudioPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Stopping,
    /// Payload handed over; waiting for the exchange to settle.
    Sent,
}

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("not recording")]
    NotRecording,

    #[error("recording too short ({secs:.1}s)")]
    TooShort { secs: f32 },
}

// ---------------------------------------------------------------------------
// VoiceCapture
// ---------------------------------------------------------------------------

pub struct VoiceCapture {
    source: Arc<dyn AudioSource>,
    config: AudioConfig,
    state: CaptureState,
    handle: Option<CaptureHandle>,
    buffer: RecordingBuffer,
}

impl VoiceCapture {
    pub fn new(source: Arc<dyn AudioSource>, config: AudioConfig) -> Self {
        let buffer = RecordingBuffer::new(config.max_recording_secs);
        Self {
            source,
            config,
            state: CaptureState::Idle,
            handle: None,
            buffer,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Acquire the device and begin recording.
    ///
    /// Returns `Ok(false)` without touching the device unless idle.
    pub fn start(&mut self) -> Result<bool, CaptureError> {
        if self.state != CaptureState::Idle {
            return Ok(false);
        }
        let handle = self.source.start()?;
        self.buffer.clear();
        self.handle = Some(handle);
        self.state = CaptureState::Recording;
        log::info!("voice: recording started");
        Ok(true)
    }

    /// Move queued device events into the buffer.
    ///
    /// A device failure discards the recording and returns to `Idle`.
    pub fn pump(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Recording {
            return Ok(());
        }
        let events = match &self.handle {
            Some(handle) => handle.drain(),
            None => Vec::new(),
        };
        self.absorb(events)
    }

    /// Finish the recording and encode it.
    ///
    /// Only valid while recording.  On success the state is `Sent` until
    /// [`settle`](Self::settle) is called.  Blocks while the capture thread
    /// winds down; see [`begin_stop`](Self::begin_stop) for the split form.
    pub fn stop(&mut self) -> Result<AudioPayload, VoiceError> {
        let handle = self.begin_stop()?;
        let tail = handle.map(CaptureHandle::stop).unwrap_or_default();
        self.finish_stop(tail)
    }

    /// First half of [`stop`](Self::stop): move to `Stopping` and hand back
    /// the device handle.  The caller stops it (which may block) and passes
    /// the remaining events to [`finish_stop`](Self::finish_stop).
    pub fn begin_stop(&mut self) -> Result<Option<CaptureHandle>, VoiceError> {
        if self.state != CaptureState::Recording {
            return Err(VoiceError::NotRecording);
        }
        self.state = CaptureState::Stopping;
        Ok(self.handle.take())
    }

    /// Second half of [`stop`](Self::stop).  Fails with `NotRecording` if
    /// the recording was cancelled in between.
    pub fn finish_stop(&mut self, tail: Vec<CaptureEvent>) -> Result<AudioPayload, VoiceError> {
        if self.state != CaptureState::Stopping {
            return Err(VoiceError::NotRecording);
        }
        self.absorb(tail)?;

        let secs = self.buffer.duration_secs();
        if secs < self.config.min_recording_secs {
            self.discard();
            return Err(VoiceError::TooShort { secs });
        }

        let samples = self.buffer.take(self.config.sample_rate);
        let bytes = encode_wav(&samples, self.config.sample_rate);
        self.state = CaptureState::Sent;
        log::info!("voice: recording stopped ({secs:.1}s, {} bytes)", bytes.len());

        Ok(AudioPayload {
            file_name: "recording.wav".into(),
            content_type: WAV_CONTENT_TYPE.into(),
            bytes,
            duration_secs: secs,
        })
    }

    /// Abandon the recording without sending anything.
    ///
    /// Returns `true` if a recording was running or stopping.  The device
    /// handle is dropped, not joined.
    pub fn cancel(&mut self) -> bool {
        if !matches!(self.state, CaptureState::Recording | CaptureState::Stopping) {
            return false;
        }
        self.discard();
        log::info!("voice: recording cancelled");
        true
    }

    /// The exchange carrying the last payload has settled.
    pub fn settle(&mut self) {
        if self.state == CaptureState::Sent {
            self.state = CaptureState::Idle;
        }
    }

    fn absorb(&mut self, events: Vec<CaptureEvent>) -> Result<(), CaptureError> {
        for event in events {
            match event {
                CaptureEvent::Chunk(chunk) => self.buffer.push(&chunk),
                CaptureEvent::Failed(reason) => {
                    log::warn!("voice: device failed, discarding recording: {reason}");
                    self.discard();
                    return Err(CaptureError::DeviceLost(reason));
                }
            }
        }
        Ok(())
    }

    fn discard(&mut self) {
        self.buffer.clear();
        self.handle = None;
        self.state = CaptureState::Idle;
    }
}

// ---------------------------------------------------------------------------
// FakeAudioSource (test double)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use fake::FakeAudioSource;


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
