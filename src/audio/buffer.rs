//! Accumulates one recording as mono samples, up to a fixed duration.
//!
//! Unlike a ring buffer this keeps the *head* of the recording: once the
//! configured maximum is reached further audio is dropped and
//! [`RecordingBuffer::is_truncated`] reports it.
//!
//! # Example
//!
//! ```rust
//! use loan_chat_client::audio::{AudioChunk, RecordingBuffer};
//!
//! let mut buf = RecordingBuffer::new(1.0);
//! buf.push(&AudioChunk { samples: vec![0.1; 32_000], sample_rate: 16_000, channels: 2 });
//! assert!((buf.duration_secs() - 1.0).abs() < 1e-6);
//! ```

use super::capture::AudioChunk;
use super::encode::{resample, stereo_to_mono};

// ---------------------------------------------------------------------------
// RecordingBuffer
// ---------------------------------------------------------------------------

pub struct RecordingBuffer {
    samples: Vec<f32>,
    /// Rate of the first chunk; later chunks are resampled to it.
    sample_rate: Option<u32>,
    max_secs: f32,
    truncated: bool,
}

impl RecordingBuffer {
    pub fn new(max_secs: f32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate: None,
            max_secs: max_secs.max(0.0),
            truncated: false,
        }
    }

    /// Append a device chunk, downmixing to mono.
    pub fn push(&mut self, chunk: &AudioChunk) {
        if chunk.sample_rate == 0 {
            return;
        }
        let rate = *self.sample_rate.get_or_insert(chunk.sample_rate);

        let mono = stereo_to_mono(&chunk.samples, chunk.channels);
        let mono = resample(&mono, chunk.sample_rate, rate);

        let max_samples = (self.max_secs * rate as f32) as usize;
        let room = max_samples.saturating_sub(self.samples.len());
        if mono.len() > room {
            if !self.truncated {
                log::warn!("audio: recording reached {:.0}s, dropping the rest", self.max_secs);
            }
            self.truncated = true;
        }
        self.samples.extend(mono.into_iter().take(room));
    }

    /// Recorded length in seconds.
    pub fn duration_secs(&self) -> f32 {
        match self.sample_rate {
            Some(rate) => self.samples.len() as f32 / rate as f32,
            None => 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Discard everything and accept a new recording.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.sample_rate = None;
        self.truncated = false;
    }

    /// Take the recording, resampled to `target_rate`, and reset the buffer.
    pub fn take(&mut self, target_rate: u32) -> Vec<f32> {
        let samples = std::mem::take(&mut self.samples);
        let out = match self.sample_rate {
            Some(rate) => resample(&samples, rate, target_rate),
            None => samples,
        };
        self.clear();
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
