//! Audio input for voice turns: microphone capture → recording buffer → WAV.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → CaptureEvent (mpsc) → RecordingBuffer
//!           → stereo_to_mono / resample → encode_wav → AudioPayload
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use loan_chat_client::audio::{AudioSource, CaptureEvent, CpalAudioSource, RecordingBuffer};
//!
//! let handle = CpalAudioSource::new().start().unwrap();
//! let mut buf = RecordingBuffer::new(60.0);
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! for event in handle.stop() {
//!     if let CaptureEvent::Chunk(chunk) = event {
//!         buf.push(&chunk);
//!     }
//! }
//! println!("recorded {:.1}s", buf.duration_secs());
//! ```

pub mod buffer;
pub mod capture;
pub mod encode;

pub use buffer::RecordingBuffer;
pub use capture::{
    AudioChunk, AudioSource, CaptureError, CaptureEvent, CaptureHandle, CpalAudioSource,
};
pub use encode::{encode_wav, resample, stereo_to_mono, WAV_CONTENT_TYPE};
