//! Channel mixing, resampling and WAV encoding for voice payloads.
//!
//! The orchestrator's voice endpoint takes a short mono recording.  We send
//! 16-bit PCM WAV, which every speech backend accepts:
//!
//! 1. [`stereo_to_mono`] — downmix interleaved channels.
//! 2. [`resample`] — linear interpolation to the configured rate.
//! 3. [`encode_wav`] — RIFF/WAVE container around PCM16 samples.

/// MIME type of [`encode_wav`] output.
pub const WAV_CONTENT_TYPE: &str = "audio/wav";

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// ```rust
/// use loan_chat_client::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.4, 0.2]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `from_rate` to `to_rate` Hz.
///
/// Same rate (or a zero rate on either side) returns the input unchanged.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(a), Some(b)) => a * (1.0 - frac) + b * frac,
                (Some(a), None) => *a,
                _ => 0.0,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// encode_wav
// ---------------------------------------------------------------------------

/// Encode mono `f32` samples as a 16-bit PCM WAV file.
///
/// Samples outside `[-1.0, 1.0]` are clamped.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS: u16 = 16;
    let block_align = CHANNELS * BITS / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = (samples.len() * block_align as usize) as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        let pcm = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        out.extend_from_slice(&pcm.to_le_bytes());
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_passthrough_and_zero_channels() {
        assert_eq!(stereo_to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        assert!(stereo_to_mono(&[0.1, 0.2], 0).is_empty());
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let input = vec![0.25_f32; 100];
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn resample_48k_to_16k_thirds_the_length() {
        let input = vec![0.5_f32; 480];
        let out = resample(&input, 48_000, 16_000);
        assert_eq!(out.len(), 160);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn resample_upsamples() {
        let out = resample(&[0.0, 1.0], 8_000, 16_000);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn wav_header_is_well_formed() {
        let wav = encode_wav(&[0.0, 1.0, -1.0, 2.0], 16_000);
        assert_eq!(wav.len(), 44 + 8);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 16_000);
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 8);

        let second = i16::from_le_bytes(wav[46..48].try_into().unwrap());
        let clamped = i16::from_le_bytes(wav[50..52].try_into().unwrap());
        assert_eq!(second, i16::MAX);
        assert_eq!(clamped, i16::MAX);
    }
}
