//! Decoded, renderable audio

use crate::types::{Sample, StereoBuffer, StereoSample};

/// A whole track decoded to stereo f32 at its native sample rate
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    audio: StereoBuffer,
    sample_rate: u32,
}

impl DecodedBuffer {
    pub fn new(audio: StereoBuffer, sample_rate: u32) -> Self {
        Self { audio, sample_rate }
    }

    /// Build from interleaved samples with any channel count
    ///
    /// Mono is duplicated to both sides; channels beyond the first two are
    /// dropped.
    pub fn from_interleaved(samples: &[Sample], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = samples
            .chunks_exact(channels)
            .map(|frame| match frame {
                [mono] => StereoSample::mono(*mono),
                [left, right, ..] => StereoSample::new(*left, *right),
                [] => StereoSample::silence(),
            })
            .collect();
        Self::new(StereoBuffer::from_vec(frames), sample_rate)
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.audio.len()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn frame(&self, index: usize) -> Option<StereoSample> {
        self.audio.get(index)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn audio(&self) -> &StereoBuffer {
        &self.audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_is_duplicated() {
        let buffer = DecodedBuffer::from_interleaved(&[0.1, 0.2, 0.3], 1, 8000);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.frame(1), Some(StereoSample::mono(0.2)));
    }

    #[test]
    fn test_extra_channels_dropped() {
        let samples = [0.1, 0.2, 0.9, 0.3, 0.4, 0.9];
        let buffer = DecodedBuffer::from_interleaved(&samples, 3, 48000);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.frame(1), Some(StereoSample::new(0.3, 0.4)));
    }

    #[test]
    fn test_duration() {
        let buffer = DecodedBuffer::from_interleaved(&vec![0.0; 44100 * 2], 2, 22050);
        assert!((buffer.duration_seconds() - 2.0).abs() < 1e-9);
    }
}
