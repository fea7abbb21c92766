/// Immutable chunks of captured PCM audio.
///
/// Frames are produced by the device callback, stamped with a per-session
/// sequence number, and handed to the capture buffer. Nothing mutates a
/// frame after construction; the coordinator only ever reads them.
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub sample_rate: u32,
    pub channels: u16,
    /// Monotonically increasing per session, starting at 0. Used to detect
    /// gaps: a skipped number means audio was lost.
    pub sequence: u64,
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(sample_rate: u32, sequence: u64, samples: Vec<f32>) -> Self {
        AudioFrame {
            sample_rate,
            channels: 1,
            sequence,
            samples,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Energy-based silence check (RMS below threshold).
///
/// Used to skip recognition passes over windows that contain no speech;
/// feeding pure silence to Whisper tends to produce hallucinated text.
pub fn is_silence(samples: &[f32], threshold: f32) -> bool {
    if samples.is_empty() {
        return true;
    }

    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    let rms = (sum_squares / samples.len() as f32).sqrt();

    rms < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::new(16000, 0, vec![0.0; 1600]);
        assert_eq!(frame.duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_empty_audio_is_silence() {
        assert!(is_silence(&[], 0.01));
    }

    #[test]
    fn test_quiet_audio_is_silence() {
        let samples = vec![0.001; 1600];
        assert!(is_silence(&samples, 0.01));
    }

    #[test]
    fn test_loud_audio_is_not_silence() {
        let samples = vec![0.1; 1600];
        assert!(!is_silence(&samples, 0.01));
    }
}
