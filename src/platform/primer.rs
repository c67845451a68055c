//! Primer - near-silent buffers for gesture-linked unlock heuristics
//!
//! Some platforms only consider output "unlocked" once something has actually
//! been played. The primer is a short burst of dithered noise far below
//! audibility, so it satisfies that heuristic without the user hearing it.
//! Key features:
//! - Amplitude-bounded output (never louder than the requested peak)
//! - Fixed seed, so identical input gives identical samples
//! - Pure functions (no side effects)

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Hard ceiling for primer amplitude (-60 dBFS)
pub const MAX_PRIMER_AMPLITUDE: f32 = 1.0e-3;

/// Number of frames needed to cover `hold` at `sample_rate`.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use audio_unlock::platform::primer::frames_for;
/// assert_eq!(frames_for(Duration::from_millis(250), 48000), 12000);
/// ```
#[inline]
pub fn frames_for(hold: Duration, sample_rate: u32) -> usize {
    (sample_rate as u128 * hold.as_millis() / 1000) as usize
}

/// Generates an interleaved near-silent primer buffer.
///
/// # Arguments
/// * `hold` - How long the buffer plays
/// * `sample_rate` - Sample rate in Hz
/// * `channels` - Interleaved channel count (every channel gets the same frame)
/// * `amplitude` - Requested peak, clamped to `0.0..=MAX_PRIMER_AMPLITUDE`
///
/// # Returns
/// `frames_for(hold, sample_rate) * channels` samples in `[-amplitude, amplitude]`
pub fn generate_primer(hold: Duration, sample_rate: u32, channels: usize, amplitude: f32) -> Vec<f32> {
    let frames = frames_for(hold, sample_rate);
    let channels = channels.max(1);
    let peak = amplitude.clamp(0.0, MAX_PRIMER_AMPLITUDE);

    let mut rng = StdRng::seed_from_u64(42);

    let mut samples = Vec::with_capacity(frames * channels);
    for _ in 0..frames {
        let value = if peak > 0.0 { rng.gen_range(-peak..=peak) } else { 0.0 };
        for _ in 0..channels {
            samples.push(value);
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primer_length() {
        let hold = Duration::from_millis(100);
        for &sr in &[44100, 48000, 96000] {
            let primer = generate_primer(hold, sr, 2, 1.0e-4);
            assert_eq!(
                primer.len(),
                frames_for(hold, sr) * 2,
                "Primer should cover exactly 100ms of stereo frames at {} Hz",
                sr
            );
        }
    }

    #[test]
    fn test_primer_stays_below_requested_peak() {
        let primer = generate_primer(Duration::from_millis(250), 48000, 1, 1.0e-4);
        for (i, &sample) in primer.iter().enumerate() {
            assert!(
                sample.abs() <= 1.0e-4,
                "Sample {} at index {} exceeds requested peak",
                sample,
                i
            );
        }
    }

    #[test]
    fn test_primer_amplitude_is_capped() {
        let primer = generate_primer(Duration::from_millis(100), 48000, 1, 0.5);
        assert!(primer.iter().all(|s| s.abs() <= MAX_PRIMER_AMPLITUDE));
    }

    #[test]
    fn test_primer_channels_share_frame_value() {
        let primer = generate_primer(Duration::from_millis(100), 48000, 2, 1.0e-4);
        for frame in primer.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_primer_deterministic() {
        let a = generate_primer(Duration::from_millis(100), 48000, 1, 1.0e-4);
        let b = generate_primer(Duration::from_millis(100), 48000, 1, 1.0e-4);
        assert_eq!(a, b, "Generation should be deterministic");
    }

    #[test]
    fn test_zero_amplitude_is_digital_silence() {
        let primer = generate_primer(Duration::from_millis(100), 48000, 1, 0.0);
        assert!(primer.iter().all(|&s| s == 0.0));
    }
}
