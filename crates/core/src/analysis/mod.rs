use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{buffer::SampleBuffer, MediaEditError, MediaKind, Result};

/// Block length used for the spectral centroid.
pub const ANALYSIS_BLOCK: usize = 2048;

/// Level and brightness figures for a sample buffer, shown next to the
/// waveform and printed by the command line `info` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSummary {
    pub sample_rate: u32,
    pub samples: usize,
    pub duration_seconds: f32,
    /// Largest absolute sample value.
    pub peak: u16,
    pub rms: f32,
    /// Mean spectral centroid across all blocks, in Hz.
    pub spectral_centroid_hz: f32,
}

/// Computes an [`AudioSummary`] for `buffer`.
pub fn analyze(buffer: &SampleBuffer) -> Result<AudioSummary> {
    if buffer.is_empty() {
        return Err(MediaEditError::NoMediaLoaded(MediaKind::Audio));
    }

    let samples = buffer.to_f32();
    let mut analyzer = SpectrumAnalyzer::new(buffer.sample_rate());
    let mut centroid_sum = 0.0;
    let mut weighted_blocks = 0;
    for block in samples.chunks(ANALYSIS_BLOCK).filter(|b| b.len() >= 2) {
        if let Some(centroid) = analyzer.spectral_centroid(block)? {
            centroid_sum += centroid;
            weighted_blocks += 1;
        }
    }

    Ok(AudioSummary {
        sample_rate: buffer.sample_rate(),
        samples: buffer.len(),
        duration_seconds: buffer.duration_seconds(),
        peak: buffer.peak(),
        rms: compute_rms(&samples),
        spectral_centroid_hz: if weighted_blocks == 0 {
            0.0
        } else {
            centroid_sum / weighted_blocks as f32
        },
    })
}

/// Reusable FFT state for measuring blocks of one sample rate.
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    /// Magnitude-weighted mean frequency of a Hann-windowed block. Silent
    /// blocks have no centroid.
    pub fn spectral_centroid(&mut self, samples: &[f32]) -> Result<Option<f32>> {
        let len = samples.len();
        if len < 2 {
            return Err(MediaEditError::invalid_input(
                "analysis requires blocks with at least two samples",
            ));
        }

        let sample_rate = self.sample_rate as f32;
        let fft = self.prepare_fft(len);

        for (index, value) in samples.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let mut magnitude_sum = 0.0;
        let mut weighted_sum = 0.0;
        let bin_hz = sample_rate / len as f32;

        for (i, bin) in fft.spectrum.iter().enumerate() {
            let magnitude = bin.norm();
            magnitude_sum += magnitude;
            weighted_sum += magnitude * (i as f32 * bin_hz);
        }

        if magnitude_sum <= f32::EPSILON {
            Ok(None)
        } else {
            Ok(Some(weighted_sum / magnitude_sum))
        }
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let resources = match self.fft.take() {
            Some(fft) if fft.size == size => fft,
            _ => {
                let plan = self.fft_planner.plan_fft_forward(size);
                FftResources {
                    size,
                    scratch: plan.make_scratch_vec(),
                    spectrum: plan.make_output_vec(),
                    input: plan.make_input_vec(),
                    plan,
                }
            }
        };
        self.fft.insert(resources)
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .field("fft", &self.fft)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(sample_rate: u32, freq: f32, len: usize) -> SampleBuffer {
        let samples: Vec<f32> = (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 12_000.0)
            .collect();
        SampleBuffer::from_f32(sample_rate, &samples).unwrap()
    }

    #[test]
    fn summarises_silence() {
        let summary = analyze(&SampleBuffer::silent(48_000, 0.5).unwrap()).unwrap();
        assert_eq!(summary.samples, 24_000);
        assert_eq!(summary.peak, 0);
        assert_eq!(summary.rms, 0.0);
        assert_eq!(summary.spectral_centroid_hz, 0.0);
        assert!((summary.duration_seconds - 0.5).abs() < 1e-6);
    }

    #[test]
    fn centroid_tracks_tone_frequency() {
        let low = analyze(&tone(16_000, 500.0, 8_192)).unwrap();
        let high = analyze(&tone(16_000, 4_000.0, 8_192)).unwrap();

        assert!((low.spectral_centroid_hz - 500.0).abs() < 100.0);
        assert!((high.spectral_centroid_hz - 4_000.0).abs() < 200.0);
        assert!((low.rms - 12_000.0 / 2.0_f32.sqrt()).abs() < 50.0);
    }

    #[test]
    fn empty_buffer_has_no_summary() {
        let empty = SampleBuffer::new(8_000, Vec::new()).unwrap();
        assert!(matches!(
            analyze(&empty),
            Err(MediaEditError::NoMediaLoaded(MediaKind::Audio))
        ));
    }

    #[test]
    fn rejects_single_sample_blocks() {
        let mut analyzer = SpectrumAnalyzer::new(8_000);
        assert!(analyzer.spectral_centroid(&[1.0]).is_err());
    }
}
