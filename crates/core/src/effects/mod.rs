//! Destructive audio effects.
//!
//! Unlike image adjustments these stack: each one rewrites the working
//! [`SampleBuffer`] in place. Arithmetic happens in floating point and the
//! result is rounded and clipped back into the 16-bit range on write-back.
//! Sums that overshoot the range (echo, reverb) are rescaled so the loudest
//! sample lands exactly on full scale instead of clipping.

pub mod butterworth;

use serde::{Deserialize, Serialize};

use crate::{
    buffer::{clip_sample, SampleBuffer, SAMPLE_MAX},
    MediaEditError, MediaKind, Result,
};

pub use butterworth::SosFilter;

pub const ECHO_DELAY_SECONDS: f32 = 0.2;
pub const ECHO_GAIN: f32 = 0.5;
pub const REVERB_TAPS: [(f32, f32); 4] = [(0.02, 0.7), (0.04, 0.5), (0.08, 0.3), (0.16, 0.1)];
pub const FILTER_ORDER: usize = 5;
/// Highpass cutoff of the noise reduction, as a fraction of Nyquist.
pub const NOISE_CUTOFF: f64 = 0.1;
/// Voice band kept by the voice enhancement, in Hz.
pub const VOICE_BAND_HZ: (f64, f64) = (300.0, 3_000.0);
pub const PRE_EMPHASIS: f32 = 0.97;

/// Every effect the engine can apply to a sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEffect {
    Normalize,
    FadeIn,
    FadeOut,
    Reverse,
    Echo,
    Reverb,
    /// Highpass that strips rumble and hum.
    NoiseReduction,
    /// Bandpass around the speech band.
    VoiceEnhancement,
    /// Pre-emphasis followed by normalisation.
    Enhance,
}

impl AudioEffect {
    pub fn apply(self, buffer: &mut SampleBuffer) -> Result<()> {
        ensure_audio(buffer)?;
        match self {
            AudioEffect::Normalize => normalize(buffer),
            AudioEffect::FadeIn => fade(buffer, Fade::In),
            AudioEffect::FadeOut => fade(buffer, Fade::Out),
            AudioEffect::Reverse => reverse(buffer),
            AudioEffect::Echo => echo(buffer),
            AudioEffect::Reverb => reverb(buffer),
            AudioEffect::NoiseReduction => noise_reduction(buffer),
            AudioEffect::VoiceEnhancement => voice_enhancement(buffer),
            AudioEffect::Enhance => enhance(buffer),
        }?;
        tracing::debug!(effect = ?self, samples = buffer.len(), "applied audio effect");
        Ok(())
    }
}

fn ensure_audio(buffer: &SampleBuffer) -> Result<()> {
    if buffer.is_empty() {
        return Err(MediaEditError::NoMediaLoaded(MediaKind::Audio));
    }
    Ok(())
}

/// Scales the buffer so its loudest sample reaches 32767. Silence is left
/// alone.
pub fn normalize(buffer: &mut SampleBuffer) -> Result<()> {
    ensure_audio(buffer)?;
    let peak = buffer.peak();
    if peak == 0 {
        return Ok(());
    }
    let gain = SAMPLE_MAX / peak as f32;
    let scaled: Vec<f32> = buffer.samples().iter().map(|&s| s as f32 * gain).collect();
    buffer.write_f32(&scaled);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fade {
    In,
    Out,
}

/// Length of a fade: a tenth of the buffer, at most one second.
pub fn fade_length(buffer: &SampleBuffer) -> usize {
    (buffer.len() / 10).min(buffer.sample_rate() as usize)
}

/// Linear ramp over the first (fade in) or last (fade out) [`fade_length`]
/// samples.
pub fn fade(buffer: &mut SampleBuffer, direction: Fade) -> Result<()> {
    ensure_audio(buffer)?;
    let count = fade_length(buffer);
    let len = buffer.len();
    let start = match direction {
        Fade::In => 0,
        Fade::Out => len - count,
    };

    let samples = buffer.samples_mut();
    for (i, sample) in samples[start..start + count].iter_mut().enumerate() {
        let t = ramp(i, count);
        let gain = match direction {
            Fade::In => t,
            Fade::Out => 1.0 - t,
        };
        *sample = clip_sample(*sample as f32 * gain);
    }
    Ok(())
}

/// Evenly spaced values from 0 to 1 inclusive over `count` points.
fn ramp(i: usize, count: usize) -> f32 {
    if count <= 1 {
        return 0.0;
    }
    i as f32 / (count - 1) as f32
}

pub fn reverse(buffer: &mut SampleBuffer) -> Result<()> {
    ensure_audio(buffer)?;
    buffer.samples_mut().reverse();
    Ok(())
}

/// Adds one copy delayed by 200 ms at half gain.
pub fn echo(buffer: &mut SampleBuffer) -> Result<()> {
    ensure_audio(buffer)?;
    let delay = buffer.samples_for(ECHO_DELAY_SECONDS);
    apply_taps(buffer, &[(delay, ECHO_GAIN)]);
    Ok(())
}

/// Adds four decaying copies at 20, 40, 80 and 160 ms.
pub fn reverb(buffer: &mut SampleBuffer) -> Result<()> {
    ensure_audio(buffer)?;
    let taps: Vec<(usize, f32)> = REVERB_TAPS
        .iter()
        .map(|&(seconds, gain)| (buffer.samples_for(seconds), gain))
        .collect();
    apply_taps(buffer, &taps);
    Ok(())
}

/// `out[i] = in[i] + sum(gain * in[i - delay])` over every tap that fits
/// inside the buffer.
fn apply_taps(buffer: &mut SampleBuffer, taps: &[(usize, f32)]) {
    let input = buffer.to_f32();
    let mut out = input.clone();
    for &(delay, gain) in taps {
        if delay == 0 || delay >= input.len() {
            continue;
        }
        for (dst, src) in out[delay..].iter_mut().zip(&input) {
            *dst += gain * src;
        }
    }
    rescale_overflow(&mut out);
    buffer.write_f32(&out);
}

/// Brings the peak back to full scale when a sum ran past it.
fn rescale_overflow(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
    if peak > SAMPLE_MAX {
        let gain = SAMPLE_MAX / peak;
        samples.iter_mut().for_each(|s| *s *= gain);
    }
}

/// Zero-phase 5th order highpass at a tenth of Nyquist.
pub fn noise_reduction(buffer: &mut SampleBuffer) -> Result<()> {
    ensure_audio(buffer)?;
    let filter = SosFilter::highpass(FILTER_ORDER, NOISE_CUTOFF)?;
    apply_zero_phase(buffer, &filter);
    Ok(())
}

/// Zero-phase 5th order bandpass over 300 Hz to 3 kHz.
pub fn voice_enhancement(buffer: &mut SampleBuffer) -> Result<()> {
    ensure_audio(buffer)?;
    let nyquist = buffer.sample_rate() as f64 / 2.0;
    let (low, high) = VOICE_BAND_HZ;
    if high >= nyquist {
        return Err(MediaEditError::invalid_input(format!(
            "voice enhancement needs a sample rate above {} Hz, got {}",
            high * 2.0,
            buffer.sample_rate()
        )));
    }
    let filter = SosFilter::bandpass(FILTER_ORDER, low / nyquist, high / nyquist)?;
    apply_zero_phase(buffer, &filter);
    Ok(())
}

fn apply_zero_phase(buffer: &mut SampleBuffer, filter: &SosFilter) {
    let input: Vec<f64> = buffer.samples().iter().map(|&s| s as f64).collect();
    let filtered: Vec<f32> = filter
        .filtfilt(&input)
        .into_iter()
        .map(|s| s as f32)
        .collect();
    buffer.write_f32(&filtered);
}

/// First-order pre-emphasis `y[n] = x[n] - 0.97 x[n-1]`, then normalisation.
pub fn enhance(buffer: &mut SampleBuffer) -> Result<()> {
    ensure_audio(buffer)?;
    let input = buffer.to_f32();
    let mut out: Vec<f32> = Vec::with_capacity(input.len());
    let mut previous = 0.0;
    for &x in &input {
        out.push(x - PRE_EMPHASIS * previous);
        previous = x;
    }

    let peak = out.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        let gain = SAMPLE_MAX / peak;
        out.iter_mut().for_each(|s| *s *= gain);
    }
    buffer.write_f32(&out);
    Ok(())
}
