//! Digital Butterworth filters as cascaded second-order sections.
//!
//! Designs follow the classic route: analog prototype poles on the unit
//! circle, frequency transform (lowpass to highpass/bandpass), then the
//! bilinear transform with pre-warped edges. Frequencies are normalised to
//! Nyquist, so `1.0` is half the sample rate.

use std::f64::consts::PI;

use realfft::num_complex::Complex64;

use crate::{MediaEditError, Result};

/// Bilinear transform constant `2 * fs` for a normalised rate of `fs = 2`.
const BILINEAR_K: f64 = 4.0;

/// One biquad in transposed direct form II. `a[0]` is implicitly 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Section {
    b: [f64; 3],
    a: [f64; 3],
}

impl Section {
    fn from_poles(z1: Complex64, z2: Complex64, b: [f64; 3]) -> Self {
        Self {
            b,
            a: [1.0, -(z1 + z2).re, (z1 * z2).re],
        }
    }

    fn response(&self, w: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = self.b[0] + z1 * self.b[1] + z2 * self.b[2];
        let den = self.a[0] + z1 * self.a[1] + z2 * self.a[2];
        num / den
    }

    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    /// State that makes the section output settle at once on a unit step.
    fn step_state(&self) -> [f64; 2] {
        let gain = self.dc_gain();
        let z2 = self.b[2] - self.a[2] * gain;
        let z1 = self.b[1] - self.a[1] * gain + z2;
        [z1, z2]
    }

    #[inline]
    fn tick(&self, state: &mut [f64; 2], x: f64) -> f64 {
        let y = self.b[0] * x + state[0];
        state[0] = self.b[1] * x - self.a[1] * y + state[1];
        state[1] = self.b[2] * x - self.a[2] * y;
        y
    }
}

/// Cascade of biquads.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Section>,
}

impl SosFilter {
    /// Butterworth highpass of the given order with a cutoff in `(0, 1)`.
    pub fn highpass(order: usize, cutoff: f64) -> Result<Self> {
        check_order(order)?;
        check_edge("highpass cutoff", cutoff)?;
        let warped = prewarp(cutoff);

        let sections = prototype_poles(order)
            .into_iter()
            .map(|p| {
                let z = bilinear(warped / p);
                if p.im.abs() < 1e-12 {
                    Section::from_poles(z, Complex64::new(0.0, 0.0), [1.0, -1.0, 0.0])
                } else {
                    Section::from_poles(z, z.conj(), [1.0, -2.0, 1.0])
                }
            })
            .collect();

        let mut filter = Self { sections };
        filter.normalise_at(PI);
        Ok(filter)
    }

    /// Butterworth bandpass. `order` is the prototype order, the resulting
    /// filter has twice as many poles.
    pub fn bandpass(order: usize, low: f64, high: f64) -> Result<Self> {
        check_order(order)?;
        check_edge("bandpass low edge", low)?;
        check_edge("bandpass high edge", high)?;
        if low >= high {
            return Err(MediaEditError::invalid_input(format!(
                "bandpass edges must be increasing, got {low} and {high}"
            )));
        }

        let (lo, hi) = (prewarp(low), prewarp(high));
        let bandwidth = hi - lo;
        let centre = (lo * hi).sqrt();
        let zeros = [1.0, 0.0, -1.0];

        let mut sections = Vec::with_capacity(order);
        for p in prototype_poles(order) {
            let scaled = p * (bandwidth / 2.0);
            let spread = (scaled * scaled - centre * centre).sqrt();
            let (s1, s2) = (scaled + spread, scaled - spread);
            if p.im.abs() < 1e-12 {
                sections.push(Section::from_poles(bilinear(s1), bilinear(s2), zeros));
            } else {
                for s in [s1, s2] {
                    let z = bilinear(s);
                    sections.push(Section::from_poles(z, z.conj(), zeros));
                }
            }
        }

        let mut filter = Self { sections };
        filter.normalise_at(2.0 * (centre / BILINEAR_K).atan());
        Ok(filter)
    }

    pub fn sections(&self) -> usize {
        self.sections.len()
    }

    /// Complex frequency response at `w` radians per sample.
    pub fn response(&self, w: f64) -> Complex64 {
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(w))
    }

    fn normalise_at(&mut self, w: f64) {
        let magnitude = self.response(w).norm();
        if magnitude > 0.0 && magnitude.is_finite() {
            if let Some(first) = self.sections.first_mut() {
                first.b.iter_mut().for_each(|b| *b /= magnitude);
            }
        }
    }

    /// Runs the cascade over `input`, starting from `state`.
    fn run(&self, input: &[f64], state: &mut [[f64; 2]]) -> Vec<f64> {
        input
            .iter()
            .map(|&x| {
                self.sections
                    .iter()
                    .zip(state.iter_mut())
                    .fold(x, |value, (section, st)| section.tick(st, value))
            })
            .collect()
    }

    /// Per-section steady-state for a unit step, scaled by the DC gain of the
    /// sections in front of each one.
    fn step_states(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z1, z2] = section.step_state();
                let state = [z1 * scale, z2 * scale];
                scale *= section.dc_gain();
                state
            })
            .collect()
    }

    /// Zero-phase filtering: forward pass, then backward pass over the
    /// reversed output. The signal is extended at both ends by odd reflection
    /// to tame start-up transients, and each pass starts from the steady
    /// state of its first sample.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        if input.is_empty() || self.sections.is_empty() {
            return input.to_vec();
        }

        let pad = (3 * (2 * self.sections.len() + 1)).min(input.len() - 1);
        let extended = odd_extend(input, pad);
        let zi = self.step_states();

        let mut state = scaled(&zi, extended[0]);
        let mut forward = self.run(&extended, &mut state);

        forward.reverse();
        let mut state = scaled(&zi, forward[0]);
        let mut backward = self.run(&forward, &mut state);
        backward.reverse();

        backward[pad..pad + input.len()].to_vec()
    }
}

fn scaled(states: &[[f64; 2]], by: f64) -> Vec<[f64; 2]> {
    states.iter().map(|[a, b]| [a * by, b * by]).collect()
}

fn odd_extend(input: &[f64], pad: usize) -> Vec<f64> {
    let first = input[0];
    let last = input[input.len() - 1];
    let n = input.len();

    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
    out.extend_from_slice(input);
    out.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i]));
    out
}

/// Analog Butterworth prototype poles, keeping one of each conjugate pair
/// (the upper half-plane one) plus the real pole for odd orders.
fn prototype_poles(order: usize) -> Vec<Complex64> {
    (0..order)
        .map(|k| {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            Complex64::from_polar(1.0, theta)
        })
        .filter(|p| p.im > -1e-12)
        .collect()
}

fn prewarp(edge: f64) -> f64 {
    BILINEAR_K * (PI * edge / 2.0).tan()
}

fn bilinear(s: Complex64) -> Complex64 {
    (BILINEAR_K + s) / (BILINEAR_K - s)
}

fn check_order(order: usize) -> Result<()> {
    if order == 0 {
        return Err(MediaEditError::invalid_input("filter order must be at least 1"));
    }
    Ok(())
}

fn check_edge(name: &str, edge: f64) -> Result<()> {
    if edge.is_finite() && edge > 0.0 && edge < 1.0 {
        Ok(())
    } else {
        Err(MediaEditError::invalid_input(format!(
            "{name} must lie strictly between 0 and Nyquist, got {edge}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highpass_blocks_dc_and_passes_nyquist() {
        let filter = SosFilter::highpass(5, 0.1).unwrap();
        assert_eq!(filter.sections(), 3);
        assert!(filter.response(0.0).norm() < 1e-9);
        assert!((filter.response(PI).norm() - 1.0).abs() < 1e-9);
        // -3 dB at the cutoff.
        let at_cutoff = filter.response(0.1 * PI).norm();
        assert!((at_cutoff - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn bandpass_has_unit_gain_in_band_and_rejects_edges() {
        let (low, high) = (300.0 / 22_050.0, 3_000.0 / 22_050.0);
        let filter = SosFilter::bandpass(5, low, high).unwrap();
        assert_eq!(filter.sections(), 5);

        let centre = 2.0 * (((prewarp(low) * prewarp(high)).sqrt()) / BILINEAR_K).atan();
        assert!((filter.response(centre).norm() - 1.0).abs() < 1e-9);
        assert!(filter.response(0.0).norm() < 1e-9);
        assert!(filter.response(PI).norm() < 1e-9);
        assert!((filter.response(low * PI).norm() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn rejects_edges_outside_nyquist() {
        assert!(SosFilter::highpass(5, 1.2).is_err());
        assert!(SosFilter::bandpass(5, 0.3, 0.2).is_err());
        assert!(SosFilter::highpass(0, 0.2).is_err());
    }

    #[test]
    fn filtfilt_removes_constant_offset_without_transient() {
        let filter = SosFilter::highpass(5, 0.1).unwrap();
        let input = vec![1_000.0; 512];
        let out = filtfilt_len_checked(&filter, &input);
        assert!(out.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn filtfilt_introduces_no_delay() {
        let filter = SosFilter::highpass(5, 0.1).unwrap();
        let input: Vec<f64> = (0..2_000)
            .map(|i| (i as f64 * 0.9 * PI / 2.0).sin() * 1_000.0)
            .collect();
        let out = filtfilt_len_checked(&filter, &input);
        // Well inside the passband the output should line up with the input.
        let mid = &out[500..1_500];
        let err: f64 = mid
            .iter()
            .zip(&input[500..1_500])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(err < 20.0, "max deviation {err}");
    }

    #[test]
    fn filtfilt_handles_tiny_inputs() {
        let filter = SosFilter::bandpass(5, 0.05, 0.2).unwrap();
        assert_eq!(filter.filtfilt(&[]).len(), 0);
        assert_eq!(filter.filtfilt(&[3.0]).len(), 1);
        assert_eq!(filter.filtfilt(&[3.0, -2.0, 1.0]).len(), 3);
    }

    fn filtfilt_len_checked(filter: &SosFilter, input: &[f64]) -> Vec<f64> {
        let out = filter.filtfilt(input);
        assert_eq!(out.len(), input.len());
        out
    }
}
