//! Non-destructive image adjustments.
//!
//! Every change to an [`AdjustmentState`] re-derives the displayed image from
//! the untouched original: the result only depends on the current slider
//! values, never on the order in which they were moved. The colour stages run
//! in a fixed order and clamp to `[0, 255]` after each step, so later stages
//! see the range the earlier ones left behind. The filter selection runs last,
//! on the adjusted pixels.

pub mod kernel;

use serde::{Deserialize, Serialize};

use crate::{buffer::PixelBuffer, MediaEditError, Result};

use kernel::{luma, to_u8};

/// Percentage value at which a multiplicative parameter leaves pixels as-is.
pub const NEUTRAL: f32 = 100.0;
const FACTOR_RANGE: (f32, f32) = (0.0, 200.0);
const VIGNETTE_RANGE: (f32, f32) = (0.0, 100.0);

/// Mutually exclusive filter applied after the colour stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    None,
    Blur,
    Sharpen,
    Emboss,
    Contour,
    Grayscale,
}

/// Slider values driving the adjustment pipeline.
///
/// Multiplicative parameters are percentages in `[0, 200]` where 100 means
/// unchanged. The vignette strength lives in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentState {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub vibrance: f32,
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub vignette: f32,
    pub filter: Filter,
}

impl Default for AdjustmentState {
    fn default() -> Self {
        Self {
            brightness: NEUTRAL,
            contrast: NEUTRAL,
            saturation: NEUTRAL,
            vibrance: NEUTRAL,
            red: NEUTRAL,
            green: NEUTRAL,
            blue: NEUTRAL,
            vignette: 0.0,
            filter: Filter::None,
        }
    }
}

impl AdjustmentState {
    /// True when recomputing with this state reproduces the original.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Checks that every parameter lies inside its domain.
    pub fn validate(&self) -> Result<()> {
        let factors = [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("vibrance", self.vibrance),
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
        ];
        for (name, value) in factors {
            check_range(name, value, FACTOR_RANGE)?;
        }
        check_range("vignette", self.vignette, VIGNETTE_RANGE)
    }
}

fn check_range(name: &str, value: f32, (min, max): (f32, f32)) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(MediaEditError::invalid_input(format!(
            "{name} must lie in [{min}, {max}], got {value}"
        )))
    }
}

/// Derives the adjusted image from `original`. `original` is never modified.
pub fn recompute(original: &PixelBuffer, state: &AdjustmentState) -> Result<PixelBuffer> {
    state.validate()?;

    let mut planes = ColourPlanes::from_buffer(original);
    planes.scale(state.brightness / NEUTRAL);
    planes.contrast(state.contrast / NEUTRAL);
    planes.saturation(state.saturation / NEUTRAL);
    planes.vibrance(state.vibrance / NEUTRAL);
    planes.tint([
        state.red / NEUTRAL,
        state.green / NEUTRAL,
        state.blue / NEUTRAL,
    ]);
    if state.vignette > 0.0 {
        planes.vignette(state.vignette, original.width(), original.height());
    }

    let adjusted = planes.into_buffer(original)?;
    tracing::debug!(?state, "recomputed adjustments");
    Ok(apply_filter(&adjusted, state.filter))
}

/// Like [`recompute`], but hands back an untouched copy of `original` along
/// with the error when the pipeline cannot run.
pub fn recompute_or_original(
    original: &PixelBuffer,
    state: &AdjustmentState,
) -> (PixelBuffer, Option<MediaEditError>) {
    match recompute(original, state) {
        Ok(buffer) => (buffer, None),
        Err(err) => {
            tracing::warn!(%err, "adjustment failed, showing original");
            (original.clone(), Some(err))
        }
    }
}

/// Applies one filter of the fixed set to an already adjusted buffer.
pub fn apply_filter(buffer: &PixelBuffer, filter: Filter) -> PixelBuffer {
    match filter {
        Filter::None => buffer.clone(),
        Filter::Blur => kernel::convolve(buffer, &kernel::BLUR),
        Filter::Sharpen => kernel::convolve(buffer, &kernel::SHARPEN),
        Filter::Emboss => kernel::convolve(buffer, &kernel::EMBOSS),
        Filter::Contour => kernel::convolve(buffer, &kernel::CONTOUR),
        Filter::Grayscale => kernel::grayscale(buffer),
    }
}

/// Multiplies the colour channels by `factor`, the "colour" enhancement used
/// by the assistant tools.
pub fn boost_saturation(buffer: &PixelBuffer, factor: f32) -> Result<PixelBuffer> {
    let mut planes = ColourPlanes::from_buffer(buffer);
    planes.saturation(factor);
    planes.into_buffer(buffer)
}

/// Per-channel multiply, clipped to the 8-bit range.
pub fn tint(buffer: &PixelBuffer, factors: [f32; 3]) -> Result<PixelBuffer> {
    let mut planes = ColourPlanes::from_buffer(buffer);
    planes.tint(factors);
    planes.into_buffer(buffer)
}

/// Floating point RGB working copy. Alpha stays in the source buffer.
struct ColourPlanes {
    pixels: Vec<[f32; 3]>,
}

impl ColourPlanes {
    fn from_buffer(buffer: &PixelBuffer) -> Self {
        let pixels = buffer
            .data()
            .chunks_exact(buffer.channels())
            .map(|px| [px[0] as f32, px[1] as f32, px[2] as f32])
            .collect();
        Self { pixels }
    }

    fn into_buffer(self, template: &PixelBuffer) -> Result<PixelBuffer> {
        let channels = template.channels();
        let mut data = template.data().to_vec();
        for (dst, px) in data.chunks_exact_mut(channels).zip(&self.pixels) {
            for (channel, value) in px.iter().enumerate() {
                dst[channel] = to_u8(*value);
            }
        }
        PixelBuffer::new(template.width(), template.height(), template.format(), data)
            .map_err(|err| MediaEditError::AdjustmentFailed(err.to_string()))
    }

    fn for_each(&mut self, mut f: impl FnMut(&mut [f32; 3])) {
        for px in &mut self.pixels {
            f(px);
            for value in px.iter_mut() {
                *value = value.clamp(0.0, 255.0);
            }
        }
    }

    fn scale(&mut self, factor: f32) {
        if factor == 1.0 {
            return;
        }
        self.for_each(|px| px.iter_mut().for_each(|v| *v *= factor));
    }

    /// Spreads values away from (or towards) the mean grey of the image.
    fn contrast(&mut self, factor: f32) {
        if factor == 1.0 || self.pixels.is_empty() {
            return;
        }
        let total: f32 = self
            .pixels
            .iter()
            .map(|px| luma(to_u8(px[0]), to_u8(px[1]), to_u8(px[2])) as f32)
            .sum();
        let mean = (total / self.pixels.len() as f32).round();
        self.for_each(|px| {
            px.iter_mut()
                .for_each(|v| *v = mean + factor * (*v - mean))
        });
    }

    fn saturation(&mut self, factor: f32) {
        if factor == 1.0 {
            return;
        }
        self.for_each(|px| {
            let (h, s, v) = rgb_to_hsv(*px);
            *px = hsv_to_rgb(h, (s * factor).clamp(0.0, 1.0), v);
        });
    }

    /// Boosts saturation more for muted pixels:
    /// `s' = s * (1 + (amount - 1) * (1 - s))` with `s` in `[0, 1]`.
    fn vibrance(&mut self, amount: f32) {
        if amount == 1.0 {
            return;
        }
        self.for_each(|px| {
            let (h, s, v) = rgb_to_hsv(*px);
            let boosted = s * (1.0 + (amount - 1.0) * (1.0 - s));
            *px = hsv_to_rgb(h, boosted.clamp(0.0, 1.0), v);
        });
    }

    fn tint(&mut self, factors: [f32; 3]) {
        if factors == [1.0; 3] {
            return;
        }
        self.for_each(|px| {
            for (value, factor) in px.iter_mut().zip(factors) {
                *value *= factor;
            }
        });
    }

    /// Radial falloff: `mask = clamp(1 - sqrt(x² + y²) * amount / 100, 0, 1)`
    /// over a grid running from -1 to 1 on both axes.
    fn vignette(&mut self, amount: f32, width: u32, height: u32) {
        let strength = amount / 100.0;
        let width = width as usize;
        for (index, px) in self.pixels.iter_mut().enumerate() {
            let x = grid_coordinate((index % width) as u32, width as u32);
            let y = grid_coordinate((index / width) as u32, height);
            let mask = vignette_mask(x, y, strength);
            px.iter_mut().for_each(|v| *v *= mask);
        }
    }
}

/// Position of pixel `i` on an evenly spaced grid from -1 to 1.
fn grid_coordinate(i: u32, len: u32) -> f32 {
    if len <= 1 {
        return 0.0;
    }
    -1.0 + 2.0 * i as f32 / (len - 1) as f32
}

fn vignette_mask(x: f32, y: f32, strength: f32) -> f32 {
    (1.0 - (x * x + y * y).sqrt() * strength).clamp(0.0, 1.0)
}

/// RGB in `[0, 255]` to hue in `[0, 1)`, saturation in `[0, 1]` and value in
/// `[0, 255]`.
fn rgb_to_hsv([r, g, b]: [f32; 3]) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    if max <= 0.0 || delta <= 0.0 {
        return (0.0, 0.0, max);
    }

    let s = delta / max;
    let h = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    (h / 6.0, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    if s <= 0.0 {
        return [v; 3];
    }
    let h6 = (h * 6.0).rem_euclid(6.0);
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u8 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelFormat;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[
                    (x * 37 % 256) as u8,
                    (y * 53 % 256) as u8,
                    ((x + y) * 19 % 256) as u8,
                ]);
            }
        }
        PixelBuffer::new(width, height, PixelFormat::Rgb, data).unwrap()
    }

    #[test]
    fn identity_state_reproduces_original() {
        let original = gradient(9, 7);
        let out = recompute(&original, &AdjustmentState::default()).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn result_depends_only_on_current_values() {
        let original = gradient(8, 8);
        let mut state = AdjustmentState {
            brightness: 150.0,
            ..Default::default()
        };
        let _ = recompute(&original, &state).unwrap();
        state.contrast = 80.0;
        let after_two_moves = recompute(&original, &state).unwrap();

        let direct = AdjustmentState {
            contrast: 80.0,
            brightness: 150.0,
            ..Default::default()
        };
        assert_eq!(after_two_moves, recompute(&original, &direct).unwrap());
    }

    #[test]
    fn brightness_scales_and_clips() {
        let original = PixelBuffer::filled(2, 2, PixelFormat::Rgb, &[100, 200, 10]).unwrap();
        let state = AdjustmentState {
            brightness: 150.0,
            ..Default::default()
        };
        let out = recompute(&original, &state).unwrap();
        assert_eq!(out.pixel(0, 0), &[150, 255, 15]);
    }

    #[test]
    fn contrast_pivots_on_mean_grey() {
        let data = vec![50, 50, 50, 150, 150, 150];
        let original = PixelBuffer::new(2, 1, PixelFormat::Rgb, data).unwrap();

        let spread = AdjustmentState {
            contrast: 200.0,
            ..Default::default()
        };
        let out = recompute(&original, &spread).unwrap();
        assert_eq!(out.pixel(0, 0), &[0, 0, 0]);
        assert_eq!(out.pixel(1, 0), &[200, 200, 200]);

        let flat = AdjustmentState {
            contrast: 0.0,
            ..Default::default()
        };
        let out = recompute(&original, &flat).unwrap();
        assert_eq!(out.pixel(0, 0), &[100, 100, 100]);
        assert_eq!(out.pixel(1, 0), &[100, 100, 100]);
    }

    #[test]
    fn zero_saturation_produces_grey() {
        let original = PixelBuffer::filled(1, 1, PixelFormat::Rgb, &[200, 40, 90]).unwrap();
        let state = AdjustmentState {
            saturation: 0.0,
            ..Default::default()
        };
        let px = recompute(&original, &state).unwrap().into_data();
        assert_eq!(px, vec![200, 200, 200]);
    }

    #[test]
    fn vibrance_moves_muted_pixels_further() {
        let muted = [140.0, 120.0, 120.0];
        let vivid = [220.0, 40.0, 40.0];
        let mut planes = ColourPlanes {
            pixels: vec![muted, vivid],
        };
        planes.vibrance(1.5);

        let gain = |before: [f32; 3], after: [f32; 3]| rgb_to_hsv(after).1 / rgb_to_hsv(before).1;
        assert!(gain(muted, planes.pixels[0]) > gain(vivid, planes.pixels[1]));
    }

    #[test]
    fn tint_multiplies_channels_independently() {
        let original = PixelBuffer::filled(1, 1, PixelFormat::Rgba, &[100, 100, 100, 7]).unwrap();
        let state = AdjustmentState {
            red: 50.0,
            blue: 200.0,
            ..Default::default()
        };
        let out = recompute(&original, &state).unwrap();
        assert_eq!(out.pixel(0, 0), &[50, 100, 200, 7]);
    }

    #[test]
    fn vignette_spares_centre_and_darkens_corners() {
        let original = PixelBuffer::filled(5, 5, PixelFormat::Rgb, &[200, 200, 200]).unwrap();
        let state = AdjustmentState {
            vignette: 100.0,
            ..Default::default()
        };
        let out = recompute(&original, &state).unwrap();
        assert_eq!(out.pixel(2, 2), &[200, 200, 200]);
        assert_eq!(out.pixel(0, 0), &[0, 0, 0]);
        assert!(vignette_mask(1.0, 1.0, 0.5) < vignette_mask(0.5, 0.5, 0.5));
    }

    #[test]
    fn filter_runs_after_colour_stages() {
        let original = PixelBuffer::filled(3, 3, PixelFormat::Rgb, &[100, 50, 25]).unwrap();
        let state = AdjustmentState {
            brightness: 200.0,
            filter: Filter::Grayscale,
            ..Default::default()
        };
        let out = recompute(&original, &state).unwrap();
        let expected = luma(200, 100, 50);
        assert_eq!(out.pixel(1, 1), &[expected; 3]);
    }

    #[test]
    fn rejects_out_of_domain_parameters() {
        let original = gradient(2, 2);
        let state = AdjustmentState {
            vignette: 150.0,
            ..Default::default()
        };
        assert!(recompute(&original, &state).unwrap_err().is_input_error());

        let (shown, err) = recompute_or_original(&original, &state);
        assert_eq!(shown, original);
        assert!(err.is_some());
    }

    #[test]
    fn hsv_round_trip_is_stable() {
        for rgb in [[255.0, 0.0, 0.0], [12.0, 200.0, 99.0], [70.0, 70.0, 71.0]] {
            let (h, s, v) = rgb_to_hsv(rgb);
            let back = hsv_to_rgb(h, s, v);
            for (a, b) in rgb.iter().zip(back) {
                assert!((a - b).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn deserialises_partial_recipes() {
        let state: AdjustmentState =
            serde_json::from_str(r#"{ "brightness": 120, "filter": "emboss" }"#).unwrap();
        assert_eq!(state.brightness, 120.0);
        assert_eq!(state.contrast, NEUTRAL);
        assert_eq!(state.filter, Filter::Emboss);
    }
}
