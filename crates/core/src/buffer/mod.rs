//! Decoded media held in memory.
//!
//! [`PixelBuffer`] and [`SampleBuffer`] are plain value types. Sessions keep an
//! untouched original next to the working copy and replace the working copy
//! wholesale whenever something is recomputed.

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::{MediaEditError, Result};

/// Largest magnitude a 16-bit sample can take on the positive side.
pub const SAMPLE_MAX: f32 = i16::MAX as f32;

/// Channel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgba)
    }
}

/// Interleaved 8-bit image data. `data.len() == width * height * channels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(MediaEditError::invalid_input(format!(
                "pixel data holds {} bytes, {width}x{height} {format:?} needs {expected}",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Creates a buffer where every pixel has the same value.
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> Result<Self> {
        if pixel.len() != format.channels() {
            return Err(MediaEditError::invalid_input(
                "fill pixel does not match the pixel format",
            ));
        }
        let count = width as usize * height as usize;
        Self::new(width, height, format, pixel.repeat(count))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable view of the pixel bytes. The length is fixed, so the size
    /// invariant holds.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the channels of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let offset = self.offset(x, y);
        &self.data[offset..offset + self.channels()]
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let offset = self.offset(x, y);
        let channels = self.channels();
        &mut self.data[offset..offset + channels]
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels()
    }

    /// Converts to RGBA, giving every pixel full opacity when the buffer had
    /// no alpha channel.
    pub fn to_rgba(&self) -> PixelBuffer {
        match self.format {
            PixelFormat::Rgba => self.clone(),
            PixelFormat::Rgb => {
                let data = self
                    .data
                    .chunks_exact(3)
                    .flat_map(|px| [px[0], px[1], px[2], u8::MAX])
                    .collect();
                PixelBuffer {
                    width: self.width,
                    height: self.height,
                    format: PixelFormat::Rgba,
                    data,
                }
            }
        }
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        match self.format {
            PixelFormat::Rgb => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8),
            PixelFormat::Rgba => RgbaImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgba8),
        }
        .unwrap_or_else(|| DynamicImage::new_rgb8(0, 0))
    }

    /// Builds a buffer from any decoded image. Images with an alpha channel
    /// stay RGBA, everything else becomes RGB8.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        if image.color().has_alpha() {
            let rgba = image.into_rgba8();
            let (width, height) = rgba.dimensions();
            Self {
                width,
                height,
                format: PixelFormat::Rgba,
                data: rgba.into_raw(),
            }
        } else {
            let rgb = image.into_rgb8();
            let (width, height) = rgb.dimensions();
            Self {
                width,
                height,
                format: PixelFormat::Rgb,
                data: rgb.into_raw(),
            }
        }
    }
}

/// Mono 16-bit audio at a fixed sample rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    sample_rate: u32,
    samples: Vec<i16>,
}

impl SampleBuffer {
    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(MediaEditError::invalid_input(
                "sample rate must be a positive integer",
            ));
        }
        Ok(Self {
            sample_rate,
            samples,
        })
    }

    /// Builds a buffer from floating point values in the 16-bit domain,
    /// rounding and clipping each one.
    pub fn from_f32(sample_rate: u32, samples: &[f32]) -> Result<Self> {
        Self::new(sample_rate, samples.iter().copied().map(clip_sample).collect())
    }

    /// A buffer of `seconds` of digital silence.
    pub fn silent(sample_rate: u32, seconds: f32) -> Result<Self> {
        let len = (sample_rate as f32 * seconds.max(0.0)).round() as usize;
        Self::new(sample_rate, vec![0; len])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Number of whole samples covering `seconds` at this buffer's rate.
    pub fn samples_for(&self, seconds: f32) -> usize {
        // Nudge up so 0.02 s at 100 Hz is 2 samples despite f32 representation.
        (seconds as f64 * self.sample_rate as f64 + 1e-6).floor().max(0.0) as usize
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32).collect()
    }

    /// Replaces the sample data with floating point values, rounding and
    /// clipping them back into the 16-bit range.
    pub fn write_f32(&mut self, samples: &[f32]) {
        self.samples = samples.iter().copied().map(clip_sample).collect();
    }

    pub fn samples_mut(&mut self) -> &mut Vec<i16> {
        &mut self.samples
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

/// Rounds a floating point sample and clips it into `[-32768, 32767]`.
pub fn clip_sample(value: f32) -> i16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_pixel_data() {
        let err = PixelBuffer::new(2, 2, PixelFormat::Rgb, vec![0; 11]).unwrap_err();
        assert!(err.is_input_error());
        assert!(PixelBuffer::new(2, 2, PixelFormat::Rgba, vec![0; 16]).is_ok());
    }

    #[test]
    fn addresses_pixels_row_major() {
        let data: Vec<u8> = (0..12).collect();
        let buffer = PixelBuffer::new(2, 2, PixelFormat::Rgb, data).unwrap();
        assert_eq!(buffer.pixel(1, 0), &[3, 4, 5]);
        assert_eq!(buffer.pixel(0, 1), &[6, 7, 8]);
    }

    #[test]
    fn round_trips_through_dynamic_image() {
        let buffer = PixelBuffer::filled(3, 2, PixelFormat::Rgba, &[10, 20, 30, 40]).unwrap();
        let back = PixelBuffer::from_dynamic(buffer.to_dynamic());
        assert_eq!(back, buffer);
    }

    #[test]
    fn clips_and_rounds_samples() {
        assert_eq!(clip_sample(40_000.0), i16::MAX);
        assert_eq!(clip_sample(-40_000.0), i16::MIN);
        assert_eq!(clip_sample(1.6), 2);
        assert_eq!(clip_sample(f32::NAN), 0);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(SampleBuffer::new(0, vec![1, 2, 3]).is_err());
    }

    #[test]
    fn reports_peak_including_negative_extreme() {
        let buffer = SampleBuffer::new(8_000, vec![5, i16::MIN, 7]).unwrap();
        assert_eq!(buffer.peak(), 32_768);
    }
}
