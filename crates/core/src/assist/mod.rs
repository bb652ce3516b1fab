//! Local stand-ins for the assistant image tools.
//!
//! Each tool is a fixed recipe built from the adjustment and geometry
//! primitives. None of them reach out to a remote service.

use serde::{Deserialize, Serialize};

use crate::{
    adjust::{self, kernel},
    buffer::{PixelBuffer, PixelFormat},
    geometry, Result,
};

/// Colour multiplier used by [`auto_enhance`].
pub const ENHANCE_COLOUR: f32 = 1.2;
/// Channels above this value on all of R, G and B count as background.
pub const BACKGROUND_THRESHOLD: u8 = 200;
const VAN_GOGH_TINT: [f32; 3] = [1.1, 0.9, 1.2];

/// Artistic presets for [`style_transfer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    VanGogh,
    Picasso,
    Watercolor,
    UkiyoE,
    Abstract,
}

/// One of the assistant image tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageAssist {
    AutoEnhance,
    RemoveBackground,
    StyleTransfer(Style),
    SuperResolution,
}

impl ImageAssist {
    pub fn apply(self, buffer: &PixelBuffer) -> Result<PixelBuffer> {
        let result = match self {
            ImageAssist::AutoEnhance => auto_enhance(buffer),
            ImageAssist::RemoveBackground => Ok(remove_background(buffer)),
            ImageAssist::StyleTransfer(style) => style_transfer(buffer, style),
            ImageAssist::SuperResolution => super_resolution(buffer),
        }?;
        tracing::debug!(tool = ?self, dimensions = ?result.dimensions(), "applied image assist");
        Ok(result)
    }
}

/// Sharpens, then boosts colour by [`ENHANCE_COLOUR`].
pub fn auto_enhance(buffer: &PixelBuffer) -> Result<PixelBuffer> {
    let sharpened = kernel::convolve(buffer, &kernel::SHARPEN);
    adjust::boost_saturation(&sharpened, ENHANCE_COLOUR)
}

/// Makes near-white pixels transparent. The result is always RGBA.
pub fn remove_background(buffer: &PixelBuffer) -> PixelBuffer {
    let mut rgba = buffer.to_rgba();
    for px in rgba.data_mut().chunks_exact_mut(PixelFormat::Rgba.channels()) {
        if px[..3].iter().all(|&c| c > BACKGROUND_THRESHOLD) {
            px.copy_from_slice(&[255, 255, 255, 0]);
        }
    }
    rgba
}

pub fn style_transfer(buffer: &PixelBuffer, style: Style) -> Result<PixelBuffer> {
    match style {
        Style::VanGogh => adjust::tint(buffer, VAN_GOGH_TINT),
        Style::Picasso => Ok(kernel::convolve(buffer, &kernel::CONTOUR)),
        Style::Watercolor | Style::UkiyoE | Style::Abstract => {
            Ok(kernel::convolve(buffer, &kernel::SMOOTH_MORE))
        }
    }
}

/// Lanczos upscale to twice the width and height.
pub fn super_resolution(buffer: &PixelBuffer) -> Result<PixelBuffer> {
    let (width, height) = buffer.dimensions();
    geometry::resize(buffer, width as i64 * 2, height as i64 * 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_removal_clears_only_bright_pixels() {
        let data = vec![
            250, 250, 250, //
            201, 201, 200, //
            10, 220, 230, //
            255, 255, 255,
        ];
        let buffer = PixelBuffer::new(2, 2, PixelFormat::Rgb, data).unwrap();
        let out = remove_background(&buffer);

        assert_eq!(out.format(), PixelFormat::Rgba);
        assert_eq!(out.pixel(0, 0), &[255, 255, 255, 0]);
        assert_eq!(out.pixel(1, 0), &[201, 201, 200, 255]);
        assert_eq!(out.pixel(0, 1), &[10, 220, 230, 255]);
        assert_eq!(out.pixel(1, 1), &[255, 255, 255, 0]);
    }

    #[test]
    fn van_gogh_shifts_towards_blue_and_red() {
        let buffer = PixelBuffer::filled(3, 3, PixelFormat::Rgba, &[100, 100, 100, 77]).unwrap();
        let out = style_transfer(&buffer, Style::VanGogh).unwrap();
        assert_eq!(out.pixel(1, 1), &[110, 90, 120, 77]);
    }

    #[test]
    fn flat_images_survive_smoothing_and_enhance() {
        let buffer = PixelBuffer::filled(6, 6, PixelFormat::Rgb, &[40, 80, 120]).unwrap();
        let smooth = style_transfer(&buffer, Style::Watercolor).unwrap();
        assert_eq!(smooth, buffer);

        let grey = PixelBuffer::filled(6, 6, PixelFormat::Rgb, &[90, 90, 90]).unwrap();
        assert_eq!(auto_enhance(&grey).unwrap(), grey);
    }

    #[test]
    fn ukiyo_e_and_abstract_use_watercolor_smoothing() {
        let data = (0..5 * 5).flat_map(|i| [(i * 40 % 256) as u8, 60, 200]).collect();
        let buffer = PixelBuffer::new(5, 5, PixelFormat::Rgb, data).unwrap();
        let watercolor = style_transfer(&buffer, Style::Watercolor).unwrap();
        assert_ne!(watercolor, buffer);
        assert_eq!(style_transfer(&buffer, Style::UkiyoE).unwrap(), watercolor);
        assert_eq!(style_transfer(&buffer, Style::Abstract).unwrap(), watercolor);

        let style: Style = serde_json::from_str(r#""ukiyo_e""#).unwrap();
        assert_eq!(style, Style::UkiyoE);
    }

    #[test]
    fn super_resolution_doubles_dimensions() {
        let buffer = PixelBuffer::filled(5, 3, PixelFormat::Rgb, &[1, 2, 3]).unwrap();
        let out = ImageAssist::SuperResolution.apply(&buffer).unwrap();
        assert_eq!(out.dimensions(), (10, 6));
    }

    #[test]
    fn tools_parse_from_json() {
        let tool: ImageAssist = serde_json::from_str(r#"{"style_transfer":"van_gogh"}"#).unwrap();
        assert_eq!(tool, ImageAssist::StyleTransfer(Style::VanGogh));
        let tool: ImageAssist = serde_json::from_str(r#""remove_background""#).unwrap();
        assert_eq!(tool, ImageAssist::RemoveBackground);
    }
}
