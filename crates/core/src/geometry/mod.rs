//! Geometric edits and the mapping between the on-screen canvas and buffer
//! pixel coordinates.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::{buffer::PixelBuffer, MediaEditError, Result};

/// Axis to mirror an image about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipAxis {
    /// Left and right swap.
    Horizontal,
    /// Top and bottom swap.
    Vertical,
}

/// Integer rectangle in buffer space, `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Two corners dragged out on the display canvas, in any order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropSelection {
    pub start: (f32, f32),
    pub end: (f32, f32),
}

impl CropSelection {
    pub fn new(start: (f32, f32), end: (f32, f32)) -> Self {
        Self { start, end }
    }

    /// Returns the same selection with `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(&self) -> Self {
        Self {
            start: (self.start.0.min(self.end.0), self.start.1.min(self.end.1)),
            end: (self.start.0.max(self.end.0), self.start.1.max(self.end.1)),
        }
    }

    /// Maps the selection into buffer space and clamps it to the buffer.
    pub fn to_buffer_rect(&self, display: (u32, u32), buffer: (u32, u32)) -> CropRect {
        let sel = self.normalized();
        let (x1, y1) = map_display_to_buffer(sel.start, display, buffer);
        let (x2, y2) = map_display_to_buffer(sel.end, display, buffer);
        let clamp_x = |v: f32| (v.max(0.0) as u32).min(buffer.0);
        let clamp_y = |v: f32| (v.max(0.0) as u32).min(buffer.1);
        CropRect {
            x1: clamp_x(x1),
            y1: clamp_y(y1),
            x2: clamp_x(x2),
            y2: clamp_y(y2),
        }
    }
}

/// Scales a canvas coordinate by `buffer / display` per axis. A zero-sized
/// display leaves the coordinate unscaled.
pub fn map_display_to_buffer(
    point: (f32, f32),
    display: (u32, u32),
    buffer: (u32, u32),
) -> (f32, f32) {
    let ratio = |buffer: u32, display: u32| {
        if display == 0 {
            1.0
        } else {
            buffer as f64 / display as f64
        }
    };
    (
        (point.0 as f64 * ratio(buffer.0, display.0)) as f32,
        (point.1 as f64 * ratio(buffer.1, display.1)) as f32,
    )
}

/// Extracts `rect` from `buffer`. The rectangle is ordered and clamped first;
/// an empty result is rejected.
pub fn crop(buffer: &PixelBuffer, rect: CropRect) -> Result<PixelBuffer> {
    let (width, height) = buffer.dimensions();
    let x1 = rect.x1.min(rect.x2).min(width);
    let x2 = rect.x1.max(rect.x2).min(width);
    let y1 = rect.y1.min(rect.y2).min(height);
    let y2 = rect.y1.max(rect.y2).min(height);
    if x2 == x1 || y2 == y1 {
        return Err(MediaEditError::InvalidCrop(format!(
            "selection ({x1}, {y1})-({x2}, {y2}) has no area"
        )));
    }

    let channels = buffer.channels();
    let row_bytes = (x2 - x1) as usize * channels;
    let mut data = Vec::with_capacity(row_bytes * (y2 - y1) as usize);
    for y in y1..y2 {
        let start = (y as usize * width as usize + x1 as usize) * channels;
        data.extend_from_slice(&buffer.data()[start..start + row_bytes]);
    }
    PixelBuffer::new(x2 - x1, y2 - y1, buffer.format(), data)
}

/// Parses a dimension typed by the user.
pub fn parse_dimension(text: &str) -> Result<i64> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| MediaEditError::invalid_input(format!("`{text}` is not a whole number")))
}

/// Lanczos resample to exactly `width` x `height`.
pub fn resize(buffer: &PixelBuffer, width: i64, height: i64) -> Result<PixelBuffer> {
    let (width, height) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(MediaEditError::invalid_input(
                "width and height must be positive numbers",
            ))
        }
    };
    if buffer.dimensions() == (width, height) {
        return Ok(buffer.clone());
    }
    let resized = buffer
        .to_dynamic()
        .resize_exact(width, height, FilterType::Lanczos3);
    Ok(PixelBuffer::from_dynamic(resized))
}

pub fn flip(buffer: &PixelBuffer, axis: FlipAxis) -> PixelBuffer {
    let image = buffer.to_dynamic();
    let flipped = match axis {
        FlipAxis::Horizontal => image.fliph(),
        FlipAxis::Vertical => image.flipv(),
    };
    PixelBuffer::from_dynamic(flipped)
}

/// Rotates counter-clockwise by `degrees`. The canvas grows to hold the whole
/// rotated image; uncovered corners are zero (transparent for RGBA).
/// Non-finite angles are rejected.
pub fn rotate(buffer: &PixelBuffer, degrees: f32) -> Result<PixelBuffer> {
    if !degrees.is_finite() {
        return Err(MediaEditError::invalid_input(format!(
            "rotation angle must be finite, got {degrees}"
        )));
    }
    let turn = degrees.rem_euclid(360.0);
    let quarter = (turn / 90.0).round();
    if (turn - quarter * 90.0).abs() < 1e-4 {
        let image = buffer.to_dynamic();
        return Ok(match quarter as u32 % 4 {
            0 => buffer.clone(),
            1 => PixelBuffer::from_dynamic(image.rotate270()),
            2 => PixelBuffer::from_dynamic(image.rotate180()),
            _ => PixelBuffer::from_dynamic(image.rotate90()),
        });
    }
    rotate_nearest(buffer, turn.to_radians())
}

fn rotate_nearest(buffer: &PixelBuffer, theta: f32) -> Result<PixelBuffer> {
    let (cos, sin) = (theta.cos(), theta.sin());
    let (width, height) = (buffer.width() as f32, buffer.height() as f32);
    let new_width = (width * cos.abs() + height * sin.abs() - 1e-4).ceil().max(1.0) as u32;
    let new_height = (width * sin.abs() + height * cos.abs() - 1e-4).ceil().max(1.0) as u32;

    let channels = buffer.channels();
    let mut data = vec![0_u8; new_width as usize * new_height as usize * channels];
    let (src_cx, src_cy) = (width / 2.0, height / 2.0);
    let (dst_cx, dst_cy) = (new_width as f32 / 2.0, new_height as f32 / 2.0);

    for dy in 0..new_height {
        for dx in 0..new_width {
            let x = dx as f32 + 0.5 - dst_cx;
            let y = dy as f32 + 0.5 - dst_cy;
            let sx = (x * cos - y * sin + src_cx).floor();
            let sy = (x * sin + y * cos + src_cy).floor();
            if sx < 0.0 || sy < 0.0 || sx >= width || sy >= height {
                continue;
            }
            let src = buffer.pixel(sx as u32, sy as u32);
            let offset = (dy as usize * new_width as usize + dx as usize) * channels;
            data[offset..offset + channels].copy_from_slice(src);
        }
    }

    PixelBuffer::new(new_width, new_height, buffer.format(), data)
}

/// Largest size with the image's aspect ratio that fits inside the canvas.
pub fn fit_to_canvas(image: (u32, u32), canvas: (u32, u32)) -> (u32, u32) {
    if image.0 == 0 || image.1 == 0 || canvas.0 == 0 || canvas.1 == 0 {
        return (0, 0);
    }
    let image_ratio = image.0 as f64 / image.1 as f64;
    let canvas_ratio = canvas.0 as f64 / canvas.1 as f64;
    let (width, height) = if image_ratio > canvas_ratio {
        (canvas.0, (canvas.0 as f64 / image_ratio) as u32)
    } else {
        ((canvas.1 as f64 * image_ratio) as u32, canvas.1)
    };
    (width.max(1), height.max(1))
}

/// Copy of `buffer` scaled to fit the canvas, for painting.
pub fn display_buffer(buffer: &PixelBuffer, canvas: (u32, u32)) -> Result<PixelBuffer> {
    let (width, height) = fit_to_canvas(buffer.dimensions(), canvas);
    resize(buffer, width as i64, height as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelFormat;

    fn numbered(width: u32, height: u32) -> PixelBuffer {
        let data = (0..width * height)
            .flat_map(|i| [i as u8, 0, 0])
            .collect();
        PixelBuffer::new(width, height, PixelFormat::Rgb, data).unwrap()
    }

    #[test]
    fn full_display_selection_keeps_whole_image() {
        let buffer = numbered(10, 6);
        let rect = CropSelection::new((0.0, 0.0), (800.0, 600.0)).to_buffer_rect((800, 600), (10, 6));
        assert_eq!(crop(&buffer, rect).unwrap(), buffer);
    }

    #[test]
    fn inverted_selection_is_normalised_and_clamped() {
        let rect = CropSelection::new((90.0, 70.0), (-20.0, 10.0)).to_buffer_rect((100, 100), (50, 50));
        assert_eq!(
            rect,
            CropRect {
                x1: 0,
                y1: 5,
                x2: 45,
                y2: 35
            }
        );
    }

    #[test]
    fn crop_extracts_sub_region() {
        let buffer = numbered(4, 3);
        let out = crop(
            &buffer,
            CropRect {
                x1: 1,
                y1: 1,
                x2: 3,
                y2: 3,
            },
        )
        .unwrap();
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(out.pixel(0, 0)[0], 5);
        assert_eq!(out.pixel(1, 1)[0], 10);
    }

    #[test]
    fn degenerate_crop_is_rejected() {
        let buffer = numbered(4, 4);
        let err = crop(
            &buffer,
            CropRect {
                x1: 2,
                y1: 0,
                x2: 2,
                y2: 4,
            },
        )
        .unwrap_err();
        assert!(matches!(err, MediaEditError::InvalidCrop(_)));
    }

    #[test]
    fn resize_rejects_non_positive_dimensions() {
        let buffer = numbered(4, 4);
        assert!(resize(&buffer, 0, 10).unwrap_err().is_input_error());
        assert!(resize(&buffer, 10, -3).unwrap_err().is_input_error());
        assert!(parse_dimension("12px").unwrap_err().is_input_error());
        assert_eq!(parse_dimension(" 64 ").unwrap(), 64);
    }

    #[test]
    fn resize_produces_requested_size() {
        let buffer = PixelBuffer::filled(8, 4, PixelFormat::Rgb, &[40, 80, 120]).unwrap();
        let out = resize(&buffer, 16, 8).unwrap();
        assert_eq!(out.dimensions(), (16, 8));
        assert_eq!(out.pixel(7, 3), &[40, 80, 120]);
    }

    #[test]
    fn quarter_turn_is_counter_clockwise() {
        let buffer = numbered(3, 2);
        let out = rotate(&buffer, 90.0).unwrap();
        assert_eq!(out.dimensions(), (2, 3));
        // The top-right pixel ends up top-left.
        assert_eq!(out.pixel(0, 0)[0], 2);
        assert_eq!(rotate(&buffer, 360.0).unwrap(), buffer);
        assert_eq!(rotate(&out, -90.0).unwrap(), buffer);
    }

    #[test]
    fn non_finite_angles_are_rejected() {
        let buffer = numbered(3, 2);
        for degrees in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(rotate(&buffer, degrees).unwrap_err().is_input_error());
        }
    }

    #[test]
    fn arbitrary_rotation_expands_canvas() {
        let buffer = PixelBuffer::filled(10, 10, PixelFormat::Rgba, &[1, 2, 3, 255]).unwrap();
        let out = rotate(&buffer, 45.0).unwrap();
        assert_eq!(out.dimensions(), (15, 15));
        assert_eq!(out.pixel(7, 7), &[1, 2, 3, 255]);
        assert_eq!(out.pixel(0, 0), &[0, 0, 0, 0]);
    }

    #[test]
    fn flips_about_both_axes() {
        let buffer = numbered(3, 2);
        assert_eq!(flip(&buffer, FlipAxis::Horizontal).pixel(0, 0)[0], 2);
        assert_eq!(flip(&buffer, FlipAxis::Vertical).pixel(0, 0)[0], 3);
    }

    #[test]
    fn fits_wide_and_tall_images() {
        assert_eq!(fit_to_canvas((1600, 400), (800, 600)), (800, 200));
        assert_eq!(fit_to_canvas((300, 600), (800, 600)), (300, 600));
        assert_eq!(fit_to_canvas((100, 100), (800, 600)), (600, 600));
    }

    #[test]
    fn maps_display_points_by_axis_ratio() {
        assert_eq!(map_display_to_buffer((400.0, 300.0), (800, 600), (1600, 300)), (800.0, 150.0));
    }
}
