//! Fixed convolution kernels for the filter selection and a luma conversion.

use crate::buffer::PixelBuffer;

/// Square convolution kernel. Output is `sum / scale + offset`.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    size: usize,
    weights: &'static [f32],
    scale: f32,
    offset: f32,
}

#[rustfmt::skip]
pub const BLUR: Kernel = Kernel {
    size: 5,
    weights: &[
        1.0, 1.0, 1.0, 1.0, 1.0,
        1.0, 0.0, 0.0, 0.0, 1.0,
        1.0, 0.0, 0.0, 0.0, 1.0,
        1.0, 0.0, 0.0, 0.0, 1.0,
        1.0, 1.0, 1.0, 1.0, 1.0,
    ],
    scale: 16.0,
    offset: 0.0,
};

#[rustfmt::skip]
pub const SHARPEN: Kernel = Kernel {
    size: 3,
    weights: &[
        -2.0, -2.0, -2.0,
        -2.0, 32.0, -2.0,
        -2.0, -2.0, -2.0,
    ],
    scale: 16.0,
    offset: 0.0,
};

#[rustfmt::skip]
pub const EMBOSS: Kernel = Kernel {
    size: 3,
    weights: &[
        -1.0, 0.0, 0.0,
         0.0, 1.0, 0.0,
         0.0, 0.0, 0.0,
    ],
    scale: 1.0,
    offset: 128.0,
};

#[rustfmt::skip]
pub const CONTOUR: Kernel = Kernel {
    size: 3,
    weights: &[
        -1.0, -1.0, -1.0,
        -1.0,  8.0, -1.0,
        -1.0, -1.0, -1.0,
    ],
    scale: 1.0,
    offset: 255.0,
};

#[rustfmt::skip]
pub const SMOOTH_MORE: Kernel = Kernel {
    size: 5,
    weights: &[
        1.0, 1.0,  1.0, 1.0, 1.0,
        1.0, 5.0,  5.0, 5.0, 1.0,
        1.0, 5.0, 44.0, 5.0, 1.0,
        1.0, 5.0,  5.0, 5.0, 1.0,
        1.0, 1.0,  1.0, 1.0, 1.0,
    ],
    scale: 100.0,
    offset: 0.0,
};

/// Convolves the colour channels with `kernel`. Samples outside the image
/// repeat the nearest edge pixel. Alpha is carried over untouched.
pub fn convolve(buffer: &PixelBuffer, kernel: &Kernel) -> PixelBuffer {
    let (width, height) = buffer.dimensions();
    let mut out = buffer.clone();
    let radius = (kernel.size / 2) as i64;
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0_f32; 3];
            for ky in 0..kernel.size {
                let sy = (y as i64 + ky as i64 - radius).clamp(0, max_y) as u32;
                for kx in 0..kernel.size {
                    let weight = kernel.weights[ky * kernel.size + kx];
                    if weight == 0.0 {
                        continue;
                    }
                    let sx = (x as i64 + kx as i64 - radius).clamp(0, max_x) as u32;
                    let src = buffer.pixel(sx, sy);
                    for (channel, value) in acc.iter_mut().enumerate() {
                        *value += weight * src[channel] as f32;
                    }
                }
            }

            let dst = out.pixel_mut(x, y);
            for (channel, value) in acc.iter().enumerate() {
                dst[channel] = to_u8(value / kernel.scale + kernel.offset);
            }
        }
    }

    out
}

/// ITU-R 601-2 luma, written back to every colour channel.
pub fn grayscale(buffer: &PixelBuffer) -> PixelBuffer {
    let mut out = buffer.clone();
    let channels = out.channels();
    for px in out.data_mut().chunks_exact_mut(channels) {
        let l = luma(px[0], px[1], px[2]);
        px[0] = l;
        px[1] = l;
        px[2] = l;
    }
    out
}

pub(crate) fn luma(r: u8, g: u8, b: u8) -> u8 {
    to_u8((r as f32 * 299.0 + g as f32 * 587.0 + b as f32 * 114.0) / 1000.0)
}

pub(crate) fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
