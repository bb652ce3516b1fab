//! Waveform downsampling for the audio view.
//!
//! Rendering picks every `stride`-th sample instead of averaging windows, which
//! keeps it cheap enough to redo after every effect and on every playback tick.
//! The picked samples are normalised by their own peak to fill the view height.

use serde::{Deserialize, Serialize};

use crate::config::WaveformConfig;

/// A point in view coordinates: `x` grows to the right, `y` grows downwards
/// with the centre line at half the view height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavePoint {
    pub x: f32,
    pub y: f32,
}

/// Downsampled view over a sample slice. Cheap to build; the points are
/// produced lazily and can be iterated any number of times.
#[derive(Debug, Clone, Copy)]
pub struct Waveform<'a> {
    samples: &'a [i16],
    stride: usize,
    count: usize,
    width: f32,
    centre: f32,
    scale: f32,
}

/// Prepares `samples` for a view of the configured size. The result holds at
/// most `config.width` points.
pub fn render<'a>(samples: &'a [i16], config: &WaveformConfig) -> Waveform<'a> {
    let width = config.width as usize;
    if samples.is_empty() || width == 0 {
        return Waveform {
            samples,
            stride: 1,
            count: 0,
            width: config.width as f32,
            centre: config.height as f32 / 2.0,
            scale: 0.0,
        };
    }

    let stride = samples.len().div_ceil(width).max(1);
    let count = samples.len().div_ceil(stride);
    let peak = samples
        .iter()
        .step_by(stride)
        .map(|s| s.unsigned_abs())
        .max()
        .unwrap_or(0);

    let centre = config.height as f32 / 2.0;
    let amplitude = (centre - config.margin).max(0.0);
    let scale = if peak == 0 {
        0.0
    } else {
        amplitude / peak as f32
    };

    Waveform {
        samples,
        stride,
        count,
        width: config.width as f32,
        centre,
        scale,
    }
}

impl<'a> Waveform<'a> {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn points(&self) -> WavePoints<'a> {
        WavePoints {
            view: *self,
            index: 0,
        }
    }

    /// Consecutive point pairs, ready to be drawn as line segments.
    pub fn segments(&self) -> impl Iterator<Item = (WavePoint, WavePoint)> + 'a {
        let mut previous = None;
        self.points().filter_map(move |point| previous.replace(point).map(|p| (p, point)))
    }

    fn point(&self, index: usize) -> WavePoint {
        let sample = self.samples[index * self.stride] as f32;
        WavePoint {
            x: index as f32 * self.width / self.count as f32,
            y: self.centre - sample * self.scale,
        }
    }
}

/// Iterator over the points of a [`Waveform`].
#[derive(Debug, Clone)]
pub struct WavePoints<'a> {
    view: Waveform<'a>,
    index: usize,
}

impl Iterator for WavePoints<'_> {
    type Item = WavePoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.view.count {
            return None;
        }
        let point = self.view.point(self.index);
        self.index += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.view.count - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WavePoints<'_> {}

/// Horizontal position of the playback indicator for `cursor` samples played.
pub fn playback_marker_x(cursor: usize, len: usize, width: u32) -> f32 {
    if len == 0 {
        return 0.0;
    }
    cursor.min(len) as f32 / len as f32 * width as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: u32, height: u32) -> WaveformConfig {
        WaveformConfig {
            width,
            height,
            margin: 10.0,
        }
    }

    #[test]
    fn never_exceeds_view_width() {
        for len in [1, 799, 800, 801, 1_000, 1_601, 44_100] {
            let samples: Vec<i16> = (0..len).map(|i| (i % 200) as i16).collect();
            let view = render(&samples, &config(800, 200));
            assert!(view.len() <= 800, "{len} samples gave {} points", view.len());
            assert_eq!(view.points().count(), view.len());
        }
    }

    #[test]
    fn takes_every_stride_th_sample() {
        let samples: Vec<i16> = (0..10).map(|i| i * 10).collect();
        let view = render(&samples, &config(5, 120));
        assert_eq!(view.stride(), 2);
        let ys: Vec<f32> = view.points().map(|p| p.y).collect();
        // Peak of the picked samples is 80, amplitude is 60 - 10 = 50.
        assert_eq!(ys, vec![60.0, 47.5, 35.0, 22.5, 10.0]);
        let xs: Vec<f32> = view.points().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn silence_is_a_flat_centre_line() {
        let samples = vec![0_i16; 5_000];
        let view = render(&samples, &config(100, 200));
        assert!(view.points().all(|p| p.y == 100.0));
    }

    #[test]
    fn rendering_is_deterministic_and_restartable() {
        let samples: Vec<i16> = (0..3_000).map(|i| ((i * 7919) % 65_536 - 32_768) as i16).collect();
        let view = render(&samples, &config(640, 160));
        let first: Vec<WavePoint> = view.points().collect();
        let again: Vec<WavePoint> = render(&samples, &config(640, 160)).points().collect();
        assert_eq!(first, again);
        assert_eq!(first, view.points().collect::<Vec<_>>());
    }

    #[test]
    fn segments_join_neighbouring_points() {
        let samples = vec![0_i16, 100, -100, 50];
        let view = render(&samples, &config(4, 100));
        let segments: Vec<_> = view.segments().collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].1, segments[1].0);
    }

    #[test]
    fn empty_input_has_no_points() {
        let view = render(&[], &config(800, 200));
        assert!(view.is_empty());
        assert_eq!(view.segments().count(), 0);
    }

    #[test]
    fn marker_follows_cursor() {
        assert_eq!(playback_marker_x(500, 1_000, 800), 400.0);
        assert_eq!(playback_marker_x(2_000, 1_000, 800), 800.0);
        assert_eq!(playback_marker_x(0, 0, 800), 0.0);
    }
}
