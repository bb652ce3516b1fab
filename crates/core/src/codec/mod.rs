//! Decoding and encoding between files and in-memory buffers.
//!
//! Images go through the `image` crate and keep an alpha channel when the
//! source had one. Audio goes through `hound`: any WAV layout is read, mixed
//! down to mono and stored as 16-bit samples; output is always 16-bit mono.

use std::{fs, io::Cursor, path::Path};

use image::ImageFormat;

use crate::{
    buffer::{clip_sample, PixelBuffer, SampleBuffer},
    MediaEditError, Result,
};

/// Full-scale value of a decoded 16-bit sample.
const SIXTEEN_BIT_SCALE: f32 = 32_768.0;

pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer> {
    let image = image::load_from_memory(bytes)?;
    Ok(PixelBuffer::from_dynamic(image))
}

/// Encodes `buffer` in `format`. Formats without alpha support get the
/// colour channels only.
pub fn encode_image(buffer: &PixelBuffer, format: ImageFormat) -> Result<Vec<u8>> {
    if buffer.is_empty() {
        return Err(MediaEditError::Encode("image has no pixels".into()));
    }

    let mut image = buffer.to_dynamic();
    if buffer.format().has_alpha() && !supports_alpha(format) {
        image = image::DynamicImage::ImageRgb8(image.into_rgb8());
    }

    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, format)
        .map_err(|err| MediaEditError::Encode(err.to_string()))?;
    Ok(bytes.into_inner())
}

fn supports_alpha(format: ImageFormat) -> bool {
    !matches!(format, ImageFormat::Jpeg)
}

pub fn load_image(path: impl AsRef<Path>) -> Result<PixelBuffer> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let image = decode_image(&bytes)?;
    tracing::info!(?path, width = image.width(), height = image.height(), "loaded image");
    Ok(image)
}

/// Writes `buffer` to `path`, picking the format from the file extension.
pub fn save_image(buffer: &PixelBuffer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path).map_err(|_| {
        MediaEditError::invalid_input(format!("no image format for {}", path.display()))
    })?;
    fs::write(path, encode_image(buffer, format)?)?;
    tracing::info!(?path, ?format, "saved image");
    Ok(())
}

/// Reads a WAV file image into a mono 16-bit buffer. Multi-channel audio is
/// averaged per frame.
pub fn decode_audio(bytes: &[u8]) -> Result<SampleBuffer> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(malformed_wav)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(malformed_wav)?,
        hound::SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<_, _>>()
                .map_err(malformed_wav)?
        }
    };

    let samples: Vec<i16> = interleaved
        .chunks(channels)
        .map(|frame| {
            let mean = frame.iter().sum::<f32>() / frame.len() as f32;
            clip_sample(mean * SIXTEEN_BIT_SCALE)
        })
        .collect();

    SampleBuffer::new(spec.sample_rate, samples)
}

/// In-memory reads only fail on short or corrupt input, so hound's I/O errors
/// are decode errors here too.
fn malformed_wav(err: hound::Error) -> MediaEditError {
    MediaEditError::Decode(err.to_string())
}

/// Serialises `buffer` as a 16-bit mono WAV file image.
pub fn encode_audio(buffer: &SampleBuffer) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut bytes, spec)
        .map_err(|err| MediaEditError::Encode(err.to_string()))?;
    for &sample in buffer.samples() {
        writer
            .write_sample(sample)
            .map_err(|err| MediaEditError::Encode(err.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|err| MediaEditError::Encode(err.to_string()))?;
    Ok(bytes.into_inner())
}

pub fn load_audio(path: impl AsRef<Path>) -> Result<SampleBuffer> {
    let path = path.as_ref();
    let buffer = decode_audio(&fs::read(path)?)?;
    tracing::info!(
        ?path,
        sample_rate = buffer.sample_rate(),
        samples = buffer.len(),
        "loaded audio"
    );
    Ok(buffer)
}

pub fn save_audio(buffer: &SampleBuffer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, encode_audio(buffer)?)?;
    tracing::info!(?path, samples = buffer.len(), "saved audio");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelFormat;

    fn stereo_wav(frames: &[(i16, i16)]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut bytes, spec).unwrap();
        for &(left, right) in frames {
            writer.write_sample(left).unwrap();
            writer.write_sample(right).unwrap();
        }
        writer.finalize().unwrap();
        bytes.into_inner()
    }

    #[test]
    fn mixes_stereo_down_to_mono() {
        let bytes = stereo_wav(&[(1_000, 3_000), (-2_000, -2_000), (32_767, -32_767)]);
        let buffer = decode_audio(&bytes).unwrap();
        assert_eq!(buffer.sample_rate(), 22_050);
        assert_eq!(buffer.samples(), &[2_000, -2_000, 0]);
    }

    #[test]
    fn reads_float_wavs() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut bytes = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut bytes, spec).unwrap();
        for value in [0.0_f32, 0.5, -1.0, 1.5] {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = decode_audio(&bytes.into_inner()).unwrap();
        assert_eq!(buffer.samples(), &[0, 16_384, -32_768, 32_767]);
    }

    #[test]
    fn audio_survives_a_save_and_load() {
        let buffer = SampleBuffer::new(44_100, vec![0, 1, -1, 12_345, i16::MIN, i16::MAX]).unwrap();
        let decoded = decode_audio(&encode_audio(&buffer).unwrap()).unwrap();
        assert_eq!(decoded, buffer);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_audio(b"not a wav file"),
            Err(MediaEditError::Decode(_))
        ));
        assert!(matches!(
            decode_image(b"not an image"),
            Err(MediaEditError::Decode(_))
        ));
    }

    #[test]
    fn truncated_wav_is_a_decode_error() {
        let buffer = SampleBuffer::new(8_000, vec![7; 64]).unwrap();
        let bytes = encode_audio(&buffer).unwrap();
        assert!(matches!(
            decode_audio(&bytes[..24]),
            Err(MediaEditError::Decode(_))
        ));
    }

    #[test]
    fn png_keeps_alpha() {
        let buffer = PixelBuffer::filled(4, 3, PixelFormat::Rgba, &[9, 8, 7, 6]).unwrap();
        let bytes = encode_image(&buffer, ImageFormat::Png).unwrap();
        assert_eq!(decode_image(&bytes).unwrap(), buffer);
    }

    #[test]
    fn jpeg_drops_alpha() {
        let buffer = PixelBuffer::filled(8, 8, PixelFormat::Rgba, &[200, 100, 50, 0]).unwrap();
        let bytes = encode_image(&buffer, ImageFormat::Jpeg).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.format(), PixelFormat::Rgb);
        assert_eq!(decoded.dimensions(), (8, 8));
    }

    #[test]
    fn save_image_needs_a_known_extension() {
        let buffer = PixelBuffer::filled(1, 1, PixelFormat::Rgb, &[0, 0, 0]).unwrap();
        let err = save_image(&buffer, "picture.unknownext").unwrap_err();
        assert!(err.is_input_error());
    }
}
