use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use crate::{MediaEditError, Result};

/// Opaque identifier of an open output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Device boundary the playback scheduler streams into.
///
/// Chunks are little-endian signed 16-bit mono PCM at the rate given to
/// [`OutputSink::open_stream`].
pub trait OutputSink {
    fn open_stream(&mut self, sample_rate: u32) -> Result<StreamHandle>;
    fn write(&mut self, handle: StreamHandle, bytes: &[u8]) -> Result<()>;
    fn close(&mut self, handle: StreamHandle) -> Result<()>;
}

/// Sink that keeps every chunk in memory. Used for previews without a device
/// and to observe the scheduler in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    next_handle: u64,
    open: Option<(StreamHandle, u32)>,
    chunks: Vec<Vec<u8>>,
    opened: usize,
    closed: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// Sample counts of the chunks received so far.
    pub fn chunk_lengths(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.len() / 2).collect()
    }

    /// All received audio decoded back into samples.
    pub fn samples(&self) -> Vec<i16> {
        self.chunks
            .iter()
            .flat_map(|c| c.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])))
            .collect()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.open.map(|(_, rate)| rate)
    }

    pub fn opened(&self) -> usize {
        self.opened
    }

    pub fn closed(&self) -> usize {
        self.closed
    }

    fn check(&self, handle: StreamHandle) -> Result<()> {
        match self.open {
            Some((open, _)) if open == handle => Ok(()),
            _ => Err(MediaEditError::msg(format!("stream {} is not open", handle.0))),
        }
    }
}

impl OutputSink for MemorySink {
    fn open_stream(&mut self, sample_rate: u32) -> Result<StreamHandle> {
        if self.open.is_some() {
            return Err(MediaEditError::msg("memory sink already has an open stream"));
        }
        self.next_handle += 1;
        let handle = StreamHandle(self.next_handle);
        self.open = Some((handle, sample_rate));
        self.opened += 1;
        Ok(handle)
    }

    fn write(&mut self, handle: StreamHandle, bytes: &[u8]) -> Result<()> {
        self.check(handle)?;
        self.chunks.push(bytes.to_vec());
        Ok(())
    }

    fn close(&mut self, handle: StreamHandle) -> Result<()> {
        self.check(handle)?;
        self.open = None;
        self.closed += 1;
        Ok(())
    }
}

/// Sink that records the stream into a mono 16-bit WAV file.
pub struct WavFileSink {
    path: PathBuf,
    next_handle: u64,
    writer: Option<(StreamHandle, hound::WavWriter<BufWriter<File>>)>,
}

impl WavFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            next_handle: 0,
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for WavFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavFileSink")
            .field("path", &self.path)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

impl OutputSink for WavFileSink {
    fn open_stream(&mut self, sample_rate: u32) -> Result<StreamHandle> {
        if self.writer.is_some() {
            return Err(MediaEditError::msg("wav sink already has an open stream"));
        }
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&self.path, spec)?;
        self.next_handle += 1;
        let handle = StreamHandle(self.next_handle);
        self.writer = Some((handle, writer));
        Ok(handle)
    }

    fn write(&mut self, handle: StreamHandle, bytes: &[u8]) -> Result<()> {
        let writer = match self.writer.as_mut() {
            Some((open, writer)) if *open == handle => writer,
            _ => return Err(MediaEditError::msg(format!("stream {} is not open", handle.0))),
        };
        for pair in bytes.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|err| MediaEditError::Encode(err.to_string()))?;
        }
        Ok(())
    }

    fn close(&mut self, handle: StreamHandle) -> Result<()> {
        match self.writer.take() {
            Some((open, writer)) if open == handle => writer
                .finalize()
                .map_err(|err| MediaEditError::Encode(err.to_string())),
            other => {
                self.writer = other;
                Err(MediaEditError::msg(format!("stream {} is not open", handle.0)))
            }
        }
    }
}
