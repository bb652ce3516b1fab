//! Chunked, cancellable playback.
//!
//! The scheduler is cooperative: its owner calls [`PlaybackScheduler::tick`]
//! on a timer, and each tick writes at most one chunk to the output sink.
//! Cancellation is checked at the top of every tick, before any I/O, and
//! [`PlaybackScheduler::stop`] closes the stream before it returns.

mod sink;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{buffer::SampleBuffer, config::PlaybackConfig, MediaEditError, MediaKind, Result};

pub use sink::{MemorySink, OutputSink, StreamHandle, WavFileSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    /// Transient state while the stream is being closed.
    Stopping,
}

/// Shared flag that asks a running session to stop at its next tick.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is playing.
    Idle,
    /// One chunk of `samples` samples went out, more remain.
    Wrote { samples: usize },
    /// The last chunk went out and the session returned to idle.
    Finished { samples: usize },
    /// The session was cancelled through its token and is now idle.
    Cancelled,
}

/// Streams a sample buffer to an [`OutputSink`] one chunk per tick.
#[derive(Debug)]
pub struct PlaybackScheduler<S: OutputSink> {
    sink: S,
    state: PlaybackState,
    cursor: usize,
    chunk_size: usize,
    tick_interval: Duration,
    stream: Option<StreamHandle>,
    cancel: CancellationToken,
    volume: f32,
    speed: f32,
}

impl<S: OutputSink> PlaybackScheduler<S> {
    pub fn new(sink: S, config: &PlaybackConfig) -> Self {
        Self {
            sink,
            state: PlaybackState::Idle,
            cursor: 0,
            chunk_size: config.chunk_size,
            tick_interval: config.tick_interval(),
            stream: None,
            cancel: CancellationToken::new(),
            volume: 1.0,
            speed: 1.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Samples written so far. Kept after [`stop`](Self::stop).
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Token for the current session. Cancelling it makes the next tick stop.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Accepted and remembered. Output level is not affected yet.
    pub fn set_volume(&mut self, volume: f32) {
        tracing::debug!(volume, "volume change accepted");
        self.volume = volume;
    }

    /// Accepted and remembered. Output rate is not affected yet.
    pub fn set_speed(&mut self, speed: f32) {
        tracing::debug!(speed, "speed change accepted");
        self.speed = speed;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Opens the output stream and starts a session from the beginning of
    /// `buffer`. Returns `false` without touching the stream when a session
    /// is already playing.
    pub fn start(&mut self, buffer: &SampleBuffer, chunk_size: usize) -> Result<bool> {
        if self.state != PlaybackState::Idle {
            tracing::warn!("playback already running, start ignored");
            return Ok(false);
        }
        if chunk_size == 0 {
            return Err(MediaEditError::invalid_input("chunk size must be positive"));
        }
        if buffer.is_empty() {
            return Err(MediaEditError::NoMediaLoaded(MediaKind::Audio));
        }

        let handle = self.sink.open_stream(buffer.sample_rate())?;
        self.stream = Some(handle);
        self.chunk_size = chunk_size;
        self.cursor = 0;
        self.cancel = CancellationToken::new();
        self.state = PlaybackState::Playing;
        tracing::info!(
            samples = buffer.len(),
            sample_rate = buffer.sample_rate(),
            chunk_size,
            "playback started"
        );
        Ok(true)
    }

    /// Writes the next chunk of `buffer`. Reaching the end of the buffer
    /// stops the session.
    pub fn tick(&mut self, buffer: &SampleBuffer) -> Result<TickOutcome> {
        if self.state != PlaybackState::Playing {
            return Ok(TickOutcome::Idle);
        }
        if self.cancel.is_cancelled() {
            self.stop()?;
            return Ok(TickOutcome::Cancelled);
        }
        let Some(handle) = self.stream else {
            self.state = PlaybackState::Idle;
            return Ok(TickOutcome::Idle);
        };

        let samples = buffer.samples();
        let start = self.cursor.min(samples.len());
        let end = (start + self.chunk_size).min(samples.len());
        let bytes: Vec<u8> = samples[start..end]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        if let Err(err) = self.sink.write(handle, &bytes) {
            tracing::warn!(%err, "output write failed, stopping playback");
            if let Err(close_err) = self.stop() {
                tracing::warn!(%close_err, "closing output after failed write");
            }
            return Err(err);
        }

        self.cursor = end;
        let written = end - start;
        if self.cursor >= samples.len() {
            self.stop()?;
            return Ok(TickOutcome::Finished { samples: written });
        }
        Ok(TickOutcome::Wrote { samples: written })
    }

    /// Halts emission and closes the stream. The cursor is kept. Calling it
    /// while idle does nothing.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.stream.take() else {
            self.state = PlaybackState::Idle;
            return Ok(());
        };

        self.state = PlaybackState::Stopping;
        self.cancel.cancel();
        let closed = self.sink.close(handle);
        self.state = PlaybackState::Idle;
        tracing::info!(position = self.cursor, "playback stopped");
        closed
    }

    /// Ticks until the session ends, calling `pace` with the tick interval
    /// between chunks. Returns the number of chunks written.
    pub fn run_to_end(
        &mut self,
        buffer: &SampleBuffer,
        mut pace: impl FnMut(Duration),
    ) -> Result<usize> {
        let mut chunks = 0;
        loop {
            match self.tick(buffer)? {
                TickOutcome::Wrote { .. } => {
                    chunks += 1;
                    pace(self.tick_interval);
                }
                TickOutcome::Finished { .. } => return Ok(chunks + 1),
                TickOutcome::Idle | TickOutcome::Cancelled => return Ok(chunks),
            }
        }
    }
}
