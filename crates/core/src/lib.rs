//! Core library for the media editor.
//!
//! Images are edited non-destructively: an [`AdjustmentState`] is replayed
//! over an untouched base image on every change. Audio effects are
//! destructive and stack on a working [`SampleBuffer`], which the
//! [`PlaybackScheduler`] streams to an [`OutputSink`] in bounded chunks.
//! The [`session`] types bundle both halves for a front end.

pub mod adjust;
pub mod analysis;
pub mod assist;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod effects;
pub mod error;
pub mod geometry;
pub mod playback;
pub mod session;
pub mod waveform;

pub use adjust::{recompute, AdjustmentState, Filter};
pub use analysis::{analyze, AudioSummary};
pub use assist::{ImageAssist, Style};
pub use buffer::{PixelBuffer, PixelFormat, SampleBuffer};
pub use config::{DisplayConfig, EditorConfig, PlaybackConfig, WaveformConfig};
pub use effects::AudioEffect;
pub use error::{MediaEditError, MediaKind, Result};
pub use geometry::{CropRect, CropSelection, FlipAxis};
pub use playback::{
    CancellationToken, MemorySink, OutputSink, PlaybackScheduler, PlaybackState, StreamHandle,
    TickOutcome, WavFileSink,
};
pub use session::{AudioEditor, ImageEditor};
pub use waveform::{render, WavePoint, Waveform};
