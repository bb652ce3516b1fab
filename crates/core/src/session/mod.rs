//! Editing sessions that tie buffers, adjustments and playback together.
//!
//! Only one image and one sample buffer are open per session. The
//! presentation layer drives these types and paints what
//! [`ImageEditor::current_display_buffer`] and
//! [`AudioEditor::waveform_points`] hand back.

mod audio;
mod image;

pub use audio::AudioEditor;
pub use image::ImageEditor;
