use image::ImageFormat;

use crate::{
    adjust::{self, AdjustmentState, Filter},
    assist::ImageAssist,
    buffer::PixelBuffer,
    codec,
    config::DisplayConfig,
    geometry::{self, CropRect, CropSelection, FlipAxis},
    MediaEditError, MediaKind, Result,
};

/// The three buffers of a loaded image.
#[derive(Debug, Clone)]
struct LoadedImage {
    /// Pristine decode, restored by reset.
    source: PixelBuffer,
    /// Source with the geometric edits applied.
    base: PixelBuffer,
    /// Base run through the adjustment pipeline.
    current: PixelBuffer,
}

/// Editing session for a single image.
///
/// Slider changes are recomputed from `base`, so they never accumulate.
/// Geometric edits and assistant tools replace `base` and then re-derive the
/// displayed image with the current [`AdjustmentState`]. Every operation
/// either commits completely or leaves the session as it was.
#[derive(Debug, Default)]
pub struct ImageEditor {
    media: Option<LoadedImage>,
    state: AdjustmentState,
    display: DisplayConfig,
}

impl ImageEditor {
    /// Creates an empty session that paints into a canvas of the given size.
    pub fn new(display: DisplayConfig) -> Self {
        Self {
            media: None,
            state: AdjustmentState::default(),
            display,
        }
    }

    /// Replaces whatever was loaded and resets the adjustments.
    pub fn load(&mut self, buffer: PixelBuffer) -> Result<()> {
        if buffer.is_empty() {
            return Err(MediaEditError::invalid_input("image has no pixels"));
        }
        tracing::info!(dimensions = ?buffer.dimensions(), "image loaded");
        self.state = AdjustmentState::default();
        self.media = Some(LoadedImage {
            source: buffer.clone(),
            base: buffer.clone(),
            current: buffer,
        });
        Ok(())
    }

    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.load(codec::decode_image(bytes)?)
    }

    pub fn is_loaded(&self) -> bool {
        self.media.is_some()
    }

    /// Restores the decoded image and identity adjustments. Returns the
    /// restored dimensions.
    pub fn reset(&mut self) -> Result<(u32, u32)> {
        let media = self.loaded_mut()?;
        media.base = media.source.clone();
        media.current = media.source.clone();
        let dimensions = media.base.dimensions();
        self.state = AdjustmentState::default();
        tracing::info!(?dimensions, "image reset");
        Ok(dimensions)
    }

    pub fn adjustments(&self) -> &AdjustmentState {
        &self.state
    }

    /// Recomputes the displayed image for `state` and commits both. On error
    /// the previous state and image stay in place.
    pub fn set_adjustments(&mut self, state: AdjustmentState) -> Result<&PixelBuffer> {
        let media = self.media.as_mut().ok_or(MediaEditError::NoMediaLoaded(MediaKind::Image))?;
        let current = adjust::recompute(&media.base, &state)?;
        media.current = current;
        self.state = state;
        Ok(&media.current)
    }

    pub fn set_filter(&mut self, filter: Filter) -> Result<&PixelBuffer> {
        let state = AdjustmentState {
            filter,
            ..self.state.clone()
        };
        self.set_adjustments(state)
    }

    /// What `state` would look like without committing it. Falls back to the
    /// unadjusted image, together with the error, when the pipeline fails.
    pub fn preview(&self, state: &AdjustmentState) -> Result<(PixelBuffer, Option<MediaEditError>)> {
        let media = self.loaded()?;
        Ok(adjust::recompute_or_original(&media.base, state))
    }

    pub fn source(&self) -> Result<&PixelBuffer> {
        Ok(&self.loaded()?.source)
    }

    pub fn current(&self) -> Result<&PixelBuffer> {
        Ok(&self.loaded()?.current)
    }

    pub fn dimensions(&self) -> Result<(u32, u32)> {
        Ok(self.loaded()?.current.dimensions())
    }

    /// Counter-clockwise rotation with canvas expansion.
    pub fn rotate(&mut self, degrees: f32) -> Result<(u32, u32)> {
        self.edit_base(|base| geometry::rotate(base, degrees))
    }

    pub fn flip(&mut self, axis: FlipAxis) -> Result<(u32, u32)> {
        self.edit_base(|base| Ok(geometry::flip(base, axis)))
    }

    /// Crops with a rectangle in buffer coordinates.
    pub fn crop(&mut self, rect: CropRect) -> Result<(u32, u32)> {
        self.edit_base(|base| geometry::crop(base, rect))
    }

    /// Crops with a selection made on the painted display buffer.
    pub fn crop_selection(&mut self, selection: CropSelection) -> Result<(u32, u32)> {
        let display = self.display_size()?;
        self.edit_base(|base| {
            let rect = selection.to_buffer_rect(display, base.dimensions());
            geometry::crop(base, rect)
        })
    }

    pub fn resize(&mut self, width: i64, height: i64) -> Result<(u32, u32)> {
        self.edit_base(|base| geometry::resize(base, width, height))
    }

    /// Runs an assistant tool on the geometric base.
    pub fn apply_assist(&mut self, tool: ImageAssist) -> Result<(u32, u32)> {
        self.edit_base(|base| tool.apply(base))
    }

    /// Size the current image takes up on the configured canvas.
    pub fn display_size(&self) -> Result<(u32, u32)> {
        let canvas = (self.display.canvas_width, self.display.canvas_height);
        Ok(geometry::fit_to_canvas(self.dimensions()?, canvas))
    }

    /// The current image scaled to fit the configured canvas.
    pub fn current_display_buffer(&self) -> Result<PixelBuffer> {
        let canvas = (self.display.canvas_width, self.display.canvas_height);
        geometry::display_buffer(self.current()?, canvas)
    }

    pub fn encode(&self, format: ImageFormat) -> Result<Vec<u8>> {
        codec::encode_image(self.current()?, format)
    }

    fn edit_base(
        &mut self,
        edit: impl FnOnce(&PixelBuffer) -> Result<PixelBuffer>,
    ) -> Result<(u32, u32)> {
        let media = self.media.as_mut().ok_or(MediaEditError::NoMediaLoaded(MediaKind::Image))?;
        let base = edit(&media.base)?;
        let current = adjust::recompute(&base, &self.state)?;
        let dimensions = base.dimensions();
        media.base = base;
        media.current = current;
        tracing::debug!(?dimensions, "geometry updated");
        Ok(dimensions)
    }

    fn loaded(&self) -> Result<&LoadedImage> {
        self.media
            .as_ref()
            .ok_or(MediaEditError::NoMediaLoaded(MediaKind::Image))
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedImage> {
        self.media
            .as_mut()
            .ok_or(MediaEditError::NoMediaLoaded(MediaKind::Image))
    }
}
