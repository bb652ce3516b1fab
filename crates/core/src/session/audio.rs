use crate::{
    analysis::{self, AudioSummary},
    buffer::SampleBuffer,
    codec,
    config::{EditorConfig, WaveformConfig},
    effects::AudioEffect,
    playback::{OutputSink, PlaybackScheduler, PlaybackState, TickOutcome},
    waveform::{self, WavePoints, Waveform},
    MediaEditError, MediaKind, Result,
};

/// Editing session for a single sample buffer.
///
/// Effects are destructive and stack on the working buffer; the decoded
/// original is kept for [`reset`](AudioEditor::reset). While playback is
/// running the working buffer is locked and every mutation fails with
/// [`MediaEditError::BufferBusy`].
#[derive(Debug)]
pub struct AudioEditor<S: OutputSink> {
    original: Option<SampleBuffer>,
    working: Option<SampleBuffer>,
    playback: PlaybackScheduler<S>,
    waveform: WaveformConfig,
}

impl<S: OutputSink> AudioEditor<S> {
    /// Creates an empty session that plays through `sink`.
    pub fn new(sink: S, config: &EditorConfig) -> Self {
        Self {
            original: None,
            working: None,
            playback: PlaybackScheduler::new(sink, &config.playback),
            waveform: config.waveform.clone(),
        }
    }

    pub fn load(&mut self, buffer: SampleBuffer) -> Result<()> {
        self.ensure_idle()?;
        tracing::info!(
            sample_rate = buffer.sample_rate(),
            samples = buffer.len(),
            "audio loaded"
        );
        self.original = Some(buffer.clone());
        self.working = Some(buffer);
        Ok(())
    }

    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.load(codec::decode_audio(bytes)?)
    }

    pub fn is_loaded(&self) -> bool {
        self.working.is_some()
    }

    /// Drops every applied effect.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_idle()?;
        let original = self
            .original
            .clone()
            .ok_or(MediaEditError::NoMediaLoaded(MediaKind::Audio))?;
        self.working = Some(original);
        Ok(())
    }

    /// Applies `effect` to the working buffer. The buffer is only replaced
    /// when the effect succeeds.
    pub fn apply(&mut self, effect: AudioEffect) -> Result<()> {
        self.ensure_idle()?;
        let mut edited = self.working()?.clone();
        effect.apply(&mut edited)?;
        self.working = Some(edited);
        Ok(())
    }

    pub fn working(&self) -> Result<&SampleBuffer> {
        self.working
            .as_ref()
            .ok_or(MediaEditError::NoMediaLoaded(MediaKind::Audio))
    }

    pub fn original(&self) -> Result<&SampleBuffer> {
        self.original
            .as_ref()
            .ok_or(MediaEditError::NoMediaLoaded(MediaKind::Audio))
    }

    pub fn waveform(&self) -> Result<Waveform<'_>> {
        Ok(waveform::render(self.working()?.samples(), &self.waveform))
    }

    pub fn waveform_points(&self) -> Result<WavePoints<'_>> {
        Ok(self.waveform()?.points())
    }

    /// Horizontal position of the playback indicator in the waveform view.
    pub fn playback_marker_x(&self) -> f32 {
        let len = self.working.as_ref().map_or(0, SampleBuffer::len);
        waveform::playback_marker_x(self.playback.position(), len, self.waveform.width)
    }

    pub fn summary(&self) -> Result<AudioSummary> {
        analysis::analyze(self.working()?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode_audio(self.working()?)
    }

    /// Starts playback from the beginning. Uses the configured chunk size
    /// when `chunk_size` is `None`. Returns `false` if already playing.
    pub fn play(&mut self, chunk_size: Option<usize>) -> Result<bool> {
        let chunk_size = chunk_size.unwrap_or(self.playback.chunk_size());
        let working = self
            .working
            .as_ref()
            .ok_or(MediaEditError::NoMediaLoaded(MediaKind::Audio))?;
        self.playback.start(working, chunk_size)
    }

    /// Advances playback by one chunk.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        match self.working.as_ref() {
            Some(working) => self.playback.tick(working),
            None => Ok(TickOutcome::Idle),
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        self.playback.stop()
    }

    /// Stops when playing, starts otherwise. Returns whether audio is playing
    /// afterwards.
    pub fn toggle_playback(&mut self) -> Result<bool> {
        if self.playback.is_playing() {
            self.stop()?;
        } else {
            self.play(None)?;
        }
        Ok(self.playback.is_playing())
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn playback(&self) -> &PlaybackScheduler<S> {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackScheduler<S> {
        &mut self.playback
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.playback.set_volume(volume);
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.playback.set_speed(speed);
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.playback.is_playing() {
            tracing::warn!("audio is playing, edit rejected");
            return Err(MediaEditError::BufferBusy);
        }
        Ok(())
    }
}
