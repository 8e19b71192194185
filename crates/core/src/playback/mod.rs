use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    analysis::{AnalysisEngine, AudioHost},
    config::{AppConfig, VisualMode},
    draw::draw_frame,
    params::{ParameterChange, ParameterStore},
    render::{Canvas, FrameOutcome, FrameRequest, FrameScheduler, ManualScheduler, RenderLoop},
    source::{AudioSource, SourceEvent},
    Result, VisualiserError,
};

/// Transport state as seen by a UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    NoSource,
    LoadedPaused,
    LoadedPlaying,
    Seeking,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    NoSource,
    Paused,
    Playing,
    Ended,
}

/// Whether the user is currently dragging the seek control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SeekGesture {
    Idle,
    Seeking { provisional: f64 },
}

/// Glyph the play/pause button should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportIcon {
    Play,
    Pause,
}

/// Formats seconds as `MM:SS`.
pub fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{minutes:02}:{secs:02}")
}

/// Owns the session: the loaded asset, the analyser, the settings and the
/// render loop, and keeps them in step with the transport.
pub struct PlaybackCoordinator<S: FrameScheduler> {
    engine: AnalysisEngine,
    params: ParameterStore,
    render_loop: RenderLoop,
    scheduler: S,
    source: Option<Box<dyn AudioSource>>,
    transport: Transport,
    seek: SeekGesture,
    displayed_position: f64,
    fatal_error: Option<String>,
}

impl<S: FrameScheduler> PlaybackCoordinator<S> {
    pub fn new(engine: AnalysisEngine, params: ParameterStore, scheduler: S) -> Self {
        Self {
            engine,
            params,
            render_loop: RenderLoop::new(),
            scheduler,
            source: None,
            transport: Transport::NoSource,
            seek: SeekGesture::Idle,
            displayed_position: 0.0,
            fatal_error: None,
        }
    }

    pub fn from_config(host: Box<dyn AudioHost>, config: &AppConfig, scheduler: S) -> Result<Self> {
        config.validate()?;
        let engine = AnalysisEngine::with_config(host, config.analysis)?;
        let params = ParameterStore::new(config.analysis, config.visual);
        Ok(Self::new(engine, params, scheduler))
    }

    pub fn state(&self) -> PlaybackState {
        match (self.transport, self.seek) {
            (Transport::NoSource, _) => PlaybackState::NoSource,
            (_, SeekGesture::Seeking { .. }) => PlaybackState::Seeking,
            (Transport::Paused, SeekGesture::Idle) => PlaybackState::LoadedPaused,
            (Transport::Playing, SeekGesture::Idle) => PlaybackState::LoadedPlaying,
            (Transport::Ended, SeekGesture::Idle) => PlaybackState::Ended,
        }
    }

    pub fn seek_gesture(&self) -> SeekGesture {
        self.seek
    }

    pub fn engine(&self) -> &AnalysisEngine {
        &self.engine
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn source(&self) -> Option<&dyn AudioSource> {
        self.source.as_deref()
    }

    /// Persistent message shown once the audio engine could not be created.
    pub fn fatal_error(&self) -> Option<&str> {
        self.fatal_error.as_deref()
    }

    pub fn displayed_position(&self) -> f64 {
        self.displayed_position
    }

    pub fn time_label(&self) -> String {
        format_time(self.displayed_position)
    }

    pub fn duration_label(&self) -> String {
        format_time(self.source.as_ref().map_or(0.0, |source| source.duration()))
    }

    pub fn play_icon(&self) -> TransportIcon {
        match self.transport {
            Transport::Playing => TransportIcon::Pause,
            _ => TransportIcon::Play,
        }
    }

    /// Registers an observer for parameter changes.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&ParameterChange) + 'static,
    {
        self.params.subscribe(listener);
    }

    /// Replaces the loaded asset. The previous one is paused and detached
    /// from the analyser before the new one is attached.
    pub fn load(&mut self, mut source: Box<dyn AudioSource>) -> Result<()> {
        self.render_loop.stop(&mut self.scheduler);
        if let Some(mut previous) = self.source.take() {
            previous.pause();
            self.engine.disconnect();
            tracing::debug!(source = %previous.id(), "previous source torn down");
        }
        self.transport = Transport::NoSource;
        self.seek = SeekGesture::Idle;

        source.set_volume(self.params.visual().volume)?;
        if self.engine.is_initialized() {
            let analysis = self.params.analysis();
            self.engine.resume()?;
            self.engine.configure(analysis.resolution, analysis.smoothing)?;
            self.engine.connect(&*source)?;
        }

        tracing::info!(
            source = %source.id(),
            duration = source.duration(),
            "audio loaded"
        );
        self.displayed_position = source.position();
        self.source = Some(source);
        self.transport = Transport::Paused;
        Ok(())
    }

    pub fn toggle_play_pause(&mut self) -> Result<PlaybackState> {
        match self.transport {
            Transport::NoSource => return Err(VisualiserError::NoSource),
            Transport::Playing => self.pause(),
            Transport::Paused | Transport::Ended => self.play()?,
        }
        Ok(self.state())
    }

    /// Starts audible playback. The transport only becomes playing, and the
    /// render loop only starts, once the source confirmed the start.
    pub fn play(&mut self) -> Result<()> {
        let Some(source) = self.source.as_deref_mut() else {
            return Err(VisualiserError::NoSource);
        };
        if self.transport == Transport::Playing {
            return Ok(());
        }

        if let Err(err) = self.engine.initialize() {
            self.fatal_error = Some(format!("Error: {err}"));
            return Err(err);
        }
        let analysis = self.params.analysis();
        self.engine.configure(analysis.resolution, analysis.smoothing)?;
        if self.engine.connected_source() != Some(source.id()) {
            self.engine.connect(source)?;
        }
        self.engine.resume()?;

        if let Err(err) = source.play() {
            let err = match err {
                err @ VisualiserError::PlaybackStartFailed(_) => err,
                other => VisualiserError::PlaybackStartFailed(other.to_string()),
            };
            tracing::error!(%err, "playback did not start");
            return Err(err);
        }

        self.transport = Transport::Playing;
        self.render_loop.start(&mut self.scheduler);
        tracing::info!(position = source.position(), "playback started");
        Ok(())
    }

    /// Stops audible playback and the render loop. The last frame stays visible.
    pub fn pause(&mut self) {
        if self.transport != Transport::Playing {
            return;
        }
        if let Some(source) = self.source.as_deref_mut() {
            source.pause();
            tracing::info!(position = source.position(), "playback paused");
        }
        self.transport = Transport::Paused;
        self.render_loop.stop(&mut self.scheduler);
    }

    /// Starts or continues a seek drag with the control's raw value.
    pub fn begin_seek(&mut self, seconds: f64) -> Result<()> {
        let source = self.source.as_deref().ok_or(VisualiserError::NoSource)?;
        let provisional = clamp_position(seconds, source.duration());
        self.seek = SeekGesture::Seeking { provisional };
        self.displayed_position = provisional;
        Ok(())
    }

    pub fn update_seek(&mut self, seconds: f64) -> Result<()> {
        self.begin_seek(seconds)
    }

    /// Finishes the gesture: the playhead moves and the display follows it.
    pub fn commit_seek(&mut self, seconds: f64) -> Result<()> {
        let source = self.source.as_deref_mut().ok_or(VisualiserError::NoSource)?;
        let target = clamp_position(seconds, source.duration());
        source.seek(target);
        self.seek = SeekGesture::Idle;
        self.displayed_position = source.position();
        tracing::debug!(position = self.displayed_position, "seek committed");

        match self.transport {
            Transport::Playing => {
                self.render_loop.start(&mut self.scheduler);
            }
            Transport::Ended => self.transport = Transport::Paused,
            Transport::Paused | Transport::NoSource => {}
        }
        Ok(())
    }

    /// Abandons a drag without moving the playhead.
    pub fn cancel_seek(&mut self) {
        self.seek = SeekGesture::Idle;
        if let Some(source) = self.source.as_deref() {
            self.displayed_position = source.position();
        }
    }

    /// Position feedback from the source. Ignored while a drag is in progress.
    pub fn on_time_update(&mut self) {
        if self.seek != SeekGesture::Idle {
            return;
        }
        if let Some(source) = self.source.as_deref() {
            self.displayed_position = source.position();
        }
    }

    /// The asset played to its end: stop drawing and rewind.
    pub fn on_ended(&mut self) {
        self.render_loop.stop(&mut self.scheduler);
        if let Some(source) = self.source.as_deref_mut() {
            source.pause();
            source.seek(0.0);
        }
        self.transport = Transport::Ended;
        self.seek = SeekGesture::Idle;
        self.displayed_position = 0.0;
        tracing::info!("playback ended");
    }

    /// Advances the source by `seconds` of host time and handles its events.
    pub fn tick(&mut self, seconds: f64) -> Option<SourceEvent> {
        let event = self.source.as_deref_mut()?.advance(seconds)?;
        match event {
            SourceEvent::TimeUpdate { .. } => self.on_time_update(),
            SourceEvent::Ended => self.on_ended(),
        }
        Some(event)
    }

    /// Runs one fired frame request against `canvas`.
    pub fn run_frame(&mut self, request: FrameRequest, canvas: &mut dyn Canvas) -> FrameOutcome {
        let Self {
            engine,
            params,
            render_loop,
            scheduler,
            source,
            seek,
            displayed_position,
            ..
        } = self;

        render_loop.run_frame(request, scheduler, || {
            let Some(source) = source.as_deref() else {
                return Ok(false);
            };
            if !engine.is_running() {
                return Ok(false);
            }
            if *seek == SeekGesture::Idle {
                *displayed_position = source.position();
            }
            draw_frame(engine, source, params.visual(), canvas)?;
            Ok(true)
        })
    }

    pub fn set_resolution(&mut self, resolution: u32) -> Result<Option<ParameterChange>> {
        let change = self.params.set_resolution(resolution)?;
        self.propagate(change)
    }

    pub fn set_smoothing(&mut self, smoothing: f32) -> Result<Option<ParameterChange>> {
        let change = self.params.set_smoothing(smoothing)?;
        self.propagate(change)
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) -> Result<Option<ParameterChange>> {
        let change = self.params.set_sensitivity(sensitivity)?;
        self.propagate(change)
    }

    pub fn set_line_width(&mut self, line_width: f32) -> Result<Option<ParameterChange>> {
        let change = self.params.set_line_width(line_width)?;
        self.propagate(change)
    }

    pub fn set_volume_percent(&mut self, percent: u32) -> Result<Option<ParameterChange>> {
        let change = self.params.set_volume_percent(percent)?;
        self.propagate(change)
    }

    pub fn select_mode(&mut self, mode: VisualMode) -> Result<Option<ParameterChange>> {
        let change = self.params.set_mode(mode)?;
        self.propagate(change)
    }

    /// Pushes an accepted change to the component that depends on it.
    /// Visual-only settings are read by the next frame.
    fn propagate(&mut self, change: Option<ParameterChange>) -> Result<Option<ParameterChange>> {
        let Some(change) = change else {
            return Ok(None);
        };

        if change.affects_analysis() && self.engine.is_initialized() {
            let analysis = self.params.analysis();
            self.engine
                .configure(analysis.resolution, analysis.smoothing)?;
        }
        if let ParameterChange::Volume(volume) = change {
            if let Some(source) = self.source.as_deref_mut() {
                source.set_volume(volume)?;
            }
        }
        Ok(Some(change))
    }
}

impl PlaybackCoordinator<ManualScheduler> {
    /// One host frame: advance the playhead, then run the due frame request.
    pub fn step(&mut self, seconds: f64, canvas: &mut dyn Canvas) -> Option<FrameOutcome> {
        self.tick(seconds);
        let request = self.scheduler.poll()?;
        Some(self.run_frame(request, canvas))
    }
}

impl<S: FrameScheduler> fmt::Debug for PlaybackCoordinator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCoordinator")
            .field("state", &self.state())
            .field("engine", &self.engine)
            .field("params", &self.params)
            .field("render_loop", &self.render_loop)
            .field("source", &self.source.as_ref().map(|source| source.id()))
            .field("displayed_position", &self.displayed_position)
            .field("fatal_error", &self.fatal_error)
            .finish()
    }
}

fn clamp_position(seconds: f64, duration: f64) -> f64 {
    if seconds.is_finite() {
        seconds.clamp(0.0, duration.max(0.0))
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::HeadlessHost,
        render::{RecordingCanvas, SurfaceSize},
        source::{PcmSource, SourceId},
    };

    const FRAME: f64 = 1.0 / 60.0;

    struct MissingHost;

    impl AudioHost for MissingHost {
        fn open(&mut self) -> Result<u32> {
            Err(VisualiserError::EngineUnavailable("no audio subsystem".into()))
        }
    }

    /// Source whose start is refused, e.g. a busy device.
    struct RefusingSource(PcmSource);

    impl AudioSource for RefusingSource {
        fn id(&self) -> SourceId {
            self.0.id()
        }
        fn sample_rate(&self) -> u32 {
            self.0.sample_rate()
        }
        fn duration(&self) -> f64 {
            self.0.duration()
        }
        fn position(&self) -> f64 {
            self.0.position()
        }
        fn seek(&mut self, seconds: f64) {
            self.0.seek(seconds);
        }
        fn volume(&self) -> f32 {
            self.0.volume()
        }
        fn set_volume(&mut self, volume: f32) -> Result<()> {
            self.0.set_volume(volume)
        }
        fn play(&mut self) -> Result<()> {
            Err(VisualiserError::msg("device busy"))
        }
        fn pause(&mut self) {
            self.0.pause();
        }
        fn is_paused(&self) -> bool {
            self.0.is_paused()
        }
        fn fill_window(&self, out: &mut [f32]) {
            self.0.fill_window(out);
        }
        fn advance(&mut self, seconds: f64) -> Option<SourceEvent> {
            self.0.advance(seconds)
        }
    }

    fn tone(seconds: f64) -> Box<PcmSource> {
        let sample_rate = 8_000;
        let samples = (0..(seconds * f64::from(sample_rate)) as usize)
            .map(|n| (n as f32 * 0.05).sin() * 0.5)
            .collect();
        Box::new(PcmSource::new(samples, sample_rate).unwrap())
    }

    fn coordinator() -> PlaybackCoordinator<ManualScheduler> {
        PlaybackCoordinator::from_config(
            Box::new(HeadlessHost::default()),
            &AppConfig::default(),
            ManualScheduler::new(),
        )
        .unwrap()
    }

    fn canvas() -> RecordingCanvas {
        RecordingCanvas::new(SurfaceSize::new(320.0, 120.0, 1.0))
    }

    #[test]
    fn plays_ten_second_asset_to_completion() {
        let mut session = coordinator();
        let mut canvas = canvas();
        session.load(tone(10.0)).unwrap();
        assert_eq!(session.state(), PlaybackState::LoadedPaused);
        assert_eq!(session.duration_label(), "00:10");

        assert_eq!(
            session.toggle_play_pause().unwrap(),
            PlaybackState::LoadedPlaying
        );
        assert!(session.render_loop().is_running());

        let mut frames = 0;
        while session.state() != PlaybackState::Ended && frames < 2_000 {
            session.step(FRAME, &mut canvas);
            frames += 1;
        }

        assert_eq!(session.state(), PlaybackState::Ended);
        assert_eq!(session.time_label(), "00:00");
        assert_eq!(session.source().unwrap().position(), 0.0);
        assert!(!session.render_loop().is_running());
        assert_eq!(session.scheduler().pending(), 0);
        assert_eq!(session.play_icon(), TransportIcon::Play);
        assert!(session.render_loop().stats().frames > 500);
    }

    #[test]
    fn seek_gesture_holds_provisional_position() {
        let mut session = coordinator();
        let mut canvas = canvas();
        session.load(tone(10.0)).unwrap();
        session.play().unwrap();
        session.step(FRAME, &mut canvas);

        session.begin_seek(7.25).unwrap();
        assert_eq!(session.state(), PlaybackState::Seeking);
        for _ in 0..10 {
            session.step(FRAME, &mut canvas);
            assert_eq!(session.displayed_position(), 7.25);
        }
        assert_eq!(session.time_label(), "00:07");
        assert!(session.source().unwrap().position() < 1.0);

        session.commit_seek(7.25).unwrap();
        assert_eq!(session.state(), PlaybackState::LoadedPlaying);
        session.step(FRAME, &mut canvas);
        let actual = session.source().unwrap().position();
        assert_eq!(session.displayed_position(), actual);
        assert!((actual - 7.25 - FRAME).abs() < 1e-3);
    }

    #[test]
    fn seek_beyond_duration_is_clamped() {
        let mut session = coordinator();
        session.load(tone(2.0)).unwrap();
        session.begin_seek(99.0).unwrap();
        assert_eq!(session.displayed_position(), 2.0);
        session.commit_seek(-3.0).unwrap();
        assert_eq!(session.displayed_position(), 0.0);
    }

    #[test]
    fn pause_stops_rendering() {
        let mut session = coordinator();
        let mut canvas = canvas();
        session.load(tone(3.0)).unwrap();
        session.toggle_play_pause().unwrap();
        session.step(FRAME, &mut canvas);
        let drawn = canvas.clears();

        assert_eq!(
            session.toggle_play_pause().unwrap(),
            PlaybackState::LoadedPaused
        );
        for _ in 0..5 {
            assert_eq!(session.step(FRAME, &mut canvas), None);
        }
        assert_eq!(canvas.clears(), drawn);

        session.toggle_play_pause().unwrap();
        assert_eq!(session.step(FRAME, &mut canvas), Some(FrameOutcome::Drawn));
    }

    #[test]
    fn spectrogram_detour_leaves_no_residue() {
        let mut session = coordinator();
        let mut canvas = canvas();
        session.load(tone(3.0)).unwrap();
        session.play().unwrap();
        session.step(0.5, &mut canvas);
        let reference = canvas.commands().to_vec();

        session.select_mode(VisualMode::Spectrogram).unwrap();
        let analysis = session.engine().config();
        session.step(0.0, &mut canvas);
        assert_eq!(canvas.commands(), reference.as_slice());
        assert_eq!(session.engine().config(), analysis);

        session.select_mode(VisualMode::Waveform).unwrap();
        session.step(0.0, &mut canvas);
        assert_eq!(canvas.commands(), reference.as_slice());
    }

    #[test]
    fn engine_failure_is_persistent() {
        let mut session = PlaybackCoordinator::from_config(
            Box::new(MissingHost),
            &AppConfig::default(),
            ManualScheduler::new(),
        )
        .unwrap();
        session.load(tone(1.0)).unwrap();

        for _ in 0..2 {
            let err = session.toggle_play_pause().unwrap_err();
            assert!(matches!(err, VisualiserError::EngineUnavailable(_)));
        }
        assert!(session.fatal_error().unwrap().contains("no audio subsystem"));
        assert_eq!(session.state(), PlaybackState::LoadedPaused);
        assert!(!session.render_loop().is_running());
    }

    #[test]
    fn refused_start_keeps_transport_paused() {
        let mut session = coordinator();
        let source = PcmSource::new(vec![0.0; 8_000], 8_000).unwrap();
        session.load(Box::new(RefusingSource(source))).unwrap();

        let err = session.toggle_play_pause().unwrap_err();
        assert!(matches!(err, VisualiserError::PlaybackStartFailed(_)));
        assert_eq!(session.state(), PlaybackState::LoadedPaused);
        assert!(!session.render_loop().is_running());
        assert_eq!(session.scheduler().pending(), 0);
    }

    #[test]
    fn loading_replaces_previous_connection() {
        let mut session = coordinator();
        let mut canvas = canvas();
        session.load(tone(2.0)).unwrap();
        session.play().unwrap();
        session.step(FRAME, &mut canvas);

        let replacement = tone(4.0);
        let replacement_id = replacement.id();
        session.load(replacement).unwrap();

        assert_eq!(session.state(), PlaybackState::LoadedPaused);
        assert!(!session.render_loop().is_running());
        assert_eq!(session.engine().connected_source(), Some(replacement_id));
        assert_eq!(session.engine().graph().active_paths(), 1);
        assert_eq!(session.duration_label(), "00:04");
    }

    #[test]
    fn parameter_changes_reach_dependents_during_playback() {
        let mut session = coordinator();
        let mut canvas = canvas();
        session.load(tone(2.0)).unwrap();
        session.play().unwrap();
        session.step(FRAME, &mut canvas);
        let (points, _, _) = canvas.polylines().next().unwrap();
        assert_eq!(points.len(), 4096 + 1);

        session.set_resolution(64).unwrap();
        session.set_smoothing(0.2).unwrap();
        session.set_volume_percent(40).unwrap();
        assert!(session.set_resolution(100).is_err());

        assert_eq!(session.engine().config().resolution, 64);
        assert_eq!(session.engine().config().smoothing, 0.2);
        assert!((session.source().unwrap().volume() - 0.4).abs() < f32::EPSILON);
        assert_eq!(session.state(), PlaybackState::LoadedPlaying);

        session.step(FRAME, &mut canvas);
        let (points, _, _) = canvas.polylines().next().unwrap();
        assert_eq!(points.len(), 64 + 1);

        session.select_mode(VisualMode::Spectrum).unwrap();
        session.step(FRAME, &mut canvas);
        // Background plus one bar per bin.
        assert_eq!(canvas.fill_rects().count(), 32 + 1);
    }

    #[test]
    fn cancelled_seek_restores_actual_position() {
        let mut session = coordinator();
        let mut canvas = canvas();
        session.load(tone(10.0)).unwrap();
        session.play().unwrap();
        session.step(0.5, &mut canvas);
        let actual = session.source().unwrap().position();

        session.begin_seek(3.0).unwrap();
        session.update_seek(6.5).unwrap();
        assert_eq!(session.displayed_position(), 6.5);
        assert_eq!(session.time_label(), "00:06");

        session.cancel_seek();
        assert_eq!(session.seek_gesture(), SeekGesture::Idle);
        assert_eq!(session.state(), PlaybackState::LoadedPlaying);
        assert_eq!(session.displayed_position(), actual);
        assert_eq!(session.source().unwrap().position(), actual);
    }

    #[test]
    fn frames_before_the_context_runs_are_skipped() {
        let mut session = coordinator();
        let mut canvas = canvas();
        session.load(tone(1.0)).unwrap();
        session.render_loop.start(&mut session.scheduler);

        assert_eq!(session.step(FRAME, &mut canvas), Some(FrameOutcome::Skipped));
        assert_eq!(canvas.clears(), 0);
        assert_eq!(session.render_loop().stats().frames, 0);
        assert_eq!(session.render_loop().stats().skipped, 1);
    }

    #[test]
    fn transport_requires_a_source() {
        let mut session = coordinator();
        assert!(matches!(
            session.toggle_play_pause(),
            Err(VisualiserError::NoSource)
        ));
        assert!(session.begin_seek(1.0).is_err());
        assert_eq!(session.state(), PlaybackState::NoSource);
    }

    #[test]
    fn formats_clock_labels() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(59.99), "00:59");
        assert_eq!(format_time(61.0), "01:01");
        assert_eq!(format_time(3_725.0), "62:05");
        assert_eq!(format_time(f64::NAN), "00:00");
    }
}
