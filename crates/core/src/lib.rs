//! Core library for the Audioscope visualiser.
//!
//! The crate turns a playing audio asset into per-frame drawing commands.
//! [`AnalysisEngine`] produces time- and frequency-domain byte snapshots,
//! [`ParameterStore`] holds the user settings, the `draw` module maps a
//! snapshot onto a [`Canvas`], and [`PlaybackCoordinator`] keeps the
//! [`RenderLoop`] in step with the transport. Everything runs on one thread,
//! driven by a [`FrameScheduler`].

pub mod analysis;
pub mod config;
pub mod draw;
pub mod error;
pub mod params;
pub mod playback;
pub mod render;
pub mod source;

pub use analysis::{
    AnalysisEngine, AudioHost, ContextState, HeadlessHost, SampleSnapshot, SignalGraph,
    SnapshotKind,
};
pub use config::{AnalysisConfig, AppConfig, CanvasConfig, FrameRate, VisualConfig, VisualMode};
pub use draw::{draw_frame, draw_spectrogram, draw_spectrum, draw_waveform};
pub use error::{Result, VisualiserError};
pub use params::{ParameterChange, ParameterStore};
pub use playback::{format_time, PlaybackCoordinator, PlaybackState, SeekGesture, TransportIcon};
pub use render::{
    Canvas, Color, DrawCommand, FrameOutcome, FrameRequest, FrameScheduler, LinearGradient,
    ManualScheduler, Paint, Point, RecordingCanvas, Rect, RenderLoop, SurfaceSize,
};
pub use source::{AudioSource, PcmSource, SourceEvent, SourceId, SourceSummary};
