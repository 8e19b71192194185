use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{
    config::AnalysisConfig, source::AudioSource, source::SourceId, Result, VisualiserError,
};

mod graph;

pub use graph::{GraphNode, SignalGraph};

const BLACKMAN_ALPHA: f32 = 0.16;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
/// Time-domain byte value for silence.
pub const TIME_DOMAIN_MIDPOINT: u8 = 128;

/// Provider of the audio-processing context.
pub trait AudioHost {
    /// Opens the processing context and returns its sample rate.
    fn open(&mut self) -> Result<u32>;
}

/// Host that always succeeds, used when no audible output device is involved.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessHost {
    pub sample_rate: u32,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
        }
    }
}

impl AudioHost for HeadlessHost {
    fn open(&mut self) -> Result<u32> {
        Ok(self.sample_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextState {
    Suspended,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotKind {
    TimeDomain,
    FrequencyDomain,
}

/// One frame's worth of analyser bytes, borrowed from the engine's buffer.
#[derive(Debug, Clone, Copy)]
pub struct SampleSnapshot<'a> {
    pub kind: SnapshotKind,
    pub data: &'a [u8],
}

impl SampleSnapshot<'_> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

enum Context {
    Uninitialised,
    Ready { sample_rate: u32, state: ContextState },
    Failed(String),
}

/// Analyser sitting between the audio source and the output sink.
///
/// Every buffer the per-frame path touches is sized by [`AnalysisEngine::configure`],
/// so sampling never allocates.
pub struct AnalysisEngine {
    host: Box<dyn AudioHost>,
    context: Context,
    config: AnalysisConfig,
    graph: SignalGraph,
    planner: RealFftPlanner<f32>,
    buffers: AnalyserBuffers,
}

impl AnalysisEngine {
    pub fn new(host: Box<dyn AudioHost>) -> Self {
        let config = AnalysisConfig::default();
        let mut planner = RealFftPlanner::new();
        let buffers = AnalyserBuffers::allocate(&mut planner, &config);
        Self {
            host,
            context: Context::Uninitialised,
            config,
            graph: SignalGraph::default(),
            planner,
            buffers,
        }
    }

    /// Creates an engine starting from `config` instead of the defaults.
    pub fn with_config(host: Box<dyn AudioHost>, config: AnalysisConfig) -> Result<Self> {
        let mut engine = Self::new(host);
        engine.configure(config.resolution, config.smoothing)?;
        Ok(engine)
    }

    /// Builds the processing context. Idempotent once it succeeded; once it
    /// failed every later call reports the same failure without retrying.
    pub fn initialize(&mut self) -> Result<()> {
        match &self.context {
            Context::Ready { .. } => return Ok(()),
            Context::Failed(reason) => {
                return Err(VisualiserError::EngineUnavailable(reason.clone()))
            }
            Context::Uninitialised => {}
        }

        match self.host.open() {
            Ok(sample_rate) => {
                tracing::debug!(sample_rate, "audio context created");
                self.context = Context::Ready {
                    sample_rate,
                    state: ContextState::Suspended,
                };
                Ok(())
            }
            Err(err) => {
                let reason = match err {
                    VisualiserError::EngineUnavailable(reason) => reason,
                    other => other.to_string(),
                };
                tracing::error!(%reason, "audio context could not be created");
                self.context = Context::Failed(reason.clone());
                Err(VisualiserError::EngineUnavailable(reason))
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.context, Context::Ready { .. })
    }

    pub fn has_failed(&self) -> bool {
        matches!(self.context, Context::Failed(_))
    }

    pub fn sample_rate(&self) -> Option<u32> {
        match self.context {
            Context::Ready { sample_rate, .. } => Some(sample_rate),
            _ => None,
        }
    }

    pub fn context_state(&self) -> Option<ContextState> {
        match self.context {
            Context::Ready { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.context_state() == Some(ContextState::Running)
    }

    /// Resumes a suspended context.
    pub fn resume(&mut self) -> Result<()> {
        self.ensure_ready()?;
        if let Context::Ready { state, .. } = &mut self.context {
            if *state == ContextState::Suspended {
                tracing::debug!("resuming audio context");
                *state = ContextState::Running;
            }
        }
        Ok(())
    }

    pub fn config(&self) -> AnalysisConfig {
        self.config
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    /// Applies a new resolution and smoothing. An invalid request leaves the
    /// current configuration untouched.
    pub fn configure(&mut self, resolution: u32, smoothing: f32) -> Result<()> {
        let requested = match AnalysisConfig::new(resolution, smoothing) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(resolution, smoothing, %err, "rejected analyser configuration");
                return Err(err);
            }
        };

        if requested == self.config {
            return Ok(());
        }

        if requested.resolution != self.config.resolution {
            self.buffers = AnalyserBuffers::allocate(&mut self.planner, &requested);
        }
        tracing::debug!(
            resolution = requested.resolution,
            smoothing = requested.smoothing,
            "analyser reconfigured"
        );
        self.config = requested;
        Ok(())
    }

    /// Routes `source` through the analyser to the output, replacing any
    /// previous attachment.
    pub fn connect(&mut self, source: &dyn AudioSource) -> Result<()> {
        self.ensure_ready()?;
        self.graph.connect(source.id());
        tracing::debug!(source = %source.id(), "analyser connected");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.graph.disconnect_sources();
    }

    pub fn connected_source(&self) -> Option<SourceId> {
        self.graph.connected_source()
    }

    /// Time-domain bytes for the current instant, `resolution` long.
    /// Mid-scale silence when `source` is not the connected one.
    pub fn sample_time_domain(&mut self, source: &dyn AudioSource) -> SampleSnapshot<'_> {
        let buffers = &mut self.buffers;
        if self.graph.connected_source() == Some(source.id()) {
            source.fill_window(&mut buffers.window);
            for (byte, sample) in buffers.time_bytes.iter_mut().zip(&buffers.window) {
                *byte = time_domain_byte(*sample);
            }
        } else {
            buffers.time_bytes.fill(TIME_DOMAIN_MIDPOINT);
        }

        SampleSnapshot {
            kind: SnapshotKind::TimeDomain,
            data: &buffers.time_bytes,
        }
    }

    /// Frequency-domain bytes for the current instant, `resolution / 2` long.
    /// Zero when `source` is not the connected one.
    pub fn sample_frequency_domain(
        &mut self,
        source: &dyn AudioSource,
    ) -> Result<SampleSnapshot<'_>> {
        let smoothing = self.config.smoothing;
        let buffers = &mut self.buffers;

        if self.graph.connected_source() == Some(source.id()) {
            source.fill_window(&mut buffers.window);
            buffers.analyse(smoothing)?;
        } else {
            buffers.freq_bytes.fill(0);
        }

        Ok(SampleSnapshot {
            kind: SnapshotKind::FrequencyDomain,
            data: &buffers.freq_bytes,
        })
    }

    fn ensure_ready(&self) -> Result<()> {
        match &self.context {
            Context::Ready { .. } => Ok(()),
            Context::Failed(reason) => Err(VisualiserError::EngineUnavailable(reason.clone())),
            Context::Uninitialised => Err(VisualiserError::EngineUnavailable(
                "audio context has not been initialised".into(),
            )),
        }
    }
}

impl fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("context_state", &self.context_state())
            .field("failed", &self.has_failed())
            .field("config", &self.config)
            .field("graph", &self.graph)
            .field("buffers", &self.buffers)
            .finish()
    }
}

struct AnalyserBuffers {
    plan: Arc<dyn RealToComplex<f32>>,
    blackman: Vec<f32>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    smoothed: Vec<f32>,
    time_bytes: Vec<u8>,
    freq_bytes: Vec<u8>,
}

impl AnalyserBuffers {
    fn allocate(planner: &mut RealFftPlanner<f32>, config: &AnalysisConfig) -> Self {
        let size = config.resolution as usize;
        let bins = config.frequency_bins();
        let plan = planner.plan_fft_forward(size);
        Self {
            blackman: (0..size).map(|index| blackman_value(index, size)).collect(),
            window: vec![0.0; size],
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            smoothed: vec![0.0; bins],
            time_bytes: vec![TIME_DOMAIN_MIDPOINT; size],
            freq_bytes: vec![0; bins],
            plan,
        }
    }

    fn analyse(&mut self, smoothing: f32) -> Result<()> {
        for ((input, sample), weight) in self.input.iter_mut().zip(&self.window).zip(&self.blackman) {
            *input = sample * weight;
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|err| VisualiserError::DrawFault(format!("fft failed: {err}")))?;

        let scale = 1.0 / self.window.len() as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for ((previous, bin), byte) in self
            .smoothed
            .iter_mut()
            .zip(&self.spectrum)
            .zip(self.freq_bytes.iter_mut())
        {
            let magnitude = bin.norm() * scale;
            let mut value = smoothing * *previous + (1.0 - smoothing) * magnitude;
            if !value.is_finite() {
                value = 0.0;
            }
            *previous = value;

            let decibels = 20.0 * value.log10();
            let scaled = (255.0 / range) * (decibels - MIN_DECIBELS);
            *byte = if scaled.is_nan() { 0 } else { scaled.clamp(0.0, 255.0) as u8 };
        }
        Ok(())
    }
}

impl fmt::Debug for AnalyserBuffers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyserBuffers")
            .field("size", &self.window.len())
            .finish()
    }
}

fn time_domain_byte(sample: f32) -> u8 {
    let scaled = 128.0 * (sample + 1.0);
    if scaled.is_nan() {
        TIME_DOMAIN_MIDPOINT
    } else {
        scaled.floor().clamp(0.0, 255.0) as u8
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    let a0 = 0.5 * (1.0 - BLACKMAN_ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * BLACKMAN_ALPHA;
    let phase = 2.0 * PI * index as f32 / len as f32;
    a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
}
