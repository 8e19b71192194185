//! Drawing strategies: stateless mappings from one analyser snapshot and the
//! visual settings onto canvas commands.

use crate::{
    analysis::{AnalysisEngine, SampleSnapshot, SnapshotKind},
    config::{VisualConfig, VisualMode},
    render::{Canvas, Color, Paint, SurfaceSize},
    source::AudioSource,
    Result, VisualiserError,
};

mod spectrum;
mod waveform;

pub use spectrum::{draw_spectrum, spectrum_bar_count, MAX_SPECTRUM_BARS};
pub use waveform::{draw_waveform, WAVEFORM_END, WAVEFORM_START};

/// Near-opaque backdrop painted at the start of every frame.
pub const BACKGROUND: Color = Color::rgba(0, 0, 0, 0.9);

/// Samples the analyser for the active mode and draws one frame.
pub fn draw_frame(
    engine: &mut AnalysisEngine,
    source: &dyn AudioSource,
    visual: &VisualConfig,
    canvas: &mut dyn Canvas,
) -> Result<()> {
    match visual.mode {
        VisualMode::Waveform => {
            let snapshot = engine.sample_time_domain(source);
            draw_waveform(&snapshot, visual, canvas)
        }
        VisualMode::Spectrum => {
            let snapshot = engine.sample_frequency_domain(source)?;
            draw_spectrum(&snapshot, visual, canvas)
        }
        VisualMode::Spectrogram => draw_spectrogram(canvas),
    }
}

/// Reserved mode. Leaves the canvas untouched.
pub fn draw_spectrogram(_canvas: &mut dyn Canvas) -> Result<()> {
    Ok(())
}

fn paint_background(canvas: &mut dyn Canvas, size: SurfaceSize) {
    canvas.clear();
    canvas.fill_rect(size.bounds(), &Paint::Solid(BACKGROUND));
}

fn expect_kind(snapshot: &SampleSnapshot<'_>, kind: SnapshotKind) -> Result<()> {
    if snapshot.kind == kind {
        Ok(())
    } else {
        Err(VisualiserError::DrawFault(format!(
            "expected {kind:?} samples, got {:?}",
            snapshot.kind
        )))
    }
}
