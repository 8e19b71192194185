use crate::{
    analysis::{SampleSnapshot, SnapshotKind},
    config::VisualConfig,
    render::{Canvas, Color, LinearGradient, Paint, Point, Rect},
    Result,
};

use super::{expect_kind, paint_background};

/// Upper bound on the number of bars, for visual density.
pub const MAX_SPECTRUM_BARS: usize = 256;

const HUE_OFFSET: f32 = 200.0;
const HUE_SWEEP: f32 = 250.0;
const SATURATION: f32 = 80.0;
const TIP_LIGHTNESS: f32 = 75.0;
const BASE_LIGHTNESS: f32 = 50.0;

/// Number of bars drawn for a snapshot of `bins` frequency bins.
pub fn spectrum_bar_count(bins: usize) -> usize {
    bins.min(MAX_SPECTRUM_BARS)
}

/// Draws one vertical gradient bar per frequency bin, rising from the bottom edge.
pub fn draw_spectrum(
    snapshot: &SampleSnapshot<'_>,
    visual: &VisualConfig,
    canvas: &mut dyn Canvas,
) -> Result<()> {
    expect_kind(snapshot, SnapshotKind::FrequencyDomain)?;

    let size = canvas.size();
    let (width, height) = (size.width, size.height);
    paint_background(canvas, size);

    let bars = spectrum_bar_count(snapshot.len());
    if bars == 0 {
        return Ok(());
    }

    let bar_width = width / bars as f32;
    let hue_step = HUE_SWEEP / bars as f32;
    let visible_width = (bar_width - visual.line_width).max(0.0);

    for (index, magnitude) in snapshot.data[..bars].iter().enumerate() {
        let magnitude = f32::from(*magnitude);
        let bar_height = magnitude / 255.0 * height * visual.sensitivity;
        let x = index as f32 * bar_width;
        let top = height - bar_height;

        let hue = index as f32 * hue_step + HUE_OFFSET;
        let lightness = BASE_LIGHTNESS + magnitude / 10.0;
        let gradient = LinearGradient::new(Point::new(x, top), Point::new(x, height))
            .with_stop(0.0, Color::from_hsl(hue, SATURATION, TIP_LIGHTNESS))
            .with_stop(0.5, Color::from_hsl(hue, SATURATION, lightness))
            .with_stop(1.0, Color::TRANSPARENT);

        canvas.fill_rect(
            Rect::new(x, top, visible_width, bar_height),
            &Paint::Linear(gradient),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RecordingCanvas, SurfaceSize};

    const WIDTH: f32 = 512.0;
    const HEIGHT: f32 = 300.0;

    fn bars(data: &[u8], visual: &VisualConfig) -> Vec<Rect> {
        let mut canvas = RecordingCanvas::new(SurfaceSize::new(WIDTH, HEIGHT, 1.0));
        let snapshot = SampleSnapshot {
            kind: SnapshotKind::FrequencyDomain,
            data,
        };
        draw_spectrum(&snapshot, visual, &mut canvas).unwrap();
        // The first fill is the background.
        canvas.fill_rects().skip(1).map(|(rect, _)| *rect).collect()
    }

    #[test]
    fn silent_spectrum_has_zero_height_bars() {
        let rects = bars(&[0; 128], &VisualConfig::default());
        assert_eq!(rects.len(), 128);
        assert!(rects.iter().all(|rect| rect.height == 0.0 && rect.y == HEIGHT));
    }

    #[test]
    fn full_scale_fills_canvas_height() {
        let visual = VisualConfig {
            sensitivity: 1.0,
            ..VisualConfig::default()
        };
        let rects = bars(&[255; 2048], &visual);

        assert_eq!(rects.len(), MAX_SPECTRUM_BARS);
        assert!(rects.iter().all(|rect| rect.height == HEIGHT && rect.y == 0.0));
    }

    #[test]
    fn bar_geometry_leaves_line_width_gap() {
        let visual = VisualConfig {
            line_width: 1.5,
            sensitivity: 2.0,
            ..VisualConfig::default()
        };
        let rects = bars(&[51; 16], &visual);

        assert_eq!(rects[3].x, 3.0 * 32.0);
        assert_eq!(rects[3].width, 30.5);
        assert!((rects[3].height - 120.0).abs() < 1e-3);
    }

    #[test]
    fn wide_gap_collapses_bars_instead_of_inverting() {
        let visual = VisualConfig {
            line_width: 10.0,
            ..VisualConfig::default()
        };
        let rects = bars(&[255; 256], &visual);
        assert!(rects.iter().all(|rect| rect.width == 0.0));
    }

    #[test]
    fn hue_sweeps_across_bins() {
        let mut canvas = RecordingCanvas::new(SurfaceSize::new(WIDTH, HEIGHT, 1.0));
        let data = [255_u8; 4];
        let snapshot = SampleSnapshot {
            kind: SnapshotKind::FrequencyDomain,
            data: &data,
        };
        draw_spectrum(&snapshot, &VisualConfig::default(), &mut canvas).unwrap();

        let tips: Vec<Color> = canvas
            .fill_rects()
            .skip(1)
            .map(|(_, paint)| match paint {
                Paint::Linear(gradient) => gradient.stops[0].color,
                Paint::Solid(color) => *color,
            })
            .collect();

        assert_eq!(tips[0], Color::from_hsl(200.0, 80.0, 75.0));
        assert_eq!(tips[2], Color::from_hsl(325.0, 80.0, 75.0));
        assert_ne!(tips[0], tips[1]);
    }
}
