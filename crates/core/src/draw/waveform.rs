use std::iter;

use crate::{
    analysis::{SampleSnapshot, SnapshotKind, TIME_DOMAIN_MIDPOINT},
    config::VisualConfig,
    render::{Canvas, Color, LinearGradient, Paint, Point},
    Result,
};

use super::{expect_kind, paint_background};

/// Left anchor of the stroke gradient (`#9333ea`).
pub const WAVEFORM_START: Color = Color::rgb(0x93, 0x33, 0xea);
/// Right anchor of the stroke gradient (`#3b82f6`).
pub const WAVEFORM_END: Color = Color::rgb(0x3b, 0x82, 0xf6);

/// Strokes the time-domain samples as one polyline across the canvas width.
/// The path always ends on the vertical centre of the right edge.
pub fn draw_waveform(
    snapshot: &SampleSnapshot<'_>,
    visual: &VisualConfig,
    canvas: &mut dyn Canvas,
) -> Result<()> {
    expect_kind(snapshot, SnapshotKind::TimeDomain)?;

    let size = canvas.size();
    let (width, height) = (size.width, size.height);
    paint_background(canvas, size);

    if snapshot.is_empty() {
        return Ok(());
    }

    let centre = height / 2.0;
    let slice_width = width / snapshot.len() as f32;
    let midpoint = f32::from(TIME_DOMAIN_MIDPOINT);

    let points: Vec<Point> = snapshot
        .data
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let deviation = (f32::from(*sample) / midpoint - 1.0) * visual.sensitivity;
            Point::new(index as f32 * slice_width, centre + deviation * centre)
        })
        .chain(iter::once(Point::new(width, centre)))
        .collect();

    let gradient = LinearGradient::new(Point::new(0.0, 0.0), Point::new(width, 0.0))
        .with_stop(0.0, WAVEFORM_START)
        .with_stop(1.0, WAVEFORM_END);

    canvas.stroke_polyline(&points, visual.line_width, &Paint::Linear(gradient));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RecordingCanvas, SurfaceSize};

    fn draw(data: &[u8], visual: &VisualConfig) -> RecordingCanvas {
        let mut canvas = RecordingCanvas::new(SurfaceSize::new(200.0, 100.0, 2.0));
        let snapshot = SampleSnapshot {
            kind: SnapshotKind::TimeDomain,
            data,
        };
        draw_waveform(&snapshot, visual, &mut canvas).unwrap();
        canvas
    }

    #[test]
    fn flat_signal_is_centre_line_for_any_sensitivity() {
        for sensitivity in [0.1, 1.0, 7.5] {
            let visual = VisualConfig {
                sensitivity,
                ..VisualConfig::default()
            };
            let canvas = draw(&[128; 32], &visual);
            let (points, _, _) = canvas.polylines().next().unwrap();

            assert_eq!(points.len(), 33);
            assert!(points.iter().all(|point| point.y == 50.0));
        }
    }

    #[test]
    fn maps_samples_onto_geometry() {
        let visual = VisualConfig {
            sensitivity: 0.5,
            line_width: 3.0,
            ..VisualConfig::default()
        };
        let canvas = draw(&[0, 128, 255, 64], &visual);
        let (points, width, paint) = canvas.polylines().next().unwrap();

        assert_eq!(width, 3.0);
        assert_eq!(points[0], Point::new(0.0, 25.0));
        assert_eq!(points[1], Point::new(50.0, 50.0));
        assert_eq!(points[3], Point::new(150.0, 37.5));
        assert!((points[2].y - 74.8046875).abs() < 1e-4);
        assert_eq!(points[4], Point::new(200.0, 50.0));

        let Paint::Linear(gradient) = paint else {
            panic!("waveform stroke should use a gradient");
        };
        assert_eq!(gradient.end, Point::new(200.0, 0.0));
        assert_eq!(gradient.stops[0].color, WAVEFORM_START);
        assert_eq!(gradient.stops[1].color, WAVEFORM_END);
    }

    #[test]
    fn uses_logical_size_not_backing_size() {
        let canvas = draw(&[128; 4], &VisualConfig::default());
        let (points, _, _) = canvas.polylines().next().unwrap();
        assert_eq!(points.last().unwrap().x, 200.0);
    }
}
