use std::path::Path;

use audioscope_core::{Canvas, Color, Paint, Point, Rect, Result, SurfaceSize, VisualiserError};
use image::{Rgba, RgbaImage};

/// Software canvas backed by an RGBA image at the surface's backing resolution.
/// Draw calls take logical coordinates and are scaled by the pixel ratio.
pub struct RasterCanvas {
    size: SurfaceSize,
    image: RgbaImage,
}

impl RasterCanvas {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            size,
            image: RgbaImage::new(size.backing_width(), size.backing_height()),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.image
            .save(path)
            .map_err(|err| VisualiserError::msg(format!("failed to write {}: {err}", path.display())))
    }

    /// Inclusive-exclusive pixel span covering `[start, end)` in logical units.
    fn pixel_span(&self, start: f32, end: f32, limit: u32) -> (u32, u32) {
        let ratio = self.size.device_pixel_ratio;
        let from = (start.min(end) * ratio).floor().max(0.0) as u32;
        let to = (start.max(end) * ratio).ceil().max(0.0) as u32;
        (from.min(limit), to.min(limit))
    }

    fn logical_centre(&self, x: u32, y: u32) -> Point {
        let ratio = self.size.device_pixel_ratio;
        Point::new((x as f32 + 0.5) / ratio, (y as f32 + 0.5) / ratio)
    }

    fn blend(&mut self, x: u32, y: u32, color: Color) {
        let alpha = color.a.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }

        let Rgba([dr, dg, db, da]) = *self.image.get_pixel(x, y);
        let dst_alpha = f32::from(da) / 255.0;
        let out_alpha = alpha + dst_alpha * (1.0 - alpha);
        let mix = |src: u8, dst: u8| {
            let value = (f32::from(src) * alpha + f32::from(dst) * dst_alpha * (1.0 - alpha))
                / out_alpha;
            value.round().clamp(0.0, 255.0) as u8
        };

        self.image.put_pixel(
            x,
            y,
            Rgba([
                mix(color.r, dr),
                mix(color.g, dg),
                mix(color.b, db),
                (out_alpha * 255.0).round() as u8,
            ]),
        );
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        self.image = RgbaImage::new(size.backing_width(), size.backing_height());
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn fill_rect(&mut self, rect: Rect, paint: &Paint) {
        let (x0, x1) = self.pixel_span(rect.x, rect.x + rect.width, self.image.width());
        let (y0, y1) = self.pixel_span(rect.y, rect.y + rect.height, self.image.height());

        for y in y0..y1 {
            for x in x0..x1 {
                let color = paint.color_at(self.logical_centre(x, y));
                self.blend(x, y, color);
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], width: f32, paint: &Paint) {
        let radius = width / 2.0;
        for segment in points.windows(2) {
            let (a, b) = (segment[0], segment[1]);
            let (x0, x1) = self.pixel_span(
                a.x.min(b.x) - radius,
                a.x.max(b.x) + radius,
                self.image.width(),
            );
            let (y0, y1) = self.pixel_span(
                a.y.min(b.y) - radius,
                a.y.max(b.y) + radius,
                self.image.height(),
            );

            for y in y0..y1 {
                for x in x0..x1 {
                    let centre = self.logical_centre(x, y);
                    if distance_to_segment(centre, a, b) <= radius {
                        let color = paint.color_at(centre);
                        self.blend(x, y, color);
                    }
                }
            }
        }
    }
}

fn distance_to_segment(point: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq > f32::EPSILON {
        (((point.x - a.x) * dx + (point.y - a.y) * dy) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (px, py) = (a.x + t * dx - point.x, a.y + t * dy - point.y);
    (px * px + py * py).sqrt()
}
