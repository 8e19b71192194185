use serde::{Deserialize, Serialize};

use crate::{config::CanvasConfig, Result, VisualiserError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// sRGB colour with straight alpha in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0.0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rrggbb`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let parse = |range: std::ops::Range<usize>| {
            digits
                .get(range)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        };
        match (digits.len(), parse(0..2), parse(2..4), parse(4..6)) {
            (6, Some(r), Some(g), Some(b)) => Ok(Self::rgb(r, g, b)),
            _ => Err(VisualiserError::msg(format!("invalid hex colour `{hex}`"))),
        }
    }

    /// Hue in degrees (any value, wrapped), saturation and lightness in percent.
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 360.0;
        let s = (saturation / 100.0).clamp(0.0, 1.0);
        let l = (lightness / 100.0).clamp(0.0, 1.0);

        if s == 0.0 {
            let v = to_channel(l);
            return Self::rgb(v, v, v);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        Self::rgb(
            to_channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
            to_channel(hue_to_rgb(p, q, h)),
            to_channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
        )
    }

    /// Component-wise linear interpolation towards `other`.
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: self.a + (other.a - self.a) * t,
        }
    }
}

fn to_channel(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

fn hue_to_rgb(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

/// Gradient along the line from `start` to `end`, padded with the end colours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    pub start: Point,
    pub end: Point,
    pub stops: Vec<ColorStop>,
}

impl LinearGradient {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            stops: Vec::new(),
        }
    }

    pub fn with_stop(mut self, offset: f32, color: Color) -> Self {
        self.stops.push(ColorStop { offset, color });
        self
    }

    /// Colour of the gradient at `point`, projected onto the gradient line.
    pub fn color_at(&self, point: Point) -> Color {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return Color::TRANSPARENT;
        };

        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let length_sq = dx * dx + dy * dy;
        if length_sq <= f32::EPSILON {
            return last.color;
        }
        let t = ((point.x - self.start.x) * dx + (point.y - self.start.y) * dy) / length_sq;

        if t <= first.offset {
            return first.color;
        }
        for pair in self.stops.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if t <= to.offset {
                let span = to.offset - from.offset;
                let local = if span > 0.0 { (t - from.offset) / span } else { 1.0 };
                return from.color.lerp(to.color, local);
            }
        }
        last.color
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Paint {
    Solid(Color),
    Linear(LinearGradient),
}

impl Paint {
    pub fn color_at(&self, point: Point) -> Color {
        match self {
            Paint::Solid(color) => *color,
            Paint::Linear(gradient) => gradient.color_at(point),
        }
    }
}

/// Logical (CSS) size of a surface together with its device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl SurfaceSize {
    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    pub fn backing_width(&self) -> u32 {
        (self.width * self.device_pixel_ratio).round().max(1.0) as u32
    }

    pub fn backing_height(&self) -> u32 {
        (self.height * self.device_pixel_ratio).round().max(1.0) as u32
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

impl From<CanvasConfig> for SurfaceSize {
    fn from(config: CanvasConfig) -> Self {
        Self::new(config.width, config.height, config.device_pixel_ratio)
    }
}

/// 2D drawing surface. Coordinates are in logical units.
pub trait Canvas {
    fn size(&self) -> SurfaceSize;
    fn resize(&mut self, size: SurfaceSize);
    /// Erases everything to transparent.
    fn clear(&mut self);
    fn fill_rect(&mut self, rect: Rect, paint: &Paint);
    fn stroke_polyline(&mut self, points: &[Point], width: f32, paint: &Paint);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear,
    FillRect {
        rect: Rect,
        paint: Paint,
    },
    StrokePolyline {
        points: Vec<Point>,
        width: f32,
        paint: Paint,
    },
}

/// Canvas that keeps the commands currently visible on it. Clearing drops
/// everything drawn before.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    size: SurfaceSize,
    commands: Vec<DrawCommand>,
    clears: u64,
}

impl RecordingCanvas {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            size,
            commands: Vec::new(),
            clears: 0,
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// How many times the surface was cleared, i.e. frames started.
    pub fn clears(&self) -> u64 {
        self.clears
    }

    pub fn fill_rects(&self) -> impl Iterator<Item = (&Rect, &Paint)> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::FillRect { rect, paint } => Some((rect, paint)),
            _ => None,
        })
    }

    pub fn polylines(&self) -> impl Iterator<Item = (&[Point], f32, &Paint)> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::StrokePolyline {
                points,
                width,
                paint,
            } => Some((points.as_slice(), *width, paint)),
            _ => None,
        })
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        self.commands.clear();
    }

    fn clear(&mut self) {
        self.clears += 1;
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn fill_rect(&mut self, rect: Rect, paint: &Paint) {
        self.commands.push(DrawCommand::FillRect {
            rect,
            paint: paint.clone(),
        });
    }

    fn stroke_polyline(&mut self, points: &[Point], width: f32, paint: &Paint) {
        self.commands.push(DrawCommand::StrokePolyline {
            points: points.to_vec(),
            width,
            paint: paint.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsl_matches_reference_colours() {
        assert_eq!(Color::from_hsl(0.0, 100.0, 50.0), Color::rgb(255, 0, 0));
        assert_eq!(Color::from_hsl(240.0, 100.0, 50.0), Color::rgb(0, 0, 255));
        assert_eq!(Color::from_hsl(480.0, 100.0, 50.0), Color::rgb(0, 255, 0));
        assert_eq!(Color::from_hsl(90.0, 0.0, 50.0), Color::rgb(128, 128, 128));
    }

    #[test]
    fn parses_hex_colours() {
        assert_eq!(Color::from_hex("#9333ea").unwrap(), Color::rgb(0x93, 0x33, 0xea));
        assert!(Color::from_hex("#93").is_err());
        assert!(Color::from_hex("#zz33ea").is_err());
    }

    #[test]
    fn gradient_interpolates_between_stops() {
        let gradient = LinearGradient::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
            .with_stop(0.0, Color::rgb(0, 0, 0))
            .with_stop(1.0, Color::rgb(200, 100, 0));

        assert_eq!(gradient.color_at(Point::new(-5.0, 3.0)), Color::rgb(0, 0, 0));
        assert_eq!(gradient.color_at(Point::new(5.0, 7.0)), Color::rgb(100, 50, 0));
        assert_eq!(gradient.color_at(Point::new(20.0, 0.0)), Color::rgb(200, 100, 0));
    }

    #[test]
    fn backing_size_scales_by_pixel_ratio() {
        let size = SurfaceSize::new(400.0, 200.0, 2.0);
        assert_eq!((size.backing_width(), size.backing_height()), (800, 400));
    }

    #[test]
    fn clearing_drops_previous_commands() {
        let mut canvas = RecordingCanvas::new(SurfaceSize::new(10.0, 10.0, 1.0));
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Paint::Solid(Color::rgb(1, 2, 3)));
        canvas.clear();

        assert_eq!(canvas.commands(), &[DrawCommand::Clear]);
        assert_eq!(canvas.clears(), 1);
    }

    #[test]
    fn resize_replaces_surface_and_drops_content() {
        let mut canvas = RecordingCanvas::new(SurfaceSize::new(10.0, 10.0, 1.0));
        canvas.clear();
        canvas.resize(SurfaceSize::new(40.0, 20.0, 2.0));

        assert!(canvas.commands().is_empty());
        assert_eq!(canvas.size().bounds(), Rect::new(0.0, 0.0, 40.0, 20.0));
        assert_eq!(canvas.size().backing_width(), 80);
    }
}
