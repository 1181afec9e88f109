use std::path::Path as FsPath;

use tiny_skia::{
    FillRule, FilterQuality, GradientStop, Paint as SkPaint, PathBuilder, Pixmap, PixmapPaint,
    PixmapRef, Point, Rect, SpreadMode, Stroke, Transform,
};

use super::{font, ImageData, Paint, Path, PathVerb, Surface, TextStyle};
use crate::{
    scene::{BlendMode, Color},
    Result, VisualiserError,
};

#[derive(Debug, Clone, Copy)]
struct State {
    transform: Transform,
    alpha: f32,
    blend: tiny_skia::BlendMode,
}

impl Default for State {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            alpha: 1.0,
            blend: tiny_skia::BlendMode::SourceOver,
        }
    }
}

/// Software surface backed by a tiny-skia pixmap.
pub struct PixmapSurface {
    pixmap: Pixmap,
    state: State,
    stack: Vec<State>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| VisualiserError::msg("failed to allocate output pixmap"))?;
        Ok(Self {
            pixmap,
            state: State::default(),
            stack: Vec::new(),
        })
    }

    /// Reallocates the pixmap when the size differs. Contents are discarded.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.pixmap.width() != width.max(1) || self.pixmap.height() != height.max(1) {
            *self = Self::new(width, height)?;
        }
        Ok(())
    }

    /// Premultiplied RGBA8 pixel data.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Straight-alpha RGBA of a single pixel, if in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.pixmap.pixel(x, y).map(|pixel| {
            let color = pixel.demultiply();
            Color::rgba(color.red(), color.green(), color.blue(), color.alpha())
        })
    }

    pub fn save_png(&self, path: impl AsRef<FsPath>) -> Result<()> {
        self.pixmap
            .save_png(path)
            .map_err(|err| VisualiserError::msg(format!("failed to write png: {err}")))
    }

    fn paint(&self, paint: &Paint) -> Option<SkPaint<'static>> {
        let mut sk = SkPaint::default();
        sk.anti_alias = true;
        sk.blend_mode = self.state.blend;
        match paint {
            Paint::Solid(color) => sk.set_color(to_skia(*color, self.state.alpha)),
            Paint::Linear(gradient) => {
                sk.shader = tiny_skia::LinearGradient::new(
                    Point::from_xy(gradient.start.0, gradient.start.1),
                    Point::from_xy(gradient.end.0, gradient.end.1),
                    vec![
                        GradientStop::new(0.0, to_skia(gradient.from, self.state.alpha)),
                        GradientStop::new(1.0, to_skia(gradient.to, self.state.alpha)),
                    ],
                    SpreadMode::Pad,
                    Transform::identity(),
                )?;
            }
        }
        Some(sk)
    }
}

impl std::fmt::Debug for PixmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapSurface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("depth", &self.stack.len())
            .finish()
    }
}

impl Surface for PixmapSurface {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.state.transform = self.state.transform.pre_translate(x, y);
    }

    fn rotate(&mut self, radians: f32) {
        self.state.transform = self
            .state
            .transform
            .pre_concat(Transform::from_rotate(radians.to_degrees()));
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.state.transform = self.state.transform.pre_scale(sx, sy);
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.state.alpha *= alpha.clamp(0.0, 1.0);
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend = to_skia_blend(mode);
    }

    fn clear(&mut self, color: Color) {
        self.pixmap.fill(to_skia(color, 1.0));
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, paint: &Paint) {
        let (Some(rect), Some(paint)) = (Rect::from_xywh(x, y, width, height), self.paint(paint))
        else {
            return;
        };
        self.pixmap
            .fill_rect(rect, &paint, self.state.transform, None);
    }

    fn fill_path(&mut self, path: &Path, paint: &Paint) {
        let (Some(path), Some(paint)) = (build_path(path), self.paint(paint)) else {
            return;
        };
        self.pixmap.fill_path(
            &path,
            &paint,
            FillRule::Winding,
            self.state.transform,
            None,
        );
    }

    fn stroke_path(&mut self, path: &Path, paint: &Paint, width: f32) {
        let (Some(path), Some(paint)) = (build_path(path), self.paint(paint)) else {
            return;
        };
        let stroke = Stroke {
            width: width.max(0.0),
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint, &stroke, self.state.transform, None);
    }

    fn fill_text(&mut self, text: &str, style: &TextStyle<'_>, x: f32, y: f32) {
        let mut path = Path::new();
        font::layout(text, style, x, y, &mut path);
        self.fill_path(&path, &Paint::Solid(style.color));
    }

    fn draw_image(&mut self, image: &ImageData, x: f32, y: f32, width: f32, height: f32) {
        let Some(source) = PixmapRef::from_bytes(image.premultiplied(), image.width(), image.height())
        else {
            return;
        };
        let transform = self.state.transform.pre_translate(x, y).pre_scale(
            width / image.width() as f32,
            height / image.height() as f32,
        );
        let paint = PixmapPaint {
            opacity: self.state.alpha,
            blend_mode: self.state.blend,
            quality: FilterQuality::Bilinear,
        };
        self.pixmap.draw_pixmap(0, 0, source, &paint, transform, None);
    }
}

fn build_path(path: &Path) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::with_capacity(path.verbs().len(), path.verbs().len() * 2);
    for verb in path.verbs() {
        match *verb {
            PathVerb::MoveTo(x, y) => builder.move_to(x, y),
            PathVerb::LineTo(x, y) => builder.line_to(x, y),
            PathVerb::QuadTo(cx, cy, x, y) => builder.quad_to(cx, cy, x, y),
            PathVerb::Close => builder.close(),
            PathVerb::Circle(cx, cy, radius) => {
                if radius > 0.0 {
                    builder.push_circle(cx, cy, radius);
                }
            }
        }
    }
    builder.finish()
}

fn to_skia(color: Color, alpha: f32) -> tiny_skia::Color {
    let a = (color.a as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, a)
}

fn to_skia_blend(mode: BlendMode) -> tiny_skia::BlendMode {
    use tiny_skia::BlendMode as Sk;
    match mode {
        BlendMode::Normal => Sk::SourceOver,
        BlendMode::Multiply => Sk::Multiply,
        BlendMode::Screen => Sk::Screen,
        BlendMode::Overlay => Sk::Overlay,
        BlendMode::Darken => Sk::Darken,
        BlendMode::Lighten => Sk::Lighten,
        BlendMode::ColorDodge => Sk::ColorDodge,
        BlendMode::ColorBurn => Sk::ColorBurn,
        BlendMode::HardLight => Sk::HardLight,
        BlendMode::SoftLight => Sk::SoftLight,
        BlendMode::Difference => Sk::Difference,
        BlendMode::Exclusion => Sk::Exclusion,
        BlendMode::Hue => Sk::Hue,
        BlendMode::Saturation => Sk::Saturation,
        BlendMode::Color => Sk::Color,
        BlendMode::Luminosity => Sk::Luminosity,
        BlendMode::Lighter => Sk::Plus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_and_fill_respect_transform() {
        let mut surface = PixmapSurface::new(20, 20).unwrap();
        surface.clear(Color::BLACK);

        surface.save();
        surface.translate(10.0, 10.0);
        surface.fill_rect(0.0, 0.0, 5.0, 5.0, &Paint::Solid(Color::rgb(255, 0, 0)));
        surface.restore();

        assert_eq!(surface.pixel(12, 12), Some(Color::rgb(255, 0, 0)));
        assert_eq!(surface.pixel(2, 2), Some(Color::BLACK));
    }

    #[test]
    fn alpha_multiplies_and_restores() {
        let mut surface = PixmapSurface::new(4, 4).unwrap();
        surface.clear(Color::BLACK);

        surface.save();
        surface.set_alpha(0.5);
        surface.fill_rect(0.0, 0.0, 2.0, 4.0, &Paint::Solid(Color::WHITE));
        surface.restore();
        surface.fill_rect(2.0, 0.0, 2.0, 4.0, &Paint::Solid(Color::WHITE));

        let half = surface.pixel(0, 1).unwrap();
        assert!((120..=135).contains(&half.r));
        assert_eq!(surface.pixel(3, 1), Some(Color::WHITE));
    }

    #[test]
    fn additive_blend_never_darkens() {
        let mut surface = PixmapSurface::new(4, 4).unwrap();
        surface.clear(Color::rgb(100, 100, 100));
        surface.set_blend_mode(BlendMode::Lighter);
        surface.fill_rect(0.0, 0.0, 4.0, 4.0, &Paint::Solid(Color::rgb(10, 0, 0)));

        assert_eq!(surface.pixel(1, 1), Some(Color::rgb(110, 100, 100)));
    }

    #[test]
    fn draws_images_scaled() {
        let mut surface = PixmapSurface::new(8, 8).unwrap();
        surface.clear(Color::BLACK);
        let image = ImageData::from_straight_rgba(1, 1, vec![0, 255, 0, 255]).unwrap();

        surface.draw_image(&image, 0.0, 0.0, 4.0, 4.0);

        assert_eq!(surface.pixel(2, 2), Some(Color::rgb(0, 255, 0)));
        assert_eq!(surface.pixel(6, 6), Some(Color::BLACK));
    }
}
