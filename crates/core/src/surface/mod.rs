//! Drawing surface abstraction.
//!
//! Renderers talk to a canvas-like [`Surface`]: a save/restore state stack
//! holding the current transform, global alpha and blend mode, plus a small
//! set of fill/stroke primitives. [`PixmapSurface`] rasterises with tiny-skia;
//! [`RecordingSurface`] keeps a log of calls for inspection.

mod font;
mod pixmap;
mod recording;

pub use pixmap::PixmapSurface;
pub use recording::{DrawCall, DrawOp, RecordingSurface};

use crate::scene::{BlendMode, Color};

/// Path segments in layer-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathVerb {
    MoveTo(f32, f32),
    LineTo(f32, f32),
    QuadTo(f32, f32, f32, f32),
    Close,
    Circle(f32, f32, f32),
}

/// Reusable path buffer. Clearing keeps the allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    verbs: Vec<PathVerb>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            verbs: Vec::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.verbs.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    pub fn verbs(&self) -> &[PathVerb] {
        &self.verbs
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.verbs.push(PathVerb::MoveTo(x, y));
        self
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.verbs.push(PathVerb::LineTo(x, y));
        self
    }

    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) -> &mut Self {
        self.verbs.push(PathVerb::QuadTo(cx, cy, x, y));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.verbs.push(PathVerb::Close);
        self
    }

    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32) -> &mut Self {
        self.verbs.push(PathVerb::Circle(cx, cy, radius));
        self
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.move_to(x, y)
            .line_to(x + width, y)
            .line_to(x + width, y + height)
            .line_to(x, y + height)
            .close()
    }

    /// Number of sub-paths started with a move or circle.
    pub fn contour_count(&self) -> usize {
        self.verbs
            .iter()
            .filter(|verb| matches!(verb, PathVerb::MoveTo(..) | PathVerb::Circle(..)))
            .count()
    }
}

/// Two-stop linear gradient in layer-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearGradient {
    pub start: (f32, f32),
    pub end: (f32, f32),
    pub from: Color,
    pub to: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    Solid(Color),
    Linear(LinearGradient),
}

impl From<Color> for Paint {
    fn from(value: Color) -> Self {
        Paint::Solid(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle<'a> {
    pub font_family: &'a str,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
}

/// Decoded image in premultiplied RGBA8, ready to be drawn.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl ImageData {
    /// Wraps straight-alpha RGBA8 pixels, premultiplying them in place.
    pub fn from_straight_rgba(width: u32, height: u32, mut rgba: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || rgba.len() != width as usize * height as usize * 4 {
            return None;
        }
        for pixel in rgba.chunks_exact_mut(4) {
            let alpha = pixel[3] as u16;
            pixel[0] = ((pixel[0] as u16 * alpha + 127) / 255) as u8;
            pixel[1] = ((pixel[1] as u16 * alpha + 127) / 255) as u8;
            pixel[2] = ((pixel[2] as u16 * alpha + 127) / 255) as u8;
        }
        Some(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn premultiplied(&self) -> &[u8] {
        &self.rgba
    }
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// 2D raster target with canvas semantics. Transforms compose in call order,
/// so `translate` then `rotate` rotates about the translated origin.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn save(&mut self);
    fn restore(&mut self);

    fn translate(&mut self, x: f32, y: f32);
    /// Radians, clockwise in screen space.
    fn rotate(&mut self, radians: f32);
    fn scale(&mut self, sx: f32, sy: f32);

    /// Multiplies into every subsequent draw until the state is restored.
    fn set_alpha(&mut self, alpha: f32);
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Replaces every pixel, ignoring transform, alpha and blend mode.
    fn clear(&mut self, color: Color);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, paint: &Paint);
    fn fill_path(&mut self, path: &Path, paint: &Paint);
    fn stroke_path(&mut self, path: &Path, paint: &Paint, width: f32);
    /// Draws `text` centred on `(x, y)`.
    fn fill_text(&mut self, text: &str, style: &TextStyle<'_>, x: f32, y: f32);
    fn draw_image(&mut self, image: &ImageData, x: f32, y: f32, width: f32, height: f32);
}

/// Runs `draw` between `save` and `restore`, so whatever state it changes
/// is rolled back afterwards.
pub fn with_saved<S, R>(surface: &mut S, draw: impl FnOnce(&mut S) -> R) -> R
where
    S: Surface + ?Sized,
{
    surface.save();
    let result = draw(surface);
    surface.restore();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_is_one_contour() {
        let mut path = Path::new();
        path.rect(0.0, 0.0, 2.0, 3.0).circle(5.0, 5.0, 1.0);

        assert_eq!(path.contour_count(), 2);
        assert_eq!(path.verbs()[2], PathVerb::LineTo(2.0, 3.0));

        path.clear();
        assert!(path.is_empty());
    }

    #[test]
    fn image_data_premultiplies_and_checks_size() {
        let image = ImageData::from_straight_rgba(1, 1, vec![255, 128, 0, 128]).unwrap();
        assert_eq!(image.premultiplied(), &[128, 64, 0, 128]);

        assert!(ImageData::from_straight_rgba(2, 2, vec![0; 4]).is_none());
    }
}
