use super::{ImageData, Paint, Path, Surface, TextStyle};
use crate::scene::{BlendMode, Color};

/// Row-major 2x3 affine matrix `[a, b, c, d, e, f]` mapping
/// `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
pub type Affine = [f32; 6];

const IDENTITY: Affine = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn concat(m: Affine, n: Affine) -> Affine {
    [
        m[0] * n[0] + m[2] * n[1],
        m[1] * n[0] + m[3] * n[1],
        m[0] * n[2] + m[2] * n[3],
        m[1] * n[2] + m[3] * n[3],
        m[0] * n[4] + m[2] * n[5] + m[4],
        m[1] * n[4] + m[3] * n[5] + m[5],
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear(Color),
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        paint: Paint,
    },
    FillPath {
        path: Path,
        paint: Paint,
    },
    StrokePath {
        path: Path,
        paint: Paint,
        width: f32,
    },
    Text {
        text: String,
        font_family: String,
        size: f32,
        color: Color,
        x: f32,
        y: f32,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// A draw call together with the state that was in effect.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub op: DrawOp,
    pub transform: Affine,
    pub alpha: f32,
    pub blend: BlendMode,
}

#[derive(Debug, Clone, Copy)]
struct State {
    transform: Affine,
    alpha: f32,
    blend: BlendMode,
}

/// Surface that logs calls instead of rasterising.
#[derive(Debug)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    state: State,
    stack: Vec<State>,
    calls: Vec<DrawCall>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: State {
                transform: IDENTITY,
                alpha: 1.0,
                blend: BlendMode::Normal,
            },
            stack: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    /// Depth of the save stack; zero once every `save` has been restored.
    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn current_alpha(&self) -> f32 {
        self.state.alpha
    }

    pub fn current_blend(&self) -> BlendMode {
        self.state.blend
    }

    pub fn current_transform(&self) -> Affine {
        self.state.transform
    }

    fn record(&mut self, op: DrawOp) {
        self.calls.push(DrawCall {
            op,
            transform: self.state.transform,
            alpha: self.state.alpha,
            blend: self.state.blend,
        });
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
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
        self.state.transform = concat(self.state.transform, [1.0, 0.0, 0.0, 1.0, x, y]);
    }

    fn rotate(&mut self, radians: f32) {
        let (sin, cos) = radians.sin_cos();
        self.state.transform = concat(self.state.transform, [cos, sin, -sin, cos, 0.0, 0.0]);
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.state.transform = concat(self.state.transform, [sx, 0.0, 0.0, sy, 0.0, 0.0]);
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.state.alpha *= alpha.clamp(0.0, 1.0);
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend = mode;
    }

    fn clear(&mut self, color: Color) {
        self.record(DrawOp::Clear(color));
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, paint: &Paint) {
        self.record(DrawOp::FillRect {
            x,
            y,
            width,
            height,
            paint: *paint,
        });
    }

    fn fill_path(&mut self, path: &Path, paint: &Paint) {
        self.record(DrawOp::FillPath {
            path: path.clone(),
            paint: *paint,
        });
    }

    fn stroke_path(&mut self, path: &Path, paint: &Paint, width: f32) {
        self.record(DrawOp::StrokePath {
            path: path.clone(),
            paint: *paint,
            width,
        });
    }

    fn fill_text(&mut self, text: &str, style: &TextStyle<'_>, x: f32, y: f32) {
        self.record(DrawOp::Text {
            text: text.to_string(),
            font_family: style.font_family.to_string(),
            size: style.size,
            color: style.color,
            x,
            y,
        });
    }

    fn draw_image(&mut self, _image: &ImageData, x: f32, y: f32, width: f32, height: f32) {
        self.record(DrawOp::Image {
            x,
            y,
            width,
            height,
        });
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn transforms_compose_in_call_order() {
        let mut surface = RecordingSurface::new(10, 10);
        surface.translate(5.0, 0.0);
        surface.rotate(std::f32::consts::FRAC_PI_2);
        surface.scale(2.0, 2.0);

        // (1, 0) -> scale (2, 0) -> rotate (0, 2) -> translate (5, 2)
        let m = surface.current_transform();
        assert_relative_eq!(m[0] * 1.0 + m[4], 5.0, epsilon = 1e-5);
        assert_relative_eq!(m[1] * 1.0 + m[5], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn restore_rolls_back_state() {
        let mut surface = RecordingSurface::new(10, 10);
        surface.save();
        surface.set_alpha(0.5);
        surface.set_blend_mode(BlendMode::Screen);
        surface.restore();

        assert_eq!(surface.current_alpha(), 1.0);
        assert_eq!(surface.current_blend(), BlendMode::Normal);
        assert_eq!(surface.save_depth(), 0);
    }
}
