//! Time-domain layers.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use super::Scratch;
use crate::{
    scene::{SoundWave, SoundWave2, WaveShape},
    surface::{Paint, Surface},
};

/// Per-layer state of a horizontal waveform: the previous frame's curve plus
/// buffers reused across frames.
#[derive(Debug, Clone, Default)]
pub struct WaveformState {
    strided: Vec<f32>,
    kernel: Vec<f32>,
    smoothed: Vec<f32>,
}

impl WaveformState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strides, smooths, centres and blends `samples` into the stored curve.
    pub fn update(&mut self, samples: &[f32], wavelength: f32, smoothing: f32) -> &[f32] {
        let stride = sample_stride(samples.len(), wavelength);

        self.strided.clear();
        self.strided.extend(samples.iter().step_by(stride).copied());

        let n = self.strided.len();
        self.kernel.clear();
        self.kernel.extend(self.strided.iter().enumerate().map(|(i, value)| {
            if i == 0 || i + 1 == n {
                *value
            } else {
                0.25 * self.strided[i - 1] + 0.5 * value + 0.25 * self.strided[i + 1]
            }
        }));

        let offset = crate::audio::mean(&self.kernel);
        for value in &mut self.kernel {
            *value -= offset;
        }

        let retention = smoothing.clamp(0.0, 1.0);
        if self.smoothed.len() == n {
            for (previous, current) in self.smoothed.iter_mut().zip(&self.kernel) {
                *previous = retention * *previous + (1.0 - retention) * current;
            }
        } else {
            self.smoothed.clone_from(&self.kernel);
        }
        &self.smoothed
    }
}

/// `max(1, floor(len * wavelength * 0.25))`.
pub fn sample_stride(len: usize, wavelength: f32) -> usize {
    let stride = len as f32 * wavelength.max(0.0) * 0.25;
    if stride.is_finite() {
        (stride.floor() as usize).max(1)
    } else {
        1
    }
}

pub(super) fn draw_line<S: Surface + ?Sized>(
    surface: &mut S,
    layer: &SoundWave,
    state: &mut WaveformState,
    samples: &[f32],
    scratch: &mut Scratch,
) {
    let curve = state.update(samples, layer.wavelength, layer.smoothing);
    let half_width = layer.width * 0.5;
    let half_height = layer.height * 0.5;

    let path = &mut scratch.path;
    path.clear();
    match curve {
        [] => {
            path.move_to(-half_width, 0.0).line_to(half_width, 0.0);
        }
        [only] => {
            let y = -only * half_height;
            path.move_to(-half_width, y).line_to(half_width, y);
        }
        points => {
            let step = layer.width / (points.len() - 1) as f32;
            for (index, value) in points.iter().enumerate() {
                let x = -half_width + index as f32 * step;
                let y = -value.clamp(-1.0, 1.0) * half_height;
                if index == 0 {
                    path.move_to(x, y);
                } else {
                    path.line_to(x, y);
                }
            }
        }
    }

    if let Some(fill) = layer.fill_color {
        scratch.aux.clone_from(path);
        scratch
            .aux
            .line_to(half_width, 0.0)
            .line_to(-half_width, 0.0)
            .close();
        surface.fill_path(&scratch.aux, &Paint::Solid(fill));
    }
    surface.stroke_path(path, &Paint::Solid(layer.color), layer.line_width);
}

fn sample_at(samples: &[f32], index: usize, count: usize) -> f32 {
    if samples.is_empty() || count == 0 {
        return 0.0;
    }
    let position = (index * samples.len() / count).min(samples.len() - 1);
    samples[position].clamp(-1.0, 1.0)
}

pub(super) fn draw_radial<S: Surface + ?Sized>(
    surface: &mut S,
    layer: &SoundWave2,
    samples: &[f32],
    scratch: &mut Scratch,
) {
    let count = layer.resolution.max(3) as usize;
    let reach = layer.radius * layer.sensitivity;
    let paint = Paint::Solid(layer.color);

    let path = &mut scratch.path;
    path.clear();
    match (layer.shape, layer.bars) {
        (WaveShape::Circle, false) => {
            for index in 0..count {
                let angle = index as f32 / count as f32 * TAU - FRAC_PI_2;
                let r = (layer.radius + sample_at(samples, index, count) * reach).max(0.0);
                let (sin, cos) = angle.sin_cos();
                if index == 0 {
                    path.move_to(cos * r, sin * r);
                } else {
                    path.line_to(cos * r, sin * r);
                }
            }
            path.close();
        }
        (WaveShape::Circle, true) => {
            // Half the sweep is sampled; the other half mirrors it.
            let half = (count / 2).max(1);
            for index in 0..half {
                let length = sample_at(samples, index, half).abs() * reach;
                let sweep = index as f32 / half as f32 * PI;
                let mirrored = index > 0;
                for angle in [-FRAC_PI_2 + sweep, -FRAC_PI_2 - sweep]
                    .into_iter()
                    .take(if mirrored { 2 } else { 1 })
                {
                    let (sin, cos) = angle.sin_cos();
                    path.move_to(cos * layer.radius, sin * layer.radius);
                    let outer = layer.radius + length;
                    path.line_to(cos * outer, sin * outer);
                    if layer.inward {
                        let inner = (layer.radius - length).max(0.0);
                        path.move_to(cos * layer.radius, sin * layer.radius);
                        path.line_to(cos * inner, sin * inner);
                    }
                }
            }
        }
        (WaveShape::Line, false) => {
            let step = layer.width / (count - 1) as f32;
            for index in 0..count {
                let x = -layer.width * 0.5 + index as f32 * step;
                let y = -sample_at(samples, index, count) * reach;
                if index == 0 {
                    path.move_to(x, y);
                } else {
                    path.line_to(x, y);
                }
            }
        }
        (WaveShape::Line, true) => {
            let half = (count / 2).max(1);
            for index in 0..half {
                let length = sample_at(samples, index, half).abs() * reach;
                let offset = index as f32 / half as f32 * layer.width * 0.5;
                for x in [offset, -offset].into_iter().take(if index > 0 { 2 } else { 1 }) {
                    path.move_to(x, 0.0).line_to(x, -length);
                    if layer.inward {
                        path.move_to(x, 0.0).line_to(x, length);
                    }
                }
            }
        }
    }
    surface.stroke_path(path, &paint, layer.line_width);

    if layer.base_circle {
        scratch.aux.clear();
        match layer.shape {
            WaveShape::Circle => scratch.aux.circle(0.0, 0.0, layer.radius.max(0.0)),
            WaveShape::Line => scratch
                .aux
                .move_to(-layer.width * 0.5, 0.0)
                .line_to(layer.width * 0.5, 0.0),
        };
        surface.stroke_path(&scratch.aux, &paint, layer.line_width);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::surface::{DrawOp, PathVerb, RecordingSurface};

    fn stroked(surface: &RecordingSurface, index: usize) -> &crate::surface::Path {
        match &surface.calls()[index].op {
            DrawOp::StrokePath { path, .. } => path,
            other => panic!("expected a stroke, got {other:?}"),
        }
    }

    #[test]
    fn stride_follows_wavelength() {
        assert_eq!(sample_stride(2048, 0.01), 5);
        assert_eq!(sample_stride(2048, 0.0), 1);
        assert_eq!(sample_stride(10, 0.01), 1);
        assert_eq!(sample_stride(0, 1.0), 1);
    }

    #[test]
    fn kernel_leaves_endpoints_and_removes_offset() {
        let mut state = WaveformState::new();
        let curve = state.update(&[0.0, 1.0, 0.0, 1.0], 0.0, 0.0).to_vec();

        // Kernel gives [0, 0.5, 0.5, 1], mean 0.5.
        let expected = [-0.5, 0.0, 0.0, 0.5];
        for (value, expected) in curve.iter().zip(expected) {
            assert_relative_eq!(*value, expected, epsilon = 1e-6);
        }
        assert_relative_eq!(curve.iter().sum::<f32>(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn blends_with_previous_frame() {
        let mut state = WaveformState::new();
        state.update(&[1.0, -1.0], 0.0, 0.5);
        let curve = state.update(&[-1.0, 1.0], 0.0, 0.5);

        assert_relative_eq!(curve[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(curve[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn length_change_resets_history() {
        let mut state = WaveformState::new();
        state.update(&[1.0, -1.0], 0.0, 0.9);
        let curve = state.update(&[1.0, -1.0, 1.0], 0.0, 0.9);
        assert_eq!(curve.len(), 3);
    }

    #[test]
    fn empty_buffer_draws_a_flat_line() {
        let mut surface = RecordingSurface::new(100, 100);
        let mut scratch = Scratch::default();
        let mut state = WaveformState::new();
        let layer = SoundWave::default();

        draw_line(&mut surface, &layer, &mut state, &[], &mut scratch);

        assert_eq!(
            stroked(&surface, 0).verbs(),
            &[PathVerb::MoveTo(-400.0, 0.0), PathVerb::LineTo(400.0, 0.0)]
        );
    }

    #[test]
    fn circle_radius_tracks_amplitude() {
        let mut surface = RecordingSurface::new(100, 100);
        let mut scratch = Scratch::default();
        let layer = SoundWave2 {
            radius: 100.0,
            sensitivity: 0.5,
            resolution: 4,
            ..SoundWave2::default()
        };

        draw_radial(&mut surface, &layer, &[1.0; 16], &mut scratch);

        let path = stroked(&surface, 0);
        assert_eq!(path.verbs().len(), 5);
        let PathVerb::MoveTo(x, y) = path.verbs()[0] else {
            panic!("expected move");
        };
        // First point sits straight up at radius + amp * radius * sensitivity.
        assert_relative_eq!(x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(y, -150.0, epsilon = 1e-4);
    }

    #[test]
    fn bars_mirror_the_half_sweep() {
        let mut surface = RecordingSurface::new(100, 100);
        let mut scratch = Scratch::default();
        let layer = SoundWave2 {
            resolution: 8,
            bars: true,
            inward: true,
            base_circle: true,
            ..SoundWave2::default()
        };

        draw_radial(&mut surface, &layer, &[0.5; 8], &mut scratch);

        assert_eq!(surface.calls().len(), 2);
        // Four samples: the first once, the rest twice, each with an inward segment.
        assert_eq!(stroked(&surface, 0).contour_count(), (1 + 3 * 2) * 2);
        assert_eq!(
            stroked(&surface, 1).verbs(),
            &[PathVerb::Circle(0.0, 0.0, 120.0)]
        );
    }

    #[test]
    fn line_shape_runs_across_width() {
        let mut surface = RecordingSurface::new(100, 100);
        let mut scratch = Scratch::default();
        let layer = SoundWave2 {
            shape: WaveShape::Line,
            width: 300.0,
            resolution: 3,
            ..SoundWave2::default()
        };

        draw_radial(&mut surface, &layer, &[], &mut scratch);

        assert_eq!(
            stroked(&surface, 0).verbs(),
            &[
                PathVerb::MoveTo(-150.0, 0.0),
                PathVerb::LineTo(0.0, 0.0),
                PathVerb::LineTo(150.0, 0.0),
            ]
        );
    }
}
