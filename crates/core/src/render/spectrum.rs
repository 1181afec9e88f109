//! Frequency-domain layers: bars and a smooth wave outline.
//!
//! Both draw centred on the layer origin. Each frame issues a bounded number
//! of draw calls no matter how many bars or points there are.

use super::Scratch;
use crate::{
    scene::{BarSpectrum, WaveSpectrum},
    surface::{LinearGradient, Paint, Surface},
};

/// Shadow length as a fraction of the bar height before capping.
const SHADOW_RATIO: f32 = 0.5;
/// Horizontal spacing of wave spectrum points in pixels.
const WAVE_POINT_SPACING: f32 = 4.0;

/// `max(1, floor(width / (bar_width + bar_spacing)))`.
pub fn bar_count(width: f32, bar_width: f32, bar_spacing: f32) -> usize {
    let stride = bar_width + bar_spacing;
    if !(stride > 0.0) || !(width > 0.0) {
        return 1;
    }
    ((width / stride).floor() as usize).max(1)
}

pub fn wave_point_count(width: f32) -> usize {
    if !(width > 0.0) {
        return 2;
    }
    ((width / WAVE_POINT_SPACING).floor() as usize).max(2)
}

pub(super) fn draw_bars<S: Surface + ?Sized>(
    surface: &mut S,
    layer: &BarSpectrum,
    amplitudes: &[f32],
    scratch: &mut Scratch,
) {
    let height = layer.height.max(0.0);
    let left = -layer.width * 0.5;
    let stride = layer.bar_width + layer.bar_spacing;
    let baseline = if layer.mirror { 0.0 } else { height * 0.5 };

    scratch.path.clear();
    scratch.aux.clear();
    for (index, amplitude) in amplitudes.iter().enumerate() {
        let bar = amplitude.clamp(0.0, 1.0) * height;
        if bar <= 0.0 {
            continue;
        }
        let x = left + index as f32 * stride;
        scratch.path.rect(x, baseline - bar, layer.bar_width, bar);
        if layer.mirror {
            // The reflection occupies the space the shadow would use.
            scratch.aux.rect(x, baseline, layer.bar_width, bar);
        } else {
            let shadow = (bar * SHADOW_RATIO).min(layer.shadow_height);
            if shadow > 0.0 {
                scratch.aux.rect(x, baseline, layer.bar_width, shadow);
            }
        }
    }

    if scratch.path.is_empty() {
        return;
    }
    let upward = Paint::Linear(LinearGradient {
        start: (0.0, baseline),
        end: (0.0, baseline - height),
        from: layer.color_start,
        to: layer.color_end,
    });

    if layer.mirror {
        let downward = Paint::Linear(LinearGradient {
            start: (0.0, baseline),
            end: (0.0, baseline + height),
            from: layer.color_start,
            to: layer.color_end,
        });
        surface.fill_path(&scratch.path, &upward);
        surface.fill_path(&scratch.aux, &downward);
        return;
    }

    if !scratch.aux.is_empty() {
        surface.fill_path(&scratch.aux, &Paint::Solid(layer.shadow_color));
    }
    surface.fill_path(&scratch.path, &upward);
}

pub(super) fn draw_wave<S: Surface + ?Sized>(
    surface: &mut S,
    layer: &WaveSpectrum,
    amplitudes: &[f32],
    scratch: &mut Scratch,
) {
    let count = amplitudes.len();
    if count < 2 {
        return;
    }
    let height = layer.height.max(0.0);
    let left = -layer.width * 0.5;
    let baseline = height * 0.5;
    let step = layer.width / (count - 1) as f32;
    let point = |index: usize| {
        (
            left + index as f32 * step,
            baseline - amplitudes[index].clamp(0.0, 1.0) * height,
        )
    };

    // Each sample is a control point; the curve passes through the midpoints.
    let path = &mut scratch.path;
    path.clear();
    let (x0, y0) = point(0);
    path.move_to(x0, y0);
    for index in 1..count - 1 {
        let (cx, cy) = point(index);
        let (nx, ny) = point(index + 1);
        path.quad_to(cx, cy, (cx + nx) * 0.5, (cy + ny) * 0.5);
    }
    let (xn, yn) = point(count - 1);
    path.line_to(xn, yn);

    if let Some(fill) = layer.fill_color {
        scratch.aux.clear();
        scratch.aux.clone_from(path);
        scratch
            .aux
            .line_to(left + layer.width, baseline)
            .line_to(left, baseline)
            .close();
        surface.fill_path(&scratch.aux, &Paint::Solid(fill));
    }
    surface.stroke_path(path, &Paint::Solid(layer.stroke_color), layer.line_width);
}
