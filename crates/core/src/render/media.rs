use crate::{
    assets::{ImageCache, ImageState},
    scene::{Image, LayerId, Text},
    surface::{Surface, TextStyle},
};

pub(super) fn draw_text<S: Surface + ?Sized>(surface: &mut S, layer: &Text, level: f32) {
    if layer.text.trim().is_empty() {
        return;
    }
    if layer.reactive {
        let scale = reactive_scale(level, layer.reactive_gain);
        surface.scale(scale, scale);
    }
    let style = TextStyle {
        font_family: &layer.font_family,
        size: layer.font_size,
        bold: layer.bold,
        italic: layer.italic,
        color: layer.color,
    };
    surface.fill_text(&layer.text, &style, 0.0, 0.0);
}

/// `1 + level * gain`, never below zero.
pub fn reactive_scale(level: f32, gain: f32) -> f32 {
    (1.0 + level * gain).max(0.0)
}

/// Drawn size of an image layer on a `canvas_width` x `canvas_height` canvas.
pub fn image_size(layer: &Image, aspect: f32, canvas_width: f32, canvas_height: f32) -> (f32, f32) {
    let width = canvas_width * layer.width_percent.max(0.0) / 100.0;
    let height = if layer.lock_aspect && aspect > 0.0 {
        width / aspect
    } else {
        canvas_height * layer.height_percent.max(0.0) / 100.0
    };
    (width, height)
}

pub(super) fn draw_image<S: Surface + ?Sized>(
    surface: &mut S,
    id: LayerId,
    layer: &Image,
    images: &mut ImageCache,
    level: f32,
    canvas: (f32, f32),
) {
    let Some(src) = layer.src.as_deref().filter(|src| !src.is_empty()) else {
        return;
    };
    let ImageState::Ready(image) = images.request(id, src) else {
        return;
    };

    let (width, height) = image_size(layer, image.aspect(), canvas.0, canvas.1);
    if width <= 0.0 || height <= 0.0 {
        return;
    }
    if layer.reactive {
        let scale = reactive_scale(level, layer.reactive_gain);
        surface.scale(scale, scale);
    }
    surface.draw_image(&image, -width * 0.5, -height * 0.5, width, height);
}
