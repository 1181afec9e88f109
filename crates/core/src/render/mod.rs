//! Per-frame compositing.
//!
//! The [`Compositor`] walks the scene bottom to top and draws every visible
//! leaf layer inside its own save/restore bracket: translate to the layer's
//! position, rotate, scale, apply opacity and blend mode, then hand off to
//! the renderer for that layer type. All state that survives between frames
//! (smoothing histories, particle buffers, meshes, decoded images) lives
//! here, keyed by layer id.

pub mod geometry;
pub mod media;
pub mod particles;
pub mod polyhedron;
pub mod spectrum;
pub mod waveform;

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::{
    assets::ImageCache,
    audio::AudioFrame,
    config::EngineConfig,
    frequency::FrequencyParserBank,
    scene::{Layer, LayerId, LayerKind, ParentIndex, Scene},
    surface::{with_saved, Path, Surface},
};

pub use geometry::{GeometryCache, GeometryKey, Mesh};
pub use particles::{Envelope, ParticleFieldState};
pub use polyhedron::Projection;
pub use waveform::WaveformState;

/// Path buffers shared by the 2D renderers.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    pub(crate) path: Path,
    pub(crate) aux: Path,
}

#[derive(Debug)]
pub struct Compositor {
    config: EngineConfig,
    parsers: FrequencyParserBank,
    waveforms: HashMap<LayerId, WaveformState>,
    particles: HashMap<LayerId, ParticleFieldState>,
    geometry: GeometryCache,
    images: ImageCache,
    projection: Projection,
    scratch: Scratch,
    parents: ParentIndex,
    frames: u64,
}

impl Compositor {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            parsers: FrequencyParserBank::new(config.audio.clone(), &config.render),
            config,
            waveforms: HashMap::new(),
            particles: HashMap::new(),
            geometry: GeometryCache::new(),
            images: ImageCache::new(),
            projection: Projection::new(),
            scratch: Scratch::default(),
            parents: ParentIndex::default(),
            frames: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn parsers(&self) -> &FrequencyParserBank {
        &self.parsers
    }

    pub fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn particles(&self, layer: LayerId) -> Option<&ParticleFieldState> {
        self.particles.get(&layer)
    }

    pub fn waveform(&self, layer: LayerId) -> Option<&WaveformState> {
        self.waveforms.get(&layer)
    }

    /// Draws one frame of `scene` onto `surface`.
    pub fn render<S: Surface + ?Sized>(&mut self, scene: &Scene, audio: &AudioFrame, surface: &mut S) {
        surface.clear(scene.background_color);
        let level = audio.level();
        let canvas = (scene.width as f32, scene.height as f32);

        self.parents.rebuild(scene);

        for (index, layer) in scene.layers.iter().enumerate() {
            if matches!(layer.kind, LayerKind::Group(_) | LayerKind::Unsupported(_)) {
                continue;
            }
            if layer.opacity <= 0.0 || !self.parents.is_effectively_visible(scene, index) {
                continue;
            }
            with_saved(surface, |surface| {
                let t = &layer.transform;
                surface.translate(t.x, t.y);
                surface.rotate(t.rotation.to_radians());
                surface.scale(t.scale, t.scale);
                surface.set_alpha(layer.opacity.min(1.0));
                surface.set_blend_mode(layer.blend_mode);
                self.draw_layer(layer, audio, level, canvas, surface);
            });
        }

        self.frames += 1;
        trace!(frame = self.frames, layers = scene.layers.len(), "frame composited");
    }

    fn draw_layer<S: Surface + ?Sized>(
        &mut self,
        layer: &Layer,
        audio: &AudioFrame,
        level: f32,
        canvas: (f32, f32),
        surface: &mut S,
    ) {
        let id = layer.id;
        match &layer.kind {
            LayerKind::BarSpectrum(bars) => {
                let count = spectrum::bar_count(bars.width, bars.bar_width, bars.bar_spacing);
                let amplitudes = self.parsers.parse(&audio.bins, id, bars.range, Some(count));
                spectrum::draw_bars(surface, bars, amplitudes, &mut self.scratch);
            }
            LayerKind::WaveSpectrum(wave) => {
                let count = spectrum::wave_point_count(wave.width);
                let amplitudes = self.parsers.parse(&audio.bins, id, wave.range, Some(count));
                spectrum::draw_wave(surface, wave, amplitudes, &mut self.scratch);
            }
            LayerKind::SoundWave(wave) => {
                let state = self.waveforms.entry(id).or_default();
                waveform::draw_line(surface, wave, state, &audio.waveform, &mut self.scratch);
            }
            LayerKind::SoundWave2(wave) => {
                waveform::draw_radial(surface, wave, &audio.waveform, &mut self.scratch);
            }
            LayerKind::Text(text) => media::draw_text(surface, text, level),
            LayerKind::Image(image) => {
                media::draw_image(surface, id, image, &mut self.images, level, canvas);
            }
            LayerKind::Geometry3D(solid) => {
                let mesh = self.geometry.get_or_build(solid.shape, solid.size);
                polyhedron::draw(
                    surface,
                    solid,
                    &mesh,
                    level,
                    self.config.render.focal_distance,
                    &mut self.projection,
                );
            }
            LayerKind::ParticleField(field) => {
                let render = &self.config.render;
                let state = self.particles.entry(id).or_insert_with(|| {
                    debug!(%id, count = field.count, "creating particle field");
                    ParticleFieldState::new(field, canvas.0, canvas.1, render.particle_seed)
                });
                let energy = particles::band_energy(field, audio.bands_or_derived(&self.config.audio));
                let envelope = Envelope {
                    decay: render.envelope_decay,
                    epsilon: render.envelope_epsilon,
                };
                state.step(field, canvas.0, canvas.1, energy, envelope);
                particles::draw(surface, field, state, &mut self.scratch);
            }
            LayerKind::Group(_) | LayerKind::Unsupported(_) => {}
        }
    }

    /// Releases everything held for `layer`. Returns whether anything was held.
    pub fn forget_layer(&mut self, layer: LayerId) -> bool {
        let mut released = self.parsers.remove(layer);
        released |= self.waveforms.remove(&layer).is_some();
        released |= self.particles.remove(&layer).is_some();
        released |= self.images.remove(layer);
        if released {
            debug!(%layer, "released layer caches");
        }
        released
    }

    /// Drops caches belonging to layers that are no longer in `scene`, and
    /// meshes that no geometry layer references.
    pub fn prune(&mut self, scene: &Scene) {
        let live: HashSet<LayerId> = scene.layers.iter().map(|layer| layer.id).collect();
        let stale: Vec<LayerId> = self
            .waveforms
            .keys()
            .chain(self.particles.keys())
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        for id in stale {
            self.forget_layer(id);
        }
        self.parsers.retain(|id| live.contains(&id));
        self.images.retain(|id| live.contains(&id));

        let meshes: HashSet<GeometryKey> = scene
            .layers
            .iter()
            .filter_map(|layer| match &layer.kind {
                LayerKind::Geometry3D(solid) => Some(GeometryKey::new(solid.shape, solid.size)),
                _ => None,
            })
            .collect();
        self.geometry.retain(&meshes);
    }

    /// Releases every cache. The compositor stays usable and starts from
    /// scratch on the next frame.
    pub fn teardown(&mut self) {
        self.parsers.clear();
        self.waveforms.clear();
        self.particles.clear();
        self.geometry.clear();
        self.images.clear();
        self.projection = Projection::new();
        self.scratch = Scratch::default();
        debug!(frames = self.frames, "compositor torn down");
    }

    /// Number of layers that currently hold any per-layer state.
    pub fn cached_layer_count(&self) -> usize {
        self.parsers.len() + self.waveforms.len() + self.particles.len() + self.images.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scene::{BlendMode, LayerTransform, LayerType},
        surface::{DrawOp, RecordingSurface},
    };

    fn scene_with(types: &[LayerType]) -> (Scene, Vec<LayerId>) {
        let mut scene = Scene::new(640, 360);
        let ids = types.iter().map(|t| scene.add(*t).unwrap()).collect();
        (scene, ids)
    }

    fn loud_frame() -> AudioFrame {
        AudioFrame {
            bins: vec![0.9; 1024],
            waveform: (0..1024).map(|i| (i as f32 * 0.05).sin()).collect(),
            ..AudioFrame::default()
        }
    }

    #[test]
    fn every_layer_type_renders_with_balanced_state() {
        let (scene, _) = scene_with(LayerType::all());
        let mut compositor = Compositor::new(EngineConfig::default());
        let mut surface = RecordingSurface::new(640, 360);

        compositor.render(&scene, &loud_frame(), &mut surface);
        compositor.render(&scene, &AudioFrame::silent(), &mut surface);

        assert_eq!(surface.save_depth(), 0);
        assert_eq!(compositor.frames_rendered(), 2);
        assert!(matches!(surface.calls()[0].op, DrawOp::Clear(_)));
    }

    #[test]
    fn transform_and_blend_apply_per_layer() {
        let (mut scene, ids) = scene_with(&[LayerType::Text]);
        scene.layers[0].transform = LayerTransform {
            x: 10.0,
            y: 20.0,
            rotation: 0.0,
            scale: 2.0,
        };
        scene.layers[0].opacity = 0.5;
        scene.layers[0].blend_mode = BlendMode::Screen;
        let mut compositor = Compositor::new(EngineConfig::default());
        let mut surface = RecordingSurface::new(640, 360);

        compositor.render(&scene, &AudioFrame::silent(), &mut surface);

        let text = &surface.calls()[1];
        assert_eq!(text.transform, [2.0, 0.0, 0.0, 2.0, 10.0, 20.0]);
        assert_eq!(text.alpha, 0.5);
        assert_eq!(text.blend, BlendMode::Screen);
        assert_eq!(surface.current_blend(), BlendMode::Normal);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn hidden_and_transparent_layers_are_skipped() {
        let (mut scene, ids) = scene_with(&[LayerType::Text, LayerType::Text, LayerType::Group]);
        scene.toggle_visible(ids[0]).unwrap();
        scene.layers[1].opacity = 0.0;
        let mut compositor = Compositor::new(EngineConfig::default());
        let mut surface = RecordingSurface::new(640, 360);

        compositor.render(&scene, &AudioFrame::silent(), &mut surface);

        assert_eq!(surface.calls().len(), 1);
    }

    #[test]
    fn forget_and_prune_release_state() {
        let (mut scene, ids) = scene_with(&[
            LayerType::BarSpectrum,
            LayerType::SoundWave,
            LayerType::ParticleField,
            LayerType::Geometry3D,
        ]);
        let mut compositor = Compositor::new(EngineConfig::default());
        let mut surface = RecordingSurface::new(640, 360);
        compositor.render(&scene, &loud_frame(), &mut surface);
        assert_eq!(compositor.cached_layer_count(), 3);
        assert_eq!(compositor.geometry().len(), 1);

        assert!(compositor.forget_layer(ids[0]));
        assert!(!compositor.forget_layer(ids[0]));

        scene.remove(ids[2]).unwrap();
        scene.remove(ids[3]).unwrap();
        compositor.prune(&scene);
        assert!(compositor.particles(ids[2]).is_none());
        assert!(compositor.waveform(ids[1]).is_some());
        assert!(compositor.geometry().is_empty());

        compositor.teardown();
        assert_eq!(compositor.cached_layer_count(), 0);
    }
}
