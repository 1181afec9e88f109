//! Particle field simulation.
//!
//! Positions live in flat buffers relative to the field centre. The layout is
//! rebuilt only when the particle count or motion mode changes; every other
//! setting applies on the next frame without disturbing the particles.

use std::f32::consts::TAU;

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::Scratch;
use crate::{
    audio::Bands,
    scene::{BlendMode, ParticleDirection, ParticleField},
    surface::{Paint, Surface},
};

/// Outward travel per frame at speed 1, in pixels.
const RADIAL_STEP: f32 = 2.0;
/// Sideways travel per frame at speed 1, in pixels.
const DRIFT_STEP: f32 = 2.0;
/// Orbit speed in radians per frame at speed 1 and silence.
const ORBIT_STEP: f32 = 0.01;
const ORBIT_AUDIO_STEP: f32 = 0.05;
/// Fractional radius pulse at full audio in orbit mode.
const PULSE: f32 = 0.3;
const AUDIO_BOOST: f32 = 1.2;

/// Envelope follower settings for reactive opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub decay: f32,
    pub epsilon: f32,
}

#[derive(Debug, Clone)]
pub struct ParticleFieldState {
    count: usize,
    direction: ParticleDirection,
    /// Interleaved `x, y` pairs relative to the field centre.
    positions: Vec<f32>,
    angles: Vec<f32>,
    /// Radial distance in centre-out mode, base orbit radius in orbit mode.
    radii: Vec<f32>,
    /// Per-particle speed multiplier in `0.5..1.5`.
    speeds: Vec<f32>,
    envelope: f32,
    rng: StdRng,
}

/// Half the canvas diagonal scaled by the layer's depth.
pub fn max_extent(width: f32, height: f32, depth: f32) -> f32 {
    width.hypot(height) * 0.5 * depth.max(0.0)
}

impl ParticleFieldState {
    pub fn new(layer: &ParticleField, width: f32, height: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut state = Self {
            count: 0,
            direction: layer.direction,
            positions: Vec::new(),
            angles: Vec::new(),
            radii: Vec::new(),
            speeds: Vec::new(),
            envelope: 0.0,
            rng,
        };
        state.initialise(layer, width, height);
        state
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn direction(&self) -> ParticleDirection {
        self.direction
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn radii(&self) -> &[f32] {
        &self.radii
    }

    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    fn initialise(&mut self, layer: &ParticleField, width: f32, height: f32) {
        let count = layer.count as usize;
        let extent = max_extent(width, height, layer.depth);
        self.count = count;
        self.direction = layer.direction;

        self.positions.clear();
        self.angles.clear();
        self.radii.clear();
        self.speeds.clear();
        for _ in 0..count {
            let angle = self.rng.gen_range(0.0..TAU);
            let radius = match layer.direction {
                ParticleDirection::CentreOut => self.rng.gen::<f32>() * extent,
                ParticleDirection::RotateBeat => (0.1 + 0.9 * self.rng.gen::<f32>()) * extent,
                ParticleDirection::LeftToRight => 0.0,
            };
            let (x, y) = match layer.direction {
                ParticleDirection::LeftToRight => (
                    self.rng.gen::<f32>() * width - width * 0.5,
                    self.rng.gen::<f32>() * height - height * 0.5,
                ),
                _ => (angle.cos() * radius, angle.sin() * radius),
            };
            self.angles.push(angle);
            self.radii.push(radius);
            self.speeds.push(self.rng.gen_range(0.5..1.5));
            self.positions.extend([x, y]);
        }
    }

    /// Rebuilds the layout when the count or mode no longer matches `layer`.
    /// Returns whether it did.
    pub fn sync(&mut self, layer: &ParticleField, width: f32, height: f32) -> bool {
        if self.count == layer.count as usize && self.direction == layer.direction {
            return false;
        }
        self.initialise(layer, width, height);
        true
    }

    /// Advances one frame. `audio` is the selected band energy in `0..=1`.
    pub fn step(&mut self, layer: &ParticleField, width: f32, height: f32, audio: f32, envelope: Envelope) {
        self.sync(layer, width, height);

        let audio = audio.clamp(0.0, 1.0);
        let drive = 1.0 + audio * layer.sensitivity.max(0.0) * AUDIO_BOOST;
        let speed = layer.speed.max(0.0);
        let extent = max_extent(width, height, layer.depth);

        match self.direction {
            ParticleDirection::CentreOut => {
                for i in 0..self.count {
                    if self.radii[i] > extent {
                        self.radii[i] = 0.0;
                        self.angles[i] = self.rng.gen_range(0.0..TAU);
                    } else {
                        self.radii[i] += RADIAL_STEP * speed * self.speeds[i] * drive;
                    }
                    let (sin, cos) = self.angles[i].sin_cos();
                    self.positions[2 * i] = cos * self.radii[i];
                    self.positions[2 * i + 1] = sin * self.radii[i];
                }
            }
            ParticleDirection::RotateBeat => {
                let spin = (ORBIT_STEP + ORBIT_AUDIO_STEP * audio * layer.sensitivity.max(0.0)) * speed;
                let pulse = 1.0 + PULSE * audio;
                for i in 0..self.count {
                    self.angles[i] = (self.angles[i] + spin * self.speeds[i]) % TAU;
                    let radius = self.radii[i] * pulse;
                    let (sin, cos) = self.angles[i].sin_cos();
                    self.positions[2 * i] = cos * radius;
                    self.positions[2 * i + 1] = sin * radius;
                }
            }
            ParticleDirection::LeftToRight => {
                let (left, top) = (-width * 0.5, -height * 0.5);
                for i in 0..self.count {
                    let x = self.positions[2 * i] + DRIFT_STEP * speed * self.speeds[i] * drive;
                    if x > left + width {
                        self.positions[2 * i] = left;
                        self.positions[2 * i + 1] = top + self.rng.gen::<f32>() * height;
                    } else {
                        self.positions[2 * i] = x;
                    }
                }
            }
        }

        self.envelope = self.envelope.max(audio) * envelope.decay;
        if self.envelope < envelope.epsilon {
            self.envelope = 0.0;
        }
    }

    /// Particle alpha for the current frame.
    pub fn opacity(&self, layer: &ParticleField) -> f32 {
        let base = layer.particle_opacity.clamp(0.0, 1.0);
        if layer.opacity_reactive {
            base * self.envelope.clamp(0.0, 1.0)
        } else {
            base
        }
    }
}

/// Mean of the selected bands, or zero when none is selected.
pub fn band_energy(layer: &ParticleField, bands: Bands) -> f32 {
    let selected = [
        (layer.bands.bass, bands.bass),
        (layer.bands.mid, bands.mid),
        (layer.bands.high, bands.high),
    ];
    let (sum, count) = selected
        .iter()
        .filter(|(enabled, _)| *enabled)
        .fold((0.0, 0), |(sum, count), (_, value)| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

pub(super) fn draw<S: Surface + ?Sized>(
    surface: &mut S,
    layer: &ParticleField,
    state: &ParticleFieldState,
    scratch: &mut Scratch,
) {
    let opacity = state.opacity(layer);
    if state.count == 0 || opacity <= 0.0 || layer.size <= 0.0 {
        return;
    }

    let radius = layer.size * 0.5;
    scratch.path.clear();
    for point in state.positions.chunks_exact(2) {
        scratch.path.circle(point[0], point[1], radius);
    }

    surface.set_blend_mode(BlendMode::Lighter);
    surface.set_alpha(opacity);
    surface.fill_path(&scratch.path, &Paint::Solid(layer.color));
}
