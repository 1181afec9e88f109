//! Per-layer frequency binning.
//!
//! Raw analyser bins go through four stages: decibel re-normalisation against
//! the layer's `max_decibels`, band-pass selection by bin centre frequency,
//! resampling to the requested bar count, and exponential smoothing against
//! the previous frame's output. Each layer owns its own smoothing history.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    config::{AudioConfig, RenderConfig},
    scene::{FrequencyRange, LayerId},
};

/// Smoothing history and the filter settings it was last run with.
#[derive(Debug, Clone, Default)]
pub struct FrequencyParser {
    range: Option<FrequencyRange>,
    filtered: Vec<f32>,
    history: Vec<f32>,
}

impl FrequencyParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(&self) -> Option<FrequencyRange> {
        self.range
    }

    /// Updates the stored settings. The smoothing history is kept.
    pub fn configure(&mut self, range: FrequencyRange) {
        self.range = Some(range);
    }

    pub fn parse(
        &mut self,
        bins: &[f32],
        audio: &AudioConfig,
        noise_floor_db: f32,
        range: FrequencyRange,
        target_bins: Option<usize>,
    ) -> &[f32] {
        self.configure(range);

        let min_frequency = range.min_frequency.min(range.max_frequency);
        let max_frequency = range.max_frequency.max(range.min_frequency);
        let analyser_span = audio.analyser_max_decibels - audio.analyser_min_decibels;
        let layer_span = (range.max_decibels - noise_floor_db).max(f32::EPSILON);

        self.filtered.clear();
        for (index, value) in bins.iter().enumerate() {
            let frequency = audio.bin_frequency(index);
            if frequency < min_frequency || frequency > max_frequency {
                continue;
            }
            let decibels = audio.analyser_min_decibels + value.clamp(0.0, 1.0) * analyser_span;
            let normalised = (decibels - noise_floor_db) / layer_span;
            self.filtered.push(if normalised.is_finite() {
                normalised.clamp(0.0, 1.0)
            } else {
                0.0
            });
        }

        let len = target_bins.unwrap_or(self.filtered.len());
        self.history.resize(len, 0.0);

        let retention = range.smoothing.clamp(0.0, 1.0);
        for (index, previous) in self.history.iter_mut().enumerate() {
            let sample = resample(&self.filtered, index, len);
            *previous = (retention * *previous + (1.0 - retention) * sample).clamp(0.0, 1.0);
        }

        &self.history
    }
}

/// Linear interpolation of `values` at output slot `index` of `len`. Depends
/// only on the two lengths, so a fixed target count maps the same way every
/// frame.
fn resample(values: &[f32], index: usize, len: usize) -> f32 {
    match values.len() {
        0 => 0.0,
        1 => values[0],
        source_len if source_len == len => values[index],
        source_len => {
            let last = (source_len - 1) as f32;
            let position = if len <= 1 {
                last * 0.5
            } else {
                index as f32 * last / (len - 1) as f32
            };
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(source_len - 1);
            let t = position - lower as f32;
            values[lower] * (1.0 - t) + values[upper] * t
        }
    }
}

/// All parsers of a compositor, keyed by layer.
#[derive(Debug, Clone)]
pub struct FrequencyParserBank {
    audio: AudioConfig,
    noise_floor_db: f32,
    parsers: HashMap<LayerId, FrequencyParser>,
}

impl FrequencyParserBank {
    pub fn new(audio: AudioConfig, render: &RenderConfig) -> Self {
        Self {
            audio,
            noise_floor_db: render.noise_floor_decibels,
            parsers: HashMap::new(),
        }
    }

    /// Parses `bins` with the layer's own parser, creating it on first use.
    pub fn parse(
        &mut self,
        bins: &[f32],
        layer: LayerId,
        range: FrequencyRange,
        target_bins: Option<usize>,
    ) -> &[f32] {
        let parser = self.parsers.entry(layer).or_insert_with(|| {
            debug!(%layer, "creating frequency parser");
            FrequencyParser::new()
        });
        if parser.range().is_some_and(|current| current != range) {
            debug!(%layer, ?range, "reconfiguring frequency parser");
        }
        parser.parse(bins, &self.audio, self.noise_floor_db, range, target_bins)
    }

    pub fn get(&self, layer: LayerId) -> Option<&FrequencyParser> {
        self.parsers.get(&layer)
    }

    pub fn remove(&mut self, layer: LayerId) -> bool {
        self.parsers.remove(&layer).is_some()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(LayerId) -> bool) {
        self.parsers.retain(|layer, _| keep(*layer));
    }

    pub fn clear(&mut self) {
        self.parsers.clear();
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}
