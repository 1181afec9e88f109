use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{surface::PixmapSurface, Result};

/// Where and how rendered frames are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordingSettings {
    pub output_dir: PathBuf,
    pub file_prefix: String,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("frames"),
            file_prefix: "frame".to_string(),
        }
    }
}

/// Writes each frame as a numbered PNG: `<prefix>_00000.png`, `<prefix>_00001.png`, ...
#[derive(Debug)]
pub struct FrameRecorder {
    settings: RecordingSettings,
    written: usize,
}

impl FrameRecorder {
    /// Creates the output directory if needed.
    pub fn new(settings: RecordingSettings) -> Result<Self> {
        fs::create_dir_all(&settings.output_dir)?;
        info!(dir = %settings.output_dir.display(), "recording frames");
        Ok(Self {
            settings,
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }

    pub fn write(&mut self, surface: &PixmapSurface) -> Result<PathBuf> {
        let path = self.settings.output_dir.join(format!(
            "{}_{:05}.png",
            self.settings.file_prefix, self.written
        ));
        surface.save_png(&path)?;
        debug!(path = %path.display(), "frame written");
        self.written += 1;
        Ok(path)
    }

    /// Returns the number of frames written.
    pub fn finish(self) -> usize {
        info!(frames = self.written, dir = %self.settings.output_dir.display(), "recording finished");
        self.written
    }
}
