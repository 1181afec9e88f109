//! Core library for the layer visualiser.
//!
//! A [`Scene`] is an ordered stack of audio-reactive layers. Once per frame
//! the [`Compositor`] draws every visible layer onto a [`Surface`], driven by
//! the latest [`AudioFrame`]. Each module owns one subsystem: scene editing,
//! per-layer frequency smoothing, the layer renderers, image loading, the
//! reference analyser and the frame clock and recorder used by the CLI.

pub mod analysis;
pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod frequency;
pub mod record;
pub mod render;
pub mod scene;
pub mod session;
pub mod surface;
pub mod timeline;

pub use analysis::SpectrumAnalyser;
pub use assets::{ImageCache, ImageState};
pub use audio::{AudioClip, AudioFrame, Bands, Beat};
pub use config::{AudioConfig, EngineConfig, RenderConfig};
pub use error::{Result, VisualiserError};
pub use frequency::{FrequencyParser, FrequencyParserBank};
pub use record::{FrameRecorder, RecordingSettings};
pub use render::Compositor;
pub use scene::{DropPosition, Layer, LayerId, LayerKind, LayerType, MoveDirection, Scene};
pub use session::Session;
pub use surface::{PixmapSurface, RecordingSurface, Surface};
pub use timeline::{FrameClock, RenderLoop, StopHandle};
