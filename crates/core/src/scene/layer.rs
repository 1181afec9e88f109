//! Layer definitions.
//!
//! A [`Layer`] is the shared header (identity, visibility, compositing and a 2D
//! transform) plus a [`LayerKind`] payload selected by the `type` tag.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::Color;

/// Stable identity of a layer within a scene. Used as the key of every
/// per-layer cache in the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Compositing operator used when a layer is drawn over existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
    /// Additive blending; never darkens the destination.
    Lighter,
}

/// Translation, rotation (degrees) and uniform scale applied before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerTransform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale: f32,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale: 1.0,
        }
    }
}

impl LayerTransform {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub transform: LayerTransform,
    #[serde(flatten)]
    pub kind: LayerKind,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

impl Layer {
    pub fn new(id: LayerId, name: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id,
            name: name.into(),
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            transform: LayerTransform::default(),
            kind,
        }
    }

    pub fn layer_type(&self) -> Option<LayerType> {
        self.kind.layer_type()
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, LayerKind::Group(_))
    }

    pub fn children(&self) -> &[LayerId] {
        match &self.kind {
            LayerKind::Group(group) => &group.children,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<LayerId>> {
        match &mut self.kind {
            LayerKind::Group(group) => Some(&mut group.children),
            _ => None,
        }
    }
}

/// Variant payloads. Tags that this build does not know deserialize to
/// [`LayerKind::Unsupported`], are skipped at render time and serialize back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "type", rename_all = "camelCase")]
pub enum LayerKind {
    BarSpectrum(BarSpectrum),
    WaveSpectrum(WaveSpectrum),
    SoundWave(SoundWave),
    SoundWave2(SoundWave2),
    Text(Text),
    Image(Image),
    #[serde(rename = "geometry3d")]
    Geometry3D(Geometry3D),
    ParticleField(ParticleField),
    Group(Group),
    #[serde(skip)]
    Unsupported(UnknownLayer),
}

impl Serialize for LayerKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LayerKind::Unsupported(unknown) => unknown.fields.serialize(serializer),
            known => LayerKind::serialize(known, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for LayerKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        let tag = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| de::Error::missing_field("type"))?;
        if LayerType::from_tag(tag).is_none() {
            return Ok(LayerKind::Unsupported(UnknownLayer { fields }));
        }
        LayerKind::deserialize(Value::Object(fields)).map_err(de::Error::custom)
    }
}

/// A layer type this build cannot draw. Its fields, `type` included, are
/// held verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownLayer {
    fields: Map<String, Value>,
}

impl UnknownLayer {
    pub fn type_name(&self) -> &str {
        self.fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Tag-only mirror of [`LayerKind`] used to request new layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerType {
    BarSpectrum,
    WaveSpectrum,
    SoundWave,
    SoundWave2,
    Text,
    Image,
    #[serde(rename = "geometry3d")]
    Geometry3D,
    ParticleField,
    Group,
}

impl LayerType {
    pub fn all() -> &'static [LayerType] {
        &[
            LayerType::BarSpectrum,
            LayerType::WaveSpectrum,
            LayerType::SoundWave,
            LayerType::SoundWave2,
            LayerType::Text,
            LayerType::Image,
            LayerType::Geometry3D,
            LayerType::ParticleField,
            LayerType::Group,
        ]
    }

    /// Value of the `type` field for this layer type.
    pub fn tag(self) -> &'static str {
        match self {
            LayerType::BarSpectrum => "barSpectrum",
            LayerType::WaveSpectrum => "waveSpectrum",
            LayerType::SoundWave => "soundWave",
            LayerType::SoundWave2 => "soundWave2",
            LayerType::Text => "text",
            LayerType::Image => "image",
            LayerType::Geometry3D => "geometry3d",
            LayerType::ParticleField => "particleField",
            LayerType::Group => "group",
        }
    }

    pub fn from_tag(tag: &str) -> Option<LayerType> {
        LayerType::all()
            .iter()
            .copied()
            .find(|layer_type| layer_type.tag() == tag)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LayerType::BarSpectrum => "Bar Spectrum",
            LayerType::WaveSpectrum => "Wave Spectrum",
            LayerType::SoundWave => "Sound Wave",
            LayerType::SoundWave2 => "Sound Wave 2",
            LayerType::Text => "Text",
            LayerType::Image => "Image",
            LayerType::Geometry3D => "3D Geometry",
            LayerType::ParticleField => "Particle Field",
            LayerType::Group => "Group",
        }
    }
}

impl LayerKind {
    pub fn layer_type(&self) -> Option<LayerType> {
        Some(match self {
            LayerKind::BarSpectrum(_) => LayerType::BarSpectrum,
            LayerKind::WaveSpectrum(_) => LayerType::WaveSpectrum,
            LayerKind::SoundWave(_) => LayerType::SoundWave,
            LayerKind::SoundWave2(_) => LayerType::SoundWave2,
            LayerKind::Text(_) => LayerType::Text,
            LayerKind::Image(_) => LayerType::Image,
            LayerKind::Geometry3D(_) => LayerType::Geometry3D,
            LayerKind::ParticleField(_) => LayerType::ParticleField,
            LayerKind::Group(_) => LayerType::Group,
            LayerKind::Unsupported(_) => return None,
        })
    }

    /// Default payload for a freshly inserted layer of the given type.
    pub fn default_for(layer_type: LayerType) -> Self {
        match layer_type {
            LayerType::BarSpectrum => LayerKind::BarSpectrum(BarSpectrum::default()),
            LayerType::WaveSpectrum => LayerKind::WaveSpectrum(WaveSpectrum::default()),
            LayerType::SoundWave => LayerKind::SoundWave(SoundWave::default()),
            LayerType::SoundWave2 => LayerKind::SoundWave2(SoundWave2::default()),
            LayerType::Text => LayerKind::Text(Text::default()),
            LayerType::Image => LayerKind::Image(Image::default()),
            LayerType::Geometry3D => LayerKind::Geometry3D(Geometry3D::default()),
            LayerType::ParticleField => LayerKind::ParticleField(ParticleField::default()),
            LayerType::Group => LayerKind::Group(Group::default()),
        }
    }
}

/// Frequency window and response settings shared by the spectrum layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrequencyRange {
    pub min_frequency: f32,
    pub max_frequency: f32,
    pub max_decibels: f32,
    /// Retention factor in `0..=1`; 0 disables smoothing.
    pub smoothing: f32,
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self {
            min_frequency: 20.0,
            max_frequency: 16_000.0,
            max_decibels: -30.0,
            smoothing: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BarSpectrum {
    pub width: f32,
    pub height: f32,
    pub bar_width: f32,
    pub bar_spacing: f32,
    pub color_start: Color,
    pub color_end: Color,
    pub shadow_height: f32,
    pub shadow_color: Color,
    #[serde(flatten)]
    pub range: FrequencyRange,
    pub mirror: bool,
}

impl Default for BarSpectrum {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 200.0,
            bar_width: 8.0,
            bar_spacing: 2.0,
            color_start: Color::rgb(0x00, 0xc6, 0xff),
            color_end: Color::rgb(0xff, 0x00, 0x99),
            shadow_height: 0.0,
            shadow_color: Color::rgba(0, 0, 0, 0x80),
            range: FrequencyRange::default(),
            mirror: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WaveSpectrum {
    pub width: f32,
    pub height: f32,
    pub stroke_color: Color,
    pub line_width: f32,
    pub fill_color: Option<Color>,
    #[serde(flatten)]
    pub range: FrequencyRange,
}

impl Default for WaveSpectrum {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 200.0,
            stroke_color: Color::WHITE,
            line_width: 2.0,
            fill_color: None,
            range: FrequencyRange::default(),
        }
    }
}

/// Horizontal time-domain line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SoundWave {
    pub width: f32,
    pub height: f32,
    pub color: Color,
    pub line_width: f32,
    pub fill_color: Option<Color>,
    /// Fraction of a quarter buffer skipped between plotted samples.
    pub wavelength: f32,
    pub smoothing: f32,
}

impl Default for SoundWave {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 200.0,
            color: Color::WHITE,
            line_width: 2.0,
            fill_color: None,
            wavelength: 0.01,
            smoothing: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaveShape {
    #[default]
    Circle,
    Line,
}

/// Circular (or straight) time-domain wave with an optional radiating-bars mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SoundWave2 {
    pub shape: WaveShape,
    pub radius: f32,
    /// Line length used by the straight shape.
    pub width: f32,
    pub sensitivity: f32,
    pub color: Color,
    pub line_width: f32,
    /// Number of samples taken from the buffer per frame.
    pub resolution: u32,
    pub bars: bool,
    pub inward: bool,
    pub base_circle: bool,
}

impl Default for SoundWave2 {
    fn default() -> Self {
        Self {
            shape: WaveShape::Circle,
            radius: 120.0,
            width: 600.0,
            sensitivity: 1.0,
            color: Color::WHITE,
            line_width: 2.0,
            resolution: 128,
            bars: false,
            inward: false,
            base_circle: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Text {
    pub text: String,
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    pub reactive: bool,
    pub reactive_gain: f32,
}

impl Default for Text {
    fn default() -> Self {
        Self {
            text: "Text".to_string(),
            font_family: "sans-serif".to_string(),
            font_size: 48.0,
            bold: false,
            italic: false,
            color: Color::WHITE,
            reactive: false,
            reactive_gain: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Image {
    pub src: Option<String>,
    /// Width as a percentage of the canvas width.
    pub width_percent: f32,
    /// Height as a percentage of the canvas height; ignored while the aspect is locked.
    pub height_percent: f32,
    pub lock_aspect: bool,
    pub reactive: bool,
    pub reactive_gain: f32,
}

impl Default for Image {
    fn default() -> Self {
        Self {
            src: None,
            width_percent: 50.0,
            height_percent: 50.0,
            lock_aspect: true,
            reactive: false,
            reactive_gain: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shape {
    #[default]
    Box,
    Sphere,
    Dodecahedron,
    Icosahedron,
    Octahedron,
    Tetrahedron,
    Torus,
    TorusKnot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Material {
    Basic,
    Lambert,
    Phong,
    #[default]
    Standard,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shading {
    #[default]
    Flat,
    Smooth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Geometry3D {
    pub shape: Shape,
    pub material: Material,
    pub shading: Shading,
    /// Degrees.
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub rotation_z: f32,
    pub size: f32,
    pub color: Color,
    pub wireframe: bool,
    pub show_edges: bool,
    pub edge_color: Color,
    pub line_width: f32,
    /// Degrees of extra rotation per unit of average amplitude.
    pub reactive_gain: f32,
}

impl Default for Geometry3D {
    fn default() -> Self {
        Self {
            shape: Shape::Box,
            material: Material::Standard,
            shading: Shading::Flat,
            rotation_x: 20.0,
            rotation_y: 30.0,
            rotation_z: 0.0,
            size: 150.0,
            color: Color::rgb(0x4f, 0x9d, 0xff),
            wireframe: false,
            show_edges: false,
            edge_color: Color::WHITE,
            line_width: 1.0,
            reactive_gain: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticleDirection {
    #[default]
    CentreOut,
    RotateBeat,
    LeftToRight,
}

/// Which aggregate bands drive a particle field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandSelection {
    pub bass: bool,
    pub mid: bool,
    pub high: bool,
}

impl Default for BandSelection {
    fn default() -> Self {
        Self {
            bass: true,
            mid: false,
            high: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParticleField {
    pub count: u32,
    pub size: f32,
    pub color: Color,
    pub speed: f32,
    /// Multiplier on half the canvas diagonal that bounds outward travel.
    pub depth: f32,
    pub bands: BandSelection,
    pub sensitivity: f32,
    pub direction: ParticleDirection,
    pub particle_opacity: f32,
    pub opacity_reactive: bool,
}

impl Default for ParticleField {
    fn default() -> Self {
        Self {
            count: 300,
            size: 3.0,
            color: Color::WHITE,
            speed: 1.0,
            depth: 1.0,
            bands: BandSelection::default(),
            sensitivity: 1.0,
            direction: ParticleDirection::CentreOut,
            particle_opacity: 0.8,
            opacity_reactive: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub children: Vec<LayerId>,
}
