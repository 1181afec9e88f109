use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use layer_visualiser_core::{
    AudioClip, EngineConfig, FrameRecorder, LayerType, PixmapSurface, RecordingSettings,
    RenderLoop, Scene, Session, SpectrumAnalyser,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> layer_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            scene,
            audio,
            out,
            fps,
            frames,
            config,
        } => run_render(&scene, &audio, &out, fps, frames, config.as_deref()),
        Commands::InitScene { output } => run_init_scene(&output),
    }
}

fn run_render(
    scene_path: &Path,
    audio_path: &Path,
    out: &Path,
    fps: u32,
    frames: Option<u64>,
    config_path: Option<&Path>,
) -> layer_visualiser_core::Result<()> {
    let mut config = match config_path {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    let scene = Scene::from_json(&std::fs::read_to_string(scene_path)?)?;
    let clip = AudioClip::from_wav(audio_path)?;
    config.audio.sample_rate = clip.sample_rate();
    tracing::info!(
        scene = %scene_path.display(),
        audio = %audio_path.display(),
        seconds = clip.duration_seconds(),
        layers = scene.layers.len(),
        "rendering"
    );

    let fft_size = config.audio.fft_size.max(2);
    let advance = (clip.sample_rate() / fps.max(1)) as usize;
    let total = frames.unwrap_or(clip.frame_count(fps) as u64);

    let mut surface = PixmapSurface::new(scene.width, scene.height)?;
    let mut analyser = SpectrumAnalyser::new(config.audio.clone());
    let mut recorder = FrameRecorder::new(RecordingSettings {
        output_dir: out.to_path_buf(),
        ..RecordingSettings::default()
    })?;
    let mut session = Session::new(scene, config);
    let mut window = Vec::with_capacity(fft_size);

    RenderLoop::new(fps).with_limit(total).run(|clock| {
        clip.window_at(clock.frame() as usize, clock.fps(), fft_size, &mut window)?;
        let frame = analyser.process_block(&window, advance)?;
        session.render(&frame, &mut surface);
        recorder.write(&surface)?;
        Ok(())
    })?;

    session.teardown();
    let written = recorder.finish();
    tracing::info!(written, tempo = ?analyser.tempo_bpm(), "render complete");
    Ok(())
}

fn run_init_scene(output: &Path) -> layer_visualiser_core::Result<()> {
    let mut session = Session::new(Scene::default(), EngineConfig::default());
    for layer_type in LayerType::all() {
        if *layer_type == LayerType::Group {
            continue;
        }
        session.add(*layer_type)?;
    }

    // Spread the layers out so they do not all sit on the centre.
    let placements = [
        (LayerType::BarSpectrum, json!({"transform": {"y": 560.0}})),
        (LayerType::WaveSpectrum, json!({"transform": {"y": 160.0}, "fillColor": "#ffffff33"})),
        (LayerType::SoundWave2, json!({"bars": true, "baseCircle": true})),
        (LayerType::Text, json!({"text": "LAYER VISUALISER", "reactive": true, "transform": {"y": 80.0}})),
        (LayerType::Geometry3D, json!({"reactiveGain": 40.0, "showEdges": true, "transform": {"x": 1040.0}})),
        (LayerType::ParticleField, json!({"opacityReactive": true, "blendMode": "lighter"})),
    ];
    for (layer_type, patch) in placements {
        let id = session
            .scene()
            .layers
            .iter()
            .find(|layer| layer.layer_type() == Some(layer_type))
            .map(|layer| layer.id);
        if let Some(id) = id {
            session.update(id, &patch)?;
        }
    }

    std::fs::write(output, session.scene().to_json()?)?;
    tracing::info!(?output, layers = session.scene().layers.len(), "scene written");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive layer compositor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a scene against a WAV file into numbered PNG frames.
    Render {
        /// Scene file in JSON.
        #[arg(short, long)]
        scene: PathBuf,
        /// WAV file driving the layers.
        #[arg(short, long)]
        audio: PathBuf,
        /// Directory that receives the frames.
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 30)]
        fps: u32,
        /// Stop after this many frames instead of the clip length.
        #[arg(long)]
        frames: Option<u64>,
        /// Engine configuration in JSON.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write a demo scene with one layer of each type.
    InitScene {
        /// Output path for the scene file.
        output: PathBuf,
    },
}
