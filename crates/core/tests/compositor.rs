//! End-to-end rendering tests against the software surface.

use hound::{SampleFormat, WavSpec, WavWriter};
use layer_visualiser_core::{
    scene::Color, AudioClip, AudioFrame, Compositor, DropPosition, EngineConfig, FrameRecorder,
    LayerType, PixmapSurface, RecordingSettings, RenderConfig, RenderLoop, Scene, Session,
    SpectrumAnalyser,
};
use serde_json::json;
use tempfile::tempdir;

fn frame() -> AudioFrame {
    AudioFrame {
        bins: (0..1024).map(|i| 1.0 - i as f32 / 1024.0).collect(),
        waveform: (0..2048).map(|i| (i as f32 * 0.02).sin() * 0.5).collect(),
        ..AudioFrame::default()
    }
}

fn render_once(scene: &Scene, config: EngineConfig) -> PixmapSurface {
    let mut compositor = Compositor::new(config);
    let mut surface = PixmapSurface::new(scene.width, scene.height).unwrap();
    compositor.render(scene, &frame(), &mut surface);
    surface
}

fn seeded() -> EngineConfig {
    EngineConfig {
        render: RenderConfig {
            particle_seed: Some(42),
            ..RenderConfig::default()
        },
        ..EngineConfig::default()
    }
}

#[test]
fn hidden_layer_does_not_change_the_frame() {
    let mut with_hidden = Scene::new(320, 180);
    let hidden = with_hidden.add(LayerType::Text).unwrap();
    with_hidden.toggle_visible(hidden).unwrap();
    with_hidden.add(LayerType::BarSpectrum).unwrap();

    let mut bars_only = Scene::new(320, 180);
    bars_only.add(LayerType::BarSpectrum).unwrap();

    let a = render_once(&with_hidden, EngineConfig::default());
    let b = render_once(&bars_only, EngineConfig::default());

    assert_eq!(a.data(), b.data());
    assert_ne!(a.pixel(160, 170), Some(Color::BLACK));
}

#[test]
fn hidden_group_hides_its_members() {
    let mut scene = Scene::new(320, 180);
    let group = scene.add(LayerType::Group).unwrap();
    let solid = scene.add(LayerType::Geometry3D).unwrap();
    scene.reorder(solid, group, DropPosition::Inside).unwrap();

    let shown = render_once(&scene, EngineConfig::default());
    assert_ne!(shown.pixel(160, 90), Some(Color::BLACK));

    scene.toggle_visible(group).unwrap();
    let hidden = render_once(&scene, EngineConfig::default());
    assert!(hidden.data().chunks(4).all(|px| px == [0, 0, 0, 255]));
}

#[test]
fn seeded_particles_are_reproducible() {
    let mut scene = Scene::new(200, 200);
    scene.add(LayerType::ParticleField).unwrap();

    let a = render_once(&scene, seeded());
    let b = render_once(&scene, seeded());

    assert_eq!(a.data(), b.data());
}

#[test]
fn unknown_layer_types_are_skipped() {
    let text = json!({
        "layers": [
            {"id": 1, "name": "future", "type": "shaderTunnel", "speed": 3},
            {"id": 2, "name": "bars", "type": "barSpectrum", "transform": {"x": 100, "y": 50}}
        ],
        "backgroundColor": "#102030",
        "width": 200,
        "height": 100
    })
    .to_string();
    let scene = Scene::from_json(&text).unwrap();

    let surface = render_once(&scene, EngineConfig::default());

    assert_eq!(surface.pixel(0, 0), Some(Color::rgb(0x10, 0x20, 0x30)));
    let saved = scene.to_json().unwrap();
    assert!(saved.contains("shaderTunnel"));
    assert!(saved.contains("\"speed\": 3"));
}

#[test]
fn every_layer_type_renders_over_many_frames() {
    let mut session = Session::new(Scene::new(320, 180), seeded());
    for layer_type in LayerType::all() {
        session.add(*layer_type).unwrap();
    }
    let mut surface = PixmapSurface::new(320, 180).unwrap();

    for index in 0..30 {
        let audio = if index % 2 == 0 { frame() } else { AudioFrame::silent() };
        session.render(&audio, &mut surface);
    }
    session.resize(640, 360);
    surface.resize(640, 360).unwrap();
    session.render(&frame(), &mut surface);

    assert_eq!(session.compositor().frames_rendered(), 31);
    assert!(surface.pixel(639, 359).is_some());
    assert!(surface.pixel(640, 0).is_none());
}

#[test]
fn wav_to_png_pipeline() {
    let dir = tempdir().unwrap();
    let wav = dir.path().join("tone.wav");
    let spec = WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&wav, spec).unwrap();
    for i in 0..8_000 {
        let t = i as f32 / 8_000.0;
        let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();

    let clip = AudioClip::from_wav(&wav).unwrap();
    let mut config = EngineConfig::default();
    config.audio.sample_rate = clip.sample_rate();
    config.audio.fft_size = 512;

    let mut scene = Scene::new(160, 90);
    scene.add(LayerType::BarSpectrum).unwrap();
    scene.add(LayerType::SoundWave).unwrap();
    let mut analyser = SpectrumAnalyser::new(config.audio.clone());
    let mut session = Session::new(scene, config);
    let mut surface = PixmapSurface::new(160, 90).unwrap();
    let mut recorder = FrameRecorder::new(RecordingSettings {
        output_dir: dir.path().join("frames"),
        ..RecordingSettings::default()
    })
    .unwrap();
    let mut window = Vec::new();

    let fps = 10;
    let completed = RenderLoop::new(fps)
        .with_limit(clip.frame_count(fps) as u64)
        .run(|clock| {
            clip.window_at(clock.frame() as usize, fps, 512, &mut window)?;
            let audio = analyser.process_block(&window, 800)?;
            session.render(&audio, &mut surface);
            recorder.write(&surface)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(completed, 10);
    assert_eq!(recorder.finish(), 10);
    assert!(dir.path().join("frames/frame_00009.png").exists());
}
