//! Host-facing binding of a scene to its compositor.

use std::fmt;

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    audio::AudioFrame,
    config::EngineConfig,
    render::Compositor,
    scene::{Color, DropPosition, Layer, LayerId, LayerType, MoveDirection, Scene},
    surface::Surface,
    Result,
};

type ChangeListener = Box<dyn FnMut(&Scene) + Send>;

/// Owns a scene and the compositor that draws it. Every successful edit
/// releases caches the edit made stale and then notifies the change listener,
/// so the host can persist the new scene.
pub struct Session {
    scene: Scene,
    compositor: Compositor,
    listener: Option<ChangeListener>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("scene", &self.scene)
            .field("compositor", &self.compositor)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl Session {
    pub fn new(scene: Scene, config: EngineConfig) -> Self {
        info!(
            layers = scene.layers.len(),
            width = scene.width,
            height = scene.height,
            "session started"
        );
        Self {
            scene,
            compositor: Compositor::new(config),
            listener: None,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    /// Registers the callback run after every successful edit.
    pub fn on_change(&mut self, listener: impl FnMut(&Scene) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    fn changed(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&self.scene);
        }
    }

    pub fn render<S: Surface + ?Sized>(&mut self, audio: &AudioFrame, surface: &mut S) {
        self.compositor.render(&self.scene, audio, surface);
    }

    pub fn add(&mut self, layer_type: LayerType) -> Result<LayerId> {
        let id = self.scene.add(layer_type)?;
        debug!(%id, ?layer_type, "layer added");
        self.changed();
        Ok(id)
    }

    pub fn remove(&mut self, id: LayerId) -> Result<Layer> {
        let layer = self.scene.remove(id)?;
        self.compositor.forget_layer(id);
        self.compositor.prune(&self.scene);
        debug!(%id, "layer removed");
        self.changed();
        Ok(layer)
    }

    pub fn duplicate(&mut self, id: LayerId) -> Result<LayerId> {
        let copy = self.scene.duplicate(id)?;
        debug!(%id, %copy, "layer duplicated");
        self.changed();
        Ok(copy)
    }

    pub fn move_layer(&mut self, id: LayerId, direction: MoveDirection) -> Result<()> {
        self.scene.move_layer(id, direction)?;
        self.changed();
        Ok(())
    }

    /// Merges `patch` into the layer. Meshes no longer referenced afterwards
    /// are dropped; other per-layer state adapts on the next frame.
    pub fn update(&mut self, id: LayerId, patch: &Value) -> Result<()> {
        self.scene.update(id, patch)?;
        self.compositor.prune(&self.scene);
        self.changed();
        Ok(())
    }

    pub fn toggle_visible(&mut self, id: LayerId) -> Result<bool> {
        let visible = self.scene.toggle_visible(id)?;
        self.changed();
        Ok(visible)
    }

    pub fn reorder(&mut self, dragged: LayerId, target: LayerId, position: DropPosition) -> Result<()> {
        self.scene.reorder(dragged, target, position)?;
        self.changed();
        Ok(())
    }

    pub fn set_background(&mut self, color: Color) {
        self.scene.background_color = color;
        self.changed();
    }

    /// Changes the canvas size. Particle and mesh buffers keep their sizes;
    /// only their counts trigger reallocation.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (self.scene.width, self.scene.height) == (width, height) {
            return;
        }
        self.scene.width = width;
        self.scene.height = height;
        debug!(width, height, "canvas resized");
        self.changed();
    }

    /// Swaps in a different scene, dropping all state held for the old one.
    pub fn replace_scene(&mut self, scene: Scene) -> Result<()> {
        scene.validate()?;
        self.scene = scene;
        self.compositor.teardown();
        self.changed();
        Ok(())
    }

    pub fn teardown(&mut self) {
        self.compositor.teardown();
        info!(frames = self.compositor.frames_rendered(), "session torn down");
    }
}
