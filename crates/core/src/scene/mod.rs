//! Scene description and structural editing.
//!
//! A scene is a flat, bottom-to-top list of layers. Groups reference their
//! members by id; every structural edit is applied to a working copy which is
//! only committed once [`Scene::validate`] accepts it.

mod color;
mod layer;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use color::Color;
pub use layer::{
    BandSelection, BarSpectrum, BlendMode, FrequencyRange, Geometry3D, Group, Image, Layer,
    LayerId, LayerKind, LayerTransform, LayerType, Material, ParticleDirection, ParticleField,
    Shading, Shape, SoundWave, SoundWave2, Text, UnknownLayer, WaveShape, WaveSpectrum,
};

use crate::{Result, VisualiserError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveDirection {
    /// One step toward the top of the stack.
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropPosition {
    Above,
    Below,
    /// Only valid when the target is a group.
    Inside,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub layers: Vec<Layer>,
    pub background_color: Color,
    pub width: u32,
    pub height: u32,
    /// Lowest id `add` and `duplicate` may hand out. Never decreases, so a
    /// removed layer's id is not reused.
    #[serde(default)]
    next_id: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            layers: Vec::new(),
            background_color: Color::BLACK,
            width,
            height,
            next_id: 1,
        }
    }

    /// Parses a scene file and checks the group invariants.
    pub fn from_json(text: &str) -> Result<Self> {
        let scene: Scene = serde_json::from_str(text)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == id)
    }

    fn require_index(&self, id: LayerId) -> Result<usize> {
        self.index_of(id).ok_or(VisualiserError::UnknownLayer(id))
    }

    fn allocate_id(&mut self) -> LayerId {
        let unused = self.layers.iter().map(|layer| layer.id.0 + 1).max().unwrap_or(1);
        let id = self.next_id.max(unused);
        self.next_id = id + 1;
        LayerId(id)
    }

    /// Group whose child list contains `id`, if any.
    pub fn parent_of(&self, id: LayerId) -> Option<LayerId> {
        self.layers
            .iter()
            .find(|layer| layer.children().contains(&id))
            .map(|layer| layer.id)
    }

    /// Walks parent links upward from `id`. Stops if the chain loops back on
    /// itself so it terminates even on an invalid scene.
    pub fn ancestors(&self, id: LayerId) -> Vec<LayerId> {
        let mut chain = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if parent == id || chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// A layer is drawn only when it and every enclosing group are visible.
    pub fn is_effectively_visible(&self, id: LayerId) -> bool {
        let mut parents = ParentIndex::default();
        parents.rebuild(self);
        self.index_of(id)
            .is_some_and(|index| parents.is_effectively_visible(self, index))
    }

    /// Checks id uniqueness, child references, single parenthood and acyclicity.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::with_capacity(self.layers.len());
        for layer in &self.layers {
            if !ids.insert(layer.id) {
                return Err(VisualiserError::InvalidHierarchy(format!(
                    "duplicate layer id {}",
                    layer.id
                )));
            }
        }

        let mut parents: HashMap<LayerId, LayerId> = HashMap::new();
        for layer in &self.layers {
            for child in layer.children() {
                if !ids.contains(child) {
                    return Err(VisualiserError::InvalidHierarchy(format!(
                        "group {} references missing layer {child}",
                        layer.id
                    )));
                }
                if *child == layer.id {
                    return Err(VisualiserError::InvalidHierarchy(format!(
                        "group {} contains itself",
                        layer.id
                    )));
                }
                if let Some(previous) = parents.insert(*child, layer.id) {
                    return Err(VisualiserError::InvalidHierarchy(format!(
                        "layer {child} belongs to both {previous} and {}",
                        layer.id
                    )));
                }
            }
        }

        for layer in &self.layers {
            let mut seen = HashSet::new();
            let mut current = layer.id;
            while let Some(parent) = parents.get(&current) {
                if *parent == layer.id || !seen.insert(*parent) {
                    return Err(VisualiserError::InvalidHierarchy(format!(
                        "group cycle through {}",
                        layer.id
                    )));
                }
                current = *parent;
            }
        }

        Ok(())
    }

    /// Applies `edit` to a copy of the layer list and commits it only if the
    /// result still satisfies [`Scene::validate`].
    fn edit<T>(&mut self, edit: impl FnOnce(&mut Scene) -> Result<T>) -> Result<T> {
        let mut working = self.clone();
        let value = edit(&mut working)?;
        working.validate()?;
        *self = working;
        Ok(value)
    }

    /// Inserts a default layer of the given type on top of the stack.
    pub fn add(&mut self, layer_type: LayerType) -> Result<LayerId> {
        self.edit(|scene| {
            let id = scene.allocate_id();
            let ordinal = scene
                .layers
                .iter()
                .filter(|layer| layer.layer_type() == Some(layer_type))
                .count()
                + 1;
            let mut layer = Layer::new(
                id,
                format!("{} {ordinal}", layer_type.display_name()),
                LayerKind::default_for(layer_type),
            );
            layer.transform =
                LayerTransform::at(scene.width as f32 * 0.5, scene.height as f32 * 0.5);
            scene.layers.push(layer);
            Ok(id)
        })
    }

    /// Inserts a fully specified layer on top of the stack. Its id must be unused.
    pub fn insert(&mut self, layer: Layer) -> Result<LayerId> {
        self.edit(|scene| {
            let id = layer.id;
            scene.layers.push(layer);
            Ok(id)
        })
    }

    /// Removes a layer and detaches it from its group. Members of a removed
    /// group stay in the scene as top-level layers.
    pub fn remove(&mut self, id: LayerId) -> Result<Layer> {
        self.edit(|scene| {
            let index = scene.require_index(id)?;
            let removed = scene.layers.remove(index);
            scene.detach(id);
            Ok(removed)
        })
    }

    /// Copies a layer under a fresh id, directly above the original and in the
    /// same group. Copies of groups start empty.
    pub fn duplicate(&mut self, id: LayerId) -> Result<LayerId> {
        self.edit(|scene| {
            let index = scene.require_index(id)?;
            let new_id = scene.allocate_id();
            let mut copy = scene.layers[index].clone();
            copy.id = new_id;
            copy.name = format!("{} copy", copy.name);
            if let Some(children) = copy.children_mut() {
                children.clear();
            }
            scene.layers.insert(index + 1, copy);

            if let Some(parent) = scene.parent_of(id) {
                scene.insert_child_after(parent, new_id, Some(id));
            }
            Ok(new_id)
        })
    }

    pub fn move_layer(&mut self, id: LayerId, direction: MoveDirection) -> Result<()> {
        self.edit(|scene| {
            let index = scene.require_index(id)?;
            let target = match direction {
                MoveDirection::Up if index + 1 < scene.layers.len() => index + 1,
                MoveDirection::Down if index > 0 => index - 1,
                _ => return Ok(()),
            };
            scene.layers.swap(index, target);
            Ok(())
        })
    }

    /// Merges a JSON object into the layer. `id` and `type` cannot change and
    /// nested objects (the transform) are merged key by key.
    pub fn update(&mut self, id: LayerId, patch: &Value) -> Result<()> {
        let patch = patch
            .as_object()
            .ok_or_else(|| VisualiserError::InvalidPatch("patch must be an object".into()))?;
        let index = self.require_index(id)?;
        let current = serde_json::to_value(&self.layers[index])?;

        let mut merged = current.clone();
        merge_object(&mut merged, patch);
        for fixed in ["id", "type"] {
            if merged.get(fixed) != current.get(fixed) {
                return Err(VisualiserError::InvalidPatch(format!(
                    "`{fixed}` cannot be changed"
                )));
            }
        }

        let layer: Layer = serde_json::from_value(merged)
            .map_err(|err| VisualiserError::InvalidPatch(err.to_string()))?;
        self.edit(|scene| {
            scene.layers[index] = layer;
            Ok(())
        })
    }

    pub fn toggle_visible(&mut self, id: LayerId) -> Result<bool> {
        let index = self.require_index(id)?;
        let layer = &mut self.layers[index];
        layer.visible = !layer.visible;
        Ok(layer.visible)
    }

    /// Drag-and-drop placement of `dragged` relative to `target`.
    pub fn reorder(
        &mut self,
        dragged: LayerId,
        target: LayerId,
        position: DropPosition,
    ) -> Result<()> {
        if dragged == target {
            return Err(VisualiserError::InvalidHierarchy(
                "a layer cannot be dropped onto itself".into(),
            ));
        }

        self.edit(|scene| {
            scene.require_index(target)?;
            let from = scene.require_index(dragged)?;

            if position == DropPosition::Inside {
                if !scene.layers[scene.require_index(target)?].is_group() {
                    return Err(VisualiserError::InvalidHierarchy(format!(
                        "{target} is not a group"
                    )));
                }
                if scene.ancestors(target).contains(&dragged) {
                    return Err(VisualiserError::InvalidHierarchy(format!(
                        "{dragged} is an ancestor of {target}"
                    )));
                }
            }

            let layer = scene.layers.remove(from);
            scene.detach(dragged);
            let target_index = scene.require_index(target)?;

            match position {
                DropPosition::Above => {
                    scene.layers.insert(target_index + 1, layer);
                    if let Some(parent) = scene.parent_of(target) {
                        scene.insert_child_after(parent, dragged, Some(target));
                    }
                }
                DropPosition::Below => {
                    scene.layers.insert(target_index, layer);
                    if let Some(parent) = scene.parent_of(target) {
                        scene.insert_child_before(parent, dragged, target);
                    }
                }
                DropPosition::Inside => {
                    let last_member = scene.layers[target_index]
                        .children()
                        .iter()
                        .filter_map(|child| scene.index_of(*child))
                        .max()
                        .unwrap_or(target_index);
                    scene.layers.insert(last_member.max(target_index) + 1, layer);
                    scene.insert_child_after(target, dragged, None);
                }
            }
            Ok(())
        })
    }

    fn detach(&mut self, id: LayerId) {
        for layer in &mut self.layers {
            if let Some(children) = layer.children_mut() {
                children.retain(|child| *child != id);
            }
        }
    }

    /// Inserts `child` after `anchor` in the group's list, or at the end.
    fn insert_child_after(&mut self, group: LayerId, child: LayerId, anchor: Option<LayerId>) {
        if let Some(children) = self
            .layers
            .iter_mut()
            .find(|layer| layer.id == group)
            .and_then(Layer::children_mut)
        {
            let at = anchor
                .and_then(|anchor| children.iter().position(|c| *c == anchor))
                .map(|pos| pos + 1)
                .unwrap_or(children.len());
            children.insert(at, child);
        }
    }

    fn insert_child_before(&mut self, group: LayerId, child: LayerId, anchor: LayerId) {
        if let Some(children) = self
            .layers
            .iter_mut()
            .find(|layer| layer.id == group)
            .and_then(Layer::children_mut)
        {
            let at = children.iter().position(|c| *c == anchor).unwrap_or(0);
            children.insert(at, child);
        }
    }
}

fn merge_object(target: &mut Value, patch: &serde_json::Map<String, Value>) {
    let Some(object) = target.as_object_mut() else {
        return;
    };
    for (key, value) in patch {
        match (object.get_mut(key), value) {
            (Some(existing @ Value::Object(_)), Value::Object(nested)) => {
                merge_object(existing, nested);
            }
            _ => {
                object.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Child id to the position of its enclosing group. Rebuilt once per frame
/// so visibility checks walk parents in constant time per step.
#[derive(Debug, Default)]
pub struct ParentIndex {
    parents: HashMap<LayerId, usize>,
}

impl ParentIndex {
    pub fn rebuild(&mut self, scene: &Scene) {
        self.parents.clear();
        for (index, layer) in scene.layers.iter().enumerate() {
            for child in layer.children() {
                self.parents.insert(*child, index);
            }
        }
    }

    pub fn parent(&self, id: LayerId) -> Option<usize> {
        self.parents.get(&id).copied()
    }

    /// `index` is a position in `scene.layers`; the index must have been
    /// rebuilt from the same scene.
    pub fn is_effectively_visible(&self, scene: &Scene, index: usize) -> bool {
        let Some(layer) = scene.layers.get(index) else {
            return false;
        };
        if !layer.visible {
            return false;
        }
        // Bounded walk; a valid scene never nests deeper than its layer count.
        let mut current = layer.id;
        for _ in 0..scene.layers.len() {
            let Some(group) = self.parent(current).and_then(|at| scene.layers.get(at)) else {
                return true;
            };
            if !group.visible {
                return false;
            }
            current = group.id;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ids(scene: &Scene) -> Vec<u64> {
        scene.layers.iter().map(|layer| layer.id.0).collect()
    }

    fn scene_with(types: &[LayerType]) -> Scene {
        let mut scene = Scene::new(800, 600);
        for layer_type in types {
            scene.add(*layer_type).unwrap();
        }
        scene
    }

    #[test]
    fn add_assigns_unique_ids_and_centres_layers() {
        let scene = scene_with(&[LayerType::BarSpectrum, LayerType::BarSpectrum]);

        assert_eq!(ids(&scene), vec![1, 2]);
        assert_eq!(scene.layers[1].name, "Bar Spectrum 2");
        assert_eq!(scene.layers[0].transform.x, 400.0);
        assert_eq!(scene.layers[0].transform.y, 300.0);
    }

    #[test]
    fn removed_top_layer_id_is_not_reused() {
        let mut scene = scene_with(&[LayerType::Text, LayerType::Image]);

        scene.remove(LayerId(2)).unwrap();
        assert_eq!(scene.add(LayerType::Text).unwrap(), LayerId(3));

        let mut reloaded = Scene::from_json(&scene.to_json().unwrap()).unwrap();
        reloaded.remove(LayerId(3)).unwrap();
        assert_eq!(reloaded.add(LayerType::Text).unwrap(), LayerId(4));
    }

    #[test]
    fn scenes_without_a_counter_continue_after_the_highest_id() {
        let text = json!({
            "layers": [{"id": 7, "name": "t", "type": "text"}],
            "backgroundColor": "#000000",
            "width": 10,
            "height": 10
        })
        .to_string();
        let mut scene = Scene::from_json(&text).unwrap();

        assert_eq!(scene.add(LayerType::Text).unwrap(), LayerId(8));
    }

    #[test]
    fn move_swaps_neighbours_and_ignores_edges() {
        let mut scene = scene_with(&[LayerType::Text, LayerType::Image, LayerType::Text]);

        scene.move_layer(LayerId(1), MoveDirection::Up).unwrap();
        assert_eq!(ids(&scene), vec![2, 1, 3]);

        scene.move_layer(LayerId(2), MoveDirection::Down).unwrap();
        assert_eq!(ids(&scene), vec![2, 1, 3]);
    }

    #[test]
    fn update_merges_fields_and_keeps_identity() {
        let mut scene = scene_with(&[LayerType::BarSpectrum]);

        scene
            .update(
                LayerId(1),
                &json!({"barWidth": 4.0, "transform": {"rotation": 90.0}, "opacity": 0.5}),
            )
            .unwrap();

        let layer = scene.layer(LayerId(1)).unwrap();
        assert_eq!(layer.opacity, 0.5);
        assert_eq!(layer.transform.rotation, 90.0);
        assert_eq!(layer.transform.x, 400.0);
        let LayerKind::BarSpectrum(bars) = &layer.kind else {
            panic!("kind changed");
        };
        assert_eq!(bars.bar_width, 4.0);

        let err = scene.update(LayerId(1), &json!({"id": 9})).unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidPatch(_)));
        let err = scene.update(LayerId(1), &json!({"type": "text"})).unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidPatch(_)));
    }

    #[test]
    fn reorder_inside_group_and_reject_cycles() {
        let mut scene = scene_with(&[LayerType::Group, LayerType::Group, LayerType::Text]);

        scene
            .reorder(LayerId(3), LayerId(2), DropPosition::Inside)
            .unwrap();
        scene
            .reorder(LayerId(2), LayerId(1), DropPosition::Inside)
            .unwrap();
        assert_eq!(scene.layer(LayerId(1)).unwrap().children(), &[LayerId(2)]);
        assert_eq!(scene.ancestors(LayerId(3)), vec![LayerId(2), LayerId(1)]);

        let before = scene.clone();
        let err = scene
            .reorder(LayerId(1), LayerId(2), DropPosition::Inside)
            .unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidHierarchy(_)));
        assert_eq!(scene, before);

        let err = scene
            .reorder(LayerId(1), LayerId(3), DropPosition::Inside)
            .unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidHierarchy(_)));
    }

    #[test]
    fn reorder_above_joins_target_group() {
        let mut scene = scene_with(&[LayerType::Group, LayerType::Text, LayerType::Image]);
        scene
            .reorder(LayerId(2), LayerId(1), DropPosition::Inside)
            .unwrap();

        scene
            .reorder(LayerId(3), LayerId(2), DropPosition::Below)
            .unwrap();

        assert_eq!(ids(&scene), vec![1, 3, 2]);
        assert_eq!(
            scene.layer(LayerId(1)).unwrap().children(),
            &[LayerId(3), LayerId(2)]
        );

        scene
            .reorder(LayerId(3), LayerId(1), DropPosition::Above)
            .unwrap();
        assert_eq!(scene.layer(LayerId(1)).unwrap().children(), &[LayerId(2)]);
        assert_eq!(scene.parent_of(LayerId(3)), None);
    }

    #[test]
    fn remove_detaches_from_group_and_orphans_members() {
        let mut scene = scene_with(&[LayerType::Group, LayerType::Text, LayerType::Text]);
        scene
            .reorder(LayerId(2), LayerId(1), DropPosition::Inside)
            .unwrap();
        scene
            .reorder(LayerId(3), LayerId(1), DropPosition::Inside)
            .unwrap();

        scene.remove(LayerId(2)).unwrap();
        assert_eq!(scene.layer(LayerId(1)).unwrap().children(), &[LayerId(3)]);

        scene.remove(LayerId(1)).unwrap();
        assert_eq!(ids(&scene), vec![3]);
        assert_eq!(scene.parent_of(LayerId(3)), None);

        assert!(matches!(
            scene.remove(LayerId(42)),
            Err(VisualiserError::UnknownLayer(LayerId(42)))
        ));
    }

    #[test]
    fn duplicate_stays_in_group_and_groups_copy_empty() {
        let mut scene = scene_with(&[LayerType::Group, LayerType::Text]);
        scene
            .reorder(LayerId(2), LayerId(1), DropPosition::Inside)
            .unwrap();

        let copy = scene.duplicate(LayerId(2)).unwrap();
        assert_eq!(copy, LayerId(3));
        assert_eq!(
            scene.layer(LayerId(1)).unwrap().children(),
            &[LayerId(2), LayerId(3)]
        );
        assert_eq!(scene.layer(copy).unwrap().name, "Text 1 copy");

        let group_copy = scene.duplicate(LayerId(1)).unwrap();
        assert!(scene.layer(group_copy).unwrap().children().is_empty());
        scene.validate().unwrap();
    }

    #[test]
    fn hidden_group_hides_members() {
        let mut scene = scene_with(&[LayerType::Group, LayerType::Text]);
        scene
            .reorder(LayerId(2), LayerId(1), DropPosition::Inside)
            .unwrap();

        assert!(scene.is_effectively_visible(LayerId(2)));
        assert!(!scene.toggle_visible(LayerId(1)).unwrap());
        assert!(!scene.is_effectively_visible(LayerId(2)));
    }

    #[test]
    fn parent_index_follows_nested_groups() {
        let mut scene = scene_with(&[LayerType::Group, LayerType::Group, LayerType::Text]);
        scene
            .reorder(LayerId(2), LayerId(1), DropPosition::Inside)
            .unwrap();
        scene
            .reorder(LayerId(3), LayerId(2), DropPosition::Inside)
            .unwrap();
        let text = scene.index_of(LayerId(3)).unwrap();

        let mut parents = ParentIndex::default();
        parents.rebuild(&scene);
        assert_eq!(parents.parent(LayerId(3)), scene.index_of(LayerId(2)));
        assert_eq!(parents.parent(LayerId(1)), None);
        assert!(parents.is_effectively_visible(&scene, text));

        scene.toggle_visible(LayerId(1)).unwrap();
        parents.rebuild(&scene);
        assert!(!parents.is_effectively_visible(&scene, text));
        assert!(!parents.is_effectively_visible(&scene, scene.layers.len()));
    }

    #[test]
    fn validate_rejects_shared_children() {
        let mut scene = scene_with(&[LayerType::Group, LayerType::Group, LayerType::Text]);
        for group in [0, 1] {
            scene.layers[group].children_mut().unwrap().push(LayerId(3));
        }

        assert!(matches!(
            scene.validate(),
            Err(VisualiserError::InvalidHierarchy(_))
        ));
    }
}
