//! Scene graph for the presentation.
//!
//! Entities are created detached and only rendered once added to the scene.
//! Every entity records its [`Owner`] so whole environment subtrees can be
//! found and torn down without walking child indices, and GPU-side resources
//! (geometry, material, texture) are tracked in a resource table so leaks are
//! observable.

use std::collections::HashMap;

use glam::Vec3;
use serde::Serialize;

use crate::environment::{EnvironmentTag, Generation};
use crate::surface::ShaderSurface;

/// Unique identifier for scene entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntityId(pub u64);

/// Unique identifier for a tracked GPU resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
    Geometry,
    Material,
    Texture,
}

/// Who is allowed to remove an entity or resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Owner {
    /// Lives for the whole process (cockpit props, galaxy, sun).
    Persistent,
    /// Belongs to one activation of an environment.
    Environment(EnvironmentTag, Generation),
    /// Belongs to a transient effect such as the warp tunnel.
    Effect(&'static str),
}

/// RGB color with components in 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_rgb_u32(rgb: u32) -> Self {
        Self::new(
            ((rgb >> 16) & 0xff) as f32 / 255.0,
            ((rgb >> 8) & 0xff) as f32 / 255.0,
            (rgb & 0xff) as f32 / 255.0,
        )
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::from_rgb_u32)
    }

    pub fn lerp(self, other: Color, t: f32) -> Color {
        Color::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Transform component for scene entities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3, // Euler angles in radians
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }
}

/// Primitive geometry created in-process (as opposed to loaded models).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Primitive {
    Plane {
        width: f32,
        height: f32,
        segments_x: u32,
        segments_y: u32,
    },
    Sphere {
        radius: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum LightKind {
    Ambient,
    Point { range: f32 },
    Spot { range: f32, angle: f32, target: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

/// A named node inside a loaded model, addressable by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelNode {
    pub name: String,
    pub transform: Transform,
    pub emissive_intensity: f32,
}

impl ModelNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            emissive_intensity: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
}

/// A model attached to the scene, with nodes addressed by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInstance {
    pub path: String,
    pub nodes: Vec<ModelNode>,
    pub clips: Vec<AnimationClip>,
    /// Playback position shared by all clips, in seconds.
    pub clip_time: f32,
}

impl ModelInstance {
    pub fn node(&self, name: &str) -> Option<&ModelNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut ModelNode> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    /// Advance clip playback, looping each clip independently.
    pub fn advance_clips(&mut self, dt: f32) {
        self.clip_time += dt;
    }

    /// Local time inside a clip after looping.
    pub fn clip_phase(&self, clip: &AnimationClip) -> f32 {
        if clip.duration <= 0.0 {
            0.0
        } else {
            self.clip_time.rem_euclid(clip.duration)
        }
    }
}

/// What an entity renders as.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EntityKind {
    Mesh { primitive: Primitive, color: Color },
    Backdrop { primitive: Primitive, texture_path: String },
    Surface { primitive: Primitive, surface: ShaderSurface },
    Light(Light),
    Model(ModelInstance),
    Points { count: usize, size: f32 },
    Lines { capacity: usize, opacity: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneEntity {
    pub name: String,
    pub owner: Owner,
    pub transform: Transform,
    pub visible: bool,
    pub kind: EntityKind,
    /// GPU resources this entity holds; released when it is destroyed.
    pub resources: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub label: String,
    pub owner: Owner,
}

/// The scene graph - every component mutates the scene through this.
#[derive(Debug)]
pub struct SceneGraph {
    entities: HashMap<EntityId, SceneEntity>,
    /// Entities that have been added to the scene (will be rendered).
    scene_entities: Vec<EntityId>,
    resources: HashMap<ResourceId, Resource>,
    next_id: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            scene_entities: Vec::new(),
            resources: HashMap::new(),
            next_id: 1,
        }
    }

    fn new_raw_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Create a new entity and return its ID.
    /// The entity is NOT added to the scene automatically.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        owner: Owner,
        transform: Transform,
        kind: EntityKind,
    ) -> EntityId {
        let id = EntityId(self.new_raw_id());
        self.entities.insert(
            id,
            SceneEntity {
                name: name.into(),
                owner,
                transform,
                visible: true,
                kind,
                resources: Vec::new(),
            },
        );
        id
    }

    /// Register a GPU resource and attach it to `entity`.
    pub fn allocate_resource(
        &mut self,
        entity: EntityId,
        kind: ResourceKind,
        label: impl Into<String>,
    ) -> Option<ResourceId> {
        let owner = self.entities.get(&entity)?.owner;
        let id = ResourceId(self.new_raw_id());
        self.resources.insert(
            id,
            Resource {
                kind,
                label: label.into(),
                owner,
            },
        );
        if let Some(e) = self.entities.get_mut(&entity) {
            e.resources.push(id);
        }
        Some(id)
    }

    /// Add an entity to the scene (make it renderable).
    /// Returns true if the entity was added, false if already in scene or doesn't exist.
    pub fn add_to_scene(&mut self, id: EntityId) -> bool {
        if !self.entities.contains_key(&id) {
            return false;
        }
        if self.scene_entities.contains(&id) {
            return false;
        }
        self.scene_entities.push(id);
        true
    }

    /// Remove an entity from the scene (stop rendering it).
    /// The entity still exists and can be re-added.
    pub fn remove_from_scene(&mut self, id: EntityId) -> bool {
        if let Some(pos) = self.scene_entities.iter().position(|&e| e == id) {
            self.scene_entities.remove(pos);
            true
        } else {
            false
        }
    }

    /// Destroy an entity: remove it from the scene, release its resources in
    /// reverse allocation order, then delete it.
    /// Returns false if the entity did not exist (already destroyed).
    pub fn destroy(&mut self, id: EntityId) -> bool {
        self.remove_from_scene(id);
        let Some(entity) = self.entities.remove(&id) else {
            return false;
        };
        for resource in entity.resources.iter().rev() {
            self.resources.remove(resource);
        }
        true
    }

    pub fn get(&self, id: EntityId) -> Option<&SceneEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut SceneEntity> {
        self.entities.get_mut(&id)
    }

    /// Look up an entity by its role name. Names are unique per owner, so
    /// the first match among scene entities wins.
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.scene_entities
            .iter()
            .copied()
            .find(|id| self.entities.get(id).is_some_and(|e| e.name == name))
    }

    /// Get all entities currently in the scene (for rendering).
    pub fn scene_entities(&self) -> impl Iterator<Item = (EntityId, &SceneEntity)> {
        self.scene_entities
            .iter()
            .filter_map(|&id| self.entities.get(&id).map(|e| (id, e)))
    }

    pub fn entities_owned_by(&self, owner: Owner) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.owner == owner)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Number of live resources matching a predicate on their owner.
    pub fn resource_count_where(&self, pred: impl Fn(&Owner) -> bool) -> usize {
        self.resources.values().filter(|r| pred(&r.owner)).count()
    }

    /// Number of live entities matching a predicate on their owner.
    pub fn entity_count_where(&self, pred: impl Fn(&Owner) -> bool) -> usize {
        self.entities.values().filter(|e| pred(&e.owner)).count()
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn is_in_scene(&self, id: EntityId) -> bool {
        self.scene_entities.contains(&id)
    }

    pub fn set_visible(&mut self, id: EntityId, visible: bool) -> bool {
        match self.entities.get_mut(&id) {
            Some(e) => {
                e.visible = visible;
                true
            }
            None => false,
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
