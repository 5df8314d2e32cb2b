//! Mutually exclusive background environments.
//!
//! Each environment is described by a static blueprint. Creating one yields an
//! [`EnvironmentResources`] bundle that owns every entity the environment put
//! into the scene; disposing consumes the bundle, so a bundle can only ever be
//! released once. Asset loads started by `create` are tied to the generation
//! the bundle was created under. A completion that arrives after its
//! generation stopped being current is dropped instead of attaching to a scene
//! that has already moved on.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::assets::{AssetLoader, LoadCompletion, LoadTicket, LoadedAsset};
use crate::clock::FrameTime;
use crate::error::SceneError;
use crate::orbit::{OrbitConfig, OrbitalSystem};
use crate::scene_graph::{
    Color, EntityId, EntityKind, Light, LightKind, ModelInstance, Owner, Primitive, ResourceKind,
    SceneGraph, Transform,
};
use crate::surface::{ShaderSurface, SurfaceParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentTag {
    Space,
    Water,
    Fire,
    Forest,
}

impl EnvironmentTag {
    pub const ALL: [EnvironmentTag; 4] = [
        EnvironmentTag::Space,
        EnvironmentTag::Water,
        EnvironmentTag::Fire,
        EnvironmentTag::Forest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EnvironmentTag::Space => "space",
            EnvironmentTag::Water => "water",
            EnvironmentTag::Fire => "fire",
            EnvironmentTag::Forest => "forest",
        }
    }
}

impl fmt::Display for EnvironmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentTag {
    type Err = SceneError;

    /// Accepts the button names used by the page ("tree" and "volcano" too).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "space" => Ok(EnvironmentTag::Space),
            "water" => Ok(EnvironmentTag::Water),
            "fire" | "volcano" => Ok(EnvironmentTag::Fire),
            "forest" | "tree" => Ok(EnvironmentTag::Forest),
            _ => Err(SceneError::UnknownEnvironment(s.to_string())),
        }
    }
}

/// Activation token. Every `create` gets a fresh, larger generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Generation(pub u64);

// ============================================================================
// Blueprints
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    World(Vec3),
    CameraRelative(Vec3),
}

impl Placement {
    pub fn resolve(self, camera_position: Vec3) -> Vec3 {
        match self {
            Placement::World(p) => p,
            Placement::CameraRelative(offset) => camera_position + offset,
        }
    }
}

/// How the surface's time uniform follows elapsed time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceDrive {
    /// `time = rate * elapsed` (steady waves).
    Elapsed { rate: f32 },
    /// `time = amplitude * sin(frequency * elapsed)` (sloshing lava).
    Sway { amplitude: f32, frequency: f32 },
}

impl SurfaceDrive {
    pub fn time_at(self, elapsed: f32) -> f32 {
        match self {
            SurfaceDrive::Elapsed { rate } => rate * elapsed,
            SurfaceDrive::Sway {
                amplitude,
                frequency,
            } => amplitude * (frequency * elapsed).sin(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSpec {
    pub params: SurfaceParams,
    pub width: f32,
    pub height: f32,
    pub segments: (u32, u32),
    pub placement: Placement,
    pub rotation: Vec3,
    pub drive: SurfaceDrive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackdropSpec {
    pub texture: &'static str,
    pub width: f32,
    pub height: f32,
    pub placement: Placement,
    /// Drifting clouds: z rotation `amplitude * sin(frequency * elapsed)`.
    pub sway: Option<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightSpec {
    pub name: &'static str,
    pub light: Light,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropSpec {
    pub name: String,
    pub path: &'static str,
    pub placement: Placement,
    pub rotation: Vec3,
    pub scale: f32,
    /// Nodes of this model orbit the origin.
    pub orbits: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentBlueprint {
    pub tag: EnvironmentTag,
    pub surface: Option<SurfaceSpec>,
    pub backdrop: Option<BackdropSpec>,
    pub lights: Vec<LightSpec>,
    pub props: Vec<PropSpec>,
    /// Whether the persistent sun model is visible in this environment.
    pub shows_sun: bool,
}

fn sun_light() -> LightSpec {
    LightSpec {
        name: "sun_light",
        light: Light {
            kind: LightKind::Point { range: 1000.0 },
            color: Color::from_rgb_u32(0xffa500),
            intensity: 5000.0,
        },
        placement: Placement::World(Vec3::ZERO),
    }
}

pub fn blueprint(tag: EnvironmentTag) -> EnvironmentBlueprint {
    match tag {
        EnvironmentTag::Space => EnvironmentBlueprint {
            tag,
            surface: None,
            backdrop: None,
            lights: vec![sun_light()],
            props: vec![PropSpec {
                name: "planet_system".to_string(),
                path: "./models/various_planets.glb",
                placement: Placement::World(Vec3::ZERO),
                rotation: Vec3::ZERO,
                scale: 1.0,
                orbits: true,
            }],
            shows_sun: true,
        },
        EnvironmentTag::Water => EnvironmentBlueprint {
            tag,
            surface: Some(SurfaceSpec {
                params: SurfaceParams::water(),
                width: 80.0,
                height: 40.0,
                segments: (1024, 512),
                placement: Placement::CameraRelative(Vec3::new(0.0, -2.5, -5.0)),
                rotation: Vec3::new(-PI / 1.75, 0.0, -PI / 3.0),
                drive: SurfaceDrive::Elapsed { rate: 1.0 },
            }),
            backdrop: Some(BackdropSpec {
                texture: "./images/waterSky.png",
                width: 80.0,
                height: 60.0,
                placement: Placement::CameraRelative(Vec3::new(20.0, 0.0, -50.0)),
                sway: None,
            }),
            lights: vec![sun_light()],
            props: Vec::new(),
            shows_sun: true,
        },
        EnvironmentTag::Fire => EnvironmentBlueprint {
            tag,
            surface: Some(SurfaceSpec {
                params: SurfaceParams::lava(),
                width: 40.0,
                height: 40.0,
                segments: (400, 400),
                placement: Placement::World(Vec3::new(5.0, -5.0, -20.0)),
                rotation: Vec3::new(-PI / 2.0, 0.0, -PI / 3.0),
                drive: SurfaceDrive::Sway {
                    amplitude: 0.3,
                    frequency: 0.7,
                },
            }),
            backdrop: Some(BackdropSpec {
                texture: "./images/cloudSky.jpg",
                width: 120.0,
                height: 100.0,
                placement: Placement::World(Vec3::new(20.0, -20.0, -50.0)),
                sway: Some((-0.4, 0.02)),
            }),
            lights: vec![LightSpec {
                name: "lava_light",
                light: Light {
                    kind: LightKind::Point { range: 100.0 },
                    color: Color::from_rgb_u32(0xff4500),
                    intensity: 8000.0,
                },
                placement: Placement::World(Vec3::new(5.0, -4.0, -20.0)),
            }],
            props: vec![PropSpec {
                name: "volcano".to_string(),
                path: "./models/volcano.glb",
                placement: Placement::World(Vec3::new(5.0, -20.0, -20.0)),
                rotation: Vec3::new(0.0, PI / 2.3, 0.0),
                scale: 2.0,
                orbits: false,
            }],
            shows_sun: false,
        },
        EnvironmentTag::Forest => EnvironmentBlueprint {
            tag,
            surface: Some(SurfaceSpec {
                params: SurfaceParams::meadow(),
                width: 80.0,
                height: 40.0,
                segments: (256, 128),
                placement: Placement::CameraRelative(Vec3::new(0.0, -3.0, -6.0)),
                rotation: Vec3::new(-PI / 1.9, 0.0, -PI / 3.0),
                drive: SurfaceDrive::Elapsed { rate: 1.0 },
            }),
            backdrop: Some(BackdropSpec {
                texture: "./images/forestSky.jpg",
                width: 100.0,
                height: 70.0,
                placement: Placement::CameraRelative(Vec3::new(15.0, 0.0, -50.0)),
                sway: None,
            }),
            lights: vec![
                sun_light(),
                LightSpec {
                    name: "canopy_light",
                    light: Light {
                        kind: LightKind::Point { range: 60.0 },
                        color: Color::from_rgb_u32(0x9acd32),
                        intensity: 40.0,
                    },
                    placement: Placement::CameraRelative(Vec3::new(0.0, 4.0, -12.0)),
                },
            ],
            props: (0..5)
                .map(|i| PropSpec {
                    name: format!("tree_{}", i),
                    path: "./models/pine_tree.glb",
                    placement: Placement::CameraRelative(Vec3::new(
                        -8.0 + 4.0 * i as f32,
                        -4.0,
                        -14.0 - 3.0 * (i % 2) as f32,
                    )),
                    rotation: Vec3::new(0.0, 0.7 * i as f32, 0.0),
                    scale: 1.5,
                    orbits: false,
                })
                .collect(),
            shows_sun: true,
        },
    }
}

// ============================================================================
// Resource bundle
// ============================================================================

#[derive(Debug, Clone)]
enum PendingAttach {
    BackdropTexture { backdrop: EntityId },
    Prop { spec: PropSpec, transform: Transform },
}

#[derive(Debug, Clone)]
struct PendingLoad {
    generation: Generation,
    attach: PendingAttach,
}

/// Everything one activation of an environment owns.
#[derive(Debug)]
pub struct EnvironmentResources {
    pub tag: EnvironmentTag,
    pub generation: Generation,
    pub shows_sun: bool,
    /// In creation order.
    entities: Vec<EntityId>,
    pending: HashMap<LoadTicket, PendingLoad>,
    surface: Option<(EntityId, SurfaceDrive)>,
    backdrop: Option<(EntityId, Option<(f32, f32)>)>,
    planets: Option<(EntityId, OrbitalSystem)>,
    failed_loads: usize,
}

impl EnvironmentResources {
    pub fn owner(&self) -> Owner {
        Owner::Environment(self.tag, self.generation)
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    pub fn failed_loads(&self) -> usize {
        self.failed_loads
    }

    pub fn owns_load(&self, ticket: LoadTicket) -> bool {
        self.pending.contains_key(&ticket)
    }

    pub fn surface(&self) -> Option<EntityId> {
        self.surface.map(|(id, _)| id)
    }

    pub fn backdrop(&self) -> Option<EntityId> {
        self.backdrop.map(|(id, _)| id)
    }

    pub fn orbits(&self) -> Option<&OrbitalSystem> {
        self.planets.as_ref().map(|(_, o)| o)
    }

    /// Per-frame animation of everything this environment owns.
    pub fn animate(&mut self, frame: &FrameTime, scene: &mut SceneGraph, clip_rate: f32) {
        if let Some((id, drive)) = self.surface {
            if let Some(entity) = scene.get_mut(id) {
                if let EntityKind::Surface { surface, .. } = &mut entity.kind {
                    surface.set_time(drive.time_at(frame.elapsed));
                }
            }
        }

        if let Some((id, Some((amplitude, frequency)))) = self.backdrop {
            if let Some(entity) = scene.get_mut(id) {
                entity.transform.rotation.z = amplitude * (frequency * frame.elapsed).sin();
            }
        }

        if let Some((id, orbits)) = &mut self.planets {
            orbits.update(frame.elapsed);
            if let Some(entity) = scene.get_mut(*id) {
                if let EntityKind::Model(model) = &mut entity.kind {
                    for body in orbits.bodies() {
                        if let Some(node) = model.node_mut(&body.name) {
                            node.transform.position.x = body.position.x;
                            node.transform.position.z = body.position.z;
                        }
                    }
                }
            }
        }

        for &id in &self.entities {
            if let Some(entity) = scene.get_mut(id) {
                if let EntityKind::Model(model) = &mut entity.kind {
                    model.advance_clips(frame.delta * clip_rate);
                }
            }
        }
    }
}

/// What happened to a load completion handed to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Attached,
    /// The load failed; the environment stays active without it.
    Failed,
    /// The completion belongs to a generation that is no longer current.
    Stale,
}

// ============================================================================
// Registry
// ============================================================================

pub struct EnvironmentRegistry {
    next_generation: u64,
    current: Option<Generation>,
    orbit_config: OrbitConfig,
}

impl EnvironmentRegistry {
    pub fn new(orbit_config: OrbitConfig) -> Self {
        Self {
            next_generation: 0,
            current: None,
            orbit_config,
        }
    }

    pub fn current_generation(&self) -> Option<Generation> {
        self.current
    }

    /// Build an environment. Synchronous parts are in the scene when this
    /// returns; textures and models follow as their loads complete.
    pub fn create(
        &mut self,
        tag: EnvironmentTag,
        scene: &mut SceneGraph,
        camera_position: Vec3,
        loader: &mut dyn AssetLoader,
    ) -> EnvironmentResources {
        self.next_generation += 1;
        let generation = Generation(self.next_generation);
        self.current = Some(generation);

        let bp = blueprint(tag);
        let owner = Owner::Environment(tag, generation);
        let mut resources = EnvironmentResources {
            tag,
            generation,
            shows_sun: bp.shows_sun,
            entities: Vec::new(),
            pending: HashMap::new(),
            surface: None,
            backdrop: None,
            planets: None,
            failed_loads: 0,
        };

        log::info!("Creating {} environment (generation {})", tag, generation.0);

        if let Some(spec) = bp.surface {
            let primitive = Primitive::Plane {
                width: spec.width,
                height: spec.height,
                segments_x: spec.segments.0,
                segments_y: spec.segments.1,
            };
            let transform =
                Transform::at(spec.placement.resolve(camera_position)).with_rotation(spec.rotation);
            let id = scene.create(
                format!("{}_surface", tag),
                owner,
                transform,
                EntityKind::Surface {
                    primitive,
                    surface: ShaderSurface::new(spec.params),
                },
            );
            scene.allocate_resource(id, ResourceKind::Geometry, "surface geometry");
            scene.allocate_resource(id, ResourceKind::Material, "surface shader material");
            scene.add_to_scene(id);
            resources.entities.push(id);
            resources.surface = Some((id, spec.drive));
        }

        if let Some(spec) = bp.backdrop {
            let primitive = Primitive::Plane {
                width: spec.width,
                height: spec.height,
                segments_x: 1,
                segments_y: 1,
            };
            let id = scene.create(
                format!("{}_backdrop", tag),
                owner,
                Transform::at(spec.placement.resolve(camera_position)),
                EntityKind::Backdrop {
                    primitive,
                    texture_path: spec.texture.to_string(),
                },
            );
            scene.allocate_resource(id, ResourceKind::Geometry, "backdrop geometry");
            scene.allocate_resource(id, ResourceKind::Material, "backdrop material");
            scene.add_to_scene(id);
            resources.entities.push(id);
            resources.backdrop = Some((id, spec.sway));

            let ticket = loader.request_texture(spec.texture);
            resources.pending.insert(
                ticket,
                PendingLoad {
                    generation,
                    attach: PendingAttach::BackdropTexture { backdrop: id },
                },
            );
        }

        for spec in bp.lights {
            let id = scene.create(
                spec.name,
                owner,
                Transform::at(spec.placement.resolve(camera_position)),
                EntityKind::Light(spec.light),
            );
            scene.add_to_scene(id);
            resources.entities.push(id);
        }

        for spec in bp.props {
            let transform = Transform::at(spec.placement.resolve(camera_position))
                .with_rotation(spec.rotation)
                .with_scale(spec.scale);
            let ticket = loader.request_model(spec.path);
            resources.pending.insert(
                ticket,
                PendingLoad {
                    generation,
                    attach: PendingAttach::Prop { spec, transform },
                },
            );
        }

        resources
    }

    /// Route a load completion to `resources`. Completions for another
    /// generation, or for a ticket the bundle no longer waits on, are stale.
    pub fn deliver(
        &self,
        resources: &mut EnvironmentResources,
        completion: LoadCompletion,
        scene: &mut SceneGraph,
    ) -> Delivery {
        let owned = self.current == Some(resources.generation)
            && resources
                .pending
                .get(&completion.ticket)
                .is_some_and(|p| p.generation == resources.generation);
        let pending = if owned {
            resources.pending.remove(&completion.ticket)
        } else {
            None
        };
        let Some(pending) = pending else {
            log::debug!(
                "Dropping stale {} load '{}' (ticket {})",
                completion.kind,
                completion.path,
                completion.ticket.0
            );
            return Delivery::Stale;
        };

        let asset = match completion.result {
            Ok(asset) => asset,
            Err(e) => {
                log::warn!("{} environment continues without asset: {}", resources.tag, e);
                resources.failed_loads += 1;
                return Delivery::Failed;
            }
        };

        match (pending.attach, asset) {
            (PendingAttach::BackdropTexture { backdrop }, LoadedAsset::Texture(info)) => {
                scene.allocate_resource(
                    backdrop,
                    ResourceKind::Texture,
                    format!("{} ({}x{})", completion.path, info.width, info.height),
                );
                Delivery::Attached
            }
            (PendingAttach::Prop { spec, transform }, LoadedAsset::Model(model)) => {
                let instance = ModelInstance {
                    path: spec.path.to_string(),
                    nodes: model.nodes(),
                    clips: model.clips(),
                    clip_time: 0.0,
                };
                let id = scene.create(
                    spec.name.clone(),
                    resources.owner(),
                    transform,
                    EntityKind::Model(instance),
                );
                for node in &model.node_names {
                    scene.allocate_resource(id, ResourceKind::Geometry, format!("{} geometry", node));
                    scene.allocate_resource(id, ResourceKind::Material, format!("{} material", node));
                }
                scene.add_to_scene(id);
                resources.entities.push(id);

                if spec.orbits {
                    let orbits = OrbitalSystem::from_names(&model.node_names, &self.orbit_config);
                    if let Some(EntityKind::Model(m)) = scene.get_mut(id).map(|e| &mut e.kind) {
                        for body in orbits.bodies() {
                            if let Some(node) = m.node_mut(&body.name) {
                                node.transform.scale = Vec3::splat(body.size);
                            }
                        }
                    }
                    log::info!("Loaded {} orbiting bodies", orbits.len());
                    resources.planets = Some((id, orbits));
                }
                Delivery::Attached
            }
            (_, other) => {
                log::warn!(
                    "Unexpected asset for '{}' in {} environment: {:?}",
                    completion.path,
                    resources.tag,
                    other
                );
                resources.failed_loads += 1;
                Delivery::Failed
            }
        }
    }

    /// Tear down an environment, releasing its entities (and their resources)
    /// in reverse creation order. Loads still in flight are forgotten and will
    /// be dropped as stale. Returns the number of entities destroyed.
    pub fn dispose(&mut self, resources: EnvironmentResources, scene: &mut SceneGraph) -> usize {
        if self.current == Some(resources.generation) {
            self.current = None;
        }
        let destroyed = resources
            .entities
            .iter()
            .rev()
            .filter(|&&id| scene.destroy(id))
            .count();
        log::info!(
            "Disposed {} environment (generation {}): {} entities, {} loads abandoned",
            resources.tag,
            resources.generation.0,
            destroyed,
            resources.pending.len()
        );
        destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{DeferredAssetLoader, LoadRequest, LoadedModel, TextureInfo};
    use crate::error::{AssetKind, SceneResult};

    const CAMERA: Vec3 = Vec3::new(-10.0, 10.0, 40.0);

    fn answer(req: &LoadRequest) -> SceneResult<LoadedAsset> {
        Ok(match req.kind {
            AssetKind::Texture => LoadedAsset::Texture(TextureInfo {
                width: 512,
                height: 256,
            }),
            AssetKind::Model => LoadedAsset::Model(LoadedModel {
                node_names: vec!["rock".into(), "gas".into(), "ice".into(), "lava".into()],
                clips: Vec::new(),
            }),
            AssetKind::Audio => unreachable!(),
        })
    }

    fn deliver_all(
        registry: &EnvironmentRegistry,
        env: &mut EnvironmentResources,
        loader: &mut DeferredAssetLoader,
        scene: &mut SceneGraph,
    ) -> Vec<Delivery> {
        loader
            .poll()
            .into_iter()
            .map(|c| registry.deliver(env, c, scene))
            .collect()
    }

    #[test]
    fn test_tag_parsing() {
        assert_eq!("Water".parse::<EnvironmentTag>().unwrap(), EnvironmentTag::Water);
        assert_eq!("tree".parse::<EnvironmentTag>().unwrap(), EnvironmentTag::Forest);
        assert_eq!("volcano".parse::<EnvironmentTag>().unwrap(), EnvironmentTag::Fire);
        assert!("moon".parse::<EnvironmentTag>().is_err());
        for tag in EnvironmentTag::ALL {
            assert_eq!(tag.to_string().parse::<EnvironmentTag>().unwrap(), tag);
        }
    }

    #[test]
    fn test_generations_increase() {
        let mut registry = EnvironmentRegistry::new(OrbitConfig::default());
        let mut scene = SceneGraph::new();
        let mut loader = DeferredAssetLoader::new();
        let a = registry.create(EnvironmentTag::Water, &mut scene, CAMERA, &mut loader);
        registry.dispose(a, &mut scene);
        let b = registry.create(EnvironmentTag::Water, &mut scene, CAMERA, &mut loader);
        assert!(b.generation > Generation(1));
        assert_eq!(registry.current_generation(), Some(b.generation));
    }

    #[test]
    fn test_water_create_and_dispose() {
        let mut registry = EnvironmentRegistry::new(OrbitConfig::default());
        let mut scene = SceneGraph::new();
        let mut loader = DeferredAssetLoader::new();
        let mut env = registry.create(EnvironmentTag::Water, &mut scene, CAMERA, &mut loader);
        let owner = env.owner();

        // Surface, backdrop and light exist before any load completes.
        assert_eq!(env.entities().len(), 3);
        assert_eq!(env.pending_loads(), 1);
        let surface = env.surface().unwrap();
        assert!(scene.is_in_scene(surface));
        let pos = scene.get(surface).unwrap().transform.position;
        assert!((pos - (CAMERA + Vec3::new(0.0, -2.5, -5.0))).length() < 1e-5);

        loader.resolve_all(answer);
        assert_eq!(
            deliver_all(&registry, &mut env, &mut loader, &mut scene),
            vec![Delivery::Attached]
        );
        assert_eq!(scene.resource_count_where(|o| *o == owner), 5);

        let destroyed = registry.dispose(env, &mut scene);
        assert_eq!(destroyed, 3);
        assert_eq!(scene.entity_count_where(|o| *o == owner), 0);
        assert_eq!(scene.resource_count_where(|o| *o == owner), 0);
        assert_eq!(registry.current_generation(), None);
    }

    #[test]
    fn test_space_builds_orbits_from_model() {
        let mut registry = EnvironmentRegistry::new(OrbitConfig::default());
        let mut scene = SceneGraph::new();
        let mut loader = DeferredAssetLoader::new();
        let mut env = registry.create(EnvironmentTag::Space, &mut scene, CAMERA, &mut loader);
        assert!(env.orbits().is_none());

        loader.resolve_all(answer);
        deliver_all(&registry, &mut env, &mut loader, &mut scene);
        let orbits = env.orbits().unwrap();
        assert_eq!(orbits.len(), 3);

        let frame = FrameTime {
            delta: 0.016,
            elapsed: 100.0,
            frame: 1,
        };
        env.animate(&frame, &mut scene, 0.1);
        let planets = scene.find_by_name("planet_system").unwrap();
        let EntityKind::Model(model) = &scene.get(planets).unwrap().kind else {
            panic!("expected model");
        };
        let ice = model.node("ice").unwrap();
        let expected = env.orbits().unwrap().position_at(1, 100.0).unwrap();
        assert!((ice.transform.position.x - expected.x).abs() < 1e-5);
        assert!((ice.transform.scale.x - 0.3).abs() < 1e-6);
        // Gas giants are left where the model put them.
        assert_eq!(model.node("gas").unwrap().transform, Transform::default());
    }

    #[test]
    fn test_dispose_before_load_completes() {
        let mut registry = EnvironmentRegistry::new(OrbitConfig::default());
        let mut scene = SceneGraph::new();
        let mut loader = DeferredAssetLoader::new();
        let mut fire = registry.create(EnvironmentTag::Fire, &mut scene, CAMERA, &mut loader);
        let fire_owner = fire.owner();
        assert_eq!(fire.pending_loads(), 2);

        // The volcano model is still loading when we leave.
        let mut tickets: Vec<_> = loader.outstanding().iter().map(|r| r.ticket).collect();
        tickets.sort_by_key(|t| t.0);
        registry.dispose(fire, &mut scene);

        let mut water = registry.create(EnvironmentTag::Water, &mut scene, CAMERA, &mut loader);
        loader.resolve_all(answer);
        let deliveries = deliver_all(&registry, &mut water, &mut loader, &mut scene);

        assert_eq!(deliveries.iter().filter(|d| **d == Delivery::Stale).count(), 2);
        assert_eq!(deliveries.iter().filter(|d| **d == Delivery::Attached).count(), 1);
        assert_eq!(scene.entity_count_where(|o| *o == fire_owner), 0);
        assert!(scene.find_by_name("volcano").is_none());
        assert!(!water.owns_load(tickets[0]));
    }

    #[test]
    fn test_failed_load_keeps_partial_environment() {
        let mut registry = EnvironmentRegistry::new(OrbitConfig::default());
        let mut scene = SceneGraph::new();
        let mut loader = DeferredAssetLoader::new();
        let mut fire = registry.create(EnvironmentTag::Fire, &mut scene, CAMERA, &mut loader);

        let tickets: Vec<_> = loader.outstanding().iter().map(|r| r.ticket).collect();
        for t in tickets {
            loader.fail(t, "404");
        }
        let deliveries = deliver_all(&registry, &mut fire, &mut loader, &mut scene);
        assert_eq!(deliveries, vec![Delivery::Failed, Delivery::Failed]);
        assert_eq!(fire.failed_loads(), 2);
        assert_eq!(fire.pending_loads(), 0);
        assert!(scene.is_in_scene(fire.surface().unwrap()));
    }

    #[test]
    fn test_fire_animation_drives() {
        let mut registry = EnvironmentRegistry::new(OrbitConfig::default());
        let mut scene = SceneGraph::new();
        let mut loader = DeferredAssetLoader::new();
        let mut fire = registry.create(EnvironmentTag::Fire, &mut scene, CAMERA, &mut loader);
        let frame = FrameTime {
            delta: 0.016,
            elapsed: 2.0,
            frame: 1,
        };
        fire.animate(&frame, &mut scene, 0.1);

        let surface = scene.get(fire.surface().unwrap()).unwrap();
        let EntityKind::Surface { surface, .. } = &surface.kind else {
            panic!("expected surface");
        };
        assert!((surface.time - 0.3 * (1.4_f32).sin()).abs() < 1e-6);

        let backdrop = scene.get(fire.backdrop().unwrap()).unwrap();
        assert!((backdrop.transform.rotation.z - (-0.4 * (0.04_f32).sin())).abs() < 1e-6);
        assert!(!fire.shows_sun);
    }
}
