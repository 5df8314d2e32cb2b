//! The per-frame driver and the UI surface.
//!
//! [`Presentation`] owns every piece of scene state. The host calls
//! [`on_frame`](Presentation::on_frame) once per display refresh and forwards
//! button presses to the UI methods; everything the host must act on (sounds,
//! transition boundaries, failed loads) comes back through
//! [`drain_events`](Presentation::drain_events).

use std::collections::HashMap;
use std::f32::consts::PI;

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde::Serialize;

use crate::actor::{ActorPhase, ActorPose, ActorStep, ActorTrigger, ScriptedActor};
use crate::assets::{AssetLoader, LoadCompletion, LoadTicket, LoadedAsset};
use crate::audio::{AudioCue, Soundtrack};
use crate::camera::{Camera, CameraUniforms};
use crate::clock::{FrameClock, FrameTime};
use crate::config::PresentationConfig;
use crate::environment::{Delivery, EnvironmentTag, Placement};
use crate::error::{SceneError, SceneResult};
use crate::galaxy::ParticleField;
use crate::orbit::sun_rotation;
use crate::surface::SurfaceUniforms;
use crate::scene_graph::{
    Color, EntityId, EntityKind, Light, LightKind, ModelInstance, Owner, Primitive, ResourceKind,
    SceneEntity, SceneGraph, Transform,
};
use crate::timers::TimerQueue;
use crate::trail::ShootingStar;
use crate::transition::{Swapped, TransitionController, TransitionRejected, TransitionState};

/// Name accepted by [`Presentation::toggle_decorative_effect`].
pub const SHOOTING_STAR: &str = "shooting_star";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropRole {
    Sun,
    Ufo,
    Window,
    IconMonitor,
    WiredMonitor,
    MenuMonitor,
}

struct PersistentProp {
    role: PropRole,
    path: &'static str,
    placement: Placement,
    rotation: Vec3,
    scale: Vec3,
    /// Emissive intensity applied to every node once loaded.
    emissive: Option<f32>,
}

const WINDOW_OFFSET: Vec3 = Vec3::new(0.5, -1.6, -2.0);

fn persistent_props() -> [PersistentProp; 6] {
    [
        PersistentProp {
            role: PropRole::Sun,
            path: "./models/sun.glb",
            placement: Placement::World(Vec3::ZERO),
            rotation: Vec3::ZERO,
            scale: Vec3::splat(0.5),
            emissive: Some(200.0),
        },
        PersistentProp {
            role: PropRole::Window,
            path: "./models/scifi_wall_with_window.glb",
            placement: Placement::CameraRelative(WINDOW_OFFSET),
            rotation: Vec3::new(0.05, PI / 2.32, -0.1),
            scale: Vec3::splat(0.45),
            emissive: None,
        },
        PersistentProp {
            role: PropRole::IconMonitor,
            path: "./models/sci_fi_monitor.glb",
            placement: Placement::CameraRelative(Vec3::new(-0.36, -0.45, -1.2)),
            rotation: Vec3::new(-0.2, 0.0, -0.01),
            scale: Vec3::new(1.5, 1.1, 1.2),
            emissive: Some(5.0),
        },
        PersistentProp {
            role: PropRole::WiredMonitor,
            path: "./models/futuristic_screen.glb",
            placement: Placement::CameraRelative(Vec3::new(-0.5, -1.5, -2.0)),
            rotation: Vec3::new(0.0, -PI / 2.0, 0.0),
            scale: Vec3::splat(0.2),
            emissive: None,
        },
        PersistentProp {
            role: PropRole::MenuMonitor,
            path: "./models/hanging_monitor.glb",
            placement: Placement::CameraRelative(Vec3::new(0.44, 0.02, -1.5)),
            rotation: Vec3::new(-0.2, -0.05, -0.005),
            scale: Vec3::new(2.5, 1.0, 1.0),
            emissive: None,
        },
        PersistentProp {
            role: PropRole::Ufo,
            path: "./models/bob_lazar_ufo.glb",
            placement: Placement::World(Vec3::ZERO),
            rotation: Vec3::ZERO,
            scale: Vec3::ZERO,
            emissive: None,
        },
    ]
}

/// Something the host has to act on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SceneEvent {
    Audio { cue: AudioCue },
    TransitionStarted { from: EnvironmentTag, to: EnvironmentTag },
    TransitionFinished { from: EnvironmentTag, to: EnvironmentTag },
    ActorFinished { flights: u64 },
    AssetFailed { path: String, reason: String },
}

/// Summary of one `on_frame` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub time: FrameTime,
    pub environment: EnvironmentTag,
    pub transition: TransitionState,
    pub swapped: Option<Swapped>,
    pub warp_progress: Option<f32>,
    pub actor_phase: ActorPhase,
    pub star_visibility: f32,
    pub star_emissive: f32,
    pub loads_delivered: usize,
}

/// Serializable view of the scene for hosts and debugging.
#[derive(Debug, Serialize)]
pub struct SceneSnapshot<'a> {
    pub time: FrameTime,
    pub environment: EnvironmentTag,
    pub transition: TransitionState,
    pub actor: ActorPose,
    pub soundtrack_playing: bool,
    pub entities: Vec<(EntityId, &'a SceneEntity)>,
}

pub struct Presentation<L: AssetLoader> {
    config: PresentationConfig,
    clock: FrameClock,
    scene: SceneGraph,
    camera: Camera,
    loader: L,
    rng: Pcg64Mcg,
    galaxy: ParticleField,
    galaxy_entity: EntityId,
    props: HashMap<PropRole, EntityId>,
    prop_loads: HashMap<LoadTicket, PropRole>,
    actor: ScriptedActor,
    star: ShootingStar,
    star_head: EntityId,
    star_trail: EntityId,
    transition: TransitionController,
    timers: TimerQueue<AudioCue>,
    soundtrack: Soundtrack,
    events: Vec<SceneEvent>,
}

impl<L: AssetLoader> Presentation<L> {
    pub fn new(config: PresentationConfig, mut loader: L) -> SceneResult<Self> {
        let mut rng = match config.seed {
            Some(seed) => Pcg64Mcg::seed_from_u64(seed),
            None => Pcg64Mcg::from_os_rng(),
        };
        let camera = Camera::new(&config.camera, config.aspect());
        let mut scene = SceneGraph::new();

        let galaxy = ParticleField::generate(&config.galaxy, &mut rng)?;
        let galaxy_entity = scene.create(
            "galaxy",
            Owner::Persistent,
            galaxy.transform,
            EntityKind::Points {
                count: galaxy.len(),
                size: galaxy.size,
            },
        );
        scene.allocate_resource(galaxy_entity, ResourceKind::Geometry, "galaxy points");
        scene.allocate_resource(galaxy_entity, ResourceKind::Material, "galaxy point material");
        scene.add_to_scene(galaxy_entity);

        add_light(
            &mut scene,
            "ambient_light",
            Vec3::ZERO,
            Light {
                kind: LightKind::Ambient,
                color: Color::WHITE,
                intensity: 0.2,
            },
        );
        // Floor lights either side of the window, aimed at it.
        let window = camera.position + WINDOW_OFFSET;
        for (name, x) in [("window_spot_left", -2.0), ("window_spot_right", 2.0)] {
            add_light(
                &mut scene,
                name,
                window + Vec3::new(x, 0.0, 1.0),
                Light {
                    kind: LightKind::Spot {
                        range: 10.0,
                        angle: PI / 2.0,
                        target: window,
                    },
                    color: Color::WHITE,
                    intensity: 20.0,
                },
            );
        }

        let star = ShootingStar::new(config.shooting_star.clone(), camera.position)?;
        let star_head = scene.create(
            "shooting_star",
            Owner::Persistent,
            Transform::at(star.head),
            EntityKind::Mesh {
                primitive: Primitive::Sphere { radius: 0.01 },
                color: Color::WHITE,
            },
        );
        scene.allocate_resource(star_head, ResourceKind::Geometry, "star sphere");
        scene.allocate_resource(star_head, ResourceKind::Material, "star material");
        scene.add_to_scene(star_head);
        let star_trail = scene.create(
            "shooting_star_trail",
            Owner::Persistent,
            Transform::default(),
            EntityKind::Lines {
                capacity: star.trail.capacity(),
                opacity: 0.0,
            },
        );
        scene.allocate_resource(star_trail, ResourceKind::Geometry, "star trail");
        scene.allocate_resource(star_trail, ResourceKind::Material, "star trail material");
        scene.add_to_scene(star_trail);

        let prop_loads = persistent_props()
            .iter()
            .map(|p| (loader.request_model(p.path), p.role))
            .collect();

        let mut transition = TransitionController::new(
            config.initial_environment,
            config.orbit.clone(),
            config.warp.clone(),
            config.transition_duration_ms,
        )?;
        transition.activate_initial(&mut scene, camera.position, &mut loader);

        log::info!(
            "Presentation ready: {} stars, starting in {}",
            galaxy.len(),
            config.initial_environment
        );

        Ok(Self {
            clock: FrameClock::new(config.clock),
            actor: ScriptedActor::new(config.actor.clone())?,
            soundtrack: Soundtrack::new(config.audio.playlist.clone()),
            config,
            scene,
            camera,
            loader,
            rng,
            galaxy,
            galaxy_entity,
            props: HashMap::new(),
            prop_loads,
            star,
            star_head,
            star_trail,
            transition,
            timers: TimerQueue::new(),
            events: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    /// Advance everything by `delta` seconds. All motion in one call sees the
    /// same [`FrameTime`].
    pub fn on_frame(&mut self, delta: f32) -> FrameReport {
        let frame = self.clock.tick(delta);
        let camera_position = self.camera.position;

        let completions = self.loader.poll();
        let loads_delivered = completions.len();
        for completion in completions {
            self.route_completion(completion);
        }

        let swapped = self.transition.update(
            frame.elapsed,
            &mut self.scene,
            camera_position,
            &mut self.loader,
            &mut self.rng,
        );
        if let Some(s) = swapped {
            self.events.push(SceneEvent::TransitionFinished {
                from: s.from,
                to: s.to,
            });
        }

        self.transition
            .animate(&frame, &mut self.scene, self.config.clip_rate);

        self.galaxy.rotate_to(frame.elapsed);
        if let Some(entity) = self.scene.get_mut(self.galaxy_entity) {
            entity.transform = self.galaxy.transform;
        }

        self.animate_props(&frame);
        self.animate_actor(&frame, camera_position);
        self.animate_star(&frame, camera_position);

        for cue in self.timers.drain_due(frame.elapsed_ms()) {
            self.events.push(SceneEvent::Audio { cue });
        }

        FrameReport {
            time: frame,
            environment: self.transition.current(),
            transition: self.transition.state(),
            swapped,
            warp_progress: self.transition.warp().map(|w| w.progress()),
            actor_phase: self.actor.phase(),
            star_visibility: self.star.visibility,
            star_emissive: self.star.emissive_intensity(),
            loads_delivered,
        }
    }

    fn route_completion(&mut self, completion: LoadCompletion) {
        let failure = completion.result.as_ref().err().map(|e| e.to_string());
        let path = completion.path.clone();

        let delivery = match self.prop_loads.remove(&completion.ticket) {
            Some(role) => self.attach_prop(role, completion),
            None => self.transition.deliver(completion, &mut self.scene),
        };

        if delivery == Delivery::Failed {
            self.events.push(SceneEvent::AssetFailed {
                path,
                reason: failure.unwrap_or_else(|| "unexpected asset type".to_string()),
            });
        }
    }

    fn attach_prop(&mut self, role: PropRole, completion: LoadCompletion) -> Delivery {
        let model = match completion.result {
            Ok(LoadedAsset::Model(model)) => model,
            Ok(other) => {
                log::warn!("Expected a model for {:?}, got {:?}", role, other);
                return Delivery::Failed;
            }
            Err(e) => {
                log::warn!("Continuing without {:?}: {}", role, e);
                return Delivery::Failed;
            }
        };
        let Some(spec) = persistent_props().into_iter().find(|p| p.role == role) else {
            return Delivery::Stale;
        };

        let mut instance = ModelInstance {
            path: completion.path,
            nodes: model.nodes(),
            clips: model.clips(),
            clip_time: 0.0,
        };
        if let Some(emissive) = spec.emissive {
            for node in &mut instance.nodes {
                node.emissive_intensity = emissive;
            }
        }

        let transform = Transform {
            position: spec.placement.resolve(self.camera.position),
            rotation: spec.rotation,
            scale: spec.scale,
        };
        let id = self.scene.create(
            format!("{:?}", role).to_lowercase(),
            Owner::Persistent,
            transform,
            EntityKind::Model(instance),
        );
        for node in &model.node_names {
            self.scene
                .allocate_resource(id, ResourceKind::Geometry, format!("{} geometry", node));
            self.scene
                .allocate_resource(id, ResourceKind::Material, format!("{} material", node));
        }
        self.scene.add_to_scene(id);
        if role == PropRole::Ufo {
            self.scene.set_visible(id, self.actor.is_active());
        }
        self.props.insert(role, id);
        log::info!("Loaded {:?} from {}", role, spec.path);
        Delivery::Attached
    }

    fn animate_props(&mut self, frame: &FrameTime) {
        if let Some(&sun) = self.props.get(&PropRole::Sun) {
            let shows_sun = self.transition.shows_sun();
            self.scene.set_visible(sun, shows_sun);
            if let Some(entity) = self.scene.get_mut(sun) {
                entity.transform.rotation.y = sun_rotation(&self.config.orbit, frame.elapsed);
            }
        }
        if let Some(&monitor) = self.props.get(&PropRole::IconMonitor) {
            if let Some(EntityKind::Model(model)) = self.scene.get_mut(monitor).map(|e| &mut e.kind) {
                model.advance_clips(frame.delta * self.config.clip_rate);
            }
        }
    }

    fn animate_actor(&mut self, frame: &FrameTime, camera_position: Vec3) {
        let step = self.actor.advance(frame, camera_position);
        if step == ActorStep::Finished {
            self.events.push(SceneEvent::ActorFinished {
                flights: self.actor.flights_completed(),
            });
        }

        let Some(&ufo) = self.props.get(&PropRole::Ufo) else {
            return;
        };
        let pose = self.actor.pose();
        self.scene.set_visible(ufo, self.actor.is_active());
        if let Some(entity) = self.scene.get_mut(ufo) {
            entity.transform.position = pose.position;
            entity.transform.rotation = pose.rotation;
            entity.transform.scale = Vec3::splat(pose.scale);
        }
    }

    fn animate_star(&mut self, frame: &FrameTime, camera_position: Vec3) {
        self.star
            .update(frame.elapsed, camera_position, &mut self.rng);
        if let Some(entity) = self.scene.get_mut(self.star_head) {
            entity.transform.position = self.star.head;
            entity.visible = self.star.visibility > 0.0;
        }
        if let Some(entity) = self.scene.get_mut(self.star_trail) {
            if let EntityKind::Lines { opacity, .. } = &mut entity.kind {
                *opacity = self.star.visibility;
            }
        }
    }

    // ------------------------------------------------------------------
    // UI surface
    // ------------------------------------------------------------------

    pub fn request_transition(&mut self, to: EnvironmentTag) -> Result<(), TransitionRejected> {
        let from = self.transition.current();
        self.transition.request_transition(
            to,
            self.clock.elapsed(),
            self.camera.position,
            &mut self.scene,
            &mut self.rng,
        )?;
        self.events.push(SceneEvent::TransitionStarted { from, to });
        if self.config.audio.audio_on_warp {
            self.events.push(SceneEvent::Audio {
                cue: AudioCue::OneShot {
                    path: self.config.audio.warp_sound.clone(),
                },
            });
        }
        Ok(())
    }

    /// Toggle a named decorative effect, returning its new state.
    pub fn toggle_decorative_effect(&mut self, name: &str) -> SceneResult<bool> {
        match name {
            SHOOTING_STAR => {
                let enabled = self.star.toggle();
                log::debug!("Shooting star {}", if enabled { "on" } else { "off" });
                Ok(enabled)
            }
            _ => Err(SceneError::UnknownEffect(name.to_string())),
        }
    }

    /// Start a flyby. The arrival sound follows after the configured delay.
    pub fn trigger_scripted_actor(&mut self) -> ActorTrigger {
        let result = self.actor.trigger();
        if result == ActorTrigger::Accepted {
            self.timers.schedule_after(
                self.clock.now().elapsed_ms(),
                self.config.audio.alien_sound_delay_ms,
                AudioCue::OneShot {
                    path: self.config.audio.alien_sound.clone(),
                },
            );
        }
        result
    }

    /// Play or pause the soundtrack. Returns whether it is now playing.
    pub fn toggle_audio(&mut self) -> bool {
        if let Some(cue) = self.soundtrack.toggle() {
            self.events.push(SceneEvent::Audio { cue });
        }
        self.soundtrack.is_playing()
    }

    /// The host reports the current soundtrack track ended.
    pub fn track_ended(&mut self) {
        if let Some(cue) = self.soundtrack.track_ended() {
            self.events.push(SceneEvent::Audio { cue });
        }
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.config.viewport = [width, height];
            self.camera.set_aspect(width / height);
        }
    }

    /// Screen position of a point relative to the camera, for placing UI.
    pub fn anchor_on_screen(&self, offset: Vec3) -> Option<[f32; 2]> {
        let [w, h] = self.config.viewport;
        self.camera
            .project_to_screen(self.camera.position + offset, w, h)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    pub fn galaxy(&self) -> &ParticleField {
        &self.galaxy
    }

    pub fn star(&self) -> &ShootingStar {
        &self.star
    }

    pub fn actor(&self) -> &ScriptedActor {
        &self.actor
    }

    pub fn transition(&self) -> &TransitionController {
        &self.transition
    }

    pub fn prop(&self, role: PropRole) -> Option<EntityId> {
        self.props.get(&role).copied()
    }

    /// Uniform block of the active environment's animated surface, if any.
    pub fn surface_uniforms(&self) -> Option<SurfaceUniforms> {
        let id = self.transition.active()?.surface()?;
        match &self.scene.get(id)?.kind {
            EntityKind::Surface { surface, .. } => Some(surface.uniforms()),
            _ => None,
        }
    }

    pub fn camera_uniforms(&self) -> CameraUniforms {
        self.camera.uniforms()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn snapshot(&self) -> SceneSnapshot<'_> {
        SceneSnapshot {
            time: self.clock.now(),
            environment: self.transition.current(),
            transition: self.transition.state(),
            actor: self.actor.pose(),
            soundtrack_playing: self.soundtrack.is_playing(),
            entities: self.scene.scene_entities().collect(),
        }
    }
}

fn add_light(scene: &mut SceneGraph, name: &str, position: Vec3, light: Light) -> EntityId {
    let id = scene.create(name, Owner::Persistent, Transform::at(position), EntityKind::Light(light));
    scene.add_to_scene(id);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{DeferredAssetLoader, LoadRequest, LoadedModel, TextureInfo};
    use crate::error::AssetKind;
    use crate::galaxy::GalaxyParameters;
    use crate::trail::WarpConfig;

    fn config() -> PresentationConfig {
        PresentationConfig {
            seed: Some(7),
            galaxy: GalaxyParameters {
                count: 200,
                ..Default::default()
            },
            warp: WarpConfig {
                streak_count: 32,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn answer(req: &LoadRequest) -> SceneResult<LoadedAsset> {
        Ok(match req.kind {
            AssetKind::Texture => LoadedAsset::Texture(TextureInfo {
                width: 1024,
                height: 512,
            }),
            _ => LoadedAsset::Model(LoadedModel {
                node_names: vec!["body".into()],
                clips: Vec::new(),
            }),
        })
    }

    fn loaded() -> Presentation<DeferredAssetLoader> {
        let mut p = Presentation::new(config(), DeferredAssetLoader::new()).unwrap();
        p.loader_mut().resolve_all(answer);
        p.on_frame(0.016);
        p
    }

    #[test]
    fn test_persistent_props_requested_once() {
        let p = Presentation::new(config(), DeferredAssetLoader::new()).unwrap();
        // Six persistent props plus the planet system.
        assert_eq!(p.loader().outstanding().len(), 7);
        assert!(p.scene().find_by_name("galaxy").is_some());
        assert!(p.scene().find_by_name("ambient_light").is_some());
    }

    #[test]
    fn test_props_attach_after_load() {
        let p = loaded();
        for role in [PropRole::Sun, PropRole::Ufo, PropRole::Window, PropRole::MenuMonitor] {
            assert!(p.prop(role).is_some(), "{:?} missing", role);
        }
        let ufo = p.prop(PropRole::Ufo).unwrap();
        assert!(!p.scene().get(ufo).unwrap().visible);
        assert!(p.transition().active().unwrap().orbits().is_some());
    }

    #[test]
    fn test_unknown_effect() {
        let mut p = loaded();
        assert!(matches!(
            p.toggle_decorative_effect("fireworks"),
            Err(SceneError::UnknownEffect(_))
        ));
        assert_eq!(p.toggle_decorative_effect(SHOOTING_STAR).unwrap(), true);
        assert_eq!(p.toggle_decorative_effect(SHOOTING_STAR).unwrap(), false);
    }

    #[test]
    fn test_alien_sound_is_delayed() {
        let mut p = loaded();
        assert_eq!(p.trigger_scripted_actor(), ActorTrigger::Accepted);
        assert_eq!(p.trigger_scripted_actor(), ActorTrigger::Busy);
        assert_eq!(p.pending_timers(), 1);

        // 0.5 s later: not yet.
        for _ in 0..5 {
            p.on_frame(0.1);
        }
        assert!(p.drain_events().is_empty());
        let ufo = p.prop(PropRole::Ufo).unwrap();
        assert!(p.scene().get(ufo).unwrap().visible);

        for _ in 0..4 {
            p.on_frame(0.1);
        }
        let events = p.drain_events();
        assert_eq!(
            events,
            vec![SceneEvent::Audio {
                cue: AudioCue::OneShot {
                    path: "./audio/alien.mp3".into()
                }
            }]
        );
    }

    #[test]
    fn test_warp_sound_follows_config_flag() {
        let mut p = loaded();
        p.request_transition(EnvironmentTag::Water).unwrap();
        let events = p.drain_events();
        assert_eq!(events.len(), 1);

        let mut with_audio = config();
        with_audio.audio.audio_on_warp = true;
        let mut p = Presentation::new(with_audio, DeferredAssetLoader::new()).unwrap();
        p.request_transition(EnvironmentTag::Fire).unwrap();
        let events = p.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], SceneEvent::Audio { .. }));
    }

    #[test]
    fn test_sun_hidden_in_fire() {
        let mut p = loaded();
        let sun = p.prop(PropRole::Sun).unwrap();
        assert!(p.scene().get(sun).unwrap().visible);
        p.request_transition(EnvironmentTag::Fire).unwrap();
        for _ in 0..40 {
            p.on_frame(0.1);
        }
        assert_eq!(p.transition().current(), EnvironmentTag::Fire);
        assert!(!p.scene().get(sun).unwrap().visible);
    }

    #[test]
    fn test_failed_prop_load_is_reported() {
        let mut p = Presentation::new(config(), DeferredAssetLoader::new()).unwrap();
        let tickets: Vec<_> = p.loader().outstanding().iter().map(|r| r.ticket).collect();
        for t in tickets {
            p.loader_mut().fail(t, "missing");
        }
        p.on_frame(0.016);
        let failures = p
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SceneEvent::AssetFailed { .. }))
            .count();
        assert_eq!(failures, 7);
        assert!(p.prop(PropRole::Sun).is_none());
    }

    #[test]
    fn test_soundtrack_events() {
        let mut p = loaded();
        assert!(p.toggle_audio());
        p.track_ended();
        let events = p.drain_events();
        assert_eq!(events.len(), 2);
        assert!(!p.toggle_audio());
    }

    fn clip_time(p: &Presentation<DeferredAssetLoader>, role: PropRole) -> f32 {
        let id = p.prop(role).unwrap();
        match &p.scene().get(id).unwrap().kind {
            EntityKind::Model(model) => model.clip_time,
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_monitor_clip_runs_at_clip_rate() {
        let mut p = loaded();
        let before = clip_time(&p, PropRole::IconMonitor);
        for _ in 0..10 {
            p.on_frame(0.1);
        }
        let after = clip_time(&p, PropRole::IconMonitor);
        assert!((after - before - 0.1).abs() < 1e-4, "advanced {}", after - before);
    }

    #[test]
    fn test_uniform_blocks() {
        let mut p = loaded();
        assert!(p.surface_uniforms().is_none());
        let camera = p.camera_uniforms();
        assert_eq!(camera.position[3], 1.0);
        assert_eq!(bytemuck::bytes_of(&camera).len(), 80);

        p.request_transition(EnvironmentTag::Water).unwrap();
        for _ in 0..40 {
            p.on_frame(0.1);
        }
        let surface = p.surface_uniforms().unwrap();
        assert!(surface.time > 0.0);
        assert_eq!(bytemuck::bytes_of(&surface).len(), 64);
    }

    #[test]
    fn test_snapshot_serializes() {
        let p = loaded();
        let json = serde_json::to_string(&p.snapshot()).unwrap();
        assert!(json.contains("\"environment\":\"space\""));
        assert!(json.contains("galaxy"));
    }
}
