//! Timed, warp-masked swaps between environments.
//!
//! The controller's [`TransitionState`] is the only guard against overlapping
//! transitions. A swap happens on the first update at or after
//! `started_at + duration`, and always leaves the controller `Idle`.

use glam::Vec3;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::assets::{AssetLoader, LoadCompletion};
use crate::clock::FrameTime;
use crate::environment::{Delivery, EnvironmentRegistry, EnvironmentResources, EnvironmentTag};
use crate::error::{SceneError, SceneResult};
use crate::orbit::OrbitConfig;
use crate::scene_graph::SceneGraph;
use crate::trail::{WarpConfig, WarpTunnel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransitionState {
    Idle,
    Transitioning {
        from: EnvironmentTag,
        to: EnvironmentTag,
        /// Seconds of elapsed frame time.
        started_at: f32,
        duration: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionRejected {
    #[error("a transition is already in progress")]
    Busy,
    #[error("requested environment is already active")]
    AlreadyActive,
}

/// A completed swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Swapped {
    pub from: EnvironmentTag,
    pub to: EnvironmentTag,
}

pub struct TransitionController {
    state: TransitionState,
    current: EnvironmentTag,
    active: Option<EnvironmentResources>,
    registry: EnvironmentRegistry,
    warp: Option<WarpTunnel>,
    warp_config: WarpConfig,
    duration: f32,
    swaps: u64,
}

impl TransitionController {
    /// `duration_ms` is the length of every transition.
    pub fn new(
        initial: EnvironmentTag,
        orbit_config: OrbitConfig,
        warp_config: WarpConfig,
        duration_ms: f64,
    ) -> SceneResult<Self> {
        if !(duration_ms.is_finite() && duration_ms > 0.0) {
            return Err(SceneError::degenerate("transition duration", "must be positive"));
        }
        Ok(Self {
            state: TransitionState::Idle,
            current: initial,
            active: None,
            registry: EnvironmentRegistry::new(orbit_config),
            warp: None,
            warp_config,
            duration: (duration_ms / 1000.0) as f32,
            swaps: 0,
        })
    }

    /// Build the initial environment. Does nothing if one is already active.
    pub fn activate_initial(
        &mut self,
        scene: &mut SceneGraph,
        camera_position: Vec3,
        loader: &mut dyn AssetLoader,
    ) {
        if self.active.is_none() {
            let env = self.registry.create(self.current, scene, camera_position, loader);
            self.active = Some(env);
        }
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn current(&self) -> EnvironmentTag {
        self.current
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, TransitionState::Transitioning { .. })
    }

    pub fn active(&self) -> Option<&EnvironmentResources> {
        self.active.as_ref()
    }

    pub fn warp(&self) -> Option<&WarpTunnel> {
        self.warp.as_ref()
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Start a transition to `to` at `now` (seconds of elapsed time).
    pub fn request_transition<R: Rng + ?Sized>(
        &mut self,
        to: EnvironmentTag,
        now: f32,
        camera_position: Vec3,
        scene: &mut SceneGraph,
        rng: &mut R,
    ) -> Result<(), TransitionRejected> {
        if self.is_transitioning() {
            return Err(TransitionRejected::Busy);
        }
        if to == self.current {
            return Err(TransitionRejected::AlreadyActive);
        }

        self.state = TransitionState::Transitioning {
            from: self.current,
            to,
            started_at: now,
            duration: self.duration,
        };

        match WarpTunnel::start(self.warp_config.clone(), camera_position, now, self.duration, rng) {
            Ok(mut tunnel) => {
                tunnel.attach(scene);
                self.warp = Some(tunnel);
            }
            Err(e) => log::warn!("Transition continues without warp effect: {}", e),
        }

        log::info!("Transition {} -> {} started", self.current, to);
        Ok(())
    }

    /// Advance the warp effect and perform the swap once the duration is up.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        now: f32,
        scene: &mut SceneGraph,
        camera_position: Vec3,
        loader: &mut dyn AssetLoader,
        rng: &mut R,
    ) -> Option<Swapped> {
        let TransitionState::Transitioning {
            from,
            to,
            started_at,
            duration,
        } = self.state
        else {
            return None;
        };

        if let Some(warp) = &mut self.warp {
            warp.update(now, camera_position, rng);
        }
        if now - started_at < duration {
            return None;
        }

        // Idle first: nothing below can leave the controller stuck mid-transition.
        self.state = TransitionState::Idle;

        if let Some(mut warp) = self.warp.take() {
            warp.dispose(scene);
        }
        if let Some(old) = self.active.take() {
            self.registry.dispose(old, scene);
        }
        self.active = Some(self.registry.create(to, scene, camera_position, loader));
        self.current = to;
        self.swaps += 1;

        log::info!("Transition {} -> {} complete", from, to);
        Some(Swapped { from, to })
    }

    /// Route a load completion to the active environment.
    pub fn deliver(&mut self, completion: LoadCompletion, scene: &mut SceneGraph) -> Delivery {
        match &mut self.active {
            Some(env) => self.registry.deliver(env, completion, scene),
            None => {
                log::debug!("Dropping load '{}' with no active environment", completion.path);
                Delivery::Stale
            }
        }
    }

    pub fn animate(&mut self, frame: &FrameTime, scene: &mut SceneGraph, clip_rate: f32) {
        if let Some(env) = &mut self.active {
            env.animate(frame, scene, clip_rate);
        }
    }

    /// Whether the persistent sun belongs in the current environment.
    pub fn shows_sun(&self) -> bool {
        self.active.as_ref().map_or(true, |env| env.shows_sun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::DeferredAssetLoader;
    use crate::scene_graph::Owner;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    const CAMERA: Vec3 = Vec3::new(-10.0, 10.0, 40.0);

    struct Rig {
        controller: TransitionController,
        scene: SceneGraph,
        loader: DeferredAssetLoader,
        rng: Pcg64Mcg,
    }

    fn rig() -> Rig {
        let warp = WarpConfig {
            streak_count: 50,
            ..Default::default()
        };
        let mut rig = Rig {
            controller: TransitionController::new(
                EnvironmentTag::Space,
                OrbitConfig::default(),
                warp,
                3000.0,
            )
            .unwrap(),
            scene: SceneGraph::new(),
            loader: DeferredAssetLoader::new(),
            rng: Pcg64Mcg::seed_from_u64(11),
        };
        rig.controller
            .activate_initial(&mut rig.scene, CAMERA, &mut rig.loader);
        rig
    }

    impl Rig {
        fn request(&mut self, to: EnvironmentTag, now: f32) -> Result<(), TransitionRejected> {
            self.controller
                .request_transition(to, now, CAMERA, &mut self.scene, &mut self.rng)
        }

        fn update(&mut self, now: f32) -> Option<Swapped> {
            self.controller
                .update(now, &mut self.scene, CAMERA, &mut self.loader, &mut self.rng)
        }
    }

    #[test]
    fn test_rejects_zero_duration() {
        assert!(TransitionController::new(
            EnvironmentTag::Space,
            OrbitConfig::default(),
            WarpConfig::default(),
            0.0
        )
        .is_err());
    }

    #[test]
    fn test_already_active() {
        let mut rig = rig();
        assert_eq!(
            rig.request(EnvironmentTag::Space, 0.0),
            Err(TransitionRejected::AlreadyActive)
        );
        assert_eq!(rig.controller.state(), TransitionState::Idle);
    }

    #[test]
    fn test_busy_while_transitioning() {
        let mut rig = rig();
        assert_eq!(rig.request(EnvironmentTag::Water, 1.0), Ok(()));
        assert_eq!(rig.request(EnvironmentTag::Fire, 1.5), Err(TransitionRejected::Busy));
        assert_eq!(rig.request(EnvironmentTag::Space, 1.5), Err(TransitionRejected::Busy));
    }

    #[test]
    fn test_swap_after_duration() {
        let mut rig = rig();
        let space_owner = rig.controller.active().unwrap().owner();
        rig.request(EnvironmentTag::Water, 1.0).unwrap();
        assert!(rig.controller.warp().unwrap().is_attached());
        assert_eq!(rig.scene.entity_count_where(|o| *o == Owner::Effect("warp")), 1);

        assert_eq!(rig.update(2.0), None);
        assert_eq!(rig.controller.current(), EnvironmentTag::Space);

        let swapped = rig.update(4.0);
        assert_eq!(
            swapped,
            Some(Swapped {
                from: EnvironmentTag::Space,
                to: EnvironmentTag::Water
            })
        );
        assert_eq!(rig.controller.state(), TransitionState::Idle);
        assert_eq!(rig.controller.current(), EnvironmentTag::Water);
        assert!(rig.controller.warp().is_none());
        assert_eq!(rig.scene.entity_count_where(|o| *o == Owner::Effect("warp")), 0);
        assert_eq!(rig.scene.resource_count_where(|o| *o == Owner::Effect("warp")), 0);
        assert_eq!(rig.scene.entity_count_where(|o| *o == space_owner), 0);
        assert!(rig.scene.find_by_name("water_surface").is_some());
        assert_eq!(rig.update(5.0), None);
    }

    #[test]
    fn test_late_completion_for_previous_environment_is_stale() {
        let mut rig = rig();
        // The planet model for Space is still loading.
        let space_loads = rig.loader.take_new_requests();
        assert_eq!(space_loads.len(), 1);

        rig.request(EnvironmentTag::Water, 0.0).unwrap();
        rig.update(3.0).unwrap();

        rig.loader.fail(space_loads[0].ticket, "late");
        let completion = rig.loader.poll().remove(0);
        assert_eq!(rig.controller.deliver(completion, &mut rig.scene), Delivery::Stale);
    }

    #[test]
    fn test_round_trip_back_to_space() {
        let mut rig = rig();
        rig.request(EnvironmentTag::Fire, 0.0).unwrap();
        rig.update(3.0);
        assert!(!rig.controller.shows_sun());
        rig.request(EnvironmentTag::Space, 3.5).unwrap();
        rig.update(6.5);
        assert_eq!(rig.controller.current(), EnvironmentTag::Space);
        assert!(rig.controller.shows_sun());
        assert_eq!(rig.controller.swaps(), 2);
    }
}
