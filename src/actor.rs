//! The flyby actor (a UFO that swoops toward the window and away again).
//!
//! Its depth follows `sin(t)^0.3`, which rises steeply, hangs near the peak
//! and drops quickly: a fast approach, a hover in front of the camera, then a
//! fast exit. The curve only exists on `t ∈ [0, π]`, so the flight ends with an
//! explicit boundary check when `t` passes π.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::clock::FrameTime;
use crate::error::{SceneError, SceneResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Accumulator rate: `t += rate * delta`.
    pub rate: f32,
    pub exponent: f32,
    /// Stops short of the camera by this much on z.
    pub z_offset: f32,
    pub x_offset: f32,
    pub y_offset: f32,
    /// Lateral sway amplitude.
    pub amplitude: f32,
    /// Half-width (in t) of the window around π/2 reported as hovering.
    pub hover_band: f32,
    pub spin_rate: f32,
    pub wobble: f32,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            rate: 0.2,
            exponent: 0.3,
            z_offset: 3.0,
            x_offset: 2.0,
            y_offset: -1.0,
            amplitude: 6.0,
            hover_band: 0.35,
            spin_rate: 2.0,
            wobble: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActorPhase {
    Inactive,
    Approaching,
    Hovering,
    Departing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorTrigger {
    Accepted,
    /// Already flying; the request is dropped.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStep {
    Idle,
    Moving(ActorPhase),
    /// The flight ended this frame.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActorPose {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: f32,
}

#[derive(Debug, Clone)]
pub struct ScriptedActor {
    phase: ActorPhase,
    t: f32,
    pose: ActorPose,
    flights_completed: u64,
    config: ActorConfig,
}

impl ScriptedActor {
    pub fn new(config: ActorConfig) -> SceneResult<Self> {
        if !(config.rate.is_finite() && config.rate > 0.0) {
            return Err(SceneError::degenerate("actor rate", "must be positive"));
        }
        if !(config.exponent.is_finite() && config.exponent > 0.0) {
            return Err(SceneError::degenerate("actor exponent", "must be positive"));
        }
        Ok(Self {
            phase: ActorPhase::Inactive,
            t: 0.0,
            pose: ActorPose {
                position: Vec3::ZERO,
                rotation: Vec3::ZERO,
                scale: 0.0,
            },
            flights_completed: 0,
            config,
        })
    }

    pub fn phase(&self) -> ActorPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != ActorPhase::Inactive
    }

    pub fn accumulator(&self) -> f32 {
        self.t
    }

    pub fn pose(&self) -> ActorPose {
        self.pose
    }

    pub fn flights_completed(&self) -> u64 {
        self.flights_completed
    }

    pub fn trigger(&mut self) -> ActorTrigger {
        if self.is_active() {
            return ActorTrigger::Busy;
        }
        self.t = 0.0;
        self.phase = ActorPhase::Approaching;
        ActorTrigger::Accepted
    }

    /// Depth factor `sin(t)^exponent`, defined only on `[0, π]`.
    pub fn depth_factor(&self, t: f32) -> Option<f32> {
        if !(0.0..=PI).contains(&t) {
            return None;
        }
        // sin(PI as f32) is a tiny negative number.
        Some(t.sin().max(0.0).powf(self.config.exponent))
    }

    fn phase_at(&self, t: f32) -> ActorPhase {
        if t < FRAC_PI_2 - self.config.hover_band {
            ActorPhase::Approaching
        } else if t <= FRAC_PI_2 + self.config.hover_band {
            ActorPhase::Hovering
        } else {
            ActorPhase::Departing
        }
    }

    pub fn advance(&mut self, frame: &FrameTime, camera_position: Vec3) -> ActorStep {
        if !self.is_active() {
            return ActorStep::Idle;
        }

        self.t += self.config.rate * frame.delta;
        let Some(shape) = self.depth_factor(self.t) else {
            self.finish();
            return ActorStep::Finished;
        };

        let c = &self.config;
        self.pose = ActorPose {
            position: Vec3::new(
                (camera_position.x - c.x_offset) + c.amplitude * (self.t / 2.0).sin(),
                camera_position.y + c.y_offset,
                (camera_position.z - c.z_offset) * shape,
            ),
            rotation: Vec3::new(
                c.wobble * frame.elapsed.sin(),
                -c.spin_rate * frame.elapsed,
                0.0,
            ),
            scale: shape,
        };
        self.phase = self.phase_at(self.t);
        ActorStep::Moving(self.phase)
    }

    fn finish(&mut self) {
        log::debug!("Flyby finished after flight {}", self.flights_completed + 1);
        self.phase = ActorPhase::Inactive;
        self.t = 0.0;
        self.pose.scale = 0.0;
        self.flights_completed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(delta: f32, elapsed: f32) -> FrameTime {
        FrameTime {
            delta,
            elapsed,
            frame: 0,
        }
    }

    const CAMERA: Vec3 = Vec3::new(-10.0, 10.0, 40.0);

    #[test]
    fn test_idle_until_triggered() {
        let mut actor = ScriptedActor::new(ActorConfig::default()).unwrap();
        assert_eq!(actor.advance(&frame(1.0, 1.0), CAMERA), ActorStep::Idle);
        assert_eq!(actor.accumulator(), 0.0);
    }

    #[test]
    fn test_trigger_while_flying_is_busy() {
        let mut actor = ScriptedActor::new(ActorConfig::default()).unwrap();
        assert_eq!(actor.trigger(), ActorTrigger::Accepted);
        assert_eq!(actor.trigger(), ActorTrigger::Busy);
    }

    #[test]
    fn test_depth_rises_like_sin_pow() {
        let config = ActorConfig {
            rate: 1.0,
            ..Default::default()
        };
        let mut actor = ScriptedActor::new(config).unwrap();
        actor.trigger();

        let steps = 50;
        let dt = FRAC_PI_2 / steps as f32;
        let mut last_z = f32::MIN;
        for i in 1..=steps {
            actor.advance(&frame(dt, i as f32 * dt), CAMERA);
            let t = actor.accumulator();
            let pose = actor.pose();
            let expected = (CAMERA.z - 3.0) * t.sin().powf(0.3);
            assert!((pose.position.z - expected).abs() < 1e-3);
            assert!(pose.position.z > last_z);
            assert!((pose.scale - t.sin().powf(0.3)).abs() < 1e-5);
            last_z = pose.position.z;
        }
    }

    #[test]
    fn test_passing_pi_finishes_exactly_once() {
        let config = ActorConfig {
            rate: 1.0,
            ..Default::default()
        };
        let mut actor = ScriptedActor::new(config).unwrap();
        actor.trigger();

        let mut finished = 0;
        let mut phases = Vec::new();
        for i in 0..400 {
            match actor.advance(&frame(0.01, i as f32 * 0.01), CAMERA) {
                ActorStep::Finished => finished += 1,
                ActorStep::Moving(p) => {
                    if phases.last() != Some(&p) {
                        phases.push(p);
                    }
                }
                ActorStep::Idle => {}
            }
        }
        assert_eq!(finished, 1);
        assert_eq!(actor.flights_completed(), 1);
        assert_eq!(actor.phase(), ActorPhase::Inactive);
        assert_eq!(actor.accumulator(), 0.0);
        assert_eq!(actor.pose().scale, 0.0);
        assert_eq!(
            phases,
            vec![ActorPhase::Approaching, ActorPhase::Hovering, ActorPhase::Departing]
        );
    }

    #[test]
    fn test_can_fly_again() {
        let config = ActorConfig {
            rate: 10.0,
            ..Default::default()
        };
        let mut actor = ScriptedActor::new(config).unwrap();
        actor.trigger();
        actor.advance(&frame(1.0, 1.0), CAMERA);
        assert!(!actor.is_active());
        assert_eq!(actor.trigger(), ActorTrigger::Accepted);
        assert!(actor.is_active());
    }

    #[test]
    fn test_depth_factor_boundaries() {
        let actor = ScriptedActor::new(ActorConfig::default()).unwrap();
        assert_eq!(actor.depth_factor(0.0), Some(0.0));
        assert_eq!(actor.depth_factor(PI), Some(0.0));
        assert_eq!(actor.depth_factor(PI + 0.001), None);
        assert_eq!(actor.depth_factor(-0.1), None);
    }

    #[test]
    fn test_rejects_bad_config() {
        let config = ActorConfig {
            exponent: 0.0,
            ..Default::default()
        };
        assert!(ScriptedActor::new(config).is_err());
    }
}
