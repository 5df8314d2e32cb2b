//! Procedural spiral galaxy point cloud.
//!
//! The field is generated exactly once per instance; afterwards only a
//! whole-object rotation is animated, never individual particles.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SceneError, SceneResult};
use crate::scene_graph::{Color, Transform};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalaxyParameters {
    pub count: usize,
    /// Point sprite size.
    pub size: f32,
    pub radius: f32,
    pub branches: u32,
    pub spin: f32,
    pub rotation_velocity: f32,
    /// Higher values pull the noise toward zero and tighten the arms.
    pub randomness_power: f32,
    pub spiral_height: f32,
    pub vertical_offset: f32,
    pub inside_color: String,
    pub outside_color: String,
    /// Per-axis stretch applied to the arm (x, z) and noise (y) terms.
    pub axis_scale: [f32; 3],
    /// Converts `rotation_velocity` into radians per second of elapsed time.
    pub rotation_scale: f32,
    pub position: [f32; 3],
    pub tilt: f32,
}

impl Default for GalaxyParameters {
    fn default() -> Self {
        Self {
            count: 5_000,
            size: 0.01,
            radius: 60.0,
            branches: 3,
            spin: 1.2,
            rotation_velocity: 0.4,
            randomness_power: 3.0,
            spiral_height: 0.0,
            vertical_offset: 3.0,
            inside_color: "#ffffff".to_string(),
            outside_color: "#ffffff".to_string(),
            axis_scale: [1.0, 5.0, 0.2],
            rotation_scale: 0.0006,
            position: [15.0, -15.0, -50.0],
            tilt: -PI / 15.0,
        }
    }
}

impl GalaxyParameters {
    /// Reject parameters that would divide by zero or produce NaN.
    /// Returns the parsed color endpoints.
    fn validate(&self) -> SceneResult<(Color, Color)> {
        if self.count == 0 {
            return Err(SceneError::degenerate("count", "galaxy needs at least one particle"));
        }
        if self.branches == 0 {
            return Err(SceneError::degenerate("branches", "must be at least 1"));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(SceneError::degenerate(
                "radius",
                format!("must be positive, got {}", self.radius),
            ));
        }
        if !(self.randomness_power.is_finite() && self.randomness_power >= 0.0) {
            return Err(SceneError::degenerate(
                "randomness_power",
                format!("must be non-negative, got {}", self.randomness_power),
            ));
        }
        if !self.spin.is_finite() || self.axis_scale.iter().any(|s| !s.is_finite()) {
            return Err(SceneError::degenerate("spin", "spin and axis scale must be finite"));
        }
        let inside = Color::from_hex(&self.inside_color).ok_or_else(|| {
            SceneError::degenerate("inside_color", format!("'{}' is not #rrggbb", self.inside_color))
        })?;
        let outside = Color::from_hex(&self.outside_color).ok_or_else(|| {
            SceneError::degenerate("outside_color", format!("'{}' is not #rrggbb", self.outside_color))
        })?;
        Ok((inside, outside))
    }
}

/// An immutable positions/colors buffer plus the rigid transform animating it.
#[derive(Debug, Clone)]
pub struct ParticleField {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
    pub transform: Transform,
    pub size: f32,
    rotation_rate: f32,
}

impl ParticleField {
    /// Build the field. The RNG is injected so a seeded generator yields a
    /// bit-identical buffer.
    pub fn generate<R: Rng + ?Sized>(params: &GalaxyParameters, rng: &mut R) -> SceneResult<Self> {
        let (inside, outside) = params.validate()?;
        let [sx, sy, sz] = params.axis_scale;

        let mut positions = Vec::with_capacity(params.count);
        let mut colors = Vec::with_capacity(params.count);

        for i in 0..params.count {
            let radius = rng.random::<f32>() * params.radius;
            let branch_angle = (i as u32 % params.branches) as f32 / params.branches as f32 * TAU;
            let spin_angle = radius * params.spin;
            let angle = branch_angle + spin_angle;

            let noise_x = signed_noise(rng, params.randomness_power);
            let noise_y = signed_noise(rng, params.randomness_power);
            let noise_z = signed_noise(rng, params.randomness_power);

            positions.push([
                sx * angle.cos() * radius + noise_x,
                sy * noise_y + radius * params.spiral_height + params.vertical_offset,
                sz * angle.sin() * radius + noise_z,
            ]);
            colors.push(inside.lerp(outside, radius / params.radius).to_array());
        }

        let transform = Transform::at(Vec3::from_array(params.position))
            .with_rotation(Vec3::new(params.tilt, 0.0, 0.0));

        Ok(Self {
            positions,
            colors,
            transform,
            size: params.size,
            rotation_rate: params.rotation_velocity * params.rotation_scale,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Rigid rotation about Y as a pure function of elapsed time.
    pub fn rotate_to(&mut self, elapsed: f32) {
        self.transform.rotation.y = self.rotation_rate * elapsed;
    }
}

/// `rand^power`, with a random sign.
fn signed_noise<R: Rng + ?Sized>(rng: &mut R, power: f32) -> f32 {
    let magnitude = rng.random::<f32>().powf(power);
    if rng.random::<f32>() < 0.5 {
        magnitude
    } else {
        -magnitude
    }
}
