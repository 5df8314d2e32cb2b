//! Closed-form planetary orbits.
//!
//! Positions are recomputed from elapsed time every frame rather than
//! integrated, so any elapsed time can be sampled directly.

use std::f32::consts::TAU;

use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    /// Tunable constant in `sqrt(k * size / radius)`.
    pub k: f32,
    /// Slows the whole system relative to wall-clock time.
    pub time_scale: f32,
    /// Body size is `index * size_step`.
    pub size_step: f32,
    /// Orbit radius is `(index mod 3 + 1) * radius_step`.
    pub radius_step: f32,
    /// Model nodes whose names contain any of these are not animated.
    pub excluded_keywords: Vec<String>,
    /// Sun spin in radians per second (applied negatively about Y).
    pub sun_spin_rate: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            k: 10.0,
            time_scale: 0.1,
            size_step: 0.3,
            radius_step: 10.0,
            excluded_keywords: vec!["gas".to_string(), "cloud".to_string()],
            sun_spin_rate: 0.1 / 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrbitingBody {
    /// Node name inside the planet model.
    pub name: String,
    pub size: f32,
    pub orbit_radius: f32,
    /// Angular speed; zero when size or radius is zero.
    pub speed: f32,
    pub position: Vec3,
}

/// `sqrt(k * size / radius)`, guarded against zero radius and zero size.
pub fn orbit_speed(k: f32, size: f32, radius: f32) -> f32 {
    if radius <= 0.0 || size <= 0.0 || k <= 0.0 {
        return 0.0;
    }
    (k * size / radius).sqrt()
}

#[derive(Debug, Clone)]
pub struct OrbitalSystem {
    bodies: Vec<OrbitingBody>,
    time_scale: f32,
}

impl OrbitalSystem {
    /// Build bodies from model node names, skipping excluded ones. Indices
    /// (and therefore sizes and radii) are assigned after filtering.
    pub fn from_names<S: AsRef<str>>(names: &[S], config: &OrbitConfig) -> Self {
        let bodies = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !config.excluded_keywords.iter().any(|k| name.contains(k.as_str())))
            .enumerate()
            .map(|(i, name)| {
                let size = i as f32 * config.size_step;
                let orbit_radius = ((i % 3) + 1) as f32 * config.radius_step;
                OrbitingBody {
                    name: name.to_string(),
                    size,
                    orbit_radius,
                    speed: orbit_speed(config.k, size, orbit_radius),
                    position: Vec3::ZERO,
                }
            })
            .collect();

        Self {
            bodies,
            time_scale: config.time_scale,
        }
    }

    pub fn bodies(&self) -> &[OrbitingBody] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Position of body `i` at `elapsed`, without touching state.
    pub fn position_at(&self, i: usize, elapsed: f32) -> Option<Vec3> {
        let body = self.bodies.get(i)?;
        let n = self.bodies.len() as f32;
        let angle = self.time_scale * body.speed * elapsed + i as f32 * TAU / n;
        Some(Vec3::new(
            angle.cos() * body.orbit_radius,
            body.position.y,
            angle.sin() * body.orbit_radius,
        ))
    }

    /// Set every body's (x, z) for `elapsed`.
    pub fn update(&mut self, elapsed: f32) {
        for i in 0..self.bodies.len() {
            if let Some(p) = self.position_at(i, elapsed) {
                self.bodies[i].position = p;
            }
        }
    }
}

/// Sun rotation about Y at `elapsed`.
pub fn sun_rotation(config: &OrbitConfig, elapsed: f32) -> f32 {
    -config.sun_spin_rate * elapsed
}
