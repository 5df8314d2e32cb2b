//! Top-level configuration, loaded from JSON. Every field has a default, so an
//! empty object (`{}`) is a valid config.

use serde::{Deserialize, Serialize};

use crate::actor::ActorConfig;
use crate::audio::AudioConfig;
use crate::camera::CameraConfig;
use crate::clock::ClockConfig;
use crate::environment::EnvironmentTag;
use crate::error::{SceneError, SceneResult};
use crate::galaxy::GalaxyParameters;
use crate::orbit::OrbitConfig;
use crate::trail::{ShootingStarConfig, WarpConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    pub initial_environment: EnvironmentTag,
    pub transition_duration_ms: f64,
    /// Fixed RNG seed. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Playback rate of model animation clips relative to frame time.
    pub clip_rate: f32,
    pub viewport: [f32; 2],
    pub clock: ClockConfig,
    pub camera: CameraConfig,
    pub galaxy: GalaxyParameters,
    pub orbit: OrbitConfig,
    pub actor: ActorConfig,
    pub shooting_star: ShootingStarConfig,
    pub warp: WarpConfig,
    pub audio: AudioConfig,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            initial_environment: EnvironmentTag::Space,
            transition_duration_ms: 3000.0,
            seed: None,
            clip_rate: 0.1,
            viewport: [1280.0, 720.0],
            clock: ClockConfig::default(),
            camera: CameraConfig::default(),
            galaxy: GalaxyParameters::default(),
            orbit: OrbitConfig::default(),
            actor: ActorConfig::default(),
            shooting_star: ShootingStarConfig::default(),
            warp: WarpConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl PresentationConfig {
    pub fn from_json(json: &str) -> SceneResult<Self> {
        serde_json::from_str(json).map_err(|e| SceneError::Config(e.to_string()))
    }

    pub fn aspect(&self) -> f32 {
        let [w, h] = self.viewport;
        if h > 0.0 {
            w / h
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config = PresentationConfig::from_json("{}").unwrap();
        assert_eq!(config, PresentationConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "initial_environment": "water",
            "seed": 42,
            "galaxy": { "count": 100 },
            "audio": { "audio_on_warp": true }
        }"#;
        let config = PresentationConfig::from_json(json).unwrap();
        assert_eq!(config.initial_environment, EnvironmentTag::Water);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.galaxy.count, 100);
        assert_eq!(config.galaxy.branches, 3);
        assert!(config.audio.audio_on_warp);
        assert_eq!(config.transition_duration_ms, 3000.0);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = PresentationConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SceneError::Config(_)));
    }
}
