//! Error taxonomy for the presentation core.
//!
//! Asset failures are recoverable and only ever logged by the environment
//! lifecycle. Degenerate parameters are rejected when a component is built so
//! that no NaN can appear mid-animation. Rejected transitions are not errors at
//! all and live in [`crate::transition::TransitionRejected`].

use std::fmt;

use thiserror::Error;

/// The kind of asset a loader was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Model,
    Texture,
    Audio,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Model => write!(f, "model"),
            AssetKind::Texture => write!(f, "texture"),
            AssetKind::Audio => write!(f, "audio"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// Missing or corrupt model, texture or audio file.
    #[error("failed to load {kind} '{path}': {reason}")]
    AssetLoad {
        kind: AssetKind,
        path: String,
        reason: String,
    },

    /// A configuration value that would make the animation degenerate.
    #[error("degenerate parameter '{name}': {reason}")]
    DegenerateParameter { name: &'static str, reason: String },

    #[error("unknown environment '{0}'")]
    UnknownEnvironment(String),

    #[error("unknown decorative effect '{0}'")]
    UnknownEffect(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SceneError {
    pub fn asset_load(kind: AssetKind, path: impl Into<String>, reason: impl Into<String>) -> Self {
        SceneError::AssetLoad {
            kind,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn degenerate(name: &'static str, reason: impl Into<String>) -> Self {
        SceneError::DegenerateParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type SceneResult<T> = Result<T, SceneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_load_message() {
        let err = SceneError::asset_load(AssetKind::Texture, "images/waterSky.png", "not found");
        assert_eq!(
            err.to_string(),
            "failed to load texture 'images/waterSky.png': not found"
        );
    }

    #[test]
    fn test_degenerate_message() {
        let err = SceneError::degenerate("branches", "must be at least 1");
        assert!(err.to_string().contains("branches"));
    }
}
