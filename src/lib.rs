pub mod error;
pub mod clock;
pub mod easing;
pub mod scene_graph;
pub mod surface;
pub mod camera;
pub mod assets;
pub mod config;

// Procedural content and motion
pub mod galaxy;
pub mod orbit;
pub mod actor;
pub mod trail;
pub mod gpu_data;

// Environment lifecycle
pub mod environment;
pub mod transition;

// Host-facing layer
pub mod timers;
pub mod audio;
pub mod presentation;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
