//! Browser bindings.
//!
//! The page owns the canvas, the GPU device and the audio elements. It drives
//! [`WasmScene::on_frame`] from `requestAnimationFrame`, performs the asset
//! fetches listed by `take_pending_loads`, and uploads the vertex and uniform
//! data exposed here.

use std::cell::RefCell;
use std::rc::Rc;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::actor::ActorTrigger;
use crate::assets::{
    AudioHandle, ClipInfo, DeferredAssetLoader, LoadTicket, LoadedAsset, LoadedModel, TextureInfo,
};
use crate::config::PresentationConfig;
use crate::environment::EnvironmentTag;
use crate::gpu_data::{galaxy_vertices, trail_vertices, vertex_layouts, warp_vertices};
use crate::presentation::Presentation;

/// Outcome of a UI request, as seen by the page.
#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum UiOutcome {
    Accepted,
    Busy,
    AlreadyActive,
    Invalid,
}

#[wasm_bindgen]
pub struct WasmScene {
    inner: Rc<RefCell<Presentation<DeferredAssetLoader>>>,
}

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        log::error!("Failed to serialize: {}", e);
        "null".to_string()
    })
}

fn outcome_json(outcome: UiOutcome) -> String {
    to_json(&outcome)
}

#[wasm_bindgen]
impl WasmScene {
    /// Build the scene from a JSON config (`"{}"` for defaults).
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WasmScene, JsValue> {
        let config = PresentationConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let presentation = Presentation::new(config, DeferredAssetLoader::new())
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmScene {
            inner: Rc::new(RefCell::new(presentation)),
        })
    }

    /// Advance one frame. Returns the frame report as JSON.
    pub fn on_frame(&self, delta: f32) -> String {
        let mut inner = self.inner.borrow_mut();
        to_json(&inner.on_frame(delta))
    }

    pub fn resize(&self, width: u32, height: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.set_viewport(width as f32, height as f32);
    }

    pub fn request_transition(&self, tag: &str) -> String {
        let Ok(tag) = tag.parse::<EnvironmentTag>() else {
            log::warn!("Unknown environment '{}'", tag);
            return outcome_json(UiOutcome::Invalid);
        };
        let mut inner = self.inner.borrow_mut();
        outcome_json(match inner.request_transition(tag) {
            Ok(()) => UiOutcome::Accepted,
            Err(crate::transition::TransitionRejected::Busy) => UiOutcome::Busy,
            Err(crate::transition::TransitionRejected::AlreadyActive) => UiOutcome::AlreadyActive,
        })
    }

    /// Returns the effect's new state, or `undefined` for an unknown name.
    pub fn toggle_decorative_effect(&self, name: &str) -> Option<bool> {
        let mut inner = self.inner.borrow_mut();
        match inner.toggle_decorative_effect(name) {
            Ok(enabled) => Some(enabled),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }

    pub fn trigger_scripted_actor(&self) -> String {
        let mut inner = self.inner.borrow_mut();
        outcome_json(match inner.trigger_scripted_actor() {
            ActorTrigger::Accepted => UiOutcome::Accepted,
            ActorTrigger::Busy => UiOutcome::Busy,
        })
    }

    pub fn toggle_audio(&self) -> bool {
        self.inner.borrow_mut().toggle_audio()
    }

    pub fn track_ended(&self) {
        self.inner.borrow_mut().track_ended();
    }

    /// Events since the last call, as a JSON array.
    pub fn drain_events(&self) -> String {
        let mut inner = self.inner.borrow_mut();
        to_json(&inner.drain_events())
    }

    // ------------------------------------------------------------------
    // Asset loading: the page fetches, parses and reports back.
    // ------------------------------------------------------------------

    /// New load requests as a JSON array of `{ticket, kind, path}`.
    pub fn take_pending_loads(&self) -> String {
        let mut inner = self.inner.borrow_mut();
        to_json(&inner.loader_mut().take_new_requests())
    }

    /// `nodes_json` is an array of node names, `clips_json` an array of
    /// `{name, duration}`.
    pub fn complete_model(&self, ticket: u64, nodes_json: &str, clips_json: &str) -> bool {
        let node_names: Vec<String> = match serde_json::from_str(nodes_json) {
            Ok(n) => n,
            Err(e) => {
                log::error!("Bad node list for load {}: {}", ticket, e);
                return self.fail_load(ticket, &e.to_string());
            }
        };
        let clips = ClipInfo::list_from_json(clips_json);
        let model = LoadedModel { node_names, clips };
        self.resolve(ticket, LoadedAsset::Model(model))
    }

    pub fn complete_texture(&self, ticket: u64, width: u32, height: u32) -> bool {
        self.resolve(ticket, LoadedAsset::Texture(TextureInfo { width, height }))
    }

    pub fn complete_audio(&self, ticket: u64, path: &str) -> bool {
        self.resolve(
            ticket,
            LoadedAsset::Audio(AudioHandle {
                path: path.to_string(),
            }),
        )
    }

    pub fn fail_load(&self, ticket: u64, reason: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.loader_mut().fail(LoadTicket(ticket), reason)
    }

    // ------------------------------------------------------------------
    // Render data
    // ------------------------------------------------------------------

    pub fn snapshot_json(&self) -> String {
        let inner = self.inner.borrow();
        to_json(&inner.snapshot())
    }

    /// Interleaved galaxy vertices (position, size, rgba) as raw floats.
    pub fn galaxy_vertex_data(&self) -> Vec<f32> {
        let inner = self.inner.borrow();
        bytemuck::cast_slice(&galaxy_vertices(inner.galaxy())).to_vec()
    }

    /// Line-list vertices (position, alpha) for the star trail and, while a
    /// transition runs, the warp streaks.
    pub fn line_vertex_data(&self) -> Vec<f32> {
        let inner = self.inner.borrow();
        let mut vertices = trail_vertices(&inner.star().trail, inner.star().visibility);
        if let Some(warp) = inner.transition().warp() {
            vertices.extend(warp_vertices(warp));
        }
        bytemuck::cast_slice(&vertices).to_vec()
    }

    /// Vertex buffer layouts for the point and line streams, as JSON.
    pub fn vertex_layouts_json(&self) -> String {
        to_json(&vertex_layouts())
    }

    /// Camera uniform block (view-projection + position) as raw floats.
    pub fn camera_uniform_data(&self) -> Vec<f32> {
        let inner = self.inner.borrow();
        bytemuck::cast_slice(&[inner.camera_uniforms()]).to_vec()
    }

    /// Uniform block of the active surface, or `undefined` when the current
    /// environment has none.
    pub fn surface_uniform_data(&self) -> Option<Vec<f32>> {
        let inner = self.inner.borrow();
        inner
            .surface_uniforms()
            .map(|u| bytemuck::cast_slice(&[u]).to_vec())
    }

    pub fn view_projection(&self) -> Vec<f32> {
        let inner = self.inner.borrow();
        inner.camera().view_projection().to_cols_array().to_vec()
    }

    /// Screen position of a camera-relative point, for placing menu buttons.
    pub fn anchor_on_screen(&self, x: f32, y: f32, z: f32) -> Option<Vec<f32>> {
        let inner = self.inner.borrow();
        inner
            .anchor_on_screen(glam::Vec3::new(x, y, z))
            .map(|p| p.to_vec())
    }
}

impl WasmScene {
    fn resolve(&self, ticket: u64, asset: LoadedAsset) -> bool {
        let mut inner = self.inner.borrow_mut();
        let resolved = inner.loader_mut().resolve(LoadTicket(ticket), Ok(asset));
        if !resolved {
            log::debug!("Load {} already resolved or unknown", ticket);
        }
        resolved
    }
}
