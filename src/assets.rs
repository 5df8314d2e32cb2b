//! Asset loader seam.
//!
//! Loads are asynchronous from the core's point of view: a request returns a
//! [`LoadTicket`] immediately and the result arrives later through
//! [`AssetLoader::poll`], which the presentation calls at the start of every
//! tick. Completion order relative to other loads is unspecified.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{AssetKind, SceneError, SceneResult};
use crate::scene_graph::{AnimationClip, ModelNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadTicket(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub kind: AssetKind,
    pub path: String,
}

/// A model's scene graph reduced to named nodes plus its animation clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedModel {
    pub node_names: Vec<String>,
    #[serde(default)]
    pub clips: Vec<ClipInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipInfo {
    pub name: String,
    pub duration: f32,
}

impl ClipInfo {
    /// Parse a host-supplied clip list. Clips are optional, so a malformed
    /// list is logged and the model loads without animation.
    pub fn list_from_json(json: &str) -> Vec<ClipInfo> {
        if json.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str(json) {
            Ok(clips) => clips,
            Err(e) => {
                log::warn!("Ignoring malformed clip list: {}", e);
                Vec::new()
            }
        }
    }
}

impl LoadedModel {
    pub fn nodes(&self) -> Vec<ModelNode> {
        self.node_names.iter().map(ModelNode::new).collect()
    }

    pub fn clips(&self) -> Vec<AnimationClip> {
        self.clips
            .iter()
            .map(|c| AnimationClip {
                name: c.name.clone(),
                duration: c.duration,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioHandle {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadedAsset {
    Model(LoadedModel),
    Texture(TextureInfo),
    Audio(AudioHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub kind: AssetKind,
    pub path: String,
    pub result: SceneResult<LoadedAsset>,
}

pub trait AssetLoader {
    fn request(&mut self, kind: AssetKind, path: &str) -> LoadTicket;

    /// Completions that arrived since the last poll.
    fn poll(&mut self) -> Vec<LoadCompletion>;

    fn request_model(&mut self, path: &str) -> LoadTicket {
        self.request(AssetKind::Model, path)
    }

    fn request_texture(&mut self, path: &str) -> LoadTicket {
        self.request(AssetKind::Texture, path)
    }

    fn request_audio(&mut self, path: &str) -> LoadTicket {
        self.request(AssetKind::Audio, path)
    }
}

/// Loader whose requests are fulfilled by the host (the browser glue, or a
/// test). Requests queue up until [`take_new_requests`](Self::take_new_requests)
/// hands them out; the host answers each with [`resolve`](Self::resolve).
#[derive(Debug, Default)]
pub struct DeferredAssetLoader {
    next_ticket: u64,
    outstanding: Vec<LoadRequest>,
    new_requests: Vec<LoadRequest>,
    ready: VecDeque<LoadCompletion>,
}

impl DeferredAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests issued since the last call.
    pub fn take_new_requests(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.new_requests)
    }

    pub fn outstanding(&self) -> &[LoadRequest] {
        &self.outstanding
    }

    /// Complete a request. Returns false for unknown or already resolved tickets.
    pub fn resolve(&mut self, ticket: LoadTicket, result: SceneResult<LoadedAsset>) -> bool {
        let Some(pos) = self.outstanding.iter().position(|r| r.ticket == ticket) else {
            return false;
        };
        let request = self.outstanding.remove(pos);
        self.new_requests.retain(|r| r.ticket != ticket);
        self.ready.push_back(LoadCompletion {
            ticket,
            kind: request.kind,
            path: request.path,
            result,
        });
        true
    }

    /// Fail a request with a load error built from its kind and path.
    pub fn fail(&mut self, ticket: LoadTicket, reason: &str) -> bool {
        let Some(request) = self.outstanding.iter().find(|r| r.ticket == ticket) else {
            return false;
        };
        let err = SceneError::asset_load(request.kind, request.path.clone(), reason);
        self.resolve(ticket, Err(err))
    }

    /// Resolve every outstanding request with `answer`.
    pub fn resolve_all(&mut self, mut answer: impl FnMut(&LoadRequest) -> SceneResult<LoadedAsset>) {
        let outstanding = std::mem::take(&mut self.outstanding);
        self.new_requests.clear();
        for request in outstanding {
            let result = answer(&request);
            self.ready.push_back(LoadCompletion {
                ticket: request.ticket,
                kind: request.kind,
                path: request.path,
                result,
            });
        }
    }
}

impl AssetLoader for DeferredAssetLoader {
    fn request(&mut self, kind: AssetKind, path: &str) -> LoadTicket {
        self.next_ticket += 1;
        let ticket = LoadTicket(self.next_ticket);
        let request = LoadRequest {
            ticket,
            kind,
            path: path.to_string(),
        };
        self.outstanding.push(request.clone());
        self.new_requests.push(request);
        ticket
    }

    fn poll(&mut self) -> Vec<LoadCompletion> {
        self.ready.drain(..).collect()
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use fs::FsAssetLoader;

#[cfg(not(target_arch = "wasm32"))]
mod fs {
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};

    use super::*;

    /// Loads assets from a directory on disk. Work is done at request time,
    /// but completions are only delivered on the next poll so callers see the
    /// same ordering as with a truly asynchronous loader.
    ///
    /// Models are read as Wavefront OBJ; for other extensions a sibling
    /// `.obj` file with the same stem is used when present.
    pub struct FsAssetLoader {
        root: PathBuf,
        next_ticket: u64,
        ready: VecDeque<LoadCompletion>,
    }

    impl FsAssetLoader {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                next_ticket: 0,
                ready: VecDeque::new(),
            }
        }

        fn resolve_path(&self, path: &str) -> PathBuf {
            self.root.join(path.trim_start_matches("./"))
        }

        fn load(&self, kind: AssetKind, path: &str) -> SceneResult<LoadedAsset> {
            let full = self.resolve_path(path);
            let loaded = match kind {
                AssetKind::Model => load_model(&full).map(LoadedAsset::Model),
                AssetKind::Texture => image::image_dimensions(&full)
                    .map(|(width, height)| LoadedAsset::Texture(TextureInfo { width, height }))
                    .map_err(|e| e.to_string()),
                AssetKind::Audio => std::fs::metadata(&full)
                    .map(|_| {
                        LoadedAsset::Audio(AudioHandle {
                            path: path.to_string(),
                        })
                    })
                    .map_err(|e| e.to_string()),
            };
            loaded.map_err(|reason| SceneError::asset_load(kind, path, reason))
        }
    }

    fn load_model(path: &Path) -> Result<LoadedModel, String> {
        let obj_path = if path.extension().is_some_and(|e| e == "obj") {
            path.to_path_buf()
        } else {
            path.with_extension("obj")
        };
        if !obj_path.exists() {
            return Err(format!("no OBJ geometry found at {}", obj_path.display()));
        }

        let load_options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, _materials) =
            tobj::load_obj(&obj_path, &load_options).map_err(|e| format!("Failed to parse OBJ: {}", e))?;

        if models.is_empty() {
            return Err("OBJ file contains no models".to_string());
        }

        Ok(LoadedModel {
            node_names: models.into_iter().map(|m| m.name).collect(),
            clips: Vec::new(),
        })
    }

    impl AssetLoader for FsAssetLoader {
        fn request(&mut self, kind: AssetKind, path: &str) -> LoadTicket {
            self.next_ticket += 1;
            let ticket = LoadTicket(self.next_ticket);
            let result = self.load(kind, path);
            self.ready.push_back(LoadCompletion {
                ticket,
                kind,
                path: path.to_string(),
                result,
            });
            ticket
        }

        fn poll(&mut self) -> Vec<LoadCompletion> {
            self.ready.drain(..).collect()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_missing_files_fail_on_poll() {
            let mut loader = FsAssetLoader::new("/nonexistent/warpscene-assets");
            let ticket = loader.request_texture("./images/waterSky.png");
            let done = loader.poll();
            assert_eq!(done.len(), 1);
            assert_eq!(done[0].ticket, ticket);
            assert!(matches!(
                done[0].result,
                Err(SceneError::AssetLoad {
                    kind: AssetKind::Texture,
                    ..
                })
            ));
            assert!(loader.poll().is_empty());
        }

        #[test]
        fn test_obj_model_nodes() {
            let dir = std::env::temp_dir().join(format!("warpscene-obj-{}", std::process::id()));
            std::fs::create_dir_all(dir.join("models")).unwrap();
            let obj = "o rock\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\no ice\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 4 5 6\n";
            std::fs::write(dir.join("models/planets.obj"), obj).unwrap();

            let mut loader = FsAssetLoader::new(&dir);
            loader.request_model("./models/planets.glb");
            let done = loader.poll();
            match &done[0].result {
                Ok(LoadedAsset::Model(model)) => {
                    assert_eq!(model.node_names, vec!["rock".to_string(), "ice".to_string()]);
                }
                other => panic!("expected model, got {:?}", other),
            }
            let _ = std::fs::remove_dir_all(&dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_list_parsing() {
        let clips = ClipInfo::list_from_json(r#"[{"name":"scroll","duration":4.0}]"#);
        assert_eq!(
            clips,
            vec![ClipInfo {
                name: "scroll".into(),
                duration: 4.0
            }]
        );
        assert!(ClipInfo::list_from_json("").is_empty());
        assert!(ClipInfo::list_from_json("{not json").is_empty());
        assert!(ClipInfo::list_from_json(r#"[{"name":"x"}]"#).is_empty());
    }

    #[test]
    fn test_deferred_requests_and_resolution() {
        let mut loader = DeferredAssetLoader::new();
        let a = loader.request_model("models/sun.glb");
        let b = loader.request_texture("images/waterSky.png");
        assert_ne!(a, b);

        let announced = loader.take_new_requests();
        assert_eq!(announced.len(), 2);
        assert!(loader.take_new_requests().is_empty());
        assert!(loader.poll().is_empty());

        assert!(loader.resolve(b, Ok(LoadedAsset::Texture(TextureInfo { width: 4, height: 2 }))));
        assert!(!loader.resolve(b, Ok(LoadedAsset::Texture(TextureInfo { width: 4, height: 2 }))));
        let done = loader.poll();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].path, "images/waterSky.png");
        assert_eq!(loader.outstanding().len(), 1);

        assert!(loader.fail(a, "corrupt"));
        let done = loader.poll();
        assert!(matches!(done[0].result, Err(SceneError::AssetLoad { kind: AssetKind::Model, .. })));
    }

    #[test]
    fn test_resolve_all() {
        let mut loader = DeferredAssetLoader::new();
        loader.request_audio("audio/alien.mp3");
        loader.request_audio("audio/warp.mp3");
        loader.resolve_all(|req| {
            Ok(LoadedAsset::Audio(AudioHandle {
                path: req.path.clone(),
            }))
        });
        assert!(loader.outstanding().is_empty());
        assert_eq!(loader.poll().len(), 2);
    }
}
