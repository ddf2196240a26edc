//! The ordered scene queue and its per-model constraints.
//!
//! Every operation takes the current queue by reference and returns a new
//! one; nothing is mutated in place. Scenes hold their media behind `Arc`,
//! so producing a new queue is a shallow copy.

use serde::Serialize;

use crate::error::CoreError;
use crate::media::{PreviewRegistry, ReferenceImage, ReferenceVideo};
use crate::model_context::ModelContext;
use crate::types::{ImageId, SceneId, VideoId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default and minimum scene duration in seconds.
pub const MIN_SCENE_DURATION_SECS: f64 = 3.0;

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// One image-anchored unit of the generation queue.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: SceneId,
    /// Always set at creation; may be cleared later by the user.
    pub reference_image: Option<ReferenceImage>,
    pub reference_video: Option<ReferenceVideo>,
    pub prompt: String,
    /// Gates whether `prompt` is sent downstream.
    pub use_prompt: bool,
    pub duration_secs: f64,
}

impl Scene {
    fn new(image: ReferenceImage) -> Self {
        Self {
            id: SceneId::new(),
            reference_image: Some(image),
            reference_video: None,
            prompt: String::new(),
            use_prompt: true,
            duration_secs: MIN_SCENE_DURATION_SECS,
        }
    }

    /// The prompt to send downstream, if any.
    pub fn effective_prompt(&self) -> Option<&str> {
        if self.use_prompt && !self.prompt.trim().is_empty() {
            Some(&self.prompt)
        } else {
            None
        }
    }

    pub fn has_image(&self) -> bool {
        self.reference_image.is_some()
    }
}

/// Clamp a requested scene duration to the minimum. Non-finite input
/// falls back to the minimum.
pub fn clamp_scene_duration(secs: f64) -> f64 {
    if secs.is_finite() {
        secs.max(MIN_SCENE_DURATION_SECS)
    } else {
        MIN_SCENE_DURATION_SECS
    }
}

// ---------------------------------------------------------------------------
// SceneQueue
// ---------------------------------------------------------------------------

/// Ordered list of scenes; insertion order is generation order.
#[derive(Debug, Clone, Default)]
pub struct SceneQueue {
    scenes: Vec<Scene>,
}

impl SceneQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_scenes(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn get(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn position(&self, id: SceneId) -> Option<usize> {
        self.scenes.iter().position(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<SceneId> {
        self.scenes.iter().map(|s| s.id).collect()
    }

    // -- insertion ----------------------------------------------------------

    /// Append a new scene anchored on `image`.
    ///
    /// Fails with [`CoreError::CapacityExceeded`] when the queue already
    /// holds `ctx.max_scenes` scenes.
    pub fn add_scene(&self, ctx: &ModelContext, image: ReferenceImage) -> Result<Self, CoreError> {
        self.add_scenes(ctx, vec![image])
    }

    /// Append one scene per image, all or nothing.
    pub fn add_scenes(
        &self,
        ctx: &ModelContext,
        images: Vec<ReferenceImage>,
    ) -> Result<Self, CoreError> {
        if self.scenes.len() + images.len() > ctx.max_scenes {
            return Err(CoreError::CapacityExceeded { max: ctx.max_scenes });
        }
        let mut scenes = self.scenes.clone();
        scenes.extend(images.into_iter().map(Scene::new));
        Ok(Self { scenes })
    }

    // -- removal ------------------------------------------------------------

    /// Remove a scene by id. Absent ids leave the queue unchanged.
    pub fn remove_scene(&self, id: SceneId) -> Self {
        Self {
            scenes: self.scenes.iter().filter(|s| s.id != id).cloned().collect(),
        }
    }

    // -- per-scene edits ----------------------------------------------------

    fn map_scene(&self, id: SceneId, edit: impl FnOnce(&mut Scene)) -> Self {
        let mut scenes = self.scenes.clone();
        if let Some(scene) = scenes.iter_mut().find(|s| s.id == id) {
            edit(scene);
        }
        Self { scenes }
    }

    pub fn update_scene_prompt(&self, id: SceneId, text: &str) -> Self {
        self.map_scene(id, |s| s.prompt = text.to_string())
    }

    pub fn toggle_use_prompt(&self, id: SceneId) -> Self {
        self.map_scene(id, |s| s.use_prompt = !s.use_prompt)
    }

    /// Set a scene's duration, clamped to [`MIN_SCENE_DURATION_SECS`].
    pub fn update_scene_duration(&self, id: SceneId, secs: f64) -> Self {
        let secs = clamp_scene_duration(secs);
        self.map_scene(id, |s| s.duration_secs = secs)
    }

    /// Swap in a new reference image. The old record's preview is released
    /// once no snapshot holds it.
    pub fn replace_scene_image(&self, id: SceneId, image: ReferenceImage) -> Self {
        self.map_scene(id, |s| s.reference_image = Some(image))
    }

    /// Drop a scene's reference image, keeping the scene itself.
    pub fn clear_scene_image(&self, id: SceneId) -> Self {
        self.map_scene(id, |s| s.reference_image = None)
    }

    /// Attach an admitted video to a scene.
    pub fn attach_scene_video(
        &self,
        ctx: &ModelContext,
        id: SceneId,
        video: ReferenceVideo,
    ) -> Result<Self, CoreError> {
        if !ctx.supports_reference_video {
            return Err(CoreError::UnsupportedModel(format!(
                "{} does not accept reference videos",
                ctx.display_name
            )));
        }
        if self.get(id).is_none() {
            return Err(CoreError::NotFound {
                entity: "scene",
                id: id.to_string(),
            });
        }
        Ok(self.map_scene(id, |s| s.reference_video = Some(video)))
    }

    pub fn detach_scene_video(&self, id: SceneId) -> Self {
        self.map_scene(id, |s| s.reference_video = None)
    }

    /// Copy the image of `from` into `to` under a new identity.
    ///
    /// No-op when either scene is missing or `from` has no image.
    pub fn copy_image_between(
        &self,
        from: SceneId,
        to: SceneId,
        previews: &PreviewRegistry,
    ) -> Self {
        match self.get(from).and_then(|s| s.reference_image.as_ref()) {
            Some(image) if from != to => {
                let copy = image.duplicate(previews);
                self.replace_scene_image(to, copy)
            }
            _ => self.clone(),
        }
    }

    /// Set prompt text on a scene and turn `use_prompt` on.
    ///
    /// Returns `false` when the scene is gone or has no reference image.
    pub(crate) fn fill_prompt(&mut self, id: SceneId, prompt: &str) -> bool {
        match self.scenes.iter_mut().find(|s| s.id == id) {
            Some(scene) if scene.has_image() => {
                scene.prompt = prompt.to_string();
                scene.use_prompt = true;
                true
            }
            _ => false,
        }
    }

    // -- duration budget ----------------------------------------------------

    /// Sum of every scene's duration.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration_secs).sum()
    }

    /// Seconds above the model's shared duration budget, if any.
    ///
    /// Soft constraint: reported for warnings, never enforced here.
    pub fn duration_overage(&self, ctx: &ModelContext) -> Option<f64> {
        let cap = ctx.max_total_duration_secs?;
        let total = self.total_duration();
        (total > cap).then_some(total - cap)
    }

    // -- snapshot -----------------------------------------------------------

    /// Read-only view handed to the generation-provider collaborator.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            scenes: self
                .scenes
                .iter()
                .enumerate()
                .map(|(position, s)| SceneSnapshot {
                    scene_id: s.id,
                    position,
                    image_id: s.reference_image.as_ref().map(|i| i.id()),
                    video_id: s.reference_video.as_ref().map(|v| v.id()),
                    prompt: s.effective_prompt().map(str::to_string),
                    duration_secs: s.duration_secs,
                })
                .collect(),
            total_duration_secs: self.total_duration(),
        }
    }
}

/// Serializable, read-only copy of the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub scenes: Vec<SceneSnapshot>,
    pub total_duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneSnapshot {
    pub scene_id: SceneId,
    pub position: usize,
    pub image_id: Option<ImageId>,
    pub video_id: Option<VideoId>,
    /// Present only when the scene's prompt is enabled and non-empty.
    pub prompt: Option<String>,
    pub duration_secs: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
