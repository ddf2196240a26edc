//! The single top-level store.
//!
//! [`Studio`] owns the scene queue, the global reference-video slot, the
//! model-wide negative prompt and the current extraction session. Every
//! queue mutation swaps in a whole new [`SceneQueue`]; async work runs
//! against a detached snapshot and is reconciled back through a ticket
//! check, so a run that is no longer the latest one is discarded.

use std::path::Path;
use std::time::Duration;

use sceneforge_core::admission::VideoTarget;
use sceneforge_core::codec::{FrameExtractor, MediaProbe, VideoTrimmer};
use sceneforge_core::error::CoreError;
use sceneforge_core::extraction::{self, DEFAULT_CLIP_LENGTH_SECS};
use sceneforge_core::media::{ExtractedFrame, PreviewRegistry, ReferenceImage, ReferenceVideo};
use sceneforge_core::model_context::{CharacterOrientation, ModelContext};
use sceneforge_core::scene_queue::{QueueSnapshot, SceneQueue};
use sceneforge_core::style::StylePreset;
use sceneforge_core::types::{SceneId, VideoId};

use crate::auto_motion::MotionTracker;
use crate::config::StudioConfig;
use crate::intake::{self, AdmittedVideo, VideoUpload};
use crate::notice::{Notice, NoticeBus};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Monotonic identifier of an async run (extraction or auto motion).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Result of handing an async run back to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    Applied(T),
    /// A newer run was started in the meantime; nothing was changed.
    Discarded,
}

/// Where admitted reference videos go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VideoMode {
    /// One model-wide video drives every scene.
    #[default]
    Global,
    /// Each scene carries its own video.
    PerScene,
}

/// Frames from the most recent extraction and the user's primary pick.
#[derive(Debug, Default)]
pub struct ExtractionSession {
    ticket: Ticket,
    frames: Vec<ExtractedFrame>,
    primary_index: usize,
}

impl ExtractionSession {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn frames(&self) -> &[ExtractedFrame] {
        &self.frames
    }

    pub fn primary_index(&self) -> usize {
        self.primary_index
    }
}

// ---------------------------------------------------------------------------
// Studio
// ---------------------------------------------------------------------------

pub struct Studio {
    pub(crate) ctx: ModelContext,
    pub(crate) queue: SceneQueue,
    pub(crate) previews: PreviewRegistry,
    video_mode: VideoMode,
    pub(crate) global_video: Option<ReferenceVideo>,
    pub(crate) negative_prompt: Option<String>,
    pub(crate) orientation: CharacterOrientation,
    pub(crate) keep_audio: bool,
    pub(crate) style: StylePreset,
    pub(crate) user_note: Option<String>,
    pub(crate) credential: Option<String>,
    extraction: ExtractionSession,
    pub(crate) motion: MotionTracker,
    notices: NoticeBus,
    pub(crate) notice_dismiss_after: Duration,
    over_budget: bool,
}

impl Studio {
    pub fn new(ctx: ModelContext, notices: NoticeBus) -> Self {
        Self {
            ctx,
            queue: SceneQueue::new(),
            previews: PreviewRegistry::new(),
            video_mode: VideoMode::default(),
            global_video: None,
            negative_prompt: None,
            orientation: CharacterOrientation::default(),
            keep_audio: false,
            style: StylePreset::default(),
            user_note: None,
            credential: None,
            extraction: ExtractionSession::default(),
            motion: MotionTracker::default(),
            notices,
            notice_dismiss_after: Duration::from_secs(6),
            over_budget: false,
        }
    }

    /// Build a studio for the configured model, style and credential.
    pub fn from_config(config: &StudioConfig, notices: NoticeBus) -> Result<Self, CoreError> {
        let ctx = ModelContext::lookup(&config.active_model)?;
        let mut studio = Self::new(ctx, notices);
        studio.style = config.style_preset;
        studio.credential = config.director_api_key.clone();
        studio.notice_dismiss_after = config.notice_dismiss_after;
        Ok(studio)
    }

    // -- accessors ----------------------------------------------------------

    pub fn queue(&self) -> &SceneQueue {
        &self.queue
    }

    pub fn model(&self) -> &ModelContext {
        &self.ctx
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn notices(&self) -> &NoticeBus {
        &self.notices
    }

    pub fn video_mode(&self) -> VideoMode {
        self.video_mode
    }

    pub fn global_video(&self) -> Option<&ReferenceVideo> {
        self.global_video.as_ref()
    }

    pub fn negative_prompt(&self) -> Option<&str> {
        self.negative_prompt.as_deref()
    }

    pub fn orientation(&self) -> CharacterOrientation {
        self.orientation
    }

    pub fn style(&self) -> StylePreset {
        self.style
    }

    pub fn extraction(&self) -> &ExtractionSession {
        &self.extraction
    }

    /// Read-only copy handed to the generation provider.
    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    // -- settings -----------------------------------------------------------

    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential.filter(|c| !c.trim().is_empty());
    }

    pub fn set_style(&mut self, style: StylePreset) {
        self.style = style;
    }

    pub fn set_user_note(&mut self, note: Option<String>) {
        self.user_note = note.filter(|n| !n.trim().is_empty());
    }

    pub fn set_orientation(&mut self, orientation: CharacterOrientation) {
        self.orientation = orientation;
    }

    /// Keep the reference video's audio. Ignored by models without audio.
    pub fn set_keep_audio(&mut self, keep: bool) {
        self.keep_audio = keep && self.ctx.supports_audio;
    }

    pub fn set_negative_prompt(&mut self, negative: Option<String>) {
        self.negative_prompt = negative.filter(|n| !n.trim().is_empty());
    }

    /// Switch between one global video and per-scene videos.
    ///
    /// Videos attached under the mode being left are dropped.
    pub fn set_video_mode(&mut self, mode: VideoMode) {
        if mode == self.video_mode {
            return;
        }
        match mode {
            VideoMode::PerScene => self.global_video = None,
            VideoMode::Global => {
                let next = self
                    .queue
                    .ids()
                    .into_iter()
                    .fold(self.queue.clone(), |q, id| q.detach_scene_video(id));
                self.replace_queue(next);
            }
        }
        self.video_mode = mode;
    }

    /// Make a different catalog model active.
    ///
    /// Discards the queue, the global video, the negative prompt and any
    /// extracted frames, releasing their previews. Runs still in flight
    /// are discarded when they come back.
    pub fn switch_model(&mut self, key: &str) -> Result<(), CoreError> {
        let ctx = ModelContext::lookup(key)?;
        tracing::info!(from = %self.ctx.key, to = %ctx.key, "Switching active model");

        self.ctx = ctx;
        self.queue = SceneQueue::new();
        self.global_video = None;
        self.negative_prompt = None;
        self.keep_audio = false;
        self.orientation = CharacterOrientation::default();
        self.video_mode = VideoMode::default();
        self.over_budget = false;
        self.extraction = ExtractionSession {
            ticket: self.extraction.ticket.next(),
            ..Default::default()
        };
        self.motion.reset();
        Ok(())
    }

    // -- queue edits --------------------------------------------------------

    /// Swap in a new queue and warn once when it crosses the duration budget.
    pub(crate) fn replace_queue(&mut self, next: SceneQueue) {
        let overage = next.duration_overage(&self.ctx);
        self.queue = next;
        match overage {
            Some(secs) if !self.over_budget => {
                self.over_budget = true;
                let cap = self.ctx.max_total_duration_secs.unwrap_or_default();
                tracing::info!(overage_secs = secs, cap_secs = cap, "Queue over duration budget");
                self.publish(Notice::warning(format!(
                    "Total duration is {:.1}s over the {cap:.0}s limit of {}",
                    secs, self.ctx.display_name
                )));
            }
            Some(_) => {}
            None => self.over_budget = false,
        }
    }

    /// Create a scene from uploaded image bytes.
    pub fn add_image(&mut self, bytes: Vec<u8>, mime_type: &str) -> Result<SceneId, CoreError> {
        let image = ReferenceImage::new(bytes, mime_type, &self.previews)?;
        let next = self.queue.add_scene(&self.ctx, image)?;
        let id = next.scenes().last().map(|s| s.id).ok_or_else(|| {
            CoreError::Precondition("scene was not appended".to_string())
        })?;
        tracing::debug!(scene_id = %id, count = next.len(), "Scene added");
        self.replace_queue(next);
        Ok(id)
    }

    pub fn remove_scene(&mut self, id: SceneId) {
        let next = self.queue.remove_scene(id);
        self.replace_queue(next);
    }

    pub fn update_scene_prompt(&mut self, id: SceneId, text: &str) {
        let next = self.queue.update_scene_prompt(id, text);
        self.replace_queue(next);
    }

    pub fn toggle_use_prompt(&mut self, id: SceneId) {
        let next = self.queue.toggle_use_prompt(id);
        self.replace_queue(next);
    }

    pub fn update_scene_duration(&mut self, id: SceneId, secs: f64) {
        let next = self.queue.update_scene_duration(id, secs);
        self.replace_queue(next);
    }

    pub fn replace_scene_image(
        &mut self,
        id: SceneId,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<(), CoreError> {
        if self.queue.get(id).is_none() {
            return Err(CoreError::NotFound {
                entity: "scene",
                id: id.to_string(),
            });
        }
        let image = ReferenceImage::new(bytes, mime_type, &self.previews)?;
        let next = self.queue.replace_scene_image(id, image);
        self.replace_queue(next);
        Ok(())
    }

    pub fn clear_scene_image(&mut self, id: SceneId) {
        let next = self.queue.clear_scene_image(id);
        self.replace_queue(next);
    }

    pub fn copy_image_between(&mut self, from: SceneId, to: SceneId) {
        let next = self.queue.copy_image_between(from, to, &self.previews);
        self.replace_queue(next);
    }

    pub fn detach_scene_video(&mut self, id: SceneId) {
        let next = self.queue.detach_scene_video(id);
        self.replace_queue(next);
    }

    // -- reference videos ---------------------------------------------------

    /// Attach a screened video to its target slot.
    ///
    /// Fails when the model changed since screening or the target does not
    /// match the current [`VideoMode`].
    pub fn attach_video(&mut self, admitted: AdmittedVideo) -> Result<VideoId, CoreError> {
        if admitted.model_key != self.ctx.key {
            return Err(CoreError::Precondition(format!(
                "video was admitted for {} but the active model is {}",
                admitted.model_key, self.ctx.key
            )));
        }
        let id = admitted.video.id();
        match (admitted.target, self.video_mode) {
            (VideoTarget::Global, VideoMode::Global) => {
                self.global_video = Some(admitted.video);
            }
            (VideoTarget::Scene(scene_id), VideoMode::PerScene) => {
                let next = self
                    .queue
                    .attach_scene_video(&self.ctx, scene_id, admitted.video)?;
                self.replace_queue(next);
            }
            (target, mode) => {
                return Err(CoreError::Precondition(format!(
                    "cannot attach to {target:?} while in {mode:?} video mode"
                )));
            }
        }
        tracing::info!(
            video_id = %id,
            slot = ?admitted.target,
            trimmed = admitted.trimmed,
            "Reference video attached",
        );
        Ok(id)
    }

    pub fn clear_global_video(&mut self) {
        self.global_video = None;
    }

    /// Screen an upload and attach it in one step.
    pub async fn admit_video(
        &mut self,
        probe: &dyn MediaProbe,
        trimmer: &dyn VideoTrimmer,
        upload: VideoUpload,
        target: VideoTarget,
    ) -> Result<VideoId, CoreError> {
        let ctx = self.ctx.clone();
        let previews = self.previews.clone();
        let admitted = intake::screen_video(
            probe,
            trimmer,
            upload,
            target,
            &ctx,
            self.orientation,
            &previews,
        )
        .await?;
        self.attach_video(admitted)
    }

    // -- frame extraction ---------------------------------------------------

    /// Start a new extraction run. Results of older runs are discarded.
    pub fn begin_extraction(&mut self) -> Ticket {
        self.extraction.ticket = self.extraction.ticket.next();
        self.extraction.ticket
    }

    /// Hand an extraction result back to the store.
    ///
    /// The frames replace the previous session's frames. A failure clears
    /// them and is returned; the queue and admitted media are untouched.
    pub fn finish_extraction(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<ExtractedFrame>, CoreError>,
    ) -> Result<RunOutcome<usize>, CoreError> {
        if ticket != self.extraction.ticket {
            tracing::debug!(
                ?ticket,
                latest = ?self.extraction.ticket,
                "Discarding stale extraction",
            );
            return Ok(RunOutcome::Discarded);
        }
        self.extraction.primary_index = 0;
        match result {
            Ok(frames) => {
                let count = frames.len();
                self.extraction.frames = frames;
                tracing::debug!(count, "Frames extracted");
                Ok(RunOutcome::Applied(count))
            }
            Err(e) => {
                self.extraction.frames = Vec::new();
                tracing::warn!(error = %e, "Frame extraction failed");
                Err(e)
            }
        }
    }

    /// Extract a clip window in one step.
    ///
    /// `length_secs` defaults to [`DEFAULT_CLIP_LENGTH_SECS`].
    pub async fn extract_frames(
        &mut self,
        extractor: &dyn FrameExtractor,
        path: &Path,
        total_secs: f64,
        start_secs: f64,
        length_secs: Option<f64>,
    ) -> Result<RunOutcome<usize>, CoreError> {
        let ticket = self.begin_extraction();
        let previews = self.previews.clone();
        let result = extraction::extract_frames(
            extractor,
            path,
            total_secs,
            start_secs,
            length_secs.unwrap_or(DEFAULT_CLIP_LENGTH_SECS),
            &previews,
        )
        .await;
        self.finish_extraction(ticket, result)
    }

    pub fn select_primary(&mut self, index: usize) -> Result<(), CoreError> {
        if index >= self.extraction.frames.len() {
            return Err(CoreError::Precondition(format!(
                "frame {index} out of range for {} extracted frames",
                self.extraction.frames.len()
            )));
        }
        self.extraction.primary_index = index;
        Ok(())
    }

    /// Turn the extracted frames into new scenes, primary frame first.
    ///
    /// All or nothing against the scene cap. The session's frames are
    /// consumed on success.
    pub fn convert_frames_to_scenes(&mut self) -> Result<Vec<SceneId>, CoreError> {
        let images = extraction::to_reference_images(
            &self.extraction.frames,
            self.extraction.primary_index,
            &self.previews,
        )?;
        let added = images.len();
        let next = self.queue.add_scenes(&self.ctx, images)?;
        let ids: Vec<SceneId> = next.ids().into_iter().skip(next.len() - added).collect();
        self.replace_queue(next);
        self.extraction.frames = Vec::new();
        self.extraction.primary_index = 0;
        tracing::info!(count = ids.len(), "Frames converted to scenes");
        Ok(ids)
    }

    // -- notices ------------------------------------------------------------

    pub(crate) fn publish(&self, notice: Notice) {
        self.notices.publish(notice);
    }
}
