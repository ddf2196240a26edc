//! The auto-motion state machine.
//!
//! A run goes through three phases:
//!
//! 1. [`Studio::prepare_motion`] gates the run and snapshots the request.
//!    Nothing is sent and nothing changes when a gate fails.
//! 2. [`PendingMotionRun::execute`] talks to the motion director without
//!    borrowing the store, so the queue stays editable meanwhile.
//! 3. [`Studio::apply_motion`] reconciles the complete response into the
//!    queue, or reports the failure and leaves the queue as it was.
//!
//! Each prepared run gets a new [`Ticket`]; a result whose ticket is no
//! longer the latest is discarded.
//!
//! The director numbers scenes by their position in the image list it was
//! sent. Every run carries the ids of those scenes so its indices can be
//! resolved after the queue has moved on; a refinement reuses the list of
//! the session it refines.

use std::path::PathBuf;

use sceneforge_core::error::CoreError;
use sceneforge_core::model_context::CharacterOrientation;
use sceneforge_core::motion::{self, ReconcileReport};
use sceneforge_core::types::SceneId;
use sceneforge_director::request::select_pipeline;
use sceneforge_director::{
    DirectorResponse, MediaInput, MotionControlInput, MotionDirector, MotionRequest, PipelineKind,
    RefineRequest,
};

use crate::notice::Notice;
use crate::store::{RunOutcome, Studio, Ticket};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub enum AutoMotionState {
    #[default]
    Idle,
    Gating,
    Requesting { ticket: Ticket },
    Reconciling,
    /// The last attempt failed. Held until the next run starts, which
    /// leaves it through `Gating` like `Idle` does.
    Failed { message: String },
}

impl AutoMotionState {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Gating => "gating",
            Self::Requesting { .. } => "requesting",
            Self::Reconciling => "reconciling",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A director session: its id and the scenes it was sent, by index.
#[derive(Debug, Clone)]
struct MotionSession {
    id: String,
    scenes: Vec<SceneId>,
}

/// Auto-motion bookkeeping owned by the store.
#[derive(Debug, Default)]
pub(crate) struct MotionTracker {
    state: AutoMotionState,
    latest: Ticket,
    /// Session of the last applied run, used for refinements.
    session: Option<MotionSession>,
}

impl MotionTracker {
    fn transition(&mut self, next: AutoMotionState) {
        tracing::debug!(from = self.state.name(), to = next.name(), "Auto motion transition");
        self.state = next;
    }

    /// Forget the session and orphan any run in flight.
    pub(crate) fn reset(&mut self) {
        self.latest = self.latest.next();
        self.session = None;
        self.transition(AutoMotionState::Idle);
    }
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PendingVideo {
    path: PathBuf,
    mime_type: String,
    orientation: CharacterOrientation,
    keep_original_sound: bool,
}

#[derive(Debug, Clone)]
enum MotionCall {
    /// `request.motion_control` is filled in from `video` at execution.
    Generate {
        request: MotionRequest,
        video: Option<PendingVideo>,
    },
    Refine(RefineRequest),
}

/// A gated run, ready to be sent.
#[derive(Debug, Clone)]
pub struct PendingMotionRun {
    ticket: Ticket,
    api_key: String,
    /// `sent[i]` is the scene behind director index `i`.
    sent: Vec<SceneId>,
    call: MotionCall,
}

impl PendingMotionRun {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Pipeline the request will use; `None` for refinements.
    pub fn pipeline(&self) -> Option<PipelineKind> {
        match &self.call {
            MotionCall::Generate { video: Some(_), .. } => Some(PipelineKind::MotionControl),
            MotionCall::Generate { video: None, .. } => Some(PipelineKind::ImageOnly),
            MotionCall::Refine(_) => None,
        }
    }

    /// Send the run to the director and wait for the complete response.
    pub async fn execute(self, director: &dyn MotionDirector) -> MotionRunResult {
        let result = match self.call {
            MotionCall::Generate { request, video } => {
                match with_reference_video(request, video).await {
                    Ok(request) => director
                        .generate(&self.api_key, &request)
                        .await
                        .map_err(CoreError::from),
                    Err(e) => Err(e),
                }
            }
            MotionCall::Refine(request) => director
                .refine(&self.api_key, &request)
                .await
                .map_err(CoreError::from),
        };
        MotionRunResult {
            ticket: self.ticket,
            sent: self.sent,
            result,
        }
    }
}

async fn with_reference_video(
    mut request: MotionRequest,
    video: Option<PendingVideo>,
) -> Result<MotionRequest, CoreError> {
    if let Some(video) = video {
        let bytes = tokio::fs::read(&video.path).await.map_err(|e| {
            CoreError::Precondition(format!(
                "reference video {} is unreadable: {e}",
                video.path.display()
            ))
        })?;
        request.motion_control = Some(MotionControlInput {
            video: MediaInput {
                bytes: bytes.into(),
                mime_type: video.mime_type,
            },
            orientation: video.orientation,
            keep_original_sound: video.keep_original_sound,
        });
    }
    Ok(request)
}

/// The complete outcome of one executed run.
#[derive(Debug)]
pub struct MotionRunResult {
    pub ticket: Ticket,
    sent: Vec<SceneId>,
    pub result: Result<DirectorResponse, CoreError>,
}

// ---------------------------------------------------------------------------
// Studio integration
// ---------------------------------------------------------------------------

impl Studio {
    pub fn motion_state(&self) -> &AutoMotionState {
        &self.motion.state
    }

    /// Director session available for refinement, if any.
    pub fn motion_session(&self) -> Option<&str> {
        self.motion.session.as_ref().map(|s| s.id.as_str())
    }

    /// Gate an auto-motion run and snapshot its request.
    ///
    /// Fails with [`CoreError::Precondition`] when there is no credential,
    /// no scene with an image, or the model does not support auto motion,
    /// and with [`CoreError::UnsupportedModel`] when no request shape fits
    /// the model and reference video combination.
    pub fn prepare_motion(&mut self) -> Result<PendingMotionRun, CoreError> {
        self.gated(|studio| {
            let api_key = studio.require_credential()?;
            let (sent, images): (Vec<SceneId>, Vec<MediaInput>) = studio
                .queue
                .scenes()
                .iter()
                .filter_map(|s| {
                    let image = s.reference_image.as_ref()?;
                    let input = MediaInput {
                        bytes: image.shared_bytes(),
                        mime_type: image.mime_type().to_string(),
                    };
                    Some((s.id, input))
                })
                .unzip();
            if images.is_empty() {
                return Err(CoreError::Precondition(
                    "Add at least one scene with a reference image first".to_string(),
                ));
            }
            studio.require_auto_motion()?;

            let pipeline = select_pipeline(&studio.ctx, studio.global_video.is_some())?;
            let video = match (pipeline, studio.global_video.as_ref()) {
                (PipelineKind::MotionControl, Some(video)) => Some(PendingVideo {
                    path: video.path().to_path_buf(),
                    mime_type: video.mime_type().to_string(),
                    orientation: studio.orientation,
                    keep_original_sound: studio.keep_audio,
                }),
                _ => None,
            };

            let request = MotionRequest {
                images,
                style_preset: studio.style,
                user_note: studio.user_note.clone(),
                motion_control: None,
            };
            request.validate()?;

            Ok((api_key, sent, MotionCall::Generate { request, video }))
        })
    }

    /// Gate a refinement of the last applied run, optionally focused on
    /// one scene. The scene must have been part of that run.
    pub fn prepare_refine(
        &mut self,
        message: &str,
        scene: Option<SceneId>,
    ) -> Result<PendingMotionRun, CoreError> {
        self.gated(|studio| {
            let api_key = studio.require_credential()?;
            studio.require_auto_motion()?;
            let session = studio.motion.session.clone().ok_or_else(|| {
                CoreError::Precondition("Run auto motion before refining it".to_string())
            })?;
            if message.trim().is_empty() {
                return Err(CoreError::Precondition(
                    "Refinement message must not be empty".to_string(),
                ));
            }
            let scene_index = scene
                .map(|id| {
                    session.scenes.iter().position(|&s| s == id).ok_or_else(|| {
                        CoreError::Precondition(format!(
                            "scene {id} was not part of the auto motion run"
                        ))
                    })
                })
                .transpose()?;
            let request = RefineRequest {
                session_id: session.id,
                message: message.trim().to_string(),
                scene_index,
            };
            Ok((api_key, session.scenes, MotionCall::Refine(request)))
        })
    }

    /// Reconcile an executed run into the store.
    ///
    /// A stale run is discarded. A failed run publishes a transient error
    /// notice and is returned as the error; the queue is untouched.
    pub fn apply_motion(
        &mut self,
        run: MotionRunResult,
    ) -> Result<RunOutcome<ReconcileReport>, CoreError> {
        if run.ticket != self.motion.latest {
            tracing::info!(
                ticket = ?run.ticket,
                latest = ?self.motion.latest,
                "Discarding stale auto motion result",
            );
            return Ok(RunOutcome::Discarded);
        }

        let response = match run.result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Auto motion failed");
                self.motion.transition(AutoMotionState::Failed {
                    message: e.to_string(),
                });
                self.publish(
                    Notice::error(format!("Auto motion failed: {e}"))
                        .dismiss_after(self.notice_dismiss_after),
                );
                return Err(e);
            }
        };

        self.motion.transition(AutoMotionState::Reconciling);
        let reconciled = motion::reconcile(&self.queue, &run.sent, &response.result);
        self.replace_queue(reconciled.queue);

        if let Some(negative) = reconciled.negative_prompt {
            self.publish(Notice::info(format!(
                "The negative prompt for all scenes was updated by auto motion: {negative}"
            )));
            self.negative_prompt = Some(negative);
        }

        let report = reconciled.report;
        tracing::info!(
            session_id = %response.session_id,
            applied = report.prompts_applied.len(),
            skipped = report.skipped_indices.len(),
            reordered = report.reordered,
            "Auto motion applied",
        );
        if let Some(reasoning) = report.order_reasoning.as_deref().filter(|_| report.reordered) {
            tracing::debug!(reasoning, "Scenes reordered");
        }

        self.motion.session = Some(MotionSession {
            id: response.session_id,
            scenes: run.sent,
        });
        self.motion.transition(AutoMotionState::Idle);
        Ok(RunOutcome::Applied(report))
    }

    /// Prepare, execute and apply one auto-motion run.
    pub async fn auto_motion(
        &mut self,
        director: &dyn MotionDirector,
    ) -> Result<RunOutcome<ReconcileReport>, CoreError> {
        let run = self.prepare_motion()?;
        let result = run.execute(director).await;
        self.apply_motion(result)
    }

    /// Prepare, execute and apply one refinement.
    pub async fn refine_motion(
        &mut self,
        director: &dyn MotionDirector,
        message: &str,
        scene: Option<SceneId>,
    ) -> Result<RunOutcome<ReconcileReport>, CoreError> {
        let run = self.prepare_refine(message, scene)?;
        let result = run.execute(director).await;
        self.apply_motion(result)
    }

    // ---- private helpers ----

    /// Run `gate` in the gating state. On failure the previous state is
    /// restored; on success a new ticket is issued.
    fn gated(
        &mut self,
        gate: impl FnOnce(&Studio) -> Result<(String, Vec<SceneId>, MotionCall), CoreError>,
    ) -> Result<PendingMotionRun, CoreError> {
        let previous = self.motion.state.clone();
        self.motion.transition(AutoMotionState::Gating);
        let (api_key, sent, call) = match gate(&*self) {
            Ok(gated) => gated,
            Err(e) => {
                tracing::debug!(error = %e, "Auto motion gate failed");
                self.motion.transition(previous);
                return Err(e);
            }
        };
        self.motion.latest = self.motion.latest.next();
        let ticket = self.motion.latest;
        self.motion.transition(AutoMotionState::Requesting { ticket });
        Ok(PendingMotionRun {
            ticket,
            api_key,
            sent,
            call,
        })
    }

    fn require_credential(&self) -> Result<String, CoreError> {
        self.credential.clone().ok_or_else(|| {
            CoreError::Precondition("No motion director credential configured".to_string())
        })
    }

    fn require_auto_motion(&self) -> Result<(), CoreError> {
        if self.ctx.supports_auto_motion {
            Ok(())
        } else {
            Err(CoreError::Precondition(format!(
                "{} does not support auto motion",
                self.ctx.display_name
            )))
        }
    }
}
