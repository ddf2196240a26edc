//! Sequential batch submission to the generation provider.
//!
//! One request per scene with an effective prompt, in queue order, with a
//! fixed pause between requests. No concurrency and no retries: a failed
//! scene is recorded and the batch moves on.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use sceneforge_core::error::CoreError;
use sceneforge_core::scene_queue::{QueueSnapshot, SceneSnapshot};
use sceneforge_core::types::{SceneId, Timestamp};

use crate::notice::Notice;
use crate::store::Studio;

/// The image/video generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Submit one scene; returns the provider's job id.
    async fn submit(&self, scene: &SceneSnapshot) -> Result<String, CoreError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Submitted { job_id: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRecord {
    pub scene_id: SceneId,
    pub submitted_at: Timestamp,
    pub outcome: SubmissionOutcome,
}

/// Submit every scene of `snapshot` that carries a prompt.
pub async fn submit_batch(
    snapshot: &QueueSnapshot,
    provider: &dyn GenerationProvider,
    delay: Duration,
) -> Vec<SubmissionRecord> {
    let eligible: Vec<&SceneSnapshot> = snapshot
        .scenes
        .iter()
        .filter(|s| s.prompt.is_some())
        .collect();
    tracing::info!(
        eligible = eligible.len(),
        skipped = snapshot.scenes.len() - eligible.len(),
        "Submitting batch",
    );

    let mut records = Vec::with_capacity(eligible.len());
    for (i, scene) in eligible.into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let submitted_at = Utc::now();
        let outcome = match provider.submit(scene).await {
            Ok(job_id) => {
                tracing::debug!(scene_id = %scene.scene_id, %job_id, "Scene submitted");
                SubmissionOutcome::Submitted { job_id }
            }
            Err(e) => {
                tracing::warn!(scene_id = %scene.scene_id, error = %e, "Scene submission failed");
                SubmissionOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        records.push(SubmissionRecord {
            scene_id: scene.scene_id,
            submitted_at,
            outcome,
        });
    }
    records
}

impl Studio {
    /// Submit the current queue.
    ///
    /// A queue over the model's duration budget is still submitted, with a
    /// warning; the provider decides what to do with the overage.
    pub async fn submit_queue(
        &self,
        provider: &dyn GenerationProvider,
        delay: Duration,
    ) -> Vec<SubmissionRecord> {
        if let Some(overage) = self.queue.duration_overage(&self.ctx) {
            tracing::warn!(overage_secs = overage, "Submitting a queue over its duration budget");
            self.publish(Notice::warning(format!(
                "Submitting {overage:.1}s over the duration limit of {}",
                self.ctx.display_name
            )));
        }
        submit_batch(&self.snapshot(), provider, delay).await
    }
}
