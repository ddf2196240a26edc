//! Motion director results and their reconciliation into the scene queue.
//!
//! The director indexes scenes by their position in the image list it was
//! sent, not by queue position. Reconciliation resolves those indices
//! through the sent scene ids and applies three steps to a fresh copy of
//! the queue:
//!
//! 1. prompt fill, skipping scenes that are gone or lost their image
//! 2. a batch-wide negative-prompt merge that replaces the model-wide setting
//! 3. the recommended reorder, only when it covers the whole queue

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::reorder::apply_permutation;
use crate::scene_queue::SceneQueue;
use crate::types::SceneId;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One per-scene suggestion from the motion director.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionItem {
    pub scene_index: usize,
    pub motion_prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

/// A complete, batched motion director response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionDirectorResult {
    pub items: Vec<MotionItem>,
    #[serde(default)]
    pub recommended_order: Option<Vec<usize>>,
    #[serde(default)]
    pub order_reasoning: Option<String>,
}

// ---------------------------------------------------------------------------
// Negative prompt merge
// ---------------------------------------------------------------------------

/// Merge comma-separated negative prompts into one deduplicated setting.
///
/// Tokens are trimmed and lower-cased; empty tokens are dropped. The
/// output keeps first-seen order. Returns `None` when no token survives.
pub fn merge_negative_prompts<'a, I>(prompts: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for prompt in prompts {
        for token in prompt.split(',') {
            let token = token.trim().to_lowercase();
            if !token.is_empty() && seen.insert(token.clone()) {
                tokens.push(token);
            }
        }
    }
    (!tokens.is_empty()).then(|| tokens.join(", "))
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// What a reconciliation pass changed.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReconcileReport {
    /// Scenes whose prompt was filled, in response order.
    pub prompts_applied: Vec<SceneId>,
    /// Response indices that were not applied: unknown, empty prompt, or
    /// the scene was removed or lost its image.
    pub skipped_indices: Vec<usize>,
    pub negative_prompt_changed: bool,
    pub reordered: bool,
    pub order_reasoning: Option<String>,
}

/// The outcome of reconciling one response against the current queue.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub queue: SceneQueue,
    /// Replacement for the model-wide negative prompt, if any token was produced.
    pub negative_prompt: Option<String>,
    pub report: ReconcileReport,
}

/// Apply a complete motion director response to `queue`.
///
/// `sent[i]` is the scene whose image was at position `i` of the request.
/// `queue` itself is not modified; the caller swaps in
/// [`Reconciled::queue`] and, when present, [`Reconciled::negative_prompt`].
pub fn reconcile(
    queue: &SceneQueue,
    sent: &[SceneId],
    result: &MotionDirectorResult,
) -> Reconciled {
    let mut report = ReconcileReport {
        order_reasoning: result.order_reasoning.clone(),
        ..Default::default()
    };

    let mut filled = queue.clone();
    for item in &result.items {
        let prompt = item.motion_prompt.trim();
        let target = sent
            .get(item.scene_index)
            .copied()
            .filter(|_| !prompt.is_empty());
        match target {
            Some(id) if filled.fill_prompt(id, prompt) => report.prompts_applied.push(id),
            _ => report.skipped_indices.push(item.scene_index),
        }
    }

    let negative_prompt = merge_negative_prompts(
        result
            .items
            .iter()
            .filter_map(|i| i.negative_prompt.as_deref()),
    );
    report.negative_prompt_changed = negative_prompt.is_some();

    let reordered = result
        .recommended_order
        .as_deref()
        .and_then(|order| queue_positions(&filled, sent, order))
        .and_then(|positions| apply_permutation(&filled, &positions).ok());
    let queue = match reordered {
        Some(reordered) => {
            report.reordered = true;
            reordered
        }
        None => filled,
    };

    Reconciled {
        queue,
        negative_prompt,
        report,
    }
}

/// Translate a recommended order over sent indices into queue positions.
///
/// `None` when an entry is unknown or its scene has left the queue; a
/// result shorter than the queue is rejected by `apply_permutation`.
fn queue_positions(queue: &SceneQueue, sent: &[SceneId], order: &[usize]) -> Option<Vec<usize>> {
    order
        .iter()
        .map(|&i| sent.get(i).and_then(|&id| queue.position(id)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
