//! Queue ordering operations: move, shuffle, explicit order, reverse, and
//! permutation.
//!
//! Each function returns a new queue, or [`ReorderNoop`] when the request
//! is out of bounds or degenerate. Callers keep their current queue on
//! `Err`.

use std::collections::HashSet;

use rand::Rng;

use crate::error::ReorderNoop;
use crate::scene_queue::SceneQueue;
use crate::types::SceneId;

/// Move the scene at `from` to `to` (remove, then insert).
///
/// Scenes between the two positions shift by exactly one.
pub fn move_scene(queue: &SceneQueue, from: usize, to: usize) -> Result<SceneQueue, ReorderNoop> {
    let len = queue.len();
    if from >= len || to >= len || from == to {
        return Err(ReorderNoop);
    }
    let mut scenes = queue.scenes().to_vec();
    let scene = scenes.remove(from);
    scenes.insert(to, scene);
    Ok(SceneQueue::from_scenes(scenes))
}

/// Fisher-Yates shuffle over the whole queue using the supplied RNG.
pub fn shuffle<R: Rng>(queue: &SceneQueue, rng: &mut R) -> Result<SceneQueue, ReorderNoop> {
    if queue.len() <= 1 {
        return Err(ReorderNoop);
    }
    let mut scenes = queue.scenes().to_vec();
    for i in (1..scenes.len()).rev() {
        let j = rng.random_range(0..=i);
        scenes.swap(i, j);
    }
    Ok(SceneQueue::from_scenes(scenes))
}

/// Put the listed scenes first, in the given order, followed by every
/// other scene in its current relative order.
///
/// Unknown and repeated ids are ignored. Returns [`ReorderNoop`] when no
/// listed id matches a scene.
pub fn set_order(queue: &SceneQueue, ids: &[SceneId]) -> Result<SceneQueue, ReorderNoop> {
    let mut placed: HashSet<SceneId> = HashSet::new();
    let mut scenes = Vec::with_capacity(queue.len());

    for id in ids {
        if placed.contains(id) {
            continue;
        }
        if let Some(scene) = queue.get(*id) {
            placed.insert(*id);
            scenes.push(scene.clone());
        }
    }
    if placed.is_empty() {
        return Err(ReorderNoop);
    }

    scenes.extend(
        queue
            .scenes()
            .iter()
            .filter(|s| !placed.contains(&s.id))
            .cloned(),
    );
    Ok(SceneQueue::from_scenes(scenes))
}

/// Reverse the whole queue.
pub fn reverse(queue: &SceneQueue) -> Result<SceneQueue, ReorderNoop> {
    if queue.len() <= 1 {
        return Err(ReorderNoop);
    }
    let mut scenes = queue.scenes().to_vec();
    scenes.reverse();
    Ok(SceneQueue::from_scenes(scenes))
}

/// Re-project the queue through `order`, where `order[i]` is the current
/// position of the scene that should end up at position `i`.
///
/// `order` must be a full bijection over `0..len`; any length mismatch,
/// out-of-range entry, or duplicate leaves the queue untouched.
pub fn apply_permutation(queue: &SceneQueue, order: &[usize]) -> Result<SceneQueue, ReorderNoop> {
    let len = queue.len();
    if order.len() != len || len == 0 {
        return Err(ReorderNoop);
    }
    let mut seen = vec![false; len];
    for &pos in order {
        if pos >= len || seen[pos] {
            return Err(ReorderNoop);
        }
        seen[pos] = true;
    }
    let scenes = order.iter().map(|&pos| queue.scenes()[pos].clone()).collect();
    Ok(SceneQueue::from_scenes(scenes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::media::{PreviewRegistry, ReferenceImage};
    use crate::model_context::{ModelContext, MODEL_KLING_PRO};

    fn queue(n: usize) -> SceneQueue {
        let previews = PreviewRegistry::new();
        let ctx = ModelContext::lookup(MODEL_KLING_PRO).unwrap();
        (0..n).fold(SceneQueue::new(), |q, i| {
            let img = ReferenceImage::new(vec![i as u8 + 1], "image/png", &previews).unwrap();
            q.add_scene(&ctx, img).unwrap()
        })
    }

    // -- move_scene ---------------------------------------------------------

    #[test]
    fn move_forward_shifts_intermediate_scenes_back() {
        let q = queue(5);
        let ids = q.ids();
        let moved = move_scene(&q, 1, 3).unwrap();
        assert_eq!(moved.ids(), vec![ids[0], ids[2], ids[3], ids[1], ids[4]]);
    }

    #[test]
    fn move_backward_shifts_intermediate_scenes_forward() {
        let q = queue(5);
        let ids = q.ids();
        let moved = move_scene(&q, 3, 1).unwrap();
        assert_eq!(moved.ids(), vec![ids[0], ids[3], ids[1], ids[2], ids[4]]);
    }

    #[test]
    fn move_there_and_back_restores_order() {
        let q = queue(6);
        for (a, b) in [(0, 5), (2, 4), (5, 1), (3, 0)] {
            let there = move_scene(&q, a, b).unwrap();
            let back = move_scene(&there, b, a).unwrap();
            assert_eq!(back.ids(), q.ids());
        }
    }

    #[test]
    fn move_out_of_bounds_is_noop() {
        let q = queue(3);
        assert_eq!(move_scene(&q, 3, 0).unwrap_err(), ReorderNoop);
        assert_eq!(move_scene(&q, 0, 3).unwrap_err(), ReorderNoop);
        assert_eq!(move_scene(&q, 1, 1).unwrap_err(), ReorderNoop);
    }

    // -- shuffle ------------------------------------------------------------

    #[test]
    fn shuffle_preserves_the_set_of_scenes() {
        let q = queue(8);
        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = shuffle(&q, &mut rng).unwrap();
        let mut before = q.ids();
        let mut after = shuffled.ids();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn shuffle_single_scene_is_noop() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(shuffle(&queue(1), &mut rng).is_err());
        assert!(shuffle(&queue(0), &mut rng).is_err());
    }

    #[test]
    fn shuffle_positions_are_roughly_uniform() {
        let q = queue(4);
        let first = q.ids()[0];
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<usize, u32> = HashMap::new();
        let runs = 8_000;
        for _ in 0..runs {
            let s = shuffle(&q, &mut rng).unwrap();
            let pos = s.position(first).unwrap();
            *counts.entry(pos).or_default() += 1;
        }
        // Expect ~2000 per position; allow a generous band.
        for pos in 0..4 {
            let c = counts.get(&pos).copied().unwrap_or(0);
            assert!((1_700..=2_300).contains(&c), "position {pos} hit {c} times");
        }
    }

    // -- set_order ----------------------------------------------------------

    #[test]
    fn set_order_places_subset_first_then_rest_in_order() {
        let q = queue(5);
        let ids = q.ids();
        let ordered = set_order(&q, &[ids[3], ids[1]]).unwrap();
        assert_eq!(ordered.ids(), vec![ids[3], ids[1], ids[0], ids[2], ids[4]]);
    }

    #[test]
    fn set_order_ignores_duplicates_and_unknown_ids() {
        let q = queue(3);
        let ids = q.ids();
        let ordered = set_order(&q, &[ids[2], SceneId::new(), ids[2], ids[0]]).unwrap();
        assert_eq!(ordered.ids(), vec![ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn set_order_with_only_unknown_ids_is_noop() {
        let q = queue(3);
        assert!(set_order(&q, &[SceneId::new()]).is_err());
    }

    // -- reverse ------------------------------------------------------------

    #[test]
    fn reverse_flips_order() {
        let q = queue(3);
        let ids = q.ids();
        assert_eq!(reverse(&q).unwrap().ids(), vec![ids[2], ids[1], ids[0]]);
    }

    // -- apply_permutation --------------------------------------------------

    #[test]
    fn permutation_reprojects_positions() {
        let q = queue(3);
        let ids = q.ids();
        let p = apply_permutation(&q, &[2, 0, 1]).unwrap();
        assert_eq!(p.ids(), vec![ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn permutation_length_mismatch_is_noop() {
        let q = queue(3);
        assert!(apply_permutation(&q, &[1, 0]).is_err());
        assert!(apply_permutation(&q, &[1, 0, 2, 3]).is_err());
    }

    #[test]
    fn permutation_must_be_a_bijection() {
        let q = queue(3);
        assert!(apply_permutation(&q, &[0, 0, 1]).is_err());
        assert!(apply_permutation(&q, &[0, 1, 7]).is_err());
    }
}
