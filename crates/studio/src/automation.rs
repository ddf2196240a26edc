//! Queue ordering surface for external controllers.
//!
//! Scripts and test harnesses drive scene order through [`QueueControl`]
//! instead of UI gestures. Every method returns whether the order changed;
//! degenerate requests (out-of-range moves, single-scene shuffles, unknown
//! ids) leave the queue as it is and return `false`.

use rand::RngCore;

use sceneforge_core::error::ReorderNoop;
use sceneforge_core::reorder;
use sceneforge_core::scene_queue::{SceneQueue, SceneSnapshot};
use sceneforge_core::types::SceneId;

use crate::store::Studio;

pub trait QueueControl {
    /// Current scenes in queue order.
    fn scenes(&self) -> Vec<SceneSnapshot>;

    /// Uniformly random permutation drawn from `rng`.
    fn shuffle(&mut self, rng: &mut dyn RngCore) -> bool;

    /// Move the scene at `from` to `to`, shifting the scenes between.
    fn move_scene(&mut self, from: usize, to: usize) -> bool;

    /// Put `ids` first in the given order, then everything else as it was.
    fn set_order(&mut self, ids: &[SceneId]) -> bool;

    fn reverse(&mut self) -> bool;
}

impl Studio {
    fn apply_reorder(&mut self, op: &'static str, result: Result<SceneQueue, ReorderNoop>) -> bool {
        match result {
            Ok(next) => {
                tracing::debug!(op, count = next.len(), "Queue reordered");
                self.replace_queue(next);
                true
            }
            Err(ReorderNoop) => {
                tracing::debug!(op, "Reorder was a no-op");
                false
            }
        }
    }
}

impl QueueControl for Studio {
    fn scenes(&self) -> Vec<SceneSnapshot> {
        self.queue.snapshot().scenes
    }

    fn shuffle(&mut self, mut rng: &mut dyn RngCore) -> bool {
        let result = reorder::shuffle(&self.queue, &mut rng);
        self.apply_reorder("shuffle", result)
    }

    fn move_scene(&mut self, from: usize, to: usize) -> bool {
        let result = reorder::move_scene(&self.queue, from, to);
        self.apply_reorder("move_scene", result)
    }

    fn set_order(&mut self, ids: &[SceneId]) -> bool {
        let result = reorder::set_order(&self.queue, ids);
        self.apply_reorder("set_order", result)
    }

    fn reverse(&mut self) -> bool {
        let result = reorder::reverse(&self.queue);
        self.apply_reorder("reverse", result)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sceneforge_core::model_context::{ModelContext, MODEL_KLING_PRO};

    use super::*;
    use crate::notice::NoticeBus;

    fn studio_with(n: usize) -> Studio {
        let ctx = ModelContext::lookup(MODEL_KLING_PRO).unwrap();
        let mut studio = Studio::new(ctx, NoticeBus::default());
        for i in 0..n {
            studio.add_image(vec![i as u8 + 1], "image/jpeg").unwrap();
        }
        studio
    }

    fn order(control: &dyn QueueControl) -> Vec<SceneId> {
        control.scenes().into_iter().map(|s| s.scene_id).collect()
    }

    /// Drives the queue only through the trait object.
    fn scripted(control: &mut dyn QueueControl) -> Vec<bool> {
        let ids = order(control);
        vec![
            control.move_scene(0, 2),
            control.move_scene(2, 0),
            control.move_scene(0, 9),
            control.set_order(&[ids[3], ids[1]]),
            control.reverse(),
        ]
    }

    #[test]
    fn harness_drives_order_through_trait_object() {
        let mut studio = studio_with(4);
        let ids = studio.queue().ids();

        let changed = scripted(&mut studio);
        assert_eq!(changed, vec![true, true, false, true, true]);
        // set_order gives [3, 1, 0, 2]; reverse gives [2, 0, 1, 3].
        assert_eq!(order(&studio), vec![ids[2], ids[0], ids[1], ids[3]]);
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let mut a = studio_with(6);
        let ctx = ModelContext::lookup(MODEL_KLING_PRO).unwrap();
        let mut b = Studio::new(ctx, NoticeBus::default());
        b.replace_queue(a.queue().clone());

        a.shuffle(&mut StdRng::seed_from_u64(7));
        b.shuffle(&mut StdRng::seed_from_u64(7));
        assert_eq!(order(&a), order(&b));

        let mut sorted = order(&a);
        sorted.sort();
        let mut original = b.queue().ids();
        original.sort();
        assert_eq!(sorted, original);
    }

    #[test]
    fn single_scene_shuffle_is_noop() {
        let mut studio = studio_with(1);
        assert!(!studio.shuffle(&mut StdRng::seed_from_u64(1)));
    }

    #[test]
    fn unknown_ids_leave_order() {
        let mut studio = studio_with(3);
        let before = studio.queue().ids();
        assert!(!studio.set_order(&[SceneId::new()]));
        assert_eq!(studio.queue().ids(), before);
    }
}
