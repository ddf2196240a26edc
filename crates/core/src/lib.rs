//! Scene composition domain logic.
//!
//! Pure, synchronous building blocks for the scene queue and the media
//! that anchors it, plus the boundary traits and ffmpeg-backed
//! implementations of the media collaborators.

pub mod admission;
pub mod codec;
pub mod error;
pub mod extraction;
pub mod ffmpeg;
pub mod media;
pub mod model_context;
pub mod motion;
pub mod reorder;
pub mod scene_queue;
pub mod style;
pub mod types;
