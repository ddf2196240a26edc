//! The studio: a single store over the scene queue and its collaborators.
//!
//! Wires the pure domain logic of `sceneforge-core` to the motion
//! director client, the media collaborators and the generation provider.

pub mod auto_motion;
pub mod automation;
pub mod config;
pub mod intake;
pub mod notice;
pub mod store;
pub mod submission;

pub use auto_motion::{AutoMotionState, MotionRunResult, PendingMotionRun};
pub use automation::QueueControl;
pub use config::{ConfigError, StudioConfig};
pub use intake::{AdmittedVideo, VideoUpload};
pub use notice::{Notice, NoticeBus, NoticeLevel};
pub use store::{RunOutcome, Studio, Ticket, VideoMode};
pub use submission::{submit_batch, GenerationProvider, SubmissionOutcome, SubmissionRecord};
