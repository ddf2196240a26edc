//! Motion director client library.
//!
//! Selects the request shape for the active model, encodes scene media
//! for the wire, and talks to the motion director's HTTP API.

pub mod api;
pub mod request;
pub mod wire;

pub use api::{DirectorError, MotionDirector, MotionDirectorApi};
pub use request::{MediaInput, MotionControlInput, MotionRequest, PipelineKind, RefineRequest};
pub use wire::DirectorResponse;
