//! Remix pipeline - per-clip edits, timeline compositing, and orchestration
//!
//! A [`RemixRequest`] lists clips in playback order, each with optional
//! trim and speed edits, plus an optional background track. [`Remixer`]
//! resolves the references, decodes and edits each clip on a small worker
//! pool, lays the attenuated and looped background under the concatenated
//! clips, and encodes the result.

mod compositor;
mod config;
mod error;
mod orchestrator;
mod request;
mod resolver;
mod transform;
#[cfg(test)]
mod test_support;

pub use compositor::{AttenuatedBackground, TimelineCompositor, DEFAULT_BACKGROUND_GAIN_DB};
pub use config::Config;
pub use error::{ErrorKind, RemixError, SourceRole, TransformStage};
pub use orchestrator::{RemixOptions, RemixResult, Remixer};
pub use request::{ClipEdit, ClipWire, RemixRequest, RemixRequestWire, MIN_SPEED};
pub use resolver::{MemoryResolver, ResolveError, SourceResolver, UploadDirResolver};
pub use transform::{ClipTransform, DEFAULT_MAX_CLIP_SECS};
