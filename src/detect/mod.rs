mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{DetectParams, DetectorBackend};
pub use backends::{ScriptedBackend, StubBackend};
pub use registry::BackendRegistry;
pub use result::{tracked_prefix, BoundingBox, Detection};
