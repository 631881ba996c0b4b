mod errors;
mod scheduler;
mod traits;
mod types;

pub use errors::{BeamError, Result};
pub use scheduler::DelayedTasks;
pub use traits::{ProgressCallback, UploadTransport};
pub use types::{
    Credential,
    FilePayload,
    PayloadSource,
    SessionId,
    TransportResponse,
    UploadProgress,
    UploadState,
};
