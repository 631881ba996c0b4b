mod classify;
mod machine;
mod outcome;
mod progress_stream;
mod session;
mod session_worker;
mod transport;
mod types;

pub use classify::classify;
pub use machine::{reduce, validate, Transition, TransportEvent};
pub use outcome::{Outcome, UploadError, UploadReceipt, ValidationError};
pub use progress_stream::ProgressStream;
pub use session::{UploadSession, UploadSessionHandle};
pub use transport::HttpUploadTransport;
pub use types::{UploadEvent, UploadSnapshot};
