//! Multipart transfer orchestration
//!
//! [`TransferContext`] tracks a transfer through
//! `Initiated -> InProgress -> Transferred -> Completed`, with `Aborted`
//! reachable from any non-terminal state. The download and upload drivers
//! build on it and on the streaming and digest layers.

pub mod download;
pub mod state;
pub mod types;
pub mod upload;

pub use download::{download_multipart, PartDownloader, PartResponse, PartSource};
pub use state::TransferContext;
pub use types::{CompletedPart, CompletionRequest, PartResult, TransferState, TransferTotals};
pub use upload::{upload_multipart, PartSink, UploadOutcome};
