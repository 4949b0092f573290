/*!
 * Fusion Transfer - multipart transfer and integrity verification
 *
 * Moves large objects as independently fetched or sent parts:
 * - Streaming SHA-256 (or SHA-384, SHA-512, BLAKE3) verification per part
 * - Aggregate "digest of digests" for multipart completion
 * - Deferred part streams that prefetch the next part while reading
 * - Response-header metadata extraction
 * - Transfer state tracking shared by concurrent part uploads
 *
 * HTTP transport and authentication are left to the caller, which plugs in
 * through the `PartSource`, `PartSink` and `PartFetcher` traits.
 */

pub mod config;
pub mod digest;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod stream;
pub mod transfer;

// Re-export commonly used types
pub use config::{
    CompletionPolicy, LogLevel, PrefetchClosePolicy, TransferConfig, TransferConfigBuilder,
};
pub use digest::{
    combine_digests, digest_buffered, digest_buffered_async, digest_bytes, DigestAccumulator,
    DigestAlgorithm, DigestDescriptor,
};
pub use error::{TransferError, TransferResult};
pub use metadata::{ContentRange, HeaderMap, ObjectHead};
pub use stream::{ByteStream, DeferredPartStream, IntegrityStream, PartFetcher, PartHandle};
pub use transfer::{
    download_multipart, upload_multipart, CompletedPart, CompletionRequest, PartResult, PartSink,
    PartSource, TransferContext, TransferState, UploadOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
