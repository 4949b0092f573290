//! Digest computation for part and whole-object integrity
//!
//! Three modes are offered:
//!
//! - **Incremental**: [`DigestAccumulator`] hashes bytes as they stream past
//!   and verifies the result against a base64 checksum at the end.
//! - **Whole-buffer**: [`digest_buffered`] / [`digest_buffered_async`] read a
//!   complete source into memory and return a [`DigestDescriptor`] that also
//!   carries the buffered content, so the bytes can be sent without re-reading
//!   the source. Memory use grows with the source size; callers bound it by
//!   handing in one part at a time.
//! - **Combine**: [`combine_digests`] digests the concatenation of raw part
//!   digests, producing the aggregate "digest of digests" submitted when a
//!   multipart upload is completed.

mod accumulator;
mod algorithm;

pub use accumulator::DigestAccumulator;
pub use algorithm::DigestAlgorithm;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{TransferError, TransferResult};

/// Result of digesting a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestDescriptor {
    /// Base64-encoded digest
    pub checksum: String,

    /// Raw digest bytes
    pub raw_checksum: Vec<u8>,

    /// Number of bytes digested
    pub size: usize,

    /// Buffered content (whole-buffer mode only)
    #[serde(skip)]
    pub content: Option<Bytes>,
}

impl DigestDescriptor {
    fn from_raw(raw_checksum: Vec<u8>, size: usize, content: Option<Bytes>) -> Self {
        Self {
            checksum: encode_checksum(&raw_checksum),
            raw_checksum,
            size,
            content,
        }
    }
}

/// Base64-encode a raw digest the way checksum headers carry it
pub fn encode_checksum(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

/// Digest an in-memory payload, keeping the payload in the descriptor
pub fn digest_bytes(algorithm: &str, content: Bytes) -> TransferResult<DigestDescriptor> {
    let algorithm = DigestAlgorithm::resolve(algorithm)?;
    let raw = algorithm.digest(&content);
    Ok(DigestDescriptor::from_raw(raw, content.len(), Some(content)))
}

/// Read `source` to the end and digest it in one pass
///
/// A source that cannot be read is reported as
/// [`TransferError::InvalidInput`], never as an algorithm failure.
pub fn digest_buffered<R: Read>(
    algorithm: &str,
    mut source: R,
) -> TransferResult<DigestDescriptor> {
    let resolved = DigestAlgorithm::resolve(algorithm)?;

    let mut buffer = Vec::new();
    source
        .read_to_end(&mut buffer)
        .map_err(|e| TransferError::InvalidInput(format!("Unable to read source data: {}", e)))?;

    let raw = resolved.digest(&buffer);
    let size = buffer.len();
    Ok(DigestDescriptor::from_raw(raw, size, Some(Bytes::from(buffer))))
}

/// Async counterpart of [`digest_buffered`]
pub async fn digest_buffered_async<R>(
    algorithm: &str,
    mut source: R,
) -> TransferResult<DigestDescriptor>
where
    R: AsyncRead + Unpin,
{
    let resolved = DigestAlgorithm::resolve(algorithm)?;

    let mut buffer = Vec::new();
    source
        .read_to_end(&mut buffer)
        .await
        .map_err(|e| TransferError::InvalidInput(format!("Unable to read source data: {}", e)))?;

    let raw = resolved.digest(&buffer);
    let size = buffer.len();
    Ok(DigestDescriptor::from_raw(raw, size, Some(Bytes::from(buffer))))
}

/// Digest the concatenation of already-computed raw part digests
///
/// Order matters: pass the digests sorted by part number.
pub fn combine_digests<I, D>(algorithm: &str, digests: I) -> TransferResult<DigestDescriptor>
where
    I: IntoIterator<Item = D>,
    D: AsRef<[u8]>,
{
    let mut accumulator = DigestAccumulator::new(algorithm);
    let mut parts = 0usize;

    for digest in digests {
        accumulator.update(digest.as_ref())?;
        parts += 1;
    }

    if parts == 0 {
        return Err(TransferError::InvalidInput(
            "No part digests to combine".to_string(),
        ));
    }

    let size = accumulator.bytes_seen() as usize;
    let raw = accumulator.finish()?;
    Ok(DigestDescriptor::from_raw(raw, size, None))
}
