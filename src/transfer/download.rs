//! Multipart download driver
//!
//! Adapts a [`PartSource`] into a [`PartFetcher`]: every part is fetched on
//! its own task, its headers are parsed into an [`ObjectHead`], and its body
//! is wrapped in an [`IntegrityStream`] keyed by that part's checksum.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::metadata::{HeaderMap, ObjectHead};
use crate::stream::{ByteStream, DeferredPartStream, IntegrityStream, PartFetcher, PartHandle};

/// Headers and body of one part response
pub struct PartResponse {
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl PartResponse {
    pub fn new(headers: HeaderMap, body: ByteStream) -> Self {
        Self { headers, body }
    }
}

impl std::fmt::Debug for PartResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartResponse")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Remote side of a download
#[async_trait]
pub trait PartSource: Send + Sync + 'static {
    /// Fetch one part (1-based)
    ///
    /// For objects that are not multipart, part 1 is the whole object.
    ///
    /// # Errors
    ///
    /// Should return [`TransferError::Fetch`]; other errors are converted.
    async fn fetch_part(&self, part_number: u32) -> TransferResult<PartResponse>;
}

/// Hands out fetches for parts `1..=total_parts`, then signals the end
pub struct PartDownloader<S> {
    source: Arc<S>,
    next_part: u32,
    total_parts: u32,
    algorithm: String,
    verify: bool,
}

impl<S: PartSource> PartDownloader<S> {
    pub fn new(source: Arc<S>, head: &ObjectHead, config: &TransferConfig) -> Self {
        let total_parts = if head.is_multipart {
            head.part_count.max(1)
        } else {
            1
        };

        Self {
            source,
            next_part: 1,
            total_parts,
            algorithm: config.digest_algorithm.clone(),
            verify: config.verify_checksums,
        }
    }

    /// Number of parts this downloader will fetch
    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }
}

impl<S: PartSource> PartFetcher for PartDownloader<S> {
    fn next_part(&mut self) -> PartHandle {
        if self.next_part > self.total_parts {
            return PartHandle::end();
        }

        let part_number = self.next_part;
        self.next_part += 1;

        let source = Arc::clone(&self.source);
        let algorithm = self.algorithm.clone();
        let verify = self.verify;

        debug!("Issuing fetch for part {}/{}", part_number, self.total_parts);

        PartHandle::spawn(async move {
            let response = source.fetch_part(part_number).await.map_err(|e| {
                if matches!(e.root(), TransferError::Fetch(_)) {
                    e
                } else {
                    TransferError::Fetch(e.to_string())
                }
            })?;

            let head = ObjectHead::from_headers(&response.headers);

            // An empty checksum value carries nothing to verify against
            let expected = head.checksum.filter(|c| verify && !c.is_empty());
            let stream = match expected {
                Some(expected) => IntegrityStream::new(response.body, expected, &algorithm),
                None => {
                    debug!("Part {} will not be verified", part_number);
                    IntegrityStream::skip_checksum(response.body, &algorithm)
                }
            };

            let stream: ByteStream = Box::pin(stream.with_part_number(part_number));
            Ok(Some(stream))
        })
    }
}

/// Open a verified byte stream over every part of an object
///
/// `head` is the metadata of the whole object and decides how many parts are
/// fetched. Part 1 is fetched before this returns; part 2 is in flight.
pub async fn download_multipart<S: PartSource>(
    source: Arc<S>,
    head: &ObjectHead,
    config: &TransferConfig,
) -> TransferResult<DeferredPartStream<PartDownloader<S>>> {
    config.validate()?;

    let downloader = PartDownloader::new(source, head, config);
    info!(
        "Starting download: {} part(s), {} bytes, checksum verification {}",
        downloader.total_parts(),
        head.content_length,
        if config.verify_checksums { "on" } else { "off" }
    );

    DeferredPartStream::open_with_policy(downloader, config.prefetch_close_policy).await
}
