//! Multipart upload driver
//!
//! Splits a source into `chunk_size` parts, digests each part in whole-buffer
//! mode, sends up to `max_parallel_parts` parts at once and records every
//! result in a shared [`TransferContext`]. A part is only read once a send
//! slot is free, so at most `max_parallel_parts` parts are buffered.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use super::state::TransferContext;
use super::types::{CompletionRequest, PartResult};
use crate::config::TransferConfig;
use crate::digest::{digest_buffered_async, DigestDescriptor};
use crate::error::{TransferError, TransferResult};

/// Remote side of an upload
#[async_trait]
pub trait PartSink: Send + Sync + 'static {
    /// Send one part and return the provider's handle for it (e.g. an ETag)
    async fn upload_part(
        &self,
        part_number: u32,
        content: Bytes,
        digest: &DigestDescriptor,
    ) -> TransferResult<String>;

    /// Submit the completion payload
    async fn complete_upload(&self, request: &CompletionRequest) -> TransferResult<()>;

    /// Discard whatever was uploaded so far
    async fn abort_upload(&self) -> TransferResult<()> {
        Ok(())
    }
}

/// Result of a completed upload
#[derive(Debug)]
pub struct UploadOutcome {
    /// Final transfer record (state `Completed`)
    pub context: Arc<TransferContext>,

    /// Payload that was submitted to [`PartSink::complete_upload`]
    pub request: CompletionRequest,
}

/// Upload everything `reader` yields as a multipart object
///
/// An empty source is sent as a single empty part. Any failure aborts both
/// the transfer record and the remote upload before the error is returned.
pub async fn upload_multipart<R, S>(
    mut reader: R,
    sink: Arc<S>,
    config: &TransferConfig,
) -> TransferResult<UploadOutcome>
where
    R: AsyncRead + Unpin,
    S: PartSink,
{
    config.validate()?;

    let context = Arc::new(TransferContext::with_policy(config.completion_policy));

    match send_parts(&mut reader, &sink, &context, config).await {
        Ok(request) => {
            context.complete();
            info!(
                "Upload completed: {} part(s), {} bytes",
                request.parts.len(),
                request.total_bytes
            );
            Ok(UploadOutcome { context, request })
        }
        Err(e) => {
            warn!("Upload failed, aborting: {}", e);
            context.abort();
            if let Err(abort_err) = sink.abort_upload().await {
                warn!("Failed to abort remote upload: {}", abort_err);
            }
            Err(e)
        }
    }
}

async fn send_parts<R, S>(
    reader: &mut R,
    sink: &Arc<S>,
    context: &Arc<TransferContext>,
    config: &TransferConfig,
) -> TransferResult<CompletionRequest>
where
    R: AsyncRead + Unpin,
    S: PartSink,
{
    let semaphore = Arc::new(Semaphore::new(config.max_parallel_parts));
    let mut tasks: JoinSet<TransferResult<()>> = JoinSet::new();

    let mut part_number = 0u32;
    let mut total_bytes = 0u64;

    loop {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| TransferError::InvalidState(format!("Upload permits closed: {}", e)))?;

        // Stop reading as soon as an earlier part has failed
        while let Some(joined) = tasks.try_join_next() {
            settle(joined)?;
        }

        let mut descriptor = digest_buffered_async(
            &config.digest_algorithm,
            (&mut *reader).take(config.chunk_size as u64),
        )
        .await?;

        if descriptor.size == 0 && part_number > 0 {
            break;
        }

        part_number += 1;
        total_bytes += descriptor.size as u64;
        let last = descriptor.size < config.chunk_size;

        let content = descriptor.content.take().unwrap_or_default();
        let sink = Arc::clone(sink);
        let context = Arc::clone(context);
        let n = part_number;

        debug!("Submitting part {} ({} bytes)", n, descriptor.size);

        tasks.spawn(async move {
            let handle = sink
                .upload_part(n, content, &descriptor)
                .await
                .map_err(|e| e.context(format!("part {}", n)))?;

            context.record_part(PartResult::new(n, descriptor.raw_checksum, handle));
            drop(permit);
            Ok(())
        });

        if last {
            break;
        }
    }

    while let Some(joined) = tasks.join_next().await {
        settle(joined)?;
    }

    context.mark_transferred(config.chunk_size, total_bytes, part_number);

    let request = context.completion_request(&config.digest_algorithm)?;
    sink.complete_upload(&request).await?;

    Ok(request)
}

fn settle(joined: Result<TransferResult<()>, JoinError>) -> TransferResult<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(TransferError::Upload(format!("Part upload task failed: {}", e))),
    }
}
