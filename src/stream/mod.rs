//! Streaming building blocks for part downloads
//!
//! - [`IntegrityStream`] verifies one part's bytes against its checksum as
//!   they are consumed.
//! - [`DeferredPartStream`] splices a sequence of remotely fetched parts into
//!   one continuous stream, keeping the fetch of the next part in flight while
//!   the current part is read.
//!
//! Parts are obtained from a [`PartFetcher`], which hands out one
//! [`PartHandle`] per call. A handle resolves to `Some(stream)` for the next
//! part, or `None` once there are no more parts.

mod deferred;
mod integrity;

pub use deferred::DeferredPartStream;
pub use integrity::IntegrityStream;

use bytes::Bytes;
use futures::future::{self, BoxFuture, FutureExt};
use futures::Stream;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::AbortHandle;

use crate::error::{TransferError, TransferResult};

/// Boxed stream of byte chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Future resolving to the next part, or `None` when there are no more parts
pub type PartFuture = BoxFuture<'static, TransferResult<Option<ByteStream>>>;

/// Handle to an outstanding part fetch
///
/// Dropping the handle of a spawned fetch detaches the task: it keeps running
/// and its result is discarded. Use [`PartHandle::abort`] to stop it.
pub struct PartHandle {
    future: PartFuture,
    abort: Option<AbortHandle>,
}

impl PartHandle {
    /// Run a fetch as a task on the tokio runtime
    ///
    /// Must be called from within a runtime.
    pub fn spawn<F>(fetch: F) -> Self
    where
        F: Future<Output = TransferResult<Option<ByteStream>>> + Send + 'static,
    {
        let task = tokio::spawn(fetch);
        let abort = task.abort_handle();

        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => {
                    Err(TransferError::Fetch("Part fetch was cancelled".to_string()))
                }
                Err(e) => Err(TransferError::Fetch(format!("Part fetch task failed: {}", e))),
            }
        }
        .boxed();

        Self {
            future,
            abort: Some(abort),
        }
    }

    /// Wrap a future without spawning it; it only makes progress when awaited
    pub fn from_future<F>(fetch: F) -> Self
    where
        F: Future<Output = TransferResult<Option<ByteStream>>> + Send + 'static,
    {
        Self {
            future: fetch.boxed(),
            abort: None,
        }
    }

    /// Handle that is already resolved
    pub fn ready(result: TransferResult<Option<ByteStream>>) -> Self {
        Self::from_future(future::ready(result))
    }

    /// Handle signalling that there are no more parts
    pub fn end() -> Self {
        Self::ready(Ok(None))
    }

    /// Whether the fetch runs as its own task
    pub fn is_spawned(&self) -> bool {
        self.abort.is_some()
    }

    /// Abort a spawned fetch; no-op for unspawned handles
    pub fn abort(&self) {
        if let Some(handle) = &self.abort {
            handle.abort();
        }
    }
}

impl Future for PartHandle {
    type Output = TransferResult<Option<ByteStream>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for PartHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartHandle")
            .field("spawned", &self.is_spawned())
            .finish()
    }
}

/// Source of part fetches, called once per part in ascending order
pub trait PartFetcher: Send {
    /// Issue the fetch for the next part
    fn next_part(&mut self) -> PartHandle;
}

impl<F> PartFetcher for F
where
    F: FnMut() -> PartHandle + Send,
{
    fn next_part(&mut self) -> PartHandle {
        self()
    }
}
