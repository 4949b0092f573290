use bytes::Bytes;
use futures::stream::FusedStream;
use futures::Stream;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::{debug, trace, warn};

use super::{ByteStream, PartFetcher, PartHandle};
use crate::config::PrefetchClosePolicy;
use crate::error::TransferResult;

/// One continuous stream over a sequence of fetched parts
///
/// While part `n` is being read, the fetch for part `n + 1` is already in
/// flight. Parts are consumed strictly in the order the fetcher hands them
/// out. A failed fetch ends the stream with an `io::Error` carrying the
/// [`TransferError`](crate::TransferError); nothing is retried here.
pub struct DeferredPartStream<F> {
    fetcher: F,
    current: Option<ByteStream>,
    pending: Option<PartHandle>,
    parts_opened: u32,
    close_policy: PrefetchClosePolicy,
    terminated: bool,
}

impl<F> DeferredPartStream<F>
where
    F: PartFetcher + Unpin,
{
    /// Fetch and open the first part, then start fetching the second
    pub async fn open(fetcher: F) -> TransferResult<Self> {
        Self::open_with_policy(fetcher, PrefetchClosePolicy::default()).await
    }

    /// Like [`open`](Self::open), with an explicit close policy for the prefetch
    pub async fn open_with_policy(
        mut fetcher: F,
        close_policy: PrefetchClosePolicy,
    ) -> TransferResult<Self> {
        let first = fetcher
            .next_part()
            .await
            .map_err(|e| e.context("part 1"))?;

        let (current, pending, parts_opened) = match first {
            Some(stream) => (Some(stream), Some(fetcher.next_part()), 1),
            None => (None, None, 0),
        };

        debug!(
            "Deferred part stream opened ({} part(s) available, prefetch {})",
            parts_opened,
            if pending.is_some() { "issued" } else { "not needed" }
        );

        let terminated = current.is_none();
        Ok(Self {
            fetcher,
            current,
            pending,
            parts_opened,
            close_policy,
            terminated,
        })
    }

    /// Number of parts promoted to current so far
    pub fn parts_opened(&self) -> u32 {
        self.parts_opened
    }

    /// Whether a prefetch is outstanding
    pub fn has_pending_fetch(&self) -> bool {
        self.pending.is_some()
    }

    /// Release the active part and the outstanding prefetch
    ///
    /// Under [`PrefetchClosePolicy::Drain`] a spawned prefetch keeps running
    /// and its result is dropped; under [`PrefetchClosePolicy::Cancel`] the
    /// task is aborted. Repeated calls are no-ops.
    pub fn close(&mut self) {
        if self.terminated && self.current.is_none() && self.pending.is_none() {
            return;
        }

        self.terminate();
        debug!(
            "Deferred part stream closed after {} part(s)",
            self.parts_opened
        );
    }
}

impl<F> DeferredPartStream<F> {
    /// Enter the terminal state, releasing the prefetch per `close_policy`
    fn terminate(&mut self) {
        self.current = None;
        self.terminated = true;

        if let Some(pending) = self.pending.take() {
            match self.close_policy {
                PrefetchClosePolicy::Cancel => {
                    trace!("Aborting prefetch");
                    pending.abort();
                }
                PrefetchClosePolicy::Drain => {
                    trace!("Leaving prefetch to drain");
                }
            }
        }
    }
}

impl<F> Stream for DeferredPartStream<F>
where
    F: PartFetcher + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.terminated {
                return Poll::Ready(None);
            }

            if let Some(current) = this.current.as_mut() {
                match ready!(current.as_mut().poll_next(cx)) {
                    Some(Ok(chunk)) => return Poll::Ready(Some(Ok(chunk))),
                    Some(Err(e)) => {
                        warn!("Part {} failed while reading: {}", this.parts_opened, e);
                        this.terminate();
                        return Poll::Ready(Some(Err(e)));
                    }
                    None => {
                        trace!("Part {} exhausted", this.parts_opened);
                        this.current = None;
                    }
                }
            }

            let Some(pending) = this.pending.as_mut() else {
                this.terminate();
                return Poll::Ready(None);
            };

            let next = ready!(Pin::new(pending).poll(cx));
            this.pending = None;

            match next {
                Ok(Some(stream)) => {
                    this.parts_opened += 1;
                    trace!(
                        "Promoted part {}, prefetching part {}",
                        this.parts_opened,
                        this.parts_opened + 1
                    );
                    this.current = Some(stream);
                    this.pending = Some(this.fetcher.next_part());
                }
                Ok(None) => {
                    debug!("No more parts after part {}", this.parts_opened);
                    this.terminate();
                    return Poll::Ready(None);
                }
                Err(e) => {
                    let part = this.parts_opened + 1;
                    warn!("Fetch of part {} failed: {}", part, e);
                    this.terminate();
                    return Poll::Ready(Some(Err(e
                        .context(format!("part {}", part))
                        .into_io_error())));
                }
            }
        }
    }
}

impl<F> FusedStream for DeferredPartStream<F>
where
    F: PartFetcher + Unpin,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<F> Drop for DeferredPartStream<F> {
    fn drop(&mut self) {
        self.terminate();
    }
}
