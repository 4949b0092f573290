use bytes::Bytes;
use futures::stream::FusedStream;
use futures::Stream;
use pin_project::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::{debug, trace};

use crate::digest::DigestAccumulator;
use crate::error::TransferError;

/// Stream decorator that digests every chunk and verifies the result at the end
///
/// Verification happens only when the wrapped stream reports its end. A
/// consumer that stops early never observes a mismatch. Once the stream has
/// ended, failed, or been closed it keeps returning `None`.
#[pin_project]
pub struct IntegrityStream<S> {
    #[pin]
    inner: Option<S>,
    accumulator: DigestAccumulator,
    expected: Option<String>,
    part_number: Option<u32>,
    bytes_read: u64,
    finished: bool,
}

impl<S> IntegrityStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    /// Verify `inner` against a base64 `expected` checksum
    pub fn new(inner: S, expected: impl Into<String>, algorithm: &str) -> Self {
        Self::build(inner, Some(expected.into()), algorithm)
    }

    /// Digest `inner` without verifying the result
    pub fn skip_checksum(inner: S, algorithm: &str) -> Self {
        Self::build(inner, None, algorithm)
    }

    fn build(inner: S, expected: Option<String>, algorithm: &str) -> Self {
        Self {
            inner: Some(inner),
            accumulator: DigestAccumulator::new(algorithm),
            expected,
            part_number: None,
            bytes_read: 0,
            finished: false,
        }
    }

    /// Tag errors with the part this stream belongs to
    pub fn with_part_number(mut self, part_number: u32) -> Self {
        self.part_number = Some(part_number);
        self
    }

    /// Bytes passed through so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Whether verification is skipped
    pub fn is_skipping(&self) -> bool {
        self.expected.is_none()
    }

    /// Whether the wrapped stream has been released
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Release the wrapped stream without verifying; repeated calls are no-ops
    pub fn close(self: Pin<&mut Self>) {
        let mut this = self.project();
        if this.inner.is_some() {
            trace!("Closing part stream after {} bytes", this.bytes_read);
            this.inner.set(None);
        }
        *this.finished = true;
    }
}

fn tag(err: TransferError, part_number: Option<u32>) -> io::Error {
    match part_number {
        Some(n) => err.context(format!("part {}", n)).into_io_error(),
        None => err.into_io_error(),
    }
}

impl<S> Stream for IntegrityStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.finished {
            return Poll::Ready(None);
        }

        let Some(inner) = this.inner.as_mut().as_pin_mut() else {
            *this.finished = true;
            return Poll::Ready(None);
        };

        match ready!(inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                if let Err(e) = this.accumulator.update(&chunk) {
                    *this.finished = true;
                    this.inner.set(None);
                    return Poll::Ready(Some(Err(tag(e, *this.part_number))));
                }
                *this.bytes_read += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                *this.finished = true;
                this.inner.set(None);
                Poll::Ready(Some(Err(e)))
            }
            None => {
                *this.finished = true;
                this.inner.set(None);

                let outcome = match this.expected.as_deref() {
                    Some(expected) => this.accumulator.verify(expected),
                    None => this.accumulator.finish().map(|_| ()),
                };

                match outcome {
                    Ok(()) => {
                        debug!(
                            "Part {:?} consumed: {} bytes, checksum {}",
                            this.part_number,
                            this.bytes_read,
                            if this.expected.is_some() { "verified" } else { "skipped" }
                        );
                        Poll::Ready(None)
                    }
                    Err(e) => Poll::Ready(Some(Err(tag(e, *this.part_number)))),
                }
            }
        }
    }
}

impl<S> FusedStream for IntegrityStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    fn is_terminated(&self) -> bool {
        self.finished
    }
}
