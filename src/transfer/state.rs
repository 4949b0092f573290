//! Transfer state machine and part bookkeeping

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::types::{CompletedPart, CompletionRequest, PartResult, TransferState, TransferTotals};
use crate::config::CompletionPolicy;
use crate::digest::combine_digests;
use crate::error::{TransferError, TransferResult};

#[derive(Debug, Default)]
struct Inner {
    state: TransferState,
    parts: Vec<PartResult>,
    totals: Option<TransferTotals>,
}

/// Shared record of a multipart transfer
///
/// Parts may be recorded concurrently from several tasks; share the context
/// behind an `Arc`. Part order is fixed (ascending part number) when the
/// transfer is marked transferred.
///
/// No transition fails. Calls that make no sense in the current state are
/// logged and otherwise ignored; [`can_proceed_to_complete`](Self::can_proceed_to_complete)
/// is the gate callers must check before completing.
#[derive(Debug)]
pub struct TransferContext {
    inner: Mutex<Inner>,
    policy: CompletionPolicy,
}

impl TransferContext {
    /// New context in [`TransferState::Initiated`] with the permissive gate
    pub fn start() -> Self {
        Self::with_policy(CompletionPolicy::default())
    }

    /// New context with an explicit completion gate
    pub fn with_policy(policy: CompletionPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Part log stays consistent even if a recording task panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Completion gate in effect
    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Current state
    pub fn state(&self) -> TransferState {
        self.lock().state
    }

    /// Number of parts recorded so far
    pub fn parts_recorded(&self) -> usize {
        self.lock().parts.len()
    }

    /// Counters, available once transferred
    pub fn totals(&self) -> Option<TransferTotals> {
        self.lock().totals
    }

    /// Append a part result
    pub fn record_part(&self, part: PartResult) {
        let mut inner = self.lock();

        match inner.state {
            TransferState::Initiated => {
                debug!("Transfer state: initiated -> in-progress");
                inner.state = TransferState::InProgress;
            }
            TransferState::InProgress => {}
            TransferState::Transferred => {
                warn!(
                    "Part {} recorded after transfer was marked transferred",
                    part.part_number()
                );
                let at = inner
                    .parts
                    .partition_point(|p| p.part_number() <= part.part_number());
                inner.parts.insert(at, part);
                return;
            }
            TransferState::Completed | TransferState::Aborted => {
                warn!(
                    "Dropping part {}: transfer already {}",
                    part.part_number(),
                    inner.state
                );
                return;
            }
        }

        debug!(
            "Recorded part {} ({} part(s) so far)",
            part.part_number(),
            inner.parts.len() + 1
        );
        inner.parts.push(part);
    }

    /// Fix part order and counters
    ///
    /// Fewer recorded parts than `total_parts_count` is not rejected here.
    pub fn mark_transferred(&self, chunk_size: usize, total_bytes: u64, total_parts_count: u32) {
        let mut inner = self.lock();

        if inner.state.is_terminal() {
            warn!("Ignoring mark_transferred: transfer already {}", inner.state);
            return;
        }

        inner.parts.sort_by_key(PartResult::part_number);
        inner.totals = Some(TransferTotals {
            chunk_size,
            total_bytes,
            total_parts_count,
        });

        if inner.parts.len() != total_parts_count as usize {
            warn!(
                "Marked transferred with {} of {} expected part(s)",
                inner.parts.len(),
                total_parts_count
            );
        }

        info!(
            "Transfer state: {} -> transferred ({} part(s), {} bytes)",
            inner.state,
            inner.parts.len(),
            total_bytes
        );
        inner.state = TransferState::Transferred;
    }

    /// Whether the transfer may be completed
    ///
    /// True when transferred with at least one part. Under
    /// [`CompletionPolicy::Strict`] the part count must also equal the
    /// expected total.
    pub fn can_proceed_to_complete(&self) -> bool {
        let inner = self.lock();

        if inner.state != TransferState::Transferred || inner.parts.is_empty() {
            return false;
        }

        match self.policy {
            CompletionPolicy::Permissive => true,
            CompletionPolicy::Strict => inner
                .totals
                .map(|t| t.total_parts_count as usize == inner.parts.len())
                .unwrap_or(false),
        }
    }

    /// Whether part transfer may begin
    pub fn can_proceed_to_transfer(&self) -> bool {
        self.lock().state == TransferState::Initiated
    }

    /// Move to [`TransferState::Completed`]
    pub fn complete(&self) {
        self.finish(TransferState::Completed);
    }

    /// Move to [`TransferState::Aborted`]
    pub fn abort(&self) {
        self.finish(TransferState::Aborted);
    }

    fn finish(&self, target: TransferState) {
        let mut inner = self.lock();

        if inner.state.is_terminal() {
            debug!("Transfer already {}, ignoring {}", inner.state, target);
            return;
        }

        info!("Transfer state: {} -> {}", inner.state, target);
        inner.state = target;
    }

    /// Snapshot of recorded parts in their current order
    pub fn parts(&self) -> Vec<PartResult> {
        self.lock().parts.clone()
    }

    /// Raw part digests in part order
    pub fn digests_in_order(&self) -> Vec<Vec<u8>> {
        self.lock()
            .parts
            .iter()
            .map(|p| p.digest().to_vec())
            .collect()
    }

    /// Completion manifest in part order
    pub fn part_manifest(&self) -> Vec<CompletedPart> {
        self.lock().parts.iter().map(CompletedPart::from).collect()
    }

    /// Build the completion payload
    ///
    /// Fails with [`TransferError::InvalidState`] while the completion gate is
    /// closed.
    pub fn completion_request(&self, algorithm: &str) -> TransferResult<CompletionRequest> {
        if !self.can_proceed_to_complete() {
            let inner = self.lock();
            return Err(TransferError::InvalidState(format!(
                "Cannot complete transfer in state {} with {} part(s) recorded",
                inner.state,
                inner.parts.len()
            )));
        }

        let parts = self.part_manifest();
        let aggregate = combine_digests(algorithm, self.digests_in_order())?;
        let totals = self.totals().unwrap_or_default();

        Ok(CompletionRequest {
            parts,
            aggregate_digest: aggregate.checksum,
            algorithm: algorithm.to_string(),
            total_bytes: totals.total_bytes,
            chunk_size: totals.chunk_size,
        })
    }
}

impl Default for TransferContext {
    fn default() -> Self {
        Self::start()
    }
}
