//! Type definitions shared by upload and download

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::digest::encode_checksum;

/// Lifecycle of a multipart transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    /// Created, nothing recorded yet
    #[default]
    Initiated,

    /// At least one part recorded
    InProgress,

    /// All parts sent; part order is fixed
    Transferred,

    /// Completion accepted (terminal)
    Completed,

    /// Transfer abandoned (terminal)
    Aborted,
}

impl TransferState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Aborted)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferState::Initiated => "initiated",
            TransferState::InProgress => "in-progress",
            TransferState::Transferred => "transferred",
            TransferState::Completed => "completed",
            TransferState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of sending one part
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartResult {
    part_number: u32,
    digest: Vec<u8>,
    provider_part_handle: String,
}

impl PartResult {
    pub fn new(part_number: u32, digest: Vec<u8>, provider_part_handle: impl Into<String>) -> Self {
        Self {
            part_number,
            digest,
            provider_part_handle: provider_part_handle.into(),
        }
    }

    /// 1-based part number
    pub fn part_number(&self) -> u32 {
        self.part_number
    }

    /// Raw digest of the part's bytes
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Identifier the provider returned for this part (e.g. an ETag)
    pub fn provider_part_handle(&self) -> &str {
        &self.provider_part_handle
    }

    /// Base64 form of the digest
    pub fn checksum(&self) -> String {
        encode_checksum(&self.digest)
    }
}

/// Counters fixed when a transfer reaches [`TransferState::Transferred`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransferTotals {
    pub chunk_size: usize,
    pub total_bytes: u64,
    pub total_parts_count: u32,
}

/// One entry of the completion manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    pub provider_part_handle: String,
    /// Base64 part digest
    pub part_digest: String,
}

impl From<&PartResult> for CompletedPart {
    fn from(part: &PartResult) -> Self {
        Self {
            part_number: part.part_number,
            provider_part_handle: part.provider_part_handle.clone(),
            part_digest: part.checksum(),
        }
    }
}

/// Payload of the call that completes a multipart upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// Parts in ascending part-number order
    pub parts: Vec<CompletedPart>,

    /// Base64 digest of the concatenated raw part digests
    pub aggregate_digest: String,

    /// Algorithm used for part and aggregate digests
    pub algorithm: String,

    pub total_bytes: u64,
    pub chunk_size: usize,
}
