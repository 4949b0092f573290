/*!
 * Configuration types for multipart transfers
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{TransferError, TransferResult};

/// Default part size (5 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Default number of parts uploaded concurrently
pub const DEFAULT_PARALLEL_PARTS: usize = 4;

/// Upper bound for concurrent part uploads
pub const MAX_PARALLEL_PARTS: usize = 64;

/// Digest algorithm used when none is configured
pub const DEFAULT_DIGEST_ALGORITHM: &str = "SHA-256";

/// Gate applied by
/// [`TransferContext::can_proceed_to_complete`](crate::TransferContext::can_proceed_to_complete)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompletionPolicy {
    /// Any non-empty set of transferred parts may be completed
    #[default]
    Permissive,

    /// The recorded part count must equal the expected total
    Strict,
}

/// What happens to an in-flight prefetch when a part stream is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchClosePolicy {
    /// Let the fetch run to completion and discard its result
    #[default]
    Drain,

    /// Abort the fetch task
    Cancel,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Main configuration for multipart transfers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Digest algorithm name (e.g. "SHA-256"). Resolved lazily on first use.
    #[serde(default = "default_digest_algorithm")]
    pub digest_algorithm: String,

    /// Part size in bytes for uploads
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum number of parts uploaded at the same time
    #[serde(default = "default_parallel_parts")]
    pub max_parallel_parts: usize,

    /// Verify per-part checksums on download
    #[serde(default = "default_true")]
    pub verify_checksums: bool,

    /// Completion gate
    #[serde(default)]
    pub completion_policy: CompletionPolicy,

    /// Prefetch handling on stream close
    #[serde(default)]
    pub prefetch_close_policy: PrefetchClosePolicy,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl TransferConfig {
    /// Validate the configuration
    ///
    /// The digest algorithm is not resolved here; an unknown
    /// name only fails once something is actually digested.
    pub fn validate(&self) -> TransferResult<()> {
        if self.chunk_size == 0 {
            return Err(TransferError::InvalidConfig(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        if self.max_parallel_parts == 0 {
            return Err(TransferError::InvalidConfig(
                "Parallel parts must be at least 1".to_string(),
            ));
        }

        if self.max_parallel_parts > MAX_PARALLEL_PARTS {
            return Err(TransferError::InvalidConfig(format!(
                "Parallel parts {} exceeds maximum {}",
                self.max_parallel_parts, MAX_PARALLEL_PARTS
            )));
        }

        if self.digest_algorithm.trim().is_empty() {
            return Err(TransferError::InvalidConfig(
                "Digest algorithm name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            digest_algorithm: default_digest_algorithm(),
            chunk_size: default_chunk_size(),
            max_parallel_parts: default_parallel_parts(),
            verify_checksums: true,
            completion_policy: CompletionPolicy::default(),
            prefetch_close_policy: PrefetchClosePolicy::default(),
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Builder for TransferConfig
#[derive(Debug, Default)]
pub struct TransferConfigBuilder {
    config: TransferConfig,
}

impl TransferConfigBuilder {
    /// Create a builder starting from the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the digest algorithm name
    pub fn digest_algorithm(mut self, name: impl Into<String>) -> Self {
        self.config.digest_algorithm = name.into();
        self
    }

    /// Set the upload part size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the number of concurrent part uploads
    pub fn max_parallel_parts(mut self, count: usize) -> Self {
        self.config.max_parallel_parts = count;
        self
    }

    /// Enable or disable download checksum verification
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    /// Set the completion gate
    pub fn completion_policy(mut self, policy: CompletionPolicy) -> Self {
        self.config.completion_policy = policy;
        self
    }

    /// Set the prefetch close policy
    pub fn prefetch_close_policy(mut self, policy: PrefetchClosePolicy) -> Self {
        self.config.prefetch_close_policy = policy;
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Write logs to a file instead of stdout
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_file = Some(path.into());
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> TransferResult<TransferConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_parallel_parts() -> usize {
    DEFAULT_PARALLEL_PARTS
}

fn default_digest_algorithm() -> String {
    DEFAULT_DIGEST_ALGORITHM.to_string()
}
