use std::fmt;
use tracing::{trace, warn};

use super::algorithm::{DigestAlgorithm, Hasher};
use super::encode_checksum;
use crate::config::DEFAULT_DIGEST_ALGORITHM;
use crate::error::{TransferError, TransferResult};

enum AccumulatorState {
    /// Algorithm not resolved yet, no bytes seen
    Uninitialized,

    /// Hashing in progress
    Active(Hasher),

    /// Digest already produced
    Finished,
}

/// Incremental digest over a stream of bytes
///
/// The algorithm is resolved on the first [`update`](Self::update), so an
/// accumulator for a part that is never read never touches the hash
/// implementation, and an unknown algorithm name only fails once data
/// actually arrives.
pub struct DigestAccumulator {
    algorithm: String,
    state: AccumulatorState,
    bytes_seen: u64,
}

impl DigestAccumulator {
    /// Create an accumulator for the named algorithm
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            state: AccumulatorState::Uninitialized,
            bytes_seen: 0,
        }
    }

    /// Accumulator using the default algorithm
    pub fn sha256() -> Self {
        Self::new(DEFAULT_DIGEST_ALGORITHM)
    }

    /// Name the accumulator was created with
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Feed a chunk of bytes
    pub fn update(&mut self, data: &[u8]) -> TransferResult<()> {
        match &mut self.state {
            AccumulatorState::Active(hasher) => hasher.update(data),
            AccumulatorState::Uninitialized => {
                let mut hasher = DigestAlgorithm::resolve(&self.algorithm)?.hasher();
                trace!("Digest accumulator initialized ({})", self.algorithm);
                hasher.update(data);
                self.state = AccumulatorState::Active(hasher);
            }
            AccumulatorState::Finished => {
                return Err(TransferError::InvalidState(
                    "Digest accumulator already finished".to_string(),
                ));
            }
        }

        self.bytes_seen += data.len() as u64;
        Ok(())
    }

    /// Feed a single byte
    pub fn update_byte(&mut self, byte: u8) -> TransferResult<()> {
        self.update(&[byte])
    }

    /// Total bytes fed so far
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    /// Whether the algorithm has been resolved
    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, AccumulatorState::Uninitialized)
    }

    /// Finalize and return the raw digest
    ///
    /// An accumulator that never saw a byte yields the digest of empty input.
    pub fn finish(&mut self) -> TransferResult<Vec<u8>> {
        match std::mem::replace(&mut self.state, AccumulatorState::Finished) {
            AccumulatorState::Active(hasher) => Ok(hasher.finalize()),
            AccumulatorState::Uninitialized => {
                Ok(DigestAlgorithm::resolve(&self.algorithm)?.digest(&[]))
            }
            AccumulatorState::Finished => Err(TransferError::InvalidState(
                "Digest accumulator already finished".to_string(),
            )),
        }
    }

    /// Finalize and compare against a base64 checksum
    pub fn verify(&mut self, expected: &str) -> TransferResult<()> {
        let actual = encode_checksum(&self.finish()?);

        if actual != expected {
            warn!(
                "Checksum mismatch after {} bytes: expected {}, got {}",
                self.bytes_seen, expected, actual
            );
            return Err(TransferError::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }

        Ok(())
    }
}

impl fmt::Debug for DigestAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            AccumulatorState::Uninitialized => "uninitialized",
            AccumulatorState::Active(_) => "active",
            AccumulatorState::Finished => "finished",
        };
        f.debug_struct("DigestAccumulator")
            .field("algorithm", &self.algorithm)
            .field("state", &state)
            .field("bytes_seen", &self.bytes_seen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_initialization() {
        let mut acc = DigestAccumulator::sha256();
        assert!(!acc.is_initialized());

        acc.update(b"hello").unwrap();
        assert!(acc.is_initialized());
        assert_eq!(acc.bytes_seen(), 5);
    }

    #[test]
    fn test_unknown_algorithm_fails_on_first_update() {
        let mut acc = DigestAccumulator::new("WHIRLPOOL");
        assert!(!acc.is_initialized());

        let err = acc.update(b"x").unwrap_err();
        assert!(matches!(err, TransferError::UnsupportedAlgorithm(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_chunked_equals_bytewise() {
        let mut chunked = DigestAccumulator::sha256();
        chunked.update(b"hello ").unwrap();
        chunked.update(b"world").unwrap();

        let mut bytewise = DigestAccumulator::sha256();
        for byte in b"hello world" {
            bytewise.update_byte(*byte).unwrap();
        }

        assert_eq!(chunked.finish().unwrap(), bytewise.finish().unwrap());
    }

    #[test]
    fn test_verify_match_and_mismatch() {
        let mut acc = DigestAccumulator::sha256();
        acc.update(b"abc").unwrap();
        assert!(acc
            .verify("ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=")
            .is_ok());

        let mut acc = DigestAccumulator::sha256();
        acc.update(b"abc").unwrap();
        let err = acc.verify("xyz").unwrap_err();
        assert_eq!(
            err,
            TransferError::ChecksumMismatch {
                expected: "xyz".to_string(),
                actual: "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_input_digest() {
        let mut acc = DigestAccumulator::sha256();
        assert!(acc
            .verify("47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=")
            .is_ok());
    }

    #[test]
    fn test_update_after_finish_rejected() {
        let mut acc = DigestAccumulator::sha256();
        acc.update(b"data").unwrap();
        acc.finish().unwrap();

        assert!(matches!(
            acc.update(b"more"),
            Err(TransferError::InvalidState(_))
        ));
        assert!(matches!(acc.finish(), Err(TransferError::InvalidState(_))));
    }
}
