//! Core traits for mergeable sample sketches
//!
//! Every sketch implements the base [`Sketch`] trait. [`SamplingSketch`] exposes
//! the retained sample and [`MedianSketch`] the rank estimate taken from it.

use core::fmt::Debug;

#[cfg(feature = "std")]
use std::string::String;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::string::String;

/// Which operand of a merge violated a precondition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSide {
    /// The state being merged into
    Destination,
    /// The state being merged from
    Source,
}

impl core::fmt::Display for MergeSide {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MergeSide::Destination => write!(f, "destination"),
            MergeSide::Source => write!(f, "source"),
        }
    }
}

/// Error during sketch merge operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// A retained slot has no priority key yet
    ///
    /// Keys must be assigned on both operands before a weighted merge.
    UnassignedKey { side: MergeSide, index: usize },
}

impl core::fmt::Display for MergeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MergeError::UnassignedKey { side, index } => {
                write!(f, "{} slot {} has no priority key assigned", side, index)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MergeError {}

/// Error during sketch decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input buffer too short
    BufferTooShort { expected: usize, found: usize },
    /// Invalid magic number or header
    InvalidHeader,
    /// Unsupported version
    UnsupportedVersion(u8),
    /// Buffer was written for a different value encoding
    ValueKindMismatch { expected: u8, found: u8 },
    /// Corrupted data
    Corrupted(String),
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::BufferTooShort { expected, found } => {
                write!(f, "buffer too short: expected {}, found {}", expected, found)
            }
            DecodeError::InvalidHeader => write!(f, "invalid header"),
            DecodeError::UnsupportedVersion(v) => write!(f, "unsupported version: {}", v),
            DecodeError::ValueKindMismatch { expected, found } => {
                write!(f, "value kind mismatch: expected {}, found {}", expected, found)
            }
            DecodeError::Corrupted(msg) => write!(f, "corrupted data: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/// Error during sketch encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Output buffer does not match the encoded size
    BufferSizeMismatch { expected: usize, found: usize },
    /// Capacity does not fit the 32-bit header field
    CapacityOverflow(usize),
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EncodeError::BufferSizeMismatch { expected, found } => {
                write!(f, "buffer size mismatch: expected {}, found {}", expected, found)
            }
            EncodeError::CapacityOverflow(capacity) => {
                write!(f, "capacity {} does not fit in the header", capacity)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

/// Core trait for all streaming sketches
pub trait Sketch: Clone + Debug {
    /// The type of item this sketch processes
    type Item: ?Sized;

    /// Add an item to the sketch
    fn update(&mut self, item: &Self::Item);

    /// Merge another sketch into this one
    ///
    /// Returns an error if sketches are incompatible
    fn merge(&mut self, other: &Self) -> Result<(), MergeError>;

    /// Reset sketch to empty state
    fn clear(&mut self);

    /// Memory usage in bytes
    fn size_bytes(&self) -> usize;

    /// Number of items processed
    fn count(&self) -> u64;

    /// Check if sketch is empty
    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Sampling sketches
pub trait SamplingSketch: Sketch {
    /// What the sketch keeps per retained observation
    type Retained;

    /// Get current sample
    fn sample(&self) -> &[Self::Retained];

    /// Sample size limit
    fn capacity(&self) -> usize;

    /// Current sample size
    fn sample_size(&self) -> usize {
        self.sample().len()
    }
}

/// Sketches that can estimate the median of what they summarize
pub trait MedianSketch: Sketch {
    /// The value type being tracked
    type Value: Clone;

    /// Lower median of the retained sample, `None` when nothing was retained
    fn median(&self) -> Option<Self::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_error_display() {
        let err = MergeError::UnassignedKey {
            side: MergeSide::Source,
            index: 3,
        };
        assert_eq!(err.to_string(), "source slot 3 has no priority key assigned");
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::BufferTooShort {
            expected: 24,
            found: 8,
        };
        assert_eq!(err.to_string(), "buffer too short: expected 24, found 8");
        assert_eq!(
            DecodeError::UnsupportedVersion(9).to_string(),
            "unsupported version: 9"
        );
        assert_eq!(
            DecodeError::ValueKindMismatch {
                expected: 1,
                found: 4
            }
            .to_string(),
            "value kind mismatch: expected 1, found 4"
        );
    }
}
