//! Host-facing approximate median aggregate
//!
//! [`AppxMedian`] is the surface a distributed query engine drives. Each
//! partition calls `init` and then `update` per row; at a partition boundary
//! the state is keyed and written to a host buffer with `serialize`; buffers
//! are combined with `merge` in whatever reduction order the host picks; one
//! final `finalize` yields the median.
//!
//! ```
//! use appx_median::aggregate::AppxMedian;
//! use appx_median::buffer::HeapAllocator;
//!
//! let mut agg = AppxMedian::with_seed(HeapAllocator, 7);
//!
//! // two partitions, built independently
//! let mut left = agg.init::<f64>();
//! let mut right = agg.init::<f64>();
//! for i in 0..600 {
//!     agg.update(&mut left, Some(i as f64), 200);
//! }
//! for i in 600..1000 {
//!     agg.update(&mut right, Some(i as f64), 200);
//! }
//!
//! let left_buf = agg.serialize(&mut left).unwrap();
//! let right_buf = agg.serialize(&mut right).unwrap();
//!
//! let mut total = agg.init::<f64>();
//! agg.merge(&mut total, left_buf).unwrap();
//! agg.merge(&mut total, right_buf).unwrap();
//!
//! assert_eq!(total.source_size(), 1000);
//! let median = agg.finalize(total).unwrap();
//! assert!(median > 350.0 && median < 650.0);
//! ```

use crate::buffer::{AllocError, BufferAllocator};
use crate::codec::serialized_size;
use crate::sampling::{ReservoirState, SampleValue};
use crate::traits::{DecodeError, EncodeError, MergeError};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Failure of one aggregate operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// The host could not provide a buffer
    Alloc(AllocError),
    /// A buffer handed back by the host was not a valid state
    Decode(DecodeError),
    /// A state could not be written
    Encode(EncodeError),
    /// Merge preconditions were violated
    Merge(MergeError),
}

impl core::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AggregateError::Alloc(e) => write!(f, "allocation failed: {}", e),
            AggregateError::Decode(e) => write!(f, "decode failed: {}", e),
            AggregateError::Encode(e) => write!(f, "encode failed: {}", e),
            AggregateError::Merge(e) => write!(f, "merge failed: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AggregateError::Alloc(e) => Some(e),
            AggregateError::Decode(e) => Some(e),
            AggregateError::Encode(e) => Some(e),
            AggregateError::Merge(e) => Some(e),
        }
    }
}

impl From<AllocError> for AggregateError {
    fn from(e: AllocError) -> Self {
        AggregateError::Alloc(e)
    }
}

impl From<DecodeError> for AggregateError {
    fn from(e: DecodeError) -> Self {
        AggregateError::Decode(e)
    }
}

impl From<EncodeError> for AggregateError {
    fn from(e: EncodeError) -> Self {
        AggregateError::Encode(e)
    }
}

impl From<MergeError> for AggregateError {
    fn from(e: MergeError) -> Self {
        AggregateError::Merge(e)
    }
}

/// Approximate median aggregate bound to a host allocator
///
/// Every state it creates or decodes gets its own generator, seeded from a
/// per-aggregate seed sequence, so no two states share random draws.
#[derive(Debug)]
pub struct AppxMedian<A: BufferAllocator> {
    allocator: A,
    seeds: SmallRng,
}

impl<A: BufferAllocator> AppxMedian<A> {
    /// Aggregate whose states are seeded from thread-local entropy
    #[cfg(feature = "std")]
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            seeds: SmallRng::from_rng(&mut rand::rng()),
        }
    }

    /// Aggregate whose states are seeded deterministically from `seed`
    pub fn with_seed(allocator: A, seed: u64) -> Self {
        Self {
            allocator,
            seeds: SmallRng::seed_from_u64(seed),
        }
    }

    /// The host allocator
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    fn next_seed(&mut self) -> u64 {
        self.seeds.next_u64()
    }

    /// Init: an empty state with capacity 0
    pub fn init<T: SampleValue>(&mut self) -> ReservoirState<T> {
        ReservoirState::with_seed(self.next_seed())
    }

    /// Update: ingest one row, `None` being a missing value
    pub fn update<T: SampleValue>(
        &self,
        state: &mut ReservoirState<T>,
        value: Option<T>,
        capacity: usize,
    ) {
        state.update(value, capacity);
    }

    /// Serialize: assign keys and write the state into a new host buffer
    pub fn serialize<T: SampleValue>(
        &mut self,
        state: &mut ReservoirState<T>,
    ) -> Result<Vec<u8>, AggregateError> {
        state.assign_keys();
        let mut buffer = self.allocator.allocate(serialized_size::<T>(state.capacity()))?;
        if let Err(err) = state.encode_into(&mut buffer) {
            self.allocator.free(buffer);
            return Err(err.into());
        }
        Ok(buffer)
    }

    /// Serialize into a buffer the host already holds for this aggregate
    ///
    /// The buffer is resized through the allocator when the capacity changed
    /// since it was last written.
    pub fn serialize_into<T: SampleValue>(
        &mut self,
        state: &mut ReservoirState<T>,
        buffer: Vec<u8>,
    ) -> Result<Vec<u8>, AggregateError> {
        state.assign_keys();
        let size = serialized_size::<T>(state.capacity());
        let mut buffer = if buffer.len() == size {
            buffer
        } else {
            self.allocator.reallocate(buffer, size)?
        };
        if let Err(err) = state.encode_into(&mut buffer) {
            self.allocator.free(buffer);
            return Err(err.into());
        }
        Ok(buffer)
    }

    /// Decode a buffer into a live state without releasing it
    pub fn deserialize<T: SampleValue>(
        &mut self,
        buffer: &[u8],
    ) -> Result<ReservoirState<T>, AggregateError> {
        let seed = self.next_seed();
        ReservoirState::from_bytes_with_seed(buffer, seed).map_err(|err| {
            #[cfg(feature = "logging")]
            log::warn!("rejecting serialized reservoir: {}", err);
            AggregateError::from(err)
        })
    }

    /// Merge: fold a serialized partial state into `dst`
    ///
    /// `dst` must be keyed. That holds for states from `init`, for states
    /// decoded from buffers written by `serialize`, and for the result of an
    /// earlier `merge`; a state decoded from an unkeyed `to_bytes` buffer
    /// needs `assign_keys` first. The source buffer is released to the
    /// allocator whether or not the merge succeeds.
    pub fn merge<T: SampleValue>(
        &mut self,
        dst: &mut ReservoirState<T>,
        src: Vec<u8>,
    ) -> Result<(), AggregateError> {
        debug_assert!(dst.keys_assigned(), "merge destination has unkeyed slots");
        let decoded = self.deserialize::<T>(&src);
        self.allocator.free(src);
        dst.merge_weighted(&decoded?)?;
        Ok(())
    }

    /// Finalize: the median of everything merged into `state`
    pub fn finalize<T: SampleValue>(&self, state: ReservoirState<T>) -> Option<T> {
        state.finalize()
    }

    /// Finalize straight from a serialized state, releasing its buffer
    pub fn finalize_serialized<T: SampleValue>(
        &mut self,
        buffer: Vec<u8>,
    ) -> Result<Option<T>, AggregateError> {
        let decoded = self.deserialize::<T>(&buffer);
        self.allocator.free(buffer);
        Ok(decoded?.finalize())
    }
}
