//! # appx-median
//!
//! Mergeable, memory-bounded approximate median for streams that are too
//! large to sort.
//!
//! Each partition of the data keeps a bounded uniform sample in a
//! [`ReservoirState`](sampling::ReservoirState) (Algorithm R). Before a
//! partial state leaves its partition, every retained value gets a priority
//! key scaled by how many observations that partition saw; partial states are
//! then merged by keeping the highest keys, so larger partitions stay
//! proportionally represented no matter how the merges are arranged. The
//! median is read from the final sample.
//!
//! ## Features
//!
//! - **Bounded memory**: a state never holds more than its capacity
//! - **Full Mergeability**: pairwise, in any order or tree shape
//! - **Growable capacity**: capacity can be raised mid-stream without losing slots
//! - **Fixed-width wire format**: header plus `capacity` slot records
//!
//! ## Quick Start
//!
//! ```rust
//! use appx_median::prelude::*;
//!
//! let mut state = ReservoirState::<f64>::with_seed(42);
//! for i in 0..=1000 {
//!     state.update(Some(i as f64), 1001);
//! }
//!
//! // every value fits, so the median is exact
//! assert_eq!(state.finalize(), Some(500.0));
//! ```
//!
//! ## Distributed Computing
//!
//! ```rust
//! use appx_median::prelude::*;
//!
//! let mut worker1 = ReservoirState::<f64>::with_seed(1);
//! let mut worker2 = ReservoirState::<f64>::with_seed(2);
//!
//! // Each worker processes its partition
//! for i in 0..10_000 {
//!     worker1.update(Some(i as f64), 256);
//!     worker2.update(Some((i + 10_000) as f64), 256);
//! }
//!
//! // Key both sides, then merge
//! worker1.assign_keys();
//! worker2.assign_keys();
//! worker1.merge(&worker2).unwrap();
//!
//! assert_eq!(worker1.count(), 20_000);
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support and entropy-seeded constructors
//! - `logging` (default): Diagnostics through the `log` facade
//! - `serde`: Enable serialization

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Helper macro for format! in both std and no_std
macro_rules! fmt {
    ($($arg:tt)*) => {{
        #[cfg(feature = "std")]
        { format!($($arg)*) }
        #[cfg(not(feature = "std"))]
        { alloc::format!($($arg)*) }
    }};
}

pub mod aggregate;
pub mod buffer;
pub mod codec;
pub mod quantiles;
pub mod sampling;
pub mod traits;

pub mod prelude {
    pub use crate::aggregate::{AggregateError, AppxMedian};
    pub use crate::buffer::{BufferAllocator, HeapAllocator, TrackingAllocator};
    pub use crate::sampling::{ReservoirState, SampleSlot, SampleValue, ShortBytes, Timestamp};
    pub use crate::traits::*;
}

pub use aggregate::AppxMedian;
pub use sampling::ReservoirState;
