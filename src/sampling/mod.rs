//! Stream sampling algorithms
//!
//! This module provides the bounded, mergeable reservoir that the median is
//! estimated from. Each partition of a stream builds its own
//! [`ReservoirState`]; the states are keyed and then merged pairwise in any
//! order or tree shape.
//!
//! # Example
//!
//! ```
//! use appx_median::sampling::ReservoirState;
//!
//! let mut state = ReservoirState::<f64>::with_seed(11);
//!
//! // Stream a million values, keep a uniform sample of 100
//! for i in 0..1_000_000 {
//!     state.update(Some(i as f64), 100);
//! }
//!
//! assert_eq!(state.len(), 100);
//! assert_eq!(state.source_size(), 1_000_000);
//! ```

mod merge;
mod reservoir;
mod slot;
mod value;

pub use reservoir::ReservoirState;
pub use slot::SampleSlot;
pub use value::{SampleValue, ShortBytes, Timestamp, ValueKind, MAX_SHORT_BYTES_LEN};
