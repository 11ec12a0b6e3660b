//! Rank estimates taken from a reservoir sample
//!
//! The median of a merged [`ReservoirState`](crate::sampling::ReservoirState)
//! is read by sorting the retained values and taking the lower median. It is
//! a rank estimate over the sample, not an interpolated value.
//!
//! # Example
//!
//! ```
//! use appx_median::sampling::ReservoirState;
//! use appx_median::traits::MedianSketch;
//!
//! let mut state = ReservoirState::<f64>::with_seed(3);
//! for value in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0] {
//!     state.update(Some(value), 100);
//! }
//!
//! // lower median of ten retained values
//! assert_eq!(state.median(), Some(6.0));
//! ```

mod median;

pub use median::lower_median;
