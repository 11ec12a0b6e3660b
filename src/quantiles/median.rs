//! Lower-median finalizer

use crate::sampling::{ReservoirState, SampleValue};
use crate::traits::MedianSketch;

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Sort `values` and return the element at index `len / 2`
///
/// Even-sized inputs are not averaged: the element at that index is returned
/// as is. The sort is stable, so equal values keep their relative order.
pub fn lower_median<T: SampleValue>(values: &mut [T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.sample_cmp(b));
    Some(values[values.len() / 2])
}

impl<T: SampleValue> ReservoirState<T> {
    /// Consume the state and return the median of its retained values
    ///
    /// Returns `None` when nothing was retained. Keys are assigned first so a
    /// state is never read with unkeyed slots.
    pub fn finalize(mut self) -> Option<T> {
        self.assign_keys();
        let slots = self.slots_mut();
        if slots.is_empty() {
            return None;
        }
        slots.sort_by(|a, b| a.value.sample_cmp(&b.value));
        Some(slots[slots.len() / 2].value)
    }
}

impl<T: SampleValue> MedianSketch for ReservoirState<T> {
    type Value = T;

    /// Non-consuming variant of [`ReservoirState::finalize`]
    fn median(&self) -> Option<T> {
        let mut values: Vec<T> = self.values().collect();
        lower_median(&mut values)
    }
}
