//! Weighted merge of two keyed reservoirs
//!
//! Both operands summarize different populations. Because each slot's key
//! grows with the size of the stream it was drawn from, keeping the
//! highest-keyed slots of the union gives a sample of the combined population
//! where each side is represented in proportion to its source size.

use super::reservoir::ReservoirState;
use super::slot::SampleSlot;
use super::value::SampleValue;
use crate::traits::{MergeError, MergeSide};
use core::cmp::Ordering;

#[cfg(feature = "std")]
use std::collections::BinaryHeap;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::collections::BinaryHeap;

/// Heap entry ordered so the smallest key sits at the top of a `BinaryHeap`
struct MinKey<T>(SampleSlot<T>);

impl<T> MinKey<T> {
    fn key(&self) -> f64 {
        // Merge inputs are checked for keys before any entry is built.
        self.0.key.unwrap_or(f64::NEG_INFINITY)
    }
}

impl<T> PartialEq for MinKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key().total_cmp(&other.key()) == Ordering::Equal
    }
}

impl<T> Eq for MinKey<T> {}

impl<T> PartialOrd for MinKey<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for MinKey<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().total_cmp(&self.key())
    }
}

impl<T: SampleValue> ReservoirState<T> {
    /// Merge `src` into `self`, keeping the highest-keyed slots
    ///
    /// The result has capacity `max(self.capacity, src.capacity)` and holds
    /// the top slots by key of the union of both samples (all of them when
    /// the union is smaller than that). `src` is left untouched and the
    /// caller is expected to discard it.
    ///
    /// Ties between equal keys are broken arbitrarily.
    ///
    /// # Errors
    ///
    /// [`MergeError::UnassignedKey`] if either side has a slot without a key;
    /// call [`ReservoirState::assign_keys`] on both first. `self` is not
    /// modified in that case.
    pub fn merge_weighted(&mut self, src: &Self) -> Result<(), MergeError> {
        if let Some(index) = self.first_unkeyed() {
            return Err(MergeError::UnassignedKey {
                side: MergeSide::Destination,
                index,
            });
        }
        if let Some(index) = src.first_unkeyed() {
            return Err(MergeError::UnassignedKey {
                side: MergeSide::Source,
                index,
            });
        }

        let capacity = self.capacity().max(src.capacity());
        self.reserve(capacity);

        let mut heap: BinaryHeap<MinKey<T>> =
            self.slots_mut().drain(..).map(MinKey).collect();
        heap.reserve(capacity - heap.len());

        let mut incoming = src.slots().iter().copied();

        // Fill any free room first.
        while heap.len() < capacity {
            match incoming.next() {
                Some(slot) => heap.push(MinKey(slot)),
                None => break,
            }
        }

        // Then each remaining slot displaces the current minimum if it beats it.
        let mut displaced = 0usize;
        for slot in incoming {
            let Some(mut min) = heap.peek_mut() else {
                break;
            };
            if slot.key.unwrap_or(f64::NEG_INFINITY) > min.key() {
                *min = MinKey(slot);
                displaced += 1;
            }
        }

        let slots = self.slots_mut();
        slots.extend(heap.into_vec().into_iter().map(|entry| entry.0));
        let source_size = self.source_size() + src.source_size();
        self.set_source_size(source_size);

        #[cfg(feature = "logging")]
        log::trace!(
            "merged {} slots from a source of {}: retained {}, displaced {}",
            src.len(),
            src.source_size(),
            self.len(),
            displaced
        );
        #[cfg(not(feature = "logging"))]
        let _ = displaced;

        Ok(())
    }

    /// Assign keys on both sides and merge `src` in
    ///
    /// Convenience for callers that hold both states locally; never fails
    /// because both operands are keyed first.
    pub fn absorb(&mut self, mut src: Self) {
        self.assign_keys();
        src.assign_keys();
        if let Err(err) = self.merge_weighted(&src) {
            unreachable!("both operands were keyed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(capacity: usize, entries: &[(i64, f64)]) -> ReservoirState<i64> {
        let mut state = ReservoirState::with_seed(1);
        state.reserve(capacity);
        let slots = state.slots_mut();
        for &(value, key) in entries {
            slots.push(SampleSlot::with_key(value, key));
        }
        state.set_source_size(entries.len() as u64);
        state
    }

    fn sorted_values(state: &ReservoirState<i64>) -> Vec<i64> {
        let mut values: Vec<i64> = state.values().collect();
        values.sort_unstable();
        values
    }

    #[test]
    fn test_fill_phase_keeps_everything() {
        let mut dst = keyed(5, &[(1, 0.5), (2, 0.6)]);
        let src = keyed(5, &[(3, 0.1), (4, 0.2)]);

        dst.merge_weighted(&src).unwrap();

        assert_eq!(sorted_values(&dst), vec![1, 2, 3, 4]);
        assert_eq!(dst.source_size(), 4);
        assert_eq!(dst.capacity(), 5);
    }

    #[test]
    fn test_displace_keeps_highest_keys() {
        let mut dst = keyed(3, &[(1, 0.9), (2, 0.2), (3, 0.5)]);
        let src = keyed(3, &[(4, 0.1), (5, 0.95), (6, 0.4), (7, 0.6)]);

        dst.merge_weighted(&src).unwrap();

        // top three keys overall: 0.95, 0.9, 0.6
        assert_eq!(sorted_values(&dst), vec![1, 5, 7]);
        assert_eq!(dst.source_size(), 7);
    }

    #[test]
    fn test_equal_key_does_not_displace() {
        let mut dst = keyed(1, &[(1, 0.5)]);
        let src = keyed(1, &[(2, 0.5)]);

        dst.merge_weighted(&src).unwrap();
        assert_eq!(sorted_values(&dst), vec![1]);
    }

    #[test]
    fn test_capacity_is_max_of_both() {
        let mut dst = keyed(2, &[(1, 0.1), (2, 0.2)]);
        let src = keyed(4, &[(3, 0.3), (4, 0.4), (5, 0.5), (6, 0.6)]);

        dst.merge_weighted(&src).unwrap();

        assert_eq!(dst.capacity(), 4);
        assert_eq!(sorted_values(&dst), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_smaller_source_capacity_does_not_shrink() {
        let mut dst = keyed(4, &[(1, 0.1)]);
        let src = keyed(1, &[(2, 0.2)]);

        dst.merge_weighted(&src).unwrap();
        assert_eq!(dst.capacity(), 4);
        assert_eq!(sorted_values(&dst), vec![1, 2]);
    }

    #[test]
    fn test_zero_capacity_merge() {
        let mut dst = ReservoirState::<i64>::with_seed(1);
        let mut src = ReservoirState::<i64>::with_seed(2);
        for i in 0..10 {
            src.update(Some(i), 0);
        }
        src.assign_keys();

        dst.merge_weighted(&src).unwrap();
        assert!(dst.is_empty());
        assert_eq!(dst.source_size(), 10);
    }

    #[test]
    fn test_rejects_unkeyed_source() {
        let mut dst = keyed(4, &[(1, 0.1)]);
        let mut src = ReservoirState::<i64>::with_seed(2);
        src.update(Some(7), 4);

        let err = dst.merge_weighted(&src).unwrap_err();
        assert_eq!(
            err,
            MergeError::UnassignedKey {
                side: MergeSide::Source,
                index: 0
            }
        );
        // destination untouched
        assert_eq!(sorted_values(&dst), vec![1]);
        assert_eq!(dst.source_size(), 1);
    }

    #[test]
    fn test_rejects_unkeyed_destination() {
        let mut dst = ReservoirState::<i64>::with_seed(1);
        dst.update(Some(1), 4);
        dst.update(Some(2), 4);
        let src = keyed(4, &[(3, 0.3)]);

        assert!(matches!(
            dst.merge_weighted(&src),
            Err(MergeError::UnassignedKey {
                side: MergeSide::Destination,
                ..
            })
        ));
    }

    #[test]
    fn test_absorb() {
        let mut left = ReservoirState::<i64>::with_seed(1);
        let mut right = ReservoirState::<i64>::with_seed(2);
        for i in 0..100 {
            left.update(Some(i), 10);
        }
        for i in 100..130 {
            right.update(Some(i), 20);
        }

        left.absorb(right);

        assert_eq!(left.source_size(), 130);
        assert_eq!(left.capacity(), 20);
        assert_eq!(left.len(), 20);
        assert!(left.keys_assigned());
    }
}
