//! Mergeable reservoir state
//!
//! A [`ReservoirState`] keeps a bounded uniform sample of a stream with
//! Algorithm R. Before it leaves the thread that built it, every retained slot
//! is given a priority key scaled by how many observations the state has
//! seen, so that states built over streams of different lengths can later be
//! merged by keeping the highest keys (see [`ReservoirState::merge_weighted`]).

use super::slot::SampleSlot;
use super::value::SampleValue;
use crate::traits::{MergeError, SamplingSketch, Sketch};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Bounded weighted reservoir over values of type `T`
///
/// # Lifecycle
///
/// 1. Start empty with capacity 0 ([`ReservoirState::new`] or
///    [`ReservoirState::with_seed`]).
/// 2. Feed observations with [`ReservoirState::update`], which also raises the
///    capacity when asked to. Capacity never shrinks.
/// 3. Call [`ReservoirState::assign_keys`] before the state is merged or
///    serialized.
/// 4. Merge other keyed states in with [`ReservoirState::merge_weighted`].
/// 5. Read the lower median with [`ReservoirState::finalize`].
///
/// # Example
///
/// ```
/// use appx_median::sampling::ReservoirState;
///
/// let mut left = ReservoirState::<f64>::with_seed(1);
/// let mut right = ReservoirState::<f64>::with_seed(2);
///
/// for i in 0..500 {
///     left.update(Some(i as f64), 64);
/// }
/// for i in 500..1000 {
///     right.update(Some(i as f64), 64);
/// }
///
/// left.assign_keys();
/// right.assign_keys();
/// left.merge_weighted(&right).unwrap();
///
/// assert_eq!(left.source_size(), 1000);
/// assert_eq!(left.len(), 64);
/// let median = left.finalize().unwrap();
/// assert!(median > 250.0 && median < 750.0);
/// ```
#[derive(Clone, Debug)]
pub struct ReservoirState<T: SampleValue> {
    /// Maximum number of retained slots
    capacity: usize,
    /// Retained slots, `slots.len()` is the populated count
    slots: Vec<SampleSlot<T>>,
    /// Observations summarized, including ones inherited through merges
    source_size: u64,
    /// Generator owned by this state alone
    rng: SmallRng,
}

impl<T: SampleValue> ReservoirState<T> {
    /// Create an empty state seeded from thread-local entropy
    #[cfg(feature = "std")]
    pub fn new() -> Self {
        Self::from_rng(SmallRng::from_rng(&mut rand::rng()))
    }

    /// Create an empty state with a fixed seed (for reproducibility)
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(SmallRng::seed_from_u64(seed))
    }

    /// Create an empty state with storage reserved for `capacity` slots
    #[cfg(feature = "std")]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut state = Self::new();
        state.reserve(capacity);
        state
    }

    fn from_rng(rng: SmallRng) -> Self {
        Self {
            capacity: 0,
            slots: Vec::new(),
            source_size: 0,
            rng,
        }
    }

    /// Rebuild a state from decoded parts; callers validate the invariants.
    pub(crate) fn from_parts(
        capacity: usize,
        slots: Vec<SampleSlot<T>>,
        source_size: u64,
        rng: SmallRng,
    ) -> Self {
        debug_assert!(slots.len() <= capacity);
        debug_assert!(source_size >= slots.len() as u64);
        let mut state = Self {
            capacity: 0,
            slots,
            source_size,
            rng,
        };
        state.reserve(capacity);
        state
    }

    /// Raise the capacity to `capacity`, keeping every retained slot
    ///
    /// Returns whether the capacity grew. Requests below the current capacity
    /// are ignored: an aggregation that needs a smaller sample has to start
    /// over with a new state.
    pub fn reserve(&mut self, capacity: usize) -> bool {
        if capacity <= self.capacity {
            if capacity < self.capacity {
                #[cfg(feature = "logging")]
                log::trace!(
                    "ignoring capacity shrink request: {} < {}",
                    capacity,
                    self.capacity
                );
            }
            return false;
        }

        #[cfg(feature = "logging")]
        log::debug!("growing reservoir capacity {} -> {}", self.capacity, capacity);

        self.slots.reserve_exact(capacity - self.slots.len());
        self.capacity = capacity;
        true
    }

    /// Ingest one observation, growing to `requested_capacity` first if needed
    ///
    /// `None` and absent values (such as NaN) are skipped without touching
    /// the state.
    pub fn update(&mut self, value: Option<T>, requested_capacity: usize) {
        let value = match value {
            Some(v) if !v.is_absent() => v,
            _ => return,
        };
        self.reserve(requested_capacity);
        self.add(value);
    }

    /// Ingest one observation at the current capacity (Algorithm R)
    ///
    /// While the state is filling the value is always kept. Once full, it
    /// replaces a uniformly chosen slot with probability
    /// `capacity / source_size`.
    pub fn add(&mut self, value: T) {
        if value.is_absent() {
            return;
        }
        self.source_size += 1;

        if self.slots.len() < self.capacity {
            self.slots.push(SampleSlot::new(value));
        } else {
            let r = self.rng.random_range(0..self.source_size);
            if r < self.capacity as u64 {
                self.slots[r as usize] = SampleSlot::new(value);
            }
        }
    }

    /// Give every unkeyed slot a priority key
    ///
    /// The key is `(source_size - r) / source_size` with `r` drawn uniformly
    /// from `[0, len)`, which places keys in
    /// `((source_size - len) / source_size, 1]`: the range a true A-Res
    /// priority would fall in for a slot that won its place in a stream of
    /// `source_size` observations. Already keyed slots are left alone, so
    /// calling this more than once is harmless.
    pub fn assign_keys(&mut self) {
        let count = self.slots.len() as u64;
        if count == 0 {
            return;
        }
        let source_size = self.source_size as f64;

        for slot in self.slots.iter_mut().filter(|s| s.key.is_none()) {
            let r = self.rng.random_range(0..count);
            slot.key = Some((source_size - r as f64) / source_size);
        }
    }

    /// Whether every retained slot has a priority key
    pub fn keys_assigned(&self) -> bool {
        self.slots.iter().all(SampleSlot::has_key)
    }

    /// Index of the first slot without a priority key
    pub(crate) fn first_unkeyed(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.has_key())
    }

    /// Get the reservoir capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of populated slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no slot is populated
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Check if reservoir is full
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Observations this state summarizes
    pub fn source_size(&self) -> u64 {
        self.source_size
    }

    /// The retained slots, in no particular order
    pub fn slots(&self) -> &[SampleSlot<T>] {
        &self.slots
    }

    /// The retained values, in no particular order
    pub fn values(&self) -> impl Iterator<Item = T> + '_ {
        self.slots.iter().map(|s| s.value)
    }

    pub(crate) fn slots_mut(&mut self) -> &mut Vec<SampleSlot<T>> {
        &mut self.slots
    }

    pub(crate) fn set_source_size(&mut self, source_size: u64) {
        self.source_size = source_size;
    }

    /// Get the sampling probability for the current state
    ///
    /// This is the probability that any given observation is retained.
    pub fn sampling_probability(&self) -> f64 {
        if self.source_size == 0 {
            0.0
        } else {
            ((self.capacity as f64) / (self.source_size as f64)).min(1.0)
        }
    }
}

#[cfg(feature = "std")]
impl<T: SampleValue> Default for ReservoirState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SampleValue> Sketch for ReservoirState<T> {
    type Item = T;

    fn update(&mut self, item: &Self::Item) {
        self.add(*item);
    }

    /// Weighted merge; both sides must already carry priority keys.
    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        self.merge_weighted(other)
    }

    /// Drops every slot but keeps the capacity, which never shrinks.
    fn clear(&mut self) {
        self.slots.clear();
        self.source_size = 0;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.slots.capacity() * core::mem::size_of::<SampleSlot<T>>()
    }

    fn count(&self) -> u64 {
        self.source_size
    }
}

impl<T: SampleValue> SamplingSketch for ReservoirState<T> {
    type Retained = SampleSlot<T>;

    fn sample(&self) -> &[SampleSlot<T>] {
        &self.slots
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(feature = "serde")]
impl<T: SampleValue + serde::Serialize> serde::Serialize for ReservoirState<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ReservoirState", 3)?;
        state.serialize_field("capacity", &self.capacity)?;
        state.serialize_field("source_size", &self.source_size)?;
        state.serialize_field("slots", &self.slots)?;
        state.end()
    }
}

/// The generator is not part of the serialized form; a decoded state gets a
/// fresh one.
#[cfg(all(feature = "serde", feature = "std"))]
impl<'de, T> serde::Deserialize<'de> for ReservoirState<T>
where
    T: SampleValue + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(serde::Deserialize)]
        #[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
        struct StateData<T> {
            capacity: usize,
            source_size: u64,
            slots: Vec<SampleSlot<T>>,
        }

        let mut data = StateData::<T>::deserialize(deserializer)?;
        if data.slots.len() > data.capacity {
            return Err(D::Error::custom(format!(
                "{} slots exceed capacity {}",
                data.slots.len(),
                data.capacity
            )));
        }
        if data.source_size < data.slots.len() as u64 {
            return Err(D::Error::custom(format!(
                "source size {} is below slot count {}",
                data.source_size,
                data.slots.len()
            )));
        }
        for (index, slot) in data.slots.iter_mut().enumerate() {
            if slot.value.is_absent() {
                return Err(D::Error::custom(format!(
                    "slot {} holds an absent value",
                    index
                )));
            }
            match slot.key {
                Some(key) if key.is_nan() => {
                    return Err(D::Error::custom(format!("slot {} has a NaN key", index)));
                }
                // negative keys mean unassigned, as in the binary layout
                Some(key) if key < 0.0 => slot.key = None,
                _ => {}
            }
        }
        Ok(Self::from_parts(
            data.capacity,
            data.slots,
            data.source_size,
            SmallRng::from_rng(&mut rand::rng()),
        ))
    }
}
