//! A single retained observation

/// One retained observation and its merge priority
///
/// `key` is `None` until keys are assigned; a slot without a key cannot take
/// part in a weighted merge.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleSlot<T> {
    /// The retained value
    pub value: T,
    /// Priority used to decide retention when reservoirs are merged
    pub key: Option<f64>,
}

impl<T> SampleSlot<T> {
    /// Slot holding `value` with no priority yet
    pub fn new(value: T) -> Self {
        Self { value, key: None }
    }

    /// Slot holding `value` with an already assigned priority
    pub fn with_key(value: T, key: f64) -> Self {
        Self {
            value,
            key: Some(key),
        }
    }

    /// Whether a priority has been assigned
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }
}
