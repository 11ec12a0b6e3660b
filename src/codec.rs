//! Binary layout of a reservoir in transit
//!
//! A serialized reservoir is one fixed-size header followed by exactly
//! `capacity` fixed-size slot records, so the buffer size depends only on the
//! capacity and the value type, never on how many slots are populated.
//!
//! ## Header Layout (Little Endian)
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0-3 | magic | `b"RSVM"` |
//! | 4 | serial_version | Currently 1 |
//! | 5 | value_kind | [`ValueKind`](crate::sampling::ValueKind) tag |
//! | 6-7 | reserved | Always 0 |
//! | 8-11 | capacity | Number of slot records that follow (u32) |
//! | 12-15 | count | Populated records, all at the front (u32) |
//! | 16-23 | source_size | Observations summarized (u64) |
//!
//! ## Slot Record
//!
//! | Bytes | Field |
//! |-------|-------|
//! | `0..ENCODED_LEN` | value, see [`SampleValue`] |
//! | next 8 | priority key (f64), `-1.0` when unassigned |
//!
//! Records past `count` hold a zeroed value and the unassigned key.

use crate::sampling::{ReservoirState, SampleSlot, SampleValue};
use crate::traits::{DecodeError, EncodeError};
use byteorder::{ByteOrder, LittleEndian};
use rand::rngs::SmallRng;
use rand::SeedableRng;

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// First four bytes of every serialized reservoir
pub const MAGIC: [u8; 4] = *b"RSVM";
/// Layout version written at byte 4
pub const SERIAL_VERSION: u8 = 1;
/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = 24;
/// Width of the priority key in each slot record
pub const KEY_LEN: usize = 8;
/// Key written for slots that have not been given a priority
pub const UNASSIGNED_KEY: f64 = -1.0;

/// Bytes taken by one slot record for values of type `T`
pub fn record_len<T: SampleValue>() -> usize {
    T::ENCODED_LEN + KEY_LEN
}

/// Bytes needed to serialize a reservoir of the given capacity
pub fn serialized_size<T: SampleValue>(capacity: usize) -> usize {
    HEADER_LEN + capacity * record_len::<T>()
}

impl<T: SampleValue> ReservoirState<T> {
    /// Size of this state's serialized form
    pub fn encoded_len(&self) -> usize {
        serialized_size::<T>(self.capacity())
    }

    /// Write this state into `out`, which must be exactly
    /// [`ReservoirState::encoded_len`] bytes
    ///
    /// Every byte of `out` is overwritten, so a reused buffer is fine.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<(), EncodeError> {
        let capacity = self.capacity();
        if capacity > u32::MAX as usize {
            return Err(EncodeError::CapacityOverflow(capacity));
        }
        let expected = self.encoded_len();
        if out.len() != expected {
            return Err(EncodeError::BufferSizeMismatch {
                expected,
                found: out.len(),
            });
        }

        out[0..4].copy_from_slice(&MAGIC);
        out[4] = SERIAL_VERSION;
        out[5] = T::KIND.tag();
        out[6] = 0;
        out[7] = 0;
        LittleEndian::write_u32(&mut out[8..12], capacity as u32);
        LittleEndian::write_u32(&mut out[12..16], self.len() as u32);
        LittleEndian::write_u64(&mut out[16..24], self.source_size());

        let record = record_len::<T>();
        let records = out[HEADER_LEN..].chunks_exact_mut(record);
        let mut slots = self.slots().iter();
        for chunk in records {
            let (value, key) = chunk.split_at_mut(T::ENCODED_LEN);
            match slots.next() {
                Some(slot) => {
                    slot.value.encode(value);
                    LittleEndian::write_f64(key, slot.key.unwrap_or(UNASSIGNED_KEY));
                }
                None => {
                    value.fill(0);
                    LittleEndian::write_f64(key, UNASSIGNED_KEY);
                }
            }
        }
        Ok(())
    }

    /// Serialize into a freshly allocated buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        out.resize(self.encoded_len(), 0u8);
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Decode a serialized state, giving it a generator seeded with `seed`
    pub fn from_bytes_with_seed(bytes: &[u8], seed: u64) -> Result<Self, DecodeError> {
        let (capacity, slots, source_size) = decode_parts::<T>(bytes)?;
        Ok(Self::from_parts(
            capacity,
            slots,
            source_size,
            SmallRng::seed_from_u64(seed),
        ))
    }

    /// Decode a serialized state, giving it a generator seeded from entropy
    #[cfg(feature = "std")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (capacity, slots, source_size) = decode_parts::<T>(bytes)?;
        Ok(Self::from_parts(
            capacity,
            slots,
            source_size,
            SmallRng::from_rng(&mut rand::rng()),
        ))
    }
}

fn decode_parts<T: SampleValue>(
    bytes: &[u8],
) -> Result<(usize, Vec<SampleSlot<T>>, u64), DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::BufferTooShort {
            expected: HEADER_LEN,
            found: bytes.len(),
        });
    }
    if bytes[0..4] != MAGIC {
        return Err(DecodeError::InvalidHeader);
    }
    if bytes[4] != SERIAL_VERSION {
        return Err(DecodeError::UnsupportedVersion(bytes[4]));
    }
    if bytes[5] != T::KIND.tag() {
        return Err(DecodeError::ValueKindMismatch {
            expected: T::KIND.tag(),
            found: bytes[5],
        });
    }

    let capacity = LittleEndian::read_u32(&bytes[8..12]) as usize;
    let count = LittleEndian::read_u32(&bytes[12..16]) as usize;
    let source_size = LittleEndian::read_u64(&bytes[16..24]);

    if count > capacity {
        return Err(DecodeError::Corrupted(fmt!(
            "count {} exceeds capacity {}",
            count,
            capacity
        )));
    }
    if source_size < count as u64 {
        return Err(DecodeError::Corrupted(fmt!(
            "source size {} is below count {}",
            source_size,
            count
        )));
    }

    let expected = serialized_size::<T>(capacity);
    if bytes.len() < expected {
        return Err(DecodeError::BufferTooShort {
            expected,
            found: bytes.len(),
        });
    }
    if bytes.len() > expected {
        return Err(DecodeError::Corrupted(fmt!(
            "{} trailing bytes after {} slot records",
            bytes.len() - expected,
            capacity
        )));
    }

    let mut slots = Vec::with_capacity(capacity);
    for (index, record) in bytes[HEADER_LEN..]
        .chunks_exact(record_len::<T>())
        .take(count)
        .enumerate()
    {
        let (value, key) = record.split_at(T::ENCODED_LEN);
        let value = T::decode(value)?;
        if value.is_absent() {
            return Err(DecodeError::Corrupted(fmt!(
                "slot {} holds an absent value",
                index
            )));
        }
        let key = LittleEndian::read_f64(key);
        if key.is_nan() {
            return Err(DecodeError::Corrupted(fmt!("slot {} has a NaN key", index)));
        }
        slots.push(SampleSlot {
            value,
            key: if key < 0.0 { None } else { Some(key) },
        });
    }

    Ok((capacity, slots, source_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::ShortBytes;

    fn sample_state() -> ReservoirState<f64> {
        let mut state = ReservoirState::with_seed(5);
        for i in 0..100 {
            state.update(Some(i as f64), 8);
        }
        state
    }

    #[test]
    fn test_serialized_size() {
        assert_eq!(serialized_size::<f64>(0), HEADER_LEN);
        assert_eq!(serialized_size::<f64>(10), HEADER_LEN + 10 * 16);
        assert_eq!(serialized_size::<ShortBytes>(3), HEADER_LEN + 3 * 19);
    }

    #[test]
    fn test_roundtrip() {
        let mut state = sample_state();
        state.assign_keys();

        let bytes = state.to_bytes().unwrap();
        assert_eq!(bytes.len(), serialized_size::<f64>(8));

        let back = ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1).unwrap();
        assert_eq!(back.capacity(), 8);
        assert_eq!(back.source_size(), 100);
        assert_eq!(back.slots(), state.slots());
    }

    #[test]
    fn test_unassigned_keys_survive() {
        let state = sample_state();
        let bytes = state.to_bytes().unwrap();
        let back = ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1).unwrap();
        assert!(back.slots().iter().all(|s| s.key.is_none()));
    }

    #[test]
    fn test_unused_records_layout() {
        let mut state = ReservoirState::<f64>::with_seed(5);
        state.update(Some(2.5), 3);
        state.assign_keys();

        let bytes = state.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"RSVM");
        assert_eq!(bytes[4], SERIAL_VERSION);
        assert_eq!(bytes[5], 1);
        assert_eq!(LittleEndian::read_u32(&bytes[8..12]), 3);
        assert_eq!(LittleEndian::read_u32(&bytes[12..16]), 1);
        assert_eq!(LittleEndian::read_u64(&bytes[16..24]), 1);

        let first = &bytes[HEADER_LEN..HEADER_LEN + 16];
        assert_eq!(LittleEndian::read_f64(&first[..8]), 2.5);
        assert_eq!(LittleEndian::read_f64(&first[8..]), 1.0);

        for record in bytes[HEADER_LEN + 16..].chunks_exact(16) {
            assert_eq!(&record[..8], &[0u8; 8]);
            assert_eq!(LittleEndian::read_f64(&record[8..]), UNASSIGNED_KEY);
        }
    }

    #[test]
    fn test_encode_overwrites_reused_buffer() {
        let state = sample_state();
        let mut buf = vec![0xffu8; state.encoded_len()];
        state.encode_into(&mut buf).unwrap();
        assert_eq!(buf, state.to_bytes().unwrap());
    }

    #[test]
    fn test_encode_size_mismatch() {
        let state = sample_state();
        let mut buf = vec![0u8; 10];
        assert_eq!(
            state.encode_into(&mut buf),
            Err(EncodeError::BufferSizeMismatch {
                expected: state.encoded_len(),
                found: 10
            })
        );
    }

    #[test]
    fn test_empty_state() {
        let state = ReservoirState::<f64>::with_seed(5);
        let bytes = state.to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);

        let back = ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1).unwrap();
        assert_eq!(back.capacity(), 0);
        assert!(back.is_empty());
    }

    #[test]
    fn test_grow_between_cycles() {
        let mut state = sample_state();
        state.assign_keys();
        let bytes = state.to_bytes().unwrap();

        let mut back = ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1).unwrap();
        for i in 100..120 {
            back.update(Some(i as f64), 16);
        }
        assert_eq!(back.capacity(), 16);
        assert_eq!(back.len(), 16);
        assert_eq!(back.source_size(), 120);

        back.assign_keys();
        let grown = back.to_bytes().unwrap();
        assert_eq!(grown.len(), serialized_size::<f64>(16));

        let again = ReservoirState::<f64>::from_bytes_with_seed(&grown, 2).unwrap();
        assert_eq!(again.slots(), back.slots());
        assert_eq!(again.source_size(), 120);
    }

    #[test]
    fn test_decode_too_short() {
        let result = ReservoirState::<f64>::from_bytes_with_seed(&[0u8; 10], 1);
        assert_eq!(
            result.unwrap_err(),
            DecodeError::BufferTooShort {
                expected: HEADER_LEN,
                found: 10
            }
        );

        let bytes = sample_state().to_bytes().unwrap();
        let result = ReservoirState::<f64>::from_bytes_with_seed(&bytes[..bytes.len() - 1], 1);
        assert!(matches!(
            result,
            Err(DecodeError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_decode_bad_header() {
        let mut bytes = sample_state().to_bytes().unwrap();
        bytes[0] = b'X';
        assert_eq!(
            ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1).unwrap_err(),
            DecodeError::InvalidHeader
        );
    }

    #[test]
    fn test_decode_bad_version() {
        let mut bytes = sample_state().to_bytes().unwrap();
        bytes[4] = 7;
        assert_eq!(
            ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1).unwrap_err(),
            DecodeError::UnsupportedVersion(7)
        );
    }

    #[test]
    fn test_decode_wrong_kind() {
        let bytes = sample_state().to_bytes().unwrap();
        assert_eq!(
            ReservoirState::<i64>::from_bytes_with_seed(&bytes, 1).unwrap_err(),
            DecodeError::ValueKindMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_decode_count_over_capacity() {
        let mut bytes = sample_state().to_bytes().unwrap();
        LittleEndian::write_u32(&mut bytes[12..16], 9);
        assert!(matches!(
            ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1),
            Err(DecodeError::Corrupted(_))
        ));
    }

    #[test]
    fn test_decode_source_below_count() {
        let mut bytes = sample_state().to_bytes().unwrap();
        LittleEndian::write_u64(&mut bytes[16..24], 3);
        assert!(matches!(
            ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1),
            Err(DecodeError::Corrupted(_))
        ));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut bytes = sample_state().to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1),
            Err(DecodeError::Corrupted(_))
        ));
    }

    #[test]
    fn test_decode_nan_key() {
        let mut bytes = sample_state().to_bytes().unwrap();
        LittleEndian::write_f64(&mut bytes[HEADER_LEN + 8..HEADER_LEN + 16], f64::NAN);
        assert!(matches!(
            ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1),
            Err(DecodeError::Corrupted(_))
        ));
    }

    #[test]
    fn test_decode_nan_value() {
        let mut state = ReservoirState::<f64>::with_seed(5);
        for value in [1.0, 2.0, 3.0] {
            state.update(Some(value), 3);
        }
        state.assign_keys();
        let mut bytes = state.to_bytes().unwrap();
        LittleEndian::write_f64(&mut bytes[HEADER_LEN..HEADER_LEN + 8], f64::NAN);

        assert!(matches!(
            ReservoirState::<f64>::from_bytes_with_seed(&bytes, 1),
            Err(DecodeError::Corrupted(_))
        ));
    }

    #[test]
    fn test_short_bytes_roundtrip() {
        let mut state = ReservoirState::<ShortBytes>::with_seed(5);
        for word in ["kiwi", "a much longer string", ""] {
            state.update(Some(ShortBytes::from(word)), 4);
        }
        let bytes = state.to_bytes().unwrap();
        let back = ReservoirState::<ShortBytes>::from_bytes_with_seed(&bytes, 1).unwrap();
        let values: Vec<ShortBytes> = back.values().collect();
        assert_eq!(
            values,
            vec![
                ShortBytes::from("kiwi"),
                ShortBytes::from("a much lon"),
                ShortBytes::from("")
            ]
        );
    }
}
