//! Fixed-width value encodings that a reservoir can retain
//!
//! A reservoir never stores variable-length payloads. Each supported value
//! type has one fixed-size, directly comparable encoding, and a kind tag that
//! is written into the wire header so a buffer is never decoded as the wrong
//! type.

use crate::traits::DecodeError;
use byteorder::{ByteOrder, LittleEndian};
use core::cmp::Ordering;
use core::fmt::Debug;

/// Longest byte string a [`ShortBytes`] keeps; longer input is truncated
pub const MAX_SHORT_BYTES_LEN: usize = 10;

/// Tag identifying a value encoding on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    /// IEEE 754 double
    Float64 = 1,
    /// Signed 64-bit integer
    Int64 = 2,
    /// Unscaled 128-bit fixed-point decimal
    Decimal128 = 3,
    /// Byte string of up to ten bytes
    ShortBytes = 4,
    /// Date plus time of day
    Timestamp = 5,
}

impl ValueKind {
    /// Byte written into the header
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Inverse of [`ValueKind::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ValueKind::Float64),
            2 => Some(ValueKind::Int64),
            3 => Some(ValueKind::Decimal128),
            4 => Some(ValueKind::ShortBytes),
            5 => Some(ValueKind::Timestamp),
            _ => None,
        }
    }
}

/// A value that can be retained in a reservoir slot
///
/// Implementors provide a total order used by the median and a fixed-width
/// little-endian encoding of exactly [`SampleValue::ENCODED_LEN`] bytes.
pub trait SampleValue: Copy + Debug + PartialEq {
    /// Wire tag for this encoding
    const KIND: ValueKind;

    /// Width of one encoded value in bytes
    const ENCODED_LEN: usize;

    /// Total order over values
    fn sample_cmp(&self, other: &Self) -> Ordering;

    /// Whether this observation should be skipped like a missing value
    fn is_absent(&self) -> bool {
        false
    }

    /// Write the value into `out`, which is exactly `ENCODED_LEN` bytes long
    fn encode(&self, out: &mut [u8]);

    /// Read a value from exactly `ENCODED_LEN` bytes
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError>;
}

impl SampleValue for f64 {
    const KIND: ValueKind = ValueKind::Float64;
    const ENCODED_LEN: usize = 8;

    fn sample_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    /// NaN carries no rank information and would sort past every real value.
    fn is_absent(&self) -> bool {
        self.is_nan()
    }

    fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_f64(out, *self);
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(LittleEndian::read_f64(bytes))
    }
}

impl SampleValue for i64 {
    const KIND: ValueKind = ValueKind::Int64;
    const ENCODED_LEN: usize = 8;

    fn sample_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_i64(out, *self);
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(LittleEndian::read_i64(bytes))
    }
}

/// Unscaled fixed-point decimals are compared as their 128-bit integer value.
impl SampleValue for i128 {
    const KIND: ValueKind = ValueKind::Decimal128;
    const ENCODED_LEN: usize = 16;

    fn sample_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_i128(out, *self);
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(LittleEndian::read_i128(bytes))
    }
}

/// Byte string truncated to at most [`MAX_SHORT_BYTES_LEN`] bytes
///
/// Ordered byte-lexicographically over the common prefix, with the shorter
/// string first when one is a prefix of the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShortBytes {
    bytes: [u8; MAX_SHORT_BYTES_LEN],
    len: u8,
}

impl ShortBytes {
    /// Keep the first [`MAX_SHORT_BYTES_LEN`] bytes of `input`
    pub fn new(input: &[u8]) -> Self {
        let len = input.len().min(MAX_SHORT_BYTES_LEN);
        let mut bytes = [0u8; MAX_SHORT_BYTES_LEN];
        bytes[..len].copy_from_slice(&input[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    /// The retained bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Number of retained bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether no bytes are retained
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl From<&str> for ShortBytes {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<&[u8]> for ShortBytes {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl PartialOrd for ShortBytes {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ShortBytes {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl SampleValue for ShortBytes {
    const KIND: ValueKind = ValueKind::ShortBytes;
    const ENCODED_LEN: usize = MAX_SHORT_BYTES_LEN + 1;

    fn sample_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn encode(&self, out: &mut [u8]) {
        out[..MAX_SHORT_BYTES_LEN].copy_from_slice(&self.bytes);
        out[MAX_SHORT_BYTES_LEN] = self.len;
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let len = bytes[MAX_SHORT_BYTES_LEN] as usize;
        if len > MAX_SHORT_BYTES_LEN {
            return Err(DecodeError::Corrupted(
                "short byte string longer than its fixed width".into(),
            ));
        }
        Ok(Self::new(&bytes[..len]))
    }
}

/// Calendar date plus time of day
///
/// Ordered by `date`, then by `time_of_day`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    /// Days since an epoch chosen by the caller
    pub date: i32,
    /// Nanoseconds since midnight
    pub time_of_day: i64,
}

impl Timestamp {
    /// Timestamp from a day number and nanoseconds into that day
    pub fn new(date: i32, time_of_day: i64) -> Self {
        Self { date, time_of_day }
    }
}

impl SampleValue for Timestamp {
    const KIND: ValueKind = ValueKind::Timestamp;
    const ENCODED_LEN: usize = 12;

    fn sample_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_i32(&mut out[..4], self.date);
        LittleEndian::write_i64(&mut out[4..12], self.time_of_day);
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            date: LittleEndian::read_i32(&bytes[..4]),
            time_of_day: LittleEndian::read_i64(&bytes[4..12]),
        })
    }
}
