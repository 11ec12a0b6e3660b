//! Host allocator capability for serialized states
//!
//! Serialized reservoirs live in buffers owned by the host. The host decides
//! how those bytes are obtained and accounted for; the aggregate only asks
//! for sizes through [`BufferAllocator`].

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Error returned when the host cannot provide a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The request would exceed the allocator's byte budget
    LimitExceeded { requested: usize, available: usize },
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocError::LimitExceeded {
                requested,
                available,
            } => write!(
                f,
                "allocation of {} bytes exceeds budget ({} available)",
                requested, available
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}

/// Source of byte buffers for serialized states
pub trait BufferAllocator {
    /// Obtain a zeroed buffer of exactly `size` bytes
    fn allocate(&mut self, size: usize) -> Result<Vec<u8>, AllocError>;

    /// Resize `buffer` to exactly `new_size` bytes, keeping its prefix
    ///
    /// On error the buffer is released.
    fn reallocate(&mut self, buffer: Vec<u8>, new_size: usize) -> Result<Vec<u8>, AllocError>;

    /// Return a buffer to the host
    fn free(&mut self, buffer: Vec<u8>);
}

/// Plain heap allocation with no accounting
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn allocate(&mut self, size: usize) -> Result<Vec<u8>, AllocError> {
        let mut buffer = Vec::new();
        buffer.resize(size, 0);
        Ok(buffer)
    }

    fn reallocate(&mut self, mut buffer: Vec<u8>, new_size: usize) -> Result<Vec<u8>, AllocError> {
        buffer.resize(new_size, 0);
        buffer.shrink_to_fit();
        Ok(buffer)
    }

    fn free(&mut self, buffer: Vec<u8>) {
        drop(buffer);
    }
}

/// Heap allocation under a fixed byte budget
///
/// Tracks the bytes currently handed out and the high-water mark, the way a
/// query engine's memory tracker would.
#[derive(Debug, Clone)]
pub struct TrackingAllocator {
    limit: usize,
    in_use: usize,
    peak: usize,
}

impl TrackingAllocator {
    /// Allocator that refuses to hand out more than `limit` bytes at once
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            in_use: 0,
            peak: 0,
        }
    }

    /// Bytes currently outstanding
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Most bytes ever outstanding at once
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Byte budget this allocator was created with
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn charge(&mut self, size: usize) -> Result<(), AllocError> {
        let available = self.limit - self.in_use;
        if size > available {
            return Err(AllocError::LimitExceeded {
                requested: size,
                available,
            });
        }
        self.in_use += size;
        self.peak = self.peak.max(self.in_use);
        Ok(())
    }
}

impl BufferAllocator for TrackingAllocator {
    fn allocate(&mut self, size: usize) -> Result<Vec<u8>, AllocError> {
        self.charge(size)?;
        HeapAllocator.allocate(size)
    }

    fn reallocate(&mut self, buffer: Vec<u8>, new_size: usize) -> Result<Vec<u8>, AllocError> {
        // buffers this allocator did not hand out are not charged
        self.in_use = self.in_use.saturating_sub(buffer.len());
        if let Err(err) = self.charge(new_size) {
            drop(buffer);
            return Err(err);
        }
        HeapAllocator.reallocate(buffer, new_size)
    }

    fn free(&mut self, buffer: Vec<u8>) {
        self.in_use = self.in_use.saturating_sub(buffer.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_allocate_is_zeroed() {
        let buf = HeapAllocator.allocate(32).unwrap();
        assert_eq!(buf.len(), 32);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_heap_reallocate_keeps_prefix() {
        let mut alloc = HeapAllocator;
        let mut buf = alloc.allocate(4).unwrap();
        buf.copy_from_slice(&[1, 2, 3, 4]);

        let grown = alloc.reallocate(buf, 6).unwrap();
        assert_eq!(grown, vec![1, 2, 3, 4, 0, 0]);

        let shrunk = alloc.reallocate(grown, 2).unwrap();
        assert_eq!(shrunk, vec![1, 2]);
    }

    #[test]
    fn test_tracking_accounts_bytes() {
        let mut alloc = TrackingAllocator::new(100);
        let a = alloc.allocate(40).unwrap();
        let b = alloc.allocate(50).unwrap();
        assert_eq!(alloc.in_use(), 90);

        let a = alloc.reallocate(a, 10).unwrap();
        assert_eq!(alloc.in_use(), 60);
        assert_eq!(alloc.peak(), 90);

        alloc.free(a);
        alloc.free(b);
        assert_eq!(alloc.in_use(), 0);
    }

    #[test]
    fn test_tracking_limit() {
        let mut alloc = TrackingAllocator::new(64);
        let buf = alloc.allocate(60).unwrap();

        assert_eq!(
            alloc.allocate(8).unwrap_err(),
            AllocError::LimitExceeded {
                requested: 8,
                available: 4
            }
        );

        // a failed reallocation releases the old buffer
        assert!(alloc.reallocate(buf, 65).is_err());
        assert_eq!(alloc.in_use(), 0);
    }

    #[test]
    fn test_tracking_foreign_buffer() {
        let mut alloc = TrackingAllocator::new(64);
        let own = alloc.allocate(16).unwrap();

        // a buffer allocated elsewhere never drives the count below zero
        alloc.free(vec![0u8; 48]);
        assert_eq!(alloc.in_use(), 0);

        let grown = alloc.reallocate(vec![0u8; 100], 8).unwrap();
        assert_eq!(grown.len(), 8);
        assert_eq!(alloc.in_use(), 8);

        alloc.free(own);
        alloc.free(grown);
        assert_eq!(alloc.in_use(), 0);
    }
}
