use crate::error::RingError;
use shmring_layout::{BLOCK_HEADER_LEN, BlockHeader, RingHeader};

/// Raw-pointer view of one ring inside the mapped region.
///
/// Plain old data: copying a `Ring` just copies pointers and lengths, never
/// the bytes they point at. A [`crate::endpoint::Endpoint`] holds one or two
/// of these (two, pointing at the same ring, for Simplex; two independent
/// ones for Duplex) alongside the `MmapFileMut` that keeps the pages alive.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Ring {
    header: *mut RingHeader,
    blocks_base: *mut u8,
    block_count: u64,
    block_size: u64,
    stride: u64,
}

impl Ring {
    /// # Safety
    /// `base` must point at a valid, fully-initialized `RingHeader` followed
    /// immediately by `block_count` blocks of `stride` bytes each, and must
    /// remain valid for as long as the returned `Ring` is used.
    pub(crate) unsafe fn from_base(base: *mut u8, block_count: u64, block_size: u64) -> Self {
        let header = base as *mut RingHeader;
        let blocks_base = unsafe { base.add(size_of::<RingHeader>()) };
        Ring { header, blocks_base, block_count, block_size, stride: BLOCK_HEADER_LEN as u64 + block_size }
    }

    #[inline]
    pub(crate) fn header(&self) -> &RingHeader {
        // SAFETY: `header` was constructed from a live mapping in `from_base`
        // and outlives every `Ring` derived from it (owned by the endpoint).
        unsafe { &*self.header }
    }

    #[inline]
    pub(crate) fn block_size(&self) -> u64 {
        self.block_size
    }

    #[inline]
    fn block_ptr(&self, index: u64) -> *mut BlockHeader {
        // SAFETY: caller has validated `index < block_count` via `check_index`.
        unsafe { self.blocks_base.add((index * self.stride) as usize) as *mut BlockHeader }
    }

    #[inline]
    pub(crate) fn block(&self, index: u64) -> &BlockHeader {
        unsafe { &*self.block_ptr(index) }
    }

    #[inline]
    pub(crate) fn block_mut(&self, index: u64) -> &mut BlockHeader {
        unsafe { &mut *self.block_ptr(index) }
    }

    #[inline]
    pub(crate) fn block_data_ptr(&self, index: u64) -> *mut u8 {
        unsafe { self.block_ptr(index).add(1) as *mut u8 }
    }

    /// Validates a cursor value read from the shared header. Any value
    /// outside `[0, block_count)` means the peer (or our own process) has
    /// corrupted the ring; the spec mandates treating this as fatal rather
    /// than clamping or retrying.
    #[inline]
    pub(crate) fn check_index(&self, index: u64) -> Result<u64, RingError> {
        if index < self.block_count {
            Ok(index)
        } else {
            Err(RingError::InvalidSharedMemory("cursor out of [0, block_count) range"))
        }
    }
}

use std::mem::size_of;

/// Which side of the ring a [`crate::buffer::Buffer`] was acquired from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Read,
    Write,
}
