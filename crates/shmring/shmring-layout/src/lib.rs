//! Binary layout definitions for the shared-memory ring buffer.
//!
//! This crate owns the `#[repr(C)]` structs two independently-compiled
//! processes agree on byte-for-byte: the per-ring header and the per-block
//! header, plus the size arithmetic and initial block-linking that only
//! depend on that layout. It knows nothing about `mmap`, semaphores beyond
//! their raw type, or the acquire/release protocol — those live in
//! `shmring-region` and `shmring-core` respectively.

mod block;
mod header;

pub use block::{BLOCK_FLAGS_LEN, BLOCK_HEADER_LEN, BlockHeader, EOF_BIT};
pub use header::{HEADER_PAD_LEN, LayoutError, MAX_REGION_LEN, RING_VERSION, RingHeader};
pub use header::{block_area_len, check_region_size, ring_len};

use std::sync::atomic::Ordering;

/// Links `block_count` blocks into a circular doubly-linked list: block `i`
/// gets `next = (i + 1) % block_count`, `prev = (i - 1 + block_count) % block_count`.
///
/// # Safety
/// `blocks_base` must point at `block_count` contiguous, zeroed
/// `stride`-byte slots (`stride >= BLOCK_HEADER_LEN`), valid for writes, not
/// concurrently observed by another thread/process.
pub unsafe fn link_blocks(blocks_base: *mut u8, block_count: u64, stride: u64) {
    for i in 0..block_count {
        let next = if i + 1 == block_count { 0 } else { i + 1 };
        let prev = if i == 0 { block_count - 1 } else { i - 1 };

        // SAFETY: i < block_count, so the offset stays within the caller's
        // promised block_count * stride region.
        let block = unsafe { &mut *(blocks_base.add((i * stride) as usize) as *mut BlockHeader) };
        block.next = next;
        block.prev = prev;
        block.done_read.store(0, Ordering::Relaxed);
        block.done_write.store(0, Ordering::Relaxed);
        block.size.store(0, Ordering::Relaxed);
        block.flags = [0; BLOCK_FLAGS_LEN];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::{Layout, alloc_zeroed, dealloc};

    #[test]
    fn link_blocks_wraps_around() {
        let stride = BLOCK_HEADER_LEN as u64 + 64;
        let count = 4u64;
        let layout = Layout::from_size_align((stride * count) as usize, 64).unwrap();
        let base = unsafe { alloc_zeroed(layout) };
        unsafe { link_blocks(base, count, stride) };

        let block_at = |i: u64| unsafe { &*(base.add((i * stride) as usize) as *const BlockHeader) };

        assert_eq!(block_at(0).next, 1);
        assert_eq!(block_at(0).prev, 3);
        assert_eq!(block_at(3).next, 0);
        assert_eq!(block_at(3).prev, 2);
        assert_eq!(block_at(1).next, 2);
        assert_eq!(block_at(1).prev, 0);

        unsafe { dealloc(base, layout) };
    }
}
