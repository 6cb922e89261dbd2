//! Binary layout of a single ring's header.
//!
//! # Memory layout
//!
//! The header fits one cache line plus however much room the platform's
//! `sem_t` needs, rounded back up to a 64-byte boundary, so the hot cursors
//! never share a line with block[0]'s hot `done_*` flags.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ version │ block_count │ block_size │ read_start │ read_end │ ...  │  (56 B)
//! ├──────────────────────────────────────────────────────────────────┤
//! │  sem_signal  │  sem_avail  │  pad to 64-byte boundary             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                         Block[0]                                  │
//! │                           ...                                     │
//! │                      Block[block_count - 1]                       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use shmring_sem::RawSemaphore;
use std::mem::size_of;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stamp identifying a fully-initialized ring.
///
/// ASCII-ish encoding of "SHMRING\x01": `0x53 48 4D 52 49 4E 47 01`. Bumped
/// whenever the on-wire layout changes incompatibly; [`RingHeader::validate`]
/// rejects anything else, including the all-zero bytes a freshly-truncated
/// file starts with.
pub const RING_VERSION: u64 = 0x5348_4D52_494E_4701;

const CURSOR_FIELDS_LEN: usize = 7 * size_of::<u64>();

/// Bytes of padding needed after the two semaphores to reach a 64-byte
/// boundary. Computed from the platform's actual `sem_t` size rather than
/// assuming a fixed 16 or 32 bytes, since that size is not part of the
/// POSIX contract.
const fn header_pad_len() -> usize {
    let used = CURSOR_FIELDS_LEN + 2 * size_of::<RawSemaphore>();
    let rem = used % 64;
    if rem == 0 { 0 } else { 64 - rem }
}

/// Padding length, exposed for tests and for callers computing offsets by hand.
pub const HEADER_PAD_LEN: usize = header_pad_len();

/// Header at the start of every ring in the shared region.
///
/// `#[repr(C)]` pins field order so the layout is stable across rebuilds of
/// either peer, which is the whole point: two independently-compiled
/// processes read this struct out of the same bytes.
#[repr(C)]
pub struct RingHeader {
    /// Nonzero once layout is complete; written last, with `Release`
    /// ordering, during create. Readers load it with `Acquire` ordering as
    /// their handshake that everything below is safe to read.
    pub version: AtomicU64,

    /// Number of blocks in the ring. Immutable after create.
    pub block_count: u64,
    /// Payload bytes per block. Immutable after create. Always a multiple of 64.
    pub block_size: u64,

    /// Cursor: next block the reader will reserve.
    pub read_start: AtomicU64,
    /// Cursor: next block the reader will complete release of.
    pub read_end: AtomicU64,
    /// Cursor: next block the writer will reserve.
    pub write_start: AtomicU64,
    /// Cursor: next block the writer will complete release of.
    pub write_end: AtomicU64,

    /// Reader sleeps here when the ring is empty; writer posts on publish.
    pub sem_signal: RawSemaphore,
    /// Writer sleeps here when the ring is full; reader posts on release.
    pub sem_avail: RawSemaphore,

    /// Padding to the next 64-byte boundary. Not application-visible; see
    /// `BlockHeader::flags` for the per-block opaque byte array applications
    /// actually get to use.
    _pad: [u8; HEADER_PAD_LEN],
}

impl RingHeader {
    /// Writes the immutable fields, zeroed cursors, and uninitialized-but-valid
    /// semaphores into `dst`, which must point at a zeroed `RingHeader`-sized
    /// region. Does **not** write `version` — callers publish that last via
    /// [`RingHeader::publish_version`] once the rest of the ring (including the
    /// block links) has been written.
    ///
    /// # Safety
    /// `dst` must be valid for writes of `size_of::<RingHeader>()` bytes and
    /// properly aligned, and must not be concurrently observed by another
    /// thread/process until `publish_version` completes.
    pub unsafe fn init_at(dst: *mut RingHeader, block_count: u64, block_size: u64) -> io::Result<()> {
        unsafe {
            (*dst).block_count = block_count;
            (*dst).block_size = block_size;
            (*dst).read_start.store(0, Ordering::Relaxed);
            (*dst).read_end.store(0, Ordering::Relaxed);
            (*dst).write_start.store(0, Ordering::Relaxed);
            (*dst).write_end.store(0, Ordering::Relaxed);
            (*dst).sem_signal.init(0)?;
            (*dst).sem_avail.init(0)?;
        }
        Ok(())
    }

    /// Stores the version stamp with `Release` ordering. This must be the last
    /// write a creator performs on a ring: it is the signal an opener's
    /// `Acquire` load of `version` synchronizes with.
    #[inline]
    pub fn publish_version(&self) {
        self.version.store(RING_VERSION, Ordering::Release);
    }

    /// Loads `version` with `Acquire` ordering and checks it against
    /// [`RING_VERSION`]. `Ok(())` means every field written before the
    /// matching `publish_version` is now safely visible to this thread.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.version.load(Ordering::Acquire) != RING_VERSION {
            return Err(LayoutError::BadVersion);
        }
        Ok(())
    }
}

use std::io;

/// Errors detected purely from header/size validation, before any protocol
/// state machine runs.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("block_size is not a multiple of 64")]
    BlockSizeNotMultipleOf64,
    #[error("region size exceeds the 1 GiB limit")]
    RegionTooLarge,
    #[error("version stamp missing or mismatched")]
    BadVersion,
}

/// Size in bytes of one ring's block array: `block_count * (block header + block_size)`.
#[inline]
pub fn block_area_len(block_count: u64, block_size: u64) -> u64 {
    block_count * (crate::block::BLOCK_HEADER_LEN as u64 + block_size)
}

/// Total byte length of a single ring (header + all blocks), after validating
/// `block_size`'s alignment requirement. Does not enforce the 1 GiB ceiling —
/// callers multiply by the ring count (1 for Simplex, 2 for Duplex) first and
/// check that combined total with [`check_region_size`].
pub fn ring_len(block_count: u64, block_size: u64) -> Result<u64, LayoutError> {
    if block_size % 64 != 0 {
        return Err(LayoutError::BlockSizeNotMultipleOf64);
    }
    Ok(size_of::<RingHeader>() as u64 + block_area_len(block_count, block_size))
}

/// Maximum region size allowed by the protocol.
pub const MAX_REGION_LEN: u64 = 1 << 30;

/// Rejects a total region size (across all rings) over [`MAX_REGION_LEN`].
pub fn check_region_size(total_len: u64) -> Result<(), LayoutError> {
    if total_len > MAX_REGION_LEN {
        return Err(LayoutError::RegionTooLarge);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_64_byte_multiple() {
        assert_eq!(size_of::<RingHeader>() % 64, 0);
    }

    #[test]
    fn ring_len_rejects_misaligned_block_size() {
        assert!(matches!(
            ring_len(8, 100),
            Err(LayoutError::BlockSizeNotMultipleOf64)
        ));
    }

    #[test]
    fn ring_len_accounts_for_header_and_blocks() {
        let len = ring_len(4, 64).unwrap();
        assert_eq!(
            len,
            size_of::<RingHeader>() as u64 + 4 * (crate::block::BLOCK_HEADER_LEN as u64 + 64)
        );
    }

    #[test]
    fn region_size_ceiling_enforced() {
        assert!(check_region_size(MAX_REGION_LEN).is_ok());
        assert!(check_region_size(MAX_REGION_LEN + 1).is_err());
    }
}
