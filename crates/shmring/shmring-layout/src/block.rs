//! Binary layout of one block: the fixed-size unit of transfer.
//!
//! A block is a header (this module) immediately followed by `block_size`
//! payload bytes. Because `block_size` is a runtime value (fixed per-ring but
//! not known at compile time), the payload is never a Rust array field —
//! callers compute its address as `block_ptr + size_of::<BlockHeader>()`.

use std::mem::size_of;
use std::sync::atomic::AtomicU64;

const BLOCK_CURSOR_FIELDS_LEN: usize = 5 * size_of::<u64>();

const fn block_flags_len() -> usize {
    let rem = BLOCK_CURSOR_FIELDS_LEN % 64;
    if rem == 0 { 0 } else { 64 - rem }
}

/// Length of the per-block opaque flags array. Bit 0 of `flags[0]` is the
/// EOF marker (see [`EOF_BIT`]); the rest is free for application trailers.
pub const BLOCK_FLAGS_LEN: usize = block_flags_len();

/// Bit 0 of `flags[0]`: set on the last block of a logical stream.
pub const EOF_BIT: u8 = 0x01;

/// Fixed per-block header, padded to 64 bytes.
#[repr(C)]
pub struct BlockHeader {
    /// Index of the next block clockwise around the ring. Set once at
    /// create time; immutable thereafter.
    pub next: u64,
    /// Index of the previous block. Set once at create time; immutable
    /// thereafter.
    pub prev: u64,

    /// Set to 1 by the reader on release, then raced back to 0 by the
    /// cursor-advance loop; see the ring protocol's release algorithm.
    pub done_read: AtomicU64,
    /// Same dance as `done_read`, on the writer's side.
    pub done_write: AtomicU64,

    /// Valid payload length in bytes, `<= block_size`. Written by the
    /// producer before `done_write` is set.
    pub size: AtomicU64,

    /// Opaque per-block byte array; `flags[0] & EOF_BIT` is the EOF marker,
    /// the rest is passed through unchanged for application use (e.g. a
    /// trailing checksum).
    pub flags: [u8; BLOCK_FLAGS_LEN],
}

/// Size of [`BlockHeader`] in bytes. Always 64 — the struct has no
/// runtime-sized fields, unlike the ring header (whose size depends on the
/// platform's `sem_t`).
pub const BLOCK_HEADER_LEN: usize = size_of::<BlockHeader>();
