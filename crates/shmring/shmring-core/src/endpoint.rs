use crate::buffer::Buffer;
use crate::error::RingError;
use crate::ring::{Ring, Side};
use shmring_layout::{RingHeader, link_blocks, BLOCK_HEADER_LEN};
use shmring_region::{MmapFile, MmapFileMut};
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::atomic::{AtomicBool, Ordering};

/// Simplex: one ring, shared by both sides of a self-connected endpoint.
/// Duplex: two independent rings laid out back-to-back; each peer's read
/// side is the other peer's write side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Simplex,
    Duplex,
}

impl Kind {
    fn ring_count(self) -> u64 {
        match self {
            Kind::Simplex => 1,
            Kind::Duplex => 2,
        }
    }
}

/// A per-process handle to a ring (Simplex) or ring pair (Duplex).
///
/// Every operation takes `&self`: all mutable state either lives in the
/// mapped region behind atomics (the protocol's own synchronization) or is
/// the single `closed` flag here. This is deliberately weaker than requiring
/// `&mut self` — the whole point of the protocol is that a reader thread and
/// a writer thread can each hold a reference to the same `Endpoint` and
/// drive their own side concurrently. Driving the *same* side from two
/// threads at once is a contract violation the type system does not catch,
/// exactly as in the reference implementation this is modeled on; see
/// DESIGN.md.
#[derive(Debug)]
pub struct Endpoint {
    // Order matters only for readability; Rust doesn't guarantee drop order
    // beyond field declaration order, and dropping `_region` last is what we
    // want since `read_ring`/`write_ring` are raw pointers into it.
    read_ring: Ring,
    write_ring: Ring,
    closed: AtomicBool,
    _region: MmapFileMut,
}

// SAFETY: all shared mutable state reachable through `Endpoint` is either
// behind the region's atomics (cursors, done flags, semaphores) or behind
// `closed` (an AtomicBool). The raw pointers in `Ring` point at memory that
// outlives the `Endpoint` itself (owned by `_region`), so moving an
// `Endpoint` across threads, or sharing `&Endpoint` across threads, is sound.
unsafe impl Send for Endpoint {}
unsafe impl Sync for Endpoint {}

impl Endpoint {
    /// The fixed payload capacity of every block on this endpoint's write side.
    pub fn block_size(&self) -> usize {
        self.write_ring.block_size() as usize
    }

    fn check_open(&self) -> Result<(), RingError> {
        if self.closed.load(Ordering::Acquire) {
            Err(RingError::Closed)
        } else {
            Ok(())
        }
    }

    fn create(name: &str, kind: Kind, block_count: u64, block_size: u64) -> Result<Self, RingError> {
        let ring_len = shmring_layout::ring_len(block_count, block_size)?;
        let ring_count = kind.ring_count();
        let total = ring_len.checked_mul(ring_count).ok_or(RingError::RegionTooLarge)?;
        shmring_layout::check_region_size(total)?;

        tracing::debug!(name, block_count, block_size, total, "creating shared-memory ring region");

        let mut region = MmapFileMut::create_named(name, total, 0o644)?;
        let base = region.as_mut_ptr();
        let stride = BLOCK_HEADER_LEN as u64 + block_size;

        for r in 0..ring_count {
            // SAFETY: `base` covers `ring_count * ring_len` freshly-truncated
            // (zeroed by the OS) bytes; `r < ring_count` keeps this offset in
            // range, and nothing else has a reference to this region yet.
            unsafe {
                let ring_base = base.add((r * ring_len) as usize);
                std::ptr::write_bytes(ring_base, 0, ring_len as usize);
                RingHeader::init_at(ring_base as *mut RingHeader, block_count, block_size)?;
                let blocks_base = ring_base.add(size_of::<RingHeader>());
                link_blocks(blocks_base, block_count, stride);
                // Published last, with Release ordering: the handshake that
                // tells an opener this ring's layout is complete.
                (&*(ring_base as *const RingHeader)).publish_version();
            }
        }

        // SAFETY: every ring above has been fully initialized and
        // version-stamped before this point.
        let (read_ring, write_ring) = unsafe {
            match kind {
                Kind::Simplex => {
                    let ring = Ring::from_base(base, block_count, block_size);
                    (ring, ring)
                }
                Kind::Duplex => {
                    // Creator (peer A) convention: ring0 is its write side,
                    // ring1 is its read side; the opener mirrors this.
                    let ring0 = Ring::from_base(base, block_count, block_size);
                    let ring1 = Ring::from_base(base.add(ring_len as usize), block_count, block_size);
                    (ring1, ring0)
                }
            }
        };

        Ok(Endpoint { read_ring, write_ring, closed: AtomicBool::new(false), _region: region })
    }

    fn open(name: &str, kind: Kind) -> Result<Self, RingError> {
        let header_len = size_of::<RingHeader>();
        let (block_count, block_size) = {
            let probe = MmapFile::open_named_header(name, header_len)?;
            // SAFETY: `probe` maps exactly `header_len` bytes read-only,
            // enough for a full `RingHeader`.
            let header = unsafe { &*(probe.as_ptr() as *const RingHeader) };
            header.validate()?;
            (header.block_count, header.block_size)
        };

        tracing::debug!(name, block_count, block_size, "opening shared-memory ring region");

        let ring_len = shmring_layout::ring_len(block_count, block_size)?;
        let ring_count = kind.ring_count();
        let total = ring_len.checked_mul(ring_count).ok_or(RingError::RegionTooLarge)?;

        let mut region = MmapFileMut::open_named(name, total)?;
        let base = region.as_mut_ptr();

        // SAFETY: the header validated above (Acquire-ordered load of a
        // matching `version`) happens-before every field the creator wrote
        // prior to its Release-ordered `publish_version`, including the
        // block links.
        let (read_ring, write_ring) = unsafe {
            match kind {
                Kind::Simplex => {
                    let ring = Ring::from_base(base, block_count, block_size);
                    (ring, ring)
                }
                Kind::Duplex => {
                    let ring0 = Ring::from_base(base, block_count, block_size);
                    let ring1 = Ring::from_base(base.add(ring_len as usize), block_count, block_size);
                    // Opener (peer B) mirrors the creator: reads what peer A
                    // writes (ring0), writes what peer A reads (ring1).
                    (ring0, ring1)
                }
            }
        };

        Ok(Endpoint { read_ring, write_ring, closed: AtomicBool::new(false), _region: region })
    }

    pub fn create_simplex(name: &str, block_count: u64, block_size: u64) -> Result<Self, RingError> {
        Self::create(name, Kind::Simplex, block_count, block_size)
    }

    pub fn open_simplex(name: &str) -> Result<Self, RingError> {
        Self::open(name, Kind::Simplex)
    }

    pub fn create_duplex(name: &str, block_count: u64, block_size: u64) -> Result<Self, RingError> {
        Self::create(name, Kind::Duplex, block_count, block_size)
    }

    pub fn open_duplex(name: &str) -> Result<Self, RingError> {
        Self::open(name, Kind::Duplex)
    }

    /// Removes `name` from the shared-memory namespace. Existing mappings in
    /// live processes remain valid until they unmap.
    pub fn unlink(name: &str) -> Result<(), RingError> {
        tracing::debug!(name, "unlinking shared-memory ring region");
        shmring_region::unlink_named(name).map_err(RingError::Os)
    }

    /// CAS-idempotent: a second call is a no-op. Does not itself unmap the
    /// region (any outstanding `Buffer<'_>` borrows `&self`, so Rust's
    /// borrow checker already refuses to let the `Endpoint` — and thus the
    /// mapping — drop while one is alive); it only makes every subsequent
    /// buffer operation fail fast with `Closed`.
    pub fn close(&self) -> Result<(), RingError> {
        let was_open = self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if was_open {
            tracing::debug!("endpoint closed");
        }
        Ok(())
    }

    pub fn get_read_buffer(&self) -> Result<Buffer<'_>, RingError> {
        self.check_open()?;
        let ring = self.read_ring;
        loop {
            let start = ring.check_index(ring.header().read_start.load(Ordering::Acquire))?;
            let block = ring.block(start);
            let write_end = ring.header().write_end.load(Ordering::Acquire);

            if start == write_end {
                tracing::trace!("read ring empty, waiting on sem_signal");
                ring.header().sem_signal.wait()?;
                continue;
            }

            let next = block.next;
            if ring
                .header()
                .read_start
                .compare_exchange(start, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let size = ring.block(start).size.load(Ordering::Acquire) as usize;
                return Ok(Buffer { ring, index: start, side: Side::Read, len: size, _marker: PhantomData });
            }
        }
    }

    pub fn send_read_buffer(&self, buf: Buffer<'_>) -> Result<(), RingError> {
        self.check_open()?;
        if !buf.is_read_side() {
            return Err(RingError::InvalidBuffer);
        }
        let ring = self.read_ring;
        ring.block(buf.index).done_read.store(1, Ordering::Release);

        loop {
            let idx = ring.check_index(ring.header().read_end.load(Ordering::Acquire))?;
            let block = ring.block(idx);

            if block
                .done_read
                .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Ok(());
            }

            let next = block.next;
            let prev = block.prev;
            let _ = ring.header().read_end.compare_exchange(idx, next, Ordering::AcqRel, Ordering::Acquire);

            if prev == ring.header().write_start.load(Ordering::Acquire) {
                ring.header().sem_avail.post()?;
            }
        }
    }

    pub fn get_write_buffer(&self) -> Result<Buffer<'_>, RingError> {
        self.check_open()?;
        let ring = self.write_ring;
        loop {
            let start = ring.check_index(ring.header().write_start.load(Ordering::Acquire))?;
            let block = ring.block(start);
            let next = block.next;
            let read_end = ring.header().read_end.load(Ordering::Acquire);

            if next == read_end {
                tracing::trace!("write ring full, waiting on sem_avail");
                ring.header().sem_avail.wait()?;
                continue;
            }

            if ring
                .header()
                .write_start
                .compare_exchange(start, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(Buffer { ring, index: start, side: Side::Write, len: 0, _marker: PhantomData });
            }
        }
    }

    pub fn send_write_buffer(&self, buf: Buffer<'_>) -> Result<usize, RingError> {
        self.check_open()?;
        if buf.is_read_side() {
            return Err(RingError::InvalidBuffer);
        }
        let ring = self.write_ring;
        let n = buf.len();
        let block = ring.block(buf.index);
        block.size.store(n as u64, Ordering::Release);
        block.done_write.store(1, Ordering::Release);

        loop {
            let idx = ring.check_index(ring.header().write_end.load(Ordering::Acquire))?;
            let block = ring.block(idx);

            if block
                .done_write
                .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Ok(n);
            }

            let next = block.next;
            let _ = ring.header().write_end.compare_exchange(idx, next, Ordering::AcqRel, Ordering::Acquire);

            if idx == ring.header().read_start.load(Ordering::Acquire) {
                ring.header().sem_signal.post()?;
            }
        }
    }
}
