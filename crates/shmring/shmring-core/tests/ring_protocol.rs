//! Protocol-level tests.
//!
//! These drive the ring purely through its public API from separate OS
//! threads rather than separate processes: the protocol only ever
//! synchronizes through the mapped region's atomics and semaphores, never
//! through process-local state, so a thread opening its own [`Endpoint`]
//! handle to the same name is indistinguishable, from the ring's point of
//! view, from a second process doing the same.

use shmring_core::{Endpoint, RingError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

static SEQ: AtomicU64 = AtomicU64::new(0);

fn unique_name(tag: &str) -> String {
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("/shmring_test_{tag}_{}_{}", std::process::id(), n)
}

#[test]
fn round_trip_one_block() {
    let name = unique_name("roundtrip");
    let ep = Endpoint::create_simplex(&name, 4, 64).unwrap();

    let mut w = ep.get_write_buffer().unwrap();
    w.data_mut()[..5].copy_from_slice(b"hello");
    w.set_len(5);
    ep.send_write_buffer(w).unwrap();

    let r = ep.get_read_buffer().unwrap();
    assert_eq!(r.len(), 5);
    assert_eq!(&r.data()[..5], b"hello");
    ep.send_read_buffer(r).unwrap();

    Endpoint::unlink(&name).unwrap();
}

#[test]
fn full_ring_blocks_further_writes_until_a_read_completes() {
    let name = unique_name("full");
    let ep = Arc::new(Endpoint::create_simplex(&name, 4, 64).unwrap());

    // block_count - 1 = 3 writable slots before the ring reports full.
    let w0 = ep.get_write_buffer().unwrap();
    let w1 = ep.get_write_buffer().unwrap();
    let _w2 = ep.get_write_buffer().unwrap();

    let blocked = Arc::clone(&ep);
    let handle = thread::spawn(move || {
        // This must block until a read frees capacity.
        blocked.get_write_buffer().unwrap();
    });

    thread::sleep(Duration::from_millis(100));
    assert!(!handle.is_finished(), "get_write_buffer returned before any capacity was freed");

    ep.send_write_buffer(w0).unwrap();
    let r = ep.get_read_buffer().unwrap();
    ep.send_read_buffer(r).unwrap();

    handle.join().expect("writer thread panicked");
    drop(w1);
    Endpoint::unlink(&name).unwrap();
}

#[test]
fn empty_ring_blocks_reads_until_a_write_arrives() {
    let name = unique_name("empty");
    let ep = Arc::new(Endpoint::create_simplex(&name, 4, 64).unwrap());

    let blocked = Arc::clone(&ep);
    let handle = thread::spawn(move || blocked.get_read_buffer().unwrap().len());

    thread::sleep(Duration::from_millis(100));
    assert!(!handle.is_finished(), "get_read_buffer returned before anything was written");

    let mut w = ep.get_write_buffer().unwrap();
    w.data_mut()[0] = 7;
    w.set_len(1);
    ep.send_write_buffer(w).unwrap();

    let len = handle.join().expect("reader thread panicked");
    assert_eq!(len, 1);

    Endpoint::unlink(&name).unwrap();
}

#[test]
fn eof_flag_propagates_from_writer_to_reader() {
    let name = unique_name("eof");
    let ep = Endpoint::create_simplex(&name, 4, 64).unwrap();

    let mut w = ep.get_write_buffer().unwrap();
    w.set_len(0);
    w.set_eof(true);
    ep.send_write_buffer(w).unwrap();

    let r = ep.get_read_buffer().unwrap();
    assert!(r.eof());
    assert_eq!(r.len(), 0);
    ep.send_read_buffer(r).unwrap();

    Endpoint::unlink(&name).unwrap();
}

#[test]
fn cursors_wrap_around_the_block_list_correctly() {
    let name = unique_name("wrap");
    let ep = Endpoint::create_simplex(&name, 3, 64).unwrap();

    for i in 0..25u8 {
        let mut w = ep.get_write_buffer().unwrap();
        w.data_mut()[0] = i;
        w.set_len(1);
        ep.send_write_buffer(w).unwrap();

        let r = ep.get_read_buffer().unwrap();
        assert_eq!(r.data()[0], i);
        ep.send_read_buffer(r).unwrap();
    }

    Endpoint::unlink(&name).unwrap();
}

#[test]
fn close_is_idempotent_and_fails_fast_for_new_operations() {
    let name = unique_name("close");
    let ep = Endpoint::create_simplex(&name, 4, 64).unwrap();

    ep.close().unwrap();
    ep.close().unwrap(); // second call is a no-op, not an error

    match ep.get_write_buffer() {
        Err(RingError::Closed) => {}
        other => panic!("expected Closed, got {other:?}"),
    }
    match ep.get_read_buffer() {
        Err(RingError::Closed) => {}
        other => panic!("expected Closed, got {other:?}"),
    }

    Endpoint::unlink(&name).unwrap();
}

#[test]
fn opening_a_region_with_a_bad_version_stamp_is_rejected() {
    let name = unique_name("badversion");
    {
        // Lay out a region by hand, with every byte zeroed, including the
        // version field the real Endpoint::create always stamps last.
        let region = shmring_region::MmapFileMut::create_named(&name, 4096, 0o644).unwrap();
        assert_eq!(unsafe { *region.as_ptr() }, 0);
    }

    match Endpoint::open_simplex(&name) {
        Err(RingError::InvalidSharedMemory(_)) => {}
        other => panic!("expected InvalidSharedMemory, got {other:?}"),
    }

    Endpoint::unlink(&name).unwrap();
}

#[test]
fn opening_a_name_that_was_never_created_fails() {
    let name = unique_name("missing");
    match Endpoint::open_simplex(&name) {
        Err(RingError::Os(_)) => {}
        other => panic!("expected Os, got {other:?}"),
    }
}

#[test]
fn duplex_endpoints_mirror_each_others_read_and_write_sides() {
    let name = unique_name("duplex");
    let a = Endpoint::create_duplex(&name, 4, 64).unwrap();
    let b = Endpoint::open_duplex(&name).unwrap();

    let mut w = a.get_write_buffer().unwrap();
    w.data_mut()[..3].copy_from_slice(b"abc");
    w.set_len(3);
    a.send_write_buffer(w).unwrap();

    let r = b.get_read_buffer().unwrap();
    assert_eq!(&r.data()[..3], b"abc");
    b.send_read_buffer(r).unwrap();

    let mut w = b.get_write_buffer().unwrap();
    w.data_mut()[..3].copy_from_slice(b"xyz");
    w.set_len(3);
    b.send_write_buffer(w).unwrap();

    let r = a.get_read_buffer().unwrap();
    assert_eq!(&r.data()[..3], b"xyz");
    a.send_read_buffer(r).unwrap();

    Endpoint::unlink(&name).unwrap();
}
