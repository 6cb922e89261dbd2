//! Thin, process-shared counting semaphore over the POSIX `sem_t` primitive.
//!
//! This is the one piece of the protocol a mapped-memory region cannot give you
//! for free: a way for a sleeping peer in another process to be woken by a single
//! `post()` from across the mmap boundary. We bind `sem_t` directly via `libc`
//! rather than build a futex-based equivalent.
//!
//! # Layout
//!
//! [`RawSemaphore`] is `#[repr(transparent)]` over `libc::sem_t` so it can be
//! embedded directly inside a `#[repr(C)]` shared-memory header and initialized
//! in place with [`RawSemaphore::init`] — never move a `RawSemaphore` once a
//! process has called `init` on it; POSIX semaphores are not relocatable.

use std::cell::UnsafeCell;
use std::io;

/// A POSIX counting semaphore, laid out for embedding in a shared-memory region.
///
/// All operations take `&self`: the semaphore's internal state is mutated by the
/// kernel, not by Rust, so there's no `&mut self` to get in the way of two
/// processes each holding their own reference to the same bytes.
#[repr(transparent)]
pub struct RawSemaphore(UnsafeCell<libc::sem_t>);

// SAFETY: a POSIX semaphore initialized with pshared=1 is designed to be waited
// on and posted from any thread in any process mapping the same memory.
unsafe impl Send for RawSemaphore {}
unsafe impl Sync for RawSemaphore {}

impl RawSemaphore {
    #[inline]
    fn as_ptr(&self) -> *mut libc::sem_t {
        self.0.get()
    }

    /// Initializes the semaphore in place to `value`, shared between processes.
    ///
    /// Must be called exactly once per semaphore, by the process that owns the
    /// region's creation, before any peer calls [`wait`](Self::wait) or
    /// [`post`](Self::post) on it.
    pub fn init(&self, value: u32) -> io::Result<()> {
        // pshared=1: visible to any process that maps this memory, not just
        // threads of the creating process.
        let rc = unsafe { libc::sem_init(self.as_ptr(), 1, value) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    /// Decrements the semaphore, blocking the calling thread while it is zero.
    ///
    /// Retries transparently on `EINTR` (a signal delivered mid-wait); any other
    /// error is propagated.
    pub fn wait(&self) -> io::Result<()> {
        loop {
            let rc = unsafe { libc::sem_wait(self.as_ptr()) };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Increments the semaphore, waking at most one waiter.
    pub fn post(&self) -> io::Result<()> {
        let rc = unsafe { libc::sem_post(self.as_ptr()) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    /// Releases kernel resources associated with the semaphore.
    ///
    /// Callers must ensure no thread in any process is blocked in `wait()` on
    /// this semaphore when `destroy` is called; doing so is undefined behavior
    /// at the POSIX level, not just a Rust-level footgun.
    pub fn destroy(&self) -> io::Result<()> {
        let rc = unsafe { libc::sem_destroy(self.as_ptr()) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn init_wait_post_roundtrip() {
        let sem = RawSemaphore(UnsafeCell::new(unsafe { std::mem::zeroed() }));
        sem.init(0).unwrap();
        sem.post().unwrap();
        sem.wait().unwrap();
        sem.destroy().unwrap();
    }

    #[test]
    fn wait_blocks_until_post_from_another_thread() {
        struct SendPtr(*const RawSemaphore);
        unsafe impl Send for SendPtr {}

        let sem = Arc::new(RawSemaphore(UnsafeCell::new(unsafe { std::mem::zeroed() })));
        sem.init(0).unwrap();

        let raw = SendPtr(Arc::as_ptr(&sem));
        let handle = thread::spawn(move || {
            let raw = raw;
            thread::sleep(Duration::from_millis(50));
            let sem = unsafe { &*raw.0 };
            sem.post().unwrap();
        });

        sem.wait().unwrap();
        handle.join().unwrap();
        sem.destroy().unwrap();
    }
}
