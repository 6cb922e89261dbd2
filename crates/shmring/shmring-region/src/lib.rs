//! POSIX shared-memory object lifecycle: create/open/unlink a named region and
//! map it into this process's address space.
//!
//! Owns the `File`/`Mmap` lifetime and hands back a raw pointer, operating on
//! the POSIX shared-memory namespace (`shm_open`/`shm_unlink`) instead of an
//! arbitrary filesystem path, and split into a header-only read probe plus a
//! full read/write mapping so callers can implement the "peek the header,
//! then remap at the real size" dance without reopening the object twice.
//!
//! Knows nothing about rings, blocks, or cursors; `shmring-core` builds the
//! protocol on top of the raw pointers this crate exposes.

use memmap2::{Mmap, MmapMut, MmapOptions};
use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::fd::FromRawFd;

fn shm_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

fn shm_open_fd(name: &str, flags: i32, mode: libc::mode_t) -> io::Result<File> {
    let cname = shm_name(name)?;
    let fd = unsafe { libc::shm_open(cname.as_ptr(), flags, mode) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: shm_open returned a valid, freshly-opened file descriptor that
    // we now own exclusively.
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Removes `name` from the shared-memory namespace.
///
/// Mappings already established by live processes remain valid until those
/// processes unmap them; only the name is removed, matching `unlink(2)`
/// semantics for regular files.
pub fn unlink_named(name: &str) -> io::Result<()> {
    let cname = shm_name(name)?;
    let rc = unsafe { libc::shm_unlink(cname.as_ptr()) };
    if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
}

/// A read/write mapping of a POSIX shared-memory object.
#[derive(Debug)]
pub struct MmapFileMut {
    /// File handle kept alive to pin the backing object; the kernel mapping
    /// itself stays valid even if this were dropped, but we hold it for
    /// symmetry with `MmapFile` and so `as_raw_fd` stays available.
    _file: File,
    mmap: MmapMut,
}

impl MmapFileMut {
    /// Creates the named object with exclusive/truncate semantics, sizes it to
    /// `size_bytes`, and maps it read/write. Fails if the name already exists.
    pub fn create_named(name: &str, size_bytes: u64, mode: libc::mode_t) -> io::Result<Self> {
        let file = shm_open_fd(
            name,
            libc::O_CREAT | libc::O_EXCL | libc::O_TRUNC | libc::O_RDWR,
            mode,
        )?;
        file.set_len(size_bytes)?;

        // SAFETY: we just created and sized this object; no other mapping of
        // it can exist yet.
        let mmap = unsafe { MmapOptions::new().len(size_bytes as usize).map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Opens an existing named object and maps the first `size_bytes` bytes
    /// read/write. The object must already be at least that large.
    pub fn open_named(name: &str, size_bytes: u64) -> io::Result<Self> {
        let file = shm_open_fd(name, libc::O_RDWR, 0)?;
        // SAFETY: the region is owned cooperatively by both peers under the
        // ring protocol's own synchronization; nothing here races the mmap
        // call itself.
        let mmap = unsafe { MmapOptions::new().len(size_bytes as usize).map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }
}

/// A read-only mapping used to probe a region's header before its full size
/// is known.
pub struct MmapFile {
    _file: File,
    mmap: Mmap,
}

impl MmapFile {
    /// Opens an existing named object and maps only the first `header_len`
    /// bytes, read-only. The object is opened `O_RDWR` (a subsequent full
    /// remap on the same name needs write access) even though this mapping
    /// itself only requests `PROT_READ`.
    pub fn open_named_header(name: &str, header_len: usize) -> io::Result<Self> {
        let file = shm_open_fd(name, libc::O_RDWR, 0)?;
        // SAFETY: read-only mapping of a region whose header fields this
        // protocol never mutates through this handle.
        let mmap = unsafe { MmapOptions::new().len(header_len).map(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_name(tag: &str) -> String {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        format!("/shmring_region_test_{tag}_{ts}_{}", std::process::id())
    }

    #[test]
    fn create_write_then_open_reads_back() {
        let name = unique_name("rw");
        {
            let mut mm = MmapFileMut::create_named(&name, 4096, 0o600).unwrap();
            unsafe {
                let p = mm.as_mut_ptr();
                *p.add(0) = 0xAB;
                *p.add(1) = 0xCD;
            }
        }
        {
            let mm = MmapFileMut::open_named(&name, 4096).unwrap();
            unsafe {
                assert_eq!(*mm.as_ptr().add(0), 0xAB);
                assert_eq!(*mm.as_ptr().add(1), 0xCD);
            }
        }
        unlink_named(&name).unwrap();
    }

    #[test]
    fn header_probe_sees_only_requested_bytes() {
        let name = unique_name("hdr");
        {
            let mut mm = MmapFileMut::create_named(&name, 128, 0o600).unwrap();
            unsafe { *mm.as_mut_ptr().add(7) = 0x42 };
        }
        let probe = MmapFile::open_named_header(&name, 8).unwrap();
        assert_eq!(probe.len(), 8);
        assert_eq!(unsafe { *probe.as_ptr().add(7) }, 0x42);
        unlink_named(&name).unwrap();
    }

    #[test]
    fn create_fails_if_name_already_exists() {
        let name = unique_name("dup");
        let _first = MmapFileMut::create_named(&name, 64, 0o600).unwrap();
        let second = MmapFileMut::create_named(&name, 64, 0o600);
        assert!(second.is_err());
        unlink_named(&name).unwrap();
    }
}
