//! `std::io::Read`/`std::io::Write` adapter over a ring [`Endpoint`], plus
//! bulk-transfer helpers that carry the ring's EOF bit end to end.

use shmring_core::{Endpoint, RingError};
use std::io::{self, Read, Write};

fn to_io_err(e: RingError) -> io::Error {
    match e {
        RingError::Os(inner) => inner,
        other => io::Error::other(other),
    }
}

/// Borrows an [`Endpoint`] and exposes it as a standard stream.
///
/// `Read` acquires one read buffer per call and releases it before
/// returning, copying at most `buf.len()` bytes out of it. If `buf` is
/// shorter than the block's payload, the remainder of that block is
/// discarded when it's released — this adapter is message-oriented per
/// block, not a byte stream split arbitrarily across blocks. Use
/// [`RingStream::copy_to`]/[`RingStream::copy_from`] for unbounded streams.
pub struct RingStream<'a> {
    endpoint: &'a Endpoint,
}

impl<'a> RingStream<'a> {
    pub fn new(endpoint: &'a Endpoint) -> Self {
        RingStream { endpoint }
    }

    /// Pulls bytes from `reader` into write buffers until it signals
    /// end-of-stream (a `Read` returning `Ok(0)`), propagating that as the
    /// EOF bit on the last published block. Returns the total bytes moved.
    pub fn copy_from<R: Read>(&self, reader: &mut R) -> io::Result<u64> {
        let mut total = 0u64;
        loop {
            let mut wb = self.endpoint.get_write_buffer().map_err(to_io_err)?;
            let cap = wb.capacity();
            let mut filled = 0usize;
            let eof = loop {
                match reader.read(&mut wb.data_mut()[filled..cap]) {
                    Ok(0) => break true,
                    Ok(n) => {
                        filled += n;
                        total += n as u64;
                        if filled == cap {
                            break false;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };
            wb.set_len(filled);
            wb.set_eof(eof);
            self.endpoint.send_write_buffer(wb).map_err(to_io_err)?;
            if eof {
                tracing::trace!(total, "copy_from reached end-of-stream");
                break;
            }
        }
        Ok(total)
    }

    /// Pushes bytes read off the ring into `writer` until a block carrying
    /// the EOF bit has been drained. Returns the total bytes moved.
    pub fn copy_to<W: Write>(&self, writer: &mut W) -> io::Result<u64> {
        let mut total = 0u64;
        loop {
            let rb = self.endpoint.get_read_buffer().map_err(to_io_err)?;
            let eof = rb.eof();
            let data = rb.data();
            if !data.is_empty() {
                writer.write_all(data)?;
                total += data.len() as u64;
            }
            self.endpoint.send_read_buffer(rb).map_err(to_io_err)?;
            if eof {
                tracing::trace!(total, "copy_to observed end-of-stream");
                break;
            }
        }
        Ok(total)
    }
}

impl Read for RingStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rb = self.endpoint.get_read_buffer().map_err(to_io_err)?;
        let n = rb.len().min(buf.len());
        buf[..n].copy_from_slice(&rb.data()[..n]);
        self.endpoint.send_read_buffer(rb).map_err(to_io_err)?;
        Ok(n)
    }
}

impl Write for RingStream<'_> {
    /// Writes at most one block. `buf` longer than the ring's `block_size`
    /// is truncated to fit — per the ring protocol's contract, a single
    /// `Write` publishes one atomic, EOF-terminated message; use
    /// [`RingStream::copy_from`] to send something longer.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut wb = self.endpoint.get_write_buffer().map_err(to_io_err)?;
        let n = buf.len().min(wb.capacity());
        wb.data_mut()[..n].copy_from_slice(&buf[..n]);
        wb.set_len(n);
        wb.set_eof(true);
        self.endpoint.send_write_buffer(wb).map_err(to_io_err)?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
