//! A narrow connection-oriented wrapper around a Duplex [`Endpoint`]:
//! [`Listener::bind`] + one-shot [`Listener::accept`] on the server side,
//! [`Conn::dial`] on the client side. There is exactly one peer pair per
//! named region, so "accept" is a single handoff, not a queue.

use shmring_core::{Endpoint, RingError};
use shmring_stream::RingStream;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A ring connection's address is just the shared-memory region name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addr(String);

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shmring:{}", self.0)
    }
}

/// Binds a named Duplex region and hands out at most one live [`Conn`] at a
/// time. A second `accept` while one is outstanding returns
/// [`RingError::Closed`] — there is no queue, by design, since the protocol
/// is single-peer-pair.
pub struct Listener {
    name: String,
    endpoint: Arc<Endpoint>,
    leased: Arc<Mutex<bool>>,
}

impl Listener {
    pub fn bind(name: &str, block_count: u64, block_size: u64) -> Result<Self, RingError> {
        tracing::info!(name, block_count, block_size, "listener binding");
        let endpoint = Endpoint::create_duplex(name, block_count, block_size)?;
        Ok(Listener { name: name.to_string(), endpoint: Arc::new(endpoint), leased: Arc::new(Mutex::new(false)) })
    }

    pub fn addr(&self) -> Addr {
        Addr(self.name.clone())
    }

    pub fn accept(&self) -> Result<Conn, RingError> {
        let mut leased = self.leased.lock().expect("listener lease mutex poisoned");
        if *leased {
            return Err(RingError::Closed);
        }
        *leased = true;
        tracing::info!(name = %self.name, "accepted connection");
        Ok(Conn {
            endpoint: Arc::clone(&self.endpoint),
            addr: Addr(self.name.clone()),
            leased: Some(Arc::clone(&self.leased)),
            closed: false,
        })
    }
}

/// One end of a Duplex channel. Implements [`Read`]/[`Write`] via
/// [`RingStream`].
#[derive(Debug)]
pub struct Conn {
    endpoint: Arc<Endpoint>,
    addr: Addr,
    // `None` for a dialed connection (no accept-slot to release).
    leased: Option<Arc<Mutex<bool>>>,
    closed: bool,
}

impl Conn {
    pub fn dial(name: &str) -> Result<Self, RingError> {
        tracing::info!(name, "dialing connection");
        let endpoint = Endpoint::open_duplex(name)?;
        Ok(Conn { endpoint: Arc::new(endpoint), addr: Addr(name.to_string()), leased: None, closed: false })
    }

    pub fn local_addr(&self) -> Addr {
        self.addr.clone()
    }

    pub fn close(&mut self) -> Result<(), RingError> {
        if self.closed {
            return Ok(());
        }
        self.endpoint.close()?;
        if let Some(leased) = &self.leased {
            *leased.lock().expect("listener lease mutex poisoned") = false;
        }
        self.closed = true;
        tracing::info!(addr = %self.addr, "connection closed");
        Ok(())
    }

    /// No-op: the ring protocol has no timeouts (see the concurrency model).
    pub fn set_read_deadline(&self, _deadline: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    /// No-op, for the same reason as [`Conn::set_read_deadline`].
    pub fn set_write_deadline(&self, _deadline: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    /// No-op, for the same reason as [`Conn::set_read_deadline`].
    pub fn set_deadline(&self, _deadline: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

impl Read for Conn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        RingStream::new(&self.endpoint).read(buf)
    }
}

impl Write for Conn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RingStream::new(&self.endpoint).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static SEQ: AtomicU64 = AtomicU64::new(0);

    fn unique_name(tag: &str) -> String {
        let n = SEQ.fetch_add(1, Ordering::Relaxed);
        format!("/shmring_conn_test_{tag}_{}_{}", std::process::id(), n)
    }

    #[test]
    fn accept_then_dial_exchange_bytes_both_ways() {
        let name = unique_name("exchange");
        let listener = Listener::bind(&name, 4, 64).unwrap();

        let dialer_name = name.clone();
        let dialer = std::thread::spawn(move || {
            let mut conn = Conn::dial(&dialer_name).unwrap();
            conn.write_all(b"ping").unwrap();
            let mut buf = [0u8; 64];
            let n = conn.read(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"pong");
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 64];
        let n = server.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
        server.write_all(b"pong").unwrap();

        dialer.join().unwrap();
        Endpoint::unlink(&name).unwrap();
    }

    #[test]
    fn second_accept_while_one_connection_is_live_fails() {
        let name = unique_name("singleslot");
        let listener = Listener::bind(&name, 4, 64).unwrap();
        let _first = listener.accept().unwrap();
        match listener.accept() {
            Err(RingError::Closed) => {}
            other => panic!("expected Closed (no queue), got {other:?}"),
        }
        Endpoint::unlink(&name).unwrap();
    }
}
