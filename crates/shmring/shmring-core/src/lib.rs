//! Lock-free single-producer/single-consumer shared-memory ring buffers.
//!
//! An [`Endpoint`] maps one ([`Kind::Simplex`]) or two ([`Kind::Duplex`])
//! rings into the calling process and exposes the four-cursor acquire/release
//! protocol used to pass blocks between processes without locks, relying
//! entirely on atomic cursor CAS plus a pair of process-shared POSIX
//! semaphores for blocking.

mod buffer;
mod endpoint;
mod error;
mod ring;

pub use buffer::Buffer;
pub use endpoint::{Endpoint, Kind};
pub use error::RingError;

pub use shmring_layout::{MAX_REGION_LEN, RING_VERSION};
