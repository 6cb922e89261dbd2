use shmring_layout::LayoutError;
use std::io;

/// Everything that can go wrong in the ring protocol, carried as a typed,
/// synchronous return value rather than `Box<dyn Error>` — the same shape
/// `ConfigError` uses elsewhere in this workspace for its own failures.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("block_size is not a multiple of 64")]
    InvalidBlockSize,

    #[error("region size exceeds the 1 GiB limit")]
    RegionTooLarge,

    #[error("shared memory region failed validation: {0}")]
    InvalidSharedMemory(&'static str),

    #[error("endpoint is closed")]
    Closed,

    #[error("buffer used on the wrong side (read buffer sent as write, or vice versa)")]
    InvalidBuffer,

    #[error("os error")]
    Os(#[from] io::Error),
}

impl From<LayoutError> for RingError {
    fn from(e: LayoutError) -> Self {
        match e {
            LayoutError::BlockSizeNotMultipleOf64 => RingError::InvalidBlockSize,
            LayoutError::RegionTooLarge => RingError::RegionTooLarge,
            LayoutError::BadVersion => RingError::InvalidSharedMemory("version stamp missing or mismatched"),
        }
    }
}
