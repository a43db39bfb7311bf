//! Disk block identity and the driver-facing collaborator.

use core::fmt;
use kernel_info::param::BSIZE;

/// Contents of one disk block.
pub type BlockData = [u8; BSIZE];

/// `(device, block number)`: the identity of a cached disk block.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId {
    pub dev: u32,
    pub block: u32,
}

impl BlockId {
    #[inline]
    #[must_use]
    pub const fn new(dev: u32, block: u32) -> Self {
        Self { dev, block }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev {} block {}", self.dev, self.block)
    }
}

/// Failure reported by a [`BlockDevice`]. The cache passes it through
/// unchanged and never retries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockIoError {
    #[error("no such device {dev}")]
    NoDevice { dev: u32 },
    #[error("I/O error on dev {dev} block {block}")]
    Io { dev: u32, block: u32 },
}

/// Synchronous block driver (e.g. virtio-blk).
///
/// Both calls block the caller until the transfer completes. The cache
/// only calls them while holding the buffer's exclusive lock.
pub trait BlockDevice {
    /// Fill `buf` with the on-disk contents of `id`.
    ///
    /// # Errors
    /// Device-specific; see [`BlockIoError`].
    fn read_block(&self, id: BlockId, buf: &mut BlockData) -> Result<(), BlockIoError>;

    /// Write `buf` to `id` on disk.
    ///
    /// # Errors
    /// Device-specific; see [`BlockIoError`].
    fn write_block(&self, id: BlockId, buf: &BlockData) -> Result<(), BlockIoError>;
}
