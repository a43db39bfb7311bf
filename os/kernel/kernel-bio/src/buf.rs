use crate::block::{BlockData, BlockDevice, BlockId, BlockIoError};
use crate::cache::BufferCache;
use core::mem::ManuallyDrop;
use core::sync::atomic::Ordering;
use kernel_sync::{MutexGuard, Park, RawSleep};

/// Exclusive handle to one cached block.
///
/// Holding a `Buf` means holding the buffer's sleep lock and one reference
/// to its slot. Dropping it releases both, lock first.
#[must_use = "dropping a Buf releases it immediately"]
pub struct Buf<'a, D, P: Park, const NBUF: usize, const NBUCKET: usize> {
    cache: &'a BufferCache<D, P, NBUF, NBUCKET>,
    slot: usize,
    id: BlockId,
    guard: ManuallyDrop<MutexGuard<'a, BlockData, RawSleep<P>>>,
}

impl<'a, D, P: Park, const NBUF: usize, const NBUCKET: usize> Buf<'a, D, P, NBUF, NBUCKET> {
    pub(crate) const fn new(
        cache: &'a BufferCache<D, P, NBUF, NBUCKET>,
        slot: usize,
        id: BlockId,
        guard: MutexGuard<'a, BlockData, RawSleep<P>>,
    ) -> Self {
        Self {
            cache,
            slot,
            id,
            guard: ManuallyDrop::new(guard),
        }
    }

    #[inline]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Whether the data holds the block's on-disk contents (or newer).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.cache.slot(self.slot).valid.load(Ordering::Acquire)
    }

    #[inline]
    pub fn data(&self) -> &BlockData {
        &self.guard
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut BlockData {
        &mut self.guard
    }

    pub(crate) const fn cache(&self) -> &'a BufferCache<D, P, NBUF, NBUCKET> {
        self.cache
    }

    pub(crate) const fn slot(&self) -> usize {
        self.slot
    }
}

impl<D: BlockDevice, P: Park, const NBUF: usize, const NBUCKET: usize>
    Buf<'_, D, P, NBUF, NBUCKET>
{
    /// Write the buffer's contents to disk. The buffer stays held.
    ///
    /// # Errors
    /// Whatever the device reports.
    pub fn write(&self) -> Result<(), BlockIoError> {
        debug_assert!(self.guard.mutex().is_locked(), "bwrite: buffer not locked");
        self.cache.write_through(self.id, &self.guard)
    }
}

impl<D, P: Park, const NBUF: usize, const NBUCKET: usize> Drop for Buf<'_, D, P, NBUF, NBUCKET> {
    fn drop(&mut self) {
        debug_assert!(self.guard.mutex().is_locked(), "brelse: buffer not locked");
        // Unlock before dropping the reference so a waiter never sees an
        // unreferenced slot still locked.
        // SAFETY: `guard` is dropped exactly once, here, and never touched again.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        self.cache.unref(self.slot, self.id, "brelse");
    }
}

impl<D, P: Park, const NBUF: usize, const NBUCKET: usize> core::fmt::Debug
    for Buf<'_, D, P, NBUF, NBUCKET>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Buf")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

/// A reference that keeps a block resident without holding its lock.
///
/// Obtained from [`BufferCache::pin`]; must be handed back through
/// [`BufferCache::unpin`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped pin keeps its buffer referenced forever"]
pub struct BufPin {
    slot: usize,
    id: BlockId,
}

impl BufPin {
    pub(crate) const fn new(slot: usize, id: BlockId) -> Self {
        Self { slot, id }
    }

    #[inline]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    pub(crate) const fn slot(&self) -> usize {
        self.slot
    }
}
