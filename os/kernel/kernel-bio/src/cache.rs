//! # Sharded buffer cache
//!
//! `NBUF` slots spread over `NBUCKET` hash buckets, each behind its own
//! spin lock. A block lives in bucket [`bucket_of`]`(id)`; lookups for
//! different buckets never contend.
//!
//! Finding a slot for a block that is not cached:
//!
//! 1. Lock the home bucket. Reuse a slot already caching the block, or
//!    claim an unreferenced slot of the home bucket in place.
//! 2. Otherwise unlock home and visit the other buckets one at a time,
//!    unlinking the first unreferenced slot found. The slot is then
//!    *in transit*, linked into no bucket.
//! 3. Re-lock home and look for the block again: another core may have
//!    cached it in the meantime. If so, use that slot and return the
//!    stolen one to the bucket it came from. If not, link the stolen slot
//!    into home.
//!
//! No code path holds two bucket locks at once, except [`audit`], which
//! takes all of them in ascending order.
//!
//! [`audit`]: BufferCache::audit

use crate::block::{BlockData, BlockDevice, BlockId, BlockIoError};
use crate::buf::{Buf, BufPin};
use crate::bucket::{Bucket, Meta, bucket_of};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use kernel_info::param::{self, BSIZE};
use kernel_sync::{Mutex, Park, RawSleep, SleepMutex, SpinMutex, SpinPark};
use log::{debug, trace};

pub(crate) struct Slot<P> {
    /// Data holds the on-disk contents of the slot's current block.
    ///
    /// Cleared under the owning bucket lock when the slot changes identity;
    /// set by the sleep-lock holder after a successful read.
    pub(crate) valid: AtomicBool,
    pub(crate) data: SleepMutex<BlockData, P>,
}

/// A slot unlinked from bucket `from`, carrying its bookkeeping.
#[derive(Debug)]
pub(crate) struct Stolen {
    pub(crate) slot: usize,
    pub(crate) from: usize,
    pub(crate) meta: Meta,
}

/// Block buffer cache in front of a [`BlockDevice`].
///
/// `P` decides how a caller waits for a buffer someone else holds.
pub struct BufferCache<
    D,
    P = SpinPark,
    const NBUF: usize = { param::NBUF },
    const NBUCKET: usize = { param::NBUCKET },
> {
    device: D,
    buckets: [SpinMutex<Bucket<NBUF>>; NBUCKET],
    slots: [Slot<P>; NBUF],
    /// Slots between unlink from one bucket and link into another.
    ///
    /// Changed only under the lock of the bucket doing the unlink or link.
    in_transit: AtomicUsize,
}

/// Snapshot of the cache structure taken with every bucket locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheAudit<const NBUCKET: usize> {
    pub slots: usize,
    pub bucket_len: [usize; NBUCKET],
    pub in_transit: usize,
    /// Slots with a non-zero reference count.
    pub referenced: usize,
    /// A block cached in more than one slot, referenced or not.
    pub duplicate: Option<BlockId>,
    /// A cached block linked outside its home bucket.
    pub misplaced: Option<BlockId>,
}

impl<const NBUCKET: usize> CacheAudit<NBUCKET> {
    /// Every slot accounted for exactly once, no block cached twice, every
    /// cached block in its home bucket.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.bucket_len.iter().sum::<usize>() + self.in_transit == self.slots
            && self.duplicate.is_none()
            && self.misplaced.is_none()
    }
}

impl<D, P, const NBUF: usize, const NBUCKET: usize> BufferCache<D, P, NBUF, NBUCKET> {
    /// A cache with every slot unused, slot `i` in bucket `i % NBUCKET`.
    pub fn new(device: D) -> Self {
        const {
            assert!(NBUF > 0, "need at least one buffer");
            assert!(NBUCKET > 0, "need at least one bucket");
        };
        let cache = Self {
            device,
            buckets: core::array::from_fn(|b| SpinMutex::new(Bucket::seeded(b, NBUCKET))),
            slots: core::array::from_fn(|_| Slot {
                valid: AtomicBool::new(false),
                data: Mutex::from_raw(RawSleep::new(), [0; BSIZE]),
            }),
            in_transit: AtomicUsize::new(0),
        };
        debug!("binit: {} buffers in {} buckets", NBUF, NBUCKET);
        cache
    }

    pub const fn device(&self) -> &D {
        &self.device
    }

    pub(crate) const fn slot(&self, slot: usize) -> &Slot<P> {
        &self.slots[slot]
    }
}

impl<D, P: Park, const NBUF: usize, const NBUCKET: usize> BufferCache<D, P, NBUF, NBUCKET> {
    /// Exclusive access to block `(dev, block)`, contents not loaded.
    ///
    /// Waits while another holder has the buffer. Check
    /// [`Buf::is_valid`] before trusting the data; [`read`](Self::read)
    /// does that for you.
    ///
    /// # Panics
    /// With `bget: no buffers` when every slot is referenced.
    pub fn acquire(&self, dev: u32, block: u32) -> Buf<'_, D, P, NBUF, NBUCKET> {
        let id = BlockId::new(dev, block);
        let slot = self.bget(id);
        Buf::new(self, slot, id, self.slots[slot].data.lock())
    }

    /// Give a buffer back; same as dropping it.
    ///
    /// # Panics
    /// If `buf` belongs to another cache.
    pub fn release(&self, buf: Buf<'_, D, P, NBUF, NBUCKET>) {
        assert!(
            core::ptr::eq(buf.cache(), self),
            "brelse: buffer from another cache"
        );
        drop(buf);
    }

    /// Keep `buf`'s block resident after the handle is released.
    ///
    /// The pin holds a reference but not the lock. Give it back with
    /// [`unpin`](Self::unpin).
    pub fn pin(&self, buf: &Buf<'_, D, P, NBUF, NBUCKET>) -> BufPin {
        assert!(
            core::ptr::eq(buf.cache(), self),
            "bpin: buffer from another cache"
        );
        let mut bucket = self.buckets[bucket_of(buf.id(), NBUCKET)].lock();
        let meta = bucket
            .meta_mut(buf.slot())
            .filter(|m| m.id == Some(buf.id()))
            .unwrap_or_else(|| panic!("bpin: {} is not cached", buf.id()));
        meta.refcnt += 1;
        BufPin::new(buf.slot(), buf.id())
    }

    /// Drop the reference taken by [`pin`](Self::pin).
    ///
    /// # Panics
    /// If the pin does not match a referenced slot of this cache.
    pub fn unpin(&self, pin: BufPin) {
        self.unref(pin.slot(), pin.id(), "bunpin");
    }

    /// Current reference count of the slot caching `(dev, block)`, if any.
    #[must_use]
    pub fn refcount(&self, dev: u32, block: u32) -> Option<u32> {
        let id = BlockId::new(dev, block);
        let bucket = self.buckets[bucket_of(id, NBUCKET)].lock();
        bucket
            .find(id)
            .and_then(|slot| bucket.meta(slot))
            .map(|meta| meta.refcnt)
    }

    /// Lock every bucket (ascending) and check the structure.
    #[must_use]
    pub fn audit(&self) -> CacheAudit<NBUCKET> {
        let buckets: [_; NBUCKET] = core::array::from_fn(|b| self.buckets[b].lock());

        let mut audit = CacheAudit {
            slots: NBUF,
            bucket_len: [0; NBUCKET],
            in_transit: self.in_transit.load(Ordering::Relaxed),
            referenced: 0,
            duplicate: None,
            misplaced: None,
        };
        let mut seen: [Option<BlockId>; NBUF] = [None; NBUF];
        let mut cached = 0;

        for (b, bucket) in buckets.iter().enumerate() {
            audit.bucket_len[b] = bucket.len();
            for (_, meta) in bucket.iter() {
                if meta.refcnt > 0 {
                    audit.referenced += 1;
                }
                let Some(id) = meta.id else { continue };
                if seen[..cached].contains(&Some(id)) {
                    audit.duplicate.get_or_insert(id);
                }
                if bucket_of(id, NBUCKET) != b {
                    audit.misplaced.get_or_insert(id);
                }
                seen[cached] = Some(id);
                cached += 1;
            }
        }
        audit
    }

    /// Reference a slot for `id`, or panic.
    fn bget(&self, id: BlockId) -> usize {
        let home = bucket_of(id, NBUCKET);
        if let Some(slot) = self.lookup_or_claim(home, id) {
            return slot;
        }
        let stolen = self.steal(home);
        self.install(home, id, stolen)
    }

    /// Phase 1: under the home lock only.
    pub(crate) fn lookup_or_claim(&self, home: usize, id: BlockId) -> Option<usize> {
        let mut bucket = self.buckets[home].lock();
        if let Some(slot) = bucket.find(id) {
            if let Some(meta) = bucket.meta_mut(slot) {
                meta.refcnt += 1;
            }
            return Some(slot);
        }
        let slot = bucket.find_unused()?;
        self.claim(&mut bucket, slot, id);
        Some(slot)
    }

    /// Phase 2: one foreign bucket lock at a time, home not held.
    pub(crate) fn steal(&self, home: usize) -> Option<Stolen> {
        for from in (1..NBUCKET).map(|i| (home + i) % NBUCKET) {
            let mut bucket = self.buckets[from].lock();
            if let Some(slot) = bucket.find_unused() {
                let meta = bucket.unlink(slot);
                self.in_transit.fetch_add(1, Ordering::Relaxed);
                trace!("bget: slot {slot} leaves bucket {from} for bucket {home}");
                return Some(Stolen { slot, from, meta });
            }
        }
        None
    }

    /// Phase 3: re-lock home and re-check before linking `stolen`.
    pub(crate) fn install(&self, home: usize, id: BlockId, stolen: Option<Stolen>) -> usize {
        let mut bucket = self.buckets[home].lock();

        if let Some(slot) = bucket.find(id) {
            if let Some(meta) = bucket.meta_mut(slot) {
                meta.refcnt += 1;
            }
            drop(bucket);
            if let Some(stolen) = stolen {
                self.give_back(stolen, id);
            }
            return slot;
        }

        let Some(stolen) = stolen else {
            // A home slot may have been released while we were away.
            if let Some(slot) = bucket.find_unused() {
                self.claim(&mut bucket, slot, id);
                return slot;
            }
            drop(bucket);
            panic!("bget: no buffers");
        };

        bucket.push_front(stolen.slot, Meta::claimed(id));
        self.in_transit.fetch_sub(1, Ordering::Relaxed);
        self.slots[stolen.slot].valid.store(false, Ordering::Release);
        stolen.slot
    }

    /// Return a slot nobody needed after all, without its old identity.
    ///
    /// While it was unlinked, its old block may have been cached again in
    /// another slot and rewritten; keeping the identity would leave two
    /// slots for that block, the stale one found first.
    fn give_back(&self, stolen: Stolen, id: BlockId) {
        let mut bucket = self.buckets[stolen.from].lock();
        bucket.push_front(stolen.slot, Meta::UNUSED);
        self.slots[stolen.slot].valid.store(false, Ordering::Release);
        self.in_transit.fetch_sub(1, Ordering::Relaxed);
        trace!(
            "bget: {id} cached meanwhile, slot {} back to bucket {} (was {:?})",
            stolen.slot, stolen.from, stolen.meta.id
        );
    }

    fn claim(&self, bucket: &mut Bucket<NBUF>, slot: usize, id: BlockId) {
        if let Some(meta) = bucket.meta_mut(slot) {
            *meta = Meta::claimed(id);
        }
        self.slots[slot].valid.store(false, Ordering::Release);
    }

    /// Drop one reference to `slot`, which must cache `id`.
    pub(crate) fn unref(&self, slot: usize, id: BlockId, who: &str) {
        let mut bucket = self.buckets[bucket_of(id, NBUCKET)].lock();
        let meta = bucket
            .meta_mut(slot)
            .filter(|meta| meta.id == Some(id) && meta.refcnt > 0);
        if let Some(meta) = meta {
            meta.refcnt -= 1;
            return;
        }
        drop(bucket);
        panic!("{who}: {id} is not referenced");
    }
}

impl<D: BlockDevice, P: Park, const NBUF: usize, const NBUCKET: usize>
    BufferCache<D, P, NBUF, NBUCKET>
{
    /// Exclusive access to block `(dev, block)` with its on-disk contents.
    ///
    /// Reads from the device only if the buffer is not already valid.
    ///
    /// # Errors
    /// Whatever the device reports; the buffer is released first.
    ///
    /// # Panics
    /// With `bget: no buffers` when every slot is referenced.
    pub fn read(
        &self,
        dev: u32,
        block: u32,
    ) -> Result<Buf<'_, D, P, NBUF, NBUCKET>, BlockIoError> {
        let mut buf = self.acquire(dev, block);
        if !buf.is_valid() {
            let id = buf.id();
            self.device.read_block(id, buf.data_mut())?;
            self.slots[buf.slot()].valid.store(true, Ordering::Release);
        }
        Ok(buf)
    }

    pub(crate) fn write_through(&self, id: BlockId, data: &BlockData) -> Result<(), BlockIoError> {
        self.device.write_block(id, data)
    }
}
