mod common;

use common::{Bcache, Cache, MemDisk, pattern};
use kernel_bio::{BlockId, BlockIoError, bucket_of};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn read_loads_the_block_from_disk() {
    let cache = Bcache::new(MemDisk::new());
    let buf = cache.read(1, 5).unwrap();

    assert!(buf.is_valid());
    assert_eq!(buf.id(), BlockId::new(1, 5));
    assert_eq!(buf.data(), &pattern(BlockId::new(1, 5)));
    assert_eq!(cache.device().reads(1, 5), 1);
}

#[test]
fn acquire_alone_does_not_load() {
    let cache = Bcache::new(MemDisk::new());
    let buf = cache.acquire(1, 5);
    assert!(!buf.is_valid());
    assert_eq!(cache.device().total_reads(), 0);
}

#[test]
fn released_block_is_served_from_memory() {
    let cache = Bcache::new(MemDisk::new());

    let mut buf = cache.read(1, 5).unwrap();
    buf.data_mut()[..4].copy_from_slice(b"edit");
    cache.release(buf);
    assert_eq!(cache.refcount(1, 5), Some(0));

    let buf = cache.read(1, 5).unwrap();
    assert!(buf.is_valid());
    assert_eq!(&buf.data()[..4], b"edit");
    assert_eq!(cache.device().reads(1, 5), 1);
}

#[test]
fn refcount_follows_handles() {
    let cache = Bcache::new(MemDisk::new());
    assert_eq!(cache.refcount(2, 9), None);

    let buf = cache.acquire(2, 9);
    assert_eq!(cache.refcount(2, 9), Some(1));
    drop(buf);
    assert_eq!(cache.refcount(2, 9), Some(0));
}

#[test]
fn write_reaches_disk_and_keeps_the_buffer() {
    let cache = Bcache::new(MemDisk::new());
    let mut buf = cache.read(2, 3).unwrap();
    buf.data_mut().fill(0xab);
    buf.write().unwrap();

    assert_eq!(cache.device().writes(2, 3), 1);
    assert!(cache.device().contents(2, 3).iter().all(|&b| b == 0xab));
    assert!(buf.is_valid());
    assert_eq!(cache.refcount(2, 3), Some(1));
}

#[test]
fn two_slots_serve_blocks_of_any_bucket() {
    let cache = Cache::<2, 13>::new(MemDisk::new());
    let a = cache.read(1, 100).unwrap();
    let b = cache.read(1, 200).unwrap();

    assert_eq!(a.data(), &pattern(a.id()));
    assert_eq!(b.data(), &pattern(b.id()));

    let audit = cache.audit();
    assert!(audit.is_consistent(), "{audit:?}");
    assert_eq!(audit.referenced, 2);
    assert!(audit.bucket_len[bucket_of(a.id(), 13)] >= 1);
    assert!(audit.bucket_len[bucket_of(b.id(), 13)] >= 1);

    drop((a, b));
    let c = cache.read(1, 300).unwrap();
    assert_eq!(c.data(), &pattern(c.id()));
    assert!(cache.audit().is_consistent());
}

#[test]
#[should_panic(expected = "bget: no buffers")]
fn exhausted_pool_panics() {
    let cache = Cache::<2, 13>::new(MemDisk::new());
    let _a = cache.acquire(1, 1);
    let _b = cache.acquire(1, 2);
    let _c = cache.acquire(1, 3);
}

#[test]
fn exhaustion_panic_leaves_the_cache_intact() {
    let cache = Cache::<2, 13>::new(MemDisk::new());

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _a = cache.acquire(1, 1);
        let _b = cache.acquire(1, 2);
        let _c = cache.acquire(1, 3);
    }));
    assert!(result.is_err());

    let audit = cache.audit();
    assert!(audit.is_consistent(), "{audit:?}");
    assert_eq!(audit.referenced, 0);
    drop(cache.acquire(1, 3));
}

#[test]
fn concurrent_first_read_hits_the_disk_once() {
    let cache = Arc::new(Bcache::new(MemDisk::new()));
    let mut first = cache.read(3, 7).unwrap();

    let second = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            let buf = cache.read(3, 7).unwrap();
            assert!(buf.is_valid());
            assert_eq!(buf.data()[0], 0x5a, "saw the block before the first holder let go");
        })
    };

    // The second reader references the slot, then waits on its lock.
    wait_for("second reference", || cache.refcount(3, 7) == Some(2));
    first.data_mut()[0] = 0x5a;
    drop(first);

    second.join().unwrap();
    assert_eq!(cache.device().reads(3, 7), 1);
    assert_eq!(cache.refcount(3, 7), Some(0));
}

#[test]
fn many_first_readers_share_one_slot() {
    let threads = 8;
    let cache = Arc::new(Bcache::new(MemDisk::new()));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let buf = cache.read(3, 7).unwrap();
                assert_eq!(buf.data(), &pattern(BlockId::new(3, 7)));
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(cache.device().reads(3, 7), 1);
    let audit = cache.audit();
    assert!(audit.is_consistent(), "{audit:?}");
    assert_eq!(audit.referenced, 0);
}

#[test]
fn pinned_block_stays_cached() {
    let cache = Cache::<1, 13>::new(MemDisk::new());
    let buf = cache.read(1, 1).unwrap();
    let pin = cache.pin(&buf);
    assert_eq!(pin.id(), BlockId::new(1, 1));
    cache.release(buf);
    assert_eq!(cache.refcount(1, 1), Some(1));

    let buf = cache.read(1, 1).unwrap();
    assert_eq!(cache.refcount(1, 1), Some(2));
    drop(buf);
    assert_eq!(cache.device().reads(1, 1), 1);

    cache.unpin(pin);
    assert_eq!(cache.refcount(1, 1), Some(0));
}

#[test]
#[should_panic(expected = "bget: no buffers")]
fn pinned_slot_is_never_recycled() {
    let cache = Cache::<1, 13>::new(MemDisk::new());
    let buf = cache.read(1, 1).unwrap();
    let _pin = cache.pin(&buf);
    cache.release(buf);
    let _other = cache.acquire(1, 2);
}

#[test]
fn unpinned_slot_is_recycled() {
    let cache = Cache::<1, 13>::new(MemDisk::new());
    let buf = cache.read(1, 1).unwrap();
    let pin = cache.pin(&buf);
    cache.release(buf);
    cache.unpin(pin);

    let other = cache.read(1, 2).unwrap();
    assert_eq!(other.data(), &pattern(BlockId::new(1, 2)));
    assert_eq!(cache.refcount(1, 1), None);
}

#[test]
#[should_panic(expected = "bunpin")]
fn unpin_on_the_wrong_cache_panics() {
    let ours = Cache::<4, 13>::new(MemDisk::new());
    let theirs = Cache::<4, 13>::new(MemDisk::new());
    let buf = ours.read(1, 1).unwrap();
    let pin = ours.pin(&buf);
    theirs.unpin(pin);
}

#[test]
#[should_panic(expected = "brelse")]
fn release_on_the_wrong_cache_panics() {
    let ours = Cache::<4, 13>::new(MemDisk::new());
    let theirs = Cache::<4, 13>::new(MemDisk::new());
    theirs.release(ours.acquire(1, 1));
}

#[test]
fn read_error_is_returned_and_the_buffer_released() {
    let cache = Bcache::new(MemDisk::failing(9));

    let err = cache.read(9, 1).unwrap_err();
    assert_eq!(err, BlockIoError::NoDevice { dev: 9 });
    assert_eq!(err.to_string(), "no such device 9");
    assert_eq!(cache.refcount(9, 1), Some(0));

    // Nothing was cached as valid.
    assert!(!cache.acquire(9, 1).is_valid());
    assert!(cache.read(9, 1).is_err());
    assert!(cache.audit().is_consistent());
}

#[test]
fn write_error_is_returned() {
    let cache = Bcache::new(MemDisk::failing(9));
    let buf = cache.acquire(9, 1);
    assert_eq!(buf.write(), Err(BlockIoError::NoDevice { dev: 9 }));
    assert_eq!(cache.refcount(9, 1), Some(1));
}

#[test]
fn bad_block_fails_alone() {
    let cache = Bcache::new(MemDisk::failing_block(1, 13));

    let err = cache.read(1, 13).unwrap_err();
    assert_eq!(err, BlockIoError::Io { dev: 1, block: 13 });
    assert_eq!(err.to_string(), "I/O error on dev 1 block 13");

    let neighbour = cache.read(1, 14).unwrap();
    assert!(neighbour.is_valid());
    assert_eq!(cache.device().reads(1, 13), 0);
}

fn counter(data: &[u8]) -> u32 {
    u32::from_le_bytes(data[..4].try_into().unwrap())
}

#[test]
fn concurrent_increments_are_never_lost() {
    const THREADS: u32 = 4;
    const ROUNDS: u32 = 300;
    const BLOCKS: u32 = 10;

    // Fewer slots than blocks: most reads steal.
    let cache = Arc::new(Cache::<6, 13>::new(MemDisk::new()));
    let start = Arc::new(Barrier::new(THREADS as usize));

    let block_of = |t: u32, i: u32| (t * 7 + i * 3) % BLOCKS;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for i in 0..ROUNDS {
                    let mut buf = cache.read(1, block_of(t, i)).unwrap();
                    let next = counter(buf.data()).wrapping_add(1);
                    buf.data_mut()[..4].copy_from_slice(&next.to_le_bytes());
                    buf.write().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for block in 0..BLOCKS {
        let expected = (0..THREADS)
            .flat_map(|t| (0..ROUNDS).map(move |i| block_of(t, i)))
            .filter(|&b| b == block)
            .count();
        let initial = counter(&pattern(BlockId::new(1, block)));
        let on_disk = counter(&cache.device().contents(1, block));
        assert_eq!(
            on_disk.wrapping_sub(initial) as usize,
            expected,
            "block {block} lost updates"
        );
    }

    let audit = cache.audit();
    assert!(audit.is_consistent(), "{audit:?}");
    assert_eq!(audit.referenced, 0);
}

/// Every holder rewrites its block and writes it through before release, so
/// whatever a holder sees in the cache must match the disk.
#[test]
fn cached_contents_match_disk_under_rewrite_churn() {
    const THREADS: u64 = 4;
    const ROUNDS: u64 = 400;
    const BLOCKS: u64 = 24;

    let cache = Arc::new(Cache::<6, 13>::new(MemDisk::new()));
    let start = Arc::new(Barrier::new(THREADS as usize));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut block = t;
                for i in 0..ROUNDS {
                    block = (block * 7 + i) % BLOCKS;
                    let block = u32::try_from(block).unwrap();
                    let mut buf = cache.read(3, block).unwrap();
                    assert!(
                        buf.data() == &cache.device().contents(3, block),
                        "stale cached copy of block {block}"
                    );
                    let stamp = (t << 32 | i).to_le_bytes();
                    buf.data_mut()[..8].copy_from_slice(&stamp);
                    buf.write().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for block in 0..u32::try_from(BLOCKS).unwrap() {
        let buf = cache.read(3, block).unwrap();
        assert_eq!(buf.data(), &cache.device().contents(3, block));
    }
    let audit = cache.audit();
    assert!(audit.is_consistent(), "{audit:?}");
    assert_eq!(audit.referenced, 0);
}

#[test]
fn audit_stays_consistent_under_churn() {
    const WORKERS: usize = 3;

    let cache = Arc::new(Cache::<8, 13>::new(MemDisk::new()));
    let stop = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = (0..WORKERS)
        .map(|w| {
            let cache = Arc::clone(&cache);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut block = u32::try_from(w).unwrap();
                while !stop.load(Ordering::Relaxed) {
                    let buf = cache.read(2, block % 40).unwrap();
                    assert_eq!(buf.data(), &pattern(buf.id()));
                    block = block.wrapping_mul(31).wrapping_add(17);
                }
            })
        })
        .collect();

    for _ in 0..2_000 {
        let audit = cache.audit();
        assert!(audit.is_consistent(), "{audit:?}");
        assert!(audit.referenced <= WORKERS);
    }

    stop.store(true, Ordering::Relaxed);
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(cache.audit().referenced, 0);
}
