//! # Resource Parameters

/// Maximum number of cores; one free list per core.
pub const NCPU: usize = 8;

/// Maximum number of blocks any file-system operation writes.
pub const MAXOPBLOCKS: usize = 10;

/// Number of slots in the block buffer cache.
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// Number of independently locked hash buckets in the buffer cache.
///
/// Prime, so sequential block numbers spread evenly.
pub const NBUCKET: usize = 13;

/// Size of a disk block in bytes.
pub const BSIZE: usize = 1024;

const _: () = {
    assert!(NCPU > 0);
    assert!(NBUF > 0);
    assert!(NBUCKET > 0);
    assert!(BSIZE.is_power_of_two());
    assert!(BSIZE <= crate::memory::PAGE_SIZE);
};
