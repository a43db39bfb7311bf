//! # Block Buffer Cache
//!
//! Keeps recently used disk blocks in memory and gives one caller at a time
//! exclusive access to each. File-system code reads a block, edits it in
//! place, writes it through and releases it; a second reader of the same
//! block waits for the first and then sees its changes without touching the
//! disk.
//!
//! ## Layout
//!
//! ```text
//!   bucket 0        bucket 1              bucket 12
//! ┌─────────┐     ┌─────────┐           ┌─────────┐
//! │ spin    │     │ spin    │    ...    │ spin    │
//! │ ring ───┼─►s0 │ ring ───┼─►s1       │ ring ───┼─►s12
//! └─────────┘   ↺ └─────────┘   ↺       └─────────┘   ↺
//!
//!   slots:  [ valid | sleep lock | BSIZE bytes ] x NBUF
//! ```
//!
//! Each bucket lock guards the membership of its ring plus the identity
//! and reference count of every slot in it. Each slot's sleep lock guards
//! its bytes and is held for as long as the caller keeps the [`Buf`],
//! including across disk I/O.
//!
//! ## Failure model
//!
//! * Every slot referenced: `bget: no buffers` panic.
//! * Device errors: returned from [`BufferCache::read`] and [`Buf::write`].
//! * Unbalanced [`BufferCache::unpin`]: panic.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kernel_bio::BufferCache;
//!
//! let bcache: BufferCache<VirtioDisk, SchedPark> = BufferCache::new(VirtioDisk::probe()?);
//!
//! let mut buf = bcache.read(ROOTDEV, 1)?;
//! buf.data_mut()[0] = 0xff;
//! buf.write()?;
//! bcache.release(buf);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod block;
mod buf;
mod bucket;
pub mod cache;

pub use block::{BlockData, BlockDevice, BlockId, BlockIoError};
pub use buf::{Buf, BufPin};
pub use bucket::bucket_of;
pub use cache::{BufferCache, CacheAudit};
