//! # Physical Page Allocator
//!
//! Hands out and reclaims fixed-size physical pages for the rest of the
//! kernel: process images, page-table pages, kernel stacks, pipe buffers.
//! The allocator knows nothing about mappings; it deals in
//! [`PhysicalPage`]s and reaches their bytes through a [`PhysMapper`].
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              PageAllocator (kalloc)                 │
//! │    • one SpinMutex<FreeList> per core               │
//! │    • local pop, cross-core steal on empty           │
//! │    • fill-on-alloc / fill-on-free poisoning         │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Physical Mapper                        │
//! │    • HHDM in the kernel, identity in early boot     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Per-core lists keep the common path free of shared locks. The core index
//! is read inside a [`PreemptGuard`](kernel_sync::PreemptGuard), so a task
//! cannot migrate between reading it and using the list. The cross-core
//! scan takes one list lock at a time.
//!
//! ## Failure model
//!
//! * Out of pages: [`PageAllocator::alloc`] returns `None`.
//! * Bad free (misaligned, out of range, double free, before init):
//!   [`PageAllocator::free`] panics; [`PageAllocator::try_free`] reports a
//!   [`FreeError`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kernel_alloc::{PageAllocator, PageRange, PhysicalAddress, HhdmPhysMapper};
//! use kernel_sync::IrqCpu;
//!
//! static KMEM: PageAllocator<IrqCpu, HhdmPhysMapper> =
//!     PageAllocator::new(IrqCpu::new(current_cpu), HhdmPhysMapper);
//!
//! unsafe { KMEM.init(PageRange::new(kernel_end, PhysicalAddress::new(PHYSTOP))) };
//! let page = KMEM.alloc().expect("out of memory");
//! KMEM.free(page);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod error;
mod free_list;
pub mod kalloc;
pub mod page;
pub mod phys_mapper;

pub use error::FreeError;
pub use kalloc::PageAllocator;
pub use page::{PageRange, PhysicalAddress, PhysicalPage};
pub use phys_mapper::{HhdmPhysMapper, IdentityPhysMapper, PhysMapper};
