//! # Per-core physical page allocator
//!
//! Every core owns a free list behind its own spin lock. Allocation and free
//! touch only the calling core's list; a core whose list ran dry steals one
//! page at a time from the others.
//!
//! ```text
//!   core 0            core 1            core 2
//! ┌─────────┐       ┌─────────┐       ┌─────────┐
//! │ lock    │       │ lock    │       │ lock    │
//! │ head ───┼─► pg  │ head ───┼─► pg  │ head    │ (empty)
//! └─────────┘   │   └─────────┘   │   └─────────┘
//!               ▼                 ▼        │
//!               pg                pg  ◄────┘ steal (lock, pop, unlock)
//! ```
//!
//! A freed page always goes to the *freeing* core's list, wherever it was
//! allocated.

use crate::error::FreeError;
use crate::free_list::{FreeList, Run};
use crate::page::{PageRange, PhysicalAddress, PhysicalPage};
use crate::phys_mapper::PhysMapper;
use kernel_info::memory::{ALLOC_FILL, FREE_FILL, PAGE_SIZE};
use kernel_info::param;
use kernel_sync::{CpuLocal, PreemptGuard, SpinMutex, SyncOnceCell};
use log::{debug, trace, warn};

/// Physical page allocator with one free list per core.
///
/// Construct once, [`init`](Self::init) once before other cores run, then
/// share by reference.
pub struct PageAllocator<C, M, const NCPU: usize = { param::NCPU }> {
    cpus: C,
    mapper: M,
    range: SyncOnceCell<PageRange>,
    lists: [SpinMutex<FreeList>; NCPU],
}

impl<C, M, const NCPU: usize> PageAllocator<C, M, NCPU> {
    pub const fn new(cpus: C, mapper: M) -> Self {
        const { assert!(NCPU > 0, "need at least one core") };
        Self {
            cpus,
            mapper,
            range: SyncOnceCell::new(),
            lists: [const { SpinMutex::new(FreeList::new()) }; NCPU],
        }
    }

    /// The managed range, once initialized.
    pub fn range(&self) -> Option<PageRange> {
        self.range.get().copied()
    }

    /// Number of pages under management.
    pub fn total_pages(&self) -> usize {
        self.range.get().map_or(0, PageRange::page_count)
    }

    /// Length of `cpu`'s free list.
    ///
    /// # Panics
    /// If `cpu >= NCPU`.
    pub fn free_pages(&self, cpu: usize) -> usize {
        self.lists[cpu].with_lock(|list| list.len())
    }

    /// Sum of all free-list lengths, one list at a time.
    pub fn total_free(&self) -> usize {
        self.lists.iter().map(|l| l.with_lock(|list| list.len())).sum()
    }
}

impl<C, M, const NCPU: usize> PageAllocator<C, M, NCPU>
where
    C: CpuLocal,
    M: PhysMapper,
{
    /// Hands `range` to the allocator, dealing its pages round-robin across
    /// the per-core lists starting at core 0.
    ///
    /// # Safety
    /// - Every page in `range` must be RAM reachable through the mapper and
    ///   used by nothing else from now on.
    /// - Must run before any other core touches the allocator.
    ///
    /// # Panics
    /// If called twice, or if the range contains the null page.
    pub unsafe fn init(&self, range: PageRange) {
        assert!(range.start().as_u64() != 0, "kinit: range includes the null page");
        assert!(
            self.range.set(range).is_ok(),
            "kinit: allocator already initialized"
        );

        for (i, page) in range.pages().enumerate() {
            // SAFETY: the caller hands over every page of `range`.
            unsafe {
                self.fill(page, FREE_FILL);
                self.lists[i % NCPU].with_lock(|list| list.push(&self.mapper, page));
            }
        }

        debug!(
            "kinit: {} pages in [{}, {}) across {} cores",
            range.page_count(),
            range.start(),
            range.end(),
            NCPU
        );
    }

    /// Allocate one page, filled with [`ALLOC_FILL`].
    ///
    /// Tries the calling core's list first, then every other core's list in
    /// index order. `None` only when every list is empty.
    ///
    /// # Panics
    /// If the allocator was never initialized.
    pub fn alloc(&self) -> Option<PhysicalPage> {
        assert!(self.range.get().is_some(), "kalloc: used before init");

        let page = {
            let pin = PreemptGuard::new(&self.cpus);
            let home = Self::home(&pin);
            // SAFETY: listed pages are managed and reachable through the mapper.
            let local = self.lists[home].with_lock(|list| unsafe { list.pop(&self.mapper) });
            local.or_else(|| self.steal(home))
        };

        let Some(page) = page else {
            warn!("kalloc: out of pages");
            return None;
        };
        // SAFETY: popped pages belong to nobody else.
        unsafe { self.fill(page, ALLOC_FILL) };
        Some(page)
    }

    /// Return a page to the calling core's free list.
    ///
    /// # Panics
    /// On any [`FreeError`]; freeing a page that is not a live allocation is
    /// a caller defect.
    pub fn free(&self, pa: impl Into<PhysicalAddress>) {
        if let Err(e) = self.try_free(pa) {
            panic!("kfree: {e}");
        }
    }

    /// Like [`free`](Self::free), reporting contract violations instead of
    /// panicking.
    ///
    /// A page whose body still carries [`FREE_FILL`] from its last free is
    /// reported as [`FreeError::DoubleFree`]. A caller
    /// that deliberately fills a live page with that byte trips the check too.
    ///
    /// # Errors
    /// See [`FreeError`].
    pub fn try_free(&self, pa: impl Into<PhysicalAddress>) -> Result<(), FreeError> {
        let pa = pa.into();
        let range = self.range.get().ok_or(FreeError::Uninitialized)?;
        if !pa.is_page_aligned() {
            return Err(FreeError::Misaligned(pa));
        }
        if !range.contains(pa) {
            return Err(FreeError::OutOfRange(pa));
        }
        let page = PhysicalPage::from_addr(pa).ok_or(FreeError::Misaligned(pa))?;

        // SAFETY: `page` is aligned and inside the managed range.
        if unsafe { self.looks_free(page) } {
            return Err(FreeError::DoubleFree(pa));
        }

        // SAFETY: the caller gives up the page by freeing it.
        unsafe { self.fill(page, FREE_FILL) };

        let pin = PreemptGuard::new(&self.cpus);
        let home = Self::home(&pin);
        self.lists[home].with_lock(|list| unsafe { list.push(&self.mapper, page) });
        Ok(())
    }

    /// Visit every other core's list; take the first page found.
    ///
    /// Holds at most one list lock at a time.
    fn steal(&self, home: usize) -> Option<PhysicalPage> {
        for victim in (0..NCPU).filter(|&c| c != home) {
            let page = self.lists[victim].with_lock(|list| unsafe { list.pop(&self.mapper) });
            if let Some(page) = page {
                trace!("kalloc: core {home} stole {page:?} from core {victim}");
                return Some(page);
            }
        }
        None
    }

    fn home(pin: &PreemptGuard<'_, C>) -> usize {
        let id = pin.cpu_id();
        assert!(id < NCPU, "kalloc: core id {id} out of range");
        id
    }

    /// # Safety
    /// The caller owns `page`.
    unsafe fn fill(&self, page: PhysicalPage, byte: u8) {
        // SAFETY: page-aligned, mapped by the mapper, and owned by the caller.
        let bytes: &mut [u8; PAGE_SIZE] = unsafe { self.mapper.phys_to_mut(page.base()) };
        bytes.fill(byte);
    }

    /// Whether the page body (past the list link) is entirely [`FREE_FILL`].
    ///
    /// # Safety
    /// `page` lies in the managed range.
    unsafe fn looks_free(&self, page: PhysicalPage) -> bool {
        // SAFETY: the range is mapped; the borrow ends before any other access.
        let bytes: &mut [u8; PAGE_SIZE] = unsafe { self.mapper.phys_to_mut(page.base()) };
        bytes[size_of::<Run>()..].iter().all(|&b| b == FREE_FILL)
    }
}
