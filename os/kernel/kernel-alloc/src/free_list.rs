use crate::page::{PhysicalAddress, PhysicalPage};
use crate::phys_mapper::PhysMapper;

/// Link stored in the first bytes of every **free** page.
///
/// ```text
/// +-----------+----------------------------------+
/// | Run.next  |  FREE_FILL ... FREE_FILL         |
/// +-----------+----------------------------------+
/// ^ page base ^ page base + size_of::<Run>()
/// ```
///
/// `next` is the physical address of the next free page, `0` at the tail.
#[repr(C)]
pub(crate) struct Run {
    next: u64,
}

/// LIFO list of free pages threaded through the pages themselves.
///
/// Holds physical addresses only; every touch of a page goes through the
/// caller's [`PhysMapper`]. Always used under the owning core's lock.
pub(crate) struct FreeList {
    head: Option<PhysicalPage>,
    len: usize,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Push `page` onto the list.
    ///
    /// # Safety
    /// - `page` must be reachable through `mapper` and owned by the caller.
    /// - `page` must not already be on any free list.
    pub(crate) unsafe fn push<M: PhysMapper>(&mut self, mapper: &M, page: PhysicalPage) {
        // SAFETY: the caller owns `page`; its first bytes become the link.
        let run: &mut Run = unsafe { mapper.phys_to_mut(page.base()) };
        run.next = self.head.map_or(0, PhysicalPage::as_u64);
        self.head = Some(page);
        self.len += 1;
    }

    /// Pop the most recently pushed page.
    ///
    /// # Safety
    /// Every page on the list must be reachable through `mapper`.
    pub(crate) unsafe fn pop<M: PhysMapper>(&mut self, mapper: &M) -> Option<PhysicalPage> {
        let page = self.head?;
        // SAFETY: `page` is on this list, so its first bytes hold a `Run`.
        let run: &mut Run = unsafe { mapper.phys_to_mut(page.base()) };
        self.head = PhysicalPage::from_addr(PhysicalAddress::new(run.next));
        self.len -= 1;
        Some(page)
    }
}
