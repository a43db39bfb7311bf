//! Physical addresses, pages and the managed page range.

use core::fmt;
use kernel_info::memory::PAGE_SIZE;

const PAGE_MASK: u64 = PAGE_SIZE as u64 - 1;

/// Physical memory address.
///
/// Carries intent only; dereferencing one requires a
/// [`PhysMapper`](crate::phys_mapper::PhysMapper).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    /// Address of `ptr` under an identity mapping.
    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr.expose_provenance() as u64)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    /// `PGROUNDUP`
    #[inline]
    #[must_use]
    pub const fn page_round_up(self) -> Self {
        Self((self.0 + PAGE_MASK) & !PAGE_MASK)
    }

    /// `PGROUNDDOWN`
    #[inline]
    #[must_use]
    pub const fn page_round_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalAddress({:#x})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A page-aligned, non-null physical page of [`PAGE_SIZE`] bytes.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(PhysicalAddress);

impl PhysicalPage {
    /// `None` unless `pa` is page-aligned and not the null page.
    #[inline]
    #[must_use]
    pub const fn from_addr(pa: PhysicalAddress) -> Option<Self> {
        if pa.0 != 0 && pa.is_page_aligned() {
            Some(Self(pa))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.0
    }
}

impl From<PhysicalPage> for PhysicalAddress {
    fn from(page: PhysicalPage) -> Self {
        page.0
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage({:#x})", self.0.0)
    }
}

/// The half-open range `[start, end)` of physical memory handed to the allocator.
///
/// `start` is rounded up and `end` down to a page boundary, so a partial
/// page at either edge is not managed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageRange {
    start: PhysicalAddress,
    end: PhysicalAddress,
}

impl PageRange {
    #[must_use]
    pub const fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        Self {
            start: start.page_round_up(),
            end: end.page_round_down(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.end
    }

    /// Number of whole pages in the range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn page_count(&self) -> usize {
        if self.end.0 <= self.start.0 {
            0
        } else {
            ((self.end.0 - self.start.0) / PAGE_SIZE as u64) as usize
        }
    }

    /// Whether `pa` lies in `[start, end)`. Both bounds are page-aligned, so
    /// a page whose base is contained lies wholly inside the range.
    #[inline]
    #[must_use]
    pub const fn contains(&self, pa: PhysicalAddress) -> bool {
        pa.0 >= self.start.0 && pa.0 < self.end.0
    }

    /// Every whole page in the range, in address order.
    pub fn pages(&self) -> impl Iterator<Item = PhysicalPage> + use<> {
        let start = self.start.0;
        (0..self.page_count() as u64)
            .filter_map(move |i| PhysicalPage::from_addr(PhysicalAddress(start + i * PAGE_SIZE as u64)))
    }
}
