use crate::page::PhysicalAddress;

/// Why a page could not be returned to the allocator.
///
/// Every variant is a caller defect; [`PageAllocator::free`](crate::PageAllocator::free)
/// turns them into a panic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FreeError {
    #[error("allocator used before init")]
    Uninitialized,
    #[error("{0} is not page-aligned")]
    Misaligned(PhysicalAddress),
    #[error("{0} is outside the managed range")]
    OutOfRange(PhysicalAddress),
    #[error("{0} is already free")]
    DoubleFree(PhysicalAddress),
}
