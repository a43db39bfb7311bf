//! # Reaching physical memory
//!
//! The allocator writes into the pages it manages (the free-list link and
//! the fill patterns), so it needs a pointer for a physical address. How
//! that pointer is formed depends on the environment:
//!
//! - **Kernel**: every physical address is mapped at `HHDM_BASE + pa`
//!   ([`HhdmPhysMapper`]).
//! - **Early boot / host tests**: physical equals virtual
//!   ([`IdentityPhysMapper`]).

use crate::page::PhysicalAddress;
use kernel_info::memory::HHDM_BASE;

/// Translates physical addresses into the current address space.
pub trait PhysMapper {
    /// Virtual address at which `pa` is mapped.
    fn phys_to_virt(&self, pa: PhysicalAddress) -> usize;

    /// A reference to the `T` at `pa`.
    ///
    /// # Safety
    /// - `pa` is mapped writable and aligned for `T`.
    /// - `'a` is unchecked: the mapping must outlive the reference and no
    ///   other reference to the same memory may be live.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = core::ptr::with_exposed_provenance_mut::<T>(self.phys_to_virt(pa));
        unsafe { &mut *ptr }
    }
}

/// Higher-half direct map at [`HHDM_BASE`].
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    #[allow(clippy::cast_possible_truncation)]
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> usize {
        (HHDM_BASE + pa.as_u64()) as usize
    }
}

/// Physical equals virtual.
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    #[allow(clippy::cast_possible_truncation)]
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> usize {
        pa.as_u64() as usize
    }
}
