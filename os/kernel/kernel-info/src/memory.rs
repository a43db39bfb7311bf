//! # Memory Layout

/// Size of a physical page handed out by the page allocator.
pub const PAGE_SIZE: usize = 4096;

/// Byte written over a page right before the allocator returns it.
///
/// Code that reads a page it never initialized sees `0x05` everywhere.
pub const ALLOC_FILL: u8 = 0x05;

/// Byte written over a page when it is returned to the allocator.
///
/// Dangling references into freed memory read `0x01`.
pub const FREE_FILL: u8 = 0x01;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(ALLOC_FILL != FREE_FILL);
    assert!(HHDM_BASE.is_multiple_of(PAGE_SIZE as u64));
};
