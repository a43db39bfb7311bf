#![allow(dead_code)]

use kernel_alloc::{IdentityPhysMapper, PageAllocator, PageRange, PhysicalAddress, PhysicalPage};
use kernel_info::memory::PAGE_SIZE;
use kernel_sync::CpuLocal;
use std::cell::Cell;

thread_local! {
    static CPU: Cell<usize> = const { Cell::new(0) };
    static OFF: Cell<usize> = const { Cell::new(0) };
}

/// Each test thread plays one core; the core id is whatever the thread set.
pub struct ThreadCpu;

impl ThreadCpu {
    pub fn run_on(cpu: usize) {
        CPU.set(cpu);
    }

    /// Current `push_off` nesting depth of this thread.
    pub fn depth() -> usize {
        OFF.get()
    }
}

impl CpuLocal for ThreadCpu {
    type Token = ();

    fn cpu_id(&self) -> usize {
        assert!(OFF.get() > 0, "core id read with preemption enabled");
        CPU.get()
    }

    fn push_off(&self) {
        OFF.set(OFF.get() + 1);
    }

    fn pop_off(&self, (): ()) {
        OFF.set(OFF.get() - 1);
    }
}

#[repr(C, align(4096))]
#[derive(Clone, Copy)]
struct Frame([u8; PAGE_SIZE]);

/// Page-aligned host memory standing in for physical RAM.
pub struct Arena {
    base: *mut Frame,
    frames: usize,
}

unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new(frames: usize) -> Self {
        let boxed = vec![Frame([0; PAGE_SIZE]); frames].into_boxed_slice();
        let base = Box::into_raw(boxed).cast::<Frame>();
        Self { base, frames }
    }

    pub fn start(&self) -> PhysicalAddress {
        PhysicalAddress::from_ptr(self.base)
    }

    pub fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.start().as_u64() + (self.frames * PAGE_SIZE) as u64)
    }

    pub fn range(&self) -> PageRange {
        PageRange::new(self.start(), self.end())
    }

    /// The bytes of a page inside the arena.
    pub fn bytes(&self, page: PhysicalPage) -> &[u8] {
        assert!(self.range().contains(page.base()));
        let ptr = std::ptr::with_exposed_provenance::<u8>(page.as_u64() as usize);
        unsafe { std::slice::from_raw_parts(ptr, PAGE_SIZE) }
    }

    pub fn bytes_mut(&self, page: PhysicalPage) -> &mut [u8] {
        assert!(self.range().contains(page.base()));
        let ptr = std::ptr::with_exposed_provenance_mut::<u8>(page.as_u64() as usize);
        unsafe { std::slice::from_raw_parts_mut(ptr, PAGE_SIZE) }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let slice = std::ptr::slice_from_raw_parts_mut(self.base, self.frames);
        drop(unsafe { Box::from_raw(slice) });
    }
}

pub type Kmem<const NCPU: usize> = PageAllocator<ThreadCpu, IdentityPhysMapper, NCPU>;

/// An allocator over all of `arena`.
pub fn kmem<const NCPU: usize>(arena: &Arena) -> Kmem<NCPU> {
    let kmem = PageAllocator::new(ThreadCpu, IdentityPhysMapper);
    unsafe { kmem.init(arena.range()) };
    kmem
}
