//! # Kernel Configuration
//!
//! Compile-time parameters shared by the kernel's resource managers. Every
//! subsystem that sizes a fixed pool reads its default from here so the
//! numbers cannot drift between crates.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! * **Page geometry**: page size and shift used by the physical page allocator
//! * **Fill patterns**: bytes written into pages on allocation and on free
//! * **Direct map**: the HHDM base used to reach physical memory
//!
//! ### Resource Parameters ([`param`])
//! * **Cores**: number of per-core free lists
//! * **Buffer cache**: pool size, number of hash buckets, block size
//!
//! ## Overriding
//!
//! The constants are defaults. The allocator and the buffer cache take their
//! pool sizes as const generics, so a test (or a board with a different
//! core count) instantiates them with other values without touching this
//! crate:
//!
//! ```text
//! BufferCache<Disk, SpinPark, 2, 13>   // two slots, thirteen buckets
//! PageAllocator<Cpus, Mapper, 2>       // two cores
//! ```
//!
//! All values are checked by `const` assertions at build time.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
pub mod param;
