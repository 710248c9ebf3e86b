//! A user-space simulation of a two-level, software-managed virtual memory
//! manager: bitmap-based frame/page allocation, a two-level page table, and
//! a FIFO translation cache with hit/miss accounting.
//!
//! The simulated address space is backed by an ordinary heap buffer rather
//! than real hardware paging — this crate exists to make the bookkeeping a
//! page-table-based VM performs (allocation, translation, caching, partial
//! frees) visible and testable in isolation, the way the original teaching
//! assignment it was distilled from does.
//!
//! Start at [`VmManager`], the single entry point for `alloc`/`free`/`put`/
//! `get`/`translate`.

mod bitmap;
mod config;
mod error;
mod geometry;
mod manager;
mod matmult;
mod pagetable;
mod tlb;

pub use config::VmConfig;
pub use error::VmError;
pub use geometry::{FrameIndex, PhysAddr, VirtAddr, Vpn};
pub use manager::VmManager;
pub use matmult::mat_mult;
