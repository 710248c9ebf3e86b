//! Error types surfaced by [`crate::VmManager`].

use crate::geometry::VirtAddr;

/// Errors that can occur while allocating, mapping, or accessing simulated
/// virtual memory.
///
/// One variant per distinct failure mode, derived via `thiserror`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// No contiguous run of free virtual pages was found for the request.
    #[error("no contiguous run of free virtual pages for the request")]
    VirtualExhausted,

    /// Fewer free physical frames are available than the request needs.
    #[error("insufficient free physical frames for the request")]
    PhysicalExhausted,

    /// A second-level page table could not be allocated.
    #[error("failed to allocate a page table")]
    TableAllocFailed,

    /// The virtual address does not resolve to a mapped page.
    #[error("virtual address {va:#010x} is not mapped")]
    Unmapped {
        /// The offending virtual address.
        va: VirtAddr,
    },

    /// A requested size was zero or otherwise invalid for the operation.
    #[error("invalid size for this operation")]
    InvalidSize,
}
