//! Bit-field geometry: carving a 32-bit virtual address into a directory
//! index, a table index, and a page offset.
//!
//! The split is computed at runtime from a configurable page size rather
//! than fixed at compile time, so different [`crate::VmConfig`]s can
//! exercise different directory/table widths.

use std::fmt;

/// A 32-bit address in the simulated virtual address space.
///
/// Newtype over `u32` so virtual and physical addresses cannot be mixed up
/// at the type level, mirroring `kernel_vmem::addresses::VirtAddr`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct VirtAddr(pub u32);

impl VirtAddr {
    /// Wraps a raw address.
    #[must_use]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// Returns the raw address.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}

impl fmt::LowerHex for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A host offset into the simulated physical buffer.
///
/// Newtype over `usize`; this is the value [`crate::VmManager::translate`]
/// returns, an offset into the simulated physical buffer.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Debug)]
pub struct PhysAddr(pub usize);

impl PhysAddr {
    /// Wraps a raw offset.
    #[must_use]
    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// Returns the raw offset.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// The linear index of a virtual page: `dir * tab_entries + tab`.
pub type Vpn = u32;
/// The index of a physical frame in the physical bitmap/buffer.
pub type FrameIndex = u32;

/// Derived geometry for a given page size, computed once at
/// [`crate::VmManager`] initialization and never mutated afterward.
///
/// Offset bits come from `log2(page_size)`. Of the remaining `32 -
/// offset_bits` high bits, the directory gets the low half and the table
/// gets the (possibly larger) remaining half, so any odd bit goes to the
/// table index.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    offset_bits: u32,
    dir_bits: u32,
    tab_bits: u32,
    offset_mask: u32,
    tab_mask: u32,
    dir_mask: u32,
}

impl Geometry {
    /// Derives geometry from a page size. `page_size` must be a power of
    /// two no larger than `2^31`.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is not a power of two.
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        assert!(page_size.is_power_of_two(), "page size must be a power of two");
        let offset_bits = page_size.trailing_zeros();
        let remaining = 32 - offset_bits;
        let dir_bits = remaining / 2;
        let tab_bits = remaining - dir_bits;
        let offset_mask = page_size - 1;
        let tab_mask = ((1u64 << tab_bits) - 1) as u32;
        let dir_mask = ((1u64 << dir_bits) - 1) as u32;
        debug_assert_eq!(offset_bits + dir_bits + tab_bits, 32);
        Self {
            offset_bits,
            dir_bits,
            tab_bits,
            offset_mask,
            tab_mask,
            dir_mask,
        }
    }

    /// Number of entries in the page directory: `2^dir_bits`.
    #[must_use]
    pub const fn dir_entries(self) -> usize {
        1usize << self.dir_bits
    }

    /// Number of entries in each page table: `2^tab_bits`.
    #[must_use]
    pub const fn tab_entries(self) -> usize {
        1usize << self.tab_bits
    }

    /// The page size this geometry was derived from.
    #[must_use]
    pub const fn page_size(self) -> u32 {
        1u32 << self.offset_bits
    }

    /// Splits `va` into `(directory index, table index, offset)`.
    #[must_use]
    pub fn decompose(self, va: VirtAddr) -> (usize, usize, u32) {
        let v = va.get();
        let offset = v & self.offset_mask;
        let tab = (v >> self.offset_bits) & self.tab_mask;
        let dir = (v >> (self.offset_bits + self.tab_bits)) & self.dir_mask;
        (dir as usize, tab as usize, offset)
    }

    /// `vpn * page_size`, as a virtual address. The offset is always zero,
    /// since a VPN names a whole page.
    #[must_use]
    pub fn page_num_to_address(self, vpn: Vpn) -> VirtAddr {
        VirtAddr::new(vpn << self.offset_bits)
    }

    /// `(addr - base) / page_size`.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is below `base`.
    #[must_use]
    pub fn address_to_page_num(self, addr: VirtAddr, base: VirtAddr) -> Vpn {
        let delta = addr
            .get()
            .checked_sub(base.get())
            .expect("address_to_page_num: addr below base");
        delta >> self.offset_bits
    }
}
