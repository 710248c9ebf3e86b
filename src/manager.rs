//! The virtual memory manager: the public API tying geometry, bitmaps, the
//! page table, and the TLB together.
//!
//! `VmManager` is created once and passed to every operation by reference,
//! with all three lock domains living inside it, rather than behind
//! process-wide global state.

use std::cell::UnsafeCell;
use std::sync::{Mutex, OnceLock};

use log::{debug, info, trace, warn};

use crate::bitmap::Bitmap;
use crate::config::VmConfig;
use crate::error::VmError;
use crate::geometry::{Geometry, PhysAddr, VirtAddr};
use crate::pagetable::PageDirectory;
use crate::tlb::Tlb;

/// Raw backing storage for the simulated physical buffer.
///
/// Access is unsynchronized by design: concurrent writes to the same page
/// from different clients are not policed here, that's the client's
/// problem. A `Mutex<Vec<u8>>` would serialize unrelated pages for no
/// benefit, so instead callers borrow raw slices out of an `UnsafeCell`.
struct PhysicalMemory {
    bytes: UnsafeCell<Box<[u8]>>,
}

// Safety: callers only ever obtain disjoint or caller-synchronized slices
// via `slice_mut`; the manager does not read/write `bytes` itself outside
// of that method.
unsafe impl Sync for PhysicalMemory {}

impl PhysicalMemory {
    fn new(size: usize) -> Self {
        Self {
            bytes: UnsafeCell::new(vec![0u8; size].into_boxed_slice()),
        }
    }

    /// Returns a mutable slice of `len` bytes starting at `offset`.
    ///
    /// # Safety
    ///
    /// The caller must ensure no other live reference overlaps
    /// `[offset, offset + len)` for the lifetime of the returned slice.
    unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        let ptr = unsafe { (*self.bytes.get()).as_mut_ptr().add(offset) };
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }
}

/// Both bitmaps under a single guard, so one mutex covers both.
struct BitmapState {
    virt: Bitmap,
    phys: Bitmap,
}

/// Everything a manager needs once it actually holds memory: the physical
/// buffer, both bitmaps, the page directory, and the TLB.
///
/// # Lock ordering
///
/// When more than one lock is needed, acquire in this order: `bitmaps` →
/// `page_dir` → `tlb`. [`VmManager::alloc`] holds `bitmaps` across the
/// mapping step (which takes `page_dir` internally). [`VmManager::free`]
/// holds `bitmaps` and `page_dir` together, and additionally `tlb` to
/// invalidate stale entries. [`VmManager::translate`] takes only one lock
/// at a time, never nesting `bitmaps`/`page_dir` inside a held `tlb` lock.
struct Inner {
    memory: PhysicalMemory,
    bitmaps: Mutex<BitmapState>,
    page_dir: Mutex<PageDirectory>,
    tlb: Mutex<Tlb>,
}

impl Inner {
    fn new(config: &VmConfig, geometry: Geometry) -> Self {
        debug!(
            "vmsim init: page_size={} dir_entries={} tab_entries={} tlb_size={}",
            config.page_size,
            geometry.dir_entries(),
            geometry.tab_entries(),
            config.tlb_size
        );
        Self {
            memory: PhysicalMemory::new(config.memsize as usize),
            bitmaps: Mutex::new(BitmapState {
                virt: Bitmap::with_reserved_zero(config.virtual_pages()),
                phys: Bitmap::with_reserved_zero(config.physical_frames()),
            }),
            page_dir: Mutex::new(PageDirectory::new(geometry.dir_entries(), geometry.tab_entries())),
            tlb: Mutex::new(Tlb::new(config.tlb_size)),
        }
    }
}

/// A virtual memory manager instance.
///
/// The physical buffer, both bitmaps, the page directory, and the TLB are
/// not allocated at construction. The first call to [`VmManager::alloc`]
/// triggers that one-shot setup; a manager that is built but never asked
/// to allocate anything costs nothing beyond `config` and `geometry`.
pub struct VmManager {
    config: VmConfig,
    geometry: Geometry,
    inner: OnceLock<Inner>,
}

impl VmManager {
    /// Creates a manager using [`VmConfig::default`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(VmConfig::default())
    }

    /// Creates a manager for the given configuration. Only geometry is
    /// computed eagerly; the rest of the manager's state is allocated
    /// lazily on first [`VmManager::alloc`].
    #[must_use]
    pub fn new(config: VmConfig) -> Self {
        let geometry = Geometry::new(config.page_size);
        Self {
            config,
            geometry,
            inner: OnceLock::new(),
        }
    }

    /// The configuration this manager was built with.
    #[must_use]
    pub const fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The initialized state, if [`Self::alloc`] has run at least once.
    fn inner(&self) -> Option<&Inner> {
        self.inner.get()
    }

    /// The initialized state, or the given fault if nothing has ever been
    /// allocated. Nothing can be mapped before the first `alloc`, so this
    /// never triggers initialization itself.
    fn inner_or_fault(&self, va: VirtAddr) -> Result<&Inner, VmError> {
        self.inner().ok_or(VmError::Unmapped { va })
    }

    fn pages_for(&self, bytes: u32) -> usize {
        let page_size = self.config.page_size;
        ((bytes as u64 + u64::from(page_size) - 1) / u64::from(page_size)) as usize
    }

    /// Finds a contiguous run of `n_pages` free virtual pages and `n_pages`
    /// free (not necessarily contiguous) physical frames, installs
    /// mappings for all of them, and returns the virtual address of the
    /// first page.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::InvalidSize`] for a zero-byte request,
    /// [`VmError::VirtualExhausted`] if no virtual run fits, or
    /// [`VmError::PhysicalExhausted`] if too few physical frames are free.
    /// On any error, no state is mutated.
    pub fn alloc(&self, num_bytes: u32) -> Result<VirtAddr, VmError> {
        if num_bytes == 0 {
            return Err(VmError::InvalidSize);
        }
        let n_pages = self.pages_for(num_bytes);
        let inner = self.inner.get_or_init(|| Inner::new(&self.config, self.geometry));

        let mut bitmaps = inner.bitmaps.lock().unwrap();
        let first_vpn = bitmaps
            .virt
            .find_run(1, n_pages)
            .ok_or(VmError::VirtualExhausted)? as u32;
        let frames = bitmaps
            .phys
            .find_n_free(1, n_pages)
            .ok_or(VmError::PhysicalExhausted)?;

        let mut page_dir = inner.page_dir.lock().unwrap();
        for (i, &frame) in frames.iter().enumerate() {
            let vpn = first_vpn + i as u32;
            bitmaps.virt.set_used(vpn as usize);
            bitmaps.phys.set_used(frame);
            let va = self.geometry.page_num_to_address(vpn);
            let (dir, tab, _) = self.geometry.decompose(va);
            page_dir.map(dir, tab, frame as u32);
        }
        drop(page_dir);
        drop(bitmaps);

        let first_va = self.geometry.page_num_to_address(first_vpn);
        trace!("alloc({num_bytes}) -> {first_va:?} ({n_pages} pages)");
        Ok(first_va)
    }

    /// Unmaps and frees the `n_pages = ceil(size / page_size)` pages
    /// starting at `va`.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Unmapped`] naming the first unmapped page found,
    /// without mutating any state, if any page in the range is not
    /// currently mapped.
    pub fn free(&self, va: VirtAddr, size: u32) -> Result<(), VmError> {
        if size == 0 {
            return Err(VmError::InvalidSize);
        }
        let n_pages = self.pages_for(size);
        let inner = self.inner_or_fault(va)?;

        let mut bitmaps = inner.bitmaps.lock().unwrap();
        let mut page_dir = inner.page_dir.lock().unwrap();

        // First pass: verify every page in the range is mapped before
        // mutating anything, so a fault partway through leaves the range
        // untouched.
        for i in 0..n_pages {
            let page_va = VirtAddr::new(va.get() + (i as u32) * self.config.page_size);
            let vpn = self.geometry.address_to_page_num(page_va, VirtAddr::new(0));
            if bitmaps.virt.is_free(vpn as usize) {
                return Err(VmError::Unmapped { va: page_va });
            }
        }

        // Second pass: actually clear mappings and bitmaps.
        let mut tlb = inner.tlb.lock().unwrap();
        for i in 0..n_pages {
            let page_va = VirtAddr::new(va.get() + (i as u32) * self.config.page_size);
            let (dir, tab, _) = self.geometry.decompose(page_va);
            let vpn = self.geometry.address_to_page_num(page_va, VirtAddr::new(0));
            if let Some(frame) = page_dir.unmap(dir, tab) {
                bitmaps.phys.set_free(frame as usize);
            }
            bitmaps.virt.set_free(vpn as usize);
            tlb.invalidate(page_va);
        }

        trace!("free({va:?}, {size}) ({n_pages} pages)");
        Ok(())
    }

    /// Translates a virtual address to a physical offset into the
    /// simulated buffer.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Unmapped`] if the virtual page is not allocated.
    pub fn translate(&self, va: VirtAddr) -> Result<PhysAddr, VmError> {
        let inner = self.inner_or_fault(va)?;

        if let Some(pa) = inner.tlb.lock().unwrap().lookup(va) {
            return Ok(PhysAddr::new(pa));
        }

        let (dir, tab, offset) = self.geometry.decompose(va);
        let vpn = self.geometry.address_to_page_num(va, VirtAddr::new(0));

        let bitmaps = inner.bitmaps.lock().unwrap();
        if bitmaps.virt.is_free(vpn as usize) {
            warn!("translate fault at {va:?}");
            return Err(VmError::Unmapped { va });
        }
        drop(bitmaps);

        let page_dir = inner.page_dir.lock().unwrap();
        let frame = page_dir
            .get(dir, tab)
            .frame()
            .ok_or(VmError::Unmapped { va })?;
        drop(page_dir);

        let pa = frame as usize * self.config.page_size as usize + offset as usize;
        inner.tlb.lock().unwrap().insert(va, pa);
        Ok(PhysAddr::new(pa))
    }

    /// Copies `src` into simulated memory starting at `va`, one page-sized
    /// chunk at a time, splitting at page boundaries so a non-page-aligned
    /// `va` is handled correctly.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Unmapped`] on the first unmapped page
    /// encountered; bytes before the fault have already been written.
    pub fn put(&self, va: VirtAddr, src: &[u8]) -> Result<(), VmError> {
        let mut done = 0usize;
        let mut cur = va;
        while done < src.len() {
            let pa = self.translate(cur)?;
            let inner = self
                .inner()
                .expect("translate succeeded, so inner is initialized");
            let page_off = (cur.get() % self.config.page_size) as usize;
            let chunk = (self.config.page_size as usize - page_off).min(src.len() - done);

            let _bitmaps = inner.bitmaps.lock().unwrap();
            let mem = unsafe { inner.memory.slice_mut(pa.get(), chunk) };
            mem.copy_from_slice(&src[done..done + chunk]);
            drop(_bitmaps);

            done += chunk;
            cur = VirtAddr::new(cur.get() + chunk as u32);
        }
        Ok(())
    }

    /// Copies `dst.len()` bytes from simulated memory starting at `va`,
    /// mirroring [`Self::put`].
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Unmapped`] on the first unmapped page
    /// encountered; bytes before the fault have already been read into
    /// `dst`.
    pub fn get(&self, va: VirtAddr, dst: &mut [u8]) -> Result<(), VmError> {
        let mut done = 0usize;
        let mut cur = va;
        while done < dst.len() {
            let pa = self.translate(cur)?;
            let inner = self
                .inner()
                .expect("translate succeeded, so inner is initialized");
            let page_off = (cur.get() % self.config.page_size) as usize;
            let chunk = (self.config.page_size as usize - page_off).min(dst.len() - done);

            let _bitmaps = inner.bitmaps.lock().unwrap();
            let mem = unsafe { inner.memory.slice_mut(pa.get(), chunk) };
            dst[done..done + chunk].copy_from_slice(mem);
            drop(_bitmaps);

            done += chunk;
            cur = VirtAddr::new(cur.get() + chunk as u32);
        }
        Ok(())
    }

    /// `misses / (hits + misses)` for the TLB so far. Zero if nothing has
    /// ever been allocated.
    #[must_use]
    pub fn miss_rate(&self) -> f64 {
        self.inner()
            .map_or(0.0, |inner| inner.tlb.lock().unwrap().miss_rate())
    }

    /// Logs the TLB miss rate at `info` level, like every other
    /// diagnostic in this crate.
    pub fn print_miss_rate(&self) {
        info!("TLB miss rate {}", self.miss_rate());
    }
}
