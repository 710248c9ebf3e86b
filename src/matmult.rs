//! Matrix multiplication expressed purely in terms of [`VmManager::put`]
//! and [`VmManager::get`]. It has no access to the manager's internals;
//! every byte it moves goes through the public API, exactly as an
//! external caller would.

use crate::error::VmError;
use crate::geometry::VirtAddr;
use crate::manager::VmManager;

fn elem_addr(base: VirtAddr, row: usize, col: usize, size: usize) -> VirtAddr {
    let offset = (row * size + col) * std::mem::size_of::<i32>();
    VirtAddr::new(base.get() + offset as u32)
}

fn get_i32(vm: &VmManager, addr: VirtAddr) -> Result<i32, VmError> {
    let mut buf = [0u8; 4];
    vm.get(addr, &mut buf)?;
    Ok(i32::from_ne_bytes(buf))
}

fn put_i32(vm: &VmManager, addr: VirtAddr, value: i32) -> Result<(), VmError> {
    vm.put(addr, &value.to_ne_bytes())
}

/// Multiplies two `size x size` `i32` matrices already resident at `mat1`
/// and `mat2`, writing the `size x size` result to `answer`. All three
/// regions must already be allocated with enough room for `size * size`
/// `i32` elements.
///
/// # Errors
///
/// Propagates the first [`VmError`] encountered while reading either
/// operand or writing a result element.
pub fn mat_mult(
    vm: &VmManager,
    mat1: VirtAddr,
    mat2: VirtAddr,
    size: usize,
    answer: VirtAddr,
) -> Result<(), VmError> {
    for row in 0..size {
        for col in 0..size {
            let mut sum: i32 = 0;
            for k in 0..size {
                let a = get_i32(vm, elem_addr(mat1, row, k, size))?;
                let b = get_i32(vm, elem_addr(mat2, k, col, size))?;
                sum = sum.wrapping_add(a.wrapping_mul(b));
            }
            put_i32(vm, elem_addr(answer, row, col, size), sum)?;
        }
    }
    Ok(())
}
