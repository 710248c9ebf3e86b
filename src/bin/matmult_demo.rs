//! Benchmark driver for [`vmsim::mat_mult`]: allocates three regions inside
//! a [`vmsim::VmManager`], fills one with an identity matrix and one with
//! an arbitrary matrix, multiplies them, and checks the result against the
//! arbitrary matrix unchanged (since `A * I == A`).
//!
//! This binary sits outside the library crate on purpose: it is an
//! external collaborator of `get`/`put`, not part of the manager itself.

use std::mem::size_of;

use log::info;
use vmsim::{mat_mult, VirtAddr, VmManager};

const SIZE: usize = 16;

fn elem_addr(base: VirtAddr, row: usize, col: usize) -> VirtAddr {
    let offset = (row * SIZE + col) * size_of::<i32>();
    VirtAddr::new(base.get() + offset as u32)
}

fn main() {
    env_logger::init();

    let vm = VmManager::with_defaults();
    let bytes = (SIZE * SIZE * size_of::<i32>()) as u32;

    let mat1 = vm.alloc(bytes).expect("allocate mat1");
    let identity = vm.alloc(bytes).expect("allocate identity");
    let answer = vm.alloc(bytes).expect("allocate answer");

    for row in 0..SIZE {
        for col in 0..SIZE {
            let value = (row * SIZE + col) as i32;
            vm.put(elem_addr(mat1, row, col), &value.to_ne_bytes())
                .expect("write mat1 element");
            let identity_value = i32::from(row == col);
            vm.put(elem_addr(identity, row, col), &identity_value.to_ne_bytes())
                .expect("write identity element");
        }
    }

    mat_mult(&vm, mat1, identity, SIZE, answer).expect("matrix multiply");

    let mut mismatches = 0usize;
    for row in 0..SIZE {
        for col in 0..SIZE {
            let mut buf = [0u8; 4];
            vm.get(elem_addr(answer, row, col), &mut buf).expect("read result element");
            let got = i32::from_ne_bytes(buf);
            let expected = (row * SIZE + col) as i32;
            if got != expected {
                mismatches += 1;
            }
        }
    }

    info!("matmult_demo: {SIZE}x{SIZE}, {mismatches} mismatches");
    vm.print_miss_rate();

    if mismatches == 0 {
        println!("OK: {SIZE}x{SIZE} matrix multiply matches expected result");
    } else {
        println!("FAIL: {mismatches} mismatched elements");
        std::process::exit(1);
    }
}
