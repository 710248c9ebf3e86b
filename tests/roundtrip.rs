use vmsim::{VmConfig, VmManager};

#[test]
fn put_then_get_round_trips() {
    let vm = VmManager::with_defaults();
    let va = vm.alloc(64).unwrap();

    let written: Vec<u8> = (0..64u32).map(|i| (i % 256) as u8).collect();
    vm.put(va, &written).unwrap();

    let mut read = vec![0u8; 64];
    vm.get(va, &mut read).unwrap();
    assert_eq!(read, written);
}

#[test]
fn put_spans_multiple_pages() {
    let config = VmConfig {
        page_size: 64,
        ..VmConfig::default()
    };
    let vm = VmManager::new(config);
    let va = vm.alloc(300).unwrap();

    let written: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
    vm.put(va, &written).unwrap();

    let mut read = vec![0u8; 300];
    vm.get(va, &mut read).unwrap();
    assert_eq!(read, written);
}

#[test]
fn unaligned_offset_within_an_allocation_round_trips() {
    let config = VmConfig {
        page_size: 64,
        ..VmConfig::default()
    };
    let vm = VmManager::new(config);
    let va = vm.alloc(256).unwrap();

    // start 10 bytes into the first page and cross into the next page
    let start = vmsim::VirtAddr::new(va.get() + 10);
    let written = [7u8; 100];
    vm.put(start, &written).unwrap();

    let mut read = [0u8; 100];
    vm.get(start, &mut read).unwrap();
    assert_eq!(read, written);
}

#[test]
fn translate_of_unallocated_address_faults() {
    let vm = VmManager::with_defaults();
    let unmapped = vmsim::VirtAddr::new(0x1234_0000);
    assert!(vm.translate(unmapped).is_err());
}

#[test]
fn free_then_reallocate_reuses_space() {
    let vm = VmManager::with_defaults();
    let first = vm.alloc(4096).unwrap();
    vm.free(first, 4096).unwrap();
    let second = vm.alloc(4096).unwrap();
    assert_eq!(first, second);
}

#[test]
fn free_of_unmapped_range_errors_without_side_effects() {
    let vm = VmManager::with_defaults();
    let va = vm.alloc(4096).unwrap();
    vm.free(va, 4096).unwrap();

    // freeing again must fault rather than silently succeed
    assert!(vm.free(va, 4096).is_err());
}

#[test]
fn single_page_allocs_exhaust_at_frame_count_minus_reserved() {
    let config = VmConfig {
        page_size: 4096,
        memsize: 1 << 20,
        max_memsize: 1 << 20,
        ..VmConfig::default()
    };
    let vm = VmManager::new(config);
    let capacity = config.physical_frames() - 1; // frame 0 is reserved

    let mut allocated = 0;
    while vm.alloc(1).is_ok() {
        allocated += 1;
    }
    assert_eq!(allocated, capacity);
}

#[test]
fn zero_byte_alloc_is_rejected() {
    let vm = VmManager::with_defaults();
    assert!(vm.alloc(0).is_err());
}
