use vmsim::VmManager;

#[test]
fn second_translate_of_same_address_is_a_tlb_hit() {
    let vm = VmManager::with_defaults();
    let va = vm.alloc(4096).unwrap();

    assert_eq!(vm.miss_rate(), 0.0);

    vm.translate(va).unwrap(); // first lookup: miss, then inserted
    assert!((vm.miss_rate() - 1.0).abs() < f64::EPSILON);

    vm.translate(va).unwrap(); // second lookup: hit
    assert!(vm.miss_rate() < 1.0);
}

#[test]
fn free_invalidates_the_tlb_entry() {
    let vm = VmManager::with_defaults();
    let va = vm.alloc(4096).unwrap();
    vm.translate(va).unwrap(); // populate the TLB

    vm.free(va, 4096).unwrap();

    // a stale TLB hit would wrongly resolve a freed page
    assert!(vm.translate(va).is_err());
}
