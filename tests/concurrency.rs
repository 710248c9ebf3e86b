use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use vmsim::{VmConfig, VmManager};

#[test]
fn concurrent_allocations_never_overlap() {
    let config = VmConfig {
        page_size: 64,
        memsize: 1024 * 1024,
        max_memsize: 16 * 1024 * 1024,
        ..VmConfig::default()
    };
    let vm = Arc::new(VmManager::new(config));
    let threads = 8;
    let allocs_per_thread = 20;
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let vm = Arc::clone(&vm);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            let mut addrs = Vec::with_capacity(allocs_per_thread);
            for _ in 0..allocs_per_thread {
                addrs.push(vm.alloc(64).expect("allocation exhausted too early"));
            }
            addrs
        }));
    }

    let mut all_addrs = Vec::new();
    for h in handles {
        all_addrs.extend(h.join().unwrap());
    }

    let unique: HashSet<_> = all_addrs.iter().map(vmsim::VirtAddr::get).collect();
    assert_eq!(unique.len(), all_addrs.len(), "two threads were handed the same page");
}

#[test]
fn concurrent_put_get_on_disjoint_regions_is_consistent() {
    let vm = Arc::new(VmManager::with_defaults());
    let threads = 6;
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for t in 0..threads {
        let vm = Arc::clone(&vm);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            let va = vm.alloc(256).unwrap();
            let pattern = vec![t as u8; 256];
            start.wait();
            vm.put(va, &pattern).unwrap();
            let mut back = vec![0u8; 256];
            vm.get(va, &mut back).unwrap();
            assert_eq!(back, pattern, "thread {t} observed another thread's bytes");
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}
