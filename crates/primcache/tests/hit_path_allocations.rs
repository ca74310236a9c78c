//! Heap traffic of a plan cache hit, measured with a counting allocator.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use primcache::host::HostBackend;
use primcache::{DataType, OpKey, OpVariant, PlanCache, TensorDesc};

struct CountingAllocator;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

fn count() {
    let _ = ALLOCATIONS.try_with(|allocations| allocations.set(allocations.get() + 1));
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        count();
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        count();
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        count();
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

fn key() -> OpKey {
    OpKey::new(
        [
            TensorDesc::new([32, 64], DataType::F32),
            TensorDesc::new([64, 16], DataType::U4),
            TensorDesc::new([32, 16], DataType::F32),
        ],
        OpVariant::Plain,
    )
}

#[test]
fn cache_hits_do_not_allocate() {
    let backend = HostBackend::new();
    let mut cache = PlanCache::<HostBackend>::new();
    // Warm up past the first summary so every callsite on the hit path is registered.
    for _ in 0..200 {
        cache.resolve_variant(&backend, key()).unwrap();
    }

    let lookups: Vec<OpKey> = (0..1000).map(|_| key()).collect();
    let before = allocations();
    for lookup in lookups {
        cache.resolve(&backend, lookup, |_| Ok(())).unwrap();
    }
    let during = allocations() - before;

    assert_eq!(during, 0);
    let metrics = cache.metrics();
    assert_eq!((metrics.hits, metrics.misses), (1199, 1));
}
