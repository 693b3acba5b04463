//! Integration tests for the `block_pool` package.
//!
//! These exercise the public API end to end: reuse order, growth, address stability and the
//! construction and destruction contract.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use block_pool::{BlockPool, DropPolicy, Handle};
use new_zealand::nz;

fn addr<T>(handle: &Handle<T>) -> usize {
    handle.ptr().addr().get()
}

#[derive(Clone, Debug, PartialEq)]
struct Widget {
    id: u32,
    name: String,
    weight: f64,
}

impl Widget {
    fn new(id: u32, name: &str, weight: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            weight,
        }
    }
}

/// Counts how many times instances sharing the counter have been dropped.
struct Tracked {
    drops: Rc<Cell<usize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[test]
fn widget_scenario() {
    let mut pool = BlockPool::<Widget>::new(nz!(4));

    let a = pool.allocate(Widget::new(1, "a", 1.0));
    let b = pool.allocate(Widget::new(2, "b", 2.0));
    let c = pool.allocate(Widget::new(3, "c", 3.0));
    let d = pool.allocate(Widget::new(4, "d", 4.0));

    assert_eq!(pool.block_count(), 1);
    assert_eq!(pool.len(), 4);

    let b_addr = addr(&b);
    pool.free(b);

    let e = pool.allocate(Widget::new(5, "e", 5.0));
    assert_eq!(addr(&e), b_addr);
    assert_eq!(pool.block_count(), 1);

    let f = pool.allocate(Widget::new(6, "f", 6.0));
    assert_eq!(pool.block_count(), 2);
    assert_eq!(pool.capacity(), 8);

    // F is the first object of the second block, so it cannot sit inside the first block.
    let first_block = [&a, &c, &d, &e].map(addr);
    let lowest = first_block.iter().min().copied().unwrap();
    let highest = first_block.iter().max().copied().unwrap();
    assert!(addr(&f) < lowest || addr(&f) > highest);

    assert_eq!(pool.get(&e).name, "e");
    assert_eq!(pool.get(&f).id, 6);

    for handle in [a, c, d, e, f] {
        pool.free(handle);
    }

    assert!(pool.is_empty());
}

#[test]
fn live_handles_are_unique_under_interleaving() {
    let mut pool = BlockPool::<u64>::new(nz!(5));
    let mut live: Vec<Handle<u64>> = Vec::new();

    // A deterministic but irregular mix of allocations and frees.
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;

    for step in 0..2_000_u64 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        if live.is_empty() || state % 3 != 0 {
            live.push(pool.allocate(step));
        } else {
            let index = usize::try_from(state % live.len() as u64).unwrap();
            let handle = live.swap_remove(index);
            pool.free(handle);
        }

        let addrs = live.iter().map(addr).collect::<HashSet<_>>();
        assert_eq!(addrs.len(), live.len());
        assert_eq!(pool.len(), live.len());
    }

    for handle in live {
        pool.free(handle);
    }
}

#[test]
fn reuse_before_growth() {
    let mut pool = BlockPool::<u32>::new(nz!(2));

    let a = pool.allocate(1);
    let b = pool.allocate(2);
    assert_eq!(pool.block_count(), 1);

    let a_addr = addr(&a);
    pool.free(a);

    // The block is full but a slot was freed, so no growth happens.
    let c = pool.allocate(3);
    assert_eq!(addr(&c), a_addr);
    assert_eq!(pool.block_count(), 1);

    // Now both the free list and the block are exhausted.
    let d = pool.allocate(4);
    assert_eq!(pool.block_count(), 2);

    pool.free(b);
    pool.free(c);
    pool.free(d);
}

#[test]
fn block_count_never_decreases() {
    let mut pool = BlockPool::<u8>::new(nz!(3));
    let mut previous = pool.block_count();

    for round in 0..10 {
        let handles = (0..round * 2).map(|x| pool.allocate(x)).collect::<Vec<_>>();
        assert!(pool.block_count() >= previous);
        previous = pool.block_count();

        for handle in handles {
            pool.free(handle);
        }
        assert_eq!(pool.block_count(), previous);
    }

    // The largest round needed 18 live objects at once, which takes 6 blocks of 3.
    assert_eq!(pool.block_count(), 6);
}

#[test]
fn addresses_stable_across_growth() {
    let mut pool = BlockPool::<Widget>::new(nz!(2));

    let pinned = pool.allocate(Widget::new(0, "anchor", 0.5));
    let pinned_ptr = pinned.ptr();

    let others = (1..50)
        .map(|id| pool.allocate(Widget::new(id, "filler", 1.0)))
        .collect::<Vec<_>>();

    assert!(pool.block_count() >= 25);
    assert_eq!(pinned.ptr(), pinned_ptr);

    // SAFETY: The object is live and no exclusive reference to it exists.
    let through_ptr = unsafe { pinned_ptr.as_ref() };
    assert_eq!(through_ptr, &Widget::new(0, "anchor", 0.5));

    pool.free(pinned);
    for handle in others {
        pool.free(handle);
    }
}

#[test]
fn construction_matches_direct_construction() {
    let mut pool = BlockPool::<Widget>::new(nz!(4));

    let direct = Widget::new(42, "sprocket", 2.5);

    let by_value = pool.allocate(Widget::new(42, "sprocket", 2.5));
    let by_closure = pool.allocate_with(|| Widget::new(42, "sprocket", 2.5));
    let by_try = pool.try_allocate(Widget::new(42, "sprocket", 2.5)).unwrap();

    assert_eq!(pool.get(&by_value), &direct);
    assert_eq!(pool.get(&by_closure), &direct);
    assert_eq!(pool.get(&by_try), &direct);

    assert_eq!(pool.take(by_value), direct);
    pool.free(by_closure);
    pool.free(by_try);
}

#[test]
fn free_drops_exactly_once_before_reuse() {
    let drops = Rc::new(Cell::new(0));
    let mut pool = BlockPool::<Tracked>::new(nz!(2));

    let handles = (0..5)
        .map(|_| {
            pool.allocate(Tracked {
                drops: Rc::clone(&drops),
            })
        })
        .collect::<Vec<_>>();

    for (freed_so_far, handle) in handles.into_iter().enumerate() {
        assert_eq!(drops.get(), freed_so_far);
        pool.free(handle);
        assert_eq!(drops.get(), freed_so_far + 1);
    }

    // Reusing every slot does not drop anything again.
    let reused = (0..5)
        .map(|_| {
            pool.allocate(Tracked {
                drops: Rc::clone(&drops),
            })
        })
        .collect::<Vec<_>>();
    assert_eq!(drops.get(), 5);

    for handle in reused {
        pool.free(handle);
    }
    assert_eq!(drops.get(), 10);
}

#[test]
fn dropping_pool_skips_live_destructors() {
    let drops = Rc::new(Cell::new(0));

    {
        let mut pool = BlockPool::<Tracked>::new(nz!(4));

        let freed = pool.allocate(Tracked {
            drops: Rc::clone(&drops),
        });
        let _forgotten = pool.allocate(Tracked {
            drops: Rc::clone(&drops),
        });

        pool.free(freed);
        assert_eq!(drops.get(), 1);
    }

    // The forgotten object was never dropped.
    assert_eq!(drops.get(), 1);
}

#[test]
#[should_panic]
fn must_not_drop_items_detects_leak() {
    let mut pool = BlockPool::<String>::builder()
        .block_size(nz!(4))
        .drop_policy(DropPolicy::MustNotDropItems)
        .build();

    _ = pool.allocate("leaked".to_string());
}

#[test]
#[should_panic]
fn handle_from_other_pool_is_rejected() {
    let mut pool_a = BlockPool::<u32>::new(nz!(4));
    let mut pool_b = BlockPool::<u32>::new(nz!(4));

    let handle = pool_a.allocate(1);
    _ = pool_b.take(handle);
}
