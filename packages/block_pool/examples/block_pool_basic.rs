//! Basic usage example for `BlockPool`.
//!
//! Simulates a small population of short-lived entities, showing how freed slots are reused
//! before the pool grows. The pool logs a debug event whenever it allocates a new block.

use block_pool::{BlockPool, Handle};
use new_zealand::nz;
use tracing::Level;

#[derive(Debug)]
struct Entity {
    id: u32,
    health: i32,
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let mut pool = BlockPool::<Entity>::new(nz!(4));
    let mut alive: Vec<Handle<Entity>> = Vec::new();

    for id in 0..6 {
        alive.push(pool.allocate(Entity { id, health: 100 }));
    }

    println!(
        "Spawned {} entities in {} blocks (capacity {})",
        pool.len(),
        pool.block_count(),
        pool.capacity()
    );

    // Damage everything; entities with an odd id do not survive.
    let mut survivors = Vec::new();
    for mut handle in alive {
        let entity = pool.get_mut(&mut handle);
        entity.health -= if entity.id % 2 == 1 { 100 } else { 30 };

        if entity.health <= 0 {
            println!("Entity {} died", entity.id);
            pool.free(handle);
        } else {
            survivors.push(handle);
        }
    }

    // New entities move into the slots the dead ones left behind.
    for id in 6..9 {
        let handle = pool.allocate(Entity { id, health: 100 });
        println!("Spawned entity {id} at {:p}", handle.ptr());
        survivors.push(handle);
    }

    println!(
        "{} entities alive in {} blocks (capacity {})",
        pool.len(),
        pool.block_count(),
        pool.capacity()
    );

    for handle in survivors {
        let entity = pool.take(handle);
        println!("Entity {} ended with {} health", entity.id, entity.health);
    }

    assert!(pool.is_empty());
}
