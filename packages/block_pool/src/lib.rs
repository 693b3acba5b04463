#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! This package provides [`BlockPool`], an object pool for a single type `T` that hands out and
//! reclaims objects without calling the global allocator on every allocation.
//!
//! The pool grows in blocks of a fixed number of objects. Freed slots are kept on an intrusive
//! free list, stored inside the freed slots themselves, and are reused before any fresh storage,
//! so workloads that repeatedly create and destroy many objects of the same type get amortized
//! O(1) allocation with good memory locality.
//!
//! # Features
//!
//! - **Lazy, block-wise growth**: No memory is reserved until the first allocation, after which
//!   one block of the configured size is added whenever the pool runs out of room.
//! - **Reuse before growth**: The most recently freed slot is always the next one handed out.
//! - **Stable addresses**: Objects never move while they are live, so pointers to them and pinned
//!   references remain valid across any number of further allocations.
//! - **Typed, single-use handles**: [`Handle<T>`] cannot be copied and is consumed by
//!   [`free()`][BlockPool::free], so double frees do not compile and handles given to the wrong
//!   pool are detected.
//! - **Placement construction**: [`allocate_in_place()`][BlockPool::allocate_in_place] builds an
//!   object directly in its slot.
//! - **Explicit out-of-memory policy**: [`allocate()`][BlockPool::allocate] treats a failed block
//!   allocation as fatal, [`try_allocate()`][BlockPool::try_allocate] returns an [`Error`].
//! - **Optional leak detection**: The pool never drops objects that are still live when the pool
//!   itself is dropped, but it can be configured via [`DropPolicy`] to panic in that case.
//!
//! The pool is not thread-safe. It can be moved between threads if `T` can, but sharing it
//! requires external synchronization.
//!
//! # Example
//!
//! ```rust
//! use block_pool::BlockPool;
//! use new_zealand::nz;
//!
//! #[derive(Debug, PartialEq)]
//! struct Particle {
//!     position: (f32, f32),
//!     velocity: (f32, f32),
//! }
//!
//! let mut pool = BlockPool::<Particle>::new(nz!(256));
//!
//! let mut particle = pool.allocate(Particle {
//!     position: (0.0, 0.0),
//!     velocity: (1.0, 0.5),
//! });
//!
//! let p = pool.get_mut(&mut particle);
//! p.position.0 += p.velocity.0;
//! p.position.1 += p.velocity.1;
//!
//! assert_eq!(pool.get(&particle).position, (1.0, 0.5));
//!
//! // Freeing drops the particle and makes its slot available to the next allocation.
//! pool.free(particle);
//! assert!(pool.is_empty());
//! ```

mod block;
mod builder;
mod drop_policy;
mod error;
mod handle;
mod pool;

pub(crate) use block::*;
pub use builder::*;
pub use drop_policy::*;
pub use error::*;
pub use handle::*;
pub use pool::*;
