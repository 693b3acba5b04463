use std::alloc::handle_alloc_error;
use std::any::type_name;
use std::fmt;
use std::mem::MaybeUninit;
use std::num::NonZero;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use scopeguard::ScopeGuard;
use tracing::{debug, warn};

use crate::{Block, BlockPoolBuilder, DropPolicy, Error, Handle, Result, Slot};

/// Global counter for generating unique pool IDs.
static POOL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique pool ID.
fn generate_pool_id() -> u64 {
    POOL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// An object pool for values of type `T` that grows in fixed-size blocks.
///
/// Allocating an object places it in a slot of one of the pool's blocks and returns a
/// [`Handle`] to it. Freeing the handle drops the object and puts its slot on a free list. The
/// next allocation reuses the most recently freed slot before any never-used slot is touched, and
/// a new block is only allocated when the free list is empty and every slot of the last block has
/// been handed out. In steady state, allocating and freeing therefore never calls the global
/// allocator.
///
/// # Stable addresses
///
/// Blocks are never moved, reallocated or released while the pool exists, so an object stays at
/// the same address from allocation until it is freed. This makes it valid to hold on to the
/// pointer returned by [`Handle::ptr()`] across any number of further allocations.
///
/// Pinned references are available via [`get_pin()`][1] and [`get_pin_mut()`][2]. These are
/// `unsafe` because dropping the pool releases the memory of live objects without dropping them,
/// which would break the pinning guarantee unless every pinned object is freed first.
///
/// # Resource usage
///
/// The pool starts empty and allocates its first block lazily. It never shrinks: all blocks are
/// released together when the pool is dropped. Freed slots hold the free list link in place of
/// the object, so there is no per-object bookkeeping memory.
///
/// # Dropping the pool
///
/// The pool does not know which of its slots are live, so dropping it never runs the destructors
/// of objects that were not freed. Whether that is acceptable is governed by the
/// [`DropPolicy`] set via [`builder()`][3].
///
/// # Thread safety
///
/// The pool is thread-mobile ([`Send`]) if `T` is, but it is not [`Sync`]. Access from multiple
/// threads requires external synchronization, for example a `Mutex` around the pool.
///
/// # Example
///
/// ```rust
/// use block_pool::BlockPool;
/// use new_zealand::nz;
///
/// let mut pool = BlockPool::<String>::new(nz!(4));
///
/// let alice = pool.allocate("Alice".to_string());
/// let bob = pool.allocate("Bob".to_string());
/// assert_eq!(pool.len(), 2);
/// assert_eq!(pool.block_count(), 1);
///
/// let bob_ptr = bob.ptr();
/// pool.free(bob);
///
/// // The freed slot is reused before any fresh storage.
/// let charlie = pool.allocate("Charlie".to_string());
/// assert_eq!(charlie.ptr(), bob_ptr);
///
/// pool.free(alice);
/// pool.free(charlie);
/// assert!(pool.is_empty());
/// ```
///
/// [1]: Self::get_pin
/// [2]: Self::get_pin_mut
/// [3]: Self::builder
pub struct BlockPool<T> {
    /// We need to uniquely identify each pool to ensure that handles are not returned to the
    /// wrong pool. If the pool ID does not match when a handle is presented, we panic.
    pool_id: u64,

    block_size: NonZero<usize>,

    /// Only ever grows, by appending. Existing blocks are never moved, which is what keeps
    /// object addresses stable.
    blocks: Vec<Block<T>>,

    /// The most recently handed out never-used slot.
    cursor: Cursor,

    /// Head of the intrusive free list. Each freed slot stores the address of the next one.
    freed: Option<NonNull<Slot<T>>>,

    /// Number of live objects. Only used for reporting and for the drop policy.
    len: usize,

    drop_policy: DropPolicy,
}

/// Position of the last slot handed out from fresh storage.
///
/// A new pool positions the cursor on the last slot of a block that does not exist yet, so the
/// very first advance moves it onto slot 0 of block 0 and allocates that block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Cursor {
    block_index: Option<usize>,
    index_in_block: usize,
}

impl<T> BlockPool<T> {
    #[must_use]
    pub(crate) fn new_inner(block_size: NonZero<usize>, drop_policy: DropPolicy) -> Self {
        Self {
            pool_id: generate_pool_id(),
            block_size,
            blocks: Vec::new(),
            cursor: Cursor {
                block_index: None,
                // Cannot underflow because block size is non-zero.
                index_in_block: block_size.get().wrapping_sub(1),
            },
            freed: None,
            len: 0,
            drop_policy,
        }
    }

    /// Creates a new pool whose blocks each hold `block_size` objects.
    ///
    /// No memory is reserved until the first object is allocated.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    /// use new_zealand::nz;
    ///
    /// let pool = BlockPool::<u64>::new(nz!(32));
    ///
    /// assert_eq!(pool.block_size().get(), 32);
    /// assert_eq!(pool.block_count(), 0);
    /// assert!(pool.is_empty());
    /// ```
    #[must_use]
    pub fn new(block_size: NonZero<usize>) -> Self {
        Self::builder().block_size(block_size).build()
    }

    /// Starts building a new [`BlockPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the block size.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::{BlockPool, DropPolicy};
    ///
    /// let pool = BlockPool::<u32>::builder()
    ///     .drop_policy(DropPolicy::MustNotDropItems)
    ///     .build();
    ///
    /// assert!(pool.is_empty());
    /// ```
    pub fn builder() -> BlockPoolBuilder<T> {
        BlockPoolBuilder::new()
    }

    /// The number of objects each block holds.
    #[must_use]
    pub fn block_size(&self) -> NonZero<usize> {
        self.block_size
    }

    /// The drop policy the pool was built with.
    #[must_use]
    pub fn drop_policy(&self) -> DropPolicy {
        self.drop_policy
    }

    /// The number of blocks the pool has allocated so far.
    ///
    /// This never decreases during the lifetime of the pool.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The number of live objects in the pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<i32>::builder().build();
    /// assert_eq!(pool.len(), 0);
    ///
    /// let a = pool.allocate(42);
    /// let b = pool.allocate(24);
    /// assert_eq!(pool.len(), 2);
    ///
    /// pool.free(a);
    /// assert_eq!(pool.len(), 1);
    /// # pool.free(b);
    /// ```
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the pool has no live objects.
    ///
    /// An empty pool may still be holding blocks, which are only released when it is dropped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of objects the pool can hold without allocating another block.
    ///
    /// This includes live objects, freed slots and slots never used yet.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    /// use new_zealand::nz;
    ///
    /// let mut pool = BlockPool::<u8>::new(nz!(8));
    /// assert_eq!(pool.capacity(), 0);
    ///
    /// let handle = pool.allocate(1);
    /// assert_eq!(pool.capacity(), 8);
    /// # pool.free(handle);
    /// ```
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.len()
            .checked_mul(self.block_size.get())
            .expect("overflow here would mean the pool can hold more objects than virtual memory can fit, which makes no sense - it would never grow that big")
    }

    /// Allocates an object holding `value` and returns a handle to it.
    ///
    /// The most recently freed slot is reused if there is one. Otherwise the next never-used slot
    /// is taken, allocating a new block if the last one is exhausted.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<String>::builder().build();
    ///
    /// let handle = pool.allocate("Hello".to_string());
    /// assert_eq!(pool.get(&handle), "Hello");
    /// # pool.free(handle);
    /// ```
    ///
    /// # Panics
    ///
    /// Aborts via [`handle_alloc_error`] if the storage for a new block cannot be allocated,
    /// and panics if the block layout exceeds the maximum allocation size. Use
    /// [`try_allocate()`][1] to receive these conditions as an [`Error`] instead.
    ///
    /// [1]: Self::try_allocate
    pub fn allocate(&mut self, value: T) -> Handle<T> {
        // SAFETY: Writing the value fully initializes the slot.
        unsafe {
            self.allocate_in_place(|uninit| {
                uninit.write(value);
            })
        }
    }

    /// Allocates an object built by `f` and returns a handle to it.
    ///
    /// The slot is chosen before `f` runs and `f` builds the object directly for it. If `f`
    /// panics, the slot goes back on the free list and the pool is left as it was.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Widget {
    ///     id: u32,
    ///     name: String,
    /// }
    ///
    /// let mut pool = BlockPool::<Widget>::builder().build();
    ///
    /// let handle = pool.allocate_with(|| Widget {
    ///     id: 7,
    ///     name: "gear".to_string(),
    /// });
    /// assert_eq!(pool.get(&handle).id, 7);
    /// # pool.free(handle);
    /// ```
    ///
    /// # Panics
    ///
    /// Same as [`allocate()`][1].
    ///
    /// [1]: Self::allocate
    pub fn allocate_with(&mut self, f: impl FnOnce() -> T) -> Handle<T> {
        // SAFETY: Writing the value fully initializes the slot.
        unsafe {
            self.allocate_in_place(|uninit| {
                uninit.write(f());
            })
        }
    }

    /// Allocates an object that `f` initializes directly in the slot's storage.
    ///
    /// This allows building large objects in place without first constructing them on the stack.
    /// If `f` panics, the slot goes back on the free list; anything `f` already wrote is leaked.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::mem::MaybeUninit;
    ///
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<[u64; 512]>::builder().build();
    ///
    /// // SAFETY: The closure initializes every element of the array.
    /// let handle = unsafe {
    ///     pool.allocate_in_place(|uninit: &mut MaybeUninit<[u64; 512]>| {
    ///         let first = uninit.as_mut_ptr().cast::<u64>();
    ///         for index in 0..512 {
    ///             first.add(index).write(index as u64);
    ///         }
    ///     })
    /// };
    ///
    /// assert_eq!(pool.get(&handle)[511], 511);
    /// # pool.free(handle);
    /// ```
    ///
    /// # Safety
    ///
    /// `f` must fully initialize the `T` before returning.
    ///
    /// # Panics
    ///
    /// Same as [`allocate()`][1].
    ///
    /// [1]: Self::allocate
    pub unsafe fn allocate_in_place(&mut self, f: impl FnOnce(&mut MaybeUninit<T>)) -> Handle<T> {
        let slot = match self.acquire_slot() {
            Ok(slot) => slot,
            Err(error) => fail_fast(error),
        };

        // SAFETY: Forwarding guarantee from caller.
        unsafe { self.init_slot(slot, f) }
    }

    /// Allocates an object holding `value`, returning an error instead of aborting if the pool
    /// needs to grow and the new block cannot be allocated.
    ///
    /// On error the pool is unchanged and `value` is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<u32>::builder().build();
    ///
    /// let handle = pool.try_allocate(42)?;
    /// assert_eq!(*pool.get(&handle), 42);
    /// # pool.free(handle);
    /// # Ok::<(), block_pool::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockAllocationFailed`] if the global allocator could not provide a new
    /// block and [`Error::CapacityOverflow`] if a block of the configured size is too large to
    /// ever be allocated.
    pub fn try_allocate(&mut self, value: T) -> Result<Handle<T>> {
        let slot = self.acquire_slot()?;

        // SAFETY: Writing the value fully initializes the slot.
        Ok(unsafe {
            self.init_slot(slot, |uninit| {
                uninit.write(value);
            })
        })
    }

    /// Drops the object and makes its slot available for reuse.
    ///
    /// The object's destructor runs exactly once, before the slot goes on the free list. The
    /// next allocation will reuse this slot.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<String>::builder().build();
    /// let handle = pool.allocate("Hello".to_string());
    /// assert_eq!(pool.len(), 1);
    ///
    /// pool.free(handle);
    /// assert!(pool.is_empty());
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the handle was not created by this pool.
    pub fn free(&mut self, handle: Handle<T>) {
        let slot = self.release(handle);

        let freed = &mut self.freed;

        // The slot goes on the free list even if the destructor panics.
        let _link_on_exit = scopeguard::guard(slot, |slot| {
            // SAFETY: The value has been dropped by the time this runs (or its destructor
            // panicked, after which the value is considered dropped), so the slot is vacant.
            unsafe {
                push_free(freed, slot);
            }
        });

        // SAFETY: The handle was created by this pool and consumed, so the slot holds a live,
        // initialized T that nothing else can access any more.
        unsafe {
            slot.cast::<T>().drop_in_place();
        }
    }

    /// Moves the object out of the pool and makes its slot available for reuse.
    ///
    /// Unlike [`free()`][1], the object's destructor does not run; the object is returned to the
    /// caller instead.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<String>::builder().build();
    /// let handle = pool.allocate("Hello".to_string());
    ///
    /// let value = pool.take(handle);
    /// assert_eq!(value, "Hello");
    /// assert!(pool.is_empty());
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the handle was not created by this pool.
    ///
    /// [1]: Self::free
    #[must_use]
    pub fn take(&mut self, handle: Handle<T>) -> T
    where
        T: Unpin,
    {
        let slot = self.release(handle);

        // SAFETY: The handle was created by this pool and consumed, so the slot holds a live,
        // initialized T that nothing else can access any more. `T: Unpin` means moving it out
        // does not break any pinning promise made through `get_pin()`.
        let value = unsafe { slot.cast::<T>().read() };

        // SAFETY: The value has been moved out, so the slot is vacant.
        unsafe {
            push_free(&mut self.freed, slot);
        }

        value
    }

    /// Gets a shared reference to the object behind a handle.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<u32>::builder().build();
    /// let handle = pool.allocate(42);
    ///
    /// assert_eq!(*pool.get(&handle), 42);
    /// # pool.free(handle);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the handle was not created by this pool.
    #[must_use]
    pub fn get(&self, handle: &Handle<T>) -> &T {
        self.assert_owns(handle);

        // SAFETY: A handle of this pool always refers to a live, initialized T. The reference
        // borrows the pool, so it cannot outlive the block storage.
        unsafe { handle.ptr().as_ref() }
    }

    /// Gets an exclusive reference to the object behind a handle.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<String>::builder().build();
    /// let mut handle = pool.allocate("Hello".to_string());
    ///
    /// pool.get_mut(&mut handle).push_str(", World!");
    /// assert_eq!(pool.get(&handle), "Hello, World!");
    /// # pool.free(handle);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the handle was not created by this pool.
    #[must_use]
    pub fn get_mut(&mut self, handle: &mut Handle<T>) -> &mut T
    where
        T: Unpin,
    {
        self.assert_owns(handle);

        // SAFETY: A handle of this pool always refers to a live, initialized T and we hold
        // both the only handle and an exclusive borrow of the pool, so no other reference to
        // the object can exist.
        unsafe { handle.ptr().as_mut() }
    }

    /// Gets a pinned shared reference to the object behind a handle.
    ///
    /// # Safety
    ///
    /// Pinning promises that the object is dropped before its memory is released, but the pool
    /// releases its blocks without dropping objects that are still live. The caller must
    /// [`free()`][1] the object before the pool is dropped (or never drop the pool).
    ///
    /// # Panics
    ///
    /// Panics if the handle was not created by this pool.
    ///
    /// [1]: Self::free
    #[must_use]
    pub unsafe fn get_pin(&self, handle: &Handle<T>) -> Pin<&T> {
        // SAFETY: Objects never move while live. The only ways to end the life of an object are
        // `free()`, which drops it in place, and `take()`, which requires `T: Unpin`. The caller
        // guarantees the object is freed before the pool releases its memory.
        unsafe { Pin::new_unchecked(self.get(handle)) }
    }

    /// Gets a pinned exclusive reference to the object behind a handle.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::marker::PhantomPinned;
    ///
    /// use block_pool::BlockPool;
    ///
    /// struct SelfAware {
    ///     counter: u32,
    ///     _pin: PhantomPinned,
    /// }
    ///
    /// let mut pool = BlockPool::<SelfAware>::builder().build();
    /// let mut handle = pool.allocate(SelfAware {
    ///     counter: 0,
    ///     _pin: PhantomPinned,
    /// });
    ///
    /// // SAFETY: The object is freed below, before the pool is dropped.
    /// let pinned = unsafe { pool.get_pin_mut(&mut handle) };
    /// // SAFETY: We do not move the object out of the pinned reference.
    /// unsafe { pinned.get_unchecked_mut() }.counter += 1;
    ///
    /// assert_eq!(pool.get(&handle).counter, 1);
    /// pool.free(handle);
    /// ```
    ///
    /// # Safety
    ///
    /// Same as [`get_pin()`][1]: the object must be freed before the pool is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not created by this pool.
    ///
    /// [1]: Self::get_pin
    #[must_use]
    pub unsafe fn get_pin_mut(&mut self, handle: &mut Handle<T>) -> Pin<&mut T> {
        self.assert_owns(handle);

        // SAFETY: See `get_mut()` for why the reference is exclusive and `get_pin()` for why
        // the object neither moves nor has its memory released before it is dropped.
        unsafe { Pin::new_unchecked(handle.ptr().as_mut()) }
    }

    /// Pops the head of the free list or, if the free list is empty, advances the cursor into
    /// fresh storage. On error, the pool is unchanged.
    fn acquire_slot(&mut self) -> Result<NonNull<Slot<T>>> {
        if let Some(slot) = self.freed {
            // SAFETY: The slot is the head of our own free list.
            self.freed = unsafe { Slot::next_free(slot) };
            return Ok(slot);
        }

        self.advance_cursor()
    }

    fn advance_cursor(&mut self) -> Result<NonNull<Slot<T>>> {
        let next_index_in_block = self
            .cursor
            .index_in_block
            .checked_add(1)
            .expect("guarded by index_in_block < block_size");

        let cursor = if next_index_in_block == self.block_size.get() {
            let block_index = self.cursor.block_index.map_or(0, |index| {
                index
                    .checked_add(1)
                    .expect("block index cannot overflow because each block occupies memory")
            });

            if block_index == self.blocks.len() {
                self.blocks.push(Block::try_new(self.block_size)?);

                debug!(
                    block_index,
                    block_size = self.block_size.get(),
                    item_type = type_name::<T>(),
                    "allocated new pool block"
                );
            }

            Cursor {
                block_index: Some(block_index),
                index_in_block: 0,
            }
        } else {
            Cursor {
                block_index: self.cursor.block_index,
                index_in_block: next_index_in_block,
            }
        };

        let slot = cursor
            .block_index
            .and_then(|index| self.blocks.get(index))
            .expect("cursor always points into an existing block once it has advanced")
            .slot_ptr(cursor.index_in_block);

        self.cursor = cursor;
        Ok(slot)
    }

    /// # Safety
    ///
    /// The slot must be vacant and already removed from the free list, and `f` must fully
    /// initialize the `T`.
    unsafe fn init_slot(
        &mut self,
        slot: NonNull<Slot<T>>,
        f: impl FnOnce(&mut MaybeUninit<T>),
    ) -> Handle<T> {
        {
            let freed = &mut self.freed;

            // If `f` panics, the slot must not be lost.
            let relink_on_panic = scopeguard::guard(slot, |slot| {
                // SAFETY: `f` did not complete, so the slot holds no live value.
                unsafe {
                    push_free(freed, slot);
                }
            });

            // SAFETY: The slot is vacant and off the free list, so we have exclusive access to
            // its storage, which is sized and aligned for T.
            let uninit = unsafe { slot.cast::<MaybeUninit<T>>().as_mut() };
            f(uninit);

            ScopeGuard::into_inner(relink_on_panic);
        }

        self.len = self
            .len
            .checked_add(1)
            .expect("cannot overflow because every live object occupies memory");

        Handle::new(self.pool_id, slot.cast::<T>())
    }

    /// Validates and consumes a handle, returning the slot it refers to. The caller must end
    /// the life of the object in the slot and put the slot on the free list.
    fn release(&mut self, handle: Handle<T>) -> NonNull<Slot<T>> {
        self.assert_owns(&handle);

        let (_, ptr) = handle.into_parts();
        let slot = ptr.cast::<Slot<T>>();

        debug_assert!(
            self.blocks.iter().any(|block| block.contains(slot)),
            "handle for {} points outside the blocks of the pool that created it",
            type_name::<T>()
        );

        self.len = self
            .len
            .checked_sub(1)
            .expect("a valid handle means at least one object is live");

        slot
    }

    fn assert_owns(&self, handle: &Handle<T>) {
        assert!(
            handle.pool_id() == self.pool_id,
            "handle for {} was not created by this pool",
            type_name::<T>()
        );
    }

    /// Number of slots ever handed out from fresh storage.
    #[cfg(debug_assertions)]
    #[cfg_attr(not(test), allow(dead_code, reason = "only used by integrity_check"))]
    fn touched_slots(&self) -> usize {
        self.cursor.block_index.map_or(0, |block_index| {
            block_index
                .checked_mul(self.block_size.get())
                .and_then(|x| x.checked_add(self.cursor.index_in_block))
                .and_then(|x| x.checked_add(1))
                .expect("cursor cannot point beyond virtual memory")
        })
    }

    /// Verifies the free list against the rest of the pool state, panicking on any
    /// inconsistency.
    ///
    /// Every link must point at a slot inside one of the pool's blocks, the list must be free of
    /// cycles and the free slots plus the live objects must add up to the slots handed out so far.
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    #[cfg_attr(not(test), expect(dead_code, reason = "we will probably use it later"))]
    pub(crate) fn integrity_check(&self) {
        let touched_slots = self.touched_slots();
        let mut free_count: usize = 0;
        let mut next = self.freed;

        while let Some(slot) = next {
            assert!(
                self.blocks.iter().any(|block| block.contains(slot)),
                "free list of pool of {} links to an address outside its blocks",
                type_name::<T>()
            );

            free_count = free_count
                .checked_add(1)
                .expect("guarded by the cycle check below");

            assert!(
                free_count <= touched_slots,
                "free list of pool of {} is longer than the number of slots handed out, so it must contain a cycle",
                type_name::<T>()
            );

            // SAFETY: The slot is on our own free list.
            next = unsafe { Slot::next_free(slot) };
        }

        assert!(
            free_count.checked_add(self.len) == Some(touched_slots),
            "pool of {} has {} free and {} live slots but handed out {} slots",
            type_name::<T>(),
            free_count,
            self.len,
            touched_slots
        );
    }
}

/// Pushes a vacant slot onto the head of the free list.
///
/// # Safety
///
/// The slot must belong to the pool that owns `freed`, hold no live value and not already be on
/// the free list.
unsafe fn push_free<T>(freed: &mut Option<NonNull<Slot<T>>>, slot: NonNull<Slot<T>>) {
    // SAFETY: Forwarding guarantee from caller.
    unsafe {
        Slot::set_next_free(slot, *freed);
    }

    *freed = Some(slot);
}

/// Handles an allocation failure the way the global allocator would.
fn fail_fast(error: Error) -> ! {
    match error {
        Error::BlockAllocationFailed { layout, .. } => handle_alloc_error(layout),
        other => panic!("{other}"),
    }
}

impl<T> fmt::Debug for BlockPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("pool_id", &self.pool_id)
            .field("block_size", &self.block_size)
            .field("block_count", &self.blocks.len())
            .field("len", &self.len)
            .field("cursor", &self.cursor)
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for BlockPool<T> {
    fn drop(&mut self) {
        let leaked = self.len;

        // Releases the storage of every block. Values still live are not dropped.
        self.blocks.clear();

        if leaked == 0 {
            return;
        }

        warn!(
            leaked,
            item_type = type_name::<T>(),
            "dropped pool with live objects, their destructors will not run"
        );

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotDropItems && !thread::panicking() {
            panic!(
                "dropped a pool of {} with {leaked} live objects with a policy that says it must be empty when dropped",
                type_name::<T>()
            );
        }
    }
}

// SAFETY: The free list head is a raw pointer into blocks we own, nothing about it is tied to the
// current thread. The pool can move between threads whenever T can.
unsafe impl<T: Send> Send for BlockPool<T> {}
