use std::any::type_name;
use std::fmt;
use std::ptr::NonNull;

/// Exclusive handle to an object allocated from a [`BlockPool`][crate::BlockPool].
///
/// The handle is the caller's only way to refer to a pooled object. It can be used to access
/// the object through the pool that created it and must eventually be given back to that same
/// pool via [`free()`][1] or [`take()`][2].
///
/// The handle cannot be copied or cloned and freeing it consumes it, so the compiler rejects
/// a double free or a use after free. Giving a handle to a pool that did not create it panics.
///
/// Dropping a handle without freeing it leaves the object live in the pool. It stays there,
/// unreachable, until the pool itself is dropped, at which point its destructor does not run.
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
///
/// pool.free(handle);
/// // `handle` has been moved and can no longer be used.
/// ```
///
/// # Thread safety
///
/// The handle is [`Send`] if `T` is [`Send`] and [`Sync`] if `T` is [`Sync`].
///
/// [1]: crate::BlockPool::free
/// [2]: crate::BlockPool::take
#[must_use = "dropping a handle without freeing it leaks the object until the pool is dropped"]
pub struct Handle<T> {
    /// Ensures this handle can only be returned to the pool it came from.
    pool_id: u64,

    ptr: NonNull<T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(pool_id: u64, ptr: NonNull<T>) -> Self {
        Self { pool_id, ptr }
    }

    /// Returns a pointer to the object.
    ///
    /// The address is stable: it does not change for as long as the object is live, no matter
    /// how much the pool grows in the meantime. It becomes dangling once the handle is freed or
    /// the pool is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<u64>::builder().build();
    /// let handle = pool.allocate(42);
    ///
    /// // SAFETY: The object is live and nothing else is accessing it.
    /// let value = unsafe { handle.ptr().read() };
    /// assert_eq!(value, 42);
    /// # pool.free(handle);
    /// ```
    #[must_use]
    pub fn ptr(&self) -> NonNull<T> {
        self.ptr
    }

    #[must_use]
    pub(crate) fn pool_id(&self) -> u64 {
        self.pool_id
    }

    #[must_use]
    pub(crate) fn into_parts(self) -> (u64, NonNull<T>) {
        (self.pool_id, self.ptr)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("pool_id", &self.pool_id)
            .field("ptr", &self.ptr)
            .finish()
    }
}

// SAFETY: The handle is a unique reference to a `T` in the pool, so it may move between threads
// whenever `T` itself may.
unsafe impl<T: Send> Send for Handle<T> {}

// SAFETY: Sharing the handle only allows shared access to the `T` (via the pool), which is fine
// whenever `T` is `Sync`.
unsafe impl<T: Sync> Sync for Handle<T> {}
