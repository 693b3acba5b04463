use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::{BlockPool, DropPolicy};

/// Number of slots per block if the builder is not told otherwise.
#[cfg(not(miri))]
const DEFAULT_BLOCK_SIZE: NonZero<usize> = nz!(128);

// Under Miri, we use a smaller block size because Miri test runtime scales by memory usage.
#[cfg(miri)]
const DEFAULT_BLOCK_SIZE: NonZero<usize> = nz!(4);

/// Builder for creating an instance of [`BlockPool`].
///
/// You only need to use this builder if you want to customize the pool configuration beyond
/// what [`BlockPool::new()`][1] offers.
///
/// # Examples
///
/// ```
/// use block_pool::{BlockPool, DropPolicy};
/// use new_zealand::nz;
///
/// let pool = BlockPool::<u32>::builder()
///     .block_size(nz!(64))
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
///
/// assert_eq!(pool.block_size().get(), 64);
/// ```
///
/// [1]: BlockPool::new
#[must_use]
pub struct BlockPoolBuilder<T> {
    block_size: NonZero<usize>,
    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T> std::fmt::Debug for BlockPoolBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPoolBuilder")
            .field(
                "item_type",
                &std::format_args!("{}", std::any::type_name::<T>()),
            )
            .field("block_size", &self.block_size)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T> BlockPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            drop_policy: DropPolicy::default(),
            _item: PhantomData,
        }
    }

    /// Sets the number of objects each block of the pool can hold.
    ///
    /// Every time the pool runs out of room it allocates one new block of this size, so larger
    /// blocks mean fewer allocator calls at the cost of more unused capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::BlockPool;
    /// use new_zealand::nz;
    ///
    /// let pool = BlockPool::<u32>::builder().block_size(nz!(16)).build();
    /// assert_eq!(pool.block_size().get(), 16);
    /// ```
    pub fn block_size(mut self, block_size: NonZero<usize>) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how to treat objects that
    /// are still live when the pool is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::{BlockPool, DropPolicy};
    ///
    /// let pool = BlockPool::<u32>::builder()
    ///     .drop_policy(DropPolicy::MustNotDropItems)
    ///     .build();
    /// ```
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// No memory is reserved until the first object is allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::BlockPool;
    ///
    /// let pool = BlockPool::<u32>::builder().build();
    /// assert_eq!(pool.capacity(), 0);
    /// ```
    #[must_use]
    pub fn build(self) -> BlockPool<T> {
        BlockPool::new_inner(self.block_size, self.drop_policy)
    }
}
