use std::alloc::{Layout, LayoutError};
use std::num::NonZero;

use thiserror::Error;

/// Errors that can occur when a [`BlockPool`][crate::BlockPool] needs to grow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The global allocator could not provide the storage for a new block.
    #[error(
        "failed to allocate a block of {block_size} slots of {item_type} ({} bytes)",
        .layout.size()
    )]
    BlockAllocationFailed {
        /// Number of slots in the block that could not be allocated.
        block_size: NonZero<usize>,

        /// Name of the pooled type.
        item_type: &'static str,

        /// The memory layout that was requested from the allocator.
        layout: Layout,
    },

    /// A block of the configured size would exceed the maximum size of a single allocation.
    #[error("a block of {block_size} slots of {item_type} exceeds the maximum allocation size")]
    CapacityOverflow {
        /// Number of slots in the block whose layout could not be calculated.
        block_size: NonZero<usize>,

        /// Name of the pooled type.
        item_type: &'static str,

        /// The underlying layout calculation failure.
        #[source]
        source: LayoutError,
    },
}

/// A specialized `Result` type for block pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn block_allocation_failed_mentions_size() {
        let error = Error::BlockAllocationFailed {
            block_size: nz!(4),
            item_type: "u64",
            layout: Layout::array::<u64>(4).unwrap(),
        };

        let message = error.to_string();
        assert!(message.contains("4 slots of u64"));
        assert!(message.contains("32 bytes"));
    }

    #[test]
    fn capacity_overflow_has_source() {
        let source = Layout::array::<u64>(usize::MAX).unwrap_err();

        let error = Error::CapacityOverflow {
            block_size: NonZero::new(usize::MAX).unwrap(),
            item_type: "u64",
            source,
        };

        assert!(std::error::Error::source(&error).is_some());
        assert!(error.to_string().contains("maximum allocation size"));
    }
}
