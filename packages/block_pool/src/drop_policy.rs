/// Determines what happens when a [`BlockPool`][crate::BlockPool] is dropped while some of its
/// objects are still live.
///
/// The pool never runs the destructors of objects that are still live when it is dropped. It
/// only releases the block storage. The policy decides whether that is acceptable.
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
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// Objects still live when the pool is dropped are leaked: their storage is released but
    /// their destructors never run. This is the default.
    #[default]
    MayLeakItems,

    /// The pool will panic if it still contains live objects when it is dropped.
    ///
    /// This is useful when the objects own resources that must be released through their
    /// destructors, so forgetting to free one of them is a bug.
    MustNotDropItems,
}
