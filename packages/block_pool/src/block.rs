use std::alloc::{Layout, alloc, dealloc};
use std::any::type_name;
use std::mem::ManuallyDrop;
use std::num::NonZero;
use std::ptr::NonNull;

use crate::{Error, Result};

/// Storage for one object in a [`Block`].
///
/// A slot either holds a live value or, once the value has been freed, the link to the next
/// freed slot. The two states are mutually exclusive, so they share the same memory and a free
/// list costs no extra bookkeeping memory. The pool is responsible for knowing which state a
/// slot is in; the slot itself does not record it.
///
/// `repr(C)` places every field at offset zero, so a pointer to the slot is also a pointer to
/// the value and the slot is always aligned for `T`.
#[repr(C)]
pub(crate) union Slot<T> {
    #[allow(
        dead_code,
        reason = "never accessed through the union, only gives the slot its size and alignment"
    )]
    value: ManuallyDrop<T>,
    next_free: Option<NonNull<Slot<T>>>,
}

impl<T> Slot<T> {
    /// Reads the free list link stored in a freed slot.
    ///
    /// # Safety
    ///
    /// The slot must be on the free list of the pool that owns it.
    #[must_use]
    pub(crate) unsafe fn next_free(slot: NonNull<Self>) -> Option<NonNull<Self>> {
        // SAFETY: Forwarding guarantee from caller - a freed slot stores a link and nothing else.
        unsafe { slot.as_ref().next_free }
    }

    /// Overwrites the contents of a slot with a free list link.
    ///
    /// # Safety
    ///
    /// The slot must not hold a live value (either it was never used or its value has already
    /// been dropped or moved out) and the caller must have exclusive access to it.
    pub(crate) unsafe fn set_next_free(slot: NonNull<Self>, next_free: Option<NonNull<Self>>) {
        // SAFETY: Forwarding guarantee from caller. Writing a `Copy` union field never drops
        // anything, so whatever bytes were there before are simply overwritten.
        unsafe {
            slot.as_ptr().write(Self { next_free });
        }
    }
}

/// A fixed-capacity region of raw storage for `T`, allocated once and released on drop.
///
/// The block never initializes, reads or drops the slots it holds. All state tracking is done
/// by the owning pool. Dropping a block releases the memory without dropping any values that may
/// still be in it.
#[derive(Debug)]
pub(crate) struct Block<T> {
    first_slot_ptr: NonNull<Slot<T>>,

    capacity: NonZero<usize>,

    /// Kept so that `Drop` can release the memory without recalculating a fallible layout.
    layout: Layout,
}

impl<T> Block<T> {
    /// Allocates the storage for a new block of `capacity` slots.
    ///
    /// No slot is initialized.
    pub(crate) fn try_new(capacity: NonZero<usize>) -> Result<Self> {
        let layout = Layout::array::<Slot<T>>(capacity.get()).map_err(|source| {
            Error::CapacityOverflow {
                block_size: capacity,
                item_type: type_name::<T>(),
                source,
            }
        })?;

        // SAFETY: The layout is not zero-sized because the capacity is non-zero and every slot
        // is at least as large as the free list link it can hold.
        let ptr = unsafe { alloc(layout) };

        let first_slot_ptr =
            NonNull::new(ptr.cast::<Slot<T>>()).ok_or_else(|| Error::BlockAllocationFailed {
                block_size: capacity,
                item_type: type_name::<T>(),
                layout,
            })?;

        Ok(Self {
            first_slot_ptr,
            capacity,
            layout,
        })
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[must_use]
    pub(crate) fn slot_ptr(&self, index: usize) -> NonNull<Slot<T>> {
        assert!(
            index < self.capacity.get(),
            "slot {index} index out of bounds in block of {}",
            type_name::<T>()
        );

        // SAFETY: Guarded by bounds check above, so the pointer stays inside the allocation.
        unsafe { self.first_slot_ptr.add(index) }
    }

    /// Whether `slot` points at the start of one of the slots of this block.
    #[must_use]
    pub(crate) fn contains(&self, slot: NonNull<Slot<T>>) -> bool {
        let start = self.first_slot_ptr.addr().get();
        let end = start.wrapping_add(self.layout.size());
        let addr = slot.addr().get();

        addr >= start
            && addr < end
            && addr.wrapping_sub(start).checked_rem(size_of::<Slot<T>>()) == Some(0)
    }
}

impl<T> Drop for Block<T> {
    fn drop(&mut self) {
        // SAFETY: The layout must match between alloc and dealloc. It does.
        unsafe {
            dealloc(self.first_slot_ptr.as_ptr().cast(), self.layout);
        }
    }
}

// SAFETY: Yes, there are raw pointers involved here but nothing inherently non-thread-mobile
// about it, so as long as T itself can move between threads, the block can do so, too.
unsafe impl<T: Send> Send for Block<T> {}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn slots_are_contiguous_and_aligned() {
        let block = Block::<u64>::try_new(nz!(4)).unwrap();

        for index in 0..4 {
            let slot = block.slot_ptr(index);
            assert!(slot.cast::<u64>().is_aligned());
            assert!(block.contains(slot));
        }

        let first = block.slot_ptr(0).addr().get();
        let second = block.slot_ptr(1).addr().get();
        assert_eq!(second - first, size_of::<Slot<u64>>());
    }

    #[test]
    fn over_aligned_type_is_aligned() {
        #[repr(align(64))]
        #[allow(dead_code, reason = "only the layout matters, the type is never constructed")]
        struct Aligned(u8);

        let block = Block::<Aligned>::try_new(nz!(3)).unwrap();

        for index in 0..3 {
            assert!(block.slot_ptr(index).cast::<Aligned>().is_aligned());
        }
    }

    #[test]
    fn zero_sized_type_still_gets_room_for_link() {
        let block = Block::<()>::try_new(nz!(2)).unwrap();

        assert_ne!(block.slot_ptr(0), block.slot_ptr(1));
    }

    #[test]
    #[should_panic]
    fn panic_when_oob_slot() {
        let block = Block::<u32>::try_new(nz!(3)).unwrap();

        _ = block.slot_ptr(3);
    }

    #[test]
    fn does_not_contain_foreign_or_misaligned_addresses() {
        let block = Block::<u64>::try_new(nz!(2)).unwrap();
        let other = Block::<u64>::try_new(nz!(2)).unwrap();

        assert!(!block.contains(other.slot_ptr(0)));

        let misaligned = block.slot_ptr(0).cast::<u8>();
        // SAFETY: Still within the block allocation.
        let misaligned = unsafe { misaligned.add(1) }.cast::<Slot<u64>>();
        assert!(!block.contains(misaligned));
    }

    #[test]
    fn oversized_block_is_capacity_overflow() {
        let result = Block::<u64>::try_new(NonZero::new(usize::MAX).unwrap());

        assert!(matches!(result, Err(Error::CapacityOverflow { .. })));
    }

    #[test]
    fn link_round_trips_through_slot() {
        let block = Block::<String>::try_new(nz!(2)).unwrap();
        let a = block.slot_ptr(0);
        let b = block.slot_ptr(1);

        // SAFETY: Neither slot holds a value and we have exclusive access to the block.
        unsafe {
            Slot::set_next_free(a, Some(b));
        }
        // SAFETY: Same as above.
        unsafe {
            Slot::set_next_free(b, None);
        }

        // SAFETY: Both slots hold links, which is what we are reading.
        assert_eq!(unsafe { Slot::next_free(a) }, Some(b));
        // SAFETY: Same as above.
        assert_eq!(unsafe { Slot::next_free(b) }, None);
    }
}
