pub(crate) mod task_queue;
pub(crate) mod wait_list;

use std::marker::PhantomData;
use std::ptr::NonNull;

/// An owned heap allocation with a stable address.
///
/// Operation states that need to hand out back pointers to their children put
/// the pointed-to part of their state behind an anchor. Moving the owning
/// operation state doesn't move the anchored value, so the children's raw
/// pointers stay valid until the anchor is dropped.
pub(crate) struct Anchor<T> {
    ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

impl<T> Anchor<T> {
    pub fn new(value: T) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(Box::new(value))),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> NonNull<T> {
        self.ptr
    }
}

impl<T> Drop for Anchor<T> {
    fn drop(&mut self) {
        // SAFETY: the pointer came from `Box::leak` and is only reclaimed here.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

unsafe impl<T: Send> Send for Anchor<T> {}
unsafe impl<T: Sync> Sync for Anchor<T> {}

#[cfg(test)]
mod tests {
    use super::Anchor;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn address_survives_moves() {
        let anchor = Anchor::new(5u32);
        let before = anchor.as_ptr();
        let moved = Box::new(anchor);
        assert_eq!(before, moved.as_ptr());
        assert_eq!(unsafe { *moved.as_ptr().as_ref() }, 5);
    }

    #[test]
    fn drops_value_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let anchor = Anchor::new(Counted(drops.clone()));
        drop(anchor);
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }
}
