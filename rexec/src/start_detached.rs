use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::AcqRel;

use crate::{OperationState, Receiver, Sender};

/// The type-independent head of a detached operation. Both the starting call
/// and the completion hold a reference, the last one to let go frees the
/// allocation.
struct Header {
    refs: AtomicUsize,
    free: unsafe fn(NonNull<Header>),
}

impl Header {
    /// # Safety
    ///
    /// Each of the two references may only be released once.
    unsafe fn release(this: NonNull<Header>) {
        let header = unsafe { this.as_ref() };
        if header.refs.fetch_sub(1, AcqRel) == 1 {
            let free = header.free;
            unsafe { free(this) }
        }
    }
}

/// The header comes first so a header pointer is a pointer to the whole.
#[repr(C)]
struct Detached<Op> {
    header: Header,
    op: Option<Op>,
}

impl<Op> Detached<Op> {
    unsafe fn free(header: NonNull<Header>) {
        drop(unsafe { Box::from_raw(header.cast::<Self>().as_ptr()) });
    }
}

struct DetachedReceiver {
    header: NonNull<Header>,
}

unsafe impl Send for DetachedReceiver {}

impl<V> Receiver<V> for DetachedReceiver {
    fn set_value(self, values: V) {
        drop(values);
        unsafe { Header::release(self.header) }
    }
}

/// Starts `sender` and forgets about it.
///
/// The operation state is allocated on the heap and frees itself once the
/// work completes. The values are dropped. Never blocks.
pub fn start_detached<S: Sender>(sender: S) {
    let detached = Box::into_raw(Box::new(Detached {
        header: Header {
            refs: AtomicUsize::new(2),
            free: Detached::<S::Operation<DetachedReceiver>>::free,
        },
        op: None,
    }));

    // SAFETY: the allocation stays alive until both references are released.
    // The operation isn't moved after it's placed.
    unsafe {
        let header = NonNull::new_unchecked(detached).cast::<Header>();
        scopeguard::defer! {
            Header::release(header);
        }

        let op = (*detached).op.insert(sender.connect(DetachedReceiver { header }));
        Pin::new_unchecked(op).start();
    }
}
