// SPDX-License-Identifier: MIT
//
// Trait seams `Guarded` is generic over. Splitting the timed operations
// into their own trait, rather than giving `RawSharedLock` a single
// combined interface, lets `Guarded<T, SharedMutex>` reject
// `try_lock_for`/`try_lock_until` at compile time instead of panicking
// or returning an error at run time — the same "push constraints into
// the type system" instinct `libipc` applies with its
// `ShmOpenMode` enum distinguishing `Create`/`Open` at the API boundary
// rather than branching on a runtime flag inside one method.

use std::time::{Duration, Instant};

/// The non-timed operations every lock `Guarded` can wrap must provide.
///
/// # Safety
///
/// Implementors must uphold the reader-writer contract: at most one
/// exclusive holder at a time, never concurrent with any shared holder;
/// any number of concurrent shared holders otherwise. `Guarded` relies
/// on this to hand out aliased `&T` during a shared hold and an
/// exclusive `&mut T` during an exclusive hold without itself
/// re-checking anything.
pub unsafe trait RawSharedLock {
    /// Construct a new, unlocked instance.
    fn new() -> Self;

    /// Acquire exclusive ownership, blocking until available.
    fn lock(&self);

    /// Attempt to acquire exclusive ownership without blocking.
    fn try_lock(&self) -> bool;

    /// Release exclusive ownership.
    ///
    /// # Safety
    /// The caller must currently hold the lock in exclusive mode.
    unsafe fn unlock(&self);

    /// Acquire a shared hold, blocking until available.
    fn lock_shared(&self);

    /// Attempt to acquire a shared hold without blocking.
    fn try_lock_shared(&self) -> bool;

    /// Release a shared hold.
    ///
    /// # Safety
    /// The caller must currently hold a shared hold on the lock.
    unsafe fn unlock_shared(&self);
}

/// Extends [`RawSharedLock`] with timed acquire operations. Only lock
/// types that implement this trait unlock `Guarded`'s
/// `*_for`/`*_until` methods.
pub unsafe trait RawSharedTimedLock: RawSharedLock {
    /// Attempt to acquire exclusive ownership, giving up after `timeout`.
    fn try_lock_for(&self, timeout: Duration) -> bool;

    /// Attempt to acquire exclusive ownership, giving up once `deadline`
    /// has passed.
    fn try_lock_until(&self, deadline: Instant) -> bool;

    /// Attempt to acquire a shared hold, giving up after `timeout`.
    fn try_lock_shared_for(&self, timeout: Duration) -> bool;

    /// Attempt to acquire a shared hold, giving up once `deadline` has
    /// passed.
    fn try_lock_shared_until(&self, deadline: Instant) -> bool;
}

unsafe impl RawSharedLock for crate::SharedMutex {
    fn new() -> Self {
        crate::SharedMutex::new()
    }

    fn lock(&self) {
        crate::SharedMutex::lock(self)
    }

    fn try_lock(&self) -> bool {
        crate::SharedMutex::try_lock(self)
    }

    unsafe fn unlock(&self) {
        crate::SharedMutex::unlock(self)
    }

    fn lock_shared(&self) {
        crate::SharedMutex::lock_shared(self)
    }

    fn try_lock_shared(&self) -> bool {
        crate::SharedMutex::try_lock_shared(self)
    }

    unsafe fn unlock_shared(&self) {
        crate::SharedMutex::unlock_shared(self)
    }
}

unsafe impl RawSharedLock for crate::SharedTimedMutex {
    fn new() -> Self {
        crate::SharedTimedMutex::new()
    }

    fn lock(&self) {
        crate::SharedTimedMutex::lock(self)
    }

    fn try_lock(&self) -> bool {
        crate::SharedTimedMutex::try_lock(self)
    }

    unsafe fn unlock(&self) {
        crate::SharedTimedMutex::unlock(self)
    }

    fn lock_shared(&self) {
        crate::SharedTimedMutex::lock_shared(self)
    }

    fn try_lock_shared(&self) -> bool {
        crate::SharedTimedMutex::try_lock_shared(self)
    }

    unsafe fn unlock_shared(&self) {
        crate::SharedTimedMutex::unlock_shared(self)
    }
}

unsafe impl RawSharedTimedLock for crate::SharedTimedMutex {
    fn try_lock_for(&self, timeout: Duration) -> bool {
        crate::SharedTimedMutex::try_lock_for(self, timeout)
    }

    fn try_lock_until(&self, deadline: Instant) -> bool {
        crate::SharedTimedMutex::try_lock_until(self, deadline)
    }

    fn try_lock_shared_for(&self, timeout: Duration) -> bool {
        crate::SharedTimedMutex::try_lock_shared_for(self, timeout)
    }

    fn try_lock_shared_until(&self, deadline: Instant) -> bool {
        crate::SharedTimedMutex::try_lock_shared_until(self, deadline)
    }
}
