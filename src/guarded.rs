// SPDX-License-Identifier: MIT
//
// `Guarded<T, L>` pairs a value with the lock that protects it and hands
// out RAII guards instead of bare `lock`/`unlock` calls — grounded on
// `libipc`'s `ScopedAccess`, which does the same for a shared
// memory region: `ScopedAccess::new` locks a mutex and returns a guard
// whose `Drop` unlocks it, and callers reach the protected bytes only
// through that guard's `read`/`write` accessors.
//
// The one structural difference from `ScopedAccess` is deliberate: that
// type stores a raw pointer back to its mutex because C++ has no borrow
// checker to lean on. Guards here instead borrow `&'a Guarded<T, L>`
// directly, so the compiler itself enforces that a guard cannot outlive
// the value it was locked from, and that `T` cannot be touched without
// going through a guard.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};
use std::cell::UnsafeCell;

use crate::lock_traits::{RawSharedLock, RawSharedTimedLock};
use crate::SharedMutex;

/// A value paired with the lock that protects concurrent access to it.
///
/// `L` defaults to [`SharedMutex`]; pass [`SharedTimedMutex`](crate::SharedTimedMutex)
/// instead to also unlock the `*_for`/`*_until` methods below.
pub struct Guarded<T, L: RawSharedLock = SharedMutex> {
    lock: L,
    value: UnsafeCell<T>,
}

// Safety: `lock` mediates every access to `value`; `RawSharedLock`'s own
// safety contract guarantees at most one exclusive accessor or any
// number of shared accessors at a time, which is exactly the bound
// `Sync` requires for `UnsafeCell` access through `&Guarded`. `T: Send`
// is required since an exclusive guard hands out `&mut T` to whichever
// thread holds the lock, which may differ from the thread that
// constructed the `Guarded`. `T: Sync` is additionally required for
// `Sync`: shared mode hands out `&T` to any number of threads at once,
// so a `!Sync` `T` (e.g. `Cell<i32>`) would let them race unsynchronized
// interior mutation through safe code otherwise — the same bound
// `std::sync::RwLock<T>` requires of its own `Sync` impl.
unsafe impl<T: Send, L: RawSharedLock + Send> Send for Guarded<T, L> {}
unsafe impl<T: Send + Sync, L: RawSharedLock + Sync> Sync for Guarded<T, L> {}

impl<T, L: RawSharedLock> Guarded<T, L> {
    /// Wrap `value` with a fresh, unlocked instance of `L`.
    pub fn new(value: T) -> Self {
        Self {
            lock: L::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire exclusive (read-write) access, blocking until available.
    pub fn lock(&self) -> ExclusiveMutGuard<'_, T, L> {
        self.lock.lock();
        ExclusiveMutGuard { owner: self }
    }

    /// Attempt to acquire exclusive (read-write) access without
    /// blocking.
    pub fn try_lock(&self) -> Option<ExclusiveMutGuard<'_, T, L>> {
        if self.lock.try_lock() {
            Some(ExclusiveMutGuard { owner: self })
        } else {
            None
        }
    }

    /// Acquire exclusive access but expose it only as `&T`, blocking
    /// until available. Useful when the caller needs the stronger
    /// exclusivity guarantee (no concurrent readers either) but does
    /// not need to mutate.
    pub fn lock_const(&self) -> ExclusiveConstGuard<'_, T, L> {
        self.lock.lock();
        ExclusiveConstGuard { owner: self }
    }

    /// Attempt to acquire exclusive-but-const access without blocking.
    pub fn try_lock_const(&self) -> Option<ExclusiveConstGuard<'_, T, L>> {
        if self.lock.try_lock() {
            Some(ExclusiveConstGuard { owner: self })
        } else {
            None
        }
    }

    /// Acquire shared (read-only) access, blocking until available.
    pub fn lock_shared(&self) -> SharedConstGuard<'_, T, L> {
        self.lock.lock_shared();
        SharedConstGuard { owner: self }
    }

    /// Attempt to acquire shared (read-only) access without blocking.
    pub fn try_lock_shared(&self) -> Option<SharedConstGuard<'_, T, L>> {
        if self.lock.try_lock_shared() {
            Some(SharedConstGuard { owner: self })
        } else {
            None
        }
    }

    /// Returns a reference to the raw lock, for inspection (e.g. via its
    /// `Debug` impl) without going through a guard.
    pub fn raw_lock(&self) -> &L {
        &self.lock
    }
}

impl<T, L: RawSharedTimedLock> Guarded<T, L> {
    /// Attempt to acquire exclusive access, giving up after `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<ExclusiveMutGuard<'_, T, L>> {
        if self.lock.try_lock_for(timeout) {
            Some(ExclusiveMutGuard { owner: self })
        } else {
            None
        }
    }

    /// Attempt to acquire exclusive access, giving up once `deadline`
    /// has passed.
    pub fn try_lock_until(&self, deadline: Instant) -> Option<ExclusiveMutGuard<'_, T, L>> {
        if self.lock.try_lock_until(deadline) {
            Some(ExclusiveMutGuard { owner: self })
        } else {
            None
        }
    }

    /// Attempt to acquire exclusive-but-const access, giving up after
    /// `timeout`.
    pub fn try_lock_const_for(&self, timeout: Duration) -> Option<ExclusiveConstGuard<'_, T, L>> {
        if self.lock.try_lock_for(timeout) {
            Some(ExclusiveConstGuard { owner: self })
        } else {
            None
        }
    }

    /// Attempt to acquire exclusive-but-const access, giving up once
    /// `deadline` has passed.
    pub fn try_lock_const_until(&self, deadline: Instant) -> Option<ExclusiveConstGuard<'_, T, L>> {
        if self.lock.try_lock_until(deadline) {
            Some(ExclusiveConstGuard { owner: self })
        } else {
            None
        }
    }

    /// Attempt to acquire a shared hold, giving up after `timeout`.
    pub fn try_lock_shared_for(&self, timeout: Duration) -> Option<SharedConstGuard<'_, T, L>> {
        if self.lock.try_lock_shared_for(timeout) {
            Some(SharedConstGuard { owner: self })
        } else {
            None
        }
    }

    /// Attempt to acquire a shared hold, giving up once `deadline` has
    /// passed.
    pub fn try_lock_shared_until(&self, deadline: Instant) -> Option<SharedConstGuard<'_, T, L>> {
        if self.lock.try_lock_shared_until(deadline) {
            Some(SharedConstGuard { owner: self })
        } else {
            None
        }
    }
}

impl<T: Default, L: RawSharedLock> Default for Guarded<T, L> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug, L: RawSharedLock> fmt::Debug for Guarded<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock_shared() {
            Some(guard) => f.debug_struct("Guarded").field("value", &*guard).finish(),
            None => f
                .debug_struct("Guarded")
                .field("value", &format_args!("<locked>"))
                .finish(),
        }
    }
}

/// Exclusive (read-write) hold on a [`Guarded`]'s value.
///
/// Dereferences to `&mut T`. Releases the lock when dropped.
pub struct ExclusiveMutGuard<'a, T, L: RawSharedLock> {
    owner: &'a Guarded<T, L>,
}

impl<'a, T, L: RawSharedLock> ExclusiveMutGuard<'a, T, L> {
    /// Downgrade to a const (read-only) view of the same exclusive hold,
    /// without releasing and reacquiring the lock.
    pub fn into_const(self) -> ExclusiveConstGuard<'a, T, L> {
        let this = ManuallyDrop::new(self);
        ExclusiveConstGuard { owner: this.owner }
    }
}

impl<T, L: RawSharedLock> Deref for ExclusiveMutGuard<'_, T, L> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.owner.value.get() }
    }
}

impl<T, L: RawSharedLock> DerefMut for ExclusiveMutGuard<'_, T, L> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.owner.value.get() }
    }
}

impl<T, L: RawSharedLock> Drop for ExclusiveMutGuard<'_, T, L> {
    fn drop(&mut self) {
        unsafe { self.owner.lock.unlock() }
    }
}

impl<T: fmt::Debug, L: RawSharedLock> fmt::Debug for ExclusiveMutGuard<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Exclusive hold on a [`Guarded`]'s value, exposed only as `&T`.
///
/// Acquired via [`Guarded::lock_const`], or by downgrading an
/// [`ExclusiveMutGuard`] with [`into_const`](ExclusiveMutGuard::into_const).
/// Releases the lock when dropped.
pub struct ExclusiveConstGuard<'a, T, L: RawSharedLock> {
    owner: &'a Guarded<T, L>,
}

impl<T, L: RawSharedLock> Deref for ExclusiveConstGuard<'_, T, L> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.owner.value.get() }
    }
}

impl<T, L: RawSharedLock> Drop for ExclusiveConstGuard<'_, T, L> {
    fn drop(&mut self) {
        unsafe { self.owner.lock.unlock() }
    }
}

impl<T: fmt::Debug, L: RawSharedLock> fmt::Debug for ExclusiveConstGuard<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Shared (read-only) hold on a [`Guarded`]'s value.
///
/// Any number of `SharedConstGuard`s may coexist; [`Clone`] takes out an
/// additional shared hold rather than copying a reference to an
/// existing one (mirroring the lock's own counted-holder semantics, not
/// `Rc`-style refcounting on a single guard). Releases its own hold when
/// dropped.
pub struct SharedConstGuard<'a, T, L: RawSharedLock> {
    owner: &'a Guarded<T, L>,
}

impl<T, L: RawSharedLock> Deref for SharedConstGuard<'_, T, L> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.owner.value.get() }
    }
}

impl<T, L: RawSharedLock> Drop for SharedConstGuard<'_, T, L> {
    fn drop(&mut self) {
        unsafe { self.owner.lock.unlock_shared() }
    }
}

impl<T, L: RawSharedLock> Clone for SharedConstGuard<'_, T, L> {
    fn clone(&self) -> Self {
        self.owner.lock.lock_shared();
        SharedConstGuard { owner: self.owner }
    }
}

impl<T: fmt::Debug, L: RawSharedLock> fmt::Debug for SharedConstGuard<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
