// SPDX-License-Identifier: MIT
//
// Timed variant of the reader-writer lock: every operation
// `SharedMutex` exposes, plus `try_lock_for`/`try_lock_until` in both
// exclusive and shared mode. Delegates the non-timed operations and all
// state to the same `RawCore` `SharedMutex` uses, rather than
// duplicating the counter algorithm — `libipc`'s own
// `IpcCondition` takes the same approach, layering a timed `wait` over
// the same mutex state its non-timed `Waiter::wait_if` uses.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::shared_mutex::{RawCore, WRITING};

/// As [`SharedMutex`](crate::SharedMutex), but every acquire operation
/// also has a timed counterpart (`try_lock_for`/`try_lock_until` in both
/// exclusive and shared mode).
///
/// Timing out an exclusive attempt leaves the lock exactly as if
/// [`try_lock`](Self::try_lock) had failed: writer demand is
/// incremented and then backed out, which means a long enough queue of
/// timed-out writers still delays readers for the duration of each
/// attempt, honoring the same writer-priority policy as the non-timed
/// type. Timing out a shared attempt mutates nothing.
pub struct SharedTimedMutex {
    core: RawCore,
}

impl SharedTimedMutex {
    /// Create a new, unlocked lock.
    pub const fn new() -> Self {
        Self { core: RawCore::new() }
    }

    // -- non-timed, delegated -------------------------------------------

    /// Acquire exclusive ownership, blocking until it is available.
    pub fn lock(&self) {
        self.core.lock();
    }

    /// Attempt to acquire exclusive ownership without blocking.
    pub fn try_lock(&self) -> bool {
        self.core.try_lock()
    }

    /// Release exclusive ownership.
    ///
    /// # Safety (documented, not checked)
    /// The caller must currently hold the lock in exclusive mode.
    pub fn unlock(&self) {
        self.core.unlock();
    }

    /// Acquire a shared hold, blocking until it is available.
    pub fn lock_shared(&self) {
        self.core.lock_shared();
    }

    /// Attempt to acquire a shared hold without blocking.
    pub fn try_lock_shared(&self) -> bool {
        self.core.try_lock_shared()
    }

    /// Release a shared hold.
    ///
    /// # Safety (documented, not checked)
    /// The caller must currently hold a shared hold on the lock.
    pub fn unlock_shared(&self) {
        self.core.unlock_shared();
    }

    // -- timed exclusive -------------------------------------------------

    /// Attempt to acquire exclusive ownership, giving up after `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        self.try_lock_until(Instant::now() + timeout)
    }

    /// Attempt to acquire exclusive ownership, giving up once `deadline`
    /// has passed. A deadline already in the past makes a single
    /// non-blocking attempt, same as [`try_lock`](Self::try_lock).
    pub fn try_lock_until(&self, deadline: Instant) -> bool {
        let w = self.core.w_word();
        let h = self.core.h_word();

        w.fetch_add(1, Ordering::Acquire);
        loop {
            match h.compare_exchange_strong(0, WRITING, Ordering::Acquire, Ordering::Acquire) {
                Ok(_) => return true,
                Err(observed) => {
                    // Check the deadline before parking, not after: a
                    // past deadline against an unchanged `h` makes
                    // `wait_until`'s non-blocking fast path return `true`
                    // (value matched `observed`), which carries no
                    // timeout signal of its own — the elapsed-time check
                    // is what actually ends the loop.
                    if Instant::now() >= deadline {
                        self.core.abort_exclusive_attempt();
                        return false;
                    }
                    h.wait_until(observed, deadline);
                }
            }
        }
    }

    // -- timed shared -----------------------------------------------------

    /// Attempt to acquire a shared hold, giving up after `timeout`.
    pub fn try_lock_shared_for(&self, timeout: Duration) -> bool {
        self.try_lock_shared_until(Instant::now() + timeout)
    }

    /// Attempt to acquire a shared hold, giving up once `deadline` has
    /// passed. A deadline already in the past makes a single
    /// non-blocking attempt, same as
    /// [`try_lock_shared`](Self::try_lock_shared).
    pub fn try_lock_shared_until(&self, deadline: Instant) -> bool {
        let w = self.core.w_word();

        loop {
            let observed = w.load(Ordering::Acquire);
            if observed != 0 {
                // As in `try_lock_until`: check the deadline before
                // parking. `wait_until`'s past-deadline fast path
                // returns `true` when `w` is unchanged, which is not a
                // timeout signal — only the elapsed-time check is.
                if Instant::now() >= deadline {
                    return false;
                }
                w.wait_until(observed, deadline);
                continue;
            }
            if self.core.try_lock_shared() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }
}

impl Default for SharedTimedMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedTimedMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (w, h) = self.core.debug_state();
        if h >= WRITING {
            f.debug_struct("SharedTimedMutex").field("state", &"exclusive").finish()
        } else if h > 0 {
            f.debug_struct("SharedTimedMutex")
                .field("state", &"shared")
                .field("readers", &h)
                .finish()
        } else {
            f.debug_struct("SharedTimedMutex")
                .field("state", &"free")
                .field("writer_demand", &w)
                .finish()
        }
    }
}
