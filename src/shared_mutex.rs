// SPDX-License-Identifier: MIT
//
// The writer-preferring reader-writer lock algorithm. Two atomic
// counters, a compare-and-swap protocol, and a wake policy tuned so that
// a reader is only ever woken once writer demand has gone away, and a
// writer is only ever woken when the holding count reaching zero is
// plausible.
//
// Grounded on `libipc`'s `rw_lock.rs` (a single-word,
// high-bit-sentinel reader-writer lock): this implementation keeps that
// design's core idea — one word whose top bit marks an exclusive holder
// — but splits it into the two words the algorithm actually needs
// (`w` for writer demand, `h` for the holding count) and replaces
// spin-only backoff with OS-level parking on `FutexWord`.

use std::sync::atomic::Ordering;

use crate::parking::FutexWord;

/// High bit of the holding counter: set while exactly one exclusive
/// holder owns the lock. The remaining 31 bits count active shared
/// holders (or, while a writer holds, any in-flight reader probes that
/// briefly incremented the count before backing out — see
/// [`lock_shared`](RawCore::lock_shared)).
pub(crate) const WRITING: u32 = 1 << 31;

/// Shared state both [`SharedMutex`](crate::SharedMutex) and
/// [`SharedTimedMutex`](crate::SharedTimedMutex) delegate to. Carrying
/// the algorithm once here and having both public types wrap it mirrors
/// `libipc`'s own composition style (`IpcMutex` wraps
/// `PlatformMutex`, `ScopedAccess` wraps a `&ShmHandle` plus a
/// `&IpcMutex`) rather than duplicating the counter logic per type.
pub(crate) struct RawCore {
    /// Writer-demand counter: the number of threads currently acquiring
    /// or holding exclusive ownership.
    w: FutexWord,
    /// Holding count, offset by [`WRITING`] while an exclusive holder is
    /// granted.
    h: FutexWord,
}

impl RawCore {
    pub(crate) const fn new() -> Self {
        Self {
            w: FutexWord::new(0),
            h: FutexWord::new(0),
        }
    }

    // -- exclusive ----------------------------------------------------

    pub(crate) fn lock(&self) {
        self.w.fetch_add(1, Ordering::Acquire);
        loop {
            match self.h.compare_exchange_strong(0, WRITING, Ordering::Acquire, Ordering::Acquire) {
                Ok(_) => return,
                Err(h) => self.h.wait(h),
            }
        }
    }

    pub(crate) fn try_lock(&self) -> bool {
        self.w.fetch_add(1, Ordering::Acquire);
        match self.h.compare_exchange_strong(0, WRITING, Ordering::Acquire, Ordering::Acquire) {
            Ok(_) => true,
            Err(_) => {
                self.abort_exclusive_attempt();
                false
            }
        }
    }

    /// Back out of an exclusive attempt that did not (and never will)
    /// succeed — shared by the non-timed try path and every timed
    /// exclusive path on timeout.
    pub(crate) fn abort_exclusive_attempt(&self) {
        let prev = self.w.fetch_sub(1, Ordering::Release);
        if prev == 1 {
            self.w.notify_all();
        }
    }

    pub(crate) fn unlock(&self) {
        self.h.fetch_sub(WRITING, Ordering::Release);
        let prev = self.w.fetch_sub(1, Ordering::Release);
        if prev == 1 {
            self.w.notify_all();
        } else {
            self.h.notify_one();
        }
    }

    // -- shared ---------------------------------------------------------

    pub(crate) fn lock_shared(&self) {
        loop {
            let w = self.w.load(Ordering::Acquire);
            if w != 0 {
                self.w.wait(w);
                continue;
            }
            self.h.fetch_add(1, Ordering::Acquire);
            if self.w.load(Ordering::Acquire) > 0 {
                // A writer intended to enter after we observed zero —
                // back out and restart.
                self.unlock_shared();
                continue;
            }
            return;
        }
    }

    pub(crate) fn try_lock_shared(&self) -> bool {
        if self.w.load(Ordering::Acquire) != 0 {
            return false;
        }
        self.h.fetch_add(1, Ordering::Acquire);
        if self.w.load(Ordering::Acquire) > 0 {
            self.unlock_shared();
            return false;
        }
        true
    }

    pub(crate) fn unlock_shared(&self) {
        let prev = self.h.fetch_sub(1, Ordering::Release);
        if prev == 1 && self.w.load(Ordering::Acquire) > 0 {
            self.h.notify_one();
        }
    }

    pub(crate) fn w_word(&self) -> &FutexWord {
        &self.w
    }

    pub(crate) fn h_word(&self) -> &FutexWord {
        &self.h
    }

    /// Non-blocking snapshot for `Debug` impls only. Never used on any
    /// acquire/release path.
    pub(crate) fn debug_state(&self) -> (u32, u32) {
        (
            self.w.load(Ordering::Relaxed),
            self.h.load(Ordering::Relaxed),
        )
    }
}

// Safety: all mutation goes through the atomic `FutexWord`s; there is no
// thread-affinity requirement (a shared hold may be released by a
// different thread than acquired it, per the spec's scheduling model).
unsafe impl Send for RawCore {}
unsafe impl Sync for RawCore {}

/// A writer-preferring reader-writer lock.
///
/// Any number of threads may hold the lock in shared (read) mode at
/// once. Exclusive (write) mode is mutually exclusive with every other
/// mode. Writer priority is unconditional: once any thread calls
/// [`lock`](Self::lock), no further [`lock_shared`](Self::lock_shared)
/// or [`try_lock_shared`](Self::try_lock_shared) call succeeds until
/// that writer has acquired and released — this can starve readers
/// indefinitely under a continuous stream of writers, which is
/// intentional (see the crate's design notes on writer priority) rather
/// than a bug.
///
/// There is no fairness between writers, no recursive acquisition, and
/// no upgrade path from shared to exclusive. Unlocking a mode the
/// caller does not hold, or exceeding `2^31 - 1` concurrent shared
/// holders, is undefined behavior — this type does not check for either
/// condition on the hot path.
///
/// For a scoped RAII handle instead of bare `lock`/`unlock` calls, wrap
/// a value in [`Guarded`](crate::Guarded).
pub struct SharedMutex {
    pub(crate) core: RawCore,
}

impl SharedMutex {
    /// Create a new, unlocked lock.
    pub const fn new() -> Self {
        Self { core: RawCore::new() }
    }

    /// Acquire exclusive ownership, blocking until it is available.
    pub fn lock(&self) {
        self.core.lock();
    }

    /// Attempt to acquire exclusive ownership without blocking. Returns
    /// `true` on success.
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

    /// Attempt to acquire a shared hold without blocking. Returns `true`
    /// on success.
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
}

impl Default for SharedMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (w, h) = self.core.debug_state();
        if h >= WRITING {
            f.debug_struct("SharedMutex").field("state", &"exclusive").finish()
        } else if h > 0 {
            f.debug_struct("SharedMutex")
                .field("state", &"shared")
                .field("readers", &h)
                .finish()
        } else {
            f.debug_struct("SharedMutex")
                .field("state", &"free")
                .field("writer_demand", &w)
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fresh_lock_round_trips_exclusive_then_shared() {
        // Boundary scenario 1.
        let lock = SharedMutex::new();
        assert!(lock.try_lock());
        lock.unlock();
        assert!(lock.try_lock_shared());
        lock.unlock_shared();
        assert!(lock.try_lock());
        lock.unlock();
    }

    #[test]
    fn held_exclusive_rejects_both_modes() {
        // Boundary scenario 2.
        let lock = SharedMutex::new();
        lock.lock();
        assert!(!lock.try_lock());
        assert!(!lock.try_lock_shared());
        lock.unlock();
    }

    #[test]
    fn two_shared_holders_then_drain() {
        // Boundary scenario 3.
        let lock = SharedMutex::new();
        assert!(lock.try_lock_shared());
        assert!(lock.try_lock_shared());
        assert!(!lock.try_lock());
        lock.unlock_shared();
        assert!(!lock.try_lock());
        lock.unlock_shared();
        assert!(lock.try_lock());
        lock.unlock();
    }

    #[test]
    fn cross_thread_release_then_local_try_lock() {
        // Boundary scenario 4.
        let lock = Arc::new(SharedMutex::new());
        lock.lock();
        let lock2 = Arc::clone(&lock);
        thread::spawn(move || lock2.unlock()).join().unwrap();
        assert!(lock.try_lock());
        lock.unlock();
    }

    #[test]
    fn shared_handle_copy_keeps_lock_held_until_all_drop() {
        // Boundary scenario 7 (without the handle type: raw shared holds).
        let lock = SharedMutex::new();
        lock.lock_shared();
        lock.lock_shared(); // second "copy"
        lock.unlock_shared();
        assert!(!lock.try_lock());
        lock.unlock_shared();
        assert!(lock.try_lock());
        lock.unlock();
    }

    #[test]
    fn lock_unlock_round_trip_restores_free_state() {
        let lock = SharedMutex::new();
        let (w0, h0) = lock.core.debug_state();
        lock.lock();
        lock.unlock();
        let (w1, h1) = lock.core.debug_state();
        assert_eq!((w0, h0), (w1, h1));
    }

    #[test]
    fn writer_exclusive_access_under_contention() {
        let lock = Arc::new(SharedMutex::new());
        let violations = Arc::new(AtomicI32::new(0));
        let in_critical = Arc::new(AtomicI32::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let violations = Arc::clone(&violations);
                let in_critical = Arc::clone(&in_critical);
                thread::spawn(move || {
                    for _ in 0..200 {
                        lock.lock();
                        let n = in_critical.fetch_add(1, Ordering::SeqCst) + 1;
                        if n != 1 {
                            violations.fetch_add(1, Ordering::SeqCst);
                        }
                        in_critical.fetch_sub(1, Ordering::SeqCst);
                        lock.unlock();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(violations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn readers_and_writer_never_overlap() {
        let lock = Arc::new(SharedMutex::new());
        let writer_active = Arc::new(AtomicI32::new(0));
        let violations = Arc::new(AtomicI32::new(0));

        let w_lock = Arc::clone(&lock);
        let w_active = Arc::clone(&writer_active);
        let w_viol = Arc::clone(&violations);
        let writer = thread::spawn(move || {
            for _ in 0..50 {
                w_lock.lock();
                w_active.store(1, Ordering::SeqCst);
                thread::sleep(Duration::from_micros(50));
                w_active.store(0, Ordering::SeqCst);
                w_lock.unlock();
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let active = Arc::clone(&writer_active);
                let viol = Arc::clone(&violations);
                thread::spawn(move || {
                    for _ in 0..100 {
                        lock.lock_shared();
                        if active.load(Ordering::SeqCst) == 1 {
                            viol.fetch_add(1, Ordering::SeqCst);
                        }
                        lock.unlock_shared();
                        thread::yield_now();
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(violations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn writer_priority_stalls_new_readers() {
        // Boundary scenario 6, scaled down for a unit test's time budget.
        let lock = Arc::new(SharedMutex::new());
        let reader_successes = Arc::new(AtomicI32::new(0));
        let stop = Arc::new(AtomicI32::new(0));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let successes = Arc::clone(&reader_successes);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while stop.load(Ordering::Relaxed) == 0 {
                        if lock.try_lock_shared() {
                            successes.fetch_add(1, Ordering::Relaxed);
                            lock.unlock_shared();
                        }
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(5));
        lock.lock();
        let during_hold = reader_successes.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(20));
        let still_during_hold = reader_successes.load(Ordering::Relaxed);
        lock.unlock();

        stop.store(1, Ordering::Relaxed);
        for r in readers {
            r.join().unwrap();
        }

        assert_eq!(during_hold, still_during_hold);
    }
}
