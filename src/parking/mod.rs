// SPDX-License-Identifier: MIT
//
// The parking primitive: a 32-bit atomic cell with OS-backed park/wake.
// Binary-compatible contract with a futex on Linux and `WaitOnAddress` on
// Windows — the value check and the park are atomic with respect to
// notifies, so a notify issued after the check but before the park is
// never lost.
//
// Platform backends live in `linux` (Linux, via `SYS_futex`), `windows`
// (Windows, via `WaitOnAddress`/`WakeByAddress{Single,All}`), and
// `generic_unix` (every other Unix target, via `Mutex`+`Condvar` — a
// reduced-efficiency fallback so the crate still builds and behaves
// correctly on targets without a native futex-like primitive, such as
// macOS and the BSDs).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;
use std::time::{Duration, Instant};

#[cfg(target_os = "linux")]
#[path = "linux.rs"]
mod backend;

#[cfg(windows)]
#[path = "windows.rs"]
mod backend;

#[cfg(not(any(target_os = "linux", windows)))]
#[path = "generic_unix.rs"]
mod backend;

static LOG_BACKEND_ONCE: Once = Once::new();

/// Emit a one-time `log::debug!` naming which backend got compiled in.
/// Called from the first blocking `wait`/`wait_for`/`wait_until` (i.e.
/// only once a caller has actually contended a lock); a no-op without
/// the `log` feature. Never reached by the uncontended fast path.
fn log_backend_selection() {
    LOG_BACKEND_ONCE.call_once(|| {
        #[cfg(feature = "log")]
        {
            #[cfg(target_os = "linux")]
            log::debug!("fast_shared_mutex: parking backend = linux futex");
            #[cfg(windows)]
            log::debug!("fast_shared_mutex: parking backend = WaitOnAddress");
            #[cfg(not(any(target_os = "linux", windows)))]
            log::debug!("fast_shared_mutex: parking backend = generic_unix (Mutex+Condvar fallback)");
        }
    });
}

/// A 32-bit atomic cell that threads can park on and be woken from.
///
/// `FutexWord` is the leaf primitive the rest of this crate is built on:
/// [`SharedMutex`](crate::SharedMutex) and
/// [`SharedTimedMutex`](crate::SharedTimedMutex) each hold two of these
/// (the writer-demand counter and the holding count) and drive the whole
/// reader-writer algorithm through `load`/`fetch_add`/`fetch_sub`/
/// `compare_exchange_strong` plus the wait/notify pair below.
///
/// `wait`/`wait_for`/`wait_until` never miss a wakeup: the backend checks
/// `load() == expected` and blocks as one atomic step with respect to a
/// concurrent `notify_one`/`notify_all`. Spurious wakeups from `wait` are
/// permitted — callers must re-check their own condition in a loop, which
/// is exactly how `SharedMutex`'s acquire loops use this type.
pub struct FutexWord {
    value: AtomicU32,
    #[cfg(not(any(target_os = "linux", windows)))]
    fallback: backend::FallbackState,
}

impl FutexWord {
    /// Create a new cell holding `value`.
    #[cfg(any(target_os = "linux", windows))]
    pub const fn new(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value),
        }
    }

    /// Create a new cell holding `value`.
    #[cfg(not(any(target_os = "linux", windows)))]
    pub const fn new(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value),
            fallback: backend::FallbackState::new(),
        }
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> u32 {
        self.value.load(order)
    }

    #[inline]
    pub fn store(&self, val: u32, order: Ordering) {
        self.value.store(val, order)
    }

    #[inline]
    pub fn fetch_add(&self, val: u32, order: Ordering) -> u32 {
        self.value.fetch_add(val, order)
    }

    #[inline]
    pub fn fetch_sub(&self, val: u32, order: Ordering) -> u32 {
        self.value.fetch_sub(val, order)
    }

    /// Compare-and-swap. Returns `Ok(current)` on success, `Err(current)`
    /// on failure — mirrors `AtomicU32::compare_exchange` but always
    /// reports the observed value on both paths, which is exactly what
    /// every call site in this crate needs (either "we got it" or "here's
    /// what to park on").
    #[inline]
    pub fn compare_exchange_strong(
        &self,
        current: u32,
        new: u32,
        success: Ordering,
        failure: Ordering,
    ) -> Result<u32, u32> {
        match self
            .value
            .compare_exchange(current, new, success, failure)
        {
            Ok(v) => Ok(v),
            Err(v) => Err(v),
        }
    }

    /// Block until notified, provided the cell still equals `expected`.
    /// If `load() != expected` at the time of the call, returns
    /// immediately without blocking. Spurious returns are permitted.
    #[inline]
    pub fn wait(&self, expected: u32) {
        log_backend_selection();
        backend::wait(self, expected, None);
    }

    /// As [`wait`](Self::wait), but gives up after `timeout` and returns
    /// `false`. Returns `true` if woken by a notify (or spuriously) before
    /// the timeout elapsed. A zero or negative duration performs a single
    /// non-blocking check: returns `true` iff `load() == expected` at the
    /// call, and never parks.
    #[inline]
    pub fn wait_for(&self, expected: u32, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return self.load(Ordering::Acquire) == expected;
        }
        log_backend_selection();
        backend::wait(self, expected, Some(Deadline::Relative(timeout)))
    }

    /// As [`wait_for`](Self::wait_for), but takes an absolute monotonic
    /// deadline instead of a relative duration. A deadline already in the
    /// past performs a single non-blocking check, exactly like a zero
    /// duration passed to `wait_for`.
    #[inline]
    pub fn wait_until(&self, expected: u32, deadline: Instant) -> bool {
        let now = Instant::now();
        if deadline <= now {
            return self.load(Ordering::Acquire) == expected;
        }
        log_backend_selection();
        backend::wait(self, expected, Some(Deadline::Monotonic(deadline)))
    }

    /// Wake one parked thread, if any. Idempotent — waking zero waiters
    /// is a valid, cheap no-op.
    #[inline]
    pub fn notify_one(&self) {
        backend::notify(self, false);
    }

    /// Wake every parked thread.
    #[inline]
    pub fn notify_all(&self) {
        backend::notify(self, true);
    }
}

/// Internal representation of a wait deadline, passed down to the
/// platform backend so it can pick the right OS-level wait operator
/// (relative timeout vs. absolute monotonic deadline).
pub(crate) enum Deadline {
    Relative(Duration),
    Monotonic(Instant),
}

impl Deadline {
    /// Resolve to a relative duration from "now", clamped to zero if
    /// already elapsed. Backends without a native absolute-deadline
    /// operator (e.g. the generic Unix fallback re-checks the clock in a
    /// loop, and Windows always works in milliseconds) use this.
    pub(crate) fn remaining(&self) -> Duration {
        match self {
            Deadline::Relative(d) => *d,
            Deadline::Monotonic(at) => at.saturating_duration_since(Instant::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_returns_immediately_on_mismatch() {
        let w = FutexWord::new(5);
        w.wait(6); // value != expected, must not block
    }

    #[test]
    fn wait_for_zero_duration_checks_without_parking() {
        let w = FutexWord::new(7);
        assert!(w.wait_for(7, Duration::ZERO));
        assert!(!w.wait_for(8, Duration::ZERO));
    }

    #[test]
    fn wait_until_past_deadline_checks_without_parking() {
        let w = FutexWord::new(3);
        let past = Instant::now() - Duration::from_secs(1);
        assert!(w.wait_until(3, past));
        assert!(!w.wait_until(4, past));
    }

    #[test]
    fn wait_for_times_out() {
        let w = FutexWord::new(1);
        let start = Instant::now();
        let woke = w.wait_for(1, Duration::from_millis(20));
        assert!(!woke);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn notify_one_wakes_a_waiter() {
        let w = Arc::new(FutexWord::new(0));
        let w2 = Arc::clone(&w);
        let handle = thread::spawn(move || {
            w2.wait(0);
        });
        thread::sleep(Duration::from_millis(20));
        w.store(1, Ordering::Release);
        w.notify_one();
        handle.join().unwrap();
    }

    #[test]
    fn notify_all_wakes_every_waiter() {
        let w = Arc::new(FutexWord::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let w = Arc::clone(&w);
                thread::spawn(move || w.wait(0))
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        w.store(1, Ordering::Release);
        w.notify_all();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn notify_with_no_waiters_is_a_no_op() {
        let w = FutexWord::new(0);
        w.notify_one();
        w.notify_all();
    }
}
