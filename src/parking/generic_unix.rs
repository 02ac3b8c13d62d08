// SPDX-License-Identifier: MIT
//
// Portable fallback backend for Unix targets with no native futex-like
// primitive exposed through `libc` (macOS, the BSDs, and anything else
// that is `cfg(unix)` but not Linux). A `Mutex`+`Condvar` pair stands in
// for the kernel wait queue a real futex would provide.
//
// This is strictly a reduced-efficiency path — every wait/notify now
// costs a mutex acquisition — never selected on Linux or Windows. It
// exists so the crate is correct (if not maximally fast) everywhere
// `std` synchronization is available, the same way `libipc`
// falls back to `std`-provided synchronization types rather than
// inventing a bespoke one for tiers it does not specially optimize for.
//
// The notifier takes the gate mutex before mutating and signalling, the
// same "barrier" idiom `libipc`'s `Waiter::notify` uses around
// its own condition variable, to guarantee a waiter that is about to
// park cannot miss the wakeup: `Condvar::wait` only registers the
// waiter once it has observed the gate, and releases the gate as one
// atomic step with entering the wait queue.

use std::sync::atomic::Ordering;
use std::sync::{Condvar, Mutex};

use super::{Deadline, FutexWord};

pub(crate) struct FallbackState {
    gate: Mutex<()>,
    cv: Condvar,
}

impl FallbackState {
    pub(crate) const fn new() -> Self {
        Self {
            gate: Mutex::new(()),
            cv: Condvar::new(),
        }
    }
}

pub(crate) fn wait(word: &FutexWord, expected: u32, deadline: Option<Deadline>) -> bool {
    if word.load(Ordering::Acquire) != expected {
        return true;
    }
    let guard = word.fallback.gate.lock().unwrap();
    if word.load(Ordering::Acquire) != expected {
        return true;
    }
    match deadline {
        None => {
            let _guard = word.fallback.cv.wait(guard).unwrap();
            true
        }
        Some(d) => {
            let remaining = d.remaining();
            if remaining.is_zero() {
                return word.load(Ordering::Acquire) == expected;
            }
            let (_guard, result) = word.fallback.cv.wait_timeout(guard, remaining).unwrap();
            !result.timed_out()
        }
    }
}

pub(crate) fn notify(word: &FutexWord, all: bool) {
    drop(word.fallback.gate.lock().unwrap());
    if all {
        word.fallback.cv.notify_all();
    } else {
        word.fallback.cv.notify_one();
    }
}
