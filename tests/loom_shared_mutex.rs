// SPDX-License-Identifier: MIT
//
// Model-checks the writer-preferring CAS protocol from `shared_mutex.rs`
// under `loom`, the same way the k23 project's `rw_lock.rs` model-checks
// its bit-packed reader/writer/upgrade counter with `loom`.
//
// `loom` replaces `std`'s atomics with instrumented ones and explores
// every thread interleaving up to a fixed bound, but it cannot model a
// real OS futex wait/wake pair — there is no syscall for it to
// interleave. So this reimplements just the W/H counter protocol with
// `loom::sync::atomic::AtomicU32`, spin-waiting instead of parking
// (spinning is fine under `loom`: it explores the interleavings of the
// spin, it does not actually burn CPU). `FutexWord`'s own
// load/store/fetch_add/fetch_sub/compare_exchange are passed straight
// through to `AtomicU32` with identical orderings, so this model is
// faithful to the real protocol; only the blocking mechanism differs.
//
// Only compiled with `--cfg loom`, never part of a normal test run.
#![cfg(loom)]

use loom::sync::atomic::AtomicU32;
use loom::sync::atomic::Ordering;
use loom::sync::Arc;
use loom::thread;

const WRITING: u32 = 1 << 31;

struct Model {
    w: AtomicU32,
    h: AtomicU32,
}

impl Model {
    fn new() -> Self {
        Self {
            w: AtomicU32::new(0),
            h: AtomicU32::new(0),
        }
    }

    fn lock(&self) {
        self.w.fetch_add(1, Ordering::Acquire);
        loop {
            if self
                .h
                .compare_exchange(0, WRITING, Ordering::Acquire, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
            thread::yield_now();
        }
    }

    fn unlock(&self) {
        self.h.fetch_sub(WRITING, Ordering::Release);
        self.w.fetch_sub(1, Ordering::Release);
    }

    fn try_lock_shared(&self) -> bool {
        if self.w.load(Ordering::Acquire) != 0 {
            return false;
        }
        self.h.fetch_add(1, Ordering::Acquire);
        if self.w.load(Ordering::Acquire) > 0 {
            self.h.fetch_sub(1, Ordering::Release);
            return false;
        }
        true
    }

    fn unlock_shared(&self) {
        self.h.fetch_sub(1, Ordering::Release);
    }
}

#[test]
fn two_writers_never_hold_simultaneously() {
    loom::model(|| {
        let model = Arc::new(Model::new());
        let observed = Arc::new(loom::sync::atomic::AtomicU32::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let model = Arc::clone(&model);
                let observed = Arc::clone(&observed);
                thread::spawn(move || {
                    model.lock();
                    let n = observed.fetch_add(1, Ordering::SeqCst) + 1;
                    assert_eq!(n, 1, "two exclusive holders overlapped");
                    observed.fetch_sub(1, Ordering::SeqCst);
                    model.unlock();
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
    });
}

#[test]
fn writer_and_reader_never_overlap() {
    loom::model(|| {
        let model = Arc::new(Model::new());
        let writer_holding = Arc::new(loom::sync::atomic::AtomicU32::new(0));

        let model_w = Arc::clone(&model);
        let holding_w = Arc::clone(&writer_holding);
        let writer = thread::spawn(move || {
            model_w.lock();
            holding_w.store(1, Ordering::SeqCst);
            holding_w.store(0, Ordering::SeqCst);
            model_w.unlock();
        });

        let model_r = Arc::clone(&model);
        let holding_r = Arc::clone(&writer_holding);
        let reader = thread::spawn(move || {
            if model_r.try_lock_shared() {
                assert_eq!(holding_r.load(Ordering::SeqCst), 0);
                model_r.unlock_shared();
            }
        });

        writer.join().unwrap();
        reader.join().unwrap();
    });
}

#[test]
fn writer_demand_blocks_subsequent_shared_attempts() {
    loom::model(|| {
        let model = Arc::new(Model::new());

        let model_w = Arc::clone(&model);
        let writer = thread::spawn(move || {
            model_w.lock();
            model_w.unlock();
        });

        let model_r = Arc::clone(&model);
        let reader = thread::spawn(move || {
            // Either the reader runs entirely before/after the writer's
            // window, or it correctly observes writer demand and fails;
            // it must never succeed while `w` holds the grant.
            model_r.try_lock_shared();
        });

        writer.join().unwrap();
        reader.join().unwrap();
    });
}
