// SPDX-License-Identifier: MIT
//
// A writer-preferring, futex-backed shared (reader-writer) mutex.
//
// Three layers, leaves first: a parking primitive abstracting the OS
// blocking syscall (Linux futex / Windows `WaitOnAddress`), the lock
// algorithm itself (`SharedMutex` / `SharedTimedMutex`) built directly on
// that primitive, and a guarded value wrapper (`Guarded`) that ties a
// lock mode's lifetime to a scoped handle.
//
// Writer priority is unconditional: once any thread demands exclusive
// ownership, no further shared acquisitions succeed until that writer has
// held and released. There is no fairness between writers, no
// reader-preference option, and no upgrade from shared to exclusive — see
// each module's documentation for the full invariant set.

mod parking;

mod lock_traits;
pub use lock_traits::{RawSharedLock, RawSharedTimedLock};

mod shared_mutex;
pub use shared_mutex::SharedMutex;

mod shared_timed_mutex;
pub use shared_timed_mutex::SharedTimedMutex;

mod guarded;
pub use guarded::{ExclusiveConstGuard, ExclusiveMutGuard, Guarded, SharedConstGuard};

pub use parking::FutexWord;
