// SPDX-License-Identifier: MIT
//
// Linux backend for the parking primitive: `SYS_futex` directly, no
// intermediate wrapper crate — mirrors how `natyamatsya-cpp-ipc`'s
// `platform::posix` module talks straight to `libc` for its named
// mutexes rather than going through a higher-level synchronization
// crate.
//
// Absolute timeouts use `FUTEX_WAIT_BITSET` with `FUTEX_BITSET_MATCH_ANY`,
// which (absent `FUTEX_CLOCK_REALTIME`) the kernel measures against
// `CLOCK_MONOTONIC` — matching `Instant`, the only absolute deadline this
// crate's public API accepts. Relative timeouts use plain `FUTEX_WAIT`,
// which the kernel always measures against `CLOCK_MONOTONIC` too.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use super::{Deadline, FutexWord};

const FUTEX_WAIT: i32 = 0;
const FUTEX_WAKE: i32 = 1;
const FUTEX_WAIT_BITSET: i32 = 9;
const FUTEX_BITSET_MATCH_ANY: u32 = u32::MAX;
const FUTEX_PRIVATE_FLAG: i32 = 128;

#[inline]
fn futex_ptr(word: &FutexWord) -> *const std::sync::atomic::AtomicU32 {
    &word.value
}

fn duration_to_timespec(d: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    }
}

fn instant_to_monotonic_timespec(deadline: Instant) -> libc::timespec {
    // There is no direct Instant -> CLOCK_MONOTONIC timespec conversion in
    // std, so read CLOCK_MONOTONIC "now" ourselves and add the remaining
    // duration computed from `Instant::now()`. Both clocks advance at the
    // same rate, so the resulting absolute timestamp lines up with the
    // kernel's own CLOCK_MONOTONIC.
    let remaining = deadline.saturating_duration_since(Instant::now());
    let mut now: libc::timespec = unsafe { std::mem::zeroed() };
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut now) };
    let ns = now.tv_nsec as u64 + remaining.subsec_nanos() as u64;
    libc::timespec {
        tv_sec: now.tv_sec + remaining.as_secs() as libc::time_t + (ns / 1_000_000_000) as libc::time_t,
        tv_nsec: (ns % 1_000_000_000) as libc::c_long,
    }
}

unsafe fn futex(
    addr: *const std::sync::atomic::AtomicU32,
    op: i32,
    val: u32,
    timeout: *const libc::timespec,
    bitset: u32,
) -> i64 {
    libc::syscall(
        libc::SYS_futex,
        addr,
        op | FUTEX_PRIVATE_FLAG,
        val,
        timeout,
        std::ptr::null::<u32>(),
        bitset,
    )
}

pub(crate) fn wait(word: &FutexWord, expected: u32, deadline: Option<Deadline>) -> bool {
    if word.load(Ordering::Acquire) != expected {
        return true;
    }
    let addr = futex_ptr(word);
    let ret = match deadline {
        None => unsafe { futex(addr, FUTEX_WAIT, expected, std::ptr::null(), 0) },
        Some(Deadline::Relative(d)) => {
            let ts = duration_to_timespec(d);
            unsafe { futex(addr, FUTEX_WAIT, expected, &ts, 0) }
        }
        Some(Deadline::Monotonic(at)) => {
            let ts = instant_to_monotonic_timespec(at);
            unsafe {
                futex(
                    addr,
                    FUTEX_WAIT_BITSET,
                    expected,
                    &ts,
                    FUTEX_BITSET_MATCH_ANY,
                )
            }
        }
    };
    if ret == 0 {
        return true;
    }
    let errno = std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(0);
    match errno {
        // EAGAIN: value no longer matched `expected` when the kernel
        // checked — equivalent to an immediate wakeup. EINTR: spurious,
        // treat as woken (the caller's own retry loop re-checks its
        // condition). ETIMEDOUT: the only real "did not wake" case.
        libc::EAGAIN | libc::EINTR => {
            #[cfg(feature = "log")]
            log::trace!(
                "fast_shared_mutex: futex wait returned {} (treated as woken)",
                if errno == libc::EAGAIN { "EAGAIN" } else { "EINTR" }
            );
            true
        }
        libc::ETIMEDOUT => false,
        _ => panic!(
            "futex(FUTEX_WAIT) failed unexpectedly: {}",
            std::io::Error::from_raw_os_error(errno)
        ),
    }
}

pub(crate) fn notify(word: &FutexWord, all: bool) {
    let addr = futex_ptr(word);
    let count = if all { i32::MAX as u32 } else { 1 };
    let ret = unsafe { futex(addr, FUTEX_WAKE, count, std::ptr::null(), 0) };
    if ret < 0 {
        let err = std::io::Error::last_os_error();
        panic!("futex(FUTEX_WAKE) failed unexpectedly: {err}");
    }
}
