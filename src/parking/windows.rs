// SPDX-License-Identifier: MIT
//
// Windows backend for the parking primitive: `WaitOnAddress` /
// `WakeByAddressSingle` / `WakeByAddressAll`, called directly through
// `windows-sys` — mirrors `libipc`'s `platform::windows` module,
// which calls `CreateMutexW`/`WaitForSingleObject` directly rather than
// through a wrapper crate.
//
// `WaitOnAddress` only accepts a millisecond timeout (`INFINITE` for an
// unbounded wait). Sub-millisecond durations are rounded up to 1 ms so
// the documented promise ("returns failure no earlier than the requested
// instant") still holds.

use std::ffi::c_void;
use std::sync::atomic::Ordering;
use std::time::Duration;

use windows_sys::Win32::Foundation::{GetLastError, ERROR_TIMEOUT};
use windows_sys::Win32::System::Threading::{
    WaitOnAddress, WakeByAddressAll, WakeByAddressSingle, INFINITE,
};

use super::{Deadline, FutexWord};

fn duration_to_millis(d: Duration) -> u32 {
    let millis = d.as_millis();
    if millis == 0 && !d.is_zero() {
        1 // sub-millisecond, round up
    } else {
        millis.min(u128::from(INFINITE - 1)) as u32
    }
}

pub(crate) fn wait(word: &FutexWord, expected: u32, deadline: Option<Deadline>) -> bool {
    if word.load(Ordering::Acquire) != expected {
        return true;
    }
    let timeout_ms = match &deadline {
        None => INFINITE,
        Some(d) => duration_to_millis(d.remaining()),
    };

    let undesired = expected;
    let ok = unsafe {
        WaitOnAddress(
            &word.value as *const _ as *const c_void,
            &undesired as *const u32 as *const c_void,
            std::mem::size_of::<u32>(),
            timeout_ms,
        )
    };
    if ok != 0 {
        return true;
    }
    let err = unsafe { GetLastError() };
    if err == ERROR_TIMEOUT {
        return false;
    }
    panic!(
        "WaitOnAddress failed unexpectedly: {}",
        std::io::Error::from_raw_os_error(err as i32)
    );
}

pub(crate) fn notify(word: &FutexWord, all: bool) {
    let addr = &word.value as *const _ as *const c_void;
    unsafe {
        if all {
            WakeByAddressAll(addr);
        } else {
            WakeByAddressSingle(addr);
        }
    }
}
