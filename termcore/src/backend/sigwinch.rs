// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Process-global SIGWINCH registry (self-pipe pattern).
//!
//! The registry is a fixed array of atomic fd slots (-1 = empty) plus a
//! refcounted handler installation. Each live backend contributes the write
//! end of its non-blocking self-pipe; the signal handler's entire job is
//!
//! ```text
//! for slot in SLOTS { if slot >= 0 { write(slot, [1]) } }
//! ```
//!
//! and that is all: one atomic load and one `write(2)` per slot. No
//! allocation, no locking, no stdio: everything the handler touches is
//! async-signal-safe. Registration/unregistration (which do lock, to manage
//! the `signal-hook` hook id) always happen on ordinary threads.

use std::os::fd::{BorrowedFd, RawFd};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use signal_hook::SigId;
use signal_hook::consts::SIGWINCH;
use signal_hook::low_level;

use crate::error::{TermCoreError, TermCoreResult};

/// Maximum live backends per process.
pub const MAX_BACKENDS: usize = 16;

static SLOTS: [AtomicI32; MAX_BACKENDS] =
    [const { AtomicI32::new(-1) }; MAX_BACKENDS];
static REFCOUNT: AtomicUsize = AtomicUsize::new(0);
static HOOK: Mutex<Option<SigId>> = Mutex::new(None);

/// The SIGWINCH handler body. Runs in signal context: restricted to atomic
/// loads and `write(2)`, with errors ignored (a full pipe already means a
/// wakeup is pending).
fn notify_all_slots() {
    for slot in &SLOTS {
        let fd = slot.load(Ordering::Acquire);
        if fd >= 0 {
            // SAFETY: the fd stays registered (and open) until the owning
            // backend clears the slot; the store(-1) in unregister happens
            // before the fd is closed.
            let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
            let _ = rustix::io::write(borrowed, &[1u8]);
        }
    }
}

/// Claim a slot for `write_fd` and install the signal handler on the 0→1
/// transition. Returns the slot index for [`unregister`].
///
/// # Errors
///
/// [`TermCoreError::TooManyBackends`] when all slots are taken;
/// [`TermCoreError::PipeSetupFailed`] when handler installation fails.
pub(crate) fn register(write_fd: RawFd) -> TermCoreResult<usize> {
    let mut claimed = None;
    for (index, slot) in SLOTS.iter().enumerate() {
        if slot
            .compare_exchange(-1, write_fd, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            claimed = Some(index);
            break;
        }
    }
    let Some(index) = claimed else {
        return Err(TermCoreError::TooManyBackends);
    };

    if REFCOUNT.fetch_add(1, Ordering::AcqRel) == 0 {
        // SAFETY: notify_all_slots is async-signal-safe (see its doc).
        let installed = unsafe { low_level::register(SIGWINCH, notify_all_slots) };
        match installed {
            Ok(sig_id) => {
                if let Ok(mut hook) = HOOK.lock() {
                    *hook = Some(sig_id);
                }
            }
            Err(e) => {
                REFCOUNT.fetch_sub(1, Ordering::AcqRel);
                SLOTS[index].store(-1, Ordering::Release);
                return Err(TermCoreError::PipeSetupFailed(e));
            }
        }
    }
    tracing::debug!(slot = index, "registered SIGWINCH self-pipe");
    Ok(index)
}

/// Clear the slot and remove the handler on the 1→0 transition. The caller
/// must close the pipe fds only *after* this returns.
pub(crate) fn unregister(slot: usize) {
    if slot >= MAX_BACKENDS {
        return;
    }
    SLOTS[slot].store(-1, Ordering::Release);
    if REFCOUNT.fetch_sub(1, Ordering::AcqRel) == 1
        && let Ok(mut hook) = HOOK.lock()
        && let Some(sig_id) = hook.take()
    {
        low_level::unregister(sig_id);
    }
    tracing::debug!(slot, "unregistered SIGWINCH self-pipe");
}
