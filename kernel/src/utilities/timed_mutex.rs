// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Owner-tracking mutex with a bounded acquisition time.
//!
//! Tasks on the PMU are scheduled cooperatively, so contention is rare: it
//! only happens when one task holds the shared clock state across a yield
//! (for example around a low-power entry) while another task wants to
//! rebuild it. Waiting longer than the budget means the configuration is
//! broken, and the acquisition fails with [`ErrorCode::BUSY`].

use crate::hil::time::Time;
use crate::utilities::cells::OptionalCell;
use crate::utilities::spin_wait::spin_wait_ns;
use crate::ErrorCode;

/// Acquisition budget used for the shared clock state.
pub const CLK_MUTEX_TIMEOUT_NS: u64 = 100_000;

pub struct TimedMutex {
    owner: OptionalCell<u8>,
}

/// Releases the mutex when dropped, unless the owner already held it.
pub struct TimedMutexGuard<'a> {
    mutex: &'a TimedMutex,
    release: bool,
}

impl TimedMutex {
    pub const fn new() -> Self {
        TimedMutex {
            owner: OptionalCell::empty(),
        }
    }

    /// Task currently holding the mutex.
    pub fn owner(&self) -> Option<u8> {
        self.owner.map(|owner| *owner)
    }

    fn held_by(&self, task: u8) -> bool {
        self.owner.map_or(false, |owner| *owner == task)
    }

    /// Acquire the mutex for `task`, waiting at most `timeout_ns`.
    ///
    /// Re-acquiring from the owning task succeeds immediately and the returned
    /// guard leaves ownership untouched.
    pub fn acquire(
        &self,
        task: u8,
        timer: &dyn Time,
        timeout_ns: u64,
    ) -> Result<TimedMutexGuard<'_>, ErrorCode> {
        if self.held_by(task) {
            return Ok(TimedMutexGuard {
                mutex: self,
                release: false,
            });
        }
        spin_wait_ns(timer, timeout_ns, || Ok(self.owner.is_none())).map_err(|err| {
            if err == ErrorCode::TIMEOUT {
                ErrorCode::BUSY
            } else {
                err
            }
        })?;
        self.owner.set(task);
        Ok(TimedMutexGuard {
            mutex: self,
            release: true,
        })
    }

    /// Take the mutex without a guard, for holders that span several calls.
    pub fn lock(&self, task: u8) -> Result<(), ErrorCode> {
        match self.owner() {
            None => {
                self.owner.set(task);
                Ok(())
            }
            Some(owner) if owner == task => Ok(()),
            Some(_) => Err(ErrorCode::BUSY),
        }
    }

    /// Release a mutex taken with [`TimedMutex::lock`].
    pub fn unlock(&self, task: u8) -> Result<(), ErrorCode> {
        if !self.held_by(task) {
            return Err(ErrorCode::STATE);
        }
        self.owner.clear();
        Ok(())
    }
}

impl Drop for TimedMutexGuard<'_> {
    fn drop(&mut self) {
        if self.release {
            self.mutex.owner.clear();
        }
    }
}
