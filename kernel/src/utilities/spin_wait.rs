// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Bounded busy waits against the PMU timer.
//!
//! Hardware settling (ADC reset, DVCO lock) is polled with a fixed time
//! budget. Exceeding the budget is a hard failure of the operation in
//! progress; there is no cancellation.

use crate::hil::time::Time;
use crate::ErrorCode;

/// Poll `done` until it returns `Ok(true)` or `timeout_ns` elapse.
///
/// # Errors
///
/// + [Err]\([ErrorCode::TIMEOUT]\): the condition did not become true in time.
/// + Any error returned by `done`, unchanged.
pub fn spin_wait_ns<F>(timer: &dyn Time, timeout_ns: u64, mut done: F) -> Result<(), ErrorCode>
where
    F: FnMut() -> Result<bool, ErrorCode>,
{
    let start = timer.now_ns();
    loop {
        if done()? {
            return Ok(());
        }
        if timer.now_ns().wrapping_sub(start) >= timeout_ns {
            // Last look, the condition may have flipped while we were reading
            // the timer.
            return if done()? {
                Ok(())
            } else {
                Err(ErrorCode::TIMEOUT)
            };
        }
    }
}
