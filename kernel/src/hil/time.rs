// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Hardware agnostic interface for the free-running PMU timer.

/// A monotonic time source with nanosecond resolution.
///
/// The PMU has no alarms in the clock paths: every hardware settling time is
/// a bounded busy wait against this counter (see
/// [`spin_wait`](crate::utilities::spin_wait)).
pub trait Time {
    /// Returns the current time in nanoseconds since an arbitrary epoch.
    fn now_ns(&self) -> u64;
}
