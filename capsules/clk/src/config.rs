// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Compile-time configuration of the clock capsule.
//!
//! Same scheme as the kernel: the options are fields of a `const` object so
//! that disabled paths are still type-checked and then folded away.

/// Data structure holding compile-time configuration options.
pub(crate) struct Config {
    /// Whether VF lookups without an iteration cursor may binary search a
    /// prog's VF points. Lookups carrying a cursor always search linearly.
    pub(crate) vf_lookup_binary_search: bool,

    /// Whether over-voltage / over-clock offsets are honoured. When enabled
    /// client frequency deltas are clamped to the base frequency of the
    /// highest VF point first.
    pub(crate) ovoc: bool,

    /// Keep every clock ADC powered regardless of its clients.
    pub(crate) adc_always_on: bool,

    /// Whether the closed-loop frequency controllers are built in. Without
    /// them NAFLL domains never enter the frequency regime.
    pub(crate) freq_controller: bool,

    /// Trace every NAFLL regime change to the debug output.
    pub(crate) trace_nafll: bool,

    /// Trace the steps of each built change sequencer script.
    pub(crate) trace_change_seq: bool,
}

pub(crate) const CONFIG: Config = Config {
    vf_lookup_binary_search: !cfg!(feature = "vf_lookup_linear"),
    ovoc: !cfg!(feature = "no_ovoc"),
    adc_always_on: cfg!(feature = "adc_always_on"),
    freq_controller: !cfg!(feature = "no_freq_controller"),
    trace_nafll: cfg!(feature = "trace_nafll"),
    trace_change_seq: cfg!(feature = "trace_change_seq"),
};
