// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Interfaces for the clock generators that are not NAFLLs, and for the
//! clock counters.

use crate::ErrorCode;

/// A PLL or single-source clock generator.
pub trait ClkProgrammer {
    /// Switch the clock of domain `api_domain` to `freq_mhz`.
    ///
    /// The caller has already quantized `freq_mhz` to a value the generator
    /// can produce.
    fn program(&self, api_domain: u8, freq_mhz: u16) -> Result<(), ErrorCode>;
}

/// Free-running cycle counters attached to the clock domains.
pub trait ClkCounter {
    /// Read the 64 bit cycle count of counter `cntr_id`.
    fn read(&self, cntr_id: u8) -> Result<u64, ErrorCode>;
}
