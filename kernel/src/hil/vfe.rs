// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Interface to the VF equation evaluator (VFE).
//!
//! The equations themselves are owned by the performance task. The clock core
//! only asks for the value of one equation at one independent variable when
//! it rebuilds its VF point cache.

use crate::ErrorCode;

/// Independent variable of a VF equation evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VfeVar {
    /// Frequency in MHz. The equation yields a voltage in uV.
    FreqMhz(u32),
    /// Voltage in uV. The equation yields a frequency in MHz.
    VoltUv(u32),
}

pub trait Vfe {
    /// Evaluate equation `vfe_idx` for `var`.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INDEX]\): `vfe_idx` is not a valid equation.
    /// + [Err]\([ErrorCode::STATE]\): the equation table has not been loaded.
    fn evaluate(&self, vfe_idx: u8, var: VfeVar) -> Result<u32, ErrorCode>;
}
