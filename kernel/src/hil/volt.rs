// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Interface to the voltage rails.

use crate::ErrorCode;

pub trait VoltRail {
    /// Program the rail to `voltage_uv` and return once the regulator has
    /// settled.
    fn set_voltage(&self, rail_idx: u8, voltage_uv: u32) -> Result<(), ErrorCode>;

    /// Last voltage programmed on the rail.
    fn voltage(&self, rail_idx: u8) -> Result<u32, ErrorCode>;

    /// Apply the closed-loop offset requested by the frequency controllers on
    /// top of the programmed voltage.
    fn set_voltage_offset(&self, rail_idx: u8, offset_uv: i32) -> Result<(), ErrorCode>;
}
