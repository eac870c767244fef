// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Interface to the clock ADCs that sense the rail voltages for the NAFLLs.

use crate::ErrorCode;

pub trait ClkAdc {
    /// Power the ADC up or down.
    fn set_powered(&self, adc_id: u8, powered: bool) -> Result<(), ErrorCode>;

    /// Start or stop conversions. Only meaningful while powered.
    fn set_enabled(&self, adc_id: u8, enabled: bool) -> Result<(), ErrorCode>;

    /// Whether the ADC finished its reset sequence after power up.
    fn is_ready(&self, adc_id: u8) -> Result<bool, ErrorCode>;

    /// Cap the code reported to the NAFLL LUT at `cap`, or remove the cap.
    fn set_code_cap(&self, adc_id: u8, cap: Option<u8>) -> Result<(), ErrorCode>;
}
