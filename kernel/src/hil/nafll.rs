// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Interface to the NAFLL clock generators.
//!
//! A NAFLL is a digitally controlled oscillator (DVCO) whose frequency is set
//! either directly by software (an NDIV override) or by a lookup table indexed
//! by the voltage sensed by its ADC. The clock core decides which of those
//! modes is active and in which order the knobs below are turned; the chip
//! driver only encodes them into registers.

use crate::ErrorCode;

/// Control mode of the frequency request register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NafllMode {
    /// Software NDIV only, the LUT is ignored.
    FixedFrequency,
    /// The larger of the software NDIV and the LUT NDIV is used.
    MinFrequency,
    /// LUT NDIV only.
    Voltage,
}

/// Software frequency request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwFreqReq {
    pub mode: NafllMode,
    pub ndiv: u16,
}

/// One LUT entry, indexed by ADC code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LutEntry {
    pub ndiv: u16,
    pub vfgain: u8,
}

pub trait NafllLut {
    /// Read back the current software frequency request.
    fn sw_freq_req(&self, nafll_id: u8) -> Result<SwFreqReq, ErrorCode>;

    /// Program a new software frequency request.
    fn set_sw_freq_req(&self, nafll_id: u8, req: SwFreqReq) -> Result<(), ErrorCode>;

    /// Current post divider (1 means disengaged).
    fn pldiv(&self, nafll_id: u8) -> Result<u8, ErrorCode>;

    /// Program the post divider.
    fn set_pldiv(&self, nafll_id: u8, div: u8) -> Result<(), ErrorCode>;

    /// Allow or stop the NAFLL from reading its LUT.
    fn set_lut_read_enable(&self, nafll_id: u8, enable: bool) -> Result<(), ErrorCode>;

    /// Write LUT entry `idx`.
    fn lut_write(&self, nafll_id: u8, idx: u8, entry: LutEntry) -> Result<(), ErrorCode>;

    /// Whether the DVCO currently runs at or above its minimum frequency.
    fn dvco_min_reached(&self, nafll_id: u8) -> Result<bool, ErrorCode>;
}
