// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Types and limits shared by the clock objects.

use kernel::utilities::fxp::Sfxp20_12;
use kernel::ErrorCode;

/// Index value marking an unused object reference.
pub const IDX_INVALID: u8 = 0xFF;

pub const CLK_VOLT_RAIL_MAX: usize = 2;
pub const CLK_DOMAIN_MAX: usize = 32;
pub const CLK_PROG_MAX: usize = 64;
pub const CLK_VF_POINT_MAX: usize = 255;
/// Secondary domains driven by one primary.
pub const CLK_SECONDARY_MAX: usize = 4;
/// Primary frequency followed by one frequency per secondary.
pub const CLK_FREQ_TUPLE_MAX: usize = CLK_SECONDARY_MAX + 1;
pub const CLK_NAFLL_MAX: usize = 16;
pub const CLK_ADC_MAX: usize = 16;
pub const CLK_FREQ_CTRL_MAX: usize = 16;
pub const CLK_PROP_TOP_MAX: usize = 4;
pub const CLK_PROP_REL_MAX: usize = 32;
pub const CLK_PROP_REGIME_MAX: usize = 8;

/// Public identity of a clock domain, as used by the host driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ClkDomainApiId {
    Gpcclk = 0,
    Xbarclk = 1,
    Sysclk = 2,
    Hubclk = 3,
    Mclk = 4,
    Hostclk = 5,
    Dispclk = 6,
    Pwrclk = 7,
    Utilsclk = 8,
    Nvdclk = 9,
    Pciegenclk = 10,
}

impl TryFrom<u8> for ClkDomainApiId {
    type Error = ErrorCode;

    fn try_from(id: u8) -> Result<Self, ErrorCode> {
        Ok(match id {
            0 => ClkDomainApiId::Gpcclk,
            1 => ClkDomainApiId::Xbarclk,
            2 => ClkDomainApiId::Sysclk,
            3 => ClkDomainApiId::Hubclk,
            4 => ClkDomainApiId::Mclk,
            5 => ClkDomainApiId::Hostclk,
            6 => ClkDomainApiId::Dispclk,
            7 => ClkDomainApiId::Pwrclk,
            8 => ClkDomainApiId::Utilsclk,
            9 => ClkDomainApiId::Nvdclk,
            10 => ClkDomainApiId::Pciegenclk,
            _ => return Err(ErrorCode::INVAL),
        })
    }
}

/// Which voltage of a VF point a lookup compares against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoltageType {
    /// Plan-of-record curve, before any client offset.
    Por,
    /// Curve with every voltage offset applied, as seen by the rail.
    Source,
}

/// Input of a VF lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VfInput {
    pub value: u32,
    /// Return the curve end closest to the input when nothing matches.
    pub set_default: bool,
}

impl VfInput {
    /// Marker for an input that was never filled in.
    pub const INVALID: u32 = u32::MAX;

    pub const fn new(value: u32) -> Self {
        VfInput {
            value,
            set_default: false,
        }
    }

    pub const fn with_default(value: u32) -> Self {
        VfInput {
            value,
            set_default: true,
        }
    }
}

/// Result of a VF lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VfOutput {
    /// Input side value of the matched point.
    pub input_best_match: u32,
    /// Output side value of the matched point.
    pub value: u32,
}

/// Cursor for VF lookups issued with monotonically increasing inputs.
///
/// Each lookup resumes from the point matched by the previous one. A lookup
/// carrying a cursor always searches linearly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VfIterState {
    pub clk_prog_idx: u8,
    pub vf_point_idx: u8,
}

impl VfIterState {
    pub const fn new() -> Self {
        VfIterState {
            clk_prog_idx: IDX_INVALID,
            vf_point_idx: IDX_INVALID,
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        self.clk_prog_idx != IDX_INVALID && self.vf_point_idx != IDX_INVALID
    }
}

impl Default for VfIterState {
    fn default() -> Self {
        VfIterState::new()
    }
}

/// A client frequency offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreqDelta {
    /// Fixed offset in MHz.
    Static(i16),
    /// Offset proportional to the frequency, as a 4.12 fraction (1.0 is
    /// +100%).
    Percent(Sfxp20_12),
}

impl FreqDelta {
    pub const ZERO: FreqDelta = FreqDelta::Static(0);

    pub fn is_zero(&self) -> bool {
        match *self {
            FreqDelta::Static(mhz) => mhz == 0,
            FreqDelta::Percent(pct) => pct == Sfxp20_12::ZERO,
        }
    }

    /// Offset in MHz this delta adds to `freq_mhz`.
    pub fn offset_mhz(&self, freq_mhz: u16) -> i32 {
        match *self {
            FreqDelta::Static(mhz) => mhz as i32,
            FreqDelta::Percent(pct) => pct.mul_int(freq_mhz as i64) as i32,
        }
    }

    /// Apply the delta to `freq_mhz`, saturating at the u16 range.
    pub fn apply(&self, freq_mhz: u16) -> u16 {
        (freq_mhz as i32 + self.offset_mhz(freq_mhz)).clamp(0, u16::MAX as i32) as u16
    }
}

impl Default for FreqDelta {
    fn default() -> Self {
        FreqDelta::ZERO
    }
}

/// Offsets applied on top of the whole clock tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalDeltas {
    pub freq: FreqDelta,
    pub volt_uv: [i32; CLK_VOLT_RAIL_MAX],
}

/// One domain and its frequency, as exchanged with the propagation and the
/// change sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkListItem {
    pub clk_dom_idx: u8,
    pub freq_mhz: u16,
    /// NAFLL regime requested for the domain, [`IDX_INVALID`] when the
    /// domain is not NAFLL driven or lets the firmware choose.
    pub regime_id: u8,
}

impl ClkListItem {
    pub const fn new(clk_dom_idx: u8, freq_mhz: u16) -> Self {
        ClkListItem {
            clk_dom_idx,
            freq_mhz,
            regime_id: IDX_INVALID,
        }
    }
}

/// Fixed capacity list of domain frequencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkList {
    items: [ClkListItem; CLK_DOMAIN_MAX],
    len: usize,
}

impl ClkList {
    pub const fn new() -> Self {
        ClkList {
            items: [ClkListItem::new(IDX_INVALID, 0); CLK_DOMAIN_MAX],
            len: 0,
        }
    }

    pub fn push(&mut self, item: ClkListItem) -> Result<(), ErrorCode> {
        let slot = self.items.get_mut(self.len).ok_or(ErrorCode::SIZE)?;
        *slot = item;
        self.len += 1;
        Ok(())
    }

    pub fn as_slice(&self) -> &[ClkListItem] {
        &self.items[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [ClkListItem] {
        &mut self.items[..self.len]
    }

    pub fn find(&self, clk_dom_idx: u8) -> Option<&ClkListItem> {
        self.as_slice()
            .iter()
            .find(|item| item.clk_dom_idx == clk_dom_idx)
    }

    pub fn find_mut(&mut self, clk_dom_idx: u8) -> Option<&mut ClkListItem> {
        self.as_mut_slice()
            .iter_mut()
            .find(|item| item.clk_dom_idx == clk_dom_idx)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for ClkList {
    fn default() -> Self {
        ClkList::new()
    }
}

/// Voltage of one rail in a performance state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoltListItem {
    pub rail_idx: u8,
    pub voltage_uv: u32,
}

/// Complete clock and voltage state, as handed to the change sequencer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerfState {
    pub clks: ClkList,
    pub volts: [Option<VoltListItem>; CLK_VOLT_RAIL_MAX],
}

impl PerfState {
    pub fn voltage_uv(&self, rail_idx: u8) -> Option<u32> {
        self.volts
            .iter()
            .flatten()
            .find(|item| item.rail_idx == rail_idx)
            .map(|item| item.voltage_uv)
    }
}
