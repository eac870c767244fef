// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Host supplied description of the clock tree.
//!
//! The host driver owns the binary layout of its tables. By the time they
//! reach the clock core they have been unpacked into the records below, one
//! per object, each tagged with the object index the host chose. The clock
//! core validates the cross references when it builds its tables from them.

use crate::freq_controller::PiParams;
use crate::nafll::LutConfig;
use crate::prog::{SecondaryEntry, SecondaryKind, VfEntry};
use crate::prop_top::ClkPropRelKind;
use crate::types::{GlobalDeltas, CLK_SECONDARY_MAX, CLK_VOLT_RAIL_MAX};
use crate::vf_point::VfPointKind;

pub const CLK_DOMAIN_TYPE_FIXED: u8 = 0x01;
pub const CLK_DOMAIN_TYPE_PRIMARY: u8 = 0x02;
pub const CLK_DOMAIN_TYPE_SECONDARY: u8 = 0x03;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkDomainDesc {
    /// One of the `CLK_DOMAIN_TYPE_*` values.
    pub domain_type: u8,
    pub api_id: u8,
    pub pre_volt_ordering_idx: u8,
    pub post_volt_ordering_idx: u8,
    pub freq_delta_min_mhz: i16,
    pub freq_delta_max_mhz: i16,
    pub noise_aware: bool,
    pub rail_idx: u8,
    /// Fixed domains only.
    pub fixed_freq_mhz: u16,
    /// Primary domains only.
    pub clk_prog_idx_first: u8,
    pub clk_prog_idx_last: u8,
    pub secondary_mask: u32,
    /// Secondary domains only.
    pub primary_idx: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkProgDesc {
    /// 0 PLL, 1 one source, 2 NAFLL.
    pub source: u8,
    pub freq_max_mhz: u16,
    pub freq_step_size_mhz: u8,
    pub vf_entries: [VfEntry; CLK_VOLT_RAIL_MAX],
    pub secondary_kind: SecondaryKind,
    pub secondary_entries: [SecondaryEntry; CLK_SECONDARY_MAX],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropRelDesc {
    pub src_clk_dom_idx: u8,
    pub dst_clk_dom_idx: u8,
    pub kind: ClkPropRelKind,
    /// Also usable from destination to source.
    pub bidirectional: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropTopDesc {
    pub id: u8,
    /// Workload this topology is tuned for.
    pub workload: u8,
    /// Relationships, by index, that make up the topology.
    pub rel_mask: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropRegimeDesc {
    pub id: u8,
    pub domain_mask: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NafllDesc {
    pub id: u8,
    pub clk_dom_idx: u8,
    pub rail_idx: u8,
    pub adc_logic_idx: u8,
    /// `IDX_INVALID` when the NAFLL has no SRAM ADC.
    pub adc_sram_idx: u8,
    pub ref_clk_mhz: u16,
    pub ref_clk_div: u16,
    pub lut: LutConfig,
    pub dvco_min_vfe_idx: u8,
    pub default_regime: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdcDesc {
    pub id: u8,
    pub rail_idx: u8,
    pub vmin_uv: u32,
    pub step_uv: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreqCtrlDesc {
    pub clk_dom_idx: u8,
    pub rail_idx: u8,
    /// Clock counter sampled for the measured frequency.
    pub cntr_id: u8,
    pub params: PiParams,
}

/// Everything the clock core is constructed from.
#[derive(Clone, Copy, Debug)]
pub struct ClkDescriptor<'d> {
    pub domains: &'d [(u8, ClkDomainDesc)],
    pub progs: &'d [(u8, ClkProgDesc)],
    pub vf_points: &'d [(u8, VfPointKind)],
    pub prop_rels: &'d [(u8, PropRelDesc)],
    pub prop_tops: &'d [(u8, PropTopDesc)],
    pub prop_regimes: &'d [(u8, PropRegimeDesc)],
    pub nafll_devs: &'d [(u8, NafllDesc)],
    pub adc_devs: &'d [(u8, AdcDesc)],
    pub freq_ctrls: &'d [(u8, FreqCtrlDesc)],
    pub deltas: GlobalDeltas,
    pub ovoc_enabled: bool,
    /// Mailbox register used for status reporting.
    pub mailbox_idx: u8,
}
