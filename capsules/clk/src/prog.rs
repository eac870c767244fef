// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Clock progs, the segments of a domain's VF curve.
//!
//! A domain's progs are consecutive in the prog table and ascending in
//! `freq_max_mhz`. Prog `n` covers `(freq_max(n - 1), freq_max(n)]`, the
//! first prog of a domain starts at 0.
//!
//! Quantization rules depend on the generator behind the segment:
//!
//! - PLL: multiples of `freq_step_size_mhz` counted down from the segment
//!   maximum. A step of 0 makes the maximum the only legal frequency.
//! - One source: only the segment maximum is legal.
//! - NAFLL: NDIV granularity, delegated to the [`FreqQuantizer`] of the
//!   domain's oscillator.

use kernel::ErrorCode;

use crate::group::ObjGroup;
use crate::types::{FreqDelta, CLK_PROG_MAX, CLK_SECONDARY_MAX, CLK_VOLT_RAIL_MAX, IDX_INVALID};

pub type ClkProgs = ObjGroup<ClkProg, CLK_PROG_MAX>;

/// Frequency quantization of an oscillator that is not step based.
pub trait FreqQuantizer {
    /// Round `freq_mhz` down (`floor`) or up to a frequency the oscillator
    /// can produce.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::RANGE]\): nothing producible lies in that
    ///   direction.
    fn quantize(&self, freq_mhz: u16, floor: bool) -> Result<u16, ErrorCode>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClkProgSource {
    Pll,
    OneSource,
    Nafll,
}

impl TryFrom<u8> for ClkProgSource {
    type Error = ErrorCode;

    fn try_from(source: u8) -> Result<Self, ErrorCode> {
        match source {
            0 => Ok(ClkProgSource::Pll),
            1 => Ok(ClkProgSource::OneSource),
            2 => Ok(ClkProgSource::Nafll),
            _ => Err(ErrorCode::NOSUPPORT),
        }
    }
}

/// How a prog derives its secondaries' frequencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecondaryKind {
    /// `value` is a percentage of the primary frequency.
    Ratio,
    /// `value` is the secondary frequency in MHz for the whole segment.
    Table,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecondaryEntry {
    pub clk_dom_idx: u8,
    pub value: u16,
}

impl SecondaryEntry {
    pub const UNUSED: SecondaryEntry = SecondaryEntry {
        clk_dom_idx: IDX_INVALID,
        value: 0,
    };
}

/// Where the VF points of a prog on one rail live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VfEntry {
    pub vfe_idx: u8,
    pub vf_point_idx_first: u8,
    pub vf_point_idx_last: u8,
}

impl VfEntry {
    pub const UNUSED: VfEntry = VfEntry {
        vfe_idx: IDX_INVALID,
        vf_point_idx_first: IDX_INVALID,
        vf_point_idx_last: IDX_INVALID,
    };

    pub fn is_valid(&self) -> bool {
        self.vf_point_idx_first != IDX_INVALID
            && self.vf_point_idx_last != IDX_INVALID
            && self.vf_point_idx_first <= self.vf_point_idx_last
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgDeltas {
    pub freq: FreqDelta,
    pub volt_uv: [i32; CLK_VOLT_RAIL_MAX],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkProg {
    pub source: ClkProgSource,
    pub freq_max_mhz: u16,
    pub freq_step_size_mhz: u8,
    pub vf_entries: [VfEntry; CLK_VOLT_RAIL_MAX],
    pub secondary_kind: SecondaryKind,
    pub secondary_entries: [SecondaryEntry; CLK_SECONDARY_MAX],
    pub deltas: ProgDeltas,
}

impl ClkProg {
    pub fn vf_entry(&self, rail_idx: u8) -> Result<&VfEntry, ErrorCode> {
        self.vf_entries
            .get(rail_idx as usize)
            .ok_or(ErrorCode::INVAL)
    }

    /// Whether `freq_mhz` falls in this segment.
    pub fn covers(&self, freq_mhz: u16, prev_max_mhz: u16) -> bool {
        freq_mhz <= self.freq_max_mhz && (freq_mhz > prev_max_mhz || prev_max_mhz == 0)
    }

    /// Quantize `freq_mhz` onto this segment.
    ///
    /// Above the segment maximum, rounding down yields the maximum and
    /// rounding up fails. Within the segment the source rules apply; a
    /// floor that would land at or below `prev_max_mhz` belongs to an
    /// earlier segment and fails.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::RANGE]\): no legal frequency of this segment in
    ///   the requested direction. The caller moves on to the next segment.
    /// + [Err]\([ErrorCode::STATE]\): NAFLL segment without a quantizer.
    pub fn freq_quantize(
        &self,
        freq_mhz: u16,
        floor: bool,
        prev_max_mhz: u16,
        quantizer: Option<&dyn FreqQuantizer>,
    ) -> Result<u16, ErrorCode> {
        let max = self.freq_max_mhz;
        if freq_mhz > max {
            return if floor {
                Ok(max)
            } else {
                Err(ErrorCode::RANGE)
            };
        }

        match self.source {
            ClkProgSource::Pll if self.freq_step_size_mhz != 0 => {
                let step = self.freq_step_size_mhz as u32;
                let gap = (max - freq_mhz) as u32;
                if floor {
                    let steps = gap.div_ceil(step);
                    let quantized = max as i64 - (steps * step) as i64;
                    if quantized <= prev_max_mhz as i64 {
                        return Err(ErrorCode::RANGE);
                    }
                    Ok(quantized as u16)
                } else {
                    // Stay within the segment when asked for less than it
                    // covers.
                    let lowest = if prev_max_mhz == 0 {
                        freq_mhz
                    } else {
                        freq_mhz.max(prev_max_mhz + 1)
                    };
                    let steps = ((max - lowest) as u32) / step;
                    Ok(max - (steps * step) as u16)
                }
            }
            ClkProgSource::Pll | ClkProgSource::OneSource => {
                if !floor || freq_mhz == max {
                    Ok(max)
                } else {
                    Err(ErrorCode::RANGE)
                }
            }
            ClkProgSource::Nafll => {
                let quantizer = quantizer.ok_or(ErrorCode::STATE)?;
                if floor {
                    let quantized = quantizer.quantize(freq_mhz, true)?;
                    if quantized <= prev_max_mhz {
                        return Err(ErrorCode::RANGE);
                    }
                    Ok(quantized)
                } else {
                    let lowest = if prev_max_mhz == 0 {
                        freq_mhz
                    } else {
                        freq_mhz.max(prev_max_mhz + 1)
                    };
                    match quantizer.quantize(lowest, false) {
                        Ok(quantized) if quantized <= max => Ok(quantized),
                        Ok(_) | Err(ErrorCode::RANGE) => quantizer.quantize(max, true),
                        Err(err) => Err(err),
                    }
                }
            }
        }
    }

    /// Report every legal frequency of this segment to `visit`, from the
    /// maximum downward.
    pub fn freqs_enumerate(
        &self,
        prev_max_mhz: u16,
        quantizer: Option<&dyn FreqQuantizer>,
        visit: &mut dyn FnMut(u16) -> Result<(), ErrorCode>,
    ) -> Result<(), ErrorCode> {
        let mut freq = match self.freq_quantize(self.freq_max_mhz, true, prev_max_mhz, quantizer) {
            Ok(freq) => freq,
            Err(ErrorCode::RANGE) => return Ok(()),
            Err(err) => return Err(err),
        };
        loop {
            visit(freq)?;
            if freq == 0 {
                return Ok(());
            }
            match self.freq_quantize(freq - 1, true, prev_max_mhz, quantizer) {
                Ok(next) if next < freq => freq = next,
                Ok(_) | Err(ErrorCode::RANGE) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    /// Position of `clk_dom_idx` among this prog's secondary entries.
    pub fn secondary_entry(&self, clk_dom_idx: u8) -> Option<&SecondaryEntry> {
        self.secondary_entries
            .iter()
            .find(|entry| entry.clk_dom_idx != IDX_INVALID && entry.clk_dom_idx == clk_dom_idx)
    }

    /// Frequency of secondary `clk_dom_idx` when the primary runs at
    /// `freq_mhz` in this segment.
    pub fn primary_to_secondary(&self, freq_mhz: u16, clk_dom_idx: u8) -> Result<u16, ErrorCode> {
        let entry = self.secondary_entry(clk_dom_idx).ok_or(ErrorCode::INDEX)?;
        Ok(match self.secondary_kind {
            SecondaryKind::Ratio => {
                (freq_mhz as u32 * entry.value as u32 / 100).min(u16::MAX as u32) as u16
            }
            SecondaryKind::Table => entry.value,
        })
    }
}
