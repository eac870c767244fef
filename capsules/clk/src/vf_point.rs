// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! VF points, the cached samples of a primary domain's VF curve.
//!
//! Every point belongs to exactly one prog and one voltage rail. It caches
//! two pairs:
//!
//! - the base pair, evaluated straight from VFE (the plan-of-record curve),
//! - the offset pair, with the VF point, domain, global and prog deltas
//!   applied.
//!
//! Each pair carries a frequency tuple: index 0 is the primary frequency,
//! the following entries are the frequencies of the primary's secondaries
//! at that point.
//!
//! The cache is rebuilt wholesale by the owning primary domain. Within one
//! prog the points are non-decreasing in frequency and voltage, which is
//! what lets the lookups below binary search a prog.

use kernel::hil::vfe::{Vfe, VfeVar};
use kernel::ErrorCode;

use crate::group::ObjGroup;
use crate::types::{FreqDelta, VfOutput, VoltageType, CLK_FREQ_TUPLE_MAX, CLK_VF_POINT_MAX};

pub type VfPoints = ObjGroup<VfPoint, CLK_VF_POINT_MAX>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VfPointKind {
    /// Frequency is fixed, VFE gives the voltage needed for it.
    Freq { freq_mhz: u16 },
    /// Voltage is fixed, VFE gives the frequency reachable at it.
    Volt { source_voltage_uv: u32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VfPair {
    pub freq_mhz: [u16; CLK_FREQ_TUPLE_MAX],
    pub voltage_uv: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VfPointDeltas {
    pub freq: FreqDelta,
    pub volt_uv: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VfPoint {
    pub kind: VfPointKind,
    pub deltas: VfPointDeltas,
    base: VfPair,
    offset: VfPair,
}

impl VfPoint {
    pub fn new(kind: VfPointKind) -> Self {
        VfPoint {
            kind,
            deltas: VfPointDeltas::default(),
            base: VfPair::default(),
            offset: VfPair::default(),
        }
    }

    pub fn base(&self) -> &VfPair {
        &self.base
    }

    pub fn offset(&self) -> &VfPair {
        &self.offset
    }

    pub fn pair(&self, voltage_type: VoltageType) -> &VfPair {
        match voltage_type {
            VoltageType::Por => &self.base,
            VoltageType::Source => &self.offset,
        }
    }

    /// Evaluate both pairs of this point for the primary frequency.
    ///
    /// `quantize` floors a frequency evaluated for a voltage point onto the
    /// owning prog. `freq_deltas` are applied after the point's own delta,
    /// in order, to give the offset frequency, which is quantized again when
    /// any delta moved it. `volt_delta_uv` is the prog and global voltage
    /// offset of the point's rail. `prev` is the previous point of the same
    /// rail and curve, whose pairs bound this one from below.
    pub(crate) fn cache(
        &mut self,
        vfe: &dyn Vfe,
        vfe_idx: u8,
        quantize: &dyn Fn(u16) -> Result<u16, ErrorCode>,
        freq_deltas: &[FreqDelta],
        volt_delta_uv: i32,
        prev: Option<&VfPoint>,
    ) -> Result<(), ErrorCode> {
        let (freq_mhz, voltage_uv) = match self.kind {
            VfPointKind::Freq { freq_mhz } => {
                let voltage_uv = vfe.evaluate(vfe_idx, VfeVar::FreqMhz(freq_mhz as u32))?;
                (freq_mhz, voltage_uv)
            }
            VfPointKind::Volt { source_voltage_uv } => {
                let freq = vfe.evaluate(vfe_idx, VfeVar::VoltUv(source_voltage_uv))?;
                let freq_mhz = quantize(freq.min(u16::MAX as u32) as u16)?;
                (freq_mhz, source_voltage_uv)
            }
        };

        let mut base = VfPair::default();
        base.freq_mhz[0] = freq_mhz;
        base.voltage_uv = voltage_uv;

        let mut offset = VfPair::default();
        let offset_freq = freq_deltas
            .iter()
            .fold(self.deltas.freq.apply(freq_mhz), |freq, delta| delta.apply(freq));
        offset.freq_mhz[0] = if offset_freq == freq_mhz {
            offset_freq
        } else {
            quantize(offset_freq)?
        };
        let delta_uv = self.deltas.volt_uv.saturating_add(volt_delta_uv);
        offset.voltage_uv = voltage_uv.saturating_add_signed(delta_uv);

        if let Some(prev) = prev {
            base.freq_mhz[0] = base.freq_mhz[0].max(prev.base.freq_mhz[0]);
            base.voltage_uv = base.voltage_uv.max(prev.base.voltage_uv);
            offset.freq_mhz[0] = offset.freq_mhz[0].max(prev.offset.freq_mhz[0]);
            offset.voltage_uv = offset.voltage_uv.max(prev.offset.voltage_uv);
        }

        self.base = base;
        self.offset = offset;
        Ok(())
    }

    /// Fill tuple entry `pos` from the primary frequencies with `derive`.
    pub(crate) fn cache_secondary(
        &mut self,
        pos: usize,
        derive: &dyn Fn(u16) -> Result<u16, ErrorCode>,
    ) -> Result<(), ErrorCode> {
        if pos == 0 || pos >= CLK_FREQ_TUPLE_MAX {
            return Err(ErrorCode::INDEX);
        }
        self.base.freq_mhz[pos] = derive(self.base.freq_mhz[0])?;
        self.offset.freq_mhz[pos] = derive(self.offset.freq_mhz[0])?;
        Ok(())
    }
}

/// Best match of a curve walk, with where it was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct VfMatch {
    pub out: VfOutput,
    pub clk_prog_idx: u8,
    pub vf_point_idx: u8,
}

/// The VF points of one prog on one rail, as seen by a lookup.
pub(crate) struct VfSegment<'a> {
    pub points: &'a VfPoints,
    pub clk_prog_idx: u8,
    pub first: u8,
    pub last: u8,
    pub voltage_type: VoltageType,
    /// Frequency tuple entry compared and returned.
    pub tuple_pos: usize,
}

impl VfSegment<'_> {
    fn pair(&self, idx: u8) -> Result<&VfPair, ErrorCode> {
        Ok(self.points.get(idx)?.pair(self.voltage_type))
    }

    fn freq(&self, idx: u8) -> Result<u32, ErrorCode> {
        let pair = self.pair(idx)?;
        pair.freq_mhz
            .get(self.tuple_pos)
            .map(|freq| *freq as u32)
            .ok_or(ErrorCode::INDEX)
    }

    pub(crate) fn volt_match(&self, idx: u8) -> Result<VfMatch, ErrorCode> {
        Ok(VfMatch {
            out: VfOutput {
                input_best_match: self.pair(idx)?.voltage_uv,
                value: self.freq(idx)?,
            },
            clk_prog_idx: self.clk_prog_idx,
            vf_point_idx: idx,
        })
    }

    pub(crate) fn freq_match(&self, idx: u8) -> Result<VfMatch, ErrorCode> {
        Ok(VfMatch {
            out: VfOutput {
                input_best_match: self.freq(idx)?,
                value: self.pair(idx)?.voltage_uv,
            },
            clk_prog_idx: self.clk_prog_idx,
            vf_point_idx: idx,
        })
    }

    /// Walk the segment from `start` for the highest point whose voltage is
    /// at most `voltage_uv`, updating `best`.
    ///
    /// Returns [ErrorCode::ITEREND] once a point above the input was seen,
    /// so the walk over the following segments can stop.
    pub(crate) fn volt_to_freq(
        &self,
        start: u8,
        voltage_uv: u32,
        binary: bool,
        best: &mut Option<VfMatch>,
    ) -> Result<(), ErrorCode> {
        if binary {
            return self.volt_to_freq_binary(voltage_uv, best);
        }
        for idx in start..=self.last {
            if self.pair(idx)?.voltage_uv > voltage_uv {
                return Err(ErrorCode::ITEREND);
            }
            *best = Some(self.volt_match(idx)?);
        }
        Ok(())
    }

    fn volt_to_freq_binary(
        &self,
        voltage_uv: u32,
        best: &mut Option<VfMatch>,
    ) -> Result<(), ErrorCode> {
        if self.pair(self.first)?.voltage_uv > voltage_uv {
            return Err(ErrorCode::ITEREND);
        }
        if self.pair(self.last)?.voltage_uv <= voltage_uv {
            *best = Some(self.volt_match(self.last)?);
            return Ok(());
        }
        // volt(lo) <= input < volt(hi)
        let (mut lo, mut hi) = (self.first, self.last);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.pair(mid)?.voltage_uv <= voltage_uv {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        *best = Some(self.volt_match(lo)?);
        Err(ErrorCode::ITEREND)
    }

    /// Walk the segment from `start` for the lowest point whose frequency is
    /// at least `freq_mhz`.
    ///
    /// Returns [ErrorCode::ITEREND] with `best` set once found.
    pub(crate) fn freq_to_volt(
        &self,
        start: u8,
        freq_mhz: u32,
        binary: bool,
        best: &mut Option<VfMatch>,
    ) -> Result<(), ErrorCode> {
        if binary {
            return self.freq_to_volt_binary(freq_mhz, best);
        }
        for idx in start..=self.last {
            if self.freq(idx)? >= freq_mhz {
                *best = Some(self.freq_match(idx)?);
                return Err(ErrorCode::ITEREND);
            }
        }
        Ok(())
    }

    fn freq_to_volt_binary(
        &self,
        freq_mhz: u32,
        best: &mut Option<VfMatch>,
    ) -> Result<(), ErrorCode> {
        if self.freq(self.last)? < freq_mhz {
            return Ok(());
        }
        if self.freq(self.first)? >= freq_mhz {
            *best = Some(self.freq_match(self.first)?);
            return Err(ErrorCode::ITEREND);
        }
        // freq(lo) < input <= freq(hi)
        let (mut lo, mut hi) = (self.first, self.last);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.freq(mid)? < freq_mhz {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        *best = Some(self.freq_match(hi)?);
        Err(ErrorCode::ITEREND)
    }
}
