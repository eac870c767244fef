// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Clock domains and the VF curve operations on them.
//!
//! A domain is one of:
//!
//! - fixed: runs at one frequency and has no curve,
//! - primary: owns a range of progs, and through them the VF points of its
//!   curve,
//! - secondary: follows one primary; its frequency at each point of the
//!   primary's curve comes from the primary's progs.
//!
//! [`ClkDomains`] owns the domain, prog and VF point tables and the NAFLL
//! devices. Between two cache rebuilds those tables are only read.

use kernel::hil::nafll::NafllLut;
use kernel::hil::vfe::Vfe;
use kernel::{debug, trap, ErrorCode};

use crate::config::CONFIG;
use crate::desc::{
    ClkDescriptor, ClkDomainDesc, ClkProgDesc, CLK_DOMAIN_TYPE_FIXED, CLK_DOMAIN_TYPE_PRIMARY,
    CLK_DOMAIN_TYPE_SECONDARY,
};
use crate::group::ObjGroup;
use crate::nafll::{NafllDevice, NafllDevices, NafllRegime};
use crate::prog::{ClkProg, ClkProgSource, ClkProgs, ProgDeltas, SecondaryKind};
use crate::types::{
    ClkDomainApiId, FreqDelta, GlobalDeltas, VfInput, VfIterState, VfOutput, VoltageType,
    CLK_DOMAIN_MAX, CLK_NAFLL_MAX, CLK_SECONDARY_MAX, CLK_VOLT_RAIL_MAX, IDX_INVALID,
};
use crate::vf_point::{VfMatch, VfPoint, VfPointDeltas, VfPoints, VfSegment};

/// Bits set in a domain mask, lowest first.
pub(crate) fn mask_bits(mask: u32) -> impl Iterator<Item = u8> {
    (0..CLK_DOMAIN_MAX as u8).filter(move |bit| mask & (1 << bit) != 0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgRange {
    pub first: u8,
    pub last: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimaryRole {
    pub progs: ProgRange,
    /// Secondary domains following this primary.
    pub secondary_mask: u32,
}

impl PrimaryRole {
    /// Frequency tuple entry holding secondary `clk_dom_idx`.
    pub fn tuple_pos(&self, clk_dom_idx: u8) -> Result<usize, ErrorCode> {
        if clk_dom_idx as usize >= CLK_DOMAIN_MAX || self.secondary_mask & (1 << clk_dom_idx) == 0
        {
            return Err(ErrorCode::INDEX);
        }
        let below = self.secondary_mask & ((1 << clk_dom_idx) - 1);
        Ok(1 + below.count_ones() as usize)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecondaryRole {
    pub primary_idx: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClkDomainRole {
    Fixed { freq_mhz: u16 },
    Primary(PrimaryRole),
    Secondary(SecondaryRole),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkDomain {
    pub api_id: ClkDomainApiId,
    /// Slot of the domain in the pre-volt clock step.
    pub pre_volt_ordering_idx: u8,
    /// Slot of the domain in the post-volt clock step.
    pub post_volt_ordering_idx: u8,
    pub freq_delta_min_mhz: i16,
    pub freq_delta_max_mhz: i16,
    /// Driven by a NAFLL that can follow its rail voltage.
    pub noise_aware: bool,
    pub rail_idx: u8,
    pub freq_delta: FreqDelta,
    pub role: ClkDomainRole,
}

impl ClkDomain {
    pub fn from_desc(desc: &ClkDomainDesc) -> Result<Self, ErrorCode> {
        let role = match desc.domain_type {
            CLK_DOMAIN_TYPE_FIXED => ClkDomainRole::Fixed {
                freq_mhz: desc.fixed_freq_mhz,
            },
            CLK_DOMAIN_TYPE_PRIMARY => ClkDomainRole::Primary(PrimaryRole {
                progs: ProgRange {
                    first: desc.clk_prog_idx_first,
                    last: desc.clk_prog_idx_last,
                },
                secondary_mask: desc.secondary_mask,
            }),
            CLK_DOMAIN_TYPE_SECONDARY => ClkDomainRole::Secondary(SecondaryRole {
                primary_idx: desc.primary_idx,
            }),
            _ => return Err(trap!(ErrorCode::NOSUPPORT)),
        };
        Ok(ClkDomain {
            api_id: ClkDomainApiId::try_from(desc.api_id)?,
            pre_volt_ordering_idx: desc.pre_volt_ordering_idx,
            post_volt_ordering_idx: desc.post_volt_ordering_idx,
            freq_delta_min_mhz: desc.freq_delta_min_mhz,
            freq_delta_max_mhz: desc.freq_delta_max_mhz,
            noise_aware: desc.noise_aware,
            rail_idx: desc.rail_idx,
            freq_delta: FreqDelta::ZERO,
            role,
        })
    }
}

impl ClkProg {
    pub fn from_desc(desc: &ClkProgDesc) -> Result<Self, ErrorCode> {
        Ok(ClkProg {
            source: ClkProgSource::try_from(desc.source).map_err(|err| trap!(err))?,
            freq_max_mhz: desc.freq_max_mhz,
            freq_step_size_mhz: desc.freq_step_size_mhz,
            vf_entries: desc.vf_entries,
            secondary_kind: desc.secondary_kind,
            secondary_entries: desc.secondary_entries,
            deltas: ProgDeltas::default(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lookup {
    VoltToFreq,
    FreqToVolt,
}

pub struct ClkDomains {
    domains: ObjGroup<ClkDomain, CLK_DOMAIN_MAX>,
    progs: ClkProgs,
    vf_points: VfPoints,
    nafll: NafllDevices,
    deltas: GlobalDeltas,
    ovoc_enabled: bool,
    cache_dirty: bool,
}

impl ClkDomains {
    /// Build and cross check the domain, prog, VF point and NAFLL tables.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::NOMEM]\): an object index beyond its table.
    /// + [Err]\([ErrorCode::INDEX]\): a reused index or a dangling prog or VF
    ///   point reference.
    /// + [Err]\([ErrorCode::STATE]\): broken primary / secondary links, or
    ///   progs of a domain not ascending.
    /// + [Err]\([ErrorCode::NOSUPPORT]\): unknown domain type or prog source.
    pub fn from_desc(desc: &ClkDescriptor) -> Result<Self, ErrorCode> {
        let mut domains = ClkDomains {
            domains: ObjGroup::new(),
            progs: ClkProgs::new(),
            vf_points: VfPoints::new(),
            nafll: NafllDevices::new(),
            deltas: desc.deltas,
            ovoc_enabled: desc.ovoc_enabled,
            cache_dirty: true,
        };
        for (idx, dom) in desc.domains {
            domains
                .domains
                .insert(*idx, ClkDomain::from_desc(dom)?)
                .map_err(|err| trap!(err))?;
        }
        for (idx, prog) in desc.progs {
            domains
                .progs
                .insert(*idx, ClkProg::from_desc(prog)?)
                .map_err(|err| trap!(err))?;
        }
        for (idx, kind) in desc.vf_points {
            domains
                .vf_points
                .insert(*idx, VfPoint::new(*kind))
                .map_err(|err| trap!(err))?;
        }
        for (idx, dev) in desc.nafll_devs {
            let sram = if dev.adc_sram_idx == IDX_INVALID {
                None
            } else {
                Some(dev.adc_sram_idx)
            };
            let regime = NafllRegime::try_from(dev.default_regime).map_err(|err| trap!(err))?;
            let nafll = NafllDevice::new(
                dev.id,
                dev.clk_dom_idx,
                dev.rail_idx,
                dev.adc_logic_idx,
                sram,
                dev.ref_clk_mhz,
                dev.ref_clk_div,
                dev.lut,
                dev.dvco_min_vfe_idx,
                regime,
            )
            .map_err(|err| trap!(err))?;
            domains.nafll.insert(*idx, nafll).map_err(|err| trap!(err))?;
        }
        domains.validate()?;
        Ok(domains)
    }

    fn validate(&self) -> Result<(), ErrorCode> {
        for (idx, dom) in self.domains.iter() {
            if dom.rail_idx as usize >= CLK_VOLT_RAIL_MAX
                || dom.freq_delta_min_mhz > dom.freq_delta_max_mhz
            {
                return Err(trap!(ErrorCode::INVAL));
            }
            match dom.role {
                ClkDomainRole::Fixed { .. } => {}
                ClkDomainRole::Primary(role) => self.validate_primary(idx, &role)?,
                ClkDomainRole::Secondary(role) => match self.domains.get(role.primary_idx) {
                    Ok(ClkDomain {
                        role: ClkDomainRole::Primary(primary),
                        ..
                    }) if primary.secondary_mask & (1 << idx) != 0 => {}
                    _ => return Err(trap!(ErrorCode::STATE)),
                },
            }
        }
        for (_, dev) in self.nafll.iter() {
            if !self.domains.contains(dev.clk_dom_idx) {
                return Err(trap!(ErrorCode::STATE));
            }
        }
        Ok(())
    }

    fn validate_primary(&self, idx: u8, role: &PrimaryRole) -> Result<(), ErrorCode> {
        if role.secondary_mask.count_ones() as usize > CLK_SECONDARY_MAX
            || role.progs.first > role.progs.last
        {
            return Err(trap!(ErrorCode::STATE));
        }
        for sec in mask_bits(role.secondary_mask) {
            match self.domains.get(sec) {
                Ok(ClkDomain {
                    role: ClkDomainRole::Secondary(secondary),
                    ..
                }) if secondary.primary_idx == idx => {}
                _ => return Err(trap!(ErrorCode::STATE)),
            }
        }

        let mut prev_max: Option<u16> = None;
        for prog_idx in role.progs.first..=role.progs.last {
            let prog = self.progs.get(prog_idx).map_err(|err| trap!(err))?;
            if prev_max.is_some_and(|prev| prog.freq_max_mhz <= prev) {
                return Err(trap!(ErrorCode::STATE));
            }
            prev_max = Some(prog.freq_max_mhz);

            if prog.source == ClkProgSource::Nafll && self.nafll.for_domain(idx).is_none() {
                return Err(trap!(ErrorCode::STATE));
            }
            for entry in prog.vf_entries.iter().filter(|entry| entry.is_valid()) {
                for point in entry.vf_point_idx_first..=entry.vf_point_idx_last {
                    if !self.vf_points.contains(point) {
                        return Err(trap!(ErrorCode::INDEX));
                    }
                }
            }
            if mask_bits(role.secondary_mask).any(|sec| prog.secondary_entry(sec).is_none()) {
                return Err(trap!(ErrorCode::STATE));
            }
        }
        Ok(())
    }

    pub fn domain(&self, clk_dom_idx: u8) -> Result<&ClkDomain, ErrorCode> {
        self.domains.get(clk_dom_idx).map_err(|err| trap!(err))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &ClkDomain)> + '_ {
        self.domains.iter()
    }

    /// Index of the domain the host knows as `api_id`.
    pub fn find_by_api_id(&self, api_id: ClkDomainApiId) -> Option<u8> {
        self.domains
            .iter()
            .find(|(_, dom)| dom.api_id == api_id)
            .map(|(idx, _)| idx)
    }

    pub fn prog(&self, clk_prog_idx: u8) -> Result<&ClkProg, ErrorCode> {
        self.progs.get(clk_prog_idx)
    }

    pub fn vf_point(&self, vf_point_idx: u8) -> Result<&VfPoint, ErrorCode> {
        self.vf_points.get(vf_point_idx)
    }

    pub fn nafll(&self) -> &NafllDevices {
        &self.nafll
    }

    pub(crate) fn nafll_mut(&mut self) -> &mut NafllDevices {
        &mut self.nafll
    }

    pub fn deltas(&self) -> &GlobalDeltas {
        &self.deltas
    }

    pub fn is_cache_dirty(&self) -> bool {
        self.cache_dirty
    }

    /// Primary whose curve `clk_dom_idx` reads, and the frequency tuple
    /// entry it reads.
    fn curve_of(&self, clk_dom_idx: u8) -> Result<(u8, PrimaryRole, usize), ErrorCode> {
        match self.domain(clk_dom_idx)?.role {
            ClkDomainRole::Primary(role) => Ok((clk_dom_idx, role, 0)),
            ClkDomainRole::Secondary(secondary) => {
                match self.domain(secondary.primary_idx)?.role {
                    ClkDomainRole::Primary(role) => Ok((
                        secondary.primary_idx,
                        role,
                        role.tuple_pos(clk_dom_idx).map_err(|err| trap!(err))?,
                    )),
                    _ => Err(trap!(ErrorCode::STATE)),
                }
            }
            ClkDomainRole::Fixed { .. } => Err(ErrorCode::NOSUPPORT),
        }
    }

    fn prev_max_mhz(&self, progs: ProgRange, clk_prog_idx: u8) -> Result<u16, ErrorCode> {
        if clk_prog_idx <= progs.first {
            return Ok(0);
        }
        Ok(self
            .progs
            .get(clk_prog_idx - 1)
            .map_err(|err| trap!(err))?
            .freq_max_mhz)
    }

    fn segment(
        &self,
        clk_prog_idx: u8,
        rail_idx: u8,
        voltage_type: VoltageType,
        tuple_pos: usize,
    ) -> Result<Option<VfSegment<'_>>, ErrorCode> {
        let prog = self.progs.get(clk_prog_idx).map_err(|err| trap!(err))?;
        let entry = prog.vf_entry(rail_idx)?;
        if !entry.is_valid() {
            return Ok(None);
        }
        Ok(Some(VfSegment {
            points: &self.vf_points,
            clk_prog_idx,
            first: entry.vf_point_idx_first,
            last: entry.vf_point_idx_last,
            voltage_type,
            tuple_pos,
        }))
    }

    /// Highest frequency on `clk_dom_idx`'s curve reachable at
    /// `input.value` uV on rail `rail_idx`.
    ///
    /// `Ok(None)` means the whole curve lies above the input, unless
    /// `input.set_default` asked for the lowest point instead. With a
    /// `cursor`, the lookup resumes from the point the previous lookup
    /// matched; inputs must then be non-decreasing between calls.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INVAL]\): `input` was never filled in, or the
    ///   rail does not exist.
    /// + [Err]\([ErrorCode::NOSUPPORT]\): fixed domains have no curve.
    pub fn volt_to_freq(
        &self,
        clk_dom_idx: u8,
        rail_idx: u8,
        voltage_type: VoltageType,
        input: VfInput,
        cursor: Option<&mut VfIterState>,
    ) -> Result<Option<VfOutput>, ErrorCode> {
        self.lookup(
            Lookup::VoltToFreq,
            clk_dom_idx,
            rail_idx,
            voltage_type,
            input,
            cursor,
        )
    }

    /// Lowest voltage on rail `rail_idx` supporting `input.value` MHz on
    /// `clk_dom_idx`.
    ///
    /// `Ok(None)` means the curve never reaches the input, unless
    /// `input.set_default` asked for the highest point instead. Errors are
    /// those of [`ClkDomains::volt_to_freq`].
    pub fn freq_to_volt(
        &self,
        clk_dom_idx: u8,
        rail_idx: u8,
        voltage_type: VoltageType,
        input: VfInput,
        cursor: Option<&mut VfIterState>,
    ) -> Result<Option<VfOutput>, ErrorCode> {
        self.lookup(
            Lookup::FreqToVolt,
            clk_dom_idx,
            rail_idx,
            voltage_type,
            input,
            cursor,
        )
    }

    fn lookup(
        &self,
        dir: Lookup,
        clk_dom_idx: u8,
        rail_idx: u8,
        voltage_type: VoltageType,
        input: VfInput,
        cursor: Option<&mut VfIterState>,
    ) -> Result<Option<VfOutput>, ErrorCode> {
        if input.value == VfInput::INVALID || rail_idx as usize >= CLK_VOLT_RAIL_MAX {
            return Err(trap!(ErrorCode::INVAL));
        }
        let (_, role, tuple_pos) = self.curve_of(clk_dom_idx)?;

        // A cursor cannot be resumed by a binary search.
        let binary = CONFIG.vf_lookup_binary_search && cursor.is_none();
        let resume = cursor.as_deref().filter(|cursor| cursor.is_started()).copied();
        let first_prog = resume.map_or(role.progs.first, |cursor| {
            cursor.clk_prog_idx.max(role.progs.first)
        });

        let mut best: Option<VfMatch> = None;
        for prog_idx in first_prog..=role.progs.last {
            let Some(seg) = self.segment(prog_idx, rail_idx, voltage_type, tuple_pos)? else {
                continue;
            };
            let start = match resume {
                Some(cursor) if cursor.clk_prog_idx == prog_idx => {
                    cursor.vf_point_idx.clamp(seg.first, seg.last)
                }
                _ => seg.first,
            };
            let walk = match dir {
                Lookup::VoltToFreq => seg.volt_to_freq(start, input.value, binary, &mut best),
                Lookup::FreqToVolt => seg.freq_to_volt(start, input.value, binary, &mut best),
            };
            match walk {
                Ok(()) => {}
                Err(ErrorCode::ITEREND) => break,
                Err(err) => return Err(trap!(err)),
            }
        }

        if best.is_none() && input.set_default {
            best = self.curve_end(dir, &role, rail_idx, voltage_type, tuple_pos)?;
        }
        if let (Some(cursor), Some(found)) = (cursor, best) {
            cursor.clk_prog_idx = found.clk_prog_idx;
            cursor.vf_point_idx = found.vf_point_idx;
        }
        Ok(best.map(|found| found.out))
    }

    /// Curve end closest to an input that matched nothing: the lowest point
    /// for a voltage below the curve, the highest for a frequency above it.
    fn curve_end(
        &self,
        dir: Lookup,
        role: &PrimaryRole,
        rail_idx: u8,
        voltage_type: VoltageType,
        tuple_pos: usize,
    ) -> Result<Option<VfMatch>, ErrorCode> {
        match dir {
            Lookup::VoltToFreq => {
                for prog_idx in role.progs.first..=role.progs.last {
                    if let Some(seg) = self.segment(prog_idx, rail_idx, voltage_type, tuple_pos)? {
                        return seg.volt_match(seg.first).map(Some);
                    }
                }
            }
            Lookup::FreqToVolt => {
                for prog_idx in (role.progs.first..=role.progs.last).rev() {
                    if let Some(seg) = self.segment(prog_idx, rail_idx, voltage_type, tuple_pos)? {
                        return seg.freq_match(seg.last).map(Some);
                    }
                }
            }
        }
        Ok(None)
    }

    /// Quantize `freq_mhz` to a frequency `clk_dom_idx` can run at, rounding
    /// down (`floor`) or up. `Ok(None)` when nothing lies in that direction.
    pub fn freq_quantize(
        &self,
        clk_dom_idx: u8,
        freq_mhz: u16,
        floor: bool,
    ) -> Result<Option<u16>, ErrorCode> {
        match self.quantize(clk_dom_idx, freq_mhz, floor) {
            Ok(freq) => Ok(Some(freq)),
            Err(err) if err.is_search_exhausted() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// [`ClkDomains::freq_quantize`], reporting an empty result as
    /// [ErrorCode::RANGE].
    pub(crate) fn quantize(
        &self,
        clk_dom_idx: u8,
        freq_mhz: u16,
        floor: bool,
    ) -> Result<u16, ErrorCode> {
        match self.domain(clk_dom_idx)?.role {
            ClkDomainRole::Fixed { freq_mhz: fixed } => {
                if (floor && freq_mhz >= fixed) || (!floor && freq_mhz <= fixed) {
                    Ok(fixed)
                } else {
                    Err(ErrorCode::RANGE)
                }
            }
            ClkDomainRole::Primary(role) => {
                self.primary_quantize(clk_dom_idx, &role, freq_mhz, floor)
            }
            ClkDomainRole::Secondary(_) => self.secondary_quantize(clk_dom_idx, freq_mhz, floor),
        }
    }

    /// Floor searches the progs from the top, ceiling from the bottom; the
    /// first prog with a legal frequency in that direction wins.
    fn primary_quantize(
        &self,
        clk_dom_idx: u8,
        role: &PrimaryRole,
        freq_mhz: u16,
        floor: bool,
    ) -> Result<u16, ErrorCode> {
        let quantizer = self.nafll.quantizer(clk_dom_idx);
        let try_prog = |prog_idx: u8| -> Result<Option<u16>, ErrorCode> {
            let prev_max = self.prev_max_mhz(role.progs, prog_idx)?;
            let prog = self.progs.get(prog_idx).map_err(|err| trap!(err))?;
            match prog.freq_quantize(freq_mhz, floor, prev_max, quantizer) {
                Ok(freq) => Ok(Some(freq)),
                Err(ErrorCode::RANGE) => Ok(None),
                Err(err) => Err(trap!(err)),
            }
        };
        if floor {
            for prog_idx in (role.progs.first..=role.progs.last).rev() {
                if let Some(freq) = try_prog(prog_idx)? {
                    return Ok(freq);
                }
            }
        } else {
            for prog_idx in role.progs.first..=role.progs.last {
                if let Some(freq) = try_prog(prog_idx)? {
                    return Ok(freq);
                }
            }
        }
        Err(ErrorCode::RANGE)
    }

    fn secondary_quantize(
        &self,
        clk_dom_idx: u8,
        freq_mhz: u16,
        floor: bool,
    ) -> Result<u16, ErrorCode> {
        let mut best: Option<u16> = None;
        self.for_each_freq(clk_dom_idx, &mut |freq| {
            let in_direction = if floor {
                freq <= freq_mhz
            } else {
                freq >= freq_mhz
            };
            let closer = match best {
                None => true,
                Some(best) if floor => freq > best,
                Some(best) => freq < best,
            };
            if in_direction && closer {
                best = Some(freq);
            }
            Ok(())
        })?;
        best.ok_or(ErrorCode::RANGE)
    }

    /// Report every frequency `clk_dom_idx` can run at, highest first.
    fn for_each_freq(
        &self,
        clk_dom_idx: u8,
        visit: &mut dyn FnMut(u16) -> Result<(), ErrorCode>,
    ) -> Result<(), ErrorCode> {
        let (primary_idx, role, tuple_pos) = match self.domain(clk_dom_idx)?.role {
            ClkDomainRole::Fixed { freq_mhz } => return visit(freq_mhz),
            _ => self.curve_of(clk_dom_idx)?,
        };
        let quantizer = self.nafll.quantizer(primary_idx);
        let mut last: Option<u16> = None;
        for prog_idx in (role.progs.first..=role.progs.last).rev() {
            let prev_max = self.prev_max_mhz(role.progs, prog_idx)?;
            let prog = self.progs.get(prog_idx).map_err(|err| trap!(err))?;
            if tuple_pos == 0 {
                prog.freqs_enumerate(prev_max, quantizer, visit)?;
                continue;
            }
            // Table secondaries repeat one frequency over a whole prog.
            prog.freqs_enumerate(prev_max, quantizer, &mut |freq| {
                let secondary = prog.primary_to_secondary(freq, clk_dom_idx)?;
                if last == Some(secondary) {
                    return Ok(());
                }
                last = Some(secondary);
                visit(secondary)
            })?;
        }
        Ok(())
    }

    /// Write every frequency `clk_dom_idx` can run at into `out`, highest
    /// first, and return how many were written.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::SIZE]\): `out` cannot hold all of them.
    pub fn freqs_enumerate(&self, clk_dom_idx: u8, out: &mut [u16]) -> Result<usize, ErrorCode> {
        let mut count = 0;
        self.for_each_freq(clk_dom_idx, &mut |freq| {
            let slot = out.get_mut(count).ok_or(ErrorCode::SIZE)?;
            *slot = freq;
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }

    /// Prog of `role` whose segment contains `freq_mhz`.
    fn covering_prog(&self, role: &PrimaryRole, freq_mhz: u16) -> Result<Option<&ClkProg>, ErrorCode> {
        for prog_idx in role.progs.first..=role.progs.last {
            let prev_max = self.prev_max_mhz(role.progs, prog_idx)?;
            let prog = self.progs.get(prog_idx).map_err(|err| trap!(err))?;
            if prog.covers(freq_mhz, prev_max) {
                return Ok(Some(prog));
            }
        }
        Ok(None)
    }

    /// Base frequency of the highest VF point on any rail.
    fn vf_freq_max(&self, role: &PrimaryRole) -> Result<Option<u16>, ErrorCode> {
        let mut max: Option<u16> = None;
        for rail_idx in 0..CLK_VOLT_RAIL_MAX as u8 {
            for prog_idx in (role.progs.first..=role.progs.last).rev() {
                if let Some(seg) = self.segment(prog_idx, rail_idx, VoltageType::Por, 0)? {
                    let freq = self.vf_points.get(seg.last)?.base().freq_mhz[0];
                    max = Some(max.map_or(freq, |max| max.max(freq)));
                    break;
                }
            }
        }
        Ok(max)
    }

    /// Apply the client offsets to `freq_mhz` for `clk_dom_idx`.
    ///
    /// The offsets compose in a fixed order: the OVOC clamp to the top of
    /// the VF curve, the domain delta, the global delta and the delta of the
    /// prog the frequency then falls in. When any delta is set the result
    /// is floor quantized, or ceiling quantized if nothing lies below.
    pub fn client_freq_delta_adjust(
        &self,
        clk_dom_idx: u8,
        freq_mhz: u16,
    ) -> Result<u16, ErrorCode> {
        let domain = self.domain(clk_dom_idx)?;
        let primary = match domain.role {
            ClkDomainRole::Fixed { .. } => return Ok(freq_mhz),
            ClkDomainRole::Primary(role) => Some(role),
            ClkDomainRole::Secondary(_) => None,
        };

        let mut freq = freq_mhz;
        if let Some(role) = primary.as_ref() {
            if CONFIG.ovoc && self.ovoc_enabled {
                if let Some(max) = self.vf_freq_max(role)? {
                    freq = freq.min(max);
                }
            }
        }

        let mut offset = !domain.freq_delta.is_zero() || !self.deltas.freq.is_zero();
        freq = domain.freq_delta.apply(freq);
        freq = self.deltas.freq.apply(freq);
        if let Some(role) = primary.as_ref() {
            if let Some(prog) = self.covering_prog(role, freq)? {
                offset |= !prog.deltas.freq.is_zero();
                freq = prog.deltas.freq.apply(freq);
            }
        }
        if !offset {
            return Ok(freq);
        }
        self.quantize_nearest(clk_dom_idx, freq)
    }

    /// Floor quantize `freq_mhz`, or ceiling quantize when nothing lies
    /// below. A frequency with neither is returned as is.
    pub(crate) fn quantize_nearest(&self, clk_dom_idx: u8, freq_mhz: u16) -> Result<u16, ErrorCode> {
        match self.quantize(clk_dom_idx, freq_mhz, true) {
            Err(ErrorCode::RANGE) => match self.quantize(clk_dom_idx, freq_mhz, false) {
                Err(ErrorCode::RANGE) => Ok(freq_mhz),
                result => result,
            },
            result => result,
        }
    }

    /// Primary frequency needed for secondary `clk_dom_idx` to run at
    /// `freq_mhz`. A primary maps to itself.
    pub fn secondary_to_primary(&self, clk_dom_idx: u8, freq_mhz: u16) -> Result<u16, ErrorCode> {
        let (primary_idx, role, _) = self.curve_of(clk_dom_idx)?;
        if primary_idx == clk_dom_idx {
            return Ok(freq_mhz);
        }
        for prog_idx in role.progs.first..=role.progs.last {
            let prog = self.progs.get(prog_idx).map_err(|err| trap!(err))?;
            let entry = prog
                .secondary_entry(clk_dom_idx)
                .ok_or_else(|| trap!(ErrorCode::STATE))?;
            match prog.secondary_kind {
                SecondaryKind::Ratio if entry.value != 0 => {
                    let primary = (freq_mhz as u32 * 100).div_ceil(entry.value as u32);
                    if primary <= prog.freq_max_mhz as u32 {
                        return Ok(primary as u16);
                    }
                }
                SecondaryKind::Ratio => {}
                SecondaryKind::Table => {
                    if entry.value >= freq_mhz {
                        return Ok(prog.freq_max_mhz);
                    }
                }
            }
        }
        // Provisional: no prog produces `freq_mhz`, run the primary at the
        // top of its last prog until a rule for this case is settled.
        let last = self.progs.get(role.progs.last).map_err(|err| trap!(err))?;
        debug!(
            "clk dom {}: no prog for {} MHz, using last prog",
            clk_dom_idx, freq_mhz
        );
        Ok(last.freq_max_mhz)
    }

    /// Re-evaluate the DVCO minimums and every VF point of every primary.
    pub fn vf_cache_rebuild(&mut self, vfe: &dyn Vfe) -> Result<(), ErrorCode> {
        self.nafll.dvco_min_update(vfe)?;
        for clk_dom_idx in 0..CLK_DOMAIN_MAX as u8 {
            let role = match self.domains.get(clk_dom_idx) {
                Ok(ClkDomain {
                    role: ClkDomainRole::Primary(role),
                    ..
                }) => *role,
                _ => continue,
            };
            for rail_idx in 0..CLK_VOLT_RAIL_MAX as u8 {
                self.vf_rail_rebuild(clk_dom_idx, &role, rail_idx, vfe)?;
            }
        }
        self.cache_dirty = false;
        Ok(())
    }

    fn vf_rail_rebuild(
        &mut self,
        clk_dom_idx: u8,
        role: &PrimaryRole,
        rail_idx: u8,
        vfe: &dyn Vfe,
    ) -> Result<(), ErrorCode> {
        let quantizer = self.nafll.quantizer(clk_dom_idx);
        let domain_delta = self.domain(clk_dom_idx)?.freq_delta;
        let global_volt_uv = self.deltas.volt_uv[rail_idx as usize];
        let mut prev: Option<VfPoint> = None;
        let mut prev_max = 0;
        for prog_idx in role.progs.first..=role.progs.last {
            let prog = *self.progs.get(prog_idx).map_err(|err| trap!(err))?;
            let seg_prev_max = prev_max;
            prev_max = prog.freq_max_mhz;
            let entry = *prog.vf_entry(rail_idx)?;
            if !entry.is_valid() {
                continue;
            }

            let volt_delta_uv = prog.deltas.volt_uv[rail_idx as usize].saturating_add(global_volt_uv);
            let quantize = |freq: u16| match prog.freq_quantize(freq, true, seg_prev_max, quantizer)
            {
                Err(ErrorCode::RANGE) => prog.freq_quantize(freq, false, seg_prev_max, quantizer),
                result => result,
            };
            // Same order as a client request: domain, global, then prog.
            let freq_deltas = [domain_delta, self.deltas.freq, prog.deltas.freq];
            for point_idx in entry.vf_point_idx_first..=entry.vf_point_idx_last {
                let point = self.vf_points.get_mut(point_idx).map_err(|err| trap!(err))?;
                point.cache(
                    vfe,
                    entry.vfe_idx,
                    &quantize,
                    &freq_deltas,
                    volt_delta_uv,
                    prev.as_ref(),
                )?;
                for sec in mask_bits(role.secondary_mask) {
                    let pos = role.tuple_pos(sec)?;
                    point.cache_secondary(pos, &|freq| prog.primary_to_secondary(freq, sec))?;
                }
                prev = Some(*point);
            }
        }
        Ok(())
    }

    /// Program the LUT of every NAFLL from the offset VF curve of its
    /// domain.
    pub fn nafll_lut_update(&mut self, hw: &dyn NafllLut) -> Result<(), ErrorCode> {
        let mut nafll = core::mem::take(&mut self.nafll);
        let result = self.nafll_lut_fill(&mut nafll, hw);
        self.nafll = nafll;
        result
    }

    fn nafll_lut_fill(&self, nafll: &mut NafllDevices, hw: &dyn NafllLut) -> Result<(), ErrorCode> {
        for idx in 0..CLK_NAFLL_MAX as u8 {
            let (clk_dom_idx, rail_idx) = match nafll.get(idx) {
                Ok(dev) => (dev.clk_dom_idx, dev.rail_idx),
                Err(_) => continue,
            };
            // LUT voltages only grow, so each lookup resumes where the last
            // one stopped.
            let mut cursor = VfIterState::new();
            nafll.lut_update(idx, hw, &mut |voltage_uv| {
                let out = self.volt_to_freq(
                    clk_dom_idx,
                    rail_idx,
                    VoltageType::Source,
                    VfInput::with_default(voltage_uv),
                    Some(&mut cursor),
                )?;
                Ok(out.map(|out| out.value.min(u16::MAX as u32) as u16))
            })?;
        }
        Ok(())
    }

    /// Frequency offset of `clk_dom_idx`, bounded by the domain's limits.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INVAL]\): the offset at the domain's top
    ///   frequency is outside `[freq_delta_min_mhz, freq_delta_max_mhz]`.
    pub fn set_domain_freq_delta(
        &mut self,
        clk_dom_idx: u8,
        delta: FreqDelta,
    ) -> Result<(), ErrorCode> {
        let top = self.freq_top(clk_dom_idx)?;
        let domain = self.domains.get_mut(clk_dom_idx).map_err(|err| trap!(err))?;
        let offset = delta.offset_mhz(top);
        if offset < domain.freq_delta_min_mhz as i32 || offset > domain.freq_delta_max_mhz as i32 {
            return Err(ErrorCode::INVAL);
        }
        domain.freq_delta = delta;
        self.cache_dirty = true;
        Ok(())
    }

    /// Highest frequency `clk_dom_idx` runs at.
    fn freq_top(&self, clk_dom_idx: u8) -> Result<u16, ErrorCode> {
        match self.domain(clk_dom_idx)?.role {
            ClkDomainRole::Fixed { freq_mhz } => Ok(freq_mhz),
            _ => {
                let (_, role, _) = self.curve_of(clk_dom_idx)?;
                let last = self.progs.get(role.progs.last).map_err(|err| trap!(err))?;
                if role.tuple_pos(clk_dom_idx).is_ok() {
                    last.primary_to_secondary(last.freq_max_mhz, clk_dom_idx)
                } else {
                    Ok(last.freq_max_mhz)
                }
            }
        }
    }

    pub fn set_prog_deltas(&mut self, clk_prog_idx: u8, deltas: ProgDeltas) -> Result<(), ErrorCode> {
        self.progs
            .get_mut(clk_prog_idx)
            .map_err(|err| trap!(err))?
            .deltas = deltas;
        self.cache_dirty = true;
        Ok(())
    }

    pub fn set_vf_point_deltas(
        &mut self,
        vf_point_idx: u8,
        deltas: VfPointDeltas,
    ) -> Result<(), ErrorCode> {
        self.vf_points
            .get_mut(vf_point_idx)
            .map_err(|err| trap!(err))?
            .deltas = deltas;
        self.cache_dirty = true;
        Ok(())
    }

    pub fn set_global_deltas(&mut self, deltas: GlobalDeltas) {
        self.deltas = deltas;
        self.cache_dirty = true;
    }

    pub fn set_ovoc_enabled(&mut self, enabled: bool) {
        self.ovoc_enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::{ClkDomains, PrimaryRole, ProgRange};
    use crate::desc::{ClkDescriptor, CLK_DOMAIN_TYPE_FIXED};
    use crate::prog::ProgDeltas;
    use crate::test::{self, FakeNafll, HwOp, OpLog, GPC, HUB, PWR, SYS, XBAR};
    use crate::types::{FreqDelta, GlobalDeltas, VfInput, VfIterState, VfOutput, VoltageType};
    use crate::vf_point::VfPointDeltas;
    use kernel::ErrorCode;
    use std::vec::Vec;

    fn v2f(domains: &ClkDomains, dom: u8, vt: VoltageType, input: VfInput) -> Option<VfOutput> {
        domains.volt_to_freq(dom, 0, vt, input, None).unwrap()
    }

    fn f2v(domains: &ClkDomains, dom: u8, input: VfInput) -> Option<VfOutput> {
        domains
            .freq_to_volt(dom, 0, VoltageType::Por, input, None)
            .unwrap()
    }

    #[test]
    fn top_pll_point_at_one_volt() {
        let domains = test::domains();
        assert_eq!(
            v2f(&domains, XBAR, VoltageType::Por, VfInput::new(1_000_000)),
            Some(VfOutput {
                input_best_match: 976_000,
                value: 1440,
            })
        );
    }

    #[test]
    fn below_the_curve() {
        let domains = test::domains();
        assert_eq!(
            v2f(&domains, XBAR, VoltageType::Por, VfInput::new(500_000)),
            None
        );
        assert_eq!(
            v2f(&domains, XBAR, VoltageType::Por, VfInput::with_default(500_000)),
            Some(VfOutput {
                input_best_match: 544_000,
                value: 360,
            })
        );
    }

    #[test]
    fn freq_to_volt_lookups() {
        let domains = test::domains();
        assert_eq!(
            f2v(&domains, XBAR, VfInput::new(700)),
            Some(VfOutput {
                input_best_match: 720,
                value: 688_000,
            })
        );
        assert_eq!(f2v(&domains, XBAR, VfInput::new(2_000)), None);
        assert_eq!(
            f2v(&domains, XBAR, VfInput::with_default(2_000)),
            Some(VfOutput {
                input_best_match: 1440,
                value: 976_000,
            })
        );
    }

    #[test]
    fn secondaries_read_their_tuple_entry() {
        let domains = test::domains();
        assert_eq!(
            v2f(&domains, SYS, VoltageType::Por, VfInput::new(700_000)),
            Some(VfOutput {
                input_best_match: 688_000,
                value: 360,
            })
        );
        assert_eq!(
            v2f(&domains, HUB, VoltageType::Por, VfInput::new(1_000_000))
                .map(|out| out.value),
            Some(360)
        );
        assert_eq!(
            f2v(&domains, SYS, VfInput::new(400)).map(|out| out.input_best_match),
            Some(720)
        );
    }

    #[test]
    fn bad_inputs() {
        let domains = test::domains();
        assert_eq!(
            domains.volt_to_freq(
                XBAR,
                0,
                VoltageType::Por,
                VfInput::new(VfInput::INVALID),
                None
            ),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(
            domains.volt_to_freq(XBAR, 2, VoltageType::Por, VfInput::new(800_000), None),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(
            domains.freq_to_volt(PWR, 0, VoltageType::Por, VfInput::new(540), None),
            Err(ErrorCode::NOSUPPORT)
        );
        assert_eq!(
            domains.volt_to_freq(20, 0, VoltageType::Por, VfInput::new(800_000), None),
            Err(ErrorCode::INDEX)
        );
    }

    #[test]
    fn cursor_walk_matches_stateless_lookups() {
        let domains = test::domains();
        for dom in [GPC, XBAR, SYS] {
            let mut cursor = VfIterState::new();
            for voltage in (500_000..1_100_000).step_by(25_000) {
                let input = VfInput::with_default(voltage);
                let resumed = domains
                    .volt_to_freq(dom, 0, VoltageType::Source, input, Some(&mut cursor))
                    .unwrap();
                assert_eq!(resumed, v2f(&domains, dom, VoltageType::Source, input));
            }
        }
    }

    #[test]
    fn lookups_never_overshoot() {
        let domains = test::domains();
        for dom in [GPC, XBAR] {
            for voltage in (550_000..1_050_000).step_by(10_000) {
                let Some(freq) = v2f(&domains, dom, VoltageType::Por, VfInput::new(voltage)) else {
                    continue;
                };
                let back = f2v(&domains, dom, VfInput::new(freq.value)).unwrap();
                assert!(back.value <= voltage);
            }
            for freq in (100..1_500).step_by(37) {
                let Some(volt) = f2v(&domains, dom, VfInput::new(freq)) else {
                    continue;
                };
                let back = v2f(&domains, dom, VoltageType::Por, VfInput::new(volt.value)).unwrap();
                assert!(back.value >= freq);
            }
        }
    }

    #[test]
    fn rebuilt_curves_are_monotonic() {
        let mut domains = test::domains();
        // A negative offset on one point must not make the curve dip.
        domains
            .set_vf_point_deltas(
                3,
                VfPointDeltas {
                    freq: FreqDelta::Static(-300),
                    volt_uv: -150_000,
                },
            )
            .unwrap();
        domains.vf_cache_rebuild(&test::vfe()).unwrap();

        let curves: [&[u8]; 2] = [&[0, 1, 2, 3, 4], &[10, 11, 12]];
        for curve in curves {
            let points: Vec<_> = curve
                .iter()
                .map(|idx| *domains.vf_point(*idx).unwrap())
                .collect();
            for pair in points.windows(2) {
                for vt in [VoltageType::Por, VoltageType::Source] {
                    let (lo, hi) = (pair[0].pair(vt), pair[1].pair(vt));
                    assert!(lo.freq_mhz[0] <= hi.freq_mhz[0]);
                    assert!(lo.voltage_uv <= hi.voltage_uv);
                }
            }
        }
        assert_eq!(domains.vf_point(3).unwrap().offset().voltage_uv, 800_000);
        assert_eq!(domains.vf_point(3).unwrap().offset().freq_mhz[0], 783);
    }

    #[test]
    fn volt_points_follow_nafll_steps() {
        let domains = test::domains();
        let freqs: Vec<u16> = (0..5)
            .map(|idx| domains.vf_point(idx).unwrap().base().freq_mhz[0])
            .collect();
        assert_eq!(freqs, [378, 594, 783, 999, 1188]);
    }

    #[test]
    fn global_voltage_offset_moves_the_source_curve() {
        let mut domains = test::domains();
        let mut deltas = GlobalDeltas::default();
        deltas.volt_uv[0] = 10_000;
        domains.set_global_deltas(deltas);
        assert!(domains.is_cache_dirty());
        domains.vf_cache_rebuild(&test::vfe()).unwrap();
        assert!(!domains.is_cache_dirty());

        assert_eq!(domains.vf_point(0).unwrap().offset().voltage_uv, 610_000);
        assert_eq!(
            v2f(&domains, GPC, VoltageType::Source, VfInput::new(605_000)),
            None
        );
        assert_eq!(
            v2f(&domains, GPC, VoltageType::Por, VfInput::new(605_000)).map(|out| out.value),
            Some(378)
        );
    }

    #[test]
    fn quantize_per_domain_kind() {
        let domains = test::domains();
        assert_eq!(domains.freq_quantize(GPC, 1000, true), Ok(Some(999)));
        assert_eq!(domains.freq_quantize(GPC, 1000, false), Ok(Some(1026)));
        assert_eq!(domains.freq_quantize(GPC, 2000, true), Ok(Some(1215)));
        assert_eq!(domains.freq_quantize(GPC, 2000, false), Ok(None));

        assert_eq!(domains.freq_quantize(XBAR, 700, true), Ok(Some(690)));
        assert_eq!(domains.freq_quantize(XBAR, 1000, true), Ok(Some(720)));
        assert_eq!(domains.freq_quantize(XBAR, 1000, false), Ok(Some(1440)));
        assert_eq!(domains.freq_quantize(XBAR, 5, true), Ok(None));

        assert_eq!(domains.freq_quantize(SYS, 500, true), Ok(Some(360)));
        assert_eq!(domains.freq_quantize(SYS, 500, false), Ok(Some(720)));

        assert_eq!(domains.freq_quantize(PWR, 600, true), Ok(Some(540)));
        assert_eq!(domains.freq_quantize(PWR, 500, true), Ok(None));
        assert_eq!(domains.freq_quantize(PWR, 500, false), Ok(Some(540)));
    }

    #[test]
    fn quantize_is_idempotent() {
        let domains = test::domains();
        for dom in [GPC, XBAR, SYS, HUB, PWR] {
            for freq in (0..1_600).step_by(13) {
                for floor in [true, false] {
                    if let Some(once) = domains.freq_quantize(dom, freq, floor).unwrap() {
                        assert_eq!(domains.freq_quantize(dom, once, floor), Ok(Some(once)));
                    }
                }
            }
        }
    }

    #[test]
    fn enumerate_from_the_top() {
        let domains = test::domains();
        let mut out = [0u16; 32];

        let count = domains.freqs_enumerate(XBAR, &mut out).unwrap();
        assert_eq!(count, 25);
        assert_eq!(out[..3], [1440, 720, 690]);
        assert_eq!(out[count - 1], 30);

        let count = domains.freqs_enumerate(SYS, &mut out).unwrap();
        assert_eq!(count, 25);
        assert_eq!(out[..3], [720, 360, 345]);

        assert_eq!(domains.freqs_enumerate(PWR, &mut out), Ok(1));
        assert_eq!(out[0], 540);

        let mut small = [0u16; 4];
        assert_eq!(
            domains.freqs_enumerate(XBAR, &mut small),
            Err(ErrorCode::SIZE)
        );
    }

    #[test]
    fn delta_chain() {
        let mut domains = test::domains();
        assert_eq!(domains.client_freq_delta_adjust(GPC, 1000), Ok(1000));
        // OVOC clamps to the top VF point before offsets apply.
        assert_eq!(domains.client_freq_delta_adjust(GPC, 1300), Ok(1188));

        domains
            .set_domain_freq_delta(GPC, FreqDelta::Static(30))
            .unwrap();
        assert_eq!(domains.client_freq_delta_adjust(GPC, 999), Ok(1026));
        assert_eq!(domains.client_freq_delta_adjust(GPC, 1300), Ok(1215));
        assert_eq!(
            domains.set_domain_freq_delta(GPC, FreqDelta::Static(150)),
            Err(ErrorCode::INVAL)
        );

        domains
            .set_domain_freq_delta(XBAR, FreqDelta::Static(50))
            .unwrap();
        assert_eq!(domains.client_freq_delta_adjust(XBAR, 690), Ok(720));

        domains
            .set_domain_freq_delta(XBAR, FreqDelta::ZERO)
            .unwrap();
        domains
            .set_prog_deltas(
                2,
                ProgDeltas {
                    freq: FreqDelta::Static(-100),
                    volt_uv: [0; 2],
                },
            )
            .unwrap();
        assert_eq!(domains.client_freq_delta_adjust(XBAR, 1440), Ok(720));
        assert_eq!(domains.client_freq_delta_adjust(PWR, 540), Ok(540));
    }

    #[test]
    fn secondary_to_primary() {
        let domains = test::domains();
        assert_eq!(domains.secondary_to_primary(SYS, 300), Ok(600));
        assert_eq!(domains.secondary_to_primary(SYS, 700), Ok(1440));
        assert_eq!(domains.secondary_to_primary(HUB, 100), Ok(400));
        assert_eq!(domains.secondary_to_primary(XBAR, 700), Ok(700));
        // Nothing produces 800 MHz on SYS: top of the last prog.
        assert_eq!(domains.secondary_to_primary(SYS, 800), Ok(1440));
        assert_eq!(
            domains.secondary_to_primary(PWR, 540),
            Err(ErrorCode::NOSUPPORT)
        );
    }

    #[test]
    fn tuple_positions() {
        let role = PrimaryRole {
            progs: ProgRange { first: 0, last: 0 },
            secondary_mask: 0b1010_0100,
        };
        assert_eq!(role.tuple_pos(2), Ok(1));
        assert_eq!(role.tuple_pos(5), Ok(2));
        assert_eq!(role.tuple_pos(7), Ok(3));
        assert_eq!(role.tuple_pos(3), Err(ErrorCode::INDEX));
    }

    #[test]
    fn lut_follows_the_offset_curve() {
        let log = OpLog::new();
        let hw = FakeNafll::new(&log);
        let mut domains = test::domains();
        domains.nafll_lut_update(&hw).unwrap();
        // 378 MHz at 0.6 V is below the 405 MHz DVCO minimum.
        assert_eq!(
            log.take(),
            [
                HwOp::LutWrite(1, 0, 15),
                HwOp::LutWrite(1, 1, 22),
                HwOp::LutWrite(1, 2, 29),
                HwOp::LutWrite(1, 3, 37),
            ]
        );
        assert!(domains.nafll().get(0).unwrap().is_lut_initialized());
    }

    #[test]
    fn domain_delta_moves_offset_curve_and_lut() {
        let log = OpLog::new();
        let hw = FakeNafll::new(&log);
        let mut domains = test::domains();
        domains
            .set_domain_freq_delta(GPC, FreqDelta::Static(27))
            .unwrap();
        domains.vf_cache_rebuild(&test::vfe()).unwrap();

        let point = domains.vf_point(0).unwrap();
        assert_eq!(point.base().freq_mhz[0], 378);
        assert_eq!(point.offset().freq_mhz[0], 405);
        let offsets: Vec<u16> = (0..5)
            .map(|idx| domains.vf_point(idx).unwrap().offset().freq_mhz[0])
            .collect();
        assert_eq!(offsets, [405, 621, 810, 1026, 1215]);

        domains.nafll_lut_update(&hw).unwrap();
        assert_eq!(
            log.take(),
            [
                HwOp::LutWrite(1, 0, 15),
                HwOp::LutWrite(1, 1, 23),
                HwOp::LutWrite(1, 2, 30),
                HwOp::LutWrite(1, 3, 38),
            ]
        );
    }

    #[test]
    fn prog_and_global_deltas_reach_offset_curve() {
        let mut domains = test::domains();
        domains
            .set_prog_deltas(
                0,
                ProgDeltas {
                    freq: FreqDelta::Static(-27),
                    ..ProgDeltas::default()
                },
            )
            .unwrap();
        domains.set_global_deltas(GlobalDeltas {
            freq: FreqDelta::Static(54),
            ..GlobalDeltas::default()
        });
        domains.vf_cache_rebuild(&test::vfe()).unwrap();

        // 594 + 54 - 27
        assert_eq!(domains.vf_point(1).unwrap().offset().freq_mhz[0], 621);
        assert_eq!(domains.vf_point(1).unwrap().base().freq_mhz[0], 594);
    }

    fn check(desc: ClkDescriptor<'_>) -> Option<ErrorCode> {
        ClkDomains::from_desc(&desc).err()
    }

    #[test]
    fn broken_descriptors() {
        let mut domains = test::DOMAINS;
        domains[SYS as usize].1.primary_idx = GPC;
        assert_eq!(
            check(ClkDescriptor {
                domains: &domains,
                ..test::descriptor()
            }),
            Some(ErrorCode::STATE)
        );

        let mut domains = test::DOMAINS;
        domains[PWR as usize].1.domain_type = 0x7;
        assert_eq!(
            check(ClkDescriptor {
                domains: &domains,
                ..test::descriptor()
            }),
            Some(ErrorCode::NOSUPPORT)
        );

        let mut domains = test::DOMAINS;
        domains[XBAR as usize].1.secondary_mask |= 1 << PWR;
        domains[PWR as usize].1.domain_type = CLK_DOMAIN_TYPE_FIXED;
        assert_eq!(
            check(ClkDescriptor {
                domains: &domains,
                ..test::descriptor()
            }),
            Some(ErrorCode::STATE)
        );

        let mut progs = test::PROGS;
        progs[2].1.freq_max_mhz = 700;
        assert_eq!(
            check(ClkDescriptor {
                progs: &progs,
                ..test::descriptor()
            }),
            Some(ErrorCode::STATE)
        );

        let points = &test::VF_POINTS[..4];
        assert_eq!(
            check(ClkDescriptor {
                vf_points: points,
                ..test::descriptor()
            }),
            Some(ErrorCode::INDEX)
        );

        let mut progs = test::PROGS;
        progs[0].1.source = 9;
        assert_eq!(
            check(ClkDescriptor {
                progs: &progs,
                ..test::descriptor()
            }),
            Some(ErrorCode::NOSUPPORT)
        );
    }
}
