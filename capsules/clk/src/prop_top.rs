// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Clock propagation topologies.
//!
//! A propagation relationship says how the frequency of one domain follows
//! from the frequency of another. A topology is a subset of the
//! relationships; exactly one topology is active at a time, selected by
//! workload unless a client forced one. Propagating a set of source
//! frequencies walks the shortest relationship path from each source to
//! every other domain and keeps the highest frequency any source asks for.
//!
//! The shortest paths are resolved once, when the topology is built, into a
//! next-hop table so that propagation never searches the graph.

use kernel::{trap, ErrorCode};

use crate::desc::{PropRelDesc, PropTopDesc};
use crate::domain::ClkDomains;
use crate::group::ObjGroup;
use crate::types::{
    ClkList, VfInput, VoltageType, CLK_DOMAIN_MAX, CLK_PROP_REL_MAX, CLK_PROP_TOP_MAX,
    CLK_VOLT_RAIL_MAX, IDX_INVALID,
};

pub const CLK_PROP_TABLE_MAX: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClkPropRelKind {
    /// Destination runs at the source frequency.
    OneToOne,
    /// Destination runs at `pct` percent of the source.
    Ratio { pct: u16 },
    /// `(source MHz, destination MHz)` pairs, ascending.
    Table {
        entries: [(u16, u16); CLK_PROP_TABLE_MAX],
        count: u8,
    },
    /// Destination runs at the highest frequency the voltage the source
    /// needs on rail `rail_idx` supports.
    Volt { rail_idx: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkPropRel {
    pub src: u8,
    pub dst: u8,
    pub kind: ClkPropRelKind,
    pub bidirectional: bool,
}

impl ClkPropRel {
    fn from_desc(desc: &PropRelDesc) -> Result<Self, ErrorCode> {
        match desc.kind {
            ClkPropRelKind::Ratio { pct: 0 } => return Err(ErrorCode::INVAL),
            ClkPropRelKind::Table { count, .. }
                if count == 0 || count as usize > CLK_PROP_TABLE_MAX =>
            {
                return Err(ErrorCode::INVAL)
            }
            ClkPropRelKind::Volt { rail_idx } if rail_idx as usize >= CLK_VOLT_RAIL_MAX => {
                return Err(ErrorCode::INVAL)
            }
            _ => {}
        }
        if desc.src_clk_dom_idx == desc.dst_clk_dom_idx {
            return Err(ErrorCode::INVAL);
        }
        Ok(ClkPropRel {
            src: desc.src_clk_dom_idx,
            dst: desc.dst_clk_dom_idx,
            kind: desc.kind,
            bidirectional: desc.bidirectional,
        })
    }

    /// Frequency of the far end when the near end runs at `freq_mhz`.
    /// `reverse` walks from destination to source.
    fn propagate(
        &self,
        domains: &ClkDomains,
        freq_mhz: u16,
        reverse: bool,
    ) -> Result<u16, ErrorCode> {
        let (from, to) = if reverse {
            (self.dst, self.src)
        } else {
            (self.src, self.dst)
        };
        match self.kind {
            ClkPropRelKind::OneToOne => Ok(freq_mhz),
            ClkPropRelKind::Ratio { pct } => {
                let freq = if reverse {
                    (freq_mhz as u32 * 100).div_ceil(pct as u32)
                } else {
                    freq_mhz as u32 * pct as u32 / 100
                };
                Ok(freq.min(u16::MAX as u32) as u16)
            }
            ClkPropRelKind::Table { entries, count } => {
                let pick = |&(src, dst): &(u16, u16)| if reverse { (dst, src) } else { (src, dst) };
                let entries = &entries[..count as usize];
                entries
                    .iter()
                    .map(pick)
                    .find(|&(key, _)| key >= freq_mhz)
                    .or_else(|| entries.last().map(pick))
                    .map(|(_, value)| value)
                    .ok_or_else(|| trap!(ErrorCode::STATE))
            }
            ClkPropRelKind::Volt { rail_idx } => {
                let volt = domains
                    .freq_to_volt(
                        from,
                        rail_idx,
                        VoltageType::Source,
                        VfInput::with_default(freq_mhz as u32),
                        None,
                    )?
                    .ok_or_else(|| trap!(ErrorCode::STATE))?;
                let freq = domains
                    .volt_to_freq(
                        to,
                        rail_idx,
                        VoltageType::Source,
                        VfInput::with_default(volt.value),
                        None,
                    )?
                    .ok_or_else(|| trap!(ErrorCode::STATE))?;
                Ok(freq.value.min(u16::MAX as u32) as u16)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PathHop {
    rel_idx: u8,
    reverse: bool,
}

impl PathHop {
    const NONE: PathHop = PathHop {
        rel_idx: IDX_INVALID,
        reverse: false,
    };
}

pub struct ClkPropTop {
    pub id: u8,
    pub workload: u8,
    pub rel_mask: u32,
    /// `paths[src][dst]`: first relationship on the shortest path.
    paths: [[PathHop; CLK_DOMAIN_MAX]; CLK_DOMAIN_MAX],
}

impl ClkPropTop {
    fn new(
        desc: &PropTopDesc,
        rels: &ObjGroup<ClkPropRel, CLK_PROP_REL_MAX>,
    ) -> Result<Self, ErrorCode> {
        let mut rel_bits = (0..u32::BITS as u8).filter(|bit| desc.rel_mask & (1 << bit) != 0);
        if rel_bits.any(|rel_idx| rel_idx as usize >= CLK_PROP_REL_MAX || !rels.contains(rel_idx)) {
            return Err(trap!(ErrorCode::INDEX));
        }
        let mut top = ClkPropTop {
            id: desc.id,
            workload: desc.workload,
            rel_mask: desc.rel_mask,
            paths: [[PathHop::NONE; CLK_DOMAIN_MAX]; CLK_DOMAIN_MAX],
        };
        for src in 0..CLK_DOMAIN_MAX as u8 {
            top.paths[src as usize] = top.search(src, rels);
        }
        Ok(top)
    }

    /// Breadth first search from `src`, recording for every reachable
    /// domain the relationship leaving `src` towards it.
    fn search(
        &self,
        src: u8,
        rels: &ObjGroup<ClkPropRel, CLK_PROP_REL_MAX>,
    ) -> [PathHop; CLK_DOMAIN_MAX] {
        let mut first_hop = [PathHop::NONE; CLK_DOMAIN_MAX];
        let mut visited: u32 = 1 << src;
        let mut queue = [0u8; CLK_DOMAIN_MAX];
        let (mut head, mut tail) = (0, 1);
        queue[0] = src;

        while head < tail {
            let node = queue[head];
            head += 1;
            for (rel_idx, rel) in rels.iter() {
                if self.rel_mask & (1 << rel_idx) == 0 {
                    continue;
                }
                let (next, reverse) = if rel.src == node {
                    (rel.dst, false)
                } else if rel.bidirectional && rel.dst == node {
                    (rel.src, true)
                } else {
                    continue;
                };
                if next as usize >= CLK_DOMAIN_MAX || visited & (1 << next) != 0 {
                    continue;
                }
                visited |= 1 << next;
                first_hop[next as usize] = if node == src {
                    PathHop { rel_idx, reverse }
                } else {
                    first_hop[node as usize]
                };
                queue[tail] = next;
                tail += 1;
            }
        }
        first_hop
    }

    /// Relationship to take from `src` towards `dst`, and whether it is
    /// walked backwards.
    pub fn next_hop(&self, src: u8, dst: u8) -> Option<(u8, bool)> {
        let hop = self.paths.get(src as usize)?.get(dst as usize)?;
        (hop.rel_idx != IDX_INVALID).then_some((hop.rel_idx, hop.reverse))
    }
}

pub struct ClkPropTops {
    rels: ObjGroup<ClkPropRel, CLK_PROP_REL_MAX>,
    tops: ObjGroup<ClkPropTop, CLK_PROP_TOP_MAX>,
    /// Topology picked by workload.
    active_idx: Option<u8>,
    /// Client override, by topology id.
    forced_id: Option<u8>,
}

impl ClkPropTops {
    /// Build the relationships and the topologies over them.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INVAL]\): a degenerate relationship.
    /// + [Err]\([ErrorCode::INDEX]\): a relationship naming an unknown domain,
    ///   or a topology naming an unknown relationship.
    /// + [Err]\([ErrorCode::STATE]\): two topologies share an id.
    pub fn from_desc(
        rels: &[(u8, PropRelDesc)],
        tops: &[(u8, PropTopDesc)],
        domains: &ClkDomains,
    ) -> Result<Self, ErrorCode> {
        let mut prop = ClkPropTops {
            rels: ObjGroup::new(),
            tops: ObjGroup::new(),
            active_idx: None,
            forced_id: None,
        };
        for (idx, desc) in rels {
            let rel = ClkPropRel::from_desc(desc).map_err(|err| trap!(err))?;
            if domains.domain(rel.src).is_err() || domains.domain(rel.dst).is_err() {
                return Err(trap!(ErrorCode::INDEX));
            }
            prop.rels.insert(*idx, rel).map_err(|err| trap!(err))?;
        }
        for (idx, desc) in tops {
            if prop.tops.iter().any(|(_, top)| top.id == desc.id) {
                return Err(trap!(ErrorCode::STATE));
            }
            let top = ClkPropTop::new(desc, &prop.rels)?;
            prop.tops.insert(*idx, top).map_err(|err| trap!(err))?;
        }
        prop.active_idx = prop.tops.iter().next().map(|(idx, _)| idx);
        Ok(prop)
    }

    pub fn rel(&self, rel_idx: u8) -> Result<&ClkPropRel, ErrorCode> {
        self.rels.get(rel_idx)
    }

    /// Make the first topology tuned for `workload` the active one.
    /// Returns its id.
    pub fn select_by_workload(&mut self, workload: u8) -> Result<u8, ErrorCode> {
        let (idx, id) = self
            .tops
            .iter()
            .find(|(_, top)| top.workload == workload)
            .map(|(idx, top)| (idx, top.id))
            .ok_or(ErrorCode::INDEX)?;
        self.active_idx = Some(idx);
        Ok(id)
    }

    /// Force topology `id` regardless of workload, or drop the override.
    pub fn force(&mut self, id: Option<u8>) -> Result<(), ErrorCode> {
        if let Some(id) = id {
            if !self.tops.iter().any(|(_, top)| top.id == id) {
                return Err(ErrorCode::INDEX);
            }
        }
        self.forced_id = id;
        Ok(())
    }

    /// The forced topology if any, else the one selected by workload.
    pub fn active(&self) -> Option<&ClkPropTop> {
        if let Some(id) = self.forced_id {
            return self.tops.iter().find(|(_, top)| top.id == id).map(|(_, top)| top);
        }
        self.tops.get(self.active_idx?).ok()
    }

    /// Fill in the frequencies of the list entries outside `src_mask` from
    /// the entries inside it, through the active topology.
    ///
    /// Only destinations in `regime_mask` change. A destination no source
    /// reaches keeps its frequency. Each hop is quantized to what the
    /// destination of the hop can run at.
    pub fn propagate(
        &self,
        domains: &ClkDomains,
        regime_mask: u32,
        list: &mut ClkList,
        src_mask: u32,
    ) -> Result<(), ErrorCode> {
        let top = self.active().ok_or_else(|| trap!(ErrorCode::STATE))?;
        for i in 0..list.len() {
            let dst = list.as_slice()[i].clk_dom_idx;
            let bit = 1u32.checked_shl(dst as u32).unwrap_or(0);
            if src_mask & bit != 0 || regime_mask & bit == 0 {
                continue;
            }

            let mut best: Option<u16> = None;
            for src in list.as_slice() {
                let src_bit = 1u32.checked_shl(src.clk_dom_idx as u32).unwrap_or(0);
                if src_mask & src_bit == 0 {
                    continue;
                }
                if let Some(freq) = self.walk(top, domains, src.clk_dom_idx, src.freq_mhz, dst)? {
                    best = Some(best.map_or(freq, |best| best.max(freq)));
                }
            }
            if let Some(freq) = best {
                list.as_mut_slice()[i].freq_mhz = freq;
            }
        }
        Ok(())
    }

    /// Frequency `dst` gets when `src` runs at `freq_mhz`, or `None` if the
    /// topology has no path between them.
    fn walk(
        &self,
        top: &ClkPropTop,
        domains: &ClkDomains,
        src: u8,
        freq_mhz: u16,
        dst: u8,
    ) -> Result<Option<u16>, ErrorCode> {
        let mut node = src;
        let mut freq = freq_mhz;
        for _ in 0..CLK_DOMAIN_MAX {
            if node == dst {
                return Ok(Some(freq));
            }
            let Some((rel_idx, reverse)) = top.next_hop(node, dst) else {
                return Ok(None);
            };
            let rel = self.rels.get(rel_idx).map_err(|err| trap!(err))?;
            let next = if reverse { rel.src } else { rel.dst };
            freq = rel.propagate(domains, freq, reverse)?;
            freq = domains.quantize_nearest(next, freq)?;
            node = next;
        }
        Err(trap!(ErrorCode::STATE))
    }
}
