// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Clock steps of a change sequencer script.
//!
//! A performance change runs in three phases: the clocks of the pre-volt
//! step, the voltage change, then the clocks of the post-volt step. Clocks
//! are split between the two steps so that no domain runs faster than the
//! voltage on its rail allows at any point of the change:
//!
//! - Plain domains lower their frequency before the voltage changes and
//!   raise it after.
//! - NAFLL domains follow their regime pairing. While the voltage moves
//!   they run in FR so the oscillator tracks whichever voltage is applied.
//!
//! Every domain occupies the slot given by its pre-volt or post-volt
//! ordering index, so a step may have unused slots.
//!
//! The ADCs feeding the NAFLLs are capped along with each step: to the
//! higher of the current and target voltage before the change, and to the
//! target voltage after it.

use kernel::{debug, trap, ErrorCode};

use crate::config::CONFIG;
use crate::domain::{ClkDomain, ClkDomainRole, ClkDomains};
use crate::nafll::{NafllDevice, NafllRegime};
use crate::types::{ClkListItem, PerfState, VoltListItem, CLK_DOMAIN_MAX, CLK_VOLT_RAIL_MAX};

/// The clocks programmed in one phase of a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkStep {
    slots: [Option<ClkListItem>; CLK_DOMAIN_MAX],
    num_domains: usize,
    /// ADC code caps applied before the clocks, per rail.
    pub adc_caps_uv: [Option<u32>; CLK_VOLT_RAIL_MAX],
}

impl ClkStep {
    pub const fn new() -> Self {
        ClkStep {
            slots: [None; CLK_DOMAIN_MAX],
            num_domains: 0,
            adc_caps_uv: [None; CLK_VOLT_RAIL_MAX],
        }
    }

    /// Put `item` in slot `ordering_idx`.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INDEX]\): no such slot.
    /// + [Err]\([ErrorCode::STATE]\): two domains share the slot.
    pub fn place(&mut self, ordering_idx: u8, item: ClkListItem) -> Result<(), ErrorCode> {
        let slot = self
            .slots
            .get_mut(ordering_idx as usize)
            .ok_or_else(|| trap!(ErrorCode::INDEX))?;
        if slot.is_some() {
            return Err(trap!(ErrorCode::STATE));
        }
        *slot = Some(item);
        self.num_domains = self.num_domains.max(ordering_idx as usize + 1);
        Ok(())
    }

    /// Highest used slot plus one.
    pub fn num_domains(&self) -> usize {
        self.num_domains
    }

    pub fn slot(&self, ordering_idx: u8) -> Option<&ClkListItem> {
        self.slots.get(ordering_idx as usize)?.as_ref()
    }

    /// Used slots, in programming order.
    pub fn entries(&self) -> impl Iterator<Item = &ClkListItem> + '_ {
        self.slots[..self.num_domains].iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.num_domains == 0
    }
}

impl Default for ClkStep {
    fn default() -> Self {
        ClkStep::new()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeSeqScript {
    pub pre_volt: ClkStep,
    /// Rail voltages applied between the two steps.
    pub volts: [Option<VoltListItem>; CLK_VOLT_RAIL_MAX],
    pub post_volt: ClkStep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Pre,
    Post,
}

fn place(
    script: &mut ChangeSeqScript,
    domain: &ClkDomain,
    phase: Phase,
    item: ClkListItem,
) -> Result<(), ErrorCode> {
    match phase {
        Phase::Pre => script
            .pre_volt
            .place(domain.pre_volt_ordering_idx, item),
        Phase::Post => script
            .post_volt
            .place(domain.post_volt_ordering_idx, item),
    }
}

/// Split the change from `current` to `target` into clock steps.
///
/// Domains absent from `target` are left alone. A domain absent from
/// `current` has never been programmed and is programmed after the
/// voltage change.
pub fn build(
    domains: &ClkDomains,
    current: &PerfState,
    target: &PerfState,
) -> Result<ChangeSeqScript, ErrorCode> {
    let mut script = ChangeSeqScript {
        volts: target.volts,
        ..ChangeSeqScript::default()
    };

    for tgt in target.clks.as_slice() {
        let domain = domains.domain(tgt.clk_dom_idx)?;
        if matches!(domain.role, ClkDomainRole::Fixed { .. }) {
            continue;
        }
        let cur = current.clks.find(tgt.clk_dom_idx);
        let nafll = domains
            .nafll()
            .for_domain(tgt.clk_dom_idx)
            .filter(|_| domain.noise_aware);

        match (nafll, cur) {
            (Some(dev), Some(cur)) => nafll_steps(&mut script, domain, dev, cur, tgt)?,
            (_, None) => place(&mut script, domain, Phase::Post, *tgt)?,
            (None, Some(cur)) => {
                if tgt.freq_mhz < cur.freq_mhz {
                    place(&mut script, domain, Phase::Pre, *tgt)?;
                } else if tgt.freq_mhz > cur.freq_mhz {
                    place(&mut script, domain, Phase::Post, *tgt)?;
                }
            }
        }
    }

    for rail_idx in 0..CLK_VOLT_RAIL_MAX as u8 {
        let cur = current.voltage_uv(rail_idx);
        let tgt = target.voltage_uv(rail_idx);
        script.pre_volt.adc_caps_uv[rail_idx as usize] = match (cur, tgt) {
            (Some(cur), Some(tgt)) => Some(cur.max(tgt)),
            (cur, tgt) => tgt.or(cur),
        };
        script.post_volt.adc_caps_uv[rail_idx as usize] = tgt;
    }

    if CONFIG.trace_change_seq {
        trace(&script);
    }
    Ok(script)
}

fn nafll_steps(
    script: &mut ChangeSeqScript,
    domain: &ClkDomain,
    dev: &NafllDevice,
    cur: &ClkListItem,
    tgt: &ClkListItem,
) -> Result<(), ErrorCode> {
    let cur_regime = dev.resolve_regime(cur.freq_mhz, cur.regime_id)?.family();
    let tgt_regime = dev.resolve_regime(tgt.freq_mhz, tgt.regime_id)?.family();
    let fr = |freq_mhz| ClkListItem {
        clk_dom_idx: tgt.clk_dom_idx,
        freq_mhz,
        regime_id: NafllRegime::Fr as u8,
    };

    match (cur_regime, tgt_regime) {
        (NafllRegime::Ffr, NafllRegime::Ffr) => {
            place(script, domain, Phase::Pre, fr(cur.freq_mhz.min(tgt.freq_mhz)))?;
            place(script, domain, Phase::Post, *tgt)
        }
        (NafllRegime::Fr, _) | (_, NafllRegime::Fr) => {
            place(script, domain, Phase::Pre, fr(cur.freq_mhz.max(tgt.freq_mhz)))?;
            place(script, domain, Phase::Post, *tgt)
        }
        (NafllRegime::Vr, NafllRegime::Vr) => {
            if tgt.freq_mhz > cur.freq_mhz {
                place(script, domain, Phase::Pre, *tgt)
            } else if tgt.freq_mhz < cur.freq_mhz {
                place(script, domain, Phase::Post, *tgt)
            } else {
                Ok(())
            }
        }
        (NafllRegime::Vr, NafllRegime::Ffr) => place(script, domain, Phase::Post, *tgt),
        _ => Err(trap!(ErrorCode::STATE)),
    }
}

fn trace(script: &ChangeSeqScript) {
    for item in script.pre_volt.entries() {
        debug!(
            "change seq pre-volt: dom {} {} MHz regime {}",
            item.clk_dom_idx, item.freq_mhz, item.regime_id
        );
    }
    for volt in script.volts.iter().flatten() {
        debug!("change seq volt: rail {} {} uV", volt.rail_idx, volt.voltage_uv);
    }
    for item in script.post_volt.entries() {
        debug!(
            "change seq post-volt: dom {} {} MHz regime {}",
            item.clk_dom_idx, item.freq_mhz, item.regime_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{build, ClkStep};
    use crate::nafll::NafllRegime;
    use crate::test::{self, GPC, HUB, PWR, SYS, XBAR};
    use crate::types::{ClkListItem, PerfState, VoltListItem, IDX_INVALID};
    use kernel::ErrorCode;

    fn state(clks: &[(u8, u16, u8)], volt_uv: u32) -> PerfState {
        let mut state = PerfState::default();
        for &(clk_dom_idx, freq_mhz, regime_id) in clks {
            state
                .clks
                .push(ClkListItem {
                    clk_dom_idx,
                    freq_mhz,
                    regime_id,
                })
                .unwrap();
        }
        state.volts[0] = Some(VoltListItem {
            rail_idx: 0,
            voltage_uv: volt_uv,
        });
        state
    }

    const VR: u8 = NafllRegime::Vr as u8;
    const FFR: u8 = NafllRegime::Ffr as u8;
    const FR: u8 = NafllRegime::Fr as u8;

    fn item(clk_dom_idx: u8, freq_mhz: u16, regime_id: u8) -> ClkListItem {
        ClkListItem {
            clk_dom_idx,
            freq_mhz,
            regime_id,
        }
    }

    #[test]
    fn plain_domains_never_raise_before_the_voltage() {
        let domains = test::domains();
        for cur in (300..=1500).step_by(150) {
            for tgt in (300..=1500).step_by(150) {
                let script = build(
                    &domains,
                    &state(&[(XBAR, cur, IDX_INVALID)], 700_000),
                    &state(&[(XBAR, tgt, IDX_INVALID)], 700_000),
                )
                .unwrap();
                for item in script.pre_volt.entries() {
                    assert!(item.freq_mhz < cur);
                }
                if tgt == cur {
                    assert!(script.pre_volt.is_empty() && script.post_volt.is_empty());
                }
            }
        }
    }

    #[test]
    fn slots_follow_ordering_indices() {
        let domains = test::domains();
        let script = build(
            &domains,
            &state(
                &[
                    (XBAR, 720, IDX_INVALID),
                    (SYS, 360, IDX_INVALID),
                    (HUB, 180, IDX_INVALID),
                ],
                900_000,
            ),
            &state(
                &[
                    (XBAR, 1440, IDX_INVALID),
                    (SYS, 720, IDX_INVALID),
                    (HUB, 90, IDX_INVALID),
                    (PWR, 540, IDX_INVALID),
                ],
                1_000_000,
            ),
        )
        .unwrap();
        // HUB goes down first; XBAR and SYS go up last.
        assert_eq!(script.pre_volt.num_domains(), 4);
        assert_eq!(script.pre_volt.slot(3).map(|item| item.clk_dom_idx), Some(HUB));
        assert_eq!(script.pre_volt.entries().count(), 1);
        assert_eq!(script.post_volt.num_domains(), 3);
        assert_eq!(script.post_volt.slot(2).map(|item| item.clk_dom_idx), Some(XBAR));
        assert_eq!(script.post_volt.slot(1).map(|item| item.clk_dom_idx), Some(SYS));
        assert_eq!(script.post_volt.slot(0), None);
        assert_eq!(script.pre_volt.adc_caps_uv[0], Some(1_000_000));
        assert_eq!(script.post_volt.adc_caps_uv[0], Some(1_000_000));
    }

    #[test]
    fn adc_caps_relax_then_settle() {
        let domains = test::domains();
        let script = build(
            &domains,
            &state(&[(GPC, 999, VR)], 900_000),
            &state(&[(GPC, 783, VR)], 800_000),
        )
        .unwrap();
        assert_eq!(script.pre_volt.adc_caps_uv, [Some(900_000), None]);
        assert_eq!(script.post_volt.adc_caps_uv, [Some(800_000), None]);
        assert_eq!(script.volts[0].map(|volt| volt.voltage_uv), Some(800_000));
    }

    #[test]
    fn vr_rides_with_the_voltage() {
        let domains = test::domains();
        let up = build(
            &domains,
            &state(&[(GPC, 783, VR)], 800_000),
            &state(&[(GPC, 999, VR)], 900_000),
        )
        .unwrap();
        assert_eq!(up.pre_volt.slot(0), Some(&item(GPC, 999, VR)));
        assert!(up.post_volt.is_empty());

        let down = build(
            &domains,
            &state(&[(GPC, 999, VR)], 900_000),
            &state(&[(GPC, 783, VR)], 800_000),
        )
        .unwrap();
        assert!(down.pre_volt.is_empty());
        assert_eq!(down.post_volt.slot(3), Some(&item(GPC, 783, VR)));
    }

    #[test]
    fn ffr_pairs_run_fr_at_the_lower_frequency() {
        let domains = test::domains();
        let script = build(
            &domains,
            &state(&[(GPC, 999, FFR)], 900_000),
            &state(&[(GPC, 594, FFR)], 700_000),
        )
        .unwrap();
        assert_eq!(script.pre_volt.slot(0), Some(&item(GPC, 594, FR)));
        assert_eq!(script.post_volt.slot(3), Some(&item(GPC, 594, FFR)));
    }

    #[test]
    #[cfg(not(feature = "no_freq_controller"))]
    fn fr_runs_at_the_higher_frequency() {
        let domains = test::domains();
        let script = build(
            &domains,
            &state(&[(GPC, 594, VR)], 700_000),
            &state(&[(GPC, 999, FR)], 900_000),
        )
        .unwrap();
        assert_eq!(script.pre_volt.slot(0), Some(&item(GPC, 999, FR)));
        assert_eq!(script.post_volt.slot(3), Some(&item(GPC, 999, FR)));
    }

    #[test]
    fn vr_to_ffr_waits_for_the_voltage() {
        let domains = test::domains();
        let script = build(
            &domains,
            &state(&[(GPC, 999, VR)], 900_000),
            &state(&[(GPC, 1188, FFR)], 1_000_000),
        )
        .unwrap();
        assert!(script.pre_volt.is_empty());
        assert_eq!(script.post_volt.slot(3), Some(&item(GPC, 1188, FFR)));
    }

    #[test]
    fn below_dvco_min_counts_as_ffr() {
        let domains = test::domains();
        // 378 MHz is below the 405 MHz DVCO minimum.
        let script = build(
            &domains,
            &state(&[(GPC, 378, VR)], 600_000),
            &state(&[(GPC, 594, FFR)], 700_000),
        )
        .unwrap();
        assert_eq!(script.pre_volt.slot(0), Some(&item(GPC, 378, FR)));
    }

    #[test]
    fn ffr_to_vr_is_unreachable() {
        let domains = test::domains();
        assert_eq!(
            build(
                &domains,
                &state(&[(GPC, 594, FFR)], 700_000),
                &state(&[(GPC, 999, VR)], 900_000),
            ),
            Err(ErrorCode::STATE)
        );
        assert_eq!(
            build(
                &domains,
                &state(&[(GPC, 594, 4)], 700_000),
                &state(&[(GPC, 999, VR)], 900_000),
            ),
            Err(ErrorCode::INVAL)
        );
    }

    #[test]
    fn slot_collisions() {
        let mut step = ClkStep::new();
        step.place(5, item(GPC, 100, IDX_INVALID)).unwrap();
        assert_eq!(step.num_domains(), 6);
        assert_eq!(
            step.place(5, item(XBAR, 100, IDX_INVALID)),
            Err(ErrorCode::STATE)
        );
        assert_eq!(
            step.place(40, item(XBAR, 100, IDX_INVALID)),
            Err(ErrorCode::INDEX)
        );
    }
}
