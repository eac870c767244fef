// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Shared clock tree and recording fakes for the unit tests.
//!
//! The tree has five domains on rail 0:
//!
//! - GPC: NAFLL primary, 27 MHz NDIV steps, five voltage points.
//! - XBAR: PLL primary with two progs, 30 MHz steps up to 720 MHz and a
//!   single 1440 MHz point above.
//! - SYS and HUB: secondaries of XBAR.
//! - PWR: fixed at 540 MHz.

use core::cell::{Cell, RefCell};
use std::vec::Vec;

use kernel::hil::adc::ClkAdc;
use kernel::hil::clk::{ClkCounter, ClkProgrammer};
use kernel::hil::mailbox::Mailbox;
use kernel::hil::nafll::{LutEntry, NafllLut, NafllMode, SwFreqReq};
use kernel::hil::time::Time;
use kernel::hil::vfe::{Vfe, VfeVar};
use kernel::hil::volt::VoltRail;
use kernel::utilities::fxp::Sfxp20_12;
use kernel::utilities::timed_mutex::TimedMutex;
use kernel::ErrorCode;

use crate::clk::ClkHw;
use crate::desc::{
    AdcDesc, ClkDescriptor, ClkDomainDesc, ClkProgDesc, FreqCtrlDesc, NafllDesc, PropRegimeDesc,
    PropRelDesc, PropTopDesc, CLK_DOMAIN_TYPE_FIXED, CLK_DOMAIN_TYPE_PRIMARY,
    CLK_DOMAIN_TYPE_SECONDARY,
};
use crate::domain::ClkDomains;
use crate::freq_controller::PiParams;
use crate::nafll::LutConfig;
use crate::prog::{
    ClkProg, ClkProgSource, FreqQuantizer, ProgDeltas, SecondaryEntry, SecondaryKind, VfEntry,
};
use crate::prop_top::{ClkPropRelKind, ClkPropTops, CLK_PROP_TABLE_MAX};
use crate::types::{GlobalDeltas, CLK_VOLT_RAIL_MAX, IDX_INVALID};
use crate::vf_point::VfPointKind;

pub(crate) const GPC: u8 = 0;
pub(crate) const XBAR: u8 = 1;
pub(crate) const SYS: u8 = 2;
pub(crate) const HUB: u8 = 3;
pub(crate) const PWR: u8 = 4;

const DOMAIN: ClkDomainDesc = ClkDomainDesc {
    domain_type: CLK_DOMAIN_TYPE_PRIMARY,
    api_id: 0,
    pre_volt_ordering_idx: 0,
    post_volt_ordering_idx: 0,
    freq_delta_min_mhz: -100,
    freq_delta_max_mhz: 100,
    noise_aware: false,
    rail_idx: 0,
    fixed_freq_mhz: 0,
    clk_prog_idx_first: IDX_INVALID,
    clk_prog_idx_last: IDX_INVALID,
    secondary_mask: 0,
    primary_idx: IDX_INVALID,
};

pub(crate) const DOMAINS: [(u8, ClkDomainDesc); 5] = [
    (
        GPC,
        ClkDomainDesc {
            api_id: 0,
            pre_volt_ordering_idx: 0,
            post_volt_ordering_idx: 3,
            noise_aware: true,
            clk_prog_idx_first: 0,
            clk_prog_idx_last: 0,
            ..DOMAIN
        },
    ),
    (
        XBAR,
        ClkDomainDesc {
            api_id: 1,
            pre_volt_ordering_idx: 1,
            post_volt_ordering_idx: 2,
            clk_prog_idx_first: 1,
            clk_prog_idx_last: 2,
            secondary_mask: (1 << SYS) | (1 << HUB),
            ..DOMAIN
        },
    ),
    (
        SYS,
        ClkDomainDesc {
            domain_type: CLK_DOMAIN_TYPE_SECONDARY,
            api_id: 2,
            pre_volt_ordering_idx: 2,
            post_volt_ordering_idx: 1,
            primary_idx: XBAR,
            ..DOMAIN
        },
    ),
    (
        HUB,
        ClkDomainDesc {
            domain_type: CLK_DOMAIN_TYPE_SECONDARY,
            api_id: 3,
            pre_volt_ordering_idx: 3,
            post_volt_ordering_idx: 0,
            primary_idx: XBAR,
            ..DOMAIN
        },
    ),
    (
        PWR,
        ClkDomainDesc {
            domain_type: CLK_DOMAIN_TYPE_FIXED,
            api_id: 7,
            pre_volt_ordering_idx: 4,
            post_volt_ordering_idx: 4,
            fixed_freq_mhz: 540,
            ..DOMAIN
        },
    ),
];

const NO_SECONDARIES: [SecondaryEntry; 4] = [SecondaryEntry::UNUSED; 4];

pub(crate) const PROGS: [(u8, ClkProgDesc); 3] = [
    (
        0,
        ClkProgDesc {
            source: 2,
            freq_max_mhz: 1215,
            freq_step_size_mhz: 0,
            vf_entries: [
                VfEntry {
                    vfe_idx: 0,
                    vf_point_idx_first: 0,
                    vf_point_idx_last: 4,
                },
                VfEntry::UNUSED,
            ],
            secondary_kind: SecondaryKind::Ratio,
            secondary_entries: NO_SECONDARIES,
        },
    ),
    (
        1,
        ClkProgDesc {
            source: 0,
            freq_max_mhz: 720,
            freq_step_size_mhz: 30,
            vf_entries: [
                VfEntry {
                    vfe_idx: 1,
                    vf_point_idx_first: 10,
                    vf_point_idx_last: 11,
                },
                VfEntry::UNUSED,
            ],
            secondary_kind: SecondaryKind::Ratio,
            secondary_entries: [
                SecondaryEntry {
                    clk_dom_idx: SYS,
                    value: 50,
                },
                SecondaryEntry {
                    clk_dom_idx: HUB,
                    value: 25,
                },
                SecondaryEntry::UNUSED,
                SecondaryEntry::UNUSED,
            ],
        },
    ),
    (
        2,
        ClkProgDesc {
            source: 0,
            freq_max_mhz: 1440,
            freq_step_size_mhz: 0,
            vf_entries: [
                VfEntry {
                    vfe_idx: 1,
                    vf_point_idx_first: 12,
                    vf_point_idx_last: 12,
                },
                VfEntry::UNUSED,
            ],
            secondary_kind: SecondaryKind::Table,
            secondary_entries: [
                SecondaryEntry {
                    clk_dom_idx: SYS,
                    value: 720,
                },
                SecondaryEntry {
                    clk_dom_idx: HUB,
                    value: 360,
                },
                SecondaryEntry::UNUSED,
                SecondaryEntry::UNUSED,
            ],
        },
    ),
];

/// GPC voltage points first, so that a prefix drops the top of its curve.
pub(crate) const VF_POINTS: [(u8, VfPointKind); 8] = [
    (
        0,
        VfPointKind::Volt {
            source_voltage_uv: 600_000,
        },
    ),
    (
        1,
        VfPointKind::Volt {
            source_voltage_uv: 700_000,
        },
    ),
    (
        2,
        VfPointKind::Volt {
            source_voltage_uv: 800_000,
        },
    ),
    (
        3,
        VfPointKind::Volt {
            source_voltage_uv: 900_000,
        },
    ),
    (
        4,
        VfPointKind::Volt {
            source_voltage_uv: 1_000_000,
        },
    ),
    (10, VfPointKind::Freq { freq_mhz: 360 }),
    (11, VfPointKind::Freq { freq_mhz: 720 }),
    (12, VfPointKind::Freq { freq_mhz: 1440 }),
];

const fn table(pairs: [(u16, u16); 2]) -> ClkPropRelKind {
    let mut entries = [(0, 0); CLK_PROP_TABLE_MAX];
    entries[0] = pairs[0];
    entries[1] = pairs[1];
    ClkPropRelKind::Table { entries, count: 2 }
}

pub(crate) const PROP_RELS: [(u8, PropRelDesc); 3] = [
    (
        0,
        PropRelDesc {
            src_clk_dom_idx: GPC,
            dst_clk_dom_idx: XBAR,
            kind: ClkPropRelKind::Ratio { pct: 50 },
            bidirectional: true,
        },
    ),
    (
        1,
        PropRelDesc {
            src_clk_dom_idx: GPC,
            dst_clk_dom_idx: XBAR,
            kind: ClkPropRelKind::Volt { rail_idx: 0 },
            bidirectional: false,
        },
    ),
    (
        2,
        PropRelDesc {
            src_clk_dom_idx: XBAR,
            dst_clk_dom_idx: HUB,
            kind: table([(720, 180), (1440, 360)]),
            bidirectional: false,
        },
    ),
];

pub(crate) const PROP_TOPS: [(u8, PropTopDesc); 2] = [
    (
        0,
        PropTopDesc {
            id: 0,
            workload: 0,
            rel_mask: (1 << 0) | (1 << 2),
        },
    ),
    (
        1,
        PropTopDesc {
            id: 1,
            workload: 1,
            rel_mask: 1 << 1,
        },
    ),
];

pub(crate) const PROP_REGIMES: [(u8, PropRegimeDesc); 2] = [
    (
        0,
        PropRegimeDesc {
            id: 0,
            domain_mask: 0x1f,
        },
    ),
    (
        1,
        PropRegimeDesc {
            id: 1,
            domain_mask: 1 << XBAR,
        },
    ),
];

pub(crate) const NAFLL_DEVS: [(u8, NafllDesc); 1] = [(
    0,
    NafllDesc {
        id: 1,
        clk_dom_idx: GPC,
        rail_idx: 0,
        adc_logic_idx: 0,
        adc_sram_idx: IDX_INVALID,
        ref_clk_mhz: 405,
        ref_clk_div: 15,
        lut: LutConfig {
            num_entries: 4,
            vmin_uv: 600_000,
            step_uv: 100_000,
            vfgain: 1,
        },
        dvco_min_vfe_idx: 2,
        default_regime: 1,
    },
)];

pub(crate) const ADC_DEVS: [(u8, AdcDesc); 1] = [(
    0,
    AdcDesc {
        id: 2,
        rail_idx: 0,
        vmin_uv: 500_000,
        step_uv: 6_250,
    },
)];

pub(crate) const FREQ_CTRLS: [(u8, FreqCtrlDesc); 1] = [(
    0,
    FreqCtrlDesc {
        clk_dom_idx: GPC,
        rail_idx: 0,
        cntr_id: 0,
        params: pi_params(),
    },
)];

pub(crate) const fn pi_params() -> PiParams {
    PiParams {
        prop_gain: Sfxp20_12::from_int(10),
        integ_gain: Sfxp20_12::from_int(2),
        // 0.5
        integ_decay: Sfxp20_12::from_bits(1 << 11),
        freq_hyst_pos_mhz: 5,
        freq_hyst_neg_mhz: 5,
        volt_offset_min_uv: -50_000,
        volt_offset_max_uv: 50_000,
    }
}

pub(crate) fn descriptor() -> ClkDescriptor<'static> {
    ClkDescriptor {
        domains: &DOMAINS,
        progs: &PROGS,
        vf_points: &VF_POINTS,
        prop_rels: &PROP_RELS,
        prop_tops: &PROP_TOPS,
        prop_regimes: &PROP_REGIMES,
        nafll_devs: &NAFLL_DEVS,
        adc_devs: &ADC_DEVS,
        freq_ctrls: &FREQ_CTRLS,
        deltas: GlobalDeltas::default(),
        ovoc_enabled: true,
        mailbox_idx: 0,
    }
}

/// GPC 400 MHz + 2 MHz/mV from 0.4 V, XBAR 400 MHz + 2.5 MHz/mV from
/// 0.4 V, DVCO minimum 405 MHz.
pub(crate) fn vfe() -> FakeVfe {
    FakeVfe {
        curves: std::vec![
            Curve::Linear {
                base_uv: 400_000,
                uv_per_mhz: 500,
            },
            Curve::Linear {
                base_uv: 400_000,
                uv_per_mhz: 400,
            },
            Curve::Constant(405),
        ],
    }
}

/// The test tree with a built VF cache.
pub(crate) fn domains() -> ClkDomains {
    let mut domains = ClkDomains::from_desc(&descriptor()).unwrap();
    domains.vf_cache_rebuild(&vfe()).unwrap();
    domains
}

pub(crate) fn prop_tops(domains: &ClkDomains) -> ClkPropTops {
    ClkPropTops::from_desc(&PROP_RELS, &PROP_TOPS, domains).unwrap()
}

pub(crate) fn pll_prog(freq_max_mhz: u16, freq_step_size_mhz: u8) -> ClkProg {
    ClkProg {
        source: ClkProgSource::Pll,
        freq_max_mhz,
        freq_step_size_mhz,
        vf_entries: [VfEntry::UNUSED; 2],
        secondary_kind: SecondaryKind::Ratio,
        secondary_entries: NO_SECONDARIES,
        deltas: ProgDeltas::default(),
    }
}

/// Oscillator producing multiples of a fixed step.
pub(crate) struct StepQuantizer(pub u16);

impl FreqQuantizer for StepQuantizer {
    fn quantize(&self, freq_mhz: u16, floor: bool) -> Result<u16, ErrorCode> {
        let quantized = if floor {
            freq_mhz - freq_mhz % self.0
        } else {
            freq_mhz.div_ceil(self.0) * self.0
        };
        if quantized == 0 {
            return Err(ErrorCode::RANGE);
        }
        Ok(quantized)
    }
}

enum Curve {
    Linear { base_uv: u32, uv_per_mhz: u32 },
    Constant(u32),
    /// `(MHz, uV)` samples, ascending in frequency.
    Table(Vec<(u16, u32)>),
}

/// VF equations, one curve per VFE index.
pub(crate) struct FakeVfe {
    curves: Vec<Curve>,
}

impl FakeVfe {
    pub(crate) fn linear(base_uv: u32, uv_per_mhz: u32) -> Self {
        FakeVfe {
            curves: std::vec![Curve::Linear {
                base_uv,
                uv_per_mhz
            }],
        }
    }

    pub(crate) fn constant(value: u32) -> Self {
        FakeVfe {
            curves: std::vec![Curve::Constant(value)],
        }
    }

    pub(crate) fn table(samples: &[(u16, u32)]) -> Self {
        FakeVfe {
            curves: std::vec![Curve::Table(samples.to_vec())],
        }
    }
}

impl Vfe for FakeVfe {
    fn evaluate(&self, vfe_idx: u8, var: VfeVar) -> Result<u32, ErrorCode> {
        let curve = self
            .curves
            .get(vfe_idx as usize)
            .ok_or(ErrorCode::INDEX)?;
        match (curve, var) {
            (Curve::Constant(value), _) => Ok(*value),
            (
                Curve::Linear {
                    base_uv,
                    uv_per_mhz,
                },
                VfeVar::FreqMhz(freq_mhz),
            ) => Ok(base_uv + uv_per_mhz * freq_mhz),
            (
                Curve::Linear {
                    base_uv,
                    uv_per_mhz,
                },
                VfeVar::VoltUv(voltage_uv),
            ) => Ok(voltage_uv.saturating_sub(*base_uv) / uv_per_mhz),
            (Curve::Table(samples), VfeVar::FreqMhz(freq_mhz)) => samples
                .iter()
                .find(|(freq, _)| *freq as u32 == freq_mhz)
                .map(|(_, voltage_uv)| *voltage_uv)
                .ok_or(ErrorCode::RANGE),
            (Curve::Table(samples), VfeVar::VoltUv(voltage_uv)) => samples
                .iter()
                .rev()
                .find(|(_, voltage)| *voltage <= voltage_uv)
                .map(|(freq, _)| *freq as u32)
                .ok_or(ErrorCode::RANGE),
        }
    }
}

/// Hardware writes, in the order they were issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HwOp {
    LutWrite(u8, u8, u16),
    SwFreqReq(u8, NafllMode, u16),
    LutReadEnable(u8, bool),
    Pldiv(u8, u8),
    AdcPower(u8, bool),
    AdcEnable(u8, bool),
    AdcCap(u8, Option<u8>),
    ClkProgram(u8, u16),
    Volt(u8, u32),
    VoltOffset(u8, i32),
}

#[derive(Default)]
pub(crate) struct OpLog {
    ops: RefCell<Vec<HwOp>>,
}

impl OpLog {
    pub(crate) fn new() -> Self {
        OpLog::default()
    }

    fn record(&self, op: HwOp) {
        self.ops.borrow_mut().push(op);
    }

    /// Everything recorded since the last call.
    pub(crate) fn take(&self) -> Vec<HwOp> {
        self.ops.take()
    }
}

pub(crate) struct FakeNafll<'a> {
    log: &'a OpLog,
    req: Cell<SwFreqReq>,
    pldiv: Cell<u8>,
    pub(crate) dvco_min_reached: Cell<bool>,
}

impl<'a> FakeNafll<'a> {
    pub(crate) fn new(log: &'a OpLog) -> Self {
        FakeNafll {
            log,
            req: Cell::new(SwFreqReq {
                mode: NafllMode::FixedFrequency,
                ndiv: 0,
            }),
            pldiv: Cell::new(1),
            dvco_min_reached: Cell::new(true),
        }
    }
}

impl NafllLut for FakeNafll<'_> {
    fn sw_freq_req(&self, _nafll_id: u8) -> Result<SwFreqReq, ErrorCode> {
        Ok(self.req.get())
    }

    fn set_sw_freq_req(&self, nafll_id: u8, req: SwFreqReq) -> Result<(), ErrorCode> {
        self.log
            .record(HwOp::SwFreqReq(nafll_id, req.mode, req.ndiv));
        self.req.set(req);
        Ok(())
    }

    fn pldiv(&self, _nafll_id: u8) -> Result<u8, ErrorCode> {
        Ok(self.pldiv.get())
    }

    fn set_pldiv(&self, nafll_id: u8, div: u8) -> Result<(), ErrorCode> {
        self.log.record(HwOp::Pldiv(nafll_id, div));
        self.pldiv.set(div);
        Ok(())
    }

    fn set_lut_read_enable(&self, nafll_id: u8, enable: bool) -> Result<(), ErrorCode> {
        self.log.record(HwOp::LutReadEnable(nafll_id, enable));
        Ok(())
    }

    fn lut_write(&self, nafll_id: u8, idx: u8, entry: LutEntry) -> Result<(), ErrorCode> {
        self.log.record(HwOp::LutWrite(nafll_id, idx, entry.ndiv));
        Ok(())
    }

    fn dvco_min_reached(&self, _nafll_id: u8) -> Result<bool, ErrorCode> {
        Ok(self.dvco_min_reached.get())
    }
}

pub(crate) struct FakeAdc<'a> {
    log: &'a OpLog,
    pub(crate) ready: Cell<bool>,
}

impl<'a> FakeAdc<'a> {
    pub(crate) fn new(log: &'a OpLog) -> Self {
        FakeAdc {
            log,
            ready: Cell::new(true),
        }
    }
}

impl ClkAdc for FakeAdc<'_> {
    fn set_powered(&self, adc_id: u8, powered: bool) -> Result<(), ErrorCode> {
        self.log.record(HwOp::AdcPower(adc_id, powered));
        Ok(())
    }

    fn set_enabled(&self, adc_id: u8, enabled: bool) -> Result<(), ErrorCode> {
        self.log.record(HwOp::AdcEnable(adc_id, enabled));
        Ok(())
    }

    fn is_ready(&self, _adc_id: u8) -> Result<bool, ErrorCode> {
        Ok(self.ready.get())
    }

    fn set_code_cap(&self, adc_id: u8, cap: Option<u8>) -> Result<(), ErrorCode> {
        self.log.record(HwOp::AdcCap(adc_id, cap));
        Ok(())
    }
}

pub(crate) struct FakeProgrammer<'a> {
    log: &'a OpLog,
}

impl ClkProgrammer for FakeProgrammer<'_> {
    fn program(&self, api_domain: u8, freq_mhz: u16) -> Result<(), ErrorCode> {
        self.log.record(HwOp::ClkProgram(api_domain, freq_mhz));
        Ok(())
    }
}

/// Counter running at 1 GHz of the test timer's time.
#[derive(Default)]
pub(crate) struct FakeCounter {
    count: Cell<u64>,
}

impl ClkCounter for FakeCounter {
    fn read(&self, _cntr_id: u8) -> Result<u64, ErrorCode> {
        let count = self.count.get();
        self.count.set(count + 1_000);
        Ok(count)
    }
}

pub(crate) struct FakeVolt<'a> {
    log: &'a OpLog,
    voltage_uv: [Cell<u32>; CLK_VOLT_RAIL_MAX],
    pub(crate) fail: Cell<bool>,
}

impl VoltRail for FakeVolt<'_> {
    fn set_voltage(&self, rail_idx: u8, voltage_uv: u32) -> Result<(), ErrorCode> {
        if self.fail.get() {
            return Err(ErrorCode::FAIL);
        }
        self.log.record(HwOp::Volt(rail_idx, voltage_uv));
        self.voltage_uv
            .get(rail_idx as usize)
            .ok_or(ErrorCode::INDEX)?
            .set(voltage_uv);
        Ok(())
    }

    fn voltage(&self, rail_idx: u8) -> Result<u32, ErrorCode> {
        self.voltage_uv
            .get(rail_idx as usize)
            .map(Cell::get)
            .ok_or(ErrorCode::INDEX)
    }

    fn set_voltage_offset(&self, rail_idx: u8, offset_uv: i32) -> Result<(), ErrorCode> {
        self.log.record(HwOp::VoltOffset(rail_idx, offset_uv));
        Ok(())
    }
}

/// Timer that advances 1 us every time it is read.
#[derive(Default)]
pub(crate) struct TestTimer {
    now: Cell<u64>,
}

impl TestTimer {
    pub(crate) fn new() -> Self {
        TestTimer::default()
    }
}

impl Time for TestTimer {
    fn now_ns(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + 1_000);
        now
    }
}

pub(crate) struct FakeMailbox {
    words: [Cell<u32>; 16],
}

impl FakeMailbox {
    pub(crate) fn new() -> Self {
        FakeMailbox {
            words: core::array::from_fn(|_| Cell::new(0)),
        }
    }
}

impl Mailbox for FakeMailbox {
    fn write(&self, idx: u8, value: u32) {
        if let Some(word) = self.words.get(idx as usize) {
            word.set(value);
        }
    }

    fn read(&self, idx: u8) -> u32 {
        self.words.get(idx as usize).map_or(0, Cell::get)
    }
}

/// Every fake a [`crate::clk::Clk`] drives, sharing one log.
pub(crate) struct Bench<'a> {
    pub(crate) log: &'a OpLog,
    pub(crate) vfe: FakeVfe,
    pub(crate) nafll: FakeNafll<'a>,
    pub(crate) adc: FakeAdc<'a>,
    pub(crate) prog: FakeProgrammer<'a>,
    pub(crate) cntr: FakeCounter,
    pub(crate) volt: FakeVolt<'a>,
    pub(crate) timer: TestTimer,
    pub(crate) mailbox: FakeMailbox,
    pub(crate) mutex: TimedMutex,
}

impl<'a> Bench<'a> {
    pub(crate) fn new(log: &'a OpLog) -> Self {
        Bench {
            log,
            vfe: vfe(),
            nafll: FakeNafll::new(log),
            adc: FakeAdc::new(log),
            prog: FakeProgrammer { log },
            cntr: FakeCounter::default(),
            volt: FakeVolt {
                log,
                voltage_uv: Default::default(),
                fail: Cell::new(false),
            },
            timer: TestTimer::new(),
            mailbox: FakeMailbox::new(),
            mutex: TimedMutex::new(),
        }
    }

    pub(crate) fn hw(&'a self) -> ClkHw<'a> {
        ClkHw {
            vfe: &self.vfe,
            nafll: &self.nafll,
            adc: &self.adc,
            prog: &self.prog,
            cntr: &self.cntr,
            volt: &self.volt,
            timer: &self.timer,
            mailbox: &self.mailbox,
            mutex: &self.mutex,
        }
    }
}
