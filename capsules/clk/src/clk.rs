// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! The clock subsystem.
//!
//! `Clk` owns every clock table of the PMU and is constructed once, at boot,
//! from the descriptor supplied by the host driver. It is handed by
//! reference to whichever task needs it; there is no global instance.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let hw = ClkHw {
//!     vfe: &perf.vfe,
//!     nafll: &chip.nafll,
//!     adc: &chip.adc,
//!     prog: &board.pll,
//!     cntr: &chip.clk_cntr,
//!     volt: &board.volt,
//!     timer: &chip.ptimer,
//!     mailbox: &chip.mailbox,
//!     mutex: &CLK_MUTEX,
//! };
//! let mut clk = Clk::new(hw, &descriptor)?;
//! clk.vf_cache_invalidate(TASK_PERF)?;
//!
//! let script = clk.change_seq_build(&current, &target)?;
//! clk.change_seq_execute(TASK_PERF, &script)?;
//! ```
//!
//! Lookups and quantization only read the tables. Everything that writes
//! them, or drives the hardware, first takes the clock mutex.

use kernel::hil::adc::ClkAdc;
use kernel::hil::clk::{ClkCounter, ClkProgrammer};
use kernel::hil::mailbox::Mailbox;
use kernel::hil::nafll::NafllLut;
use kernel::hil::time::Time;
use kernel::hil::vfe::Vfe;
use kernel::hil::volt::VoltRail;
use kernel::utilities::timed_mutex::{TimedMutex, TimedMutexGuard, CLK_MUTEX_TIMEOUT_NS};
use kernel::{trap, ErrorCode};

use crate::adc::{AdcDevice, AdcDevices};
use crate::change_seq::{self, ChangeSeqScript, ClkStep};
use crate::clk_cntr::{ClkCntr, ClkCntrs};
use crate::desc::ClkDescriptor;
use crate::domain::ClkDomains;
use crate::freq_controller::{FreqController, FreqControllers, FreqCtrlClient, FreqSample};
use crate::mailbox::{self, ClkStage, ClkStatus};
use crate::nafll::NafllProgram;
use crate::prog::ProgDeltas;
use crate::prop_regime::ClkPropRegimes;
use crate::prop_top::ClkPropTops;
use crate::types::{
    ClkList, ClkListItem, FreqDelta, GlobalDeltas, PerfState, VfInput, VfOutput, VoltageType,
    CLK_VOLT_RAIL_MAX, IDX_INVALID,
};
use crate::vf_point::VfPointDeltas;

/// Hardware and services the clock subsystem drives.
#[derive(Clone, Copy)]
pub struct ClkHw<'a> {
    pub vfe: &'a dyn Vfe,
    pub nafll: &'a dyn NafllLut,
    pub adc: &'a dyn ClkAdc,
    /// Generators of the domains without a NAFLL.
    pub prog: &'a dyn ClkProgrammer,
    pub cntr: &'a dyn ClkCounter,
    pub volt: &'a dyn VoltRail,
    pub timer: &'a dyn Time,
    pub mailbox: &'a dyn Mailbox,
    pub mutex: &'a TimedMutex,
}

pub struct Clk<'a> {
    hw: ClkHw<'a>,
    domains: ClkDomains,
    prop_tops: ClkPropTops,
    prop_regimes: ClkPropRegimes,
    adcs: AdcDevices,
    ctrls: FreqControllers,
    cntrs: ClkCntrs,
    mailbox_idx: u8,
}

impl<'a> Clk<'a> {
    /// Build every table from `desc` and bring up the ADCs.
    ///
    /// The VF cache starts dirty: call [`Clk::vf_cache_invalidate`] once
    /// the VF equations are loaded, before programming any clock.
    pub fn new(hw: ClkHw<'a>, desc: &ClkDescriptor) -> Result<Self, ErrorCode> {
        let domains = ClkDomains::from_desc(desc)?;
        let prop_tops = ClkPropTops::from_desc(desc.prop_rels, desc.prop_tops, &domains)?;
        let prop_regimes = ClkPropRegimes::from_desc(desc.prop_regimes)?;

        let mut adcs = AdcDevices::new();
        for (idx, adc) in desc.adc_devs {
            let dev = AdcDevice::new(adc.id, adc.rail_idx, adc.vmin_uv, adc.step_uv)
                .map_err(|err| trap!(err))?;
            adcs.insert(*idx, dev).map_err(|err| trap!(err))?;
        }
        for (_, dev) in domains.nafll().iter() {
            adcs.get(dev.adc_logic_idx).map_err(|err| trap!(err))?;
            if let Some(sram_idx) = dev.adc_sram_idx {
                adcs.get(sram_idx).map_err(|err| trap!(err))?;
            }
        }

        let mut ctrls = FreqControllers::new();
        let mut cntrs = ClkCntrs::new();
        for (idx, ctrl) in desc.freq_ctrls {
            domains.domain(ctrl.clk_dom_idx)?;
            let controller = FreqController::new(ctrl.clk_dom_idx, ctrl.rail_idx, ctrl.params)
                .map_err(|err| trap!(err))?;
            ctrls.insert(*idx, controller).map_err(|err| trap!(err))?;
            cntrs
                .insert(ctrl.clk_dom_idx, ClkCntr::new(ctrl.cntr_id))
                .map_err(|err| trap!(err))?;
        }

        adcs.init(hw.adc, hw.timer)?;

        Ok(Clk {
            hw,
            domains,
            prop_tops,
            prop_regimes,
            adcs,
            ctrls,
            cntrs,
            mailbox_idx: desc.mailbox_idx,
        })
    }

    pub fn domains(&self) -> &ClkDomains {
        &self.domains
    }

    pub fn adcs(&self) -> &AdcDevices {
        &self.adcs
    }

    pub fn freq_ctrls(&self) -> &FreqControllers {
        &self.ctrls
    }

    pub fn prop_tops(&self) -> &ClkPropTops {
        &self.prop_tops
    }

    fn lock(&self, task: u8) -> Result<TimedMutexGuard<'a>, ErrorCode> {
        let hw = self.hw;
        hw.mutex
            .acquire(task, hw.timer, CLK_MUTEX_TIMEOUT_NS)
            .map_err(|err| trap!(err))
    }

    /// Report a failed operation to the host and hand the error back.
    fn fail(&self, err: ErrorCode, stage: ClkStage, clk_dom_idx: u8, data: u16) -> ErrorCode {
        mailbox::report(
            self.hw.mailbox,
            self.mailbox_idx,
            ClkStatus::failed(err, stage, clk_dom_idx, data),
        );
        err
    }

    // Command surface. Search exhaustion comes back as `Ok(None)`.

    pub fn volt_to_freq(
        &self,
        clk_dom_idx: u8,
        rail_idx: u8,
        voltage_type: VoltageType,
        input: VfInput,
    ) -> Result<Option<VfOutput>, ErrorCode> {
        self.domains
            .volt_to_freq(clk_dom_idx, rail_idx, voltage_type, input, None)
    }

    pub fn freq_to_volt(
        &self,
        clk_dom_idx: u8,
        rail_idx: u8,
        voltage_type: VoltageType,
        input: VfInput,
    ) -> Result<Option<VfOutput>, ErrorCode> {
        self.domains
            .freq_to_volt(clk_dom_idx, rail_idx, voltage_type, input, None)
    }

    pub fn freq_quantize(
        &self,
        clk_dom_idx: u8,
        freq_mhz: u16,
        floor: bool,
    ) -> Result<Option<u16>, ErrorCode> {
        self.domains.freq_quantize(clk_dom_idx, freq_mhz, floor)
    }

    pub fn client_freq_delta_adjust(&self, clk_dom_idx: u8, freq_mhz: u16) -> Result<u16, ErrorCode> {
        self.domains.client_freq_delta_adjust(clk_dom_idx, freq_mhz)
    }

    pub fn freqs_enumerate(&self, clk_dom_idx: u8, out: &mut [u16]) -> Result<usize, ErrorCode> {
        self.domains.freqs_enumerate(clk_dom_idx, out)
    }

    /// Rebuild the VF cache from the VF equations and reprogram the NAFLL
    /// LUTs from it.
    pub fn vf_cache_invalidate(&mut self, task: u8) -> Result<(), ErrorCode> {
        let _guard = self.lock(task)?;
        let hw = self.hw;
        let rebuilt = self.domains.vf_cache_rebuild(hw.vfe);
        rebuilt.map_err(|err| self.fail(err, ClkStage::VfCacheInvalidate, IDX_INVALID, 0))?;
        let programmed = self.domains.nafll_lut_update(hw.nafll);
        programmed.map_err(|err| self.fail(err, ClkStage::NafllLut, IDX_INVALID, 0))
    }

    // Client offsets. They take effect at the next cache invalidation.

    pub fn set_domain_freq_delta(
        &mut self,
        task: u8,
        clk_dom_idx: u8,
        delta: FreqDelta,
    ) -> Result<(), ErrorCode> {
        let _guard = self.lock(task)?;
        self.domains.set_domain_freq_delta(clk_dom_idx, delta)
    }

    pub fn set_prog_deltas(
        &mut self,
        task: u8,
        clk_prog_idx: u8,
        deltas: ProgDeltas,
    ) -> Result<(), ErrorCode> {
        let _guard = self.lock(task)?;
        self.domains.set_prog_deltas(clk_prog_idx, deltas)
    }

    pub fn set_vf_point_deltas(
        &mut self,
        task: u8,
        vf_point_idx: u8,
        deltas: VfPointDeltas,
    ) -> Result<(), ErrorCode> {
        let _guard = self.lock(task)?;
        self.domains.set_vf_point_deltas(vf_point_idx, deltas)
    }

    pub fn set_global_deltas(&mut self, task: u8, deltas: GlobalDeltas) -> Result<(), ErrorCode> {
        let _guard = self.lock(task)?;
        self.domains.set_global_deltas(deltas);
        Ok(())
    }

    pub fn set_ovoc_enabled(&mut self, task: u8, enabled: bool) -> Result<(), ErrorCode> {
        let _guard = self.lock(task)?;
        self.domains.set_ovoc_enabled(enabled);
        Ok(())
    }

    /// Derive the list entries outside `src_mask` from the ones inside it,
    /// limited to the domains of propagation regime `regime_id`.
    pub fn propagate(
        &self,
        regime_id: u8,
        list: &mut ClkList,
        src_mask: u32,
    ) -> Result<(), ErrorCode> {
        let regime_mask = self
            .prop_regimes
            .domain_mask(regime_id)
            .map_err(|err| trap!(err))?;
        self.prop_tops
            .propagate(&self.domains, regime_mask, list, src_mask)
    }

    /// Activate the topology tuned for `workload` and return its id.
    pub fn select_prop_top(&mut self, workload: u8) -> Result<u8, ErrorCode> {
        self.prop_tops.select_by_workload(workload)
    }

    /// Pin topology `id` regardless of workload, or release the pin.
    pub fn force_prop_top(&mut self, id: Option<u8>) -> Result<(), ErrorCode> {
        self.prop_tops.force(id)
    }

    pub fn change_seq_build(
        &self,
        current: &PerfState,
        target: &PerfState,
    ) -> Result<ChangeSeqScript, ErrorCode> {
        change_seq::build(&self.domains, current, target)
    }

    /// Run `script`: pre-volt clocks, rail voltages, post-volt clocks.
    ///
    /// Each step completes before the next one starts. The first failure
    /// ends the script and is reported on the mailbox.
    pub fn change_seq_execute(&mut self, task: u8, script: &ChangeSeqScript) -> Result<(), ErrorCode> {
        let _guard = self.lock(task)?;
        let hw = self.hw;
        self.run_step(&script.pre_volt, ClkStage::PreVoltClks)?;
        for volt in script.volts.iter().flatten() {
            let mv = (volt.voltage_uv / 1000).min(u16::MAX as u32) as u16;
            let set = match hw.volt.voltage(volt.rail_idx) {
                Ok(current) if current == volt.voltage_uv => Ok(()),
                _ => hw.volt.set_voltage(volt.rail_idx, volt.voltage_uv),
            };
            set.map_err(|err| self.fail(trap!(err), ClkStage::Volt, IDX_INVALID, mv))?;
        }
        self.run_step(&script.post_volt, ClkStage::PostVoltClks)
    }

    fn run_step(&mut self, step: &ClkStep, stage: ClkStage) -> Result<(), ErrorCode> {
        let hw = self.hw;
        for (rail_idx, cap) in step.adc_caps_uv.iter().enumerate() {
            let capped = self.adcs.set_voltage_cap(rail_idx as u8, *cap, hw.adc);
            capped.map_err(|err| self.fail(err, stage, IDX_INVALID, 0))?;
        }
        for item in step.entries() {
            let programmed = self.program(item);
            programmed.map_err(|err| self.fail(err, stage, item.clk_dom_idx, item.freq_mhz))?;
        }
        Ok(())
    }

    /// Program one domain outside of a change sequencer script.
    pub fn clk_program(&mut self, task: u8, item: ClkListItem) -> Result<(), ErrorCode> {
        let _guard = self.lock(task)?;
        self.program(&item)
    }

    fn program(&mut self, item: &ClkListItem) -> Result<(), ErrorCode> {
        let hw = self.hw;
        let api_id = self.domains.domain(item.clk_dom_idx)?.api_id;
        if self.domains.nafll().for_domain(item.clk_dom_idx).is_some() {
            let mut ctx = NafllProgram {
                hw: hw.nafll,
                adc_hw: hw.adc,
                timer: hw.timer,
                adcs: &mut self.adcs,
                ctrls: &mut self.ctrls,
            };
            self.domains.nafll_mut().program_domain(
                item.clk_dom_idx,
                item.freq_mhz,
                item.regime_id,
                &mut ctx,
            )?;
        } else {
            hw.prog.program(api_id as u8, item.freq_mhz)?;
        }
        self.cntrs
            .set_target(item.clk_dom_idx, item.freq_mhz, hw.timer.now_ns());
        Ok(())
    }

    /// One frequency controller cycle: sample the clock counters, run the
    /// enabled controllers and apply the resulting offset to every rail.
    pub fn freq_ctrl_eval(&mut self, task: u8) -> Result<[i32; CLK_VOLT_RAIL_MAX], ErrorCode> {
        let _guard = self.lock(task)?;
        let hw = self.hw;
        let cntrs = &mut self.cntrs;
        let evaluated = self
            .ctrls
            .eval(&mut |ctrl: &FreqController| -> Result<FreqSample, ErrorCode> {
                cntrs.sample(ctrl.clk_dom_idx, hw.cntr, hw.timer.now_ns())
            });
        let deltas =
            evaluated.map_err(|err| self.fail(err, ClkStage::FreqController, IDX_INVALID, 0))?;
        for (rail_idx, delta) in deltas.iter().enumerate() {
            hw.volt.set_voltage_offset(rail_idx as u8, *delta)?;
        }
        Ok(deltas)
    }

    /// Hold the frequency controllers of `clk_dom_idx` off on behalf of the
    /// host, or release them.
    pub fn freq_ctrl_disable(
        &mut self,
        task: u8,
        clk_dom_idx: u8,
        disable: bool,
    ) -> Result<(), ErrorCode> {
        let _guard = self.lock(task)?;
        self.ctrls
            .disable(clk_dom_idx, FreqCtrlClient::Host, disable);
        Ok(())
    }
}
