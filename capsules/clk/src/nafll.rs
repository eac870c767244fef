// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! NAFLL devices and their regime state machine.
//!
//! A NAFLL runs in one of these regimes:
//!
//! - FFR, fixed frequency: the oscillator follows the software NDIV and
//!   ignores its LUT. The ADC is not needed.
//! - FR, frequency regime: the oscillator runs at the larger of the software
//!   NDIV and the LUT NDIV. The frequency controller of the domain is active.
//! - VR, voltage regime: the oscillator follows the LUT only.
//! - FFR below DVCO min: FFR for targets the DVCO cannot produce. The DVCO
//!   runs at a multiple of the target and the post divider (PLDIV) brings it
//!   down.
//!
//! Programming a regime change keeps this order:
//!
//! 1. ADCs up when the new regime reads the LUT,
//! 2. PLDIV disengaged, after the DVCO reached its minimum, when the divider
//!    shrinks,
//! 3. frequency controller held off when leaving FR,
//! 4. LUT reads and the software request,
//! 5. frequency controller released when entering FR,
//! 6. PLDIV engaged when the divider grows,
//! 7. ADCs released when the new regime ignores the LUT,
//! 8. DVCO minimum holds on the frequency controller updated.

use kernel::hil::adc::ClkAdc;
use kernel::hil::nafll::{LutEntry, NafllLut, NafllMode, SwFreqReq};
use kernel::hil::time::Time;
use kernel::hil::vfe::{Vfe, VfeVar};
use kernel::utilities::spin_wait::spin_wait_ns;
use kernel::{debug, trap, ErrorCode};

use crate::adc::{AdcClient, AdcDevices};
use crate::config::CONFIG;
use crate::freq_controller::{FreqControllers, FreqCtrlClient};
use crate::group::ObjGroup;
use crate::prog::FreqQuantizer;
use crate::types::{CLK_NAFLL_MAX, IDX_INVALID};

/// Largest post divider used below the DVCO minimum.
pub const NAFLL_PLDIV_MAX: u8 = 16;

/// Entries of a NAFLL LUT.
pub const NAFLL_LUT_MAX_ENTRIES: usize = 64;

/// Time the DVCO may take to reach its minimum after a divider change.
pub const NAFLL_DVCO_MIN_WAIT_NS: u64 = 5_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NafllRegime {
    Vr = 1,
    Ffr = 2,
    Fr = 3,
    FfrBelowDvcoMin = 5,
}

impl TryFrom<u8> for NafllRegime {
    type Error = ErrorCode;

    fn try_from(id: u8) -> Result<Self, ErrorCode> {
        match id {
            1 => Ok(NafllRegime::Vr),
            2 => Ok(NafllRegime::Ffr),
            3 => Ok(NafllRegime::Fr),
            5 => Ok(NafllRegime::FfrBelowDvcoMin),
            _ => Err(ErrorCode::INVAL),
        }
    }
}

impl NafllRegime {
    /// Regime family, with the below-DVCO-min variant folded into FFR.
    pub fn family(self) -> NafllRegime {
        match self {
            NafllRegime::FfrBelowDvcoMin => NafllRegime::Ffr,
            regime => regime,
        }
    }

    fn sw_mode(self) -> NafllMode {
        match self {
            NafllRegime::Ffr | NafllRegime::FfrBelowDvcoMin => NafllMode::FixedFrequency,
            NafllRegime::Fr => NafllMode::MinFrequency,
            NafllRegime::Vr => NafllMode::Voltage,
        }
    }

    /// Whether the oscillator reads its LUT, and so needs its ADCs.
    fn reads_lut(self) -> bool {
        matches!(self, NafllRegime::Fr | NafllRegime::Vr)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegimeState {
    pub target_regime: NafllRegime,
    /// None until the device has been programmed once.
    pub current_regime: Option<NafllRegime>,
    pub target_freq_mhz: u16,
    pub current_freq_mhz: u16,
    /// Programmed minus requested frequency.
    pub offset_freq_mhz: i16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LutConfig {
    pub num_entries: u8,
    /// Voltage of entry 0.
    pub vmin_uv: u32,
    /// Voltage between two entries.
    pub step_uv: u32,
    pub vfgain: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NafllDevice {
    /// Hardware instance.
    pub id: u8,
    pub clk_dom_idx: u8,
    pub rail_idx: u8,
    pub adc_logic_idx: u8,
    pub adc_sram_idx: Option<u8>,
    pub ref_clk_mhz: u16,
    pub ref_clk_div: u16,
    pub lut: LutConfig,
    pub dvco_min_vfe_idx: u8,
    /// Regime used when a request leaves the choice to the firmware.
    pub default_regime: NafllRegime,
    dvco_min_mhz: u16,
    lut_initialized: bool,
    regime: RegimeState,
}

impl NafllDevice {
    pub fn new(
        id: u8,
        clk_dom_idx: u8,
        rail_idx: u8,
        adc_logic_idx: u8,
        adc_sram_idx: Option<u8>,
        ref_clk_mhz: u16,
        ref_clk_div: u16,
        lut: LutConfig,
        dvco_min_vfe_idx: u8,
        default_regime: NafllRegime,
    ) -> Result<Self, ErrorCode> {
        if ref_clk_div == 0
            || ref_clk_mhz < ref_clk_div
            || lut.num_entries as usize > NAFLL_LUT_MAX_ENTRIES
        {
            return Err(ErrorCode::INVAL);
        }
        Ok(NafllDevice {
            id,
            clk_dom_idx,
            rail_idx,
            adc_logic_idx,
            adc_sram_idx,
            ref_clk_mhz,
            ref_clk_div,
            lut,
            dvco_min_vfe_idx,
            default_regime,
            dvco_min_mhz: 0,
            lut_initialized: false,
            regime: RegimeState {
                target_regime: default_regime,
                current_regime: None,
                target_freq_mhz: 0,
                current_freq_mhz: 0,
                offset_freq_mhz: 0,
            },
        })
    }

    pub fn regime(&self) -> &RegimeState {
        &self.regime
    }

    pub fn dvco_min_mhz(&self) -> u16 {
        self.dvco_min_mhz
    }

    pub fn is_lut_initialized(&self) -> bool {
        self.lut_initialized
    }

    /// Frequency of one NDIV step.
    fn step_mhz(&self) -> u16 {
        self.ref_clk_mhz / self.ref_clk_div
    }

    fn ndiv(&self, freq_mhz: u16) -> u16 {
        (freq_mhz as u32 * self.ref_clk_div as u32 / self.ref_clk_mhz as u32) as u16
    }

    fn ndiv_to_freq(&self, ndiv: u16) -> u16 {
        (ndiv as u32 * self.ref_clk_mhz as u32 / self.ref_clk_div as u32).min(u16::MAX as u32)
            as u16
    }

    /// Regime the device ends up in for a request of `freq_mhz` in regime
    /// `regime_id`, [`IDX_INVALID`] selecting the device default.
    ///
    /// Without frequency controllers FR falls back to VR. Targets below the
    /// DVCO minimum always run in FFR below DVCO min.
    pub fn resolve_regime(&self, freq_mhz: u16, regime_id: u8) -> Result<NafllRegime, ErrorCode> {
        if freq_mhz == 0 {
            return Err(trap!(ErrorCode::INVAL));
        }
        let requested = if regime_id == IDX_INVALID {
            self.default_regime
        } else {
            NafllRegime::try_from(regime_id).map_err(|err| trap!(err))?
        };

        let regime = match requested {
            NafllRegime::Fr if !CONFIG.freq_controller => NafllRegime::Vr,
            regime => regime,
        };
        Ok(if freq_mhz < self.dvco_min_mhz {
            NafllRegime::FfrBelowDvcoMin
        } else if regime == NafllRegime::FfrBelowDvcoMin {
            NafllRegime::Ffr
        } else {
            regime
        })
    }

    /// Pick the regime for a request of `freq_mhz` in regime `regime_id`.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INVAL]\): unknown regime, or no frequency.
    /// + [Err]\([ErrorCode::STATE]\): the LUT was never programmed.
    pub fn configure(&mut self, freq_mhz: u16, regime_id: u8) -> Result<(), ErrorCode> {
        if !self.lut_initialized {
            return Err(trap!(ErrorCode::STATE));
        }
        self.regime.target_regime = self.resolve_regime(freq_mhz, regime_id)?;
        self.regime.target_freq_mhz = freq_mhz;
        Ok(())
    }

    fn target_pldiv(&self) -> u8 {
        if self.regime.target_regime != NafllRegime::FfrBelowDvcoMin {
            return 1;
        }
        let div = (self.dvco_min_mhz as u32).div_ceil(self.regime.target_freq_mhz.max(1) as u32);
        div.clamp(1, NAFLL_PLDIV_MAX as u32) as u8
    }

    fn set_adc_client(
        &self,
        idx: u8,
        needed: bool,
        ctx: &mut NafllProgram<'_>,
    ) -> Result<(), ErrorCode> {
        let client = AdcClient::Nafll(idx);
        ctx.adcs
            .set_client(self.adc_logic_idx, client, needed, ctx.adc_hw, ctx.timer)?;
        if let Some(sram_idx) = self.adc_sram_idx {
            ctx.adcs
                .set_client(sram_idx, client, needed, ctx.adc_hw, ctx.timer)?;
        }
        Ok(())
    }

    /// Move the hardware from the current to the target regime.
    fn program(
        &mut self,
        idx: u8,
        dvco_min_worst_mhz: u16,
        ctx: &mut NafllProgram<'_>,
    ) -> Result<(), ErrorCode> {
        let target = self.regime.target_regime;
        let current = self.regime.current_regime;
        let freq_mhz = self.regime.target_freq_mhz;
        let pldiv = self.target_pldiv();
        let old_pldiv = ctx.hw.pldiv(self.id)?;
        let ndiv = self.ndiv(freq_mhz.saturating_mul(pldiv as u16));

        if CONFIG.trace_nafll {
            debug!(
                "nafll {}: {:?} -> {:?} {} MHz ndiv {} pldiv {}",
                self.id, current, target, freq_mhz, ndiv, pldiv
            );
        }

        if target.reads_lut() {
            self.set_adc_client(idx, true, ctx)?;
        }

        if pldiv < old_pldiv {
            let hw = ctx.hw;
            let id = self.id;
            spin_wait_ns(ctx.timer, NAFLL_DVCO_MIN_WAIT_NS, || hw.dvco_min_reached(id))
                .map_err(|err| trap!(err))?;
            ctx.hw.set_pldiv(self.id, pldiv)?;
        }

        if current == Some(NafllRegime::Fr) && target != NafllRegime::Fr {
            ctx.ctrls
                .disable(self.clk_dom_idx, FreqCtrlClient::Regime, true);
        }

        if target.reads_lut() {
            ctx.hw.set_lut_read_enable(self.id, true)?;
        }
        let req = SwFreqReq {
            mode: target.sw_mode(),
            ndiv,
        };
        if ctx.hw.sw_freq_req(self.id)? != req {
            ctx.hw.set_sw_freq_req(self.id, req)?;
        }
        if !target.reads_lut() {
            ctx.hw.set_lut_read_enable(self.id, false)?;
        }

        if target == NafllRegime::Fr && current != Some(NafllRegime::Fr) {
            ctx.ctrls
                .disable(self.clk_dom_idx, FreqCtrlClient::Regime, false);
        }

        if pldiv > old_pldiv {
            ctx.hw.set_pldiv(self.id, pldiv)?;
        }

        if !target.reads_lut() {
            self.set_adc_client(idx, false, ctx)?;
        }

        // The device and the chip wide minimum hold the controller off
        // independently; it runs only when neither does.
        ctx.ctrls.disable(
            self.clk_dom_idx,
            FreqCtrlClient::DvcoMin,
            freq_mhz < self.dvco_min_mhz,
        );
        ctx.ctrls.disable(
            self.clk_dom_idx,
            FreqCtrlClient::DvcoMinWorstCase,
            freq_mhz < dvco_min_worst_mhz,
        );

        let programmed = self.ndiv_to_freq(ndiv) / pldiv as u16;
        self.regime.current_regime = Some(target);
        self.regime.current_freq_mhz = freq_mhz;
        self.regime.offset_freq_mhz = (programmed as i32 - freq_mhz as i32) as i16;
        Ok(())
    }

    /// Write the LUT from `entries`.
    fn lut_write(&mut self, hw: &dyn NafllLut, entries: &[LutEntry]) -> Result<(), ErrorCode> {
        for (idx, entry) in entries.iter().enumerate() {
            hw.lut_write(self.id, idx as u8, *entry)?;
        }
        self.lut_initialized = true;
        Ok(())
    }
}

impl FreqQuantizer for NafllDevice {
    fn quantize(&self, freq_mhz: u16, floor: bool) -> Result<u16, ErrorCode> {
        let step = self.step_mhz();
        let quantized = if floor {
            freq_mhz - freq_mhz % step
        } else {
            (freq_mhz as u32)
                .div_ceil(step as u32)
                .max(1)
                .saturating_mul(step as u32)
                .min((u16::MAX - u16::MAX % step) as u32) as u16
        };
        if quantized == 0 {
            return Err(ErrorCode::RANGE);
        }
        Ok(quantized)
    }
}

/// Collaborators a regime change drives besides the NAFLL itself.
pub struct NafllProgram<'a> {
    pub hw: &'a dyn NafllLut,
    pub adc_hw: &'a dyn ClkAdc,
    pub timer: &'a dyn Time,
    pub adcs: &'a mut AdcDevices,
    pub ctrls: &'a mut FreqControllers,
}

pub struct NafllDevices {
    devs: ObjGroup<NafllDevice, CLK_NAFLL_MAX>,
    dvco_min_worst_mhz: u16,
}

impl NafllDevices {
    pub fn new() -> Self {
        NafllDevices {
            devs: ObjGroup::new(),
            dvco_min_worst_mhz: 0,
        }
    }

    pub fn insert(&mut self, idx: u8, dev: NafllDevice) -> Result<(), ErrorCode> {
        self.devs.insert(idx, dev)
    }

    pub fn get(&self, idx: u8) -> Result<&NafllDevice, ErrorCode> {
        self.devs.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &NafllDevice)> + '_ {
        self.devs.iter()
    }

    /// Highest DVCO minimum of all devices.
    pub fn dvco_min_worst_mhz(&self) -> u16 {
        self.dvco_min_worst_mhz
    }

    /// First device driving `clk_dom_idx`. All devices of a domain share
    /// their configuration.
    pub fn for_domain(&self, clk_dom_idx: u8) -> Option<&NafllDevice> {
        self.devs
            .iter()
            .map(|(_, dev)| dev)
            .find(|dev| dev.clk_dom_idx == clk_dom_idx)
    }

    pub fn quantizer(&self, clk_dom_idx: u8) -> Option<&dyn FreqQuantizer> {
        self.for_domain(clk_dom_idx)
            .map(|dev| dev as &dyn FreqQuantizer)
    }

    /// Re-evaluate every device's DVCO minimum at the bottom of its LUT.
    pub fn dvco_min_update(&mut self, vfe: &dyn Vfe) -> Result<(), ErrorCode> {
        let mut worst = 0;
        for (_, dev) in self.devs.iter_mut() {
            let freq = vfe.evaluate(dev.dvco_min_vfe_idx, VfeVar::VoltUv(dev.lut.vmin_uv))?;
            dev.dvco_min_mhz = freq.min(u16::MAX as u32) as u16;
            worst = worst.max(dev.dvco_min_mhz);
        }
        self.dvco_min_worst_mhz = worst;
        Ok(())
    }

    /// Program the LUT of device `idx`.
    ///
    /// `freq_at` gives the curve frequency at each LUT voltage; it is called
    /// with increasing voltages. Entries are never below the DVCO minimum.
    pub fn lut_update(
        &mut self,
        idx: u8,
        hw: &dyn NafllLut,
        freq_at: &mut dyn FnMut(u32) -> Result<Option<u16>, ErrorCode>,
    ) -> Result<(), ErrorCode> {
        let dev = self.devs.get_mut(idx)?;
        let mut entries = [LutEntry::default(); NAFLL_LUT_MAX_ENTRIES];
        let count = dev.lut.num_entries as usize;
        for (i, entry) in entries.iter_mut().take(count).enumerate() {
            let voltage_uv = dev.lut.vmin_uv + dev.lut.step_uv * i as u32;
            let freq = freq_at(voltage_uv)?
                .unwrap_or(dev.dvco_min_mhz)
                .max(dev.dvco_min_mhz);
            *entry = LutEntry {
                ndiv: dev.ndiv(freq),
                vfgain: dev.lut.vfgain,
            };
        }
        dev.lut_write(hw, &entries[..count])
    }

    /// Program every device of `clk_dom_idx` to `freq_mhz` in regime
    /// `regime_id`, [`IDX_INVALID`] selecting the device default.
    pub fn program_domain(
        &mut self,
        clk_dom_idx: u8,
        freq_mhz: u16,
        regime_id: u8,
        ctx: &mut NafllProgram<'_>,
    ) -> Result<(), ErrorCode> {
        let worst = self.dvco_min_worst_mhz;
        let mut found = false;
        for (idx, dev) in self.devs.iter_mut() {
            if dev.clk_dom_idx != clk_dom_idx {
                continue;
            }
            found = true;
            dev.configure(freq_mhz, regime_id)?;
            dev.program(idx, worst, ctx)?;
        }
        if !found {
            return Err(trap!(ErrorCode::INDEX));
        }
        Ok(())
    }
}

impl Default for NafllDevices {
    fn default() -> Self {
        NafllDevices::new()
    }
}
