// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Closed-loop frequency controllers.
//!
//! A controller watches one NAFLL domain running in the frequency regime
//! and nudges the voltage of its rail so that the measured frequency meets
//! the target. The control law is a PI loop with a leaky integrator:
//!
//! ```text
//! error    = target - measured                      (MHz, 20.12)
//! accum    = error + decay * accum_prev
//! offset   = prop_gain * error + integ_gain * accum (uV)
//! ```
//!
//! Errors inside the hysteresis band leave the loop untouched for the cycle.
//! Samples flagged as poisoned are not fed to the loop, the previous offset
//! is reused instead.
//!
//! All controllers on a rail share one final voltage delta. Every cycle the
//! largest clamped request of the rail is added to it.
//!
//! Several parties can disable a controller: the NAFLL regime logic (the
//! controller only runs in the frequency regime), the DVCO minimum checks,
//! and the host. A controller runs only when nobody disables it, and starts
//! from a clean state each time it is enabled again.

use kernel::utilities::fxp::Sfxp20_12;
use kernel::ErrorCode;

use crate::config::CONFIG;
use crate::group::ObjGroup;
use crate::types::{CLK_FREQ_CTRL_MAX, CLK_VOLT_RAIL_MAX};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FreqCtrlClient {
    Regime = 0,
    DvcoMin = 1,
    DvcoMinWorstCase = 2,
    Host = 3,
}

impl FreqCtrlClient {
    fn mask(self) -> u8 {
        1 << self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PiParams {
    /// uV per MHz of error.
    pub prop_gain: Sfxp20_12,
    /// uV per MHz of accumulated error.
    pub integ_gain: Sfxp20_12,
    /// Weight of the previous accumulated error.
    pub integ_decay: Sfxp20_12,
    pub freq_hyst_pos_mhz: i16,
    pub freq_hyst_neg_mhz: i16,
    pub volt_offset_min_uv: i32,
    pub volt_offset_max_uv: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PiState {
    pub accum_error: Sfxp20_12,
    pub poison_count: u32,
    /// Offset of the last evaluated sample, before the final clamp.
    pub volt_offset_uv: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreqSample {
    pub target_khz: u32,
    pub measured_khz: u32,
    pub poisoned: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreqController {
    pub clk_dom_idx: u8,
    pub rail_idx: u8,
    pub params: PiParams,
    state: PiState,
    disable_mask: u8,
}

impl FreqController {
    /// New controller, held off until its domain enters the frequency
    /// regime.
    pub fn new(clk_dom_idx: u8, rail_idx: u8, params: PiParams) -> Result<Self, ErrorCode> {
        if rail_idx as usize >= CLK_VOLT_RAIL_MAX
            || params.volt_offset_min_uv > params.volt_offset_max_uv
        {
            return Err(ErrorCode::INVAL);
        }
        Ok(FreqController {
            clk_dom_idx,
            rail_idx,
            params,
            state: PiState::default(),
            disable_mask: FreqCtrlClient::Regime.mask(),
        })
    }

    pub fn state(&self) -> &PiState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.disable_mask == 0
    }

    pub fn is_disabled_by(&self, client: FreqCtrlClient) -> bool {
        self.disable_mask & client.mask() != 0
    }

    pub fn reset(&mut self) {
        self.state = PiState::default();
    }

    fn set_disabled(&mut self, client: FreqCtrlClient, disable: bool) {
        let was_enabled = self.is_enabled();
        if disable {
            self.disable_mask |= client.mask();
        } else {
            self.disable_mask &= !client.mask();
        }
        if !was_enabled && self.is_enabled() {
            self.reset();
        }
    }

    /// Run the loop on one sample and return the requested offset in uV,
    /// before the final clamp.
    pub fn eval(&mut self, sample: FreqSample) -> i32 {
        if sample.poisoned {
            self.state.poison_count = self.state.poison_count.saturating_add(1);
            return self.state.volt_offset_uv;
        }

        let error_khz = sample.target_khz as i64 - sample.measured_khz as i64;
        let hyst_pos_khz = self.params.freq_hyst_pos_mhz as i64 * 1000;
        let hyst_neg_khz = self.params.freq_hyst_neg_mhz as i64 * 1000;
        if error_khz >= -hyst_neg_khz && error_khz <= hyst_pos_khz {
            return 0;
        }

        let error = Sfxp20_12::from_ratio(
            error_khz.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            1000,
        );
        let prop = self.params.prop_gain.mul(error);
        let accum = error + self.params.integ_decay.mul(self.state.accum_error);
        let integ = self.params.integ_gain.mul(accum);

        self.state.accum_error = accum;
        self.state.volt_offset_uv = (prop + integ).to_int();
        self.state.volt_offset_uv
    }

    /// Clamp `raw_uv` so that the rail offset including it stays within
    /// this controller's bounds, `final_delta_uv` being the rail offset
    /// already applied.
    pub fn final_offset(&self, raw_uv: i32, final_delta_uv: i32) -> i32 {
        raw_uv
            .saturating_add(final_delta_uv)
            .clamp(self.params.volt_offset_min_uv, self.params.volt_offset_max_uv)
            - final_delta_uv
    }
}

pub struct FreqControllers {
    ctrls: ObjGroup<FreqController, CLK_FREQ_CTRL_MAX>,
    final_volt_delta_uv: [i32; CLK_VOLT_RAIL_MAX],
}

impl FreqControllers {
    pub fn new() -> Self {
        FreqControllers {
            ctrls: ObjGroup::new(),
            final_volt_delta_uv: [0; CLK_VOLT_RAIL_MAX],
        }
    }

    pub fn insert(&mut self, idx: u8, ctrl: FreqController) -> Result<(), ErrorCode> {
        self.ctrls.insert(idx, ctrl)
    }

    pub fn get(&self, idx: u8) -> Result<&FreqController, ErrorCode> {
        self.ctrls.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &FreqController)> + '_ {
        self.ctrls.iter()
    }

    pub fn final_volt_delta_uv(&self) -> [i32; CLK_VOLT_RAIL_MAX] {
        self.final_volt_delta_uv
    }

    /// Disable (or stop disabling) the controllers of `clk_dom_idx` on
    /// behalf of `client`. Domains without a controller are ignored.
    pub fn disable(&mut self, clk_dom_idx: u8, client: FreqCtrlClient, disable: bool) {
        for (_, ctrl) in self.ctrls.iter_mut() {
            if ctrl.clk_dom_idx == clk_dom_idx {
                ctrl.set_disabled(client, disable);
            }
        }
    }

    pub fn is_enabled(&self, clk_dom_idx: u8) -> bool {
        self.ctrls
            .iter()
            .any(|(_, ctrl)| ctrl.clk_dom_idx == clk_dom_idx && ctrl.is_enabled())
    }

    /// One evaluation cycle over every enabled controller.
    ///
    /// `sample` supplies the frequencies of a controller's domain. Returns
    /// the final voltage delta of each rail.
    pub fn eval(
        &mut self,
        sample: &mut dyn FnMut(&FreqController) -> Result<FreqSample, ErrorCode>,
    ) -> Result<[i32; CLK_VOLT_RAIL_MAX], ErrorCode> {
        if !CONFIG.freq_controller {
            return Ok(self.final_volt_delta_uv);
        }

        let final_delta = self.final_volt_delta_uv;
        let mut rail_delta: [Option<i32>; CLK_VOLT_RAIL_MAX] = [None; CLK_VOLT_RAIL_MAX];
        for (_, ctrl) in self.ctrls.iter_mut() {
            if !ctrl.is_enabled() {
                continue;
            }
            let rail = ctrl.rail_idx as usize;
            let raw = ctrl.eval(sample(ctrl)?);
            let offset = ctrl.final_offset(raw, final_delta[rail]);
            rail_delta[rail] = Some(rail_delta[rail].map_or(offset, |delta| delta.max(offset)));
        }

        for (final_uv, delta) in self.final_volt_delta_uv.iter_mut().zip(rail_delta) {
            *final_uv = match delta {
                Some(delta) => final_uv.saturating_add(delta),
                // Nothing regulates this rail anymore.
                None => 0,
            };
        }
        Ok(self.final_volt_delta_uv)
    }
}

impl Default for FreqControllers {
    fn default() -> Self {
        FreqControllers::new()
    }
}
