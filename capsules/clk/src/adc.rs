// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Clock ADC devices.
//!
//! An ADC stays powered while at least one client needs it. NAFLLs in the
//! frequency or voltage regime are clients, so are the performance and
//! low-power code when they calibrate. With `adc_always_on` the ADCs are
//! powered at construction and never turned off.
//!
//! The change sequencer also caps the code an ADC reports, so that a NAFLL
//! following the LUT cannot run ahead of a voltage that has not been
//! applied yet.

use kernel::hil::adc::ClkAdc;
use kernel::hil::time::Time;
use kernel::utilities::spin_wait::spin_wait_ns;
use kernel::{trap, ErrorCode};

use crate::config::CONFIG;
use crate::group::ObjGroup;
use crate::types::{CLK_ADC_MAX, CLK_NAFLL_MAX};

/// Time the ADC needs to come out of reset after power up.
pub const ADC_RESET_WAIT_NS: u64 = 10_000;

/// Largest code an ADC reports.
pub const ADC_CODE_MAX: u8 = 127;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdcClient {
    /// NAFLL device with this index.
    Nafll(u8),
    Perf,
    LowPower,
}

impl AdcClient {
    fn mask(self) -> u32 {
        match self {
            AdcClient::Nafll(idx) => 1 << (idx as usize % CLK_NAFLL_MAX),
            AdcClient::Perf => 1 << CLK_NAFLL_MAX,
            AdcClient::LowPower => 1 << (CLK_NAFLL_MAX + 1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdcDevice {
    /// Hardware instance.
    pub id: u8,
    pub rail_idx: u8,
    /// Voltage of code 0.
    pub vmin_uv: u32,
    /// Voltage per code.
    pub step_uv: u32,
    clients: u32,
    powered: bool,
    code_cap: Option<u8>,
}

impl AdcDevice {
    pub fn new(id: u8, rail_idx: u8, vmin_uv: u32, step_uv: u32) -> Result<Self, ErrorCode> {
        if step_uv == 0 {
            return Err(ErrorCode::INVAL);
        }
        Ok(AdcDevice {
            id,
            rail_idx,
            vmin_uv,
            step_uv,
            clients: 0,
            powered: false,
            code_cap: None,
        })
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn code_cap(&self) -> Option<u8> {
        self.code_cap
    }

    /// Smallest code whose voltage is at least `voltage_uv`.
    pub fn voltage_to_code(&self, voltage_uv: u32) -> u8 {
        let above = voltage_uv.saturating_sub(self.vmin_uv);
        above
            .div_ceil(self.step_uv)
            .min(ADC_CODE_MAX as u32) as u8
    }

    fn power(&mut self, on: bool, hw: &dyn ClkAdc, timer: &dyn Time) -> Result<(), ErrorCode> {
        if on == self.powered {
            return Ok(());
        }
        if on {
            hw.set_powered(self.id, true)?;
            spin_wait_ns(timer, ADC_RESET_WAIT_NS, || hw.is_ready(self.id))
                .map_err(|err| trap!(err))?;
            hw.set_enabled(self.id, true)?;
        } else {
            hw.set_enabled(self.id, false)?;
            hw.set_powered(self.id, false)?;
        }
        self.powered = on;
        Ok(())
    }
}

pub struct AdcDevices {
    devs: ObjGroup<AdcDevice, CLK_ADC_MAX>,
}

impl AdcDevices {
    pub fn new() -> Self {
        AdcDevices {
            devs: ObjGroup::new(),
        }
    }

    pub fn insert(&mut self, idx: u8, dev: AdcDevice) -> Result<(), ErrorCode> {
        self.devs.insert(idx, dev)
    }

    pub fn get(&self, idx: u8) -> Result<&AdcDevice, ErrorCode> {
        self.devs.get(idx)
    }

    /// Power up every ADC when they are configured to stay on.
    pub fn init(&mut self, hw: &dyn ClkAdc, timer: &dyn Time) -> Result<(), ErrorCode> {
        if CONFIG.adc_always_on {
            for (_, dev) in self.devs.iter_mut() {
                dev.power(true, hw, timer)?;
            }
        }
        Ok(())
    }

    /// Add or remove `client` from the users of ADC `idx`, powering the ADC
    /// up for its first user and down after its last.
    pub fn set_client(
        &mut self,
        idx: u8,
        client: AdcClient,
        needed: bool,
        hw: &dyn ClkAdc,
        timer: &dyn Time,
    ) -> Result<(), ErrorCode> {
        let dev = self.devs.get_mut(idx).map_err(|err| trap!(err))?;
        if needed {
            dev.clients |= client.mask();
        } else {
            dev.clients &= !client.mask();
        }
        let on = dev.clients != 0 || CONFIG.adc_always_on;
        dev.power(on, hw, timer)
    }

    /// Cap the codes of every ADC on `rail_idx` at `voltage_uv`, or lift the
    /// cap.
    pub fn set_voltage_cap(
        &mut self,
        rail_idx: u8,
        voltage_uv: Option<u32>,
        hw: &dyn ClkAdc,
    ) -> Result<(), ErrorCode> {
        for (_, dev) in self.devs.iter_mut() {
            if dev.rail_idx != rail_idx {
                continue;
            }
            let cap = voltage_uv.map(|voltage_uv| dev.voltage_to_code(voltage_uv));
            if cap != dev.code_cap {
                hw.set_code_cap(dev.id, cap)?;
                dev.code_cap = cap;
            }
        }
        Ok(())
    }
}

impl Default for AdcDevices {
    fn default() -> Self {
        AdcDevices::new()
    }
}
