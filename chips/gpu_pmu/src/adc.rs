// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Clock ADC register driver.
//!
//! The ADCs sense the rail voltage seen by a NAFLL and feed the LUT index.
//! Only power, enable, reset status and the code cap override are driven
//! from here; calibration is done once by the boot ROM.

use kernel::hil::adc::ClkAdc;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub AdcRegisters {
        (0x00 => ctrl: ReadWrite<u32, CTRL::Register>),
        (0x04 => status: ReadOnly<u32, STATUS::Register>),
        /// Upper bound on the code forwarded to the NAFLL
        (0x08 => code_cap: ReadWrite<u32, CODE_CAP::Register>),
        (0x0C => @END),
    }
}

register_bitfields![u32,
    CTRL [
        POWER OFFSET(0) NUMBITS(1) [],
        ENABLE OFFSET(1) NUMBITS(1) []
    ],
    STATUS [
        RESET_DONE OFFSET(0) NUMBITS(1) []
    ],
    CODE_CAP [
        CODE OFFSET(0) NUMBITS(7) [],
        EN OFFSET(8) NUMBITS(1) []
    ]
];

pub const ADC_GPC0_BASE: StaticRef<AdcRegisters> =
    unsafe { StaticRef::new(0x0013_3000 as *const AdcRegisters) };
pub const ADC_GPC1_BASE: StaticRef<AdcRegisters> =
    unsafe { StaticRef::new(0x0013_3040 as *const AdcRegisters) };
pub const ADC_SYS_BASE: StaticRef<AdcRegisters> =
    unsafe { StaticRef::new(0x0013_3400 as *const AdcRegisters) };

/// Largest code the ADC can report.
pub const ADC_CODE_MAX: u8 = 127;

pub struct Adc<'a> {
    registers: &'a [StaticRef<AdcRegisters>],
}

impl<'a> Adc<'a> {
    pub const fn new(registers: &'a [StaticRef<AdcRegisters>]) -> Self {
        Adc { registers }
    }

    fn regs(&self, adc_id: u8) -> Result<&AdcRegisters, ErrorCode> {
        self.registers
            .get(adc_id as usize)
            .map(|regs| &**regs)
            .ok_or(ErrorCode::INDEX)
    }
}

impl ClkAdc for Adc<'_> {
    fn set_powered(&self, adc_id: u8, powered: bool) -> Result<(), ErrorCode> {
        let regs = self.regs(adc_id)?;
        if regs.ctrl.is_set(CTRL::POWER) != powered {
            regs.ctrl.modify(if powered {
                CTRL::POWER::SET
            } else {
                CTRL::POWER::CLEAR + CTRL::ENABLE::CLEAR
            });
        }
        Ok(())
    }

    fn set_enabled(&self, adc_id: u8, enabled: bool) -> Result<(), ErrorCode> {
        let regs = self.regs(adc_id)?;
        if enabled && !regs.ctrl.is_set(CTRL::POWER) {
            return Err(ErrorCode::STATE);
        }
        if regs.ctrl.is_set(CTRL::ENABLE) != enabled {
            regs.ctrl.modify(if enabled {
                CTRL::ENABLE::SET
            } else {
                CTRL::ENABLE::CLEAR
            });
        }
        Ok(())
    }

    fn is_ready(&self, adc_id: u8) -> Result<bool, ErrorCode> {
        Ok(self.regs(adc_id)?.status.is_set(STATUS::RESET_DONE))
    }

    fn set_code_cap(&self, adc_id: u8, cap: Option<u8>) -> Result<(), ErrorCode> {
        let regs = self.regs(adc_id)?;
        match cap {
            Some(code) => {
                if code > ADC_CODE_MAX {
                    return Err(ErrorCode::INVAL);
                }
                let value = CODE_CAP::CODE.val(code as u32) + CODE_CAP::EN::SET;
                if !regs.code_cap.extract().matches_all(value) {
                    regs.code_cap.modify(value);
                }
            }
            None => {
                if regs.code_cap.is_set(CODE_CAP::EN) {
                    regs.code_cap.modify(CODE_CAP::EN::CLEAR);
                }
            }
        }
        Ok(())
    }
}
