// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! NAFLL register driver.
//!
//! One register block per oscillator. The HIL addresses an oscillator by its
//! position in the slice handed to [`Nafll::new`].

use kernel::hil::nafll::{LutEntry, NafllLut, NafllMode, SwFreqReq};
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub NafllRegisters {
        /// Software frequency request and operating mode
        (0x00 => sw_freq_req: ReadWrite<u32, SW_FREQ_REQ::Register>),
        /// Post divider configuration
        (0x04 => cfg2: ReadWrite<u32, CFG2::Register>),
        /// LUT access control
        (0x08 => lut_cfg: ReadWrite<u32, LUT_CFG::Register>),
        /// LUT write address, incremented by hardware on each data write
        (0x0C => lut_write_addr: ReadWrite<u32, LUT_WRITE_ADDR::Register>),
        /// LUT write data
        (0x10 => lut_write_data: ReadWrite<u32, LUT_WRITE_DATA::Register>),
        /// Oscillator status
        (0x14 => status: ReadOnly<u32, STATUS::Register>),
        (0x18 => @END),
    }
}

register_bitfields![u32,
    SW_FREQ_REQ [
        NDIV OFFSET(0) NUMBITS(10) [],
        MODE OFFSET(16) NUMBITS(2) [
            FixedFrequency = 0,
            MinFrequency = 1,
            Voltage = 2
        ]
    ],
    CFG2 [
        PLDIV OFFSET(0) NUMBITS(6) []
    ],
    LUT_CFG [
        READ_EN OFFSET(0) NUMBITS(1) []
    ],
    LUT_WRITE_ADDR [
        ADDR OFFSET(0) NUMBITS(8) [],
        AUTO_INC OFFSET(31) NUMBITS(1) []
    ],
    LUT_WRITE_DATA [
        NDIV OFFSET(0) NUMBITS(10) [],
        VFGAIN OFFSET(16) NUMBITS(4) []
    ],
    STATUS [
        DVCO_MIN_REACHED OFFSET(0) NUMBITS(1) []
    ]
];

pub const NAFLL_GPC0_BASE: StaticRef<NafllRegisters> =
    unsafe { StaticRef::new(0x0013_2000 as *const NafllRegisters) };
pub const NAFLL_GPC1_BASE: StaticRef<NafllRegisters> =
    unsafe { StaticRef::new(0x0013_2100 as *const NafllRegisters) };
pub const NAFLL_XBAR_BASE: StaticRef<NafllRegisters> =
    unsafe { StaticRef::new(0x0013_2800 as *const NafllRegisters) };

const NDIV_MAX: u16 = (1 << 10) - 1;
const PLDIV_MAX: u8 = (1 << 6) - 1;
const VFGAIN_MAX: u8 = (1 << 4) - 1;

pub struct Nafll<'a> {
    registers: &'a [StaticRef<NafllRegisters>],
}

impl<'a> Nafll<'a> {
    pub const fn new(registers: &'a [StaticRef<NafllRegisters>]) -> Self {
        Nafll { registers }
    }

    fn regs(&self, nafll_id: u8) -> Result<&NafllRegisters, ErrorCode> {
        self.registers
            .get(nafll_id as usize)
            .map(|regs| &**regs)
            .ok_or(ErrorCode::INDEX)
    }
}

impl NafllLut for Nafll<'_> {
    fn sw_freq_req(&self, nafll_id: u8) -> Result<SwFreqReq, ErrorCode> {
        let regs = self.regs(nafll_id)?;
        let mode = match regs.sw_freq_req.read_as_enum(SW_FREQ_REQ::MODE) {
            Some(SW_FREQ_REQ::MODE::Value::FixedFrequency) => NafllMode::FixedFrequency,
            Some(SW_FREQ_REQ::MODE::Value::MinFrequency) => NafllMode::MinFrequency,
            Some(SW_FREQ_REQ::MODE::Value::Voltage) => NafllMode::Voltage,
            None => return Err(ErrorCode::FAIL),
        };
        Ok(SwFreqReq {
            mode,
            ndiv: regs.sw_freq_req.read(SW_FREQ_REQ::NDIV) as u16,
        })
    }

    fn set_sw_freq_req(&self, nafll_id: u8, req: SwFreqReq) -> Result<(), ErrorCode> {
        let regs = self.regs(nafll_id)?;
        if req.ndiv > NDIV_MAX {
            return Err(ErrorCode::INVAL);
        }
        let mode = match req.mode {
            NafllMode::FixedFrequency => SW_FREQ_REQ::MODE::FixedFrequency,
            NafllMode::MinFrequency => SW_FREQ_REQ::MODE::MinFrequency,
            NafllMode::Voltage => SW_FREQ_REQ::MODE::Voltage,
        };
        let value = SW_FREQ_REQ::NDIV.val(req.ndiv as u32) + mode;
        if !regs.sw_freq_req.extract().matches_all(value) {
            regs.sw_freq_req.modify(value);
        }
        Ok(())
    }

    fn pldiv(&self, nafll_id: u8) -> Result<u8, ErrorCode> {
        Ok(self.regs(nafll_id)?.cfg2.read(CFG2::PLDIV) as u8)
    }

    fn set_pldiv(&self, nafll_id: u8, div: u8) -> Result<(), ErrorCode> {
        let regs = self.regs(nafll_id)?;
        if div == 0 || div > PLDIV_MAX {
            return Err(ErrorCode::INVAL);
        }
        if regs.cfg2.read(CFG2::PLDIV) != div as u32 {
            regs.cfg2.modify(CFG2::PLDIV.val(div as u32));
        }
        Ok(())
    }

    fn set_lut_read_enable(&self, nafll_id: u8, enable: bool) -> Result<(), ErrorCode> {
        let regs = self.regs(nafll_id)?;
        if regs.lut_cfg.is_set(LUT_CFG::READ_EN) != enable {
            regs.lut_cfg.modify(if enable {
                LUT_CFG::READ_EN::SET
            } else {
                LUT_CFG::READ_EN::CLEAR
            });
        }
        Ok(())
    }

    fn lut_write(&self, nafll_id: u8, idx: u8, entry: LutEntry) -> Result<(), ErrorCode> {
        let regs = self.regs(nafll_id)?;
        if entry.ndiv > NDIV_MAX || entry.vfgain > VFGAIN_MAX {
            return Err(ErrorCode::INVAL);
        }
        regs.lut_write_addr
            .write(LUT_WRITE_ADDR::ADDR.val(idx as u32) + LUT_WRITE_ADDR::AUTO_INC::CLEAR);
        regs.lut_write_data.write(
            LUT_WRITE_DATA::NDIV.val(entry.ndiv as u32)
                + LUT_WRITE_DATA::VFGAIN.val(entry.vfgain as u32),
        );
        Ok(())
    }

    fn dvco_min_reached(&self, nafll_id: u8) -> Result<bool, ErrorCode> {
        Ok(self
            .regs(nafll_id)?
            .status
            .is_set(STATUS::DVCO_MIN_REACHED))
    }
}
