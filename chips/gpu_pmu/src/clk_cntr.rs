// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Free running clock cycle counters, one per counted clock domain.

use kernel::hil::clk::ClkCounter;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub ClkCntrRegisters {
        (0x00 => cfg: ReadWrite<u32, CFG::Register>),
        (0x04 => cnt_lo: ReadOnly<u32>),
        (0x08 => cnt_hi: ReadOnly<u32>),
        (0x0C => @END),
    }
}

register_bitfields![u32,
    CFG [
        ENABLE OFFSET(0) NUMBITS(1) [],
        /// Source clock selection, programmed by the boot ROM
        SOURCE OFFSET(4) NUMBITS(4) []
    ]
];

pub const CLK_CNTR_GPC_BASE: StaticRef<ClkCntrRegisters> =
    unsafe { StaticRef::new(0x0013_7250 as *const ClkCntrRegisters) };
pub const CLK_CNTR_XBAR_BASE: StaticRef<ClkCntrRegisters> =
    unsafe { StaticRef::new(0x0013_7260 as *const ClkCntrRegisters) };

pub struct ClkCntr<'a> {
    registers: &'a [StaticRef<ClkCntrRegisters>],
}

impl<'a> ClkCntr<'a> {
    pub const fn new(registers: &'a [StaticRef<ClkCntrRegisters>]) -> Self {
        ClkCntr { registers }
    }

    fn regs(&self, cntr_id: u8) -> Result<&ClkCntrRegisters, ErrorCode> {
        self.registers
            .get(cntr_id as usize)
            .map(|regs| &**regs)
            .ok_or(ErrorCode::INDEX)
    }

    /// Start counting. Counters are never stopped once enabled.
    pub fn enable(&self, cntr_id: u8) -> Result<(), ErrorCode> {
        let regs = self.regs(cntr_id)?;
        if !regs.cfg.is_set(CFG::ENABLE) {
            regs.cfg.modify(CFG::ENABLE::SET);
        }
        Ok(())
    }
}

impl ClkCounter for ClkCntr<'_> {
    fn read(&self, cntr_id: u8) -> Result<u64, ErrorCode> {
        let regs = self.regs(cntr_id)?;
        if !regs.cfg.is_set(CFG::ENABLE) {
            return Err(ErrorCode::STATE);
        }
        loop {
            let high = regs.cnt_hi.get();
            let low = regs.cnt_lo.get();
            if regs.cnt_hi.get() == high {
                return Ok(((high as u64) << 32) | low as u64);
            }
        }
    }
}
