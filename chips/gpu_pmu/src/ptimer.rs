// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! PTIMER, the free running 64 bit nanosecond timer of the GPU.

use kernel::hil::time::Time;
use kernel::utilities::registers::interfaces::Readable;
use kernel::utilities::registers::{register_structs, ReadOnly};
use kernel::utilities::StaticRef;

register_structs! {
    pub PtimerRegisters {
        /// Bits 31:0 of the time in ns
        (0x00 => time_0: ReadOnly<u32>),
        /// Bits 63:32 of the time in ns
        (0x04 => time_1: ReadOnly<u32>),
        (0x08 => @END),
    }
}

pub const PTIMER_BASE: StaticRef<PtimerRegisters> =
    unsafe { StaticRef::new(0x0000_9400 as *const PtimerRegisters) };

pub struct Ptimer {
    registers: StaticRef<PtimerRegisters>,
}

impl Ptimer {
    pub const fn new(registers: StaticRef<PtimerRegisters>) -> Self {
        Ptimer { registers }
    }
}

impl Time for Ptimer {
    fn now_ns(&self) -> u64 {
        // The two halves are not latched together. Retry until the high word
        // is stable across the low word read.
        loop {
            let high = self.registers.time_1.get();
            let low = self.registers.time_0.get();
            if self.registers.time_1.get() == high {
                return ((high as u64) << 32) | low as u64;
            }
        }
    }
}
