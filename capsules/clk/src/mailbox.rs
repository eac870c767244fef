// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Status word reported to the host driver through a mailbox register.
//!
//! The host reads it back for diagnostics when a clock operation fails,
//! typically around low-power transitions where the PMU cannot print.

use kernel::hil::mailbox::Mailbox;
use kernel::utilities::registers::{register_bitfields, LocalRegisterCopy};
use kernel::ErrorCode;

register_bitfields![u32,
    STATUS [
        /// Operation specific detail, usually a frequency in MHz.
        DATA OFFSET(0) NUMBITS(12) [],
        /// Stage of the operation that failed.
        STAGE OFFSET(12) NUMBITS(8) [],
        /// Clock domain index.
        DOMAIN OFFSET(20) NUMBITS(8) [],
        /// Error class, 0 when the last operation succeeded.
        ERROR OFFSET(28) NUMBITS(4) []
    ]
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ClkStage {
    VfCacheInvalidate = 1,
    NafllLut = 2,
    PreVoltClks = 3,
    Volt = 4,
    PostVoltClks = 5,
    FreqController = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkStatus {
    pub error: Option<ErrorCode>,
    pub stage: ClkStage,
    pub clk_dom_idx: u8,
    pub data: u16,
}

impl ClkStatus {
    pub fn failed(err: ErrorCode, stage: ClkStage, clk_dom_idx: u8, data: u16) -> Self {
        ClkStatus {
            error: Some(err),
            stage,
            clk_dom_idx,
            data,
        }
    }

    pub fn encode(&self) -> u32 {
        let mut word: LocalRegisterCopy<u32, STATUS::Register> = LocalRegisterCopy::new(0);
        word.modify(
            STATUS::DATA.val(self.data.min(0xfff) as u32)
                + STATUS::STAGE.val(self.stage as u32)
                + STATUS::DOMAIN.val(self.clk_dom_idx as u32)
                + STATUS::ERROR.val(self.error.map_or(0, |err| err.class()) as u32),
        );
        word.get()
    }
}

/// Write `status` to mailbox `idx`.
pub fn report(mailbox: &dyn Mailbox, idx: u8, status: ClkStatus) {
    mailbox.write(idx, status.encode());
}

/// Error class of the status word currently in mailbox `idx`, 0 if none.
pub fn error_class(mailbox: &dyn Mailbox, idx: u8) -> u8 {
    let word: LocalRegisterCopy<u32, STATUS::Register> = LocalRegisterCopy::new(mailbox.read(idx));
    word.read(STATUS::ERROR) as u8
}
