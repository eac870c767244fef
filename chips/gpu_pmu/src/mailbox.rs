// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Scratch mailbox registers shared with the host driver.

use kernel::hil::mailbox::Mailbox;
use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_structs, ReadWrite};
use kernel::utilities::StaticRef;

pub const NUM_MAILBOXES: usize = 16;

register_structs! {
    pub MailboxRegisters {
        (0x00 => mailbox: [ReadWrite<u32>; NUM_MAILBOXES]),
        (0x40 => @END),
    }
}

pub const MAILBOX_BASE: StaticRef<MailboxRegisters> =
    unsafe { StaticRef::new(0x0010_A450 as *const MailboxRegisters) };

pub struct PmuMailbox {
    registers: StaticRef<MailboxRegisters>,
}

impl PmuMailbox {
    pub const fn new(registers: StaticRef<MailboxRegisters>) -> Self {
        PmuMailbox { registers }
    }
}

impl Mailbox for PmuMailbox {
    fn write(&self, idx: u8, value: u32) {
        match self.registers.mailbox.get(idx as usize) {
            Some(reg) => {
                if reg.get() != value {
                    reg.set(value);
                }
            }
            None => kernel::debug!("mailbox {} does not exist", idx),
        }
    }

    fn read(&self, idx: u8) -> u32 {
        self.registers
            .mailbox
            .get(idx as usize)
            .map_or(0, |reg| reg.get())
    }
}
