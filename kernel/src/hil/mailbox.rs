// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Interface to the mailbox registers shared with the host driver.

pub trait Mailbox {
    /// Write a 32 bit status word into mailbox `idx`.
    fn write(&self, idx: u8, value: u32);

    /// Read back mailbox `idx`.
    fn read(&self, idx: u8) -> u32;
}
