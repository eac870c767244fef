// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Register drivers for the clock hardware seen by the GPU PMU.
//!
//! Each driver implements one of the clock HILs of the kernel crate. All of
//! them read a register before writing it and skip the write when the value
//! would not change.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod adc;
pub mod clk_cntr;
pub mod mailbox;
pub mod nafll;
pub mod ptimer;
