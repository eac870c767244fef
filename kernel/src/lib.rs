// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Core PMU Kernel
//!
//! The kernel crate holds the code shared by the chip drivers and the clock
//! capsules of the PMU firmware: the common error type, the debug output
//! and trap macros, the Hardware Interface Layer (HIL) definitions that the
//! clock core programs against, and a handful of utilities.
//!
//! Most `unsafe` code is in this kernel crate.

#![no_std]

#[macro_use]
pub mod debug;
pub mod errorcode;
pub mod hil;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
