// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Clock and VF core of the PMU.
//!
//! Maps voltages to frequencies and back for every clock domain, quantizes
//! frequencies to what the generators can produce, propagates frequencies
//! between related domains, drives the NAFLL regimes and their frequency
//! controllers, and orders a clock/voltage change into steps. [`clk::Clk`]
//! is the entry point.

#![forbid(unsafe_code)]
#![no_std]

#[cfg(test)]
extern crate std;

pub mod adc;
pub mod change_seq;
pub mod clk;
pub mod clk_cntr;
pub mod desc;
pub mod domain;
pub mod freq_controller;
pub mod group;
pub mod mailbox;
pub mod nafll;
pub mod prog;
pub mod prop_regime;
pub mod prop_top;
pub mod types;
pub mod vf_point;

mod config;

#[cfg(test)]
mod test;
