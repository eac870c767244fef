// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Public traits for interfaces between the clock core and the hardware.
//!
//! The clock capsules only program hardware through these traits. Chip
//! crates implement them on top of memory-mapped registers, and the capsule
//! tests implement them with recording fakes.

pub mod adc;
pub mod clk;
pub mod mailbox;
pub mod nafll;
pub mod time;
pub mod vfe;
pub mod volt;
