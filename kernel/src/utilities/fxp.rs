// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Signed fixed-point arithmetic.
//!
//! The PMU has no FPU. Gains, percentages and controller errors are carried
//! as signed 20.12 fixed-point numbers: 20 integer bits (sign included) and
//! 12 fractional bits.

use core::fmt;
use core::ops::{Add, Neg, Sub};

/// Signed 20.12 fixed-point number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Sfxp20_12(i32);

impl Sfxp20_12 {
    pub const FRAC_BITS: u32 = 12;
    pub const ZERO: Sfxp20_12 = Sfxp20_12(0);
    pub const ONE: Sfxp20_12 = Sfxp20_12(1 << 12);

    /// Reinterpret raw bits as a 20.12 number.
    pub const fn from_bits(bits: i32) -> Self {
        Sfxp20_12(bits)
    }

    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// Convert an integer, saturating at the 20 bit integer range.
    pub const fn from_int(value: i32) -> Self {
        let wide = (value as i64) << Self::FRAC_BITS;
        Sfxp20_12(saturate(wide))
    }

    /// `num / den` as a fixed-point number. `den` must not be zero.
    pub fn from_ratio(num: i32, den: i32) -> Self {
        Sfxp20_12(saturate(((num as i64) << Self::FRAC_BITS) / den as i64))
    }

    /// Integer part, truncated toward zero.
    pub const fn to_int(self) -> i32 {
        self.0 / (1 << Self::FRAC_BITS)
    }

    /// Saturating fixed-point multiply.
    pub fn mul(self, rhs: Sfxp20_12) -> Sfxp20_12 {
        let wide = (self.0 as i64 * rhs.0 as i64) >> Self::FRAC_BITS;
        Sfxp20_12(saturate(wide))
    }

    /// Multiply an integer by this number, truncating toward zero.
    pub fn mul_int(self, value: i64) -> i64 {
        (self.0 as i64 * value) / (1 << Self::FRAC_BITS)
    }

    pub fn saturating_add(self, rhs: Sfxp20_12) -> Sfxp20_12 {
        Sfxp20_12(self.0.saturating_add(rhs.0))
    }
}

const fn saturate(wide: i64) -> i32 {
    if wide > i32::MAX as i64 {
        i32::MAX
    } else if wide < i32::MIN as i64 {
        i32::MIN
    } else {
        wide as i32
    }
}

impl Add for Sfxp20_12 {
    type Output = Sfxp20_12;
    fn add(self, rhs: Sfxp20_12) -> Sfxp20_12 {
        self.saturating_add(rhs)
    }
}

impl Sub for Sfxp20_12 {
    type Output = Sfxp20_12;
    fn sub(self, rhs: Sfxp20_12) -> Sfxp20_12 {
        Sfxp20_12(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Sfxp20_12 {
    type Output = Sfxp20_12;
    fn neg(self) -> Sfxp20_12 {
        Sfxp20_12(self.0.saturating_neg())
    }
}

impl fmt::Debug for Sfxp20_12 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let frac = (self.0.unsigned_abs() & 0xfff) * 1000 / 4096;
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:03}", sign, self.0.unsigned_abs() >> 12, frac)
    }
}
