// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Counted frequency averages.
//!
//! For every counted domain two averages are tracked over the window
//! between two samples: the measured frequency, from the hardware cycle
//! counter, and the time weighted average of the targets programmed during
//! the window. The frequency controllers compare the two.

use kernel::hil::clk::ClkCounter;
use kernel::{trap, ErrorCode};

use crate::freq_controller::FreqSample;
use crate::group::ObjGroup;
use crate::types::CLK_DOMAIN_MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CountSnapshot {
    count: u64,
    time_ns: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkCntr {
    /// Hardware counter.
    pub cntr_id: u8,
    last: Option<CountSnapshot>,
    target_khz: u32,
    target_since_ns: u64,
    window_start_ns: u64,
    /// Target kHz integrated over ns since the window started.
    target_accum: u64,
}

impl ClkCntr {
    pub fn new(cntr_id: u8) -> Self {
        ClkCntr {
            cntr_id,
            last: None,
            target_khz: 0,
            target_since_ns: 0,
            window_start_ns: 0,
            target_accum: 0,
        }
    }

    fn close_target_span(&mut self, now_ns: u64) {
        let span = now_ns.saturating_sub(self.target_since_ns);
        self.target_accum = self
            .target_accum
            .saturating_add(self.target_khz as u64 * span);
        self.target_since_ns = now_ns;
    }

    pub fn set_target(&mut self, target_khz: u32, now_ns: u64) {
        self.close_target_span(now_ns);
        self.target_khz = target_khz;
    }

    fn target_avg_khz(&mut self, now_ns: u64) -> u32 {
        self.close_target_span(now_ns);
        let window = now_ns.saturating_sub(self.window_start_ns);
        if window == 0 {
            self.target_khz
        } else {
            (self.target_accum / window).min(u32::MAX as u64) as u32
        }
    }

    /// Close the current window and return its averages.
    ///
    /// The sample is poisoned when the window has no valid counter reading:
    /// first sample, counter reset, or no time elapsed. It is also poisoned
    /// while no target has been programmed.
    pub fn sample(&mut self, count: u64, now_ns: u64) -> FreqSample {
        let target_khz = self.target_avg_khz(now_ns);
        let measured_khz = match self.last {
            Some(last) if count >= last.count && now_ns > last.time_ns => {
                let cycles = (count - last.count) as u128;
                let elapsed = (now_ns - last.time_ns) as u128;
                Some((cycles * 1_000_000 / elapsed).min(u32::MAX as u128) as u32)
            }
            _ => None,
        };

        self.last = Some(CountSnapshot {
            count,
            time_ns: now_ns,
        });
        self.window_start_ns = now_ns;
        self.target_since_ns = now_ns;
        self.target_accum = 0;

        FreqSample {
            target_khz,
            measured_khz: measured_khz.unwrap_or(0),
            poisoned: measured_khz.is_none() || target_khz == 0,
        }
    }
}

/// Counters, addressed by clock domain index.
pub struct ClkCntrs {
    cntrs: ObjGroup<ClkCntr, CLK_DOMAIN_MAX>,
}

impl ClkCntrs {
    pub fn new() -> Self {
        ClkCntrs {
            cntrs: ObjGroup::new(),
        }
    }

    pub fn insert(&mut self, clk_dom_idx: u8, cntr: ClkCntr) -> Result<(), ErrorCode> {
        self.cntrs.insert(clk_dom_idx, cntr)
    }

    pub fn contains(&self, clk_dom_idx: u8) -> bool {
        self.cntrs.contains(clk_dom_idx)
    }

    /// Record a new target for `clk_dom_idx`. Uncounted domains are ignored.
    pub fn set_target(&mut self, clk_dom_idx: u8, freq_mhz: u16, now_ns: u64) {
        if let Ok(cntr) = self.cntrs.get_mut(clk_dom_idx) {
            cntr.set_target(freq_mhz as u32 * 1000, now_ns);
        }
    }

    pub fn sample(
        &mut self,
        clk_dom_idx: u8,
        hw: &dyn ClkCounter,
        now_ns: u64,
    ) -> Result<FreqSample, ErrorCode> {
        let cntr = self.cntrs.get_mut(clk_dom_idx).map_err(|err| trap!(err))?;
        let count = hw.read(cntr.cntr_id)?;
        Ok(cntr.sample(count, now_ns))
    }
}

impl Default for ClkCntrs {
    fn default() -> Self {
        ClkCntrs::new()
    }
}
