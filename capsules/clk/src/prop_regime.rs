// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Propagation regimes: which domains a propagation may change.

use kernel::{trap, ErrorCode};

use crate::desc::PropRegimeDesc;
use crate::group::ObjGroup;
use crate::types::CLK_PROP_REGIME_MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClkPropRegime {
    pub id: u8,
    pub domain_mask: u32,
}

pub struct ClkPropRegimes {
    regimes: ObjGroup<ClkPropRegime, CLK_PROP_REGIME_MAX>,
}

impl ClkPropRegimes {
    pub fn from_desc(descs: &[(u8, PropRegimeDesc)]) -> Result<Self, ErrorCode> {
        let mut regimes: ObjGroup<ClkPropRegime, CLK_PROP_REGIME_MAX> = ObjGroup::new();
        for (idx, desc) in descs {
            let regime = ClkPropRegime {
                id: desc.id,
                domain_mask: desc.domain_mask,
            };
            if regimes.iter().any(|(_, other)| other.id == desc.id) {
                return Err(trap!(ErrorCode::STATE));
            }
            regimes.insert(*idx, regime).map_err(|err| trap!(err))?;
        }
        Ok(ClkPropRegimes { regimes })
    }

    /// Domains regime `id` lets a propagation change.
    pub fn domain_mask(&self, id: u8) -> Result<u32, ErrorCode> {
        self.regimes
            .iter()
            .find(|(_, regime)| regime.id == id)
            .map(|(_, regime)| regime.domain_mask)
            .ok_or(ErrorCode::INDEX)
    }
}
