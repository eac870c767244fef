// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Fixed-capacity, index addressed object tables.
//!
//! Objects are created once from the host descriptor and live at the index
//! the host chose for them. Indices are `u8`; unused slots stay empty.

use kernel::ErrorCode;

pub struct ObjGroup<T, const N: usize> {
    objs: [Option<T>; N],
}

impl<T, const N: usize> ObjGroup<T, N> {
    pub fn new() -> Self {
        ObjGroup {
            objs: core::array::from_fn(|_| None),
        }
    }

    /// Place `obj` at `idx`.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::NOMEM]\): `idx` is beyond the table capacity.
    /// + [Err]\([ErrorCode::INDEX]\): `idx` is already in use.
    pub fn insert(&mut self, idx: u8, obj: T) -> Result<(), ErrorCode> {
        let slot = self.objs.get_mut(idx as usize).ok_or(ErrorCode::NOMEM)?;
        if slot.is_some() {
            return Err(ErrorCode::INDEX);
        }
        *slot = Some(obj);
        Ok(())
    }

    pub fn get(&self, idx: u8) -> Result<&T, ErrorCode> {
        self.objs
            .get(idx as usize)
            .and_then(Option::as_ref)
            .ok_or(ErrorCode::INDEX)
    }

    pub fn get_mut(&mut self, idx: u8) -> Result<&mut T, ErrorCode> {
        self.objs
            .get_mut(idx as usize)
            .and_then(Option::as_mut)
            .ok_or(ErrorCode::INDEX)
    }

    pub fn contains(&self, idx: u8) -> bool {
        self.get(idx).is_ok()
    }

    /// Objects in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &T)> + '_ {
        self.objs
            .iter()
            .enumerate()
            .filter_map(|(idx, obj)| obj.as_ref().map(|obj| (idx as u8, obj)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u8, &mut T)> + '_ {
        self.objs
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, obj)| obj.as_mut().map(|obj| (idx as u8, obj)))
    }

    pub fn len(&self) -> usize {
        self.objs.iter().filter(|obj| obj.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, const N: usize> Default for ObjGroup<T, N> {
    fn default() -> Self {
        ObjGroup::new()
    }
}
