// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Standard error enum for invoking operations

use core::fmt;

/// Standard errors of the PMU firmware.
///
/// The variants fall in three groups:
///
/// - search exhaustion ([`ErrorCode::RANGE`], [`ErrorCode::ITEREND`]): the
///   expected "try the next candidate" signal of the VF lookups. These are
///   recovered by the caller and never reach a client as a failure.
/// - caller mistakes ([`ErrorCode::INVAL`], [`ErrorCode::SIZE`]).
/// - internal consistency violations ([`ErrorCode::INDEX`],
///   [`ErrorCode::STATE`], [`ErrorCode::NOSUPPORT`], [`ErrorCode::NOMEM`])
///   and hardware failures ([`ErrorCode::FAIL`], [`ErrorCode::BUSY`],
///   [`ErrorCode::TIMEOUT`]). These are always fatal to the enclosing
///   operation and are reported through [`trap!`](crate::trap) where they
///   originate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ErrorCode {
    /// Generic failure condition
    FAIL = 0,
    /// Shared resource could not be acquired in time
    BUSY = 1,
    /// An invalid parameter was passed
    INVAL = 5,
    /// Caller supplied buffer is too small
    SIZE = 6,
    /// Fixed-capacity table is full
    NOMEM = 8,
    /// Operation or object type is unsupported
    NOSUPPORT = 9,
    /// Object index does not reference a valid object
    INDEX = 13,
    /// Object is not in a state that allows the operation
    STATE = 14,
    /// Requested value lies outside of what this object covers
    RANGE = 15,
    /// Iteration reached its natural end
    ITEREND = 16,
    /// A hardware poll did not complete within its time budget
    TIMEOUT = 17,
}

impl ErrorCode {
    /// Whether this error is the recoverable end of a search over objects.
    pub fn is_search_exhausted(self) -> bool {
        matches!(self, ErrorCode::RANGE | ErrorCode::ITEREND)
    }

    /// Four bit class used when reporting errors through a status word.
    pub fn class(self) -> u8 {
        match self {
            ErrorCode::RANGE | ErrorCode::ITEREND => 0x1,
            ErrorCode::INVAL | ErrorCode::SIZE => 0x2,
            ErrorCode::INDEX | ErrorCode::STATE => 0x3,
            ErrorCode::NOSUPPORT => 0x4,
            ErrorCode::NOMEM => 0x5,
            ErrorCode::BUSY | ErrorCode::TIMEOUT => 0x6,
            ErrorCode::FAIL => 0xF,
        }
    }
}

impl From<ErrorCode> for usize {
    fn from(err: ErrorCode) -> usize {
        err as usize
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorCode::FAIL => "FAIL",
            ErrorCode::BUSY => "BUSY",
            ErrorCode::INVAL => "INVAL",
            ErrorCode::SIZE => "SIZE",
            ErrorCode::NOMEM => "NOMEM",
            ErrorCode::NOSUPPORT => "NOSUPPORT",
            ErrorCode::INDEX => "INDEX",
            ErrorCode::STATE => "STATE",
            ErrorCode::RANGE => "RANGE",
            ErrorCode::ITEREND => "ITEREND",
            ErrorCode::TIMEOUT => "TIMEOUT",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;

    #[test]
    fn search_exhaustion_is_recoverable() {
        assert!(ErrorCode::RANGE.is_search_exhausted());
        assert!(ErrorCode::ITEREND.is_search_exhausted());
        assert!(!ErrorCode::STATE.is_search_exhausted());
        assert!(!ErrorCode::INVAL.is_search_exhausted());
    }

    #[test]
    fn classes_fit_in_a_nibble() {
        for err in [
            ErrorCode::FAIL,
            ErrorCode::BUSY,
            ErrorCode::INVAL,
            ErrorCode::SIZE,
            ErrorCode::NOMEM,
            ErrorCode::NOSUPPORT,
            ErrorCode::INDEX,
            ErrorCode::STATE,
            ErrorCode::RANGE,
            ErrorCode::ITEREND,
            ErrorCode::TIMEOUT,
        ] {
            assert!(err.class() <= 0xF);
        }
    }
}
