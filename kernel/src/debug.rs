// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Support for the debug output of the PMU firmware.
//!
//! Provides two macros:
//!
//! - `debug!` formats a message and forwards it, prefixed with the call site,
//!   to the sink registered with [`set_debug_writer`].
//! - `trap!` marks the point where an internal consistency violation is
//!   detected. It prints the error, counts the trap and evaluates to the error
//!   so that it can be returned to the caller unchanged.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! debug!("VF cache rebuilt, {} points", count);
//! return Err(trap!(ErrorCode::STATE));
//! ```
//!
//! Until a board registers a sink all output is dropped, which is what the
//! host unit tests rely on.

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::utilities::cells::OptionalCell;
use crate::ErrorCode;

/// A byte sink for debug output, typically a UART or a DMEM ring buffer.
pub trait IoWrite {
    /// Write as much of `buf` as possible and return how many bytes were
    /// consumed.
    fn write(&self, buf: &[u8]) -> usize;
}

struct DebugSink {
    writer: OptionalCell<&'static dyn IoWrite>,
}

// The PMU is a single core and the sink is only replaced during board
// initialisation, before any task runs.
unsafe impl Sync for DebugSink {}

static DEBUG_SINK: DebugSink = DebugSink {
    writer: OptionalCell::empty(),
};

static TRAP_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Register the sink used by `debug!`.
///
/// # Safety
///
/// Must only be called from board initialisation, while no other code can be
/// printing.
pub unsafe fn set_debug_writer(writer: &'static dyn IoWrite) {
    DEBUG_SINK.writer.set(writer);
}

struct SinkWriter(&'static dyn IoWrite);

impl Write for SinkWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            let written = self.0.write(bytes);
            if written == 0 {
                return Err(fmt::Error);
            }
            bytes = &bytes[written.min(bytes.len())..];
        }
        Ok(())
    }
}

pub fn debug_fmt(args: fmt::Arguments, file_line: &(&'static str, u32)) {
    DEBUG_SINK.writer.map(|sink| {
        let mut writer = SinkWriter(*sink);
        let (file, line) = *file_line;
        let _ = writer.write_fmt(format_args!("PMU_DEBUG: {}:{}: ", file, line));
        let _ = writer.write_fmt(args);
        let _ = writer.write_str("\r\n");
    });
}

pub fn trap_fmt(err: ErrorCode, file_line: &(&'static str, u32)) {
    // No read-modify-write atomics on the PMU core, and nothing else runs
    // concurrently with the faulting task.
    let count = TRAP_COUNT.load(Ordering::Relaxed);
    TRAP_COUNT.store(count.wrapping_add(1), Ordering::Relaxed);
    debug_fmt(format_args!("breakpoint: {}", err), file_line);
}

/// Number of traps hit since boot.
pub fn trap_count() -> usize {
    TRAP_COUNT.load(Ordering::Relaxed)
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_fmt(format_args!($msg), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_fmt(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}

/// Report an internal error where it is detected and evaluate to it.
#[macro_export]
macro_rules! trap {
    ($err:expr) => ({
        let err: $crate::ErrorCode = $err;
        $crate::debug::trap_fmt(err, {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        });
        err
    });
}
