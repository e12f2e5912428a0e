// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Error taxonomy surfaced at the crate boundary.
//!
//! The propagation policy, in brief:
//! - terminal acquisition failures are fatal and come out of `init`,
//! - I/O failures come out of `flush` / `poll_event` and leave the terminal
//!   restorable via [`force_cleanup`],
//! - parse failures never surface at all (the decoder silently resets),
//! - out-of-bounds buffer access is silently ignored,
//! - resource-limit failures ([`TooManyBackends`], [`PasteOverflow`]) are
//!   recoverable and returned to the caller.
//!
//! [`force_cleanup`]: crate::Terminal::force_cleanup
//! [`TooManyBackends`]: TermCoreError::TooManyBackends
//! [`PasteOverflow`]: TermCoreError::PasteOverflow

use miette::Diagnostic;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type TermCoreResult<T> = Result<T, TermCoreError>;

/// All the ways this crate reports failure to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum TermCoreError {
    /// Neither `/dev/tty` nor stdin refers to a terminal.
    #[error("not attached to a terminal")]
    #[diagnostic(help("run from an interactive terminal, or check isatty on stdin"))]
    NotATerminal,

    /// `tcsetattr` / `SetConsoleMode` was denied.
    #[error("failed to change terminal mode")]
    SetModeFailed(#[source] std::io::Error),

    /// A write to the terminal failed outright.
    #[error("failed to write to the terminal")]
    WriteFailed(#[source] std::io::Error),

    /// A write was cut short; `written` of `expected` bytes made it out.
    #[error("short write to the terminal: {written} of {expected} bytes")]
    PartialWrite { written: usize, expected: usize },

    /// A read from the terminal failed.
    #[error("failed to read from the terminal")]
    ReadFailed(#[source] std::io::Error),

    /// The SIGWINCH self-pipe could not be created.
    #[error("failed to set up the resize notification pipe")]
    PipeSetupFailed(#[source] std::io::Error),

    /// Every slot in the process-global resize registry is taken.
    #[error("too many live backends (the resize registry is full)")]
    #[diagnostic(help("at most 16 backends may be registered per process"))]
    TooManyBackends,

    /// A bracketed paste exceeded the growth cap; the paste body was dropped.
    #[error("paste exceeded the {cap} byte cap and was discarded")]
    PasteOverflow { cap: usize },
}
