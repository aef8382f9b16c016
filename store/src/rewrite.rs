// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! The caller-supplied read-modify-write transformer `FileRotator` drives.

use base::Error;
use std::io::{Read, Write};

/// Consumes existing file content.
pub trait Reader {
    fn read(&mut self, stream: &mut dyn Read) -> Result<(), Error>;
}

/// Emits new file content.
pub trait Writer {
    fn write(&mut self, stream: &mut dyn Write) -> Result<(), Error>;
}

/// A read-modify-write transformer invoked once per managed file by
/// [`crate::rotator::FileRotator::rewrite_single`].
///
/// `reset`, `read`, `should_write`, and `write` are called in that strict
/// order for a given file; `reset` delimits the boundary between files when
/// the same rewriter is reused across `rewrite_all`.
pub trait Rewriter: Reader + Writer {
    /// Clears transient state before a pass. Called exactly once per file,
    /// before `read`.
    fn reset(&mut self);

    /// Gate consulted after `read` for a file that already existed: if this
    /// returns false, `rewrite_single` skips the write entirely and leaves
    /// the file untouched. Not consulted for a file that doesn't yet exist —
    /// a missing file is always a candidate for creation.
    fn should_write(&self) -> bool;
}
