// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! Parsing and formatting of `<prefix>.<start>-[<end>]` filenames.
//!
//! Every managed file's name is the source of truth for its time range. Both
//! operations here are pure and infallible to call (parsing simply rejects
//! anything that isn't a well-formed name of this directory's `prefix`).

/// Sentinel `endMillis` meaning "open-ended" (the file is still active).
pub const OPEN_ENDED: i64 = i64::MAX;

/// Parses and formats filenames of the form `<prefix>.<start>-[<end>]`.
#[derive(Clone, Debug)]
pub struct FileNameCodec {
    prefix: String,
}

/// The time range encoded by a managed filename.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FileRange {
    pub start_millis: i64,
    pub end_millis: i64,
}

impl FileRange {
    /// True iff this file is still open for appends — a file is active iff
    /// the suffix after the dash is empty.
    pub fn is_active(&self) -> bool {
        self.end_millis == OPEN_ENDED
    }

    /// True iff `[start_millis, end_millis]` (closed) intersects `[from, to]`.
    pub fn intersects(&self, from: i64, to: i64) -> bool {
        self.start_millis <= to && from <= self.end_millis
    }
}

impl FileNameCodec {
    pub fn new(prefix: impl Into<String>) -> Self {
        FileNameCodec {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Parses `name`, returning `None` if it isn't a well-formed name for
    /// this codec's prefix. A parse failure is not an error condition:
    /// callers should silently skip such entries.
    pub fn parse(&self, name: &str) -> Option<FileRange> {
        let last_dot = name.rfind('.')?;
        let last_dash = name.rfind('-')?;
        if last_dash <= last_dot {
            return None;
        }
        if &name[..last_dot] != self.prefix {
            return None;
        }
        let start_millis: i64 = name[last_dot + 1..last_dash].parse().ok()?;
        let end_str = &name[last_dash + 1..];
        let end_millis = if end_str.is_empty() {
            OPEN_ENDED
        } else {
            end_str.parse().ok()?
        };
        Some(FileRange {
            start_millis,
            end_millis,
        })
    }

    /// Builds the filename for the given range.
    pub fn build(&self, start_millis: i64, end_millis: i64) -> String {
        if end_millis == OPEN_ENDED {
            format!("{}.{}-", self.prefix, start_millis)
        } else {
            format!("{}.{}-{}", self.prefix, start_millis, end_millis)
        }
    }
}
