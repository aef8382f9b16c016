// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! The two concrete [`crate::rewrite::Rewriter`]s `SnapshotRecorder` drives
//! through the rotator.
//!
//! Written against [`InMemoryCollection`] directly rather than generically
//! over [`StatsCollection`] — there is exactly one collection type in this
//! repository, so genericity here would buy nothing.

use crate::collection::{InMemoryCollection, StatsCollection};
use crate::rewrite::{Reader, Rewriter, Writer};
use base::Error;
use std::io::{Read, Write as IoWrite};

/// Merges on-disk content with `pending`'s content, persists the union, and
/// consumes `pending` in the process.
pub struct CombiningRewriter<'a> {
    pending: &'a mut InMemoryCollection,
}

impl<'a> CombiningRewriter<'a> {
    pub fn new(pending: &'a mut InMemoryCollection) -> Self {
        CombiningRewriter { pending }
    }
}

impl Reader for CombiningRewriter<'_> {
    fn read(&mut self, stream: &mut dyn Read) -> Result<(), Error> {
        StatsCollection::read(self.pending, stream)
    }
}

impl Writer for CombiningRewriter<'_> {
    fn write(&mut self, stream: &mut dyn IoWrite) -> Result<(), Error> {
        StatsCollection::write(self.pending, stream)?;
        self.pending.reset();
        Ok(())
    }
}

impl Rewriter for CombiningRewriter<'_> {
    fn reset(&mut self) {}

    fn should_write(&self) -> bool {
        true
    }
}

/// Filters a file's content down to everything not belonging to `uid`,
/// skipping the rewrite entirely when the file held nothing for `uid` in
/// the first place.
pub struct RemoveUidRewriter {
    bucket_duration_millis: i64,
    uid: u32,
    temp: InMemoryCollection,
}

impl RemoveUidRewriter {
    pub fn new(bucket_duration_millis: i64, uid: u32) -> Self {
        RemoveUidRewriter {
            bucket_duration_millis,
            uid,
            temp: InMemoryCollection::new(bucket_duration_millis),
        }
    }
}

impl Reader for RemoveUidRewriter {
    fn read(&mut self, stream: &mut dyn Read) -> Result<(), Error> {
        StatsCollection::read(&mut self.temp, stream)?;
        self.temp.clear_dirty();
        self.temp.remove_uid(self.uid);
        Ok(())
    }
}

impl Writer for RemoveUidRewriter {
    fn write(&mut self, stream: &mut dyn IoWrite) -> Result<(), Error> {
        StatsCollection::write(&mut self.temp, stream)
    }
}

impl Rewriter for RemoveUidRewriter {
    fn reset(&mut self) {
        self.temp = InMemoryCollection::new(self.bucket_duration_millis);
    }

    fn should_write(&self) -> bool {
        self.temp.is_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CounterEntry, IdentitySet, SetKind, TAG_NONE};

    fn sample(uid: u32, rx_bytes: u64) -> (IdentitySet, u32, SetKind, u32, CounterEntry) {
        (
            IdentitySet::new(["wlan0"]),
            uid,
            SetKind::Default,
            TAG_NONE,
            CounterEntry {
                rx_bytes,
                rx_packets: 1,
                tx_bytes: 0,
                tx_packets: 0,
                elapsed_realtime: 1000,
            },
        )
    }

    #[test]
    fn combining_rewriter_merges_and_consumes_pending() {
        let mut on_disk = InMemoryCollection::new(60_000);
        let (ident, uid, set, tag, entry) = sample(10, 100);
        on_disk.record_data(&ident, uid, set, tag, 0, 60_000, entry);
        let mut on_disk_bytes = Vec::new();
        StatsCollection::write(&mut on_disk, &mut on_disk_bytes).unwrap();

        let mut pending = InMemoryCollection::new(60_000);
        let (ident, uid, set, tag, entry) = sample(20, 50);
        pending.record_data(&ident, uid, set, tag, 0, 60_000, entry);

        let mut rewriter = CombiningRewriter::new(&mut pending);
        rewriter.reset();
        rewriter.read(&mut on_disk_bytes.as_slice()).unwrap();
        assert!(rewriter.should_write());
        let mut out = Vec::new();
        rewriter.write(&mut out).unwrap();

        assert!(pending.is_empty());

        let mut merged = InMemoryCollection::new(60_000);
        StatsCollection::read(&mut merged, &mut out.as_slice()).unwrap();
        let summary = merged.get_summary(&Default::default(), 0, 60_000);
        assert_eq!(summary.entries.len(), 2);
    }

    #[test]
    fn remove_uid_rewriter_skips_untouched_files() {
        let mut untouched = InMemoryCollection::new(60_000);
        let (ident, uid, set, tag, entry) = sample(20, 50);
        untouched.record_data(&ident, uid, set, tag, 0, 60_000, entry);
        let mut bytes = Vec::new();
        StatsCollection::write(&mut untouched, &mut bytes).unwrap();

        let mut rewriter = RemoveUidRewriter::new(60_000, 10);
        rewriter.reset();
        rewriter.read(&mut bytes.as_slice()).unwrap();
        assert!(!rewriter.should_write());
    }

    #[test]
    fn remove_uid_rewriter_strips_matching_entries() {
        let mut touched = InMemoryCollection::new(60_000);
        let (ident, uid, set, tag, entry) = sample(10, 50);
        touched.record_data(&ident, uid, set, tag, 0, 60_000, entry);
        let (ident, uid, set, tag, entry) = sample(20, 75);
        touched.record_data(&ident, uid, set, tag, 0, 60_000, entry);
        let mut bytes = Vec::new();
        StatsCollection::write(&mut touched, &mut bytes).unwrap();

        let mut rewriter = RemoveUidRewriter::new(60_000, 10);
        rewriter.reset();
        rewriter.read(&mut bytes.as_slice()).unwrap();
        assert!(rewriter.should_write());
        let mut out = Vec::new();
        rewriter.write(&mut out).unwrap();

        let mut result = InMemoryCollection::new(60_000);
        StatsCollection::read(&mut result, &mut out.as_slice()).unwrap();
        let summary = result.get_summary(&Default::default(), 0, 60_000);
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.entries[0].0.uid, 20);
    }
}
