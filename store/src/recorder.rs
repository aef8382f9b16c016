// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! `SnapshotRecorder`: subtracts successive cumulative snapshots into
//! deltas, distributes them across `pending`/`since_boot`/`complete`, and
//! persists to the rotator once enough has piled up.

use crate::adapters::{CombiningRewriter, RemoveUidRewriter};
use crate::cache::CompleteCache;
use crate::collection::{
    CounterEntry, IdentitySet, RawStatsKey, SetKind, StatsCollection, TAG_NONE,
};
use crate::rotator::FileRotator;
use base::{Error, FastHashMap, FastHashSet};
use std::sync::{Arc, Mutex};

/// Resolves a raw interface name to the identity set it should be recorded
/// under. A collaborator interface, analogous to `StatsCollection` — only the
/// resolution outcome matters here, not how resolution is performed.
pub trait IdentityResolver {
    fn resolve(&self, iface: &str) -> Option<IdentitySet>;
}

/// One cumulative counter sample for one `(iface, uid, tag)` triple.
#[derive(Clone, Debug)]
pub struct RawEntry {
    pub iface: String,
    pub uid: u32,
    pub tag: u32,
    pub counters: CounterEntry,
}

/// A full cumulative snapshot handed to [`SnapshotRecorder::record_snapshot`].
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub entries: Vec<RawEntry>,
}

/// Configuration for a [`SnapshotRecorder`].
#[derive(Clone, Debug)]
pub struct RecorderConfig {
    pub bucket_duration_millis: i64,
    pub persist_threshold_bytes: u64,
    pub only_tags: bool,
    pub cookie: String,
}

impl RecorderConfig {
    fn set_kind(&self) -> SetKind {
        if self.only_tags {
            SetKind::Tagged
        } else {
            SetKind::Default
        }
    }
}

/// A stateful recorder that turns periodic cumulative samples into durable,
/// time-bucketed delta history. Not thread-safe; `Send` but not required
/// `Sync` — callers sharing one across threads wrap it in a `Mutex` they own.
pub struct SnapshotRecorder {
    rotator: FileRotator,
    observer: Box<dyn crate::collection::NonMonotonicObserver + Send>,
    config: RecorderConfig,

    last_snapshot: Option<FastHashMap<(String, u32, u32), CounterEntry>>,
    pending: InMemoryCollectionHolder,
    since_boot: InMemoryCollectionHolder,
    complete: CompleteCache,
    unknown_interfaces: FastHashSet<String>,
}

/// A thin indirection so `pending`/`since_boot` can be swapped wholesale on
/// `reset()` without touching the outer struct's field layout.
type InMemoryCollectionHolder = crate::collection::InMemoryCollection;

impl SnapshotRecorder {
    pub fn new(
        rotator: FileRotator,
        observer: Box<dyn crate::collection::NonMonotonicObserver + Send>,
        config: RecorderConfig,
    ) -> Self {
        let bucket_duration_millis = config.bucket_duration_millis;
        SnapshotRecorder {
            rotator,
            observer,
            config,
            last_snapshot: None,
            pending: InMemoryCollectionHolder::new(bucket_duration_millis),
            since_boot: InMemoryCollectionHolder::new(bucket_duration_millis),
            complete: CompleteCache::new(),
            unknown_interfaces: FastHashSet::default(),
        }
    }

    pub fn unknown_interfaces(&self) -> &FastHashSet<String> {
        &self.unknown_interfaces
    }

    /// Ingests one cumulative snapshot. The very first call ever made
    /// establishes the baseline and is never itself recorded.
    ///
    /// `interface_identity` resolves each snapshot entry's raw interface name
    /// to the identity set it should be recorded under. It is supplied fresh
    /// on every call, not fixed at construction: which identities an
    /// interface carries (e.g. roaming state, metered-ness) can change
    /// between snapshots even though the interface name doesn't.
    pub fn record_snapshot(
        &mut self,
        snapshot: Snapshot,
        interface_identity: &dyn IdentityResolver,
        now_millis: i64,
    ) {
        let Some(last) = self.last_snapshot.take() else {
            self.last_snapshot = Some(Self::index(&snapshot));
            return;
        };

        let start_by_elapsed = |elapsed: i64| now_millis.saturating_sub(elapsed);
        let set = self.config.set_kind();

        for raw in &snapshot.entries {
            let key3 = (raw.iface.clone(), raw.uid, raw.tag);
            let previous = last.get(&key3).copied().unwrap_or_default();
            let (delta, non_monotonic) = raw.counters.delta(&previous);

            if non_monotonic {
                let raw_key = RawStatsKey {
                    iface: raw.iface.clone(),
                    uid: raw.uid,
                    tag: raw.tag,
                };
                self.observer
                    .found_non_monotonic(&self.config.cookie, &raw_key);
            }

            let Some(ident) = interface_identity.resolve(&raw.iface) else {
                self.unknown_interfaces.insert(raw.iface.clone());
                tracing::debug!(iface = %raw.iface, "skipping unresolved interface");
                continue;
            };

            if delta.is_empty() {
                continue;
            }

            let wants_tagged = raw.tag != TAG_NONE;
            if wants_tagged != self.config.only_tags {
                continue;
            }

            let start = start_by_elapsed(delta.elapsed_realtime);
            self.pending
                .record_data(&ident, raw.uid, set, raw.tag, start, now_millis, delta);
            self.since_boot
                .record_data(&ident, raw.uid, set, raw.tag, start, now_millis, delta);
            if let Some(complete) = self.complete.get() {
                complete
                    .lock()
                    .unwrap()
                    .record_data(&ident, raw.uid, set, raw.tag, start, now_millis, delta);
            }
        }

        self.last_snapshot = Some(Self::index(&snapshot));
    }

    fn index(snapshot: &Snapshot) -> FastHashMap<(String, u32, u32), CounterEntry> {
        snapshot
            .entries
            .iter()
            .map(|e| ((e.iface.clone(), e.uid, e.tag), e.counters))
            .collect()
    }

    /// The persistence gate: force a persist once `pending` has grown past
    /// the configured threshold; otherwise just let the rotator review ages.
    pub fn maybe_persist(&mut self, now_millis: i64) -> Result<(), Error> {
        if self.pending.total_bytes() >= self.config.persist_threshold_bytes {
            self.force_persist(now_millis)
        } else {
            self.rotator.maybe_rotate(now_millis)
        }
    }

    /// Folds `pending` into the active file and clears it. I/O failures are
    /// logged and swallowed — `pending` is left untouched so the next
    /// attempt retries.
    pub fn force_persist(&mut self, now_millis: i64) -> Result<(), Error> {
        if !self.pending.is_dirty() {
            return Ok(());
        }
        let result = (|| -> Result<(), Error> {
            let mut rewriter = CombiningRewriter::new(&mut self.pending);
            self.rotator.rewrite_active(&mut rewriter, now_millis)?;
            self.rotator.maybe_rotate(now_millis)?;
            Ok(())
        })();
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(err = %e, "force_persist failed; pending retained for retry");
                Ok(())
            }
        }
    }

    /// Removes every trace of `uid` from disk and from `last_snapshot`.
    /// I/O failures are logged, not propagated.
    pub fn remove_uid(&mut self, uid: u32) {
        let mut rewriter =
            RemoveUidRewriter::new(self.config.bucket_duration_millis, uid);
        match self.rotator.rewrite_all(&mut rewriter) {
            Ok(()) => {
                if let Some(last) = &mut self.last_snapshot {
                    last.retain(|(_, u, _), _| *u != uid);
                }
            }
            Err(e) => {
                tracing::error!(err = %e, uid, "remove_uid failed");
            }
        }
    }

    /// Returns the fully materialized history, rebuilding from disk plus
    /// `pending` if the cached handle was reclaimed.
    pub fn get_or_load_complete(&mut self) -> Arc<Mutex<InMemoryCollectionHolder>> {
        if let Some(existing) = self.complete.get() {
            return existing;
        }
        let mut fresh = InMemoryCollectionHolder::new(self.config.bucket_duration_millis);
        if let Err(e) = self.rotator.read_matching(&mut fresh, i64::MIN, i64::MAX) {
            tracing::error!(err = %e, "get_or_load_complete: read_matching failed, returning partial result");
        }
        fresh.record_collection(&self.pending);
        let arc = Arc::new(Mutex::new(fresh));
        self.complete.install(&arc);
        arc
    }

    /// Legacy import: wipes any existing data (to avoid duplicates) then
    /// writes `collection`'s content directly at its original time range.
    /// Used for both the network-wide and per-uid legacy formats; they
    /// differ only in what the caller loaded into `collection` before
    /// calling this.
    pub fn import_legacy(&mut self, mut collection: InMemoryCollectionHolder) -> Result<(), Error> {
        self.rotator.delete_all()?;
        if collection.is_empty() {
            return Ok(());
        }
        let start = collection.start_millis();
        let end = collection.end_millis();
        let mut rewriter = CombiningRewriter::new(&mut collection);
        self.rotator.rewrite_active(&mut rewriter, start)?;
        self.rotator.maybe_rotate(end)?;
        Ok(())
    }

    /// Clears all in-memory state. Does not touch disk.
    pub fn reset(&mut self) {
        self.last_snapshot = None;
        self.pending = InMemoryCollectionHolder::new(self.config.bucket_duration_millis);
        self.since_boot = InMemoryCollectionHolder::new(self.config.bucket_duration_millis);
        self.complete.invalidate();
        self.unknown_interfaces.clear();
    }
}
