// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! The `StatsCollection` collaborator contract and its in-memory reference
//! implementation.
//!
//! `StatsCollection` is specified only at its interface, with its wire format
//! opaque to the rest of the system. [`InMemoryCollection`] is this
//! repository's own concrete realization of that interface — nothing outside
//! this module may depend on the byte layout it reads and writes.

use crate::codec::OPEN_ENDED;
use crate::rewrite::{Reader, Writer};
use base::{Error, FastHashMap};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// An interned set of identities a raw interface name resolves to. Opaque
/// beyond equality and hashing for this repository's purposes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct IdentitySet(std::collections::BTreeSet<String>);

impl IdentitySet {
    pub fn new(identities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        IdentitySet(identities.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for IdentitySet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        IdentitySet(iter.into_iter().map(Into::into).collect())
    }
}

/// The default-vs-tag-set partition: each `SnapshotRecorder` handles exactly
/// one of these.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum SetKind {
    Default,
    Tagged,
}

/// A mapping key: `(identity-set, uid, set-kind, tag)`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StatsKey {
    pub ident: IdentitySet,
    pub uid: u32,
    pub set: SetKind,
    pub tag: u32,
}

/// The "no tag" sentinel used by the tag filter.
pub const TAG_NONE: u32 = 0;

/// A cumulative or delta counter sample.
#[derive(Copy, Clone, Default, Eq, PartialEq, Debug)]
pub struct CounterEntry {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub elapsed_realtime: i64,
}

impl CounterEntry {
    /// True if this entry carries no counter movement at all.
    pub fn is_empty(&self) -> bool {
        self.rx_bytes == 0 && self.rx_packets == 0 && self.tx_bytes == 0 && self.tx_packets == 0
    }

    /// `self - previous`, component-wise, clamped to zero on a decrease.
    /// Returns the delta and whether any field clamped (a non-monotonic
    /// counter event).
    pub fn delta(&self, previous: &CounterEntry) -> (CounterEntry, bool) {
        let mut non_monotonic = false;
        let mut sub = |new: u64, old: u64| -> u64 {
            if new < old {
                non_monotonic = true;
                0
            } else {
                new - old
            }
        };
        let entry = CounterEntry {
            rx_bytes: sub(self.rx_bytes, previous.rx_bytes),
            rx_packets: sub(self.rx_packets, previous.rx_packets),
            tx_bytes: sub(self.tx_bytes, previous.tx_bytes),
            tx_packets: sub(self.tx_packets, previous.tx_packets),
            elapsed_realtime: (self.elapsed_realtime - previous.elapsed_realtime).max(0),
        };
        (entry, non_monotonic)
    }

    fn add(&mut self, other: &CounterEntry) {
        self.rx_bytes += other.rx_bytes;
        self.rx_packets += other.rx_packets;
        self.tx_bytes += other.tx_bytes;
        self.tx_packets += other.tx_packets;
        self.elapsed_realtime += other.elapsed_realtime;
    }
}

/// The pre-resolution key a [`NonMonotonicObserver`] sees: subtraction
/// happens before interface names are resolved to identity sets, so the
/// observer is handed the raw `(iface, uid, tag)` triple rather than a
/// [`StatsKey`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RawStatsKey {
    pub iface: String,
    pub uid: u32,
    pub tag: u32,
}

/// Reported synchronously whenever [`CounterEntry::delta`] clamps a field.
/// Advisory only — the recorder forwards the observation and moves on
/// regardless of what the observer does with it.
pub trait NonMonotonicObserver {
    fn found_non_monotonic(&self, cookie: &str, key: &RawStatsKey);
}

/// A filter for [`StatsCollection::get_summary`]: `None` fields match any
/// value.
#[derive(Clone, Debug, Default)]
pub struct SummaryTemplate {
    pub ident: Option<IdentitySet>,
    pub uid: Option<u32>,
    pub set: Option<SetKind>,
    pub tag: Option<u32>,
}

impl SummaryTemplate {
    fn matches(&self, key: &StatsKey) -> bool {
        self.ident.as_ref().is_none_or(|i| i == &key.ident)
            && self.uid.is_none_or(|uid| uid == key.uid)
            && self.set.is_none_or(|set| set == key.set)
            && self.tag.is_none_or(|tag| tag == key.tag)
    }
}

/// The result of [`StatsCollection::get_summary`]: one aggregated entry per
/// matching key, summed over the requested time window.
#[derive(Clone, Debug, Default)]
pub struct Summary {
    pub entries: Vec<(StatsKey, CounterEntry)>,
}

/// The collaborator contract this repository's rotator and recorder consume,
/// specified only at its interface.
pub trait StatsCollection {
    fn read(&mut self, stream: &mut dyn Read) -> Result<(), Error>;
    fn write(&mut self, stream: &mut dyn Write) -> Result<(), Error>;
    fn reset(&mut self);
    fn is_dirty(&self) -> bool;
    fn clear_dirty(&mut self);
    fn total_bytes(&self) -> u64;
    fn record_collection(&mut self, other: &InMemoryCollection);
    #[allow(clippy::too_many_arguments)]
    fn record_data(
        &mut self,
        ident: &IdentitySet,
        uid: u32,
        set: SetKind,
        tag: u32,
        start_millis: i64,
        end_millis: i64,
        entry: CounterEntry,
    );
    fn remove_uid(&mut self, uid: u32) -> bool;
    fn get_summary(&self, template: &SummaryTemplate, from_millis: i64, to_millis: i64) -> Summary;
    fn start_millis(&self) -> i64;
    fn end_millis(&self) -> i64;
    fn is_empty(&self) -> bool;
}

/// The reference `StatsCollection` implementation: an in-memory multimap
/// from [`StatsKey`] to a `bucket_duration`-quantized time series of
/// [`CounterEntry`], with a length-prefixed binary encoding private to this
/// type.
#[derive(Debug)]
pub struct InMemoryCollection {
    bucket_duration_millis: i64,
    buckets: FastHashMap<StatsKey, BTreeMap<i64, CounterEntry>>,
    dirty: bool,
}

impl InMemoryCollection {
    pub fn new(bucket_duration_millis: i64) -> Self {
        assert!(bucket_duration_millis > 0);
        InMemoryCollection {
            bucket_duration_millis,
            buckets: FastHashMap::default(),
            dirty: false,
        }
    }

    pub fn bucket_duration_millis(&self) -> i64 {
        self.bucket_duration_millis
    }

    fn bucket_start(&self, millis: i64) -> i64 {
        millis.div_euclid(self.bucket_duration_millis) * self.bucket_duration_millis
    }

    fn write_key(w: &mut dyn Write, key: &StatsKey) -> Result<(), Error> {
        let idents: Vec<&str> = key.ident.iter().collect();
        w.write_u32::<BigEndian>(idents.len() as u32)?;
        for ident in idents {
            let bytes = ident.as_bytes();
            w.write_u32::<BigEndian>(bytes.len() as u32)?;
            w.write_all(bytes)?;
        }
        w.write_u32::<BigEndian>(key.uid)?;
        w.write_u8(match key.set {
            SetKind::Default => 0,
            SetKind::Tagged => 1,
        })?;
        w.write_u32::<BigEndian>(key.tag)?;
        Ok(())
    }

    fn read_key(r: &mut dyn Read) -> Result<StatsKey, Error> {
        let ident_count = r.read_u32::<BigEndian>()?;
        let mut idents = Vec::with_capacity(ident_count as usize);
        for _ in 0..ident_count {
            let len = r.read_u32::<BigEndian>()? as usize;
            let mut buf = vec![0u8; len];
            r.read_exact(&mut buf)?;
            let s = String::from_utf8(buf)
                .map_err(|_| base::format_err_t!(DataLoss, "non-utf8 identity"))?;
            idents.push(s);
        }
        let uid = r.read_u32::<BigEndian>()?;
        let set = match r.read_u8()? {
            0 => SetKind::Default,
            1 => SetKind::Tagged,
            _ => return Err(base::format_err_t!(Internal, "unrecognized set kind")),
        };
        let tag = r.read_u32::<BigEndian>()?;
        Ok(StatsKey {
            ident: IdentitySet::from_iter(idents),
            uid,
            set,
            tag,
        })
    }

    fn write_bucket(w: &mut dyn Write, start: i64, entry: &CounterEntry) -> Result<(), Error> {
        w.write_i64::<BigEndian>(start)?;
        w.write_u64::<BigEndian>(entry.rx_bytes)?;
        w.write_u64::<BigEndian>(entry.rx_packets)?;
        w.write_u64::<BigEndian>(entry.tx_bytes)?;
        w.write_u64::<BigEndian>(entry.tx_packets)?;
        w.write_i64::<BigEndian>(entry.elapsed_realtime)?;
        Ok(())
    }

    fn read_bucket(r: &mut dyn Read) -> Result<(i64, CounterEntry), Error> {
        let start = r.read_i64::<BigEndian>()?;
        let entry = CounterEntry {
            rx_bytes: r.read_u64::<BigEndian>()?,
            rx_packets: r.read_u64::<BigEndian>()?,
            tx_bytes: r.read_u64::<BigEndian>()?,
            tx_packets: r.read_u64::<BigEndian>()?,
            elapsed_realtime: r.read_i64::<BigEndian>()?,
        };
        Ok((start, entry))
    }
}

impl StatsCollection for InMemoryCollection {
    fn read(&mut self, stream: &mut dyn Read) -> Result<(), Error> {
        let key_count = stream.read_u32::<BigEndian>()?;
        for _ in 0..key_count {
            let key = Self::read_key(stream)?;
            let bucket_count = stream.read_u32::<BigEndian>()?;
            let series = self.buckets.entry(key).or_default();
            for _ in 0..bucket_count {
                let (start, entry) = Self::read_bucket(stream)?;
                series.entry(start).or_default().add(&entry);
            }
        }
        if key_count > 0 {
            self.dirty = true;
        }
        Ok(())
    }

    fn write(&mut self, stream: &mut dyn Write) -> Result<(), Error> {
        stream.write_u32::<BigEndian>(self.buckets.len() as u32)?;
        for (key, series) in &self.buckets {
            Self::write_key(stream, key)?;
            stream.write_u32::<BigEndian>(series.len() as u32)?;
            for (start, entry) in series {
                Self::write_bucket(stream, *start, entry)?;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.buckets.clear();
        self.dirty = false;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn total_bytes(&self) -> u64 {
        let mut total: u64 = 4; // key_count
        for (key, series) in &self.buckets {
            total += 4 + key.ident.iter().map(|s| 4 + s.len() as u64).sum::<u64>();
            total += 4 + 1 + 4; // uid, set, tag
            total += 4; // bucket_count
            total += series.len() as u64 * (8 + 8 + 8 + 8 + 8 + 8);
        }
        total
    }

    fn record_collection(&mut self, other: &InMemoryCollection) {
        for (key, series) in &other.buckets {
            let dst = self.buckets.entry(key.clone()).or_default();
            for (start, entry) in series {
                dst.entry(*start).or_default().add(entry);
            }
        }
        if !other.buckets.is_empty() {
            self.dirty = true;
        }
    }

    fn record_data(
        &mut self,
        ident: &IdentitySet,
        uid: u32,
        set: SetKind,
        tag: u32,
        start_millis: i64,
        _end_millis: i64,
        entry: CounterEntry,
    ) {
        if entry.is_empty() {
            return;
        }
        let key = StatsKey {
            ident: ident.clone(),
            uid,
            set,
            tag,
        };
        let bucket = self.bucket_start(start_millis);
        self.buckets
            .entry(key)
            .or_default()
            .entry(bucket)
            .or_default()
            .add(&entry);
        self.dirty = true;
    }

    fn remove_uid(&mut self, uid: u32) -> bool {
        let before = self.buckets.len();
        self.buckets.retain(|key, _| key.uid != uid);
        let changed = self.buckets.len() != before;
        if changed {
            self.dirty = true;
        }
        changed
    }

    fn get_summary(&self, template: &SummaryTemplate, from_millis: i64, to_millis: i64) -> Summary {
        let mut entries = Vec::new();
        for (key, series) in &self.buckets {
            if !template.matches(key) {
                continue;
            }
            let mut total = CounterEntry::default();
            let mut any = false;
            for (start, entry) in series {
                if *start >= from_millis && *start < to_millis {
                    total.add(entry);
                    any = true;
                }
            }
            if any {
                entries.push((key.clone(), total));
            }
        }
        Summary { entries }
    }

    fn start_millis(&self) -> i64 {
        self.buckets
            .values()
            .filter_map(|series| series.keys().next().copied())
            .min()
            .unwrap_or(OPEN_ENDED)
    }

    fn end_millis(&self) -> i64 {
        self.buckets
            .values()
            .filter_map(|series| series.keys().next_back().map(|s| s + self.bucket_duration_millis))
            .max()
            .unwrap_or(0)
    }

    fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Lets an [`InMemoryCollection`] be handed directly to [`crate::rotator::FileRotator`]
/// operations that want a bare `Reader`/`Writer` (e.g. `read_matching`) without
/// going through one of the [`crate::adapters`] rewriters.
impl Reader for InMemoryCollection {
    fn read(&mut self, stream: &mut dyn Read) -> Result<(), Error> {
        StatsCollection::read(self, stream)
    }
}

impl Writer for InMemoryCollection {
    fn write(&mut self, stream: &mut dyn Write) -> Result<(), Error> {
        StatsCollection::write(self, stream)
    }
}
