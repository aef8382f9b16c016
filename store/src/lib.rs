// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! A time-bucketed, rotating on-disk store with crash-safe in-place
//! rewrites, plus a snapshot-delta recorder built on top of it.
//!
//! [`rotator::FileRotator`] manages a directory of `logrotate`-style files;
//! [`recorder::SnapshotRecorder`] turns periodic cumulative counter samples
//! into durable time-series history persisted through a rotator.

pub mod adapters;
pub mod cache;
pub mod codec;
pub mod collection;
pub mod recorder;
pub mod rewrite;
pub mod rotator;

pub mod testutil;
