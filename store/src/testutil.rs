// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! Test-only helpers shared by this crate's `#[cfg(test)]` modules and by
//! `tests/scenarios.rs`.

use crate::collection::IdentitySet;
use crate::recorder::IdentityResolver;
use crate::rotator::RotatorConfig;
use std::sync::Once;

static INIT: Once = Once::new();

/// Installs test logging exactly once per process.
pub fn init() {
    INIT.call_once(base::tracing_setup::install_for_tests);
}

/// A resolver that treats every interface name as its own one-element
/// identity set — sufficient for tests that don't exercise interface
/// aggregation.
pub struct IdentityIdentityResolver;

impl IdentityResolver for IdentityIdentityResolver {
    fn resolve(&self, iface: &str) -> Option<IdentitySet> {
        Some(IdentitySet::new([iface]))
    }
}

/// Builds a [`RotatorConfig`] rooted at `dir` with the given ages.
pub fn rotator_config(
    dir: impl Into<std::path::PathBuf>,
    prefix: &str,
    rotate_age_millis: i64,
    delete_age_millis: i64,
) -> RotatorConfig {
    RotatorConfig {
        base_path: dir.into(),
        prefix: prefix.to_owned(),
        rotate_age_millis,
        delete_age_millis,
    }
}
