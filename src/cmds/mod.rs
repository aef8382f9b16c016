// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

pub mod gc;
pub mod inspect;

use crate::config::FileConfig;
use base::Error;
use std::path::Path;
use store::rotator::FileRotator;

/// Loads `--config` and opens the rotator it describes, running the
/// crash-recovery sweep in the process (`store::rotator::FileRotator::new`).
fn open_rotator(config_path: &Path) -> Result<FileRotator, Error> {
    let config = FileConfig::load(config_path)?;
    FileRotator::new(config.into_rotator_config())
}
