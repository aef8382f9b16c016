// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! TOML configuration loading for the CLI. The core `store` crate's configs
//! (`RotatorConfig`, `RecorderConfig`) use plain millisecond integers — this
//! layer is where human-readable durations ("2h", "7d") get parsed, the way
//! a config file read at the edge of a service should.

use base::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use store::rotator::RotatorConfig;

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    pub base_path: PathBuf,
    pub prefix: String,
    #[serde(deserialize_with = "deserialize_duration_millis")]
    pub rotate_age_millis: i64,
    #[serde(deserialize_with = "deserialize_duration_millis")]
    pub delete_age_millis: i64,
}

fn deserialize_duration_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let d: jiff::SignedDuration = s
        .parse()
        .map_err(|e| serde::de::Error::custom(format!("{s}: {e}")))?;
    Ok(d.as_millis() as i64)
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| base::format_err_t!(InvalidArgument, "{}: {}", path.display(), e))
    }

    pub fn into_rotator_config(self) -> RotatorConfig {
        RotatorConfig {
            base_path: self.base_path,
            prefix: self.prefix,
            rotate_age_millis: self.rotate_age_millis,
            delete_age_millis: self.delete_age_millis,
        }
    }
}
