// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! Subcommand to run a rotator's age-based rotation/expiry sweep on demand.

use base::clock::Clocks;
use base::Error;
use bpaf::Bpaf;
use std::path::PathBuf;

/// Runs `maybe_rotate` against a rotator directory: seals active files old
/// enough to rotate, deletes sealed files old enough to expire.
#[derive(Bpaf, Debug)]
#[bpaf(command("gc"))]
pub struct Args {
    /// TOML file describing the rotator to garbage-collect.
    #[bpaf(long("config"), argument("PATH"))]
    config: PathBuf,

    /// Milliseconds since the epoch to treat as "now". Defaults to the
    /// current wall-clock time.
    #[bpaf(long("now"), argument("MILLIS"))]
    now_millis: Option<i64>,
}

pub fn run(args: Args, clocks: &dyn Clocks) -> Result<i32, Error> {
    let rotator = super::open_rotator(&args.config)?;
    let now_millis = args.now_millis.unwrap_or_else(|| clocks.now_millis());
    rotator.maybe_rotate(now_millis)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base::clock::SimulatedClocks;
    use std::fs;

    #[test]
    fn defaults_now_to_the_injected_clock() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("rotorstat.toml");
        fs::write(
            config_path.as_path(),
            format!(
                "base_path = {:?}\nprefix = \"p\"\nrotate_age_millis = \"1m\"\ndelete_age_millis = \"2m\"\n",
                dir.path().join("data").display()
            ),
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/p.0-"), b"").unwrap();

        let clocks = SimulatedClocks::new(70_000);
        run(
            Args {
                config: config_path,
                now_millis: None,
            },
            &clocks,
        )
        .unwrap();
        assert!(dir.path().join("data/p.0-70000").exists());
    }
}
