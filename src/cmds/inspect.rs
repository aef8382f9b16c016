// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! Subcommand to list the files a rotator directory currently manages.

use base::Error;
use bpaf::Bpaf;
use std::path::PathBuf;

/// Lists the managed files in a rotator directory and their parsed ranges.
#[derive(Bpaf, Debug)]
#[bpaf(command("inspect"))]
pub struct Args {
    /// TOML file describing the rotator to inspect.
    #[bpaf(long("config"), argument("PATH"))]
    config: PathBuf,
}

pub fn run(args: Args) -> Result<i32, Error> {
    let rotator = super::open_rotator(&args.config)?;
    let mut entries = rotator.list()?;
    entries.sort_by_key(|(_, range)| range.start_millis);
    for (name, range) in &entries {
        if range.is_active() {
            println!("{name}\tstart={}\tend=(active)", range.start_millis);
        } else {
            println!(
                "{name}\tstart={}\tend={}",
                range.start_millis, range.end_millis
            );
        }
    }
    Ok(0)
}
