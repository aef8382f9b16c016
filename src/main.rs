// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! A small CLI over a configured [`store::rotator::FileRotator`] directory.
//! This exists as the ambient operability surface a production Rust service
//! in this codebase's style always ships: config loading plus a way to
//! invoke maintenance operations, kept deliberately minimal since richer UI
//! surfaces are out of scope here.

use base::Error;
use bpaf::{Bpaf, Parser};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

mod cmds;
mod config;

/// rotorstat: a time-bucketed rotating stats store.
#[derive(Bpaf, Debug)]
#[bpaf(options, version(env!("CARGO_PKG_VERSION")))]
enum Args {
    // See docstrings of `cmds::*::Args` structs for a description of the
    // respective subcommands.
    Inspect(#[bpaf(external(cmds::inspect::args))] cmds::inspect::Args),
    Gc(#[bpaf(external(cmds::gc::args))] cmds::gc::Args),
}

impl Args {
    fn run(self) -> Result<i32, Error> {
        match self {
            Args::Inspect(a) => cmds::inspect::run(a),
            Args::Gc(a) => cmds::gc::run(a, &base::clock::RealClocks::default()),
        }
    }
}

fn main() {
    base::tracing_setup::install();

    // Get the program name from the OS (e.g. if invoked as
    // `target/debug/rotorstat`: `rotorstat`), falling back to the crate name
    // if conversion to a path/UTF-8 string fails. `bpaf`'s default logic is
    // similar but doesn't have the fallback.
    let progname = std::env::args_os().next().map(PathBuf::from);
    let progname = progname
        .as_deref()
        .and_then(Path::file_name)
        .and_then(OsStr::to_str)
        .unwrap_or(env!("CARGO_PKG_NAME"));

    let args = match args()
        .fallback_to_usage()
        .run_inner(bpaf::Args::current_args().set_name(progname))
    {
        Ok(a) => a,
        Err(e) => std::process::exit(e.exit_code()),
    };
    tracing::trace!("Parsed command-line arguments: {args:#?}");

    match args.run() {
        Err(e) => {
            error!(err = %e, "exiting due to error");
            std::process::exit(1);
        }
        Ok(rv) => {
            debug!("exiting with status {}", rv);
            std::process::exit(rv)
        }
    }
}
