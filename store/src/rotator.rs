// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! A `logrotate`-style directory manager with crash-safe in-place rewrites.
//!
//! Uses plain `std::fs` path operations (rename, write-new-file, flush,
//! fsync, rename-into-place) rather than raw-fd/directory-fd handles: there's
//! no multi-process/`flock` coordination to support here, so the extra
//! complexity of fd-based directory handling has nothing to buy.

use crate::codec::{FileNameCodec, FileRange, OPEN_ENDED};
use crate::rewrite::{Reader, Rewriter};
use base::Error;
use std::fs;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};

/// Configuration for a [`FileRotator`].
#[derive(Clone, Debug)]
pub struct RotatorConfig {
    pub base_path: PathBuf,
    pub prefix: String,

    /// How long an active file may grow before [`FileRotator::maybe_rotate`]
    /// seals it into a historical file.
    pub rotate_age_millis: i64,

    /// How long a sealed file may sit before [`FileRotator::maybe_rotate`]
    /// deletes it.
    pub delete_age_millis: i64,
}

/// A `logrotate`-style directory manager: one active file grows over time;
/// when old enough it's sealed into a historical file; historical files
/// eventually expire and are deleted. Not thread-safe — callers must
/// serialize all access to a given instance.
#[derive(Debug)]
pub struct FileRotator {
    base_path: PathBuf,
    codec: FileNameCodec,
    rotate_age_millis: i64,
    delete_age_millis: i64,
}

impl FileRotator {
    /// Opens (creating if necessary) the rotator's directory and runs the
    /// crash-recovery sweep.
    pub fn new(config: RotatorConfig) -> Result<Self, Error> {
        fs::create_dir_all(&config.base_path)?;
        recover(&config.base_path, &config.prefix)?;
        Ok(FileRotator {
            codec: FileNameCodec::new(config.prefix.clone()),
            base_path: config.base_path,
            rotate_age_millis: config.rotate_age_millis,
            delete_age_millis: config.delete_age_millis,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Lists every file this rotator manages along with its parsed range.
    /// For inspection tooling; not used by any durability-critical path.
    pub fn list(&self) -> Result<Vec<(String, FileRange)>, Error> {
        self.matched_entries()
    }

    /// Deletes every file this rotator manages. Per-entry failures are
    /// logged and swallowed; a directory-listing failure propagates.
    pub fn delete_all(&self) -> Result<(), Error> {
        for (name, _) in self.matched_entries()? {
            if let Err(e) = fs::remove_file(self.base_path.join(&name)) {
                tracing::warn!(name = %name, err = %e, "failed to delete file");
            }
        }
        Ok(())
    }

    /// Atomically folds `rewriter`'s output into the current active file,
    /// per the selection policy below.
    pub fn rewrite_active(&self, rewriter: &mut dyn Rewriter, now_millis: i64) -> Result<(), Error> {
        let name = self.active_name_for_rewrite(now_millis)?;
        self.rewrite_single(rewriter, &name)
    }

    /// Runs `rewriter` against every managed file. Visitation order is
    /// unspecified; `rewriter` must be commutative across files.
    pub fn rewrite_all(&self, rewriter: &mut dyn Rewriter) -> Result<(), Error> {
        for (name, _) in self.matched_entries()? {
            self.rewrite_single(rewriter, &name)?;
        }
        Ok(())
    }

    /// Streams the content of every managed file whose range intersects
    /// `[from_millis, to_millis]` (closed) to `reader`.
    pub fn read_matching(
        &self,
        reader: &mut dyn Reader,
        from_millis: i64,
        to_millis: i64,
    ) -> Result<(), Error> {
        for (name, range) in self.matched_entries()? {
            if range.intersects(from_millis, to_millis) {
                let f = fs::File::open(self.base_path.join(&name))?;
                let mut r = BufReader::new(f);
                reader.read(&mut r)?;
            }
        }
        Ok(())
    }

    /// Seals active files old enough to rotate and deletes sealed files old
    /// enough to expire. Per-entry failures are logged and swallowed.
    pub fn maybe_rotate(&self, now_millis: i64) -> Result<(), Error> {
        for (name, range) in self.matched_entries()? {
            if range.is_active() {
                if range.start_millis <= now_millis.saturating_sub(self.rotate_age_millis) {
                    let new_name = self.codec.build(range.start_millis, now_millis);
                    if let Err(e) = fs::rename(
                        self.base_path.join(&name),
                        self.base_path.join(&new_name),
                    ) {
                        tracing::warn!(name = %name, err = %e, "failed to rotate active file");
                    } else {
                        tracing::info!(from = %name, to = %new_name, "rotated");
                    }
                }
            } else if range.end_millis <= now_millis.saturating_sub(self.delete_age_millis) {
                if let Err(e) = fs::remove_file(self.base_path.join(&name)) {
                    tracing::warn!(name = %name, err = %e, "failed to delete expired file");
                } else {
                    tracing::info!(name = %name, "expired");
                }
            }
        }
        Ok(())
    }

    /// Picks the active file `rewrite_active` should target: among active
    /// files with `start_millis < now_millis`, the one with the smallest
    /// `start_millis`; if none exists, a not-yet-created name starting now.
    fn active_name_for_rewrite(&self, now_millis: i64) -> Result<String, Error> {
        let mut best: Option<(i64, String)> = None;
        for (name, range) in self.matched_entries()? {
            if range.is_active() && range.start_millis < now_millis {
                let better = match &best {
                    None => true,
                    Some((s, _)) => range.start_millis < *s,
                };
                if better {
                    best = Some((range.start_millis, name));
                }
            }
        }
        Ok(match best {
            Some((_, name)) => name,
            None => self.codec.build(now_millis, OPEN_ENDED),
        })
    }

    fn matched_entries(&self) -> Result<Vec<(String, FileRange)>, Error> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(range) = self.codec.parse(&name) {
                out.push((name, range));
            }
        }
        Ok(out)
    }

    /// The atomic read-modify-write protocol: reset, read existing content
    /// (if any), consult the write gate, then rename-to-backup (or create a
    /// no-backup marker) before writing the replacement in place.
    fn rewrite_single(&self, rewriter: &mut dyn Rewriter, name: &str) -> Result<(), Error> {
        rewriter.reset();
        let target = self.base_path.join(name);
        match fs::File::open(&target) {
            Ok(f) => {
                {
                    let mut r = BufReader::new(f);
                    rewriter.read(&mut r)?;
                }
                if !rewriter.should_write() {
                    return Ok(());
                }
                let backup = self.base_path.join(format!("{name}.backup"));
                fs::rename(&target, &backup)?;
                match write_new(&target, rewriter) {
                    Ok(()) => {
                        fs::remove_file(&backup)?;
                        Ok(())
                    }
                    Err(e) => {
                        let _ = fs::remove_file(&target);
                        fs::rename(&backup, &target)?;
                        Err(e)
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let marker = self.base_path.join(format!("{name}.no_backup"));
                fs::File::create(&marker)?;
                match write_new(&target, rewriter) {
                    Ok(()) => {
                        fs::remove_file(&marker)?;
                        Ok(())
                    }
                    Err(e) => {
                        let _ = fs::remove_file(&target);
                        let _ = fs::remove_file(&marker);
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Creates `target` fresh, calls `rewriter.write`, then flushes and fsyncs
/// before returning — flush moves userspace buffers into the kernel; fsync
/// then pushes kernel buffers to the storage device.
fn write_new(target: &Path, rewriter: &mut dyn Rewriter) -> Result<(), Error> {
    use crate::rewrite::Writer as _;
    let f = fs::File::create(target)?;
    let mut w = BufWriter::new(f);
    rewriter.write(&mut w)?;
    w.flush()?;
    let f = w.into_inner().map_err(|e| e.into_error())?;
    f.sync_all()?;
    Ok(())
}

/// Crash-recovery sweep: resolves any sidecar left over from a rewrite that
/// didn't complete. Idempotent.
fn recover(base_path: &Path, prefix: &str) -> Result<(), Error> {
    for entry in fs::read_dir(base_path)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.starts_with(prefix) {
            continue;
        }
        if let Some(base_name) = name.strip_suffix(".backup") {
            tracing::info!(name = %name, "recovering: restoring backup after interrupted rewrite");
            fs::rename(entry.path(), base_path.join(base_name))?;
        } else if let Some(base_name) = name.strip_suffix(".no_backup") {
            tracing::info!(name = %name, "recovering: removing partial write that had no prior content");
            let _ = fs::remove_file(base_path.join(base_name));
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::Writer as _;
    use std::io::{Read as _, Write as _};

    struct ConstantWriter(&'static [u8], bool);

    impl Reader for ConstantWriter {
        fn read(&mut self, _stream: &mut dyn std::io::Read) -> Result<(), Error> {
            Ok(())
        }
    }
    impl Writer for ConstantWriter {
        fn write(&mut self, stream: &mut dyn std::io::Write) -> Result<(), Error> {
            stream.write_all(self.0)?;
            Ok(())
        }
    }
    impl Rewriter for ConstantWriter {
        fn reset(&mut self) {}
        fn should_write(&self) -> bool {
            self.1
        }
    }

    fn config(dir: &tempfile::TempDir) -> RotatorConfig {
        RotatorConfig {
            base_path: dir.path().to_owned(),
            prefix: "p".to_owned(),
            rotate_age_millis: 60_000,
            delete_age_millis: 120_000,
        }
    }

    #[test]
    fn rotate_and_expire() {
        let dir = tempfile::tempdir().unwrap();
        let r = FileRotator::new(config(&dir)).unwrap();
        r.rewrite_active(&mut ConstantWriter(b"A", true), 0).unwrap();
        assert!(dir.path().join("p.0-").exists());

        r.maybe_rotate(70_000).unwrap();
        assert!(!dir.path().join("p.0-").exists());
        assert!(dir.path().join("p.0-70000").exists());

        r.maybe_rotate(200_000).unwrap();
        assert!(!dir.path().join("p.0-70000").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn active_selection_picks_oldest_covering_now() {
        let dir = tempfile::tempdir().unwrap();
        let r = FileRotator::new(config(&dir)).unwrap();
        fs::write(dir.path().join("p.100-"), b"").unwrap();
        fs::write(dir.path().join("p.50-"), b"").unwrap();
        fs::write(dir.path().join("p.200-"), b"").unwrap(); // starts after now_millis

        let name = r.active_name_for_rewrite(150).unwrap();
        assert_eq!(name, "p.50-");
    }

    #[test]
    fn crash_recovery_restores_backup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("p.0-"), b"X").unwrap();
        fs::rename(dir.path().join("p.0-"), dir.path().join("p.0-.backup")).unwrap();
        fs::write(dir.path().join("p.0-"), b"partial-Y").unwrap();

        let _r = FileRotator::new(config(&dir)).unwrap();
        assert!(!dir.path().join("p.0-.backup").exists());
        assert_eq!(fs::read(dir.path().join("p.0-")).unwrap(), b"X");
    }

    #[test]
    fn crash_recovery_removes_partial_new_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("p.5-.no_backup"), b"").unwrap();
        fs::write(dir.path().join("p.5-"), b"partial-Z").unwrap();

        let _r = FileRotator::new(config(&dir)).unwrap();
        assert!(!dir.path().join("p.5-.no_backup").exists());
        assert!(!dir.path().join("p.5-").exists());
    }

    #[test]
    fn should_write_false_skips_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let r = FileRotator::new(config(&dir)).unwrap();
        fs::write(dir.path().join("p.0-"), b"original").unwrap();
        r.rewrite_active(&mut ConstantWriter(b"ignored", false), 5)
            .unwrap();
        assert_eq!(fs::read(dir.path().join("p.0-")).unwrap(), b"original");
    }

    #[test]
    fn read_matching_visits_overlapping_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let r = FileRotator::new(config(&dir)).unwrap();
        fs::write(dir.path().join("p.0-100"), b"a").unwrap();
        fs::write(dir.path().join("p.100-200"), b"b").unwrap();
        fs::write(dir.path().join("p.500-600"), b"c").unwrap();

        struct Collect(Vec<u8>);
        impl Reader for Collect {
            fn read(&mut self, stream: &mut dyn std::io::Read) -> Result<(), Error> {
                stream.read_to_end(&mut self.0)?;
                Ok(())
            }
        }
        let mut collect = Collect(Vec::new());
        r.read_matching(&mut collect, 50, 150).unwrap();
        let mut s = collect.0;
        s.sort();
        assert_eq!(s, b"ab".to_vec());
    }

    #[test]
    fn synthesizes_new_active_name_when_none_exists() {
        let dir = tempfile::tempdir().unwrap();
        let r = FileRotator::new(config(&dir)).unwrap();
        let name = r.active_name_for_rewrite(42).unwrap();
        assert_eq!(name, "p.42-");
    }
}
