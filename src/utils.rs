// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Utility methods.

use std::fs::File;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;

/// Rewrite `path` so that everything before the first component named
/// `anchor` is replaced by `prefix`. Paths handed to the remote transfer
/// endpoint must be relative to its share root, not the local mount point:
/// `/mnt/genomics/Illumina/run1` with anchor `genomics` and prefix `/~/`
/// becomes `/~/genomics/Illumina/run1`. A path without the anchor segment
/// is returned unchanged.
pub fn endpoint_path(path: &Path, anchor: &str, prefix: &str) -> String {
    let components: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();

    match components.iter().position(|&c| c == anchor) {
        Some(idx) => format!("{}{}", prefix, components[idx..].join("/")),
        None => path.to_string_lossy().into_owned(),
    }
}

/// Write a valid, empty gzip stream to `path` unless the file already
/// exists. Returns whether a file was created. Placeholder FASTQs stand in
/// for lanes with no data, and downstream tools open them with ordinary
/// gzip readers, so an empty member is written rather than a zero-byte
/// file.
pub fn write_empty_gz(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let f = File::create(path).with_context(|| format!("couldn't create {path:?}"))?;
    let mut gz = GzEncoder::new(f, Compression::default());
    gz.write_all(b"")?;
    gz.finish()?;
    Ok(true)
}

/// The conventional name for a placeholder FASTQ standing in for `lane`.
pub fn empty_fastq_name(lane: usize) -> String {
    format!("empty_L00{lane}.fastq.gz")
}

/// Create the placeholder FASTQ for `lane` in `dir` if it is not already
/// present. Returns the placeholder path and whether it was created by
/// this call.
pub fn write_empty_fastq(dir: &Path, lane: usize) -> Result<(PathBuf, bool)> {
    let path = dir.join(empty_fastq_name(lane));
    let created = write_empty_gz(&path)?;
    Ok((path, created))
}
