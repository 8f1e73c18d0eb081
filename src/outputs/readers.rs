//! Per-source output file readers.
//!
//! Each reader turns one result file into a flat `field -> value`
//! mapping; counts files, which are feature tables rather than field
//! sets, have their own entry point. The reader for a file is chosen by
//! its classified `(output_type, output_source)` pair.

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{OutputFileRecord, OutputSource, OutputType};

lazy_static! {
    static ref HTML_ROW_REGEX: Regex = Regex::new(r"(?s)<tr[^>]*>(.*?)</tr>").unwrap();
    static ref HTML_CELL_REGEX: Regex = Regex::new(r"(?s)<t[dh][^>]*>(.*?)</t[dh]>").unwrap();
    static ref HTML_TAG_REGEX: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Read one classified output file into a field mapping.
pub fn read_fields(record: &OutputFileRecord) -> Result<HashMap<String, String>> {
    let path = &record.path;
    match (record.output_type, record.output_source) {
        (
            OutputType::Metrics,
            OutputSource::PicardAlign | OutputSource::PicardMarkdups | OutputSource::PicardRnaseq,
        ) => read_picard_html(path),
        (OutputType::Metrics, OutputSource::TophatStats) => read_tophat_stats(path),
        (OutputType::Metrics, OutputSource::Htseq) => read_htseq_summary(path),
        (OutputType::Qc | OutputType::Validation, OutputSource::Sexcheck) => read_record_csv(path),
        (OutputType::Qc, OutputSource::Fastqc) => read_fastqc_summary(path),
        (OutputType::Counts, _) => bail!("counts files are tables; use read_counts"),
        (ty, source) => bail!("no reader for {ty:?} output produced by {source:?}"),
    }
}

/// Read an htseq counts file as ordered `(feature, count)` pairs. The
/// `__`-prefixed summary tail is not part of the counts table.
pub fn read_counts(record: &OutputFileRecord) -> Result<Vec<(String, String)>> {
    if record.output_type != OutputType::Counts {
        bail!("{:?} is not a counts file", record.path);
    }
    let text = read_text(&record.path)?;
    Ok(text
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with("__"))
        .filter_map(|l| l.split_once('\t'))
        .map(|(feature, count)| (feature.to_string(), count.trim().to_string()))
        .collect())
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("couldn't read output file {path:?}"))
}

/// Picard writes its metrics as an HTML document containing one table
/// whose first row is the metric names and second row the values.
fn read_picard_html(path: &Path) -> Result<HashMap<String, String>> {
    let text = read_text(path)?;

    let mut rows = Vec::new();
    for row in HTML_ROW_REGEX.captures_iter(&text) {
        let cells: Vec<String> = HTML_CELL_REGEX
            .captures_iter(row.get(1).unwrap().as_str())
            .map(|c| {
                HTML_TAG_REGEX
                    .replace_all(c.get(1).unwrap().as_str(), "")
                    .trim()
                    .to_string()
            })
            .collect();
        if cells.len() > 1 {
            rows.push(cells);
        }
    }

    let Some((header, values)) = rows.first().zip(rows.get(1)) else {
        bail!("no metrics table in {path:?}");
    };
    Ok(header
        .iter()
        .zip(values)
        .map(|(h, v)| (h.to_lowercase(), v.clone()))
        .collect())
}

/// Canonical field name for one line of a tophat_stats file, which is
/// `value<TAB>description` text. Unknown descriptions are ignored.
fn tophat_stats_field(label: &str) -> Option<&'static str> {
    let label = label.trim().to_lowercase();
    if label.contains("total reads in fastq") {
        Some("fastq_total_reads")
    } else if label.contains("aligned in sam") {
        Some("reads_aligned_sam")
    } else if label.contains("multiple alignments") {
        Some("multihit_reads")
    } else if label.contains("uniquely aligned") {
        Some("unique_aligned_reads")
    } else {
        None
    }
}

fn read_tophat_stats(path: &Path) -> Result<HashMap<String, String>> {
    let text = read_text(path)?;
    Ok(text
        .lines()
        .filter_map(|l| l.split_once('\t'))
        .filter_map(|(value, label)| {
            tophat_stats_field(label).map(|field| (field.to_string(), value.trim().to_string()))
        })
        .collect())
}

/// The `__`-prefixed special-counter tail of an htseq file
/// (`__no_feature`, `__ambiguous`, ...), reported as metrics with the
/// prefix stripped.
fn read_htseq_summary(path: &Path) -> Result<HashMap<String, String>> {
    let text = read_text(path)?;
    Ok(text
        .lines()
        .filter_map(|l| l.split_once('\t'))
        .filter_map(|(field, value)| {
            field
                .strip_prefix("__")
                .map(|f| (f.to_string(), value.trim().to_string()))
        })
        .collect())
}

/// A one-record CSV: a header row and a single value row.
fn read_record_csv(path: &Path) -> Result<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("couldn't read output file {path:?}"))?;
    let header = reader.headers()?.clone();
    let record = reader
        .records()
        .next()
        .transpose()?
        .with_context(|| format!("no value row in {path:?}"))?;
    Ok(header
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.to_string(), v.to_string()))
        .collect())
}

/// FastQC's `label<TAB>value` summary lines, with labels lowercased into
/// field names. Section markers and comments are skipped.
fn read_fastqc_summary(path: &Path) -> Result<HashMap<String, String>> {
    let text = read_text(path)?;
    Ok(text
        .lines()
        .filter(|l| !l.starts_with('#') && !l.starts_with(">>"))
        .filter_map(|l| l.split_once('\t'))
        .map(|(label, value)| {
            (
                label.trim().to_lowercase().replace(' ', "_"),
                value.trim().to_string(),
            )
        })
        .collect())
}
