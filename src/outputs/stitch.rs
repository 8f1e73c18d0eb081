//! Merge per-sample output files into one combined table per type.
//!
//! The stitcher owns one output-type directory of one processed project.
//! It collects the per-sample files for its type, reads each with the
//! source-appropriate reader, and builds a single table keyed by sample
//! token. Counts tables are joined on feature id; everything else is a
//! field matrix with one row per sample.

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use super::{classify, readers, OutputFileRecord, OutputSource, OutputType};
use crate::naming;

/// Identity column name for field tables.
const LIB_ID_COLUMN: &str = "libId";
/// Identity column name for counts tables.
const GENE_NAME_COLUMN: &str = "geneName";
/// Derived ratio appended to metrics tables when its inputs are present.
const MAPPED_READS_COLUMN: &str = "mapped_reads_w_dups";

/// One combined per-project, per-type table. Built, written, discarded;
/// never mutated incrementally.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct CombinedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CombinedTable {
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("couldn't create combined table {path:?}"))?;
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a combined table back as literal rows; cells are not
    /// re-parsed into typed fields.
    pub fn read_csv(path: &Path) -> Result<CombinedTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("couldn't read combined table {path:?}"))?;
        let mut records = reader.records();
        let header = match records.next().transpose()? {
            Some(rec) => rec.iter().map(|c| c.to_string()).collect(),
            None => Vec::new(),
        };
        let rows = records
            .map(|rec| Ok(rec?.iter().map(|c| c.to_string()).collect()))
            .collect::<Result<Vec<Vec<String>>>>()?;
        Ok(CombinedTable { header, rows })
    }
}

/// Stitches one output type within one processed-project type directory.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OutputStitcher {
    pub path: PathBuf,
    pub output_type: OutputType,
}

impl OutputStitcher {
    pub fn new(path: impl Into<PathBuf>, output_type: OutputType) -> OutputStitcher {
        OutputStitcher {
            path: path.into(),
            output_type,
        }
    }

    /// Classify the directory's files for this output type. Files whose
    /// extension is not admitted for the type, files of other types, and
    /// prior combined outputs are excluded; unclassifiable files are
    /// skipped silently so unrelated files can share the directory.
    pub fn collect_files(&self) -> Result<Vec<OutputFileRecord>> {
        let mut res = Vec::new();
        let entries = fs::read_dir(&self.path)
            .with_context(|| format!("couldn't list output directory {:?}", self.path))?;
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // never re-ingest a prior run's combined output
            if name.contains("combined") {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !self.output_type.extensions().contains(&ext) {
                continue;
            }
            match classify(&path) {
                Some(record) if record.output_type == self.output_type => res.push(record),
                _ => {}
            }
        }
        res.sort();
        Ok(res)
    }

    /// Build the combined table for this directory.
    pub fn stitch(&self) -> Result<CombinedTable> {
        let records = self.collect_files()?;
        match self.output_type {
            OutputType::Counts => stitch_counts(&records),
            _ => stitch_fields(&records),
        }
    }

    /// Name of the combined file: project label, flowcell id and date
    /// token recovered from the directory's own path, deepest segment
    /// first. The date prefers the processed-project folder's token,
    /// then the run folder's own date. When the label or flowcell cannot
    /// be parsed, the immediate parent directory name is used verbatim
    /// as the base.
    pub fn combined_filename(&self) -> String {
        let segments: Vec<&str> = self
            .path
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        let label = segments.iter().rev().find_map(|s| naming::project_label(s));
        let run = segments.iter().find_map(|s| naming::RunFolder::parse(s));
        let date = segments
            .iter()
            .rev()
            .filter(|s| s.contains("Processed"))
            .find_map(|s| naming::date_token(s))
            .map(str::to_string)
            .or_else(|| run.as_ref().map(|r| r.date.clone()));

        let base = match (label, &run) {
            (Some(label), Some(run)) => {
                let mut parts = vec![label.to_string(), run.flowcell_id.clone()];
                if let Some(date) = date {
                    parts.push(date);
                }
                parts.join("_")
            }
            _ => self
                .path
                .parent()
                .and_then(|p| p.file_name())
                .or_else(|| self.path.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        format!("{}_combined_{}.csv", base, self.output_type.token())
    }

    /// Stitch and write the combined table into the type directory.
    /// Re-running overwrites deterministically; the `combined` exclusion
    /// keeps the output itself out of a later collection pass.
    pub fn write_combined(&self) -> Result<PathBuf> {
        let table = self.stitch()?;
        let out = self.path.join(self.combined_filename());
        table.write_csv(&out)?;
        Ok(out)
    }
}

/// Merge each sample's per-source field maps into one map per sample,
/// in deterministic sorted-token order.
fn merge_by_sample(
    records: &[OutputFileRecord],
) -> Result<BTreeMap<String, HashMap<String, String>>> {
    let mut per_sample: BTreeMap<String, BTreeMap<OutputSource, HashMap<String, String>>> =
        BTreeMap::new();
    for record in records {
        let fields = readers::read_fields(record)?;
        let by_source = per_sample.entry(record.sample_token.clone()).or_default();
        if by_source.insert(record.output_source, fields).is_some() {
            warn!(
                "duplicate {:?} file for sample {}; keeping the later one",
                record.output_source, record.sample_token
            );
        }
    }
    Ok(per_sample
        .into_iter()
        .map(|(token, by_source)| {
            let mut merged = HashMap::new();
            for (_, fields) in by_source {
                merged.extend(fields);
            }
            (token, merged)
        })
        .collect())
}

/// Field-matrix stitching for metrics/qc/validation. The header is the
/// sorted union of the fields reported by the first sample processed and
/// is then held fixed; later samples fill in those fields, with missing
/// values left empty. Sorted-token processing order makes "first" a
/// deterministic choice.
fn stitch_fields(records: &[OutputFileRecord]) -> Result<CombinedTable> {
    let merged = merge_by_sample(records)?;

    let Some(first) = merged.values().next() else {
        return Ok(CombinedTable {
            header: vec![LIB_ID_COLUMN.to_string()],
            rows: Vec::new(),
        });
    };
    let fields: Vec<String> = first.keys().cloned().sorted().collect();
    let derive = mapped_reads_w_dups(first).is_some();

    let mut header = vec![LIB_ID_COLUMN.to_string()];
    header.extend(fields.iter().cloned());
    if derive {
        header.push(MAPPED_READS_COLUMN.to_string());
    }

    let mut rows = Vec::new();
    for (token, sample_fields) in &merged {
        let mut row = vec![token.clone()];
        for field in &fields {
            match sample_fields.get(field) {
                Some(value) => row.push(value.clone()),
                None => {
                    debug!("sample {token} reports no '{field}' value");
                    row.push(String::new());
                }
            }
        }
        if derive {
            match mapped_reads_w_dups(sample_fields) {
                Some(value) => row.push(value),
                None => {
                    warn!("sample {token} is missing {MAPPED_READS_COLUMN} inputs");
                    row.push(String::new());
                }
            }
        }
        rows.push(row);
    }
    Ok(CombinedTable { header, rows })
}

/// Ratio of duplicate-marking examined reads to total input reads. The
/// numerator depends on whether the metrics reflect unpaired or paired
/// alignment, as reported by the `category` field.
fn mapped_reads_w_dups(fields: &HashMap<String, String>) -> Option<String> {
    let total: f64 = fields.get("fastq_total_reads")?.parse().ok()?;
    let unpaired: f64 = fields.get("unpaired_reads_examined")?.parse().ok()?;
    let mapped = if fields.get("category")? == "unpaired" {
        unpaired
    } else {
        let pairs: f64 = fields.get("read_pairs_examined")?.parse().ok()?;
        unpaired + pairs
    };
    if total == 0.0 {
        return None;
    }
    Some(format!("{}", mapped / total))
}

/// Counts stitching: a progressive inner join on feature id across all
/// samples, keeping the first sample's feature order. A feature absent
/// from any one sample is dropped from the combined table; only complete
/// observations are reported.
fn stitch_counts(records: &[OutputFileRecord]) -> Result<CombinedTable> {
    let mut per_sample: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for record in records {
        let counts = readers::read_counts(record)?;
        if per_sample.insert(record.sample_token.clone(), counts).is_some() {
            warn!(
                "duplicate counts file for sample {}; keeping the later one",
                record.sample_token
            );
        }
    }

    let mut tokens = Vec::new();
    let mut table: Vec<(String, Vec<String>)> = Vec::new();
    for (i, (token, counts)) in per_sample.iter().enumerate() {
        tokens.push(token.clone());
        if i == 0 {
            table = counts
                .iter()
                .map(|(feature, count)| (feature.clone(), vec![count.clone()]))
                .collect();
        } else {
            let lookup: HashMap<&str, &str> = counts
                .iter()
                .map(|(feature, count)| (feature.as_str(), count.as_str()))
                .collect();
            table.retain_mut(|(feature, row)| match lookup.get(feature.as_str()) {
                Some(count) => {
                    row.push(count.to_string());
                    true
                }
                None => false,
            });
        }
    }

    let mut header = vec![GENE_NAME_COLUMN.to_string()];
    header.extend(tokens);
    let rows = table
        .into_iter()
        .map(|(feature, counts)| {
            let mut row = vec![feature];
            row.extend(counts);
            row
        })
        .collect();
    Ok(CombinedTable { header, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metrics_dir(tmp: &Path) -> PathBuf {
        let dir = tmp
            .join("genomics/Illumina/160412_D00565_0081_AC6VG0ANXX")
            .join("Project_P14-12Processed_160412/metrics");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_markdups(dir: &Path, token: &str, category: &str, unpaired: &str, pairs: &str) {
        let html = format!(
            "<table><tr><td>CATEGORY</td><td>UNPAIRED_READS_EXAMINED</td><td>READ_PAIRS_EXAMINED</td></tr>\
             <tr><td>{category}</td><td>{unpaired}</td><td>{pairs}</td></tr></table>"
        );
        fs::write(dir.join(format!("{token}_picard_markdups_metrics.html")), html).unwrap();
    }

    fn write_tophat(dir: &Path, token: &str, total: &str) {
        fs::write(
            dir.join(format!("{token}_tophat_stats_metrics.txt")),
            format!("{total}\ttotal reads in fastq file\n"),
        )
        .unwrap();
    }

    #[test]
    fn combined_filename_reference_case() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = metrics_dir(tmp.path());
        let stitcher = OutputStitcher::new(dir, OutputType::Metrics);
        assert_eq!(
            stitcher.combined_filename(),
            "P14-12_C6VG0ANXX_160412_combined_metrics.csv"
        );
    }

    #[test]
    fn combined_filename_date_from_run_folder() {
        // a project directory that carries no Processed_<date> token
        // takes the date from the run folder itself
        let stitcher = OutputStitcher::new(
            "/mnt/genomics/Illumina/160412_D00565_0081_AC6VG0ANXX/Processed/P14-12-23221204/metrics",
            OutputType::Metrics,
        );
        assert_eq!(
            stitcher.combined_filename(),
            "P14-12_C6VG0ANXX_160412_combined_metrics.csv"
        );
    }

    #[test]
    fn combined_filename_falls_back_to_parent_dir() {
        let stitcher = OutputStitcher::new("/data/someproject/metrics", OutputType::Metrics);
        assert_eq!(
            stitcher.combined_filename(),
            "someproject_combined_metrics.csv"
        );
    }

    #[test]
    fn metrics_sources_merge_and_derive() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = metrics_dir(tmp.path());
        // lib1: unpaired category -> unpaired/total; lib2: paired ->
        // (unpaired + pairs)/total. Both come out at 0.5.
        write_markdups(&dir, "lib1_C6VG0ANXX", "unpaired", "50", "0");
        write_tophat(&dir, "lib1_C6VG0ANXX", "100");
        write_markdups(&dir, "lib2_C6VG0ANXX", "paired", "30", "20");
        write_tophat(&dir, "lib2_C6VG0ANXX", "100");

        let table = OutputStitcher::new(&dir, OutputType::Metrics).stitch()?;
        assert_eq!(
            table.header,
            vec![
                "libId",
                "category",
                "fastq_total_reads",
                "read_pairs_examined",
                "unpaired_reads_examined",
                "mapped_reads_w_dups"
            ]
        );
        assert_eq!(
            table.rows,
            vec![
                vec!["lib1_C6VG0ANXX", "unpaired", "100", "0", "50", "0.5"],
                vec!["lib2_C6VG0ANXX", "paired", "100", "20", "30", "0.5"],
            ]
        );
        Ok(())
    }

    /// The header is fixed by the first sample processed; fields that
    /// only later samples report are not retroactively widened in.
    #[test]
    fn header_fixed_by_first_sample() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = metrics_dir(tmp.path());
        fs::write(
            dir.join("lib1_C6VG0ANXX_htseq_metrics.txt"),
            "__ambiguous\t5\n__no_feature\t100\n",
        )?;
        fs::write(
            dir.join("lib2_C6VG0ANXX_htseq_metrics.txt"),
            "__alignment_not_unique\t9\n__ambiguous\t7\n__no_feature\t200\n",
        )?;

        let table = OutputStitcher::new(&dir, OutputType::Metrics).stitch()?;
        assert_eq!(table.header, vec!["libId", "ambiguous", "no_feature"]);
        assert!(!table.header.iter().any(|h| h == "alignment_not_unique"));
        assert_eq!(
            table.rows,
            vec![
                vec!["lib1_C6VG0ANXX", "5", "100"],
                vec!["lib2_C6VG0ANXX", "7", "200"],
            ]
        );
        Ok(())
    }

    /// A sample missing a first-sample field gets an empty cell.
    #[test]
    fn missing_field_degrades_to_empty() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = metrics_dir(tmp.path());
        fs::write(
            dir.join("lib1_C6VG0ANXX_htseq_metrics.txt"),
            "__ambiguous\t5\n__no_feature\t100\n",
        )?;
        fs::write(dir.join("lib2_C6VG0ANXX_htseq_metrics.txt"), "__ambiguous\t7\n")?;

        let table = OutputStitcher::new(&dir, OutputType::Metrics).stitch()?;
        assert_eq!(
            table.rows,
            vec![
                vec!["lib1_C6VG0ANXX", "5", "100"],
                vec!["lib2_C6VG0ANXX", "7", ""],
            ]
        );
        Ok(())
    }

    /// Counts are an intersection: a feature absent from any one sample
    /// is absent from the combined table.
    #[test]
    fn counts_join_is_an_intersection() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("counts");
        fs::create_dir_all(&dir)?;
        fs::write(
            dir.join("libA_FC1_htseq_counts.txt"),
            "g1\t0\ng2\t1\n__no_feature\t3\n",
        )?;
        fs::write(
            dir.join("libB_FC1_htseq_counts.txt"),
            "g1\t1\ng2\t0\ng3\t42\n",
        )?;

        let table = OutputStitcher::new(&dir, OutputType::Counts).stitch()?;
        assert_eq!(table.header, vec!["geneName", "libA_FC1", "libB_FC1"]);
        assert_eq!(
            table.rows,
            vec![vec!["g1", "0", "1"], vec!["g2", "1", "0"]]
        );
        Ok(())
    }

    #[test]
    fn rerun_does_not_reingest_combined_output() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = metrics_dir(tmp.path());
        write_markdups(&dir, "lib1_C6VG0ANXX", "unpaired", "50", "0");
        write_tophat(&dir, "lib1_C6VG0ANXX", "100");

        let stitcher = OutputStitcher::new(&dir, OutputType::Metrics);
        let first = stitcher.write_combined()?;
        let first_table = CombinedTable::read_csv(&first)?;

        // second run sees its own prior output in the directory but must
        // produce the identical table
        let second = stitcher.write_combined()?;
        assert_eq!(first, second);
        assert_eq!(CombinedTable::read_csv(&second)?, first_table);
        Ok(())
    }

    #[test]
    fn empty_directory_yields_empty_table() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("qc");
        fs::create_dir_all(&dir)?;
        let table = OutputStitcher::new(&dir, OutputType::Qc).stitch()?;
        assert_eq!(table.header, vec!["libId"]);
        assert!(table.rows.is_empty());
        Ok(())
    }

    #[test]
    fn wrong_extension_and_foreign_files_are_excluded() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = metrics_dir(tmp.path());
        write_tophat(&dir, "lib1_C6VG0ANXX", "100");
        // right name shape, wrong extension for metrics
        fs::write(dir.join("lib2_C6VG0ANXX_sexcheck_metrics.csv"), "a,b\n1,2\n")?;
        // unclassifiable bystander
        fs::write(dir.join("notes.txt"), "hello\n")?;

        let records = OutputStitcher::new(&dir, OutputType::Metrics).collect_files()?;
        let tokens: Vec<_> = records.iter().map(|r| r.sample_token.as_str()).collect();
        assert_eq!(tokens, vec!["lib1_C6VG0ANXX"]);
        Ok(())
    }
}
