//! Classification of workflow result files.
//!
//! Result filenames follow the convention
//! `<sample_token>_<source>_<type>.<ext>`, e.g.
//! `lib7294_C6VG0ANXX_picard_markdups_metrics.html`. The classifier
//! recovers the three parts; files that do not match any known source are
//! skipped so unrelated files can coexist in an output directory.

pub mod compile;
pub mod readers;
pub mod stitch;

use log::debug;
use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::BatchError;

/// Coarse result category; the trailing token of a result filename.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum OutputType {
    Metrics,
    Counts,
    Qc,
    Validation,
}

impl OutputType {
    pub fn token(self) -> &'static str {
        match self {
            OutputType::Metrics => "metrics",
            OutputType::Counts => "counts",
            OutputType::Qc => "qc",
            OutputType::Validation => "validation",
        }
    }

    pub fn from_token(token: &str) -> Option<OutputType> {
        match token {
            "metrics" => Some(OutputType::Metrics),
            "counts" => Some(OutputType::Counts),
            "qc" => Some(OutputType::Qc),
            "validation" => Some(OutputType::Validation),
            _ => None,
        }
    }

    /// Subfolder of a processed-project directory holding this type.
    pub fn subfolder(self) -> &'static str {
        match self {
            OutputType::Metrics => "metrics",
            OutputType::Counts => "counts",
            OutputType::Qc => "QC",
            OutputType::Validation => "validation",
        }
    }

    /// File extensions admitted for this type during stitching.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            OutputType::Metrics => &["txt", "html"],
            OutputType::Counts => &["txt"],
            OutputType::Qc => &["csv", "txt"],
            OutputType::Validation => &["csv"],
        }
    }
}

/// The tool or stage that produced one output file within a type. Closed
/// set; filename tokens outside it are skipped, not errors.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum OutputSource {
    PicardAlign,
    PicardMarkdups,
    PicardRnaseq,
    TophatStats,
    Htseq,
    Fastqc,
    Sexcheck,
}

/// Known sources ordered most-specific (longest token) first, so that a
/// multi-token source is matched before any shorter source that happens
/// to share its tail.
const SOURCES_BY_SPECIFICITY: &[OutputSource] = &[
    OutputSource::PicardMarkdups,
    OutputSource::PicardRnaseq,
    OutputSource::PicardAlign,
    OutputSource::TophatStats,
    OutputSource::Sexcheck,
    OutputSource::Fastqc,
    OutputSource::Htseq,
];

impl OutputSource {
    pub fn token(self) -> &'static str {
        match self {
            OutputSource::PicardAlign => "picard_align",
            OutputSource::PicardMarkdups => "picard_markdups",
            OutputSource::PicardRnaseq => "picard_rnaseq",
            OutputSource::TophatStats => "tophat_stats",
            OutputSource::Htseq => "htseq",
            OutputSource::Fastqc => "fastqc",
            OutputSource::Sexcheck => "sexcheck",
        }
    }

    /// Match the longest known source token ending at the end of `stem`,
    /// returning the source and the stem prefix before it.
    fn match_suffix(stem: &str) -> Option<(OutputSource, &str)> {
        for &source in SOURCES_BY_SPECIFICITY {
            let token = source.token();
            if let Some(prefix) = stem.strip_suffix(token) {
                if let Some(prefix) = prefix.strip_suffix('_') {
                    return Some((source, prefix));
                }
            }
        }
        None
    }

    /// Extra subfolder for sources that bundle several related outputs
    /// under one directory.
    pub fn subfolder(self) -> Option<&'static str> {
        match self {
            OutputSource::Fastqc => Some("fastqc"),
            _ => None,
        }
    }
}

/// One classified result file.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct OutputFileRecord {
    pub sample_token: String,
    pub output_type: OutputType,
    pub output_source: OutputSource,
    pub path: PathBuf,
}

/// Attempt to classify `path` as a per-sample result file. `None` means
/// the file does not follow the result naming convention and should be
/// left out of aggregation.
pub fn classify(path: impl AsRef<Path>) -> Option<OutputFileRecord> {
    let path = path.as_ref();
    let stem = path.file_stem()?.to_str()?;

    let (prefix, type_token) = stem.rsplit_once('_')?;
    let output_type = OutputType::from_token(type_token)?;

    let Some((output_source, sample_token)) = OutputSource::match_suffix(prefix) else {
        debug!("skipping unclassifiable output file {path:?}");
        return None;
    };
    if sample_token.is_empty() {
        return None;
    }

    Some(OutputFileRecord {
        sample_token: sample_token.to_string(),
        output_type,
        output_source,
        path: path.into(),
    })
}

/// The output-destination recipe encoded by an output parameter tag:
/// `<source>_<type>_<ext>_out`.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct OutputSpec {
    pub source: OutputSource,
    pub output_type: OutputType,
    pub extension: String,
}

impl OutputSpec {
    /// Parse an output parameter tag such as
    /// `picard_markdups_metrics_html_out`. Unknown source or type tokens
    /// are configuration errors.
    pub fn from_tag(tag: &str) -> Result<OutputSpec, BatchError> {
        let body = tag
            .strip_suffix("_out")
            .ok_or_else(|| BatchError::lookup("output parameter", tag))?;
        let (rest, extension) = body
            .rsplit_once('_')
            .ok_or_else(|| BatchError::lookup("output parameter", tag))?;
        let (prefix, type_token) = rest
            .rsplit_once('_')
            .ok_or_else(|| BatchError::lookup("output parameter", tag))?;
        let output_type = OutputType::from_token(type_token)
            .ok_or_else(|| BatchError::lookup("output type", type_token))?;

        let source = SOURCES_BY_SPECIFICITY
            .iter()
            .copied()
            .find(|s| s.token() == prefix)
            .ok_or_else(|| BatchError::lookup("output source", prefix))?;

        Ok(OutputSpec {
            source,
            output_type,
            extension: extension.to_string(),
        })
    }

    /// Canonical per-sample filename for this output.
    pub fn filename(&self, sample_token: &str) -> String {
        format!(
            "{}_{}_{}.{}",
            sample_token,
            self.source.token(),
            self.output_type.token(),
            self.extension
        )
    }

    /// Destination path below the processed-project directory.
    pub fn destination(&self, target_dir: &Path, sample_token: &str) -> PathBuf {
        let mut dir = target_dir.join(self.output_type.subfolder());
        if let Some(sub) = self.source.subfolder() {
            dir = dir.join(sub);
        }
        dir.join(self.filename(sample_token))
    }
}
