//! The naming grammar: identity tokens extracted from file and path names.
//!
//! Every join key used by the batch codec, the parameterizer and the
//! output aggregator is produced here. Call sites must go through these
//! functions rather than re-deriving tokens with their own patterns, so
//! that identity means the same thing everywhere.

use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

lazy_static! {
    static ref LIBRARY_ID_REGEX: Regex = Regex::new(r"lib\d+").unwrap();
    static ref PROJECT_LABEL_REGEX: Regex = Regex::new(r"P\d+(-\d+)?").unwrap();
    static ref DATE_TOKEN_REGEX: Regex = Regex::new(r"\d{6}").unwrap();
    static ref RUN_FOLDER_REGEX: Regex =
        Regex::new(r"^(\d{6})_([A-Za-z0-9]+)_(\d+)_([ABD])([A-Z0-9]+)$").unwrap();
    static ref RAW_FASTQ_REGEX: Regex =
        Regex::new(r"^([\w-]+)_S(\d+)_L(\d{3})_([RI][12])_(\d+)\.fastq(\.gz)?$").unwrap();
}

/// First `lib<digits>` token in `s`, if any.
pub fn library_id(s: &str) -> Option<&str> {
    LIBRARY_ID_REGEX.find(s).map(|m| m.as_str())
}

/// First `P<digits>` project label in `s`, with its optional
/// `-<subdigits>` suffix, if any.
pub fn project_label(s: &str) -> Option<&str> {
    PROJECT_LABEL_REGEX.find(s).map(|m| m.as_str())
}

/// First embedded six-digit date token in `s`, if any.
pub fn date_token(s: &str) -> Option<&str> {
    DATE_TOKEN_REGEX.find(s).map(|m| m.as_str())
}

/// A parsed Illumina run-folder name, e.g.
/// `150615_D00565_0087_AC6VG0ANXX`.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct RunFolder {
    pub date: String,
    pub instrument: String,
    pub run_number: usize,
    /// Single-letter flowcell position on the instrument (A, B or D).
    pub position: char,
    pub flowcell_id: String,
}

impl RunFolder {
    pub fn parse(name: &str) -> Option<RunFolder> {
        let cap = RUN_FOLDER_REGEX.captures(name)?;
        Some(RunFolder {
            date: cap.get(1).unwrap().as_str().to_string(),
            instrument: cap.get(2).unwrap().as_str().to_string(),
            run_number: cap.get(3).unwrap().as_str().parse().ok()?,
            position: cap.get(4).unwrap().as_str().chars().next().unwrap(),
            flowcell_id: cap.get(5).unwrap().as_str().to_string(),
        })
    }
}

/// Flowcell id of the first path component that parses as a run-folder
/// name, walking from the root down.
pub fn flowcell_from_path(path: &Path) -> Option<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .find_map(|seg| RunFolder::parse(seg))
        .map(|run| run.flowcell_id)
}

/// A parsed representation of a FASTQ file following the standard
/// Illumina `bcl2fastq` naming convention, e.g.
/// `lib7294-8010_S1_L003_R1_001.fastq.gz`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RawFastqFile {
    pub sample: String,
    pub sample_num: usize,
    pub lane: usize,
    pub read: String,
    pub chunk: usize,
    pub path: PathBuf,
}

impl RawFastqFile {
    /// Attempt to parse `path` as a bcl2fastq-produced FASTQ file.
    pub fn parse(path: impl AsRef<Path>) -> Option<RawFastqFile> {
        let filename = path.as_ref().file_name()?.to_str()?;
        let cap = RAW_FASTQ_REGEX.captures(filename)?;

        Some(RawFastqFile {
            sample: cap.get(1).unwrap().as_str().to_string(),
            sample_num: cap.get(2).unwrap().as_str().parse().unwrap(),
            lane: cap.get(3).unwrap().as_str().parse().unwrap(),
            read: cap.get(4).unwrap().as_str().to_string(),
            chunk: cap.get(5).unwrap().as_str().parse().unwrap(),
            path: path.as_ref().into(),
        })
    }
}

/// Canonical identity of one sequenced library on one flowcell. The
/// `sample_token` is the row key used throughout aggregation and must be
/// unique within a batch.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct SampleIdentity {
    pub library_id: String,
    pub flowcell_id: String,
    pub sample_token: String,
}

impl SampleIdentity {
    pub fn new(library_id: &str, flowcell_id: &str) -> SampleIdentity {
        SampleIdentity {
            library_id: library_id.to_string(),
            flowcell_id: flowcell_id.to_string(),
            sample_token: format!("{library_id}_{flowcell_id}"),
        }
    }

    /// Derive the identity of the library held in `sample_dir`: the
    /// library id comes from the directory's own name, the flowcell id
    /// from the enclosing run-folder path segment.
    pub fn from_sample_dir(sample_dir: &Path) -> Option<SampleIdentity> {
        let dir_name = sample_dir.file_name()?.to_str()?;
        let lib = library_id(dir_name)?;
        let flowcell = flowcell_from_path(sample_dir)?;
        Some(SampleIdentity::new(lib, &flowcell))
    }
}
