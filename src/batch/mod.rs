// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! The workflow batch submission document model.
//!
//! A batch document is a tab-delimited text file understood by the
//! external workflow runner: a fixed metadata preamble, one header line
//! declaring the parameters, and one line per sample. Column order is the
//! only reliable source of meaning in the tabular section, so parameter
//! definitions carry their column position explicitly and sample values
//! are matched to definitions purely positionally.

pub mod codec;
pub mod params;

use serde_derive::{Deserialize, Serialize};

/// How a parameter's value is produced when a batch is filled in.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ParamKind {
    /// A path or endpoint token the runner reads from.
    Input,
    /// A destination path the runner writes to.
    Output,
    /// A fixed reference file, resolved per genome build.
    Annotation,
    /// The sample's own identity column.
    Sample,
}

/// One column of the tabular section. `position` is the zero-based column
/// index and is load-bearing: values are matched to definitions by
/// position alone, the header text is only a classification hint.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct ParameterDefinition {
    pub tag: String,
    pub kind: ParamKind,
    pub name: String,
    pub position: usize,
}

impl ParameterDefinition {
    /// Classify one header cell. Cells encode `tag##Qual::...::Name`;
    /// the kind is inferred from the tag alone: `annotation` anywhere in
    /// the tag, an `_in` suffix, or an `_out` suffix. Anything else is a
    /// sample column (the `SampleName` marker cell among them).
    pub fn from_header_cell(cell: &str, position: usize) -> ParameterDefinition {
        let (tag, qualifiers) = match cell.split_once("##") {
            Some((tag, rest)) => (tag, rest),
            None => (cell, ""),
        };
        let name = qualifiers.rsplit("::").next().filter(|s| !s.is_empty()).unwrap_or(tag);

        let kind = if tag.contains("annotation") {
            ParamKind::Annotation
        } else if tag.ends_with("_in") {
            ParamKind::Input
        } else if tag.ends_with("_out") {
            ParamKind::Output
        } else {
            ParamKind::Sample
        };

        ParameterDefinition {
            tag: tag.to_string(),
            kind,
            name: name.to_string(),
            position,
        }
    }

    /// The lane an input parameter is bound to, encoded as a trailing
    /// digit in the parameter name (`from_path4` is lane 4).
    pub fn lane(&self) -> Option<usize> {
        self.name
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .map(|d| d as usize)
    }
}

/// One parameter's concrete value for one sample.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct ParameterValue {
    pub definition: ParameterDefinition,
    pub value: String,
}

/// The ordered values of one sample, one per defined parameter.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct SampleRow {
    pub values: Vec<ParameterValue>,
}

impl SampleRow {
    /// Value of the first parameter with the given name, if any. Lookup
    /// by name is a convenience for callers; serialization always goes
    /// through `position` order.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.definition.name == name)
            .map(|v| v.value.as_str())
    }

    /// The sample-identity value (first `Sample`-kind column).
    pub fn sample_token(&self) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.definition.kind == ParamKind::Sample)
            .map(|v| v.value.as_str())
    }
}

/// A parsed batch submission document. The raw preamble lines (up to and
/// including the parameter header) and the detected line terminator are
/// retained so a write reproduces the template byte-for-byte, except for
/// the designated batch-name placeholder line.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct WorkflowBatchDocument {
    pub workflow_name: String,
    pub batch_name: String,
    pub parameters: Vec<ParameterDefinition>,
    pub samples: Vec<SampleRow>,
    pub preamble: Vec<String>,
    pub terminator: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_cell_kinds() {
        let cases = [
            ("SampleName", ParamKind::Sample, "SampleName"),
            (
                "fastq_in##Param::2942::globus_get_data_flowcell_text::from_path1",
                ParamKind::Input,
                "from_path1",
            ),
            (
                "annotation_gtf##SourceType::library::annotation_gtf",
                ParamKind::Annotation,
                "annotation_gtf",
            ),
            (
                "tophat_stats_metrics_txt_out##Param::2946::globus_send_data::to_path",
                ParamKind::Output,
                "to_path",
            ),
        ];
        for (cell, kind, name) in cases {
            let def = ParameterDefinition::from_header_cell(cell, 7);
            assert_eq!(def.kind, kind, "cell {cell}");
            assert_eq!(def.name, name);
            assert_eq!(def.position, 7);
        }
    }

    #[test]
    fn lane_from_name() {
        let def = ParameterDefinition::from_header_cell(
            "fastq_in##Param::2942::globus_get_data_flowcell_text::from_path4",
            1,
        );
        assert_eq!(def.lane(), Some(4));

        let def = ParameterDefinition::from_header_cell(
            "fastq_in##Param::2942::globus_get_data_flowcell_text::from_endpoint",
            1,
        );
        assert_eq!(def.lane(), None);
    }
}
