//! Parse and write the tab-delimited batch submission format.
//!
//! The format is a contract with the external workflow runner and is not
//! self-describing beyond its layout: three anchor lines are located by
//! content match (the workflow-name metadata line, the project-name
//! placeholder line, the parameter header containing the `SampleName`
//! marker), and everything after the header is positional sample rows.
//! Writing re-emits the template preamble verbatim, substituting only the
//! project-name placeholder line.

use anyhow::Context;
use log::warn;
use std::fs;
use std::path::Path;

use super::{ParameterDefinition, ParameterValue, SampleRow, WorkflowBatchDocument};
use crate::error::BatchError;

const SAMPLE_NAME_MARKER: &str = "SampleName";
const WORKFLOW_NAME_MARKER: &str = "Workflow Name";
const PROJECT_NAME_MARKER: &str = "Project Name";

const DELIMITER: char = '\t';

fn first_field(line: &str) -> &str {
    line.split(DELIMITER).next().unwrap_or(line)
}

fn last_field(line: &str) -> &str {
    line.split(DELIMITER).last().unwrap_or(line)
}

/// Parse a batch submission document from text.
///
/// A missing `SampleName` or `Workflow Name` anchor is a fatal format
/// error. A sample row whose value count disagrees with the header is
/// fatal for that row only: it is reported and skipped, the remaining
/// rows proceed.
pub fn parse_document(text: &str) -> Result<WorkflowBatchDocument, BatchError> {
    let terminator = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();

    let header_idx = lines
        .iter()
        .position(|l| l.contains(SAMPLE_NAME_MARKER))
        .ok_or_else(|| {
            BatchError::format(format!("no parameter header ('{SAMPLE_NAME_MARKER}') line"))
        })?;

    let workflow_name = lines[..header_idx]
        .iter()
        .find(|l| first_field(l) == WORKFLOW_NAME_MARKER)
        .map(|l| last_field(l).to_string())
        .ok_or_else(|| {
            BatchError::format(format!("no '{WORKFLOW_NAME_MARKER}' metadata line"))
        })?;

    // The placeholder line is only needed for writing; a template without
    // one simply has no batch name to substitute.
    let batch_name = lines[..header_idx]
        .iter()
        .find(|l| first_field(l) == PROJECT_NAME_MARKER)
        .map(|l| last_field(l).to_string())
        .unwrap_or_default();

    let parameters: Vec<ParameterDefinition> = lines[header_idx]
        .split(DELIMITER)
        .enumerate()
        .map(|(position, cell)| ParameterDefinition::from_header_cell(cell, position))
        .collect();

    let mut samples = Vec::new();
    for (offset, line) in lines[header_idx + 1..].iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let values: Vec<&str> = line.split(DELIMITER).collect();
        if values.len() != parameters.len() {
            warn!(
                "sample row {}: expected {} values, found {}; row skipped",
                header_idx + 2 + offset,
                parameters.len(),
                values.len()
            );
            continue;
        }
        samples.push(SampleRow {
            values: parameters
                .iter()
                .zip(values)
                .map(|(definition, value)| ParameterValue {
                    definition: definition.clone(),
                    value: value.to_string(),
                })
                .collect(),
        });
    }

    Ok(WorkflowBatchDocument {
        workflow_name,
        batch_name,
        parameters,
        samples,
        preamble: lines[..=header_idx].iter().map(|l| l.to_string()).collect(),
        terminator: terminator.to_string(),
    })
}

/// Read and parse a batch submission file.
pub fn read_document(path: impl AsRef<Path>) -> anyhow::Result<WorkflowBatchDocument> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("couldn't read batch file {path:?}"))?;
    Ok(parse_document(&text)?)
}

/// Render a document back to the submission format. Preamble lines are
/// emitted verbatim except the project-name placeholder, which receives
/// the document's batch name; sample lines follow in parameter order.
pub fn to_text(doc: &WorkflowBatchDocument) -> String {
    let mut out = String::new();
    for line in &doc.preamble {
        if first_field(line) == PROJECT_NAME_MARKER {
            out.push_str(PROJECT_NAME_MARKER);
            out.push(DELIMITER);
            out.push_str(&doc.batch_name);
        } else {
            out.push_str(line);
        }
        out.push_str(&doc.terminator);
    }
    for row in &doc.samples {
        let line: Vec<&str> = row.values.iter().map(|v| v.value.as_str()).collect();
        out.push_str(&line.join("\t"));
        out.push_str(&doc.terminator);
    }
    out
}

/// Write a document to `path` in the submission format.
pub fn write_document(doc: &WorkflowBatchDocument, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, to_text(doc)).with_context(|| format!("couldn't write batch file {path:?}"))
}
