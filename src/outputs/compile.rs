//! Compile per-type combined tables into one project summary table.
//!
//! Each input file is read back as literal rows and the files are
//! horizontally concatenated: the sample-identity column is kept only
//! from the first file, every other file contributes its remaining
//! columns. Every file must carry the same row population in the same
//! sorted order; a mismatch fails loudly rather than producing a
//! misaligned table.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::stitch::CombinedTable;
use crate::error::BatchError;

/// Horizontally merge already-combined table files, in the given order.
pub fn compile_tables(files: &[PathBuf]) -> Result<CombinedTable> {
    let mut header: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for (i, file) in files.iter().enumerate() {
        let mut table = CombinedTable::read_csv(file)?;
        // deterministic ordering; the identity column leads each row, so
        // a whole-row sort orders by sample token
        table.rows.sort();

        if i == 0 {
            header = table.header;
            rows = table.rows;
            continue;
        }

        if table.rows.len() != rows.len() {
            return Err(BatchError::format(format!(
                "{file:?} has {} rows where the first table has {}",
                table.rows.len(),
                rows.len()
            ))
            .into());
        }
        for (row, other) in rows.iter_mut().zip(table.rows) {
            let id = row.first().cloned().unwrap_or_default();
            let other_id = other.first().cloned().unwrap_or_default();
            if id != other_id {
                return Err(BatchError::format(format!(
                    "{file:?} row identity '{other_id}' does not match '{id}'"
                ))
                .into());
            }
            row.extend(other.into_iter().skip(1));
        }
        header.extend(table.header.into_iter().skip(1));
    }

    Ok(CombinedTable { header, rows })
}

/// Compile and write the project summary table to `out`.
pub fn write_summary(files: &[PathBuf], out: &Path) -> Result<()> {
    compile_tables(files)?.write_csv(out)
}
