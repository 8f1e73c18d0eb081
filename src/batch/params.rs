//! Materialize concrete parameter values for every sample of a batch.
//!
//! Given sample directories and the parameter schema of a template
//! document, produce one complete `SampleRow` per directory: identity
//! tokens from the naming grammar, lane-matched FASTQ inputs, fixed
//! reference files per genome build, and destination paths for every
//! declared output. The tabular format is total over its declared
//! columns: a lane with no FASTQ gets a placeholder file, never a blank
//! cell.

use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ParamKind, ParameterDefinition, ParameterValue, SampleRow};
use crate::error::BatchError;
use crate::naming::{RawFastqFile, SampleIdentity};
use crate::outputs::OutputSpec;
use crate::references;
use crate::utils;

/// First path segment shared between the local mount and the transfer
/// endpoint's share root.
pub const ENDPOINT_ANCHOR: &str = "genomics";
/// Prefix the endpoint expects in place of the local mount point.
pub const ENDPOINT_PREFIX: &str = "/~/";

/// Fills in the tabular section of a batch for one run of samples.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BatchParameterizer {
    /// Logical transfer-target token handed to the runner's data-movement
    /// steps, e.g. `benaroya#gridftp`.
    pub endpoint: String,
    /// Genome build keying the reference-file table.
    pub build: String,
    /// Processed-project directory receiving all declared outputs.
    pub target_dir: PathBuf,
}

impl BatchParameterizer {
    /// Produce one row per sample directory, in the caller's order.
    /// Callers that want, say, largest-samples-first submit order sort
    /// `sample_dirs` before calling.
    pub fn parameterize(
        &self,
        sample_dirs: &[PathBuf],
        parameters: &[ParameterDefinition],
    ) -> Result<Vec<SampleRow>> {
        sample_dirs
            .iter()
            .map(|dir| self.sample_row(dir, parameters))
            .collect()
    }

    fn sample_row(&self, dir: &Path, parameters: &[ParameterDefinition]) -> Result<SampleRow> {
        let identity = SampleIdentity::from_sample_dir(dir).ok_or_else(|| {
            BatchError::format(format!("no library/flowcell identity in path {dir:?}"))
        })?;

        let values = parameters
            .iter()
            .map(|def| {
                let value = self
                    .value_for(def, dir, &identity)
                    .with_context(|| format!("parameter '{}' for {}", def.name, identity.sample_token))?;
                Ok(ParameterValue {
                    definition: def.clone(),
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SampleRow { values })
    }

    fn value_for(
        &self,
        def: &ParameterDefinition,
        dir: &Path,
        identity: &SampleIdentity,
    ) -> Result<String> {
        // Endpoint tokens are literal, never paths, whichever side of the
        // transfer they parameterize.
        if def.name.contains("endpoint") {
            return Ok(self.endpoint.clone());
        }

        match def.kind {
            ParamKind::Sample => Ok(identity.sample_token.clone()),
            ParamKind::Input => self.input_value(def, dir),
            ParamKind::Annotation => {
                let kind = references::kind_for_param(&def.name)?;
                let path = references::reference_path(&self.build, kind)?;
                Ok(self.endpoint_path(Path::new(path)))
            }
            ParamKind::Output => {
                let spec = OutputSpec::from_tag(&def.tag)?;
                let dest = spec.destination(&self.target_dir, &identity.sample_token);
                Ok(self.endpoint_path(&dest))
            }
        }
    }

    fn input_value(&self, def: &ParameterDefinition, dir: &Path) -> Result<String> {
        let Some(lane) = def.lane() else {
            // a lane-less input takes the sample directory itself
            return Ok(self.endpoint_path(dir));
        };

        let path = match find_lane_fastq(dir, lane)? {
            Some(path) => path,
            None => {
                let (path, created) = utils::write_empty_fastq(dir, lane)?;
                if created {
                    warn!("no FASTQ for lane {lane} in {dir:?}; created placeholder {path:?}");
                }
                path
            }
        };
        Ok(self.endpoint_path(&path))
    }

    fn endpoint_path(&self, path: &Path) -> String {
        utils::endpoint_path(path, ENDPOINT_ANCHOR, ENDPOINT_PREFIX)
    }
}

/// First FASTQ in `dir` (sorted by name) whose filename carries the
/// requested lane token.
fn find_lane_fastq(dir: &Path, lane: usize) -> Result<Option<PathBuf>> {
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("couldn't list {dir:?}"))? {
        let path = entry?.path();
        if let Some(parsed) = RawFastqFile::parse(&path) {
            if parsed.lane == lane {
                matches.push(path);
            }
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ParamKind;
    use pretty_assertions::assert_eq;

    fn cell(def: &str) -> ParameterDefinition {
        ParameterDefinition::from_header_cell(def, 0)
    }

    /// Lay out `<tmp>/genomics/Illumina/<run>/Unaligned/<project>/<lib>`
    /// with FASTQs for lanes 1 and 2 only.
    fn sample_dir(tmp: &Path) -> PathBuf {
        let dir = tmp
            .join("genomics/Illumina/150615_D00565_0087_AC6VG0ANXX")
            .join("Unaligned/P14-12-23221204/lib7294-8010");
        fs::create_dir_all(&dir).unwrap();
        for lane in [1, 2] {
            fs::write(
                dir.join(format!("lib7294-8010_S1_L00{lane}_R1_001.fastq.gz")),
                b"",
            )
            .unwrap();
        }
        dir
    }

    fn parameterizer(tmp: &Path) -> BatchParameterizer {
        BatchParameterizer {
            endpoint: "benaroya#gridftp".to_string(),
            build: "GRCh38".to_string(),
            target_dir: tmp
                .join("genomics/Illumina/150615_D00565_0087_AC6VG0ANXX")
                .join("Project_P14-12Processed_160412"),
        }
    }

    #[test]
    fn rows_are_complete_and_ordered() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = sample_dir(tmp.path());
        let p = parameterizer(tmp.path());

        let parameters = vec![
            cell("SampleName"),
            cell("fastq_in##Param::2942::globus_get_data_flowcell_text::from_endpoint"),
            cell("fastq_in##Param::2942::globus_get_data_flowcell_text::from_path1"),
            cell("annotation_gtf##SourceType::library::annotation_gtf"),
            cell("tophat_stats_metrics_txt_out##Param::2946::globus_send_data::to_path"),
        ];
        let rows = p.parameterize(&[dir], &parameters)?;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.values.len(), parameters.len());

        assert_eq!(row.sample_token(), Some("lib7294_C6VG0ANXX"));
        assert_eq!(row.value_of("from_endpoint"), Some("benaroya#gridftp"));
        assert_eq!(
            row.value_of("from_path1"),
            Some(
                "/~/genomics/Illumina/150615_D00565_0087_AC6VG0ANXX/Unaligned/P14-12-23221204/lib7294-8010/lib7294-8010_S1_L001_R1_001.fastq.gz"
            )
        );
        assert_eq!(
            row.value_of("annotation_gtf"),
            Some("/~/genomics/reference/GRCh38/Annotation/Homo_sapiens.GRCh38.77.gtf")
        );
        assert_eq!(
            row.value_of("to_path"),
            Some(
                "/~/genomics/Illumina/150615_D00565_0087_AC6VG0ANXX/Project_P14-12Processed_160412/metrics/lib7294_C6VG0ANXX_tophat_stats_metrics.txt"
            )
        );
        Ok(())
    }

    #[test]
    fn missing_lane_gets_placeholder_once() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = sample_dir(tmp.path());
        let p = parameterizer(tmp.path());

        let parameters = vec![
            cell("SampleName"),
            cell("fastq_in##Param::2942::globus_get_data_flowcell_text::from_path3"),
        ];

        let rows = p.parameterize(std::slice::from_ref(&dir), &parameters)?;
        assert_eq!(
            rows[0].value_of("from_path3").unwrap(),
            "/~/genomics/Illumina/150615_D00565_0087_AC6VG0ANXX/Unaligned/P14-12-23221204/lib7294-8010/empty_L003.fastq.gz"
        );
        assert!(dir.join("empty_L003.fastq.gz").exists());

        // a second run reuses the placeholder rather than recreating it
        p.parameterize(std::slice::from_ref(&dir), &parameters)?;
        let placeholders: Vec<_> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("empty_"))
            .collect();
        assert_eq!(placeholders.len(), 1);
        Ok(())
    }

    #[test]
    fn unknown_build_fails_the_batch() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = sample_dir(tmp.path());
        let mut p = parameterizer(tmp.path());
        p.build = "GRCz11".to_string();

        let parameters = vec![cell("annotation_gtf##SourceType::library::annotation_gtf")];
        let err = p
            .parameterize(&[dir], &parameters)
            .expect_err("unknown build must fail");
        assert!(matches!(
            err.downcast_ref::<BatchError>(),
            Some(BatchError::Lookup { .. })
        ));
        Ok(())
    }

    #[test]
    fn directory_order_is_preserved() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let run = tmp.path().join("genomics/Illumina/150615_D00565_0087_AC6VG0ANXX/Unaligned");
        let dirs: Vec<PathBuf> = ["lib9000-1", "lib100-2"]
            .iter()
            .map(|name| {
                let d = run.join("P14-12-23221204").join(name);
                fs::create_dir_all(&d).unwrap();
                d
            })
            .collect();
        let p = parameterizer(tmp.path());

        let rows = p.parameterize(&dirs, &[cell("SampleName")])?;
        let tokens: Vec<_> = rows.iter().filter_map(|r| r.sample_token()).collect();
        assert_eq!(tokens, vec!["lib9000_C6VG0ANXX", "lib100_C6VG0ANXX"]);
        Ok(())
    }

    #[test]
    fn lane_definitions_classify_as_input() {
        let def = cell("fastq_in##Param::2942::globus_get_data_flowcell_text::from_path8");
        assert_eq!(def.kind, ParamKind::Input);
        assert_eq!(def.lane(), Some(8));
    }
}
