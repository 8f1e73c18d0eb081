// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Fixed reference-file table, keyed by genome build.
//!
//! Annotation parameters in a batch resolve through this table. An
//! unknown build or reference kind is a configuration gap and fails the
//! batch, never an individual sample.

use lazy_static::lazy_static;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::BatchError;

#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ReferenceKind {
    GenomeDir,
    Gtf,
    RefFlat,
    RibosomalIntervals,
    Adapters,
}

const ADAPTERS: &str = "/mnt/genomics/reference/adapters/smarter_adapter_seqs_3p_5p.fasta";

lazy_static! {
    static ref REFERENCE_MAP: HashMap<&'static str, HashMap<ReferenceKind, &'static str>> = {
        use ReferenceKind::*;
        let mut m = HashMap::new();
        m.insert("GRCh38", HashMap::from([
            (GenomeDir, "/mnt/genomics/reference/GRCh38/Sequence/STARIndex"),
            (Gtf, "/mnt/genomics/reference/GRCh38/Annotation/Homo_sapiens.GRCh38.77.gtf"),
            (RefFlat, "/mnt/genomics/reference/GRCh38/Annotation/Homo_sapiens.GRCh38.77.refflat.txt"),
            (RibosomalIntervals, "/mnt/genomics/reference/GRCh38/Annotation/Homo_sapiens.GRCh38.77.ribosomalIntervalsWheader_reorder.txt"),
            (Adapters, ADAPTERS),
        ]));
        m.insert("hg19", HashMap::from([
            (GenomeDir, "/mnt/genomics/reference/hg19/Sequence/STARIndex"),
            (Gtf, "/mnt/genomics/reference/hg19/Annotation/Homo_sapiens.hg19.gtf"),
            (RefFlat, "/mnt/genomics/reference/hg19/Annotation/Homo_sapiens.hg19.refflat.txt"),
            (RibosomalIntervals, "/mnt/genomics/reference/hg19/Annotation/Homo_sapiens.hg19.ribosomalIntervalsWheader_reorder.txt"),
            (Adapters, ADAPTERS),
        ]));
        m.insert("NCBIM37", HashMap::from([
            (GenomeDir, "/mnt/genomics/reference/NCBIM37/Sequence/STARIndex"),
            (Gtf, "/mnt/genomics/reference/NCBIM37/Annotation/Mus_musculus.NCBIM37.67.gtf"),
            (RefFlat, "/mnt/genomics/reference/NCBIM37/Annotation/Mus_musculus.NCBIM37.67.refflat.txt"),
            (RibosomalIntervals, "/mnt/genomics/reference/NCBIM37/Annotation/Mus_musculus.NCBIM37.67.ribosomalIntervalsWheader_reorder.txt"),
            (Adapters, ADAPTERS),
        ]));
        m.insert("mm10", HashMap::from([
            (GenomeDir, "/mnt/genomics/reference/mm10/Sequence/STARIndex"),
            (Gtf, "/mnt/genomics/reference/mm10/Annotation/Mus_musculus.GRCm38.82.gtf"),
            (RefFlat, "/mnt/genomics/reference/mm10/Annotation/Mus_musculus.GRCm38.82.refflat.txt"),
            (RibosomalIntervals, "/mnt/genomics/reference/mm10/Annotation/Mus_musculus.GRCm38.82.ribosomalIntervalsWheader_reorder.txt"),
            (Adapters, ADAPTERS),
        ]));
        m
    };
}

/// Resolve the fixed reference-file path for `build` and `kind`.
pub fn reference_path(build: &str, kind: ReferenceKind) -> Result<&'static str, BatchError> {
    let by_kind = REFERENCE_MAP
        .get(build)
        .ok_or_else(|| BatchError::lookup("genome build", build))?;
    by_kind
        .get(&kind)
        .copied()
        .ok_or_else(|| BatchError::lookup("reference", format!("{build}/{kind:?}")))
}

/// Which reference an annotation parameter is asking for, from its
/// parameter name.
pub fn kind_for_param(name: &str) -> Result<ReferenceKind, BatchError> {
    let lower = name.to_lowercase();
    if lower.contains("gtf") {
        Ok(ReferenceKind::Gtf)
    } else if lower.contains("refflat") {
        Ok(ReferenceKind::RefFlat)
    } else if lower.contains("ribosomal") {
        Ok(ReferenceKind::RibosomalIntervals)
    } else if lower.contains("adapter") {
        Ok(ReferenceKind::Adapters)
    } else if lower.contains("genome") {
        Ok(ReferenceKind::GenomeDir)
    } else {
        Err(BatchError::lookup("annotation parameter", name.to_string()))
    }
}
