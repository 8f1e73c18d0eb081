// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Coordinate groups of sequencing libraries through an external
//! workflow runner: build the tab-delimited batch submission documents
//! the runner consumes, and reassemble the per-sample result files it
//! produces into combined per-project tables.
//!
//! Batch creation flows `batch::params` -> `batch::codec` (write);
//! result collection flows the filesystem -> `outputs::classify` ->
//! `outputs::readers` -> `outputs::stitch`/`outputs::compile`. Both
//! directions share the identity tokens defined by `naming`.

pub mod batch;
pub mod error;
pub mod naming;
pub mod outputs;
pub mod references;
pub mod utils;

pub use crate::batch::{ParameterDefinition, SampleRow, WorkflowBatchDocument};
pub use crate::error::BatchError;
pub use crate::naming::SampleIdentity;
pub use crate::outputs::stitch::{CombinedTable, OutputStitcher};
