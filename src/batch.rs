//! Parallel batch analysis.
//!
//! Independent source units share no mutable state: each analysis run owns
//! its symbol table and group graph, so units fan out across rayon workers.
//! One failing unit never aborts the rest.

use crate::analyzers::SourceUnit;
use crate::config::EncapConfig;
use crate::engine::{self, AnalysisReport};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedUnit {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub analyzed: Vec<AnalysisReport>,
    pub failed: Vec<FailedUnit>,
}

impl BatchReport {
    pub fn total_matches(&self) -> usize {
        self.analyzed.iter().map(|r| r.matches.len()).sum()
    }
}

pub fn analyze_units(units: Vec<SourceUnit>, config: &EncapConfig) -> BatchReport {
    let results: Vec<_> = units
        .par_iter()
        .map(|unit| (unit.path.clone(), engine::analyze(unit, config)))
        .collect();

    let mut report = BatchReport {
        analyzed: Vec::new(),
        failed: Vec::new(),
    };
    for (path, result) in results {
        match result {
            Ok(analysis) => report.analyzed.push(analysis),
            Err(error) => {
                log::warn!("{}: {}", path.display(), error);
                report.failed.push(FailedUnit {
                    path,
                    error: error.to_string(),
                });
            }
        }
    }
    report
}
