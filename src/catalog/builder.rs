// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, warn};

use super::{Catalog, SampleProgram};
use crate::asset::{decode_file, locate_sample, AssetError, DecodedAsset};
use crate::library;
use crate::sfz::{parse_instrument, resolve, RegionRecord, SfzError};

/// An error recorded while building a catalog. Each one cost a line, an
/// include, or a region; never the whole build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("definition error: {0}")]
    Definition(#[from] SfzError),

    #[error("sample error: {0}")]
    Sample(#[from] AssetError),
}

/// A shared pool of worker threads used to decode sample files in parallel.
pub struct DecodePool {
    pool: rayon::ThreadPool,
}

impl DecodePool {
    /// Creates a new pool with one worker per CPU.
    pub fn new() -> Result<DecodePool, String> {
        DecodePool::with_threads(num_cpus::get())
    }

    /// Creates a new pool with the given number of worker threads.
    pub fn with_threads(num_threads: usize) -> Result<DecodePool, String> {
        let threads = num_threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mstage-decode-{i}"))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(DecodePool { pool })
    }

    /// Runs a job on the pool, blocking until it finishes. Rayon parallel
    /// iterators used inside the job run on this pool's workers.
    fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

/// Everything a finished build produced: the catalog itself, every
/// recoverable error recorded along the way, and the number of regions
/// skipped for declaring no sample.
pub struct CatalogBuild {
    pub catalog: Catalog,
    pub errors: Vec<BuildError>,
    pub skipped_regions: usize,
}

/// Builds a program catalog from the instrument definition at the given
/// path. Regions whose sample cannot be located or decoded are dropped from
/// the catalog and recorded as errors; only an unreadable root file fails
/// the build outright.
pub fn build_catalog(path: &Path, pool: &DecodePool) -> Result<CatalogBuild, SfzError> {
    let tree = parse_instrument(path)?;
    let records = resolve(&tree);
    let mut errors: Vec<BuildError> = tree.warnings.into_iter().map(BuildError::from).collect();
    let default_path = tree.default_path;

    // Locate each region's sample on disk, dropping regions whose sample is
    // missing and skipping regions that never declared one.
    let mut skipped_regions = 0;
    let mut pending: Vec<(RegionRecord, PathBuf)> = Vec::new();
    for record in records {
        let Some(sample) = record.sample() else {
            skipped_regions += 1;
            continue;
        };
        match locate_sample(path, default_path.as_deref(), sample) {
            Ok(located) => pending.push((record, located)),
            Err(e) => {
                warn!(err = e.to_string(), "Skipping region");
                errors.push(e.into());
            }
        }
    }

    // Decode every located sample on the pool, one job per region,
    // collecting results back in region order.
    let decoded: Vec<Result<DecodedAsset, AssetError>> = pool.install(|| {
        pending
            .par_iter()
            .map(|(_, sample_path)| decode_file(sample_path))
            .collect()
    });

    let mut programs = Vec::with_capacity(pending.len());
    for ((record, sample_path), decoded) in pending.into_iter().zip(decoded) {
        match decoded {
            Ok(asset) => programs.push(Arc::new(SampleProgram::new(record, Arc::new(asset)))),
            Err(e) => {
                warn!(
                    err = e.to_string(),
                    path = ?sample_path,
                    "Skipping region"
                );
                errors.push(e.into());
            }
        }
    }

    debug!(
        path = ?path,
        programs = programs.len(),
        errors = errors.len(),
        "Catalog build complete"
    );

    Ok(CatalogBuild {
        catalog: Catalog::new(library::display_name(path), path.to_path_buf(), programs),
        errors,
        skipped_regions,
    })
}
