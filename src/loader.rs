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

//! The instrument load path.
//!
//! Each load request runs on its own named background thread: parsing,
//! sample decoding and catalog construction all happen off the render
//! path. Requests take monotonically increasing tickets; a finished load
//! publishes its catalog only if no newer request has been made since, so
//! the render path only ever adopts the most recent instrument.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{error, info, span, warn, Level};

use crate::catalog::{build_catalog, BuildError, Catalog, CatalogSummary, DecodePool};

/// The error produced when an instrument load yields nothing playable.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("instrument load failed for {path}: {message}")]
    InstrumentLoadFailed { path: PathBuf, message: String },
}

/// What a finished load produced. Recoverable per-line and per-region
/// errors are listed rather than failing the load.
#[derive(Debug)]
pub struct LoadResult {
    pub name: String,
    pub path: PathBuf,
    pub programs: usize,
    pub skipped_regions: usize,
    pub errors: Vec<BuildError>,
    /// True when a newer load was requested before this one finished; the
    /// catalog was built but not published.
    pub superseded: bool,
}

/// Hands instrument load requests to background threads and publishes
/// finished catalogs toward the render path.
///
/// Cloning a loader yields another handle to the same pipeline, so control
/// threads can request loads and read summaries while the engine renders.
#[derive(Clone)]
pub struct Loader {
    epoch: Arc<AtomicU64>,
    pool: Arc<DecodePool>,
    catalog_tx: Sender<(u64, Arc<Catalog>)>,
    summary: Arc<Mutex<Option<CatalogSummary>>>,
}

impl Loader {
    pub(crate) fn new(catalog_tx: Sender<(u64, Arc<Catalog>)>) -> Result<Loader, String> {
        Ok(Loader {
            epoch: Arc::new(AtomicU64::new(0)),
            pool: Arc::new(DecodePool::new()?),
            catalog_tx,
            summary: Arc::new(Mutex::new(None)),
        })
    }

    /// The summary of the most recently published catalog, if any.
    pub fn catalog_summary(&self) -> Option<CatalogSummary> {
        self.summary.lock().clone()
    }

    /// Requests a load of the instrument definition at the given path. The
    /// load runs on a background thread; the returned receiver yields the
    /// outcome once it finishes.
    pub fn request_load(&self, path: &Path) -> Receiver<Result<LoadResult, LoadError>> {
        let (result_tx, result_rx) = bounded(1);
        let ticket = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let path = path.to_path_buf();
        let thread_path = path.clone();
        let epoch = self.epoch.clone();
        let pool = self.pool.clone();
        let catalog_tx = self.catalog_tx.clone();
        let summary = self.summary.clone();
        let thread_tx = result_tx.clone();

        let spawned = thread::Builder::new()
            .name(format!("mstage-load-{ticket}"))
            .spawn(move || {
                let result = run_load(&thread_path, ticket, &epoch, &pool, &catalog_tx, &summary);
                let _ = thread_tx.send(result);
            });
        if let Err(e) = spawned {
            error!(err = e.to_string(), "Unable to spawn instrument load thread");
            let _ = result_tx.send(Err(LoadError::InstrumentLoadFailed {
                path,
                message: e.to_string(),
            }));
        }

        result_rx
    }
}

fn run_load(
    path: &Path,
    ticket: u64,
    epoch: &AtomicU64,
    pool: &DecodePool,
    catalog_tx: &Sender<(u64, Arc<Catalog>)>,
    summary: &Mutex<Option<CatalogSummary>>,
) -> Result<LoadResult, LoadError> {
    let span = span!(Level::INFO, "load instrument");
    let _enter = span.enter();

    info!(path = ?path, "Loading instrument");
    let build = build_catalog(path, pool).map_err(|e| LoadError::InstrumentLoadFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if build.catalog.programs().is_empty() {
        return Err(LoadError::InstrumentLoadFailed {
            path: path.to_path_buf(),
            message: format!("no playable programs ({} regions failed)", build.errors.len()),
        });
    }

    let catalog = Arc::new(build.catalog);
    let superseded = epoch.load(Ordering::SeqCst) != ticket;
    if superseded {
        info!(path = ?path, "Discarding superseded instrument load");
    } else {
        *summary.lock() = Some(catalog.summary());
        if let Err(e) = catalog_tx.try_send((ticket, catalog.clone())) {
            warn!(
                err = e.to_string(),
                "Unable to publish catalog to the render path"
            );
        } else {
            info!(
                name = catalog.name(),
                programs = catalog.programs().len(),
                "Published instrument catalog"
            );
        }
    }

    Ok(LoadResult {
        name: catalog.name().to_string(),
        path: path.to_path_buf(),
        programs: catalog.programs().len(),
        skipped_regions: build.skipped_regions,
        errors: build.errors,
        superseded,
    })
}
