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

//! The program catalog: the immutable, fully decoded form of an instrument.
//!
//! A catalog is built entirely by the load path (parse, resolve, locate,
//! decode) and then handed to the render path as one finished value. The
//! render path never sees a half-built catalog and never mutates one; a
//! newly loaded instrument replaces the handle wholesale.

mod builder;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::asset::DecodedAsset;
use crate::sfz::RegionRecord;

pub use builder::{build_catalog, BuildError, CatalogBuild, DecodePool};

/// One playable program: a resolved region record combined with its decoded
/// audio. The asset is shared with every voice currently playing it, so
/// swapping catalogs never cuts off audio that is still rendering.
pub struct SampleProgram {
    region: RegionRecord,
    asset: Arc<DecodedAsset>,
}

impl SampleProgram {
    pub(crate) fn new(region: RegionRecord, asset: Arc<DecodedAsset>) -> SampleProgram {
        SampleProgram { region, asset }
    }

    /// The resolved region record this program was compiled from.
    pub fn region(&self) -> &RegionRecord {
        &self.region
    }

    /// The decoded audio for this program.
    pub fn asset(&self) -> &Arc<DecodedAsset> {
        &self.asset
    }
}

/// An immutable, ordered collection of sample programs for one instrument.
/// Programs are individually reference-counted so a voice can outlive the
/// catalog generation it was started from.
pub struct Catalog {
    name: String,
    path: PathBuf,
    programs: Vec<Arc<SampleProgram>>,
}

impl Catalog {
    pub(crate) fn new(name: String, path: PathBuf, programs: Vec<Arc<SampleProgram>>) -> Catalog {
        Catalog {
            name,
            path,
            programs,
        }
    }

    /// The display name of the instrument.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path of the instrument definition this catalog was built from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The programs in this catalog, in definition order.
    pub fn programs(&self) -> &[Arc<SampleProgram>] {
        &self.programs
    }

    /// Produces a read-only summary of this catalog for display.
    pub fn summary(&self) -> CatalogSummary {
        let key_range = self
            .programs
            .iter()
            .map(|program| (program.region().lokey(), program.region().hikey()))
            .reduce(|(lo, hi), (lokey, hikey)| (lo.min(lokey), hi.max(hikey)));
        let velocity_range = self
            .programs
            .iter()
            .map(|program| (program.region().lovel(), program.region().hivel()))
            .reduce(|(lo, hi), (lovel, hivel)| (lo.min(lovel), hi.max(hivel)));

        CatalogSummary {
            name: self.name.clone(),
            path: self.path.clone(),
            program_count: self.programs.len(),
            key_range,
            velocity_range,
        }
    }
}

/// A snapshot of catalog-level facts, detached from the catalog itself so it
/// can be displayed or serialized while the engine keeps playing.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    name: String,
    path: PathBuf,
    program_count: usize,
    key_range: Option<(u8, u8)>,
    velocity_range: Option<(u8, u8)>,
}

impl CatalogSummary {
    /// The display name of the instrument.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path of the instrument definition.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The number of playable programs in the catalog.
    pub fn program_count(&self) -> usize {
        self.program_count
    }

    /// The lowest and highest note covered by any program, if any.
    pub fn key_range(&self) -> Option<(u8, u8)> {
        self.key_range
    }

    /// The lowest and highest velocity covered by any program, if any.
    pub fn velocity_range(&self) -> Option<(u8, u8)> {
        self.velocity_range
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::{Catalog, SampleProgram};
    use crate::asset::DecodedAsset;
    use crate::sfz::RegionRecord;

    fn program(lokey: &str, hikey: &str) -> Arc<SampleProgram> {
        let mut region = RegionRecord::default();
        region.apply("lokey", lokey);
        region.apply("hikey", hikey);
        let asset = DecodedAsset::from_planes(vec![vec![0.0; 4]], 44100);
        Arc::new(SampleProgram::new(region, Arc::new(asset)))
    }

    #[test]
    fn test_summary() {
        let catalog = Catalog::new(
            "Piano".to_string(),
            PathBuf::from("/lib/piano.sfz"),
            vec![program("10", "60"), program("61", "100")],
        );

        let summary = catalog.summary();
        assert_eq!("Piano", summary.name());
        assert_eq!(2, summary.program_count());
        assert_eq!(Some((10, 100)), summary.key_range());
        assert_eq!(Some((0, 127)), summary.velocity_range());
    }

    #[test]
    fn test_summary_empty() {
        let catalog = Catalog::new("Empty".to_string(), PathBuf::from("/lib/e.sfz"), vec![]);

        let summary = catalog.summary();
        assert_eq!(0, summary.program_count());
        assert_eq!(None, summary.key_range());
        assert_eq!(None, summary.velocity_range());
    }
}
