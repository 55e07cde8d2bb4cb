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

//! Instrument library discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// A discovered instrument definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    name: String,
    path: PathBuf,
}

impl Instrument {
    /// The display name of the instrument.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path of the instrument definition file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Derives a human-facing instrument name from its definition path: the
/// parent directory's name, unless that directory is a generic samples
/// folder, in which case the file stem.
pub fn display_name(path: &Path) -> String {
    let parent_name = path
        .parent()
        .and_then(|parent| parent.file_name())
        .and_then(|name| name.to_str());
    match parent_name {
        Some(name) if name != "Samples" && name != "samples" => name.to_string(),
        _ => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("instrument")
            .to_string(),
    }
}

/// Recurse into the given directory and return every instrument definition
/// found, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<Instrument>, io::Error> {
    debug!("Scanning for instruments in {dir:?}");
    let mut instruments = Vec::new();
    scan(dir, &mut instruments)?;
    instruments.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(instruments)
}

fn scan(dir: &Path, instruments: &mut Vec<Instrument>) -> Result<(), io::Error> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            // Skip .git subdirectories.
            if path.ends_with(".git") {
                continue;
            }
            scan(&path, instruments)?;
            continue;
        }

        let is_definition = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sfz"));
        if is_definition {
            instruments.push(Instrument {
                name: display_name(&path),
                path,
            });
        }
    }
    Ok(())
}
