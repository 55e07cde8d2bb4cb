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

use super::error::AssetError;
use crate::util::normalize_path_separators;

/// Alternate extensions tried when the sample name does not resolve as
/// written. Instrument libraries are frequently shipped re-encoded, so a
/// definition referencing `C4.wav` may sit next to a `C4.flac`.
const FALLBACK_EXTENSIONS: [&str; 4] = ["wav", "flac", "ogg", "aiff"];

/// Locates the audio file for a sample name from an instrument definition.
///
/// Candidate paths are tried in order, all relative to the directory of the
/// instrument file:
/// 1. the `default_path` prefix followed by the sample name;
/// 2. the sample name itself;
/// 3. the sample name as a sibling of the instrument file;
/// 4. the sample name inside a `Samples` subdirectory;
/// 5. the sample name with each fallback extension, in the instrument
///    directory and then in its `Samples` subdirectory.
///
/// The first candidate that exists wins. If none do, `AssetNotFound` is
/// returned carrying the (separator-normalized) sample name.
pub fn locate_sample(
    instrument: &Path,
    default_path: Option<&str>,
    sample: &str,
) -> Result<PathBuf, AssetError> {
    let sample = normalize_path_separators(sample);
    let dir = instrument.parent().unwrap_or_else(|| Path::new("."));

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(prefix) = default_path {
        let prefix = normalize_path_separators(prefix);
        candidates.push(dir.join(format!("{}{}", prefix, sample)));
    }
    candidates.push(dir.join(sample.as_ref()));
    candidates.push(instrument.with_file_name(sample.as_ref()));
    candidates.push(dir.join("Samples").join(sample.as_ref()));
    for extension in FALLBACK_EXTENSIONS {
        let renamed = Path::new(sample.as_ref()).with_extension(extension);
        candidates.push(dir.join(&renamed));
        candidates.push(dir.join("Samples").join(&renamed));
    }

    candidates
        .into_iter()
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| AssetError::AssetNotFound(PathBuf::from(sample.as_ref())))
}
