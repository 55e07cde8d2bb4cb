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

use std::borrow::Cow;

/// Normalizes path separators in instrument-relative paths. SFZ libraries
/// authored on Windows commonly write backslashes; on other platforms those
/// are converted to forward slashes. On Windows the path is left untouched.
pub fn normalize_path_separators(path: &str) -> Cow<'_, str> {
    if cfg!(windows) || !path.contains('\\') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(path.replace('\\', "/"))
    }
}
