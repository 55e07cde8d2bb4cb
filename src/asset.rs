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

//! Sample asset location and decoding.
//!
//! Sample names in instrument definitions are resolved to files on disk via
//! a fixed search order (including extension fallbacks for re-encoded
//! libraries), then decoded fully into memory so the audio thread never
//! touches the filesystem.

mod decoder;
mod error;
mod locate;

pub use decoder::{decode_file, DecodedAsset};
pub use error::AssetError;
pub use locate::locate_sample;
