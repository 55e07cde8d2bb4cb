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

//! An SFZ-style instrument loader and polyphonic sampler engine.
//!
//! Instrument definitions are parsed ([`sfz`]), resolved into flat region
//! records, compiled into an immutable catalog of decoded sample programs
//! ([`catalog`]), and played by a fixed pool of pitch-shifting, envelope
//! shaped voices ([`engine`]). Loading runs on background threads
//! ([`loader`]); the engine adopts finished catalogs between rendered
//! blocks, so a reload never glitches audio that is already sounding.

pub mod asset;
pub mod audition;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod library;
pub mod loader;
pub mod sfz;
mod testutil;
mod util;
