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

//! SFZ instrument definition parsing and resolution.
//!
//! This module provides:
//! - A line-oriented parser for the SFZ opcode format, including `#define`
//!   variables, `#include` splicing (with cycle detection) and section
//!   headers
//! - Inheritance resolution of master/group opcodes into per-region records
//! - Typed, clamped region records ready for compilation into a catalog

mod error;
mod parser;
mod region;
mod resolver;

pub use error::SfzError;
pub use parser::{parse_instrument, GroupScope, MasterScope, Opcode, RegionScope, ScopeTree};
pub use region::{RegionRecord, Trigger};
pub use resolver::resolve;

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::fs;

    use super::{parse_instrument, resolve};

    #[test]
    fn test_variable_resolves_through_key_shorthand() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("inst.sfz");
        fs::write(
            &path,
            "#define $ROOT 60\n<region> sample=x.wav key=$ROOT\n",
        )?;

        let tree = parse_instrument(&path)?;
        let records = resolve(&tree);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lokey(), 60);
        assert_eq!(records[0].hikey(), 60);
        assert_eq!(records[0].pitch_keycenter(), 60);
        Ok(())
    }
}
