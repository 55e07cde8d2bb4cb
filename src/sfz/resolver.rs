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
use std::collections::HashSet;

use super::parser::{RegionScope, ScopeTree};
use super::region::RegionRecord;

/// Resolves every region in the tree into a typed record, applying
/// group/master inheritance. Scope precedence: an opcode key declared on the
/// region itself always wins; a key missing from the region is taken from
/// its group, then from its master. Matching is by literal opcode name, so
/// a region-level `key` does not mask an inherited `lokey`.
pub fn resolve(tree: &ScopeTree) -> Vec<RegionRecord> {
    tree.regions
        .iter()
        .map(|region| resolve_region(tree, region))
        .collect()
}

fn resolve_region(tree: &ScopeTree, region: &RegionScope) -> RegionRecord {
    let mut record = RegionRecord::default();
    let mut present: HashSet<&str> = region.opcodes.iter().map(|o| o.key.as_str()).collect();

    // The region's own opcodes, in declaration order. A later duplicate of
    // the same key overwrites the earlier typed value.
    for opcode in &region.opcodes {
        record.apply(&opcode.key, &opcode.value);
    }

    // Inherited opcodes are applied as if declared on the region, narrowest
    // scope first. Within a scope the first declaration of a key wins.
    if let Some(group) = region.group.and_then(|index| tree.groups.get(index)) {
        for opcode in &group.opcodes {
            if present.insert(opcode.key.as_str()) {
                record.apply(&opcode.key, &opcode.value);
            }
        }
    }

    if let Some(master) = region.master.and_then(|index| tree.masters.get(index)) {
        for opcode in &master.opcodes {
            if present.insert(opcode.key.as_str()) {
                record.apply(&opcode.key, &opcode.value);
            }
        }
    }

    record.normalize();
    record
}
