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
use std::fs;
use std::path::{Path, PathBuf};

use pest::Parser;
use pest_derive::Parser;
use tracing::warn;

use super::error::SfzError;
use crate::util::normalize_path_separators;

#[derive(Parser)]
#[grammar = "src/sfz/grammar.pest"]
struct SfzParser;

/// A single `key=value` declaration. Values have had variable substitution
/// applied by the time they are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub key: String,
    pub value: String,
}

/// A `<master>` scope and its directly declared opcodes.
#[derive(Debug, Default)]
pub struct MasterScope {
    pub opcodes: Vec<Opcode>,
}

/// A `<group>` scope. `master` is the index of the enclosing master scope,
/// if any; it is a lookup reference, not ownership.
#[derive(Debug, Default)]
pub struct GroupScope {
    pub opcodes: Vec<Opcode>,
    pub master: Option<usize>,
}

/// A `<region>` scope with references to its enclosing master and group.
#[derive(Debug, Default)]
pub struct RegionScope {
    pub opcodes: Vec<Opcode>,
    pub master: Option<usize>,
    pub group: Option<usize>,
}

/// The parsed form of an instrument definition: every scope in declaration
/// order, the variable table, the captured `default_path` prefix, and any
/// errors that were recovered from during the parse.
#[derive(Debug, Default)]
pub struct ScopeTree {
    pub masters: Vec<MasterScope>,
    pub groups: Vec<GroupScope>,
    pub regions: Vec<RegionScope>,
    pub variables: Vec<(String, String)>,
    pub default_path: Option<String>,
    pub warnings: Vec<SfzError>,
}

/// Which scope subsequent opcodes are applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// `<global>`/`<control>`: only `default_path` is captured.
    Global,
    Master,
    Group,
    Region,
    /// `<curve>` and unrecognized sections: contents are dropped.
    Ignored,
}

struct ParseState {
    context: Context,
    current_master: Option<usize>,
    current_group: Option<usize>,
}

/// Parses the instrument definition at the given path, following includes,
/// into a finished scope tree. Parsing is a pure function of the file
/// contents: no state survives between calls. Malformed lines and broken
/// includes are skipped and recorded on the tree as warnings; only a
/// failure to read the root file is fatal.
pub fn parse_instrument(path: &Path) -> Result<ScopeTree, SfzError> {
    let mut tree = ScopeTree::default();
    let mut state = ParseState {
        context: Context::Global,
        current_master: None,
        current_group: None,
    };
    let mut include_stack: Vec<PathBuf> = Vec::new();
    parse_file(path, &mut tree, &mut state, &mut include_stack)?;
    Ok(tree)
}

/// Parses one file, splicing its scopes and opcodes into the tree at the
/// current position. The include stack holds every file currently being
/// parsed so that include cycles are detected instead of recursed into.
fn parse_file(
    path: &Path,
    tree: &mut ScopeTree,
    state: &mut ParseState,
    include_stack: &mut Vec<PathBuf>,
) -> Result<(), SfzError> {
    let content = fs::read_to_string(path).map_err(|source| SfzError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    include_stack.push(canonical);

    for (index, line) in content.lines().enumerate() {
        parse_line(line, index + 1, path, tree, state, include_stack);
    }

    include_stack.pop();
    Ok(())
}

/// Parses a single physical line. Never fails: a line that does not match
/// the grammar is skipped and recorded as a parse warning.
fn parse_line(
    line: &str,
    number: usize,
    path: &Path,
    tree: &mut ScopeTree,
    state: &mut ParseState,
    include_stack: &mut Vec<PathBuf>,
) {
    let pairs = match SfzParser::parse(Rule::line, line) {
        Ok(pairs) => pairs,
        Err(e) => {
            let message = e.variant.message().to_string();
            warn!(
                path = ?path,
                line = number,
                message = message.as_str(),
                "Skipping malformed instrument line"
            );
            tree.warnings.push(SfzError::ParseError {
                path: path.to_path_buf(),
                line: number,
                message,
            });
            return;
        }
    };

    for pair in pairs {
        for item in pair.into_inner() {
            match item.as_rule() {
                Rule::comment => {}
                Rule::define => {
                    let mut inner = item.into_inner();
                    let name = inner.next().map(|p| p.as_str().to_string());
                    let value = inner.next().map(|p| p.as_str().to_string());
                    if let (Some(name), Some(value)) = (name, value) {
                        bind_variable(tree, name, value);
                    }
                }
                Rule::include => {
                    if let Some(target) = quoted_contents(item) {
                        handle_include(&target, path, tree, state, include_stack);
                    }
                }
                Rule::header => {
                    let section = item
                        .into_inner()
                        .next()
                        .map(|p| p.as_str().to_ascii_lowercase())
                        .unwrap_or_default();
                    handle_header(&section, tree, state);
                }
                Rule::opcode => {
                    let mut inner = item.into_inner();
                    let key = match inner.next() {
                        Some(p) => p.as_str().to_string(),
                        None => continue,
                    };
                    let value = match inner.next() {
                        Some(p) => match p.as_rule() {
                            Rule::quoted => p
                                .into_inner()
                                .next()
                                .map(|q| q.as_str().to_string())
                                .unwrap_or_default(),
                            _ => p.as_str().to_string(),
                        },
                        None => continue,
                    };
                    let value = substitute_variables(tree, &value);
                    handle_opcode(key, value, tree, state);
                }
                Rule::EOI => {}
                _ => {}
            }
        }
    }
}

/// Extracts the inner text of an include's quoted path.
fn quoted_contents(pair: pest::iterators::Pair<Rule>) -> Option<String> {
    pair.into_inner()
        .next()
        .and_then(|quoted| quoted.into_inner().next())
        .map(|inner| inner.as_str().to_string())
}

/// Binds a variable, overwriting any earlier definition of the same name.
/// Order of first definition is preserved so that substitution remains
/// deterministic when one variable name is a prefix of another.
fn bind_variable(tree: &mut ScopeTree, name: String, value: String) {
    match tree.variables.iter_mut().find(|(n, _)| *n == name) {
        Some(entry) => entry.1 = value,
        None => tree.variables.push((name, value)),
    }
}

/// Replaces every occurrence of every known variable name in the value.
/// Single pass, in definition order; replacement text is not re-scanned.
fn substitute_variables(tree: &ScopeTree, value: &str) -> String {
    let mut result = value.to_string();
    for (name, replacement) in &tree.variables {
        if result.contains(name.as_str()) {
            result = result.replace(name.as_str(), replacement);
        }
    }
    result
}

/// Recursively parses an included file, resolved relative to the including
/// file's directory. Missing files and include cycles are skipped with a
/// warning; any read failure below is likewise non-fatal.
fn handle_include(
    target: &str,
    including: &Path,
    tree: &mut ScopeTree,
    state: &mut ParseState,
    include_stack: &mut Vec<PathBuf>,
) {
    let target = normalize_path_separators(target);
    let resolved = match including.parent() {
        Some(parent) => parent.join(target.as_ref()),
        None => PathBuf::from(target.as_ref()),
    };

    if !resolved.exists() {
        warn!(path = ?resolved, "Include file not found, skipping");
        tree.warnings.push(SfzError::IncludeNotFound(resolved));
        return;
    }

    let canonical = resolved
        .canonicalize()
        .unwrap_or_else(|_| resolved.clone());
    if include_stack.contains(&canonical) {
        warn!(path = ?resolved, "Include cycle detected, skipping");
        tree.warnings.push(SfzError::IncludeCycle(resolved));
        return;
    }

    if let Err(e) = parse_file(&resolved, tree, state, include_stack) {
        warn!(err = e.to_string(), "Failed to parse included file");
        tree.warnings.push(e);
    }
}

/// Opens a new scope for a section header. `<master>` resets the current
/// group; `<group>` attaches to the current master; `<region>` attaches to
/// the current master and group. `<curve>` and anything unrecognized switch
/// to the ignored context so their opcodes are not misattributed to the
/// previous scope.
fn handle_header(section: &str, tree: &mut ScopeTree, state: &mut ParseState) {
    match section {
        "master" => {
            tree.masters.push(MasterScope::default());
            state.current_master = Some(tree.masters.len() - 1);
            state.current_group = None;
            state.context = Context::Master;
        }
        "group" => {
            tree.groups.push(GroupScope {
                opcodes: Vec::new(),
                master: state.current_master,
            });
            state.current_group = Some(tree.groups.len() - 1);
            state.context = Context::Group;
        }
        "region" => {
            tree.regions.push(RegionScope {
                opcodes: Vec::new(),
                master: state.current_master,
                group: state.current_group,
            });
            state.context = Context::Region;
        }
        "global" | "control" => {
            state.context = Context::Global;
        }
        _ => {
            state.context = Context::Ignored;
        }
    }
}

/// Applies an opcode to the current scope. In the global context only
/// `default_path` is meaningful; it becomes the sample path prefix rather
/// than a stored opcode.
fn handle_opcode(key: String, value: String, tree: &mut ScopeTree, state: &mut ParseState) {
    let opcode = Opcode { key, value };
    match state.context {
        Context::Master => {
            if let Some(index) = state.current_master {
                tree.masters[index].opcodes.push(opcode);
            }
        }
        Context::Group => {
            if let Some(index) = state.current_group {
                tree.groups[index].opcodes.push(opcode);
            }
        }
        Context::Region => {
            if let Some(region) = tree.regions.last_mut() {
                region.opcodes.push(opcode);
            }
        }
        Context::Global => {
            if opcode.key == "default_path" {
                tree.default_path = Some(opcode.value);
            }
        }
        Context::Ignored => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use tempfile::tempdir;

    fn write_sfz(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create sfz dir");
        }
        fs::write(&path, content).expect("write sfz");
        path
    }

    fn opcode_value<'a>(opcodes: &'a [Opcode], key: &str) -> Option<&'a str> {
        opcodes
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
    }

    #[test]
    fn test_scope_attachment() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            r#"
<master>
volume=-3
<group>
lovel=10
<region>
sample=a.wav
<region>
sample=b.wav
<master>
<region>
sample=c.wav
"#,
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.masters.len(), 2);
        assert_eq!(tree.groups.len(), 1);
        assert_eq!(tree.regions.len(), 3);

        assert_eq!(tree.regions[0].master, Some(0));
        assert_eq!(tree.regions[0].group, Some(0));
        assert_eq!(tree.regions[1].master, Some(0));
        assert_eq!(tree.regions[1].group, Some(0));

        // The second master resets the current group.
        assert_eq!(tree.regions[2].master, Some(1));
        assert_eq!(tree.regions[2].group, None);

        assert_eq!(opcode_value(&tree.masters[0].opcodes, "volume"), Some("-3"));
        assert_eq!(opcode_value(&tree.groups[0].opcodes, "lovel"), Some("10"));
        assert_eq!(
            opcode_value(&tree.regions[0].opcodes, "sample"),
            Some("a.wav")
        );
    }

    #[test]
    fn test_header_and_opcodes_on_one_line() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "<region> sample=x.wav lokey=10 hikey=20\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.regions.len(), 1);
        let opcodes = &tree.regions[0].opcodes;
        assert_eq!(opcode_value(opcodes, "sample"), Some("x.wav"));
        assert_eq!(opcode_value(opcodes, "lokey"), Some("10"));
        assert_eq!(opcode_value(opcodes, "hikey"), Some("20"));
    }

    #[test]
    fn test_variable_substitution() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "#define $ROOT 60\n<region> key=$ROOT sample=x.wav\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(opcode_value(&tree.regions[0].opcodes, "key"), Some("60"));
    }

    #[test]
    fn test_variable_redefinition_overwrites() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "#define $V 1\n#define $V 2\n<region> lokey=$V\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.variables.len(), 1);
        assert_eq!(opcode_value(&tree.regions[0].opcodes, "lokey"), Some("2"));
    }

    #[test]
    fn test_substitution_applies_every_occurrence() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "#define $DIR kick\n<region> sample=$DIR/$DIR.wav\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(
            opcode_value(&tree.regions[0].opcodes, "sample"),
            Some("kick/kick.wav")
        );
    }

    #[test]
    fn test_quoted_value_preserves_spaces() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "<region> sample=\"My Sample.wav\" lokey=1\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        let opcodes = &tree.regions[0].opcodes;
        assert_eq!(opcode_value(opcodes, "sample"), Some("My Sample.wav"));
        assert_eq!(opcode_value(opcodes, "lokey"), Some("1"));
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "// a comment\n\n   \n<region> sample=x.wav\n// trailing comment line\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.regions.len(), 1);
        assert!(tree.warnings.is_empty());
    }

    #[test]
    fn test_malformed_line_skipped_with_warning() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "<region> sample=a.wav\nthis is not an opcode\n<region> sample=b.wav\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.regions.len(), 2);
        assert_eq!(tree.warnings.len(), 1);
        assert!(matches!(tree.warnings[0], SfzError::ParseError { .. }));
    }

    #[test]
    fn test_include_splices_at_inclusion_point() {
        let dir = tempdir().expect("tempdir");
        write_sfz(dir.path(), "parts/low.sfz", "<region> sample=low.wav\n");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "<group> lovel=5\n#include \"parts/low.sfz\"\n<region> sample=high.wav\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.regions.len(), 2);
        // The included region still belongs to the group opened before the
        // include directive.
        assert_eq!(tree.regions[0].group, Some(0));
        assert_eq!(
            opcode_value(&tree.regions[0].opcodes, "sample"),
            Some("low.wav")
        );
        assert_eq!(
            opcode_value(&tree.regions[1].opcodes, "sample"),
            Some("high.wav")
        );
    }

    #[test]
    fn test_include_relative_to_including_file() {
        let dir = tempdir().expect("tempdir");
        // nested/mid.sfz includes deep/leaf.sfz relative to nested/, not to
        // the root instrument's directory.
        write_sfz(
            dir.path(),
            "nested/deep/leaf.sfz",
            "<region> sample=leaf.wav\n",
        );
        write_sfz(dir.path(), "nested/mid.sfz", "#include \"deep/leaf.sfz\"\n");
        let path = write_sfz(dir.path(), "inst.sfz", "#include \"nested/mid.sfz\"\n");

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.regions.len(), 1);
        assert!(tree.warnings.is_empty());
    }

    #[test]
    fn test_missing_include_recorded_and_skipped() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "#include \"nope.sfz\"\n<region> sample=x.wav\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.regions.len(), 1);
        assert_eq!(tree.warnings.len(), 1);
        assert!(matches!(tree.warnings[0], SfzError::IncludeNotFound(_)));
    }

    #[test]
    fn test_include_cycle_detected() {
        let dir = tempdir().expect("tempdir");
        write_sfz(
            dir.path(),
            "a.sfz",
            "#include \"b.sfz\"\n<region> sample=a.wav\n",
        );
        write_sfz(dir.path(), "b.sfz", "#include \"a.sfz\"\n");
        let path = dir.path().join("a.sfz");

        let tree = parse_instrument(&path).expect("parse");
        // The cycle is cut at the b -> a edge; everything else still parses.
        assert_eq!(tree.regions.len(), 1);
        assert!(tree
            .warnings
            .iter()
            .any(|w| matches!(w, SfzError::IncludeCycle(_))));
    }

    #[test]
    fn test_self_include_detected() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "loop.sfz",
            "#include \"loop.sfz\"\n<region> sample=x.wav\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.regions.len(), 1);
        assert!(matches!(tree.warnings[0], SfzError::IncludeCycle(_)));
    }

    #[test]
    fn test_curve_contents_dropped() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "<region> sample=x.wav\n<curve>\ncurve_index=1\nv000=0\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.regions.len(), 1);
        // Curve opcodes must not leak into the preceding region.
        assert!(opcode_value(&tree.regions[0].opcodes, "curve_index").is_none());
        assert!(tree.warnings.is_empty());
    }

    #[test]
    fn test_default_path_captured_separately() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "<control>\ndefault_path=Samples/Grand/\n<region> sample=x.wav\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.default_path.as_deref(), Some("Samples/Grand/"));
        assert!(opcode_value(&tree.regions[0].opcodes, "default_path").is_none());
    }

    #[test]
    fn test_global_opcodes_dropped() {
        let dir = tempdir().expect("tempdir");
        let path = write_sfz(
            dir.path(),
            "inst.sfz",
            "<global>\nvolume=-6\n<region> sample=x.wav\n",
        );

        let tree = parse_instrument(&path).expect("parse");
        assert_eq!(tree.regions.len(), 1);
        assert!(opcode_value(&tree.regions[0].opcodes, "volume").is_none());
    }

    #[test]
    fn test_missing_root_file_is_fatal() {
        let dir = tempdir().expect("tempdir");
        let result = parse_instrument(&dir.path().join("missing.sfz"));
        assert!(matches!(result, Err(SfzError::Io { .. })));
    }
}
