//! The parser collaborator seam and on-disk script lookup.
//!
//! Lexing and parsing of `.psc` source is outside the semantic core; it is
//! consumed through [`ScriptParser`], an opaque AST provider. The core owns
//! only the lookup of script files inside the configured import directories.

use std::path::{Path, PathBuf};

use crate::{diagnostics::CompileResult, ident::caseless_eq, papyrus::ast::Script};

/// Opaque provider of parsed script ASTs.
///
/// Implementations read and parse a `.psc` file into the [`Script`] data
/// model. Parse diagnostics flow through the implementation's own channel to
/// the same sink before resolution runs; an unreadable or unparseable file is
/// a `Fatal`.
pub trait ScriptParser {
    fn parse_script(&mut self, path: &Path) -> CompileResult<Script>;
}

/// Probes `dir` for `<name>.psc`.
///
/// The exact filename is tried first; on miss the directory is scanned for a
/// case-insensitive match, since script references in source rarely agree
/// with on-disk casing.
pub(crate) fn locate_script(dir: &Path, name: &str) -> Option<PathBuf> {
    let direct = dir.join(format!("{name}.psc"));
    if direct.is_file() {
        return Some(direct);
    }
    for entry in std::fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        let is_psc = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("psc"));
        let stem_matches = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| caseless_eq(stem, name));
        if is_psc && stem_matches && path.is_file() {
            return Some(path);
        }
    }
    None
}
