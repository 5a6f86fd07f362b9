//! Source locations attached to AST nodes and diagnostics.

use std::{fmt, sync::Arc};

/// A position in a `.psc` source file.
///
/// Locations are attached to every AST node by the parser and threaded
/// through resolution and emission so diagnostics and debug info can point
/// back at the source. The filename is shared via `Arc` since one file
/// produces many locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Arc<str>,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

/// Renders as `<file>(<line>,<column>)`, the format used in diagnostics.
impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.file, self.line, self.column)
    }
}
