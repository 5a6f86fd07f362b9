//! Compiler configuration consumed from the external config collaborator.

use std::path::PathBuf;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::limits::EngineLimitCaps;

/// Configuration for one compilation invocation.
///
/// The driver is responsible for loading this (from CLI flags, a config
/// file, or both); the core only consumes it. All fields have working
/// defaults so `CompilerConfig::default()` compiles a self-contained script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Directories probed, in order, when an imported or referenced script
    /// must be loaded from disk.
    pub import_directories: Vec<PathBuf>,
    /// Allows `<script>#<struct>` in unresolved type names, as produced by
    /// decompilers.
    pub enable_decompiled_struct_name_refs: bool,
    /// Warning numbers that are suppressed entirely.
    pub disabled_warnings: AHashSet<u32>,
    /// Warning numbers that are reported and counted as errors.
    pub warnings_as_errors: AHashSet<u32>,
    /// Engine caps; zero disables the corresponding check.
    pub engine_limits: EngineLimitCaps,
    /// Whether the emitted `PexFile` carries a debug-info section.
    pub emit_debug_info: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            import_directories: Vec::new(),
            enable_decompiled_struct_name_refs: false,
            disabled_warnings: AHashSet::new(),
            warnings_as_errors: AHashSet::new(),
            engine_limits: EngineLimitCaps::default(),
            emit_debug_info: true,
        }
    }
}
