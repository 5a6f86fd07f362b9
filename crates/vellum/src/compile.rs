//! The per-script compilation pipeline.

use crate::{
    config::CompilerConfig,
    diagnostics::{CompileResult, Diagnostics},
    parse::ScriptParser,
    papyrus::{resolution::ResolutionContext, script::{ScriptId, ScriptStore}},
    pex::{build_script_pex, PexFile},
};

/// Runs the full pipeline over one already-loaded script: the three
/// resolution passes, then emission.
///
/// The caller parses the main script with its own [`ScriptParser`], inserts
/// it into the store, and passes the returned id here; imported scripts are
/// loaded on demand through the same parser. The produced [`PexFile`] is
/// handed to the external serializer, but only after the driver has checked
/// `diags.exit_if_errors()` - a file emitted alongside errors must not be
/// written.
pub fn compile_script(
    config: &CompilerConfig,
    diags: &mut Diagnostics,
    parser: &mut dyn ScriptParser,
    store: &mut ScriptStore,
    script: ScriptId,
) -> CompileResult<PexFile> {
    let mut ctx = ResolutionContext::new(config, diags, parser, store);
    ctx.resolve_script(script)?;
    build_script_pex(store, diags, &config.engine_limits, script, config.emit_debug_info)
}
