//! Builder for emitting one function's opcodes during lowering.
//!
//! `PexFunctionBuilder` owns the instruction stream while a function body is
//! being emitted: it allocates temporaries (pooled by type and released at
//! statement boundaries), registers named locals, patches forward jumps, and
//! tracks the current source line so every instruction lands in the debug
//! line map.

use ahash::AHashMap;

use super::{PexDebugFunctionInfo, PexFile, PexFunction, PexLocal, PexOpcode, PexStringId, PexValue};
use crate::location::SourceLocation;

/// A forward jump awaiting its target.
///
/// Returned by the `emit_jump*` methods; pass it back to
/// [`PexFunctionBuilder::patch_jump`] once the target instruction is known.
#[derive(Debug)]
#[must_use = "an unpatched jump targets instruction 0"]
pub struct JumpPatch(usize);

/// Emits the body of one PEX function.
pub struct PexFunctionBuilder<'a> {
    file: &'a mut PexFile,
    current_line: u32,
    instructions: Vec<PexOpcode>,
    line_map: Vec<u16>,
    locals: Vec<PexLocal>,
    /// Released temporaries available for reuse, pooled by type name.
    free_temps: AHashMap<String, Vec<PexStringId>>,
    /// Temporaries handed out since the last statement boundary.
    statement_temps: Vec<(String, PexStringId)>,
    temp_counter: u32,
    none_local: Option<PexStringId>,
}

impl<'a> PexFunctionBuilder<'a> {
    pub fn new(location: &SourceLocation, file: &'a mut PexFile) -> Self {
        Self {
            file,
            current_line: location.line,
            instructions: Vec::new(),
            line_map: Vec::new(),
            locals: Vec::new(),
            free_temps: AHashMap::new(),
            statement_temps: Vec::new(),
            temp_counter: 0,
            none_local: None,
        }
    }

    /// Interns a string in the owning file's pool.
    pub fn get_string(&mut self, s: &str) -> PexStringId {
        self.file.get_string(s)
    }

    /// Advances the current debug line; subsequent instructions map to it.
    pub fn set_location(&mut self, location: &SourceLocation) {
        self.current_line = location.line;
    }

    /// Appends an instruction, recording the current line in the line map.
    pub fn emit(&mut self, op: PexOpcode) {
        self.line_map.push(self.current_line.min(u32::from(u16::MAX)) as u16);
        self.instructions.push(op);
    }

    /// Index the next emitted instruction will occupy; usable as a backward
    /// jump target.
    pub fn next_instruction(&self) -> u32 {
        self.instructions.len() as u32
    }

    /// Emits an unconditional jump with an unresolved target.
    pub fn emit_jump(&mut self) -> JumpPatch {
        let patch = JumpPatch(self.instructions.len());
        self.emit(PexOpcode::Jmp { target: 0 });
        patch
    }

    /// Emits a jump taken when `cond` is true, with an unresolved target.
    pub fn emit_jump_true(&mut self, cond: PexValue) -> JumpPatch {
        let patch = JumpPatch(self.instructions.len());
        self.emit(PexOpcode::JmpT { cond, target: 0 });
        patch
    }

    /// Emits a jump taken when `cond` is false, with an unresolved target.
    pub fn emit_jump_false(&mut self, cond: PexValue) -> JumpPatch {
        let patch = JumpPatch(self.instructions.len());
        self.emit(PexOpcode::JmpF { cond, target: 0 });
        patch
    }

    /// Resolves a forward jump to the next emitted instruction.
    pub fn patch_jump(&mut self, patch: JumpPatch) {
        let target = self.instructions.len() as u32;
        match &mut self.instructions[patch.0] {
            PexOpcode::Jmp { target: t }
            | PexOpcode::JmpT { target: t, .. }
            | PexOpcode::JmpF { target: t, .. } => *t = target,
            other => unreachable!("patched a non-jump instruction {other:?}"),
        }
    }

    /// Allocates a temporary of the given type, reusing a released one when
    /// the pool has a match.
    pub fn alloc_temp(&mut self, type_name: &str) -> PexValue {
        if let Some(pool) = self.free_temps.get_mut(type_name) {
            if let Some(id) = pool.pop() {
                self.statement_temps.push((type_name.to_owned(), id));
                return PexValue::Identifier(id);
            }
        }
        let name = format!("::temp{}", self.temp_counter);
        self.temp_counter += 1;
        let name_id = self.file.get_string(&name);
        let type_id = self.file.get_string(type_name);
        self.locals.push(PexLocal {
            name: name_id,
            type_name: type_id,
        });
        self.statement_temps.push((type_name.to_owned(), name_id));
        PexValue::Identifier(name_id)
    }

    /// Returns every temporary handed out since the last boundary to the
    /// reuse pool. Called between statements.
    pub fn free_statement_temps(&mut self) {
        for (type_name, id) in self.statement_temps.drain(..) {
            self.free_temps.entry(type_name).or_default().push(id);
        }
    }

    /// Registers a named local and returns the value referencing it.
    pub fn allocate_local(&mut self, name: &str, type_name: &str) -> PexValue {
        let name_id = self.file.get_string(name);
        let type_id = self.file.get_string(type_name);
        self.locals.push(PexLocal {
            name: name_id,
            type_name: type_id,
        });
        PexValue::Identifier(name_id)
    }

    /// The shared `None`-typed local used as the discard destination for
    /// calls whose result is unused.
    pub fn get_none_local(&mut self, _location: &SourceLocation) -> PexValue {
        let id = match self.none_local {
            Some(id) => id,
            None => {
                let name_id = self.file.get_string("::nonevar");
                let type_id = self.file.get_string("None");
                self.locals.push(PexLocal {
                    name: name_id,
                    type_name: type_id,
                });
                self.none_local = Some(name_id);
                name_id
            }
        };
        PexValue::Identifier(id)
    }

    /// Moves the built code, locals, and line map into the function shell
    /// and its debug record.
    pub fn finish(self, func: &mut PexFunction, debug: &mut PexDebugFunctionInfo) {
        func.locals = self.locals;
        func.instructions = self.instructions;
        debug.instruction_line_map = self.line_map;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pex::PexDebugFunctionType;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new("Build.psc", line, 1)
    }

    fn debug_record(file: &mut PexFile) -> PexDebugFunctionInfo {
        let name = file.get_string("");
        PexDebugFunctionInfo {
            object_name: name,
            state_name: name,
            function_name: name,
            function_type: PexDebugFunctionType::Normal,
            instruction_line_map: Vec::new(),
        }
    }

    #[test]
    fn test_temp_pooling_reuses_released_temps() {
        let mut file = PexFile::new("Build.psc", false);
        let mut bldr = PexFunctionBuilder::new(&loc(1), &mut file);
        let first = bldr.alloc_temp("Int");
        bldr.free_statement_temps();
        let second = bldr.alloc_temp("Int");
        assert_eq!(first, second);
        let third = bldr.alloc_temp("Int");
        assert_ne!(second, third);
    }

    #[test]
    fn test_line_map_tracks_locations() {
        let mut file = PexFile::new("Build.psc", false);
        let mut debug = debug_record(&mut file);
        let mut bldr = PexFunctionBuilder::new(&loc(1), &mut file);
        bldr.emit(PexOpcode::Ret { value: PexValue::None });
        bldr.set_location(&loc(9));
        bldr.emit(PexOpcode::Ret { value: PexValue::None });
        let mut func = PexFunction::default();
        bldr.finish(&mut func, &mut debug);
        assert_eq!(debug.instruction_line_map, vec![1, 9]);
        assert_eq!(func.instructions.len(), 2);
    }

    #[test]
    fn test_forward_jump_patching() {
        let mut file = PexFile::new("Build.psc", false);
        let mut bldr = PexFunctionBuilder::new(&loc(1), &mut file);
        let cond = bldr.alloc_temp("Bool");
        let skip = bldr.emit_jump_false(cond);
        bldr.emit(PexOpcode::Ret { value: PexValue::None });
        bldr.patch_jump(skip);
        bldr.emit(PexOpcode::Ret { value: PexValue::None });
        match &bldr.instructions[0] {
            PexOpcode::JmpF { target, .. } => assert_eq!(*target, 2),
            other => panic!("expected JmpF, got {other:?}"),
        }
    }

    #[test]
    fn test_none_local_is_shared() {
        let mut file = PexFile::new("Build.psc", false);
        let mut bldr = PexFunctionBuilder::new(&loc(1), &mut file);
        let a = bldr.get_none_local(&loc(2));
        let b = bldr.get_none_local(&loc(3));
        assert_eq!(a, b);
        assert_eq!(bldr.locals.len(), 1);
    }
}
