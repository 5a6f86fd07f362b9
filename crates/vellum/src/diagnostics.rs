//! Numbered warnings, errors, and the unrecoverable failure channel.
//!
//! All compiler output flows through a [`Diagnostics`] sink: recoverable
//! errors and numbered warnings are formatted, written, and counted;
//! unrecoverable conditions are returned as [`Fatal`] values that propagate
//! with `?` up to the driver, which reports a failure exit. Nothing in the
//! core recovers from a `Fatal`.
//!
//! Warnings 2001-2010 are engine-imposed limits; 4001-4007 are language
//! warnings. The numbers and message templates are part of the external
//! interface and must not change.

use std::{cell::RefCell, fmt, process::ExitCode, rc::Rc};

use ahash::AHashSet;

use crate::location::SourceLocation;

/// Result alias for operations that can abort the current compilation.
pub type CompileResult<T> = Result<T, Fatal>;

/// An unrecoverable compilation failure.
///
/// Carries a source location when one was available at the raise site;
/// logical failures (invariant violations inside the compiler itself) have
/// none. The diagnostic line has already been written by the time a `Fatal`
/// is constructed, so callers only use this for unwinding and exit status.
#[derive(Debug, Clone)]
pub struct Fatal {
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{loc}: Fatal Error: {}", self.message),
            None => write!(f, "Fatal Error: {}", self.message),
        }
    }
}

impl std::error::Error for Fatal {}

/// The closed catalog of numbered warnings.
///
/// Each variant carries exactly the arguments its message template expects,
/// so a warning can never be emitted with the wrong arity.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// W2001
    EngineLimitArrayLength { count: usize, max: usize },
    /// W2002
    EngineLimitPexFileUserFlagCount { count: usize, max: usize },
    /// W2003
    EngineLimitPexFunctionParameterCount {
        count: usize,
        function: String,
        max: usize,
    },
    /// W2004
    EngineLimitPexObjectEmptyStateFunctionCount { count: usize, max: usize },
    /// W2005
    EngineLimitPexObjectInitialValueCount { count: usize, max: usize },
    /// W2006
    EngineLimitPexObjectNamedStateCount { count: usize, max: usize },
    /// W2007
    EngineLimitPexObjectPropertyCount { count: usize, max: usize },
    /// W2008
    EngineLimitPexObjectStaticFunctionCount { count: usize, max: usize },
    /// W2009
    EngineLimitPexObjectVariableCount { count: usize, max: usize },
    /// W2010
    EngineLimitPexStateFunctionCount {
        count: usize,
        state: String,
        max: usize,
    },
    /// W4001
    UnnecessaryCast { from: String, to: String },
    /// W4002
    DuplicateImport { name: String },
    /// W4003
    StateDoesntExist { name: String },
    /// W4004
    UnreferencedScriptVariable { name: String },
    /// W4005
    UnwrittenScriptVariable { name: String },
    /// W4006
    ScriptVariableOnlyWritten { name: String },
    /// W4007
    ScriptVariableInitializedNeverUsed { name: String },
}

impl Warning {
    /// The warning's externally visible number.
    pub fn number(&self) -> u32 {
        match self {
            Self::EngineLimitArrayLength { .. } => 2001,
            Self::EngineLimitPexFileUserFlagCount { .. } => 2002,
            Self::EngineLimitPexFunctionParameterCount { .. } => 2003,
            Self::EngineLimitPexObjectEmptyStateFunctionCount { .. } => 2004,
            Self::EngineLimitPexObjectInitialValueCount { .. } => 2005,
            Self::EngineLimitPexObjectNamedStateCount { .. } => 2006,
            Self::EngineLimitPexObjectPropertyCount { .. } => 2007,
            Self::EngineLimitPexObjectStaticFunctionCount { .. } => 2008,
            Self::EngineLimitPexObjectVariableCount { .. } => 2009,
            Self::EngineLimitPexStateFunctionCount { .. } => 2010,
            Self::UnnecessaryCast { .. } => 4001,
            Self::DuplicateImport { .. } => 4002,
            Self::StateDoesntExist { .. } => 4003,
            Self::UnreferencedScriptVariable { .. } => 4004,
            Self::UnwrittenScriptVariable { .. } => 4005,
            Self::ScriptVariableOnlyWritten { .. } => 4006,
            Self::ScriptVariableInitializedNeverUsed { .. } => 4007,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineLimitArrayLength { count, max } => write!(
                f,
                "Attempting to create an array with {count} elements, but the engine limit is {max} elements."
            ),
            Self::EngineLimitPexFileUserFlagCount { count, max } => write!(
                f,
                "There are {count} distinct user flags defined, but the engine limit is {max} flags."
            ),
            Self::EngineLimitPexFunctionParameterCount { count, function, max } => write!(
                f,
                "There are {count} parameters declared for the '{function}' function, but the engine limit is {max} parameters."
            ),
            Self::EngineLimitPexObjectEmptyStateFunctionCount { count, max } => write!(
                f,
                "There are {count} functions in the empty state, but the engine limit is {max} functions."
            ),
            Self::EngineLimitPexObjectInitialValueCount { count, max } => write!(
                f,
                "There are {count} variables with initial values, but the engine limit is {max} intial values."
            ),
            Self::EngineLimitPexObjectNamedStateCount { count, max } => write!(
                f,
                "There are {count} named states in this object, but the engine limit is {max} named states."
            ),
            Self::EngineLimitPexObjectPropertyCount { count, max } => write!(
                f,
                "There are {count} properties in this object, but the engine limit is {max} properties."
            ),
            Self::EngineLimitPexObjectStaticFunctionCount { count, max } => write!(
                f,
                "There are {count} static functions in this object, but the engine limit is {max} static functions."
            ),
            Self::EngineLimitPexObjectVariableCount { count, max } => write!(
                f,
                "There are {count} variables in this object, but the engine limit is {max} variables."
            ),
            Self::EngineLimitPexStateFunctionCount { count, state, max } => write!(
                f,
                "There are {count} functions in the '{state}' state, but the engine limit is {max} functions in a named state."
            ),
            Self::UnnecessaryCast { from, to } => {
                write!(f, "Unecessary cast from '{from}' to '{to}'.")
            }
            Self::DuplicateImport { name } => write!(f, "Duplicate import of '{name}'."),
            Self::StateDoesntExist { name } => {
                write!(f, "The state '{name}' doesn't exist in this context.")
            }
            Self::UnreferencedScriptVariable { name } => {
                write!(f, "The script variable '{name}' is declared but never used.")
            }
            Self::UnwrittenScriptVariable { name } => write!(
                f,
                "The script variable '{name}' is not initialized, and is never written to."
            ),
            Self::ScriptVariableOnlyWritten { name } => {
                write!(f, "The script variable '{name}' is only ever written to.")
            }
            Self::ScriptVariableInitializedNeverUsed { name } => write!(
                f,
                "The script variable '{name}' is initialized but is never used."
            ),
        }
    }
}

/// Destination for formatted diagnostic lines.
///
/// Implement this to capture or redirect compiler output. The default
/// implementation [`StderrWriter`] writes to standard error; tests use
/// [`CollectDiagnostics`] to assert on exact lines.
pub trait DiagnosticWriter {
    /// Called once per complete diagnostic line, without a trailing newline.
    fn write_line(&mut self, line: &str);
}

/// Default [`DiagnosticWriter`] that writes to standard error.
#[derive(Debug, Default)]
pub struct StderrWriter;

impl DiagnosticWriter for StderrWriter {
    fn write_line(&mut self, line: &str) {
        eprintln!("{line}");
    }
}

/// [`DiagnosticWriter`] that collects lines in memory, for tests and embedders.
///
/// The buffer is shared: cloning the collector yields another handle onto the
/// same lines, so one clone can be boxed into a [`Diagnostics`] while the
/// original stays available for assertions.
#[derive(Debug, Clone, Default)]
pub struct CollectDiagnostics {
    lines: Rc<RefCell<Vec<String>>>,
}

impl CollectDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected lines so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl DiagnosticWriter for CollectDiagnostics {
    fn write_line(&mut self, line: &str) {
        self.lines.borrow_mut().push(line.to_owned());
    }
}

/// The diagnostics sink for one compilation invocation.
///
/// Owns the error/warning counters, the warning configuration (disabled and
/// error-promoted numbers), and the output writer. The sink is a plain value
/// threaded by `&mut`; a concurrent driver shards one per script or guards
/// it itself, the core takes no locks.
pub struct Diagnostics {
    error_count: usize,
    warning_count: usize,
    disabled_warnings: AHashSet<u32>,
    warnings_as_errors: AHashSet<u32>,
    writer: Box<dyn DiagnosticWriter>,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("error_count", &self.error_count)
            .field("warning_count", &self.warning_count)
            .finish_non_exhaustive()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a sink that writes to standard error with no warning
    /// configuration.
    pub fn new() -> Self {
        Self::with_writer(Box::new(StderrWriter))
    }

    pub fn with_writer(writer: Box<dyn DiagnosticWriter>) -> Self {
        Self {
            error_count: 0,
            warning_count: 0,
            disabled_warnings: AHashSet::new(),
            warnings_as_errors: AHashSet::new(),
            writer,
        }
    }

    /// Installs the warning configuration from the external config source.
    pub fn configure_warnings(&mut self, disabled: AHashSet<u32>, as_errors: AHashSet<u32>) {
        self.disabled_warnings = disabled;
        self.warnings_as_errors = as_errors;
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Emits a recoverable error and bumps the error count.
    ///
    /// Compilation proceeds so later diagnostics can still be reported, but
    /// the driver must refuse to write a `.pex` once any error was counted.
    pub fn error(&mut self, location: &SourceLocation, message: impl fmt::Display) {
        self.error_count += 1;
        self.writer.write_line(&format!("{location}: Error: {message}"));
    }

    /// Emits a numbered warning.
    ///
    /// Disabled numbers are a complete no-op (neither counter moves).
    /// Numbers promoted to errors are written with an `Error W<num>` prefix
    /// and bump both counters; everything else is written with a
    /// `Warning W<num>` prefix and bumps the warning count only.
    pub fn warning(&mut self, location: &SourceLocation, warning: &Warning) {
        let number = warning.number();
        if self.disabled_warnings.contains(&number) {
            return;
        }
        self.warning_count += 1;
        if self.warnings_as_errors.contains(&number) {
            self.error_count += 1;
            self.writer
                .write_line(&format!("{location}: Error W{number}: {warning}"));
        } else {
            self.writer
                .write_line(&format!("{location}: Warning W{number}: {warning}"));
        }
    }

    /// Reports an unrecoverable failure at a source location.
    ///
    /// Writes the diagnostic line and returns the [`Fatal`] for the caller
    /// to propagate with `?`.
    #[must_use]
    pub fn fatal(&mut self, location: &SourceLocation, message: impl Into<String>) -> Fatal {
        let fatal = Fatal {
            location: Some(location.clone()),
            message: message.into(),
        };
        self.writer.write_line(&fatal.to_string());
        fatal
    }

    /// Reports a failure of the compiler's own logic, where no source
    /// location is available. Always a bug in the compiler itself.
    #[must_use]
    pub fn logical_fatal(&mut self, message: impl Into<String>) -> Fatal {
        let fatal = Fatal {
            location: None,
            message: message.into(),
        };
        self.writer.write_line(&fatal.to_string());
        fatal
    }

    /// Returns the process exit status the driver should terminate with:
    /// failure if any error was recorded, success otherwise.
    #[must_use]
    pub fn exit_if_errors(&self) -> ExitCode {
        if self.error_count > 0 {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}
