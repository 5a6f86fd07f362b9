//! Engine-imposed numeric caps and the checks that report overruns.
//!
//! The game engine's VM refuses or misbehaves on scripts that exceed these
//! counts. Exceeding a cap is a warning, not an error (the warning may be
//! promoted by configuration). A cap of zero disables the check entirely.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::{
    diagnostics::{Diagnostics, Warning},
    location::SourceLocation,
};

/// The measurable quantities the engine caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum LimitKind {
    ArrayLength,
    PexFileUserFlagCount,
    PexFunctionParameterCount,
    PexObjectEmptyStateFunctionCount,
    PexObjectInitialValueCount,
    PexObjectNamedStateCount,
    PexObjectPropertyCount,
    PexObjectStaticFunctionCount,
    PexObjectVariableCount,
    PexStateFunctionCount,
}

/// Per-kind caps, one nonnegative integer each; zero means unlimited.
///
/// The defaults are the target engine's published limits. Serde-enabled so a
/// driver can override individual caps from its configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimitCaps {
    pub array_length: usize,
    pub pex_file_user_flag_count: usize,
    pub pex_function_parameter_count: usize,
    pub pex_object_empty_state_function_count: usize,
    pub pex_object_initial_value_count: usize,
    pub pex_object_named_state_count: usize,
    pub pex_object_property_count: usize,
    pub pex_object_static_function_count: usize,
    pub pex_object_variable_count: usize,
    pub pex_state_function_count: usize,
}

impl Default for EngineLimitCaps {
    fn default() -> Self {
        Self {
            array_length: 128,
            pex_file_user_flag_count: 32,
            pex_function_parameter_count: 511,
            pex_object_empty_state_function_count: 2047,
            pex_object_initial_value_count: 1023,
            pex_object_named_state_count: 127,
            pex_object_property_count: 1023,
            pex_object_static_function_count: 511,
            pex_object_variable_count: 1023,
            pex_state_function_count: 511,
        }
    }
}

impl EngineLimitCaps {
    /// Caps with every check disabled.
    pub fn unlimited() -> Self {
        Self {
            array_length: 0,
            pex_file_user_flag_count: 0,
            pex_function_parameter_count: 0,
            pex_object_empty_state_function_count: 0,
            pex_object_initial_value_count: 0,
            pex_object_named_state_count: 0,
            pex_object_property_count: 0,
            pex_object_static_function_count: 0,
            pex_object_variable_count: 0,
            pex_state_function_count: 0,
        }
    }

    fn cap(&self, kind: LimitKind) -> usize {
        match kind {
            LimitKind::ArrayLength => self.array_length,
            LimitKind::PexFileUserFlagCount => self.pex_file_user_flag_count,
            LimitKind::PexFunctionParameterCount => self.pex_function_parameter_count,
            LimitKind::PexObjectEmptyStateFunctionCount => self.pex_object_empty_state_function_count,
            LimitKind::PexObjectInitialValueCount => self.pex_object_initial_value_count,
            LimitKind::PexObjectNamedStateCount => self.pex_object_named_state_count,
            LimitKind::PexObjectPropertyCount => self.pex_object_property_count,
            LimitKind::PexObjectStaticFunctionCount => self.pex_object_static_function_count,
            LimitKind::PexObjectVariableCount => self.pex_object_variable_count,
            LimitKind::PexStateFunctionCount => self.pex_state_function_count,
        }
    }

    /// Emits the warning mapped to `kind` if the measured count exceeds a
    /// nonzero cap.
    ///
    /// `context_name` supplies the function or state name for the kinds whose
    /// message template includes one; it is ignored for the rest.
    pub fn check_limit(
        &self,
        diags: &mut Diagnostics,
        location: &SourceLocation,
        kind: LimitKind,
        measured: usize,
        context_name: Option<&str>,
    ) {
        let max = self.cap(kind);
        if max == 0 || measured <= max {
            return;
        }
        let warning = match kind {
            LimitKind::ArrayLength => Warning::EngineLimitArrayLength { count: measured, max },
            LimitKind::PexFileUserFlagCount => {
                Warning::EngineLimitPexFileUserFlagCount { count: measured, max }
            }
            LimitKind::PexFunctionParameterCount => Warning::EngineLimitPexFunctionParameterCount {
                count: measured,
                function: context_name.unwrap_or_default().to_owned(),
                max,
            },
            LimitKind::PexObjectEmptyStateFunctionCount => {
                Warning::EngineLimitPexObjectEmptyStateFunctionCount { count: measured, max }
            }
            LimitKind::PexObjectInitialValueCount => {
                Warning::EngineLimitPexObjectInitialValueCount { count: measured, max }
            }
            LimitKind::PexObjectNamedStateCount => {
                Warning::EngineLimitPexObjectNamedStateCount { count: measured, max }
            }
            LimitKind::PexObjectPropertyCount => {
                Warning::EngineLimitPexObjectPropertyCount { count: measured, max }
            }
            LimitKind::PexObjectStaticFunctionCount => {
                Warning::EngineLimitPexObjectStaticFunctionCount { count: measured, max }
            }
            LimitKind::PexObjectVariableCount => {
                Warning::EngineLimitPexObjectVariableCount { count: measured, max }
            }
            LimitKind::PexStateFunctionCount => Warning::EngineLimitPexStateFunctionCount {
                count: measured,
                state: context_name.unwrap_or_default().to_owned(),
                max,
            },
        };
        diags.warning(location, &warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectDiagnostics;

    fn loc() -> SourceLocation {
        SourceLocation::new("Limits.psc", 1, 1)
    }

    #[test]
    fn test_zero_cap_disables_check() {
        let collector = CollectDiagnostics::new();
        let mut diags = Diagnostics::with_writer(Box::new(collector.clone()));
        let caps = EngineLimitCaps::unlimited();
        caps.check_limit(&mut diags, &loc(), LimitKind::PexObjectPropertyCount, 10_000, None);
        assert_eq!(diags.warning_count(), 0);
        assert!(collector.lines().is_empty());
    }

    #[test]
    fn test_overrun_emits_mapped_warning() {
        let collector = CollectDiagnostics::new();
        let mut diags = Diagnostics::with_writer(Box::new(collector.clone()));
        let caps = EngineLimitCaps {
            pex_object_property_count: 3,
            ..EngineLimitCaps::unlimited()
        };
        caps.check_limit(&mut diags, &loc(), LimitKind::PexObjectPropertyCount, 4, None);
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(
            collector.lines(),
            vec![
                "Limits.psc(1,1): Warning W2007: There are 4 properties in this object, \
                 but the engine limit is 3 properties."
                    .to_owned()
            ]
        );
    }

    #[test]
    fn test_at_cap_is_fine() {
        let mut diags = Diagnostics::with_writer(Box::new(CollectDiagnostics::new()));
        let caps = EngineLimitCaps {
            pex_state_function_count: 5,
            ..EngineLimitCaps::unlimited()
        };
        caps.check_limit(
            &mut diags,
            &loc(),
            LimitKind::PexStateFunctionCount,
            5,
            Some("Combat"),
        );
        assert_eq!(diags.warning_count(), 0);
    }
}
