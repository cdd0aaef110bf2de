//! Runtime configuration for the VM.

use std::env;

/// Environment variable enabling per-instruction execution tracing.
pub const TRACE_ENV: &str = "LOXVM_TRACE";
/// Environment variable enabling disassembly of compiled code.
pub const PRINT_CODE_ENV: &str = "LOXVM_PRINT_CODE";

/// Debug switches. Both are off by default and only affect logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmConfig {
    /// Log the stack and each instruction before it executes.
    pub trace_execution: bool,
    /// Log the disassembly of every compiled script.
    pub print_code: bool,
}

impl VmConfig {
    /// Read `LOXVM_TRACE` and `LOXVM_PRINT_CODE` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            trace_execution: lookup(TRACE_ENV).is_some_and(|v| is_enabled(&v)),
            print_code: lookup(PRINT_CODE_ENV).is_some_and(|v| is_enabled(&v)),
        }
    }

    pub fn with_trace_execution(mut self, enabled: bool) -> Self {
        self.trace_execution = enabled;
        self
    }

    pub fn with_print_code(mut self, enabled: bool) -> Self {
        self.print_code = enabled;
        self
    }
}

fn is_enabled(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_quiet() {
        let config = VmConfig::default();
        assert!(!config.trace_execution);
        assert!(!config.print_code);
    }

    #[test]
    fn test_lookup_values() {
        let config = VmConfig::from_lookup(|name| match name {
            TRACE_ENV => Some("1".to_string()),
            PRINT_CODE_ENV => Some("false".to_string()),
            _ => None,
        });
        assert!(config.trace_execution);
        assert!(!config.print_code);

        let config = VmConfig::from_lookup(|name| (name == PRINT_CODE_ENV).then(|| "yes".to_string()));
        assert!(!config.trace_execution);
        assert!(config.print_code);
    }

    #[test]
    fn test_empty_and_zero_disable() {
        assert!(!is_enabled(""));
        assert!(!is_enabled("0"));
        assert!(!is_enabled("FALSE"));
        assert!(is_enabled("on"));
    }
}
