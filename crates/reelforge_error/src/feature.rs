//! Feature-flag errors.

/// A provider family is switched off by an environment flag.
///
/// The message names the flag so the operator knows how to turn it on.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display(
    "{} is disabled. Start the server with {}=1 to enable it.",
    family,
    flag
)]
pub struct FeatureDisabledError {
    /// Environment flag that gates the family (e.g. `ENABLE_COMMAND_LLM`)
    pub flag: &'static str,
    /// Human-readable family name (e.g. "Command LLM")
    pub family: &'static str,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl FeatureDisabledError {
    /// Create a new FeatureDisabledError at the current location.
    #[track_caller]
    pub fn new(flag: &'static str, family: &'static str) -> Self {
        let location = std::panic::Location::caller();
        Self {
            flag,
            family,
            line: location.line(),
            file: location.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_flag() {
        let err = FeatureDisabledError::new("ENABLE_COMMAND_LLM", "Command LLM");
        let message = err.to_string();
        assert!(message.contains("ENABLE_COMMAND_LLM=1"));
        assert!(message.starts_with("Command LLM is disabled"));
    }
}
