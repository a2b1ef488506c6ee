//! ActionResult type definition

use serde::{Deserialize, Serialize};

/// Result code recorded when a step terminates abnormally (panics).
pub const INTERNAL_ERROR: i32 = 4;

/// Outcome value carried by every task: a numeric code plus message.
///
/// Code 0 means success and is the initial value. Plugins set non-zero
/// codes through [`StepContext::fail`](crate::action::StepContext::fail).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    code: i32,
    message: String,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: String::new(),
        }
    }

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn with_code(code: i32) -> Self {
        Self::new(code, String::new())
    }

    /// Abnormal-termination result (see [`INTERNAL_ERROR`]).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for ActionResult {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_result_is_success() {
        let result = ActionResult::default();
        assert!(result.is_ok());
        assert_eq!(result.code(), 0);
        assert!(result.message().is_empty());
    }

    #[test]
    fn test_nonzero_code_is_failure() {
        assert!(!ActionResult::with_code(1).is_ok());
        assert!(!ActionResult::internal("step panicked").is_ok());
        assert_eq!(ActionResult::internal("step panicked").code(), INTERNAL_ERROR);
    }
}
