use serde_json::Value;

use upkeep_core::action::{Action, ActionBuildError, ActionContext, ActionFactory};
use upkeep_core::types::TaskDescription;

use crate::builtin::build_builtin_action;

/// Factory over the built-in actions.
pub struct DefaultActionFactory;

impl DefaultActionFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultActionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionFactory for DefaultActionFactory {
    fn build(
        &self,
        name: &str,
        description: &TaskDescription,
        _properties: &Value,
        _ctx: &ActionContext,
    ) -> Result<Box<dyn Action>, ActionBuildError> {
        match build_builtin_action(name, description) {
            Some(action) => action,
            None => Err(ActionBuildError::UnknownName(name.to_string())),
        }
    }
}
