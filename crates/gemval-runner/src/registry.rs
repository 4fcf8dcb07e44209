//! Explicit, ordered registry of checks.

use std::sync::Arc;
use std::time::Duration;

use gemval_core::GemvalError;

use crate::builtin::{BuiltinCheck, CommandCheck};
use crate::check::Check;

/// Checks run in registration order; names are unique.
#[derive(Default, Clone)]
pub struct CheckRegistry {
    checks: Vec<Arc<dyn Check>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every [`BuiltinCheck`], run through `python` where needed.
    pub fn builtin(python: &str, timeout: Duration) -> Self {
        let checks = BuiltinCheck::ALL
            .iter()
            .map(|check| Arc::new(CommandCheck::from_builtin(*check, python, timeout)) as Arc<dyn Check>)
            .collect();
        Self { checks }
    }

    /// Add `check`; a second check with the same name is rejected.
    pub fn register(&mut self, check: Arc<dyn Check>) -> Result<(), GemvalError> {
        if self.get(check.name()).is_some() {
            return Err(GemvalError::DuplicateCheck(check.name().to_string()));
        }
        self.checks.push(check);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, check: Arc<dyn Check>) -> Result<Self, GemvalError> {
        self.register(check)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Check>> {
        self.checks.iter().find(|check| check.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Check>> {
        self.checks.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedCheck;

    #[test]
    fn test_builtin_registry() {
        let registry = CheckRegistry::builtin("python3", Duration::from_secs(60));
        assert_eq!(registry.len(), BuiltinCheck::ALL.len());
        assert_eq!(registry.names()[0], "yamllint");
        assert!(registry.get("memote-score").is_some());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = CheckRegistry::new();
        registry
            .register(Arc::new(ScriptedCheck::passing("yamllint")))
            .unwrap();
        let err = registry
            .register(Arc::new(ScriptedCheck::failing("yamllint", "bad")))
            .unwrap_err();
        assert!(matches!(err, GemvalError::DuplicateCheck(name) if name == "yamllint"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registration_order_kept() {
        let registry = CheckRegistry::new()
            .with(Arc::new(ScriptedCheck::passing("b")))
            .and_then(|r| r.with(Arc::new(ScriptedCheck::passing("a"))))
            .unwrap();
        assert_eq!(registry.names(), vec!["b", "a"]);
    }
}
