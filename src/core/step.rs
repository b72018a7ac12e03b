//! `StepDefinition`: the in-memory, code-defined shape of one step of a
//! Pipeline Definition.

use std::sync::Arc;

use super::handler::StepHandler;

/// One step of a Pipeline Definition, as registered by handler code.
#[derive(Clone)]
pub struct StepDefinition {
    pub name: String,
    pub handler: Arc<dyn StepHandler>,
    /// `None` means "omitted" (depends on every step declared before it);
    /// `Some(vec![])` means "explicitly no dependencies" — the distinction
    /// is normative, not cosmetic (see `crate::planner`).
    pub depends_on: Option<Vec<String>>,
    /// Defaults to 0 (no retries).
    pub max_retries: u32,
    /// Defaults to unbounded (`None`).
    pub timeout_ms: Option<u64>,
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("max_retries", &self.max_retries)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl StepDefinition {
    pub fn new(name: impl Into<String>, handler: Arc<dyn StepHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
            depends_on: None,
            max_retries: 0,
            timeout_ms: None,
        }
    }

    pub fn depends_on(mut self, deps: Vec<String>) -> Self {
        self.depends_on = Some(deps);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}
