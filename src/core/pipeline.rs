//! `PipelineDefinition`: the code behind a named Pipeline. Registered once
//! per process via [`crate::core::registry::Registry`].

use std::collections::HashSet;

use thiserror::Error;

use super::step::StepDefinition;

/// Raised at definition time, before any Run exists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("pipeline must have at least one step")]
    Empty,
    #[error("duplicate step name: {0}")]
    DuplicateStepName(String),
    #[error("step {step} depends on unknown step {depends_on}")]
    UnknownDependency { step: String, depends_on: String },
    #[error("step {step} depends on {depends_on}, which is declared later in the pipeline")]
    ForwardReference { step: String, depends_on: String },
    #[error("step {0} has timeoutMs = 0; omit timeoutMs for unbounded or set it > 0")]
    ZeroTimeout(String),
}

/// The code behind a named Pipeline: an ordered list of steps, each with a
/// handler and optional configuration.
#[derive(Clone)]
pub struct PipelineDefinition {
    pub name: String,
    pub description: Option<String>,
    pub schedule: Option<String>,
    pub steps: Vec<StepDefinition>,
}

impl std::fmt::Debug for PipelineDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schedule", &self.schedule)
            .field("steps", &self.steps)
            .finish()
    }
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<StepDefinition>) -> Result<Self, DefinitionError> {
        let def = Self {
            name: name.into(),
            description: None,
            schedule: None,
            steps,
        };
        def.validate()?;
        Ok(def)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Step names unique within the pipeline; every `dependsOn` entry names
    /// a step appearing earlier in the same pipeline; `timeoutMs` > 0 or
    /// unset.
    fn validate(&self) -> Result<(), DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty);
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.clone()) {
                return Err(DefinitionError::DuplicateStepName(step.name.clone()));
            }
            if let Some(timeout_ms) = step.timeout_ms {
                if timeout_ms == 0 {
                    return Err(DefinitionError::ZeroTimeout(step.name.clone()));
                }
            }
        }

        let mut declared = HashSet::new();
        for step in &self.steps {
            if let Some(deps) = &step.depends_on {
                for dep in deps {
                    if !declared.contains(dep) {
                        if self.steps.iter().any(|s| &s.name == dep) {
                            return Err(DefinitionError::ForwardReference {
                                step: step.name.clone(),
                                depends_on: dep.clone(),
                            });
                        }
                        return Err(DefinitionError::UnknownDependency {
                            step: step.name.clone(),
                            depends_on: dep.clone(),
                        });
                    }
                }
            }
            declared.insert(step.name.clone());
        }

        Ok(())
    }

    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }
}
