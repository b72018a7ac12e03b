//! DAG Planner: turns a Pipeline Definition's ordered step list into a
//! deterministic execution plan, a sequence of waves.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::core::pipeline::PipelineDefinition;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("step {step} depends on unknown step {depends_on}")]
    UnknownDependency { step: String, depends_on: String },
    #[error("dependency cycle detected involving step {0}")]
    Cycle(String),
}

/// A set of step names whose dependencies are all satisfied by steps in
/// earlier waves. Order within a wave is irrelevant; order between waves is
/// strict.
pub type Wave = Vec<String>;

/// A topologically valid sequence of waves for one Pipeline Definition.
/// Planning is deterministic: the same definition always produces the same
/// plan (same waves, same contents).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub waves: Vec<Wave>,
}

impl Plan {
    pub fn wave_of(&self, step_name: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.iter().any(|s| s == step_name))
    }
}

/// Resolves each step's effective dependency set, applying the
/// omitted-vs-explicit-empty `dependsOn` rule, then runs Kahn's algorithm to
/// produce waves.
pub fn plan(definition: &PipelineDefinition) -> Result<Plan, PlanError> {
    let names: Vec<String> = definition.steps.iter().map(|s| s.name.clone()).collect();

    let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
    for (index, step) in definition.steps.iter().enumerate() {
        let deps = match &step.depends_on {
            // Omitted: depends on all steps declared before it.
            None => names[..index].to_vec(),
            // Explicit `[]`: no dependencies at all.
            Some(deps) => deps.clone(),
        };
        for dep in &deps {
            if !names.contains(dep) {
                return Err(PlanError::UnknownDependency {
                    step: step.name.clone(),
                    depends_on: dep.clone(),
                });
            }
        }
        dependencies.insert(step.name.clone(), deps);
    }

    let mut in_degree: HashMap<&str, usize> = names.iter().map(|n| (n.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = names.iter().map(|n| (n.as_str(), Vec::new())).collect();
    for name in &names {
        let deps = &dependencies[name];
        *in_degree.get_mut(name.as_str()).unwrap() = deps.len();
        for dep in deps {
            dependents.get_mut(dep.as_str()).unwrap().push(name.as_str());
        }
    }

    let mut waves = Vec::new();
    let mut resolved: HashSet<String> = HashSet::new();
    let mut remaining: HashSet<String> = names.iter().cloned().collect();

    while !remaining.is_empty() {
        let mut ready: Vec<String> = remaining
            .iter()
            .filter(|name| in_degree[name.as_str()] == 0)
            .cloned()
            .collect();
        if ready.is_empty() {
            // Every remaining step has an unsatisfied dependency among the
            // remaining set: a cycle (defensively checked; unreachable
            // under the forward-reference restriction alone).
            let mut offenders: Vec<&String> = remaining.iter().collect();
            offenders.sort();
            return Err(PlanError::Cycle(offenders[0].clone()));
        }
        ready.sort();

        for name in &ready {
            remaining.remove(name);
            resolved.insert(name.clone());
            for dependent in &dependents[name.as_str()] {
                *in_degree.get_mut(dependent).unwrap() -= 1;
            }
        }
        waves.push(ready);
    }

    Ok(Plan { waves })
}
