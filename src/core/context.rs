//! `StepContext`/`StepResult`: the typed boundary between the engine and
//! handlers. `data`/`error` are opaque JSON to the engine; it never
//! introspects them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Handed to every handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepContext {
    pub run_id: Uuid,
    pub pipeline_id: Uuid,
    /// Already-terminated steps of this run, keyed by step name.
    pub prev_results: HashMap<String, StepResult>,
    pub metadata: HashMap<String, String>,
}

/// Returned by every handler invocation. `data` is present iff `success`;
/// `error` is present iff `!success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
