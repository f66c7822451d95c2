//! Per-run state
//!
//! Holds the run suffix, every value extracted so far, and the ordered log of
//! step outcomes. One context per run; it is never shared.

use crate::fixture::ActorIdentity;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;

/// How a step ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Pass,
    Skipped { missing: Vec<String> },
    BusinessFailure { code: i64, message: String },
    TransportFailure { cause: String },
    AssertionFailure { expected: String, actual: String },
}

impl StepOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, StepOutcome::Pass)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_pass() && !self.is_skipped()
    }
}

/// A step outcome as it appears in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub scenario: String,
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct RunContext {
    suffix: String,
    outputs: HashMap<String, Value>,
    records: Vec<StepRecord>,
    aborted: bool,
}

impl RunContext {
    /// Seeded with `suffix`
    pub fn new(suffix: &str) -> Self {
        let mut outputs = HashMap::new();
        outputs.insert("suffix".to_string(), json!(suffix));
        Self {
            suffix: suffix.to_string(),
            outputs,
            records: Vec::new(),
            aborted: false,
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Expose `<role>.username`, `<role>.email` and `<role>.password`
    pub fn seed_identity(&mut self, identity: &ActorIdentity) {
        let role = identity.role;
        self.insert(&format!("{}.username", role), json!(identity.username));
        self.insert(&format!("{}.email", role), json!(identity.email));
        self.insert(&format!("{}.password", role), json!(identity.password));
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.outputs.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    pub fn outputs(&self) -> &HashMap<String, Value> {
        &self.outputs
    }

    /// Names from `inputs` that have no value yet
    pub fn missing(&self, inputs: &[String]) -> Vec<String> {
        inputs
            .iter()
            .filter(|name| !self.outputs.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn record(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }
}
