//! Scenario definitions
//!
//! A scenario is an ordered list of steps. Steps name the values they need
//! from earlier steps instead of capturing variables, so a failed step
//! mechanically skips everything downstream of it.
//!
//! Request templates may reference run values with `{{name}}` placeholders in
//! the path, query values and body strings. A JSON string consisting of a
//! single placeholder is replaced by the referenced value with its JSON type
//! intact, so `"{{course_id}}"` renders as the number `42`.

use crate::fixture::Role;
use crate::http::{Body, HttpRequest, Method, Part};
use serde_json::Value;
use std::collections::HashMap;

/// Suffix appended to a step name for the marker stored when it passes
pub const PASSED_MARKER: &str = ".ok";

/// Marker stored when a negative step observes its expected failure
pub const FAILURE_CODE_MARKER: &str = ".failure_code";

/// Name of the run value recording that `step` passed
pub fn passed(step: &str) -> String {
    format!("{}{}", step, PASSED_MARKER)
}

/// Name of the run value holding the failure code a negative `step` observed
pub fn failure_code(step: &str) -> String {
    format!("{}{}", step, FAILURE_CODE_MARKER)
}

/// Name of the run value present while `role` holds a session
pub fn session_of(role: Role) -> String {
    format!("{}.session", role)
}

/// A named end-to-end workflow
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// `POST /auth/register` with the run's identity for the role
    Register(Role),
    /// Promote the run's admin identity through the data store side channel
    BootstrapAdmin,
    /// Log the run's identity for the role in and keep the session
    Login(Role),
    /// Send a request as the given actor
    Call { actor: Role, request: RequestTemplate },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioStep {
    pub name: String,
    pub inputs: Vec<String>,
    pub action: StepAction,
    pub expect: Expectation,
    pub assertions: Vec<Assertion>,
    pub extract: Vec<Extraction>,
}

impl ScenarioStep {
    fn new(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            action,
            expect: Expectation::Success,
            assertions: Vec::new(),
            extract: Vec::new(),
        }
    }

    pub fn register(role: Role) -> Self {
        Self::new(format!("register_{}", role), StepAction::Register(role))
    }

    pub fn bootstrap_admin() -> Self {
        Self::new("bootstrap_admin", StepAction::BootstrapAdmin)
    }

    pub fn login(role: Role) -> Self {
        Self::new(format!("login_{}", role), StepAction::Login(role))
    }

    pub fn call(name: &str, actor: Role, request: RequestTemplate) -> Self {
        Self::new(name, StepAction::Call { actor, request })
    }

    /// Require a run value before this step may execute
    pub fn needs(mut self, input: &str) -> Self {
        self.inputs.push(input.to_string());
        self
    }

    /// Require that an earlier step passed
    pub fn after(self, step: &str) -> Self {
        self.needs(&passed(step))
    }

    pub fn expect(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Store the value at `pointer` under `output` when this step passes
    pub fn extract(mut self, output: &str, pointer: &str) -> Self {
        self.extract.push(Extraction {
            output: output.to_string(),
            pointer: pointer.to_string(),
        });
        self
    }

    /// Every run value this step depends on, in first-mention order
    ///
    /// Declared inputs, template placeholders, values referenced by the
    /// expectation and assertions, and the acting role's session.
    pub fn effective_inputs(&self) -> Vec<String> {
        let mut inputs: Vec<String> = self.inputs.clone();

        if let StepAction::Call { actor, request } = &self.action {
            inputs.push(session_of(*actor));
            inputs.extend(request.placeholders());
        }
        if let Expectation::Failure(failure) = &self.expect
            && let CodeMatch::SameAs(input) = &failure.code
        {
            inputs.push(input.clone());
        }
        for assertion in &self.assertions {
            if let Some(input) = assertion.input() {
                inputs.push(input.to_string());
            }
        }

        let mut seen = std::collections::HashSet::new();
        inputs.retain(|name| seen.insert(name.clone()));
        inputs
    }
}

/// How a step's response is judged
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// 2xx with the success envelope code
    Success,
    /// A negative test: the service must refuse with a business error
    Failure(FailureExpectation),
    /// Any well-formed envelope, for best-effort steps
    Accepted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodeMatch {
    Any,
    Exactly(i64),
    /// Same code an earlier negative step recorded under this run value
    SameAs(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureExpectation {
    pub code: CodeMatch,
    pub message_contains: Option<String>,
    /// Whether a 5xx may satisfy the expectation
    pub allow_server_error: bool,
}

impl FailureExpectation {
    pub fn any() -> Self {
        Self {
            code: CodeMatch::Any,
            message_contains: None,
            allow_server_error: false,
        }
    }

    pub fn code(code: i64) -> Self {
        Self {
            code: CodeMatch::Exactly(code),
            ..Self::any()
        }
    }

    /// Expect the same failure code as the negative step `step`
    pub fn same_as(step: &str) -> Self {
        Self {
            code: CodeMatch::SameAs(failure_code(step)),
            ..Self::any()
        }
    }

    pub fn containing(mut self, needle: &str) -> Self {
        self.message_contains = Some(needle.to_string());
        self
    }

    /// Check an observed business failure
    pub fn matches(
        &self,
        status: u16,
        code: i64,
        message: &str,
        outputs: &HashMap<String, Value>,
    ) -> bool {
        if status >= 500 && !self.allow_server_error {
            return false;
        }
        let code_ok = match &self.code {
            CodeMatch::Any => true,
            CodeMatch::Exactly(expected) => code == *expected,
            CodeMatch::SameAs(input) => outputs.get(input).and_then(Value::as_i64) == Some(code),
        };
        let message_ok = self
            .message_contains
            .as_deref()
            .is_none_or(|needle| message.contains(needle));
        code_ok && message_ok
    }

    pub fn describe(&self, outputs: &HashMap<String, Value>) -> String {
        let mut text = match &self.code {
            CodeMatch::Any => "business failure".to_string(),
            CodeMatch::Exactly(code) => format!("business failure with code {}", code),
            CodeMatch::SameAs(input) => match outputs.get(input) {
                Some(code) => format!("business failure with code {} (as {})", code, input),
                None => format!("business failure with the code recorded as {}", input),
            },
        };
        if let Some(needle) = &self.message_contains {
            text.push_str(&format!(" mentioning '{}'", needle));
        }
        if !self.allow_server_error {
            text.push_str(" below HTTP 500");
        }
        text
    }
}

/// An explicit invariant checked against a successful response envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Assertion {
    Present(String),
    Equals(String, Value),
    EqualsInput { pointer: String, input: String },
    /// Numeric value at `pointer` must not exceed the run value `input`
    NotGreaterThan { pointer: String, input: String },
}

/// Expected and actual sides of a failed check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: String,
    pub actual: String,
}

impl Assertion {
    pub fn present(pointer: &str) -> Self {
        Assertion::Present(pointer.to_string())
    }

    pub fn equals(pointer: &str, value: Value) -> Self {
        Assertion::Equals(pointer.to_string(), value)
    }

    pub fn equals_input(pointer: &str, input: &str) -> Self {
        Assertion::EqualsInput {
            pointer: pointer.to_string(),
            input: input.to_string(),
        }
    }

    pub fn not_greater_than(pointer: &str, input: &str) -> Self {
        Assertion::NotGreaterThan {
            pointer: pointer.to_string(),
            input: input.to_string(),
        }
    }

    fn input(&self) -> Option<&str> {
        match self {
            Assertion::EqualsInput { input, .. } | Assertion::NotGreaterThan { input, .. } => {
                Some(input)
            }
            _ => None,
        }
    }

    pub fn check(&self, body: &Value, outputs: &HashMap<String, Value>) -> Result<(), Mismatch> {
        match self {
            Assertion::Present(pointer) => match lookup(body, pointer) {
                Some(_) => Ok(()),
                None => Err(Mismatch {
                    expected: format!("value at {}", pointer),
                    actual: "missing".to_string(),
                }),
            },
            Assertion::Equals(pointer, expected) => compare(body, pointer, expected),
            Assertion::EqualsInput { pointer, input } => {
                let expected = outputs.get(input).cloned().unwrap_or(Value::Null);
                compare(body, pointer, &expected)
            }
            Assertion::NotGreaterThan { pointer, input } => {
                let limit = outputs.get(input).and_then(Value::as_f64);
                let actual = lookup(body, pointer).and_then(Value::as_f64);
                match (actual, limit) {
                    (Some(actual), Some(limit)) if actual <= limit => Ok(()),
                    (actual, limit) => Err(Mismatch {
                        expected: format!(
                            "{} <= {} ({})",
                            pointer,
                            input,
                            limit.map_or("missing".to_string(), |v| v.to_string())
                        ),
                        actual: actual.map_or("missing".to_string(), |v| v.to_string()),
                    }),
                }
            }
        }
    }
}

fn compare(body: &Value, pointer: &str, expected: &Value) -> Result<(), Mismatch> {
    match lookup(body, pointer) {
        Some(actual) if actual == expected => Ok(()),
        actual => Err(Mismatch {
            expected: format!("{} == {}", pointer, expected),
            actual: actual.map_or("missing".to_string(), |v| v.to_string()),
        }),
    }
}

/// Non-null value at a JSON pointer
fn lookup<'a>(body: &'a Value, pointer: &str) -> Option<&'a Value> {
    body.pointer(pointer).filter(|v| !v.is_null())
}

/// Pulls a value out of a successful response for later steps
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub output: String,
    pub pointer: String,
}

impl Extraction {
    pub fn apply(&self, body: &Value) -> Result<Value, Mismatch> {
        lookup(body, &self.pointer).cloned().ok_or_else(|| Mismatch {
            expected: format!("{} at {}", self.output, self.pointer),
            actual: "missing".to_string(),
        })
    }
}

/// One part of a multipart template
#[derive(Debug, Clone, PartialEq)]
pub struct PartTemplate {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: PartContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartContent {
    Text(String),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyTemplate {
    Empty,
    Json(Value),
    Multipart(Vec<PartTemplate>),
}

/// An HTTP request with `{{name}}` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: BodyTemplate,
}

impl RequestTemplate {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: Vec::new(),
            body: BodyTemplate::Empty,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = BodyTemplate::Json(value);
        self
    }

    fn push_part(&mut self, part: PartTemplate) {
        match &mut self.body {
            BodyTemplate::Multipart(parts) => parts.push(part),
            _ => self.body = BodyTemplate::Multipart(vec![part]),
        }
    }

    /// Add a file part
    pub fn file(mut self, name: &str, filename: &str, content_type: &str, content: &str) -> Self {
        self.push_part(PartTemplate {
            name: name.to_string(),
            filename: Some(filename.to_string()),
            content_type: Some(content_type.to_string()),
            content: PartContent::Text(content.to_string()),
        });
        self
    }

    /// Add the `metadata` JSON part the content endpoints expect
    pub fn metadata(mut self, value: Value) -> Self {
        self.push_part(PartTemplate {
            name: "metadata".to_string(),
            filename: None,
            content_type: Some("application/json".to_string()),
            content: PartContent::Json(value),
        });
        self
    }

    /// Every placeholder name this template references
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = placeholder_names(&self.path);
        for (_, value) in &self.query {
            names.extend(placeholder_names(value));
        }
        match &self.body {
            BodyTemplate::Empty => {}
            BodyTemplate::Json(value) => collect_value_placeholders(value, &mut names),
            BodyTemplate::Multipart(parts) => {
                for part in parts {
                    match &part.content {
                        PartContent::Text(text) => names.extend(placeholder_names(text)),
                        PartContent::Json(value) => collect_value_placeholders(value, &mut names),
                    }
                }
            }
        }
        names
    }

    /// Substitute run values; `Err` carries the first missing name
    pub fn render(&self, outputs: &HashMap<String, Value>) -> Result<HttpRequest, String> {
        let mut request = HttpRequest::new(self.method, &render_text(&self.path, outputs)?);
        for (key, value) in &self.query {
            request
                .query
                .push((key.clone(), render_text(value, outputs)?));
        }
        request.body = match &self.body {
            BodyTemplate::Empty => Body::Empty,
            BodyTemplate::Json(value) => Body::Json(render_value(value, outputs)?),
            BodyTemplate::Multipart(parts) => {
                let mut rendered = Vec::with_capacity(parts.len());
                for part in parts {
                    let data = match &part.content {
                        PartContent::Text(text) => render_text(text, outputs)?.into_bytes(),
                        PartContent::Json(value) => {
                            render_value(value, outputs)?.to_string().into_bytes()
                        }
                    };
                    rendered.push(Part {
                        name: part.name.clone(),
                        filename: part.filename.clone(),
                        content_type: part.content_type.clone(),
                        data,
                    });
                }
                Body::Multipart(rendered)
            }
        };
        Ok(request)
    }
}

fn placeholder_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        names.push(after[..end].trim().to_string());
        rest = &after[end + 2..];
    }
    names
}

fn collect_value_placeholders(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::String(s) => names.extend(placeholder_names(s)),
        Value::Array(items) => items
            .iter()
            .for_each(|item| collect_value_placeholders(item, names)),
        Value::Object(map) => map
            .values()
            .for_each(|item| collect_value_placeholders(item, names)),
        _ => {}
    }
}

/// Text form of a run value inside a larger string
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_text(text: &str, outputs: &HashMap<String, Value>) -> Result<String, String> {
    let mut rendered = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after[..end].trim();
        let value = outputs.get(name).ok_or_else(|| name.to_string())?;
        rendered.push_str(&rest[..start]);
        rendered.push_str(&value_text(value));
        rest = &after[end + 2..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn render_value(value: &Value, outputs: &HashMap<String, Value>) -> Result<Value, String> {
    match value {
        Value::String(s) => {
            let names = placeholder_names(s);
            let whole = s.trim();
            if names.len() == 1 && whole.starts_with("{{") && whole.ends_with("}}") {
                return outputs
                    .get(&names[0])
                    .cloned()
                    .ok_or_else(|| names[0].clone());
            }
            Ok(Value::String(render_text(s, outputs)?))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(item, outputs))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                rendered.insert(key.clone(), render_value(item, outputs)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}
