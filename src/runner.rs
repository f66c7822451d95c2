//! Scenario execution
//!
//! Steps run strictly in declaration order; the author is responsible for
//! declaring them topologically. A step runs only when every input it depends
//! on is present, otherwise it is recorded as skipped. A failure never
//! escapes a step: it is classified, recorded, and the run moves on. The one
//! exception is a failed admin bootstrap, which aborts the rest of the run.

use crate::bootstrap::PrivilegeElevator;
use crate::context::{RunContext, StepOutcome, StepRecord};
use crate::fixture::{ActorIdentity, FixtureGenerator, Role};
use crate::http::{HttpRequest, HttpResponse, SUCCESS_CODE, Transport, TransportError};
use crate::scenario::{self, Expectation, Scenario, ScenarioStep, StepAction};
use crate::session::{AuthError, SessionManager};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{error, info, warn};

const REGISTER_PATH: &str = "/auth/register";

/// Response after transport and envelope checks
#[derive(Debug)]
enum Classified {
    /// 2xx with the success code; carries the decoded envelope
    Success(Value),
    Business {
        status: u16,
        code: i64,
        message: String,
    },
    Transport(String),
}

fn classify(result: Result<HttpResponse, TransportError>) -> Classified {
    let response = match result {
        Ok(response) => response,
        Err(e) => return Classified::Transport(e.to_string()),
    };

    let Some(envelope) = response.envelope() else {
        return Classified::Transport(format!(
            "malformed response envelope (HTTP {})",
            response.status
        ));
    };

    if response.is_success_status() && envelope.code == SUCCESS_CODE {
        return Classified::Success(envelope.raw);
    }

    let code = if envelope.code == SUCCESS_CODE {
        i64::from(response.status)
    } else {
        envelope.code
    };
    Classified::Business {
        status: response.status,
        code,
        message: envelope.message,
    }
}

fn classify_login(result: Result<(), AuthError>) -> Classified {
    match result {
        // nothing to assert on or extract from a login
        Ok(()) => Classified::Success(Value::Null),
        Err(AuthError::Transport(e)) => Classified::Transport(e.to_string()),
        Err(AuthError::Rejected {
            status,
            code,
            message,
            ..
        }) => Classified::Business {
            status,
            code,
            message,
        },
        Err(AuthError::MalformedEnvelope { status, .. }) => {
            Classified::Transport(format!("malformed response envelope (HTTP {})", status))
        }
    }
}

/// Drives scenarios against one service
pub struct Runner<'a> {
    transport: &'a dyn Transport,
    elevator: &'a dyn PrivilegeElevator,
}

impl<'a> Runner<'a> {
    pub fn new(transport: &'a dyn Transport, elevator: &'a dyn PrivilegeElevator) -> Self {
        Self {
            transport,
            elevator,
        }
    }

    /// Execute one scenario as a fresh run identified by `suffix`
    pub fn run(&self, scenario: &Scenario, suffix: &str) -> Vec<StepRecord> {
        info!(scenario = scenario.name, %suffix, "starting run");
        let mut run = Run::new(self, scenario.name, suffix);
        for step in &scenario.steps {
            run.step(step);
        }
        let records = run.ctx.into_records();

        let passed = records.iter().filter(|r| r.outcome.is_pass()).count();
        info!(
            scenario = scenario.name,
            passed,
            total = records.len(),
            "run finished"
        );
        records
    }
}

/// Mutable state of a single run
struct Run<'r, 'a> {
    runner: &'r Runner<'a>,
    scenario: &'static str,
    identities: HashMap<Role, ActorIdentity>,
    sessions: SessionManager,
    ctx: RunContext,
    bootstrapped: bool,
}

impl<'r, 'a> Run<'r, 'a> {
    fn new(runner: &'r Runner<'a>, scenario: &'static str, suffix: &str) -> Self {
        let mut fixtures = FixtureGenerator::new(suffix);
        let mut ctx = RunContext::new(suffix);
        let mut identities = HashMap::new();
        for role in Role::ALL {
            let identity = fixtures.new_identity(role);
            ctx.seed_identity(&identity);
            identities.insert(role, identity);
        }

        Self {
            runner,
            scenario,
            identities,
            sessions: SessionManager::new(),
            ctx,
            bootstrapped: false,
        }
    }

    fn step(&mut self, step: &ScenarioStep) {
        let (outcome, note) = if self.ctx.is_aborted() {
            (
                StepOutcome::Skipped {
                    missing: vec![scenario::passed("bootstrap_admin")],
                },
                Some("run aborted after admin bootstrap failure".to_string()),
            )
        } else {
            let missing = self.ctx.missing(&step.effective_inputs());
            if missing.is_empty() {
                self.execute(step)
            } else {
                (StepOutcome::Skipped { missing }, None)
            }
        };

        match &outcome {
            StepOutcome::Pass => {
                info!(scenario = self.scenario, step = %step.name, "pass");
                self.ctx.insert(&scenario::passed(&step.name), json!(true));
            }
            StepOutcome::Skipped { missing } => {
                warn!(scenario = self.scenario, step = %step.name, ?missing, "skipped")
            }
            failure => warn!(scenario = self.scenario, step = %step.name, ?failure, "failed"),
        }

        self.ctx.record(StepRecord {
            scenario: self.scenario.to_string(),
            step: step.name.clone(),
            outcome,
            note,
        });
    }

    fn execute(&mut self, step: &ScenarioStep) -> (StepOutcome, Option<String>) {
        let transport = self.runner.transport;

        let classified = match &step.action {
            StepAction::Register(role) => {
                let identity = &self.identities[role];
                let request = HttpRequest::post_json(REGISTER_PATH, identity.registration_payload());
                classify(transport.send(&request))
            }
            StepAction::BootstrapAdmin => return self.bootstrap_admin(),
            StepAction::Login(role) => {
                let identity = &self.identities[role];
                let result = self.sessions.login(transport, identity).map(|_| ());
                if result.is_ok() {
                    self.ctx.insert(&scenario::session_of(*role), json!(true));
                }
                classify_login(result)
            }
            StepAction::Call { actor, request } => {
                let rendered = match request.render(self.ctx.outputs()) {
                    Ok(rendered) => rendered,
                    Err(missing) => {
                        return (
                            StepOutcome::Skipped {
                                missing: vec![missing],
                            },
                            None,
                        );
                    }
                };
                let Some(session) = self.sessions.get(*actor) else {
                    return (
                        StepOutcome::Skipped {
                            missing: vec![scenario::session_of(*actor)],
                        },
                        None,
                    );
                };
                classify(session.authorized_request(transport, &rendered))
            }
        };

        self.conclude(step, classified)
    }

    fn bootstrap_admin(&mut self) -> (StepOutcome, Option<String>) {
        if self.bootstrapped {
            return (
                StepOutcome::AssertionFailure {
                    expected: "a single admin bootstrap per run".to_string(),
                    actual: "a second bootstrap step".to_string(),
                },
                None,
            );
        }

        let admin = &self.identities[&Role::Admin];
        match self.runner.elevator.elevate(&admin.username, Role::Admin) {
            Ok(()) => {
                self.bootstrapped = true;
                (
                    StepOutcome::Pass,
                    Some(format!("{} elevated via side channel", admin.username)),
                )
            }
            Err(e) => {
                error!(scenario = self.scenario, error = %e, "admin bootstrap failed; aborting run");
                self.ctx.abort();
                (
                    StepOutcome::TransportFailure {
                        cause: format!("admin bootstrap failed: {}", e),
                    },
                    None,
                )
            }
        }
    }

    /// Judge a classified response against the step's expectation
    fn conclude(
        &mut self,
        step: &ScenarioStep,
        classified: Classified,
    ) -> (StepOutcome, Option<String>) {
        match (&step.expect, classified) {
            (_, Classified::Transport(cause)) => (StepOutcome::TransportFailure { cause }, None),

            (Expectation::Accepted, Classified::Success(_)) => (StepOutcome::Pass, None),
            (Expectation::Accepted, Classified::Business { code, message, .. }) => (
                StepOutcome::Pass,
                Some(format!("accepted business failure {}: {}", code, message)),
            ),

            (Expectation::Success, Classified::Business { code, message, .. }) => {
                (StepOutcome::BusinessFailure { code, message }, None)
            }
            (Expectation::Success, Classified::Success(body)) => (self.verify(step, &body), None),

            (Expectation::Failure(failure), Classified::Success(_)) => (
                StepOutcome::AssertionFailure {
                    expected: failure.describe(self.ctx.outputs()),
                    actual: "success".to_string(),
                },
                None,
            ),
            (
                Expectation::Failure(failure),
                Classified::Business {
                    status,
                    code,
                    message,
                },
            ) => {
                if failure.matches(status, code, &message, self.ctx.outputs()) {
                    self.ctx
                        .insert(&scenario::failure_code(&step.name), json!(code));
                    (
                        StepOutcome::Pass,
                        Some(format!("expected business failure {}: {}", code, message)),
                    )
                } else {
                    (
                        StepOutcome::AssertionFailure {
                            expected: failure.describe(self.ctx.outputs()),
                            actual: format!("HTTP {}, code {}: {}", status, code, message),
                        },
                        None,
                    )
                }
            }
        }
    }

    /// Run assertions, then extraction; outputs are stored only if all succeed
    fn verify(&mut self, step: &ScenarioStep, body: &Value) -> StepOutcome {
        for assertion in &step.assertions {
            if let Err(mismatch) = assertion.check(body, self.ctx.outputs()) {
                return StepOutcome::AssertionFailure {
                    expected: mismatch.expected,
                    actual: mismatch.actual,
                };
            }
        }

        let mut extracted = Vec::with_capacity(step.extract.len());
        for extraction in &step.extract {
            match extraction.apply(body) {
                Ok(value) => extracted.push((extraction.output.as_str(), value)),
                Err(mismatch) => {
                    return StepOutcome::AssertionFailure {
                        expected: mismatch.expected,
                        actual: mismatch.actual,
                    };
                }
            }
        }
        for (name, value) in extracted {
            self.ctx.insert(name, value);
        }
        StepOutcome::Pass
    }
}
