//! Per-actor sessions
//!
//! A [`Session`] is the bearer credential issued to one actor. The
//! [`SessionManager`] keeps at most one session per role for the lifetime of a
//! run; nothing is written to disk.

use crate::fixture::{ActorIdentity, Role};
use crate::http::{HttpRequest, HttpResponse, SUCCESS_CODE, Transport, TransportError};
use serde_json::Value;
use std::collections::HashMap;
use std::time::SystemTime;
use thiserror::Error;
use tracing::info;

const LOGIN_PATH: &str = "/auth/login";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Login rejected (HTTP {status}, code {code}): {message}")]
    Rejected {
        status: u16,
        code: i64,
        message: String,
        body: String,
    },

    #[error("Malformed login response (HTTP {status}): {body}")]
    MalformedEnvelope { status: u16, body: String },
}

/// An authenticated actor
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: ActorIdentity,
    token: String,
    pub issued_at: SystemTime,
}

impl Session {
    pub fn new(identity: ActorIdentity, token: impl Into<String>) -> Self {
        Self {
            identity,
            token: token.into(),
            issued_at: SystemTime::now(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send a request as this actor
    ///
    /// The bearer credential is always attached. A 401 comes back like any
    /// other response; it is never retried.
    pub fn authorized_request(
        &self,
        transport: &dyn Transport,
        request: &HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let request = request
            .clone()
            .with_header("Authorization", &format!("Bearer {}", self.token));
        transport.send(&request)
    }
}

/// Perform the login handshake for one identity
pub fn login(transport: &dyn Transport, identity: &ActorIdentity) -> Result<Session, AuthError> {
    let request = HttpRequest::post_json(LOGIN_PATH, identity.login_payload());
    let response = transport.send(&request)?;
    let token = extract_token(&response)?;
    Ok(Session::new(identity.clone(), token))
}

fn extract_token(response: &HttpResponse) -> Result<String, AuthError> {
    let malformed = || AuthError::MalformedEnvelope {
        status: response.status,
        body: response.body.clone(),
    };

    let envelope = response.envelope().ok_or_else(malformed)?;

    if !response.is_success_status() || envelope.code != SUCCESS_CODE {
        let code = if envelope.code == SUCCESS_CODE {
            i64::from(response.status)
        } else {
            envelope.code
        };
        return Err(AuthError::Rejected {
            status: response.status,
            code,
            message: envelope.message,
            body: response.body.clone(),
        });
    }

    envelope
        .data()
        .and_then(|data| data.get("accessToken"))
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(malformed)
}

/// Sessions for the actors of one run, keyed by role
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<Role, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `identity` in and keep the session, replacing any earlier one for
    /// the same role
    pub fn login(
        &mut self,
        transport: &dyn Transport,
        identity: &ActorIdentity,
    ) -> Result<&Session, AuthError> {
        let session = login(transport, identity)?;
        info!(role = %identity.role, username = %identity.username, "logged in");
        self.sessions.insert(identity.role, session);
        Ok(&self.sessions[&identity.role])
    }

    pub fn get(&self, role: Role) -> Option<&Session> {
        self.sessions.get(&role)
    }

    pub fn has(&self, role: Role) -> bool {
        self.sessions.contains_key(&role)
    }
}
