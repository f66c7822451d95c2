//! Actor fixtures for a single run
//!
//! Every identity in a run is derived from one random suffix, so two runs
//! against the same backend never register the same username or email.

use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of the generated run suffix
const SUFFIX_LEN: usize = 6;

/// Password shared by every generated identity
pub const DEFAULT_PASSWORD: &str = "Password123!";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FixtureError {
    #[error("Invalid suffix '{0}'. Expected a non-empty ASCII alphanumeric string")]
    InvalidSuffix(String),
}

/// Roles known to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Teacher, Role::Student];

    /// Role code as stored in the `roles` table
    pub fn code(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
        }
    }

    fn slug(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Role::Admin => "Test Admin",
            Role::Teacher => "Test Teacher",
            Role::Student => "Test Student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            _ => Err(format!(
                "Unknown role '{}'. Supported: admin, teacher, student",
                s
            )),
        }
    }
}

/// A test-time identity with a role and login credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorIdentity {
    pub role: Role,
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// Extra registration fields, only populated for the admin identity
    pub school_id: Option<String>,
    pub department: Option<String>,
}

impl ActorIdentity {
    /// Body for `POST /auth/register`
    ///
    /// The admin identity registers without a role: the API cannot grant
    /// ADMIN, so the side channel elevates it afterwards.
    pub fn registration_payload(&self) -> Value {
        let mut payload = json!({
            "username": self.username,
            "password": self.password,
            "email": self.email,
            "fullName": self.display_name,
        });
        if self.role != Role::Admin {
            payload["role"] = json!(self.role.code());
        }
        if let Some(school_id) = &self.school_id {
            payload["schoolId"] = json!(school_id);
        }
        if let Some(department) = &self.department {
            payload["department"] = json!(department);
        }
        payload
    }

    pub fn login_payload(&self) -> Value {
        json!({
            "username": self.username,
            "password": self.password,
        })
    }
}

/// Build the identity for `(role, suffix, index)`
///
/// Index 0 yields `<role>_<suffix>`; later indices of the same role append
/// `_<index>`.
pub fn identity_for(role: Role, suffix: &str, index: usize) -> ActorIdentity {
    let username = if index == 0 {
        format!("{}_{}", role.slug(), suffix)
    } else {
        format!("{}_{}_{}", role.slug(), suffix, index)
    };
    let email = format!("{}@test.com", username);

    let (school_id, department) = match role {
        Role::Admin => (
            Some(format!("ADM{}", suffix.to_uppercase())),
            Some("IT".to_string()),
        ),
        _ => (None, None),
    };

    ActorIdentity {
        role,
        username,
        email,
        password: DEFAULT_PASSWORD.to_string(),
        display_name: role.display_name().to_string(),
        school_id,
        department,
    }
}

/// Generate a fresh lower-case alphanumeric run suffix
pub fn random_suffix() -> String {
    let rng = rand::rng();
    rng.sample_iter(Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Validate a caller-supplied suffix
pub fn validate_suffix(suffix: &str) -> Result<(), FixtureError> {
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(FixtureError::InvalidSuffix(suffix.to_string()));
    }
    Ok(())
}

/// Hands out identities for one run
#[derive(Debug)]
pub struct FixtureGenerator {
    suffix: String,
    issued: HashMap<Role, usize>,
}

impl FixtureGenerator {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            issued: HashMap::new(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn new_identity(&mut self, role: Role) -> ActorIdentity {
        let index = self.issued.entry(role).or_insert(0);
        let identity = identity_for(role, &self.suffix, *index);
        *index += 1;
        identity
    }
}
