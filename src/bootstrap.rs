//! Side-channel privilege elevation
//!
//! The service has no endpoint that creates the first administrator, so the
//! admin identity of a run is registered as an ordinary user and then
//! promoted directly in the data store. This is the only path that bypasses
//! the API:
//! 1. Point the user's `user_roles` row at the target role, looked up by code
//! 2. Read back the assignment and fail unless it is present
//!
//! The shipped elevator drives the `mysql` command-line client. The password
//! travels in `MYSQL_PWD`, never on the command line.

use crate::config::BootstrapCredentials;
use crate::fixture::Role;
use std::process::Command;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Refusing to elevate '{username}': usernames may only contain [A-Za-z0-9_.@-]")]
    UnsafeUsername { username: String },

    #[error("Failed to execute {program}: {source}")]
    Exec {
        program: String,
        source: std::io::Error,
    },

    #[error("Data store command failed: {message}")]
    CommandFailed { message: String },

    #[error("User '{username}' does not hold role {role} after elevation")]
    NotElevated { username: String, role: String },
}

/// Grants a role to a user outside the API
pub trait PrivilegeElevator {
    fn elevate(&self, username: &str, role: Role) -> Result<(), BootstrapError>;
}

/// Elevates through the `mysql` command-line client
pub struct MysqlCliElevator {
    credentials: BootstrapCredentials,
}

impl MysqlCliElevator {
    pub fn new(credentials: BootstrapCredentials) -> Self {
        Self { credentials }
    }

    fn command(&self, sql: &str) -> Command {
        let creds = &self.credentials;
        let mut command = Command::new(&creds.program);
        command
            .args(["-h", &creds.host])
            .args(["-P", &creds.port.to_string()])
            .args(["-u", &creds.user])
            // batch mode, no column names: the last line is the verification count
            .args(["-N", "-B"])
            .arg(&creds.database)
            .args(["-e", sql]);
        if let Some(password) = &creds.password {
            command.env("MYSQL_PWD", password);
        }
        command
    }
}

impl PrivilegeElevator for MysqlCliElevator {
    fn elevate(&self, username: &str, role: Role) -> Result<(), BootstrapError> {
        let sql = elevation_sql(username, role)?;
        warn!(
            %username,
            role = role.code(),
            host = %self.credentials.host,
            database = %self.credentials.database,
            "elevating user through the data store side channel"
        );

        let output = self
            .command(&sql)
            .output()
            .map_err(|source| BootstrapError::Exec {
                program: self.credentials.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BootstrapError::CommandFailed {
                message: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if parse_assignment_count(&stdout) < 1 {
            return Err(BootstrapError::NotElevated {
                username: username.to_string(),
                role: role.code().to_string(),
            });
        }
        Ok(())
    }
}

/// Build the update-and-verify statement for one user
fn elevation_sql(username: &str, role: Role) -> Result<String, BootstrapError> {
    if !is_safe_username(username) {
        return Err(BootstrapError::UnsafeUsername {
            username: username.to_string(),
        });
    }
    let code = role.code();
    Ok(format!(
        "UPDATE user_roles SET role_id = (SELECT id FROM roles WHERE code='{code}') \
         WHERE user_id = (SELECT id FROM users WHERE username='{username}'); \
         SELECT COUNT(*) FROM user_roles ur \
         JOIN users u ON u.id = ur.user_id \
         JOIN roles r ON r.id = ur.role_id \
         WHERE u.username='{username}' AND r.code='{code}';"
    ))
}

fn is_safe_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'))
}

/// Read the verification count from the last non-empty output line
fn parse_assignment_count(stdout: &str) -> u64 {
    stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.trim().parse().ok())
        .unwrap_or(0)
}
