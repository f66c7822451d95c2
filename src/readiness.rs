//! Wait for the service to accept connections before a run

use crate::http::{HttpRequest, Transport};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Readiness {
    Ready { attempts: u32 },
    TimedOut { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Poll `probe_path` until the service answers or attempts run out
///
/// Any HTTP response counts as ready, 404 included: the probe endpoint may not
/// exist, but an answer proves the server is listening. Transport errors are
/// retried after `interval`. Timing out is not an error; the caller proceeds
/// and lets the first real step report the failure.
pub fn wait_until_ready(
    transport: &dyn Transport,
    probe_path: &str,
    max_attempts: u32,
    interval: Duration,
) -> Readiness {
    let max_attempts = max_attempts.max(1);
    let probe = HttpRequest::get(probe_path);

    for attempt in 1..=max_attempts {
        match transport.send(&probe) {
            Ok(response) => {
                info!(attempt, status = response.status, "service is accepting connections");
                return Readiness::Ready { attempts: attempt };
            }
            Err(e) => {
                debug!(attempt, max_attempts, error = %e, "service not ready yet");
                if attempt < max_attempts {
                    std::thread::sleep(interval);
                }
            }
        }
    }

    warn!(max_attempts, "service did not become ready; proceeding anyway");
    Readiness::TimedOut {
        attempts: max_attempts,
    }
}
