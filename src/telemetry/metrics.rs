//! Prometheus metrics for HTTP traffic, authentication and access control.
//!
//! Recording goes through the `metrics` facade, so every `record_*` call is a
//! no-op until a recorder is installed by [`MetricsState::new`].

use std::sync::OnceLock;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const HTTP_LATENCY: &str = "http_request_duration_seconds";
const AUTH_ATTEMPTS: &str = "auth_attempts_total";
const AUTHZ_DECISIONS: &str = "authorization_decisions_total";
const PERMISSION_CHECKS: &str = "permission_checks_total";
const PERMISSION_CHECK_LATENCY: &str = "permission_check_duration_seconds";
const INVITE_TRANSITIONS: &str = "invite_transitions_total";

static RECORDER: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_histogram!(HTTP_LATENCY, Unit::Seconds, "Request latency by route template");
            describe_counter!(AUTH_ATTEMPTS, "Login and token verification attempts");
            describe_counter!(AUTHZ_DECISIONS, "Policy decisions by resource and outcome");
            describe_counter!(PERMISSION_CHECKS, "Permission lookups, cached or not");
            describe_histogram!(
                PERMISSION_CHECK_LATENCY,
                Unit::Seconds,
                "Time spent resolving a permission lookup"
            );
            describe_counter!(INVITE_TRANSITIONS, "Invite lifecycle transitions");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed, metrics disabled");
            None
        }
    }
}

/// Handle to the process-wide Prometheus recorder, if metrics are on.
#[derive(Clone)]
pub struct MetricsState {
    handle: Option<PrometheusHandle>,
}

impl MetricsState {
    /// Installs the recorder on first use. Later calls share it.
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }
        Self {
            handle: RECORDER.get_or_init(install_recorder).clone(),
        }
    }

    pub fn disabled() -> Self {
        Self { handle: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }

    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    match state.render() {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    InvalidCredentials,
    InvalidToken,
}

impl AuthOutcome {
    fn label(self) -> &'static str {
        match self {
            AuthOutcome::Success => "success",
            AuthOutcome::InvalidCredentials => "invalid_credentials",
            AuthOutcome::InvalidToken => "invalid_token",
        }
    }
}

pub fn record_auth_attempt(action: &'static str, outcome: AuthOutcome) {
    counter!(AUTH_ATTEMPTS, "action" => action, "outcome" => outcome.label()).increment(1);
}

pub fn record_authorization(
    resource: &'static str,
    operation: &'static str,
    outcome: &'static str,
) {
    counter!(
        AUTHZ_DECISIONS,
        "resource" => resource,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_permission_check(cached: bool, granted: bool, elapsed: Duration) {
    let cached = if cached { "true" } else { "false" };
    let granted = if granted { "true" } else { "false" };
    counter!(PERMISSION_CHECKS, "cached" => cached, "granted" => granted).increment(1);
    histogram!(PERMISSION_CHECK_LATENCY, "cached" => cached).record(elapsed.as_secs_f64());
}

/// `outcome` is one of `created`, `accepted`, `expired` or a rejection code.
pub fn record_invite_transition(outcome: &'static str) {
    counter!(INVITE_TRANSITIONS, "outcome" => outcome).increment(1);
}

pub fn record_request_latency(method: &str, route: &str, status: u16, elapsed: Duration) {
    histogram!(
        HTTP_LATENCY,
        "method" => method.to_owned(),
        "route" => route.to_owned(),
        "status" => status.to_string()
    )
    .record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_outcome_labels() {
        assert_eq!(AuthOutcome::Success.label(), "success");
        assert_eq!(AuthOutcome::InvalidCredentials.label(), "invalid_credentials");
        assert_eq!(AuthOutcome::InvalidToken.label(), "invalid_token");
    }

    #[test]
    fn test_disabled_state_renders_nothing() {
        let state = MetricsState::new(false);
        assert!(!state.is_enabled());
        assert!(state.render().is_none());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_authorization("dog", "read", "allow");
        record_invite_transition("accepted");
        record_permission_check(false, true, Duration::from_millis(1));
        record_request_latency("GET", "/dogs/{id}", 200, Duration::from_millis(3));
    }
}
