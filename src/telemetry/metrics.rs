//! Application metrics using the metrics crate.

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::warn;

use crate::boards::Role;

static PROMETHEUS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

#[derive(Clone)]
pub struct MetricsState {
    handle: Option<PrometheusHandle>,
}

impl MetricsState {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { handle: None };
        }

        let handle = PROMETHEUS_HANDLE.get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| warn!(error = %e, "Prometheus recorder not installed"))
                .ok()
        });

        Self {
            handle: handle.clone(),
        }
    }

    pub fn disabled() -> Self {
        Self { handle: None }
    }

    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(|h| h.render())
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }
}

pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<MetricsState>,
) -> impl IntoResponse {
    match state.render() {
        Some(metrics) => (StatusCode::OK, metrics),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not enabled".to_string(),
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateOutcome {
    Success,
    MissingToken,
    MissingProfile,
    InvalidToken,
    ExpiredToken,
    InvalidUser,
    AccountFetchFailed,
    ProfileInvalid,
    Timeout,
}

impl ValidateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidateOutcome::Success => "success",
            ValidateOutcome::MissingToken => "missing_token",
            ValidateOutcome::MissingProfile => "missing_profile",
            ValidateOutcome::InvalidToken => "invalid_token",
            ValidateOutcome::ExpiredToken => "expired_token",
            ValidateOutcome::InvalidUser => "invalid_user",
            ValidateOutcome::AccountFetchFailed => "account_fetch_failed",
            ValidateOutcome::ProfileInvalid => "profile_invalid",
            ValidateOutcome::Timeout => "timeout",
        }
    }
}

pub fn record_validate_outcome(outcome: ValidateOutcome) {
    counter!("validate_user_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_role_resolution(role: Role) {
    counter!("role_resolutions_total", "role" => role.as_str()).increment(1);
}

pub fn record_permission_check(granted: bool, duration: std::time::Duration) {
    counter!(
        "permission_checks_total",
        "granted" => granted.to_string()
    )
    .increment(1);

    histogram!("permission_check_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_cache_retry() {
    counter!("cache_cas_retries_total").increment(1);
}

pub fn record_request_latency(
    method: &str,
    path: &str,
    status: u16,
    duration: std::time::Duration,
) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}
