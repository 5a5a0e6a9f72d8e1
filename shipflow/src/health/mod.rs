//! Post-deploy health validation.
//!
//! Invokes the deployed function with a synthetic payload and checks
//! the response against configured expectations. Advisory: a failed
//! expectation is a warning, not a deploy failure, unless auto-rollback
//! is configured to react to it.

use crate::errors::RemoteError;
use crate::remote::{FunctionService, InvokeResponse};
use serde::{Deserialize, Serialize};

/// What the health check sends and expects. Each expectation is
/// optional and evaluated independently.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HealthCheckConfig {
    /// Payload to invoke with; defaults to `{"healthCheck": true}`.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    /// Expected status code in the response envelope.
    #[serde(default)]
    pub expected_status_code: Option<u16>,
    /// Substring expected in the response body.
    #[serde(default)]
    pub expected_body_contains: Option<String>,
    /// Substring expected in the function's error message (negative
    /// test: the function is expected to error).
    #[serde(default)]
    pub expected_error_contains: Option<String>,
}

impl HealthCheckConfig {
    /// The effective invocation payload.
    #[must_use]
    pub fn effective_payload(&self) -> serde_json::Value {
        self.payload
            .clone()
            .unwrap_or_else(|| serde_json::json!({"healthCheck": true}))
    }
}

/// One evaluated expectation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Which expectation this was.
    pub check: String,
    /// Whether it held.
    pub passed: bool,
    /// What was observed.
    pub detail: String,
}

/// The health validation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// True when every configured expectation held.
    pub passed: bool,
    /// The individual check results.
    pub checks: Vec<CheckResult>,
}

impl HealthReport {
    fn from_checks(checks: Vec<CheckResult>) -> Self {
        Self {
            passed: checks.iter().all(|c| c.passed),
            checks,
        }
    }
}

/// Invokes the function and evaluates the configured expectations.
///
/// An invocation transport failure is returned as an error; everything
/// observable about the response itself lands in the report.
pub async fn validate(
    service: &dyn FunctionService,
    function: &str,
    config: &HealthCheckConfig,
) -> Result<HealthReport, RemoteError> {
    let response = service.invoke(function, config.effective_payload()).await?;
    let report = evaluate(&response, config);

    if report.passed {
        tracing::info!(function, "Health check passed");
    } else {
        for check in report.checks.iter().filter(|c| !c.passed) {
            tracing::warn!(
                function,
                check = %check.check,
                detail = %check.detail,
                "Health check expectation not met"
            );
        }
    }

    Ok(report)
}

/// Classifies the raw response and evaluates each configured
/// expectation. Pure; split out for testability.
#[must_use]
pub fn evaluate(response: &InvokeResponse, config: &HealthCheckConfig) -> HealthReport {
    let mut checks = Vec::new();

    if let Some(expected) = &config.expected_error_contains {
        let detail = response
            .function_error
            .clone()
            .unwrap_or_else(|| "no function error reported".to_string());
        checks.push(CheckResult {
            check: "error-contains".to_string(),
            passed: response
                .function_error
                .as_deref()
                .is_some_and(|e| e.contains(expected)),
            detail,
        });
    } else if let Some(err) = &response.function_error {
        // An unexpected remote error signal fails whatever else was
        // configured; record it explicitly.
        checks.push(CheckResult {
            check: "no-function-error".to_string(),
            passed: false,
            detail: err.clone(),
        });
    }

    if let Some(expected) = config.expected_status_code {
        let observed = response
            .payload
            .get("statusCode")
            .and_then(serde_json::Value::as_u64);
        checks.push(CheckResult {
            check: "status-code".to_string(),
            passed: observed == Some(u64::from(expected)),
            detail: match observed {
                Some(code) => format!("expected {expected}, observed {code}"),
                None => format!("expected {expected}, no statusCode in envelope"),
            },
        });
    }

    if let Some(expected) = &config.expected_body_contains {
        let body = response
            .payload
            .get("body")
            .map(|b| match b {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        checks.push(CheckResult {
            check: "body-contains".to_string(),
            passed: body.contains(expected),
            detail: format!("expected substring {expected:?}"),
        });
    }

    if checks.is_empty() {
        // Nothing configured: reachability alone is the check.
        checks.push(CheckResult {
            check: "invocable".to_string(),
            passed: response.function_error.is_none(),
            detail: response
                .function_error
                .clone()
                .unwrap_or_else(|| "function responded".to_string()),
        });
    }

    HealthReport::from_checks(checks)
}
