use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::combat::AttackSetup;
use crate::config::AppConfig;
use crate::exact::DiceModel;
use crate::worker::{
    CheckRequest, ExactRequest, HostConfig, Request, Response, SimulationRequest, WorkerError,
    WorkerHost,
};

/// How long a request may wait for its computation.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared state behind every route: the computation host and the settings.
pub struct ServerState {
    host: Mutex<WorkerHost>,
    config: AppConfig,
    next_nonce: AtomicU64,
}

impl ServerState {
    pub fn new(config: AppConfig) -> Result<Self, WorkerError> {
        let host = WorkerHost::spawn(HostConfig {
            queue_capacity: config.queue_capacity,
            seed: config.seed,
        })?;
        Ok(Self {
            host: Mutex::new(host),
            config,
            next_nonce: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn next_nonce(&self) -> u64 {
        self.next_nonce.fetch_add(1, Ordering::Relaxed)
    }

    fn call(&self, request: Request) -> Result<Response, WorkerError> {
        let host = self.host.lock().unwrap_or_else(PoisonError::into_inner);
        host.call(request, REQUEST_TIMEOUT)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatePayload {
    pub setup: AttackSetup,
    pub iters_requested: Option<u64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPayload {
    pub dice: DiceModel,
    pub num_attacks: Option<i64>,
    pub p_hit: Option<f64>,
    pub check: Option<CheckRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub errors: Vec<ValidationIssue>,
}

#[derive(Debug)]
pub enum PayloadError {
    Parse(serde_json::Error),
    Validation(ValidationErrorResponse),
    /// The engine rejected the request, e.g. a malformed dice expression.
    Computation(String),
    Unavailable(WorkerError),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Validation(_) => write!(f, "invalid request"),
            Self::Computation(msg) => write!(f, "{msg}"),
            Self::Unavailable(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PayloadError {}

pub fn health_payload(state: &ServerState) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "attack-odds-api",
        "version": env!("CARGO_PKG_VERSION"),
        "defaultIterations": state.config.default_iterations,
        "maxIterations": state.config.max_iterations
    }))
}

pub fn simulate_payload(state: &ServerState, body: &str) -> Result<String, PayloadError> {
    let payload: SimulatePayload = serde_json::from_str(body).map_err(PayloadError::Parse)?;
    let iterations = payload
        .iters_requested
        .unwrap_or(state.config.default_iterations);
    validate_simulation(&payload.setup, iterations, state.config.max_iterations)?;

    let request = Request::Simulate(SimulationRequest {
        nonce: state.next_nonce(),
        iters_requested: iterations,
        setup: payload.setup,
        seed: payload.seed,
    });
    respond(state, request)
}

pub fn exact_payload(state: &ServerState, body: &str) -> Result<String, PayloadError> {
    let payload: ExactPayload = serde_json::from_str(body).map_err(PayloadError::Parse)?;
    let num_attacks = payload.num_attacks.unwrap_or(1);
    validate_exact(&payload, num_attacks)?;

    let request = Request::Exact(ExactRequest {
        nonce: state.next_nonce(),
        dice: payload.dice,
        num_attacks,
        p_hit: payload.p_hit,
        check: payload.check,
    });
    respond(state, request)
}

fn respond(state: &ServerState, request: Request) -> Result<String, PayloadError> {
    match state.call(request).map_err(PayloadError::Unavailable)? {
        Response::Failed { error, .. } => Err(PayloadError::Computation(error)),
        response => serde_json::to_string_pretty(&response).map_err(PayloadError::Parse),
    }
}

fn validate_simulation(
    setup: &AttackSetup,
    iterations: u64,
    max_iterations: u64,
) -> Result<(), PayloadError> {
    let mut errors: Vec<ValidationIssue> = Vec::new();

    for (field, text) in [
        ("setup.attack", &setup.attack),
        ("setup.damage", &setup.damage),
        ("setup.versus", &setup.versus),
        ("setup.numAttacks", &setup.num_attacks),
    ] {
        if text.trim().is_empty() {
            errors.push(ValidationIssue {
                field,
                messages: vec!["must not be empty".to_string()],
            });
        }
    }

    if !(1..=max_iterations).contains(&iterations) {
        errors.push(ValidationIssue {
            field: "itersRequested",
            messages: vec![format!("must be between 1 and {max_iterations}")],
        });
    }

    finish(errors)
}

fn validate_exact(payload: &ExactPayload, num_attacks: i64) -> Result<(), PayloadError> {
    let mut errors: Vec<ValidationIssue> = Vec::new();

    if num_attacks < 0 {
        errors.push(ValidationIssue {
            field: "numAttacks",
            messages: vec!["must not be negative".to_string()],
        });
    }

    match (payload.p_hit, payload.check) {
        (Some(p), _) if !(0.0..=1.0).contains(&p) => errors.push(ValidationIssue {
            field: "pHit",
            messages: vec!["must be between 0 and 1".to_string()],
        }),
        (None, None) => errors.push(ValidationIssue {
            field: "pHit",
            messages: vec!["either pHit or check is required".to_string()],
        }),
        _ => {}
    }

    finish(errors)
}

fn finish(errors: Vec<ValidationIssue>) -> Result<(), PayloadError> {
    if errors.is_empty() {
        return Ok(());
    }

    Err(PayloadError::Validation(ValidationErrorResponse {
        status: "error",
        message: "Validation failed",
        errors,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_validation_collects_every_issue() {
        let setup = AttackSetup::new(" ", "1d6", "");
        let Err(PayloadError::Validation(response)) = validate_simulation(&setup, 0, 100) else {
            panic!("expected validation failure");
        };
        let fields: Vec<&str> = response.errors.iter().map(|issue| issue.field).collect();
        assert_eq!(fields, vec!["setup.attack", "setup.versus", "itersRequested"]);
    }

    #[test]
    fn exact_validation_requires_a_hit_chance() {
        let payload: ExactPayload =
            serde_json::from_str(r#"{"dice":{"n":1,"s":6,"modifier":0}}"#).unwrap();
        assert!(matches!(
            validate_exact(&payload, 1),
            Err(PayloadError::Validation(_))
        ));
        let payload: ExactPayload =
            serde_json::from_str(r#"{"dice":{"n":1,"s":6},"pHit":0.4,"numAttacks":2}"#).unwrap();
        assert!(validate_exact(&payload, 2).is_ok());
    }
}
