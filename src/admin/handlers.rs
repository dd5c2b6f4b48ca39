use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::AdminState;
use crate::config::validate_rule;
use crate::error::{AppError, ErrorType};
use crate::faults::{leaked_task_count, FaultStatus, FaultSummary};
use crate::injection::InjectionRule;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub rules: usize,
    pub faults: usize,
    pub running_faults: usize,
    pub leaked_tasks: usize,
}

#[derive(Debug, Serialize)]
pub struct FaultTransition {
    pub fault: String,
    pub status: FaultStatus,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let faults = state.faults.list();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        rules: state.engine.len(),
        faults: faults.len(),
        running_faults: faults
            .iter()
            .filter(|f| f.status == FaultStatus::Running)
            .count(),
        leaked_tasks: leaked_task_count(),
    })
}

pub async fn list_faults(State(state): State<AdminState>) -> Json<Vec<FaultSummary>> {
    Json(state.faults.list())
}

pub async fn get_fault(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<FaultSummary>, AppError> {
    let status = state.faults.status(&name)?;
    Ok(Json(FaultSummary { name, status }))
}

pub async fn start_fault(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<FaultTransition>, AppError> {
    state.faults.start(&name)?;
    tracing::info!(fault = %name, "Fault started via admin API");
    Ok(Json(FaultTransition {
        fault: name,
        status: FaultStatus::Running,
    }))
}

pub async fn stop_fault(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<FaultTransition>, AppError> {
    // Stopping joins worker threads.
    let faults = state.faults.clone();
    let fault = name.clone();
    tokio::task::spawn_blocking(move || faults.stop(&fault))
        .await
        .map_err(|e| AppError::new(ErrorType::Internal, "FAULT_STOP_FAILED", e.to_string()))??;

    tracing::info!(fault = %name, "Fault stopped via admin API");
    Ok(Json(FaultTransition {
        fault: name,
        status: FaultStatus::Stopped,
    }))
}

pub async fn list_rules(State(state): State<AdminState>) -> Json<Vec<InjectionRule>> {
    Json(
        state
            .engine
            .rules()
            .into_iter()
            .map(|rule| (*rule).clone())
            .collect(),
    )
}

pub async fn get_rule(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<InjectionRule>, AppError> {
    state
        .engine
        .get_rule(&id)
        .map(|rule| Json((*rule).clone()))
        .ok_or_else(|| rule_not_found(&id))
}

/// Creates or replaces the rule stored under `id`.
pub async fn put_rule(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(mut rule): Json<InjectionRule>,
) -> Result<(StatusCode, Json<InjectionRule>), AppError> {
    rule.id = id;
    validate_rule(&rule).map_err(|errors| {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        AppError::new(ErrorType::BadRequest, "INVALID_RULE", message)
    })?;

    let status = match state.engine.upsert_rule(rule.clone()) {
        Some(_) => StatusCode::OK,
        None => StatusCode::CREATED,
    };
    tracing::info!(
        rule = %rule.id,
        service = %rule.service,
        endpoint = %rule.endpoint,
        injection_type = %rule.injection_type,
        rate = rule.rate,
        "Rule stored via admin API"
    );
    Ok((status, Json(rule)))
}

pub async fn delete_rule(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .remove_rule(&id)
        .ok_or_else(|| rule_not_found(&id))?;
    tracing::info!(rule = %id, "Rule removed via admin API");
    Ok(StatusCode::NO_CONTENT)
}

fn rule_not_found(id: &str) -> AppError {
    AppError::new(
        ErrorType::ObjectNotFound,
        "RULE_NOT_FOUND",
        format!("no rule with id '{}'", id),
    )
}
