//! Fault injection middleware.
//!
//! Decorates any router. Each request is checked once against the engine
//! using the configured service name and the request path; a triggered rule
//! replaces the real handler with a synthetic failure, everything else passes
//! through untouched. Synthetic responses name the rule that fired in the
//! `x-fault-injected` header; a rule whose response cannot be built falls
//! back to the real handler.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, ErrorType};
use crate::faults::spawn_leaks;
use crate::http::request::RequestIdExt;
use crate::injection::latency::wait_injected_delay;
use crate::injection::{
    InjectionEngine, InjectionError, InjectionRule, InjectionType, LatencyParams, LeakParams,
};
use crate::observability::metrics;

/// Response header naming the rule behind a synthetic response.
pub const X_FAULT_INJECTED: &str = "x-fault-injected";

/// Non-standard "client closed request" status.
const CLIENT_CLOSED_REQUEST: u16 = 499;

const LEAK_DESCRIPTION: &str =
    "Task leak injected; inspect process resource usage";

/// State shared by every invocation of the middleware.
#[derive(Clone)]
pub struct InjectionState {
    pub engine: Arc<InjectionEngine>,
    pub service_name: Arc<str>,
    pub max_leak_count: usize,
}

impl InjectionState {
    pub fn new(engine: Arc<InjectionEngine>, service_name: &str, max_leak_count: usize) -> Self {
        Self {
            engine,
            service_name: Arc::from(service_name),
            max_leak_count,
        }
    }
}

/// What the middleware needs from the request before any await point.
struct InjectionContext {
    request_id: Option<String>,
    cancel: Option<CancellationToken>,
}

pub async fn fault_injection_middleware(
    State(state): State<InjectionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let endpoint = request.uri().path().to_owned();
    let Some(rule) = state.engine.decide(&state.service_name, &endpoint) else {
        return next.run(request).await;
    };

    let ctx = InjectionContext {
        request_id: request.request_id().map(str::to_owned),
        cancel: request.cancellation(),
    };

    match inject(&state, &rule, &ctx).await {
        Ok(response) => response,
        Err(InjectionError::Cancelled { elapsed }) => {
            tracing::debug!(
                rule = %rule.id,
                endpoint = %endpoint,
                elapsed_ms = elapsed.as_millis() as u64,
                "Request cancelled during injected delay"
            );
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::REQUEST_TIMEOUT)
                .into_response()
        }
        Err(InjectionError::Unsupported(injection_type)) => {
            tracing::debug!(
                rule = %rule.id,
                injection_type = %injection_type,
                "No HTTP-level fault for rule type, passing through"
            );
            metrics::record_passthrough("unsupported");
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                rule = %rule.id,
                endpoint = %endpoint,
                error = %e,
                "Fault injection failed, passing through"
            );
            metrics::record_passthrough("build_failed");
            next.run(request).await
        }
    }
}

async fn inject(
    state: &InjectionState,
    rule: &InjectionRule,
    ctx: &InjectionContext,
) -> Result<Response, InjectionError> {
    // Built before any side effect so a bad id never costs a delay or a leak.
    let tag = rule_tag(rule)?;

    let mut response = match rule.injection_type {
        InjectionType::HttpError => inject_http_error(&state.engine, rule, ctx)?,
        InjectionType::HttpLatency => inject_http_latency(rule, ctx).await?,
        InjectionType::GoroutineLeak => inject_task_leak(rule, ctx, state.max_leak_count)?,
        other => return Err(InjectionError::Unsupported(other)),
    };
    response
        .headers_mut()
        .insert(HeaderName::from_static(X_FAULT_INJECTED), tag);
    Ok(response)
}

/// Value of the `x-fault-injected` header: the id of the rule that fired.
fn rule_tag(rule: &InjectionRule) -> Result<HeaderValue, InjectionError> {
    HeaderValue::from_str(&rule.id).map_err(|_| {
        InjectionError::Build(format!("rule id {:?} is not a valid header value", rule.id))
    })
}

fn inject_http_error(
    engine: &InjectionEngine,
    rule: &InjectionRule,
    ctx: &InjectionContext,
) -> Result<Response, InjectionError> {
    let error = engine
        .create_error(rule)
        .ok_or_else(|| InjectionError::Build(format!("rule {} produced no error", rule.id)))?
        .with_request_id(ctx.request_id.clone());

    let mut body = error.body();
    mark_injected(&mut body, [])?;
    Ok((error.http_status(), Json(body)).into_response())
}

async fn inject_http_latency(
    rule: &InjectionRule,
    ctx: &InjectionContext,
) -> Result<Response, InjectionError> {
    let params = LatencyParams::from_config(&rule.config);
    wait_injected_delay(params.delay, ctx.cancel.as_ref()).await?;

    Ok((
        StatusCode::REQUEST_TIMEOUT,
        Json(json!({
            "success": false,
            "error": "Request timeout due to fault injection",
            "error_type": ErrorType::Timeout.as_str(),
            "request_id": ctx.request_id,
            "injected": true,
            "delay_ms": duration_ms(params.delay),
        })),
    )
        .into_response())
}

fn inject_task_leak(
    rule: &InjectionRule,
    ctx: &InjectionContext,
    max_leak_count: usize,
) -> Result<Response, InjectionError> {
    let params = LeakParams::from_config(&rule.config, max_leak_count);
    let handle = Handle::try_current().map_err(|e| InjectionError::Build(e.to_string()))?;
    let spawned = spawn_leaks(&handle, params.shape, params.count);

    let error = AppError::new(
        ErrorType::GoroutineLeak,
        "GOROUTINE_LEAK_INJECTED",
        "Task leak has been injected",
    )
    .with_request_id(ctx.request_id.clone());

    let mut body = error.body();
    mark_injected(
        &mut body,
        [
            ("leak_type", Value::from(params.shape.as_str())),
            ("leak_count", Value::from(spawned)),
            ("description", Value::from(LEAK_DESCRIPTION)),
        ],
    )?;
    Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
}

/// Adds `"injected": true` plus any extra fields to an error body.
fn mark_injected<const N: usize>(
    body: &mut Value,
    extra: [(&str, Value); N],
) -> Result<(), InjectionError> {
    let fields = body
        .as_object_mut()
        .ok_or_else(|| InjectionError::Build("error body is not a JSON object".to_string()))?;
    fields.insert("injected".to_string(), Value::Bool(true));
    for (key, value) in extra {
        fields.insert(key.to_string(), value);
    }
    Ok(())
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
