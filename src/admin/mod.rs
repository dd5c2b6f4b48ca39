//! Admin API: fault lifecycle control and live rule management.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::faults::FaultManager;
use crate::injection::InjectionEngine;

/// Shared state of the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub engine: Arc<InjectionEngine>,
    pub faults: Arc<FaultManager>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(engine: Arc<InjectionEngine>, faults: Arc<FaultManager>, api_key: &str) -> Self {
        Self {
            engine,
            faults,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/faults", get(list_faults))
        .route("/admin/faults/{name}", get(get_fault))
        .route("/admin/faults/{name}/start", post(start_fault))
        .route("/admin/faults/{name}/stop", post(stop_fault))
        .route("/admin/rules", get(list_rules))
        .route("/admin/rules/{id}", put(put_rule).get(get_rule).delete(delete_rule))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
