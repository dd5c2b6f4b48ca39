//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router around the wrapped service
//! - Wire up middleware (request ID, tracing, timeout, fault injection)
//! - Register the configured faults with the fault manager
//! - Forward requests to the upstream, or echo them when none is set
//! - Apply rule reloads and serve the admin API
//! - Stop every running fault on shutdown

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, Scheme},
        Request, Uri,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::{setup_admin_router, AdminState};
use crate::config::{FaultsConfig, InjectorConfig};
use crate::error::{AppError, ErrorType};
use crate::faults::{CpuSpikeFault, FaultManager, MemoryLeakFault, TaskLeakFault};
use crate::http::middleware::{fault_injection_middleware, InjectionState};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::injection::InjectionEngine;

/// State of the wrapped service handler.
#[derive(Clone)]
pub struct ServiceState {
    pub service_name: Arc<str>,
    pub upstream: Option<Authority>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the fault injector.
pub struct HttpServer {
    router: Router,
    config: InjectorConfig,
    engine: Arc<InjectionEngine>,
    faults: Arc<FaultManager>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: InjectorConfig) -> Self {
        let engine = Arc::new(InjectionEngine::with_rules(config.injection_rules()));
        let faults = Arc::new(build_fault_manager(&config.faults));

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let upstream = config.service.upstream.as_deref().and_then(|addr| {
            Authority::from_str(addr)
                .map_err(|e| {
                    tracing::error!(upstream = %addr, error = %e, "Invalid upstream, echoing instead");
                })
                .ok()
        });

        let state = ServiceState {
            service_name: Arc::from(config.service.name.as_str()),
            upstream,
            client,
        };

        let router = Self::build_router(&config, state, engine.clone());
        Self {
            router,
            config,
            engine,
            faults,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &InjectorConfig,
        state: ServiceState,
        engine: Arc<InjectionEngine>,
    ) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(service_handler))
            .route("/", any(service_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes));

        if config.injection.enabled {
            let injection = InjectionState::new(
                engine,
                &config.service.name,
                config.injection.max_leak_count,
            );
            router = router.layer(middleware::from_fn_with_state(
                injection,
                fault_injection_middleware,
            ));
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Reloaded configurations arriving on `config_updates` replace the rule
    /// set; every other section only takes effect on restart.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<InjectorConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.service.name,
            rules = self.engine.len(),
            faults = self.faults.len(),
            "HTTP server starting"
        );

        let engine = self.engine.clone();
        let reloader = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                engine.replace_rules(new_config.injection_rules());
                tracing::info!(rules = engine.len(), "Injection rules reloaded");
            }
        });

        let admin = if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            tracing::info!(
                address = %admin_listener.local_addr()?,
                "Admin API listening"
            );
            let app = setup_admin_router(AdminState::new(
                self.engine.clone(),
                self.faults.clone(),
                &self.config.admin.api_key,
            ));
            let mut admin_shutdown = shutdown.resubscribe();
            Some(tokio::spawn(async move {
                let result = axum::serve(admin_listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Admin API failed");
                }
            }))
        } else {
            None
        };

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        if let Some(admin) = admin {
            let _ = admin.await;
        }

        let faults = self.faults.clone();
        let stopped = tokio::task::spawn_blocking(move || faults.stop_all())
            .await
            .map_err(std::io::Error::other)?;

        tracing::info!(stopped_faults = stopped, "HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn engine(&self) -> &Arc<InjectionEngine> {
        &self.engine
    }

    pub fn faults(&self) -> &Arc<FaultManager> {
        &self.faults
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }
}

/// Registers the faults enabled in `config`.
pub fn build_fault_manager(config: &FaultsConfig) -> FaultManager {
    let manager = FaultManager::new();

    if config.cpu_spike.enabled {
        manager.register(Arc::new(CpuSpikeFault::new(
            config.cpu_spike.intensity,
            config.cpu_spike.workers,
            Duration::from_millis(config.cpu_spike.interval_ms),
        )));
    }
    if config.memory_leak.enabled {
        manager.register(Arc::new(MemoryLeakFault::new(
            config.memory_leak.chunk_bytes,
            Duration::from_millis(config.memory_leak.interval_ms),
            config.memory_leak.max_bytes,
        )));
    }
    if config.task_leak.enabled {
        manager.register(Arc::new(TaskLeakFault::new(
            config.task_leak.shape,
            config.task_leak.count,
        )));
    }

    manager
}

/// The wrapped service: forwards to the upstream, or echoes the request.
async fn service_handler(State(state): State<ServiceState>, request: Request<Body>) -> Response {
    let request_id = request.request_id().map(str::to_owned);

    let Some(upstream) = state.upstream.clone() else {
        return Json(json!({
            "success": true,
            "service": &*state.service_name,
            "method": request.method().as_str(),
            "path": request.uri().path(),
            "request_id": request_id,
        }))
        .into_response();
    };

    let (mut parts, body) = request.into_parts();
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(axum::http::uri::PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            return AppError::new(ErrorType::BadRequest, "INVALID_URI", e.to_string())
                .with_request_id(request_id)
                .into_response();
        }
    };

    tracing::debug!(
        request_id = ?request_id,
        upstream = %upstream,
        uri = %parts.uri,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = ?request_id, upstream = %upstream, error = %e, "Upstream error");
            AppError::new(
                ErrorType::ServiceUnavailable,
                "UPSTREAM_UNAVAILABLE",
                "Upstream request failed",
            )
            .with_request_id(request_id)
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CpuSpikeConfig, MemoryLeakConfig, TaskLeakConfig};

    #[test]
    fn test_fault_registration_follows_config() {
        let config = FaultsConfig {
            cpu_spike: CpuSpikeConfig::default(),
            memory_leak: MemoryLeakConfig {
                enabled: false,
                ..Default::default()
            },
            task_leak: TaskLeakConfig {
                enabled: true,
                ..Default::default()
            },
        };
        let manager = build_fault_manager(&config);

        let names: Vec<_> = manager.list().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["CpuSpike".to_string(), "TaskLeak".to_string()]);
    }

    #[tokio::test]
    async fn test_server_registry_is_separate_from_global_sampler() {
        let server = HttpServer::new(InjectorConfig::default());

        assert!(server.faults().get("CpuSpike").is_some());
        assert!(FaultManager::global().get("CpuSpike").is_none());
    }
}
