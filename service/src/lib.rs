use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::Request,
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{classify::ServerErrorsFailureClass, trace::TraceLayer};
use tracing::{error, info, Span};

pub mod auth;
pub mod config;
pub mod presenter;
pub mod store;

use auth::TokenIssuer;
use config::ServiceConfig;
use presenter::handlers;
use store::{DocumentStore, MemoryStore, RedisStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub tokens: Arc<TokenIssuer>,
    pub hash_iterations: u32,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: &ServiceConfig) -> Self {
        AppState {
            store,
            tokens: Arc::new(TokenIssuer::new(
                &config.token_secret,
                config.token_ttl_secs,
            )),
            hash_iterations: config.hash_iterations,
        }
    }

    /// Redis when `REDIS_URL` is configured, otherwise a process-local store.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn DocumentStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisStore::connect(url, config.redis_min_idle).await?),
            None => {
                tracing::warn!("`REDIS_URL` unset: data lives in memory and dies with the process");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(AppState::new(store, config))
    }
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handlers::health))
        .route("/v1/user/new", post(handlers::signup))
        .route("/v1/user/login", post(handlers::login))
        .route("/v1/todo/all", get(handlers::list_todos))
        .route("/v1/todo/new", post(handlers::create_todo))
        .route("/v1/todo/update", post(handlers::update_todo))
        .route("/v1/todo/delete", post(handlers::delete_todo))
        .layer(
            TraceLayer::new_for_http()
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("{:?} {:?}", request.method(), request.uri());
                })
                .on_response(|response: &Response, latency: Duration, _span: &Span| {
                    if response.status().is_success() {
                        info!("{:?} in {:?}", response.status(), latency);
                    } else {
                        error!("{:?} in {:?}", response.status(), latency);
                    }
                })
                .on_failure(
                    |failure: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        error!("request failed: {}", failure);
                    },
                ),
        )
        .with_state(app_state)
}
