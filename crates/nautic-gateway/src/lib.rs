//! Nautic HTTP/JSON Gateway.
//!
//! Exposes registration, login and token verification, plus token-protected
//! image analysis backed by a lazily loaded vision capability.

pub mod config;
pub mod error;
pub mod extract;
pub mod json;
pub mod routes;
pub mod vision;

pub use config::{Args, GatewayConfig};
pub use error::AppError;
pub use vision::{ModelFileCapability, ModelLoader, VisionBackend};

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use nautic_core::{
    AuthCapability, AuthManager, Capability, CapabilityRegistry, CapabilitySlot, Result,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Registry owning every optional subsystem.
    pub registry: Arc<CapabilityRegistry>,
    /// Auth manager slot.
    pub auth: Arc<CapabilitySlot<AuthManager>>,
    /// Vision backend slot.
    pub vision: Arc<CapabilitySlot<dyn VisionBackend>>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl AppState {
    /// Create state whose vision backend is loaded from the configured model
    /// file by `loader`.
    pub fn new(config: GatewayConfig, loader: ModelLoader) -> Result<Self> {
        let vision = ModelFileCapability::new(config.model_path.clone(), loader);
        Self::with_vision(config, vision)
    }

    /// Create state with an arbitrary vision capability.
    ///
    /// Nothing is initialized here; both slots start out unknown.
    pub fn with_vision<C>(config: GatewayConfig, vision: C) -> Result<Self>
    where
        C: Capability<Instance = dyn VisionBackend>,
    {
        let registry = Arc::new(CapabilityRegistry::new(config.failure_policy));
        let auth = registry.register(AuthCapability::new(config.auth.clone()))?;
        let vision = registry.register(vision)?;

        Ok(Self {
            registry,
            auth,
            vision,
            config,
        })
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .merge(routes::info::routes())
        .merge(routes::health::routes())
        .merge(routes::auth::routes())
        .merge(routes::vision::routes())
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
