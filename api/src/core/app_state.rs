use std::sync::Arc;

use router_config::ModelConfig;
use router_handler::ModelHandler;
use router_keepalive::KeepAliveScheduler;
use router_proxy::ProxyPipeline;
use router_store::CoordinationStore;

/// Shared state every handler reads from: the model registry, the locking
/// facade, the fully assembled proxy pipeline, and the coordination store
/// itself. `keepalive` is held here so its `Arc` outlives the handle passed
/// to `tokio::spawn`, not because any route currently reads it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ModelConfig>,
    pub handler: Arc<ModelHandler>,
    pub pipeline: Arc<ProxyPipeline>,
    pub keepalive: Arc<KeepAliveScheduler>,
    pub store: Arc<dyn CoordinationStore>,
}
