use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api::AppState;
use router_config::ModelConfig;
use router_guardrail::{GuardrailPlugin, MaskerPlugin, NoopGuardrail, RegexMasker};
use router_handler::ModelHandler;
use router_health::HealthMonitor;
use router_http::HttpExecutor;
use router_keepalive::KeepAliveScheduler;
use router_lb::{StrategyDeps, StrategyFacade};
use router_proxy::ProxyPipeline;
use router_store::{CoordinationStore, InMemoryStore, RedisStore};
use tracing::{error, info};

fn must_env(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("missing required environment variable: {name}"))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64_or(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool_or(name: &str, default: bool) -> bool {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn load_system_prompts() -> HashMap<String, String> {
    let Ok(path) = env::var("ROUTER_SYSTEM_PROMPTS_PATH") else {
        return HashMap::new();
    };
    match std::fs::read_to_string(&path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
            error!(%path, %err, "failed to parse system prompts file, starting with none");
            HashMap::new()
        }),
        Err(err) => {
            error!(%path, %err, "failed to read system prompts file, starting with none");
            HashMap::new()
        }
    }
}

/// Builds the masker from `ROUTER_MASK_PATTERNS`, a comma-separated list of
/// regexes. Returns `None` if the variable is unset or every pattern fails
/// to compile, in which case masking stays inert even if enabled.
fn load_masker() -> Option<RegexMasker> {
    let raw = env::var("ROUTER_MASK_PATTERNS").ok()?;
    let placeholder = env_or("ROUTER_MASK_PLACEHOLDER", "[REDACTED]");
    let patterns: Vec<regex::Regex> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(|p| match regex::Regex::new(p) {
            Ok(re) => Some(re),
            Err(err) => {
                error!(pattern = p, %err, "invalid mask pattern, skipping");
                None
            }
        })
        .collect();
    if patterns.is_empty() {
        return None;
    }
    Some(RegexMasker::new(patterns, placeholder))
}

async fn build_store() -> Result<Arc<dyn CoordinationStore>, Box<dyn std::error::Error>> {
    let prefix = env_or("ROUTER_STORE_PREFIX", "router:");
    match env_or("ROUTER_COORDINATION_STORE", "redis").as_str() {
        "memory" | "in-memory" | "inmemory" => {
            info!("using in-memory coordination store (ROUTER_COORDINATION_STORE=memory)");
            Ok(Arc::new(InMemoryStore::new()))
        }
        _ => {
            let url = must_env("REDIS_URL")?;
            let store = RedisStore::connect(&url, prefix).await?;
            info!("connected to redis coordination store");
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    router_telemetry::init(&env_or("ROUTER_LOG_LEVEL", "info"));

    let config_path = must_env("ROUTER_MODEL_CONFIG_PATH")?;
    let config = Arc::new(ModelConfig::load(&config_path)?);

    let store = build_store().await?;

    let health = Arc::new(HealthMonitor::new(store.clone(), env_u64_or("ROUTER_PROBE_INTERVAL_SECS", 30)));
    for model in config.all_providers() {
        health.register(model);
    }
    tokio::spawn(health.clone().run());

    let deps = StrategyDeps {
        store: store.clone(),
        health: health.clone(),
        check_interval: Duration::from_secs(env_u64_or("ROUTER_PROBE_INTERVAL_SECS", 30)),
        acquire_timeout: Duration::from_secs(env_u64_or("ROUTER_ACQUIRE_TIMEOUT_SECS", 30)),
        dynamic_weighted_history_size: env_u64_or("ROUTER_DYNAMIC_WEIGHTED_HISTORY_SIZE", 100) as usize,
    };
    let strategy_name = env_or("ROUTER_STRATEGY", "balanced");
    let facade = StrategyFacade::new(&strategy_name, deps)?;
    let handler = Arc::new(ModelHandler::new(config.clone(), facade));

    let http = Arc::new(HttpExecutor::new(Duration::from_secs(env_u64_or("ROUTER_UPSTREAM_TIMEOUT_SECS", 60))));

    let guardrail: Option<Arc<dyn GuardrailPlugin>> =
        if env_bool_or("ROUTER_GUARDRAIL_ENABLED", false) { Some(Arc::new(NoopGuardrail)) } else { None };
    let masking_enabled = env_bool_or("ROUTER_MASKING_ENABLED", false);
    let masker: Option<Arc<dyn MaskerPlugin>> = if masking_enabled {
        match load_masker() {
            Some(masker) => Some(Arc::new(masker)),
            None => {
                error!("ROUTER_MASKING_ENABLED=true but ROUTER_MASK_PATTERNS is unset or invalid; masking stays inert");
                None
            }
        }
    } else {
        None
    };

    let pipeline = Arc::new(ProxyPipeline::new(
        handler.clone(),
        http.clone(),
        store.clone(),
        guardrail,
        masker,
        Vec::new(),
        load_system_prompts(),
        masking_enabled,
    ));

    let keepalive = Arc::new(KeepAliveScheduler::new(
        store.clone(),
        http.clone(),
        config.clone(),
        Duration::from_secs(env_u64_or("ROUTER_KEEPALIVE_INTERVAL_SECS", 30)),
    ));
    tokio::spawn(keepalive.clone().run());

    let state = AppState {
        config,
        handler,
        pipeline,
        keepalive,
        store,
    };

    let port: u16 = env_or("ROUTER_PORT", "8080").parse().map_err(|_| "ROUTER_PORT must be a valid u16")?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    api::start(state, addr).await?;

    Ok(())
}
