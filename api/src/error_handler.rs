use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use router_guardrail::{GuardrailError, UtilsError};
use router_handler::HandlerError;
use router_lb::LbError;
use router_proxy::ProxyError;

use crate::core::http::response_envelope::{BuiltinErrorBody, ProviderErrorBody, ProviderErrorDetail};

/// Public application error type every route handler returns. Covers
/// validation, upstream transient-exhausted, upstream fatal, guardrail
/// block, lock timeout, coordination-store error, and plugin failure; the
/// status/type/code triad below is what each `IntoResponse` impl reads.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing required parameter \"{0}\"")]
    MissingParam(&'static str),

    #[error("unknown model \"{0}\"")]
    UnknownModel(String),

    #[error("unknown api family \"{0}\"")]
    UnknownFamily(String),

    #[error("content blocked by guardrail: {0}")]
    GuardrailBlocked(String),

    #[error("guardrail or utils plugin failed: {0}")]
    PluginFailed(String),

    #[error("no healthy provider is available for this model")]
    NoProviders,

    #[error("timed out acquiring a provider: {0}")]
    LockTimeout(String),

    #[error("unknown load-balancing strategy \"{0}\"")]
    UnknownStrategy(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("all retry attempts against upstream providers failed: {0}")]
    RetriesExhausted(String),

    #[error("{0}")]
    Internal(String),
}

/// Status code derived from the error kind; for the catch-all `Internal`
/// variant, a "not found" substring in the message maps to 404, otherwise
/// 500.
impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::MissingParam(_) | AppError::UnknownFamily(_) | AppError::GuardrailBlocked(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::UnknownModel(_) => StatusCode::NOT_FOUND,
            AppError::NoProviders | AppError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UnknownStrategy(_) | AppError::PluginFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::RetriesExhausted(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(msg) => {
                if msg.to_lowercase().contains("not found") {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }

    fn type_(&self) -> &'static str {
        match self {
            AppError::MissingParam(_)
            | AppError::UnknownModel(_)
            | AppError::UnknownFamily(_)
            | AppError::GuardrailBlocked(_) => "invalid_request_error",
            AppError::NoProviders | AppError::LockTimeout(_) => "unavailable_error",
            AppError::Upstream(_) | AppError::RetriesExhausted(_) => "upstream_error",
            AppError::UnknownStrategy(_) | AppError::PluginFailed(_) | AppError::Internal(_) => "server_error",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::MissingParam(_) => "missing_parameter",
            AppError::UnknownModel(_) => "model_not_found",
            AppError::UnknownFamily(_) => "unknown_family",
            AppError::GuardrailBlocked(_) => "content_blocked",
            AppError::NoProviders => "no_providers",
            AppError::LockTimeout(_) => "lock_timeout",
            AppError::UnknownStrategy(_) => "unknown_strategy",
            AppError::PluginFailed(_) => "plugin_failed",
            AppError::Upstream(_) => "upstream_error",
            AppError::RetriesExhausted(_) => "retries_exhausted",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::MissingParam(p) => AppError::MissingParam(p),
            ProxyError::UnknownModel(m) => AppError::UnknownModel(m),
            ProxyError::Protocol(e) => AppError::UnknownFamily(e.to_string()),
            ProxyError::Handler(HandlerError::UnknownModel(m)) => AppError::UnknownModel(m),
            ProxyError::Handler(HandlerError::Strategy(LbError::Timeout { model, timeout_secs })) => {
                AppError::LockTimeout(format!("model \"{model}\" after {timeout_secs}s"))
            }
            ProxyError::Handler(HandlerError::Strategy(LbError::NoProviders)) => AppError::NoProviders,
            ProxyError::Handler(HandlerError::Strategy(LbError::UnknownStrategy(name))) => {
                AppError::UnknownStrategy(name)
            }
            ProxyError::Handler(HandlerError::Strategy(LbError::Store(e))) => {
                AppError::Upstream(format!("coordination store: {e}"))
            }
            ProxyError::GuardrailBlocked(reason) => AppError::GuardrailBlocked(reason),
            ProxyError::GuardrailFailed(GuardrailError::CheckFailed(e)) => AppError::PluginFailed(e),
            ProxyError::UtilsFailed(UtilsError::Failed(e)) => AppError::PluginFailed(e),
            ProxyError::Upstream(e) => AppError::Upstream(e.to_string()),
            ProxyError::RetriesExhausted { attempts, last } => {
                AppError::RetriesExhausted(format!("{attempts} attempts, last error: {last}"))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ProviderErrorBody {
            error: ProviderErrorDetail {
                message: self.to_string(),
                type_: self.type_(),
                param: None,
                code: self.code(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Wraps an [`AppError`] to render the builtin-endpoint envelope
/// (`{"status": false, "body": "..."}`) instead of the provider-native one.
pub struct Builtin(pub AppError);

impl From<ProxyError> for Builtin {
    fn from(err: ProxyError) -> Self {
        Builtin(AppError::from(err))
    }
}

impl IntoResponse for Builtin {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let body = BuiltinErrorBody::failure(self.0.to_string());
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
pub type BuiltinResult<T> = Result<T, Builtin>;
