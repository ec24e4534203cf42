use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::core::http::response_envelope::ProviderErrorBody;
use crate::core::http::response_envelope::ProviderErrorDetail;

async fn take_body(res: Response) -> (axum::http::response::Parts, Bytes) {
    let (parts, body) = res.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    (parts, bytes)
}

fn ensure_request_id(parts: &mut axum::http::response::Parts) -> String {
    if let Some(h) = parts.headers.get("X-Request-Id") {
        if let Ok(v) = h.to_str() {
            if !v.trim().is_empty() {
                return v.to_string();
            }
        }
    }
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    let id = format!("req-{nanos}");
    parts.headers.insert("X-Request-Id", HeaderValue::from_str(&id).unwrap());
    id
}

/// Rewrites axum's own 400/422 JSON-extraction rejections into the
/// provider-native error envelope and stamps an `X-Request-Id` on every
/// response, success or failure. Handler-level errors never pass through
/// here — `AppError`/`Builtin` already render their own envelopes.
pub async fn json_error_mapper(req: Request<Body>, next: Next) -> Response {
    let res = next.run(req).await;
    let status = res.status();

    if status != StatusCode::BAD_REQUEST && status != StatusCode::UNPROCESSABLE_ENTITY {
        let (mut parts, bytes) = take_body(res).await;
        ensure_request_id(&mut parts);
        return Response::from_parts(parts, Body::from(bytes));
    }

    let (mut parts, bytes) = take_body(res).await;
    let original = String::from_utf8_lossy(&bytes).trim().to_string();
    ensure_request_id(&mut parts);

    let envelope = ProviderErrorBody {
        error: ProviderErrorDetail {
            message: original,
            type_: "invalid_request_error",
            param: None,
            code: "bad_request",
        },
    };

    let body = serde_json::to_vec(&envelope).unwrap_or_else(|_| bytes.to_vec());
    parts
        .headers
        .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Response::from_parts(parts, Body::from(body))
}
