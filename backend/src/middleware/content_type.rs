use axum::body::HttpBody;
use axum::extract::Request;
use axum::http::{Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::core::ApiError;

/// The only route that takes `multipart/form-data`.
pub const UPLOAD_PATH: &str = "/files/upload";

/// Answers 415 for writes whose body is not JSON.
pub async fn require_json(req: Request, next: Next) -> Response {
    if accepts(&req) {
        next.run(req).await
    } else {
        tracing::debug!(method = %req.method(), path = %req.uri().path(), "Rejected request content type");
        ApiError::UnsupportedMediaType.into_response()
    }
}

fn accepts(req: &Request) -> bool {
    if !matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) || !has_body(req) {
        return true;
    }

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

    match content_type.as_deref() {
        Some("application/json") => true,
        Some("multipart/form-data") => req.uri().path() == UPLOAD_PATH,
        _ => false,
    }
}

/// Chunked bodies have no upper bound and count as present.
fn has_body(req: &Request) -> bool {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    match declared {
        Some(len) => len > 0,
        None => req.body().size_hint().upper() != Some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(method: Method, path: &str, content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[test]
    fn test_json_writes_pass() {
        let ct = Some("application/json; charset=utf-8");
        assert!(accepts(&request(Method::POST, "/datasets", ct, "{}")));
        assert!(accepts(&request(Method::PATCH, "/datasets/1/status", ct, "{}")));
    }

    #[test]
    fn test_other_content_types_are_rejected() {
        assert!(!accepts(&request(Method::POST, "/datasets", Some("text/plain"), "hello")));
        assert!(!accepts(&request(Method::PUT, "/datasets/1", None, "hello")));
    }

    #[test]
    fn test_multipart_only_on_upload() {
        let ct = Some("multipart/form-data; boundary=x");
        assert!(accepts(&request(Method::POST, UPLOAD_PATH, ct, "--x--")));
        assert!(!accepts(&request(Method::POST, "/datasets", ct, "--x--")));
    }

    #[test]
    fn test_reads_and_empty_bodies_pass() {
        assert!(accepts(&request(Method::GET, "/datasets", Some("text/plain"), "hello")));
        assert!(accepts(&request(Method::POST, "/notifications/mark-all-read", None, "")));
    }
}
