//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::{Captures, Regex};

/// Install the Prometheus recorder and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "ottcms_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "ottcms_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "ottcms_http_requests_in_flight";

    pub const QUEUE_LENGTH: &str = "ottcms_queue_length";
    pub const QUEUE_DLQ_LENGTH: &str = "ottcms_queue_dlq_length";

    pub const UPLOADS_TOTAL: &str = "ottcms_uploads_total";
    pub const TRANSCODE_DISPATCH_TOTAL: &str = "ottcms_transcode_dispatch_total";
    pub const DRIVE_IMPORTS_TOTAL: &str = "ottcms_drive_imports_total";

    pub const RATE_LIMIT_HITS_TOTAL: &str = "ottcms_rate_limit_hits_total";
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn set_queue_length(length: u64) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}

pub fn set_dlq_length(length: u64) {
    gauge!(names::QUEUE_DLQ_LENGTH).set(length as f64);
}

/// Record an upload reaching a terminal state (`completed` / `failed`).
pub fn record_upload(outcome: &'static str) {
    counter!(names::UPLOADS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_transcode_dispatch(ok: bool) {
    let outcome = if ok { "submitted" } else { "failed" };
    counter!(names::TRANSCODE_DISPATCH_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_drive_imports(completed: usize, failed: usize) {
    counter!(names::DRIVE_IMPORTS_TOTAL, "outcome" => "completed").increment(completed as u64);
    counter!(names::DRIVE_IMPORTS_TOTAL, "outcome" => "failed").increment(failed as u64);
}

pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

fn id_segments() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"/(uploads|media|transcoding|shows|episodes|plans|paywalls|poster-projects|prompts)/([^/]+)")
                .ok()
        })
        .as_ref()
}

/// Replace entity ids with `:id` so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let Some(pattern) = id_segments() else {
        return path.to_string();
    };
    pattern
        .replace_all(path, |caps: &Captures<'_>| match &caps[2] {
            "multipart" | "bulk" => caps[0].to_string(),
            _ => format!("/{}/:id", &caps[1]),
        })
        .into_owned()
}

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_replaced() {
        assert_eq!(
            sanitize_path("/api/shows/3f1c9a/episodes/ep-77"),
            "/api/shows/:id/episodes/:id"
        );
        assert_eq!(
            sanitize_path("/api/poster-projects/p1/prompts"),
            "/api/poster-projects/:id/prompts"
        );
        assert_eq!(
            sanitize_path("/hooks/poster-projects/p1/frames"),
            "/hooks/poster-projects/:id/frames"
        );
    }

    #[test]
    fn fixed_segments_are_kept() {
        assert_eq!(sanitize_path("/api/uploads/multipart"), "/api/uploads/multipart");
        assert_eq!(sanitize_path("/api/transcoding/bulk"), "/api/transcoding/bulk");
        assert_eq!(sanitize_path("/api/media"), "/api/media");
        assert_eq!(sanitize_path("/api/uploads/m1/complete"), "/api/uploads/:id/complete");
    }
}
