pub mod config;
pub mod handlers;
pub mod metrics;

use ntex::http::Method;
use ntex::web;
use ntex::web::middleware::DefaultHeaders;
use serde::Serialize;

use crate::metrics::RelayMetrics;
use stream_publisher::Publish;

/// Shared per-process state, injected into every handler. Generic over the
/// publisher so tests run the real handlers against an in-memory one.
pub struct AppState<P> {
    pub publisher: P,
    pub version: String,
    pub metrics: RelayMetrics,
}

/// The relay's fixed response envelope. Status codes are strings on the wire.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub statuscode: &'static str,
    pub status: &'static str,
    pub message: &'static str,
}

impl StatusResponse {
    pub const SENT: StatusResponse = StatusResponse {
        statuscode: "200",
        status: "OK",
        message: "Stream data sent successfully",
    };

    pub const SEND_FAILED: StatusResponse = StatusResponse {
        statuscode: "500",
        status: "ERROR",
        message: "Could not send stream data",
    };

    pub const BODY_READ_FAILED: StatusResponse = StatusResponse {
        statuscode: "500",
        status: "ERROR",
        message: "Could not read body data",
    };
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
}

pub fn routes<P: Publish + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/v1/streamdata")
            .route(web::post().to(handlers::stream_data::<P>))
            .route(
                web::route()
                    .method(Method::OPTIONS)
                    .to(handlers::stream_preflight),
            ),
    )
    .service(web::resource("/api/v2/sys/info/isalive").route(web::get().to(handlers::is_alive::<P>)))
    .service(web::resource("/metrics").route(web::get().to(handlers::metrics_snapshot::<P>)));
}

/// Cross-origin and content-type headers carried by every response,
/// including the preflight one. Handlers that set their own content type
/// keep it.
pub fn default_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "POST, GET, OPTIONS, PUT, DELETE")
        .header(
            "Access-Control-Allow-Headers",
            "Accept, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization, \
             Accept-Language",
        )
}
