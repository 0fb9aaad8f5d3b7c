use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use log::{debug, error};
use ntex::util::BytesMut;
use ntex::web::{self, HttpResponse};

use stream_publisher::Publish;

use crate::{AppState, StatusResponse, VersionResponse};

/// POST /api/v1/streamdata
///
/// Relays the raw request body to the broker and answers only after the
/// delivery for this particular message is confirmed. Error detail stays in
/// the log; clients get one of the canned envelopes.
pub async fn stream_data<P: Publish + 'static>(
    state: web::types::State<Arc<AppState<P>>>,
    mut payload: web::types::Payload,
) -> HttpResponse {
    let started = Instant::now();

    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        match chunk {
            Ok(bytes) => body.extend_from_slice(&bytes),
            Err(e) => {
                error!("could not read body data: {e}");
                state.metrics.observe_stream(false, started.elapsed());
                return HttpResponse::InternalServerError()
                    .json(&StatusResponse::BODY_READ_FAILED);
            }
        }
    }

    match state.publisher.publish(&body).await {
        Ok(delivery) => {
            debug!(
                "stream data relayed, partition={} offset={}",
                delivery.partition, delivery.offset
            );
            state.metrics.record_publish_ok();
            state.metrics.observe_stream(true, started.elapsed());
            HttpResponse::Ok().json(&StatusResponse::SENT)
        }
        Err(e) => {
            error!("could not send stream data: {e}");
            state.metrics.record_publish_error();
            state.metrics.observe_stream(false, started.elapsed());
            HttpResponse::InternalServerError().json(&StatusResponse::SEND_FAILED)
        }
    }
}

/// OPTIONS /api/v1/streamdata
///
/// Browser preflight. The cross-origin headers come from the default-header
/// middleware, so an empty 200 is all that is needed here.
pub async fn stream_preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// GET /api/v2/sys/info/isalive
pub async fn is_alive<P: Publish + 'static>(
    state: web::types::State<Arc<AppState<P>>>,
) -> HttpResponse {
    state.metrics.observe_isalive();
    HttpResponse::Ok().json(&VersionResponse {
        version: state.version.clone(),
    })
}

/// GET /metrics
pub async fn metrics_snapshot<P: Publish + 'static>(
    state: web::types::State<Arc<AppState<P>>>,
) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.metrics.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RelayMetrics;
    use crate::{default_headers, routes};
    use futures::stream;
    use ntex::http::error::PayloadError;
    use ntex::http::{Method, StatusCode};
    use ntex::util::Bytes;
    use ntex::web::{test, App};
    use serde_json::Value;
    use stream_publisher::MemoryPublisher;

    fn state(publisher: MemoryPublisher) -> Arc<AppState<MemoryPublisher>> {
        Arc::new(AppState {
            publisher,
            version: "1.0.3".to_string(),
            metrics: RelayMetrics::new(),
        })
    }

    #[ntex::test]
    async fn valid_envelope_is_relayed_with_its_id_as_key() {
        let publisher = MemoryPublisher::new();
        let app = test::init_service(
            App::new()
                .state(state(publisher.clone()))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let raw = r#"{"Id": "abc123", "reading": 42}"#;
        let req = test::TestRequest::post()
            .uri("/api/v1/streamdata")
            .set_payload(raw)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get("Access-Control-Allow-Origin")
                .unwrap()
                .to_str()
                .unwrap(),
            "*"
        );

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["statuscode"], "200");
        assert_eq!(parsed["status"], "OK");
        assert_eq!(parsed["message"], "Stream data sent successfully");

        let sent = publisher.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].key, "abc123");
        assert_eq!(sent[0].payload, raw.as_bytes());
    }

    #[ntex::test]
    async fn malformed_envelope_never_reaches_the_broker() {
        let publisher = MemoryPublisher::new();
        let app = test::init_service(
            App::new()
                .state(state(publisher.clone()))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/streamdata")
            .set_payload(r#"{"error"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["statuscode"], "500");
        assert_eq!(parsed["status"], "ERROR");
        assert_eq!(parsed["message"], "Could not send stream data");

        assert!(publisher.sent_messages().await.is_empty());
    }

    #[ntex::test]
    async fn envelope_without_id_is_rejected() {
        let publisher = MemoryPublisher::new();
        let app = test::init_service(
            App::new()
                .state(state(publisher.clone()))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/streamdata")
            .set_payload(r#"{"reading": 42}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(publisher.sent_messages().await.is_empty());
    }

    #[ntex::test]
    async fn preflight_answers_empty_with_cors_headers() {
        let publisher = MemoryPublisher::new();
        let app = test::init_service(
            App::new()
                .state(state(publisher.clone()))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/v1/streamdata")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get("Access-Control-Allow-Origin")
                .unwrap()
                .to_str()
                .unwrap(),
            "*"
        );
        assert_eq!(
            resp.headers()
                .get("Access-Control-Allow-Methods")
                .unwrap()
                .to_str()
                .unwrap(),
            "POST, GET, OPTIONS, PUT, DELETE"
        );
        assert_eq!(
            resp.headers()
                .get("Content-Type")
                .unwrap()
                .to_str()
                .unwrap(),
            "application/json"
        );

        let body = test::read_body(resp).await;
        assert!(body.is_empty());
        assert!(publisher.sent_messages().await.is_empty());
    }

    #[ntex::test]
    async fn delivery_failure_maps_to_the_canned_500() {
        let publisher = MemoryPublisher::rejecting();
        let app = test::init_service(
            App::new()
                .state(state(publisher.clone()))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/streamdata")
            .set_payload(r#"{"Id": "abc123", "reading": 42}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["message"], "Could not send stream data");
    }

    #[ntex::test]
    async fn publish_after_close_maps_to_the_canned_500() {
        let publisher = MemoryPublisher::new();
        publisher.close().unwrap();
        let app = test::init_service(
            App::new()
                .state(state(publisher.clone()))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/streamdata")
            .set_payload(r#"{"Id": "abc123"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["message"], "Could not send stream data");
    }

    #[ntex::test]
    async fn interrupted_body_read_maps_to_the_canned_500() {
        let publisher = MemoryPublisher::new();
        let app = test::init_service(
            App::new()
                .state(state(publisher.clone()))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let mut req = test::TestRequest::post()
            .uri("/api/v1/streamdata")
            .to_request();
        let interrupted = stream::iter(vec![
            Ok(Bytes::from_static(br#"{"Id": "abc"#)),
            Err(PayloadError::Incomplete(None)),
        ]);
        req.replace_payload(ntex::http::Payload::from_stream(interrupted));

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["statuscode"], "500");
        assert_eq!(parsed["status"], "ERROR");
        assert_eq!(parsed["message"], "Could not read body data");

        assert!(publisher.sent_messages().await.is_empty());
    }

    #[ntex::test]
    async fn isalive_reports_the_configured_version() {
        let publisher = MemoryPublisher::new();
        let app = test::init_service(
            App::new()
                .state(state(publisher.clone()))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v2/sys/info/isalive")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["version"], "1.0.3");
        assert!(publisher.sent_messages().await.is_empty());
    }

    #[ntex::test]
    async fn get_on_streamdata_is_not_allowed() {
        let publisher = MemoryPublisher::new();
        let app = test::init_service(
            App::new()
                .state(state(publisher))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/streamdata").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[ntex::test]
    async fn metrics_reflect_handled_traffic() {
        let publisher = MemoryPublisher::new();
        let app = test::init_service(
            App::new()
                .state(state(publisher))
                .wrap(default_headers())
                .configure(routes::<MemoryPublisher>),
        )
        .await;

        let ok = test::TestRequest::post()
            .uri("/api/v1/streamdata")
            .set_payload(r#"{"Id": "abc123"}"#)
            .to_request();
        test::call_service(&app, ok).await;
        let bad = test::TestRequest::post()
            .uri("/api/v1/streamdata")
            .set_payload("not json")
            .to_request();
        test::call_service(&app, bad).await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get("Content-Type")
                .unwrap()
                .to_str()
                .unwrap(),
            "text/plain; version=0.0.4"
        );

        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("stream_relay_http_requests_total{path=\"/api/v1/streamdata\"} 2"));
        assert!(text.contains("stream_relay_published_messages_total 1\n"));
        assert!(text.contains("stream_relay_publish_errors_total 1\n"));
    }
}
