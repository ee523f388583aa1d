// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use pulse::{Pulse, PulseError};

pub const BEATS_ENDPOINT_PATH: &str = "/beats";
pub const HITS_ENDPOINT_PATH: &str = "/hits";

/// Window queried when a bound is missing
const DEFAULT_WINDOW: TimeDelta = TimeDelta::hours(1);

/// Query string of the read endpoints, both bounds in RFC 3339.
#[derive(Debug, Default, Deserialize)]
pub struct Window {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Window {
    /// Missing bounds default to the hour before `to`, `to` defaulting to now.
    /// The default `from` saturates at the earliest representable time.
    fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or_else(|| {
            to.checked_sub_signed(DEFAULT_WINDOW)
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        (from, to)
    }
}

/// Routes serving recorded Beats and Hits. Every request, these included, is
/// itself recorded as a Hit.
pub fn router(pulse: Pulse) -> Router {
    Router::new()
        .route(BEATS_ENDPOINT_PATH, get(beats))
        .route(HITS_ENDPOINT_PATH, get(hits))
        .layer(pulse.layer())
        .with_state(pulse)
}

async fn beats(State(pulse): State<Pulse>, Query(window): Query<Window>) -> Response {
    let (from, to) = window.bounds(Utc::now());
    debug!("Reading beats from {from} to {to}");
    match pulse.beats(from, to).await {
        Ok(beats) => Json(beats).into_response(),
        Err(e) => error_response(e),
    }
}

async fn hits(State(pulse): State<Pulse>, Query(window): Query<Window>) -> Response {
    let (from, to) = window.bounds(Utc::now());
    debug!("Reading hits from {from} to {to}");
    match pulse.hits(from, to).await {
        Ok(hits) => Json(hits).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: PulseError) -> Response {
    let status = match err {
        PulseError::Expired => StatusCode::GONE,
        PulseError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Query failed: {err}");
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pulse::{Batch, Beat, Config, MemoryStore, StoreError};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn pulse(expire: Duration) -> Pulse {
        let config = Config {
            expire,
            error_handler: Some(Arc::new(|_: Option<&StoreError>, _: Batch| {})),
            ..Default::default()
        };
        Pulse::new(config, Arc::new(MemoryStore::new()))
            .await
            .unwrap()
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_window_defaults() {
        let now = Utc::now();
        assert_eq!(Window::default().bounds(now), (now - DEFAULT_WINDOW, now));

        let to = now - TimeDelta::days(1);
        let window = Window {
            from: None,
            to: Some(to),
        };
        assert_eq!(window.bounds(now), (to - DEFAULT_WINDOW, to));
    }

    #[test]
    fn test_window_default_from_saturates() {
        let to = DateTime::<Utc>::MIN_UTC + TimeDelta::minutes(1);
        let window = Window {
            from: None,
            to: Some(to),
        };
        assert_eq!(window.bounds(Utc::now()), (DateTime::<Utc>::MIN_UTC, to));
    }

    #[tokio::test]
    async fn test_earliest_window_is_served() {
        let pulse = pulse(Duration::ZERO).await;
        let window = Window {
            from: None,
            to: Some(DateTime::<Utc>::MIN_UTC),
        };

        let response = hits(State(pulse), Query(window)).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_beats_endpoint() {
        let pulse = pulse(Duration::ZERO).await;
        pulse.push_beat(Beat::new(Utc::now(), "INFO", "started"));

        let (status, body) = get_json(router(pulse), BEATS_ENDPOINT_PATH).await;

        assert_eq!(status, StatusCode::OK);
        let beats = body.as_array().unwrap();
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0]["body"], "started");
        assert_eq!(beats[0]["level"], "INFO");
    }

    #[tokio::test]
    async fn test_hits_endpoint_sees_earlier_requests() {
        let pulse = pulse(Duration::ZERO).await;
        let app = router(pulse);

        let (status, _) = get_json(app.clone(), BEATS_ENDPOINT_PATH).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_json(app, HITS_ENDPOINT_PATH).await;
        assert_eq!(status, StatusCode::OK);
        let hits = body.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["path"], BEATS_ENDPOINT_PATH);
        assert_eq!(hits[0]["status"], 200);
    }

    #[tokio::test]
    async fn test_expired_window_is_gone() {
        let pulse = pulse(Duration::from_secs(3600)).await;
        let to = (Utc::now() - TimeDelta::hours(2)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let (status, body) = get_json(router(pulse), &format!("{HITS_ENDPOINT_PATH}?to={to}")).await;

        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"], PulseError::Expired.to_string());
    }
}
