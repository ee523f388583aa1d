// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tower middleware recording one Hit per HTTP request.

use axum::extract::ConnectInfo;
use chrono::Utc;
use http::header::{HeaderName, REFERER, USER_AGENT};
use http::{HeaderMap, Request, Response, StatusCode};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

use crate::constants::CLIENT_CLOSED_REQUEST;
use crate::pulse::Pulse;
use crate::record::Hit;

/// Layer wrapping services in a [`HitService`]
#[derive(Clone, Debug)]
pub struct HitLayer {
    pulse: Pulse,
}

impl HitLayer {
    pub fn new(pulse: Pulse) -> Self {
        Self { pulse }
    }
}

impl<S> Layer<S> for HitLayer {
    type Service = HitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HitService {
            inner,
            pulse: self.pulse.clone(),
        }
    }
}

/// Records a Hit once the wrapped service has answered.
///
/// The status comes from the response. When the wrapped service fails the
/// Hit is recorded with a 500 and the error is passed on unchanged. A
/// response future dropped before completion records a 499.
#[derive(Clone, Debug)]
pub struct HitService<S> {
    inner: S,
    pulse: Pulse,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for HitService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let at = Utc::now();
        let start = Instant::now();

        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();
        let hit = Hit::new(at, req.method().as_str(), req.uri().path())
            .with_remote_addr(remote_addr)
            .with_referer(header(req.headers(), &REFERER))
            .with_user_agent(header(req.headers(), &USER_AGENT));

        let pending = PendingHit {
            hit: Some(hit),
            start,
            pulse: self.pulse.clone(),
        };
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            let status = match &result {
                Ok(response) => response.status(),
                Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            pending.finish(status.as_u16());
            result
        })
    }
}

/// A Hit waiting for its response.
///
/// Dropped unfinished when the response future is abandoned, in which case
/// the Hit is still recorded with [`CLIENT_CLOSED_REQUEST`].
struct PendingHit {
    hit: Option<Hit>,
    start: Instant,
    pulse: Pulse,
}

impl PendingHit {
    fn finish(mut self, status: u16) {
        self.push(status);
    }

    fn push(&mut self, status: u16) {
        if let Some(hit) = self.hit.take() {
            self.pulse.push_hit(
                hit.with_status(status)
                    .with_duration(self.start.elapsed()),
            );
        }
    }
}

impl Drop for PendingHit {
    fn drop(&mut self) {
        self.push(CLIENT_CLOSED_REQUEST);
    }
}

fn header(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
