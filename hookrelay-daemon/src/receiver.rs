/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! HTTP side of the relay: every POST becomes one delivery on the ingestion queue.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use bytes::Bytes;
use hookrelay::Delivery;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

pub const MAX_BODY_BYTES: usize = 1 << 20;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const COMPONENT: &str = "http_receiver";

/// Accepts webhooks on any path.
pub fn app(ingress: mpsc::Sender<Delivery>) -> Router {
    app_with_timeout(ingress, REQUEST_TIMEOUT)
}

fn app_with_timeout(ingress: mpsc::Sender<Delivery>, request_timeout: Duration) -> Router {
    Router::new()
        .fallback(receive)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(ingress)
}

async fn receive(
    State(ingress): State<mpsc::Sender<Delivery>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    let delivery = Delivery::new(uri.path(), body).with_method(method.as_str());
    debug!(
        component = COMPONENT,
        path = delivery.path.as_str(),
        payload_len = delivery.payload.len(),
        "webhook received"
    );

    if ingress.send(delivery).await.is_err() {
        warn!(
            component = COMPONENT,
            "ingestion queue closed; rejecting webhook"
        );
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}
