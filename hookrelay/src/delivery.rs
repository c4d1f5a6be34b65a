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

//! Delivery events and the channel types that carry them.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Depth of the ingestion queue between the HTTP receiver and the router.
pub const INGESTION_QUEUE_CAPACITY: usize = 100;

/// Depth of each sink's outbound buffer.
pub const SINK_CAPACITY: usize = 100;

/// One accepted inbound publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub path: String,
    pub method: String,
    pub received_at: DateTime<Utc>,
    pub payload: Bytes,
}

impl Delivery {
    /// Builds a `POST` delivery stamped with the current time.
    pub fn new(path: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            method: "POST".to_string(),
            received_at: Utc::now(),
            payload: payload.into(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Payload rendered as text, replacing invalid UTF-8 with U+FFFD.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Sending half of a subscriber's outbound channel.
///
/// A sink is closed once every `Sink` clone for its channel has been dropped.
pub type Sink = mpsc::Sender<Arc<Delivery>>;

/// Receiving half paired with a [`Sink`].
pub type SinkReceiver = mpsc::Receiver<Arc<Delivery>>;

/// Creates a sink with the default outbound buffer depth.
pub fn sink_channel() -> (Sink, SinkReceiver) {
    mpsc::channel(SINK_CAPACITY)
}

/// Creates the bounded ingestion queue consumed by [`crate::Router`].
pub fn ingestion_channel() -> (mpsc::Sender<Delivery>, mpsc::Receiver<Delivery>) {
    mpsc::channel(INGESTION_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::Delivery;

    #[test]
    fn payload_text_replaces_invalid_utf8() {
        let delivery = Delivery::new("/p", vec![b'o', b'k', 0xff]);

        assert_eq!(delivery.payload_text(), "ok\u{fffd}");
    }

    #[test]
    fn payload_text_keeps_embedded_newlines() {
        let delivery = Delivery::new("/p", "line1\nline2");

        assert_eq!(delivery.payload_text(), "line1\nline2");
    }
}
