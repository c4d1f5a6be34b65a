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

//! Fan-out worker that copies each delivery onto several downstream sinks.

use crate::delivery::{sink_channel, Sink, SinkReceiver};
use crate::observability::events;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "fan_out";

/// Intermediary sink that forwards every delivery to all of its targets.
pub struct FanOut {
    targets: Vec<Sink>,
}

impl FanOut {
    pub fn new(targets: Vec<Sink>) -> Self {
        Self { targets }
    }

    /// Spawns the dispatch loop and returns its input sink.
    ///
    /// The loop ends once every clone of the returned sink has been dropped.
    pub fn spawn(self) -> (Sink, JoinHandle<()>) {
        let (input, receiver) = sink_channel();
        let task = tokio::spawn(Self::dispatch_loop(self.targets, receiver));
        (input, task)
    }

    /// Forwards each received delivery to the targets in order, waiting on full ones.
    pub(crate) async fn dispatch_loop(mut targets: Vec<Sink>, mut receiver: SinkReceiver) {
        info!(
            event = events::FANOUT_START,
            component = COMPONENT,
            sink_count = targets.len(),
            "fan-out started"
        );

        while let Some(delivery) = receiver.recv().await {
            let mut open = Vec::with_capacity(targets.len());
            for target in targets.drain(..) {
                if target.send(delivery.clone()).await.is_ok() {
                    open.push(target);
                } else {
                    warn!(
                        event = events::FANOUT_SINK_CLOSED,
                        component = COMPONENT,
                        path = delivery.path.as_str(),
                        "fan-out target closed; dropping it"
                    );
                }
            }
            targets = open;
            debug!(
                component = COMPONENT,
                path = delivery.path.as_str(),
                sink_count = targets.len(),
                "delivery fanned out"
            );
        }

        info!(
            event = events::FANOUT_STOP,
            component = COMPONENT,
            "fan-out input closed; stopping"
        );
    }
}
