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

use crate::control_plane::route_table::RouteTable;
use crate::control_plane::router_command::{RouterCommand, COMMAND_QUEUE_CAPACITY};
use crate::delivery::{Delivery, Sink};
use crate::observability::{events, fields};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "router";

/// Failure to reach the router loop.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RouterError {
    #[error("router is no longer running")]
    Stopped,
}

/// Owner of the routing table and the single dispatch loop.
///
/// Every read and write of the table happens inside [`Router::run`]. Callers reach
/// the table through a [`RouterHandle`], whose commands travel the same loop as
/// deliveries, so the table needs no lock.
pub struct Router {
    ingress: mpsc::Receiver<Delivery>,
    commands: mpsc::Receiver<RouterCommand>,
    table: RouteTable,
}

/// Cloneable handle for mutating and inspecting a running [`Router`].
#[derive(Clone)]
pub struct RouterHandle {
    commands: mpsc::Sender<RouterCommand>,
}

impl Router {
    /// Creates a router consuming `ingress`, plus a handle for its command queue.
    pub fn new(ingress: mpsc::Receiver<Delivery>) -> (Self, RouterHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let router = Self {
            ingress,
            commands: commands_rx,
            table: RouteTable::new(),
        };
        (
            router,
            RouterHandle {
                commands: commands_tx,
            },
        )
    }

    /// Runs the routing loop until the ingestion queue is closed and drained.
    ///
    /// Deliveries and commands are serviced in whichever order they become ready.
    /// When the loop ends the table is dropped, which closes every sink it held.
    pub async fn run(mut self) {
        info!(
            event = events::ROUTER_START,
            component = COMPONENT,
            "router loop started"
        );

        let mut commands_open = true;
        loop {
            tokio::select! {
                delivery = self.ingress.recv() => match delivery {
                    Some(delivery) => self.route(delivery).await,
                    None => break,
                },
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.apply(command),
                    None => {
                        commands_open = false;
                        debug!(
                            event = events::ROUTER_COMMANDS_CLOSED,
                            component = COMPONENT,
                            route_count = self.table.len(),
                            "all router handles dropped; table is now fixed"
                        );
                    }
                },
            }
        }

        info!(
            event = events::ROUTER_STOP,
            component = COMPONENT,
            route_count = self.table.len(),
            "ingestion queue closed; router loop stopped"
        );
    }

    fn apply(&mut self, command: RouterCommand) {
        debug!(
            component = COMPONENT,
            command = command.kind(),
            "applying router command"
        );

        match command {
            RouterCommand::Register { path, sink } => {
                let replaced = self.table.insert(path.clone(), sink);
                match replaced {
                    // Dropping the previous handle closes that sink unless it is shared.
                    Some(previous) => {
                        warn!(
                            event = events::ROUTE_REPLACE,
                            component = COMPONENT,
                            path = path.as_str(),
                            "route re-registered; previous sink released"
                        );
                        drop(previous);
                    }
                    None => {
                        info!(
                            event = events::ROUTE_REGISTER,
                            component = COMPONENT,
                            path = path.as_str(),
                            route_count = self.table.len(),
                            "route registered"
                        );
                    }
                }
            }
            RouterCommand::Unregister { path } => match self.table.remove(&path) {
                Some(sink) => {
                    drop(sink);
                    info!(
                        event = events::ROUTE_UNREGISTER,
                        component = COMPONENT,
                        path = path.as_str(),
                        route_count = self.table.len(),
                        "route unregistered"
                    );
                }
                None => {
                    debug!(
                        event = events::ROUTE_UNREGISTER_MISSING,
                        component = COMPONENT,
                        path = path.as_str(),
                        "unregister for unknown path ignored"
                    );
                }
            },
            RouterCommand::ListRoutes { reply } => {
                let _ = reply.send(self.table.paths());
            }
        }
    }

    async fn route(&mut self, delivery: Delivery) {
        let Some(sink) = self.table.get(&delivery.path).cloned() else {
            debug!(
                event = events::ROUTE_MISS,
                component = COMPONENT,
                path = delivery.path.as_str(),
                payload_len = delivery.payload.len(),
                "no route for path; delivery dropped"
            );
            return;
        };

        let delivery = Arc::new(delivery);
        if tracing::enabled!(Level::DEBUG) {
            let preview = fields::format_payload_preview(&delivery.payload);
            debug!(
                event = events::ROUTE_DISPATCH,
                component = COMPONENT,
                path = delivery.path.as_str(),
                payload_len = delivery.payload.len(),
                payload = preview.as_str(),
                "dispatching delivery"
            );
        }

        let delivered = match sink.try_send(delivery.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(pending)) => {
                warn!(
                    event = events::ROUTE_BACKPRESSURE,
                    component = COMPONENT,
                    path = delivery.path.as_str(),
                    "sink buffer full; routing loop waiting on slow subscriber"
                );
                sink.send(pending).await.is_ok()
            }
            Err(TrySendError::Closed(_)) => false,
        };

        if !delivered && self.table.remove_if_same(&delivery.path, &sink) {
            info!(
                event = events::ROUTE_SINK_CLOSED,
                component = COMPONENT,
                path = delivery.path.as_str(),
                reason = fields::REASON_SINK_CLOSED,
                route_count = self.table.len(),
                "sink consumer gone; route removed"
            );
        }
    }
}

impl RouterHandle {
    /// Queues `path -> sink`, replacing any existing route for `path`.
    ///
    /// The table keeps `sink` until the path is unregistered or re-registered. A
    /// subscriber sink is closed on removal only if the table held its last sender.
    pub async fn register(&self, path: impl Into<String>, sink: Sink) -> Result<(), RouterError> {
        self.send(RouterCommand::Register {
            path: path.into(),
            sink,
        })
        .await
    }

    /// Queues removal of `path`; closing its sink. Unknown paths are ignored.
    pub async fn unregister(&self, path: impl Into<String>) -> Result<(), RouterError> {
        self.send(RouterCommand::Unregister { path: path.into() })
            .await
    }

    /// Queues removal of `path` without waiting, for use from `Drop`.
    ///
    /// When the command queue is momentarily full the command is handed to a
    /// background task on the current runtime.
    pub fn unregister_detached(&self, path: impl Into<String>) {
        let command = RouterCommand::Unregister { path: path.into() };
        match self.commands.try_send(command) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(command)) => {
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        let commands = self.commands.clone();
                        runtime.spawn(async move {
                            let _ = commands.send(command).await;
                        });
                    }
                    Err(err) => {
                        warn!(
                            component = COMPONENT,
                            err = %err,
                            "no runtime to queue detached unregister; route left in place"
                        );
                    }
                }
            }
        }
    }

    /// Currently registered paths, sorted.
    ///
    /// The reply is produced after every command queued before this call has been
    /// applied.
    pub async fn routes(&self) -> Result<Vec<String>, RouterError> {
        let (reply, response) = oneshot::channel();
        self.send(RouterCommand::ListRoutes { reply }).await?;
        response.await.map_err(|_| RouterError::Stopped)
    }

    async fn send(&self, command: RouterCommand) -> Result<(), RouterError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RouterError::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::{Router, RouterError};
    use crate::delivery::{ingestion_channel, sink_channel, Delivery, SINK_CAPACITY};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn register_then_route_delivers_payload_unchanged() {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (sink, mut rx) = sink_channel();
        handle.register("/test", sink).await.unwrap();
        handle.routes().await.unwrap();

        ingress.send(Delivery::new("/test", "hello")).await.unwrap();

        let delivery = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(&delivery.payload[..], b"hello");
        assert_eq!(delivery.path, "/test");
    }

    #[tokio::test]
    async fn unmatched_delivery_reaches_no_sink() {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (sink, mut rx) = sink_channel();
        handle.register("/registered", sink).await.unwrap();
        handle.routes().await.unwrap();

        ingress
            .send(Delivery::new("/unregistered", "ignored"))
            .await
            .unwrap();
        ingress.send(Delivery::new("/registered", "kept")).await.unwrap();

        let first = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(&first.payload[..], b"kept");
    }

    #[tokio::test]
    async fn unregister_closes_sink_and_drops_later_deliveries() {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (sink, mut rx) = sink_channel();
        handle.register("/test", sink).await.unwrap();
        handle.unregister("/test").await.unwrap();

        assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());

        ingress.send(Delivery::new("/test", "late")).await.unwrap();
        assert!(handle.routes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unregister_of_unknown_path_is_a_noop() {
        let (_ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (sink, _rx) = sink_channel();
        handle.register("/kept", sink).await.unwrap();
        handle.unregister("/missing").await.unwrap();

        assert_eq!(handle.routes().await.unwrap(), vec!["/kept".to_string()]);
    }

    #[tokio::test]
    async fn reregistration_routes_to_latest_sink_and_closes_previous() {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (first, mut first_rx) = sink_channel();
        let (second, mut second_rx) = sink_channel();
        handle.register("/p", first).await.unwrap();
        handle.register("/p", second).await.unwrap();
        handle.routes().await.unwrap();

        ingress.send(Delivery::new("/p", "x")).await.unwrap();

        assert!(timeout(WAIT, first_rx.recv()).await.unwrap().is_none());
        let delivery = timeout(WAIT, second_rx.recv()).await.unwrap().unwrap();
        assert_eq!(&delivery.payload[..], b"x");
    }

    #[tokio::test]
    async fn table_reflects_registered_and_not_unregistered_paths() {
        let (_ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let mut receivers = Vec::new();
        for path in ["/a", "/b", "/c", "/d"] {
            let (sink, rx) = sink_channel();
            receivers.push(rx);
            handle.register(path, sink).await.unwrap();
        }
        handle.unregister("/b").await.unwrap();
        handle.unregister("/d").await.unwrap();
        let (sink, rx) = sink_channel();
        receivers.push(rx);
        handle.register("/d", sink).await.unwrap();

        assert_eq!(handle.routes().await.unwrap(), vec!["/a", "/c", "/d"]);
    }

    #[tokio::test]
    async fn deliveries_for_one_path_keep_ingestion_order() {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (sink, mut rx) = sink_channel();
        handle.register("/ordered", sink).await.unwrap();
        handle.routes().await.unwrap();

        for i in 0..50 {
            ingress
                .send(Delivery::new("/ordered", format!("{i}")))
                .await
                .unwrap();
        }

        for i in 0..50 {
            let delivery = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(delivery.payload_text(), format!("{i}"));
        }
    }

    #[tokio::test]
    async fn full_sink_stalls_every_path_until_drained() {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (slow, mut slow_rx) = sink_channel();
        let (other, mut other_rx) = sink_channel();
        handle.register("/slow", slow).await.unwrap();
        handle.register("/other", other).await.unwrap();
        handle.routes().await.unwrap();

        let overflow = SINK_CAPACITY + 1;
        for i in 0..overflow {
            ingress
                .send(Delivery::new("/slow", format!("{i}")))
                .await
                .unwrap();
        }
        ingress.send(Delivery::new("/other", "behind")).await.unwrap();

        // The loop is parked on the full sink, so the later path sees nothing yet.
        assert!(timeout(Duration::from_millis(100), other_rx.recv())
            .await
            .is_err());

        for i in 0..overflow {
            let delivery = timeout(WAIT, slow_rx.recv()).await.unwrap().unwrap();
            assert_eq!(delivery.payload_text(), format!("{i}"));
        }
        let behind = timeout(WAIT, other_rx.recv()).await.unwrap().unwrap();
        assert_eq!(&behind.payload[..], b"behind");
    }

    #[tokio::test]
    async fn dropped_consumer_removes_route() {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (sink, rx) = sink_channel();
        handle.register("/gone", sink).await.unwrap();
        handle.routes().await.unwrap();
        drop(rx);

        ingress.send(Delivery::new("/gone", "x")).await.unwrap();

        let routes = timeout(WAIT, async {
            loop {
                let routes = handle.routes().await.unwrap();
                if routes.is_empty() {
                    break routes;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(routes.is_empty());
    }

    #[tokio::test]
    async fn run_returns_after_ingestion_closes_and_closes_sinks() {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        let task = tokio::spawn(router.run());

        let (sink, mut rx) = sink_channel();
        handle.register("/p", sink).await.unwrap();
        handle.routes().await.unwrap();
        ingress.send(Delivery::new("/p", "last")).await.unwrap();
        drop(ingress);

        timeout(WAIT, task).await.unwrap().unwrap();

        let last = rx.recv().await.unwrap();
        assert_eq!(&last.payload[..], b"last");
        assert!(rx.recv().await.is_none());
        assert_eq!(handle.routes().await, Err(RouterError::Stopped));
    }

    #[tokio::test]
    async fn detached_unregister_is_applied() {
        let (_ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (sink, mut rx) = sink_channel();
        handle.register("/p", sink).await.unwrap();
        handle.unregister_detached("/p");

        assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());
        assert!(handle.routes().await.unwrap().is_empty());
    }
}
