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

//! # hookrelay
//!
//! `hookrelay` routes incoming webhook deliveries by request path to whoever
//! registered that path: an ephemeral subscriber on the local Unix socket, or a
//! permanent static route feeding the disk log.
//!
//! ## Ephemeral subscription
//!
//! ```
//! use hookrelay::{ingestion_channel, Delivery, IpcServer, Router, SubscriptionClient};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let dir = tempfile::tempdir().unwrap();
//! let socket = dir.path().join("hookrelay.sock");
//!
//! let (ingress, ingress_rx) = ingestion_channel();
//! let (router, handle) = Router::new(ingress_rx);
//! tokio::spawn(router.run());
//!
//! let server = std::sync::Arc::new(
//!     IpcServer::bind(&socket, Some("https://hooks.example".into()), handle.clone()).unwrap(),
//! );
//! let serving = server.clone();
//! tokio::spawn(async move { serving.serve().await });
//!
//! let mut client = SubscriptionClient::connect(&socket).await.unwrap();
//! let registration = client.register().await.unwrap();
//! assert!(registration.address().starts_with("https://hooks.example/tmp-"));
//!
//! ingress
//!     .send(Delivery::new(registration.path.clone(), "hello"))
//!     .await
//!     .unwrap();
//! assert_eq!(client.next_webhook().await.unwrap().as_deref(), Some("hello"));
//!
//! server.close();
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Router: single task owning the route table, fed by the ingestion queue and a
//!   command queue
//! - Control plane: route table and router commands
//! - Data plane: fan-out worker and disk log writer sinks
//! - IPC: socket listener, per-connection subscription state machine, wire frames
//! - Static routes: configuration parsing and installation
//!
//! ## Observability model
//!
//! Library code emits `tracing` events and never installs a global subscriber.
//! Binaries and tests initialize `tracing_subscriber` once at process start.

mod control_plane;
mod data_plane;

mod delivery;
pub use delivery::{
    ingestion_channel, sink_channel, Delivery, Sink, SinkReceiver, INGESTION_QUEUE_CAPACITY,
    SINK_CAPACITY,
};

pub use data_plane::fan_out::FanOut;
pub use data_plane::log_writer::{
    escape_payload, format_log_line, DiskLogWriter, RotationPolicy, DEFAULT_IDLE_HOURS,
    DEFAULT_MAX_LOG_BYTES, LOG_FILE_NAME,
};

pub mod ipc;
pub use ipc::{
    BindError, ClientError, IpcServer, Registration, ServeError, SubscriptionClient,
    DEFAULT_SOCKET_PATH,
};

#[doc(hidden)]
pub mod observability;

mod router;
pub use router::{Router, RouterError, RouterHandle};

mod static_routes;
pub use static_routes::{install_static_routes, parse_static_routes, StaticRoute};
