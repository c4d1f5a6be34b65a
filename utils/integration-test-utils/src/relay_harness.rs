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

use hookrelay::{ingestion_channel, Delivery, IpcServer, Router, RouterHandle, ServeError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Upper bound tests wait for any single frame or delivery.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// A running router plus IPC server bound inside a private temp directory.
pub struct RelayHarness {
    pub router: RouterHandle,
    pub server: Arc<IpcServer>,
    ingress: Option<mpsc::Sender<Delivery>>,
    router_task: JoinHandle<()>,
    serve_task: JoinHandle<Result<(), ServeError>>,
    socket_path: PathBuf,
    _dir: TempDir,
}

impl RelayHarness {
    pub async fn start(domain: Option<&str>) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let socket_path = dir.path().join("run").join("hookrelay.sock");

        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        let router_task = tokio::spawn(router.run());

        let server = Arc::new(
            IpcServer::bind(&socket_path, domain.map(str::to_string), handle.clone())
                .expect("bind subscription socket"),
        );
        let serving = server.clone();
        let serve_task = tokio::spawn(async move { serving.serve().await });

        Self {
            router: handle,
            server,
            ingress: Some(ingress),
            router_task,
            serve_task,
            socket_path,
            _dir: dir,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Queues a POST delivery as the HTTP receiver would.
    pub async fn deliver(&self, path: &str, payload: &str) {
        self.ingress
            .as_ref()
            .expect("harness already shut down")
            .send(Delivery::new(path, payload.to_string()))
            .await
            .expect("router accepting deliveries");
    }

    /// Polls the route table until `predicate` holds or the timeout elapses.
    pub async fn wait_for_routes(&self, predicate: impl Fn(&[String]) -> bool) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            let routes = self.router.routes().await.expect("router running");
            if predicate(&routes) || tokio::time::Instant::now() >= deadline {
                return routes;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Closes the socket, then drains and stops the router.
    pub async fn shutdown(self) {
        let RelayHarness {
            router,
            server,
            ingress,
            router_task,
            serve_task,
            _dir,
            ..
        } = self;

        server.close();
        let serve_result = tokio::time::timeout(RECV_TIMEOUT, serve_task)
            .await
            .expect("serve loop stops after close")
            .expect("serve task joined");
        assert!(serve_result.is_ok());

        drop(ingress);
        drop(router);
        tokio::time::timeout(RECV_TIMEOUT, router_task)
            .await
            .expect("router stops after ingress closes")
            .expect("router task joined");
    }
}
