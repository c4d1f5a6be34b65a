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

use crate::config::DaemonConfig;
use crate::receiver;
use anyhow::Context;
use hookrelay::{
    ingestion_channel, install_static_routes, sink_channel, DiskLogWriter, IpcServer, Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

const COMPONENT: &str = "daemon";

/// Runs every relay component until `shutdown` resolves, then stops them in order.
pub async fn run(
    config: DaemonConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let (ingress, ingress_rx) = ingestion_channel();
    let (router, router_handle) = Router::new(ingress_rx);
    let router_task = tokio::spawn(router.run());

    let (log_sink, log_rx) = sink_channel();
    let writer = DiskLogWriter::open(&config.log_dir)
        .with_context(|| format!("failed to open log dir {}", config.log_dir.display()))?;
    let writer_thread = writer
        .spawn(log_rx)
        .context("failed to start log writer thread")?;

    let fan_out_task = install_static_routes(&router_handle, &config.static_routes, vec![log_sink])
        .await
        .context("failed to install static routes")?;

    let ipc = Arc::new(
        IpcServer::bind(
            &config.socket_path,
            config.domain.clone(),
            router_handle.clone(),
        )
        .context("failed to bind subscription socket")?,
    );
    let serving = ipc.clone();
    let ipc_task = tokio::spawn(async move {
        if let Err(err) = serving.serve().await {
            error!(component = COMPONENT, err = %err, "subscription listener failed");
        }
    });
    drop(router_handle);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind HTTP port {}", config.port))?;
    info!(
        component = COMPONENT,
        port = config.port,
        socket = %config.socket_path.display(),
        data_dir = %config.data_dir.display(),
        log_dir = %config.log_dir.display(),
        static_routes = config.static_routes.len(),
        "hookrelay daemon started"
    );

    // The app owns the only ingestion sender; it is released when serving ends.
    axum::serve(listener, receiver::app(ingress))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;
    info!(component = COMPONENT, "HTTP server stopped");

    ipc.close();
    if let Err(err) = ipc_task.await {
        warn!(component = COMPONENT, err = %err, "subscription listener task panicked");
    }

    router_task.await.context("router task panicked")?;
    if let Some(fan_out_task) = fan_out_task {
        fan_out_task.await.context("fan-out task panicked")?;
    }
    tokio::task::spawn_blocking(move || writer_thread.join())
        .await
        .context("log writer join failed")?
        .map_err(|_| anyhow::anyhow!("log writer thread panicked"))?;

    info!(component = COMPONENT, "hookrelay daemon stopped");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(component = COMPONENT, err = %err, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(component = COMPONENT, err = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
    info!(component = COMPONENT, "shutdown signal received");
}
