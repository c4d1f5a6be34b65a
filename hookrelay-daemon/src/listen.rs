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

use crate::config::ListenArgs;
use anyhow::Context;
use hookrelay::SubscriptionClient;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Registers with the daemon and copies every webhook payload to `out`.
///
/// The assigned address goes to stderr so `out` carries payloads only.
pub async fn run<W>(args: &ListenArgs, out: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut client = SubscriptionClient::connect(&args.socket)
        .await
        .context("is the daemon running?")?;
    let registration = client.register().await?;
    eprintln!("listening on {}", registration.address());

    while let Some(data) = client.next_webhook().await? {
        out.write_all(data.as_bytes()).await?;
        if !data.ends_with('\n') {
            out.write_all(b"\n").await?;
        }
        out.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::run;
    use crate::config::ListenArgs;
    use hookrelay::{ingestion_channel, Delivery, IpcServer, Router};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn prints_payloads_until_daemon_goes_away() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("hookrelay.sock");

        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        let router_task = tokio::spawn(router.run());
        let server = Arc::new(IpcServer::bind(&socket, None, handle.clone()).unwrap());
        let serving = server.clone();
        tokio::spawn(async move { serving.serve().await });

        let args = ListenArgs {
            socket: socket.clone(),
        };
        let listener = tokio::spawn(async move {
            let mut out = Vec::new();
            run(&args, &mut out).await.map(|()| out)
        });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        let path = loop {
            if let Some(path) = handle.routes().await.unwrap().pop() {
                break path;
            }
            assert!(tokio::time::Instant::now() < deadline, "client never registered");
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        ingress.send(Delivery::new(path.clone(), "hello")).await.unwrap();
        ingress
            .send(Delivery::new(path, "line1\nline2\n"))
            .await
            .unwrap();
        drop(ingress);
        drop(handle);
        router_task.await.unwrap();

        let out = tokio::time::timeout(Duration::from_secs(2), listener)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello\nline1\nline2\n");
        server.close();
    }

    #[tokio::test]
    async fn missing_daemon_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = ListenArgs {
            socket: dir.path().join("absent.sock"),
        };

        let err = run(&args, &mut Vec::new()).await.unwrap_err();

        assert!(err.to_string().contains("daemon"));
    }
}
