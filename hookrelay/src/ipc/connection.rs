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

//! Per-connection subscription state machine.
//!
//! A connection moves through awaiting-registration, registered, streaming and
//! terminal. The route is held by a [`SubscriptionGuard`], so it is unregistered on
//! every exit path, including task cancellation.

use crate::delivery::{sink_channel, SinkReceiver};
use crate::ipc::path_token::generate_subscription_path;
use crate::ipc::protocol::{self, ProtocolError, Response, MAX_REQUEST_LINE_BYTES};
use crate::observability::{events, fields};
use crate::router::RouterHandle;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const COMPONENT: &str = "ipc_connection";
const ROUTER_UNAVAILABLE: &str = "router unavailable";

/// Why the streaming phase ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StreamEnd {
    SinkClosed,
    ClientHangup,
    WriteFailed,
    ServerClosed,
}

impl StreamEnd {
    fn reason(self) -> &'static str {
        match self {
            StreamEnd::SinkClosed => fields::REASON_SINK_CLOSED,
            StreamEnd::ClientHangup => fields::REASON_CLIENT_HANGUP,
            StreamEnd::WriteFailed => fields::REASON_WRITE_FAILED,
            StreamEnd::ServerClosed => fields::REASON_SERVER_CLOSED,
        }
    }
}

/// Unregisters its path when dropped.
struct SubscriptionGuard {
    router: RouterHandle,
    path: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.router
            .unregister_detached(std::mem::take(&mut self.path));
    }
}

/// Shared, read-only context for every connection a server accepts.
#[derive(Clone)]
pub(crate) struct ConnectionContext {
    pub(crate) router: RouterHandle,
    pub(crate) domain: Option<Arc<str>>,
    /// Flips to `true` when the owning server closes.
    pub(crate) shutdown: watch::Receiver<bool>,
}

/// Drives one accepted connection to completion.
pub(crate) async fn handle_connection<R, W>(
    context: ConnectionContext,
    conn_id: String,
    read_half: R,
    mut write_half: W,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(read_half);

    // Awaiting registration.
    let line = match read_request_line(&mut reader).await {
        Ok(Some(line)) => line,
        Ok(None) => {
            debug!(
                component = COMPONENT,
                conn_id = conn_id.as_str(),
                reason = fields::REASON_CLIENT_HANGUP,
                "connection closed before a request line"
            );
            return;
        }
        Err(RequestLineError::TooLong) => {
            reject(&mut write_half, &conn_id, ProtocolError::RequestTooLong).await;
            return;
        }
        Err(RequestLineError::Io(err)) => {
            debug!(
                component = COMPONENT,
                conn_id = conn_id.as_str(),
                err = %err,
                "failed to read request line"
            );
            return;
        }
    };

    if let Err(err) = protocol::decode_request(&line) {
        reject(&mut write_half, &conn_id, err).await;
        return;
    }

    // Registered.
    let path = generate_subscription_path();
    let (sink, mut deliveries) = sink_channel();
    if context.router.register(path.clone(), sink).await.is_err() {
        let _ = write_frame(&mut write_half, &Response::error(ROUTER_UNAVAILABLE)).await;
        let _ = write_half.shutdown().await;
        return;
    }
    let _subscription = SubscriptionGuard {
        router: context.router.clone(),
        path: path.clone(),
    };

    let registered = Response::registered(&path, context.domain.as_deref());
    if let Err(err) = write_frame(&mut write_half, &registered).await {
        debug!(
            event = events::IPC_WRITE_FAILED,
            component = COMPONENT,
            conn_id = conn_id.as_str(),
            err = %err,
            "failed to send registered frame"
        );
        return;
    }
    info!(
        event = events::IPC_SUBSCRIPTION_OPEN,
        component = COMPONENT,
        conn_id = conn_id.as_str(),
        "subscription registered"
    );
    debug!(
        component = COMPONENT,
        conn_id = conn_id.as_str(),
        path = path.as_str(),
        domain = fields::format_optional(context.domain.as_deref()),
        "subscription path assigned"
    );

    // Streaming.
    let mut shutdown = context.shutdown.clone();
    let end = stream_deliveries(
        &mut reader,
        &mut write_half,
        &mut deliveries,
        &mut shutdown,
        &conn_id,
    )
    .await;

    // Terminal: the guard unregisters before the halves are dropped.
    info!(
        event = events::IPC_SUBSCRIPTION_CLOSED,
        component = COMPONENT,
        conn_id = conn_id.as_str(),
        reason = end.reason(),
        "subscription closed"
    );
}

enum RequestLineError {
    TooLong,
    Io(io::Error),
}

/// Reads the registration line. `Ok(None)` means the client left without sending one.
async fn read_request_line<R>(reader: &mut BufReader<R>) -> Result<Option<Vec<u8>>, RequestLineError>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    let read = reader
        .take(MAX_REQUEST_LINE_BYTES as u64)
        .read_until(b'\n', &mut line)
        .await
        .map_err(RequestLineError::Io)?;

    if line.ends_with(b"\n") {
        Ok(Some(line))
    } else if read >= MAX_REQUEST_LINE_BYTES {
        Err(RequestLineError::TooLong)
    } else {
        Ok(None)
    }
}

async fn reject<W>(writer: &mut W, conn_id: &str, err: ProtocolError)
where
    W: AsyncWrite + Unpin,
{
    let reason = match &err {
        ProtocolError::InvalidJson(_) | ProtocolError::RequestTooLong => {
            fields::REASON_INVALID_JSON
        }
        ProtocolError::UnexpectedType => fields::REASON_UNEXPECTED_TYPE,
    };
    warn!(
        event = events::IPC_REQUEST_REJECTED,
        component = COMPONENT,
        conn_id,
        reason,
        err = %err,
        "rejecting subscription request"
    );

    let _ = write_frame(writer, &Response::error(err.to_string())).await;
    let _ = writer.shutdown().await;
}

/// Forwards deliveries as webhook frames until the sink closes, a write fails, the
/// client drops the connection or the server shuts down.
///
/// End-of-file on the read half is a half-close, not a hangup: the client may still
/// be reading, so streaming continues and a departed peer surfaces on the next write.
pub(crate) async fn stream_deliveries<R, W>(
    reader: &mut R,
    writer: &mut W,
    deliveries: &mut SinkReceiver,
    shutdown: &mut watch::Receiver<bool>,
    conn_id: &str,
) -> StreamEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut discard = [0u8; 512];
    let mut reading = true;
    loop {
        tokio::select! {
            _ = server_closed(shutdown) => return StreamEnd::ServerClosed,
            delivery = deliveries.recv() => {
                let Some(delivery) = delivery else {
                    return StreamEnd::SinkClosed;
                };
                let frame = Response::webhook(delivery.payload_text());
                // A stalled client must not hold the connection open past shutdown.
                let written = tokio::select! {
                    _ = server_closed(shutdown) => return StreamEnd::ServerClosed,
                    written = write_frame(writer, &frame) => written,
                };
                if let Err(err) = written {
                    debug!(
                        event = events::IPC_WRITE_FAILED,
                        component = COMPONENT,
                        conn_id,
                        path = delivery.path.as_str(),
                        err = %err,
                        "failed to forward webhook frame"
                    );
                    return StreamEnd::WriteFailed;
                }
            }
            read = reader.read(&mut discard), if reading => match read {
                // Anything sent after registration is ignored.
                Ok(0) => {
                    debug!(
                        component = COMPONENT,
                        conn_id,
                        "client half-closed; streaming continues"
                    );
                    reading = false;
                }
                Ok(_) => {}
                Err(_) => return StreamEnd::ClientHangup,
            },
        }
    }
}

/// Resolves once the server has signalled shutdown or has gone away.
async fn server_closed(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn write_frame<W>(writer: &mut W, frame: &Response) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = protocol::encode_frame(frame).map_err(io::Error::other)?;
    writer.write_all(&bytes).await
}

#[cfg(test)]
mod tests {
    use super::{handle_connection, stream_deliveries, ConnectionContext, StreamEnd};
    use crate::delivery::{ingestion_channel, sink_channel, Delivery};
    use crate::ipc::path_token::is_subscription_path;
    use crate::ipc::protocol::{decode_frame, Response, MAX_REQUEST_LINE_BYTES};
    use crate::router::Router;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::sync::watch;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    struct TestRelay {
        context: ConnectionContext,
        ingress: tokio::sync::mpsc::Sender<Delivery>,
        shutdown: watch::Sender<bool>,
    }

    fn test_relay(domain: Option<&str>) -> TestRelay {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());
        let (shutdown, shutdown_rx) = watch::channel(false);
        TestRelay {
            context: ConnectionContext {
                router: handle,
                domain: domain.map(Arc::from),
                shutdown: shutdown_rx,
            },
            ingress,
            shutdown,
        }
    }

    #[tokio::test]
    async fn register_then_receive_webhook_frames() {
        let TestRelay {
            context,
            ingress,
            shutdown: _shutdown,
        } = test_relay(Some("https://example.com"));
        let router = context.router.clone();
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let task = tokio::spawn(handle_connection(
            context,
            "conn".to_string(),
            server_read,
            server_write,
        ));

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut client_read = BufReader::new(client_read);
        client_write
            .write_all(b"{\"type\":\"register\"}\n")
            .await
            .unwrap();

        let mut line = String::new();
        timeout(WAIT, client_read.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        let Response::Registered { path, url } = decode_frame::<Response>(line.as_bytes()).unwrap()
        else {
            panic!("expected registered frame, got {line}");
        };
        assert!(is_subscription_path(&path));
        assert_eq!(url, Some(format!("https://example.com{path}")));
        assert_eq!(router.routes().await.unwrap(), vec![path.clone()]);

        ingress
            .send(Delivery::new(path.clone(), "line1\nline2"))
            .await
            .unwrap();
        line.clear();
        timeout(WAIT, client_read.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            decode_frame::<Response>(line.as_bytes()).unwrap(),
            Response::webhook("line1\nline2")
        );

        // A departed client is noticed on the next write.
        drop(client_write);
        drop(client_read);
        ingress
            .send(Delivery::new(path.clone(), "after hangup"))
            .await
            .unwrap();
        timeout(WAIT, task).await.unwrap().unwrap();
        assert!(router.routes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn half_closed_client_keeps_receiving_webhooks() {
        let TestRelay {
            context,
            ingress,
            shutdown: _shutdown,
        } = test_relay(None);
        let router = context.router.clone();
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        tokio::spawn(handle_connection(
            context,
            "conn".to_string(),
            server_read,
            server_write,
        ));

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut client_read = BufReader::new(client_read);
        client_write
            .write_all(b"{\"type\":\"register\"}\n")
            .await
            .unwrap();
        client_write.shutdown().await.unwrap();

        let mut line = String::new();
        timeout(WAIT, client_read.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        let Response::Registered { path, .. } = decode_frame::<Response>(line.as_bytes()).unwrap()
        else {
            panic!("expected registered frame, got {line}");
        };

        ingress
            .send(Delivery::new(path.clone(), "hello"))
            .await
            .unwrap();
        line.clear();
        timeout(WAIT, client_read.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            decode_frame::<Response>(line.as_bytes()).unwrap(),
            Response::webhook("hello")
        );
        assert_eq!(router.routes().await.unwrap(), vec![path]);
    }

    #[tokio::test]
    async fn unsupported_type_gets_one_error_frame_then_close() {
        let TestRelay {
            context,
            ingress: _ingress,
            shutdown: _shutdown,
        } = test_relay(None);
        let router = context.router.clone();
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let task = tokio::spawn(handle_connection(
            context,
            "conn".to_string(),
            server_read,
            server_write,
        ));

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(b"{\"type\":\"bogus\"}\n")
            .await
            .unwrap();

        let mut received = String::new();
        timeout(WAIT, client_read.read_to_string(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, "{\"type\":\"error\",\"data\":\"expected register\"}\n");

        timeout(WAIT, task).await.unwrap().unwrap();
        assert!(router.routes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_request_is_rejected() {
        let TestRelay {
            context,
            ingress: _ingress,
            shutdown: _shutdown,
        } = test_relay(None);
        let (client, server) = duplex(MAX_REQUEST_LINE_BYTES * 2);
        let (server_read, server_write) = tokio::io::split(server);
        let task = tokio::spawn(handle_connection(
            context,
            "conn".to_string(),
            server_read,
            server_write,
        ));

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(&vec![b' '; MAX_REQUEST_LINE_BYTES + 1])
            .await
            .unwrap();

        let mut received = String::new();
        timeout(WAIT, client_read.read_to_string(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, "{\"type\":\"error\",\"data\":\"request too long\"}\n");
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn hangup_before_request_closes_quietly() {
        let TestRelay {
            context,
            ingress: _ingress,
            shutdown: _shutdown,
        } = test_relay(None);
        let (client, server) = duplex(64);
        let (server_read, server_write) = tokio::io::split(server);
        let task = tokio::spawn(handle_connection(
            context,
            "conn".to_string(),
            server_read,
            server_write,
        ));

        drop(client);
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stream_ends_when_sink_closes() {
        let (sink, mut deliveries) = sink_channel();
        let (_shutdown, mut shutdown_rx) = watch::channel(false);
        let (_client, server) = duplex(64);
        let (mut server_read, mut server_write) = tokio::io::split(server);
        drop(sink);

        let end = stream_deliveries(
            &mut server_read,
            &mut server_write,
            &mut deliveries,
            &mut shutdown_rx,
            "c",
        )
        .await;

        assert_eq!(end, StreamEnd::SinkClosed);
    }

    #[tokio::test]
    async fn departed_client_ends_stream_on_next_write() {
        let (sink, mut deliveries) = sink_channel();
        let (_shutdown, mut shutdown_rx) = watch::channel(false);
        let (client, server) = duplex(64);
        let (mut server_read, mut server_write) = tokio::io::split(server);
        drop(client);
        sink.send(Arc::new(Delivery::new("/p", "x"))).await.unwrap();

        let end = timeout(
            WAIT,
            stream_deliveries(
                &mut server_read,
                &mut server_write,
                &mut deliveries,
                &mut shutdown_rx,
                "c",
            ),
        )
        .await
        .unwrap();

        assert_eq!(end, StreamEnd::WriteFailed);
    }

    #[tokio::test]
    async fn read_eof_alone_does_not_end_stream() {
        let (_sink, mut deliveries) = sink_channel();
        let (_shutdown, mut shutdown_rx) = watch::channel(false);
        let (client, server) = duplex(64);
        let (mut server_read, mut server_write) = tokio::io::split(server);
        let (_client_read, mut client_write) = tokio::io::split(client);
        client_write.shutdown().await.unwrap();

        let pending = timeout(
            Duration::from_millis(100),
            stream_deliveries(
                &mut server_read,
                &mut server_write,
                &mut deliveries,
                &mut shutdown_rx,
                "c",
            ),
        )
        .await;

        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn server_shutdown_ends_stalled_stream() {
        let (sink, mut deliveries) = sink_channel();
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        // The client never reads, so the frame cannot be written in full.
        let (_client, server) = duplex(64);
        let (mut server_read, mut server_write) = tokio::io::split(server);
        sink.send(Arc::new(Delivery::new("/p", "x".repeat(256))))
            .await
            .unwrap();

        let end = {
            let stream = stream_deliveries(
                &mut server_read,
                &mut server_write,
                &mut deliveries,
                &mut shutdown_rx,
                "c",
            );
            tokio::pin!(stream);
            assert!(timeout(Duration::from_millis(100), &mut stream)
                .await
                .is_err());

            shutdown.send_replace(true);
            timeout(WAIT, stream).await.unwrap()
        };

        assert_eq!(end, StreamEnd::ServerClosed);
        drop(deliveries);
        assert!(sink.send(Arc::new(Delivery::new("/p", "late"))).await.is_err());
    }
}
