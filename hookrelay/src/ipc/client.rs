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

//! Client side of the subscription protocol.

use crate::ipc::protocol::{decode_frame, encode_frame, Request, Response};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

const COMPONENT: &str = "ipc_client";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("subscription socket i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Server(String),
    #[error("connection closed before registration completed")]
    ClosedBeforeRegistration,
}

/// Route assigned by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub path: String,
    pub url: Option<String>,
}

impl Registration {
    /// The public URL when the server knows its domain, otherwise the bare path.
    pub fn address(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.path)
    }
}

pub struct SubscriptionClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: Vec<u8>,
}

impl SubscriptionClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let socket_path = socket_path.as_ref();
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| ClientError::Connect {
                path: socket_path.to_path_buf(),
                source,
            })?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
            line: Vec::new(),
        })
    }

    /// Sends the register request and waits for the assigned route.
    pub async fn register(&mut self) -> Result<Registration, ClientError> {
        let request = encode_frame(&Request::Register)?;
        self.writer.write_all(&request).await?;
        self.writer.flush().await?;

        loop {
            match self.next_frame().await? {
                None => return Err(ClientError::ClosedBeforeRegistration),
                Some(Response::Registered { path, url }) => {
                    return Ok(Registration { path, url });
                }
                Some(Response::Error { data }) => return Err(ClientError::Server(data)),
                Some(Response::Webhook { .. }) => {}
            }
        }
    }

    /// Next webhook payload, or `None` once the server closes the stream.
    pub async fn next_webhook(&mut self) -> Result<Option<String>, ClientError> {
        loop {
            match self.next_frame().await? {
                None => return Ok(None),
                Some(Response::Webhook { data }) => return Ok(Some(data)),
                Some(Response::Error { data }) => return Err(ClientError::Server(data)),
                Some(Response::Registered { .. }) => {}
            }
        }
    }

    async fn next_frame(&mut self) -> Result<Option<Response>, ClientError> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line).await? == 0 {
                return Ok(None);
            }
            match decode_frame::<Response>(&self.line) {
                Ok(frame) => return Ok(Some(frame)),
                Err(err) => debug!(
                    component = COMPONENT,
                    err = %err,
                    "skipping unparseable frame"
                ),
            }
        }
    }
}
