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

//! Unix-socket listener that bridges subscription clients to the router.

use crate::ipc::connection::{handle_connection, ConnectionContext};
use crate::observability::events;
use crate::router::RouterHandle;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_SOCKET_PATH: &str = "/run/hookrelay/hookrelay.sock";

const COMPONENT: &str = "ipc_server";

/// The socket address could not be used.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("socket {} is already served by a running listener", path.display())]
    InUse { path: PathBuf },
    #[error("failed to create socket directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove stale socket {}: {source}", path.display())]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind {}: {source}", path.display())]
    Listen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The accept loop ended on a transport error.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("accept failed: {0}")]
    Accept(#[from] io::Error),
}

/// Subscription-protocol listener.
///
/// `serve` runs the accept loop; `close` stops it, ends every live subscription,
/// releases the listener and removes the socket file. Dropping the server closes it.
pub struct IpcServer {
    listener: Mutex<Option<UnixListener>>,
    socket_path: PathBuf,
    context: ConnectionContext,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
}

impl IpcServer {
    /// Binds `socket_path`, creating parent directories and clearing a stale socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(
        socket_path: impl Into<PathBuf>,
        domain: Option<String>,
        router: RouterHandle,
    ) -> Result<Self, BindError> {
        let socket_path = socket_path.into();

        if let Some(parent) = socket_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BindError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if fs::symlink_metadata(&socket_path).is_ok() {
            if std::os::unix::net::UnixStream::connect(&socket_path).is_ok() {
                return Err(BindError::InUse { path: socket_path });
            }
            fs::remove_file(&socket_path).map_err(|source| BindError::RemoveStale {
                path: socket_path.clone(),
                source,
            })?;
            debug!(
                event = events::IPC_REMOVE_STALE_SOCKET,
                component = COMPONENT,
                socket = %socket_path.display(),
                "removed stale socket file"
            );
        }

        let listener = UnixListener::bind(&socket_path).map_err(|source| BindError::Listen {
            path: socket_path.clone(),
            source,
        })?;

        info!(
            event = events::IPC_BIND,
            component = COMPONENT,
            socket = %socket_path.display(),
            "subscription socket bound"
        );

        let (shutdown, connections_shutdown) = watch::channel(false);
        Ok(Self {
            listener: Mutex::new(Some(listener)),
            socket_path,
            context: ConnectionContext {
                router,
                domain: domain.filter(|d| !d.is_empty()).map(Arc::from),
                shutdown: connections_shutdown,
            },
            shutdown,
            closed: AtomicBool::new(false),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accepts connections until [`close`](Self::close) or an accept error.
    ///
    /// Each connection runs on its own task. Returns immediately if the server is
    /// already closed or another call is serving.
    pub async fn serve(&self) -> Result<(), ServeError> {
        let Some(listener) = self.take_listener() else {
            return Ok(());
        };
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let conn_id = Uuid::new_v4().to_string();
                        debug!(
                            event = events::IPC_ACCEPT,
                            component = COMPONENT,
                            conn_id = conn_id.as_str(),
                            "accepted subscription connection"
                        );
                        let (read_half, write_half) = stream.into_split();
                        tokio::spawn(handle_connection(
                            self.context.clone(),
                            conn_id,
                            read_half,
                            write_half,
                        ));
                    }
                    Err(err) => {
                        warn!(
                            event = events::IPC_ACCEPT_FAILED,
                            component = COMPONENT,
                            err = %err,
                            "accept failed; listener stopping"
                        );
                        return Err(ServeError::Accept(err));
                    }
                },
            }
        }
        Ok(())
    }

    /// Stops accepting, ends live subscriptions and removes the socket file.
    ///
    /// Ending the subscriptions drops their sinks' receivers, so a router blocked on
    /// a stalled subscriber is released. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.send_replace(true);
        drop(self.take_listener());

        match fs::remove_file(&self.socket_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                component = COMPONENT,
                socket = %self.socket_path.display(),
                err = %err,
                "failed to remove socket file"
            ),
        }
        info!(
            event = events::IPC_CLOSE,
            component = COMPONENT,
            socket = %self.socket_path.display(),
            "subscription socket closed"
        );
    }

    fn take_listener(&self) -> Option<UnixListener> {
        match self.listener.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.close();
    }
}
