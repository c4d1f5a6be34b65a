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

use clap::Args;
use hookrelay::{parse_static_routes, StaticRoute, DEFAULT_SOCKET_PATH};
use std::ffi::OsString;
use std::path::PathBuf;

const SYSTEM_DATA_DIR: &str = "/var/lib/hookrelay";
const APP_DIR_NAME: &str = "hookrelay";

#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    /// HTTP port for incoming webhooks.
    #[arg(long, env = "HOOKRELAY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Unix socket for subscription clients.
    #[arg(long, env = "HOOKRELAY_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,

    /// State directory. Defaults to a per-user state dir, or /var/lib/hookrelay for root.
    #[arg(long, env = "HOOKRELAY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory holding webhook.log. Defaults to the data directory.
    #[arg(long, env = "HOOKRELAY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Public base URL announced to subscribers, e.g. https://hooks.example.com
    #[arg(long, env = "HOOKRELAY_DOMAIN")]
    pub domain: Option<String>,

    /// Comma-separated `secret:label` pairs logged to disk.
    #[arg(long, env = "HOOKRELAY_ROUTES", default_value = "")]
    pub routes: String,
}

#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// Unix socket of the running daemon.
    #[arg(long, env = "HOOKRELAY_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
}

/// Fully resolved daemon settings. Built once before any task starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub port: u16,
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub domain: Option<String>,
    pub static_routes: Vec<StaticRoute>,
}

/// The environment inputs that shape the default data directory.
#[derive(Debug, Default)]
pub struct Environment {
    pub is_root: bool,
    pub xdg_state_home: Option<OsString>,
    pub home: Option<OsString>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            is_root: running_as_root(),
            xdg_state_home: std::env::var_os("XDG_STATE_HOME"),
            home: std::env::var_os("HOME"),
        }
    }
}

impl DaemonConfig {
    pub fn resolve(args: DaemonArgs, env: &Environment) -> Self {
        let data_dir = args.data_dir.unwrap_or_else(|| default_data_dir(env));
        let log_dir = args.log_dir.unwrap_or_else(|| data_dir.clone());

        Self {
            port: args.port,
            socket_path: args.socket,
            data_dir,
            log_dir,
            domain: args.domain.as_deref().and_then(normalize_domain),
            static_routes: parse_static_routes(&args.routes),
        }
    }
}

fn default_data_dir(env: &Environment) -> PathBuf {
    if env.is_root {
        return PathBuf::from(SYSTEM_DATA_DIR);
    }
    if let Some(xdg) = env.xdg_state_home.as_ref().filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join(APP_DIR_NAME);
    }
    if let Some(home) = env.home.as_ref().filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join(".local/state").join(APP_DIR_NAME);
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

fn normalize_domain(domain: &str) -> Option<String> {
    let trimmed = domain.trim().trim_end_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Checks the effective uid, which is what file permissions are decided by.
fn running_as_root() -> bool {
    // SAFETY: geteuid() is a POSIX syscall that cannot fail and touches no memory.
    unsafe { libc::geteuid() == 0 }
}
