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

mod config;
mod daemon;
mod listen;
mod receiver;

use crate::config::{DaemonArgs, DaemonConfig, Environment, ListenArgs};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Webhook relay: receive HTTP webhooks and stream them to local subscribers.
#[derive(Parser)]
#[command(name = "hookrelay", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    listen: ListenArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP receiver, router and subscription socket.
    Daemon(DaemonArgs),
    /// Subscribe to a fresh path and print incoming payloads (the default).
    Listen(ListenArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Command::Daemon(args)) => {
            let config = DaemonConfig::resolve(args, &Environment::from_process());
            daemon::run(config, daemon::shutdown_signal()).await
        }
        Some(Command::Listen(args)) => listen::run(&args, &mut tokio::io::stdout()).await,
        None => listen::run(&cli.listen, &mut tokio::io::stdout()).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
