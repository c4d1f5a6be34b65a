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

//! Append-only disk log sink with size and idle based truncation.

use crate::delivery::{Delivery, SinkReceiver};
use crate::observability::events;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, error, info, warn};

pub const LOG_FILE_NAME: &str = "webhook.log";
pub const DEFAULT_MAX_LOG_BYTES: u64 = 50 << 20;
pub const DEFAULT_IDLE_HOURS: i64 = 24;

const LOG_WRITER_THREAD_NAME: &str = "hookrelay-log-writer";
const COMPONENT: &str = "log_writer";

/// When the log file is discarded before the next append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub idle: chrono::Duration,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_LOG_BYTES,
            idle: chrono::Duration::hours(DEFAULT_IDLE_HOURS),
        }
    }
}

/// Writes one escaped line per delivery to `<dir>/webhook.log`.
///
/// A failed write is reported to the caller and the next write starts over by
/// reopening the file, so a transient disk error never wedges the sink.
pub struct DiskLogWriter {
    path: PathBuf,
    file: Option<File>,
    size: u64,
    last_write: DateTime<Utc>,
    policy: RotationPolicy,
}

impl DiskLogWriter {
    /// Creates `dir` if needed and opens the log file for appending.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut writer = Self {
            path: dir.join(LOG_FILE_NAME),
            file: None,
            size: 0,
            last_write: Utc::now(),
            policy: RotationPolicy::default(),
        };
        writer.reopen(Utc::now())?;
        Ok(writer)
    }

    pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Formats and appends one delivery.
    pub fn append(&mut self, delivery: &Delivery) -> io::Result<()> {
        let line = format_log_line(delivery);
        self.write_line(line.as_bytes(), Utc::now())
    }

    pub(crate) fn write_line(&mut self, line: &[u8], now: DateTime<Utc>) -> io::Result<()> {
        if self.file.is_none() {
            self.reopen(now)?;
        }

        if self.should_truncate(line.len() as u64, now) {
            info!(
                event = events::LOG_WRITER_ROTATE,
                component = COMPONENT,
                size = self.size,
                path = %self.path.display(),
                "truncating webhook log"
            );
            self.truncate(now)?;
        }

        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "log file not open"));
        };
        if let Err(err) = file.write_all(line) {
            self.file = None;
            return Err(err);
        }
        self.size += line.len() as u64;
        self.last_write = now;
        Ok(())
    }

    fn should_truncate(&self, incoming: u64, now: DateTime<Utc>) -> bool {
        self.size > 0
            && (self.size + incoming > self.policy.max_bytes
                || now.signed_duration_since(self.last_write) > self.policy.idle)
    }

    fn truncate(&mut self, now: DateTime<Utc>) -> io::Result<()> {
        self.file = None;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        self.reopen(now)
    }

    fn reopen(&mut self, now: DateTime<Utc>) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.size = file.metadata()?.len();
        self.last_write = now;
        self.file = Some(file);
        debug!(
            event = events::LOG_WRITER_OPEN,
            component = COMPONENT,
            size = self.size,
            path = %self.path.display(),
            "webhook log opened"
        );
        Ok(())
    }

    /// Moves the writer onto a dedicated thread draining `receiver`.
    ///
    /// Write failures are logged and the thread keeps consuming.
    pub fn spawn(mut self, mut receiver: SinkReceiver) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(LOG_WRITER_THREAD_NAME.to_string())
            .spawn(move || {
                while let Some(delivery) = receiver.blocking_recv() {
                    if let Err(err) = self.append(&delivery) {
                        error!(
                            event = events::LOG_WRITER_WRITE_FAILED,
                            component = COMPONENT,
                            path = delivery.path.as_str(),
                            err = %err,
                            "failed to append webhook log line"
                        );
                    }
                }
                if let Some(file) = self.file.as_mut() {
                    if let Err(err) = file.flush() {
                        warn!(component = COMPONENT, err = %err, "flush on shutdown failed");
                    }
                }
                info!(
                    event = events::LOG_WRITER_STOP,
                    component = COMPONENT,
                    "log writer input closed; stopping"
                );
            })
    }
}

/// `<RFC3339 nanos> <METHOD> <path> <escaped payload>\n`
pub fn format_log_line(delivery: &Delivery) -> String {
    format!(
        "{} {} {} {}\n",
        delivery
            .received_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true),
        delivery.method,
        delivery.path,
        escape_payload(&delivery.payload)
    )
}

/// Escapes payload bytes so the record stays on one line.
pub fn escape_payload(data: &[u8]) -> String {
    let mut escaped = String::with_capacity(data.len());
    for &byte in data {
        match byte {
            b'\\' => escaped.push_str("\\\\"),
            b'\n' => escaped.push_str("\\n"),
            b'\r' => escaped.push_str("\\r"),
            b'\t' => escaped.push_str("\\t"),
            0x20..=0x7e => escaped.push(byte as char),
            _ => {
                let _ = write!(escaped, "\\x{byte:02x}");
            }
        }
    }
    escaped
}
