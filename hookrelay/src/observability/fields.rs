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

//! Canonical structured field values and value-format helpers.

pub const NONE: &str = "none";
pub const REASON_CLIENT_HANGUP: &str = "client_hangup";
pub const REASON_SINK_CLOSED: &str = "sink_closed";
pub const REASON_WRITE_FAILED: &str = "write_failed";
pub const REASON_SERVER_CLOSED: &str = "server_closed";
pub const REASON_INVALID_JSON: &str = "invalid_json";
pub const REASON_UNEXPECTED_TYPE: &str = "unexpected_type";

/// Longest payload prefix rendered into debug events.
pub const PAYLOAD_PREVIEW_LEN: usize = 64;

/// Renders a short, single-line preview of a payload for debug logging.
pub fn format_payload_preview(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(PAYLOAD_PREVIEW_LEN)];
    let mut preview: String = String::from_utf8_lossy(shown)
        .chars()
        .map(|ch| if ch.is_control() { '.' } else { ch })
        .collect();
    if payload.len() > PAYLOAD_PREVIEW_LEN {
        preview.push_str("...");
    }
    preview
}

/// Renders an optional value, falling back to [`NONE`].
pub fn format_optional(value: Option<&str>) -> &str {
    value.unwrap_or(NONE)
}
