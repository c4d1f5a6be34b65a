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

//! Line-delimited JSON frames exchanged over the subscription socket.

use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use thiserror::Error;

/// Upper bound on the registration request line, newline included.
pub const MAX_REQUEST_LINE_BYTES: usize = 4096;

/// Client to server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Register,
    #[serde(other)]
    Unsupported,
}

/// Server to client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Registered {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Webhook {
        data: String,
    },
    Error {
        data: String,
    },
}

impl Response {
    /// Builds the `registered` frame; `url` is `domain + path` when a domain is set.
    pub fn registered(path: &str, domain: Option<&str>) -> Self {
        Response::Registered {
            path: path.to_string(),
            url: domain.map(|domain| format!("{domain}{path}")),
        }
    }

    pub fn webhook(data: impl Into<String>) -> Self {
        Response::Webhook { data: data.into() }
    }

    pub fn error(data: impl Into<String>) -> Self {
        Response::Error { data: data.into() }
    }
}

/// Why a registration request was refused. The display text is sent to the client.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid json")]
    InvalidJson(#[source] serde_json::Error),
    #[error("expected register")]
    UnexpectedType,
    #[error("request too long")]
    RequestTooLong,
}

/// Decodes one request line. Anything other than a register request is an error.
pub fn decode_request(line: &[u8]) -> Result<Request, ProtocolError> {
    match serde_json::from_slice::<Request>(line) {
        Ok(Request::Register) => Ok(Request::Register),
        Ok(Request::Unsupported) => Err(ProtocolError::UnexpectedType),
        // Well-formed JSON of the wrong shape, such as a missing `type`.
        Err(err) if err.classify() == Category::Data => Err(ProtocolError::UnexpectedType),
        Err(err) => Err(ProtocolError::InvalidJson(err)),
    }
}

/// Serializes one frame followed by `\n`.
pub fn encode_frame<T: Serialize>(frame: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(frame)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parses one received line, tolerating a trailing newline.
pub fn decode_frame<'a, T: Deserialize<'a>>(line: &'a [u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(line.strip_suffix(b"\n").unwrap_or(line))
}
