//! The one-shot unix-socket command protocol.
//!
//! A client connects, writes exactly one JSON request, shuts down its
//! write side and then reads the response until the server closes the
//! connection.  A request looks like
//!
//! ```json
//! {"path": [{"kind": "group", "selector": "a"}], "command": "info", "args": [], "kwargs": {}}
//! ```
//!
//! and is answered either with
//!
//! ```json
//! {"success": true, "payload": {"name": "a"}}
//! ```
//!
//! or with a structured failure such as
//!
//! ```json
//! {"success": false, "error": {"kind": "resolution", "message": "no group matching \"x\""}}
//! ```
//!
//! A connection that closes without any bytes carried no response at
//! all; that is not the same thing as a `null` payload.

pub mod client;
pub mod server;

use crate::object::PathSegment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One command call as sent over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Object path from the root; empty means the root itself.
    #[serde(default)]
    pub path: Vec<PathSegment>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl Request {
    pub fn new(path: Vec<PathSegment>, command: impl Into<String>) -> Self {
        Self {
            path,
            command: command.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }
}

/// Wire-level category of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Resolution,
    UnknownCommand,
    BadArgument,
    Execution,
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Resolution => "resolution",
            ErrorKind::UnknownCommand => "unknown_command",
            ErrorKind::BadArgument => "bad_argument",
            ErrorKind::Execution => "execution",
            ErrorKind::Serialization => "serialization",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// The answer to one [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn ok(payload: Value) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Value::Null,
            error: Some(ErrorBody {
                kind,
                message: message.into(),
            }),
        }
    }

    /// Encode for the wire.  Falls back to a canned serialization error so
    /// the server loop never has to handle an encoding failure itself.
    pub fn to_bytes(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(e) => {
                let fallback = Response::error(
                    ErrorKind::Serialization,
                    format!("response encoding failed: {e}"),
                );
                serde_json::to_vec(&fallback).unwrap_or_else(|_| {
                    br#"{"success":false,"error":{"kind":"serialization","message":"response encoding failed"}}"#
                        .to_vec()
                })
            }
        }
    }
}
