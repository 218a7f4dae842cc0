// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error as _;
use std::fmt;

/// Diagnostic code recorded for failures that never reached the server.
pub const TRANSPORT_FAILURE: i64 = -1;

/// `CalDAV` client errors.
///
/// Only failures that prevent a protocol exchange surface as errors. A server
/// that answers with a failure status yields an [`Outcome`](crate::Outcome)
/// and a [`Diagnostic`] instead.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CalDavError {
    /// The exchange failed before a response was received (DNS, connect, TLS,
    /// timeout, redirect loop).
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// The resource URL cannot be used.
    #[error("Invalid resource URL: {0}")]
    InvalidResource(String),

    /// The operation lacks an input it needs (time range, calendar object, UID).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error, e.g. an unreadable CA certificate.
    #[error("Configuration error: {0}")]
    Config(String),

    /// XML writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Date/time conversion error.
    #[error("Invalid date/time: {0}")]
    DateTime(String),
}

impl From<reqwest::Error> for CalDavError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest's top-level message hides the cause ("error sending request"),
        // so the whole source chain goes into the diagnostic.
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Transport(message)
    }
}

impl From<quick_xml::Error> for CalDavError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<std::io::Error> for CalDavError {
    fn from(e: std::io::Error) -> Self {
        Self::Xml(format!("IO error: {e}"))
    }
}

impl From<jiff::Error> for CalDavError {
    fn from(e: jiff::Error) -> Self {
        Self::DateTime(e.to_string())
    }
}

/// Error code and human readable message describing a failed operation.
///
/// `code` is negative for failures inside the client (the request never
/// reached the server) and holds the HTTP status for protocol failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    /// Negative for internal errors, otherwise the HTTP status.
    pub code: i64,
    /// Human readable error message.
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns `true` if the request never reached the server.
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        self.code < 0
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&CalDavError> for Diagnostic {
    fn from(e: &CalDavError) -> Self {
        let message = match e {
            CalDavError::Transport(msg)
            | CalDavError::InvalidResource(msg)
            | CalDavError::InvalidRequest(msg)
            | CalDavError::Config(msg)
            | CalDavError::Xml(msg)
            | CalDavError::DateTime(msg) => msg.clone(),
        };
        Self::new(TRANSPORT_FAILURE, message)
    }
}
