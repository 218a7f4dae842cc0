// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Mapping of HTTP status codes to protocol outcomes.

use reqwest::StatusCode;

use crate::error::Diagnostic;
use crate::http::DavMethod;
use crate::types::Outcome;

/// Outcome of one exchange plus the diagnostic for failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Protocol outcome.
    pub outcome: Outcome,
    /// Set exactly when `outcome` is not [`Outcome::Ok`].
    pub diagnostic: Option<Diagnostic>,
}

/// Classifies the status of a response to `method`.
///
/// Total over all status codes: `200` and `207` always succeed, the
/// method-specific success codes of `PUT`, `DELETE`, `LOCK` and `UNLOCK` are
/// accepted as well, `403`/`409`/`423` map to their outcome, and anything
/// else is [`Outcome::NotImplemented`].
#[must_use]
pub fn classify(method: DavMethod, status: StatusCode, body: &str) -> Classification {
    let outcome = match status {
        StatusCode::OK | StatusCode::MULTI_STATUS => Outcome::Ok,
        status if is_method_success(method, status) => Outcome::Ok,
        StatusCode::FORBIDDEN => Outcome::Forbidden,
        StatusCode::CONFLICT => Outcome::Conflict,
        StatusCode::LOCKED => Outcome::Locked,
        _ => Outcome::NotImplemented,
    };

    let diagnostic = (!outcome.is_ok()).then(|| {
        Diagnostic::new(i64::from(status.as_u16()), failure_message(status, body))
    });

    Classification {
        outcome,
        diagnostic,
    }
}

fn is_method_success(method: DavMethod, status: StatusCode) -> bool {
    match method {
        DavMethod::Put => matches!(status, StatusCode::CREATED | StatusCode::NO_CONTENT),
        DavMethod::Delete | DavMethod::Unlock => status == StatusCode::NO_CONTENT,
        DavMethod::Lock => status == StatusCode::CREATED,
        DavMethod::Report | DavMethod::Propfind | DavMethod::Options => false,
    }
}

fn failure_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    match (status.canonical_reason(), body.is_empty()) {
        (Some(_), true) => status.to_string(),
        (Some(_), false) => format!("{status}: {body}"),
        (None, true) => format!("{} Unexpected response from server", status.as_u16()),
        (None, false) => format!("{} Unexpected response from server: {body}", status.as_u16()),
    }
}
