// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Synchronous `CalDAV` protocol client (RFC 4791).
//!
//! Builds calendar-query, free/busy and property requests, dispatches them
//! over HTTP, classifies the status into a small [`Outcome`] vocabulary,
//! extracts calendar objects from multi-status responses, and optionally
//! brackets mutations with `LOCK`/`UNLOCK`.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(clippy::similar_names, clippy::single_match_else, clippy::match_bool)]

mod client;
mod config;
mod context;
mod error;
mod http;
mod locking;
mod request;
mod response;
mod status;
mod types;
mod xml;

pub use crate::client::CalDavClient;
pub use crate::config::{AuthMethod, CalDavConfig, DebugOptions};
#[allow(deprecated)]
pub use crate::context::{last_error, set_options};
pub use crate::context::RuntimeContext;
pub use crate::error::{CalDavError, Diagnostic, TRANSPORT_FAILURE};
pub use crate::http::{DavMethod, DavRequest, DavResponse, HttpClient, Transport};
pub use crate::request::{
    CalendarQueryRequest, FreeBusyQueryRequest, LockRequest, Prop, PropFindRequest,
};
pub use crate::response::{
    MultiStatusResponse, PropStat, Property, ResponseItem, extract_report, parse_allow,
    parse_lock_token, supports_calendar_access,
};
pub use crate::status::{Classification, classify};
pub use crate::types::{
    Action, CALDAV_DATETIME_FORMAT, ComponentKind, Credentials, LockToken, OperationSettings,
    Outcome, Reply, Resource, TimeRange, format_datetime, parse_datetime,
};
pub use crate::xml::ns;
