// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use jiff::Timestamp;
use jiff::civil::{Date, DateTime};
use jiff::tz::TimeZone;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::Url;

use crate::config::DebugOptions;
use crate::error::CalDavError;

/// Wire format of `CalDAV` UTC date-times.
pub const CALDAV_DATETIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Characters escaped when a UID becomes a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'@');

/// A calendar collection or object on a `CalDAV` server.
///
/// Accepts `[http://][username[:password]@]host[:port]/url-path`. Credentials
/// embedded in the URL are removed from it and kept aside for HTTP Basic
/// authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    url: Url,
    credentials: Option<Credentials>,
}

/// Credentials embedded in a resource URL.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password, if one was given.
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Resource {
    /// Parses a resource URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or not `http`/`https`.
    pub fn parse(input: &str) -> Result<Self, CalDavError> {
        let input = input.trim();
        let mut url = if input.contains("://") {
            Url::parse(input)
        } else {
            Url::parse(&format!("http://{input}"))
        }
        .map_err(|e| CalDavError::InvalidResource(format!("{input}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CalDavError::InvalidResource(format!(
                "{input}: unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let credentials = if url.username().is_empty() {
            None
        } else {
            let username = decode(url.username());
            let password = url.password().map(decode);
            url.set_username("")
                .and_then(|()| url.set_password(None))
                .map_err(|()| {
                    CalDavError::InvalidResource(format!("{input}: cannot strip credentials"))
                })?;
            Some(Credentials { username, password })
        };

        Ok(Self { url, credentials })
    }

    /// Returns the URL without credentials.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the credentials embedded in the original URL.
    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Returns `true` if the URL designates a collection (path ends in `/`).
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.url.path().ends_with('/')
    }

    /// Returns the URL of the object named `<uid>.ics` inside this collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined URL is invalid.
    pub fn object_url(&self, uid: &str) -> Result<Url, CalDavError> {
        let segment = format!("{}.ics", utf8_percent_encode(uid, PATH_SEGMENT));
        self.url
            .join(&segment)
            .map_err(|e| CalDavError::InvalidResource(format!("{segment}: {e}")))
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

impl FromStr for Resource {
    type Err = CalDavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

/// Returns the value of the first `UID` property of an iCalendar payload.
pub(crate) fn object_uid(ical: &str) -> Option<&str> {
    ical.lines().find_map(|line| {
        let line = line.trim_end_matches('\r');
        let name_end = line.find([':', ';'])?;
        let (name, rest) = line.split_at(name_end);
        if !name.eq_ignore_ascii_case("UID") {
            return None;
        }
        let value = rest.split_once(':').map(|(_, v)| v.trim())?;
        (!value.is_empty()).then_some(value)
    })
}

/// Calendar component kind addressed by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// `VEVENT`.
    Event,
    /// `VTODO`.
    Task,
}

impl ComponentKind {
    /// Returns the iCalendar component marker.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::Task => "VTODO",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// UTC time range of a query.
///
/// `start <= end` is expected but never enforced: an inverted range is sent
/// to the server as given and the server decides what it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start of the range.
    pub start: Timestamp,
    /// End of the range.
    pub end: Timestamp,
}

impl TimeRange {
    /// Creates a time range.
    #[must_use]
    pub const fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Creates a time range from Unix timestamps in seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is outside the supported range.
    pub fn from_unix(start: i64, end: i64) -> Result<Self, CalDavError> {
        Ok(Self::new(
            Timestamp::from_second(start)?,
            Timestamp::from_second(end)?,
        ))
    }

    /// Parses both ends with [`parse_datetime`].
    ///
    /// # Errors
    ///
    /// Returns an error if either value cannot be parsed.
    pub fn parse(start: &str, end: &str) -> Result<Self, CalDavError> {
        Ok(Self::new(parse_datetime(start)?, parse_datetime(end)?))
    }

    /// Returns `true` if `start` is after `end`.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// Start in `CalDAV` wire format.
    #[must_use]
    pub fn start_str(&self) -> String {
        format_datetime(self.start)
    }

    /// End in `CalDAV` wire format.
    #[must_use]
    pub fn end_str(&self) -> String {
        format_datetime(self.end)
    }
}

/// Formats a timestamp as `YYYYMMDDTHHMMSSZ`.
#[must_use]
pub fn format_datetime(ts: Timestamp) -> String {
    ts.strftime(CALDAV_DATETIME_FORMAT).to_string()
}

/// Parses `YYYYMMDDTHHMMSSZ`, RFC 3339 or a plain `YYYY-MM-DD` (midnight UTC).
///
/// # Errors
///
/// Returns an error if the input matches none of the formats.
pub fn parse_datetime(s: &str) -> Result<Timestamp, CalDavError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::strptime(CALDAV_DATETIME_FORMAT, s) {
        return Ok(dt.to_zoned(TimeZone::UTC)?.timestamp());
    }
    if let Ok(ts) = s.parse::<Timestamp>() {
        return Ok(ts);
    }
    if let Ok(date) = Date::strptime("%Y-%m-%d", s) {
        return Ok(date.to_zoned(TimeZone::UTC)?.timestamp());
    }
    Err(CalDavError::DateTime(format!(
        "'{s}': expected YYYYMMDDTHHMMSSZ, RFC 3339 or YYYY-MM-DD"
    )))
}

/// Operation requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Store a new calendar object.
    Add,
    /// Delete an event.
    Delete,
    /// Replace an event.
    Modify,
    /// Fetch events within a time range.
    Get,
    /// Fetch all events.
    GetAll,
    /// Free/busy report over a time range.
    FreeBusy,
    /// Fetch the collection's display name.
    GetCalName,
    /// List the methods the server allows on the resource.
    Options,
    /// Delete a task.
    DeleteTasks,
    /// Replace a task.
    ModifyTasks,
    /// Fetch tasks within a time range.
    GetTasks,
    /// Fetch all tasks.
    GetAllTasks,
}

impl Action {
    /// Returns the component kind the action operates on.
    #[must_use]
    pub const fn component(self) -> ComponentKind {
        match self {
            Self::DeleteTasks | Self::ModifyTasks | Self::GetTasks | Self::GetAllTasks => {
                ComponentKind::Task
            }
            _ => ComponentKind::Event,
        }
    }

    /// Returns `true` if the action writes to the server.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Delete | Self::Modify | Self::DeleteTasks | Self::ModifyTasks
        )
    }

    /// Returns `true` if the action requires a time range.
    #[must_use]
    pub const fn needs_range(self) -> bool {
        matches!(self, Self::Get | Self::GetTasks | Self::FreeBusy)
    }

    /// Returns `true` if the action sends a calendar object.
    #[must_use]
    pub const fn needs_object(self) -> bool {
        matches!(self, Self::Add | Self::Modify | Self::ModifyTasks)
    }
}

/// Settings of a single operation.
#[derive(Debug, Clone)]
pub struct OperationSettings {
    /// The action to perform.
    pub action: Action,
    /// Time range for range queries and free/busy.
    pub range: Option<TimeRange>,
    /// Calendar object (iCalendar text) for add/modify/delete.
    pub object: Option<String>,
    /// Log every exchange.
    pub debug: bool,
    /// Log request and response bodies.
    pub trace_ascii: bool,
    /// Bracket mutations with `LOCK`/`UNLOCK`.
    pub use_locking: bool,
}

impl OperationSettings {
    /// Creates settings for `action`, taking the switches from `options`.
    #[must_use]
    pub const fn new(action: Action, options: &DebugOptions) -> Self {
        Self {
            action,
            range: None,
            object: None,
            debug: options.debug,
            trace_ascii: options.trace_ascii,
            use_locking: options.use_locking,
        }
    }

    /// Sets the time range.
    #[must_use]
    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Sets the calendar object payload.
    #[must_use]
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }
}

/// Lock token returned by a successful `LOCK`.
///
/// Only valid for the duration of the mutating call that acquired it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    /// Creates a new `LockToken`, dropping surrounding angle brackets.
    #[must_use]
    pub fn new(token: &str) -> Self {
        let token = token.trim();
        let token = token
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .unwrap_or(token);
        Self(token.to_string())
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the `If` header submitting this token.
    #[must_use]
    pub fn if_header(&self) -> String {
        format!("(<{}>)", self.0)
    }

    /// Value of the `Lock-Token` header releasing this token.
    #[must_use]
    pub fn lock_token_header(&self) -> String {
        format!("<{}>", self.0)
    }
}

impl Deref for LockToken {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Protocol outcome of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Request was satisfied.
    Ok,
    /// Access not allowed (HTTP 403). Do not repeat the request.
    Forbidden,
    /// Conflict with the current state of the collection (HTTP 409).
    Conflict,
    /// The resource is locked, or a lock could not be acquired (HTTP 423).
    Locked,
    /// Any other status.
    NotImplemented,
}

impl Outcome {
    /// Returns `true` for [`Outcome::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::Locked => "LOCKED",
            Self::NotImplemented => "NOTIMPLEMENTED",
        })
    }
}

/// Result of an operation: the outcome plus, on success, its data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Reply<T = ()> {
    /// Protocol outcome.
    pub outcome: Outcome,
    /// Data returned by the server; only set when `outcome` is `Ok`.
    pub result: Option<T>,
}

impl<T> Reply<T> {
    /// Successful reply carrying `result`.
    pub const fn ok(result: T) -> Self {
        Self {
            outcome: Outcome::Ok,
            result: Some(result),
        }
    }

    /// Reply without data.
    pub const fn failed(outcome: Outcome) -> Self {
        Self {
            outcome,
            result: None,
        }
    }

    /// Maps the result, keeping the outcome.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            outcome: self.outcome,
            result: self.result.map(f),
        }
    }
}
