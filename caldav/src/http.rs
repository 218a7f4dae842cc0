// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport with authentication, TLS options and method-preserving redirects.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONNECTION, CONTENT_TYPE, HeaderMap, LOCATION};
use reqwest::{Certificate, Method, StatusCode, Url, redirect};

use crate::config::{AuthMethod, CalDavConfig, DebugOptions};
use crate::error::CalDavError;
use crate::types::Credentials;

const XML_CONTENT_TYPE: &str = r#"application/xml; charset="utf-8""#;
const CALENDAR_CONTENT_TYPE: &str = r#"text/calendar; charset="utf-8""#;

/// HTTP methods used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DavMethod {
    /// `REPORT`: calendar and free/busy queries.
    Report,
    /// `PUT`: store a calendar object.
    Put,
    /// `DELETE`: remove a calendar object.
    Delete,
    /// `PROPFIND`: read properties.
    Propfind,
    /// `OPTIONS`: capability discovery.
    Options,
    /// `LOCK`: acquire a write lock.
    Lock,
    /// `UNLOCK`: release a write lock.
    Unlock,
}

impl DavMethod {
    /// Returns the method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Report => "REPORT",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Propfind => "PROPFIND",
            Self::Options => "OPTIONS",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
        }
    }

    /// Value of the `Depth` header. WebDAV only allows `0` or infinity on `LOCK`.
    #[must_use]
    pub const fn depth(self) -> &'static str {
        match self {
            Self::Lock => "0",
            _ => "1",
        }
    }

    /// Value of the `Content-Type` header.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Put => CALENDAR_CONTENT_TYPE,
            _ => XML_CONTENT_TYPE,
        }
    }

    fn to_reqwest(self) -> Result<Method, CalDavError> {
        Method::from_bytes(self.as_str().as_bytes())
            .map_err(|e| CalDavError::Transport(format!("invalid method {self}: {e}")))
    }
}

impl fmt::Display for DavMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single protocol exchange, before dispatch.
#[derive(Debug, Clone)]
pub struct DavRequest {
    /// HTTP method.
    pub method: DavMethod,
    /// Target URL, without credentials.
    pub url: Url,
    /// Request body; may be empty.
    pub body: String,
    /// Extra headers (`If`, `Lock-Token`, `Timeout`).
    pub headers: Vec<(&'static str, String)>,
    /// Credentials taken from the resource URL.
    pub credentials: Option<Credentials>,
}

impl DavRequest {
    /// Creates a request without body or extra headers.
    #[must_use]
    pub fn new(method: DavMethod, url: Url) -> Self {
        Self {
            method,
            url,
            body: String::new(),
            headers: Vec::new(),
            credentials: None,
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Sets the credentials used for Basic authentication.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Returns the value of an extra header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct DavResponse {
    /// Final HTTP status (after redirects).
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Vec<u8>,
}

impl DavResponse {
    /// Creates a response, mostly useful for in-memory transports.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Sends one [`DavRequest`] and reads the whole response.
///
/// Implementations must return `Err` only when no HTTP response was obtained.
pub trait Transport {
    /// Executes the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails before a response is read.
    fn execute(
        &self,
        request: &DavRequest,
        options: &DebugOptions,
    ) -> Result<DavResponse, CalDavError>;
}

/// HTTP client for `CalDAV` operations.
///
/// The underlying `reqwest` client is built on first use and reused for as
/// long as the TLS switches of the calls stay the same.
#[derive(Debug)]
pub struct HttpClient {
    config: CalDavConfig,
    cached: Mutex<Option<(TlsSettings, Client)>>,
}

/// The [`DebugOptions`] that shape the `reqwest` client.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TlsSettings {
    verify_ssl_certificate: bool,
    custom_cacert: Option<PathBuf>,
}

impl From<&DebugOptions> for TlsSettings {
    fn from(options: &DebugOptions) -> Self {
        Self {
            verify_ssl_certificate: options.verify_ssl_certificate,
            custom_cacert: options.custom_cacert.clone(),
        }
    }
}

impl Clone for HttpClient {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            cached: Mutex::new(self.lock_cache().clone()),
        }
    }
}

impl HttpClient {
    /// Creates a new HTTP client.
    #[must_use]
    pub const fn new(config: CalDavConfig) -> Self {
        Self {
            config,
            cached: Mutex::new(None),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<(TlsSettings, Client)>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the client for `options`, building it when the TLS switches changed.
    fn client(&self, options: &DebugOptions) -> Result<Client, CalDavError> {
        let tls = TlsSettings::from(options);
        let mut cached = self.lock_cache();
        if let Some((_, client)) = cached.as_ref().filter(|(key, _)| *key == tls) {
            return Ok(client.clone());
        }

        let client = self.build_client(&tls)?;
        tracing::debug!(
            verify = tls.verify_ssl_certificate,
            cacert = ?tls.custom_cacert,
            "built HTTP client"
        );
        *cached = Some((tls, client.clone()));
        Ok(client)
    }

    fn build_client(&self, tls: &TlsSettings) -> Result<Client, CalDavError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .user_agent(&self.config.user_agent)
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(!tls.verify_ssl_certificate);

        if let Some(path) = &tls.custom_cacert {
            let pem = std::fs::read(path).map_err(|e| {
                CalDavError::Config(format!("cannot read CA certificate {}: {e}", path.display()))
            })?;
            let certs = Certificate::from_pem_bundle(&pem).map_err(|e| {
                CalDavError::Config(format!("invalid CA certificate {}: {e}", path.display()))
            })?;
            if certs.is_empty() {
                return Err(CalDavError::Config(format!(
                    "no certificate found in {}",
                    path.display()
                )));
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        builder
            .build()
            .map_err(|e| CalDavError::Config(format!("cannot build HTTP client: {e}")))
    }

    /// Builds one hop of a request with authentication headers.
    fn build_request(
        &self,
        client: &Client,
        method: Method,
        url: Url,
        request: &DavRequest,
    ) -> RequestBuilder {
        let mut req = client
            .request(method, url)
            .header(CONTENT_TYPE, request.method.content_type())
            .header("Depth", request.method.depth())
            .header(CONNECTION, "close");

        for (name, value) in &request.headers {
            req = req.header(*name, value);
        }

        match (&request.credentials, &self.config.auth) {
            (Some(credentials), _) => {
                req = req.basic_auth(&credentials.username, credentials.password.as_ref());
            }
            (None, AuthMethod::Basic { username, password }) => {
                req = req.basic_auth(username, Some(password));
            }
            (None, AuthMethod::Bearer { token }) => {
                req = req.bearer_auth(token);
            }
            (None, AuthMethod::None) => {}
        }

        // A buffered body always carries its length, so no chunked encoding.
        req.body(request.body.clone())
    }
}

impl Transport for HttpClient {
    fn execute(
        &self,
        request: &DavRequest,
        options: &DebugOptions,
    ) -> Result<DavResponse, CalDavError> {
        let client = self.client(options)?;
        let method = request.method.to_reqwest()?;
        let mut url = request.url.clone();

        if options.trace_ascii && !request.body.is_empty() {
            tracing::trace!(method = %request.method, body = %request.body, "request body");
        }

        for hop in 0..=self.config.max_redirects {
            tracing::debug!(method = %request.method, %url, hop, "sending request");
            let mut resp = self
                .build_request(&client, method.clone(), url.clone(), request)
                .send()?;

            if let Some(next) = redirect_target(&url, &resp)? {
                tracing::debug!(
                    status = %resp.status(),
                    from = %url,
                    to = %next,
                    "following redirect"
                );
                url = next;
                continue;
            }

            let mut body = Vec::new();
            resp.copy_to(&mut body)?;
            let status = resp.status();
            tracing::debug!(method = %request.method, %url, %status, "received response");
            if options.debug {
                tracing::debug!(headers = ?resp.headers(), "response headers");
            }
            if options.trace_ascii && !body.is_empty() {
                tracing::trace!(body = %String::from_utf8_lossy(&body), "response body");
            }

            return Ok(DavResponse::new(status, resp.headers().clone(), body));
        }

        Err(CalDavError::Transport(format!(
            "too many redirects (more than {}) for {}",
            self.config.max_redirects, request.url
        )))
    }
}

/// Resolves the `Location` of a redirect response against the current URL.
fn redirect_target(current: &Url, resp: &Response) -> Result<Option<Url>, CalDavError> {
    if !is_followed_redirect(resp.status()) {
        return Ok(None);
    }
    let Some(location) = resp.headers().get(LOCATION) else {
        return Ok(None);
    };
    let location = location
        .to_str()
        .map_err(|e| CalDavError::Transport(format!("invalid redirect location: {e}")))?;
    current
        .join(location)
        .map(Some)
        .map_err(|e| CalDavError::Transport(format!("invalid redirect location '{location}': {e}")))
}

const fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}
