// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsers for WebDAV/CalDAV operations.

use quick_xml::events::Event;
use reqwest::Url;
use reqwest::header::{ALLOW, HeaderMap};

use crate::types::LockToken;
use crate::xml::{TextError, read_element_text};

/// `WebDAV` multistatus response.
///
/// Parsing is lenient: entries whose content cannot be decoded are dropped,
/// and a syntax error ends the scan while keeping every entry completed
/// before it.
#[derive(Debug, Clone, Default)]
pub struct MultiStatusResponse {
    /// The response items, in document order.
    pub responses: Vec<ResponseItem>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone, Default)]
pub struct ResponseItem {
    /// `href` of the entry.
    pub href: String,
    /// Property groups with their status.
    pub prop_stats: Vec<PropStat>,
    /// Entry-level status, if any.
    pub status: Option<String>,
}

/// Property stat with status and values.
#[derive(Debug, Clone, Default)]
pub struct PropStat {
    /// Properties in document order.
    pub props: Vec<Property>,
    /// Status line, e.g. `HTTP/1.1 200 OK`.
    pub status: String,
}

/// A property and its raw text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Local name, without namespace prefix.
    pub name: String,
    /// Text content; CDATA and entities resolved, whitespace kept.
    pub value: String,
}

impl MultiStatusResponse {
    /// Parses a multistatus response from XML.
    #[must_use]
    pub fn from_xml(xml: &str) -> Self {
        let mut reader = quick_xml::Reader::from_str(xml);
        // Calendar data is whitespace sensitive
        reader.config_mut().trim_text(false);
        // Stray end tags are handled per entry below
        reader.config_mut().check_end_names = false;

        let mut responses = Vec::new();
        let mut current_response: Option<ResponseItem> = None;
        let mut current_props: Vec<Property> = Vec::new();
        let mut current_status = String::new();
        let mut in_propstat = false;
        let mut in_prop = false;
        let mut malformed = false;

        let mut buf = Vec::new();

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(
                        position = reader.error_position(),
                        error = %e,
                        kept = responses.len(),
                        "malformed multistatus body, stopping"
                    );
                    break;
                }
            };

            match event {
                Event::Eof => break,

                Event::Start(ref e) => {
                    let qname = e.name().as_ref().to_vec();
                    let name = e.name().local_name().into_inner().to_vec();
                    let is_text = in_prop
                        || (current_response.is_some()
                            && matches!(name.as_slice(), b"href" | b"status"));
                    match name.as_slice() {
                        b"response" => {
                            current_response = Some(ResponseItem::default());
                            in_propstat = false;
                            in_prop = false;
                            malformed = false;
                        }
                        b"propstat" if current_response.is_some() => {
                            in_propstat = true;
                            current_props.clear();
                            current_status.clear();
                        }
                        b"prop" if in_propstat => in_prop = true,

                        // Any element directly below <prop> is a property
                        _ if is_text => match read_element_text(&mut reader, &qname) {
                            Ok(value) if in_prop => current_props.push(Property {
                                name: String::from_utf8_lossy(&name).into_owned(),
                                value,
                            }),
                            Ok(text) => {
                                let text = text.trim().to_string();
                                if let Some(resp) = current_response.as_mut() {
                                    match (name.as_slice(), in_propstat) {
                                        (b"status", true) => current_status = text,
                                        (b"status", false) => resp.status = Some(text),
                                        _ => resp.href = text,
                                    }
                                }
                            }
                            Err(TextError::Markup(e)) => {
                                tracing::warn!(error = %e, "malformed multistatus body, stopping");
                                break;
                            }
                            Err(e) => {
                                malformed = true;
                                // Resynchronize on the element the stray tag closed
                                match e.stray_end() {
                                    Some("prop") => in_prop = false,
                                    Some("propstat") => {
                                        in_prop = false;
                                        in_propstat = false;
                                    }
                                    Some("response") => {
                                        in_prop = false;
                                        in_propstat = false;
                                        if let Some(resp) = current_response.take() {
                                            tracing::warn!(
                                                href = %resp.href,
                                                "skipping malformed response entry"
                                            );
                                        }
                                    }
                                    _ => {}
                                }
                            }
                        },
                        _ => {}
                    }
                }

                Event::Empty(ref e) if in_prop => current_props.push(Property {
                    name: String::from_utf8_lossy(e.name().local_name().into_inner()).into_owned(),
                    value: String::new(),
                }),

                Event::End(ref e) => match e.name().local_name().into_inner() {
                    b"prop" => in_prop = false,
                    b"propstat" if in_propstat => {
                        in_propstat = false;
                        if let Some(resp) = current_response.as_mut() {
                            resp.prop_stats.push(PropStat {
                                props: std::mem::take(&mut current_props),
                                status: std::mem::take(&mut current_status),
                            });
                        }
                    }
                    b"response" => {
                        if let Some(resp) = current_response.take() {
                            if malformed {
                                tracing::warn!(
                                    href = %resp.href,
                                    "skipping malformed response entry"
                                );
                            } else {
                                responses.push(resp);
                            }
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }

        Self { responses }
    }

    /// Values of every property named `property`, in document order.
    ///
    /// Any namespace prefix on `property` is ignored.
    pub fn property_values<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a str> {
        let local = local_name(property);
        self.responses
            .iter()
            .flat_map(|resp| &resp.prop_stats)
            .flat_map(|prop_stat| &prop_stat.props)
            .filter(move |prop| prop.name == local)
            .map(|prop| prop.value.as_str())
    }

    /// Concatenates every `property` value that contains `marker`.
    ///
    /// Values keep their raw text and document order. A CRLF is inserted
    /// between two values when the first does not end in a newline. No
    /// match yields an empty string.
    #[must_use]
    pub fn extract(&self, property: &str, marker: &str) -> String {
        let mut out = String::new();
        for value in self.property_values(property) {
            if !value.contains(marker) {
                continue;
            }
            if !out.is_empty() && !out.ends_with('\n') {
                out.push_str("\r\n");
            }
            out.push_str(value);
        }
        out
    }

    /// Returns the display name of the resource at `path`.
    ///
    /// Prefers the entry whose `href` designates `path`, then the first
    /// non-empty display name in the response.
    #[must_use]
    pub fn display_name(&self, path: &str) -> Option<String> {
        let named = |resp: &&ResponseItem| -> Option<String> {
            resp.prop_stats
                .iter()
                .flat_map(|prop_stat| &prop_stat.props)
                .find(|prop| prop.name == "displayname")
                .map(|prop| prop.value.trim().to_string())
                .filter(|name| !name.is_empty())
        };

        self.responses
            .iter()
            .filter(|resp| href_matches(&resp.href, path))
            .find_map(|resp| named(&resp))
            .or_else(|| self.responses.iter().find_map(|resp| named(&resp)))
    }
}

/// Parses a multistatus `body` and extracts every `property` containing `marker`.
#[must_use]
pub fn extract_report(body: &str, property: &str, marker: &str) -> String {
    MultiStatusResponse::from_xml(body).extract(property, marker)
}

/// Reads the lock token from the `Lock-Token` header, or from the
/// `<D:lockdiscovery>` body of a `LOCK` response.
#[must_use]
pub fn parse_lock_token(headers: &HeaderMap, body: &str) -> Option<LockToken> {
    let from_header = headers
        .get("Lock-Token")
        .and_then(|v| v.to_str().ok())
        .map(LockToken::new)
        .filter(|token| !token.is_empty());
    if from_header.is_some() {
        return from_header;
    }

    let mut reader = quick_xml::Reader::from_str(body);
    let mut buf = Vec::new();
    let mut in_locktoken = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().local_name().into_inner() {
                b"locktoken" => in_locktoken = true,
                b"href" if in_locktoken => {
                    let href = read_element_text(&mut reader, e.name().as_ref()).ok()?;
                    let token = LockToken::new(&href);
                    return (!token.is_empty()).then_some(token);
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().local_name().into_inner() == b"locktoken" => {
                in_locktoken = false;
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
        buf.clear();
    }
}

/// Methods listed in the `Allow` headers of an `OPTIONS` response.
#[must_use]
pub fn parse_allow(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(ALLOW)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns `true` if the `DAV` header advertises `calendar-access`.
#[must_use]
pub fn supports_calendar_access(headers: &HeaderMap) -> bool {
    headers
        .get_all("DAV")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|class| class.trim().eq_ignore_ascii_case("calendar-access"))
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn href_matches(href: &str, path: &str) -> bool {
    let href = href.trim_end_matches('/');
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        // Every href ends with the root path; only the root itself matches
        return href.is_empty() || Url::parse(href).is_ok_and(|url| url.path() == "/");
    }
    !href.is_empty() && (href == path || href.ends_with(path))
}
