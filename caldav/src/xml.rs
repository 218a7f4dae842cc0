// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! XML utilities for WebDAV/CalDAV processing.

use std::io::BufRead;

use quick_xml::events::Event;

/// XML namespaces used in `CalDAV`.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// `CalDAV` namespace.
    pub const CALDAV: &str = "urn:ietf:params:xml:ns:caldav";
}

/// Failure while reading the text of an element.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The markup is broken; the reader cannot continue.
    #[error(transparent)]
    Markup(quick_xml::Error),
    /// The text could not be decoded. The whole element was still consumed.
    #[error("undecodable element text: {0}")]
    Content(quick_xml::Error),
    /// An end tag closed an element that was not open. Reading stopped right
    /// after that tag.
    #[error("expected </{expected}>, found </{found}>")]
    Unbalanced {
        /// Name of the innermost open element.
        expected: String,
        /// Name of the end tag actually read.
        found: String,
    },
}

impl TextError {
    /// Local name of the stray end tag, for [`TextError::Unbalanced`].
    #[must_use]
    pub fn stray_end(&self) -> Option<&str> {
        match self {
            Self::Unbalanced { found, .. } => {
                Some(found.rsplit_once(':').map_or(found.as_str(), |(_, local)| local))
            }
            _ => None,
        }
    }
}

/// Reads the text content of the element `name` whose start tag was just
/// consumed.
///
/// Text of nested elements is concatenated; CDATA sections are taken verbatim.
/// Stops at the matching end tag (or at EOF).
///
/// # Errors
///
/// Returns [`TextError::Markup`] if XML parsing fails,
/// [`TextError::Unbalanced`] if an end tag does not match the open element
/// and [`TextError::Content`] if entity unescaping fails.
pub fn read_element_text<R: BufRead>(
    reader: &mut quick_xml::Reader<R>,
    name: &[u8],
) -> Result<String, TextError> {
    let mut text = String::new();
    let mut undecodable = None;
    let mut open = vec![name.to_vec()];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(TextError::Markup)? {
            Event::Start(e) => open.push(e.name().as_ref().to_vec()),
            Event::End(e) => {
                let expected = open.pop().unwrap_or_default();
                if e.name().as_ref() != expected.as_slice() {
                    return Err(TextError::Unbalanced {
                        expected: String::from_utf8_lossy(&expected).into_owned(),
                        found: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    });
                }
                if open.is_empty() {
                    break;
                }
            }
            Event::Text(e) => match e.unescape() {
                Ok(unescaped) => text.push_str(&unescaped),
                Err(e) => undecodable = undecodable.or(Some(e)),
            },
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match undecodable {
        Some(e) => Err(TextError::Content(e)),
        None => Ok(text),
    }
}
