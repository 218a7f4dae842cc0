// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders for `CalDAV` operations.
//!
//! Every builder renders a complete, namespace-qualified XML document and
//! never fails: the writer's sink is an in-memory buffer.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::CalDavError;
use crate::types::{ComponentKind, TimeRange};
use crate::xml::ns;

type XmlWriter = Writer<Vec<u8>>;

fn render(body: impl FnOnce(&mut XmlWriter) -> Result<(), CalDavError>) -> String {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let written = writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(CalDavError::from)
        .and_then(|()| body(&mut writer));
    if let Err(e) = written {
        tracing::error!(error = %e, "writing XML into memory failed");
    }
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}

fn empty(writer: &mut XmlWriter, name: &str) -> Result<(), CalDavError> {
    writer.write_event(Event::Empty(BytesStart::new(name)))?;
    Ok(())
}

/// PROPFIND request builder.
#[derive(Debug, Default)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

/// Properties to request in PROPFIND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    /// Display name.
    DisplayName,
    /// Resource type.
    ResourceType,
    /// `ETag`.
    GetETag,
    /// Calendar description.
    CalendarDescription,
}

impl Prop {
    const fn qualified_name(self) -> &'static str {
        match self {
            Self::DisplayName => "D:displayname",
            Self::ResourceType => "D:resourcetype",
            Self::GetETag => "D:getetag",
            Self::CalendarDescription => "C:calendar-description",
        }
    }

    const fn is_caldav(self) -> bool {
        matches!(self, Self::CalendarDescription)
    }
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// PROPFIND asking for the display name only.
    #[must_use]
    pub fn display_name() -> Self {
        let mut request = Self::new();
        request.add_property(Prop::DisplayName);
        request
    }

    /// Adds a property to the request.
    pub fn add_property(&mut self, prop: Prop) -> &mut Self {
        self.props.push(prop);
        self
    }

    /// Builds the XML body for the PROPFIND request.
    #[must_use]
    pub fn build(&self) -> String {
        render(|writer| {
            // <D:propfind xmlns:D="DAV:">
            let mut propfind = BytesStart::new("D:propfind");
            propfind.push_attribute(("xmlns:D", ns::DAV));
            if self.props.iter().any(|p| p.is_caldav()) {
                propfind.push_attribute(("xmlns:C", ns::CALDAV));
            }
            writer.write_event(Event::Start(propfind))?;

            writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
            for prop in &self.props {
                empty(writer, prop.qualified_name())?;
            }
            writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

            writer.write_event(Event::End(BytesEnd::new("D:propfind")))?;
            Ok(())
        })
    }
}

/// Calendar query (`REPORT`) request builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarQueryRequest {
    component: ComponentKind,
    time_range: Option<TimeRange>,
}

impl CalendarQueryRequest {
    /// Query selecting every object of `component`.
    #[must_use]
    pub const fn get_all(component: ComponentKind) -> Self {
        Self {
            component,
            time_range: None,
        }
    }

    /// Query selecting objects of `component` overlapping `range`.
    ///
    /// The range is written as given, even when `start > end`.
    #[must_use]
    pub const fn range(component: ComponentKind, range: TimeRange) -> Self {
        Self {
            component,
            time_range: Some(range),
        }
    }

    /// Returns the component kind selected by the query.
    #[must_use]
    pub const fn component(&self) -> ComponentKind {
        self.component
    }

    /// Builds the XML body for the calendar query request.
    #[must_use]
    pub fn build(&self) -> String {
        render(|writer| {
            // <C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
            let mut calendar_query = BytesStart::new("C:calendar-query");
            calendar_query.push_attribute(("xmlns:D", ns::DAV));
            calendar_query.push_attribute(("xmlns:C", ns::CALDAV));
            writer.write_event(Event::Start(calendar_query))?;

            // <D:prop>
            writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
            empty(writer, "D:getetag")?;
            empty(writer, "C:calendar-data")?;
            writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

            // <C:filter>
            writer.write_event(Event::Start(BytesStart::new("C:filter")))?;

            // <C:comp-filter name="VCALENDAR">
            let mut calendar_filter = BytesStart::new("C:comp-filter");
            calendar_filter.push_attribute(("name", "VCALENDAR"));
            writer.write_event(Event::Start(calendar_filter))?;

            let mut component_filter = BytesStart::new("C:comp-filter");
            component_filter.push_attribute(("name", self.component.marker()));
            match &self.time_range {
                Some(range) => {
                    writer.write_event(Event::Start(component_filter))?;
                    write_time_range(writer, range)?;
                    writer.write_event(Event::End(BytesEnd::new("C:comp-filter")))?;
                }
                None => writer.write_event(Event::Empty(component_filter))?,
            }

            writer.write_event(Event::End(BytesEnd::new("C:comp-filter")))?;
            writer.write_event(Event::End(BytesEnd::new("C:filter")))?;
            writer.write_event(Event::End(BytesEnd::new("C:calendar-query")))?;
            Ok(())
        })
    }
}

fn write_time_range(writer: &mut XmlWriter, range: &TimeRange) -> Result<(), CalDavError> {
    // <C:time-range start="..." end="..."/>
    let start = range.start_str();
    let end = range.end_str();
    let mut time_range = BytesStart::new("C:time-range");
    time_range.push_attribute(("start", start.as_str()));
    time_range.push_attribute(("end", end.as_str()));
    writer.write_event(Event::Empty(time_range))?;
    Ok(())
}

/// Free/busy query request builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBusyQueryRequest {
    range: TimeRange,
}

impl FreeBusyQueryRequest {
    /// Creates a new free/busy query request.
    #[must_use]
    pub const fn new(range: TimeRange) -> Self {
        Self { range }
    }

    /// Builds the XML body for the free/busy query request.
    #[must_use]
    pub fn build(&self) -> String {
        render(|writer| {
            // <C:free-busy-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
            let mut free_busy = BytesStart::new("C:free-busy-query");
            free_busy.push_attribute(("xmlns:D", ns::DAV));
            free_busy.push_attribute(("xmlns:C", ns::CALDAV));
            writer.write_event(Event::Start(free_busy))?;

            write_time_range(writer, &self.range)?;

            writer.write_event(Event::End(BytesEnd::new("C:free-busy-query")))?;
            Ok(())
        })
    }
}

/// `LOCK` request builder (exclusive write lock).
#[derive(Debug, Clone)]
pub struct LockRequest {
    owner: String,
}

impl LockRequest {
    /// Creates an exclusive write lock request owned by `owner` (an href).
    #[must_use]
    pub fn exclusive_write(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }

    /// Builds the XML body for the `LOCK` request.
    #[must_use]
    pub fn build(&self) -> String {
        render(|writer| {
            // <D:lockinfo xmlns:D="DAV:">
            let mut lockinfo = BytesStart::new("D:lockinfo");
            lockinfo.push_attribute(("xmlns:D", ns::DAV));
            writer.write_event(Event::Start(lockinfo))?;

            writer.write_event(Event::Start(BytesStart::new("D:lockscope")))?;
            empty(writer, "D:exclusive")?;
            writer.write_event(Event::End(BytesEnd::new("D:lockscope")))?;

            writer.write_event(Event::Start(BytesStart::new("D:locktype")))?;
            empty(writer, "D:write")?;
            writer.write_event(Event::End(BytesEnd::new("D:locktype")))?;

            writer.write_event(Event::Start(BytesStart::new("D:owner")))?;
            writer.write_event(Event::Start(BytesStart::new("D:href")))?;
            writer.write_event(Event::Text(BytesText::new(&self.owner)))?;
            writer.write_event(Event::End(BytesEnd::new("D:href")))?;
            writer.write_event(Event::End(BytesEnd::new("D:owner")))?;

            writer.write_event(Event::End(BytesEnd::new("D:lockinfo")))?;
            Ok(())
        })
    }
}
