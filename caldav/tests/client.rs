// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Client integration tests with wiremock.

use calwire_caldav::{
    AuthMethod, CalDavClient, CalDavConfig, CalDavError, DebugOptions, Outcome, Resource,
    RuntimeContext, TimeRange,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const XML_CONTENT_TYPE: &str = r#"application/xml; charset="utf-8""#;

const EVENT: &str = "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nUID:meeting-1@example.com\nSUMMARY:Team Meeting\nDTSTART:20250115T100000Z\nEND:VEVENT\nEND:VCALENDAR\n";
const TODO: &str = "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VTODO\nUID:todo-1@example.com\nSUMMARY:Review\nEND:VTODO\nEND:VCALENDAR\n";

fn report_body() -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:response>
    <D:href>/dav/calendars/user/work/meeting-1.ics</D:href>
    <D:propstat>
      <D:prop>
        <D:getetag>"1"</D:getetag>
        <C:calendar-data>{EVENT}</C:calendar-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/dav/calendars/user/work/todo-1.ics</D:href>
    <D:propstat>
      <D:prop>
        <D:getetag>"2"</D:getetag>
        <C:calendar-data>{TODO}</C:calendar-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#
    )
}

/// Runs blocking client code off the runtime that drives the mock server.
async fn blocking<R, F>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

fn collection(server: &MockServer) -> Resource {
    Resource::parse(&format!("{}/dav/calendars/user/work/", server.uri())).unwrap()
}

fn locking_ctx() -> RuntimeContext {
    RuntimeContext::new(DebugOptions {
        use_locking: true,
        ..DebugOptions::default()
    })
}

#[tokio::test]
async fn client_get_all_sends_report_and_extracts_events() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/dav/calendars/user/work/"))
        .and(header("Content-Type", XML_CONTENT_TYPE))
        .and(header("Depth", "1"))
        .and(body_string_contains(r#"<C:comp-filter name="VEVENT"/>"#))
        .respond_with(ResponseTemplate::new(207).set_body_raw(report_body(), "application/xml"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let resource = collection(&mock_server);
    let (reply, ctx) = blocking(move || {
        let client = CalDavClient::new(CalDavConfig::default());
        let mut ctx = RuntimeContext::default();
        let reply = client.get_all_objects(&resource, &mut ctx).unwrap();
        (reply, ctx)
    })
    .await;

    assert_eq!(reply.outcome, Outcome::Ok);
    assert_eq!(reply.result.as_deref(), Some(EVENT));
    assert!(ctx.error.is_none());

    let requests = mock_server.received_requests().await.unwrap();
    let report = &requests[0];
    assert!(report.headers.get("expect").is_none());
    assert!(report.headers.get("transfer-encoding").is_none());
    assert_eq!(
        report.headers.get("content-length").unwrap().to_str().unwrap(),
        report.body.len().to_string()
    );
    assert_eq!(report.headers.get("connection").unwrap(), "close");
}

#[tokio::test]
async fn client_tasks_get_in_range() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/dav/calendars/user/work/"))
        .and(body_string_contains(r#"<C:comp-filter name="VTODO">"#))
        .and(body_string_contains(
            r#"<C:time-range start="20250101T000000Z" end="20250201T000000Z"/>"#,
        ))
        .respond_with(ResponseTemplate::new(207).set_body_raw(report_body(), "application/xml"))
        .mount(&mock_server)
        .await;

    let resource = collection(&mock_server);
    let reply = blocking(move || {
        let client = CalDavClient::new(CalDavConfig::default());
        let range = TimeRange::parse("20250101T000000Z", "20250201T000000Z").unwrap();
        client
            .tasks_get_object(&resource, range, &mut RuntimeContext::default())
            .unwrap()
    })
    .await;

    assert_eq!(reply.result.as_deref(), Some(TODO));
}

#[tokio::test]
async fn client_redirect_keeps_method_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/old/"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/dav/calendars/user/work/"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("REPORT"))
        .and(path("/dav/calendars/user/work/"))
        .and(body_string_contains("calendar-query"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(report_body(), "application/xml"))
        .mount(&mock_server)
        .await;

    let resource = Resource::parse(&format!("{}/old/", mock_server.uri())).unwrap();
    let reply = blocking(move || {
        let client = CalDavClient::new(CalDavConfig::default());
        client
            .get_all_objects(&resource, &mut RuntimeContext::default())
            .unwrap()
    })
    .await;

    assert_eq!(reply.outcome, Outcome::Ok);
    assert_eq!(reply.result.as_deref(), Some(EVENT));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.method.as_str() == "REPORT"));
    assert_eq!(requests[0].body, requests[1].body);
}

#[tokio::test]
async fn client_redirect_loop_is_a_transport_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/loop/"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/loop/"))
        .mount(&mock_server)
        .await;

    let resource = Resource::parse(&format!("{}/loop/", mock_server.uri())).unwrap();
    let (result, ctx) = blocking(move || {
        let client = CalDavClient::new(CalDavConfig {
            max_redirects: 3,
            ..CalDavConfig::default()
        });
        let mut ctx = RuntimeContext::default();
        let result = client.get_all_objects(&resource, &mut ctx);
        (result, ctx)
    })
    .await;

    assert!(matches!(result, Err(CalDavError::Transport(_))));
    assert!(ctx.error.unwrap().is_transport_failure());
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn client_url_credentials_use_basic_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/dav/calendars/user/work/"))
        .and(header("Authorization", "Basic YWxpY2U6c2VjcmV0"))
        .and(body_string_contains("<D:displayname/>"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            r#"<?xml version="1.0" encoding="utf-8" ?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/dav/calendars/user/work/</D:href>
    <D:propstat>
      <D:prop><D:displayname>Work</D:displayname></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#,
            "application/xml",
        ))
        .mount(&mock_server)
        .await;

    let url = format!(
        "alice:secret@{}/dav/calendars/user/work/",
        mock_server.address()
    );
    let reply = blocking(move || {
        let resource = Resource::parse(&url).unwrap();
        // URL credentials win over the configured ones
        let client = CalDavClient::new(CalDavConfig {
            auth: AuthMethod::Bearer {
                token: "ignored".to_string(),
            },
            ..CalDavConfig::default()
        });
        client
            .get_displayname(&resource, &mut RuntimeContext::default())
            .unwrap()
    })
    .await;

    assert_eq!(reply.outcome, Outcome::Ok);
    assert_eq!(reply.result.as_deref(), Some("Work"));
}

#[tokio::test]
async fn client_configured_bearer_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(header("Authorization", "Bearer token-123"))
        .and(body_string_contains("free-busy-query"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "BEGIN:VCALENDAR\nBEGIN:VFREEBUSY\nFREEBUSY:20250115T100000Z/20250115T110000Z\nEND:VFREEBUSY\nEND:VCALENDAR\n",
            "text/calendar",
        ))
        .mount(&mock_server)
        .await;

    let resource = collection(&mock_server);
    let reply = blocking(move || {
        let client = CalDavClient::new(CalDavConfig {
            auth: AuthMethod::Bearer {
                token: "token-123".to_string(),
            },
            ..CalDavConfig::default()
        });
        let range = TimeRange::parse("2025-01-15", "2025-01-16").unwrap();
        client
            .get_freebusy(&resource, range, &mut RuntimeContext::default())
            .unwrap()
    })
    .await;

    assert_eq!(reply.outcome, Outcome::Ok);
    assert!(reply.result.unwrap().contains("FREEBUSY:20250115T100000Z"));
}

#[tokio::test]
async fn client_add_with_locking_runs_lock_put_unlock() {
    let mock_server = MockServer::start().await;
    let object_path = "/dav/calendars/user/work/meeting-1@example.com.ics";

    Mock::given(method("LOCK"))
        .and(path(object_path))
        .and(header("Depth", "0"))
        .and(body_string_contains("<D:lockinfo"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Lock-Token", "<opaquelocktoken:42>"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path(object_path))
        .and(header("If", "(<opaquelocktoken:42>)"))
        .and(header("Content-Type", r#"text/calendar; charset="utf-8""#))
        .and(body_string_contains("UID:meeting-1@example.com"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("UNLOCK"))
        .and(path(object_path))
        .and(header("Lock-Token", "<opaquelocktoken:42>"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let resource = collection(&mock_server);
    let (reply, ctx) = blocking(move || {
        let client = CalDavClient::new(CalDavConfig::default());
        let mut ctx = locking_ctx();
        let reply = client.add_object(&resource, EVENT, &mut ctx).unwrap();
        (reply, ctx)
    })
    .await;

    assert_eq!(reply.outcome, Outcome::Ok);
    assert_eq!(reply.result.unwrap().path(), object_path);
    assert!(ctx.error.is_none());

    let methods: Vec<_> = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.method.to_string())
        .collect();
    assert_eq!(methods, ["LOCK", "PUT", "UNLOCK"]);
}

#[tokio::test]
async fn client_modify_conflict_releases_lock() {
    let mock_server = MockServer::start().await;

    Mock::given(method("LOCK"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Lock-Token", "<opaquelocktoken:7>"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(409).set_body_string("resource changed"))
        .mount(&mock_server)
        .await;

    Mock::given(method("UNLOCK"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let resource = collection(&mock_server);
    let (reply, ctx) = blocking(move || {
        let client = CalDavClient::new(CalDavConfig::default());
        let mut ctx = locking_ctx();
        let reply = client.modify_object(&resource, EVENT, &mut ctx).unwrap();
        (reply, ctx)
    })
    .await;

    assert_eq!(reply.outcome, Outcome::Conflict);
    let error = ctx.error.unwrap();
    assert_eq!(error.code, 409);
    assert_eq!(error.message, "409 Conflict: resource changed");
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn client_locked_resource_is_not_modified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("LOCK"))
        .respond_with(ResponseTemplate::new(423))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let resource =
        Resource::parse(&format!("{}/dav/calendars/user/work/meeting-1.ics", mock_server.uri()))
            .unwrap();
    let (reply, ctx) = blocking(move || {
        let client = CalDavClient::new(CalDavConfig::default());
        let mut ctx = locking_ctx();
        let reply = client.delete_object(&resource, None, &mut ctx).unwrap();
        (reply, ctx)
    })
    .await;

    assert_eq!(reply.outcome, Outcome::Locked);
    assert_eq!(ctx.error.unwrap().code, 423);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn client_server_options_and_calendar_access() {
    let mock_server = MockServer::start().await;

    Mock::given(method("OPTIONS"))
        .and(path("/dav/calendars/user/work/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Allow", "OPTIONS, GET, PUT, DELETE, PROPFIND, REPORT")
                .insert_header("DAV", "1, 2, access-control, calendar-access"),
        )
        .mount(&mock_server)
        .await;

    let resource = collection(&mock_server);
    let (methods, enabled) = blocking(move || {
        let client = CalDavClient::new(CalDavConfig::default());
        let mut ctx = RuntimeContext::default();
        let methods = client.get_server_options(&resource, &mut ctx).unwrap();
        let enabled = client.enabled_resource(&resource, &mut ctx).unwrap();
        (methods, enabled)
    })
    .await;

    assert_eq!(
        methods.result.unwrap(),
        ["OPTIONS", "GET", "PUT", "DELETE", "PROPFIND", "REPORT"]
    );
    assert!(enabled);
}

#[tokio::test]
async fn client_unknown_status_is_not_implemented() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .respond_with(ResponseTemplate::new(501).set_body_string("REPORT not supported"))
        .mount(&mock_server)
        .await;

    let resource = collection(&mock_server);
    let (reply, ctx) = blocking(move || {
        let client = CalDavClient::new(CalDavConfig::default());
        let mut ctx = RuntimeContext::default();
        let reply = client.get_all_objects(&resource, &mut ctx).unwrap();
        (reply, ctx)
    })
    .await;

    assert_eq!(reply.outcome, Outcome::NotImplemented);
    assert!(reply.result.is_none());
    assert_eq!(ctx.error.unwrap().code, 501);
}

#[test]
fn client_connection_refused_is_a_transport_failure() {
    let client = CalDavClient::new(CalDavConfig {
        timeout_secs: 5,
        ..CalDavConfig::default()
    });
    let resource = Resource::parse("http://127.0.0.1:1/cal/").unwrap();
    let mut ctx = RuntimeContext::default();

    let err = client.get_all_objects(&resource, &mut ctx).unwrap_err();

    assert!(matches!(err, CalDavError::Transport(_)));
    let diagnostic = ctx.error.unwrap();
    assert_eq!(diagnostic.code, -1);
    assert!(!diagnostic.message.is_empty());
}

#[test]
fn client_missing_ca_certificate_fails_before_sending() {
    let client = CalDavClient::new(CalDavConfig::default());
    let resource = Resource::parse("https://127.0.0.1:1/cal/").unwrap();
    let mut ctx = RuntimeContext::new(DebugOptions {
        custom_cacert: Some("/nonexistent/calwire-ca.pem".into()),
        ..DebugOptions::default()
    });

    let err = client.get_all_objects(&resource, &mut ctx).unwrap_err();

    assert!(matches!(err, CalDavError::Config(_)));
    let diagnostic = ctx.error.unwrap();
    assert_eq!(diagnostic.code, -1);
    assert!(diagnostic.message.contains("calwire-ca.pem"));
}

#[tokio::test]
async fn client_insecure_option_still_reaches_the_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(report_body(), "application/xml"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let resource = collection(&mock_server);
    let replies = blocking(move || {
        let client = CalDavClient::new(CalDavConfig::default());
        let mut ctx = RuntimeContext::new(DebugOptions {
            verify_ssl_certificate: false,
            ..DebugOptions::default()
        });
        let first = client.get_all_objects(&resource, &mut ctx).unwrap();
        let second = client.tasks_get_all_objects(&resource, &mut ctx).unwrap();
        (first, second)
    })
    .await;

    assert_eq!(replies.0.result.as_deref(), Some(EVENT));
    assert_eq!(replies.1.result.as_deref(), Some(TODO));
}
