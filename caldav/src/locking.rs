// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `LOCK`/`UNLOCK` bracketing of mutating operations.

use reqwest::Url;

use crate::config::DebugOptions;
use crate::error::{CalDavError, Diagnostic};
use crate::http::{DavMethod, DavRequest, Transport};
use crate::request::LockRequest;
use crate::response::parse_lock_token;
use crate::status::classify;
use crate::types::{Credentials, LockToken};

const LOCK_OWNER: &str = "calwire-caldav";
const LOCK_TIMEOUT: &str = "Second-300";

/// Result of a `LOCK` attempt.
#[derive(Debug)]
pub(crate) enum LockAttempt<'a, T: Transport> {
    /// The lock is held until the guard is released or dropped.
    Acquired(LockGuard<'a, T>),
    /// The server refused the lock or returned no token.
    Refused(Diagnostic),
}

/// A held write lock, released with `UNLOCK` when dropped.
#[derive(Debug)]
pub(crate) struct LockGuard<'a, T: Transport> {
    transport: &'a T,
    options: &'a DebugOptions,
    url: Url,
    credentials: Option<Credentials>,
    token: Option<LockToken>,
}

impl<'a, T: Transport> LockGuard<'a, T> {
    /// Sends `LOCK` for `url`.
    ///
    /// Only a transport failure is an error; any refusal is reported as
    /// [`LockAttempt::Refused`] so the caller never sends the mutation.
    pub(crate) fn acquire(
        transport: &'a T,
        options: &'a DebugOptions,
        url: &Url,
        credentials: Option<&Credentials>,
    ) -> Result<LockAttempt<'a, T>, CalDavError> {
        let request = DavRequest::new(DavMethod::Lock, url.clone())
            .with_body(LockRequest::exclusive_write(LOCK_OWNER).build())
            .with_header("Timeout", LOCK_TIMEOUT)
            .with_credentials(credentials.cloned());

        let response = transport.execute(&request, options)?;
        let body = response.text();
        if let Some(diagnostic) = classify(DavMethod::Lock, response.status, &body).diagnostic {
            tracing::warn!(%url, %diagnostic, "LOCK refused");
            return Ok(LockAttempt::Refused(diagnostic));
        }

        let Some(token) = parse_lock_token(&response.headers, &body) else {
            tracing::warn!(%url, status = %response.status, "LOCK succeeded without a lock token");
            return Ok(LockAttempt::Refused(Diagnostic::new(
                i64::from(response.status.as_u16()),
                "server returned no lock token",
            )));
        };

        tracing::debug!(%url, %token, "acquired lock");
        Ok(LockAttempt::Acquired(Self {
            transport,
            options,
            url: url.clone(),
            credentials: credentials.cloned(),
            token: Some(token),
        }))
    }

    /// Returns the lock token.
    pub(crate) fn token(&self) -> Option<&LockToken> {
        self.token.as_ref()
    }

    /// Sends `UNLOCK` now instead of at drop.
    pub(crate) fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };

        let request = DavRequest::new(DavMethod::Unlock, self.url.clone())
            .with_header("Lock-Token", token.lock_token_header())
            .with_credentials(self.credentials.clone());

        match self.transport.execute(&request, self.options) {
            Ok(response) => {
                let body = response.text();
                match classify(DavMethod::Unlock, response.status, &body).diagnostic {
                    Some(diagnostic) => {
                        tracing::warn!(url = %self.url, %token, %diagnostic, "UNLOCK failed");
                    }
                    None => tracing::debug!(url = %self.url, %token, "released lock"),
                }
            }
            Err(e) => tracing::warn!(url = %self.url, %token, error = %e, "UNLOCK failed"),
        }
    }
}

impl<T: Transport> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::scripted::ScriptedTransport;

    const LOCK_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:prop xmlns:D="DAV:">
  <D:lockdiscovery>
    <D:activelock>
      <D:locktoken><D:href>opaquelocktoken:body-token</D:href></D:locktoken>
    </D:activelock>
  </D:lockdiscovery>
</D:prop>"#;

    fn url() -> Url {
        Url::parse("http://localhost/cal/event.ics").unwrap()
    }

    #[test]
    fn drop_sends_unlock_with_token() {
        let transport = ScriptedTransport::new()
            .reply_with_headers(200, &[("Lock-Token", "<opaquelocktoken:abc>")], "")
            .reply(204, "");
        let options = DebugOptions::default();

        let attempt = LockGuard::acquire(&transport, &options, &url(), None).unwrap();
        let LockAttempt::Acquired(guard) = attempt else {
            panic!("lock not acquired");
        };
        assert_eq!(guard.token().unwrap().as_str(), "opaquelocktoken:abc");
        drop(guard);

        let requests = transport.requests();
        assert_eq!(transport.methods(), [DavMethod::Lock, DavMethod::Unlock]);
        assert_eq!(requests[0].header("Timeout"), Some(LOCK_TIMEOUT));
        assert!(requests[0].body.contains("<D:exclusive/>"));
        assert_eq!(
            requests[1].header("Lock-Token"),
            Some("<opaquelocktoken:abc>")
        );
    }

    #[test]
    fn release_unlocks_once() {
        let transport = ScriptedTransport::new()
            .reply(200, LOCK_BODY)
            .reply(204, "");
        let options = DebugOptions::default();

        let LockAttempt::Acquired(guard) =
            LockGuard::acquire(&transport, &options, &url(), None).unwrap()
        else {
            panic!("lock not acquired");
        };
        assert_eq!(guard.token().unwrap().as_str(), "opaquelocktoken:body-token");
        guard.release();

        assert_eq!(transport.methods(), [DavMethod::Lock, DavMethod::Unlock]);
    }

    #[test]
    fn refused_lock_sends_nothing_else() {
        let transport = ScriptedTransport::new().reply(423, "already locked");
        let options = DebugOptions::default();

        let attempt = LockGuard::acquire(&transport, &options, &url(), None).unwrap();
        let LockAttempt::Refused(diagnostic) = attempt else {
            panic!("lock unexpectedly acquired");
        };
        assert_eq!(diagnostic.code, 423);
        assert_eq!(transport.methods(), [DavMethod::Lock]);
    }

    #[test]
    fn lock_without_token_is_refused() {
        let transport = ScriptedTransport::new().reply(200, "");
        let options = DebugOptions::default();

        let attempt = LockGuard::acquire(&transport, &options, &url(), None).unwrap();
        let LockAttempt::Refused(diagnostic) = attempt else {
            panic!("lock unexpectedly acquired");
        };
        assert_eq!(diagnostic.code, 200);
        assert_eq!(diagnostic.message, "server returned no lock token");
        assert_eq!(transport.methods(), [DavMethod::Lock]);
    }

    #[test]
    fn failed_unlock_is_only_logged() {
        let transport = ScriptedTransport::new()
            .reply_with_headers(201, &[("Lock-Token", "<t>")], "")
            .fail("connection reset");
        let options = DebugOptions::default();

        let LockAttempt::Acquired(guard) =
            LockGuard::acquire(&transport, &options, &url(), None).unwrap()
        else {
            panic!("lock not acquired");
        };
        guard.release();
        assert_eq!(transport.methods(), [DavMethod::Lock, DavMethod::Unlock]);
    }
}
