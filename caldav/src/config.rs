// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// `CalDAV` authentication method.
///
/// Used when the resource URL carries no credentials of its own.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "type")]
pub enum AuthMethod {
    /// No authentication.
    #[serde(rename = "none")]
    #[default]
    None,
    /// Basic authentication (username/password).
    #[serde(rename = "basic")]
    Basic {
        /// Username for authentication.
        username: String,
        /// Password for authentication.
        password: String,
    },
    /// Bearer token authentication (OAuth).
    #[serde(rename = "bearer")]
    Bearer {
        /// Bearer token.
        token: String,
    },
}

/// Transport configuration shared by every call of a client.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CalDavConfig {
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum number of redirects followed for one exchange.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

const fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("calwire-caldav/", env!("CARGO_PKG_VERSION")).to_string()
}

const fn default_max_redirects() -> usize {
    10
}

impl Default for CalDavConfig {
    fn default() -> Self {
        Self {
            auth: AuthMethod::default(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
        }
    }
}

/// Per-call debug and transport switches.
///
/// Travels inside [`RuntimeContext`](crate::RuntimeContext) so that no option
/// is ever process-wide.
#[derive(Debug, Clone, serde::Deserialize)]
#[expect(clippy::struct_excessive_bools)]
pub struct DebugOptions {
    /// Log every exchange (method, URL, status, headers).
    #[serde(default)]
    pub debug: bool,
    /// Additionally log request and response bodies.
    #[serde(default)]
    pub trace_ascii: bool,
    /// Verify the server's TLS certificate.
    #[serde(default = "default_verify")]
    pub verify_ssl_certificate: bool,
    /// Bracket mutating operations with `LOCK`/`UNLOCK`.
    #[serde(default)]
    pub use_locking: bool,
    /// Extra PEM root certificate to trust.
    #[serde(default)]
    pub custom_cacert: Option<PathBuf>,
}

const fn default_verify() -> bool {
    true
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            debug: false,
            trace_ascii: false,
            verify_ssl_certificate: default_verify(),
            use_locking: false,
            custom_cacert: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: CalDavConfig = toml::from_str("timeout_secs = 5").unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_redirects, 10);
        assert!(config.user_agent.starts_with("calwire-caldav/"));
        assert!(matches!(config.auth, AuthMethod::None));
    }

    #[test]
    fn config_parses_tagged_auth() {
        let config: CalDavConfig = toml::from_str(
            r#"
[auth]
type = "basic"
username = "user"
password = "pass"
"#,
        )
        .unwrap();
        match config.auth {
            AuthMethod::Basic { username, password } => {
                assert_eq!(username, "user");
                assert_eq!(password, "pass");
            }
            other => panic!("unexpected auth: {other:?}"),
        }
    }

    #[test]
    fn debug_options_verify_certificates_by_default() {
        let options: DebugOptions = toml::from_str("use_locking = true").unwrap();
        assert!(options.use_locking);
        assert!(options.verify_ssl_certificate);
        assert!(!options.debug);
        assert!(options.custom_cacert.is_none());
        assert!(DebugOptions::default().verify_ssl_certificate);
    }
}
