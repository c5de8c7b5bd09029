//! Git server credentials from the environment
//!
//! Missing values never fail: the reporter is told what was missing and the
//! supplied fallback is used instead.

use reqwest::header::{HeaderName, HeaderValue};

use crate::error::{Result, TraversalError};
use crate::transport::RequestInit;

/// Called with a message when a value is missing from the environment.
pub type Reporter<'a> = &'a dyn Fn(&str);

fn var_name(prefix: &str, name: &str) -> String {
    format!("{}_{name}", prefix.trim_end_matches('_'))
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAuthn {
    pub username: String,
    /// Password or access token.
    pub secret: String,
}

impl ServerAuthn {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Reads `<PREFIX>_USERNAME` with `<PREFIX>_PASSWORD`, or `<PREFIX>_TOKEN`
    /// when no password is set.
    pub fn from_env(prefix: &str, fallback: ServerAuthn, reporter: Option<Reporter<'_>>) -> Self {
        Self::from_lookup(prefix, fallback, reporter, env_lookup)
    }

    pub fn available_in_env(prefix: &str) -> bool {
        Self::lookup_credentials(prefix, env_lookup).is_some()
    }

    fn lookup_credentials(
        prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<ServerAuthn> {
        let username = lookup(&var_name(prefix, "USERNAME"))?;
        let secret = lookup(&var_name(prefix, "PASSWORD"))
            .or_else(|| lookup(&var_name(prefix, "TOKEN")))?;
        Some(ServerAuthn { username, secret })
    }

    pub(crate) fn from_lookup(
        prefix: &str,
        fallback: ServerAuthn,
        reporter: Option<Reporter<'_>>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        if let Some(authn) = Self::lookup_credentials(prefix, lookup) {
            return authn;
        }
        let message = format!(
            "{} and {} (or {}) not available in the environment",
            var_name(prefix, "USERNAME"),
            var_name(prefix, "PASSWORD"),
            var_name(prefix, "TOKEN"),
        );
        log::warn!("{message}");
        if let Some(report) = reporter {
            report(&message);
        }
        fallback
    }
}

/// A git host (e.g. a GitLab instance) and how to authenticate to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitServer {
    pub host: String,
    pub authn: ServerAuthn,
}

impl GitServer {
    /// Reads the host name from `var`; falls back to `fallback` when unset.
    pub fn from_env(
        var: &str,
        authn: ServerAuthn,
        fallback: Option<GitServer>,
        reporter: Option<Reporter<'_>>,
    ) -> Option<Self> {
        Self::from_lookup(var, authn, fallback, reporter, env_lookup)
    }

    pub(crate) fn from_lookup(
        var: &str,
        authn: ServerAuthn,
        fallback: Option<GitServer>,
        reporter: Option<Reporter<'_>>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<Self> {
        if let Some(host) = lookup(var) {
            return Some(GitServer { host, authn });
        }
        let message = format!("{var} not available in the environment");
        log::warn!("{message}");
        if let Some(report) = reporter {
            report(&message);
        }
        fallback
    }

    /// `https://<host>/api/v4/<path>`
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "https://{}/api/v4/{}",
            self.host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Request init carrying the secret as a `PRIVATE-TOKEN` header.
    pub fn request_init(&self) -> Result<RequestInit> {
        let token = HeaderValue::from_str(&self.authn.secret)
            .map_err(|e| TraversalError::InvalidRequest(format!("Invalid access token: {e}")))?;
        let mut init = RequestInit::default();
        init.headers
            .insert(HeaderName::from_static("private-token"), token);
        Ok(init)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn fallback() -> ServerAuthn {
        ServerAuthn::new("anonymous", "")
    }

    #[test]
    fn test_authn_username_password() {
        let lookup = env(&[("GITLAB_USERNAME", "dev"), ("GITLAB_PASSWORD", "secret")]);
        let authn = ServerAuthn::from_lookup("GITLAB", fallback(), None, lookup);
        assert_eq!(authn, ServerAuthn::new("dev", "secret"));
    }

    #[test]
    fn test_authn_token_and_trailing_underscore_prefix() {
        let lookup = env(&[("GITLAB_USERNAME", "dev"), ("GITLAB_TOKEN", "glpat-1")]);
        let authn = ServerAuthn::from_lookup("GITLAB_", fallback(), None, lookup);
        assert_eq!(authn.secret, "glpat-1");
    }

    #[test]
    fn test_authn_missing_reports_and_falls_back() {
        let messages = RefCell::new(Vec::new());
        let reporter = |message: &str| messages.borrow_mut().push(message.to_string());
        let lookup = env(&[("GITLAB_USERNAME", "dev")]);

        let authn = ServerAuthn::from_lookup("GITLAB", fallback(), Some(&reporter), lookup);
        assert_eq!(authn, fallback());
        assert_eq!(
            messages.into_inner(),
            ["GITLAB_USERNAME and GITLAB_PASSWORD (or GITLAB_TOKEN) not available in the environment"]
        );
    }

    #[test]
    fn test_git_server_from_env() {
        let authn = ServerAuthn::new("dev", "tok");
        let server = GitServer::from_lookup(
            "GITLAB_HOST",
            authn.clone(),
            None,
            None,
            env(&[("GITLAB_HOST", "git.example.com")]),
        )
        .unwrap();
        assert_eq!(server.host, "git.example.com");
        assert_eq!(
            server.api_url("/groups/7/projects"),
            "https://git.example.com/api/v4/groups/7/projects"
        );

        let missing = GitServer::from_lookup("GITLAB_HOST", authn, None, None, env(&[]));
        assert!(missing.is_none());
    }

    #[test]
    fn test_request_init_private_token() {
        let server = GitServer {
            host: "git.example.com".to_string(),
            authn: ServerAuthn::new("dev", "glpat-1"),
        };
        let init = server.request_init().unwrap();
        assert_eq!(init.headers["PRIVATE-TOKEN"], "glpat-1");

        let invalid = GitServer {
            host: "git.example.com".to_string(),
            authn: ServerAuthn::new("dev", "line\nbreak"),
        };
        assert!(invalid.request_init().is_err());
    }
}
