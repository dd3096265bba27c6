// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Authenticated session against a Protect console.
//!
//! Two console generations are supported and the scheme is picked once, when
//! the session is built:
//!
//! - UniFi OS consoles log in at `/api/auth/login` and hand back a `TOKEN`
//!   cookie; the Protect API lives under `/proxy/protect/api`.
//! - Legacy Cloud Keys / NVRs log in at `/api/auth` and return a bearer token
//!   in the `Authorization` header; the API lives under `/api`.
//!
//! The credential is fetched lazily and cached. It is only refreshed when the
//! server answers 401, never on a timer.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DownloadConfig, ServerConfig};
use crate::error::{ProtectError, Result};

const SESSION_COOKIE: &str = "TOKEN";

/// How the session proves its identity on each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// UniFi OS: `TOKEN` session cookie.
    Cookie,
    /// Legacy consoles: `Authorization: Bearer` header.
    Bearer,
}

impl AuthStrategy {
    pub fn for_server(server: &ServerConfig) -> Self {
        if server.not_unifi_os {
            AuthStrategy::Bearer
        } else {
            AuthStrategy::Cookie
        }
    }

    pub fn login_path(self) -> &'static str {
        match self {
            AuthStrategy::Cookie => "/api/auth/login",
            AuthStrategy::Bearer => "/api/auth",
        }
    }

    /// Prefix of every Protect API path.
    pub fn api_base_path(self) -> &'static str {
        match self {
            AuthStrategy::Cookie => "/proxy/protect/api",
            AuthStrategy::Bearer => "/api",
        }
    }

    fn authorize(self, request: RequestBuilder, token: &str) -> RequestBuilder {
        match self {
            AuthStrategy::Cookie => request.header(COOKIE, format!("{SESSION_COOKIE}={token}")),
            AuthStrategy::Bearer => request.bearer_auth(token),
        }
    }

    fn extract_token(self, response: &Response) -> Option<String> {
        match self {
            AuthStrategy::Cookie => response
                .cookies()
                .find(|c| c.name() == SESSION_COOKIE)
                .map(|c| c.value().to_string()),
            AuthStrategy::Bearer => response
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim_start_matches("Bearer ").trim().to_string()),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// HTTP client plus the cached credential for one console.
pub struct Session {
    http: Client,
    strategy: AuthStrategy,
    authority: String,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
}

impl Session {
    pub fn new(server: &ServerConfig, download: &DownloadConfig) -> Result<Self> {
        let password = server
            .password
            .clone()
            .ok_or_else(|| ProtectError::Config("password is required".into()))?;

        let http = Client::builder()
            .danger_accept_invalid_certs(!server.verify_ssl)
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(download.download_timeout())
            .user_agent(concat!("protect-archiver/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let strategy = AuthStrategy::for_server(server);
        debug!(?strategy, authority = %server.authority(), "Session configured");

        Ok(Self {
            http,
            strategy,
            authority: server.authority(),
            username: server.username.clone(),
            password,
            token: Mutex::new(None),
        })
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.strategy
    }

    /// `protocol://address:port`
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Absolute URI for an API path such as `/cameras`.
    pub fn api_url(&self, path_and_query: &str) -> String {
        format!("{}{}{}", self.authority, self.strategy.api_base_path(), path_and_query)
    }

    /// Current credential, logging in first when none is cached.
    /// `force` discards the cached value.
    pub async fn get_token(&self, force: bool) -> Result<String> {
        if force {
            self.token.lock().take();
        }
        let cached = self.token.lock().clone();
        if let Some(token) = cached {
            return Ok(token);
        }

        let token = self.login().await?;
        *self.token.lock() = Some(token.clone());
        Ok(token)
    }

    async fn login(&self) -> Result<String> {
        let url = format!("{}{}", self.authority, self.strategy.login_path());
        let response = self
            .http
            .post(&url)
            .json(&LoginRequest { username: &self.username, password: &self.password })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(user = %self.username, status = status.as_u16(), "Authentication failed");
            return Err(ProtectError::AuthenticationFailed { status: status.as_u16() });
        }

        let token = self
            .strategy
            .extract_token(&response)
            .filter(|t| !t.is_empty())
            .ok_or(ProtectError::AuthenticationFailed { status: status.as_u16() })?;

        info!(user = %self.username, "Successfully authenticated");
        Ok(token)
    }

    async fn send_with(&self, url: &str, token: &str) -> Result<Response> {
        let request = self.strategy.authorize(self.http.get(url), token);
        Ok(request.send().await?)
    }

    /// Authorized GET.
    ///
    /// A 401 drops the cached credential, logs in again and re-sends once.
    /// A second 401 is [`ProtectError::AuthorizationFailed`].
    pub async fn get(&self, url: &str) -> Result<Response> {
        let token = self.get_token(false).await?;
        let response = self.send_with(url, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(url, "Credential rejected, re-authenticating");
        let token = self.get_token(true).await?;
        let response = self.send_with(url, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ProtectError::AuthorizationFailed);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection() {
        let mut server = ServerConfig::default();
        assert_eq!(AuthStrategy::for_server(&server), AuthStrategy::Cookie);
        server.not_unifi_os = true;
        assert_eq!(AuthStrategy::for_server(&server), AuthStrategy::Bearer);
    }

    #[test]
    fn test_paths_per_strategy() {
        assert_eq!(AuthStrategy::Cookie.login_path(), "/api/auth/login");
        assert_eq!(AuthStrategy::Cookie.api_base_path(), "/proxy/protect/api");
        assert_eq!(AuthStrategy::Bearer.login_path(), "/api/auth");
        assert_eq!(AuthStrategy::Bearer.api_base_path(), "/api");
    }

    #[test]
    fn test_api_url() {
        let server = ServerConfig {
            address: "nvr.local".into(),
            password: Some("pw".into()),
            ..ServerConfig::default()
        };
        let session = Session::new(&server, &DownloadConfig::default()).expect("session");
        assert_eq!(
            session.api_url("/cameras"),
            "https://nvr.local:443/proxy/protect/api/cameras"
        );
    }
}
