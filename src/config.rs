//! Account and connection configuration

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Transport security mode for the ActiveSync endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsMode {
    /// Plain HTTP. Only sensible against test servers.
    Plain,
    /// HTTPS with server certificate validation (optionally pinned or
    /// bypassed, see [`AccountConfig`] flags).
    Tls,
    /// HTTPS presenting a client certificate for mutual TLS.
    MutualTls,
}

impl TlsMode {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(Self::Plain),
            "tls" => Ok(Self::Tls),
            "mutual" | "mutual-tls" => Ok(Self::MutualTls),
            other => Err(Error::Config(format!("Invalid EAS_TLS mode: {other}"))),
        }
    }
}

/// Connection configuration for one ActiveSync account.
///
/// Credential and certificate fields hold material already resolved by the
/// external account store; this crate never decrypts anything itself.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Stable account identifier used to key cursor and mirror state.
    pub account_id: String,
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Windows domain, prepended as `domain\user` in Basic auth when set.
    pub domain: Option<String>,
    /// Device identifier reported in every request's query string.
    pub device_id: String,
    pub tls: TlsMode,
    /// Skip server certificate validation entirely.
    pub accept_all_certs: bool,
    /// Hex SHA-256 fingerprint of the expected server certificate.
    pub pinned_cert_sha256: Option<String>,
    /// PEM-encoded client certificate chain for mutual TLS.
    pub client_cert_pem: Option<PathBuf>,
    /// PEM-encoded private key for the client certificate.
    pub client_key_pem: Option<PathBuf>,
    /// Policy key from the last completed provisioning handshake.
    pub policy_key: Option<String>,
    /// Per-request network timeout.
    pub timeout: Duration,
}

impl AccountConfig {
    /// Load account configuration from environment variables.
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `EAS_SERVER`
    /// - `EAS_USERNAME`
    /// - `EAS_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `EAS_PORT` (default: `443`)
    /// - `EAS_TLS` (`plain` | `tls` | `mutual`, default: `tls`)
    /// - `EAS_DOMAIN`, `EAS_DEVICE_ID`, `EAS_ACCEPT_ALL_CERTS`,
    ///   `EAS_PINNED_CERT_SHA256`, `EAS_CLIENT_CERT_PEM`, `EAS_CLIENT_KEY_PEM`
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let tls = match env::var("EAS_TLS") {
            Ok(v) => TlsMode::parse(&v)?,
            Err(_) => TlsMode::Tls,
        };

        Ok(Self {
            account_id: env::var("EAS_ACCOUNT_ID").unwrap_or_else(|_| "default".to_string()),
            server: env::var("EAS_SERVER")
                .map_err(|_| Error::Config("EAS_SERVER not set".into()))?,
            port: env::var("EAS_PORT")
                .unwrap_or_else(|_| "443".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid EAS_PORT: {e}")))?,
            username: env::var("EAS_USERNAME")
                .map_err(|_| Error::Config("EAS_USERNAME not set".into()))?,
            password: env::var("EAS_PASSWORD")
                .map_err(|_| Error::Config("EAS_PASSWORD not set".into()))?,
            domain: env::var("EAS_DOMAIN").ok(),
            device_id: env::var("EAS_DEVICE_ID").unwrap_or_else(|_| "airsyncclient".to_string()),
            tls,
            accept_all_certs: env::var("EAS_ACCEPT_ALL_CERTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            pinned_cert_sha256: env::var("EAS_PINNED_CERT_SHA256").ok(),
            client_cert_pem: env::var("EAS_CLIENT_CERT_PEM").ok().map(PathBuf::from),
            client_key_pem: env::var("EAS_CLIENT_KEY_PEM").ok().map(PathBuf::from),
            policy_key: None,
            timeout: Duration::from_secs(30),
        })
    }

    /// Minimal config for tests and embedders that resolve accounts
    /// themselves.
    #[must_use]
    pub fn plain(account_id: &str, server: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            server: server.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            domain: None,
            device_id: "airsyncclient".to_string(),
            tls: TlsMode::Plain,
            accept_all_certs: false,
            pinned_cert_sha256: None,
            client_cert_pem: None,
            client_key_pem: None,
            policy_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Scheme + authority part of the endpoint URL.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = match self.tls {
            TlsMode::Plain => "http",
            TlsMode::Tls | TlsMode::MutualTls => "https",
        };
        format!("{scheme}://{}:{}", self.server, self.port)
    }

    /// The Basic-auth user, `domain\user` when a domain is configured.
    #[must_use]
    pub fn auth_user(&self) -> String {
        self.domain.as_ref().map_or_else(
            || self.username.clone(),
            |d| format!("{d}\\{}", self.username),
        )
    }
}
