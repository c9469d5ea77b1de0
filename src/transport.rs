//! HTTP transport session and TLS helpers
//!
//! Owns the HTTP client and the TLS trust decision (standard validation,
//! accept-all, pinned fingerprint, mutual TLS) and exposes a single
//! [`Session::execute`] that maps HTTP status codes onto the crate error
//! taxonomy. A session never retries internally — retry policy lives in
//! the sync engine so retries stay observable and boundable.

use crate::config::{AccountConfig, TlsMode};
use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tracing::{debug, warn};

/// Protocol version advertised in every request.
pub const PROTOCOL_VERSION: &str = "14.1";

const ENDPOINT: &str = "/Microsoft-Server-ActiveSync";
const DEVICE_TYPE: &str = "SmartPhone";

/// One account's HTTP session against the ActiveSync endpoint.
#[derive(Debug, Clone)]
pub struct Session {
    http: reqwest::Client,
    url: String,
    authorization: String,
    username: String,
    device_id: String,
}

impl Session {
    /// Build the session, including the TLS client configuration implied
    /// by the account's trust settings.
    pub fn new(config: &AccountConfig) -> Result<Self> {
        // Multiple sessions may race to install the provider; the error
        // for an already-installed one is ignored.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        if config.tls != TlsMode::Plain {
            if config.accept_all_certs || config.pinned_cert_sha256.is_some() {
                builder = builder.use_preconfigured_tls(tls_config(config)?);
            } else if config.tls == TlsMode::MutualTls {
                // Standard chain validation plus a client identity.
                let identity = client_identity_pem(config)?;
                builder = builder.identity(
                    reqwest::Identity::from_pem(&identity)
                        .map_err(|e| Error::Tls(format!("invalid client identity: {e}")))?,
                );
            }
        }

        let http = builder
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        let credentials = format!("{}:{}", config.auth_user(), config.password);
        Ok(Self {
            http,
            url: format!("{}{ENDPOINT}", config.base_url()),
            authorization: format!("Basic {}", BASE64.encode(credentials)),
            username: config.username.clone(),
            device_id: config.device_id.clone(),
        })
    }

    /// Execute one command round-trip.
    ///
    /// Returns the raw response body on HTTP 200. Error mapping:
    /// 401/403 → [`Error::Auth`], 449 → [`Error::PolicyRequired`],
    /// everything network-level or 5xx → [`Error::Transport`]
    /// (retryable by the engine).
    pub async fn execute(
        &self,
        command: &str,
        policy_key: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Vec<u8>> {
        debug!(command, bytes = body.len(), "dispatching request");

        let response = self
            .http
            .post(&self.url)
            .query(&[
                ("Cmd", command),
                ("User", self.username.as_str()),
                ("DeviceId", self.device_id.as_str()),
                ("DeviceType", DEVICE_TYPE),
            ])
            .header("Authorization", &self.authorization)
            .header("Content-Type", "application/vnd.ms-sync.wbxml")
            .header("MS-ASProtocolVersion", PROTOCOL_VERSION)
            .header("X-MS-PolicyKey", policy_key.unwrap_or("0"))
            .body(body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status().as_u16();
        match status {
            200 => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;
                Ok(bytes.to_vec())
            }
            401 | 403 => {
                warn!(command, status, "server rejected credentials");
                Err(Error::Auth(format!("HTTP {status}")))
            }
            449 => {
                debug!(command, "server demands provisioning");
                Err(Error::PolicyRequired("HTTP 449".into()))
            }
            s if s >= 500 => Err(Error::Transport(format!("server error HTTP {s}"))),
            s => Err(Error::Transport(format!("unexpected HTTP status {s}"))),
        }
    }
}

fn classify_send_error(e: reqwest::Error) -> Error {
    let text = e.to_string();
    if text.contains("certificate") || text.contains("handshake") {
        Error::Tls(text)
    } else if e.is_timeout() {
        Error::Transport(format!("request timed out: {e}"))
    } else {
        Error::Transport(text)
    }
}

/// Build the rustls client configuration for the non-default trust
/// modes (accept-all, pinned fingerprint), with client authentication
/// when mutual TLS is configured on top.
fn tls_config(config: &AccountConfig) -> Result<rustls::ClientConfig> {
    let builder = rustls::ClientConfig::builder().dangerous();
    let verified = if config.accept_all_certs {
        builder.with_custom_certificate_verifier(Arc::new(DangerousVerifier))
    } else if let Some(fingerprint) = &config.pinned_cert_sha256 {
        builder.with_custom_certificate_verifier(Arc::new(PinnedVerifier::new(fingerprint)?))
    } else {
        return Err(Error::Config(
            "custom TLS config requested without trust override".into(),
        ));
    };

    if config.tls == TlsMode::MutualTls {
        let (certs, key) = load_client_credentials(config)?;
        verified
            .with_client_auth_cert(certs, key)
            .map_err(|e| Error::Tls(format!("invalid client certificate: {e}")))
    } else {
        Ok(verified.with_no_client_auth())
    }
}

/// Concatenated cert + key PEM for `reqwest::Identity`.
fn client_identity_pem(config: &AccountConfig) -> Result<Vec<u8>> {
    let cert_path = config
        .client_cert_pem
        .as_ref()
        .ok_or_else(|| Error::Config("mutual TLS requires a client certificate".into()))?;
    let key_path = config
        .client_key_pem
        .as_ref()
        .ok_or_else(|| Error::Config("mutual TLS requires a client key".into()))?;

    let mut pem = std::fs::read(cert_path)?;
    pem.push(b'\n');
    pem.extend_from_slice(&std::fs::read(key_path)?);
    Ok(pem)
}

/// Parsed client certificate chain and private key for rustls.
fn load_client_credentials(
    config: &AccountConfig,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let cert_path = config
        .client_cert_pem
        .as_ref()
        .ok_or_else(|| Error::Config("mutual TLS requires a client certificate".into()))?;
    let key_path = config
        .client_key_pem
        .as_ref()
        .ok_or_else(|| Error::Config("mutual TLS requires a client key".into()))?;

    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
        .collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(Error::Tls("no certificates in client PEM".into()));
    }
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?
        .ok_or_else(|| Error::Tls("no private key in client PEM".into()))?;
    Ok((certs, key))
}

/// Certificate verifier that accepts all certificates
/// (for servers with self-signed or internal-CA certificates).
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        supported_schemes()
    }
}

/// Certificate verifier that pins the server to a single certificate by
/// SHA-256 fingerprint of the end-entity DER. Chain and hostname checks
/// are replaced by the pin.
#[derive(Debug)]
struct PinnedVerifier {
    fingerprint: Vec<u8>,
}

impl PinnedVerifier {
    fn new(hex: &str) -> Result<Self> {
        let cleaned: String = hex
            .chars()
            .filter(char::is_ascii_hexdigit)
            .collect::<String>()
            .to_ascii_lowercase();
        if cleaned.len() != 64 {
            return Err(Error::Config(format!(
                "pinned fingerprint must be 32 hex bytes, got {} digits",
                cleaned.len()
            )));
        }
        let fingerprint = (0..cleaned.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&cleaned[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|e| Error::Config(format!("invalid pinned fingerprint: {e}")))?;
        Ok(Self { fingerprint })
    }
}

impl rustls::client::danger::ServerCertVerifier for PinnedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        let digest = Sha256::digest(end_entity.as_ref());
        if digest.as_slice() == self.fingerprint.as_slice() {
            Ok(rustls::client::danger::ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General(
                "server certificate does not match pinned fingerprint".into(),
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        supported_schemes()
    }
}

fn supported_schemes() -> Vec<rustls::SignatureScheme> {
    vec![
        rustls::SignatureScheme::RSA_PKCS1_SHA256,
        rustls::SignatureScheme::RSA_PKCS1_SHA384,
        rustls::SignatureScheme::RSA_PKCS1_SHA512,
        rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
        rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
        rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
        rustls::SignatureScheme::RSA_PSS_SHA256,
        rustls::SignatureScheme::RSA_PSS_SHA384,
        rustls::SignatureScheme::RSA_PSS_SHA512,
        rustls::SignatureScheme::ED25519,
    ]
}
