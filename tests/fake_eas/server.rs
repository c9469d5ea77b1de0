//! In-process fake ActiveSync server for integration testing
//!
//! # How ActiveSync works (educational overview)
//!
//! ActiveSync is binary-XML-over-HTTP. Every command is an HTTP POST to
//! a single endpoint, with the command name in the query string and a
//! WBXML document as the body:
//!
//! ```text
//!   POST /Microsoft-Server-ActiveSync?Cmd=Sync&User=u&DeviceId=d&DeviceType=SmartPhone
//!   Content-Type: application/vnd.ms-sync.wbxml
//!   MS-ASProtocolVersion: 14.1
//!   X-MS-PolicyKey: 3378718254
//!
//!   <WBXML body>
//! ```
//!
//! The server answers 200 with a WBXML body (or an empty body meaning
//! "no changes" / "accepted"), 449 when the device must provision
//! first, or 401 for bad credentials.
//!
//! ## Sync keys
//!
//! Each collection carries an opaque sync key. Presenting key `0`
//! performs a key exchange (new key, no data); presenting the returned
//! key yields the data delta plus the next key. Presenting anything the
//! server does not recognize yields status 3, which the client must
//! answer with a full resync.
//!
//! This server implements exactly enough of that protocol to exercise
//! the engine end-to-end, with scripted misbehavior (always-invalid
//! keys, mandatory provisioning, response delays) for the failure-path
//! tests.

use super::handlers::{
    CommandResponse, handle_folder_sync, handle_item_operations, handle_meeting_response,
    handle_provision, handle_send_mail, handle_sync,
};
use super::state::ServerState;
use airsync_client::wbxml::decode;
use airsync_client::wbxml::pages::{FOLDER_HIERARCHY, folder_hierarchy as fh};
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// A fake ActiveSync server on localhost with an OS-assigned port.
pub struct FakeEasServer {
    port: u16,
    state: Arc<Mutex<ServerState>>,
    cert_der: Option<Vec<u8>>,
    /// Handle to the background task so it lives as long as the server.
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeEasServer {
    /// Start over plain HTTP.
    pub async fn start(state: ServerState) -> Self {
        Self::start_inner(state, false).await
    }

    /// Start over HTTPS with a fresh self-signed certificate.
    pub async fn start_tls(state: ServerState) -> Self {
        Self::start_inner(state, true).await
    }

    async fn start_inner(state: ServerState, tls: bool) -> Self {
        // Multiple tests may race to install the provider; the error
        // for an already-installed one is ignored.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let state = Arc::new(Mutex::new(state));

        let (acceptor, cert_der) = if tls {
            let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
                .expect("generate self-signed cert");
            let cert_der = cert.cert.der().clone();
            let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
            let tls_config = rustls::ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(vec![cert_der.clone()], key_der.into())
                .expect("build server TLS config");
            (
                Some(TlsAcceptor::from(Arc::new(tls_config))),
                Some(cert_der.as_ref().to_vec()),
            )
        } else {
            (None, None)
        };

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let state = Arc::clone(&accept_state);
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor {
                        Some(acceptor) => {
                            if let Ok(tls_stream) = acceptor.accept(stream).await {
                                handle_connection(tls_stream, &state).await;
                            }
                        }
                        None => handle_connection(stream, &state).await,
                    }
                });
            }
        });

        Self {
            port,
            state,
            cert_der,
            _handle: handle,
        }
    }

    /// The port the server is listening on.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Requests seen for one command name.
    pub fn request_count(&self, command: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .get(command)
            .copied()
            .unwrap_or(0)
    }

    /// Completed provisioning handshakes.
    pub fn handshakes(&self) -> usize {
        self.state.lock().unwrap().handshakes
    }

    /// MIME payloads submitted via SendMail.
    pub fn sent_mail(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().sent_mail.clone()
    }

    /// Mutate server state between requests (scripted hierarchy changes
    /// and the like).
    pub fn with_state(&self, mutate: impl FnOnce(&mut ServerState)) {
        mutate(&mut self.state.lock().unwrap());
    }

    /// Hex SHA-256 fingerprint of the TLS certificate, for pinning
    /// tests. Only present after [`Self::start_tls`].
    pub fn cert_sha256_hex(&self) -> Option<String> {
        self.cert_der.as_ref().map(|der| {
            Sha256::digest(der)
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect()
        })
    }
}

/// Serve HTTP/1.1 requests on one connection until it closes.
async fn handle_connection<S: AsyncRead + AsyncWrite + Unpin>(
    stream: S,
    state: &Mutex<ServerState>,
) {
    let mut reader = BufReader::new(stream);
    loop {
        let Some(request) = read_request(&mut reader).await else {
            return;
        };

        // Scripted latency, applied outside the state lock so parallel
        // requests can actually overlap.
        let delay = state.lock().unwrap().sync_delay;
        if request.command == "Sync" && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let reply = dispatch(state, &request);
        if write_reply(&mut reader, &reply).await.is_err() {
            return;
        }
    }
}

struct HttpRequest {
    command: String,
    policy_key: Option<String>,
    body: Vec<u8>,
}

enum HttpReply {
    Ok(Vec<u8>),
    Empty,
    PolicyRequired,
    BadRequest,
}

async fn read_request<S: AsyncRead + AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
) -> Option<HttpRequest> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.ok()? == 0 {
        return None;
    }

    let target = request_line.split_whitespace().nth(1)?;
    let command = target
        .split_once('?')
        .map(|(_, query)| query)
        .and_then(|query| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("Cmd="))
        })
        .unwrap_or("")
        .to_string();

    let mut headers: HashMap<String, String> = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.ok()?;

    Some(HttpRequest {
        command,
        policy_key: headers.get("x-ms-policykey").cloned(),
        body,
    })
}

fn dispatch(state: &Mutex<ServerState>, request: &HttpRequest) -> HttpReply {
    let mut state = state.lock().unwrap();
    state.count_request(&request.command);

    // Provisioning gate: everything except Provision itself needs the
    // final policy key.
    if state.require_provisioning && request.command != "Provision" {
        let presented = request.policy_key.as_deref().unwrap_or("0");
        if state.policy_key.as_deref() != Some(presented) {
            return HttpReply::PolicyRequired;
        }
    }

    let Ok(root) = decode(&request.body) else {
        return HttpReply::BadRequest;
    };

    let response = match request.command.as_str() {
        "FolderSync" => {
            let presented = root
                .child_text(FOLDER_HIERARCHY, fh::SYNC_KEY)
                .unwrap_or_default();
            handle_folder_sync(&mut state, &presented)
        }
        "Sync" => handle_sync(&mut state, &root),
        "Provision" => handle_provision(&mut state, &root),
        "ItemOperations" => handle_item_operations(&mut state, &root),
        "SendMail" => handle_send_mail(&mut state, &root),
        "MeetingResponse" => handle_meeting_response(&mut state, &root),
        _ => return HttpReply::BadRequest,
    };

    match response {
        CommandResponse::Wbxml(bytes) => HttpReply::Ok(bytes),
        CommandResponse::Empty => HttpReply::Empty,
    }
}

async fn write_reply<S: AsyncRead + AsyncWrite + Unpin>(
    reader: &mut BufReader<S>,
    reply: &HttpReply,
) -> std::io::Result<()> {
    let (status_line, body): (&str, &[u8]) = match reply {
        HttpReply::Ok(bytes) => ("HTTP/1.1 200 OK", bytes),
        HttpReply::Empty => ("HTTP/1.1 200 OK", &[]),
        HttpReply::PolicyRequired => ("HTTP/1.1 449 Retry With", &[]),
        HttpReply::BadRequest => ("HTTP/1.1 400 Bad Request", &[]),
    };

    let head = format!(
        "{status_line}\r\n\
         Content-Type: application/vnd.ms-sync.wbxml\r\n\
         Content-Length: {}\r\n\
         \r\n",
        body.len()
    );
    let stream = reader.get_mut();
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await
}
