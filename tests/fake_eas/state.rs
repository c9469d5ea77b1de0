//! Test data model for the fake ActiveSync server
//!
//! Provides a builder-style API for constructing server state:
//!
//! ```ignore
//! let state = ServerStateBuilder::new()
//!     .folder("5", None, "Inbox", 2)
//!     .mail_item("5", "5:1", "alice@example.com", "Hello")
//!     .attachment("att-77", b"%PDF-1.4 ...")
//!     .require_provisioning()
//!     .build();
//! ```
//!
//! The state is shared with the server via `Arc<Mutex<_>>` so tests can
//! inspect request counters and sent mail after driving the engine.

use std::collections::HashMap;
use std::time::Duration;

/// A folder in the fake hierarchy.
#[derive(Debug, Clone)]
pub struct FakeFolder {
    pub server_id: String,
    pub parent_id: Option<String>,
    pub display_name: String,
    /// Wire folder-type code (2 = inbox, 8 = calendar, ...).
    pub type_code: u8,
}

/// An item served from a folder during Sync.
#[derive(Debug, Clone)]
pub struct FakeItem {
    pub folder_id: String,
    pub server_id: String,
    pub from: String,
    pub subject: String,
    pub read: bool,
    /// Non-truncated inline body, when the item has one.
    pub body_html: Option<String>,
    /// `(file_reference, display_name)` pairs reported as attachments.
    pub attachments: Vec<(String, String)>,
}

/// One pending hierarchy change reported on the next FolderSync.
#[derive(Debug, Clone)]
pub enum PendingFolderChange {
    Update(FakeFolder),
    Delete(String),
}

/// Complete fake server state.
#[derive(Debug, Default)]
pub struct ServerState {
    pub folders: Vec<FakeFolder>,
    pub items: Vec<FakeItem>,
    /// Server ids reported as Delete commands on the next data round.
    pub deleted_items: Vec<(String, String)>,
    /// Full MIME payloads served by ItemOperations item fetch.
    pub item_mime: HashMap<String, Vec<u8>>,
    /// Attachment bytes served by ItemOperations file-reference fetch.
    pub attachments: HashMap<String, Vec<u8>>,
    /// Hierarchy changes drained by the next FolderSync.
    pub pending_folder_changes: Vec<PendingFolderChange>,

    /// Demand a policy handshake before serving commands.
    pub require_provisioning: bool,
    /// Final policy key, set once the handshake completes.
    pub policy_key: Option<String>,
    /// Completed handshakes (acknowledgments received).
    pub handshakes: usize,
    /// Report every presented sync key as invalid (status 3).
    pub always_invalid_sync_key: bool,

    /// Hierarchy sync key counter.
    pub folder_sync_key: u32,
    /// Per-collection item sync key counters.
    pub collection_keys: HashMap<String, u32>,

    /// Requests seen, per command name.
    pub requests: HashMap<String, usize>,
    /// MIME payloads received via SendMail.
    pub sent_mail: Vec<Vec<u8>>,
    /// Artificial delay before answering Sync, to overlap requests.
    pub sync_delay: Duration,
}

impl ServerState {
    pub fn folder(&self, server_id: &str) -> Option<&FakeFolder> {
        self.folders.iter().find(|f| f.server_id == server_id)
    }

    pub fn items_in(&self, folder_id: &str) -> Vec<&FakeItem> {
        self.items
            .iter()
            .filter(|i| i.folder_id == folder_id)
            .collect()
    }

    pub fn count_request(&mut self, command: &str) {
        *self.requests.entry(command.to_string()).or_insert(0) += 1;
    }
}

/// Builder for [`ServerState`].
pub struct ServerStateBuilder {
    state: ServerState,
}

impl ServerStateBuilder {
    pub fn new() -> Self {
        Self {
            state: ServerState::default(),
        }
    }

    /// Add a folder to the hierarchy.
    pub fn folder(
        mut self,
        server_id: &str,
        parent_id: Option<&str>,
        display_name: &str,
        type_code: u8,
    ) -> Self {
        self.state.folders.push(FakeFolder {
            server_id: server_id.to_string(),
            parent_id: parent_id.map(ToString::to_string),
            display_name: display_name.to_string(),
            type_code,
        });
        self
    }

    /// Add a mail item to a folder.
    pub fn mail_item(mut self, folder_id: &str, server_id: &str, from: &str, subject: &str) -> Self {
        self.state.items.push(FakeItem {
            folder_id: folder_id.to_string(),
            server_id: server_id.to_string(),
            from: from.to_string(),
            subject: subject.to_string(),
            read: false,
            body_html: None,
            attachments: Vec::new(),
        });
        self
    }

    /// Attach an inline body to the most recently added item.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.mail_item()` call.
    pub fn with_body(mut self, html: &str) -> Self {
        self.state
            .items
            .last_mut()
            .expect("call .mail_item() before .with_body()")
            .body_html = Some(html.to_string());
        self
    }

    /// Report an attachment on the most recently added item.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.mail_item()` call.
    pub fn with_attachment(mut self, file_reference: &str, display_name: &str) -> Self {
        self.state
            .items
            .last_mut()
            .expect("call .mail_item() before .with_attachment()")
            .attachments
            .push((file_reference.to_string(), display_name.to_string()));
        self
    }

    /// Serve a full MIME payload for an item's body fetch.
    pub fn item_mime(mut self, server_id: &str, mime: &[u8]) -> Self {
        self.state
            .item_mime
            .insert(server_id.to_string(), mime.to_vec());
        self
    }

    /// Serve attachment bytes for a file reference.
    pub fn attachment(mut self, file_reference: &str, bytes: &[u8]) -> Self {
        self.state
            .attachments
            .insert(file_reference.to_string(), bytes.to_vec());
        self
    }

    /// Report an item as deleted on the next data round.
    pub fn deleted_item(mut self, folder_id: &str, server_id: &str) -> Self {
        self.state
            .deleted_items
            .push((folder_id.to_string(), server_id.to_string()));
        self
    }

    /// Demand the policy handshake before serving any command.
    pub fn require_provisioning(mut self) -> Self {
        self.state.require_provisioning = true;
        self
    }

    /// Reject every presented sync key with status 3.
    pub fn always_invalid_sync_key(mut self) -> Self {
        self.state.always_invalid_sync_key = true;
        self
    }

    /// Delay Sync responses so concurrent requests overlap.
    pub fn sync_delay(mut self, delay: Duration) -> Self {
        self.state.sync_delay = delay;
        self
    }

    pub fn build(self) -> ServerState {
        self.state
    }
}
