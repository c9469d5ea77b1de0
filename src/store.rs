//! Local mirror and account store interfaces
//!
//! The persistent storage engine is external; the sync engine only needs
//! this narrow surface. All writes go through [`MirrorStore::commit`],
//! which implementors must apply atomically — item writes and the cursor
//! advance for one batch always travel in the same commit, so a crash
//! can never leave a cursor ahead of what was durably stored.

use crate::config::AccountConfig;
use crate::cursor::SyncCursor;
use crate::error::{Error, Result};
use crate::model::{Body, Folder, SyncItem};
use std::collections::HashMap;
use std::sync::Mutex;

/// One mutation applied to the local mirror.
#[derive(Debug, Clone)]
pub enum MirrorOp {
    UpsertFolder(Folder),
    /// Removes the folder and everything it contains.
    DeleteFolder { server_id: String },
    UpsertItem(SyncItem),
    DeleteItem { server_id: String },
    /// Replace a fetched item body without touching other envelope
    /// fields, recording whether the fetched MIME asks for a read
    /// receipt.
    SetItemBody {
        server_id: String,
        body: Body,
        read_receipt_requested: bool,
    },
    /// Clear the read-receipt-pending flag after an MDN was sent.
    ClearReadReceipt { server_id: String },
    /// Record where a downloaded attachment was cached locally.
    SetAttachmentPath {
        item_id: String,
        file_reference: String,
        local_path: String,
    },
    /// Advance (or reset) the sync cursor of a collection.
    SetCursor { collection_id: String, cursor: SyncCursor },
}

/// The relational record store the engine reads and writes through.
///
/// `commit` must apply all ops of one call atomically (single
/// transaction or equivalent); partial application is not acceptable.
pub trait MirrorStore: Send + Sync {
    fn cursor(&self, account: &str, collection_id: &str) -> Result<Option<SyncCursor>>;

    fn folders(&self, account: &str) -> Result<Vec<Folder>>;

    fn item(&self, account: &str, server_id: &str) -> Result<Option<SyncItem>>;

    fn commit(&self, account: &str, ops: Vec<MirrorOp>) -> Result<()>;
}

/// Account lookup and policy-token persistence, owned by the external
/// credential store.
pub trait AccountStore: Send + Sync {
    fn account(&self, account_id: &str) -> Result<AccountConfig>;

    /// Persist the policy key produced by a completed provisioning
    /// handshake.
    fn save_policy_key(&self, account_id: &str, policy_key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct MirrorState {
    folders: HashMap<String, Folder>,
    items: HashMap<String, SyncItem>,
    cursors: HashMap<String, SyncCursor>,
}

/// In-memory [`MirrorStore`] used by tests and the CLI.
///
/// A single mutex over the whole state makes each `commit` trivially
/// atomic and serializes mutations per account, matching the
/// concurrency contract real implementations must provide.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    accounts: Mutex<HashMap<String, MirrorState>>,
}

impl MemoryMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all items in a folder, for assertions and display.
    pub fn items_in_folder(&self, account: &str, folder_id: &str) -> Vec<SyncItem> {
        let accounts = self.accounts.lock().expect("mirror lock poisoned");
        accounts.get(account).map_or_else(Vec::new, |state| {
            let mut items: Vec<SyncItem> = state
                .items
                .values()
                .filter(|item| match item {
                    SyncItem::Mail(m) => m.folder_id == folder_id,
                    SyncItem::Event(e) => e.folder_id == folder_id,
                    SyncItem::Contact(c) => c.folder_id == folder_id,
                    SyncItem::Task(t) => t.folder_id == folder_id,
                })
                .cloned()
                .collect();
            items.sort_by(|a, b| a.server_id().cmp(b.server_id()));
            items
        })
    }
}

impl MirrorStore for MemoryMirror {
    fn cursor(&self, account: &str, collection_id: &str) -> Result<Option<SyncCursor>> {
        let accounts = self.accounts.lock().map_err(|_| poisoned())?;
        Ok(accounts
            .get(account)
            .and_then(|state| state.cursors.get(collection_id))
            .cloned())
    }

    fn folders(&self, account: &str) -> Result<Vec<Folder>> {
        let accounts = self.accounts.lock().map_err(|_| poisoned())?;
        let mut folders: Vec<Folder> = accounts
            .get(account)
            .map(|state| state.folders.values().cloned().collect())
            .unwrap_or_default();
        folders.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        Ok(folders)
    }

    fn item(&self, account: &str, server_id: &str) -> Result<Option<SyncItem>> {
        let accounts = self.accounts.lock().map_err(|_| poisoned())?;
        Ok(accounts
            .get(account)
            .and_then(|state| state.items.get(server_id))
            .cloned())
    }

    fn commit(&self, account: &str, ops: Vec<MirrorOp>) -> Result<()> {
        let mut accounts = self.accounts.lock().map_err(|_| poisoned())?;
        let state = accounts.entry(account.to_string()).or_default();
        for op in ops {
            match op {
                MirrorOp::UpsertFolder(folder) => {
                    state.folders.insert(folder.server_id.clone(), folder);
                }
                MirrorOp::DeleteFolder { server_id } => {
                    state.folders.remove(&server_id);
                    state.items.retain(|_, item| match item {
                        SyncItem::Mail(m) => m.folder_id != server_id,
                        SyncItem::Event(e) => e.folder_id != server_id,
                        SyncItem::Contact(c) => c.folder_id != server_id,
                        SyncItem::Task(t) => t.folder_id != server_id,
                    });
                    state.cursors.remove(&server_id);
                }
                MirrorOp::UpsertItem(item) => {
                    state.items.insert(item.server_id().to_string(), item);
                }
                MirrorOp::DeleteItem { server_id } => {
                    state.items.remove(&server_id);
                }
                MirrorOp::SetItemBody {
                    server_id,
                    body,
                    read_receipt_requested,
                } => {
                    if let Some(SyncItem::Mail(mail)) = state.items.get_mut(&server_id) {
                        mail.body = Some(body);
                        mail.read_receipt_pending = read_receipt_requested;
                    }
                }
                MirrorOp::ClearReadReceipt { server_id } => {
                    if let Some(SyncItem::Mail(mail)) = state.items.get_mut(&server_id) {
                        mail.read_receipt_pending = false;
                    }
                }
                MirrorOp::SetAttachmentPath {
                    item_id,
                    file_reference,
                    local_path,
                } => {
                    if let Some(SyncItem::Mail(mail)) = state.items.get_mut(&item_id) {
                        if let Some(att) = mail
                            .attachments
                            .iter_mut()
                            .find(|a| a.file_reference == file_reference)
                        {
                            att.local_path = Some(local_path);
                        }
                    }
                }
                MirrorOp::SetCursor { collection_id, cursor } => {
                    state.cursors.insert(collection_id, cursor);
                }
            }
        }
        Ok(())
    }
}

/// In-memory [`AccountStore`] holding a fixed set of accounts.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: Mutex<HashMap<String, AccountConfig>>,
}

impl MemoryAccounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config: AccountConfig) {
        self.accounts
            .lock()
            .expect("account lock poisoned")
            .insert(config.account_id.clone(), config);
    }
}

impl AccountStore for MemoryAccounts {
    fn account(&self, account_id: &str) -> Result<AccountConfig> {
        self.accounts
            .lock()
            .map_err(|_| poisoned())?
            .get(account_id)
            .cloned()
            .ok_or_else(|| Error::Config(format!("unknown account {account_id}")))
    }

    fn save_policy_key(&self, account_id: &str, policy_key: &str) -> Result<()> {
        let mut accounts = self.accounts.lock().map_err(|_| poisoned())?;
        let config = accounts
            .get_mut(account_id)
            .ok_or_else(|| Error::Config(format!("unknown account {account_id}")))?;
        config.policy_key = Some(policy_key.to_string());
        Ok(())
    }
}

fn poisoned() -> Error {
    Error::Store("store lock poisoned".into())
}
