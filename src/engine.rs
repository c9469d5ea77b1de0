//! Sync engine orchestrator
//!
//! The state machine that coordinates hierarchy sync, per-folder item
//! sync, on-demand fetches, and result reconciliation against the local
//! mirror. This is the only component that decides retry vs. surface
//! vs. escalate:
//!
//! - retryable transport errors get bounded retries with backoff here,
//!   never inside the transport;
//! - HTTP 449 triggers one provisioning cycle, then one retry of the
//!   original operation;
//! - a rejected sync key resets the cursor and restarts at most once
//!   per top-level call;
//! - decode errors abort only the affected collection's sync.
//!
//! Mirror writes never span an await point: a batch is applied and its
//! cursor advanced in one synchronous commit, so cancelling a sync
//! future can only land between network round-trips, never mid-write.

use crate::config::AccountConfig;
use crate::cursor::{CursorStore, HIERARCHY_COLLECTION_ID};
use crate::error::{Error, Result};
use crate::flight::FlightMap;
use crate::mime;
use crate::model::{Body, BodyKind, Folder, FolderKind, MailItem, SyncItem};
use crate::proto::operations::MeetingUserResponse;
use crate::proto::{folders, items, operations};
use crate::provision::ProvisionManager;
use crate::store::{AccountStore, MirrorOp, MirrorStore};
use crate::transport::Session;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Upper bound on windowed Sync rounds within one top-level call; a
/// server that keeps reporting `MoreAvailable` past this is misbehaving.
const MAX_SYNC_WINDOWS: usize = 25;

/// Bounded retry for retryable transport errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff before retry number `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Synchronization engine for one account.
///
/// Cheap to clone; all state is shared. Cursor advancement is owned
/// exclusively by this type — every advance rides the mirror commit
/// that writes the batch it describes.
#[derive(Clone)]
pub struct SyncEngine {
    account_id: String,
    username: String,
    session: Session,
    provision: Arc<ProvisionManager>,
    mirror: Arc<dyn MirrorStore>,
    cursors: CursorStore,
    flights: Arc<FlightMap>,
    retry: RetryPolicy,
}

impl SyncEngine {
    pub fn new(
        config: &AccountConfig,
        mirror: Arc<dyn MirrorStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Result<Self> {
        let session = Session::new(config)?;
        let provision = Arc::new(ProvisionManager::new(
            &config.account_id,
            config.policy_key.clone(),
            accounts,
        ));
        Ok(Self {
            account_id: config.account_id.clone(),
            username: config.username.clone(),
            session,
            provision,
            cursors: CursorStore::new(&config.account_id, Arc::clone(&mirror)),
            mirror,
            flights: Arc::new(FlightMap::new()),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Synchronize the folder hierarchy, returning the number of
    /// changed folders.
    pub async fn sync_folders(&self) -> Result<usize> {
        let engine = self.clone();
        self.flights
            .run(HIERARCHY_COLLECTION_ID, async move {
                engine.sync_folders_inner().await
            })
            .await
    }

    /// Synchronize one folder's items, returning the number of applied
    /// changes. Concurrent calls for the same folder coalesce into one
    /// round-trip.
    pub async fn sync_folder_items(&self, folder_id: &str) -> Result<usize> {
        let engine = self.clone();
        let folder = folder_id.to_string();
        self.flights
            .run(folder_id, async move {
                engine.sync_folder_items_inner(&folder).await
            })
            .await
    }

    /// Synchronize every calendar folder of the account.
    pub async fn sync_calendar(&self) -> Result<usize> {
        let mut calendars = self.calendar_folders()?;
        if calendars.is_empty() {
            // First sync: the hierarchy has not been fetched yet.
            self.sync_folders().await?;
            calendars = self.calendar_folders()?;
        }

        let mut total = 0;
        for folder in calendars {
            total += self.sync_folder_items(&folder.server_id).await?;
        }
        Ok(total)
    }

    /// Fetch and normalize the full body of a mail item.
    pub async fn load_item_body(&self, server_id: &str) -> Result<()> {
        let Some(SyncItem::Mail(mail)) = self.mirror.item(&self.account_id, server_id)? else {
            return Err(Error::ObjectNotFound(format!(
                "item {server_id} is not in the local mirror"
            )));
        };

        let request = operations::fetch_item_request(&mail.folder_id, server_id);
        let bytes = self.run_command("ItemOperations", request).await?;
        let raw = operations::parse_fetch_response(&bytes)?;

        let body = mime::html_body(&raw).map_or_else(
            || Body {
                kind: BodyKind::Plain,
                text: mime::strip_separators(&String::from_utf8_lossy(&raw)),
            },
            |html| Body {
                kind: BodyKind::Html,
                text: html,
            },
        );
        let read_receipt_requested = mime::requests_read_receipt(&raw);

        debug!(
            account = %self.account_id,
            item = server_id,
            kind = ?body.kind,
            "storing fetched body"
        );
        self.mirror.commit(
            &self.account_id,
            vec![MirrorOp::SetItemBody {
                server_id: server_id.to_string(),
                body,
                read_receipt_requested,
            }],
        )
    }

    /// Download attachment bytes by server file reference.
    ///
    /// Independent of item sync: no cursor state is touched, so this may
    /// run concurrently with any folder's sync. The caller persists the
    /// bytes and records the local path on the attachment.
    pub async fn download_attachment(&self, file_reference: &str) -> Result<Vec<u8>> {
        let request = operations::fetch_attachment_request(file_reference);
        let bytes = self.run_command("ItemOperations", request).await?;
        let data = operations::parse_fetch_response(&bytes)?;
        info!(
            account = %self.account_id,
            reference = file_reference,
            bytes = data.len(),
            "attachment downloaded"
        );
        Ok(data)
    }

    /// Answer a pending read-receipt request with an MDN.
    pub async fn send_read_receipt(&self, server_id: &str) -> Result<()> {
        let Some(SyncItem::Mail(mail)) = self.mirror.item(&self.account_id, server_id)? else {
            return Err(Error::ObjectNotFound(format!(
                "item {server_id} is not in the local mirror"
            )));
        };

        let client_id = format!("{}-{server_id}-mdn", self.account_id);
        let mime_bytes = read_receipt_mime(&self.username, &mail);
        let request = operations::send_mail_request(&client_id, &mime_bytes);
        let response = self.run_command("SendMail", request).await?;
        operations::check_send_mail_response(&response)?;

        self.mirror.commit(
            &self.account_id,
            vec![MirrorOp::ClearReadReceipt {
                server_id: server_id.to_string(),
            }],
        )
    }

    /// Accept, tentatively accept, or decline a meeting invitation.
    /// Returns the server-side calendar item id when one was created.
    pub async fn respond_to_meeting(
        &self,
        folder_id: &str,
        request_id: &str,
        response: MeetingUserResponse,
    ) -> Result<Option<String>> {
        let request = operations::meeting_response_request(folder_id, request_id, response);
        let bytes = self.run_command("MeetingResponse", request).await?;
        operations::parse_meeting_response(&bytes)
    }

    // -- orchestration internals --

    async fn sync_folders_inner(&self) -> Result<usize> {
        let mut resets_left = 1;
        loop {
            let cursor = self.cursors.get(HIERARCHY_COLLECTION_ID)?;
            debug!(account = %self.account_id, key = %cursor.key, "folder hierarchy sync");
            let bytes = self
                .run_command("FolderSync", folders::request(&cursor.key))
                .await?;

            let response = match folders::parse_response(&bytes) {
                Ok(response) => response,
                Err(e @ Error::CursorInvalid(_)) if resets_left > 0 => {
                    warn!(account = %self.account_id, error = %e, "hierarchy key rejected, full resync");
                    resets_left -= 1;
                    self.cursors.invalidate(HIERARCHY_COLLECTION_ID)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let count = response.change_count();
            let ops = self.hierarchy_ops(response)?;
            self.mirror.commit(&self.account_id, ops)?;
            info!(account = %self.account_id, changed = count, "folder hierarchy applied");
            return Ok(count);
        }
    }

    /// Diff server hierarchy changes into mirror ops, preserving the
    /// immutable kind of existing non-mail folders.
    fn hierarchy_ops(&self, response: folders::FolderSyncResponse) -> Result<Vec<MirrorOp>> {
        let existing: HashMap<String, Folder> = self
            .mirror
            .folders(&self.account_id)?
            .into_iter()
            .map(|f| (f.server_id.clone(), f))
            .collect();

        let mut ops = Vec::new();
        for folder in response.adds {
            ops.push(MirrorOp::UpsertFolder(folder));
        }
        for mut folder in response.updates {
            if let Some(known) = existing.get(&folder.server_id) {
                if !known.kind.is_mail() {
                    folder.kind = known.kind;
                }
                folder.unread_count = known.unread_count;
                folder.total_count = known.total_count;
            }
            ops.push(MirrorOp::UpsertFolder(folder));
        }
        for server_id in response.deletes {
            ops.push(MirrorOp::DeleteFolder { server_id });
        }
        ops.push(CursorStore::advance_op(
            HIERARCHY_COLLECTION_ID,
            &response.sync_key,
        ));
        Ok(ops)
    }

    async fn sync_folder_items_inner(&self, folder_id: &str) -> Result<usize> {
        let kind = self.folder_kind(folder_id).await?;

        let mut total = 0;
        let mut resets_left = 1;
        for _ in 0..MAX_SYNC_WINDOWS {
            let cursor = self.cursors.get(folder_id)?;
            let presented_initial = cursor.is_initial();
            let request = items::request(folder_id, kind, &cursor.key);
            let bytes = self.run_command("Sync", request).await?;

            // An empty 200 means "no changes since this key".
            if bytes.is_empty() {
                debug!(account = %self.account_id, folder = folder_id, "collection unchanged");
                return Ok(total);
            }

            let sync = match items::parse_response(&bytes, folder_id, kind) {
                Ok(sync) => sync,
                Err(e @ Error::CursorInvalid(_)) if resets_left > 0 => {
                    warn!(
                        account = %self.account_id,
                        folder = folder_id,
                        error = %e,
                        "sync key rejected, forcing full resync"
                    );
                    resets_left -= 1;
                    self.cursors.invalidate(folder_id)?;
                    // The hierarchy may have changed underneath us; the
                    // same status family covers both conditions.
                    self.sync_folders().await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            total += self.apply_batch(folder_id, &sync)?;
            if sync.more_available || presented_initial {
                continue;
            }
            return Ok(total);
        }

        Err(Error::ProtocolDecode(format!(
            "folder {folder_id} sync did not converge within {MAX_SYNC_WINDOWS} windows"
        )))
    }

    /// Apply one response batch and advance the cursor in a single
    /// atomic commit. Re-applying the same batch is a no-op update.
    fn apply_batch(&self, folder_id: &str, sync: &items::CollectionSync) -> Result<usize> {
        let mut ops: Vec<MirrorOp> = Vec::with_capacity(sync.change_count() + 1);
        for item in &sync.upserts {
            ops.push(MirrorOp::UpsertItem(item.clone()));
        }
        for server_id in &sync.deletes {
            ops.push(MirrorOp::DeleteItem {
                server_id: server_id.clone(),
            });
        }
        ops.push(CursorStore::advance_op(folder_id, &sync.sync_key));
        self.mirror.commit(&self.account_id, ops)?;

        debug!(
            account = %self.account_id,
            folder = folder_id,
            upserts = sync.upserts.len(),
            deletes = sync.deletes.len(),
            key = %sync.sync_key,
            "batch applied"
        );
        Ok(sync.change_count())
    }

    /// Resolve a folder's kind, fetching the hierarchy first when the
    /// mirror has never seen it.
    async fn folder_kind(&self, folder_id: &str) -> Result<FolderKind> {
        if let Some(folder) = self.lookup_folder(folder_id)? {
            return Ok(folder.kind);
        }
        self.sync_folders().await?;
        self.lookup_folder(folder_id)?.map_or_else(
            || {
                Err(Error::ObjectNotFound(format!(
                    "folder {folder_id} does not exist on the server"
                )))
            },
            |folder| Ok(folder.kind),
        )
    }

    fn lookup_folder(&self, folder_id: &str) -> Result<Option<Folder>> {
        Ok(self
            .mirror
            .folders(&self.account_id)?
            .into_iter()
            .find(|f| f.server_id == folder_id))
    }

    fn calendar_folders(&self) -> Result<Vec<Folder>> {
        Ok(self
            .mirror
            .folders(&self.account_id)?
            .into_iter()
            .filter(|f| f.kind == FolderKind::Calendar)
            .collect())
    }

    /// Execute one command with the engine's failure semantics: bounded
    /// backoff for retryable errors and a single provisioning side-loop
    /// on HTTP 449.
    async fn run_command(&self, command: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let mut provisioned = false;
        let mut attempt: u32 = 0;
        loop {
            let policy_key = self.provision.policy_key().await;
            match self
                .session
                .execute(command, policy_key.as_deref(), body.clone())
                .await
            {
                Ok(bytes) => return Ok(bytes),
                Err(Error::PolicyRequired(_)) if !provisioned => {
                    provisioned = true;
                    info!(account = %self.account_id, command, "provisioning before retry");
                    self.provision.provision(&self.session).await?;
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.attempts => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    warn!(
                        account = %self.account_id,
                        command,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "transport error, backing off"
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Build the MDN (message/disposition-notification) answering a read
/// receipt request.
fn read_receipt_mime(reporting_user: &str, item: &MailItem) -> Vec<u8> {
    format!(
        "From: {reporting_user}\r\n\
         To: {}\r\n\
         Subject: Read: {}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: message/disposition-notification\r\n\
         \r\n\
         Reporting-UA: airsync-client\r\n\
         Final-Recipient: rfc822;{reporting_user}\r\n\
         Disposition: manual-action/MDN-sent-manually; displayed\r\n",
        item.from, item.subject
    )
    .into_bytes()
}
