//! Account-facing ActiveSync client
//!
//! [`EasClient`] is the surface the application layer talks to: every
//! operation is addressed by account id, and one [`SyncEngine`] is kept
//! per account so in-flight coalescing and provisioning state survive
//! across calls.

use crate::engine::SyncEngine;
use crate::error::Result;
use crate::proto::operations::MeetingUserResponse;
use crate::store::{AccountStore, MirrorStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Multi-account ActiveSync client.
pub struct EasClient {
    accounts: Arc<dyn AccountStore>,
    mirror: Arc<dyn MirrorStore>,
    engines: Mutex<HashMap<String, SyncEngine>>,
}

impl EasClient {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountStore>, mirror: Arc<dyn MirrorStore>) -> Self {
        Self {
            accounts,
            mirror,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Synchronize the folder hierarchy of an account.
    ///
    /// Returns the number of changed folders.
    ///
    /// # Errors
    ///
    /// Returns an error when the account is unknown, provisioning
    /// fails, or the server response cannot be applied.
    pub async fn sync_folders(&self, account_id: &str) -> Result<usize> {
        self.engine(account_id)?.sync_folders().await
    }

    /// Synchronize one folder's items.
    ///
    /// Returns the number of applied changes.
    ///
    /// # Errors
    ///
    /// Returns an error when the folder does not exist or the sync
    /// cannot complete; a rejected sync key is retried with a full
    /// resync exactly once before surfacing.
    pub async fn sync_folder_items(&self, account_id: &str, folder_id: &str) -> Result<usize> {
        self.engine(account_id)?.sync_folder_items(folder_id).await
    }

    /// Synchronize all calendar folders of an account.
    ///
    /// # Errors
    ///
    /// Returns an error when the hierarchy cannot be established or a
    /// calendar collection fails to sync.
    pub async fn sync_calendar(&self, account_id: &str) -> Result<usize> {
        self.engine(account_id)?.sync_calendar().await
    }

    /// Download attachment bytes by server file reference.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ObjectNotFound`] when the reference has
    /// expired on the server, distinct from transport failures.
    pub async fn download_attachment(
        &self,
        account_id: &str,
        file_reference: &str,
    ) -> Result<Vec<u8>> {
        self.engine(account_id)?
            .download_attachment(file_reference)
            .await
    }

    /// Fetch and normalize the full body of a mail item.
    ///
    /// # Errors
    ///
    /// Returns an error when the item is unknown locally or the fetch
    /// fails.
    pub async fn load_item_body(&self, account_id: &str, item_id: &str) -> Result<()> {
        self.engine(account_id)?.load_item_body(item_id).await
    }

    /// Send a read receipt (MDN) for an item that requested one.
    ///
    /// # Errors
    ///
    /// Returns an error when the item is unknown or the server rejects
    /// the send.
    pub async fn send_read_receipt(&self, account_id: &str, item_id: &str) -> Result<()> {
        self.engine(account_id)?.send_read_receipt(item_id).await
    }

    /// Answer a meeting invitation.
    ///
    /// # Errors
    ///
    /// Returns an error when the invitation is unknown to the server or
    /// the response is rejected.
    pub async fn respond_to_meeting(
        &self,
        account_id: &str,
        folder_id: &str,
        request_id: &str,
        response: MeetingUserResponse,
    ) -> Result<Option<String>> {
        self.engine(account_id)?
            .respond_to_meeting(folder_id, request_id, response)
            .await
    }

    /// The cached engine for an account, created on first use so flight
    /// coalescing and provisioning state persist across calls.
    fn engine(&self, account_id: &str) -> Result<SyncEngine> {
        let mut engines = self
            .engines
            .lock()
            .map_err(|_| crate::Error::Store("engine cache lock poisoned".into()))?;
        if let Some(engine) = engines.get(account_id) {
            return Ok(engine.clone());
        }
        let config = self.accounts.account(account_id)?;
        let engine = SyncEngine::new(
            &config,
            Arc::clone(&self.mirror),
            Arc::clone(&self.accounts),
        )?;
        engines.insert(account_id.to_string(), engine.clone());
        Ok(engine)
    }
}
