//! Per-collection synchronization cursors
//!
//! Each synchronized collection carries an opaque server-issued sync key
//! plus the timestamp of its last successful sync. The initial key `"0"`
//! requests a full resync; a key the server rejects is reset to initial
//! and never silently retried with stale state.

use crate::error::Result;
use crate::store::{MirrorOp, MirrorStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The sync key value that requests a full resync.
pub const INITIAL_SYNC_KEY: &str = "0";

/// Reserved collection id under which the folder-hierarchy cursor is
/// stored (the hierarchy has no folder of its own).
pub const HIERARCHY_COLLECTION_ID: &str = "0";

/// Synchronization state of one (account, collection) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Opaque server-issued sync key.
    pub key: String,
    /// Completion time of the last successfully applied batch.
    pub last_sync: Option<DateTime<Utc>>,
}

impl SyncCursor {
    /// The cursor that forces a full resync.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            key: INITIAL_SYNC_KEY.to_string(),
            last_sync: None,
        }
    }

    #[must_use]
    pub fn with_key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            last_sync: Some(Utc::now()),
        }
    }

    /// Whether this cursor requests a full resync.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.key == INITIAL_SYNC_KEY || self.key.is_empty()
    }
}

impl Default for SyncCursor {
    fn default() -> Self {
        Self::initial()
    }
}

/// Cursor access for one account, layered over the mirror store.
///
/// Reads resolve missing state to the initial cursor. Advancement is
/// deliberately *not* a method here: the engine appends a
/// [`MirrorOp::SetCursor`] to the same commit batch as the item writes,
/// so the cursor can never run ahead of the data it describes.
#[derive(Clone)]
pub struct CursorStore {
    account: String,
    mirror: Arc<dyn MirrorStore>,
}

impl CursorStore {
    pub fn new(account: &str, mirror: Arc<dyn MirrorStore>) -> Self {
        Self {
            account: account.to_string(),
            mirror,
        }
    }

    /// Current cursor of a collection, defaulting to initial.
    pub fn get(&self, collection_id: &str) -> Result<SyncCursor> {
        Ok(self
            .mirror
            .cursor(&self.account, collection_id)?
            .unwrap_or_default())
    }

    /// Reset a collection to the initial cursor, forcing the next sync
    /// to be a full resync. Used when the server rejects the stored key.
    pub fn invalidate(&self, collection_id: &str) -> Result<()> {
        self.mirror.commit(
            &self.account,
            vec![MirrorOp::SetCursor {
                collection_id: collection_id.to_string(),
                cursor: SyncCursor::initial(),
            }],
        )
    }

    /// The op that advances a collection's cursor; the caller appends it
    /// to the batch that writes the corresponding items.
    #[must_use]
    pub fn advance_op(collection_id: &str, new_key: &str) -> MirrorOp {
        MirrorOp::SetCursor {
            collection_id: collection_id.to_string(),
            cursor: SyncCursor::with_key(new_key),
        }
    }
}
