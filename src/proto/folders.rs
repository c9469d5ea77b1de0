//! FolderSync command: hierarchy diff against the local folder table

use super::folder_status_error;
use crate::error::{Error, Result};
use crate::model::{Folder, FolderKind};
use crate::wbxml::pages::{FOLDER_HIERARCHY, folder_hierarchy as fh};
use crate::wbxml::{Node, Writer, decode};

/// Build a FolderSync request for the given hierarchy sync key.
#[must_use]
pub fn request(sync_key: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(FOLDER_HIERARCHY, fh::FOLDER_SYNC);
    w.text_element(FOLDER_HIERARCHY, fh::SYNC_KEY, sync_key);
    w.end();
    w.finish()
}

/// Server-reported hierarchy changes for one FolderSync round-trip.
#[derive(Debug, Clone, Default)]
pub struct FolderSyncResponse {
    pub sync_key: String,
    pub adds: Vec<Folder>,
    pub updates: Vec<Folder>,
    pub deletes: Vec<String>,
}

impl FolderSyncResponse {
    /// Number of folders touched by this response.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.adds.len() + self.updates.len() + self.deletes.len()
    }
}

/// Parse a FolderSync response, surfacing a sync-key mismatch as
/// [`Error::CursorInvalid`].
pub fn parse_response(bytes: &[u8]) -> Result<FolderSyncResponse> {
    let root = decode(bytes)?;
    if !root.is(FOLDER_HIERARCHY, fh::FOLDER_SYNC) {
        return Err(Error::ProtocolDecode(
            "expected FolderSync response root".into(),
        ));
    }

    let status = root
        .child_u32(FOLDER_HIERARCHY, fh::STATUS)
        .ok_or_else(|| Error::ProtocolDecode("FolderSync response without status".into()))?;
    if status != 1 {
        return Err(folder_status_error(status));
    }

    let sync_key = root
        .child_text(FOLDER_HIERARCHY, fh::SYNC_KEY)
        .ok_or_else(|| Error::ProtocolDecode("FolderSync response without sync key".into()))?;

    let mut response = FolderSyncResponse {
        sync_key,
        ..FolderSyncResponse::default()
    };

    if let Some(changes) = root.find(FOLDER_HIERARCHY, fh::CHANGES) {
        for add in changes.find_all(FOLDER_HIERARCHY, fh::ADD) {
            if let Some(folder) = parse_folder(add) {
                response.adds.push(folder);
            }
        }
        for update in changes.find_all(FOLDER_HIERARCHY, fh::UPDATE) {
            if let Some(folder) = parse_folder(update) {
                response.updates.push(folder);
            }
        }
        for delete in changes.find_all(FOLDER_HIERARCHY, fh::DELETE) {
            if let Some(id) = delete.child_text(FOLDER_HIERARCHY, fh::SERVER_ID) {
                response.deletes.push(id);
            }
        }
    }

    Ok(response)
}

fn parse_folder(node: &Node) -> Option<Folder> {
    let server_id = node.child_text(FOLDER_HIERARCHY, fh::SERVER_ID)?;
    let display_name = node
        .child_text(FOLDER_HIERARCHY, fh::DISPLAY_NAME)
        .unwrap_or_default();
    let parent_id = node
        .child_text(FOLDER_HIERARCHY, fh::PARENT_ID)
        .filter(|p| p != "0");
    let kind = node
        .child_u32(FOLDER_HIERARCHY, fh::TYPE)
        .and_then(|t| u8::try_from(t).ok())
        .map_or(FolderKind::Other, FolderKind::from_server_type);

    Some(Folder {
        server_id,
        parent_id,
        display_name,
        kind,
        unread_count: 0,
        total_count: 0,
    })
}
