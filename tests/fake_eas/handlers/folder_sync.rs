//! FolderSync: serve the hierarchy and drain pending changes.

use super::CommandResponse;
use crate::fake_eas::state::{FakeFolder, PendingFolderChange, ServerState};
use airsync_client::wbxml::Writer;
use airsync_client::wbxml::pages::{FOLDER_HIERARCHY, folder_hierarchy as fh};

pub fn handle_folder_sync(state: &mut ServerState, presented_key: &str) -> CommandResponse {
    if presented_key == "0" {
        // Initial sync: issue key 1 and report every folder as an Add.
        state.folder_sync_key = 1;
        let folders = state.folders.clone();
        return CommandResponse::Wbxml(response(1, "1", &folders, &[], &[]));
    }

    let Ok(presented) = presented_key.parse::<u32>() else {
        return CommandResponse::Wbxml(response(9, presented_key, &[], &[], &[]));
    };
    if presented != state.folder_sync_key {
        return CommandResponse::Wbxml(response(9, presented_key, &[], &[], &[]));
    }

    // Incremental: drain whatever the test scripted.
    let mut updates = Vec::new();
    let mut deletes = Vec::new();
    for change in state.pending_folder_changes.drain(..) {
        match change {
            PendingFolderChange::Update(folder) => updates.push(folder),
            PendingFolderChange::Delete(id) => deletes.push(id),
        }
    }

    // Mirror the drained changes into the canonical folder list.
    for update in &updates {
        if let Some(existing) = state
            .folders
            .iter_mut()
            .find(|f| f.server_id == update.server_id)
        {
            *existing = update.clone();
        }
    }
    state.folders.retain(|f| !deletes.contains(&f.server_id));

    if !updates.is_empty() || !deletes.is_empty() {
        state.folder_sync_key += 1;
    }
    let key = state.folder_sync_key.to_string();
    CommandResponse::Wbxml(response(1, &key, &[], &updates, &deletes))
}

fn response(
    status: u32,
    sync_key: &str,
    adds: &[FakeFolder],
    updates: &[FakeFolder],
    deletes: &[String],
) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(FOLDER_HIERARCHY, fh::FOLDER_SYNC);
    w.text_element(FOLDER_HIERARCHY, fh::STATUS, &status.to_string());
    if status == 1 {
        w.text_element(FOLDER_HIERARCHY, fh::SYNC_KEY, sync_key);
        w.start(FOLDER_HIERARCHY, fh::CHANGES);
        let count = adds.len() + updates.len() + deletes.len();
        w.text_element(FOLDER_HIERARCHY, fh::COUNT, &count.to_string());
        for folder in adds {
            write_folder(&mut w, fh::ADD, folder);
        }
        for folder in updates {
            write_folder(&mut w, fh::UPDATE, folder);
        }
        for server_id in deletes {
            w.start(FOLDER_HIERARCHY, fh::DELETE);
            w.text_element(FOLDER_HIERARCHY, fh::SERVER_ID, server_id);
            w.end();
        }
        w.end();
    }
    w.end();
    w.finish()
}

fn write_folder(w: &mut Writer, change_token: u8, folder: &FakeFolder) {
    w.start(FOLDER_HIERARCHY, change_token);
    w.text_element(FOLDER_HIERARCHY, fh::SERVER_ID, &folder.server_id);
    w.text_element(
        FOLDER_HIERARCHY,
        fh::PARENT_ID,
        folder.parent_id.as_deref().unwrap_or("0"),
    );
    w.text_element(FOLDER_HIERARCHY, fh::DISPLAY_NAME, &folder.display_name);
    w.text_element(FOLDER_HIERARCHY, fh::TYPE, &folder.type_code.to_string());
    w.end();
}
