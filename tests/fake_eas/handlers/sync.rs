//! Sync: key exchange, one data round serving every item, then
//! "no changes" (empty body) for already-current keys.

use super::CommandResponse;
use crate::fake_eas::state::{FakeItem, ServerState};
use airsync_client::wbxml::pages::{
    AIRSYNC, AIRSYNC_BASE, CALENDAR, EMAIL, airsync, airsync_base, calendar, email,
};
use airsync_client::wbxml::{Node, Writer};

pub fn handle_sync(state: &mut ServerState, request: &Node) -> CommandResponse {
    let Some(collection) = request
        .find(AIRSYNC, airsync::COLLECTIONS)
        .and_then(|c| c.find(AIRSYNC, airsync::COLLECTION))
    else {
        return CommandResponse::Wbxml(status_response("?", 4));
    };
    let collection_id = collection
        .child_text(AIRSYNC, airsync::COLLECTION_ID)
        .unwrap_or_default();
    let presented_key = collection
        .child_text(AIRSYNC, airsync::SYNC_KEY)
        .unwrap_or_default();

    if state.always_invalid_sync_key {
        return CommandResponse::Wbxml(status_response(&collection_id, 3));
    }

    let current = state
        .collection_keys
        .get(&collection_id)
        .copied()
        .unwrap_or(0);

    if presented_key == "0" {
        // Key exchange round: new key, no commands.
        state.collection_keys.insert(collection_id.clone(), 1);
        return CommandResponse::Wbxml(data_response(state, &collection_id, "1", false));
    }

    let Ok(presented) = presented_key.parse::<u32>() else {
        return CommandResponse::Wbxml(status_response(&collection_id, 3));
    };
    if presented != current {
        return CommandResponse::Wbxml(status_response(&collection_id, 3));
    }

    if presented == 1 {
        // First data round: serve everything.
        state.collection_keys.insert(collection_id.clone(), 2);
        return CommandResponse::Wbxml(data_response(state, &collection_id, "2", true));
    }

    // Already current: no changes.
    CommandResponse::Empty
}

fn status_response(collection_id: &str, status: u32) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(AIRSYNC, airsync::SYNC);
    w.start(AIRSYNC, airsync::COLLECTIONS);
    w.start(AIRSYNC, airsync::COLLECTION);
    w.text_element(AIRSYNC, airsync::COLLECTION_ID, collection_id);
    w.text_element(AIRSYNC, airsync::STATUS, &status.to_string());
    w.end();
    w.end();
    w.end();
    w.finish()
}

fn data_response(
    state: &ServerState,
    collection_id: &str,
    new_key: &str,
    with_commands: bool,
) -> Vec<u8> {
    let is_calendar = state
        .folder(collection_id)
        .is_some_and(|f| matches!(f.type_code, 8 | 13));

    let mut w = Writer::new();
    w.start(AIRSYNC, airsync::SYNC);
    w.start(AIRSYNC, airsync::COLLECTIONS);
    w.start(AIRSYNC, airsync::COLLECTION);
    w.text_element(AIRSYNC, airsync::COLLECTION_ID, collection_id);
    w.text_element(AIRSYNC, airsync::STATUS, "1");
    w.text_element(AIRSYNC, airsync::SYNC_KEY, new_key);

    if with_commands {
        let items = state.items_in(collection_id);
        let deletes: Vec<&(String, String)> = state
            .deleted_items
            .iter()
            .filter(|(folder, _)| folder == collection_id)
            .collect();

        if !items.is_empty() || !deletes.is_empty() {
            w.start(AIRSYNC, airsync::COMMANDS);
            for item in items {
                w.start(AIRSYNC, airsync::ADD);
                w.text_element(AIRSYNC, airsync::SERVER_ID, &item.server_id);
                w.start(AIRSYNC, airsync::APPLICATION_DATA);
                if is_calendar {
                    write_event_data(&mut w, item);
                } else {
                    write_mail_data(&mut w, item);
                }
                w.end();
                w.end();
            }
            for (_, server_id) in deletes {
                w.start(AIRSYNC, airsync::DELETE);
                w.text_element(AIRSYNC, airsync::SERVER_ID, server_id);
                w.end();
            }
            w.end();
        }
    }

    w.end();
    w.end();
    w.end();
    w.finish()
}

fn write_mail_data(w: &mut Writer, item: &FakeItem) {
    w.text_element(EMAIL, email::FROM, &item.from);
    w.text_element(EMAIL, email::TO, "user@example.com");
    w.text_element(EMAIL, email::SUBJECT, &item.subject);
    w.text_element(EMAIL, email::DATE_RECEIVED, "20260115T093000Z");
    w.text_element(EMAIL, email::READ, if item.read { "1" } else { "0" });

    if let Some(html) = &item.body_html {
        w.start(AIRSYNC_BASE, airsync_base::BODY);
        w.text_element(AIRSYNC_BASE, airsync_base::TYPE, "2");
        w.text_element(AIRSYNC_BASE, airsync_base::DATA, html);
        w.end();
    }

    if !item.attachments.is_empty() {
        w.start(AIRSYNC_BASE, airsync_base::ATTACHMENTS);
        for (reference, name) in &item.attachments {
            w.start(AIRSYNC_BASE, airsync_base::ATTACHMENT);
            w.text_element(AIRSYNC_BASE, airsync_base::DISPLAY_NAME, name);
            w.text_element(AIRSYNC_BASE, airsync_base::FILE_REFERENCE, reference);
            w.text_element(AIRSYNC_BASE, airsync_base::ESTIMATED_DATA_SIZE, "1024");
            w.end();
        }
        w.end();
    }
}

fn write_event_data(w: &mut Writer, item: &FakeItem) {
    w.text_element(CALENDAR, calendar::SUBJECT, &item.subject);
    w.text_element(CALENDAR, calendar::ORGANIZER_EMAIL, &item.from);
    w.text_element(CALENDAR, calendar::START_TIME, "20260120T100000Z");
    w.text_element(CALENDAR, calendar::END_TIME, "20260120T110000Z");
    w.text_element(CALENDAR, calendar::BUSY_STATUS, "2");
    w.text_element(CALENDAR, calendar::LOCATION, "Room 1");
}
