//! ItemOperations: on-demand fetch of item bodies and attachments.

use super::CommandResponse;
use crate::fake_eas::state::ServerState;
use airsync_client::wbxml::pages::{
    AIRSYNC, AIRSYNC_BASE, ITEM_OPERATIONS, airsync, airsync_base, item_operations as io_tags,
};
use airsync_client::wbxml::{Node, Writer};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

pub fn handle_item_operations(state: &mut ServerState, request: &Node) -> CommandResponse {
    let Some(fetch) = request.find(ITEM_OPERATIONS, io_tags::FETCH) else {
        return CommandResponse::Wbxml(response(4, None));
    };

    // File-reference fetch (attachment) or item fetch, by request shape.
    let payload = fetch
        .child_text(AIRSYNC_BASE, airsync_base::FILE_REFERENCE)
        .map_or_else(
            || {
                fetch
                    .child_text(AIRSYNC, airsync::SERVER_ID)
                    .and_then(|id| state.item_mime.get(&id).cloned())
            },
            |reference| state.attachments.get(&reference).cloned(),
        );

    match payload {
        Some(bytes) => CommandResponse::Wbxml(response(1, Some(&bytes))),
        None => CommandResponse::Wbxml(response(6, None)),
    }
}

fn response(fetch_status: u32, payload: Option<&[u8]>) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(ITEM_OPERATIONS, io_tags::ITEM_OPERATIONS);
    w.text_element(ITEM_OPERATIONS, io_tags::STATUS, "1");
    w.start(ITEM_OPERATIONS, io_tags::RESPONSE);
    w.start(ITEM_OPERATIONS, io_tags::FETCH);
    w.text_element(ITEM_OPERATIONS, io_tags::STATUS, &fetch_status.to_string());
    if let Some(bytes) = payload {
        w.start(ITEM_OPERATIONS, io_tags::PROPERTIES);
        w.text_element(ITEM_OPERATIONS, io_tags::DATA, &BASE64.encode(bytes));
        w.end();
    }
    w.end();
    w.end();
    w.end();
    w.finish()
}
