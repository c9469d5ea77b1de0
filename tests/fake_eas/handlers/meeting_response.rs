//! MeetingResponse: acknowledge the answer and report a calendar id.

use super::CommandResponse;
use crate::fake_eas::state::ServerState;
use airsync_client::wbxml::pages::{MEETING_RESPONSE, meeting_response as mr};
use airsync_client::wbxml::{Node, Writer};

pub fn handle_meeting_response(state: &mut ServerState, request: &Node) -> CommandResponse {
    let request_id = request
        .find(MEETING_RESPONSE, mr::REQUEST)
        .and_then(|r| r.child_text(MEETING_RESPONSE, mr::REQUEST_ID))
        .unwrap_or_default();
    // Declined invitations produce no calendar item.
    let declined = request
        .find(MEETING_RESPONSE, mr::REQUEST)
        .and_then(|r| r.child_u32(MEETING_RESPONSE, mr::USER_RESPONSE))
        == Some(3);

    let known = state.item_mime.contains_key(&request_id)
        || state.items.iter().any(|i| i.server_id == request_id);

    let mut w = Writer::new();
    w.start(MEETING_RESPONSE, mr::MEETING_RESPONSE);
    w.start(MEETING_RESPONSE, mr::RESULT);
    w.text_element(MEETING_RESPONSE, mr::REQUEST_ID, &request_id);
    if known {
        w.text_element(MEETING_RESPONSE, mr::STATUS, "1");
        if !declined {
            w.text_element(MEETING_RESPONSE, mr::CALENDAR_ID, "cal:new");
        }
    } else {
        w.text_element(MEETING_RESPONSE, mr::STATUS, "2");
    }
    w.end();
    w.end();
    CommandResponse::Wbxml(w.finish())
}
