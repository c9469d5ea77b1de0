//! SendMail: record the submitted MIME, answer with an empty 200.

use super::CommandResponse;
use crate::fake_eas::state::ServerState;
use airsync_client::wbxml::Node;
use airsync_client::wbxml::pages::{COMPOSE_MAIL, compose_mail};

pub fn handle_send_mail(state: &mut ServerState, request: &Node) -> CommandResponse {
    if let Some(mime) = request
        .find(COMPOSE_MAIL, compose_mail::MIME)
        .and_then(|m| m.opaque.clone())
    {
        state.sent_mail.push(mime);
    }
    CommandResponse::Empty
}
