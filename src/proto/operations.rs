//! On-demand operations: ItemOperations fetch, SendMail, MeetingResponse

use super::fetch_status_error;
use crate::error::{Error, Result};
use crate::wbxml::pages::{
    AIRSYNC, AIRSYNC_BASE, COMPOSE_MAIL, ITEM_OPERATIONS, MEETING_RESPONSE, airsync,
    airsync_base, compose_mail, item_operations as io_tags, meeting_response as mr,
};
use crate::wbxml::{Writer, decode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

const STORE_MAILBOX: &str = "Mailbox";

/// ItemOperations request fetching one item's full MIME body.
#[must_use]
pub fn fetch_item_request(collection_id: &str, server_id: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(ITEM_OPERATIONS, io_tags::ITEM_OPERATIONS);
    w.start(ITEM_OPERATIONS, io_tags::FETCH);
    w.text_element(ITEM_OPERATIONS, io_tags::STORE, STORE_MAILBOX);
    w.text_element(AIRSYNC, airsync::COLLECTION_ID, collection_id);
    w.text_element(AIRSYNC, airsync::SERVER_ID, server_id);
    w.start(ITEM_OPERATIONS, io_tags::OPTIONS);
    w.start(AIRSYNC_BASE, airsync_base::BODY_PREFERENCE);
    // Type 4: raw MIME, normalized locally.
    w.text_element(AIRSYNC_BASE, airsync_base::TYPE, "4");
    w.end();
    w.end();
    w.end();
    w.end();
    w.finish()
}

/// ItemOperations request fetching attachment bytes by file reference.
#[must_use]
pub fn fetch_attachment_request(file_reference: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(ITEM_OPERATIONS, io_tags::ITEM_OPERATIONS);
    w.start(ITEM_OPERATIONS, io_tags::FETCH);
    w.text_element(ITEM_OPERATIONS, io_tags::STORE, STORE_MAILBOX);
    w.text_element(AIRSYNC_BASE, airsync_base::FILE_REFERENCE, file_reference);
    w.end();
    w.end();
    w.finish()
}

/// Parse an ItemOperations fetch response and return the fetched bytes.
///
/// Inline data arrives base64-encoded; a payload that fails to decode is
/// returned raw (some servers send unencoded opaque data).
pub fn parse_fetch_response(bytes: &[u8]) -> Result<Vec<u8>> {
    let root = decode(bytes)?;
    if !root.is(ITEM_OPERATIONS, io_tags::ITEM_OPERATIONS) {
        return Err(Error::ProtocolDecode(
            "expected ItemOperations response root".into(),
        ));
    }

    let status = root
        .child_u32(ITEM_OPERATIONS, io_tags::STATUS)
        .ok_or_else(|| Error::ProtocolDecode("ItemOperations response without status".into()))?;
    if status != 1 {
        return Err(fetch_status_error(status));
    }

    let fetch = root
        .find(ITEM_OPERATIONS, io_tags::RESPONSE)
        .and_then(|r| r.find(ITEM_OPERATIONS, io_tags::FETCH))
        .ok_or_else(|| Error::ProtocolDecode("ItemOperations response without fetch".into()))?;

    let fetch_status = fetch
        .child_u32(ITEM_OPERATIONS, io_tags::STATUS)
        .unwrap_or(1);
    if fetch_status != 1 {
        return Err(fetch_status_error(fetch_status));
    }

    let data = fetch
        .find(ITEM_OPERATIONS, io_tags::PROPERTIES)
        .and_then(|p| p.find(ITEM_OPERATIONS, io_tags::DATA))
        .ok_or_else(|| Error::ProtocolDecode("fetch response without data".into()))?;

    if let Some(opaque) = &data.opaque {
        return Ok(opaque.clone());
    }
    let text = data.value().unwrap_or_default();
    Ok(BASE64
        .decode(text.trim().as_bytes())
        .unwrap_or_else(|_| text.into_bytes()))
}

/// SendMail request carrying a complete MIME message.
#[must_use]
pub fn send_mail_request(client_id: &str, mime: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(COMPOSE_MAIL, compose_mail::SEND_MAIL);
    w.text_element(COMPOSE_MAIL, compose_mail::CLIENT_ID, client_id);
    w.empty_element(COMPOSE_MAIL, compose_mail::SAVE_IN_SENT_ITEMS);
    w.opaque_element(COMPOSE_MAIL, compose_mail::MIME, mime);
    w.end();
    w.finish()
}

/// Check a SendMail response. An empty body means success; a body with a
/// status element means rejection.
pub fn check_send_mail_response(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    let root = decode(bytes)?;
    let status = root
        .child_u32(COMPOSE_MAIL, compose_mail::STATUS)
        .unwrap_or(1);
    if status == 1 {
        Ok(())
    } else {
        Err(Error::ProtocolDecode(format!(
            "send rejected with status {status}"
        )))
    }
}

/// Reply choices for a meeting invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeetingUserResponse {
    Accepted,
    Tentative,
    Declined,
}

impl MeetingUserResponse {
    const fn code(self) -> &'static str {
        match self {
            Self::Accepted => "1",
            Self::Tentative => "2",
            Self::Declined => "3",
        }
    }
}

/// MeetingResponse request answering the invitation `request_id` held in
/// `collection_id`.
#[must_use]
pub fn meeting_response_request(
    collection_id: &str,
    request_id: &str,
    response: MeetingUserResponse,
) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(MEETING_RESPONSE, mr::MEETING_RESPONSE);
    w.start(MEETING_RESPONSE, mr::REQUEST);
    w.text_element(MEETING_RESPONSE, mr::USER_RESPONSE, response.code());
    w.text_element(MEETING_RESPONSE, mr::COLLECTION_ID, collection_id);
    w.text_element(MEETING_RESPONSE, mr::REQUEST_ID, request_id);
    w.end();
    w.end();
    w.finish()
}

/// Parse a MeetingResponse result, returning the calendar item id the
/// server created or updated (absent on declines).
pub fn parse_meeting_response(bytes: &[u8]) -> Result<Option<String>> {
    let root = decode(bytes)?;
    if !root.is(MEETING_RESPONSE, mr::MEETING_RESPONSE) {
        return Err(Error::ProtocolDecode(
            "expected MeetingResponse response root".into(),
        ));
    }
    let result = root
        .find(MEETING_RESPONSE, mr::RESULT)
        .ok_or_else(|| Error::ProtocolDecode("MeetingResponse without result".into()))?;
    let status = result
        .child_u32(MEETING_RESPONSE, mr::STATUS)
        .ok_or_else(|| Error::ProtocolDecode("MeetingResponse result without status".into()))?;
    if status != 1 {
        return Err(Error::ProtocolDecode(format!(
            "meeting response rejected with status {status}"
        )));
    }
    Ok(result.child_text(MEETING_RESPONSE, mr::CALENDAR_ID))
}
