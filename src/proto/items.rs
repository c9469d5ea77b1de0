//! Sync command: per-folder incremental item synchronization

use super::{parse_timestamp, sync_status_error};
use crate::cursor::INITIAL_SYNC_KEY;
use crate::error::{Error, Result};
use crate::model::{
    Attachment, Attendee, AttendeeResponse, Body, BodyKind, BusyStatus, CalendarEvent,
    ContactItem, FolderKind, MailItem, SyncItem, TaskItem,
};
use crate::wbxml::pages::{
    AIRSYNC, AIRSYNC_BASE, CALENDAR, CONTACTS, EMAIL, TASKS, airsync, airsync_base, calendar,
    contacts, email, tasks,
};
use crate::wbxml::{Node, Writer, decode};

/// Items requested per window; the server signals `MoreAvailable` when
/// the folder holds more.
pub const WINDOW_SIZE: u32 = 100;

/// Body preview truncation for the initial sync pass; full bodies are
/// fetched lazily via ItemOperations.
const BODY_TRUNCATION: &str = "32768";

/// Build a Sync request for one collection.
///
/// The initial key (`"0"`) performs the key-exchange round: no
/// `GetChanges`, no window. Subsequent keys request deltas.
#[must_use]
pub fn request(collection_id: &str, kind: FolderKind, sync_key: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.start(AIRSYNC, airsync::SYNC);
    w.start(AIRSYNC, airsync::COLLECTIONS);
    w.start(AIRSYNC, airsync::COLLECTION);
    w.text_element(AIRSYNC, airsync::CLASS, kind.item_class());
    w.text_element(AIRSYNC, airsync::SYNC_KEY, sync_key);
    w.text_element(AIRSYNC, airsync::COLLECTION_ID, collection_id);
    if sync_key != INITIAL_SYNC_KEY {
        w.text_element(AIRSYNC, airsync::DELETES_AS_MOVES, "1");
        w.empty_element(AIRSYNC, airsync::GET_CHANGES);
        w.text_element(AIRSYNC, airsync::WINDOW_SIZE, &WINDOW_SIZE.to_string());
        w.start(AIRSYNC, airsync::OPTIONS);
        w.text_element(AIRSYNC, airsync::MIME_SUPPORT, "0");
        w.start(AIRSYNC_BASE, airsync_base::BODY_PREFERENCE);
        w.text_element(AIRSYNC_BASE, airsync_base::TYPE, "2");
        w.text_element(AIRSYNC_BASE, airsync_base::TRUNCATION_SIZE, BODY_TRUNCATION);
        w.end();
        w.end();
    }
    w.end();
    w.end();
    w.end();
    w.finish()
}

/// One collection's slice of a Sync response.
#[derive(Debug, Clone, Default)]
pub struct CollectionSync {
    pub sync_key: String,
    pub more_available: bool,
    pub upserts: Vec<SyncItem>,
    pub deletes: Vec<String>,
}

impl CollectionSync {
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }
}

/// Parse the Sync response for `collection_id`, projecting application
/// data according to the folder kind.
pub fn parse_response(
    bytes: &[u8],
    collection_id: &str,
    kind: FolderKind,
) -> Result<CollectionSync> {
    let root = decode(bytes)?;
    if !root.is(AIRSYNC, airsync::SYNC) {
        return Err(Error::ProtocolDecode("expected Sync response root".into()));
    }

    let collection = root
        .find(AIRSYNC, airsync::COLLECTIONS)
        .map(|c| {
            c.find_all(AIRSYNC, airsync::COLLECTION)
                .find(|col| {
                    col.child_text(AIRSYNC, airsync::COLLECTION_ID)
                        .is_none_or(|id| id == collection_id)
                })
        })
        .and_then(|c| c)
        .ok_or_else(|| {
            Error::ProtocolDecode(format!("Sync response without collection {collection_id}"))
        })?;

    let status = collection
        .child_u32(AIRSYNC, airsync::STATUS)
        .ok_or_else(|| Error::ProtocolDecode("Sync collection without status".into()))?;
    if status != 1 {
        return Err(sync_status_error(status));
    }

    let sync_key = collection
        .child_text(AIRSYNC, airsync::SYNC_KEY)
        .ok_or_else(|| Error::ProtocolDecode("Sync collection without sync key".into()))?;

    let mut out = CollectionSync {
        sync_key,
        more_available: collection.find(AIRSYNC, airsync::MORE_AVAILABLE).is_some(),
        ..CollectionSync::default()
    };

    if let Some(commands) = collection.find(AIRSYNC, airsync::COMMANDS) {
        for node in &commands.children {
            let is_upsert =
                node.is(AIRSYNC, airsync::ADD) || node.is(AIRSYNC, airsync::CHANGE);
            let is_delete =
                node.is(AIRSYNC, airsync::DELETE) || node.is(AIRSYNC, airsync::SOFT_DELETE);

            let Some(server_id) = node.child_text(AIRSYNC, airsync::SERVER_ID) else {
                continue;
            };
            if is_delete {
                out.deletes.push(server_id);
            } else if is_upsert {
                if let Some(data) = node.find(AIRSYNC, airsync::APPLICATION_DATA) {
                    out.upserts
                        .push(project_item(collection_id, &server_id, data, kind));
                }
            }
        }
    }

    Ok(out)
}

/// Project application data into the entity for the folder's class.
fn project_item(folder_id: &str, server_id: &str, data: &Node, kind: FolderKind) -> SyncItem {
    match kind {
        FolderKind::Calendar => SyncItem::Event(project_event(folder_id, server_id, data)),
        FolderKind::Contacts => SyncItem::Contact(project_contact(folder_id, server_id, data)),
        FolderKind::Tasks => SyncItem::Task(project_task(folder_id, server_id, data)),
        _ => SyncItem::Mail(project_mail(folder_id, server_id, data)),
    }
}

/// Split a recipient list on the wire separator.
fn split_addresses(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn project_mail(folder_id: &str, server_id: &str, data: &Node) -> MailItem {
    let body = parse_body(data);
    let attachments = parse_attachments(server_id, data);
    MailItem {
        server_id: server_id.to_string(),
        folder_id: folder_id.to_string(),
        from: data.child_text(EMAIL, email::FROM).unwrap_or_default(),
        to: data
            .child_text(EMAIL, email::TO)
            .map(|v| split_addresses(&v))
            .unwrap_or_default(),
        cc: data
            .child_text(EMAIL, email::CC)
            .map(|v| split_addresses(&v))
            .unwrap_or_default(),
        subject: data.child_text(EMAIL, email::SUBJECT).unwrap_or_default(),
        date: data
            .child_text(EMAIL, email::DATE_RECEIVED)
            .as_deref()
            .and_then(parse_timestamp),
        read: data.child_u32(EMAIL, email::READ) == Some(1),
        flagged: data
            .find(EMAIL, email::FLAG)
            .and_then(|f| f.child_u32(EMAIL, email::FLAG_STATUS))
            == Some(2),
        has_attachments: !attachments.is_empty(),
        body,
        attachments,
        read_receipt_pending: false,
    }
}

/// Body container shared by all item classes.
///
/// A truncated preview is not a body — the item stays pending lazy
/// fetch so it remains distinguishable from "empty body confirmed by
/// the server".
fn parse_body(data: &Node) -> Option<Body> {
    let body = data.find(AIRSYNC_BASE, airsync_base::BODY)?;
    let truncated = body.child_u32(AIRSYNC_BASE, airsync_base::TRUNCATED) == Some(1);
    if truncated {
        return None;
    }
    let kind = match body.child_u32(AIRSYNC_BASE, airsync_base::TYPE) {
        Some(2) => BodyKind::Html,
        Some(4) => BodyKind::MimeRaw,
        _ => BodyKind::Plain,
    };
    let text = body
        .child_text(AIRSYNC_BASE, airsync_base::DATA)
        .unwrap_or_default();
    Some(Body { kind, text })
}

fn parse_attachments(server_id: &str, data: &Node) -> Vec<Attachment> {
    let Some(attachments) = data.find(AIRSYNC_BASE, airsync_base::ATTACHMENTS) else {
        return Vec::new();
    };
    attachments
        .find_all(AIRSYNC_BASE, airsync_base::ATTACHMENT)
        .filter_map(|node| {
            let file_reference = node.child_text(AIRSYNC_BASE, airsync_base::FILE_REFERENCE)?;
            Some(Attachment {
                item_id: server_id.to_string(),
                display_name: node
                    .child_text(AIRSYNC_BASE, airsync_base::DISPLAY_NAME)
                    .unwrap_or_default(),
                content_type: node
                    .child_text(AIRSYNC_BASE, airsync_base::CONTENT_TYPE)
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                estimated_size: node
                    .child_text(AIRSYNC_BASE, airsync_base::ESTIMATED_DATA_SIZE)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                is_inline: node.child_u32(AIRSYNC_BASE, airsync_base::IS_INLINE) == Some(1),
                content_id: node
                    .child_text(AIRSYNC_BASE, airsync_base::CONTENT_ID)
                    .map(|id| id.trim_matches(['<', '>']).to_string()),
                file_reference,
                local_path: None,
            })
        })
        .collect()
}

fn project_event(folder_id: &str, server_id: &str, data: &Node) -> CalendarEvent {
    let attendees = data
        .find(CALENDAR, calendar::ATTENDEES)
        .map(|list| {
            list.find_all(CALENDAR, calendar::ATTENDEE)
                .map(|a| Attendee {
                    name: a
                        .child_text(CALENDAR, calendar::ATTENDEE_NAME)
                        .unwrap_or_default(),
                    email: a
                        .child_text(CALENDAR, calendar::ATTENDEE_EMAIL)
                        .unwrap_or_default(),
                    response: a
                        .child_u32(CALENDAR, calendar::ATTENDEE_STATUS)
                        .and_then(|s| u8::try_from(s).ok())
                        .map_or(AttendeeResponse::Unknown, AttendeeResponse::from_code),
                })
                .collect()
        })
        .unwrap_or_default();

    CalendarEvent {
        server_id: server_id.to_string(),
        folder_id: folder_id.to_string(),
        subject: data.child_text(CALENDAR, calendar::SUBJECT).unwrap_or_default(),
        start: data
            .child_text(CALENDAR, calendar::START_TIME)
            .as_deref()
            .and_then(parse_timestamp)
            .map(|dt| dt.timestamp()),
        end: data
            .child_text(CALENDAR, calendar::END_TIME)
            .as_deref()
            .and_then(parse_timestamp)
            .map(|dt| dt.timestamp()),
        all_day: data.child_u32(CALENDAR, calendar::ALL_DAY_EVENT) == Some(1),
        location: data
            .child_text(CALENDAR, calendar::LOCATION)
            .unwrap_or_default(),
        body: data
            .find(AIRSYNC_BASE, airsync_base::BODY)
            .and_then(|b| b.child_text(AIRSYNC_BASE, airsync_base::DATA))
            .unwrap_or_default(),
        organizer: data
            .child_text(CALENDAR, calendar::ORGANIZER_EMAIL)
            .or_else(|| data.child_text(CALENDAR, calendar::ORGANIZER_NAME))
            .unwrap_or_default(),
        attendees,
        busy_status: data
            .child_u32(CALENDAR, calendar::BUSY_STATUS)
            .and_then(|s| u8::try_from(s).ok())
            .map_or(BusyStatus::Busy, BusyStatus::from_code),
        recurring: data.find(CALENDAR, calendar::RECURRENCE).is_some(),
        reminder_minutes: data.child_u32(CALENDAR, calendar::REMINDER),
    }
}

fn project_contact(folder_id: &str, server_id: &str, data: &Node) -> ContactItem {
    let display_name = data
        .child_text(CONTACTS, contacts::FILE_AS)
        .or_else(|| {
            let first = data.child_text(CONTACTS, contacts::FIRST_NAME);
            let last = data.child_text(CONTACTS, contacts::LAST_NAME);
            match (first, last) {
                (Some(f), Some(l)) => Some(format!("{f} {l}")),
                (Some(only), None) | (None, Some(only)) => Some(only),
                (None, None) => None,
            }
        })
        .unwrap_or_default();

    ContactItem {
        server_id: server_id.to_string(),
        folder_id: folder_id.to_string(),
        display_name,
        email: data
            .child_text(CONTACTS, contacts::EMAIL1_ADDRESS)
            .map(|e| e.trim_matches(['<', '>', '"']).to_string()),
        phone: data
            .child_text(CONTACTS, contacts::MOBILE_PHONE)
            .or_else(|| data.child_text(CONTACTS, contacts::BUSINESS_PHONE))
            .or_else(|| data.child_text(CONTACTS, contacts::HOME_PHONE)),
        company: data.child_text(CONTACTS, contacts::COMPANY_NAME),
    }
}

fn project_task(folder_id: &str, server_id: &str, data: &Node) -> TaskItem {
    TaskItem {
        server_id: server_id.to_string(),
        folder_id: folder_id.to_string(),
        subject: data.child_text(TASKS, tasks::SUBJECT).unwrap_or_default(),
        due: data
            .child_text(TASKS, tasks::UTC_DUE_DATE)
            .or_else(|| data.child_text(TASKS, tasks::DUE_DATE))
            .as_deref()
            .and_then(parse_timestamp),
        complete: data.child_u32(TASKS, tasks::COMPLETE) == Some(1),
    }
}
