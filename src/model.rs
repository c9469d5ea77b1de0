//! Local mirror entity shapes
//!
//! Strongly-typed representations of what the server synchronizes:
//! folders, mail items, attachments, calendar events, and the minimal
//! contact/task shapes carried by non-mail collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a synchronized folder.
///
/// The server assigns the kind at creation time; kinds of non-mail
/// collections (calendar/contacts/tasks) never change afterwards.
/// User-created mail folders can be renamed or deleted by the client and
/// round-trip through the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FolderKind {
    Inbox,
    Drafts,
    Deleted,
    Sent,
    Outbox,
    Tasks,
    Calendar,
    Contacts,
    Notes,
    UserMail,
    Other,
}

impl FolderKind {
    /// Map the wire folder-type code to a kind.
    ///
    /// Default and user-created variants of the same collection class
    /// collapse into one kind; unknown codes become [`Self::Other`].
    #[must_use]
    pub const fn from_server_type(code: u8) -> Self {
        match code {
            2 => Self::Inbox,
            3 => Self::Drafts,
            4 => Self::Deleted,
            5 => Self::Sent,
            6 => Self::Outbox,
            7 | 15 => Self::Tasks,
            8 | 13 => Self::Calendar,
            9 | 14 => Self::Contacts,
            10 | 17 => Self::Notes,
            1 | 12 => Self::UserMail,
            _ => Self::Other,
        }
    }

    /// Whether items in this folder are mail messages.
    #[must_use]
    pub const fn is_mail(&self) -> bool {
        matches!(
            self,
            Self::Inbox
                | Self::Drafts
                | Self::Deleted
                | Self::Sent
                | Self::Outbox
                | Self::UserMail
        )
    }

    /// The item class the server expects for this folder in sync requests.
    #[must_use]
    pub const fn item_class(&self) -> &'static str {
        match self {
            Self::Calendar => "Calendar",
            Self::Contacts => "Contacts",
            Self::Tasks => "Tasks",
            _ => "Email",
        }
    }
}

/// A synchronized folder in the server hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Server-assigned identifier, unique per account.
    pub server_id: String,
    /// Parent folder identifier; `None` at the hierarchy root.
    pub parent_id: Option<String>,
    pub display_name: String,
    pub kind: FolderKind,
    pub unread_count: u32,
    pub total_count: u32,
}

/// Body representation tag for a fetched mail body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyKind {
    Plain,
    Html,
    MimeRaw,
}

/// A fetched message body.
///
/// `MailItem::body == None` means "not fetched yet"; a `Body` with empty
/// text means the server confirmed the message has no body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub kind: BodyKind,
    pub text: String,
}

/// A synchronized mail message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailItem {
    /// Server-assigned identifier, unique per account.
    pub server_id: String,
    /// Server id of the containing folder.
    pub folder_id: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub read: bool,
    pub flagged: bool,
    pub has_attachments: bool,
    /// Fetched lazily; see [`Body`].
    pub body: Option<Body>,
    pub attachments: Vec<Attachment>,
    /// The sender requested a read receipt that has not been answered yet.
    pub read_receipt_pending: bool,
}

/// Attachment metadata synchronized with its parent item.
///
/// Content is never fetched during item sync; [`Attachment::file_reference`]
/// is the opaque handle for the on-demand download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Server id of the owning item.
    pub item_id: String,
    pub display_name: String,
    pub content_type: String,
    /// Server-reported size; exact only after download.
    pub estimated_size: u64,
    /// Inline attachments are referenced from HTML via `cid:`.
    pub is_inline: bool,
    pub content_id: Option<String>,
    /// Opaque server handle required to download the content.
    pub file_reference: String,
    /// Where the downloaded bytes were stored, once fetched.
    pub local_path: Option<String>,
}

/// Response of one meeting attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendeeResponse {
    Unknown,
    Tentative,
    Accepted,
    Declined,
    NotResponded,
}

impl AttendeeResponse {
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            2 => Self::Tentative,
            3 => Self::Accepted,
            4 => Self::Declined,
            5 => Self::NotResponded,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub response: AttendeeResponse,
}

/// Free/busy classification of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusyStatus {
    Free,
    Tentative,
    Busy,
    OutOfOffice,
}

impl BusyStatus {
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Free,
            1 => Self::Tentative,
            3 => Self::OutOfOffice,
            _ => Self::Busy,
        }
    }
}

/// A synchronized calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub server_id: String,
    pub folder_id: String,
    pub subject: String,
    /// UTC epoch seconds.
    pub start: Option<i64>,
    /// UTC epoch seconds.
    pub end: Option<i64>,
    pub all_day: bool,
    pub location: String,
    pub body: String,
    pub organizer: String,
    pub attendees: Vec<Attendee>,
    pub busy_status: BusyStatus,
    pub recurring: bool,
    pub reminder_minutes: Option<u32>,
}

/// Minimal synchronized contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactItem {
    pub server_id: String,
    pub folder_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
}

/// Minimal synchronized task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub server_id: String,
    pub folder_id: String,
    pub subject: String,
    pub due: Option<DateTime<Utc>>,
    pub complete: bool,
}

/// One synchronized item of any collection class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "kebab-case")]
pub enum SyncItem {
    Mail(MailItem),
    Event(CalendarEvent),
    Contact(ContactItem),
    Task(TaskItem),
}

impl SyncItem {
    #[must_use]
    pub fn server_id(&self) -> &str {
        match self {
            Self::Mail(m) => &m.server_id,
            Self::Event(e) => &e.server_id,
            Self::Contact(c) => &c.server_id,
            Self::Task(t) => &t.server_id,
        }
    }
}
