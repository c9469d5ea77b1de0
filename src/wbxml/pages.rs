//! ActiveSync WBXML code pages and tag tokens
//!
//! Tag tokens are the low six bits of the tag byte; the high bits flag
//! attributes (unused by ActiveSync) and element content. Pages are
//! selected with `SWITCH_PAGE` and stay active until switched again.

/// AirSync: the Sync command itself.
pub const AIRSYNC: u8 = 0x00;
/// Contacts item properties.
pub const CONTACTS: u8 = 0x01;
/// Email item properties.
pub const EMAIL: u8 = 0x02;
/// Calendar item properties.
pub const CALENDAR: u8 = 0x04;
/// FolderSync / folder management commands.
pub const FOLDER_HIERARCHY: u8 = 0x07;
/// MeetingResponse command.
pub const MEETING_RESPONSE: u8 = 0x08;
/// Tasks item properties.
pub const TASKS: u8 = 0x09;
/// Provision command (device policy handshake).
pub const PROVISION: u8 = 0x0E;
/// AirSyncBase: shared body/attachment containers.
pub const AIRSYNC_BASE: u8 = 0x11;
/// ItemOperations command (on-demand fetch).
pub const ITEM_OPERATIONS: u8 = 0x14;
/// ComposeMail: SendMail / SmartReply / SmartForward.
pub const COMPOSE_MAIL: u8 = 0x15;

pub mod airsync {
    pub const SYNC: u8 = 0x05;
    pub const RESPONSES: u8 = 0x06;
    pub const ADD: u8 = 0x07;
    pub const CHANGE: u8 = 0x08;
    pub const DELETE: u8 = 0x09;
    pub const FETCH: u8 = 0x0A;
    pub const SYNC_KEY: u8 = 0x0B;
    pub const CLIENT_ID: u8 = 0x0C;
    pub const SERVER_ID: u8 = 0x0D;
    pub const STATUS: u8 = 0x0E;
    pub const COLLECTION: u8 = 0x0F;
    pub const CLASS: u8 = 0x10;
    pub const COLLECTION_ID: u8 = 0x12;
    pub const GET_CHANGES: u8 = 0x13;
    pub const MORE_AVAILABLE: u8 = 0x14;
    pub const WINDOW_SIZE: u8 = 0x15;
    pub const COMMANDS: u8 = 0x16;
    pub const OPTIONS: u8 = 0x17;
    pub const FILTER_TYPE: u8 = 0x18;
    pub const CONFLICT: u8 = 0x1B;
    pub const COLLECTIONS: u8 = 0x1C;
    pub const APPLICATION_DATA: u8 = 0x1D;
    pub const DELETES_AS_MOVES: u8 = 0x1E;
    pub const SUPPORTED: u8 = 0x20;
    pub const SOFT_DELETE: u8 = 0x21;
    pub const MIME_SUPPORT: u8 = 0x22;
    pub const MIME_TRUNCATION: u8 = 0x23;
    pub const WAIT: u8 = 0x24;
    pub const LIMIT: u8 = 0x25;
    pub const PARTIAL: u8 = 0x26;
}

pub mod contacts {
    pub const BUSINESS_PHONE: u8 = 0x10;
    pub const COMPANY_NAME: u8 = 0x16;
    pub const EMAIL1_ADDRESS: u8 = 0x1D;
    pub const FILE_AS: u8 = 0x20;
    pub const FIRST_NAME: u8 = 0x21;
    pub const HOME_PHONE: u8 = 0x28;
    pub const LAST_NAME: u8 = 0x2F;
    pub const MOBILE_PHONE: u8 = 0x32;
}

pub mod email {
    pub const DATE_RECEIVED: u8 = 0x0F;
    pub const DISPLAY_TO: u8 = 0x11;
    pub const IMPORTANCE: u8 = 0x12;
    pub const MESSAGE_CLASS: u8 = 0x13;
    pub const SUBJECT: u8 = 0x14;
    pub const READ: u8 = 0x15;
    pub const TO: u8 = 0x16;
    pub const CC: u8 = 0x17;
    pub const FROM: u8 = 0x18;
    pub const REPLY_TO: u8 = 0x19;
    pub const INTERNET_CPID: u8 = 0x39;
    pub const FLAG: u8 = 0x3A;
    pub const FLAG_STATUS: u8 = 0x3B;
    pub const CONTENT_CLASS: u8 = 0x3C;
}

pub mod calendar {
    pub const TIME_ZONE: u8 = 0x05;
    pub const ALL_DAY_EVENT: u8 = 0x06;
    pub const ATTENDEES: u8 = 0x07;
    pub const ATTENDEE: u8 = 0x08;
    pub const ATTENDEE_EMAIL: u8 = 0x09;
    pub const ATTENDEE_NAME: u8 = 0x0A;
    pub const BUSY_STATUS: u8 = 0x0D;
    pub const DTSTAMP: u8 = 0x10;
    pub const END_TIME: u8 = 0x11;
    pub const LOCATION: u8 = 0x16;
    pub const MEETING_STATUS: u8 = 0x17;
    pub const ORGANIZER_EMAIL: u8 = 0x18;
    pub const ORGANIZER_NAME: u8 = 0x19;
    pub const RECURRENCE: u8 = 0x1A;
    pub const REMINDER: u8 = 0x23;
    pub const SENSITIVITY: u8 = 0x24;
    pub const SUBJECT: u8 = 0x25;
    pub const START_TIME: u8 = 0x26;
    pub const UID: u8 = 0x27;
    pub const ATTENDEE_STATUS: u8 = 0x29;
    pub const ATTENDEE_TYPE: u8 = 0x2A;
}

pub mod folder_hierarchy {
    pub const DISPLAY_NAME: u8 = 0x07;
    pub const SERVER_ID: u8 = 0x08;
    pub const PARENT_ID: u8 = 0x09;
    pub const TYPE: u8 = 0x0A;
    pub const STATUS: u8 = 0x0C;
    pub const CHANGES: u8 = 0x0E;
    pub const ADD: u8 = 0x0F;
    pub const DELETE: u8 = 0x10;
    pub const UPDATE: u8 = 0x11;
    pub const SYNC_KEY: u8 = 0x12;
    pub const FOLDER_CREATE: u8 = 0x13;
    pub const FOLDER_DELETE: u8 = 0x14;
    pub const FOLDER_UPDATE: u8 = 0x15;
    pub const FOLDER_SYNC: u8 = 0x16;
    pub const COUNT: u8 = 0x17;
}

pub mod meeting_response {
    pub const CALENDAR_ID: u8 = 0x05;
    pub const COLLECTION_ID: u8 = 0x06;
    pub const MEETING_RESPONSE: u8 = 0x07;
    pub const REQUEST_ID: u8 = 0x08;
    pub const REQUEST: u8 = 0x09;
    pub const RESULT: u8 = 0x0A;
    pub const STATUS: u8 = 0x0B;
    pub const USER_RESPONSE: u8 = 0x0C;
}

pub mod tasks {
    pub const COMPLETE: u8 = 0x0A;
    pub const DATE_COMPLETED: u8 = 0x0B;
    pub const DUE_DATE: u8 = 0x0C;
    pub const UTC_DUE_DATE: u8 = 0x0D;
    pub const IMPORTANCE: u8 = 0x0E;
    pub const REMINDER_SET: u8 = 0x1B;
    pub const REMINDER_TIME: u8 = 0x1C;
    pub const START_DATE: u8 = 0x1E;
    pub const UTC_START_DATE: u8 = 0x1F;
    pub const SUBJECT: u8 = 0x20;
}

pub mod provision {
    pub const PROVISION: u8 = 0x05;
    pub const POLICIES: u8 = 0x06;
    pub const POLICY: u8 = 0x07;
    pub const POLICY_TYPE: u8 = 0x08;
    pub const POLICY_KEY: u8 = 0x09;
    pub const DATA: u8 = 0x0A;
    pub const STATUS: u8 = 0x0B;
    pub const REMOTE_WIPE: u8 = 0x0C;
    pub const EAS_PROVISION_DOC: u8 = 0x0D;
}

pub mod airsync_base {
    pub const BODY_PREFERENCE: u8 = 0x05;
    pub const TYPE: u8 = 0x06;
    pub const TRUNCATION_SIZE: u8 = 0x07;
    pub const ALL_OR_NONE: u8 = 0x08;
    pub const BODY: u8 = 0x0A;
    pub const DATA: u8 = 0x0B;
    pub const ESTIMATED_DATA_SIZE: u8 = 0x0C;
    pub const TRUNCATED: u8 = 0x0D;
    pub const ATTACHMENTS: u8 = 0x0E;
    pub const ATTACHMENT: u8 = 0x0F;
    pub const DISPLAY_NAME: u8 = 0x10;
    pub const FILE_REFERENCE: u8 = 0x11;
    pub const METHOD: u8 = 0x12;
    pub const CONTENT_ID: u8 = 0x13;
    pub const CONTENT_LOCATION: u8 = 0x14;
    pub const IS_INLINE: u8 = 0x15;
    pub const NATIVE_BODY_TYPE: u8 = 0x16;
    pub const CONTENT_TYPE: u8 = 0x17;
}

pub mod item_operations {
    pub const ITEM_OPERATIONS: u8 = 0x05;
    pub const FETCH: u8 = 0x06;
    pub const STORE: u8 = 0x07;
    pub const OPTIONS: u8 = 0x08;
    pub const RANGE: u8 = 0x09;
    pub const TOTAL: u8 = 0x0A;
    pub const PROPERTIES: u8 = 0x0B;
    pub const DATA: u8 = 0x0C;
    pub const STATUS: u8 = 0x0D;
    pub const RESPONSE: u8 = 0x0E;
    pub const PART: u8 = 0x11;
}

pub mod compose_mail {
    pub const SEND_MAIL: u8 = 0x05;
    pub const SMART_FORWARD: u8 = 0x06;
    pub const SMART_REPLY: u8 = 0x07;
    pub const SAVE_IN_SENT_ITEMS: u8 = 0x08;
    pub const REPLACE_MIME: u8 = 0x09;
    pub const SOURCE: u8 = 0x0B;
    pub const FOLDER_ID: u8 = 0x0C;
    pub const ITEM_ID: u8 = 0x0D;
    pub const MIME: u8 = 0x10;
    pub const CLIENT_ID: u8 = 0x11;
    pub const STATUS: u8 = 0x12;
}

/// Human-readable page name for diagnostics.
#[must_use]
pub const fn page_name(page: u8) -> &'static str {
    match page {
        AIRSYNC => "AirSync",
        CONTACTS => "Contacts",
        EMAIL => "Email",
        CALENDAR => "Calendar",
        FOLDER_HIERARCHY => "FolderHierarchy",
        MEETING_RESPONSE => "MeetingResponse",
        TASKS => "Tasks",
        PROVISION => "Provision",
        AIRSYNC_BASE => "AirSyncBase",
        ITEM_OPERATIONS => "ItemOperations",
        COMPOSE_MAIL => "ComposeMail",
        _ => "Unknown",
    }
}

/// Whether a page is in the set this codec round-trips.
#[must_use]
pub const fn is_supported_page(page: u8) -> bool {
    matches!(
        page,
        AIRSYNC
            | CONTACTS
            | EMAIL
            | CALENDAR
            | FOLDER_HIERARCHY
            | MEETING_RESPONSE
            | TASKS
            | PROVISION
            | AIRSYNC_BASE
            | ITEM_OPERATIONS
            | COMPOSE_MAIL
    )
}
