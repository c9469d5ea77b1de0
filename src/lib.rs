//! Exchange ActiveSync synchronization engine
//!
//! A client-side sync engine for the ActiveSync protocol: WBXML wire
//! codec, HTTPS transport with configurable TLS trust, device
//! provisioning, per-folder sync-key cursors, and a content
//! normalization layer for MIME bodies and iCalendar invitations.
//!
//! The persistent store is external: the engine reads and writes
//! through the narrow [`MirrorStore`] interface, and every batch is
//! committed atomically together with its cursor advance, so a crash
//! can never leave synchronization state ahead of the stored data.
//!
//! Entry point: [`EasClient`], addressed by account id.

mod client;
mod config;
mod cursor;
mod engine;
mod error;
mod flight;
pub mod ical;
pub mod mime;
mod model;
mod proto;
mod provision;
mod store;
mod transport;
pub mod wbxml;

pub use client::EasClient;
pub use config::{AccountConfig, TlsMode};
pub use cursor::{CursorStore, HIERARCHY_COLLECTION_ID, INITIAL_SYNC_KEY, SyncCursor};
pub use engine::{RetryPolicy, SyncEngine};
pub use error::{Error, ErrorKind, Result};
pub use ical::{Invitation, parse_icalendar};
pub use model::{
    Attachment, Attendee, AttendeeResponse, Body, BodyKind, BusyStatus, CalendarEvent,
    ContactItem, Folder, FolderKind, MailItem, SyncItem, TaskItem,
};
pub use proto::operations::MeetingUserResponse;
pub use provision::{ProvisionManager, ProvisionState};
pub use store::{AccountStore, MemoryAccounts, MemoryMirror, MirrorOp, MirrorStore};
pub use transport::{PROTOCOL_VERSION, Session};
