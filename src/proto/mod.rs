//! Typed command builders and response projections
//!
//! Thin layer between the generic [`crate::wbxml::Node`] tree and the
//! sync engine: one module per command family, each pairing a request
//! builder with a response parser that maps wire status codes onto the
//! crate error taxonomy.

pub mod folders;
pub mod items;
pub mod operations;

use crate::error::Error;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Sync status: the presented sync key is not valid for this collection.
pub const SYNC_STATUS_INVALID_KEY: u32 = 3;
/// Sync status: the folder hierarchy has changed; re-run FolderSync.
pub const SYNC_STATUS_HIERARCHY_CHANGED: u32 = 12;
/// FolderSync status: synchronization key mismatch.
pub const FOLDER_STATUS_INVALID_KEY: u32 = 9;

/// Map a non-success Sync collection status to an error.
pub(crate) fn sync_status_error(status: u32) -> Error {
    match status {
        SYNC_STATUS_INVALID_KEY | SYNC_STATUS_HIERARCHY_CHANGED => {
            Error::CursorInvalid(format!("sync status {status}"))
        }
        s => Error::ProtocolDecode(format!("sync failed with status {s}")),
    }
}

/// Map a non-success FolderSync status to an error.
pub(crate) fn folder_status_error(status: u32) -> Error {
    if status == FOLDER_STATUS_INVALID_KEY {
        Error::CursorInvalid(format!("folder sync status {status}"))
    } else {
        Error::ProtocolDecode(format!("folder sync failed with status {status}"))
    }
}

/// Map a non-success ItemOperations fetch status to an error.
pub(crate) fn fetch_status_error(status: u32) -> Error {
    // 6: object not found; 15: attachment or attachment id invalid.
    if status == 6 || status == 15 {
        Error::ObjectNotFound(format!("fetch status {status}"))
    } else {
        Error::ProtocolDecode(format!("fetch failed with status {status}"))
    }
}

/// Parse the timestamp formats the server emits: compact
/// (`20260115T093000Z`) and dotted-milliseconds
/// (`2026-01-15T09:30:00.000Z`).
#[must_use]
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.3fZ"))
        .ok()?;
    Some(Utc.from_utc_datetime(&naive))
}
