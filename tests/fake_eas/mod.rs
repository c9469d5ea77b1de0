//! Fake ActiveSync server for integration testing
//!
//! An in-process HTTP server that speaks enough of the protocol to test
//! the sync engine end-to-end:
//!
//! POST ?Cmd=... -> optional 449 provisioning gate -> WBXML decode ->
//! per-command handler -> WBXML response
//!
//! ## Module layout
//!
//! - `server` -- HTTP listener, optional TLS, and request dispatch
//! - `handlers/` -- one file per command (FolderSync, Sync, etc.)
//! - `state` -- test data model (folders, items, builder)

mod handlers;
mod server;
pub mod state;

pub use server::FakeEasServer;
pub use state::ServerStateBuilder;
