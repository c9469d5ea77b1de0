//! One handler per ActiveSync command.

mod folder_sync;
mod item_operations;
mod meeting_response;
mod provision;
mod send_mail;
mod sync;

pub use folder_sync::handle_folder_sync;
pub use item_operations::handle_item_operations;
pub use meeting_response::handle_meeting_response;
pub use provision::handle_provision;
pub use send_mail::handle_send_mail;
pub use sync::handle_sync;

/// What a command handler asks the HTTP layer to send.
pub enum CommandResponse {
    /// 200 with a WBXML body.
    Wbxml(Vec<u8>),
    /// 200 with an empty body ("no changes" for Sync, success for
    /// SendMail).
    Empty,
}
